//! HTTP API request and response bodies.

use serde::{Deserialize, Serialize};

use crate::domain::Phase;

use super::game::{GameStateDto, PistaDto, RoomStateDto, VotingResultsDto};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub player_id: String,
    pub player_name: String,
    #[serde(default)]
    pub rounds: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    pub player_id: String,
    pub player_name: String,
}

/// Body of host-only and self-service actions (leave, start, next round, reset, delete)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRequest {
    pub player_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PistaRequest {
    pub player_id: String,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub voter_id: String,
    pub target_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseRequest {
    pub player_id: String,
    pub phase: Phase,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummaryDto {
    pub code: String,
    pub host_id: String,
    pub status: Phase,
    pub player_count: usize,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveResponse {
    pub room_deleted: bool,
    pub new_host_id: Option<String>,
    pub room: Option<RoomStateDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PistaResponse {
    pub pista: PistaDto,
    pub game: GameStateDto,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub game: GameStateDto,
    /// Present once every player has voted
    pub results: Option<VotingResultsDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseResponse {
    pub room: RoomStateDto,
    pub results: Option<VotingResultsDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
