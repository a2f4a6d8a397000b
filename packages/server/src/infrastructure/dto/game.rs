//! Views of rooms and games shared by the HTTP API and the realtime channel.
//!
//! The public game view never carries the secret word or the impostor while the
//! game is running. Both are revealed once the game reaches `results`.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{Phase, Role, Winner};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDto {
    pub id: String,
    pub name: String,
    pub is_host: bool,
    pub joined_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateDto {
    pub phase: Phase,
    pub current_round: u32,
    pub max_rounds: Option<u32>,
    pub current_turn: u32,
    pub current_player_id: Option<String>,
    pub current_voter_id: Option<String>,
    pub turn_order: Vec<String>,
    pub started_at: String,
    /// Revealed in `results` only
    pub secret_word: Option<String>,
    /// Revealed in `results` only
    pub impostor_id: Option<String>,
    pub history_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStateDto {
    pub code: String,
    pub host_id: String,
    pub status: Phase,
    pub rounds: Option<u32>,
    pub created_at: String,
    pub last_activity: String,
    pub players: Vec<PlayerDto>,
    pub game: Option<GameStateDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PistaDto {
    pub id: String,
    pub player_id: String,
    pub player_name: String,
    pub text: String,
    pub round: u32,
    pub turn: u32,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingResultsDto {
    pub tally: BTreeMap<String, u32>,
    pub most_voted: Option<String>,
    pub is_tie: bool,
    pub impostor_id: String,
    pub winner: Winner,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRoleDto {
    pub player_id: String,
    pub role: Role,
    pub secret_word: Option<String>,
}
