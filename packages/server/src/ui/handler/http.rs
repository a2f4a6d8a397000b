//! HTTP API endpoint handlers.
//!
//! Every successful mutation is also pushed to the room's WebSocket
//! connections through the dispatcher.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    domain::{GameDocument, GameRecord, PistaText, PlayerId, RoomCode},
    infrastructure::dto::{
        conversion::{NewPlayer, NewRoom},
        game::{GameStateDto, PistaDto, PlayerRoleDto, RoomStateDto, VotingResultsDto},
        http::{
            CreateRoomRequest, JoinRoomRequest, LeaveResponse, PhaseRequest, PhaseResponse,
            PistaRequest, PistaResponse, PlayerRequest, RoomSummaryDto, SearchQuery, VoteRequest,
            VoteResponse,
        },
    },
    ui::{error::ApiError, state::AppState},
    usecase::LeaveOutcome,
};

type ApiResult<T> = Result<Json<T>, ApiError>;

fn room_code(state: &AppState, raw: &str) -> Result<RoomCode, ApiError> {
    Ok(state.room_service.parse_code(raw)?)
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

// ========================================
// Rooms
// ========================================

/// List live rooms, oldest first
pub async fn list_rooms(State(state): State<Arc<AppState>>) -> ApiResult<Vec<RoomSummaryDto>> {
    let rooms = state.room_service.list_rooms().await?;
    Ok(Json(rooms.iter().map(RoomSummaryDto::from).collect()))
}

pub async fn create_room(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomStateDto>), ApiError> {
    let input = NewRoom::parse(body.player_id, body.player_name, body.rounds)?;
    let snapshot = state
        .room_service
        .create_room(input.host_id, input.host_name, input.config)
        .await?;
    Ok((StatusCode::CREATED, Json((&snapshot).into())))
}

pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> ApiResult<RoomStateDto> {
    let code = room_code(&state, &code)?;
    let snapshot = state.room_service.get_room_state(&code).await?;
    Ok(Json((&snapshot).into()))
}

/// Host-only deletion
pub async fn delete_room(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(body): Json<PlayerRequest>,
) -> Result<StatusCode, ApiError> {
    let code = room_code(&state, &code)?;
    let requester = PlayerId::new(body.player_id)?;
    state.room_service.delete_room(&code, &requester).await?;
    state.dispatcher.notify_deleted(&code).await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn join_room(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(body): Json<JoinRoomRequest>,
) -> ApiResult<RoomStateDto> {
    let code = room_code(&state, &code)?;
    let input = NewPlayer::parse(body.player_id, body.player_name)?;
    let snapshot = state
        .room_service
        .join_room(&code, input.id.clone(), input.name)
        .await?;
    state.dispatcher.notify_joined(&snapshot, &input.id).await;
    Ok(Json((&snapshot).into()))
}

pub async fn leave_room(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(body): Json<PlayerRequest>,
) -> ApiResult<LeaveResponse> {
    let code = room_code(&state, &code)?;
    let player_id = PlayerId::new(body.player_id)?;
    let outcome = state.room_service.leave_room(&code, &player_id).await?;
    state
        .dispatcher
        .notify_left(&code, &player_id, &outcome)
        .await;

    let response = match outcome {
        LeaveOutcome::Left { snapshot, new_host } => LeaveResponse {
            room_deleted: false,
            new_host_id: new_host.map(PlayerId::into_string),
            room: Some((&snapshot).into()),
        },
        LeaveOutcome::RoomDeleted => LeaveResponse {
            room_deleted: true,
            new_host_id: None,
            room: None,
        },
    };
    Ok(Json(response))
}

// ========================================
// Game
// ========================================

pub async fn start_game(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(body): Json<PlayerRequest>,
) -> ApiResult<RoomStateDto> {
    let code = room_code(&state, &code)?;
    let host_id = PlayerId::new(body.player_id)?;
    let started = state.game_service.start_game(&code, &host_id).await?;
    state.dispatcher.notify_started(&started).await;
    state
        .dispatcher
        .broadcast_room_state(&started.snapshot)
        .await;
    Ok(Json((&started.snapshot).into()))
}

pub async fn list_pistas(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> ApiResult<Vec<PistaDto>> {
    let code = room_code(&state, &code)?;
    let pistas = state.game_service.get_pistas(&code).await?;
    Ok(Json(pistas.iter().map(PistaDto::from).collect()))
}

pub async fn add_pista(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(body): Json<PistaRequest>,
) -> ApiResult<PistaResponse> {
    let code = room_code(&state, &code)?;
    let player_id = PlayerId::new(body.player_id)?;
    let text = PistaText::new(body.text)?;
    let added = state
        .game_service
        .add_pista(&code, &player_id, text)
        .await?;
    state.dispatcher.notify_pista(&code, &added).await;
    state.dispatcher.refresh_room_state(&code).await;
    Ok(Json(PistaResponse {
        pista: (&added.pista).into(),
        game: (&added.state).into(),
    }))
}

pub async fn add_vote(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(body): Json<VoteRequest>,
) -> ApiResult<VoteResponse> {
    let code = room_code(&state, &code)?;
    let voter_id = PlayerId::new(body.voter_id)?;
    let target_id = PlayerId::new(body.target_id)?;
    let outcome = state
        .game_service
        .add_vote(&code, &voter_id, &target_id)
        .await?;
    state
        .dispatcher
        .notify_vote(&code, &voter_id, &outcome)
        .await;
    state.dispatcher.refresh_room_state(&code).await;
    Ok(Json(VoteResponse {
        game: (&outcome.state).into(),
        results: outcome.results.map(VotingResultsDto::from),
    }))
}

pub async fn change_phase(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(body): Json<PhaseRequest>,
) -> ApiResult<PhaseResponse> {
    let code = room_code(&state, &code)?;
    let player_id = PlayerId::new(body.player_id)?;
    let change = state
        .game_service
        .change_phase(&code, body.phase, &player_id)
        .await?;
    state.dispatcher.notify_phase(&change).await;
    Ok(Json(PhaseResponse {
        room: (&change.snapshot).into(),
        results: change.results.map(VotingResultsDto::from),
    }))
}

pub async fn next_round(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(body): Json<PlayerRequest>,
) -> ApiResult<GameStateDto> {
    let code = room_code(&state, &code)?;
    let host_id = PlayerId::new(body.player_id)?;
    let game = state.game_service.next_round(&code, &host_id).await?;
    state.dispatcher.notify_round(&code, &game).await;
    Ok(Json((&game).into()))
}

pub async fn reset_game(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(body): Json<PlayerRequest>,
) -> ApiResult<RoomStateDto> {
    let code = room_code(&state, &code)?;
    let host_id = PlayerId::new(body.player_id)?;
    let snapshot = state.game_service.reset_game(&code, &host_id).await?;
    state.dispatcher.notify_reset(&snapshot).await;
    Ok(Json((&snapshot).into()))
}

pub async fn voting_results(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> ApiResult<VotingResultsDto> {
    let code = room_code(&state, &code)?;
    let results = state.game_service.get_voting_results(&code).await?;
    Ok(Json(results.into()))
}

pub async fn player_role(
    State(state): State<Arc<AppState>>,
    Path((code, player_id)): Path<(String, String)>,
) -> ApiResult<PlayerRoleDto> {
    let code = room_code(&state, &code)?;
    let player_id = PlayerId::new(player_id)?;
    let view = state.game_service.get_player_role(&code, &player_id).await?;
    Ok(Json(view.into()))
}

// ========================================
// History
// ========================================

pub async fn get_game_record(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<GameRecord> {
    match state.history.get_game(&id).await? {
        Some(record) => Ok(Json(record)),
        None => Err(ApiError::GameRecordNotFound(id)),
    }
}

/// Full-text search over finished games
pub async fn search_games(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<GameDocument>> {
    Ok(Json(state.search.search_games(query.q.trim()).await?))
}
