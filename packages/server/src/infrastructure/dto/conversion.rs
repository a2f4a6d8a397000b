//! Conversion logic between DTOs and domain entities.

use impostor_shared::time::timestamp_to_rfc3339;

use crate::{
    domain::{
        GameState, Phase, Pista, Player, PlayerId, PlayerName, RoomConfig, RoomSnapshot,
        ValidationError, VotingResults,
    },
    infrastructure::dto::{
        game::{GameStateDto, PistaDto, PlayerDto, PlayerRoleDto, RoomStateDto, VotingResultsDto},
        http::RoomSummaryDto,
    },
    usecase::PlayerRoleView,
};

// ========================================
// DTO → Domain
// ========================================

/// Validated input for creating a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoom {
    pub host_id: PlayerId,
    pub host_name: PlayerName,
    pub config: RoomConfig,
}

impl NewRoom {
    pub fn parse(
        player_id: String,
        player_name: String,
        rounds: Option<i64>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            host_id: PlayerId::new(player_id)?,
            host_name: PlayerName::new(player_name)?,
            config: RoomConfig::new(rounds)?,
        })
    }
}

/// Validated identity of a joining player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlayer {
    pub id: PlayerId,
    pub name: PlayerName,
}

impl NewPlayer {
    pub fn parse(player_id: String, player_name: String) -> Result<Self, ValidationError> {
        Ok(Self {
            id: PlayerId::new(player_id)?,
            name: PlayerName::new(player_name)?,
        })
    }
}

// ========================================
// Domain → DTO
// ========================================

impl From<&Player> for PlayerDto {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id.to_string(),
            name: player.name.as_str().to_string(),
            is_host: player.is_host,
            joined_at: timestamp_to_rfc3339(player.joined_at.value()),
        }
    }
}

impl From<&GameState> for GameStateDto {
    fn from(state: &GameState) -> Self {
        let len = state.turn_order.len();
        let at = |index: usize| {
            state
                .turn_order
                .get(if index >= len { 0 } else { index })
                .map(|id| id.to_string())
        };
        let finished = state.phase == Phase::Results;

        Self {
            phase: state.phase,
            current_round: state.current_round,
            max_rounds: state.max_rounds,
            current_turn: state.current_turn,
            current_player_id: at(state.current_player_index),
            current_voter_id: at(state.current_voter_index),
            turn_order: state.turn_order.iter().map(|id| id.to_string()).collect(),
            started_at: timestamp_to_rfc3339(state.started_at.value()),
            secret_word: finished.then(|| state.secret_word.clone()),
            impostor_id: finished.then(|| state.impostor_id.to_string()),
            history_id: state.history_id.clone(),
        }
    }
}

impl From<&RoomSnapshot> for RoomStateDto {
    fn from(snapshot: &RoomSnapshot) -> Self {
        let room = &snapshot.room;
        Self {
            code: room.code.to_string(),
            host_id: room.host_id.to_string(),
            status: room.status,
            rounds: room.config.rounds,
            created_at: timestamp_to_rfc3339(room.created_at.value()),
            last_activity: timestamp_to_rfc3339(room.last_activity.value()),
            players: snapshot.players.iter().map(PlayerDto::from).collect(),
            game: snapshot.game_state.as_ref().map(GameStateDto::from),
        }
    }
}

impl From<&RoomSnapshot> for RoomSummaryDto {
    fn from(snapshot: &RoomSnapshot) -> Self {
        Self {
            code: snapshot.room.code.to_string(),
            host_id: snapshot.room.host_id.to_string(),
            status: snapshot.room.status,
            player_count: snapshot.players.len(),
            created_at: timestamp_to_rfc3339(snapshot.room.created_at.value()),
        }
    }
}

impl From<&Pista> for PistaDto {
    fn from(pista: &Pista) -> Self {
        Self {
            id: pista.id.clone(),
            player_id: pista.player_id.to_string(),
            player_name: pista.player_name.clone(),
            text: pista.text.clone(),
            round: pista.round,
            turn: pista.turn,
            created_at: timestamp_to_rfc3339(pista.created_at.value()),
        }
    }
}

impl From<VotingResults> for VotingResultsDto {
    fn from(results: VotingResults) -> Self {
        Self {
            tally: results
                .tally
                .into_iter()
                .map(|(id, count)| (id.into_string(), count))
                .collect(),
            most_voted: results.most_voted.map(PlayerId::into_string),
            is_tie: results.is_tie,
            impostor_id: results.impostor_id.into_string(),
            winner: results.winner,
        }
    }
}

impl From<PlayerRoleView> for PlayerRoleDto {
    fn from(view: PlayerRoleView) -> Self {
        Self {
            player_id: view.player_id.into_string(),
            role: view.role,
            secret_word: view.secret_word,
        }
    }
}
