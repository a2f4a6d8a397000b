//! Realtime events exchanged over `/ws`.
//!
//! Every frame is a JSON object tagged by `type` (kebab-case). After
//! `create-room` or `join-room` the connection is bound to that room and player,
//! and later events act on behalf of that binding.

use serde::{Deserialize, Serialize};

use crate::domain::Phase;

use super::game::{PistaDto, PlayerDto, PlayerRoleDto, RoomStateDto, VotingResultsDto};

/// Client → server
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    CreateRoom {
        player_id: String,
        player_name: String,
        #[serde(default)]
        rounds: Option<i64>,
    },
    JoinRoom {
        code: String,
        player_id: String,
        player_name: String,
    },
    LeaveRoom,
    StartGame,
    ChangePhase {
        phase: Phase,
    },
    SubmitPista {
        text: String,
    },
    SubmitVote {
        target_id: String,
    },
    NextRound,
    ResetGame,
    GetRoomState,
    GetVotingResults,
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "create-room",
            Self::JoinRoom { .. } => "join-room",
            Self::LeaveRoom => "leave-room",
            Self::StartGame => "start-game",
            Self::ChangePhase { .. } => "change-phase",
            Self::SubmitPista { .. } => "submit-pista",
            Self::SubmitVote { .. } => "submit-vote",
            Self::NextRound => "next-round",
            Self::ResetGame => "reset-game",
            Self::GetRoomState => "get-room-state",
            Self::GetVotingResults => "get-voting-results",
        }
    }
}

/// Server → client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    RoomState {
        room: RoomStateDto,
    },
    PlayerJoined {
        player: PlayerDto,
    },
    PlayerLeft {
        player_id: String,
        new_host_id: Option<String>,
    },
    RoomDeleted {
        code: String,
    },
    GameStarted {
        room: RoomStateDto,
    },
    /// Sent to a single player only
    RoleAssigned {
        role: PlayerRoleDto,
    },
    PhaseChanged {
        phase: Phase,
    },
    PistaAdded {
        pista: PistaDto,
        next_player_id: Option<String>,
        current_turn: u32,
    },
    VoteRecorded {
        voter_id: String,
        votes_cast: usize,
        total_voters: usize,
    },
    VotingResults {
        results: VotingResultsDto,
    },
    RoundStarted {
        round: u32,
    },
    GameReset,
    Error {
        error: String,
        message: String,
    },
}

impl ServerEvent {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create_room() {
        // テスト項目: create-room イベントを camelCase のフィールドで受け取れる
        // given (前提条件):
        let json = r#"{"type":"create-room","playerId":"p1","playerName":"Ana","rounds":3}"#;

        // when (操作):
        let event: ClientEvent = serde_json::from_str(json).unwrap();

        // then (期待する結果):
        assert_eq!(
            event,
            ClientEvent::CreateRoom {
                player_id: "p1".to_string(),
                player_name: "Ana".to_string(),
                rounds: Some(3),
            }
        );
        assert_eq!(event.name(), "create-room");
    }

    #[test]
    fn test_parse_unit_and_phase_events() {
        // テスト項目: フィールドの無いイベントとフェーズ指定のイベント
        // given (前提条件):
        let start = r#"{"type":"start-game"}"#;
        let phase = r#"{"type":"change-phase","phase":"voting"}"#;

        // when (操作):
        let start: ClientEvent = serde_json::from_str(start).unwrap();
        let phase: ClientEvent = serde_json::from_str(phase).unwrap();

        // then (期待する結果):
        assert_eq!(start, ClientEvent::StartGame);
        assert_eq!(
            phase,
            ClientEvent::ChangePhase {
                phase: Phase::Voting
            }
        );
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        // テスト項目: 未知の type はパースエラー
        // given (前提条件):
        let json = r#"{"type":"dance","content":"hola"}"#;

        // when (操作):
        let result = serde_json::from_str::<ClientEvent>(json);

        // then (期待する結果):
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_server_event() {
        // テスト項目: サーバイベントは type タグと camelCase のフィールドで送られる
        // given (前提条件):
        let event = ServerEvent::VoteRecorded {
            voter_id: "p1".to_string(),
            votes_cast: 1,
            total_voters: 3,
        };

        // when (操作):
        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();

        // then (期待する結果):
        assert_eq!(
            json,
            serde_json::json!({
                "type": "vote-recorded",
                "voterId": "p1",
                "votesCast": 1,
                "totalVoters": 3
            })
        );
        assert_eq!(
            ServerEvent::GameReset.to_json().unwrap(),
            r#"{"type":"game-reset"}"#
        );
    }
}
