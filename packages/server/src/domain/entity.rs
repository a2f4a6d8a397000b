//! エンティティ
//!
//! ルーム・プレイヤー・ゲーム状態・ヒント・ルームイベント。

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use super::{PlayerId, PlayerName, RoomCode, RoomConfig, Timestamp};

/// ゲームのフェーズ
///
/// ルームの `status` はゲームのフェーズと常に一致する（ゲームが無ければ `Lobby`）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Lobby,
    RoleAssignment,
    Round,
    Discussion,
    Voting,
    Results,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lobby => "lobby",
            Self::RoleAssignment => "roleAssignment",
            Self::Round => "round",
            Self::Discussion => "discussion",
            Self::Voting => "voting",
            Self::Results => "results",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ルーム
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub code: RoomCode,
    pub host_id: PlayerId,
    pub status: Phase,
    pub config: RoomConfig,
    pub created_at: Timestamp,
    pub last_activity: Timestamp,
}

impl Room {
    pub fn new(code: RoomCode, host_id: PlayerId, config: RoomConfig, now: Timestamp) -> Self {
        Self {
            code,
            host_id,
            status: Phase::Lobby,
            config,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn is_host(&self, player_id: &PlayerId) -> bool {
        &self.host_id == player_id
    }

    pub fn touch(&mut self, now: Timestamp) {
        self.last_activity = now;
    }
}

/// プレイヤー
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: PlayerName,
    pub joined_at: Timestamp,
    pub is_host: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: PlayerName, joined_at: Timestamp, is_host: bool) -> Self {
        Self {
            id,
            name,
            joined_at,
            is_host,
        }
    }
}

/// 役割
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Impostor,
    Normal,
}

/// playerId → 役割
pub type RoleMap = BTreeMap<PlayerId, Role>;

/// voterId → targetId
pub type VoteMap = BTreeMap<PlayerId, PlayerId>;

/// ゲーム状態
///
/// ルームごとに最大 1 つ。ゲーム開始時に作られ、次のゲーム開始かリセットで破棄される。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub secret_word: String,
    pub impostor_id: PlayerId,
    pub current_round: u32,
    pub max_rounds: Option<u32>,
    pub phase: Phase,
    pub current_player_index: usize,
    pub current_voter_index: usize,
    pub current_turn: u32,
    /// ゲーム開始時点のメンバー順（手番順）
    pub turn_order: Vec<PlayerId>,
    pub started_at: Timestamp,
    /// 履歴ストアへの引き渡しが済んでいれば Some
    pub history_id: Option<String>,
    /// 引き渡しを試みたかどうか（失敗時も true）
    pub handed_off: bool,
}

impl GameState {
    pub fn new(
        secret_word: String,
        impostor_id: PlayerId,
        max_rounds: Option<u32>,
        turn_order: Vec<PlayerId>,
        started_at: Timestamp,
    ) -> Self {
        Self {
            secret_word,
            impostor_id,
            current_round: 1,
            max_rounds,
            phase: Phase::RoleAssignment,
            current_player_index: 0,
            current_voter_index: 0,
            current_turn: 1,
            turn_order,
            started_at,
            history_id: None,
            handed_off: false,
        }
    }

    pub fn is_participant(&self, player_id: &PlayerId) -> bool {
        self.turn_order.contains(player_id)
    }

    pub fn is_final_round(&self) -> bool {
        matches!(self.max_rounds, Some(max) if self.current_round >= max)
    }
}

/// ヒント（追記のみのログ）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pista {
    pub id: String,
    pub player_id: PlayerId,
    pub player_name: String,
    pub text: String,
    pub round: u32,
    pub turn: u32,
    pub created_at: Timestamp,
}

/// ルームの集約スナップショット
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room: Room,
    pub players: Vec<Player>,
    pub game_state: Option<GameState>,
}

impl RoomSnapshot {
    pub fn host(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.is_host)
    }
}

/// ルームストアの pub/sub で配信されるイベント
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum RoomEvent {
    Created { code: RoomCode },
    PlayerJoined { code: RoomCode, player_id: PlayerId },
    PlayerLeft { code: RoomCode, player_id: PlayerId },
    HostChanged { code: RoomCode, host_id: PlayerId },
    PhaseChanged { code: RoomCode, phase: Phase },
    Deleted { code: RoomCode },
    Expired { code: RoomCode },
}

impl RoomEvent {
    pub fn code(&self) -> &RoomCode {
        match self {
            Self::Created { code }
            | Self::PlayerJoined { code, .. }
            | Self::PlayerLeft { code, .. }
            | Self::HostChanged { code, .. }
            | Self::PhaseChanged { code, .. }
            | Self::Deleted { code }
            | Self::Expired { code } => code,
        }
    }
}
