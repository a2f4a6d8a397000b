//! UseCase 層のエラー型

use std::time::Duration;

use thiserror::Error;

use crate::domain::{Phase, StoreError, ValidationError};

/// エラーの分類
///
/// UI 層はこの分類で HTTP ステータスやクライアントへの通知内容を決める。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 入力の形式・範囲の誤り（ユーザーが修正可能）
    Validation,
    /// ルーム・プレイヤー・ゲームが存在しない
    NotFound,
    /// ホスト以外によるホスト専用操作
    Authorization,
    /// フェーズ・手番が合わない
    StateConflict,
    /// 満員、コード生成の枯渇
    ResourceExhausted,
    /// ストアの障害・タイムアウト
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Authorization => "authorization",
            Self::StateConflict => "state_conflict",
            Self::ResourceExhausted => "resource_exhausted",
            Self::Internal => "internal",
        }
    }
}

/// ルーム・ゲーム操作のエラー
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GameError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Room '{0}' not found")]
    RoomNotFound(String),

    #[error("Player '{0}' not found in room")]
    PlayerNotFound(String),

    #[error("No game in progress in room '{0}'")]
    GameNotFound(String),

    #[error("Only the host can {0}")]
    NotHost(&'static str),

    #[error("Action requires phase '{expected}', but the game is in '{actual}'")]
    WrongPhase { expected: Phase, actual: Phase },

    #[error("It is not your turn")]
    NotYourTurn,

    #[error("Players cannot vote for themselves")]
    SelfVoteNotAllowed,

    #[error("Round {0} is the final round")]
    FinalRoundReached(u32),

    #[error("The game has already finished")]
    GameFinished,

    #[error("Player '{0}' is already in the room")]
    DuplicatePlayer(String),

    #[error("At least {min} players are required to start, room has {actual}")]
    NotEnoughPlayers { min: usize, actual: usize },

    #[error("Room is full ({0} players)")]
    RoomFull(usize),

    #[error("Could not generate a unique room code after {0} attempts")]
    CodeGenerationExhausted(usize),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Room store did not respond within {0:?}")]
    Timeout(Duration),
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::RoomNotFound(_) | Self::PlayerNotFound(_) | Self::GameNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::NotHost(_) => ErrorKind::Authorization,
            Self::WrongPhase { .. }
            | Self::NotYourTurn
            | Self::SelfVoteNotAllowed
            | Self::FinalRoundReached(_)
            | Self::GameFinished
            | Self::DuplicatePlayer(_)
            | Self::NotEnoughPlayers { .. } => ErrorKind::StateConflict,
            Self::RoomFull(_) | Self::CodeGenerationExhausted(_) => ErrorKind::ResourceExhausted,
            Self::Store(_) | Self::Timeout(_) => ErrorKind::Internal,
        }
    }
}
