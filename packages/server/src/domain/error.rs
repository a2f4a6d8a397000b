//! ドメイン層のエラー型

use thiserror::Error;

/// 入力値の検証エラー
///
/// ユーザーが修正可能な入力の形式・範囲の誤りを表す。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Room code '{0}' is malformed")]
    InvalidRoomCode(String),

    #[error("Player ID must not be empty")]
    EmptyPlayerId,

    #[error("Player ID must be at most {max} characters")]
    PlayerIdTooLong { max: usize },

    #[error("Player name must not be empty")]
    EmptyPlayerName,

    #[error("Player name must be at most {max} characters")]
    PlayerNameTooLong { max: usize },

    #[error("Clue must not be empty")]
    EmptyPista,

    #[error("Clue must be at most {max} characters")]
    PistaTooLong { max: usize },

    #[error("Clue must not reveal the secret word")]
    PistaRevealsSecretWord,

    #[error("Rounds must be between {min} and {max}, got {value}")]
    RoundsOutOfRange { value: i64, min: u32, max: u32 },
}

/// Room Store のエラー
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Room store unavailable: {0}")]
    Unavailable(String),
}

/// メッセージ送信のエラー
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MessagePushError {
    #[error("Connection '{0}' not found")]
    ConnectionNotFound(String),

    #[error("Failed to push message: {0}")]
    PushFailed(String),
}

/// 履歴ストアのエラー
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("Failed to save game: {0}")]
    SaveFailed(String),
}

/// 検索インデックスのエラー
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchIndexError {
    #[error("Search index unavailable: {0}")]
    Unavailable(String),
}
