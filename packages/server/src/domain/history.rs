//! 履歴ストア・検索インデックスのインターフェース
//!
//! どちらも外部の協調者。ゲーム進行は呼び出しの失敗に影響されない。

use async_trait::async_trait;
use serde::Serialize;

use super::{HistoryError, Role, SearchIndexError, Winner};

/// 終了したゲームのプレイヤー記録
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub id: String,
    pub name: String,
    pub role: Role,
    /// 投票先（投票していなければ None）
    pub voted_for: Option<String>,
    pub won: bool,
}

/// 終了したゲームのヒント記録
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PistaRecord {
    pub player_id: String,
    pub player_name: String,
    pub text: String,
    pub round: u32,
    pub turn: u32,
}

/// 終了したゲームの投票記録
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub voter_id: String,
    pub target_id: String,
}

/// 履歴ストアに引き渡す不変のゲーム記録
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub room_code: String,
    pub secret_word: String,
    pub impostor_id: String,
    pub winner: Winner,
    pub total_rounds: u32,
    pub players: Vec<PlayerRecord>,
    pub pistas: Vec<PistaRecord>,
    pub votes: Vec<VoteRecord>,
    pub started_at: i64,
    pub finished_at: i64,
}

/// 検索インデックスに登録するゲーム文書
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameDocument {
    pub id: String,
    pub room_code: String,
    pub secret_word: String,
    pub winner: Winner,
    pub player_names: Vec<String>,
    pub finished_at: i64,
}

impl GameDocument {
    pub fn from_record(id: String, record: &GameRecord) -> Self {
        Self {
            id,
            room_code: record.room_code.clone(),
            secret_word: record.secret_word.clone(),
            winner: record.winner,
            player_names: record.players.iter().map(|p| p.name.clone()).collect(),
            finished_at: record.finished_at,
        }
    }
}

/// 検索インデックスに登録するユーザー文書
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDocument {
    pub id: String,
    pub name: String,
    pub games_played: u32,
    pub games_won: u32,
}

/// 履歴ストア
///
/// `save_game` は呼び出し側から見て 1 つの不可分な操作として実行されなければならない。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GameHistory: Send + Sync {
    /// ゲーム記録を保存し、記録の ID を返す
    async fn save_game(&self, record: GameRecord) -> Result<String, HistoryError>;

    /// ID でゲーム記録を取得
    async fn get_game(&self, id: &str) -> Result<Option<GameRecord>, HistoryError>;
}

/// 検索インデックス（すべてベストエフォート）
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn index_game(&self, doc: GameDocument) -> Result<(), SearchIndexError>;

    async fn index_user(&self, doc: UserDocument) -> Result<(), SearchIndexError>;

    async fn update_user_index(
        &self,
        id: &str,
        games_played: u32,
        games_won: u32,
    ) -> Result<(), SearchIndexError>;

    async fn delete_game(&self, id: &str) -> Result<(), SearchIndexError>;

    /// 秘密の単語かプレイヤー名に `query` を含むゲームを新しい順に返す（大文字小文字を無視）
    async fn search_games(&self, query: &str) -> Result<Vec<GameDocument>, SearchIndexError>;
}

