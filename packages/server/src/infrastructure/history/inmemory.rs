//! InMemory 履歴ストア・検索インデックス実装
//!
//! プロセスの再起動で失われる。永続化はこのサーバの対象外。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{
    GameDocument, GameHistory, GameRecord, HistoryError, SearchIndex, SearchIndexError,
    UserDocument,
};

/// インメモリ履歴ストア
#[derive(Default)]
pub struct InMemoryGameHistory {
    games: Mutex<HashMap<String, GameRecord>>,
}

impl InMemoryGameHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 保存済みの記録数
    pub async fn count(&self) -> usize {
        self.games.lock().await.len()
    }
}

#[async_trait]
impl GameHistory for InMemoryGameHistory {
    async fn save_game(&self, record: GameRecord) -> Result<String, HistoryError> {
        let id = Uuid::new_v4().to_string();
        let mut games = self.games.lock().await;
        tracing::info!(
            "Saved game '{}' for room '{}' (winner: {:?})",
            id,
            record.room_code,
            record.winner
        );
        games.insert(id.clone(), record);
        Ok(id)
    }

    async fn get_game(&self, id: &str) -> Result<Option<GameRecord>, HistoryError> {
        let games = self.games.lock().await;
        Ok(games.get(id).cloned())
    }
}

/// インメモリ検索インデックス
#[derive(Default)]
pub struct InMemorySearchIndex {
    games: Mutex<HashMap<String, GameDocument>>,
    users: Mutex<HashMap<String, UserDocument>>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_user(&self, id: &str) -> Option<UserDocument> {
        self.users.lock().await.get(id).cloned()
    }
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn index_game(&self, doc: GameDocument) -> Result<(), SearchIndexError> {
        let mut games = self.games.lock().await;
        tracing::debug!("Indexed game '{}'", doc.id);
        games.insert(doc.id.clone(), doc);
        Ok(())
    }

    async fn index_user(&self, doc: UserDocument) -> Result<(), SearchIndexError> {
        let mut users = self.users.lock().await;
        users.insert(doc.id.clone(), doc);
        Ok(())
    }

    async fn update_user_index(
        &self,
        id: &str,
        games_played: u32,
        games_won: u32,
    ) -> Result<(), SearchIndexError> {
        let mut users = self.users.lock().await;
        let Some(user) = users.get_mut(id) else {
            return Err(SearchIndexError::Unavailable(format!(
                "user '{}' is not indexed",
                id
            )));
        };
        user.games_played = games_played;
        user.games_won = games_won;
        Ok(())
    }

    async fn delete_game(&self, id: &str) -> Result<(), SearchIndexError> {
        let mut games = self.games.lock().await;
        games.remove(id);
        Ok(())
    }

    async fn search_games(&self, query: &str) -> Result<Vec<GameDocument>, SearchIndexError> {
        let query = query.to_lowercase();
        let games = self.games.lock().await;
        let mut hits: Vec<GameDocument> = games
            .values()
            .filter(|doc| {
                doc.secret_word.to_lowercase().contains(&query)
                    || doc
                        .player_names
                        .iter()
                        .any(|name| name.to_lowercase().contains(&query))
            })
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
        Ok(hits)
    }
}
