//! UseCase: 終了したゲームの履歴への引き渡し
//!
//! ゲームが `results` に入ったとき、1 度だけ不変のゲーム記録を組み立てて
//! 履歴ストアに保存し、検索インデックスへ登録する。
//! どちらの失敗もログに残すだけで、ゲーム進行には影響させない。

use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;

use crate::domain::{
    GameDocument, GameHistory, GameRecord, GameState, Pista, PistaRecord, Player, PlayerRecord,
    Role, RoleMap, RoomCode, SearchIndex, Timestamp, UserDocument, VoteMap, VoteRecord,
    VotingResults, Winner,
};

/// 記録を組み立てるための材料
pub struct FinishedGame<'a> {
    pub code: &'a RoomCode,
    pub state: &'a GameState,
    pub roles: &'a RoleMap,
    pub players: &'a [Player],
    pub pistas: &'a [Pista],
    pub votes: &'a VoteMap,
    pub results: &'a VotingResults,
    pub finished_at: Timestamp,
}

impl FinishedGame<'_> {
    /// 手番順のプレイヤーについてゲーム記録を組み立てる
    ///
    /// 名前はプレイヤー情報、無ければヒントの記録、それも無ければ ID を使う。
    pub fn to_record(&self) -> GameRecord {
        let players = self
            .state
            .turn_order
            .iter()
            .map(|id| {
                let role = self.roles.get(id).copied().unwrap_or(Role::Normal);
                let won = match self.results.winner {
                    Winner::Impostor => role == Role::Impostor,
                    Winner::Players => role == Role::Normal,
                };
                PlayerRecord {
                    id: id.to_string(),
                    name: self.display_name(id.as_str()),
                    role,
                    voted_for: self.votes.get(id).map(|target| target.to_string()),
                    won,
                }
            })
            .collect();

        GameRecord {
            room_code: self.code.to_string(),
            secret_word: self.state.secret_word.clone(),
            impostor_id: self.state.impostor_id.to_string(),
            winner: self.results.winner,
            total_rounds: self.state.current_round,
            players,
            pistas: self
                .pistas
                .iter()
                .map(|pista| PistaRecord {
                    player_id: pista.player_id.to_string(),
                    player_name: pista.player_name.clone(),
                    text: pista.text.clone(),
                    round: pista.round,
                    turn: pista.turn,
                })
                .collect(),
            votes: self
                .votes
                .iter()
                .map(|(voter, target)| VoteRecord {
                    voter_id: voter.to_string(),
                    target_id: target.to_string(),
                })
                .collect(),
            started_at: self.state.started_at.value(),
            finished_at: self.finished_at.value(),
        }
    }

    fn display_name(&self, id: &str) -> String {
        self.players
            .iter()
            .find(|player| player.id.as_str() == id)
            .map(|player| player.name.as_str().to_string())
            .or_else(|| {
                self.pistas
                    .iter()
                    .find(|pista| pista.player_id.as_str() == id)
                    .map(|pista| pista.player_name.clone())
            })
            .unwrap_or_else(|| id.to_string())
    }
}

/// 履歴ストアと検索インデックスへの引き渡し
pub struct HistoryHandoff {
    history: Arc<dyn GameHistory>,
    search: Arc<dyn SearchIndex>,
    /// プレイヤー ID → (プレイ数, 勝利数)
    user_stats: Mutex<HashMap<String, (u32, u32)>>,
}

impl HistoryHandoff {
    pub fn new(history: Arc<dyn GameHistory>, search: Arc<dyn SearchIndex>) -> Self {
        Self {
            history,
            search,
            user_stats: Mutex::new(HashMap::new()),
        }
    }

    /// 記録を保存し、保存できれば記録の ID を返す
    ///
    /// 保存の失敗は error、インデックス登録の失敗は warn で記録して握りつぶす。
    pub async fn hand_off(&self, record: GameRecord) -> Option<String> {
        let id = match self.history.save_game(record.clone()).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(
                    "Failed to save finished game of room '{}': {}",
                    record.room_code,
                    e
                );
                return None;
            }
        };
        tracing::info!("Game of room '{}' saved as '{}'", record.room_code, id);

        let document = GameDocument::from_record(id.clone(), &record);
        if let Err(e) = self.search.index_game(document).await {
            tracing::warn!("Failed to index game '{}': {}", id, e);
        }
        self.index_players(&record).await;

        Some(id)
    }

    async fn index_players(&self, record: &GameRecord) {
        let mut stats = self.user_stats.lock().await;
        for player in &record.players {
            let entry = stats.get(&player.id).copied();
            let (played, won) = entry.unwrap_or((0, 0));
            let updated = (played + 1, won + u32::from(player.won));

            let result = if entry.is_some() {
                self.search
                    .update_user_index(&player.id, updated.0, updated.1)
                    .await
            } else {
                self.search
                    .index_user(UserDocument {
                        id: player.id.clone(),
                        name: player.name.clone(),
                        games_played: updated.0,
                        games_won: updated.1,
                    })
                    .await
            };
            match result {
                Ok(()) => {
                    stats.insert(player.id.clone(), updated);
                }
                Err(e) => tracing::warn!("Failed to index player '{}': {}", player.id, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        HistoryError, PlayerId, PlayerName, SearchIndexError,
        history::{MockGameHistory, MockSearchIndex},
        voting,
    };

    fn id(value: &str) -> PlayerId {
        PlayerId::new(value.to_string()).unwrap()
    }

    fn player(value: &str, name: &str) -> Player {
        Player::new(
            id(value),
            PlayerName::new(name.to_string()).unwrap(),
            Timestamp::new(0),
            false,
        )
    }

    fn sample_record() -> GameRecord {
        let code = RoomCode::parse("ABC123", 6).unwrap();
        let state = GameState::new(
            "hospital".to_string(),
            id("caro"),
            Some(1),
            vec![id("ana"), id("beto"), id("caro")],
            Timestamp::new(1_000),
        );
        let roles: RoleMap = [
            (id("ana"), Role::Normal),
            (id("beto"), Role::Normal),
            (id("caro"), Role::Impostor),
        ]
        .into_iter()
        .collect();
        let votes: VoteMap = [
            (id("ana"), id("caro")),
            (id("beto"), id("caro")),
            (id("caro"), id("ana")),
        ]
        .into_iter()
        .collect();
        let results = voting::resolve(&votes, &state.impostor_id);
        // beto はすでに退出しており、名前はヒントの記録から引く
        let players = vec![player("ana", "Ana"), player("caro", "Caro")];
        let pistas = vec![Pista {
            id: "p-1".to_string(),
            player_id: id("beto"),
            player_name: "Beto".to_string(),
            text: "agujas".to_string(),
            round: 1,
            turn: 1,
            created_at: Timestamp::new(1_500),
        }];

        FinishedGame {
            code: &code,
            state: &state,
            roles: &roles,
            players: &players,
            pistas: &pistas,
            votes: &votes,
            results: &results,
            finished_at: Timestamp::new(9_000),
        }
        .to_record()
    }

    #[test]
    fn test_record_assembly() {
        // テスト項目: 役割・投票先・勝敗・名前が記録に反映される
        // given (前提条件) / when (操作):
        let record = sample_record();

        // then (期待する結果):
        assert_eq!(record.room_code, "ABC123");
        assert_eq!(record.winner, Winner::Players);
        assert_eq!(record.total_rounds, 1);
        assert_eq!(record.started_at, 1_000);
        assert_eq!(record.finished_at, 9_000);
        assert_eq!(record.players.len(), 3);
        let beto = &record.players[1];
        assert_eq!(beto.name, "Beto");
        assert_eq!(beto.voted_for.as_deref(), Some("caro"));
        assert!(beto.won);
        let caro = &record.players[2];
        assert_eq!(caro.role, Role::Impostor);
        assert!(!caro.won);
        assert_eq!(record.votes.len(), 3);
        assert_eq!(record.pistas[0].text, "agujas");
    }

    #[tokio::test]
    async fn test_hand_off_saves_and_indexes() {
        // テスト項目: 保存に成功すると ID が返り、ゲームとプレイヤーが登録される
        // given (前提条件):
        let mut history = MockGameHistory::new();
        history
            .expect_save_game()
            .times(1)
            .returning(|_| Ok("game-1".to_string()));
        let mut search = MockSearchIndex::new();
        search
            .expect_index_game()
            .withf(|doc| doc.id == "game-1" && doc.secret_word == "hospital")
            .times(1)
            .returning(|_| Ok(()));
        search.expect_index_user().times(3).returning(|_| Ok(()));
        let handoff = HistoryHandoff::new(Arc::new(history), Arc::new(search));

        // when (操作):
        let id = handoff.hand_off(sample_record()).await;

        // then (期待する結果):
        assert_eq!(id, Some("game-1".to_string()));
    }

    #[tokio::test]
    async fn test_second_game_updates_user_stats() {
        // テスト項目: 2 回目以降のゲームではプレイヤーの統計が更新される
        // given (前提条件):
        let mut history = MockGameHistory::new();
        history
            .expect_save_game()
            .times(2)
            .returning(|_| Ok("game".to_string()));
        let mut search = MockSearchIndex::new();
        search.expect_index_game().times(2).returning(|_| Ok(()));
        search.expect_index_user().times(3).returning(|_| Ok(()));
        search
            .expect_update_user_index()
            .withf(|id, played, won| id == "beto" && *played == 2 && *won == 2)
            .times(1)
            .returning(|_, _, _| Ok(()));
        search
            .expect_update_user_index()
            .withf(|id, _, _| id != "beto")
            .times(2)
            .returning(|_, _, _| Ok(()));
        let handoff = HistoryHandoff::new(Arc::new(history), Arc::new(search));

        // when (操作):
        handoff.hand_off(sample_record()).await;
        let id = handoff.hand_off(sample_record()).await;

        // then (期待する結果):
        assert_eq!(id, Some("game".to_string()));
    }

    #[tokio::test]
    async fn test_save_failure_is_swallowed() {
        // テスト項目: 保存に失敗しても None を返すだけでインデックスには触れない
        // given (前提条件):
        let mut history = MockGameHistory::new();
        history
            .expect_save_game()
            .times(1)
            .returning(|_| Err(HistoryError::SaveFailed("disk full".to_string())));
        let mut search = MockSearchIndex::new();
        search.expect_index_game().never();
        let handoff = HistoryHandoff::new(Arc::new(history), Arc::new(search));

        // when (操作):
        let id = handoff.hand_off(sample_record()).await;

        // then (期待する結果):
        assert_eq!(id, None);
    }

    #[tokio::test]
    async fn test_index_failure_keeps_saved_id() {
        // テスト項目: インデックス登録に失敗しても保存済みの ID は返る
        // given (前提条件):
        let mut history = MockGameHistory::new();
        history
            .expect_save_game()
            .times(1)
            .returning(|_| Ok("game-1".to_string()));
        let mut search = MockSearchIndex::new();
        search
            .expect_index_game()
            .returning(|_| Err(SearchIndexError::Unavailable("down".to_string())));
        search
            .expect_index_user()
            .returning(|_| Err(SearchIndexError::Unavailable("down".to_string())));
        let handoff = HistoryHandoff::new(Arc::new(history), Arc::new(search));

        // when (操作):
        let id = handoff.hand_off(sample_record()).await;

        // then (期待する結果):
        assert_eq!(id, Some("game-1".to_string()));
    }
}
