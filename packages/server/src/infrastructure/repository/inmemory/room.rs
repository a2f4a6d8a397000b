//! InMemory Room Store 実装
//!
//! ドメイン層が定義する RoomStore trait の具体的な実装。
//! HashMap をインメモリのキーバリューストアとして使用します。
//!
//! ## キーと有効期限
//!
//! ルームごとに `RoomEntry` を持ち、その中の各フィールドが 1 つのキーに相当します。
//! 有効期限はルーム単位で、期限切れのエントリは読み取り時に遅延削除されるほか、
//! `purge_expired` で一括削除されます。

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use impostor_shared::time::Clock;
use tokio::sync::{Mutex, broadcast};

use crate::domain::{
    GameState, Pista, Player, PlayerId, RoleMap, Room, RoomCode, RoomEvent, RoomStore,
    StoreError, VoteMap,
};

/// pub/sub チャンネルのバッファサイズ
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// 1 ルーム分のキー
#[derive(Debug, Default)]
struct RoomEntry {
    room: Option<Room>,
    players: HashMap<PlayerId, Player>,
    /// 追加順を保持するメンバー集合
    members: Vec<PlayerId>,
    game_state: Option<GameState>,
    roles: Option<RoleMap>,
    pistas: Vec<Pista>,
    votes: VoteMap,
    /// 有効期限（Unix ミリ秒）
    expires_at: Option<i64>,
}

impl RoomEntry {
    fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at <= now)
    }

    fn clear_game(&mut self) {
        self.game_state = None;
        self.roles = None;
        self.pistas.clear();
        self.votes.clear();
    }
}

/// インメモリ Room Store 実装
pub struct InMemoryRoomStore {
    entries: Mutex<HashMap<RoomCode, RoomEntry>>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<RoomEvent>,
}

impl InMemoryRoomStore {
    /// 新しい InMemoryRoomStore を作成
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            events,
        }
    }

    /// 期限切れなら削除したうえで、エントリへの可変参照を返す
    fn live_entry<'a>(
        entries: &'a mut HashMap<RoomCode, RoomEntry>,
        code: &RoomCode,
        now: i64,
    ) -> Option<&'a mut RoomEntry> {
        if entries.get(code).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(code);
            tracing::debug!("Room '{}' expired on access", code);
        }
        entries.get_mut(code)
    }

    /// エントリが無ければ作成して返す
    fn entry_or_default<'a>(
        entries: &'a mut HashMap<RoomCode, RoomEntry>,
        code: &RoomCode,
        now: i64,
    ) -> &'a mut RoomEntry {
        if entries.get(code).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(code);
        }
        entries.entry(code.clone()).or_default()
    }
}

#[async_trait]
impl RoomStore for InMemoryRoomStore {
    async fn put_room(&self, room: &Room) -> Result<(), StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        Self::entry_or_default(&mut entries, &room.code, now).room = Some(room.clone());
        Ok(())
    }

    async fn get_room(&self, code: &RoomCode) -> Result<Option<Room>, StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        Ok(Self::live_entry(&mut entries, code, now).and_then(|entry| entry.room.clone()))
    }

    async fn delete_room(&self, code: &RoomCode) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        entries.remove(code);
        Ok(())
    }

    async fn room_exists(&self, code: &RoomCode) -> Result<bool, StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        Ok(Self::live_entry(&mut entries, code, now).is_some_and(|entry| entry.room.is_some()))
    }

    async fn set_expiry(&self, code: &RoomCode, ttl: Duration) -> Result<(), StoreError> {
        let now = self.clock.now_millis();
        let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let mut entries = self.entries.lock().await;
        if let Some(entry) = Self::live_entry(&mut entries, code, now) {
            entry.expires_at = Some(now.saturating_add(ttl_millis));
        }
        Ok(())
    }

    async fn put_player(&self, code: &RoomCode, player: &Player) -> Result<(), StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        Self::entry_or_default(&mut entries, code, now)
            .players
            .insert(player.id.clone(), player.clone());
        Ok(())
    }

    async fn get_player(
        &self,
        code: &RoomCode,
        player_id: &PlayerId,
    ) -> Result<Option<Player>, StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        Ok(Self::live_entry(&mut entries, code, now)
            .and_then(|entry| entry.players.get(player_id).cloned()))
    }

    async fn delete_player(
        &self,
        code: &RoomCode,
        player_id: &PlayerId,
    ) -> Result<(), StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        if let Some(entry) = Self::live_entry(&mut entries, code, now) {
            entry.players.remove(player_id);
        }
        Ok(())
    }

    async fn add_member(&self, code: &RoomCode, player_id: &PlayerId) -> Result<(), StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        let entry = Self::entry_or_default(&mut entries, code, now);
        if !entry.members.contains(player_id) {
            entry.members.push(player_id.clone());
        }
        Ok(())
    }

    async fn remove_member(
        &self,
        code: &RoomCode,
        player_id: &PlayerId,
    ) -> Result<(), StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        if let Some(entry) = Self::live_entry(&mut entries, code, now) {
            entry.members.retain(|id| id != player_id);
        }
        Ok(())
    }

    async fn list_members(&self, code: &RoomCode) -> Result<Vec<PlayerId>, StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        Ok(Self::live_entry(&mut entries, code, now)
            .map(|entry| entry.members.clone())
            .unwrap_or_default())
    }

    async fn put_game_state(&self, code: &RoomCode, state: &GameState) -> Result<(), StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        Self::entry_or_default(&mut entries, code, now).game_state = Some(state.clone());
        Ok(())
    }

    async fn get_game_state(&self, code: &RoomCode) -> Result<Option<GameState>, StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        Ok(Self::live_entry(&mut entries, code, now).and_then(|entry| entry.game_state.clone()))
    }

    async fn delete_game(&self, code: &RoomCode) -> Result<(), StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        if let Some(entry) = Self::live_entry(&mut entries, code, now) {
            entry.clear_game();
        }
        Ok(())
    }

    async fn put_roles(&self, code: &RoomCode, roles: &RoleMap) -> Result<(), StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        Self::entry_or_default(&mut entries, code, now).roles = Some(roles.clone());
        Ok(())
    }

    async fn get_roles(&self, code: &RoomCode) -> Result<Option<RoleMap>, StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        Ok(Self::live_entry(&mut entries, code, now).and_then(|entry| entry.roles.clone()))
    }

    async fn append_pista(&self, code: &RoomCode, pista: &Pista) -> Result<(), StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        Self::entry_or_default(&mut entries, code, now)
            .pistas
            .push(pista.clone());
        Ok(())
    }

    async fn list_pistas(&self, code: &RoomCode) -> Result<Vec<Pista>, StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        Ok(Self::live_entry(&mut entries, code, now)
            .map(|entry| entry.pistas.clone())
            .unwrap_or_default())
    }

    async fn put_vote(
        &self,
        code: &RoomCode,
        voter_id: &PlayerId,
        target_id: &PlayerId,
    ) -> Result<(), StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        Self::entry_or_default(&mut entries, code, now)
            .votes
            .insert(voter_id.clone(), target_id.clone());
        Ok(())
    }

    async fn get_votes(&self, code: &RoomCode) -> Result<VoteMap, StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        Ok(Self::live_entry(&mut entries, code, now)
            .map(|entry| entry.votes.clone())
            .unwrap_or_default())
    }

    async fn clear_votes(&self, code: &RoomCode) -> Result<(), StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        if let Some(entry) = Self::live_entry(&mut entries, code, now) {
            entry.votes.clear();
        }
        Ok(())
    }

    async fn list_room_codes(&self) -> Result<Vec<RoomCode>, StoreError> {
        let now = self.clock.now_millis();
        let entries = self.entries.lock().await;
        let mut codes: Vec<RoomCode> = entries
            .iter()
            .filter(|(_, entry)| entry.room.is_some() && !entry.is_expired(now))
            .map(|(code, _)| code.clone())
            .collect();
        codes.sort();
        Ok(codes)
    }

    async fn purge_expired(&self) -> Result<Vec<RoomCode>, StoreError> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().await;
        let expired: Vec<RoomCode> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(code, _)| code.clone())
            .collect();
        for code in &expired {
            entries.remove(code);
        }
        Ok(expired)
    }

    fn publish(&self, event: RoomEvent) {
        // 購読者がいない場合の送信エラーは無視する
        if self.events.send(event).is_err() {
            tracing::trace!("No subscribers for room event");
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Phase, PlayerName, RoomConfig, Timestamp};
    use impostor_shared::time::ManualClock;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - InMemoryRoomStore のキー操作（ルーム・プレイヤー・メンバー・ゲーム関連）
    // - 有効期限（遅延削除と一括削除）
    // - pub/sub の配信
    //
    // 【なぜこのテストが必要か】
    // - RoomService / GameService は全ての状態をこのストア経由で読み書きする
    // - メンバー順は手番順とホスト移譲の基準になるため、追加順の保持が必須
    // ========================================

    fn code(value: &str) -> RoomCode {
        RoomCode::parse(value, 6).unwrap()
    }

    fn id(value: &str) -> PlayerId {
        PlayerId::new(value.to_string()).unwrap()
    }

    fn room(value: &str) -> Room {
        Room::new(code(value), id("host"), RoomConfig::default(), Timestamp::new(0))
    }

    fn player(value: &str) -> Player {
        Player::new(
            id(value),
            PlayerName::new(value.to_string()).unwrap(),
            Timestamp::new(0),
            false,
        )
    }

    fn create_test_store() -> (InMemoryRoomStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        (InMemoryRoomStore::new(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_put_and_get_room() {
        // テスト項目: 書き込んだルームを取得できる
        // given (前提条件):
        let (store, _clock) = create_test_store();
        let room = room("ABC123");

        // when (操作):
        store.put_room(&room).await.unwrap();
        let fetched = store.get_room(&room.code).await.unwrap();

        // then (期待する結果):
        assert_eq!(fetched, Some(room));
    }

    #[tokio::test]
    async fn test_members_keep_insertion_order_and_are_unique() {
        // テスト項目: メンバー集合は追加順を保ち、重複しない
        // given (前提条件):
        let (store, _clock) = create_test_store();
        let code = code("ABC123");

        // when (操作):
        for name in ["charlie", "alice", "bob", "alice"] {
            store.add_member(&code, &id(name)).await.unwrap();
        }
        store.remove_member(&code, &id("alice")).await.unwrap();

        // then (期待する結果):
        let members = store.list_members(&code).await.unwrap();
        assert_eq!(members, vec![id("charlie"), id("bob")]);
    }

    #[tokio::test]
    async fn test_delete_room_removes_derived_keys() {
        // テスト項目: ルーム削除で派生キー（プレイヤー・メンバー・投票）も消える
        // given (前提条件):
        let (store, _clock) = create_test_store();
        let room = room("ABC123");
        store.put_room(&room).await.unwrap();
        store.put_player(&room.code, &player("alice")).await.unwrap();
        store.add_member(&room.code, &id("alice")).await.unwrap();
        store
            .put_vote(&room.code, &id("alice"), &id("bob"))
            .await
            .unwrap();

        // when (操作):
        store.delete_room(&room.code).await.unwrap();

        // then (期待する結果):
        assert!(!store.room_exists(&room.code).await.unwrap());
        assert!(store.list_members(&room.code).await.unwrap().is_empty());
        assert!(store.get_votes(&room.code).await.unwrap().is_empty());
        assert_eq!(
            store.get_player(&room.code, &id("alice")).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_votes_overwrite_per_voter() {
        // テスト項目: 同じ投票者の再投票は上書きされる
        // given (前提条件):
        let (store, _clock) = create_test_store();
        let code = code("ABC123");

        // when (操作):
        store.put_vote(&code, &id("a"), &id("b")).await.unwrap();
        store.put_vote(&code, &id("a"), &id("c")).await.unwrap();

        // then (期待する結果):
        let votes = store.get_votes(&code).await.unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes.get(&id("a")), Some(&id("c")));
    }

    #[tokio::test]
    async fn test_delete_game_keeps_room_and_members() {
        // テスト項目: ゲーム関連キーの削除はルームとメンバーに影響しない
        // given (前提条件):
        let (store, _clock) = create_test_store();
        let room = room("ABC123");
        store.put_room(&room).await.unwrap();
        store.add_member(&room.code, &id("a")).await.unwrap();
        let state = GameState::new(
            "playa".to_string(),
            id("a"),
            None,
            vec![id("a")],
            Timestamp::new(0),
        );
        store.put_game_state(&room.code, &state).await.unwrap();
        store
            .put_roles(&room.code, &RoleMap::from([(id("a"), crate::domain::Role::Impostor)]))
            .await
            .unwrap();

        // when (操作):
        store.delete_game(&room.code).await.unwrap();

        // then (期待する結果):
        assert_eq!(store.get_game_state(&room.code).await.unwrap(), None);
        assert_eq!(store.get_roles(&room.code).await.unwrap(), None);
        assert_eq!(
            store.get_room(&room.code).await.unwrap().map(|r| r.status),
            Some(Phase::Lobby)
        );
        assert_eq!(store.list_members(&room.code).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_expired_room_is_absent_on_read() {
        // テスト項目: 有効期限を過ぎたルームは読み取り時に存在しない扱いになる
        // given (前提条件):
        let (store, clock) = create_test_store();
        let room = room("ABC123");
        store.put_room(&room).await.unwrap();
        store
            .set_expiry(&room.code, Duration::from_secs(60))
            .await
            .unwrap();

        // when (操作):
        clock.advance_millis(59_999);
        let before = store.get_room(&room.code).await.unwrap();
        clock.advance_millis(1);
        let after = store.get_room(&room.code).await.unwrap();

        // then (期待する結果):
        assert!(before.is_some());
        assert!(after.is_none());
    }

    #[tokio::test]
    async fn test_purge_expired_returns_removed_codes() {
        // テスト項目: 一括削除は期限切れのルームだけを消し、そのコードを返す
        // given (前提条件):
        let (store, clock) = create_test_store();
        let short = room("SHORT1");
        let long = room("LONG22");
        store.put_room(&short).await.unwrap();
        store.put_room(&long).await.unwrap();
        store
            .set_expiry(&short.code, Duration::from_secs(1))
            .await
            .unwrap();
        store
            .set_expiry(&long.code, Duration::from_secs(3600))
            .await
            .unwrap();
        clock.advance_millis(5_000);

        // when (操作):
        let purged = store.purge_expired().await.unwrap();

        // then (期待する結果):
        assert_eq!(purged, vec![short.code.clone()]);
        assert_eq!(store.list_room_codes().await.unwrap(), vec![long.code]);
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        // テスト項目: publish したイベントを購読者が受け取れる
        // given (前提条件):
        let (store, _clock) = create_test_store();
        let mut rx = store.subscribe();

        // when (操作):
        store.publish(RoomEvent::Created {
            code: code("ABC123"),
        });

        // then (期待する結果):
        assert_eq!(
            rx.recv().await.unwrap(),
            RoomEvent::Created {
                code: code("ABC123")
            }
        );
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_does_not_fail() {
        // テスト項目: 購読者がいなくても publish は失敗しない
        // given (前提条件):
        let (store, _clock) = create_test_store();

        // when (操作) / then (期待する結果):
        store.publish(RoomEvent::Deleted {
            code: code("ABC123"),
        });
    }
}
