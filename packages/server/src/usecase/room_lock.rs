//! ルーム単位の排他制御
//!
//! 同じルームへの状態変更はすべてこのロックの下で直列に実行される。
//! 異なるルームは互いに待たない。

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::RoomCode;

/// ルームコードごとの非同期 Mutex の登録簿
#[derive(Default)]
pub struct RoomLocks {
    locks: Mutex<HashMap<RoomCode, Arc<Mutex<()>>>>,
}

impl RoomLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// ルームのロックを取得する（解放はガードの drop）
    pub async fn acquire(&self, code: &RoomCode) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(code.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// 誰も保持・待機していないロックを登録簿から外し、外した数を返す
    pub async fn prune_idle(&self) -> usize {
        let mut locks = self.locks.lock().await;
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - locks.len()
    }

    /// 登録されているロックの数
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn code(value: &str) -> RoomCode {
        RoomCode::parse(value, 6).unwrap()
    }

    #[tokio::test]
    async fn test_same_room_is_serialized() {
        // テスト項目: 同じルームのロックは同時に 1 つしか取得できない
        // given (前提条件):
        let locks = Arc::new(RoomLocks::new());
        let guard = locks.acquire(&code("ROOM01")).await;

        // when (操作):
        let locks_clone = locks.clone();
        let waiter = tokio::spawn(async move {
            let _guard = locks_clone.acquire(&code("ROOM01")).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let finished_while_held = waiter.is_finished();
        drop(guard);
        waiter.await.unwrap();

        // then (期待する結果):
        assert!(!finished_while_held);
    }

    #[tokio::test]
    async fn test_different_rooms_do_not_block() {
        // テスト項目: 異なるルームのロックは互いに待たない
        // given (前提条件):
        let locks = RoomLocks::new();
        let _guard = locks.acquire(&code("ROOM01")).await;

        // when (操作):
        let other = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire(&code("ROOM02")),
        )
        .await;

        // then (期待する結果):
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn test_prune_idle_keeps_held_locks() {
        // テスト項目: 保持中のロックは残り、使われていないロックだけが外れる
        // given (前提条件):
        let locks = RoomLocks::new();
        let held = locks.acquire(&code("ROOM01")).await;
        drop(locks.acquire(&code("ROOM02")).await);

        // when (操作):
        let pruned = locks.prune_idle().await;

        // then (期待する結果):
        assert_eq!(pruned, 1);
        assert_eq!(locks.len().await, 1);
        drop(held);
        assert_eq!(locks.prune_idle().await, 1);
        assert!(locks.is_empty().await);
    }
}
