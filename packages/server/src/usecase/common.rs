//! サービス間で共有する補助関数

use std::{future::Future, time::Duration};

use crate::domain::{GameState, Room, RoomCode, RoomSnapshot, RoomStore, StoreError, Timestamp};

use super::error::GameError;

/// 操作全体を `limit` で打ち切る
pub(crate) async fn bounded<T, F>(limit: Duration, operation: F) -> Result<T, GameError>
where
    F: Future<Output = Result<T, GameError>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("Room operation timed out after {:?}", limit);
            Err(GameError::Timeout(limit))
        }
    }
}

pub(crate) async fn require_room(store: &dyn RoomStore, code: &RoomCode) -> Result<Room, GameError> {
    store
        .get_room(code)
        .await?
        .ok_or_else(|| GameError::RoomNotFound(code.to_string()))
}

pub(crate) async fn require_game(
    store: &dyn RoomStore,
    code: &RoomCode,
) -> Result<GameState, GameError> {
    store
        .get_game_state(code)
        .await?
        .ok_or_else(|| GameError::GameNotFound(code.to_string()))
}

/// 最終操作時刻を更新してルームを書き戻し、有効期限を延長する
pub(crate) async fn save_room(
    store: &dyn RoomStore,
    room: &mut Room,
    now: Timestamp,
    ttl: Duration,
) -> Result<(), StoreError> {
    room.touch(now);
    store.put_room(room).await?;
    store.set_expiry(&room.code, ttl).await
}

/// メンバー順にプレイヤーを集めてスナップショットを組み立てる
pub(crate) async fn load_snapshot(
    store: &dyn RoomStore,
    room: Room,
) -> Result<RoomSnapshot, StoreError> {
    let members = store.list_members(&room.code).await?;
    let mut players = Vec::with_capacity(members.len());
    for id in &members {
        match store.get_player(&room.code, id).await? {
            Some(player) => players.push(player),
            None => tracing::warn!(
                "Member '{}' of room '{}' has no player record",
                id,
                room.code
            ),
        }
    }
    let game_state = store.get_game_state(&room.code).await?;

    Ok(RoomSnapshot {
        room,
        players,
        game_state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_times_out() {
        // テスト項目: 制限時間を超えた操作は Timeout になる
        // given (前提条件):
        let limit = Duration::from_millis(10);

        // when (操作):
        let result: Result<(), GameError> = bounded(limit, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        // then (期待する結果):
        assert_eq!(result, Err(GameError::Timeout(limit)));
    }

    #[tokio::test]
    async fn test_bounded_passes_result_through() {
        // テスト項目: 制限時間内の操作は結果をそのまま返す
        // given (前提条件):
        let limit = Duration::from_secs(1);

        // when (操作):
        let result = bounded(limit, async { Err::<(), _>(GameError::NotYourTurn) }).await;

        // then (期待する結果):
        assert_eq!(result, Err(GameError::NotYourTurn));
    }
}
