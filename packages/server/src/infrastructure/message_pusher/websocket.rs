//! WebSocket を使った MessagePusher 実装
//!
//! ## 責務
//!
//! - WebSocket の `UnboundedSender` を接続 ID ごとに管理
//! - 接続ごとのルーム所属（どのルームのどのプレイヤーか）を追跡
//! - クライアントへのメッセージ送信（push_to, push_to_player, broadcast_to_room）
//!
//! ## 設計ノート
//!
//! WebSocket の生成は UI 層（`ui/handler/websocket.rs`）で行われます。
//! この実装は生成された `UnboundedSender` を受け取り、メッセージ送信に使用します。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    ConnectionId, MessagePushError, MessagePusher, PlayerId, PusherChannel, RoomCode,
    RoomMembership,
};

/// 1 接続分の情報
struct Connection {
    sender: PusherChannel,
    membership: Option<RoomMembership>,
}

/// WebSocket を使った MessagePusher 実装
///
/// ## 使用例
///
/// ```ignore
/// let pusher = WebSocketMessagePusher::new();
/// pusher.register_connection(connection_id.clone(), tx).await;
/// pusher.bind(&connection_id, RoomMembership { code, player_id }).await;
/// pusher.broadcast_to_room(&code, "{\"type\":\"room-state\"}").await;
/// ```
#[derive(Default)]
pub struct WebSocketMessagePusher {
    /// Key: connection_id
    connections: Mutex<HashMap<ConnectionId, Connection>>,
}

impl WebSocketMessagePusher {
    /// 新しい WebSocketMessagePusher を作成
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessagePusher for WebSocketMessagePusher {
    async fn register_connection(&self, connection_id: ConnectionId, sender: PusherChannel) {
        let mut connections = self.connections.lock().await;
        tracing::debug!("Connection '{}' registered to MessagePusher", connection_id);
        connections.insert(
            connection_id,
            Connection {
                sender,
                membership: None,
            },
        );
    }

    async fn unregister_connection(&self, connection_id: &str) -> Option<RoomMembership> {
        let mut connections = self.connections.lock().await;
        let removed = connections.remove(connection_id);
        tracing::debug!(
            "Connection '{}' unregistered from MessagePusher",
            connection_id
        );
        removed.and_then(|connection| connection.membership)
    }

    async fn bind(&self, connection_id: &str, membership: RoomMembership) {
        let mut connections = self.connections.lock().await;
        if let Some(connection) = connections.get_mut(connection_id) {
            tracing::debug!(
                "Connection '{}' bound to room '{}' as '{}'",
                connection_id,
                membership.code,
                membership.player_id
            );
            connection.membership = Some(membership);
        } else {
            tracing::warn!("Cannot bind unknown connection '{}'", connection_id);
        }
    }

    async fn unbind(&self, connection_id: &str) -> Option<RoomMembership> {
        let mut connections = self.connections.lock().await;
        connections
            .get_mut(connection_id)
            .and_then(|connection| connection.membership.take())
    }

    async fn membership(&self, connection_id: &str) -> Option<RoomMembership> {
        let connections = self.connections.lock().await;
        connections
            .get(connection_id)
            .and_then(|connection| connection.membership.clone())
    }

    async fn push_to(&self, connection_id: &str, content: &str) -> Result<(), MessagePushError> {
        let connections = self.connections.lock().await;

        let Some(connection) = connections.get(connection_id) else {
            return Err(MessagePushError::ConnectionNotFound(
                connection_id.to_string(),
            ));
        };
        connection
            .sender
            .send(content.to_string())
            .map_err(|e| MessagePushError::PushFailed(e.to_string()))?;
        tracing::debug!("Pushed message to connection '{}'", connection_id);
        Ok(())
    }

    async fn push_to_player(
        &self,
        code: &RoomCode,
        player_id: &PlayerId,
        content: &str,
    ) -> Result<(), MessagePushError> {
        let connections = self.connections.lock().await;

        let target = connections.iter().find(|(_, connection)| {
            connection
                .membership
                .as_ref()
                .is_some_and(|m| &m.code == code && &m.player_id == player_id)
        });
        let Some((connection_id, connection)) = target else {
            return Err(MessagePushError::ConnectionNotFound(format!(
                "{}/{}",
                code, player_id
            )));
        };
        connection
            .sender
            .send(content.to_string())
            .map_err(|e| MessagePushError::PushFailed(e.to_string()))?;
        tracing::debug!(
            "Pushed message to player '{}' via connection '{}'",
            player_id,
            connection_id
        );
        Ok(())
    }

    async fn broadcast_to_room(&self, code: &RoomCode, content: &str) -> usize {
        let connections = self.connections.lock().await;
        let mut delivered = 0;

        let members = connections.iter().filter(|(_, connection)| {
            connection
                .membership
                .as_ref()
                .is_some_and(|m| &m.code == code)
        });
        for (connection_id, connection) in members {
            // ブロードキャストでは一部の送信失敗を許容
            if let Err(e) = connection.sender.send(content.to_string()) {
                tracing::warn!(
                    "Failed to push message to connection '{}': {}",
                    connection_id,
                    e
                );
            } else {
                delivered += 1;
            }
        }
        tracing::debug!(
            "Broadcasted message to {} connection(s) in room '{}'",
            delivered,
            code
        );

        delivered
    }

    async fn unbind_room(&self, code: &RoomCode) {
        let mut connections = self.connections.lock().await;
        for connection in connections.values_mut() {
            if connection
                .membership
                .as_ref()
                .is_some_and(|m| &m.code == code)
            {
                connection.membership = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - push_to: 特定の接続への送信
    // - push_to_player: ルーム内の特定プレイヤーへの送信（役割の個別通知に使う）
    // - broadcast_to_room: ルームに紐付いた接続だけへの送信
    // - 接続ごとのルーム所属の追跡（bind / unbind / unregister）
    // ========================================

    fn code(value: &str) -> RoomCode {
        RoomCode::parse(value, 6).unwrap()
    }

    fn membership(room: &str, player: &str) -> RoomMembership {
        RoomMembership {
            code: code(room),
            player_id: PlayerId::new(player.to_string()).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_push_to_success() {
        // テスト項目: 特定の接続にメッセージを送信できる
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        pusher.register_connection("conn-1".to_string(), tx).await;

        // when (操作):
        let result = pusher.push_to("conn-1", "Hello").await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(rx.recv().await, Some("Hello".to_string()));
    }

    #[tokio::test]
    async fn test_push_to_connection_not_found() {
        // テスト項目: 存在しない接続への送信はエラーを返す
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();

        // when (操作):
        let result = pusher.push_to("nonexistent", "Hello").await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(MessagePushError::ConnectionNotFound(
                "nonexistent".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_broadcast_only_reaches_bound_connections() {
        // テスト項目: ブロードキャストは対象ルームに紐付いた接続にだけ届く
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let (tx3, mut rx3) = mpsc::unbounded_channel();
        pusher.register_connection("c1".to_string(), tx1).await;
        pusher.register_connection("c2".to_string(), tx2).await;
        pusher.register_connection("c3".to_string(), tx3).await;
        pusher.bind("c1", membership("ROOM01", "alice")).await;
        pusher.bind("c2", membership("ROOM01", "bob")).await;
        pusher.bind("c3", membership("ROOM02", "carol")).await;

        // when (操作):
        let delivered = pusher.broadcast_to_room(&code("ROOM01"), "update").await;

        // then (期待する結果):
        assert_eq!(delivered, 2);
        assert_eq!(rx1.recv().await, Some("update".to_string()));
        assert_eq!(rx2.recv().await, Some("update".to_string()));
        assert!(rx3.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_tolerates_closed_receivers() {
        // テスト項目: 受信側が閉じた接続があってもブロードキャストは続行される
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, rx2) = mpsc::unbounded_channel::<String>();
        drop(rx2);
        pusher.register_connection("c1".to_string(), tx1).await;
        pusher.register_connection("c2".to_string(), tx2).await;
        pusher.bind("c1", membership("ROOM01", "alice")).await;
        pusher.bind("c2", membership("ROOM01", "bob")).await;

        // when (操作):
        let delivered = pusher.broadcast_to_room(&code("ROOM01"), "update").await;

        // then (期待する結果):
        assert_eq!(delivered, 1);
        assert_eq!(rx1.recv().await, Some("update".to_string()));
    }

    #[tokio::test]
    async fn test_push_to_player_targets_membership() {
        // テスト項目: ルームとプレイヤーの組で接続を特定して送信できる
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        pusher.register_connection("c1".to_string(), tx1).await;
        pusher.register_connection("c2".to_string(), tx2).await;
        pusher.bind("c1", membership("ROOM01", "alice")).await;
        pusher.bind("c2", membership("ROOM01", "bob")).await;
        let bob = membership("ROOM01", "bob");

        // when (操作):
        let result = pusher.push_to_player(&bob.code, &bob.player_id, "secret").await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(rx2.recv().await, Some("secret".to_string()));
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unregister_returns_membership() {
        // テスト項目: 接続解除時に参加中のルーム所属が返される（暗黙の退出に使う）
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        pusher.register_connection("c1".to_string(), tx).await;
        pusher.bind("c1", membership("ROOM01", "alice")).await;

        // when (操作):
        let removed = pusher.unregister_connection("c1").await;

        // then (期待する結果):
        assert_eq!(removed, Some(membership("ROOM01", "alice")));
        assert_eq!(pusher.membership("c1").await, None);
    }

    #[tokio::test]
    async fn test_unbind_room_clears_all_memberships() {
        // テスト項目: ルーム削除時に全接続の紐付けが外れる
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        pusher.register_connection("c1".to_string(), tx1).await;
        pusher.register_connection("c2".to_string(), tx2).await;
        pusher.bind("c1", membership("ROOM01", "alice")).await;
        pusher.bind("c2", membership("ROOM02", "bob")).await;

        // when (操作):
        pusher.unbind_room(&code("ROOM01")).await;

        // then (期待する結果):
        assert_eq!(pusher.membership("c1").await, None);
        assert_eq!(pusher.membership("c2").await, Some(membership("ROOM02", "bob")));
    }
}
