//! MessagePusher trait 定義
//!
//! 接続中のクライアントへのメッセージ送信と、接続ごとのルーム所属の追跡を抽象化します。

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{MessagePushError, PlayerId, RoomCode};

/// クライアントへの送信チャンネル
pub type PusherChannel = mpsc::UnboundedSender<String>;

/// 接続 ID
pub type ConnectionId = String;

/// 接続がどのルームのどのプレイヤーとして参加しているか
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMembership {
    pub code: RoomCode,
    pub player_id: PlayerId,
}

/// MessagePusher trait
///
/// - 接続の登録・解除
/// - 接続とルーム所属の紐付け
/// - 単一接続・プレイヤー・ルーム全員への送信
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// 接続を登録
    async fn register_connection(&self, connection_id: ConnectionId, sender: PusherChannel);

    /// 接続を解除し、参加していたルームがあれば返す
    async fn unregister_connection(&self, connection_id: &str) -> Option<RoomMembership>;

    /// 接続をルームのプレイヤーとして紐付ける（既存の紐付けは置き換える）
    async fn bind(&self, connection_id: &str, membership: RoomMembership);

    /// 紐付けを外し、外した所属を返す
    async fn unbind(&self, connection_id: &str) -> Option<RoomMembership>;

    /// 接続の現在の所属
    async fn membership(&self, connection_id: &str) -> Option<RoomMembership>;

    /// 単一の接続に送信
    async fn push_to(&self, connection_id: &str, content: &str) -> Result<(), MessagePushError>;

    /// ルーム内の特定プレイヤーの接続に送信
    async fn push_to_player(
        &self,
        code: &RoomCode,
        player_id: &PlayerId,
        content: &str,
    ) -> Result<(), MessagePushError>;

    /// ルームに紐付いた全ての接続に送信し、送信できた数を返す
    async fn broadcast_to_room(&self, code: &RoomCode, content: &str) -> usize;

    /// ルームに紐付いた全ての接続の紐付けを外す
    async fn unbind_room(&self, code: &RoomCode);
}
