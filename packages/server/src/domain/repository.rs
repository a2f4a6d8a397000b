//! Repository trait 定義
//!
//! ドメイン層が必要とするルームストアのインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。
//!
//! ## 一貫性
//!
//! 各操作は単一キーの粒度でのみ不可分です。ルーム・ゲーム状態・役割・投票は
//! 別々のキーとして書き込まれ、キーをまたいだトランザクションはありません。
//! 途中で失敗した場合の整合性は `RoomService::get_room_state` の自己修復に任せます。

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{
    GameState, Pista, Player, PlayerId, RoleMap, Room, RoomCode, RoomEvent, StoreError, VoteMap,
};

/// Room Store trait
///
/// UseCase 層はこの trait に依存し、Infrastructure 層の具体的な実装には依存しない。
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// ルームを書き込む
    async fn put_room(&self, room: &Room) -> Result<(), StoreError>;

    /// ルームを取得（期限切れなら None）
    async fn get_room(&self, code: &RoomCode) -> Result<Option<Room>, StoreError>;

    /// ルームと、そこから派生する全てのキーを削除
    async fn delete_room(&self, code: &RoomCode) -> Result<(), StoreError>;

    /// ルームキーが存在するか（派生キーだけが残っている場合は false）
    async fn room_exists(&self, code: &RoomCode) -> Result<bool, StoreError>;

    /// ルームの有効期限を設定（書き込みのたびに延長される）
    async fn set_expiry(&self, code: &RoomCode, ttl: Duration) -> Result<(), StoreError>;

    /// プレイヤーを書き込む
    async fn put_player(&self, code: &RoomCode, player: &Player) -> Result<(), StoreError>;

    /// プレイヤーを取得
    async fn get_player(
        &self,
        code: &RoomCode,
        player_id: &PlayerId,
    ) -> Result<Option<Player>, StoreError>;

    /// プレイヤーを削除
    async fn delete_player(&self, code: &RoomCode, player_id: &PlayerId)
    -> Result<(), StoreError>;

    /// メンバー集合に追加（既にいれば何もしない）
    async fn add_member(&self, code: &RoomCode, player_id: &PlayerId) -> Result<(), StoreError>;

    /// メンバー集合から削除
    async fn remove_member(&self, code: &RoomCode, player_id: &PlayerId)
    -> Result<(), StoreError>;

    /// メンバー集合を追加順で取得
    async fn list_members(&self, code: &RoomCode) -> Result<Vec<PlayerId>, StoreError>;

    /// ゲーム状態を書き込む
    async fn put_game_state(&self, code: &RoomCode, state: &GameState) -> Result<(), StoreError>;

    /// ゲーム状態を取得
    async fn get_game_state(&self, code: &RoomCode) -> Result<Option<GameState>, StoreError>;

    /// ゲーム状態・役割・ヒント・投票をまとめて削除
    async fn delete_game(&self, code: &RoomCode) -> Result<(), StoreError>;

    /// 役割を書き込む
    async fn put_roles(&self, code: &RoomCode, roles: &RoleMap) -> Result<(), StoreError>;

    /// 役割を取得
    async fn get_roles(&self, code: &RoomCode) -> Result<Option<RoleMap>, StoreError>;

    /// ヒントを追記
    async fn append_pista(&self, code: &RoomCode, pista: &Pista) -> Result<(), StoreError>;

    /// ヒントを追記順で取得
    async fn list_pistas(&self, code: &RoomCode) -> Result<Vec<Pista>, StoreError>;

    /// 投票を記録（同じ投票者は上書き）
    async fn put_vote(
        &self,
        code: &RoomCode,
        voter_id: &PlayerId,
        target_id: &PlayerId,
    ) -> Result<(), StoreError>;

    /// 投票を取得
    async fn get_votes(&self, code: &RoomCode) -> Result<VoteMap, StoreError>;

    /// 投票を全て削除
    async fn clear_votes(&self, code: &RoomCode) -> Result<(), StoreError>;

    /// 有効なルームのコード一覧
    async fn list_room_codes(&self) -> Result<Vec<RoomCode>, StoreError>;

    /// 期限切れのルームを削除し、削除したコードを返す
    async fn purge_expired(&self) -> Result<Vec<RoomCode>, StoreError>;

    /// ルームイベントを配信（fire-and-forget）
    fn publish(&self, event: RoomEvent);

    /// ルームイベントを購読
    fn subscribe(&self) -> broadcast::Receiver<RoomEvent>;
}
