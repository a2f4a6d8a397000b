//! Shared application state.

use std::sync::Arc;

use crate::{
    domain::{GameHistory, MessagePusher, SearchIndex},
    usecase::{GameService, RoomService},
};

use super::dispatcher::EventDispatcher;

/// State handed to every handler
pub struct AppState {
    /// RoomService（ルームのライフサイクル）
    pub room_service: Arc<RoomService>,
    /// GameService（ゲーム進行）
    pub game_service: Arc<GameService>,
    /// GameHistory（終了したゲームの記録）
    pub history: Arc<dyn GameHistory>,
    /// SearchIndex（ゲーム記録の検索）
    pub search: Arc<dyn SearchIndex>,
    /// MessagePusher（接続への送信）
    pub message_pusher: Arc<dyn MessagePusher>,
    /// EventDispatcher（リアルタイムイベントの振り分けと通知）
    pub dispatcher: Arc<EventDispatcher>,
}
