//! HTTP and WebSocket handlers.

mod http;
mod websocket;

pub use http::{
    add_pista, add_vote, change_phase, create_room, delete_room, get_game_record, get_room,
    health_check, join_room, leave_room, list_pistas, list_rooms, next_round, player_role,
    reset_game, search_games, start_game, voting_results,
};
pub use websocket::websocket_handler;
