//! Impostor game server.
//!
//! Serves the room/game HTTP API and the realtime WebSocket endpoint.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin impostor-server
//! cargo run --bin impostor-server -- --host 0.0.0.0 --port 3000 --max-players 8
//! ```

use std::sync::Arc;

use clap::Parser;
use impostor_server::{
    config::{Args, ServerConfig},
    domain::{RoomStore, ThreadRandom},
    infrastructure::{
        history::{InMemoryGameHistory, InMemorySearchIndex},
        message_pusher::WebSocketMessagePusher,
        repository::InMemoryRoomStore,
    },
    ui::{AppState, EventDispatcher, Server},
    usecase::{GameService, HistoryHandoff, RoomLocks, RoomService},
};
use impostor_shared::{logger::setup_logger, time::SystemClock};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    let config = match ServerConfig::try_from(args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize dependencies in order:
    // 1. Collaborators (clock, random, store, history, search)
    // 2. UseCases
    // 3. MessagePusher and dispatcher
    // 4. Server

    // 1. Collaborators
    let clock = Arc::new(SystemClock);
    let random = Arc::new(ThreadRandom);
    let store = Arc::new(InMemoryRoomStore::new(clock.clone()));
    let room_events = store.subscribe();
    let history = Arc::new(InMemoryGameHistory::new());
    let search = Arc::new(InMemorySearchIndex::new());

    // 2. UseCases
    let locks = Arc::new(RoomLocks::new());
    let handoff = Arc::new(HistoryHandoff::new(history.clone(), search.clone()));
    let room_service = Arc::new(RoomService::new(
        store.clone(),
        locks.clone(),
        random.clone(),
        clock.clone(),
        config.game,
    ));
    let game_service = Arc::new(GameService::new(
        store,
        locks,
        random,
        clock,
        handoff,
        config.game,
    ));

    // 3. MessagePusher (WebSocket implementation) and dispatcher
    let message_pusher = Arc::new(WebSocketMessagePusher::new());
    let dispatcher = Arc::new(EventDispatcher::new(
        room_service.clone(),
        game_service.clone(),
        message_pusher.clone(),
    ));

    // 4. Create and run the server
    let state = AppState {
        room_service,
        game_service,
        history,
        search,
        message_pusher,
        dispatcher,
    };
    let server = Server::new(state, room_events, config.sweep_interval);
    if let Err(e) = server.run(&config.host, config.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
