//! Server execution logic.

use std::{future::Future, sync::Arc, time::Duration};

use axum::{
    Router,
    routing::{get, post},
};
use tokio::{net::TcpListener, sync::broadcast, task::JoinHandle};
use tower_http::trace::TraceLayer;

use crate::{domain::RoomEvent, usecase::RoomService};

use super::{
    handler::{
        add_pista, add_vote, change_phase, create_room, delete_room, get_game_record, get_room,
        health_check, join_room, leave_room, list_pistas, list_rooms, next_round, player_role,
        reset_game, search_games, start_game, voting_results, websocket_handler,
    },
    signal::shutdown_signal,
    state::AppState,
};

/// Build the HTTP and WebSocket routes
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // WebSocket エンドポイント
        .route("/ws", get(websocket_handler))
        // HTTP エンドポイント
        .route("/api/health", get(health_check))
        .route("/api/rooms", get(list_rooms).post(create_room))
        .route("/api/rooms/{code}", get(get_room).delete(delete_room))
        .route("/api/rooms/{code}/join", post(join_room))
        .route("/api/rooms/{code}/leave", post(leave_room))
        .route("/api/rooms/{code}/start", post(start_game))
        .route("/api/rooms/{code}/pistas", get(list_pistas).post(add_pista))
        .route("/api/rooms/{code}/votes", post(add_vote))
        .route("/api/rooms/{code}/phase", post(change_phase))
        .route("/api/rooms/{code}/next-round", post(next_round))
        .route("/api/rooms/{code}/reset", post(reset_game))
        .route("/api/rooms/{code}/results", get(voting_results))
        .route(
            "/api/rooms/{code}/players/{player_id}/role",
            get(player_role),
        )
        .route("/api/games", get(search_games))
        .route("/api/games/{id}", get(get_game_record))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Game server
///
/// Serves the routes and runs two background tasks for its lifetime: the
/// expiry sweeper and the relay of store events to connected clients.
///
/// # Example
///
/// ```ignore
/// let server = Server::new(state, store.subscribe(), Duration::from_secs(60));
/// server.run("127.0.0.1", 8080).await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
    room_events: broadcast::Receiver<RoomEvent>,
    sweep_interval: Duration,
}

impl Server {
    pub fn new(
        state: AppState,
        room_events: broadcast::Receiver<RoomEvent>,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            state: Arc::new(state),
            room_events,
            sweep_interval,
        }
    }

    /// Bind to `host:port` and serve until Ctrl+C or SIGTERM
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: &str, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("Game server listening on {}", listener.local_addr()?);
        tracing::info!("Connect to: ws://{}/ws", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await?;
        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let sweeper = spawn_sweeper(self.state.room_service.clone(), self.sweep_interval);
        let relay = tokio::spawn(
            self.state
                .dispatcher
                .clone()
                .relay_store_events(self.room_events),
        );

        let result = axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown)
            .await;

        sweeper.abort();
        relay.abort();
        result
    }
}

/// Purge expired rooms every `period`
fn spawn_sweeper(rooms: Arc<RoomService>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match rooms.purge_expired().await {
                Ok(purged) if !purged.is_empty() => {
                    tracing::info!("Purged {} expired room(s)", purged.len());
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Expiry sweep failed: {}", e),
            }
        }
    })
}
