//! Realtime event dispatcher.
//!
//! Maps client events received over WebSocket onto the room and game services,
//! and fans the outcome out to the room's connections through the
//! `MessagePusher`. The HTTP handlers reuse the same `notify_*` methods so both
//! transports produce identical realtime traffic.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{
    domain::{
        GameState, MessagePusher, Phase, PistaText, PlayerId, RoomCode, RoomEvent, RoomMembership,
        RoomSnapshot, ValidationError,
    },
    infrastructure::dto::{
        conversion::{NewPlayer, NewRoom},
        game::GameStateDto,
        websocket::{ClientEvent, ServerEvent},
    },
    usecase::{
        GameError, GameService, LeaveOutcome, PhaseChange, PistaAdded, RoomService, StartedGame,
        VoteOutcome, role_views,
    },
};

#[derive(Debug, Error)]
enum DispatchError {
    #[error(transparent)]
    Game(#[from] GameError),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Join or create a room first")]
    NotInRoom,
}

impl From<ValidationError> for DispatchError {
    fn from(error: ValidationError) -> Self {
        Self::Game(error.into())
    }
}

impl DispatchError {
    fn kind(&self) -> &'static str {
        match self {
            Self::Game(error) => error.kind().as_str(),
            Self::InvalidEvent(_) => "validation",
            Self::NotInRoom => "state_conflict",
        }
    }
}

pub struct EventDispatcher {
    rooms: Arc<RoomService>,
    games: Arc<GameService>,
    pusher: Arc<dyn MessagePusher>,
}

impl EventDispatcher {
    pub fn new(
        rooms: Arc<RoomService>,
        games: Arc<GameService>,
        pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            rooms,
            games,
            pusher,
        }
    }

    /// Handle one text frame from a connection
    ///
    /// Failures are reported to that connection only, as an `error` event.
    pub async fn handle_text(&self, connection_id: &str, text: &str) {
        let result = match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => {
                tracing::debug!("Event '{}' from '{}'", event.name(), connection_id);
                self.dispatch(connection_id, event).await
            }
            Err(e) => Err(DispatchError::InvalidEvent(e.to_string())),
        };

        if let Err(e) = result {
            tracing::warn!("Rejected event from '{}': {}", connection_id, e);
            let event = ServerEvent::Error {
                error: e.kind().to_string(),
                message: e.to_string(),
            };
            self.send(connection_id, &event).await;
        }
    }

    /// Unregister a closed connection and leave its room on its behalf
    pub async fn disconnect(&self, connection_id: &str) {
        let Some(membership) = self.pusher.unregister_connection(connection_id).await else {
            return;
        };
        tracing::info!(
            "Connection '{}' closed, '{}' leaves room '{}'",
            connection_id,
            membership.player_id,
            membership.code
        );
        self.leave_for(&membership).await;
    }

    async fn dispatch(&self, connection_id: &str, event: ClientEvent) -> Result<(), DispatchError> {
        match event {
            ClientEvent::CreateRoom {
                player_id,
                player_name,
                rounds,
            } => {
                let input = NewRoom::parse(player_id, player_name, rounds)?;
                self.leave_current(connection_id).await;
                let snapshot = self
                    .rooms
                    .create_room(input.host_id.clone(), input.host_name, input.config)
                    .await?;
                let membership = RoomMembership {
                    code: snapshot.room.code.clone(),
                    player_id: input.host_id,
                };
                self.pusher.bind(connection_id, membership).await;
                let event = ServerEvent::RoomState {
                    room: (&snapshot).into(),
                };
                self.send(connection_id, &event).await;
            }
            ClientEvent::JoinRoom {
                code,
                player_id,
                player_name,
            } => {
                let code = self.rooms.parse_code(&code)?;
                let input = NewPlayer::parse(player_id, player_name)?;
                self.leave_current(connection_id).await;
                let snapshot = self
                    .rooms
                    .join_room(&code, input.id.clone(), input.name)
                    .await?;
                let membership = RoomMembership {
                    code,
                    player_id: input.id.clone(),
                };
                self.pusher.bind(connection_id, membership).await;
                self.notify_joined(&snapshot, &input.id).await;
            }
            ClientEvent::LeaveRoom => {
                let membership = self.membership(connection_id).await?;
                let outcome = self
                    .rooms
                    .leave_room(&membership.code, &membership.player_id)
                    .await?;
                self.pusher.unbind(connection_id).await;
                self.notify_left(&membership.code, &membership.player_id, &outcome)
                    .await;
            }
            ClientEvent::StartGame => {
                let membership = self.membership(connection_id).await?;
                let started = self
                    .games
                    .start_game(&membership.code, &membership.player_id)
                    .await?;
                self.notify_started(&started).await;
            }
            ClientEvent::ChangePhase { phase } => {
                let membership = self.membership(connection_id).await?;
                let change = self
                    .games
                    .change_phase(&membership.code, phase, &membership.player_id)
                    .await?;
                self.notify_phase(&change).await;
            }
            ClientEvent::SubmitPista { text } => {
                let membership = self.membership(connection_id).await?;
                let text = PistaText::new(text)?;
                let added = self
                    .games
                    .add_pista(&membership.code, &membership.player_id, text)
                    .await?;
                self.notify_pista(&membership.code, &added).await;
            }
            ClientEvent::SubmitVote { target_id } => {
                let membership = self.membership(connection_id).await?;
                let target_id = PlayerId::new(target_id)?;
                let outcome = self
                    .games
                    .add_vote(&membership.code, &membership.player_id, &target_id)
                    .await?;
                self.notify_vote(&membership.code, &membership.player_id, &outcome)
                    .await;
            }
            ClientEvent::NextRound => {
                let membership = self.membership(connection_id).await?;
                let state = self
                    .games
                    .next_round(&membership.code, &membership.player_id)
                    .await?;
                self.notify_round(&membership.code, &state).await;
            }
            ClientEvent::ResetGame => {
                let membership = self.membership(connection_id).await?;
                let snapshot = self
                    .games
                    .reset_game(&membership.code, &membership.player_id)
                    .await?;
                self.notify_reset(&snapshot).await;
            }
            ClientEvent::GetRoomState => {
                let membership = self.membership(connection_id).await?;
                let snapshot = self.rooms.get_room_state(&membership.code).await?;
                let event = ServerEvent::RoomState {
                    room: (&snapshot).into(),
                };
                self.send(connection_id, &event).await;
            }
            ClientEvent::GetVotingResults => {
                let membership = self.membership(connection_id).await?;
                let results = self.games.get_voting_results(&membership.code).await?;
                let event = ServerEvent::VotingResults {
                    results: results.into(),
                };
                self.send(connection_id, &event).await;
            }
        }
        Ok(())
    }

    async fn membership(&self, connection_id: &str) -> Result<RoomMembership, DispatchError> {
        self.pusher
            .membership(connection_id)
            .await
            .ok_or(DispatchError::NotInRoom)
    }

    /// Leave the room this connection is currently bound to, if any
    async fn leave_current(&self, connection_id: &str) {
        if let Some(membership) = self.pusher.unbind(connection_id).await {
            self.leave_for(&membership).await;
        }
    }

    async fn leave_for(&self, membership: &RoomMembership) {
        match self
            .rooms
            .leave_room(&membership.code, &membership.player_id)
            .await
        {
            Ok(outcome) => {
                self.notify_left(&membership.code, &membership.player_id, &outcome)
                    .await
            }
            Err(e) => tracing::warn!(
                "Implicit leave of '{}' from room '{}' failed: {}",
                membership.player_id,
                membership.code,
                e
            ),
        }
    }

    // ========================================
    // Fan-out
    // ========================================

    pub async fn notify_joined(&self, snapshot: &RoomSnapshot, player_id: &PlayerId) {
        let code = &snapshot.room.code;
        if let Some(player) = snapshot.players.iter().find(|p| &p.id == player_id) {
            let event = ServerEvent::PlayerJoined {
                player: player.into(),
            };
            self.broadcast(code, &event).await;
        }
        self.broadcast_room_state(snapshot).await;
    }

    pub async fn notify_left(&self, code: &RoomCode, player_id: &PlayerId, outcome: &LeaveOutcome) {
        match outcome {
            LeaveOutcome::Left { snapshot, new_host } => {
                let event = ServerEvent::PlayerLeft {
                    player_id: player_id.to_string(),
                    new_host_id: new_host.as_ref().map(|id| id.to_string()),
                };
                self.broadcast(code, &event).await;
                self.broadcast_room_state(snapshot).await;
            }
            LeaveOutcome::RoomDeleted => self.notify_deleted(code).await,
        }
    }

    /// Tell everyone in the room it is gone, then drop their bindings
    pub async fn notify_deleted(&self, code: &RoomCode) {
        let event = ServerEvent::RoomDeleted {
            code: code.to_string(),
        };
        self.broadcast(code, &event).await;
        self.pusher.unbind_room(code).await;
    }

    pub async fn notify_started(&self, started: &StartedGame) {
        let snapshot = &started.snapshot;
        let code = &snapshot.room.code;
        let event = ServerEvent::GameStarted {
            room: snapshot.into(),
        };
        self.broadcast(code, &event).await;

        if let Some(state) = &snapshot.game_state {
            for view in role_views(&started.roles, &state.secret_word) {
                let player_id = view.player_id.clone();
                let event = ServerEvent::RoleAssigned { role: view.into() };
                let json = match event.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!("Failed to serialize role for '{}': {}", player_id, e);
                        continue;
                    }
                };
                if let Err(e) = self.pusher.push_to_player(code, &player_id, &json).await {
                    tracing::debug!("Role for '{}' not delivered: {}", player_id, e);
                }
            }
        }

        let event = ServerEvent::PhaseChanged {
            phase: snapshot.room.status,
        };
        self.broadcast(code, &event).await;
    }

    pub async fn notify_phase(&self, change: &PhaseChange) {
        let code = &change.snapshot.room.code;
        let event = match change.snapshot.room.status {
            Phase::Lobby => ServerEvent::GameReset,
            phase => ServerEvent::PhaseChanged { phase },
        };
        self.broadcast(code, &event).await;
        if let Some(results) = &change.results {
            let event = ServerEvent::VotingResults {
                results: results.clone().into(),
            };
            self.broadcast(code, &event).await;
        }
        self.broadcast_room_state(&change.snapshot).await;
    }

    pub async fn notify_pista(&self, code: &RoomCode, added: &PistaAdded) {
        let next = GameStateDto::from(&added.state).current_player_id;
        let event = ServerEvent::PistaAdded {
            pista: (&added.pista).into(),
            next_player_id: next,
            current_turn: added.state.current_turn,
        };
        self.broadcast(code, &event).await;
    }

    pub async fn notify_vote(&self, code: &RoomCode, voter_id: &PlayerId, outcome: &VoteOutcome) {
        let event = ServerEvent::VoteRecorded {
            voter_id: voter_id.to_string(),
            votes_cast: outcome.votes_cast,
            total_voters: outcome.state.turn_order.len(),
        };
        self.broadcast(code, &event).await;

        if let Some(results) = &outcome.results {
            let event = ServerEvent::PhaseChanged {
                phase: Phase::Results,
            };
            self.broadcast(code, &event).await;
            let event = ServerEvent::VotingResults {
                results: results.clone().into(),
            };
            self.broadcast(code, &event).await;
        }
    }

    pub async fn notify_round(&self, code: &RoomCode, state: &GameState) {
        let event = ServerEvent::RoundStarted {
            round: state.current_round,
        };
        self.broadcast(code, &event).await;
        let event = ServerEvent::PhaseChanged { phase: state.phase };
        self.broadcast(code, &event).await;
        self.refresh_room_state(code).await;
    }

    pub async fn notify_reset(&self, snapshot: &RoomSnapshot) {
        self.broadcast(&snapshot.room.code, &ServerEvent::GameReset)
            .await;
        self.broadcast_room_state(snapshot).await;
    }

    pub async fn broadcast_room_state(&self, snapshot: &RoomSnapshot) {
        let event = ServerEvent::RoomState {
            room: snapshot.into(),
        };
        self.broadcast(&snapshot.room.code, &event).await;
    }

    /// Re-read the room and broadcast it, for outcomes that carry no snapshot
    pub async fn refresh_room_state(&self, code: &RoomCode) {
        match self.rooms.get_room_state(code).await {
            Ok(snapshot) => self.broadcast_room_state(&snapshot).await,
            Err(e) => tracing::warn!("Failed to refresh state of room '{}': {}", code, e),
        }
    }

    /// Forward store events that no request produced (room expiry) to clients
    pub async fn relay_store_events(self: Arc<Self>, mut events: broadcast::Receiver<RoomEvent>) {
        loop {
            match events.recv().await {
                Ok(RoomEvent::Expired { code }) => self.notify_deleted(&code).await,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Room event relay lagged, skipped {} event(s)", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!("Room event relay stopped");
    }

    async fn broadcast(&self, code: &RoomCode, event: &ServerEvent) {
        match event.to_json() {
            Ok(json) => {
                self.pusher.broadcast_to_room(code, &json).await;
            }
            Err(e) => tracing::error!("Failed to serialize event for room '{}': {}", code, e),
        }
    }

    async fn send(&self, connection_id: &str, event: &ServerEvent) {
        let json = match event.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize event for '{}': {}", connection_id, e);
                return;
            }
        };
        if let Err(e) = self.pusher.push_to(connection_id, &json).await {
            tracing::debug!("Event not delivered to '{}': {}", connection_id, e);
        }
    }
}
