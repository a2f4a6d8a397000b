//! UseCase layer
//!
//! ルームのライフサイクル（`RoomService`）とゲーム進行（`GameService`）。
//! どちらもルーム単位のロック（`RoomLocks`）を共有し、同じルームへの変更を直列化する。

mod common;
pub mod error;
pub mod game_service;
pub mod history_handoff;
pub mod room_lock;
pub mod room_service;

pub use error::{ErrorKind, GameError};
pub use game_service::{
    GameService, PhaseChange, PistaAdded, PlayerRoleView, StartedGame, VoteOutcome, role_views,
};
pub use history_handoff::{FinishedGame, HistoryHandoff};
pub use room_lock::RoomLocks;
pub use room_service::{LeaveOutcome, RoomService};
