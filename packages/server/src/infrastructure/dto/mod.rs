//! Data Transfer Objects (DTOs) for the game server.
//!
//! DTOs are organized by protocol:
//! - `websocket`: realtime events exchanged over `/ws`
//! - `http`: HTTP API request and response bodies
//! - `game`: views shared by both protocols

pub mod conversion;
pub mod game;
pub mod http;
pub mod websocket;
