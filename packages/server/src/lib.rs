//! Room and game session engine for the Impostor party game.
//!
//! Players gather in rooms identified by short codes; the host starts a game in
//! which every player but one (the impostor) learns a secret word. Players give
//! clues in turn, vote on who the impostor is, and finished games are handed off
//! to a history store and search index.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
