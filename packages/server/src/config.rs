//! Server configuration.
//!
//! Command-line flags with `IMPOSTOR_*` environment fallbacks, validated into
//! [`ServerConfig`] (transport) and [`GameConfig`] (room/game rules).

use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::domain::value_object::DEFAULT_ROOM_CODE_LENGTH;

pub const DEFAULT_MAX_PLAYERS: usize = 10;
pub const DEFAULT_MIN_PLAYERS: usize = 3;
pub const DEFAULT_ROOM_TTL_SECS: u64 = 7200;
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
pub const MAX_CODE_ATTEMPTS: usize = 10;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Room code length must be between 4 and 12, got {0}")]
    InvalidCodeLength(usize),

    #[error("Minimum players ({min}) must be at least 2 and not exceed maximum players ({max})")]
    InvalidPlayerBounds { min: usize, max: usize },

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

#[derive(Parser, Debug, Clone)]
#[command(name = "impostor-server")]
#[command(about = "Room and game session server for the Impostor party game", long_about = None)]
pub struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "IMPOSTOR_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "IMPOSTOR_PORT", default_value = "8080")]
    pub port: u16,

    /// Length of generated room codes
    #[arg(long, env = "IMPOSTOR_CODE_LENGTH", default_value_t = DEFAULT_ROOM_CODE_LENGTH)]
    pub code_length: usize,

    /// Maximum number of players per room
    #[arg(long, env = "IMPOSTOR_MAX_PLAYERS", default_value_t = DEFAULT_MAX_PLAYERS)]
    pub max_players: usize,

    /// Minimum number of players required to start a game
    #[arg(long, env = "IMPOSTOR_MIN_PLAYERS", default_value_t = DEFAULT_MIN_PLAYERS)]
    pub min_players: usize,

    /// Idle time before a room expires, in seconds
    #[arg(long, env = "IMPOSTOR_ROOM_TTL_SECS", default_value_t = DEFAULT_ROOM_TTL_SECS)]
    pub room_ttl_secs: u64,

    /// Upper bound for a single room operation, in milliseconds
    #[arg(long, env = "IMPOSTOR_STORE_TIMEOUT_MS", default_value_t = DEFAULT_STORE_TIMEOUT_MS)]
    pub store_timeout_ms: u64,

    /// Interval between expired-room sweeps, in seconds
    #[arg(long, env = "IMPOSTOR_SWEEP_INTERVAL_SECS", default_value_t = DEFAULT_SWEEP_INTERVAL_SECS)]
    pub sweep_interval_secs: u64,

    /// Default log level when RUST_LOG is not set
    #[arg(long, env = "IMPOSTOR_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Room and game rules shared by the services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameConfig {
    pub code_length: usize,
    pub max_players: usize,
    pub min_players: usize,
    pub room_ttl: Duration,
    pub store_timeout: Duration,
    pub max_code_attempts: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            code_length: DEFAULT_ROOM_CODE_LENGTH,
            max_players: DEFAULT_MAX_PLAYERS,
            min_players: DEFAULT_MIN_PLAYERS,
            room_ttl: Duration::from_secs(DEFAULT_ROOM_TTL_SECS),
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            max_code_attempts: MAX_CODE_ATTEMPTS,
        }
    }
}

impl GameConfig {
    pub fn validate(self) -> Result<Self, ConfigError> {
        if !(4..=12).contains(&self.code_length) {
            return Err(ConfigError::InvalidCodeLength(self.code_length));
        }
        if self.min_players < 2 || self.min_players > self.max_players {
            return Err(ConfigError::InvalidPlayerBounds {
                min: self.min_players,
                max: self.max_players,
            });
        }
        if self.room_ttl.is_zero() {
            return Err(ConfigError::ZeroDuration("Room TTL"));
        }
        if self.store_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("Store timeout"));
        }
        Ok(self)
    }
}

/// Everything the binary needs to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub sweep_interval: Duration,
    pub log_level: String,
    pub game: GameConfig,
}

impl TryFrom<Args> for ServerConfig {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let game = GameConfig {
            code_length: args.code_length,
            max_players: args.max_players,
            min_players: args.min_players,
            room_ttl: Duration::from_secs(args.room_ttl_secs),
            store_timeout: Duration::from_millis(args.store_timeout_ms),
            max_code_attempts: MAX_CODE_ATTEMPTS,
        }
        .validate()?;
        if args.sweep_interval_secs == 0 {
            return Err(ConfigError::ZeroDuration("Sweep interval"));
        }

        Ok(Self {
            host: args.host,
            port: args.port,
            sweep_interval: Duration::from_secs(args.sweep_interval_secs),
            log_level: args.log_level,
            game,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["impostor-server"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        // テスト項目: 引数なしで既定値の設定になる
        // given (前提条件):
        let args = parse(&[]);

        // when (操作):
        let config = ServerConfig::try_from(args).unwrap();

        // then (期待する結果):
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.game, GameConfig::default());
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_flags_override_defaults() {
        // テスト項目: フラグで値を上書きできる
        // given (前提条件):
        let args = parse(&[
            "--port",
            "9000",
            "--max-players",
            "5",
            "--room-ttl-secs",
            "30",
        ]);

        // when (操作):
        let config = ServerConfig::try_from(args).unwrap();

        // then (期待する結果):
        assert_eq!(config.port, 9000);
        assert_eq!(config.game.max_players, 5);
        assert_eq!(config.game.room_ttl, Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_inconsistent_player_bounds() {
        // テスト項目: 最小人数が最大人数を超える設定は拒否される
        // given (前提条件):
        let args = parse(&["--min-players", "6", "--max-players", "4"]);

        // when (操作):
        let result = ServerConfig::try_from(args);

        // then (期待する結果):
        assert_eq!(
            result,
            Err(ConfigError::InvalidPlayerBounds { min: 6, max: 4 })
        );
    }

    #[test]
    fn test_rejects_zero_timeout() {
        // テスト項目: タイムアウト 0 は拒否される
        // given (前提条件):
        let config = GameConfig {
            store_timeout: Duration::ZERO,
            ..GameConfig::default()
        };

        // when (操作):
        let result = config.validate();

        // then (期待する結果):
        assert_eq!(result, Err(ConfigError::ZeroDuration("Store timeout")));
    }
}
