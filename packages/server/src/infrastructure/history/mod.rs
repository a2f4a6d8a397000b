//! 履歴ストア・検索インデックスの実装
//!
//! - `inmemory`: プロセス内に保持する実装

pub mod inmemory;

pub use inmemory::{InMemoryGameHistory, InMemorySearchIndex};
