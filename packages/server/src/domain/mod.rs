//! Domain layer
//!
//! エンティティ・値オブジェクト・ドメインロジック、
//! および協調者（ストア・通知・履歴・検索・乱数）のインターフェース。

pub mod entity;
pub mod error;
pub mod history;
pub mod message_pusher;
pub mod random;
pub mod repository;
pub mod turn;
pub mod value_object;
pub mod voting;
pub mod words;

pub use entity::{
    GameState, Phase, Pista, Player, Role, RoleMap, Room, RoomEvent, RoomSnapshot, VoteMap,
};
pub use error::{HistoryError, MessagePushError, SearchIndexError, StoreError, ValidationError};
pub use history::{
    GameDocument, GameHistory, GameRecord, PistaRecord, PlayerRecord, SearchIndex, UserDocument,
    VoteRecord,
};
pub use message_pusher::{ConnectionId, MessagePusher, PusherChannel, RoomMembership};
pub use random::{RandomSource, SequenceRandom, ThreadRandom};
pub use repository::RoomStore;
pub use value_object::{
    PistaText, PlayerId, PlayerName, RoomCode, RoomCodeFactory, RoomConfig, Timestamp,
};
pub use voting::{VotingResults, Winner};
