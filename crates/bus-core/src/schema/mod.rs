//! Canonical on-disk data types.

pub mod entities;
pub mod message;

pub use entities::{
    CronEntry, CronHistoryEntry, ProcEntry, ProcStatus, SessionMeta, SpawnEntry, SpawnStatus,
    Subscription,
};
pub use message::{Message, MessageType};
