//! Application layer orchestrating domain logic and infrastructure.

pub mod channel;
pub mod content;
pub mod coordinator;
pub mod injector;
pub mod messages;
pub mod picker;
pub mod rules;
pub mod storage;
pub mod synthesize;
