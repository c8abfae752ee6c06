//! Infrastructure adapters for config and logging.

pub mod config;
pub mod logging;
