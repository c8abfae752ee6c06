pub mod app;
pub mod cli;
pub mod domain;
pub mod infra;
pub mod ui;

/// Install logging with `filter` as the fallback when `RUST_LOG` is unset.
pub fn init(filter: &str) {
    infra::logging::init(filter);
}
