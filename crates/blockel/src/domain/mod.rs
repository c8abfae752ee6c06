//! Core domain types: the page model, selectors, rules, and errors.

pub mod dom;
pub mod errors;
pub mod model;
pub mod query;
