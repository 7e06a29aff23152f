//! tender-search: keyword expansion and ranked full-text search over
//! procurement records.
//!
//! The library entry point is [`search::SearchOrchestrator`]; the `tsearch`
//! binary wraps it in a CLI.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod expansion;
pub mod search;
pub mod test_utils;

pub use error::{Result, SearchError};
