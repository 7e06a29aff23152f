//! Integration tests: orchestrator over real backends and app wiring.

mod app_context;
mod dictionary_reload;
mod sqlite_search;
