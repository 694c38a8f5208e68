//! Relevance search over Human Interface Guidelines sections, with a
//! resilient fresh/stale cache in front of the upstream content origin.

pub mod app_state;
pub mod config;
pub mod domain;
pub mod factory;
pub mod router;

mod routes;

pub use app_state::AppState;
