//! Ingestion - fetching sections from sources and keeping the index current.
//!
//! - [`SectionSource`] - Raw sections from disk ([`FileSectionSource`]) or a
//!   cached remote feed ([`FeedSectionSource`])
//! - [`SectionIndexer`] - Normalizes and upserts sections into the store
//! - [`run_index_worker`] - Periodic re-sync plus snapshot persistence

mod index_worker;
mod indexer;
mod source;

pub use index_worker::run_index_worker;
pub use indexer::{normalize_section, IndexStats, SectionIndexer};
pub use source::{FeedSectionSource, FileSectionSource, SectionSource};
