//! Remote entity store access
//!
//! Wraps the AWX / Tower REST API behind a transport seam, with a per-run
//! cache for fetches and searches.

pub mod cache;
pub mod client;
pub mod query;
pub mod transport;

#[cfg(test)]
pub mod testing;

pub use cache::RunCache;
pub use client::{CreateOutcome, StoreClient};
pub use transport::HttpResponse;
