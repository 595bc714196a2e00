//! State module for crawl work items and shared per-host state
//!
//! # Components
//!
//! - `CrawlRequest`: a unit of work carried through the frontier
//! - `PageContent` / `PageMetadata`: what a successful fetch produces
//! - `PolitenessTracker`: last fetch-start time per host

mod page_content;
mod politeness;
mod request;

// Re-export main types
pub use page_content::{content_hash, PageContent, PageMetadata};
pub use politeness::PolitenessTracker;
pub use request::CrawlRequest;
