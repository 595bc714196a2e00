//! Crawler module for admission, fetching and batch orchestration
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching behind the `Fetcher` trait
//! - HTML link extraction
//! - Admission decisions and delayed retries
//! - The fetch-and-discover pipeline
//! - Overall crawl coordination

mod coordinator;
mod decision;
mod fetcher;
mod parser;
mod pipeline;
mod scheduler;

#[cfg(test)]
pub(crate) mod test_support;

pub use coordinator::{Coordinator, CoordinatorState, CoordinatorStatus};
pub use decision::{decide, AdmissionContext, AdmissionPolicy, Decision};
pub use fetcher::{build_http_client, FetchedPage, Fetcher, HttpFetcher};
pub use parser::extract_links;
pub use pipeline::{Pipeline, PipelineOutcome};
pub use scheduler::RetryScheduler;
