//! URL handling module for Ripple-Crawl
//!
//! This module provides host extraction and the domain/URL filters shared by
//! admission and link discovery.

mod domain;
mod matcher;

// Re-export main functions
pub use domain::{extract_domain, parse_with_host};
pub use matcher::{compile_anchored, DomainFilter};
