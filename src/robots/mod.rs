//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching robots.txt files.
//! Matching is a plain substring test of each disallowed path against the full URL.

mod cache;
mod parser;

pub use cache::RobotsCache;
pub use parser::RobotsRules;
