use crate::config::CrawlerConfig;
use crate::url::domain::parse_with_host;
use crate::ConfigError;
use regex::Regex;

/// Compiles a pattern so that it only matches the whole input
///
/// `a\.test$` therefore matches `a.test` but not `www.a.test`, mirroring a
/// full-string regex match rather than a substring search.
pub fn compile_anchored(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(&format!("^(?:{})$", pattern)).map_err(|source| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Domain allow-list and URL exclude patterns, compiled once
///
/// The same filter is applied at admission time and when filtering links
/// discovered on a page.
#[derive(Debug, Clone, Default)]
pub struct DomainFilter {
    allowed_domains: Vec<Regex>,
    exclude_patterns: Vec<Regex>,
}

impl DomainFilter {
    /// Builds a filter from raw pattern strings
    pub fn new(allowed_domains: &[String], exclude_patterns: &[String]) -> Result<Self, ConfigError> {
        Ok(Self {
            allowed_domains: allowed_domains
                .iter()
                .map(|p| compile_anchored(p))
                .collect::<Result<_, _>>()?,
            exclude_patterns: exclude_patterns
                .iter()
                .map(|p| compile_anchored(p))
                .collect::<Result<_, _>>()?,
        })
    }

    pub fn from_config(config: &CrawlerConfig) -> Result<Self, ConfigError> {
        Self::new(&config.allowed_domains, &config.exclude_patterns)
    }

    /// True when no allow-list is configured or the host matches one entry
    pub fn host_allowed(&self, host: &str) -> bool {
        self.allowed_domains.is_empty() || self.allowed_domains.iter().any(|re| re.is_match(host))
    }

    /// True when the full URL matches any exclude pattern
    pub fn url_excluded(&self, url: &str) -> bool {
        self.exclude_patterns.iter().any(|re| re.is_match(url))
    }

    /// Combined check used for discovered links
    ///
    /// Links that cannot be parsed or have no host are never admitted.
    pub fn admits(&self, url: &str) -> bool {
        match parse_with_host(url) {
            Ok((_, host)) => self.host_allowed(&host) && !self.url_excluded(url),
            Err(_) => false,
        }
    }
}
