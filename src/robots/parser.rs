//! Robots.txt parser implementation
//!
//! Only `Disallow` lines inside `User-agent: *` groups are collected. `Allow`,
//! `Crawl-delay`, `Sitemap` and agent-specific groups are ignored.

/// Disallow rules that apply to the wildcard user agent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsRules {
    disallowed_paths: Vec<String>,
}

impl RobotsRules {
    /// Parses raw robots.txt content
    ///
    /// A `User-agent` line opens or closes a relevant group depending on
    /// whether its value is exactly `*`. Anything unrecognised is skipped, so
    /// malformed content degrades to fewer (or no) rules rather than an error.
    ///
    /// # Example
    ///
    /// ```
    /// use ripple_crawl::robots::RobotsRules;
    ///
    /// let rules = RobotsRules::parse("User-agent: *\nDisallow: /private/");
    /// assert!(!rules.is_allowed("https://a.test/private/page"));
    /// assert!(rules.is_allowed("https://a.test/public/page"));
    /// ```
    pub fn parse(content: &str) -> Self {
        let mut disallowed_paths = Vec::new();
        let mut relevant_group = false;

        for line in content.lines() {
            // Strip trailing comments
            let line = match line.find('#') {
                Some(idx) => &line[..idx],
                None => line,
            }
            .trim();

            if line.is_empty() {
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_lowercase().as_str() {
                "user-agent" => relevant_group = value == "*",
                "disallow" if relevant_group && !value.is_empty() => {
                    disallowed_paths.push(value.to_string());
                }
                _ => {}
            }
        }

        Self { disallowed_paths }
    }

    /// Rules that allow everything; used when robots.txt is unavailable
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Disallowed paths in file order
    pub fn disallowed_paths(&self) -> &[String] {
        &self.disallowed_paths
    }

    /// True iff no disallowed path occurs anywhere in the URL
    ///
    /// This is a substring test on the full URL, not a prefix test on the
    /// path: `/private/` also blocks `https://a.test/x?next=/private/`.
    pub fn is_allowed(&self, url: &str) -> bool {
        !self
            .disallowed_paths
            .iter()
            .any(|path| url.contains(path.as_str()))
    }

    /// The first disallowed path found in the URL, if any
    pub fn blocking_rule(&self, url: &str) -> Option<&str> {
        self.disallowed_paths
            .iter()
            .find(|path| url.contains(path.as_str()))
            .map(String::as_str)
    }
}
