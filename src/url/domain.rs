use crate::{UrlError, UrlResult};
use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host (e.g. `data:` or `mailto:` URLs), it returns None.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use ripple_crawl::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("mailto:someone@example.com").unwrap();
/// assert_eq!(extract_domain(&url), None);
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Parses a URL string and returns it together with its host
///
/// Fails when the string is not a valid absolute URL or carries no host.
pub fn parse_with_host(raw: &str) -> UrlResult<(Url, String)> {
    let url = Url::parse(raw)?;
    let host = extract_domain(&url).ok_or_else(|| UrlError::MissingHost(raw.to_string()))?;
    Ok((url, host))
}
