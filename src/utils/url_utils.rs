//! URL validation utilities shared by the cache key normalizer, the tool
//! registry's request validation, and the extraction pipeline.

/// Check whether a string is navigable by the browser kernel.
///
/// Rejects `javascript:`, `data:`, `mailto:`, `file:` and `chrome:` URLs and
/// anything whose scheme is not `http`/`https` (spec boundary case: navigate
/// to a non-HTTP URL must be rejected by request validation, not by the
/// browser).
#[must_use]
pub fn is_valid_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }

    let lower = url.to_ascii_lowercase();
    if lower.starts_with("data:")
        || lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("file:")
        || lower.starts_with("chrome:")
    {
        return false;
    }

    match url::Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_schemes() {
        assert!(!is_valid_url("javascript:alert(1)"));
        assert!(!is_valid_url("data:text/html,hi"));
        assert!(!is_valid_url("file:///etc/passwd"));
        assert!(!is_valid_url("chrome://settings"));
        assert!(!is_valid_url(""));
    }

    #[test]
    fn accepts_http_and_https() {
        assert!(is_valid_url("https://example.com"));
        assert!(is_valid_url("http://example.com/path?q=1"));
    }
}
