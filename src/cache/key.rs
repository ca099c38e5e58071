//! Cache key normalizer: stable identity from (URL, selector, context).
//!
//! Grounded on `utils::url_utils` for the URL-validity boundary and on
//! `original_source/.../cache_service.py::_make_url_key` for the exact
//! tracking-parameter and param-sensitive-host lists.

use sha2::{Digest, Sha256};
use url::Url;

/// Tracking parameters dropped during normalization unless the host is
/// param-sensitive.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "msclkid",
    "dclid",
    "ref",
    "referrer",
    "source",
    "_ga",
    "_gid",
    "_gac",
    "timestamp",
    "ts",
    "t",
    "session",
    "sessionid",
    "sid",
];

/// Hosts where query parameters are part of content identity (video hosts,
/// marketplaces, code hosts) and must never be stripped.
const PARAM_SENSITIVE_HOSTS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "vimeo.com",
    "amazon.com",
    "ebay.com",
    "github.com",
    "gitlab.com",
];

fn is_tracking_param(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    TRACKING_PARAMS.contains(&lower.as_str()) || lower.starts_with("utm_")
}

fn is_param_sensitive_host(host: &str) -> bool {
    PARAM_SENSITIVE_HOSTS
        .iter()
        .any(|suffix| host == *suffix || host.ends_with(&format!(".{suffix}")))
}

/// Normalize a URL per the spec §4.1 contract: scheme defaulting, host/scheme
/// lowercasing, default-port stripping, path slash collapsing, fragment
/// removal, tracking-parameter stripping (unless param-sensitive host), and
/// sorted-parameter re-encoding.
#[must_use]
pub fn normalize_url(raw: &str) -> String {
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };

    let Ok(mut url) = Url::parse(&with_scheme) else {
        return raw.trim().to_ascii_lowercase();
    };

    url.set_fragment(None);

    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let _ = url.set_host(Some(&host));

    match (url.scheme(), url.port()) {
        ("http", Some(80)) | ("https", Some(443)) => {
            let _ = url.set_port(None);
        }
        _ => {}
    }

    let collapsed_path = {
        let mut out = String::with_capacity(url.path().len());
        let mut prev_slash = false;
        for ch in url.path().chars() {
            if ch == '/' {
                if prev_slash {
                    continue;
                }
                prev_slash = true;
            } else {
                prev_slash = false;
            }
            out.push(ch);
        }
        if out.len() > 1 && out.ends_with('/') {
            out.pop();
        }
        out
    };
    url.set_path(&collapsed_path);

    if url.query().is_some() {
        let sensitive = is_param_sensitive_host(&host);
        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| sensitive || !is_tracking_param(k))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        if pairs.is_empty() {
            url.set_query(None);
        } else {
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            for (k, v) in &pairs {
                serializer.append_pair(k, v);
            }
            url.set_query(Some(&serializer.finish()));
        }
    }

    url.to_string()
}

/// Normalize a selector: trim, lowercase, unquote attribute values that work
/// unquoted, sort comma-separated lists.
#[must_use]
pub fn normalize_selector(selector: &str) -> String {
    let trimmed = selector.trim().to_ascii_lowercase();
    if trimmed.is_empty() {
        return trimmed;
    }

    let mut parts: Vec<String> = trimmed
        .split(',')
        .map(|part| unquote_attribute_values(part.trim()))
        .collect();
    parts.sort();
    parts.join(",")
}

/// Strip quotes around attribute values that would still parse unquoted,
/// e.g. `[data-testid="result"]` -> `[data-testid=result]`.
fn unquote_attribute_values(selector: &str) -> String {
    let mut out = String::with_capacity(selector.len());
    let mut chars = selector.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '=' && matches!(chars.peek(), Some('"') | Some('\'')) {
            out.push('=');
            let quote = chars.next().unwrap();
            let mut value = String::new();
            for inner in chars.by_ref() {
                if inner == quote {
                    break;
                }
                value.push(inner);
            }
            let unquotable = !value.is_empty()
                && value
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if unquotable {
                out.push_str(&value);
            } else {
                out.push(quote);
                out.push_str(&value);
                out.push(quote);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn sanitized_domain(url: &str) -> String {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string());
    let mut sanitized: String = host.chars().map(|c| if c == '.' || c == ':' { '_' } else { c }).collect();
    sanitized.truncate(30);
    sanitized
}

/// Build the final cache key: `<namespace>:<sanitized-domain>:<16-hex-sha256>`.
#[must_use]
pub fn make_cache_key(namespace: &str, url: &str, selector: Option<&str>, context: &str) -> String {
    let normalized_url = normalize_url(url);
    let normalized_selector = selector.map(normalize_selector).unwrap_or_default();
    let domain = sanitized_domain(&normalized_url);

    let mut hasher = Sha256::new();
    hasher.update(normalized_url.as_bytes());
    hasher.update(b"|");
    hasher.update(normalized_selector.as_bytes());
    hasher.update(b"|");
    hasher.update(context.as_bytes());
    let digest = hasher.finalize();
    let hex = hex::encode(digest);
    let short_hash = &hex[..16];

    format!("{namespace}:{domain}:{short_hash}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tracking_params_and_normalizes_host_case() {
        let a = normalize_url("https://Example.com:443/foo/?utm_source=x&b=2&a=1");
        let b = normalize_url("https://example.com/foo?b=2&a=1");
        assert_eq!(a, b);
    }

    #[test]
    fn key_determinism_across_variants() {
        let k1 = make_cache_key("page", "https://Example.com:443/foo/?utm_source=x#frag", None, "");
        let k2 = make_cache_key("page", "https://example.com/foo/", None, "");
        assert_eq!(k1, k2);
    }

    #[test]
    fn param_sensitive_hosts_keep_all_params() {
        let url = normalize_url("https://www.youtube.com/watch?v=abc&utm_source=x");
        assert!(url.contains("utm_source"));
    }

    #[test]
    fn trailing_slash_collapsed_except_root() {
        assert_eq!(normalize_url("https://example.com/"), normalize_url("https://example.com"));
    }
}
