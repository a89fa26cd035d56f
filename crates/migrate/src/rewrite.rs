//! Playlist URL host rewriting.
//!
//! The rewrite swaps only the host component: the scheme is preserved
//! (defaulting to `http` when absent) and everything after the host — path,
//! query, all of it — is carried over byte-identical.

use std::sync::LazyLock;

use regex::Regex;

static TARGET_DOMAIN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-zA-Z0-9-]+\.)+[a-zA-Z]{2,}(:\d+)?$").unwrap());

/// Split a playlist URL into (scheme, host, remainder).
///
/// The host is everything between the scheme and the first `/` or `?`; the
/// remainder keeps its leading separator. URLs with an empty host split to
/// `None`.
pub fn split_url(url: &str) -> Option<(&str, &str, &str)> {
    let (scheme, after_scheme) = match url.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => ("http", url),
    };
    let host_end = after_scheme
        .find(['/', '?'])
        .unwrap_or(after_scheme.len());
    let host = &after_scheme[..host_end];
    if host.is_empty() {
        return None;
    }
    Some((scheme, host, &after_scheme[host_end..]))
}

/// Host component of a playlist URL, lowercased for matching.
pub fn host_of(url: &str) -> Option<String> {
    split_url(url).map(|(_, host, _)| host.to_ascii_lowercase())
}

/// Rebuild `url` on `new_domain`, preserving scheme and remainder.
///
/// Returns `None` when the URL has no recognizable host. The result can
/// equal the input when the host already matches; callers skip the edit in
/// that case.
pub fn rewrite_host(url: &str, new_domain: &str) -> Option<String> {
    let (scheme, _, rest) = split_url(url)?;
    Some(format!("{scheme}://{new_domain}{rest}"))
}

/// Normalize an operator-supplied target domain: strip scheme and trailing
/// slash, lowercase, and validate the shape (`host.tld`, optional port).
pub fn normalize_target_domain(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let cleaned = without_scheme.trim_end_matches('/').to_ascii_lowercase();
    TARGET_DOMAIN_REGEX.is_match(&cleaned).then_some(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_extracts_scheme_host_and_remainder() {
        let (scheme, host, rest) =
            split_url("https://old.example.com:8080/get.php?u=a&p=b").unwrap();
        assert_eq!(scheme, "https");
        assert_eq!(host, "old.example.com:8080");
        assert_eq!(rest, "/get.php?u=a&p=b");
    }

    #[test]
    fn split_defaults_scheme_to_http() {
        let (scheme, host, rest) = split_url("old.example.com/path").unwrap();
        assert_eq!(scheme, "http");
        assert_eq!(host, "old.example.com");
        assert_eq!(rest, "/path");
    }

    #[test]
    fn split_handles_query_directly_after_host() {
        let (_, host, rest) = split_url("http://h.example.com?u=1").unwrap();
        assert_eq!(host, "h.example.com");
        assert_eq!(rest, "?u=1");
    }

    #[test]
    fn rewrite_preserves_scheme_and_remainder_bytes() {
        let url = "https://old.example.com/get.php?u=a%20b&p=2";
        let rewritten = rewrite_host(url, "new.example.com").unwrap();
        assert_eq!(rewritten, "https://new.example.com/get.php?u=a%20b&p=2");
    }

    #[test]
    fn rewrite_is_idempotent() {
        let once = rewrite_host("http://old.example.com/a?q=1", "new.example.com").unwrap();
        let twice = rewrite_host(&once, "new.example.com").unwrap();
        assert_eq!(once, twice);
        // The path/query substring is byte-identical throughout.
        assert!(once.ends_with("/a?q=1"));
    }

    #[test]
    fn rewrite_without_host_is_none() {
        assert!(rewrite_host("", "new.example.com").is_none());
        assert!(rewrite_host("http:///path", "new.example.com").is_none());
    }

    #[test]
    fn bare_host_url_gains_default_scheme() {
        let rewritten = rewrite_host("old.example.com:8000/live", "new.example.com").unwrap();
        assert_eq!(rewritten, "http://new.example.com/live");
    }

    #[test]
    fn normalize_target_domain_accepts_ports_and_strips_scheme() {
        assert_eq!(
            normalize_target_domain("https://New.Example.com/").as_deref(),
            Some("new.example.com")
        );
        assert_eq!(
            normalize_target_domain("cdn.example.com:8080").as_deref(),
            Some("cdn.example.com:8080")
        );
    }

    #[test]
    fn normalize_target_domain_rejects_garbage() {
        assert!(normalize_target_domain("not a domain").is_none());
        assert!(normalize_target_domain("nodots").is_none());
        assert!(normalize_target_domain("").is_none());
    }
}
