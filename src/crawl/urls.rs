//! URL helpers: start-URL resolution, normalization, origin keys and the
//! blocked-platform list.

use crate::error::HarvestError;
use url::Url;

/// Social and video platforms the harvester refuses to crawl.
///
/// A host is blocked when it equals an entry or is a subdomain of one.
pub const BLOCKED_DOMAINS: &[&str] = &[
    "facebook.com",
    "twitter.com",
    "x.com",
    "instagram.com",
    "linkedin.com",
    "reddit.com",
    "tiktok.com",
    "youtube.com",
    "pinterest.com",
    "tumblr.com",
    "snapchat.com",
];

/// Parse user input as a start URL, prefixing `https://` when no scheme is given.
pub fn resolve_start_url(input: &str) -> Result<Url, HarvestError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(HarvestError::InvalidUrl {
            input: input.to_string(),
            reason: "empty URL".into(),
        });
    }
    let lower = trimmed.to_ascii_lowercase();
    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else if lower.contains("://") {
        return Err(HarvestError::InvalidUrl {
            input: input.to_string(),
            reason: "only http and https URLs can be crawled".into(),
        });
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate).map_err(|e| HarvestError::InvalidUrl {
        input: input.to_string(),
        reason: e.to_string(),
    })?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(HarvestError::InvalidUrl {
            input: input.to_string(),
            reason: "missing host".into(),
        });
    }
    Ok(url)
}

/// `scheme://host[:port]path` with no trailing slash, query or fragment.
///
/// The root path normalizes to the bare origin (`https://example.com`).
pub fn normalize_url(url: &Url) -> String {
    let mut out = origin(url);
    let path = url.path().trim_end_matches('/');
    out.push_str(path);
    out
}

/// `scheme://host[:port]`; the port only appears when it is not the default.
pub fn origin(url: &Url) -> String {
    let mut out = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
    if let Some(port) = url.port() {
        out.push(':');
        out.push_str(&port.to_string());
    }
    out
}

/// Same host and same effective port.
pub fn same_domain(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}

/// `true` when `host` is one of [`BLOCKED_DOMAINS`] or a subdomain of one.
pub fn is_blocked_domain(host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    BLOCKED_DOMAINS.iter().any(|blocked| {
        host == *blocked
            || host
                .strip_suffix(blocked)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

/// Host without a leading `www.`, used for project and file names.
pub fn display_domain(url: &Url) -> String {
    let host = url.host_str().unwrap_or("site");
    host.strip_prefix("www.").unwrap_or(host).to_string()
}

/// Resolve an `href` found on `base` into a crawlable URL.
///
/// Returns `None` for fragments, `mailto:`, `tel:`, `javascript:` and any
/// non-HTTP scheme. The result keeps its query and fragment; callers
/// normalize when they need a frontier key.
pub fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if ["mailto:", "tel:", "javascript:", "data:"]
        .iter()
        .any(|p| lower.starts_with(p))
    {
        return None;
    }
    let resolved = base.join(href).ok()?;
    matches!(resolved.scheme(), "http" | "https").then_some(resolved)
}
