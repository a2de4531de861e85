//! URL validation
//!
//! Runs before any network call. Rejects malformed URLs, non-http(s)
//! schemes, and targets that would point the scraper at internal services.

use crate::error::ApplyError;
use std::net::IpAddr;
use url::{Host, Url};

/// Validate a URL for scraping.
///
/// Returns the parsed URL on success so callers do not parse twice.
/// Pure function, no observable side effects; failure is always
/// recoverable by the caller (reject the request, no retry).
pub fn validate_url(raw: &str) -> Result<Url, ApplyError> {
    validate_url_with(raw, false)
}

/// Validate a URL, optionally permitting internal network targets.
///
/// `allow_internal` exists for deployments that genuinely scrape
/// intranet pages, and for tests running against a local server.
pub fn validate_url_with(raw: &str, allow_internal: bool) -> Result<Url, ApplyError> {
    if raw.trim().is_empty() {
        return Err(ApplyError::InvalidUrl("URL cannot be empty".into()));
    }

    let url = Url::parse(raw).map_err(|e| ApplyError::InvalidUrl(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ApplyError::InvalidUrl(format!(
                "scheme must be http or https, got {other}"
            )))
        }
    }

    let host = url
        .host()
        .ok_or_else(|| ApplyError::InvalidUrl("URL must include a host".into()))?;

    if !allow_internal && is_internal_host(&host) {
        return Err(ApplyError::InvalidUrl(format!(
            "host {host} resolves to an internal network"
        )));
    }

    Ok(url)
}

/// Best-effort guard against loopback/private/link-local targets.
///
/// Only literal addresses and well-known names are checked; a hostname
/// that resolves to a private address at connect time is not caught here.
fn is_internal_host(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(name) => {
            let name = name.to_ascii_lowercase();
            name == "localhost" || name.ends_with(".localhost") || name.ends_with(".local")
        }
        Host::Ipv4(addr) => {
            let ip = IpAddr::V4(*addr);
            ip.is_loopback() || addr.is_private() || addr.is_link_local() || addr.is_unspecified()
        }
        Host::Ipv6(addr) => {
            addr.is_loopback() || addr.is_unspecified() || is_unique_local_v6(addr)
        }
    }
}

// fc00::/7
fn is_unique_local_v6(addr: &std::net::Ipv6Addr) -> bool {
    (addr.segments()[0] & 0xfe00) == 0xfc00
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_public_urls() {
        assert!(validate_url("https://example.com/apply").is_ok());
        assert!(validate_url("http://example.com:8080/info?x=1").is_ok());
    }

    #[test]
    fn test_rejects_empty_and_malformed() {
        assert!(validate_url("").is_err());
        assert!(validate_url("   ").is_err());
        assert!(validate_url("not a url").is_err());
        assert!(validate_url("example.com/no-scheme").is_err());
    }

    #[test]
    fn test_rejects_non_http_schemes() {
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("file:///etc/passwd").is_err());
        assert!(validate_url("javascript:alert(1)").is_err());
    }

    #[test]
    fn test_rejects_internal_targets() {
        assert!(validate_url("http://localhost/admin").is_err());
        assert!(validate_url("http://127.0.0.1:8080/").is_err());
        assert!(validate_url("http://10.0.0.5/").is_err());
        assert!(validate_url("http://192.168.1.1/router").is_err());
        assert!(validate_url("http://169.254.169.254/metadata").is_err());
        assert!(validate_url("http://[::1]/").is_err());
        assert!(validate_url("http://[fd00::1]/").is_err());
    }

    #[test]
    fn test_allow_internal_escape_hatch() {
        assert!(validate_url_with("http://127.0.0.1:9000/", true).is_ok());
        assert!(validate_url_with("http://localhost/", true).is_ok());
        // Scheme rules still apply
        assert!(validate_url_with("ftp://127.0.0.1/", true).is_err());
    }

    #[test]
    fn test_error_is_invalid_url() {
        let err = validate_url("gopher://example.com").unwrap_err();
        assert!(matches!(err, ApplyError::InvalidUrl(_)));
    }
}
