use crate::error::RelayError;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed absolute destination, derived once per request and immutable
/// afterwards. The original `Url` is kept around so redirect locations can
/// be resolved against it later.
#[derive(Debug, Clone)]
pub struct TargetDescriptor {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub path_and_query: String,
    url: Url,
}

impl TargetDescriptor {
    /// Resolves the raw inbound path (leading separator already stripped)
    /// into a target descriptor.
    ///
    /// Only absolute `http`/`https` URLs are accepted; anything else is a
    /// validation failure, never a best-effort transport attempt.
    pub fn resolve(raw: &str) -> Result<Self, RelayError> {
        let repaired = repair_collapsed_scheme(raw);

        let url = Url::parse(&repaired).map_err(|e| RelayError::InvalidTarget {
            target: raw.to_string(),
            details: e.to_string(),
        })?;

        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => {
                return Err(RelayError::InvalidTarget {
                    target: raw.to_string(),
                    details: format!("unsupported scheme '{}'", other),
                });
            }
        };

        let host = url
            .host_str()
            .ok_or_else(|| RelayError::InvalidTarget {
                target: raw.to_string(),
                details: "target URL has no host".to_string(),
            })?
            .to_string();

        let port = url.port().unwrap_or_else(|| scheme.default_port());

        let path_and_query = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };

        Ok(Self {
            scheme,
            host,
            port,
            path_and_query,
            url,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Resolves a redirect location (relative or absolute) against this
    /// target, the same way a browser would resolve it against the page URL.
    pub fn resolve_location(&self, location: &str) -> Result<Url, RelayError> {
        self.url.join(location).map_err(|e| RelayError::Upstream {
            target: self.url.as_str().to_string(),
            details: format!("unparseable redirect location '{}': {}", location, e),
        })
    }
}

impl std::fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Some front-end layers collapse the double slash after the scheme
/// (`https://` arrives as `https:/`). Reinsert the missing slash for
/// exactly that prefix collapse and touch nothing else.
fn repair_collapsed_scheme(raw: &str) -> String {
    if raw.starts_with("http:/") && !raw.starts_with("http://") {
        format!("http://{}", &raw["http:/".len()..])
    } else if raw.starts_with("https:/") && !raw.starts_with("https://") {
        format!("https://{}", &raw["https:/".len()..])
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_absolute_http_url() {
        let target = TargetDescriptor::resolve("http://example.com/foo?q=1").unwrap();
        assert_eq!(target.scheme, Scheme::Http);
        assert_eq!(target.host, "example.com");
        assert_eq!(target.port, 80);
        assert_eq!(target.path_and_query, "/foo?q=1");
    }

    #[test]
    fn test_resolves_https_with_explicit_port() {
        let target = TargetDescriptor::resolve("https://example.com:8443/x").unwrap();
        assert_eq!(target.scheme, Scheme::Https);
        assert_eq!(target.port, 8443);
    }

    #[test]
    fn test_default_port_follows_scheme() {
        let target = TargetDescriptor::resolve("https://example.com/").unwrap();
        assert_eq!(target.port, 443);
    }

    #[test]
    fn test_repairs_collapsed_slash_https() {
        let collapsed = TargetDescriptor::resolve("https:/example.com/x").unwrap();
        let intact = TargetDescriptor::resolve("https://example.com/x").unwrap();
        assert_eq!(collapsed.url().as_str(), intact.url().as_str());
    }

    #[test]
    fn test_repairs_collapsed_slash_http() {
        let collapsed = TargetDescriptor::resolve("http:/example.com").unwrap();
        let intact = TargetDescriptor::resolve("http://example.com").unwrap();
        assert_eq!(collapsed.url().as_str(), intact.url().as_str());
    }

    #[test]
    fn test_repair_leaves_the_rest_of_the_string_alone() {
        // A collapsed slash deeper in the path is not the repaired artifact.
        let target = TargetDescriptor::resolve("https://example.com/a/http:/b").unwrap();
        assert_eq!(target.path_and_query, "/a/http:/b");
    }

    #[test]
    fn test_repair_does_not_touch_other_prefixes() {
        assert_eq!(repair_collapsed_scheme("httpx:/foo"), "httpx:/foo");
        assert_eq!(repair_collapsed_scheme("ftp:/foo"), "ftp:/foo");
    }

    #[test]
    fn test_rejects_relative_target() {
        let err = TargetDescriptor::resolve("not-a-url").unwrap_err();
        assert!(matches!(err, RelayError::InvalidTarget { .. }));
    }

    #[test]
    fn test_rejects_unsupported_scheme() {
        let err = TargetDescriptor::resolve("ftp://host/x").unwrap_err();
        match err {
            RelayError::InvalidTarget { target, details } => {
                assert_eq!(target, "ftp://host/x");
                assert!(details.contains("unsupported scheme"));
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_empty_target() {
        assert!(TargetDescriptor::resolve("").is_err());
    }

    #[test]
    fn test_resolve_location_relative() {
        let target = TargetDescriptor::resolve("https://example.com/a").unwrap();
        let resolved = target.resolve_location("/b").unwrap();
        assert_eq!(resolved.as_str(), "https://example.com/b");
    }

    #[test]
    fn test_resolve_location_absolute() {
        let target = TargetDescriptor::resolve("https://example.com/a").unwrap();
        let resolved = target.resolve_location("https://other.com/c").unwrap();
        assert_eq!(resolved.as_str(), "https://other.com/c");
    }
}
