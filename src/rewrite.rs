use crate::error::RelayError;
use crate::target::TargetDescriptor;
use http::header::{HeaderMap, HeaderName, HeaderValue, LOCATION};

/// Headers that are only meaningful on a single transport connection and
/// must never cross the relay boundary. Fixed and exhaustive; matched
/// against the lowercased name.
pub const HOP_BY_HOP_HEADERS: [&str; 6] = [
    "connection",
    "keep-alive",
    "public",
    "proxy-authenticate",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    // HeaderName::as_str() is always lowercase.
    HOP_BY_HOP_HEADERS.contains(&name.as_str())
}

/// Produces the header set sent back to the caller from the upstream
/// response head. The status code passes through unchanged and is not this
/// function's concern.
///
/// Repeated upstream headers collapse into one `", "`-joined value in
/// arrival order. That is lossy for headers whose values legitimately
/// contain commas (`set-cookie` in particular) and is kept as observed
/// behavior rather than silently special-cased.
///
/// If a `location` header survives filtering, it is resolved into an
/// absolute URL against the original target and re-encoded as a relay-local
/// path (`/` + absolute URL), so a caller that blindly follows redirects
/// never leaves the relay.
pub fn rewrite_headers(
    upstream: &HeaderMap,
    target: &TargetDescriptor,
) -> Result<HeaderMap, RelayError> {
    let mut outbound: HeaderMap = HeaderMap::with_capacity(upstream.len());

    for (name, value) in upstream.iter() {
        if is_hop_by_hop(name) {
            continue;
        }
        match outbound.get(name) {
            Some(existing) => {
                let mut merged = Vec::with_capacity(existing.len() + 2 + value.len());
                merged.extend_from_slice(existing.as_bytes());
                merged.extend_from_slice(b", ");
                merged.extend_from_slice(value.as_bytes());
                let merged =
                    HeaderValue::from_bytes(&merged).map_err(|e| RelayError::Http(format!(
                        "merged value for '{}' is not a valid header value: {}",
                        name, e
                    )))?;
                outbound.insert(name, merged);
            }
            None => {
                outbound.insert(name, value.clone());
            }
        }
    }

    if let Some(location) = outbound.get(LOCATION).cloned() {
        let location = location.to_str().map_err(|e| RelayError::Upstream {
            target: target.url().as_str().to_string(),
            details: format!("upstream location header is not valid UTF-8: {}", e),
        })?;
        let absolute = target.resolve_location(location)?;
        let relayed = format!("/{}", absolute);
        let relayed = HeaderValue::from_str(&relayed).map_err(|e| RelayError::Upstream {
            target: target.url().as_str().to_string(),
            details: format!("rewritten location is not a valid header value: {}", e),
        })?;
        outbound.insert(LOCATION, relayed);
    }

    Ok(outbound)
}
