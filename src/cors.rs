use crate::config::CorsConfig;
use crate::error::RelayError;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, ACCESS_CONTROL_REQUEST_HEADERS,
    ACCESS_CONTROL_REQUEST_METHOD,
};
use hyper::{Method, Request, Response, StatusCode};

/// Preflight policy, built once at startup from config and shared by
/// reference. Header values are precomputed so the request path only
/// clones them.
pub struct CorsPolicy {
    allow_origin: HeaderValue,
    allow_methods: HeaderValue,
    allow_headers: Option<HeaderValue>,
    max_age: HeaderValue,
}

impl CorsPolicy {
    pub fn new(config: &CorsConfig) -> Result<Self, RelayError> {
        let allow_origin = HeaderValue::from_str(&config.allow_origin)
            .map_err(|e| RelayError::Http(format!("invalid allow_origin: {}", e)))?;
        let allow_methods = HeaderValue::from_str(&config.allow_methods)
            .map_err(|e| RelayError::Http(format!("invalid allow_methods: {}", e)))?;
        let allow_headers = config
            .allow_headers
            .as_deref()
            .map(HeaderValue::from_str)
            .transpose()
            .map_err(|e| RelayError::Http(format!("invalid allow_headers: {}", e)))?;
        let max_age = HeaderValue::from_str(&config.max_age_secs.to_string())
            .map_err(|e| RelayError::Http(format!("invalid max_age: {}", e)))?;

        Ok(Self {
            allow_origin,
            allow_methods,
            allow_headers,
            max_age,
        })
    }

    /// Answers an `OPTIONS` preflight in full, short-circuiting the proxy
    /// pipeline. Returns `None` for everything else.
    pub fn preflight<B>(&self, req: &Request<B>) -> Option<Response<Full<Bytes>>> {
        if req.method() != Method::OPTIONS {
            return None;
        }
        if !req.headers().contains_key(ACCESS_CONTROL_REQUEST_METHOD) {
            return None;
        }

        // Unless pinned in config, allow whatever headers the caller asked for.
        let allow_headers = match &self.allow_headers {
            Some(pinned) => Some(pinned.clone()),
            None => req.headers().get(ACCESS_CONTROL_REQUEST_HEADERS).cloned(),
        };

        let mut response = Response::builder()
            .status(StatusCode::NO_CONTENT)
            .header(ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin.clone())
            .header(ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone())
            .header(ACCESS_CONTROL_MAX_AGE, self.max_age.clone());

        if let Some(headers) = allow_headers {
            response = response.header(ACCESS_CONTROL_ALLOW_HEADERS, headers);
        }

        Some(
            response
                .body(Full::new(Bytes::new()))
                .expect("static preflight response"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CorsPolicy {
        CorsPolicy::new(&CorsConfig::default()).unwrap()
    }

    #[test]
    fn test_preflight_short_circuits_options() {
        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/https://example.com/x")
            .header("access-control-request-method", "GET")
            .header("access-control-request-headers", "x-custom")
            .body(())
            .unwrap();

        let response = policy().preflight(&req).expect("preflight handled");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
        assert_eq!(
            response
                .headers()
                .get(ACCESS_CONTROL_ALLOW_HEADERS)
                .unwrap(),
            "x-custom"
        );
    }

    #[test]
    fn test_plain_options_is_not_a_preflight() {
        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/https://example.com/x")
            .body(())
            .unwrap();
        assert!(policy().preflight(&req).is_none());
    }

    #[test]
    fn test_non_options_passes_through() {
        let req = Request::builder()
            .method(Method::GET)
            .uri("/https://example.com/x")
            .header("access-control-request-method", "GET")
            .body(())
            .unwrap();
        assert!(policy().preflight(&req).is_none());
    }

    #[test]
    fn test_pinned_allow_headers_override_echo() {
        let config = CorsConfig {
            allow_headers: Some("authorization".to_string()),
            ..CorsConfig::default()
        };
        let p = CorsPolicy::new(&config).unwrap();

        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/https://example.com/x")
            .header("access-control-request-method", "GET")
            .header("access-control-request-headers", "x-custom")
            .body(())
            .unwrap();

        let response = p.preflight(&req).unwrap();
        assert_eq!(
            response
                .headers()
                .get(ACCESS_CONTROL_ALLOW_HEADERS)
                .unwrap(),
            "authorization"
        );
    }

    #[test]
    fn test_rejects_unencodable_origin() {
        let config = CorsConfig {
            allow_origin: "bad\nvalue".to_string(),
            ..CorsConfig::default()
        };
        assert!(CorsPolicy::new(&config).is_err());
    }
}
