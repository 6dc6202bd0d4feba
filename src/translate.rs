use crate::error::RelayError;
use crate::target::TargetDescriptor;
use bytes::Bytes;
use http_body_util::Empty;
use hyper::header::{HeaderMap, HeaderValue, CONNECTION, CONTENT_LENGTH, HOST};
use hyper::{Method, Request, Uri};

/// Builds the outbound request from the inbound head and the resolved
/// target.
///
/// All inbound headers are forwarded verbatim, with two exceptions:
/// `host` is overwritten with the target host (origins commonly validate
/// it), and `content-length`/`connection` are stripped because they are
/// transport-computed or connection-scoped. No request body is forwarded.
pub fn build_outbound(
    method: &Method,
    inbound_headers: &HeaderMap,
    target: &TargetDescriptor,
) -> Result<Request<Empty<Bytes>>, RelayError> {
    let uri: Uri = target
        .url()
        .as_str()
        .parse()
        .map_err(|e: hyper::http::uri::InvalidUri| RelayError::InvalidTarget {
            target: target.url().as_str().to_string(),
            details: e.to_string(),
        })?;

    let mut headers = inbound_headers.clone();

    let host_value =
        HeaderValue::from_str(&target.host).map_err(|e| RelayError::InvalidTarget {
            target: target.url().as_str().to_string(),
            details: format!("target host is not a valid header value: {}", e),
        })?;
    headers.insert(HOST, host_value);

    headers.remove(CONTENT_LENGTH);
    headers.remove(CONNECTION);

    let mut request = Request::builder()
        .method(method.clone())
        .uri(uri)
        .body(Empty::new())
        .map_err(|e| RelayError::Http(e.to_string()))?;
    *request.headers_mut() = headers;

    Ok(request)
}
