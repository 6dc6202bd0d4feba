use crate::config::Config;
use crate::cors::CorsPolicy;
use crate::error::RelayError;
use crate::landing::{self, LandingPage};
use crate::rewrite;
use crate::target::TargetDescriptor;
use crate::translate;
use crate::upstream::UpstreamClient;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1::Builder as ServerBuilder;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use log::{debug, error, info, warn};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Response body handed back to the caller: either a buffered local
/// payload or the upstream body streamed through frame by frame.
pub type RelayBody = http_body_util::combinators::BoxBody<Bytes, BoxError>;

fn full_body(bytes: Bytes) -> RelayBody {
    Full::new(bytes).map_err(|never| match never {}).boxed()
}

fn buffered(response: Response<Full<Bytes>>) -> Response<RelayBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

fn error_response(err: &RelayError) -> Response<RelayBody> {
    if err.status().is_client_error() {
        warn!("{}", err);
    } else {
        error!("{}", err);
    }

    Response::builder()
        .status(err.status())
        .header("Content-Type", "application/json; charset=utf-8")
        .body(full_body(Bytes::from(err.to_json().to_string())))
        .expect("static error response")
}

/// Per-process state shared by every in-flight request. Constructed once
/// at startup and immutable afterwards, so requests never contend.
struct RelayState {
    upstream: UpstreamClient,
    cors: CorsPolicy,
    landing: LandingPage,
}

pub struct RelayServer {
    listener: TcpListener,
    state: Arc<RelayState>,
}

impl RelayServer {
    /// Binds the listen socket and builds the shared state. Split from
    /// [`run`](Self::run) so callers can bind port 0 and read the actual
    /// address back.
    pub async fn bind(config: Config) -> Result<Self, RelayError> {
        let cors = CorsPolicy::new(&config.cors.clone().unwrap_or_default())?;
        let upstream = UpstreamClient::new(
            config.connect_timeout_secs.unwrap_or(10),
            config.pool_max_idle_per_host.unwrap_or(10),
            config.pool_idle_timeout_secs.unwrap_or(90),
        );
        let landing = LandingPage::new(config.landing_document.clone());

        let listener = TcpListener::bind(config.listen_addr)
            .await
            .map_err(RelayError::Io)?;

        Ok(Self {
            listener,
            state: Arc::new(RelayState {
                upstream,
                cors,
                landing,
            }),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        self.listener.local_addr().map_err(RelayError::Io)
    }

    pub async fn run(self) -> Result<(), RelayError> {
        info!("relay listening on http://{}", self.local_addr()?);

        loop {
            let (stream, remote_addr) = self.listener.accept().await.map_err(RelayError::Io)?;
            let state = self.state.clone();

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let state = state.clone();
                    async move { Ok::<_, Infallible>(handle(state, req).await) }
                });

                if let Err(err) = ServerBuilder::new()
                    .keep_alive(true)
                    .serve_connection(io, service)
                    .await
                {
                    error!("error serving connection from {}: {}", remote_addr, err);
                }
            });
        }
    }
}

async fn handle(state: Arc<RelayState>, req: Request<Incoming>) -> Response<RelayBody> {
    if let Some(response) = state.cors.preflight(&req) {
        debug!("answered preflight for {}", req.uri());
        return buffered(response);
    }

    if landing::is_reserved_path(req.uri().path()) {
        let head_only = req.method() == Method::HEAD;
        return match state.landing.respond(head_only).await {
            Ok(response) => buffered(response),
            Err(err) => error_response(&err),
        };
    }

    match relay(&state, req).await {
        Ok(response) => response,
        Err(err) => error_response(&err),
    }
}

/// One pass through the forwarding pipeline: resolve the target from the
/// path, translate the request, dispatch upstream, rewrite the response
/// head, and stream the body back. Fails fast at every stage before any
/// header is written to the caller.
async fn relay(
    state: &RelayState,
    req: Request<Incoming>,
) -> Result<Response<RelayBody>, RelayError> {
    let raw_target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("");
    let raw_target = raw_target.strip_prefix('/').unwrap_or(raw_target);

    let target = TargetDescriptor::resolve(raw_target)?;
    let outbound = translate::build_outbound(req.method(), req.headers(), &target)?;

    let upstream_response = state.upstream.dispatch(outbound, &target).await?;
    debug!(
        "{} {} -> {}",
        req.method(),
        target,
        upstream_response.status()
    );

    let (parts, body) = upstream_response.into_parts();
    let headers = rewrite::rewrite_headers(&parts.headers, &target)?;

    let mut response = Response::builder()
        .status(parts.status)
        .body(relay_body(body, target.to_string()))
        .map_err(|e| RelayError::Http(e.to_string()))?;
    *response.headers_mut() = headers;

    Ok(response)
}

/// Hands the upstream body through frame by frame, backpressure intact. A
/// failure here lands after the head was flushed, so it can only be
/// reported on the operator log, never as an error response.
fn relay_body(body: Incoming, target: String) -> RelayBody {
    body.map_err(move |e| {
        error!(
            "{}",
            RelayError::Stream(format!("copy from {} aborted: {}", target, e))
        );
        Box::new(e) as BoxError
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::StatusCode;

    #[test]
    fn test_error_response_is_machine_readable_json() {
        let err = RelayError::InvalidTarget {
            target: "nope".to_string(),
            details: "relative URL without a base".to_string(),
        };
        let response = error_response(&err);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port_reports_address() {
        let config = Config {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            ..Config::default()
        };
        let server = RelayServer::bind(config).await.unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
    }
}
