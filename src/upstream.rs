use crate::error::RelayError;
use crate::target::TargetDescriptor;
use bytes::Bytes;
use http_body_util::Empty;
use hyper::body::Incoming;
use hyper::{Request, Response};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use log::debug;
use tokio::time::{timeout, Duration};

/// Upstream HTTP/HTTPS client, built once at startup and shared by every
/// request. The connector picks plain or TLS transport from the target
/// URI's scheme; certificate handling is the connector's business.
pub struct UpstreamClient {
    client: Client<HttpsConnector<HttpConnector>, Empty<Bytes>>,
    connect_timeout: Duration,
}

impl UpstreamClient {
    pub fn new(
        connect_timeout_secs: u64,
        pool_max_idle_per_host: usize,
        pool_idle_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(pool_max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(pool_idle_timeout_secs))
            .pool_timer(TokioTimer::new())
            .build(HttpsConnector::new());

        Self {
            client,
            connect_timeout: Duration::from_secs(connect_timeout_secs),
        }
    }

    /// Sends the outbound request and resolves as soon as the response
    /// head arrives; the body stays a lazily-consumed stream.
    ///
    /// One attempt per inbound request. DNS, connect, TLS handshake, and
    /// deadline failures all surface as the same upstream failure with the
    /// underlying cause attached.
    pub async fn dispatch(
        &self,
        request: Request<Empty<Bytes>>,
        target: &TargetDescriptor,
    ) -> Result<Response<Incoming>, RelayError> {
        debug!(
            "dispatching {} {}://{}:{}{}",
            request.method(),
            target.scheme,
            target.host,
            target.port,
            target.path_and_query
        );

        match timeout(self.connect_timeout, self.client.request(request)).await {
            Err(_) => Err(RelayError::Upstream {
                target: target.url().as_str().to_string(),
                details: format!(
                    "no response head within {} seconds",
                    self.connect_timeout.as_secs()
                ),
            }),
            Ok(Err(e)) => Err(RelayError::Upstream {
                target: target.url().as_str().to_string(),
                details: error_chain(&e),
            }),
            Ok(Ok(response)) => Ok(response),
        }
    }
}

/// Flattens an error and its sources into one cause message, so callers
/// see "client error (Connect): connection refused" instead of just the
/// outer wrapper.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Outer(std::io::Error);

    impl std::fmt::Display for Outer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "request failed")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_error_chain_includes_causes() {
        let err = Outer(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        let chain = error_chain(&err);
        assert!(chain.starts_with("request failed"));
        assert!(chain.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_dispatch_failure_carries_target() {
        let client = UpstreamClient::new(1, 1, 1);
        let target = TargetDescriptor::resolve("http://127.0.0.1:1/unreachable").unwrap();
        let request =
            crate::translate::build_outbound(&hyper::Method::GET, &Default::default(), &target)
                .unwrap();

        let err = client.dispatch(request, &target).await.unwrap_err();
        match err {
            RelayError::Upstream { target, .. } => {
                assert!(target.contains("127.0.0.1:1"));
            }
            other => panic!("expected upstream failure, got {:?}", other),
        }
    }
}
