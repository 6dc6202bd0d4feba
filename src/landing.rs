use crate::error::RelayError;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::path::PathBuf;

/// Paths answered by the landing page instead of the proxy pipeline.
pub const RESERVED_PATHS: [&str; 2] = ["/", "/favicon.ico"];

/// Template for the landing page shell
const HTML_LANDING_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{title}</title>
    <style>
        body { font-family: Arial, sans-serif; margin: 40px auto; max-width: 800px; }
        h1 { color: #333; }
        pre { white-space: pre-wrap; word-wrap: break-word; }
    </style>
</head>
<body>
    <pre>{content}</pre>
</body>
</html>"#;

pub fn is_reserved_path(path: &str) -> bool {
    RESERVED_PATHS.contains(&path)
}

/// Serves the project document on the reserved paths. Everything here is
/// glue around the proxy pipeline; a broken document must never take the
/// process down with it.
pub struct LandingPage {
    document: PathBuf,
}

impl LandingPage {
    pub fn new(document: PathBuf) -> Self {
        Self { document }
    }

    pub async fn respond(&self, head_only: bool) -> Result<Response<Full<Bytes>>, RelayError> {
        let markdown = tokio::fs::read_to_string(&self.document)
            .await
            .map_err(|e| RelayError::Landing(format!("{}: {}", self.document.display(), e)))?;

        let html = HTML_LANDING_TEMPLATE
            .replace("{title}", "heimdall-relay")
            .replace("{content}", &escape_html(&markdown));

        let mut builder = Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "text/html; charset=utf-8");

        if let Ok(metadata) = tokio::fs::metadata(&self.document).await {
            if let Ok(modified) = metadata.modified() {
                builder = builder.header("Last-Modified", httpdate::fmt_http_date(modified));
            }
        }

        let body = if head_only {
            Full::new(Bytes::new())
        } else {
            Full::new(Bytes::from(html))
        };

        builder
            .body(body)
            .map_err(|e| RelayError::Http(e.to_string()))
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
