use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl LogLevel {
    pub fn to_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        LogFormat::Text
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutputType {
    Stdout,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogTarget {
    #[serde(rename = "type")]
    pub output_type: LogOutputType,
    pub path: Option<PathBuf>,
    pub level: Option<LogLevel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<LogLevel>,
    pub format: Option<LogFormat>,
    pub targets: Option<Vec<LogTarget>>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Some(LogLevel::Info),
            format: Some(LogFormat::Text),
            targets: Some(vec![LogTarget {
                output_type: LogOutputType::Stdout,
                path: None,
                level: None,
            }]),
        }
    }
}

/// Access-control preflight policy, fixed at startup.
///
/// When `allow_headers` is unset, the preflight response echoes whatever
/// header names the caller asked for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_allow_origin")]
    pub allow_origin: String,
    #[serde(default = "default_allow_methods")]
    pub allow_methods: String,
    #[serde(default)]
    pub allow_headers: Option<String>,
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
}

fn default_allow_origin() -> String {
    "*".to_string()
}

fn default_allow_methods() -> String {
    "GET,HEAD,PUT,POST,DELETE,PATCH,OPTIONS".to_string()
}

fn default_max_age_secs() -> u64 {
    86_400
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: default_allow_origin(),
            allow_methods: default_allow_methods(),
            allow_headers: None,
            max_age_secs: default_max_age_secs(),
        }
    }
}

fn default_landing_document() -> PathBuf {
    PathBuf::from("./readme.md")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub listen_addr: SocketAddr,
    /// Document served on the reserved landing paths.
    #[serde(default = "default_landing_document")]
    pub landing_document: PathBuf,
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    #[serde(default)]
    pub pool_max_idle_per_host: Option<usize>,
    #[serde(default)]
    pub pool_idle_timeout_secs: Option<u64>,
    #[serde(default)]
    pub cors: Option<CorsConfig>,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".parse().expect("default listen address"),
            landing_document: default_landing_document(),
            connect_timeout_secs: Some(10),
            pool_max_idle_per_host: Some(10),
            pool_idle_timeout_secs: Some(90),
            cors: None,
            logging: None,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
