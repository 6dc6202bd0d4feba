use crate::config::{LogFormat, LogLevel, LogOutputType, LogTarget, LoggingConfig};
use chrono::{DateTime, Utc};
use log::Record;
use serde_json::json;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::sync::Mutex;

pub struct RelayLogger {
    targets: Vec<LogTarget>,
    format: LogFormat,
    writers: Vec<Mutex<BufWriter<Box<dyn Write + Send>>>>,
}

impl RelayLogger {
    pub fn new(config: LoggingConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let format = config.format.unwrap_or_default();
        let targets = config.targets.unwrap_or_default();

        let mut writers = Vec::new();
        for target in &targets {
            let writer: Box<dyn Write + Send> = match target.output_type {
                LogOutputType::Stdout => Box::new(std::io::stdout()),
                LogOutputType::File => {
                    let path = target.path.as_ref().ok_or("file output type requires path")?;
                    let file = OpenOptions::new().create(true).append(true).open(path)?;
                    Box::new(file)
                }
            };
            writers.push(Mutex::new(BufWriter::new(writer)));
        }

        Ok(Self {
            targets,
            format,
            writers,
        })
    }

    pub fn init(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        let max_level = config
            .level
            .clone()
            .unwrap_or_default()
            .to_filter();
        let logger = Self::new(config)?;
        log::set_boxed_logger(Box::new(logger))?;
        log::set_max_level(max_level);
        Ok(())
    }

    fn target_permits(target: &LogTarget, level: log::Level) -> bool {
        match &target.level {
            Some(target_level) => level <= target_level.to_filter(),
            None => true,
        }
    }

    fn format_text(&self, record: &Record) -> String {
        let timestamp: DateTime<Utc> = Utc::now();
        format!(
            "{} [{}] [{}] {}",
            timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    }

    fn format_json(&self, record: &Record) -> String {
        let timestamp: DateTime<Utc> = Utc::now();
        let entry = json!({
            "timestamp": timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            "level": record.level().to_string().to_lowercase(),
            "target": record.target(),
            "message": record.args().to_string(),
        });
        serde_json::to_string(&entry).unwrap_or_else(|_| {
            json!({"error": "failed to serialize log entry"}).to_string()
        })
    }
}

impl log::Log for RelayLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.targets
            .iter()
            .any(|target| Self::target_permits(target, metadata.level()))
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let message = match self.format {
            LogFormat::Text => self.format_text(record),
            LogFormat::Json => self.format_json(record),
        };

        for (i, target) in self.targets.iter().enumerate() {
            if Self::target_permits(target, record.level()) {
                if let Ok(mut writer) = self.writers[i].lock() {
                    let _ = writeln!(writer, "{}", message);
                    let _ = writer.flush();
                }
            }
        }
    }

    fn flush(&self) {
        for writer in &self.writers {
            if let Ok(mut w) = writer.lock() {
                let _ = w.flush();
            }
        }
    }
}

// env_logger fallback when no logging section is configured
pub fn init_fallback(log_level: Option<&str>, log_format: Option<&str>) {
    let level = log_level.unwrap_or("info");

    if log_format == Some("json") {
        let mut builder =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));
        builder.format(|buf, record| {
            let timestamp: DateTime<Utc> = Utc::now();
            let entry = json!({
                "timestamp": timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
                "level": record.level().to_string().to_lowercase(),
                "target": record.target(),
                "message": record.args().to_string(),
            });
            writeln!(buf, "{}", entry)
        });
        builder.init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    }
}

pub fn parse_log_level(s: &str) -> Result<LogLevel, Box<dyn std::error::Error>> {
    match s.to_lowercase().as_str() {
        "trace" => Ok(LogLevel::Trace),
        "debug" => Ok(LogLevel::Debug),
        "info" => Ok(LogLevel::Info),
        "warn" => Ok(LogLevel::Warn),
        "error" => Ok(LogLevel::Error),
        _ => Err(format!(
            "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
            s
        )
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_level_filtering() {
        let target = LogTarget {
            output_type: LogOutputType::Stdout,
            path: None,
            level: Some(LogLevel::Warn),
        };
        assert!(RelayLogger::target_permits(&target, log::Level::Error));
        assert!(RelayLogger::target_permits(&target, log::Level::Warn));
        assert!(!RelayLogger::target_permits(&target, log::Level::Info));
        assert!(!RelayLogger::target_permits(&target, log::Level::Trace));
    }

    #[test]
    fn test_unrestricted_target_logs_everything() {
        let target = LogTarget {
            output_type: LogOutputType::Stdout,
            path: None,
            level: None,
        };
        assert!(RelayLogger::target_permits(&target, log::Level::Trace));
    }

    #[test]
    fn test_parse_log_level() {
        assert!(matches!(parse_log_level("DEBUG"), Ok(LogLevel::Debug)));
        assert!(parse_log_level("verbose").is_err());
    }
}
