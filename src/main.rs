use clap::Parser;
use heimdall_relay::config::Config;
use heimdall_relay::logging;
use heimdall_relay::relay::RelayServer;
use log::info;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::signal;

#[derive(Parser)]
#[clap(
    version,
    about = "A single-hop HTTP/HTTPS forwarding relay: the request path encodes the absolute target URL"
)]
struct Args {
    #[clap(short, long, value_name = "ADDR", help = "Listen address (e.g., 127.0.0.1:8080)")]
    listen: Option<String>,

    #[clap(short, long, value_name = "FILE", help = "Configuration file path")]
    config: Option<String>,

    #[clap(long, value_name = "FILE", help = "Document served on the landing page")]
    landing: Option<PathBuf>,

    #[clap(long, value_name = "SECONDS", help = "Upstream connect timeout in seconds")]
    connect_timeout: Option<u64>,

    #[clap(long, value_name = "LEVEL", help = "Log level: trace, debug, info, warn, error")]
    log_level: Option<String>,

    #[clap(long, value_name = "FORMAT", help = "Log format: text or json")]
    log_format: Option<String>,

    #[clap(long, value_name = "FILE", help = "Generate a sample configuration file")]
    generate_config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Some(config_file) = &args.generate_config {
        generate_sample_config(config_file)?;
        println!("Sample configuration file generated: {}", config_file);
        return Ok(());
    }

    if let Some(level) = &args.log_level {
        logging::parse_log_level(level).map_err(|e| anyhow::anyhow!("{}", e))?;
    }
    if let Some(format) = &args.log_format {
        if format != "text" && format != "json" {
            anyhow::bail!("Invalid log format: {}. Must be one of: text, json", format);
        }
    }

    let config = load_config(&args)?;

    match &config.logging {
        Some(logging_config) if logging_config.targets.is_some() => {
            logging::RelayLogger::init(logging_config.clone())
                .map_err(|e| anyhow::anyhow!("{}", e))?;
        }
        _ => logging::init_fallback(args.log_level.as_deref(), args.log_format.as_deref()),
    }

    info!("Starting relay server...");
    let server = RelayServer::bind(config).await?;

    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            eprintln!("Server error: {}", e);
        }
    });

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
        result = server_handle => {
            if let Err(e) = result {
                eprintln!("Server task error: {}", e);
            }
        }
    }

    info!("Relay server stopped");
    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = if let Some(config_file) = &args.config {
        if !Path::new(config_file).exists() {
            anyhow::bail!("Configuration file not found: {}", config_file);
        }
        Config::from_file(config_file).map_err(|e| anyhow::anyhow!("{}", e))?
    } else {
        Config::default()
    };

    if let Some(listen) = &args.listen {
        config.listen_addr = listen.parse()?;
    } else if let Ok(port) = std::env::var("PORT") {
        // Hosting platforms hand the port over via the environment.
        let port: u16 = port
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid PORT environment value: {}", port))?;
        config.listen_addr = SocketAddr::from(([0, 0, 0, 0], port));
    }

    if let Some(landing) = &args.landing {
        config.landing_document = landing.clone();
    }
    if let Some(secs) = args.connect_timeout {
        config.connect_timeout_secs = Some(secs);
    }

    Ok(config)
}

fn generate_sample_config(file_path: &str) -> anyhow::Result<()> {
    let sample = r#"{
  "listen_addr": "127.0.0.1:8080",
  "landing_document": "./readme.md",
  "connect_timeout_secs": 10,
  "pool_max_idle_per_host": 10,
  "pool_idle_timeout_secs": 90,
  "cors": {
    "allow_origin": "*",
    "allow_methods": "GET,HEAD,PUT,POST,DELETE,PATCH,OPTIONS",
    "max_age_secs": 86400
  }
}"#;

    std::fs::write(file_path, sample)?;
    Ok(())
}
