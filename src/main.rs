//! tokensmith
//!
//! Evaluates configured token and secret declarations against the configured
//! rules and prints an explanation for each secret.

use clap::{Parser, ValueEnum};
use tokensmith::{
    Authorizer,
    config::{LogFormat, load_config},
    explain::explain_secret_result,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// tokensmith - Authorize GitHub App tokens and secret provisioning
#[derive(Parser, Debug)]
#[command(name = "tokensmith")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "TOKENSMITH_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TOKENSMITH_LOG_LEVEL")]
    log_level: Option<String>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// ✅/❌ explanation trees
    Text,
    /// Results as JSON
    Json,
}

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration before logging so the configured level applies
    let config = load_config(args.config.as_deref());

    let (level, log_format) = match &config {
        Ok(config) => (
            args.log_level.clone().unwrap_or(config.logging.level.clone()),
            config.logging.format,
        ),
        Err(_) => (
            args.log_level.clone().unwrap_or_else(|| "info".to_string()),
            LogFormat::Pretty,
        ),
    };

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));
    match log_format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init(),
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting tokensmith");

    let config = config.inspect_err(|e| error!(error = %e, "Failed to load configuration"))?;

    let authorizer = Authorizer::from_config(&config)
        .inspect_err(|e| error!(error = %e, "Failed to build authorizer"))?;

    let result = authorizer.authorize(&config.requesters);

    match args.format {
        OutputFormat::Text => {
            for secret in &result.secrets {
                println!("{}", explain_secret_result(secret));
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    let denied = result.denied().count();
    if denied > 0 {
        warn!(
            denied,
            total = result.secrets.len(),
            "Some secrets are not authorized"
        );
        std::process::exit(1);
    }

    info!(total = result.secrets.len(), "All secrets authorized");
    Ok(())
}
