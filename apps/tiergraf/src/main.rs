//! # tiergraf
//!
//! Convert, render and filter tiered linguistic annotations.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │          apps/tiergraf (THE BINARY)       │
//! │                                           │
//! │   ┌─────────────┐     ┌──────────────┐    │
//! │   │    CLI      │     │   Config     │    │
//! │   │   (clap)    │     │   (toml)     │    │
//! │   └──────┬──────┘     └──────┬───────┘    │
//! │          └─────────┬─────────┘            │
//! │                    ▼                      │
//! │           ┌────────────────┐              │
//! │           │ tiergraf-core  │              │
//! │           │  (THE LOGIC)   │              │
//! │           └────────────────┘              │
//! └───────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! tiergraf convert -i source.json -o document.tgrf
//! tiergraf hierarchy -i document.tgrf
//! tiergraf table -i document.tgrf -t text
//! tiergraf filter -i document.tgrf -p word=cat -p gloss='^3SG' --or
//! ```

use clap::Parser;
use tiergraf::cli::{self, Config, LogFormat};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = cli::Cli::parse();

    let cwd = std::env::current_dir().unwrap_or_default();
    let config = Config::resolve(cli.config.as_deref(), &cwd);

    // TIERGRAF_LOG_FORMAT=json wins over the configured format.
    let log_format = match std::env::var("TIERGRAF_LOG_FORMAT") {
        Ok(value) => LogFormat::from_env_value(&value),
        Err(_) => config
            .as_ref()
            .map(|c| c.log_format)
            .unwrap_or_default(),
    };
    init_tracing(log_format, cli::log_directive(&cli));

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match cli::execute(&cli, &config) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            tracing::error!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_tracing(format: LogFormat, default_directive: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directive.into());

    // Logs go to stderr; stdout carries the command output.
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
