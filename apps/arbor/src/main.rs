//! # Arbor - Admin Tree Server
//!
//! Serves admin menus and CMS columns as ordered, cycle-free trees.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │              apps/arbor (THE BINARY)          │
//! │                                               │
//! │   ┌─────────────┐         ┌─────────────┐     │
//! │   │    CLI      │         │  HTTP API   │     │
//! │   │   (clap)    │         │   (axum)    │     │
//! │   └──────┬──────┘         └──────┬──────┘     │
//! │          └───────────┬───────────┘            │
//! │                      ▼                        │
//! │              ┌───────────────┐                │
//! │              │  arbor-core   │                │
//! │              │  (THE LOGIC)  │                │
//! │              └───────────────┘                │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! arbor --config arbor.toml server --port 8080
//!
//! # CLI operations
//! arbor add -P admin -t System
//! arbor tree admin --all
//! arbor move 7 3
//! ```

use arbor::cli;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // ARBOR_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("ARBOR_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "arbor=debug,arbor_core=debug,tower_http=debug"
    } else {
        "arbor=info,arbor_core=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Arbor startup banner.
fn print_banner() {
    println!(
        r#"
   █████╗ ██████╗ ██████╗  ██████╗ ██████╗
  ██╔══██╗██╔══██╗██╔══██╗██╔═══██╗██╔══██╗
  ███████║██████╔╝██████╔╝██║   ██║██████╔╝
  ██╔══██║██╔══██╗██╔══██╗██║   ██║██╔══██╗
  ██║  ██║██║  ██║██████╔╝╚██████╔╝██║  ██║
  ╚═╝  ╚═╝╚═╝  ╚═╝╚═════╝  ╚═════╝ ╚═╝  ╚═╝

  Admin Tree Server v{}

  Ordered • Acyclic • Cached
"#,
        env!("CARGO_PKG_VERSION")
    );
}
