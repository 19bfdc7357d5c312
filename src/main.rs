//! Entry point for the zipdoc server.
//!
//! Opens the configured archives (failing before anything binds if one is
//! missing or unreadable), starts listening, and serves until Ctrl-C.

use anyhow::Result;
use clap::Parser;
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use zipdoc::{ArchiveSet, Cli, ContentCache, DocService, Server};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = cli.server_config();
    let archives = ArchiveSet::open(&cli.archive_specs()).await?;
    let service = DocService::new(archives, ContentCache::new(config.cache_limit))
        .with_error_details(config.expose_errors);

    let server = Server::bind(config, Arc::new(service)).await?;
    let addr = server.local_addr()?;
    info!("serving at port {}", addr.port());

    if cli.open {
        open_browser(&cli.root_url(addr.port()));
    }

    server
        .run(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "cannot listen for Ctrl-C, shutting down");
            }
        })
        .await?;

    Ok(())
}

/// Install the global subscriber; `RUST_LOG` wins over `--log-level`.
fn init_tracing(cli: &Cli) {
    let level = cli.log_level.as_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

/// Hand the URL to the desktop's opener. Failure only costs a warning.
fn open_browser(url: &str) {
    #[cfg(target_os = "macos")]
    let mut command = Command::new("open");
    #[cfg(target_os = "windows")]
    let mut command = {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", ""]);
        command
    };
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let mut command = Command::new("xdg-open");

    let spawned = command
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();

    match spawned {
        Ok(_) => info!(url, "opened browser"),
        Err(err) => warn!(url, error = %err, "could not open a browser"),
    }
}
