#![forbid(unsafe_code)]

//! HTTP server that downloads media into the local library and serves it.
//!
//! Usage: `backend [PORT] [--config PATH]`. The library lives in `library/`
//! below the working directory unless the config file says otherwise.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use appity::{
    config::load_server_config,
    extract::YtDlp,
    server::{AppState, router},
};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_LOG_FILTER: &str = "appity=info,backend=info,tower_http=info";

#[derive(Parser, Debug)]
#[command(author, version, about = "Download media into a local library and serve it.")]
struct Cli {
    #[arg(
        value_name = "PORT",
        allow_hyphen_values = true,
        help = "Port to listen on (default 5173; invalid values are ignored)"
    )]
    port: Option<String>,
    #[arg(
        long = "config",
        value_name = "PATH",
        help = "Optional KEY=value config file"
    )]
    config: Option<PathBuf>,
    #[arg(trailing_var_arg = true, hide = true)]
    _rest: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let config = load_server_config(cwd, cli.config.as_deref(), cli.port.as_deref())?;
    config.prepare_library()?;

    let extractor = Arc::new(YtDlp::new(&config.ytdlp_path));
    let app = router(AppState::new(&config, extractor));

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    info!(
        library = %config.library_dir.display(),
        "Serving on http://localhost:{}/",
        addr.port()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running server")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_accepts_optional_port() {
        let cli = Cli::try_parse_from(["backend"]).unwrap();
        assert_eq!(cli.port, None);

        let cli = Cli::try_parse_from(["backend", "8081"]).unwrap();
        assert_eq!(cli.port.as_deref(), Some("8081"));
    }

    #[test]
    fn cli_keeps_unparseable_port_for_the_loader() {
        let cli = Cli::try_parse_from(["backend", "eighty", "--config", "/etc/appity.env"]).unwrap();
        assert_eq!(cli.port.as_deref(), Some("eighty"));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/appity.env")));
    }

    #[test]
    fn cli_ignores_arguments_after_port() {
        let cli = Cli::try_parse_from(["backend", "8081", "extra", "more"]).unwrap();
        assert_eq!(cli.port.as_deref(), Some("8081"));
        assert_eq!(cli._rest, ["extra", "more"]);
    }
}
