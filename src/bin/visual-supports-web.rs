// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Gallery server binary

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use visual_supports::config::{AppConfig, WebConfig};
use visual_supports::Result;

#[derive(Parser, Debug)]
#[command(name = "visual-supports-web", version, about = "Serve the password-gated gallery")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Bind address (overrides web.host)
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Listen port (overrides web.port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Seconds before an idle session locks (overrides web.session_idle_secs)
    #[arg(long)]
    session_idle: Option<u64>,

    #[arg(short, long)]
    verbose: bool,

    /// Launch the system browser on the gallery URL
    #[arg(long)]
    open: bool,
}

impl Args {
    fn apply(&self, web: &mut WebConfig) {
        if let Some(host) = &self.host {
            web.host = host.clone();
        }
        if let Some(port) = self.port {
            web.port = port;
        }
        if let Some(secs) = self.session_idle {
            web.session_idle_secs = secs;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(if args.verbose { "debug" } else { "info" })
        .with_target(false)
        .init();

    let mut config = AppConfig::load(&args.config)?;
    args.apply(&mut config.web);
    config.validate()?;

    let url = format!("http://{}:{}", config.web.host, config.web.port);
    info!(
        "{} store, sessions lock after {}s idle",
        config.store.backend_name(),
        config.web.session_idle_secs
    );
    if args.open {
        if let Err(e) = open_browser(&url) {
            error!("Cannot open {}: {}", url, e);
        }
    }

    visual_supports::web::start_server(config).await
}

#[cfg(target_os = "windows")]
fn open_browser(url: &str) -> std::io::Result<()> {
    std::process::Command::new("cmd").args(["/c", "start", url]).spawn().map(drop)
}

#[cfg(not(target_os = "windows"))]
fn open_browser(url: &str) -> std::io::Result<()> {
    let opener = if cfg!(target_os = "macos") { "open" } else { "xdg-open" };
    std::process::Command::new(opener).arg(url).spawn().map(drop)
}
