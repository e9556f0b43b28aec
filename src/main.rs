// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Visual Supports command line
//!
//! Manage the gallery's content store from a terminal: list, upload and
//! remove visuals once the unlock gate accepts the supplied secret.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use visual_supports::collection::CollectionController;
use visual_supports::config::{AppConfig, StoreConfig};
use visual_supports::intake::UploadFile;
use visual_supports::layout::layout;
use visual_supports::locator::LocatorRegistry;
use visual_supports::store::open_store;
use visual_supports::store::remote::RemoteProbe;
use visual_supports::unlock::{cipher, TokenProbe, UnlockGate};
use visual_supports::{Result, VisualError};

/// Visual Supports CLI - password-gated gallery of images and PDFs
#[derive(Parser, Debug)]
#[command(name = "visual-supports")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version = "1.0.0")]
#[command(about = "Manage a gallery of visual supports", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the visuals in the content store
    List {
        /// Password or access-token secret
        #[arg(short, long)]
        secret: Option<String>,
    },

    /// Upload image or PDF files
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Password or access-token secret
        #[arg(short, long)]
        secret: Option<String>,
    },

    /// Remove a visual by id
    Remove {
        /// Item id as shown by `list`
        id: String,

        /// Password or access-token secret
        #[arg(short, long)]
        secret: Option<String>,
    },

    /// Show the grid chosen for a number of visuals
    Layout {
        /// Number of visuals
        count: usize,
    },

    /// Encrypt an access token for the encrypted-token unlock policy
    SealToken {
        /// Secret users will type to unlock
        #[arg(long)]
        secret: String,

        /// Access token for the remote store
        #[arg(long)]
        token: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Initialize a new gallery directory
    Init {
        /// Directory to initialize (default: current)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::List { secret } => run_list(config, secret, &cli.format).await,
        Commands::Upload { files, secret } => run_upload(config, files, secret, &cli.format).await,
        Commands::Remove { id, secret } => run_remove(config, id, secret).await,
        Commands::Layout { count } => run_layout(count, &cli.format),
        Commands::SealToken { secret, token } => {
            println!("{}", cipher::seal(&secret, &token)?);
            Ok(())
        }
        Commands::Config { action } => run_config_command(config, action, &cli.config),
        Commands::Init { dir, force } => run_init(dir, force),
    }
}

/// Pass the unlock gate and open the configured store
async fn open_collection(config: &AppConfig, secret: Option<String>) -> Result<CollectionController> {
    let secret = secret
        .ok_or_else(|| VisualError::Auth("--secret is required to access the gallery".to_string()))?;

    let mut gate = UnlockGate::new(&config.gate);
    let probe = match &config.store {
        StoreConfig::Remote(remote) => Some(RemoteProbe::new(remote)),
        _ => None,
    };
    let unlocked = gate
        .attempt(&secret, probe.as_ref().map(|p| p as &dyn TokenProbe))
        .await;
    if !unlocked {
        let message = gate
            .error_message()
            .unwrap_or_else(|| "Incorrect password".to_string());
        return Err(VisualError::Auth(message));
    }

    let registry = LocatorRegistry::new();
    let session = gate.session().clone();
    let store = open_store(&config.store, &session, &registry)?;
    debug!("Using {} store", store.name());
    Ok(CollectionController::new(store, session, registry))
}

async fn run_list(config: AppConfig, secret: Option<String>, format: &str) -> Result<()> {
    let mut collection = open_collection(&config, secret).await?;
    collection.load().await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(collection.items())?);
        return Ok(());
    }

    if collection.is_empty() {
        println!("No visuals yet");
        return Ok(());
    }
    let grid = collection.layout();
    println!(
        "{} visuals ({}x{} grid):",
        collection.items().len(),
        grid.columns,
        grid.rows
    );
    for item in collection.items() {
        let kind = if item.is_pdf() { "pdf" } else { "image" };
        println!("  [{}] {} ({}) id={}", kind, item.label, item.filename, item.id);
    }
    Ok(())
}

async fn run_upload(
    config: AppConfig,
    files: Vec<PathBuf>,
    secret: Option<String>,
    format: &str,
) -> Result<()> {
    let mut collection = open_collection(&config, secret).await?;
    // Existing items supply revisions for overwrites
    collection.load().await?;

    let uploads: Vec<UploadFile> = files.iter().map(|p| UploadFile::from_path(p)).collect();
    let report = collection.upload(uploads).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for name in &report.stored {
            println!("Stored: {}", name);
        }
        for name in &report.rejected {
            println!("Skipped (unsupported): {}", name);
        }
        for (name, reason) in &report.failed {
            eprintln!("Failed: {}: {}", name, reason);
        }
        println!("\nCollection now holds {} visuals", collection.items().len());
    }

    match report.failed.is_empty() {
        true => Ok(()),
        false => Err(VisualError::Store(format!(
            "{} of {} uploads failed",
            report.failed.len(),
            report.failed.len() + report.stored.len()
        ))),
    }
}

async fn run_remove(config: AppConfig, id: String, secret: Option<String>) -> Result<()> {
    let mut collection = open_collection(&config, secret).await?;
    collection.load().await?;
    collection.remove(&id).await?;
    println!("Removed {}", id);
    Ok(())
}

fn run_layout(count: usize, format: &str) -> Result<()> {
    let grid = layout(count);
    if format == "json" {
        println!("{}", serde_json::to_string(&grid)?);
    } else {
        println!("{} visuals -> {} columns x {} rows ({})", count, grid.columns, grid.rows, grid.css_class());
    }
    Ok(())
}

/// Run config commands
fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Store backend: {}", config.store.backend_name());
            println!("  Web: {}:{}", config.web.host, config.web.port);
            println!("  Upload limit: {} bytes", config.upload.max_bytes);
        }
    }

    Ok(())
}

/// Initialize a new gallery directory
fn run_init(dir: Option<PathBuf>, force: bool) -> Result<()> {
    let target = dir.unwrap_or_else(|| PathBuf::from("."));
    let config_path = target.join("config.json");

    if config_path.exists() && !force {
        return Err(VisualError::Config(
            "config.json already exists. Use --force to overwrite".to_string(),
        ));
    }

    std::fs::create_dir_all(&target)?;
    let mut config = AppConfig::default();
    config.store = StoreConfig::Local {
        path: target.join("visual-supports.json").to_string_lossy().into_owned(),
        namespace: "visual-supports".to_string(),
    };
    config.save(&config_path)?;
    info!("Wrote {:?}", config_path);

    println!("Visual Supports initialized in {:?}", target);
    println!("\nNext steps:");
    println!("  1. Upload: visual-supports upload --secret <password> picture.png");
    println!("  2. Browse: visual-supports-web --open");

    Ok(())
}
