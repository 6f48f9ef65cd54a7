use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use idlink_core::channel::line::LineClient;
use idlink_core::config::{self, Config};
use idlink_core::service::http::{self, AppState};
use idlink_core::service::links::LinkService;
use idlink_core::service::notifier::Notifier;
use idlink_core::store::backend::StoreBackend;
use idlink_core::store::file_backend::FileBackend;
use idlink_core::store::firebase_backend::FirebaseBackend;
use idlink_core::store::LinkStore;

#[derive(Parser)]
#[command(
    name = "idlink",
    about = format!("{} idlink - LINE ID-link bot server", idlink_core::LOGO),
    version = idlink_core::VERSION,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook/registration server
    Serve {
        /// Listen port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
        /// Config file path (default: ~/.idlink/config.json + env overlay)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the resolved configuration (secrets masked)
    Status {
        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("idlink=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, config } => cmd_serve(port, config).await?,
        Commands::Status { config } => cmd_status(config)?,
    }

    Ok(())
}

fn load(config_path: Option<&PathBuf>) -> Config {
    match config_path {
        Some(path) => config::load_config(Some(path)),
        None => config::load_config_from_env(),
    }
}

fn build_backend(config: &Config) -> Result<Arc<dyn StoreBackend>> {
    match config.store.backend.as_str() {
        "file" | "" => {
            let dir = if config.store.data_dir.is_empty() {
                config::get_data_dir().join("data")
            } else {
                PathBuf::from(&config.store.data_dir)
            };
            Ok(Arc::new(FileBackend::new(&dir)))
        }
        "firebase" => {
            if config.store.database_url.is_empty() {
                anyhow::bail!("store.databaseUrl is required for the firebase backend");
            }
            Ok(Arc::new(FirebaseBackend::new(
                &config.store.database_url,
                Some(&config.store.auth_token),
            )))
        }
        other => anyhow::bail!("Unknown store backend: {}", other),
    }
}

async fn cmd_serve(port: Option<u16>, config_path: Option<PathBuf>) -> Result<()> {
    let mut config = load(config_path.as_ref());
    if let Some(port) = port {
        config.server.port = port;
    }

    if config.line.channel_secret.is_empty() || config.line.channel_access_token.is_empty() {
        tracing::warn!(
            "LINE credentials are not configured; webhook signature checks will reject all requests"
        );
    }

    let backend = build_backend(&config)?;
    let links = LinkService::new(LinkStore::new(backend));
    let notifier = Notifier::new(LineClient::new(&config.line.channel_access_token));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, links, notifier));

    println!("{} idlink v{}", idlink_core::LOGO, idlink_core::VERSION);
    println!();
    println!("📍 Endpoints:");
    println!("   - GET  /             Health check");
    println!("   - POST /webhook      LINE webhook");
    println!("   - GET  /register     Link registration");
    println!("   - GET  /link         Chat deep-link page");
    println!("   - GET  /generate-qr  QR code generator");
    println!();
    println!("🔧 Commands:");
    println!("   - リスト    Display registered IDs");
    println!("   - ヘルプ    Show help message");

    http::serve(&addr, state).await
}

fn cmd_status(config_path: Option<PathBuf>) -> Result<()> {
    let config = load(config_path.as_ref());

    println!("{} idlink v{}", idlink_core::LOGO, idlink_core::VERSION);
    println!("  Server:   {}:{}", config.server.host, config.server.port);
    println!("  Base URL: {}", config.server.public_base_url);
    match config.store.backend.as_str() {
        "firebase" => println!("  Store:    firebase ({})", config.store.database_url),
        _ => println!("  Store:    file"),
    }
    println!("  LINE:");
    println!("    channel secret: {}", mask(&config.line.channel_secret));
    println!(
        "    access token:   {}",
        mask(&config.line.channel_access_token)
    );
    println!("    basic id:       {}", config.line.bot_basic_id);

    Ok(())
}

fn mask(value: &str) -> &'static str {
    if value.is_empty() {
        "(not set)"
    } else {
        "(set)"
    }
}
