use anyhow::Result;
use clap::{Parser, Subcommand};
use image_server::app::App;
use image_server::db::{ImageStore, SqliteStore};
use image_server::models::Config;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "image-server")]
#[command(about = "Store device images in S3 and serve their metadata")]
struct CliArgs {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Register a device address so it can list and delete its images.
    AddDevice {
        #[arg(value_name = "ADDRESS", value_parser = parse_address_arg)]
        address: String,
    },
}

fn parse_address_arg(input: &str) -> std::result::Result<String, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("Device address must not be empty".to_string());
    }
    Ok(trimmed.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "image_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::AddDevice { address } => add_device(&address).await,
    }
}

async fn serve() -> Result<()> {
    info!("Starting image-server");

    let app = match App::new().await {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app.serve().await {
        error!("Server failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn add_device(address: &str) -> Result<()> {
    let config = Config::from_env()?;
    let store = SqliteStore::open(&config.database_url)?;

    let device = store.create_device(address).await?;
    info!("Registered device {} with id {}", device.address, device.id);
    println!("{}", device.id);
    Ok(())
}
