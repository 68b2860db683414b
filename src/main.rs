use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

mod ai;
mod app;
mod config;
mod document;
mod error;
mod model;
mod practice;
mod server;
#[cfg(test)]
mod testing;

use ai::ChatRelay;
use config::{ApiConfig, Settings};
use document::Catalog;
use server::{ApiHandle, AppState};

#[derive(Parser)]
#[command(name = "exam-maker")]
#[command(about = "Exam Maker - AI generated coding questions and code reviews from study material")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to ~/.exam-maker/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the web app and API (default)
    Serve {
        /// Keep serving when no API configuration is found
        #[arg(long)]
        allow_missing_config: bool,
    },
    /// Run the standalone CORS proxy
    Proxy,
    /// List pre-loaded materials
    Materials,
    /// Practice in the terminal
    Practice {
        /// Pre-loaded material id
        #[arg(long, conflicts_with = "pdf", required_unless_present = "pdf")]
        material: Option<String>,
        /// PDF file to upload
        #[arg(long)]
        pdf: Option<PathBuf>,
    },
    /// Write the default settings file
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).await?;

    tracing_subscriber::fmt()
        .with_max_level(settings.get_tracing_level())
        .init();

    settings.validate()?;

    match cli.command {
        None => start_server(settings, false).await?,
        Some(Commands::Serve { allow_missing_config }) => start_server(settings, allow_missing_config).await?,
        Some(Commands::Proxy) => server::serve_proxy(AppState::new(Arc::new(settings), None)).await?,
        Some(Commands::Materials) => list_materials(&settings).await?,
        Some(Commands::Practice { material, pdf }) => {
            let source = match (material, pdf) {
                (Some(id), _) => practice::Source::Material(id),
                (None, Some(path)) => practice::Source::Pdf(path),
                (None, None) => anyhow::bail!("Pass --material <id> or --pdf <path>"),
            };
            practice::run(&settings, source).await?
        }
        Some(Commands::InitConfig) => {
            let path = Settings::default().save(cli.config.as_deref()).await?;
            println!("✅ Wrote default settings to {}", path.display());
        }
    }

    Ok(())
}

async fn start_server(settings: Settings, allow_missing_config: bool) -> Result<()> {
    tracing::info!("Starting Exam Maker...");

    let api = match ApiConfig::load(&settings.secret_file).await {
        Ok((config, source)) => {
            tracing::info!("API configuration loaded from {:?} (model {})", source, config.model);
            let config = Arc::new(config);
            let relay = ChatRelay::new(config.clone(), &settings)?;
            Some(ApiHandle { config, relay: Arc::new(relay) })
        }
        Err(e) if allow_missing_config => {
            tracing::warn!("{}; API routes will answer 500", e);
            None
        }
        Err(e) => return Err(e.into()),
    };

    server::serve(AppState::new(Arc::new(settings), api)).await
}

async fn list_materials(settings: &Settings) -> Result<()> {
    let catalog = Catalog::load(&settings.materials_file).await?;

    println!("📚 Materials ({}):", catalog.len());

    if catalog.is_empty() {
        println!("   No materials found in {}.", settings.materials_file.display());
        return Ok(());
    }

    for (id, material) in catalog.iter() {
        println!("   📄 {} - {} ({}, {} characters)",
            id,
            material.title,
            material.filename,
            material.content.chars().count()
        );
    }

    Ok(())
}
