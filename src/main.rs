use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};

use vitibrasil_ingest::app::service::DEFAULT_PAGE_SIZE;
use vitibrasil_ingest::{logging, Dataset, Page, Settings, VitibrasilService};

#[derive(Parser)]
#[command(name = "vitibrasil")]
#[command(about = "Vitibrasil viticulture statistics ingestion")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = vitibrasil_ingest::config::DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch (or reuse from cache) one dataset and print a page of it as JSON
    Fetch {
        /// production, processing, marketing, importation or exportation
        #[arg(long)]
        dataset: Dataset,
        /// 1-based page number
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: usize,
    },
    /// Show cache entry and circuit state of every dataset
    CacheStatus,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", out);
    Ok(())
}

fn print_page<T: Serialize>(records: Vec<T>, page: usize, page_size: usize) -> anyhow::Result<()> {
    print_json(&Page::slice(records, page, page_size)?)
}

async fn fetch(
    service: &VitibrasilService,
    dataset: Dataset,
    page: usize,
    page_size: usize,
) -> anyhow::Result<()> {
    info!(%dataset, page, page_size, "Fetching dataset");
    match dataset {
        Dataset::Production => print_page(service.production().await?, page, page_size),
        Dataset::Processing => print_page(service.processing().await?, page, page_size),
        Dataset::Marketing => print_page(service.marketing().await?, page, page_size),
        Dataset::Importation => print_page(service.importation().await?, page, page_size),
        Dataset::Exportation => print_page(service.exportation().await?, page, page_size),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load_from(std::path::Path::new(&cli.config))
        .with_context(|| format!("Failed to load settings from {}", cli.config))?;
    logging::init_logging(&settings.log_dir);

    let service = VitibrasilService::from_settings(settings)?;

    match cli.command {
        Commands::Fetch {
            dataset,
            page,
            page_size,
        } => {
            if let Err(e) = fetch(&service, dataset, page, page_size).await {
                error!(%dataset, error = %e, "Fetch failed");
                return Err(e);
            }
        }
        Commands::CacheStatus => {
            print_json(&service.cache_status().await)?;
        }
    }
    Ok(())
}
