use anyhow::Result;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::fs;
use std::path::Path;

mod models;
mod repositories;
pub mod services;
pub mod settings;

use repositories::Repositories;
use settings::StoreBackend;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    /// Overrides `http.listen` from the config file.
    #[arg(short, long)]
    listen: Option<String>,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    init_logging(&args.log4rs)?;
    let mut settings = settings::Settings::new(&args.config)
        .map_err(|e| anyhow::anyhow!("Could not load config file: {}", e))?;
    if let Some(listen) = args.listen {
        settings.http.listen = listen;
    }

    let repositories = match settings.store.backend {
        StoreBackend::Postgres => {
            let postgres = settings
                .postgres
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("Postgres backend selected without [postgres]."))?;
            let pool = PgPoolOptions::new()
                .max_connections(postgres.max_connections)
                .connect(&postgres.url)
                .await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            log::info!("Connected to Postgres, schema up to date.");
            Repositories::postgres(pool)
        }
        StoreBackend::Memory => {
            log::warn!("Using the in-memory store; data is lost on exit.");
            Repositories::memory()
        }
    };

    log::info!("Starting services.");
    services::start_services(repositories, settings).await
}

fn init_logging(path: &str) -> Result<(), anyhow::Error> {
    if !Path::new("logs").exists() {
        fs::create_dir("logs")?;
    }

    match log4rs::init_file(path, Default::default()) {
        Ok(_) => {
            println!("[*] Logging initialized successfully.");
            Ok(())
        }
        Err(e) => {
            println!("[ERROR] Failed to initialize logging: {}", e);
            Err(anyhow::anyhow!("Could not initialize logging: {}", e))
        }
    }
}
