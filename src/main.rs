mod db;
mod extract;
mod menu;
mod pdf;
mod reconcile;
mod settings;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;

#[derive(Parser)]
#[command(
    name = "fispq_extractor",
    about = "Extract hazard data from FISPQ documents into SQLite, CSV and JSON stores"
)]
struct Cli {
    /// Settings file (defaults to ./fispq.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let settings = settings::Settings::load(cli.config.as_deref())?;

    ensure_parent(&settings.db_path)?;
    ensure_parent(&settings.csv_path)?;
    fs::create_dir_all(&settings.snapshot_dir)?;

    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;

    menu::run(&conn, &settings)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
