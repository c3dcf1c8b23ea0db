use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use pharma_stock::migrator;

#[derive(Parser)]
#[command(name = "migration", about = "Apply or roll back the pharma-stock schema", version)]
struct Cli {
    /// Database URL; falls back to DATABASE_URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://pharma_stock.db?mode=rwc")]
    database_url: String,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending migrations (default)
    Up,
    /// Roll back every migration
    Down,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    info!("Starting database migration");

    match cli.command.unwrap_or(Command::Up) {
        Command::Up => migrator::run_migration(&cli.database_url).await?,
        Command::Down => migrator::reset_migration(&cli.database_url).await?,
    }

    info!("Migration completed successfully");
    Ok(())
}
