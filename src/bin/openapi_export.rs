use std::{fs, path::PathBuf};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use pharma_stock::openapi::ApiDocV1;
use utoipa::OpenApi;

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

#[derive(Parser)]
#[command(name = "openapi-export", about = "Write the pharma-stock OpenAPI document", version)]
struct Cli {
    #[arg(long, value_enum, default_value = "json")]
    format: Format,
    /// Output file; defaults to openapi/pharma-stock.v1.<format>
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let openapi = ApiDocV1::openapi();

    let (body, extension) = match cli.format {
        Format::Json => (serde_json::to_string_pretty(&openapi)?, "json"),
        Format::Yaml => (serde_yml::to_string(&openapi)?, "yaml"),
    };

    let output_path = cli
        .out
        .unwrap_or_else(|| PathBuf::from("openapi").join(format!("pharma-stock.v1.{}", extension)));
    if let Some(dir) = output_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    fs::write(&output_path, body)?;

    println!("OpenAPI document written to {}", output_path.display());
    Ok(())
}
