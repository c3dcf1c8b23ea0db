use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pharma_stock::{
    auth::{AuthConfig, AuthService},
    config,
    openapi::documented_routes,
    reports::{endpoint_diff, openapi_markdown},
};

#[derive(Parser)]
#[command(
    name = "stock-tools",
    about = "Documentation and operator tools for pharma-stock",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare a route listing with an OpenAPI document
    EndpointDiff {
        /// Route listing: JSON rows of {url, method} or one path per line
        routes: PathBuf,
        /// OpenAPI document (YAML or JSON)
        openapi: PathBuf,
        #[arg(long, default_value = "endpoint_diff")]
        out: PathBuf,
    },
    /// Render an OpenAPI document as a markdown endpoint reference
    OpenapiMd {
        #[arg(default_value = "openapi.yaml")]
        openapi: PathBuf,
        /// CSV describing external APIs the service consumes
        #[arg(long)]
        apis_csv: Option<PathBuf>,
        #[arg(long, default_value = "docs/ENDPOINTS.md")]
        out: PathBuf,
    },
    /// List the routes this service documents
    Routes {
        #[arg(long, value_enum, default_value = "json")]
        format: RouteFormat,
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Mint a bearer token with the configured secret
    Token {
        /// Acting identity recorded on movements
        #[arg(long)]
        subject: String,
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RouteFormat {
    Json,
    Text,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    config::init_tracing("info", false);

    match cli.command {
        Commands::EndpointDiff {
            routes,
            openapi,
            out,
        } => {
            let report = endpoint_diff::run(&routes, &openapi, &out)
                .context("endpoint comparison failed")?;
            println!(
                "OK - {} only in routes, {} only in OpenAPI; reports in {}",
                report.only_in_routes.len(),
                report.only_in_openapi.len(),
                out.display()
            );
        }
        Commands::OpenapiMd {
            openapi,
            apis_csv,
            out,
        } => {
            openapi_markdown::run(&openapi, &out, apis_csv.as_deref())
                .context("rendering the endpoint reference failed")?;
            println!("Generated: {}", out.display());
        }
        Commands::Routes { format, out } => {
            let routes = documented_routes()?;
            let body = match format {
                RouteFormat::Json => serde_json::to_string_pretty(&routes)?,
                RouteFormat::Text => routes
                    .iter()
                    .map(|r| format!("{} {}", r.method, r.url))
                    .collect::<Vec<_>>()
                    .join("\n"),
            };
            match out {
                Some(path) => {
                    fs::write(&path, body)
                        .with_context(|| format!("cannot write {}", path.display()))?;
                    println!("{} routes written to {}", routes.len(), path.display());
                }
                None => println!("{}", body),
            }
        }
        Commands::Token { subject, name } => {
            let cfg = config::load_config().context("failed to load configuration")?;
            let auth = AuthService::new(AuthConfig::from_app_config(&cfg));
            let token = auth
                .issue_token(&subject, name.as_deref())
                .context("cannot issue token")?;
            println!("{}", token);
        }
    }

    Ok(())
}
