use std::process;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cluster_teardown::cli::{format_forbidden_hint, format_report, Args};
use cluster_teardown::client::{HttpControlPlane, ResourceClient};
use cluster_teardown::context::{load_config, load_config_from};
use cluster_teardown::teardown::{locate_cluster, Orchestrator};

#[tokio::main]
async fn main() {
    let mut args = Args::parse();

    // Initialize logging
    let filter = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    // Load .env file if specified, then re-read env fallbacks
    if let Some(ref env_file) = args.env_file {
        if let Err(e) = dotenvy::from_path(env_file) {
            error!("Failed to load env file {}: {}", env_file.display(), e);
            process::exit(1);
        }
        args = Args::parse();
    }

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    }
    .context("Failed to load config")?;

    let conn = config.resolve(&args.overrides())?;
    let api = HttpControlPlane::connect(&conn)?;
    info!("Connecting to {}", api.base_url());

    let client = ResourceClient::new(Arc::new(api));
    if let Err(e) = client.ping().await {
        if e.status() == Some(403) {
            if let Some(hint) = format_forbidden_hint(conn.has_identity()) {
                eprintln!("{}", hint);
            }
        }
        return Err(e).context("Failed to reach the control plane");
    }

    let cluster = locate_cluster(&client, &args.selector()).await?;
    let orchestrator = Orchestrator::new(client).with_release_config(args.release_config());
    let report = orchestrator.run(cluster, &args.options()).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", format_report(&report));
    }
    Ok(())
}
