//! Propagate ownership tags from EC2 instances and their source images onto
//! the load balancers that front them.
//!
//! # Concepts
//!
//! A small fixed set of "global" tag keys (by default `Application`,
//! `Environment`, `Version`) must be present on every load balancer for cost
//! allocation and inventory reporting. Each run enumerates the load balancers
//! in the region, skips the fully tagged ones, and derives the missing tags
//! for the rest from the first bound instance and that instance's AMI.
//!
//! Runs are stateless and idempotent; this is meant to be invoked
//! periodically from cron or a scheduler.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info};
use tracing_subscriber::{Layer, filter::filter_fn, fmt, layer::SubscriberExt};

mod cloud;
mod config;
mod error;
mod resource;
mod sync;
mod tags;

use crate::cloud::{ExplicitCredentials, open_cloud};
use crate::config::Config;
use crate::error::{Error, Result};

static VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "elb-tagger")]
#[command(about = "Propagate instance and image tags onto load balancers")]
struct Cli {
    /// Compute tags but don't change anything in AWS.
    #[arg(long)]
    dry_run: bool,

    /// AWS access key id, instead of the default credential chain.
    #[arg(long, requires = "secret_key")]
    access_key: Option<String>,

    /// AWS secret access key, paired with --access-key.
    #[arg(long, requires = "access_key")]
    secret_key: Option<String>,

    /// Path to elb-tagger configuration file.
    ///
    /// If not provided, the default is ~/.config/elb-tagger.toml. If that does
    /// not exist, built-in defaults will be used.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    match inner_main().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn inner_main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing();

    let config = Config::new(&cli.config)?;
    debug!(?config);
    let credentials = match (cli.access_key, cli.secret_key) {
        (Some(access_key), Some(secret_key)) => Some(ExplicitCredentials {
            access_key,
            secret_key,
        }),
        _ => None,
    };
    let cloud = open_cloud(&config, credentials, cli.dry_run).await?;

    let policy = config.tag_policy();
    let summary = sync::tag_load_balancers(cloud.as_ref(), &policy).await?;
    info!(?summary, "Tagging pass complete");
    println!("{}", serde_json::to_string_pretty(&summary).unwrap());
    Ok(())
}

fn setup_tracing() {
    let stderr_layer = fmt::Layer::new()
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_filter(filter_fn(|metadata| {
            // AWS SDK logs are very verbose so we only want to see our own logs.
            metadata.target().starts_with("elb_tagger")
        }))
        .with_filter(LevelFilter::INFO);
    tracing::subscriber::set_global_default(tracing_subscriber::registry().with(stderr_layer))
        .unwrap();
}
