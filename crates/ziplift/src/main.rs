use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod pipeline;
mod ui;

use cli::{App, Commands};
use config::Config;

const DEFAULT_FILTER: &str = "ziplift=info,ziplift_fs=info,ziplift_archive=info,ziplift_upload=info";
const VERBOSE_FILTER: &str =
    "ziplift=debug,ziplift_fs=debug,ziplift_archive=debug,ziplift_upload=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app = App::parse();

    let default = if app.verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling");
                cancel.cancel();
            }
        }
    });

    let config = Config::load(app.config.as_deref(), app.cmd.overrides())
        .context("failed to load configuration")?;
    tracing::debug!(?config, "configuration loaded");

    match app.cmd {
        Commands::Run(_) => pipeline::run(&config, cancel).await,
        Commands::Extract(args) => {
            pipeline::extract(args.archive, args.destination, config.extract_options(cancel))
                .await
                .map(|_| ())
        }
        Commands::Tree(args) => pipeline::print_tree(&args.directory),
        Commands::Upload(args) => {
            let jobs =
                pipeline::upload_jobs(&args.directories, config.bucket()?, &config.upload.prefix)?;
            pipeline::upload(jobs, &config, cancel).await
        }
    }
}
