mod app;
mod config;
mod encoders;
mod logging;
mod tasks;

use anyhow::Result;
use clap::Parser;

use crate::config::Cli;
use crate::config::Commands;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();

    match cli.command {
        Commands::Report(report_args) => app::run_report(report_args).await,
        Commands::Exporter(exporter_args) => app::run_exporter(exporter_args).await,
    }
}
