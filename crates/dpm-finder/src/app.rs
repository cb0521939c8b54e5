use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use anyhow::Context;
use anyhow::Result;
use dpm_core::exposition;
use dpm_core::Collector;
use dpm_core::ExporterRuntime;
use dpm_core::ExporterState;

use crate::config::ExporterArgs;
use crate::config::ReportArgs;
use crate::encoders;
use crate::logging;
use crate::tasks::Tasks;

/// Flatten a collection error report into the binary's error type,
/// keeping the full context chain in the message.
fn collection_error<C>(report: error_stack::Report<C>) -> anyhow::Error {
    anyhow!("{report:?}")
}

/// One collection pass, rendered to a report file.
pub async fn run_report(args: ReportArgs) -> Result<()> {
    logging::init(args.connection.quiet, args.connection.verbose);

    let config = args.connection.to_collector_config()?;
    let quiet = config.quiet;
    if !quiet {
        tracing::info!(
            endpoint = %config.endpoint,
            workers = config.worker_count,
            min_dpm = config.min_rate,
            "Starting one-shot DPM report"
        );
    }

    let collector = Collector::new(config).map_err(collection_error)?;
    let snapshot = collector.run_pass(quiet).await.map_err(collection_error)?;

    let encoder = encoders::for_format(args.format);
    let rendered = encoder.encode(&snapshot);
    let path = args
        .output
        .unwrap_or_else(|| PathBuf::from(encoder.default_path()));
    std::fs::write(&path, &rendered)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;

    if !quiet {
        print!("{rendered}");
    }
    tracing::info!(
        path = %path.display(),
        above_threshold = snapshot.above_threshold(),
        "Report written"
    );

    Ok(())
}

/// Exporter mode: bind the pull endpoint, then run the exposition
/// server and the refresh loop until a shutdown signal arrives.
pub async fn run_exporter(args: ExporterArgs) -> Result<()> {
    logging::init(args.connection.quiet, args.connection.verbose);

    args.validate()?;
    let config = args.connection.to_collector_config()?;

    tracing::info!(
        port = args.port,
        interval_sec = args.update_interval,
        endpoint = %config.endpoint,
        workers = config.worker_count,
        min_dpm = config.min_rate,
        "Starting DPM exporter"
    );

    // Bind before spawning anything so a busy port fails fast.
    let bound = exposition::bind(&args.listen_addr())
        .await
        .map_err(collection_error)?;

    let state = Arc::new(ExporterState::new());
    let collector = Collector::new(config).map_err(collection_error)?;
    let runtime = ExporterRuntime::new(
        collector,
        state.clone(),
        Duration::from_secs(args.update_interval),
    );

    let mut tasks = Tasks::new();
    tasks.spawn_exposition_task(bound, state);
    tasks.spawn_refresh_task(runtime);
    tasks.wait_for_completion().await
}
