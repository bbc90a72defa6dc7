use std::sync::Arc;

use anyhow::{Context, Result};
use segsync::{CancelFlag, IntegrityVerifier, LocalLayout, MinSizeVerifier, ProgressChannel};
use segsync_engine::{
    BatchError, BatchOrchestrator, BatchReport, CommandDeltaApplier, CommandVerifier,
    SegmentSynchronizer,
};
use segsync_http::HttpFetcher;

use crate::config::AppConfig;
use crate::progress::TerminalProgress;

/// Print the per-item results of a finished batch.
pub fn print_report(report: &BatchReport) {
    for file in &report.ancillary_updated {
        println!("  {file}: refreshed");
    }
    for (name, outcome) in &report.segments {
        println!("  {name}: {outcome}");
    }
}

/// Run one batch, drawing progress on the terminal. Ctrl-C cancels it.
pub async fn run(config: &AppConfig, segments: &[String], use_delta: bool) -> Result<()> {
    let base_dir = config.base_dir()?;
    let progress = Arc::new(TerminalProgress::new());
    let flag = CancelFlag::new();
    let channel = ProgressChannel::new(progress.clone(), Arc::new(flag.clone()));

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping");
            flag.cancel();
        }
    });

    let fetcher = HttpFetcher::new(config.download.clone(), channel.clone())
        .context("failed to set up HTTP client")?;

    let verifier: Arc<dyn IntegrityVerifier> =
        match CommandVerifier::from_argv(&config.tools.verify) {
            Some(verifier) => Arc::new(verifier),
            None => Arc::new(MinSizeVerifier::new(config.min_segment_size.max(1))),
        };

    let mut synchronizer = SegmentSynchronizer::new(
        Arc::new(fetcher),
        verifier,
        LocalLayout::new(&base_dir),
        config.server.remote(),
        channel,
    );
    match CommandDeltaApplier::from_argv(&config.tools.delta_apply) {
        Some(applier) if use_delta => {
            synchronizer = synchronizer.with_delta_applier(Arc::new(applier));
        }
        Some(_) => tracing::info!("delta updates disabled"),
        None => tracing::info!("no delta tool configured, downloading segments in full"),
    }

    println!(
        "Updating {} segment(s) in {}",
        segments.len(),
        base_dir.display()
    );

    let result = BatchOrchestrator::new(synchronizer)
        .run(&config.server.ancillary(), segments)
        .await;
    progress.finish();

    match result {
        Ok(report) => {
            print_report(&report);
            println!("Done.");
            Ok(())
        }
        Err(BatchError::Cancelled { item }) => anyhow::bail!("cancelled while updating {item}"),
        Err(e) => Err(e.into()),
    }
}
