use std::sync::Arc;

use anyhow::Context;
use chrono::Local;
use listing_core::{PatternRegistry, RecordExtractor, RecordValidator, RunStats};
use listing_engine::{
    export_records, CancellationToken, LoggingObserver, PageFetchController, PaginationDriver,
    ReqwestTransport, ScrapeObserver,
};
use listing_logging::{listing_info, listing_warn};

use crate::config::ScraperConfig;

/// Scrape, export and summarise one run.
///
/// Setup problems abort before the first request. Once pages are being
/// fetched, the run always ends in an export, possibly an empty one.
pub async fn run(config: ScraperConfig) -> anyhow::Result<RunStats> {
    let registry =
        PatternRegistry::compile(&config.patterns).context("invalid pattern configuration")?;
    let extractor = RecordExtractor::new(
        Arc::new(registry),
        RecordValidator::new(config.bounds.clone()),
    );

    let cancel = CancellationToken::new();
    tokio::spawn(watch_for_interrupt(cancel.clone()));

    let observer: Arc<dyn ScrapeObserver> = Arc::new(LoggingObserver);
    let controller = PageFetchController::new(
        Arc::new(ReqwestTransport::new(config.transport_settings())),
        observer.clone(),
        config.retry_policy(),
        cancel,
    );
    let driver = PaginationDriver::new(
        config.pagination_settings(),
        controller,
        extractor,
        observer,
    )
    .context("invalid pagination configuration")?;

    listing_info!(
        "Starting to scrape up to {} pages from {}",
        config.max_pages,
        config.base_url
    );
    let report = driver.run().await;
    let failed_pages = report.pages.iter().filter(|p| !p.fetched).count();
    if failed_pages > 0 {
        listing_warn!("{failed_pages} page(s) could not be fetched");
    }

    let records = report.accumulator.into_records();
    let summary = export_records(&records, &config.export_options(), Local::now())
        .context("failed to export records")?;
    for file in &summary.files {
        listing_info!("Data exported to {}", file.display());
    }

    Ok(RunStats::from_records(&records))
}

async fn watch_for_interrupt(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        listing_warn!("Interrupt received, stopping after the current page");
        cancel.cancel();
    }
}
