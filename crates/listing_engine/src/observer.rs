use listing_logging::{listing_debug, listing_error, listing_info, listing_warn};

use crate::types::{ScrapeEvent, StopReason};

/// Receives progress events from the fetch controller and pagination driver.
pub trait ScrapeObserver: Send + Sync {
    fn emit(&self, event: ScrapeEvent);
}

/// Forwards every event to the global logger.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl ScrapeObserver for LoggingObserver {
    fn emit(&self, event: ScrapeEvent) {
        match event {
            ScrapeEvent::PageStarted { page, url } => {
                listing_info!("Scraping page {page}: {url}");
            }
            ScrapeEvent::AttemptFailed {
                failure,
                max_attempts,
            } => {
                listing_warn!(
                    "Attempt {}/{} for {} failed: {}",
                    failure.attempt,
                    max_attempts,
                    failure.url,
                    failure.error
                );
            }
            ScrapeEvent::PageFetched {
                url,
                attempts,
                byte_len,
                encoding,
            } => {
                listing_debug!(
                    "Fetched {url} ({byte_len} bytes, {encoding}) after {attempts} attempt(s)"
                );
            }
            ScrapeEvent::PageExhausted { url, attempts } => {
                listing_error!("Giving up on {url} after {attempts} attempt(s)");
            }
            ScrapeEvent::NoListings { page, url } => {
                listing_warn!("No listing elements found on page {page} ({url})");
            }
            ScrapeEvent::PageExtracted {
                page,
                container,
                candidates,
                accepted,
            } => {
                listing_info!(
                    "Page {page}: {accepted} of {candidates} '{container}' elements accepted"
                );
            }
            ScrapeEvent::RecordRejected {
                page,
                index,
                reason,
                title,
            } => {
                listing_debug!(
                    "Page {page} element {index} rejected ({reason}): {}",
                    title.as_deref().unwrap_or("<untitled>")
                );
            }
            ScrapeEvent::RunFinished {
                pages,
                records,
                stop,
            } => match stop {
                StopReason::Cancelled { .. } => {
                    listing_warn!("Run cancelled after {pages} page(s), {records} records kept");
                }
                _ => {
                    listing_info!("Run finished after {pages} page(s) ({stop}), {records} records");
                }
            },
        }
    }
}
