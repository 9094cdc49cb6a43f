//! Page sequencing for one scrape run.

use std::sync::Arc;
use std::time::Duration;

use listing_core::{ListingRecord, RecordExtractor};
use scraper::Html;
use url::Url;

use crate::controller::{FetchOutcome, FetchedDocument, PageFetchController};
use crate::observer::ScrapeObserver;
use crate::page::{extract_page, PageExtraction};
use crate::types::{ScrapeEvent, StopReason};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationSettings {
    pub base_url: String,
    pub max_pages: u32,
    /// Query parameter carrying the page number from page 2 on.
    pub page_param: String,
    pub page_delay: Duration,
    pub stop_on_empty_page: bool,
    pub extraction_workers: usize,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DriverError {
    #[error("invalid base url {url:?}: {message}")]
    InvalidBaseUrl { url: String, message: String },
}

/// Accepted records of a run, in page order then element order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunAccumulator {
    records: Vec<ListingRecord>,
}

impl RunAccumulator {
    pub fn push_page(&mut self, records: Vec<ListingRecord>) {
        self.records.extend(records);
    }

    pub fn records(&self) -> &[ListingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<ListingRecord> {
        self.records
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageReport {
    pub page: u32,
    pub url: String,
    /// False when every fetch attempt failed or the run was cancelled mid-page.
    pub fetched: bool,
    pub failed_attempts: usize,
    pub candidates: usize,
    pub accepted: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub accumulator: RunAccumulator,
    pub pages: Vec<PageReport>,
    pub stop: StopReason,
}

pub struct PaginationDriver {
    settings: PaginationSettings,
    base_url: Url,
    controller: PageFetchController,
    extractor: RecordExtractor,
    observer: Arc<dyn ScrapeObserver>,
}

impl PaginationDriver {
    pub fn new(
        settings: PaginationSettings,
        controller: PageFetchController,
        extractor: RecordExtractor,
        observer: Arc<dyn ScrapeObserver>,
    ) -> Result<Self, DriverError> {
        let base_url = Url::parse(&settings.base_url).map_err(|err| DriverError::InvalidBaseUrl {
            url: settings.base_url.clone(),
            message: err.to_string(),
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(DriverError::InvalidBaseUrl {
                url: settings.base_url.clone(),
                message: format!("unsupported scheme {}", base_url.scheme()),
            });
        }
        Ok(Self {
            settings,
            base_url,
            controller,
            extractor,
            observer,
        })
    }

    /// Page 1 is the base URL itself; later pages add the page parameter.
    pub fn page_url(&self, page: u32) -> String {
        if page <= 1 {
            return self.settings.base_url.clone();
        }
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair(&self.settings.page_param, &page.to_string());
        url.to_string()
    }

    pub async fn run(&self) -> RunReport {
        let mut accumulator = RunAccumulator::default();
        let mut pages = Vec::new();
        let mut stop = StopReason::Completed;

        for page in 1..=self.settings.max_pages {
            if self.controller.is_cancelled() {
                stop = StopReason::Cancelled { page };
                break;
            }

            let url = self.page_url(page);
            self.observer.emit(ScrapeEvent::PageStarted {
                page,
                url: url.clone(),
            });

            let fetch = self.controller.fetch(&url).await;
            let extraction = match &fetch.outcome {
                FetchOutcome::Fetched(document) => self.extract(page, &url, document),
                FetchOutcome::Exhausted | FetchOutcome::Cancelled => PageExtraction::default(),
            };

            let accepted = extraction.records.len();
            pages.push(PageReport {
                page,
                url,
                fetched: fetch.document().is_some(),
                failed_attempts: fetch.failed_attempts.len(),
                candidates: extraction.candidates,
                accepted,
                rejected: extraction.rejected.len(),
            });
            accumulator.push_page(extraction.records);

            if fetch.outcome == FetchOutcome::Cancelled {
                stop = StopReason::Cancelled { page };
                break;
            }
            if accepted == 0 && self.settings.stop_on_empty_page {
                stop = StopReason::EmptyPage { page };
                break;
            }
            if page < self.settings.max_pages && !self.settings.page_delay.is_zero() {
                tokio::time::sleep(self.settings.page_delay).await;
            }
        }

        self.observer.emit(ScrapeEvent::RunFinished {
            pages: pages.len() as u32,
            records: accumulator.len(),
            stop,
        });
        RunReport {
            accumulator,
            pages,
            stop,
        }
    }

    fn extract(&self, page: u32, url: &str, document: &FetchedDocument) -> PageExtraction {
        let html = Html::parse_document(&document.html);
        let extraction = extract_page(&html, &self.extractor, self.settings.extraction_workers);

        match &extraction.container {
            None => self.observer.emit(ScrapeEvent::NoListings {
                page,
                url: url.to_string(),
            }),
            Some(container) => self.observer.emit(ScrapeEvent::PageExtracted {
                page,
                container: container.clone(),
                candidates: extraction.candidates,
                accepted: extraction.records.len(),
            }),
        }
        for rejected in &extraction.rejected {
            self.observer.emit(ScrapeEvent::RecordRejected {
                page,
                index: rejected.index,
                reason: rejected.reason,
                title: rejected.title.clone(),
            });
        }
        extraction
    }
}
