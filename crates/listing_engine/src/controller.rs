//! Single-page fetch with bounded retries.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::decode::decode_page;
use crate::fetch::Transport;
use crate::observer::ScrapeObserver;
use crate::types::{FailureKind, FetchAttempt, FetchError, FetchMetadata, ScrapeEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries per page, first one included. Zero is treated as one.
    pub max_attempts: u32,
    /// Fixed pause between two tries.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(5),
        }
    }
}

/// A decoded page, ready for DOM parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    pub html: String,
    pub encoding: String,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched(FetchedDocument),
    /// Every attempt failed.
    Exhausted,
    /// Cancellation was observed before an attempt could start.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFetch {
    pub url: String,
    pub outcome: FetchOutcome,
    /// Failures in attempt order; a successful fetch may still carry some.
    pub failed_attempts: Vec<FetchAttempt>,
}

impl PageFetch {
    pub fn document(&self) -> Option<&FetchedDocument> {
        match &self.outcome {
            FetchOutcome::Fetched(document) => Some(document),
            _ => None,
        }
    }
}

pub struct PageFetchController {
    transport: Arc<dyn Transport>,
    observer: Arc<dyn ScrapeObserver>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl PageFetchController {
    pub fn new(
        transport: Arc<dyn Transport>,
        observer: Arc<dyn ScrapeObserver>,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            observer,
            policy,
            cancel,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fetch and decode `url`, retrying transport, status and decode failures.
    ///
    /// The backoff is slept only between attempts, never after the last one.
    pub async fn fetch(&self, url: &str) -> PageFetch {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut failed_attempts = Vec::new();

        for attempt in 1..=max_attempts {
            if self.cancel.is_cancelled() {
                return PageFetch {
                    url: url.to_string(),
                    outcome: FetchOutcome::Cancelled,
                    failed_attempts,
                };
            }

            match self.try_once(url).await {
                Ok(document) => {
                    self.observer.emit(ScrapeEvent::PageFetched {
                        url: url.to_string(),
                        attempts: attempt,
                        byte_len: document.metadata.byte_len,
                        encoding: document.encoding.clone(),
                    });
                    return PageFetch {
                        url: url.to_string(),
                        outcome: FetchOutcome::Fetched(document),
                        failed_attempts,
                    };
                }
                Err(error) => {
                    let failure = FetchAttempt {
                        url: url.to_string(),
                        attempt,
                        error,
                    };
                    self.observer.emit(ScrapeEvent::AttemptFailed {
                        failure: failure.clone(),
                        max_attempts,
                    });
                    failed_attempts.push(failure);
                }
            }

            if attempt < max_attempts && !self.policy.backoff.is_zero() {
                tokio::time::sleep(self.policy.backoff).await;
            }
        }

        self.observer.emit(ScrapeEvent::PageExhausted {
            url: url.to_string(),
            attempts: max_attempts,
        });
        PageFetch {
            url: url.to_string(),
            outcome: FetchOutcome::Exhausted,
            failed_attempts,
        }
    }

    async fn try_once(&self, url: &str) -> Result<FetchedDocument, FetchError> {
        let output = self.transport.get(url).await?;
        let decoded = decode_page(&output.bytes, output.metadata.content_type.as_deref())
            .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))?;
        Ok(FetchedDocument {
            html: decoded.html,
            encoding: decoded.encoding_label,
            metadata: output.metadata,
        })
    }
}
