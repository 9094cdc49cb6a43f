use std::fmt;

use listing_core::RejectReason;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub original_url: String,
    pub final_url: String,
    pub redirect_count: usize,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    InvalidHeader { name: String },
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Decode,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::InvalidHeader { name } => write!(f, "invalid header {name}"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Decode => write!(f, "undecodable body"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

/// One failed try at fetching a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchAttempt {
    pub url: String,
    /// 1-based.
    pub attempt: u32,
    pub error: FetchError,
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every configured page was visited.
    Completed,
    /// `page` yielded no accepted records and the run stops on empty pages.
    EmptyPage { page: u32 },
    /// Cancellation was observed before `page` was fetched.
    Cancelled { page: u32 },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Completed => write!(f, "all pages visited"),
            StopReason::EmptyPage { page } => write!(f, "page {page} was empty"),
            StopReason::Cancelled { page } => write!(f, "cancelled before page {page}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeEvent {
    PageStarted {
        page: u32,
        url: String,
    },
    AttemptFailed {
        failure: FetchAttempt,
        max_attempts: u32,
    },
    PageFetched {
        url: String,
        attempts: u32,
        byte_len: u64,
        encoding: String,
    },
    PageExhausted {
        url: String,
        attempts: u32,
    },
    NoListings {
        page: u32,
        url: String,
    },
    PageExtracted {
        page: u32,
        container: String,
        candidates: usize,
        accepted: usize,
    },
    RecordRejected {
        page: u32,
        index: usize,
        reason: RejectReason,
        title: Option<String>,
    },
    RunFinished {
        pages: u32,
        records: usize,
        stop: StopReason,
    },
}
