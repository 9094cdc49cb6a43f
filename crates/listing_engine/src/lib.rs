//! Listing engine: HTTP transport, retrying page fetches, pagination and export.
mod controller;
mod decode;
mod driver;
mod export;
mod fetch;
mod observer;
mod page;
mod types;

pub use controller::{FetchOutcome, FetchedDocument, PageFetch, PageFetchController, RetryPolicy};
pub use decode::{decode_page, DecodeError, DecodedPage};
pub use driver::{
    DriverError, PageReport, PaginationDriver, PaginationSettings, RunAccumulator, RunReport,
};
pub use export::{
    ensure_output_dir, export_records, AtomicFileWriter, ExportError, ExportFormat, ExportOptions,
    ExportSummary, PersistError,
};
pub use fetch::{ReqwestTransport, Transport, TransportSettings, DEFAULT_USER_AGENT};
pub use observer::{LoggingObserver, ScrapeObserver};
pub use page::{extract_page, PageExtraction, RejectedCandidate};
pub use types::{
    FailureKind, FetchAttempt, FetchError, FetchMetadata, FetchOutput, ScrapeEvent, StopReason,
};

pub use tokio_util::sync::CancellationToken;
