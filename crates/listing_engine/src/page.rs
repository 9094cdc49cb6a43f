//! Per-page listing discovery and extraction.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use listing_core::{discover_listings, ExtractOutcome, ListingRecord, RecordExtractor, RejectReason};
use scraper::{ElementRef, Html};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedCandidate {
    /// Position among the page's candidates.
    pub index: usize,
    pub reason: RejectReason,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageExtraction {
    /// Container selector that located the candidates.
    pub container: Option<String>,
    pub candidates: usize,
    /// Accepted records in document order.
    pub records: Vec<ListingRecord>,
    pub rejected: Vec<RejectedCandidate>,
}

/// Discover listing elements in `document` and extract each one.
///
/// With more than one worker, candidates are serialized back to markup and
/// re-parsed on a scoped thread pool, since a parsed document cannot cross
/// threads. Output order is document order either way.
pub fn extract_page(
    document: &Html,
    extractor: &RecordExtractor,
    workers: usize,
) -> PageExtraction {
    let discovery = discover_listings(document, extractor.registry());
    let candidates = discovery.elements.len();

    let outcomes: Vec<Option<ExtractOutcome>> = if workers <= 1 || candidates <= 1 {
        discovery
            .elements
            .iter()
            .map(|element| Some(extractor.extract_outcome(*element)))
            .collect()
    } else {
        let snippets: Vec<String> = discovery
            .elements
            .iter()
            .map(|element| element.html())
            .collect();
        extract_parallel(&snippets, extractor, workers)
    };

    let mut extraction = PageExtraction {
        container: discovery.selector,
        candidates,
        ..PageExtraction::default()
    };
    for (index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Some(ExtractOutcome::Accepted(record)) => extraction.records.push(record),
            Some(ExtractOutcome::Rejected { reason, draft }) => {
                extraction.rejected.push(RejectedCandidate {
                    index,
                    reason,
                    title: draft.title,
                });
            }
            None => {}
        }
    }
    extraction
}

fn extract_parallel(
    snippets: &[String],
    extractor: &RecordExtractor,
    workers: usize,
) -> Vec<Option<ExtractOutcome>> {
    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel();

    thread::scope(|scope| {
        for _ in 0..workers.min(snippets.len()) {
            let tx = tx.clone();
            let next = &next;
            scope.spawn(move || loop {
                let index = next.fetch_add(1, Ordering::Relaxed);
                let Some(snippet) = snippets.get(index) else {
                    break;
                };
                if tx.send((index, extract_snippet(snippet, extractor))).is_err() {
                    break;
                }
            });
        }
    });
    drop(tx);

    let mut results: Vec<Option<ExtractOutcome>> = vec![None; snippets.len()];
    for (index, outcome) in rx {
        results[index] = outcome;
    }
    results
}

fn extract_snippet(snippet: &str, extractor: &RecordExtractor) -> Option<ExtractOutcome> {
    let fragment = Html::parse_fragment(snippet);
    let element = fragment.root_element().children().find_map(ElementRef::wrap)?;
    Some(extractor.extract_outcome(element))
}
