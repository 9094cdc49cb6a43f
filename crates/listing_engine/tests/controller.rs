use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use listing_engine::{
    CancellationToken, FailureKind, FetchError, FetchMetadata, FetchOutcome, FetchOutput,
    PageFetchController, RetryPolicy, ScrapeEvent, ScrapeObserver, Transport,
};
use pretty_assertions::assert_eq;

const URL: &str = "https://listings.test/venta";

#[derive(Default)]
struct TestObserver {
    events: Mutex<Vec<ScrapeEvent>>,
}

impl TestObserver {
    fn take(&self) -> Vec<ScrapeEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ScrapeObserver for TestObserver {
    fn emit(&self, event: ScrapeEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Replays a fixed sequence of responses, one per call.
struct ScriptedTransport {
    script: Mutex<VecDeque<Result<FetchOutput, FetchError>>>,
    calls: Mutex<u32>,
    /// Cancelled while the first request is in flight.
    cancel_during_call: Option<CancellationToken>,
}

impl ScriptedTransport {
    fn new(script: Vec<Result<FetchOutput, FetchError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(0),
            cancel_during_call: None,
        }
    }

    fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_during_call = Some(token);
        self
    }

    fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, _url: &str) -> Result<FetchOutput, FetchError> {
        *self.calls.lock().unwrap() += 1;
        if let Some(token) = &self.cancel_during_call {
            token.cancel();
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::new(FailureKind::Network, "script exhausted")))
    }
}

fn html(body: &[u8], content_type: &str) -> Result<FetchOutput, FetchError> {
    Ok(FetchOutput {
        bytes: body.to_vec(),
        metadata: FetchMetadata {
            original_url: URL.to_string(),
            final_url: URL.to_string(),
            redirect_count: 0,
            content_type: Some(content_type.to_string()),
            byte_len: body.len() as u64,
        },
    })
}

fn network_error() -> Result<FetchOutput, FetchError> {
    Err(FetchError::new(FailureKind::Network, "connection reset"))
}

fn controller(
    transport: Arc<ScriptedTransport>,
    observer: Arc<TestObserver>,
    max_attempts: u32,
    cancel: CancellationToken,
) -> PageFetchController {
    PageFetchController::new(
        transport,
        observer,
        RetryPolicy {
            max_attempts,
            backoff: Duration::ZERO,
        },
        cancel,
    )
}

#[tokio::test]
async fn two_failures_then_success_keeps_both_failures() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        network_error(),
        Err(FetchError::new(FailureKind::HttpStatus(503), "unavailable")),
        html(b"<html><body>ok</body></html>", "text/html; charset=utf-8"),
    ]));
    let observer = Arc::new(TestObserver::default());
    let controller = controller(transport.clone(), observer.clone(), 3, CancellationToken::new());

    let fetch = controller.fetch(URL).await;

    let document = fetch.document().expect("third attempt succeeds");
    assert_eq!(document.html, "<html><body>ok</body></html>");
    assert_eq!(document.encoding, "UTF-8");
    assert_eq!(
        fetch
            .failed_attempts
            .iter()
            .map(|a| (a.attempt, a.error.kind.clone()))
            .collect::<Vec<_>>(),
        vec![
            (1, FailureKind::Network),
            (2, FailureKind::HttpStatus(503))
        ]
    );
    assert_eq!(transport.calls(), 3);

    let events = observer.take();
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, ScrapeEvent::AttemptFailed { .. }))
            .count(),
        2
    );
    assert!(matches!(
        events.last(),
        Some(ScrapeEvent::PageFetched { attempts: 3, .. })
    ));
}

#[tokio::test]
async fn exhaustion_is_reported_once_all_attempts_fail() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        network_error(),
        network_error(),
        network_error(),
        html(b"<html></html>", "text/html"),
    ]));
    let observer = Arc::new(TestObserver::default());
    let controller = controller(transport.clone(), observer.clone(), 3, CancellationToken::new());

    let fetch = controller.fetch(URL).await;

    assert_eq!(fetch.outcome, FetchOutcome::Exhausted);
    assert_eq!(fetch.failed_attempts.len(), 3);
    assert_eq!(transport.calls(), 3);
    assert_eq!(
        observer.take().last(),
        Some(&ScrapeEvent::PageExhausted {
            url: URL.to_string(),
            attempts: 3
        })
    );
}

#[tokio::test]
async fn undecodable_body_is_retried() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        html(b"<p>\xff\xfe broken</p>", "text/html; charset=utf-8"),
        html(b"<p>fine</p>", "text/html; charset=utf-8"),
    ]));
    let observer = Arc::new(TestObserver::default());
    let controller = controller(transport, observer, 3, CancellationToken::new());

    let fetch = controller.fetch(URL).await;

    assert!(fetch.document().is_some());
    assert_eq!(fetch.failed_attempts.len(), 1);
    assert_eq!(fetch.failed_attempts[0].error.kind, FailureKind::Decode);
}

#[tokio::test]
async fn latin1_pages_are_decoded_from_header_charset() {
    let transport = Arc::new(ScriptedTransport::new(vec![html(
        b"<p>\xd1u\xf1oa</p>",
        "text/html; charset=ISO-8859-1",
    )]));
    let observer = Arc::new(TestObserver::default());
    let controller = controller(transport, observer, 1, CancellationToken::new());

    let fetch = controller.fetch(URL).await;
    assert_eq!(fetch.document().map(|d| d.html.as_str()), Some("<p>Ñuñoa</p>"));
}

#[tokio::test]
async fn cancelled_token_prevents_any_attempt() {
    let transport = Arc::new(ScriptedTransport::new(vec![html(b"<html></html>", "text/html")]));
    let observer = Arc::new(TestObserver::default());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let controller = controller(transport.clone(), observer.clone(), 3, cancel);

    let fetch = controller.fetch(URL).await;

    assert_eq!(fetch.outcome, FetchOutcome::Cancelled);
    assert!(fetch.failed_attempts.is_empty());
    assert_eq!(transport.calls(), 0);
    assert!(observer.take().is_empty());
}

#[tokio::test]
async fn cancellation_during_a_failed_attempt_stops_the_retries() {
    let cancel = CancellationToken::new();
    let transport = Arc::new(
        ScriptedTransport::new(vec![
            network_error(),
            html(b"<html></html>", "text/html"),
        ])
        .cancelling(cancel.clone()),
    );
    let observer = Arc::new(TestObserver::default());
    let controller = controller(transport.clone(), observer.clone(), 3, cancel);

    let fetch = controller.fetch(URL).await;

    assert_eq!(fetch.outcome, FetchOutcome::Cancelled);
    assert_eq!(fetch.failed_attempts.len(), 1);
    assert_eq!(transport.calls(), 1);
    assert!(!observer
        .take()
        .iter()
        .any(|e| matches!(e, ScrapeEvent::PageExhausted { .. })));
}

#[tokio::test]
async fn zero_attempts_still_tries_once() {
    let transport = Arc::new(ScriptedTransport::new(vec![html(b"<html></html>", "text/html")]));
    let observer = Arc::new(TestObserver::default());
    let controller = controller(transport.clone(), observer, 0, CancellationToken::new());

    assert!(controller.fetch(URL).await.document().is_some());
    assert_eq!(transport.calls(), 1);
}
