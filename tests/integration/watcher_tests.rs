//! Integration tests for the event-stream watcher
//!
//! Each test runs a local websocket server that plays back a fixed list of
//! frames, then checks what the watcher aggregated and dispatched.

use crawl_conductor::watcher::{WatchOutcome, WatchPhase};
use crawl_conductor::{
    ClientSettings, CrawlClient, CrawlError, CrawlWatcher, Document, EventKind, JobHandle,
    JobState, WatchEvent,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

/// What the server does after sending its frames
#[derive(Clone, Copy)]
enum Ending {
    /// Wait for the client to hang up
    AwaitClose,
    /// Send a close frame straight away
    Close,
}

/// One burst of frames, optionally held back until a gate fires
type Batch = (Option<oneshot::Receiver<()>>, Vec<String>);

/// Starts a single-connection websocket server
///
/// Batches are sent in order. The task resolves to the Authorization header
/// the client presented.
async fn serve(batches: Vec<Batch>, ending: Ending) -> (SocketAddr, JoinHandle<Option<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let task = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let authorization = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&authorization);
        let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            *slot.lock().unwrap() = request
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            Ok(response)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(socket, callback)
            .await
            .unwrap();

        'batches: for (gate, frames) in batches {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            for frame in frames {
                if ws.send(Message::Text(frame)).await.is_err() {
                    break 'batches;
                }
            }
        }

        match ending {
            Ending::AwaitClose => while let Some(Ok(_)) = ws.next().await {},
            Ending::Close => {
                let _ = ws.close(None).await;
            }
        }

        let header = authorization.lock().unwrap().clone();
        header
    });

    (addr, task)
}

fn ws_url(addr: SocketAddr) -> String {
    format!("ws://{}/v1/crawl/job1", addr)
}

fn doc(name: &str) -> Document {
    Document::new(json!({ "markdown": name }))
}

fn frame(value: serde_json::Value) -> String {
    value.to_string()
}

fn record(watcher: &CrawlWatcher, kind: EventKind) -> Arc<Mutex<Vec<WatchEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    watcher.on(kind, move |event| sink.lock().unwrap().push(event.clone()));
    seen
}

#[tokio::test]
async fn test_watch_through_client_until_done() {
    let (addr, server) = serve(
        vec![(
            None,
            vec![
                frame(json!({"type": "catchup", "data": {"status": "scraping", "total": 3, "data": [doc("d1")]}})),
                frame(json!({"type": "document", "data": doc("d2")})),
                frame(json!({"type": "document", "data": doc("d3")})),
                frame(json!({"type": "done"})),
            ],
        )],
        Ending::AwaitClose,
    )
    .await;

    let client = CrawlClient::new(
        ClientSettings::new("fc-test").with_base_url(format!("http://{}", addr)),
    )
    .unwrap();
    let mut watcher = client.watch(JobHandle::new("job1")).unwrap();
    assert_eq!(watcher.ws_url(), ws_url(addr));

    let documents = record(&watcher, EventKind::Document);
    let done = record(&watcher, EventKind::Done);
    let errors = record(&watcher, EventKind::Error);

    let outcome = watcher.connect().await.expect("watch should connect");
    assert_eq!(outcome, WatchOutcome::Completed);

    let expected = vec![doc("d1"), doc("d2"), doc("d3")];
    assert_eq!(watcher.session().documents(), expected.as_slice());
    assert_eq!(watcher.session().status(), JobState::Completed);
    assert_eq!(watcher.session().total_expected(), 3);

    assert_eq!(
        *documents.lock().unwrap(),
        expected
            .iter()
            .cloned()
            .map(WatchEvent::Document)
            .collect::<Vec<_>>()
    );
    assert_eq!(
        *done.lock().unwrap(),
        vec![WatchEvent::Done {
            status: JobState::Completed,
            documents: expected,
        }]
    );
    assert!(errors.lock().unwrap().is_empty());

    let authorization = server.await.unwrap();
    assert_eq!(authorization.as_deref(), Some("Bearer fc-test"));
}

#[tokio::test]
async fn test_error_event_ends_watch() {
    let (addr, _server) = serve(
        vec![(
            None,
            vec![
                frame(json!({"type": "catchup", "data": {"status": "scraping", "data": [doc("d1")]}})),
                frame(json!({"type": "error", "error": "blocked by robots.txt"})),
                frame(json!({"type": "document", "data": doc("late")})),
            ],
        )],
        Ending::AwaitClose,
    )
    .await;

    let mut watcher = CrawlWatcher::new(JobHandle::new("job1"), ws_url(addr), "fc-test");
    let errors = record(&watcher, EventKind::Error);

    let outcome = watcher.connect().await.unwrap();
    assert_eq!(outcome, WatchOutcome::Failed);
    assert_eq!(watcher.session().status(), JobState::Failed);
    assert_eq!(watcher.session().phase(), WatchPhase::Error);
    assert_eq!(watcher.session().documents(), &[doc("d1")]);
    assert_eq!(
        *errors.lock().unwrap(),
        vec![WatchEvent::Error {
            status: JobState::Failed,
            documents: vec![doc("d1")],
            error: "blocked by robots.txt".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_structured_error_event_ends_watch() {
    let (addr, _server) = serve(
        vec![(
            None,
            vec![frame(json!({"type": "error", "error": {"code": "BLOCKED", "message": "robots"}}))],
        )],
        Ending::AwaitClose,
    )
    .await;

    let mut watcher = CrawlWatcher::new(JobHandle::new("job1"), ws_url(addr), "fc-test");
    let errors = record(&watcher, EventKind::Error);

    let outcome = watcher.connect().await.unwrap();
    assert_eq!(outcome, WatchOutcome::Failed);
    assert_eq!(watcher.session().status(), JobState::Failed);
    assert!(watcher.session().error().unwrap().contains("BLOCKED"));
    assert_eq!(errors.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_subscribe_from_document_callback() {
    let (addr, _server) = serve(
        vec![(
            None,
            vec![
                frame(json!({"type": "document", "data": doc("d1")})),
                frame(json!({"type": "document", "data": doc("d2")})),
                frame(json!({"type": "done"})),
            ],
        )],
        Ending::AwaitClose,
    )
    .await;

    let mut watcher = CrawlWatcher::new(JobHandle::new("job1"), ws_url(addr), "fc-test");
    let done = Arc::new(Mutex::new(Vec::new()));
    {
        let subscriptions = watcher.subscriptions();
        let done = Arc::clone(&done);
        watcher.on(EventKind::Document, move |_| {
            if subscriptions.count(EventKind::Done) == 0 {
                let done = Arc::clone(&done);
                subscriptions.on(EventKind::Done, move |event| {
                    done.lock().unwrap().push(event.clone())
                });
            }
        });
    }

    let outcome = tokio::time::timeout(Duration::from_secs(5), watcher.connect())
        .await
        .expect("watch should not stall")
        .unwrap();
    assert_eq!(outcome, WatchOutcome::Completed);
    assert_eq!(
        *done.lock().unwrap(),
        vec![WatchEvent::Done {
            status: JobState::Completed,
            documents: vec![doc("d1"), doc("d2")],
        }]
    );
}

#[tokio::test]
async fn test_server_close_keeps_last_status() {
    let (addr, _server) = serve(
        vec![(
            None,
            vec![
                frame(json!({"type": "catchup", "data": {"status": "active", "data": []}})),
                frame(json!({"type": "document", "data": doc("d1")})),
            ],
        )],
        Ending::Close,
    )
    .await;

    let mut watcher = CrawlWatcher::new(JobHandle::new("job1"), ws_url(addr), "fc-test");
    let done = record(&watcher, EventKind::Done);

    let outcome = watcher.connect().await.unwrap();
    assert_eq!(outcome, WatchOutcome::Disconnected);
    assert_eq!(watcher.session().status(), JobState::Active);
    assert_eq!(watcher.session().completed_count(), 1);
    assert!(done.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_late_subscriber_on_spawned_watch() {
    let (first_tx, first_rx) = oneshot::channel();
    let (second_tx, second_rx) = oneshot::channel();
    let (addr, _server) = serve(
        vec![
            (
                Some(first_rx),
                vec![
                    frame(json!({"type": "document", "data": doc("d1")})),
                    frame(json!({"type": "document", "data": doc("d2")})),
                ],
            ),
            (
                Some(second_rx),
                vec![
                    frame(json!({"type": "catchup", "data": {"status": "scraping", "data": [doc("d3")]}})),
                    frame(json!({"type": "done"})),
                ],
            ),
        ],
        Ending::AwaitClose,
    )
    .await;

    let watcher = CrawlWatcher::new(JobHandle::new("job1"), ws_url(addr), "fc-test");
    let early = record(&watcher, EventKind::Document);
    let handle = watcher.spawn();
    assert_eq!(handle.job().id(), "job1");

    first_tx.send(()).unwrap();
    while early.lock().unwrap().len() < 2 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // Subscribes after two documents have already been delivered
    let late = Arc::new(Mutex::new(Vec::new()));
    {
        let sink = Arc::clone(&late);
        handle.on(EventKind::Document, move |event| {
            sink.lock().unwrap().push(event.clone())
        });
    }
    assert_eq!(handle.subscriptions().count(EventKind::Document), 2);
    second_tx.send(()).unwrap();

    let (outcome, session) = handle.join().await.unwrap();
    assert_eq!(outcome, WatchOutcome::Completed);
    assert_eq!(session.documents(), &[doc("d1"), doc("d2"), doc("d3")]);

    let documents = |events: &Arc<Mutex<Vec<WatchEvent>>>| -> Vec<Document> {
        events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                WatchEvent::Document(document) => Some(document.clone()),
                _ => None,
            })
            .collect()
    };

    // Two live documents, then the catch-up replay of all three
    assert_eq!(
        documents(&early),
        vec![doc("d1"), doc("d2"), doc("d1"), doc("d2"), doc("d3")]
    );
    // The catch-up replay brings the late subscriber up to date
    assert_eq!(documents(&late), vec![doc("d1"), doc("d2"), doc("d3")]);
}

#[tokio::test]
async fn test_cancel_spawned_watch() {
    let (_gate_tx, gate_rx) = oneshot::channel::<()>();
    let (addr, _server) = serve(vec![(Some(gate_rx), vec![])], Ending::AwaitClose).await;

    let watcher = CrawlWatcher::new(JobHandle::new("job1"), ws_url(addr), "fc-test");
    let handle = watcher.spawn();
    handle.cancel();

    let err = handle.join().await.unwrap_err();
    assert!(matches!(err, CrawlError::StreamTerminated(_)));
}

#[tokio::test]
async fn test_handshake_failure_is_an_error() {
    // Reserve a port and release it so nothing is listening there
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut watcher = CrawlWatcher::new(JobHandle::new("job1"), ws_url(addr), "fc-test");
    let err = watcher.connect().await.unwrap_err();
    assert!(matches!(err, CrawlError::WebSocket(_)));
    assert_eq!(watcher.session().phase(), WatchPhase::Connecting);
}
