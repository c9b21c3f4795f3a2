//! Event-stream job watcher
//!
//! This module contains the push-based alternative to polling:
//! - `CrawlWatcher`: opens one stream connection per job and consumes it
//! - `WatcherSession`: the aggregated state the consuming task maintains
//! - `Subscriptions`: callbacks keyed by [`EventKind`], run in registration order
//!
//! There is no reconnect-on-drop. When the connection closes before a
//! terminal message the session keeps its last observed status.

mod events;
mod message;
mod session;

pub use events::{EventKind, SubscriberRegistry, Subscriptions, WatchEvent};
pub use message::{CatchupData, InboundMessage};
pub use session::{Flow, WatchPhase, WatcherSession};

use crate::job::JobHandle;
use crate::{ConfigError, CrawlError};
use futures_util::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use url::Url;

/// How a watch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// A `done` message arrived
    Completed,
    /// An `error` message arrived
    Failed,
    /// The connection ended before any terminal message
    Disconnected,
}

/// Derives the stream endpoint for a job from the HTTP base URL
///
/// `http` becomes `ws` and `https` becomes `wss`; host and path are kept.
pub fn stream_url(base_url: &str, job: &JobHandle) -> Result<String, CrawlError> {
    let mut url = Url::parse(&format!(
        "{}/v1/crawl/{}",
        base_url.trim_end_matches('/'),
        job.id()
    ))?;

    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(ConfigError::Validation(format!(
                "Cannot derive a stream URL from scheme '{}'",
                other
            ))
            .into())
        }
    };
    url.set_scheme(scheme).map_err(|_| {
        ConfigError::Validation(format!("Cannot switch '{}' to {}", base_url, scheme))
    })?;

    Ok(url.into())
}

/// Watches one job through its event stream
pub struct CrawlWatcher {
    ws_url: String,
    api_key: String,
    session: WatcherSession,
    subscriptions: Subscriptions,
}

impl std::fmt::Debug for CrawlWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlWatcher")
            .field("ws_url", &self.ws_url)
            .field("session", &self.session)
            .field("subscriptions", &self.subscriptions)
            .finish_non_exhaustive()
    }
}

impl CrawlWatcher {
    /// Creates a watcher for a job at an explicit stream URL
    pub fn new(job: JobHandle, ws_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            api_key: api_key.into(),
            session: WatcherSession::new(job),
            subscriptions: Subscriptions::new(),
        }
    }

    pub fn job(&self) -> &JobHandle {
        self.session.job()
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    pub fn session(&self) -> &WatcherSession {
        &self.session
    }

    /// Shared subscriber handle, usable from other tasks while connected
    pub fn subscriptions(&self) -> Subscriptions {
        self.subscriptions.clone()
    }

    /// Registers a callback for one event category
    pub fn on<F>(&self, kind: EventKind, callback: F)
    where
        F: FnMut(&WatchEvent) + Send + 'static,
    {
        self.subscriptions.on(kind, callback);
    }

    /// Opens the stream and consumes it until a terminal message or disconnect
    ///
    /// Handshake failures are returned as errors. Once streaming, a job
    /// failure is delivered as an [`EventKind::Error`] event and a dropped
    /// connection ends the watch with [`WatchOutcome::Disconnected`].
    pub async fn connect(&mut self) -> Result<WatchOutcome, CrawlError> {
        let mut request = self.ws_url.as_str().into_client_request()?;
        let authorization = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| {
                ConfigError::Validation("API key contains invalid header characters".to_string())
            })?;
        request.headers_mut().insert(AUTHORIZATION, authorization);

        tracing::info!(job = %self.job(), url = %self.ws_url, "Connecting to crawl event stream");
        let (mut stream, _response) = tokio_tungstenite::connect_async(request).await?;

        let outcome = self.consume(&mut stream).await;
        if outcome != WatchOutcome::Disconnected {
            if let Err(e) = stream.close(None).await {
                tracing::debug!(job = %self.job(), "Closing event stream failed: {}", e);
            }
        }
        Ok(outcome)
    }

    /// Consumes already-open stream frames one at a time
    ///
    /// Each frame is applied and dispatched in full before the next is read.
    pub async fn consume<S>(&mut self, stream: &mut S) -> WatchOutcome
    where
        S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    {
        self.session.mark_streaming();

        while let Some(frame) = stream.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(_) => {
                        tracing::warn!(job = %self.job(), "Skipping non UTF-8 binary frame");
                        continue;
                    }
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(job = %self.job(), "Event stream dropped: {}", e);
                    break;
                }
            };

            if self.session.handle_text(&text, &self.subscriptions) == Flow::Stop {
                break;
            }
        }

        match self.session.phase() {
            WatchPhase::Done => WatchOutcome::Completed,
            WatchPhase::Error => WatchOutcome::Failed,
            _ => {
                tracing::warn!(
                    job = %self.job(),
                    status = %self.session.status(),
                    "Event stream closed before the job finished"
                );
                WatchOutcome::Disconnected
            }
        }
    }

    /// Runs the watch on its own task
    pub fn spawn(mut self) -> WatchHandle {
        let job = self.job().clone();
        let subscriptions = self.subscriptions();
        let task = tokio::spawn(async move {
            let outcome = self.connect().await?;
            Ok::<_, CrawlError>((outcome, self.session))
        });

        WatchHandle {
            job,
            subscriptions,
            task,
        }
    }
}

/// Handle to a watch running on its own task
#[derive(Debug)]
pub struct WatchHandle {
    job: JobHandle,
    subscriptions: Subscriptions,
    task: JoinHandle<Result<(WatchOutcome, WatcherSession), CrawlError>>,
}

impl WatchHandle {
    pub fn job(&self) -> &JobHandle {
        &self.job
    }

    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    /// Registers a callback on the running watch
    pub fn on<F>(&self, kind: EventKind, callback: F)
    where
        F: FnMut(&WatchEvent) + Send + 'static,
    {
        self.subscriptions.on(kind, callback);
    }

    /// Closes the connection by stopping the consuming task
    pub fn cancel(&self) {
        tracing::info!(job = %self.job, "Cancelling crawl watch");
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the watch to end
    ///
    /// A panic raised by a subscriber callback resumes on the caller.
    pub async fn join(self) -> Result<(WatchOutcome, WatcherSession), CrawlError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(CrawlError::StreamTerminated(format!(
                "watch for job {} was cancelled",
                self.job
            ))),
        }
    }
}
