//! Submission cycle: user message in, one backend round trip, assistant
//! message out.
//!
//! The controller is idle while the store's busy flag is clear and awaiting a
//! response while it is set. [`ChatController::submit`] performs the
//! synchronous half of a cycle (guard, append the user message, set busy) and
//! hands back a [`Submission`] that owns the asynchronous half, so a UI can
//! clear its input immediately and spawn the network call.

use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::client::BackendClient;
use crate::error::ClientErrorKind;
use crate::state::{Message, MessageStore};

pub const CONNECTION_FAILURE_TEXT: &str =
    "Could not connect to the server. Please ensure the backend is running and accessible.";
pub const GENERIC_FAILURE_TEXT: &str = "Sorry, something went wrong. Please try again.";

/// Sentence appended to the chat when a request fails
pub fn failure_text(kind: ClientErrorKind) -> &'static str {
    match kind {
        ClientErrorKind::Connection => CONNECTION_FAILURE_TEXT,
        ClientErrorKind::Http | ClientErrorKind::Decode => GENERIC_FAILURE_TEXT,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    AwaitingResponse,
}

/// How a completed cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Replied { products: usize },
    Failed(ClientErrorKind),
    /// The client panicked instead of returning
    Faulted,
}

#[derive(Clone)]
pub struct ChatController {
    store: MessageStore,
    client: Arc<dyn BackendClient>,
}

impl ChatController {
    pub fn new(store: MessageStore, client: impl BackendClient + 'static) -> Self {
        Self::with_shared_client(store, Arc::new(client))
    }

    pub fn with_shared_client(store: MessageStore, client: Arc<dyn BackendClient>) -> Self {
        Self { store, client }
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn state(&self) -> ControllerState {
        if self.store.is_busy() {
            ControllerState::AwaitingResponse
        } else {
            ControllerState::Idle
        }
    }

    /// Accept `raw_input` as the next user message
    ///
    /// Returns `None` without touching the store when the input is blank or a
    /// cycle is already in flight. Otherwise the trimmed input is in the log,
    /// busy is set, and the returned [`Submission`] must be run (or dropped)
    /// to finish the cycle.
    pub fn submit(&self, raw_input: &str) -> Option<Submission> {
        let text = raw_input.trim();
        if text.is_empty() {
            debug!("ignoring blank submission");
            return None;
        }

        if !self.store.begin_cycle(Message::user(text)) {
            debug!("ignoring submission while awaiting a response");
            return None;
        }

        debug!(chars = text.chars().count(), "accepted user message");
        Some(Submission {
            busy: BusyGuard {
                store: self.store.clone(),
            },
            client: Arc::clone(&self.client),
            utterance: raw_input.to_string(),
        })
    }

    /// Run a whole cycle: `submit` followed by [`Submission::run`]
    pub async fn send(&self, raw_input: &str) -> Option<CycleOutcome> {
        let submission = self.submit(raw_input)?;
        Some(submission.run().await)
    }
}

/// The in-flight half of a submission cycle
///
/// Busy stays set for as long as this value lives. Dropping it without
/// running clears busy without appending a reply.
pub struct Submission {
    busy: BusyGuard,
    client: Arc<dyn BackendClient>,
    utterance: String,
}

impl Submission {
    /// The text sent to the backend, exactly as the user typed it
    pub fn utterance(&self) -> &str {
        &self.utterance
    }

    /// Await the backend and append the assistant message
    ///
    /// Always appends exactly one assistant message and then clears busy,
    /// including when the client panics.
    pub async fn run(self) -> CycleOutcome {
        let Submission {
            busy,
            client,
            utterance,
        } = self;

        let result = AssertUnwindSafe(client.send(&utterance))
            .catch_unwind()
            .await;

        let (message, outcome) = match result {
            Ok(Ok(reply)) if reply.text.trim().is_empty() => {
                warn!("assistant reply has no text");
                failure(ClientErrorKind::Decode)
            }
            Ok(Ok(reply)) => {
                let products = reply.products.len();
                info!(products, "assistant replied");
                (
                    Message::assistant(reply.text, reply.products),
                    CycleOutcome::Replied { products },
                )
            }
            Ok(Err(err)) => {
                warn!(error = %err, kind = ?err.kind(), "chat request failed");
                failure(err.kind())
            }
            Err(_) => {
                error!("backend client panicked during chat request");
                (
                    Message::assistant(GENERIC_FAILURE_TEXT, Vec::new()),
                    CycleOutcome::Faulted,
                )
            }
        };

        busy.store.append(message);
        drop(busy);
        outcome
    }
}

fn failure(kind: ClientErrorKind) -> (Message, CycleOutcome) {
    (
        Message::assistant(failure_text(kind), Vec::new()),
        CycleOutcome::Failed(kind),
    )
}

/// Clears busy when the cycle ends, however it ends
struct BusyGuard {
    store: MessageStore,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.store.set_busy(false);
    }
}
