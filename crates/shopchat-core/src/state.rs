//! UI-agnostic conversation state
//!
//! This module contains the message log and busy flag shared between the
//! submission controller and whatever renders the conversation (the TUI, or
//! a test). Nothing here depends on a UI framework.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    User,
    Assistant,
}

/// A product the assistant attached to its reply
///
/// Received verbatim from the backend. The backend stores products as
/// documents, so the id arrives as `_id` and the image as `image_url`; the
/// camel-case spellings are accepted as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "_id", alias = "id", default, deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_empty")]
    pub product_type: String,
    #[serde(rename = "image_url", alias = "imageUrl", default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
}

impl Product {
    /// Price as shown to the user, e.g. `$499.99`
    ///
    /// Returns `None` when the backend sent no price, or one that cannot be
    /// displayed (negative or not finite).
    pub fn formatted_price(&self) -> Option<String> {
        self.price
            .filter(|price| price.is_finite() && *price >= 0.0)
            .map(|price| format!("${:.2}", price))
    }
}

/// Accepts string ids, numeric ids and `{"$oid": "..."}` document ids
///
/// A null id reads as empty; the client assigns a positional key.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(String::new()),
        serde_json::Value::String(id) => Ok(id),
        serde_json::Value::Number(id) => Ok(id.to_string()),
        serde_json::Value::Object(map) => match map.get("$oid") {
            Some(serde_json::Value::String(oid)) => Ok(oid.clone()),
            _ => Err(de::Error::custom("product id object has no `$oid` string")),
        },
        other => Err(de::Error::custom(format!("unsupported product id: {}", other))),
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// One entry in the conversation log
///
/// Fields are private so a message cannot change once it is in the log.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    text: String,
    sender: Sender,
    products: Vec<Product>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        let text = text.into();
        debug_assert!(!text.is_empty(), "messages always carry text");
        Self {
            text,
            sender: Sender::User,
            products: Vec::new(),
        }
    }

    pub fn assistant(text: impl Into<String>, products: Vec<Product>) -> Self {
        let text = text.into();
        debug_assert!(!text.is_empty(), "messages always carry text");
        Self {
            text,
            sender: Sender::Assistant,
            products,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn sender(&self) -> Sender {
        self.sender
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }
}

/// Everything the renderer needs: the log and whether a reply is pending
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    log: Vec<Message>,
    busy: bool,
}

impl ConversationState {
    pub fn log(&self) -> &[Message] {
        &self.log
    }

    pub fn busy(&self) -> bool {
        self.busy
    }

    pub fn last(&self) -> Option<&Message> {
        self.log.last()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }
}

/// Shared handle to the conversation state
///
/// Clones share the same state. Every mutation notifies subscribers before
/// it returns, so a receiver never observes an older state after the next
/// await point.
#[derive(Debug, Clone)]
pub struct MessageStore {
    state: Arc<watch::Sender<ConversationState>>,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore {
    pub fn new() -> Self {
        // The initial receiver is not needed: send_modify works without one
        // and observers come from subscribe().
        let (tx, _rx) = watch::channel(ConversationState::default());
        Self { state: Arc::new(tx) }
    }

    /// Add a message to the end of the log
    pub fn append(&self, message: Message) {
        self.state.send_modify(|state| state.log.push(message));
    }

    /// Set the busy flag, notifying observers only when it changes
    pub fn set_busy(&self, busy: bool) {
        self.state.send_if_modified(|state| {
            if state.busy == busy {
                false
            } else {
                state.busy = busy;
                true
            }
        });
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> ConversationState {
        self.state.borrow().clone()
    }

    /// Receiver that is marked changed on every mutation
    pub fn subscribe(&self) -> watch::Receiver<ConversationState> {
        self.state.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.state.borrow().busy
    }

    pub fn len(&self) -> usize {
        self.state.borrow().log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append the user's message and set busy in one step, unless busy
    ///
    /// Returns false, leaving the state untouched, when a cycle is already
    /// in flight. Holding the channel lock across the check and the update
    /// keeps at most one cycle in flight even if handles cross tasks.
    pub(crate) fn begin_cycle(&self, message: Message) -> bool {
        self.state.send_if_modified(|state| {
            if state.busy {
                return false;
            }
            state.log.push(message);
            state.busy = true;
            true
        })
    }
}
