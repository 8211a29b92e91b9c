use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::state::Product;

/// Longest slice of an error body that goes into the log
const BODY_EXCERPT_CHARS: usize = 200;

/// The backend's answer to one utterance
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub text: String,
    pub products: Vec<Product>,
}

/// One request/response exchange with the assistant service
///
/// Implementations must not retry, batch or cache: each call is one
/// outbound request, and the caller decides when calls happen.
#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn send(&self, utterance: &str) -> Result<AssistantReply, ClientError>;
}

#[async_trait]
impl<T: BackendClient + ?Sized> BackendClient for Arc<T> {
    async fn send(&self, utterance: &str) -> Result<AssistantReply, ClientError> {
        (**self).send(utterance).await
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    response: Option<String>,
    #[serde(default)]
    products: Option<serde_json::Value>,
}

/// `POST {base_url}/chat` over HTTP
#[derive(Clone)]
pub struct HttpBackendClient {
    client: Client,
    base_url: String,
}

impl HttpBackendClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Client whose requests fail with a connection error after `timeout`
    pub fn with_timeout(base_url: &str, timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn chat_url(&self) -> String {
        format!("{}/chat", self.base_url)
    }
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    async fn send(&self, utterance: &str) -> Result<AssistantReply, ClientError> {
        let url = self.chat_url();
        debug!(%url, chars = utterance.chars().count(), "sending chat request");

        let response = self
            .client
            .post(&url)
            .json(&ChatRequest { message: utterance })
            .send()
            .await
            .map_err(|e| ClientError::connection(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                %status,
                body = %excerpt(&body),
                "assistant backend returned an error status"
            );
            return Err(ClientError::http(status, body));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::connection(&url, e))?;

        decode_reply(&body)
    }
}

/// Decode a successful `/chat` body
///
/// A missing or null `products` is an empty list. A missing or blank
/// `response` is an error. Problems with products never cost the reply its
/// text: entries that do not decode are dropped.
pub fn decode_reply(body: &[u8]) -> Result<AssistantReply, ClientError> {
    let parsed: ChatResponse =
        serde_json::from_slice(body).map_err(|e| ClientError::decode(e.to_string()))?;

    let text = parsed
        .response
        .ok_or_else(|| ClientError::decode("reply has no `response` field"))?;
    if text.trim().is_empty() {
        return Err(ClientError::decode("reply `response` is blank"));
    }

    Ok(AssistantReply {
        text,
        products: decode_products(parsed.products),
    })
}

fn decode_products(raw: Option<serde_json::Value>) -> Vec<Product> {
    let entries = match raw {
        None | Some(serde_json::Value::Null) => return Vec::new(),
        Some(serde_json::Value::Array(entries)) => entries,
        Some(other) => {
            warn!(products = %other, "reply `products` is not a list, ignoring it");
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value::<Product>(entry) {
            Ok(mut product) => {
                if product.id.is_empty() {
                    product.id = format!("item-{}", index);
                }
                Some(product)
            }
            Err(e) => {
                warn!(index, error = %e, "skipping product that does not decode");
                None
            }
        })
        .collect()
}

fn excerpt(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(BODY_EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
