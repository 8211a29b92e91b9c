pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod state;

// Re-export main types for convenience
pub use client::{AssistantReply, BackendClient, HttpBackendClient};
pub use config::Config;
pub use controller::{ChatController, ControllerState, CycleOutcome, Submission};
pub use error::{ClientError, ClientErrorKind};
pub use state::{ConversationState, Message, MessageStore, Product, Sender};
