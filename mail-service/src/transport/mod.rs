//! Mail transport abstraction
//!
//! The dispatcher never talks SMTP itself. It hands a fully assembled
//! [`OutgoingMessage`] to a [`MailTransport`] chosen once at startup.

pub mod mock;
pub mod smtp;

pub use mock::MockTransport;
pub use smtp::SmtpMailTransport;

use std::time::Duration;
use thiserror::Error;

/// Transport-level failures
#[derive(Error, Debug)]
pub enum TransportError {
    /// Message could not be encoded (bad address, bad header value)
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Server rejected the message or the connection failed
    #[error("Send failed: {0}")]
    Send(String),

    /// Send did not finish in time
    #[error("Send timed out after {0:?}")]
    Timeout(Duration),

    /// Transport could not be constructed
    #[error("Transport configuration error: {0}")]
    Config(String),
}

/// File attached to an outgoing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAttachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// Normalized message handed to a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// `Message-ID` header value, including angle brackets
    pub message_id: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    /// Plain-text body (may be empty)
    pub text: String,
    pub html: Option<String>,
    pub attachments: Vec<MessageAttachment>,
}

/// Something that can deliver an [`OutgoingMessage`]
#[async_trait::async_trait]
pub trait MailTransport: Send + Sync {
    /// Deliver the message, returning its message identifier
    async fn send(&self, message: &OutgoingMessage) -> Result<String, TransportError>;

    /// Transport name for logging
    fn name(&self) -> &'static str;
}
