//! Mock transport for testing and local runs
//!
//! Records every message instead of delivering it. Can be told to fail or
//! to stall, which is how the dispatcher's error and timeout paths are
//! exercised without an SMTP server.

use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

use super::{MailTransport, OutgoingMessage, TransportError};

/// Mock transport implementation
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<OutgoingMessage>>,
    failure: Option<String>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport whose every send fails with `reason`
    pub fn failing(reason: &str) -> Self {
        Self {
            failure: Some(reason.to_string()),
            ..Self::default()
        }
    }

    /// Wait `delay` before completing each send
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Messages accepted so far
    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl MailTransport for MockTransport {
    async fn send(&self, message: &OutgoingMessage) -> Result<String, TransportError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(reason) = &self.failure {
            return Err(TransportError::Send(reason.clone()));
        }

        info!(
            message_id = %message.message_id,
            to = %message.to,
            subject = %message.subject,
            attachments = message.attachments.len(),
            "Mock transport accepted message"
        );

        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.clone());
        }

        Ok(message.message_id.clone())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
