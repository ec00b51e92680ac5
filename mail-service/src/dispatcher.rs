//! Mail dispatch
//!
//! Turns a validated request into an [`OutgoingMessage`] and makes a single
//! send attempt through the injected transport. No retries, no queueing.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

use crate::attachments::{AttachmentStore, DEFAULT_MIME_TYPE};
use crate::transport::{MailTransport, MessageAttachment, OutgoingMessage, TransportError};
use crate::validator::{AttachmentSource, ValidatedAttachment, ValidatedEmail};

/// Bound on a single transport call unless configured otherwise
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Inline attachments without a declared type
const INLINE_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Outcome of one dispatch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    /// Transport accepted the message
    Sent { message_id: String },
    /// Message was not sent; `reason` is safe to show to callers
    Failed { reason: String },
}

impl DispatchResult {
    fn failed(reason: &str) -> Self {
        Self::Failed {
            reason: reason.to_string(),
        }
    }
}

/// Sends validated email through a [`MailTransport`]
#[derive(Clone)]
pub struct MailDispatcher {
    transport: Arc<dyn MailTransport>,
    attachments: AttachmentStore,
    timeout: Duration,
}

impl MailDispatcher {
    pub fn new(transport: Arc<dyn MailTransport>, attachments: AttachmentStore) -> Self {
        Self {
            transport,
            attachments,
            timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Override the per-send timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Name of the underlying transport
    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Make one send attempt
    ///
    /// Transport errors are logged here in full; the returned reason never
    /// carries them.
    pub async fn dispatch(&self, email: ValidatedEmail) -> DispatchResult {
        let attachments = match self.resolve_attachments(&email.attachments).await {
            Ok(attachments) => attachments,
            Err(reason) => return DispatchResult::failed(reason),
        };

        let message = OutgoingMessage {
            message_id: generate_message_id(&email.from),
            from: email.from,
            to: email.to,
            subject: email.subject,
            text: email.text.unwrap_or_default(),
            html: email.html,
            attachments,
        };

        let sent = tokio::time::timeout(self.timeout, self.transport.send(&message))
            .await
            .unwrap_or(Err(TransportError::Timeout(self.timeout)));

        match sent {
            Ok(message_id) => {
                info!(
                    "Email {} sent to {} via {}",
                    message_id,
                    message.to,
                    self.transport.name()
                );
                DispatchResult::Sent { message_id }
            }
            Err(e) => {
                error!(
                    error = %e,
                    to = %message.to,
                    transport = self.transport.name(),
                    "Email sending failed"
                );
                DispatchResult::failed(match e {
                    TransportError::Timeout(_) => "Mail transport timed out",
                    TransportError::InvalidMessage(_) => "Message could not be encoded",
                    TransportError::Send(_) | TransportError::Config(_) => {
                        "Mail transport rejected the message"
                    }
                })
            }
        }
    }

    async fn resolve_attachments(
        &self,
        attachments: &[ValidatedAttachment],
    ) -> Result<Vec<MessageAttachment>, &'static str> {
        let mut resolved = Vec::with_capacity(attachments.len());

        for attachment in attachments {
            let (content, default_type) = match &attachment.source {
                AttachmentSource::Inline(text) => (text.clone().into_bytes(), INLINE_CONTENT_TYPE),
                AttachmentSource::Stored(name) => {
                    let bytes = self.attachments.load(name).await.map_err(|e| {
                        error!("Stored attachment {} unavailable: {}", name, e);
                        "Attachment could not be loaded"
                    })?;
                    (bytes, DEFAULT_MIME_TYPE)
                }
            };

            resolved.push(MessageAttachment {
                filename: attachment.filename.clone(),
                content_type: attachment
                    .content_type
                    .clone()
                    .unwrap_or_else(|| default_type.to_string()),
                content,
            });
        }

        Ok(resolved)
    }
}

/// `<uuid@sender-domain>`, falling back to `localhost`
fn generate_message_id(from: &str) -> String {
    let domain = from
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim().trim_end_matches('>').trim())
        .filter(|domain| !domain.is_empty())
        .unwrap_or("localhost");

    format!("<{}@{}>", Uuid::new_v4(), domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::IncomingFile;
    use crate::transport::MockTransport;
    use tempfile::{tempdir, TempDir};

    async fn store() -> (TempDir, AttachmentStore) {
        let dir = tempdir().unwrap();
        let store = AttachmentStore::open(dir.path()).await.unwrap();
        (dir, store)
    }

    fn email() -> ValidatedEmail {
        ValidatedEmail {
            from: "alice@example.com".to_string(),
            to: "bob@example.com".to_string(),
            subject: "Hello".to_string(),
            text: None,
            html: Some("<p>Hi</p>".to_string()),
            attachments: Vec::new(),
        }
    }

    /// Transport that answers with its own id
    struct FixedIdTransport;

    #[async_trait::async_trait]
    impl MailTransport for FixedIdTransport {
        async fn send(&self, _message: &OutgoingMessage) -> Result<String, TransportError> {
            Ok("relay-assigned-42".to_string())
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    #[test]
    fn test_message_id_uses_sender_domain() {
        let id = generate_message_id("alice@example.com");
        assert!(id.starts_with('<'));
        assert!(id.ends_with("@example.com>"));

        assert!(generate_message_id("Alice <alice@mail.example.org>").ends_with("@mail.example.org>"));
        assert!(generate_message_id("alice@").ends_with("@localhost>"));
    }

    #[tokio::test]
    async fn test_dispatch_sends_normalized_message() {
        let (_dir, store) = store().await;
        let transport = Arc::new(MockTransport::new());
        let dispatcher = MailDispatcher::new(transport.clone(), store);

        let result = dispatcher.dispatch(email()).await;

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "");
        assert_eq!(sent[0].html.as_deref(), Some("<p>Hi</p>"));
        assert!(sent[0].attachments.is_empty());
        assert_eq!(
            result,
            DispatchResult::Sent {
                message_id: sent[0].message_id.clone()
            }
        );
    }

    #[tokio::test]
    async fn test_transport_id_returned_unmodified() {
        let (_dir, store) = store().await;
        let dispatcher = MailDispatcher::new(Arc::new(FixedIdTransport), store);

        let result = dispatcher.dispatch(email()).await;

        assert_eq!(
            result,
            DispatchResult::Sent {
                message_id: "relay-assigned-42".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_transport_failure_hides_detail() {
        let (_dir, store) = store().await;
        let transport = Arc::new(MockTransport::failing("535 auth failed for admin:hunter2"));
        let dispatcher = MailDispatcher::new(transport, store);

        match dispatcher.dispatch(email()).await {
            DispatchResult::Failed { reason } => {
                assert!(!reason.contains("hunter2"));
                assert!(!reason.contains("535"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_slow_transport_times_out() {
        let (_dir, store) = store().await;
        let transport = Arc::new(MockTransport::new().with_delay(Duration::from_secs(5)));
        let dispatcher = MailDispatcher::new(transport.clone(), store)
            .with_timeout(Duration::from_millis(50));

        let result = dispatcher.dispatch(email()).await;

        assert_eq!(result, DispatchResult::failed("Mail transport timed out"));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_attachments_resolved() {
        let (_dir, store) = store().await;
        let uploaded = store
            .receive(IncomingFile {
                original_name: "report.csv".to_string(),
                content_type: Some("text/csv".to_string()),
                data: b"a,b\n".to_vec(),
            })
            .await
            .unwrap();

        let transport = Arc::new(MockTransport::new());
        let dispatcher = MailDispatcher::new(transport.clone(), store);

        let mut request = email();
        request.attachments = vec![
            ValidatedAttachment {
                filename: "note.txt".to_string(),
                content_type: None,
                source: AttachmentSource::Inline("remember".to_string()),
            },
            ValidatedAttachment {
                filename: "report.csv".to_string(),
                content_type: None,
                source: AttachmentSource::Stored(uploaded.stored_name.clone()),
            },
        ];

        assert!(matches!(
            dispatcher.dispatch(request).await,
            DispatchResult::Sent { .. }
        ));

        let attachments = &transport.sent()[0].attachments;
        assert_eq!(attachments[0].content, b"remember");
        assert_eq!(attachments[0].content_type, INLINE_CONTENT_TYPE);
        assert_eq!(attachments[1].filename, "report.csv");
        assert_eq!(attachments[1].content, b"a,b\n");
        assert_eq!(attachments[1].content_type, DEFAULT_MIME_TYPE);
    }

    #[tokio::test]
    async fn test_unknown_stored_attachment_fails() {
        let (_dir, store) = store().await;
        let transport = Arc::new(MockTransport::new());
        let dispatcher = MailDispatcher::new(transport.clone(), store);

        let mut request = email();
        request.attachments = vec![ValidatedAttachment {
            filename: "gone.pdf".to_string(),
            content_type: None,
            source: AttachmentSource::Stored("1700000000000-gone.pdf".to_string()),
        }];

        assert_eq!(
            dispatcher.dispatch(request).await,
            DispatchResult::failed("Attachment could not be loaded")
        );
        assert!(transport.sent().is_empty());
    }
}
