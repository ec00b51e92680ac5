//! SMTP transport built on lettre
//!
//! Connection settings come from [`SmtpSettings`] and are fixed for the
//! lifetime of the process.

use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info};

use super::{MailTransport, MessageAttachment, OutgoingMessage, TransportError};
use crate::config::{SmtpSecurity, SmtpSettings};

/// Content type for attachments whose declared type does not parse
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Delivers messages to a single configured SMTP server
pub struct SmtpMailTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
    port: u16,
}

impl SmtpMailTransport {
    /// Build the transport from configuration
    ///
    /// No connection is opened here; lettre connects on first send.
    pub fn new(settings: &SmtpSettings) -> Result<Self, TransportError> {
        let host = settings.host();

        let mut builder = match settings.security {
            SmtpSecurity::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
            SmtpSecurity::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| TransportError::Config(format!("STARTTLS relay: {}", e)))?,
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|e| TransportError::Config(format!("TLS relay: {}", e)))?,
        }
        .port(settings.port)
        .timeout(Some(settings.timeout));

        if let Some((user, pass)) = settings.credentials() {
            builder = builder.credentials(Credentials::new(user.to_string(), pass.to_string()));
        }

        info!(
            host = %host,
            port = settings.port,
            security = ?settings.security,
            authenticated = settings.credentials().is_some(),
            "SMTP transport configured"
        );

        Ok(Self {
            transport: builder.build(),
            host: host.to_string(),
            port: settings.port,
        })
    }

    /// Encode an [`OutgoingMessage`] as a MIME message
    pub fn build_message(message: &OutgoingMessage) -> Result<Message, TransportError> {
        let from: Mailbox = message
            .from
            .parse()
            .map_err(|e| TransportError::InvalidMessage(format!("from address: {}", e)))?;
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| TransportError::InvalidMessage(format!("to address: {}", e)))?;

        let builder = Message::builder()
            .message_id(Some(message.message_id.clone()))
            .from(from)
            .to(to)
            .subject(message.subject.clone());

        let text = SinglePart::plain(message.text.clone());
        let result = match (&message.html, message.attachments.is_empty()) {
            (None, true) => builder.singlepart(text),
            (Some(html), true) => builder.multipart(MultiPart::alternative_plain_html(
                message.text.clone(),
                html.clone(),
            )),
            (html, false) => {
                let mixed = match html {
                    Some(html) => MultiPart::mixed().multipart(MultiPart::alternative_plain_html(
                        message.text.clone(),
                        html.clone(),
                    )),
                    None => MultiPart::mixed().singlepart(text),
                };
                let mixed = message
                    .attachments
                    .iter()
                    .fold(mixed, |mixed, attachment| mixed.singlepart(attachment_part(attachment)));
                builder.multipart(mixed)
            }
        };

        result.map_err(|e| TransportError::InvalidMessage(e.to_string()))
    }
}

fn attachment_part(attachment: &MessageAttachment) -> SinglePart {
    let content_type = ContentType::parse(&attachment.content_type)
        .or_else(|_| ContentType::parse(DEFAULT_CONTENT_TYPE))
        .unwrap_or(ContentType::TEXT_PLAIN);

    Attachment::new(attachment.filename.clone()).body(attachment.content.clone(), content_type)
}

#[async_trait::async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(&self, message: &OutgoingMessage) -> Result<String, TransportError> {
        let email = Self::build_message(message)?;

        debug!(
            to = %message.to,
            host = %self.host,
            port = self.port,
            attachments = message.attachments.len(),
            "Sending email via SMTP"
        );

        let response = self
            .transport
            .send(email)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;

        debug!(code = %response.code(), "SMTP server accepted message");

        Ok(message.message_id.clone())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
