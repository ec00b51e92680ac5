//! Inbound email request validation
//!
//! Checks required fields and the basic shape of addresses before anything
//! is handed to the dispatcher. This is a shape check only: an address is
//! accepted as long as it is a string containing `@`.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Fields that must be present and non-empty, in reporting order
const REQUIRED_FIELDS: [&str; 3] = ["from", "to", "subject"];

/// Validation failures, always reported to the caller as 400
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// One or more required fields are absent or empty
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    /// `from` or `to` does not look like an address
    #[error("Invalid {0} email address")]
    InvalidAddress(&'static str),

    /// An attachment reference is malformed
    #[error("Invalid attachment at index {index}: {reason}")]
    InvalidAttachment { index: usize, reason: &'static str },

    /// A required request parameter is missing (template, url)
    #[error("{0} is required")]
    Required(&'static str),

    /// A URL parameter is not an absolute http(s) URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Body of `POST /api/send-email`
///
/// `from` and `to` accept any JSON value so that a non-string address is
/// reported as an invalid address rather than a malformed body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailRequest {
    pub from: Option<Value>,
    pub to: Option<Value>,
    pub subject: Option<String>,
    pub text: Option<String>,
    pub html: Option<String>,
    pub attachments: Option<Vec<AttachmentRef>>,
}

/// Attachment reference inside an email request
///
/// Either `content` (inline text) or `path` (the stored filename returned by
/// the upload endpoint) must be given.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    pub filename: Option<String>,
    pub content: Option<String>,
    pub path: Option<String>,
    pub content_type: Option<String>,
}

/// Where an attachment's bytes come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSource {
    /// Inline text supplied in the request
    Inline(String),
    /// File previously stored by the attachment receiver
    Stored(String),
}

/// Attachment that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedAttachment {
    pub filename: String,
    pub content_type: Option<String>,
    pub source: AttachmentSource,
}

/// Email request with all required fields present and well-formed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: Option<String>,
    pub html: Option<String>,
    pub attachments: Vec<ValidatedAttachment>,
}

fn is_empty_text(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}

fn is_empty_value(value: &Option<Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

fn address(value: Option<Value>, field: &'static str) -> Result<String, ValidationError> {
    match value {
        Some(Value::String(s)) if s.contains('@') => Ok(s),
        _ => Err(ValidationError::InvalidAddress(field)),
    }
}

/// Validate an inbound email request
///
/// Missing fields are reported together, before any address check.
pub fn validate(request: EmailRequest) -> Result<ValidatedEmail, ValidationError> {
    let empty = [
        is_empty_value(&request.from),
        is_empty_value(&request.to),
        is_empty_text(&request.subject),
    ];
    let missing: Vec<&'static str> = REQUIRED_FIELDS
        .iter()
        .zip(empty)
        .filter(|(_, empty)| *empty)
        .map(|(name, _)| *name)
        .collect();

    if !missing.is_empty() {
        return Err(ValidationError::MissingFields(missing));
    }

    let from = address(request.from, "from")?;
    let to = address(request.to, "to")?;

    let attachments = request
        .attachments
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(index, attachment)| validate_attachment(index, attachment))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ValidatedEmail {
        from,
        to,
        subject: request.subject.unwrap_or_default(),
        text: request.text,
        html: request.html,
        attachments,
    })
}

fn validate_attachment(
    index: usize,
    attachment: AttachmentRef,
) -> Result<ValidatedAttachment, ValidationError> {
    let source = match (attachment.content, attachment.path) {
        (Some(content), None) => AttachmentSource::Inline(content),
        (None, Some(path)) if !path.trim().is_empty() => AttachmentSource::Stored(path),
        (None, Some(_)) => {
            return Err(ValidationError::InvalidAttachment {
                index,
                reason: "path is empty",
            })
        }
        (Some(_), Some(_)) => {
            return Err(ValidationError::InvalidAttachment {
                index,
                reason: "content and path are mutually exclusive",
            })
        }
        (None, None) => {
            return Err(ValidationError::InvalidAttachment {
                index,
                reason: "content or path is required",
            })
        }
    };

    let filename = match (attachment.filename, &source) {
        (Some(name), _) if !name.trim().is_empty() => name,
        (_, AttachmentSource::Stored(path)) => path.clone(),
        (_, AttachmentSource::Inline(_)) => format!("attachment-{}.txt", index + 1),
    };

    Ok(ValidatedAttachment {
        filename,
        content_type: attachment.content_type,
        source,
    })
}
