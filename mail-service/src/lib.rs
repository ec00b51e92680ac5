//! mail-service: small HTTP mail service
//!
//! Sends email through a configured transport, renders text templates,
//! proxies JSON from external URLs and stores uploaded attachments.
//!
//! # Endpoints
//!
//! - `POST /api/send-email` - validate and send a message
//! - `POST /api/process-template` - render `<%= name %>` style templates
//! - `GET /api/fetch-data?url=` - fetch a JSON document
//! - `POST /api/upload-attachment` - store one multipart file
//! - `GET /health`, `GET /api/info`
//!
//! # Example Configuration
//!
//! ```toml
//! # mail-service.toml (environment variables take precedence)
//! port = 3000
//! app_env = "production"
//! smtp_host = "smtp.example.com"
//! smtp_port = 587
//! smtp_security = "starttls"
//! upload_dir = "/var/lib/mail-service/uploads"
//! ```

pub mod api;
pub mod attachments;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod fetcher;
pub mod templates;
pub mod transport;
pub mod validator;

pub use api::{ApiServer, AppState};
pub use config::ServiceConfig;
pub use dispatcher::{DispatchResult, MailDispatcher};
pub use error::{Result, ServiceError};
