//! Configuration for mail-service
//!
//! Settings are read once at startup: built-in defaults, then an optional
//! `mail-service.toml` in the working directory, then environment variables.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Base name of the optional configuration file
pub const CONFIG_FILE: &str = "mail-service";

/// SMTP host used when none is configured (development only)
pub const DEFAULT_SMTP_HOST: &str = "localhost";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Sources could not be read or deserialized
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// Values are present but unusable
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnvironment {
    Development,
    Production,
}

/// Transport security for the SMTP connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Plaintext, no TLS at all
    None,
    /// Plaintext upgraded with STARTTLS
    StartTls,
    /// TLS from the first byte
    Tls,
}

/// Which mail transport the dispatcher talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Real SMTP delivery
    Smtp,
    /// Log-only transport, nothing leaves the process
    Mock,
}

/// Flat view of every recognized key, as it appears in the environment
#[derive(Debug, Deserialize)]
struct RawSettings {
    port: u16,
    listen_host: String,
    app_env: AppEnvironment,
    smtp_host: Option<String>,
    smtp_port: u16,
    smtp_user: Option<String>,
    smtp_pass: Option<String>,
    smtp_security: SmtpSecurity,
    smtp_timeout_secs: u64,
    mail_transport: TransportKind,
    upload_dir: PathBuf,
    max_body_bytes: usize,
    fetch_timeout_ms: u64,
}

/// Main service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// HTTP listener settings
    pub server: ServerConfig,
    /// Deployment environment
    pub environment: AppEnvironment,
    /// Mail transport settings
    pub smtp: SmtpSettings,
    /// Transport implementation to use
    pub transport: TransportKind,
    /// Attachment storage settings
    pub uploads: UploadConfig,
    /// External fetch settings
    pub fetch: FetchConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Maximum accepted request body
    pub max_body_bytes: usize,
}

/// SMTP transport configuration
#[derive(Clone)]
pub struct SmtpSettings {
    /// Explicitly configured host, if any
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub security: SmtpSecurity,
    /// Bound on a single send
    pub timeout: Duration,
}

/// Attachment storage configuration
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Directory receiving uploaded files
    pub dir: PathBuf,
}

/// External fetch configuration
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout
    pub timeout: Duration,
}

impl SmtpSettings {
    /// Host to connect to
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_SMTP_HOST)
    }

    /// Username/password pair, when both are configured
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user, pass)),
            _ => None,
        }
    }
}

// Keep the password out of logs and panic messages
impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host())
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("security", &self.security)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ServiceConfig {
    /// Load configuration from the optional config file and the process environment
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Self::defaults()?
            .add_source(config::File::with_name(CONFIG_FILE).required(false))
            .add_source(config::Environment::default().ignore_empty(true));

        Self::finish(builder)
    }

    /// Load configuration from an explicit variable map instead of the process environment
    pub fn from_env_map(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let builder = Self::defaults()?.add_source(
            config::Environment::default()
                .ignore_empty(true)
                .source(Some(vars)),
        );

        Self::finish(builder)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Ok(config::Config::builder()
            .set_default("port", 3000_i64)?
            .set_default("listen_host", "0.0.0.0")?
            .set_default("app_env", "development")?
            .set_default("smtp_port", 587_i64)?
            .set_default("smtp_security", "none")?
            .set_default("smtp_timeout_secs", 30_i64)?
            .set_default("mail_transport", "smtp")?
            .set_default("upload_dir", "uploads")?
            .set_default("max_body_bytes", 10_i64 * 1024 * 1024)?
            .set_default("fetch_timeout_ms", 5000_i64)?)
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let raw: RawSettings = builder.build()?.try_deserialize()?;

        let config = Self {
            server: ServerConfig {
                host: raw.listen_host,
                port: raw.port,
                max_body_bytes: raw.max_body_bytes,
            },
            environment: raw.app_env,
            smtp: SmtpSettings {
                host: non_empty(raw.smtp_host),
                port: raw.smtp_port,
                username: non_empty(raw.smtp_user),
                password: non_empty(raw.smtp_pass),
                security: raw.smtp_security,
                timeout: Duration::from_secs(raw.smtp_timeout_secs),
            },
            transport: raw.mail_transport,
            uploads: UploadConfig {
                dir: raw.upload_dir,
            },
            fetch: FetchConfig {
                timeout: Duration::from_millis(raw.fetch_timeout_ms),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Socket address to bind
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// True when running with development defaults allowed
    pub fn is_development(&self) -> bool {
        self.environment == AppEnvironment::Development
    }

    /// Validate configuration
    ///
    /// Production refuses to start on the insecure local transport defaults.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("PORT must be non-zero".to_string()));
        }
        if self.smtp.port == 0 {
            return Err(ConfigError::Invalid("SMTP_PORT must be non-zero".to_string()));
        }
        if self.smtp.timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "SMTP_TIMEOUT_SECS must be non-zero".to_string(),
            ));
        }
        if self.fetch.timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "FETCH_TIMEOUT_MS must be non-zero".to_string(),
            ));
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "MAX_BODY_BYTES must be non-zero".to_string(),
            ));
        }

        if self.smtp.username.is_some() != self.smtp.password.is_some() {
            return Err(ConfigError::Invalid(
                "SMTP_USER and SMTP_PASS must be set together".to_string(),
            ));
        }

        if self.environment == AppEnvironment::Production && self.transport == TransportKind::Smtp
        {
            if self.smtp.host.is_none() {
                return Err(ConfigError::Invalid(
                    "SMTP_HOST is required in production".to_string(),
                ));
            }
            if self.smtp.security == SmtpSecurity::None {
                return Err(ConfigError::Invalid(
                    "SMTP_SECURITY=none is not allowed in production".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
