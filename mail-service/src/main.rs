//! mail-service: HTTP mail service
//!
//! Reads configuration from the environment, builds the mail transport once
//! and serves the API until SIGINT/SIGTERM.

use mail_service::attachments::AttachmentStore;
use mail_service::config::TransportKind;
use mail_service::fetcher::ExternalFetcher;
use mail_service::transport::{MailTransport, MockTransport, SmtpMailTransport};
use mail_service::{ApiServer, AppState, MailDispatcher, ServiceConfig};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting mail-service v{}", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::load()?;

    if config.is_development() && config.transport == TransportKind::Smtp {
        if config.smtp.host.is_none() {
            warn!(
                host = config.smtp.host(),
                "SMTP_HOST not set, using local development transport"
            );
        }
        if config.smtp.credentials().is_none() {
            warn!("SMTP credentials not set, sending unauthenticated");
        }
    }

    let transport: Arc<dyn MailTransport> = match config.transport {
        TransportKind::Smtp => Arc::new(SmtpMailTransport::new(&config.smtp)?),
        TransportKind::Mock => {
            warn!("Mock transport selected, email will be logged and not delivered");
            Arc::new(MockTransport::new())
        }
    };

    let attachments = AttachmentStore::open(&config.uploads.dir).await?;
    let dispatcher =
        MailDispatcher::new(transport, attachments.clone()).with_timeout(config.smtp.timeout);
    let fetcher = ExternalFetcher::with_timeout(config.fetch.timeout)?
        .with_max_response_bytes(config.server.max_body_bytes);

    info!(
        addr = %config.listen_addr(),
        transport = dispatcher.transport_name(),
        upload_dir = %attachments.dir().display(),
        environment = ?config.environment,
        "Configuration loaded"
    );

    let server = ApiServer::new(
        AppState {
            dispatcher,
            fetcher,
            attachments,
        },
        &config.server,
    );

    server.run().await?;

    Ok(())
}

/// `RUST_LOG` filter, `LOG_FORMAT=json` for JSON lines
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mail_service=info,tower_http=info".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
