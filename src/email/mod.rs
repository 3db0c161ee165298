//! Outbound email.
//!
//! Email is always best effort. [`EmailService::deliver`] never returns an
//! error: it reports what happened so the orchestrator can count it, and a
//! service built without a transport skips every send.

pub mod http;
pub mod templates;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

pub use http::HttpEmailTransport;

/// Default bound on a single send
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email transport error: {0}")]
    Transport(String),
    #[error("Email relay rejected message with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    Skipped,
    TimedOut,
    Failed,
}

#[derive(Clone)]
pub struct EmailService {
    transport: Option<Arc<dyn EmailTransport>>,
    send_timeout: Duration,
    frontend_url: String,
}

impl EmailService {
    pub fn new(transport: Arc<dyn EmailTransport>, send_timeout: Duration, frontend_url: &str) -> Self {
        Self {
            transport: Some(transport),
            send_timeout,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        }
    }

    /// A service that skips every email
    pub fn disabled(frontend_url: &str) -> Self {
        Self {
            transport: None,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    pub fn frontend_url(&self) -> &str {
        &self.frontend_url
    }

    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    /// Send one message, bounded by the send timeout
    pub async fn deliver(&self, message: &EmailMessage) -> DeliveryOutcome {
        let Some(transport) = &self.transport else {
            debug!(to = %message.to, subject = %message.subject, "Email transport not configured, skipping");
            return DeliveryOutcome::Skipped;
        };

        match tokio::time::timeout(self.send_timeout, transport.send(message)).await {
            Ok(Ok(())) => {
                debug!(to = %message.to, subject = %message.subject, "Email sent");
                DeliveryOutcome::Sent
            }
            Ok(Err(e)) => {
                warn!(to = %message.to, error = %e, "Email send failed");
                DeliveryOutcome::Failed
            }
            Err(_) => {
                warn!(
                    to = %message.to,
                    timeout_ms = self.send_timeout.as_millis() as u64,
                    "Email send timed out"
                );
                DeliveryOutcome::TimedOut
            }
        }
    }
}
