use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use super::{EmailError, EmailMessage, EmailTransport};

#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

/// Transactional mail relay reached over HTTPS.
///
/// Posts `{from, to, subject, html}` as JSON with `Authorization: Bearer <key>`.
#[derive(Debug, Clone)]
pub struct HttpEmailTransport {
    client: reqwest::Client,
    relay_url: String,
    api_key: String,
    from: String,
}

impl HttpEmailTransport {
    pub fn new(
        relay_url: &str,
        api_key: &str,
        from_name: &str,
        from_address: &str,
        request_timeout: Duration,
    ) -> Result<Self, EmailError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| EmailError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            relay_url: relay_url.to_string(),
            api_key: api_key.to_string(),
            from: format!("{from_name} <{from_address}>"),
        })
    }

    pub fn from_header(&self) -> &str {
        &self.from
    }
}

#[async_trait]
impl EmailTransport for HttpEmailTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let body = RelayRequest {
            from: &self.from,
            to: [&message.to],
            subject: &message.subject,
            html: &message.html,
        };

        let response = self
            .client
            .post(&self.relay_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmailError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(EmailError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
