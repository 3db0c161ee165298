use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use super::classifier::{ClassifierError, ImageClassifier};

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    probability: f64,
}

/// Classifier served by an out-of-process inference service.
///
/// * `GET  {endpoint}/health`   answers 200 once the model is in memory
/// * `POST {endpoint}/classify` takes the raw image bytes and answers
///   `{"probability": <f64>}`
#[derive(Debug)]
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: String,
    ready: AtomicBool,
    load_timeout: Duration,
    poll_interval: Duration,
}

impl HttpClassifier {
    pub fn new(
        endpoint: &str,
        request_timeout: Duration,
        load_timeout: Duration,
    ) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ClassifierError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            ready: AtomicBool::new(false),
            load_timeout,
            poll_interval: Duration::from_secs(2),
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ImageClassifier for HttpClassifier {
    async fn load(&self) -> Result<(), ClassifierError> {
        let health_url = format!("{}/health", self.endpoint);
        let deadline = Instant::now() + self.load_timeout;

        loop {
            match self.client.get(&health_url).send().await {
                Ok(response) if response.status().is_success() => {
                    self.ready.store(true, Ordering::SeqCst);
                    info!(endpoint = %self.endpoint, "Classifier service is ready");
                    return Ok(());
                }
                Ok(response) => {
                    debug!(status = %response.status(), "Classifier service not ready yet");
                }
                Err(e) => {
                    debug!(error = %e, "Classifier service unreachable");
                }
            }

            if Instant::now() + self.poll_interval > deadline {
                return Err(ClassifierError::LoadFailed(format!(
                    "{} did not become healthy within {}s",
                    health_url,
                    self.load_timeout.as_secs()
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn classify(&self, image: &[u8]) -> Result<f64, ClassifierError> {
        if !self.is_ready() {
            return Err(ClassifierError::NotLoaded);
        }

        let response = self
            .client
            .post(format!("{}/classify", self.endpoint))
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .map_err(|e| ClassifierError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Transport(format!(
                "classifier answered HTTP {}",
                status
            )));
        }

        let body: ClassifyResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::InvalidResponse(e.to_string()))?;
        Ok(body.probability)
    }
}
