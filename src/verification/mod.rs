//! Verification gate: turns a classifier probability into an accept/reject
//! decision for issue creation and issue resolution.
//!
//! The gate is advisory. When the classifier cannot be consulted (not loaded,
//! request failed, nonsensical score) every mode accepts, so an infrastructure
//! outage never blocks the workflow. When a score is available:
//!
//! | mode       | reject when          | accept when           |
//! |------------|----------------------|-----------------------|
//! | creation   | probability < 0.50   | probability >= 0.50   |
//! | resolution | probability > 0.30   | probability <= 0.30   |

pub mod classifier;
pub mod http;

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::observability::lifecycle_metrics;

pub use classifier::{ClassifierError, ImageClassifier, ScriptedClassifier, ScriptedOutcome};
pub use http::HttpClassifier;

/// Minimum waste probability for a new report to be accepted.
pub const CREATION_ACCEPT_THRESHOLD: f64 = 0.50;
/// Waste probability above which a proof photo is rejected.
pub const RESOLUTION_REJECT_THRESHOLD: f64 = 0.30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateMode {
    Creation,
    Resolution,
}

impl fmt::Display for GateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateMode::Creation => f.write_str("creation"),
            GateMode::Resolution => f.write_str("resolution"),
        }
    }
}

impl std::str::FromStr for GateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "creation" => Ok(GateMode::Creation),
            "resolution" => Ok(GateMode::Resolution),
            other => Err(format!("invalid gate mode '{other}'")),
        }
    }
}

/// Result of consulting the classifier
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Score {
    Measured(f64),
    Unavailable,
}

impl Score {
    pub fn probability(self) -> Option<f64> {
        match self {
            Score::Measured(p) => Some(p),
            Score::Unavailable => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Accept { score: Score },
    Reject { reason: String, probability: f64 },
}

impl GateDecision {
    pub fn is_accept(&self) -> bool {
        matches!(self, GateDecision::Accept { .. })
    }

    pub fn is_reject(&self) -> bool {
        !self.is_accept()
    }
}

pub struct VerificationGate {
    classifier: Arc<dyn ImageClassifier>,
}

impl VerificationGate {
    pub fn new(classifier: Arc<dyn ImageClassifier>) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &Arc<dyn ImageClassifier> {
        &self.classifier
    }

    /// Ask the classifier for a waste probability. Never retries; any failure
    /// or a classifier that has not finished loading yields `Unavailable`.
    pub async fn score(&self, image: &[u8]) -> Score {
        if !self.classifier.is_ready() {
            warn!("Classifier not loaded, verification skipped");
            return Score::Unavailable;
        }

        match self.classifier.classify(image).await {
            Ok(probability) if probability.is_finite() && (0.0..=1.0).contains(&probability) => {
                debug!(probability, "Classifier scored image");
                Score::Measured(probability)
            }
            Ok(probability) => {
                warn!(probability, "Classifier returned out-of-range probability, ignoring");
                Score::Unavailable
            }
            Err(e) => {
                warn!(error = %e, "Classifier call failed, verification skipped");
                Score::Unavailable
            }
        }
    }

    /// Apply the per-mode policy to a score.
    pub fn evaluate(mode: GateMode, score: Score) -> GateDecision {
        let probability = match score {
            Score::Unavailable => return GateDecision::Accept { score },
            Score::Measured(p) => p,
        };

        match mode {
            GateMode::Creation if probability < CREATION_ACCEPT_THRESHOLD => GateDecision::Reject {
                reason: "The photo does not appear to show a cleanliness issue".to_string(),
                probability,
            },
            GateMode::Resolution if probability > RESOLUTION_REJECT_THRESHOLD => {
                GateDecision::Reject {
                    reason: "Waste is still visible in the proof photo".to_string(),
                    probability,
                }
            }
            _ => GateDecision::Accept { score },
        }
    }

    /// Score and evaluate in one step, recording the outcome.
    pub async fn verify(&self, mode: GateMode, image: &[u8]) -> GateDecision {
        let score = self.score(image).await;
        let decision = Self::evaluate(mode, score);

        let metrics = lifecycle_metrics();
        match (&decision, score) {
            (GateDecision::Reject { probability, .. }, _) => {
                metrics.record_gate_reject();
                info!(%mode, probability, "Verification gate rejected image");
            }
            (GateDecision::Accept { .. }, Score::Unavailable) => {
                metrics.record_gate_unavailable();
                info!(%mode, "Verification gate accepted image without a score");
            }
            (GateDecision::Accept { .. }, Score::Measured(probability)) => {
                metrics.record_gate_accept();
                info!(%mode, probability, "Verification gate accepted image");
            }
        }

        decision
    }
}
