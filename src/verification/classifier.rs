//! Classifier abstraction consumed by the verification gate.
//!
//! A classifier is constructed once at startup, loaded in the background and
//! then shared read-only between every request. Until `load` completes the
//! classifier reports `is_ready() == false` and the gate treats it as
//! unavailable.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Classifier model is not loaded")]
    NotLoaded,
    #[error("Classifier failed to load: {0}")]
    LoadFailed(String),
    #[error("Classifier request failed: {0}")]
    Transport(String),
    #[error("Classifier returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Binary waste classifier: `classify` returns the probability that the
/// image shows waste.
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    /// Prepare the model. May take long or never succeed.
    async fn load(&self) -> Result<(), ClassifierError>;

    fn is_ready(&self) -> bool;

    async fn classify(&self, image: &[u8]) -> Result<f64, ClassifierError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScriptedOutcome {
    Score(f64),
    Fail,
}

/// Deterministic in-process classifier.
///
/// Queued outcomes are consumed first, then the fallback outcome repeats.
#[derive(Debug)]
pub struct ScriptedClassifier {
    ready: AtomicBool,
    loadable: bool,
    script: Mutex<VecDeque<ScriptedOutcome>>,
    fallback: Mutex<ScriptedOutcome>,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    fn build(ready: bool, loadable: bool, fallback: ScriptedOutcome) -> Self {
        Self {
            ready: AtomicBool::new(ready),
            loadable,
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            calls: AtomicUsize::new(0),
        }
    }

    /// Loaded classifier that always answers `probability`
    pub fn fixed(probability: f64) -> Self {
        Self::build(true, true, ScriptedOutcome::Score(probability))
    }

    /// Loaded classifier whose every call fails
    pub fn failing() -> Self {
        Self::build(true, true, ScriptedOutcome::Fail)
    }

    /// Classifier that never finishes loading
    pub fn never_ready() -> Self {
        Self::build(false, false, ScriptedOutcome::Fail)
    }

    /// Not yet loaded; becomes ready once `load` is called
    pub fn unloaded(probability: f64) -> Self {
        Self::build(false, true, ScriptedOutcome::Score(probability))
    }

    pub fn push(&self, outcome: ScriptedOutcome) {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(outcome);
    }

    pub fn push_score(&self, probability: f64) {
        self.push(ScriptedOutcome::Score(probability));
    }

    pub fn set_fallback(&self, outcome: ScriptedOutcome) {
        *self
            .fallback
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = outcome;
    }

    /// Number of `classify` calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> ScriptedOutcome {
        let queued = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        queued.unwrap_or_else(|| {
            *self
                .fallback
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
        })
    }
}

#[async_trait]
impl ImageClassifier for ScriptedClassifier {
    async fn load(&self) -> Result<(), ClassifierError> {
        if self.loadable {
            self.ready.store(true, Ordering::SeqCst);
            Ok(())
        } else {
            Err(ClassifierError::LoadFailed(
                "scripted classifier is configured to never load".to_string(),
            ))
        }
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn classify(&self, _image: &[u8]) -> Result<f64, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.is_ready() {
            return Err(ClassifierError::NotLoaded);
        }
        match self.next_outcome() {
            ScriptedOutcome::Score(probability) => Ok(probability),
            ScriptedOutcome::Fail => Err(ClassifierError::Transport(
                "scripted classifier failure".to_string(),
            )),
        }
    }
}
