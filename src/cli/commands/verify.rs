use anyhow::Result;
use std::path::PathBuf;

use super::{load_classifier, read_image, Command};
use crate::app::CleanStreets;
use crate::verification::{GateDecision, GateMode, Score, VerificationGate};

pub struct VerifyCommand {
    pub mode: String,
    pub image: PathBuf,
}

impl Command for VerifyCommand {
    async fn execute(&self, app: &CleanStreets) -> Result<()> {
        let mode: GateMode = self.mode.parse().map_err(anyhow::Error::msg)?;
        let bytes = read_image(&self.image)?;
        load_classifier(app).await;

        let score = app.gate().score(&bytes).await;
        match score {
            Score::Measured(p) => println!("📊 Waste probability: {:.2}", p),
            Score::Unavailable => println!("📊 Waste probability: unavailable"),
        }

        match VerificationGate::evaluate(mode, score) {
            GateDecision::Accept { .. } => println!("✅ {mode} gate would accept this image"),
            GateDecision::Reject { reason, probability } => {
                println!("❌ {mode} gate would reject this image: {reason} ({probability:.2})")
            }
        }
        Ok(())
    }
}
