use anyhow::Result;
use std::path::PathBuf;

use super::{load_classifier, read_image, resolve_actor, Command};
use crate::app::CleanStreets;

pub struct TransitionCommand {
    pub actor: i64,
    pub issue: i64,
    pub status: String,
    pub proof: Option<PathBuf>,
}

impl Command for TransitionCommand {
    async fn execute(&self, app: &CleanStreets) -> Result<()> {
        let actor = resolve_actor(app, self.actor).await?;
        let proof = match &self.proof {
            Some(path) => {
                let bytes = read_image(path)?;
                load_classifier(app).await;
                Some(bytes)
            }
            None => None,
        };

        let issue = app
            .lifecycle()
            .transition(actor, self.issue, &self.status, proof)
            .await
            .inspect_err(|e| println!("❌ Transition refused: {e}"))?;

        println!("🔧 Issue #{} is now {}", issue.id, issue.status.label());
        if let Some(resolved_at) = issue.resolved_at {
            println!("   ✅ Resolved at {}", resolved_at.to_rfc3339());
        }
        if let Some(proof) = &issue.proof_image_ref {
            println!("   🖼️  Proof: {proof}");
        }
        Ok(())
    }
}

pub struct AssignCommand {
    pub actor: i64,
    pub issue: i64,
    pub official: i64,
}

impl Command for AssignCommand {
    async fn execute(&self, app: &CleanStreets) -> Result<()> {
        let actor = resolve_actor(app, self.actor).await?;
        let issue = app
            .lifecycle()
            .assign(actor, self.issue, self.official)
            .await
            .inspect_err(|e| println!("❌ Assignment refused: {e}"))?;
        println!("📌 Issue #{} assigned to user #{}", issue.id, self.official);
        Ok(())
    }
}

pub struct PriorityCommand {
    pub actor: i64,
    pub issue: i64,
    pub priority: String,
}

impl Command for PriorityCommand {
    async fn execute(&self, app: &CleanStreets) -> Result<()> {
        let actor = resolve_actor(app, self.actor).await?;
        let issue = app
            .lifecycle()
            .set_priority(actor, self.issue, &self.priority)
            .await
            .inspect_err(|e| println!("❌ Priority change refused: {e}"))?;
        println!("🚦 Issue #{} priority is now {}", issue.id, issue.priority);
        Ok(())
    }
}

pub struct DeleteCommand {
    pub actor: i64,
    pub issue: i64,
}

impl Command for DeleteCommand {
    async fn execute(&self, app: &CleanStreets) -> Result<()> {
        let actor = resolve_actor(app, self.actor).await?;
        app.lifecycle()
            .delete(actor, self.issue)
            .await
            .inspect_err(|e| println!("❌ Delete refused: {e}"))?;
        println!("🗑️  Issue #{} deleted with its comments and likes", self.issue);
        Ok(())
    }
}
