use anyhow::Result;
use std::path::PathBuf;

use super::{load_classifier, read_image, resolve_actor, Command};
use crate::app::CleanStreets;
use crate::lifecycle::IssuePayload;

pub struct ReportCommand {
    pub actor: i64,
    pub payload: IssuePayload,
    pub image: PathBuf,
}

impl Command for ReportCommand {
    async fn execute(&self, app: &CleanStreets) -> Result<()> {
        let actor = resolve_actor(app, self.actor).await?;
        let image = read_image(&self.image)?;
        load_classifier(app).await;

        match app.lifecycle().create(actor, &self.payload, Some(image)).await {
            Ok(issue) => {
                println!("📸 Reported issue #{}: {}", issue.id, issue.title);
                println!("   📍 {} ({:.5}, {:.5})", issue.address, issue.latitude, issue.longitude);
                println!("   🏷️  {} / {} / {}", issue.category, issue.priority, issue.status);
                println!("   🖼️  {}", issue.image_ref);
                Ok(())
            }
            Err(e) => {
                println!("❌ Report rejected: {e}");
                Err(e.into())
            }
        }
    }
}
