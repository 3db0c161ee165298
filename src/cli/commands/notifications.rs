use anyhow::Result;

use super::{resolve_actor, Command};
use crate::app::CleanStreets;

pub struct NotificationsCommand {
    pub actor: i64,
    pub limit: Option<u32>,
    pub mark_all_read: bool,
}

impl Command for NotificationsCommand {
    async fn execute(&self, app: &CleanStreets) -> Result<()> {
        let actor = resolve_actor(app, self.actor).await?;
        let inbox = app.inbox();

        let unread = inbox.unread_count(actor).await?;
        let notifications = inbox.list(actor, self.limit).await?;
        println!("🔔 {} notifications, {} unread", notifications.len(), unread);
        for n in &notifications {
            let marker = if n.is_read { "  " } else { "🆕" };
            println!("{marker} [{}] {}: {}", n.kind, n.title, n.message);
        }

        if self.mark_all_read {
            let marked = inbox.mark_all_read(actor).await?;
            println!("✅ Marked {marked} notifications read");
        }
        Ok(())
    }
}
