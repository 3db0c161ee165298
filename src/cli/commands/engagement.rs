use anyhow::Result;

use super::{resolve_actor, Command};
use crate::app::CleanStreets;

pub struct LikeCommand {
    pub actor: i64,
    pub issue: i64,
}

impl Command for LikeCommand {
    async fn execute(&self, app: &CleanStreets) -> Result<()> {
        let actor = resolve_actor(app, self.actor).await?;
        let state = app.engagement().toggle_like(actor, self.issue).await?;
        let verb = if state.liked { "👍 Liked" } else { "👎 Unliked" };
        println!("{verb} issue #{} ({} likes)", self.issue, state.likes);
        Ok(())
    }
}

pub struct CommentCommand {
    pub actor: i64,
    pub issue: i64,
    pub text: String,
}

impl Command for CommentCommand {
    async fn execute(&self, app: &CleanStreets) -> Result<()> {
        let actor = resolve_actor(app, self.actor).await?;
        let comment = app
            .engagement()
            .add_comment(actor, self.issue, &self.text)
            .await?;
        let total = app.engagement().list_comments(self.issue).await?.len();
        println!("💬 Comment #{} added to issue #{} ({} total)", comment.id, self.issue, total);
        Ok(())
    }
}
