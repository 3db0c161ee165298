use anyhow::{Context, Result};
use std::path::Path;

use crate::app::CleanStreets;
use crate::config::CleanStreetsConfig;
use crate::types::{Actor, UserId};

pub mod engagement;
pub mod issue;
pub mod migrate;
pub mod notifications;
pub mod report;
pub mod show_config;
pub mod users;
pub mod verify;

/// One-shot operator command run against a wired service
#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(&self, app: &CleanStreets) -> Result<()>;
}

/// Build the services, run `command`, then drain side effects and close the pool
pub async fn run_with_app<C: Command>(config: &CleanStreetsConfig, command: C) -> Result<()> {
    print!("🔄 Opening {}... ", config.database.url);
    std::io::Write::flush(&mut std::io::stdout())?;

    let app = match CleanStreets::from_config(config).await {
        Ok(app) => {
            println!("✅");
            app
        }
        Err(e) => {
            println!("❌");
            return Err(e);
        }
    };

    let result = command.execute(&app).await;
    app.shutdown().await;
    result
}

/// Resolve a user id into an actor carrying the stored role
pub async fn resolve_actor(app: &CleanStreets, user_id: UserId) -> Result<Actor> {
    let user = app
        .store()
        .get_user(user_id)
        .await?
        .with_context(|| format!("User {user_id} not found"))?;
    Ok(Actor::new(user.id, user.role))
}

/// Wait for the classifier before using the gate
pub async fn load_classifier(app: &CleanStreets) {
    print!("🧠 Loading classifier... ");
    let _ = std::io::Write::flush(&mut std::io::stdout());
    if app.spawn_classifier_load().await.is_ok() && app.gate().classifier().is_ready() {
        println!("✅");
    } else {
        println!("⚠️  unavailable, images will be accepted without a score");
    }
}

pub fn read_image(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read image {}", path.display()))
}

pub fn show_how_to_get_started() -> Result<()> {
    println!("🧹 Clean Streets - civic cleanliness reporting");
    println!();
    println!("To get started:");
    println!("  🗄️  clean-streets migrate                 # Create the database");
    println!("  👤 clean-streets add-user --name ... --email ... --role official");
    println!("  📸 clean-streets report --as <id> ... <photo>");
    println!();
    println!("Staff commands:");
    println!("  🔧 clean-streets transition --as <id> <issue> in_progress");
    println!("  ✅ clean-streets transition --as <id> <issue> resolved --proof <photo>");
    println!("  📌 clean-streets assign --as <id> <issue> <official>");
    println!("  🎖️  clean-streets set-role --as <admin> <user> official");
    println!();
    println!("💡 Run 'clean-streets show-config' to see the effective configuration");
    Ok(())
}
