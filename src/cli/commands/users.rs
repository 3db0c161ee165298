use anyhow::{Context, Result};

use super::{resolve_actor, Command};
use crate::app::CleanStreets;
use crate::types::{NewUser, Role};

pub struct AddUserCommand {
    pub name: String,
    pub email: String,
    pub role: String,
    pub ward: Option<String>,
}

impl Command for AddUserCommand {
    async fn execute(&self, app: &CleanStreets) -> Result<()> {
        let role: Role = self.role.parse().map_err(anyhow::Error::msg)?;
        let user = app
            .store()
            .insert_user(&NewUser {
                name: self.name.trim().to_string(),
                email: self.email.trim().to_lowercase(),
                role,
                ward_number: self.ward.clone(),
            })
            .await
            .with_context(|| format!("Failed to add user {}", self.email))?;

        println!("👤 Added {} #{}: {} <{}>", user.role, user.id, user.name, user.email);
        Ok(())
    }
}

pub struct SetRoleCommand {
    pub actor: i64,
    pub user: i64,
    pub role: String,
}

impl Command for SetRoleCommand {
    async fn execute(&self, app: &CleanStreets) -> Result<()> {
        let actor = resolve_actor(app, self.actor).await?;
        let user = app
            .users()
            .set_role(actor, self.user, &self.role)
            .await
            .inspect_err(|e| println!("❌ Role change refused: {e}"))?;
        println!("🎖️  {} #{} is now {}", user.name, user.id, user.role);
        Ok(())
    }
}

pub struct SetWardCommand {
    pub actor: i64,
    pub user: i64,
    pub ward: Option<String>,
}

impl Command for SetWardCommand {
    async fn execute(&self, app: &CleanStreets) -> Result<()> {
        let actor = resolve_actor(app, self.actor).await?;
        let user = app
            .users()
            .set_ward(actor, self.user, self.ward.as_deref())
            .await
            .inspect_err(|e| println!("❌ Ward change refused: {e}"))?;
        match &user.ward_number {
            Some(ward) => println!("🏘️  {} #{} now belongs to ward {}", user.name, user.id, ward),
            None => println!("🏘️  {} #{} no longer has a ward", user.name, user.id),
        }
        Ok(())
    }
}
