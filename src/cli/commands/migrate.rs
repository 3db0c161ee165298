use anyhow::Result;

use crate::config::DatabaseConfig;
use crate::database::DatabaseManager;

pub struct MigrateCommand {
    database: DatabaseConfig,
}

impl MigrateCommand {
    pub fn new(database: DatabaseConfig) -> Self {
        Self { database }
    }

    pub async fn execute(&self) -> Result<()> {
        println!("🗄️  Migrating {}", self.database.url);
        let db = DatabaseManager::new(&self.database.url, self.database.max_connections, false).await?;
        db.migrate().await?;
        db.shutdown().await;
        println!("✅ Database schema is up to date");
        Ok(())
    }
}
