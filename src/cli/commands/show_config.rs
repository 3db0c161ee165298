use anyhow::Result;

use crate::config::CleanStreetsConfig;

pub struct ShowConfigCommand<'a> {
    config: &'a CleanStreetsConfig,
}

impl<'a> ShowConfigCommand<'a> {
    pub fn new(config: &'a CleanStreetsConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<()> {
        let mut shown = self.config.clone();
        if shown.email.api_key.is_some() {
            shown.email.api_key = Some("********".to_string());
        }
        println!("⚙️  Effective configuration:");
        println!();
        print!("{}", toml::to_string_pretty(&shown)?);
        Ok(())
    }
}
