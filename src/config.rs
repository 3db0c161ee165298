use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::storage::DEFAULT_MAX_UPLOAD_BYTES;

/// Main configuration structure for Clean Streets
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CleanStreetsConfig {
    pub database: DatabaseConfig,
    pub classifier: ClassifierConfig,
    pub storage: StorageConfig,
    pub email: EmailConfig,
    pub orchestrator: OrchestratorConfig,
    pub realtime: RealtimeConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL (SQLite file path or connection string)
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClassifierConfig {
    /// Base URL of the inference service
    pub endpoint: Option<String>,
    /// Deterministic score used when no endpoint is configured
    pub fixed_score: Option<f64>,
    pub request_timeout_seconds: u64,
    /// How long to wait for the service to report healthy at startup
    pub load_timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StorageConfig {
    pub upload_dir: String,
    pub public_prefix: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EmailConfig {
    /// Transactional mail relay; email is disabled when unset
    pub relay_url: Option<String>,
    pub api_key: Option<String>,
    pub from_address: String,
    pub from_name: String,
    pub send_timeout_seconds: u64,
    /// Used for links in email bodies
    pub frontend_url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OrchestratorConfig {
    pub max_concurrent_tasks: usize,
    pub drain_timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RealtimeConfig {
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level
    pub log_level: String,
    /// Emit JSON lines instead of human-readable logs
    pub json_logs: bool,
}

impl Default for CleanStreetsConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://clean-streets.db".to_string(),
                max_connections: 5,
                auto_migrate: true,
            },
            classifier: ClassifierConfig {
                endpoint: None,
                fixed_score: None,
                request_timeout_seconds: 10,
                load_timeout_seconds: 120,
            },
            storage: StorageConfig {
                upload_dir: "uploads".to_string(),
                public_prefix: "/uploads".to_string(),
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            },
            email: EmailConfig {
                relay_url: None,
                api_key: None, // Read from EMAIL_API_KEY when unset
                from_address: "noreply@cleanstreets.local".to_string(),
                from_name: "Clean Streets".to_string(),
                send_timeout_seconds: 5,
                frontend_url: "http://localhost:3000".to_string(),
            },
            orchestrator: OrchestratorConfig {
                max_concurrent_tasks: 16,
                drain_timeout_seconds: 10,
            },
            realtime: RealtimeConfig {
                channel_capacity: 256,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
            },
        }
    }
}

impl EmailConfig {
    /// Email needs both a relay and a key
    pub fn is_configured(&self) -> bool {
        self.relay_url.is_some() && self.api_key.is_some()
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_seconds)
    }
}

impl OrchestratorConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_seconds)
    }
}

impl CleanStreetsConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (clean-streets.toml, .clean-streets-rc)
    /// 3. Environment variables (prefixed with CLEAN_STREETS__)
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Like [`load`](Self::load), with an explicit file layered over the
    /// default file locations.
    pub fn load_from(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if Path::new("clean-streets.toml").exists() {
            builder = builder.add_source(File::with_name("clean-streets"));
        }

        if Path::new(".clean-streets-rc").exists() {
            builder = builder.add_source(
                File::with_name(".clean-streets-rc").format(config::FileFormat::Toml),
            );
        }

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path));
        }

        // Override with environment variables
        builder = builder.add_source(
            Environment::with_prefix("CLEAN_STREETS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut clean_streets_config: CleanStreetsConfig = builder.build()?.try_deserialize()?;

        // Conventional variable names used by hosting platforms
        if std::env::var("CLEAN_STREETS__DATABASE__URL").is_err() {
            if let Ok(url) = std::env::var("DATABASE_URL") {
                clean_streets_config.database.url = url;
            }
        }
        if clean_streets_config.email.api_key.is_none() {
            if let Ok(key) = std::env::var("EMAIL_API_KEY") {
                clean_streets_config.email.api_key = Some(key);
            }
        }

        Ok(clean_streets_config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<CleanStreetsConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = CleanStreetsConfig::load_env_file();
        CleanStreetsConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static CleanStreetsConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}
