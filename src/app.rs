//! Service wiring: builds every component from configuration and hands out
//! the three caller-facing services.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::CleanStreetsConfig;
use crate::database::DatabaseManager;
use crate::email::{EmailService, HttpEmailTransport};
use crate::engagement::EngagementCounters;
use crate::lifecycle::LifecycleManager;
use crate::notifications::NotificationInbox;
use crate::orchestrator::SideEffectOrchestrator;
use crate::realtime::BroadcastHub;
use crate::shutdown::ShutdownCoordinator;
use crate::storage::{LocalObjectStorage, ObjectStorage};
use crate::store::{SqliteStore, Store};
use crate::users::UserDirectory;
use crate::verification::{HttpClassifier, ImageClassifier, ScriptedClassifier, VerificationGate};

pub struct CleanStreets {
    config: CleanStreetsConfig,
    database: DatabaseManager,
    store: Arc<dyn Store>,
    classifier: Arc<dyn ImageClassifier>,
    gate: Arc<VerificationGate>,
    hub: Arc<BroadcastHub>,
    orchestrator: SideEffectOrchestrator,
    lifecycle: LifecycleManager,
    engagement: EngagementCounters,
    inbox: NotificationInbox,
    users: UserDirectory,
}

/// Pick the classifier implementation the configuration asks for
pub fn build_classifier(config: &CleanStreetsConfig) -> Result<Arc<dyn ImageClassifier>> {
    let classifier = &config.classifier;
    Ok(match (&classifier.endpoint, classifier.fixed_score) {
        (Some(endpoint), _) => Arc::new(
            HttpClassifier::new(
                endpoint,
                Duration::from_secs(classifier.request_timeout_seconds),
                Duration::from_secs(classifier.load_timeout_seconds),
            )
            .context("Failed to build classifier client")?,
        ),
        (None, Some(score)) => Arc::new(ScriptedClassifier::fixed(score)),
        (None, None) => {
            warn!("No classifier configured, verification will accept every image");
            Arc::new(ScriptedClassifier::never_ready())
        }
    })
}

pub fn build_email(config: &CleanStreetsConfig) -> Result<EmailService> {
    let email = &config.email;
    match (&email.relay_url, &email.api_key) {
        (Some(relay_url), Some(api_key)) => {
            let transport = HttpEmailTransport::new(
                relay_url,
                api_key,
                &email.from_name,
                &email.from_address,
                email.send_timeout(),
            )?;
            Ok(EmailService::new(
                Arc::new(transport),
                email.send_timeout(),
                &email.frontend_url,
            ))
        }
        _ => {
            info!("Email relay not configured, emails will be skipped");
            Ok(EmailService::disabled(&email.frontend_url))
        }
    }
}

impl CleanStreets {
    pub async fn from_config(config: &CleanStreetsConfig) -> Result<Self> {
        let database = DatabaseManager::new(
            &config.database.url,
            config.database.max_connections,
            config.database.auto_migrate,
        )
        .await
        .with_context(|| format!("Failed to open database {}", config.database.url))?;

        let classifier = build_classifier(config)?;
        let storage = Arc::new(LocalObjectStorage::new(
            Path::new(&config.storage.upload_dir),
            &config.storage.public_prefix,
        ));
        let email = build_email(config)?;

        Ok(Self::from_parts(config.clone(), database, classifier, storage, email))
    }

    pub fn from_parts(
        config: CleanStreetsConfig,
        database: DatabaseManager,
        classifier: Arc<dyn ImageClassifier>,
        storage: Arc<dyn ObjectStorage>,
        email: EmailService,
    ) -> Self {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::new(database.pool().clone()));
        let hub = Arc::new(BroadcastHub::with_capacity(config.realtime.channel_capacity));
        let orchestrator = SideEffectOrchestrator::new(
            store.clone(),
            email,
            hub.clone(),
            config.orchestrator.max_concurrent_tasks,
        );
        let gate = Arc::new(VerificationGate::new(classifier.clone()));
        let lifecycle = LifecycleManager::new(store.clone(), storage, gate.clone(), orchestrator.clone())
            .with_max_upload_bytes(config.storage.max_upload_bytes);
        let engagement = EngagementCounters::new(store.clone(), orchestrator.clone());
        let inbox = NotificationInbox::new(store.clone());
        let users = UserDirectory::new(store.clone());

        Self {
            config,
            database,
            store,
            classifier,
            gate,
            hub,
            orchestrator,
            lifecycle,
            engagement,
            inbox,
            users,
        }
    }

    /// Start loading the classifier without blocking startup
    pub fn spawn_classifier_load(&self) -> JoinHandle<()> {
        let classifier = self.classifier.clone();
        tokio::spawn(async move {
            match classifier.load().await {
                Ok(()) => info!("Classifier loaded"),
                Err(e) => warn!(error = %e, "Classifier failed to load, verification will be skipped"),
            }
        })
    }

    pub fn config(&self) -> &CleanStreetsConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn gate(&self) -> &VerificationGate {
        &self.gate
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn engagement(&self) -> &EngagementCounters {
        &self.engagement
    }

    pub fn inbox(&self) -> &NotificationInbox {
        &self.inbox
    }

    pub fn users(&self) -> &UserDirectory {
        &self.users
    }

    pub fn orchestrator(&self) -> &SideEffectOrchestrator {
        &self.orchestrator
    }

    pub fn shutdown_coordinator(&self) -> ShutdownCoordinator {
        ShutdownCoordinator::new(
            self.orchestrator.clone(),
            self.database.clone(),
            self.config.orchestrator.drain_timeout(),
        )
    }

    /// Drain side effects and close the pool
    pub async fn shutdown(&self) {
        self.shutdown_coordinator().shutdown_all_services().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_score_classifier_is_ready() {
        let mut config = CleanStreetsConfig::default();
        config.classifier.fixed_score = Some(0.8);
        assert!(build_classifier(&config).unwrap().is_ready());
    }

    #[test]
    fn test_unconfigured_classifier_never_ready() {
        let config = CleanStreetsConfig::default();
        assert!(!build_classifier(&config).unwrap().is_ready());
    }

    #[test]
    fn test_email_requires_relay_and_key() {
        let mut config = CleanStreetsConfig::default();
        config.email.relay_url = Some("https://relay.example/emails".to_string());
        assert!(!build_email(&config).unwrap().is_enabled());

        config.email.api_key = Some("key".to_string());
        assert!(build_email(&config).unwrap().is_enabled());
    }
}
