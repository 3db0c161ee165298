// Clean Streets Library - civic cleanliness reporting
// This exposes the core components for testing and integration

pub mod app;
pub mod cli;
pub mod config;
pub mod database;
pub mod email;
pub mod engagement;
pub mod error;
pub mod lifecycle;
pub mod notifications;
pub mod observability;
pub mod orchestrator;
pub mod priority;
pub mod realtime;
pub mod shutdown;
pub mod storage;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod users;
pub mod verification;

// Re-export key types for easy access
pub use app::CleanStreets;
pub use config::{config, init_config, CleanStreetsConfig};
pub use database::DatabaseManager;
pub use email::{EmailService, EmailTransport, HttpEmailTransport};
pub use engagement::{EngagementCounters, LikeState};
pub use error::CivicError;
pub use lifecycle::{IssuePayload, LifecycleManager};
pub use notifications::NotificationInbox;
pub use observability::{lifecycle_metrics, LifecycleMetrics, OperationTimer};
pub use orchestrator::{LifecycleEvent, SideEffect, SideEffectOrchestrator};
pub use priority::Priority;
pub use realtime::{BroadcastHub, RealtimeChannel, RealtimeMessage, Scope};
pub use shutdown::ShutdownCoordinator;
pub use storage::{LocalObjectStorage, ObjectStorage};
pub use store::{SqliteStore, Store, StoreError};
pub use telemetry::{create_lifecycle_span, generate_correlation_id, init_telemetry};
pub use types::{Actor, Category, Comment, Issue, IssueStatus, Notification, Role, User};
pub use users::UserDirectory;
pub use verification::{
    GateDecision, GateMode, HttpClassifier, ImageClassifier, ScriptedClassifier, VerificationGate,
};
