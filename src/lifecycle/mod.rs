//! Issue lifecycle manager.
//!
//! Owns every write to an issue row. Each operation authorizes the actor,
//! validates its input, consults the verification gate where a photo is
//! involved, persists the change and only then hands the result to the
//! side-effect orchestrator. Nothing the orchestrator does can change the
//! value returned here.

pub mod payload;
pub mod transitions;

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn, Instrument, Span};

use crate::error::CivicError;
use crate::observability::OperationTimer;
use crate::orchestrator::{LifecycleEvent, SideEffectOrchestrator};
use crate::priority::Priority;
use crate::storage::{ImagePurpose, ImageUpload, ObjectStorage, DEFAULT_MAX_UPLOAD_BYTES};
use crate::store::{NewIssue, StatusUpdate, Store};
use crate::telemetry::create_lifecycle_span;
use crate::types::*;
use crate::verification::{GateDecision, GateMode, VerificationGate};

pub use payload::IssuePayload;
pub use transitions::{allowed_targets, check_transition};

pub struct LifecycleManager {
    store: Arc<dyn Store>,
    storage: Arc<dyn ObjectStorage>,
    gate: Arc<VerificationGate>,
    orchestrator: SideEffectOrchestrator,
    max_upload_bytes: usize,
}

impl LifecycleManager {
    pub fn new(
        store: Arc<dyn Store>,
        storage: Arc<dyn ObjectStorage>,
        gate: Arc<VerificationGate>,
        orchestrator: SideEffectOrchestrator,
    ) -> Self {
        Self {
            store,
            storage,
            gate,
            orchestrator,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    pub fn orchestrator(&self) -> &SideEffectOrchestrator {
        &self.orchestrator
    }

    fn intake(&self, image: Option<Vec<u8>>, missing: &str) -> Result<ImageUpload, CivicError> {
        let bytes = image.ok_or_else(|| CivicError::validation(missing))?;
        ImageUpload::from_bytes(bytes, self.max_upload_bytes)
            .map_err(|rejection| CivicError::validation(rejection.to_string()))
    }

    async fn require_gate(&self, mode: GateMode, image: &ImageUpload) -> Result<(), CivicError> {
        match self.gate.verify(mode, image.bytes()).await {
            GateDecision::Accept { .. } => Ok(()),
            GateDecision::Reject { reason, probability } => Err(CivicError::ImageRejected {
                mode,
                reason,
                probability,
            }),
        }
    }

    /// Best-effort removal of an upload whose issue write did not land
    async fn discard_upload(&self, reference: Option<&str>) {
        let Some(reference) = reference else {
            return;
        };
        if let Err(e) = self.storage.delete(reference).await {
            warn!(image_ref = %reference, error = %e, "Failed to remove orphaned upload");
        }
    }

    /// Explain a compare-and-set miss: another transition won, or the issue is gone
    async fn lost_race(&self, issue_id: IssueId, expected: IssueStatus) -> CivicError {
        match self.store.get_issue(issue_id).await {
            Ok(Some(latest)) => {
                warn!(expected = %expected, actual = %latest.status, "Concurrent status change");
                CivicError::validation(format!(
                    "issue {issue_id} was updated concurrently and is now {}",
                    latest.status
                ))
            }
            Ok(None) => CivicError::issue_not_found(issue_id),
            Err(e) => e.into(),
        }
    }

    pub async fn get(&self, issue_id: IssueId) -> Result<Issue, CivicError> {
        self.store
            .get_issue(issue_id)
            .await?
            .ok_or_else(|| CivicError::issue_not_found(issue_id))
    }

    /// Report a new issue. The photo must pass intake and the creation gate
    /// before anything is stored.
    pub async fn create(
        &self,
        actor: Actor,
        payload: &IssuePayload,
        image: Option<Vec<u8>>,
    ) -> Result<Issue, CivicError> {
        let span = create_lifecycle_span("create", Some(actor.id), None);
        async move {
            let timer = OperationTimer::new("create_issue");
            let draft = payload.validate()?;
            let image = self.intake(image, "Image is required")?;

            self.require_gate(GateMode::Creation, &image).await?;

            let image_ref = self.storage.upload(&image, ImagePurpose::Report).await?;
            let inserted = self
                .store
                .insert_issue(&NewIssue {
                    draft,
                    image_ref: image_ref.clone(),
                    created_by: actor.id,
                    created_at: Utc::now(),
                })
                .await;
            let issue = match inserted {
                Ok(issue) => issue,
                Err(e) => {
                    self.discard_upload(Some(&image_ref)).await;
                    return Err(e.into());
                }
            };

            Span::current().record("issue.id", issue.id);
            info!(category = %issue.category, priority = %issue.priority, "Issue reported");

            self.orchestrator.dispatch(LifecycleEvent::IssueCreated {
                issue: issue.clone(),
            });
            timer.finish();
            Ok(issue)
        }
        .instrument(span)
        .await
    }

    /// Move an issue to `new_status`. Resolving or closing requires a proof
    /// photo that passes the resolution gate.
    pub async fn transition(
        &self,
        actor: Actor,
        issue_id: IssueId,
        new_status: &str,
        proof_image: Option<Vec<u8>>,
    ) -> Result<Issue, CivicError> {
        let span = create_lifecycle_span("transition", Some(actor.id), Some(issue_id));
        async move {
            if !actor.role.is_staff() {
                return Err(CivicError::unauthorized(
                    "only officials and admins can update issue status",
                ));
            }
            let target: IssueStatus = new_status.parse().map_err(CivicError::Validation)?;

            // Proof photos are only looked at when the target needs one
            let proof = if target.requires_proof() {
                Some(self.intake(proof_image, "Proof image required to resolve or close an issue")?)
            } else {
                None
            };

            let current = self.get(issue_id).await?;
            check_transition(current.status, target)?;

            let proof_image_ref = match &proof {
                Some(image) => {
                    self.require_gate(GateMode::Resolution, image).await?;
                    Some(self.storage.upload(image, ImagePurpose::Proof).await?)
                }
                None => None,
            };

            let now = Utc::now();
            let update = StatusUpdate {
                status: target,
                proof_image_ref,
                updated_at: now,
                resolved_at: (target == IssueStatus::Resolved).then_some(now),
            };

            let updated = match self
                .store
                .update_issue_status(issue_id, current.status, &update)
                .await
            {
                Ok(Some(updated)) => updated,
                Ok(None) => {
                    self.discard_upload(update.proof_image_ref.as_deref()).await;
                    return Err(self.lost_race(issue_id, current.status).await);
                }
                Err(e) => {
                    self.discard_upload(update.proof_image_ref.as_deref()).await;
                    return Err(e.into());
                }
            };

            info!(from = %current.status, to = %updated.status, "Issue status changed");
            self.orchestrator.dispatch(LifecycleEvent::StatusChanged {
                issue: updated.clone(),
                previous: current.status,
            });
            Ok(updated)
        }
        .instrument(span)
        .await
    }

    pub async fn assign(
        &self,
        actor: Actor,
        issue_id: IssueId,
        assignee_id: UserId,
    ) -> Result<Issue, CivicError> {
        let span = create_lifecycle_span("assign", Some(actor.id), Some(issue_id));
        async move {
            if !actor.role.is_staff() {
                return Err(CivicError::unauthorized(
                    "only officials and admins can assign issues",
                ));
            }

            let assignee = self
                .store
                .get_user(assignee_id)
                .await?
                .ok_or_else(|| CivicError::user_not_found(assignee_id))?;
            if !assignee.role.is_staff() {
                return Err(CivicError::validation(format!(
                    "user {assignee_id} is a {} and cannot be assigned issues",
                    assignee.role
                )));
            }

            let issue = self
                .store
                .assign_issue(issue_id, assignee.id, Utc::now())
                .await?
                .ok_or_else(|| CivicError::issue_not_found(issue_id))?;

            info!(assignee.id = assignee.id, "Issue assigned");
            self.orchestrator.dispatch(LifecycleEvent::Assigned {
                issue: issue.clone(),
                assignee: assignee.id,
            });
            Ok(issue)
        }
        .instrument(span)
        .await
    }

    /// Remove an issue with its comments and likes. Allowed for the reporter
    /// and for staff.
    pub async fn delete(&self, actor: Actor, issue_id: IssueId) -> Result<(), CivicError> {
        let span = create_lifecycle_span("delete", Some(actor.id), Some(issue_id));
        async move {
            let issue = self.get(issue_id).await?;
            if issue.created_by != actor.id && !actor.role.is_staff() {
                return Err(CivicError::unauthorized(
                    "only the reporter or city staff can delete an issue",
                ));
            }

            if !self.store.delete_issue_cascade(issue_id).await? {
                return Err(CivicError::issue_not_found(issue_id));
            }

            info!("Issue deleted");
            self.orchestrator.dispatch(LifecycleEvent::Deleted {
                issue,
                deleted_by: actor.id,
            });
            Ok(())
        }
        .instrument(span)
        .await
    }

    pub async fn set_priority(
        &self,
        actor: Actor,
        issue_id: IssueId,
        priority: &str,
    ) -> Result<Issue, CivicError> {
        let span = create_lifecycle_span("set_priority", Some(actor.id), Some(issue_id));
        async move {
            if actor.role != Role::Admin {
                return Err(CivicError::unauthorized("only admins can change priority"));
            }
            let priority: Priority = priority.parse().map_err(CivicError::Validation)?;

            let issue = self
                .store
                .update_issue_priority(issue_id, priority, Utc::now())
                .await?
                .ok_or_else(|| CivicError::issue_not_found(issue_id))?;

            info!(%priority, "Issue priority changed");
            self.orchestrator.dispatch(LifecycleEvent::PriorityChanged {
                issue: issue.clone(),
            });
            Ok(issue)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::EmailService;
    use crate::realtime::BroadcastHub;
    use crate::storage::fixtures::{jpeg_bytes, png_bytes};
    use crate::storage::{MockObjectStorage, StorageError};
    use crate::store::{MockStore, StoreError};
    use crate::verification::ScriptedClassifier;
    use std::time::Duration;

    fn payload() -> IssuePayload {
        IssuePayload {
            title: Some("Overflowing bin".to_string()),
            description: Some("Not emptied".to_string()),
            category: Some("waste".to_string()),
            address: Some("12 Market Street".to_string()),
            latitude: Some(12.9),
            longitude: Some(77.5),
            priority: None,
        }
    }

    fn stored_issue(status: IssueStatus) -> Issue {
        let now = Utc::now();
        Issue {
            id: 1,
            title: "Overflowing bin".to_string(),
            description: "Not emptied".to_string(),
            category: Category::Waste,
            address: "12 Market Street".to_string(),
            latitude: 12.9,
            longitude: 77.5,
            image_ref: "/uploads/reports/a.png".to_string(),
            proof_image_ref: None,
            status,
            priority: Priority::Medium,
            created_by: 1,
            assigned_to: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        }
    }

    fn manager(store: MockStore, storage: MockObjectStorage, score: f64) -> LifecycleManager {
        let store: Arc<dyn Store> = Arc::new(store);
        let orchestrator = SideEffectOrchestrator::new(
            store.clone(),
            EmailService::disabled("http://app"),
            Arc::new(BroadcastHub::new()),
            2,
        );
        let gate = Arc::new(VerificationGate::new(Arc::new(ScriptedClassifier::fixed(score))));
        LifecycleManager::new(store, Arc::new(storage), gate, orchestrator)
    }

    #[tokio::test]
    async fn test_create_rejected_by_gate_touches_nothing() {
        let mut store = MockStore::new();
        store.expect_insert_issue().never();
        let mut storage = MockObjectStorage::new();
        storage.expect_upload().never();

        let manager = manager(store, storage, 0.2);
        let err = manager
            .create(Actor::citizen(1), &payload(), Some(png_bytes()))
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert_eq!(err.probability(), Some(0.2));
        assert_eq!(manager.orchestrator().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_create_requires_a_real_image() {
        let mut storage = MockObjectStorage::new();
        storage.expect_upload().never();
        let manager = manager(MockStore::new(), storage, 0.9);

        let missing = manager.create(Actor::citizen(1), &payload(), None).await.unwrap_err();
        assert!(missing.to_string().contains("Image is required"));

        let text = manager
            .create(Actor::citizen(1), &payload(), Some(b"not an image".to_vec()))
            .await
            .unwrap_err();
        assert!(text.to_string().contains("Only image files are allowed"));
    }

    #[tokio::test]
    async fn test_storage_failure_is_fatal() {
        let mut store = MockStore::new();
        store.expect_insert_issue().never();
        let mut storage = MockObjectStorage::new();
        storage
            .expect_upload()
            .returning(|_, _| Err(StorageError::Backend("bucket unavailable".to_string())));

        let manager = manager(store, storage, 0.9);
        let err = manager
            .create(Actor::citizen(1), &payload(), Some(png_bytes()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_citizen_cannot_transition() {
        let mut store = MockStore::new();
        store.expect_get_issue().never();
        let manager = manager(store, MockObjectStorage::new(), 0.1);

        let err = manager
            .transition(Actor::citizen(1), 1, "in_progress", None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn test_unknown_status_fails_before_store() {
        let mut store = MockStore::new();
        store.expect_get_issue().never();
        let manager = manager(store, MockObjectStorage::new(), 0.1);

        let err = manager
            .transition(Actor::official(2), 1, "done", None)
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_resolution_without_proof_is_rejected() {
        let mut store = MockStore::new();
        store.expect_get_issue().never();
        store.expect_update_issue_status().never();
        let manager = manager(store, MockObjectStorage::new(), 0.1);

        let err = manager
            .transition(Actor::official(2), 1, "resolved", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Proof image required"));
    }

    #[tokio::test]
    async fn test_dirty_proof_leaves_issue_untouched() {
        let mut store = MockStore::new();
        store
            .expect_get_issue()
            .returning(|_| Ok(Some(stored_issue(IssueStatus::InProgress))));
        store.expect_update_issue_status().never();
        let mut storage = MockObjectStorage::new();
        storage.expect_upload().never();

        let manager = manager(store, storage, 0.45);
        let err = manager
            .transition(Actor::official(2), 1, "resolved", Some(jpeg_bytes()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CivicError::ImageRejected { mode: GateMode::Resolution, .. }
        ));
    }

    #[tokio::test]
    async fn test_closed_issue_cannot_be_reopened() {
        let mut store = MockStore::new();
        store
            .expect_get_issue()
            .returning(|_| Ok(Some(stored_issue(IssueStatus::Closed))));
        store.expect_update_issue_status().never();
        let manager = manager(store, MockObjectStorage::new(), 0.1);

        let err = manager
            .transition(Actor::admin(9), 1, "in_progress", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CivicError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_lost_race_reports_current_status() {
        let mut store = MockStore::new();
        let mut reads = 0;
        store.expect_get_issue().returning(move |_| {
            reads += 1;
            let status = if reads == 1 { IssueStatus::Pending } else { IssueStatus::InProgress };
            Ok(Some(stored_issue(status)))
        });
        store.expect_update_issue_status().returning(|_, _, _| Ok(None));
        let manager = manager(store, MockObjectStorage::new(), 0.1);

        let err = manager
            .transition(Actor::official(2), 1, "in_progress", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("updated concurrently"));
    }

    #[tokio::test]
    async fn test_failed_insert_removes_uploaded_photo() {
        let mut store = MockStore::new();
        store
            .expect_insert_issue()
            .returning(|_| Err(StoreError::Database(sqlx::Error::PoolTimedOut)));
        let mut storage = MockObjectStorage::new();
        storage
            .expect_upload()
            .returning(|_, _| Ok("/uploads/reports/orphan.png".to_string()));
        storage
            .expect_delete()
            .withf(|reference| reference == "/uploads/reports/orphan.png")
            .times(1)
            .returning(|_| Ok(()));

        let manager = manager(store, storage, 0.9);
        let err = manager
            .create(Actor::citizen(1), &payload(), Some(png_bytes()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert_eq!(manager.orchestrator().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_lost_race_removes_uploaded_proof() {
        let mut store = MockStore::new();
        let mut reads = 0;
        store.expect_get_issue().returning(move |_| {
            reads += 1;
            let status = if reads == 1 { IssueStatus::InProgress } else { IssueStatus::Closed };
            Ok(Some(stored_issue(status)))
        });
        store.expect_update_issue_status().returning(|_, _, _| Ok(None));
        let mut storage = MockObjectStorage::new();
        storage
            .expect_upload()
            .returning(|_, _| Ok("/uploads/proofs/late.jpg".to_string()));
        // A failed cleanup is logged, not surfaced
        storage
            .expect_delete()
            .withf(|reference| reference == "/uploads/proofs/late.jpg")
            .times(1)
            .returning(|_| Err(StorageError::Backend("bucket unavailable".to_string())));

        let manager = manager(store, storage, 0.1);
        let err = manager
            .transition(Actor::official(2), 1, "resolved", Some(jpeg_bytes()))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("updated concurrently"));
    }

    #[tokio::test]
    async fn test_failed_status_write_without_proof_deletes_nothing() {
        let mut store = MockStore::new();
        store
            .expect_get_issue()
            .returning(|_| Ok(Some(stored_issue(IssueStatus::Pending))));
        store
            .expect_update_issue_status()
            .returning(|_, _, _| Err(StoreError::Database(sqlx::Error::PoolTimedOut)));
        let mut storage = MockObjectStorage::new();
        storage.expect_delete().never();

        let manager = manager(store, storage, 0.1);
        let err = manager
            .transition(Actor::official(2), 1, "in_progress", None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_assign_requires_staff_assignee() {
        let mut store = MockStore::new();
        store.expect_get_user().returning(|id| {
            Ok(Some(User {
                id,
                name: "Asha".to_string(),
                email: "asha@example.org".to_string(),
                role: Role::Citizen,
                ward_number: None,
                created_at: Utc::now(),
            }))
        });
        store.expect_assign_issue().never();
        let manager = manager(store, MockObjectStorage::new(), 0.1);

        let err = manager.assign(Actor::official(2), 1, 5).await.unwrap_err();
        assert!(err.is_validation());

        let err = manager.assign(Actor::citizen(3), 1, 5).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn test_only_owner_or_staff_can_delete() {
        let mut store = MockStore::new();
        store
            .expect_get_issue()
            .returning(|_| Ok(Some(stored_issue(IssueStatus::Pending))));
        store.expect_delete_issue_cascade().times(1).returning(|_| Ok(true));
        let manager = manager(store, MockObjectStorage::new(), 0.1);

        let err = manager.delete(Actor::citizen(42), 1).await.unwrap_err();
        assert_eq!(err.status_code(), 403);

        manager.delete(Actor::citizen(1), 1).await.unwrap();
        assert!(manager.orchestrator().drain(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_priority_is_admin_only() {
        let mut store = MockStore::new();
        store.expect_update_issue_priority().returning(|_, priority, _| {
            let mut issue = stored_issue(IssueStatus::Pending);
            issue.priority = priority;
            Ok(Some(issue))
        });
        let manager = manager(store, MockObjectStorage::new(), 0.1);

        let err = manager.set_priority(Actor::official(2), 1, "high").await.unwrap_err();
        assert_eq!(err.status_code(), 403);

        let err = manager.set_priority(Actor::admin(9), 1, "urgent").await.unwrap_err();
        assert!(err.is_validation());

        let issue = manager.set_priority(Actor::admin(9), 1, "critical").await.unwrap();
        assert_eq!(issue.priority, Priority::Critical);
        assert!(manager.orchestrator().drain(Duration::from_secs(5)).await);
    }
}
