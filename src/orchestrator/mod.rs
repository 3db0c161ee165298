//! Side-effect orchestrator.
//!
//! [`SideEffectOrchestrator::dispatch`] returns immediately. A planner task
//! expands the event into side effects and spawns each one as its own task on
//! a shared [`TaskTracker`]; a semaphore bounds how many run at once. Every
//! task catches its own failure (including panics), logs it and moves on, so
//! one slow or broken recipient never holds up the others.

pub mod tasks;

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::email::{templates, DeliveryOutcome, EmailService};
use crate::observability::lifecycle_metrics;
use crate::realtime::RealtimeChannel;
use crate::store::Store;
use crate::types::NewNotification;

pub use tasks::{plan, EmailTemplate, LifecycleEvent, SideEffect};

pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskOutcome {
    Succeeded,
    Skipped,
    Failed,
    TimedOut,
}

#[derive(Clone)]
pub struct SideEffectOrchestrator {
    store: Arc<dyn Store>,
    email: EmailService,
    realtime: Arc<dyn RealtimeChannel>,
    tracker: TaskTracker,
    permits: Arc<Semaphore>,
}

impl SideEffectOrchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        email: EmailService,
        realtime: Arc<dyn RealtimeChannel>,
        max_concurrent_tasks: usize,
    ) -> Self {
        Self {
            store,
            email,
            realtime,
            tracker: TaskTracker::new(),
            permits: Arc::new(Semaphore::new(max_concurrent_tasks.max(1))),
        }
    }

    /// Fire and forget. Must be called from within a tokio runtime.
    pub fn dispatch(&self, event: LifecycleEvent) {
        let span = info_span!(
            "side_effects",
            event = event.name(),
            issue.id = event.issue().id
        );
        let this = self.clone();
        self.tracker.spawn(async move { this.fan_out(event).await }.instrument(span));
    }

    /// Number of planner and side-effect tasks still running
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for every outstanding side effect, up to `timeout`.
    /// Returns `false` if tasks were still running when the timeout hit.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let drained = tokio::time::timeout(timeout, self.tracker.wait()).await.is_ok();
        self.tracker.reopen();

        if drained {
            debug!("Side-effect tasks drained");
        } else {
            warn!(
                remaining = self.tracker.len(),
                timeout_ms = timeout.as_millis() as u64,
                "Timed out draining side-effect tasks"
            );
        }
        drained
    }

    async fn fan_out(&self, event: LifecycleEvent) {
        for effect in plan(&event) {
            match effect {
                SideEffect::NotifyRole {
                    role,
                    title,
                    message,
                    kind,
                    related_id,
                } => {
                    let recipients = match self.store.list_users_by_role(role).await {
                        Ok(users) => users,
                        Err(e) => {
                            lifecycle_metrics().record_failed();
                            warn!(%role, error = %e, "Could not load notification recipients");
                            continue;
                        }
                    };
                    for user in recipients {
                        self.spawn_effect(SideEffect::Notify(NewNotification {
                            user_id: user.id,
                            title: title.clone(),
                            message: message.clone(),
                            kind,
                            related_id: Some(related_id),
                        }));
                    }
                }
                other => self.spawn_effect(other),
            }
        }
    }

    fn spawn_effect(&self, effect: SideEffect) {
        lifecycle_metrics().record_dispatched();
        let this = self.clone();
        let span = info_span!("side_effect", task = effect.kind());

        self.tracker.spawn(
            async move {
                let Ok(_permit) = this.permits.clone().acquire_owned().await else {
                    return;
                };
                let outcome = AssertUnwindSafe(this.execute(effect)).catch_unwind().await;

                let metrics = lifecycle_metrics();
                match outcome {
                    Ok(TaskOutcome::Succeeded) => metrics.record_succeeded(),
                    Ok(TaskOutcome::Skipped) => metrics.record_skipped(),
                    Ok(TaskOutcome::Failed) => metrics.record_failed(),
                    Ok(TaskOutcome::TimedOut) => metrics.record_timed_out(),
                    Err(_) => {
                        metrics.record_failed();
                        warn!("Side-effect task panicked");
                    }
                }
            }
            .instrument(span),
        );
    }

    async fn execute(&self, effect: SideEffect) -> TaskOutcome {
        match effect {
            SideEffect::Notify(notification) => {
                match self.store.insert_notification(&notification).await {
                    Ok(saved) => {
                        debug!(notification.id = saved.id, user.id = saved.user_id, "Notification stored");
                        TaskOutcome::Succeeded
                    }
                    Err(e) => {
                        warn!(user.id = notification.user_id, error = %e, "Failed to store notification");
                        TaskOutcome::Failed
                    }
                }
            }
            SideEffect::Email {
                recipient,
                issue,
                template,
            } => {
                if !self.email.is_enabled() {
                    debug!(user.id = recipient, "Email transport not configured, skipping");
                    return TaskOutcome::Skipped;
                }
                let user = match self.store.get_user(recipient).await {
                    Ok(Some(user)) => user,
                    Ok(None) => {
                        debug!(user.id = recipient, "Email recipient no longer exists");
                        return TaskOutcome::Skipped;
                    }
                    Err(e) => {
                        warn!(user.id = recipient, error = %e, "Failed to load email recipient");
                        return TaskOutcome::Failed;
                    }
                };

                let frontend_url = self.email.frontend_url();
                let message = match &template {
                    EmailTemplate::StatusUpdate { previous } => {
                        templates::status_update(&user, &issue, *previous, frontend_url)
                    }
                    EmailTemplate::Resolved => templates::resolved(&user, &issue, frontend_url),
                    EmailTemplate::NewComment { comment } => {
                        templates::new_comment(&user, &issue, comment, frontend_url)
                    }
                    EmailTemplate::Assignment => templates::assignment(&user, &issue, frontend_url),
                    EmailTemplate::Deletion => templates::deletion(&user, &issue),
                };

                match self.email.deliver(&message).await {
                    DeliveryOutcome::Sent => TaskOutcome::Succeeded,
                    DeliveryOutcome::Skipped => TaskOutcome::Skipped,
                    DeliveryOutcome::Failed => TaskOutcome::Failed,
                    DeliveryOutcome::TimedOut => TaskOutcome::TimedOut,
                }
            }
            SideEffect::BroadcastAll { event, payload } => {
                self.realtime.broadcast_all(event, payload);
                TaskOutcome::Succeeded
            }
            SideEffect::BroadcastToIssue {
                issue_id,
                event,
                payload,
            } => {
                self.realtime.broadcast_to_issue(issue_id, event, payload);
                TaskOutcome::Succeeded
            }
            SideEffect::NotifyRole { role, .. } => {
                // Expanded by the planner before tasks are spawned
                info!(%role, "Unexpanded role notification ignored");
                TaskOutcome::Skipped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::{EmailError, MockEmailTransport};
    use crate::priority::Priority;
    use crate::realtime::{BroadcastHub, Scope, ISSUE_UPDATED, NEW_ISSUE};
    use crate::store::{MockStore, StoreError};
    use crate::types::*;
    use chrono::Utc;
    use std::sync::Mutex;

    fn issue() -> Issue {
        let now = Utc::now();
        Issue {
            id: 3,
            title: "Graffiti on bridge".to_string(),
            description: "Fresh paint".to_string(),
            category: Category::Graffiti,
            address: "River bridge".to_string(),
            latitude: 0.0,
            longitude: 0.0,
            image_ref: "/uploads/reports/g.png".to_string(),
            proof_image_ref: None,
            status: IssueStatus::Pending,
            priority: Priority::Low,
            created_by: 1,
            assigned_to: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        }
    }

    fn user(id: UserId, role: Role) -> User {
        User {
            id,
            name: format!("user{id}"),
            email: format!("user{id}@example.org"),
            role,
            ward_number: None,
            created_at: Utc::now(),
        }
    }

    fn saved(n: &NewNotification) -> Notification {
        Notification {
            id: 1,
            user_id: n.user_id,
            title: n.title.clone(),
            message: n.message.clone(),
            kind: n.kind,
            related_id: n.related_id,
            is_read: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_one_failing_recipient_does_not_stop_the_others() {
        let recipients = Arc::new(Mutex::new(Vec::new()));
        let seen = recipients.clone();

        let mut store = MockStore::new();
        store
            .expect_list_users_by_role()
            .returning(|_| Ok(vec![user(10, Role::Official), user(11, Role::Official), user(12, Role::Official)]));
        store.expect_insert_notification().returning(move |n| {
            seen.lock().unwrap().push(n.user_id);
            if n.user_id == 11 {
                Err(StoreError::Corrupt {
                    table: "notifications",
                    message: "disk full".to_string(),
                })
            } else {
                Ok(saved(n))
            }
        });

        let hub = BroadcastHub::new();
        let mut all = hub.subscribe();
        let orchestrator = SideEffectOrchestrator::new(
            Arc::new(store),
            EmailService::disabled("http://app"),
            Arc::new(hub),
            4,
        );

        orchestrator.dispatch(LifecycleEvent::IssueCreated { issue: issue() });
        assert!(orchestrator.drain(Duration::from_secs(5)).await);

        let mut ids = recipients.lock().unwrap().clone();
        ids.sort();
        // creator plus three officials
        assert_eq!(ids, vec![1, 10, 11, 12]);

        let message = all.recv().await.unwrap();
        assert_eq!(message.event, NEW_ISSUE);
        assert_eq!(message.scope, Scope::All);
        assert_eq!(message.payload["id"], 3);
    }

    #[tokio::test]
    async fn test_email_failure_is_isolated() {
        let mut store = MockStore::new();
        store.expect_insert_notification().returning(|n| Ok(saved(n)));
        store
            .expect_get_user()
            .returning(|id| Ok(Some(user(id, Role::Citizen))));

        let mut transport = MockEmailTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| Err(EmailError::Transport("relay down".to_string())));

        let hub = BroadcastHub::new();
        let mut room = hub.subscribe_issue(3);
        let orchestrator = SideEffectOrchestrator::new(
            Arc::new(store),
            EmailService::new(Arc::new(transport), Duration::from_secs(1), "http://app"),
            Arc::new(hub),
            4,
        );

        let mut updated = issue();
        updated.status = IssueStatus::InProgress;
        orchestrator.dispatch(LifecycleEvent::StatusChanged {
            issue: updated,
            previous: IssueStatus::Pending,
        });
        assert!(orchestrator.drain(Duration::from_secs(5)).await);

        let message = room.recv().await.unwrap();
        assert_eq!(message.event, ISSUE_UPDATED);
        assert_eq!(message.payload["status"], "in_progress");
    }

    #[tokio::test]
    async fn test_email_skipped_without_transport_never_loads_recipient() {
        let mut store = MockStore::new();
        store.expect_insert_notification().returning(|n| Ok(saved(n)));
        store.expect_get_user().never();

        let orchestrator = SideEffectOrchestrator::new(
            Arc::new(store),
            EmailService::disabled("http://app"),
            Arc::new(BroadcastHub::new()),
            2,
        );
        orchestrator.dispatch(LifecycleEvent::Assigned {
            issue: issue(),
            assignee: 7,
        });
        assert!(orchestrator.drain(Duration::from_secs(5)).await);
        assert_eq!(orchestrator.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_roster_lookup_failure_keeps_other_effects() {
        let mut store = MockStore::new();
        store.expect_list_users_by_role().returning(|_| {
            Err(StoreError::Corrupt {
                table: "users",
                message: "bad role".to_string(),
            })
        });
        store
            .expect_insert_notification()
            .times(1)
            .returning(|n| Ok(saved(n)));

        let hub = BroadcastHub::new();
        let mut all = hub.subscribe();
        let orchestrator = SideEffectOrchestrator::new(
            Arc::new(store),
            EmailService::disabled("http://app"),
            Arc::new(hub),
            2,
        );
        orchestrator.dispatch(LifecycleEvent::IssueCreated { issue: issue() });
        assert!(orchestrator.drain(Duration::from_secs(5)).await);
        assert_eq!(all.recv().await.unwrap().event, NEW_ISSUE);
    }
}
