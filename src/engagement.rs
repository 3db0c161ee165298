//! Likes and comments.
//!
//! A like is nothing more than the existence of a `(issue, user)` row. The
//! check-then-write in [`EngagementCounters::toggle_like`] is not atomic; the
//! store's primary key is what keeps one row per pair, and an insert that
//! loses that race is read as "already liked".

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, Instrument};

use crate::error::CivicError;
use crate::orchestrator::{LifecycleEvent, SideEffectOrchestrator};
use crate::store::{LikeInsert, Store};
use crate::telemetry::create_lifecycle_span;
use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeState {
    pub liked: bool,
    pub likes: u64,
}

pub struct EngagementCounters {
    store: Arc<dyn Store>,
    orchestrator: SideEffectOrchestrator,
}

impl EngagementCounters {
    pub fn new(store: Arc<dyn Store>, orchestrator: SideEffectOrchestrator) -> Self {
        Self { store, orchestrator }
    }

    async fn existing_issue(&self, issue_id: IssueId) -> Result<Issue, CivicError> {
        self.store
            .get_issue(issue_id)
            .await?
            .ok_or_else(|| CivicError::issue_not_found(issue_id))
    }

    pub async fn toggle_like(&self, actor: Actor, issue_id: IssueId) -> Result<LikeState, CivicError> {
        self.existing_issue(issue_id).await?;

        let liked = if self.store.has_like(issue_id, actor.id).await? {
            self.store.delete_like(issue_id, actor.id).await?;
            false
        } else {
            match self.store.insert_like(issue_id, actor.id).await? {
                LikeInsert::Inserted => {}
                LikeInsert::AlreadyPresent => {
                    debug!(issue.id = issue_id, user.id = actor.id, "Concurrent like already present");
                }
            }
            true
        };

        let likes = self.store.count_likes(issue_id).await?;
        Ok(LikeState { liked, likes })
    }

    /// Remove the actor's like if there is one
    pub async fn unlike(&self, actor: Actor, issue_id: IssueId) -> Result<LikeState, CivicError> {
        self.existing_issue(issue_id).await?;
        self.store.delete_like(issue_id, actor.id).await?;
        let likes = self.store.count_likes(issue_id).await?;
        Ok(LikeState { liked: false, likes })
    }

    pub async fn like_count(&self, issue_id: IssueId) -> Result<u64, CivicError> {
        Ok(self.store.count_likes(issue_id).await?)
    }

    pub async fn has_liked(&self, actor: Actor, issue_id: IssueId) -> Result<bool, CivicError> {
        Ok(self.store.has_like(issue_id, actor.id).await?)
    }

    pub async fn add_comment(
        &self,
        actor: Actor,
        issue_id: IssueId,
        text: &str,
    ) -> Result<Comment, CivicError> {
        let span = create_lifecycle_span("add_comment", Some(actor.id), Some(issue_id));
        async move {
            let text = text.trim();
            if text.is_empty() {
                return Err(CivicError::validation("comment text is required"));
            }

            let issue = self.existing_issue(issue_id).await?;
            let comment = self.store.insert_comment(issue_id, actor.id, text).await?;

            info!(comment.id = comment.id, "Comment added");
            self.orchestrator.dispatch(LifecycleEvent::CommentAdded {
                issue,
                comment: comment.clone(),
            });
            Ok(comment)
        }
        .instrument(span)
        .await
    }

    /// Oldest first
    pub async fn list_comments(&self, issue_id: IssueId) -> Result<Vec<Comment>, CivicError> {
        self.existing_issue(issue_id).await?;
        Ok(self.store.list_comments(issue_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::EmailService;
    use crate::priority::Priority;
    use crate::realtime::BroadcastHub;
    use crate::store::MockStore;
    use chrono::Utc;
    use std::time::Duration;

    fn issue() -> Issue {
        let now = Utc::now();
        Issue {
            id: 4,
            title: "Litter in park".to_string(),
            description: "Near the gate".to_string(),
            category: Category::StreetCleaning,
            address: "City Park".to_string(),
            latitude: 0.0,
            longitude: 0.0,
            image_ref: "/uploads/reports/p.png".to_string(),
            proof_image_ref: None,
            status: IssueStatus::Pending,
            priority: Priority::Medium,
            created_by: 1,
            assigned_to: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        }
    }

    fn counters(store: MockStore) -> EngagementCounters {
        let store: Arc<dyn Store> = Arc::new(store);
        let orchestrator = SideEffectOrchestrator::new(
            store.clone(),
            EmailService::disabled("http://app"),
            Arc::new(BroadcastHub::new()),
            2,
        );
        EngagementCounters::new(store, orchestrator)
    }

    #[tokio::test]
    async fn test_lost_insert_race_reads_as_liked() {
        let mut store = MockStore::new();
        store.expect_get_issue().returning(|_| Ok(Some(issue())));
        store.expect_has_like().returning(|_, _| Ok(false));
        store
            .expect_insert_like()
            .returning(|_, _| Ok(LikeInsert::AlreadyPresent));
        store.expect_count_likes().returning(|_| Ok(1));

        let state = counters(store).toggle_like(Actor::citizen(2), 4).await.unwrap();
        assert_eq!(state, LikeState { liked: true, likes: 1 });
    }

    #[tokio::test]
    async fn test_toggle_on_missing_issue() {
        let mut store = MockStore::new();
        store.expect_get_issue().returning(|_| Ok(None));
        store.expect_insert_like().never();

        let err = counters(store).toggle_like(Actor::citizen(2), 99).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_unlike_on_missing_issue() {
        let mut store = MockStore::new();
        store.expect_get_issue().returning(|_| Ok(None));
        store.expect_delete_like().never();
        store.expect_count_likes().never();

        let err = counters(store).unlike(Actor::citizen(2), 99).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_unlike_is_idempotent() {
        let mut store = MockStore::new();
        store.expect_get_issue().returning(|_| Ok(Some(issue())));
        store.expect_delete_like().times(2).returning(|_, _| Ok(false));
        store.expect_count_likes().returning(|_| Ok(0));

        let counters = counters(store);
        for _ in 0..2 {
            let state = counters.unlike(Actor::citizen(2), 4).await.unwrap();
            assert_eq!(state, LikeState { liked: false, likes: 0 });
        }
    }

    #[tokio::test]
    async fn test_blank_comment_is_rejected_before_lookup() {
        let mut store = MockStore::new();
        store.expect_get_issue().never();

        let err = counters(store)
            .add_comment(Actor::citizen(2), 4, "   ")
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_comment_is_trimmed_and_dispatched() {
        let mut store = MockStore::new();
        store.expect_get_issue().returning(|_| Ok(Some(issue())));
        store
            .expect_insert_comment()
            .withf(|issue_id, user_id, text| *issue_id == 4 && *user_id == 2 && text == "Still there")
            .returning(|issue_id, user_id, text| {
                Ok(Comment {
                    id: 11,
                    issue_id,
                    user_id,
                    text: text.to_string(),
                    created_at: Utc::now(),
                })
            });
        store.expect_insert_notification().returning(|n| {
            Ok(Notification {
                id: 1,
                user_id: n.user_id,
                title: n.title.clone(),
                message: n.message.clone(),
                kind: n.kind,
                related_id: n.related_id,
                is_read: false,
                created_at: Utc::now(),
            })
        });

        let counters = counters(store);
        let comment = counters
            .add_comment(Actor::citizen(2), 4, "  Still there ")
            .await
            .unwrap();
        assert_eq!(comment.text, "Still there");
        assert!(counters.orchestrator.drain(Duration::from_secs(5)).await);
    }
}
