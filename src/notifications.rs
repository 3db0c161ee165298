use std::sync::Arc;
use tracing::debug;

use crate::error::CivicError;
use crate::store::Store;
use crate::types::{Actor, Notification, NotificationId};

/// Newest notifications returned when no limit is given
pub const DEFAULT_INBOX_LIMIT: u32 = 20;

/// Read side of the notifications the orchestrator writes. Every query is
/// scoped to the calling actor.
pub struct NotificationInbox {
    store: Arc<dyn Store>,
}

impl NotificationInbox {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list(&self, actor: Actor, limit: Option<u32>) -> Result<Vec<Notification>, CivicError> {
        let limit = limit.unwrap_or(DEFAULT_INBOX_LIMIT).max(1);
        Ok(self.store.list_notifications(actor.id, limit).await?)
    }

    pub async fn unread_count(&self, actor: Actor) -> Result<u64, CivicError> {
        Ok(self.store.count_unread_notifications(actor.id).await?)
    }

    /// Someone else's notification is reported as missing
    pub async fn mark_read(&self, actor: Actor, id: NotificationId) -> Result<Notification, CivicError> {
        self.store
            .mark_notification_read(id, actor.id)
            .await?
            .ok_or(CivicError::NotFound {
                entity: "Notification",
                id,
            })
    }

    pub async fn mark_all_read(&self, actor: Actor) -> Result<u64, CivicError> {
        let updated = self.store.mark_all_notifications_read(actor.id).await?;
        debug!(user.id = actor.id, updated, "Marked notifications read");
        Ok(updated)
    }
}
