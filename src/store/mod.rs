//! Persistence adapter.
//!
//! The lifecycle manager, the engagement counters, the orchestrator and the
//! notification inbox only ever talk to the relational store through the
//! [`Store`] trait. Every method is a single statement except
//! [`Store::delete_issue_cascade`], which must be atomic.

pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::priority::Priority;
use crate::types::*;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Corrupt row in {table}: {message}")]
    Corrupt { table: &'static str, message: String },
}

/// Outcome of a like insert; the store's uniqueness constraint decides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeInsert {
    Inserted,
    AlreadyPresent,
}

/// Column values written by a status transition
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: IssueStatus,
    pub proof_image_ref: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Issue columns fixed at creation time
#[derive(Debug, Clone, PartialEq)]
pub struct NewIssue {
    pub draft: IssueDraft,
    pub image_ref: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait Store: Send + Sync {
    // Users
    async fn insert_user(&self, user: &NewUser) -> Result<User, StoreError>;
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;
    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, StoreError>;
    /// `None` when the user does not exist
    async fn update_user_role(&self, id: UserId, role: Role) -> Result<Option<User>, StoreError>;
    async fn update_user_ward(
        &self,
        id: UserId,
        ward_number: Option<String>,
    ) -> Result<Option<User>, StoreError>;

    // Issues
    async fn insert_issue(&self, issue: &NewIssue) -> Result<Issue, StoreError>;
    async fn get_issue(&self, id: IssueId) -> Result<Option<Issue>, StoreError>;

    /// Compare-and-set on the prior status. Returns `None` when the issue is
    /// missing or its status is no longer `expected`.
    async fn update_issue_status(
        &self,
        id: IssueId,
        expected: IssueStatus,
        update: &StatusUpdate,
    ) -> Result<Option<Issue>, StoreError>;

    async fn assign_issue(
        &self,
        id: IssueId,
        assignee: UserId,
        at: DateTime<Utc>,
    ) -> Result<Option<Issue>, StoreError>;

    async fn update_issue_priority(
        &self,
        id: IssueId,
        priority: Priority,
        at: DateTime<Utc>,
    ) -> Result<Option<Issue>, StoreError>;

    /// Remove comments, likes and the issue row in one transaction.
    /// Returns `false` when the issue did not exist.
    async fn delete_issue_cascade(&self, id: IssueId) -> Result<bool, StoreError>;

    // Comments
    async fn insert_comment(
        &self,
        issue_id: IssueId,
        user_id: UserId,
        text: &str,
    ) -> Result<Comment, StoreError>;
    async fn list_comments(&self, issue_id: IssueId) -> Result<Vec<Comment>, StoreError>;

    // Likes
    async fn insert_like(&self, issue_id: IssueId, user_id: UserId) -> Result<LikeInsert, StoreError>;
    async fn delete_like(&self, issue_id: IssueId, user_id: UserId) -> Result<bool, StoreError>;
    async fn has_like(&self, issue_id: IssueId, user_id: UserId) -> Result<bool, StoreError>;
    async fn count_likes(&self, issue_id: IssueId) -> Result<u64, StoreError>;

    // Notifications
    async fn insert_notification(&self, notification: &NewNotification) -> Result<Notification, StoreError>;
    async fn list_notifications(&self, user_id: UserId, limit: u32) -> Result<Vec<Notification>, StoreError>;
    async fn count_unread_notifications(&self, user_id: UserId) -> Result<u64, StoreError>;
    async fn mark_notification_read(
        &self,
        id: NotificationId,
        user_id: UserId,
    ) -> Result<Option<Notification>, StoreError>;
    async fn mark_all_notifications_read(&self, user_id: UserId) -> Result<u64, StoreError>;
}
