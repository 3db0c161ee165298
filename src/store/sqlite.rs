use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::debug;

use super::{LikeInsert, NewIssue, StatusUpdate, Store, StoreError};
use crate::priority::Priority;
use crate::types::*;

const ISSUE_COLUMNS: &str = "id, title, description, category, address, latitude, longitude, \
     image_ref, proof_image_ref, status, priority, created_by, assigned_to, \
     created_at, updated_at, resolved_at";

const USER_COLUMNS: &str = "id, name, email, role, ward_number, created_at";

const COMMENT_COLUMNS: &str = "id, issue_id, user_id, text, created_at";

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, title, message, type, related_id, is_read, created_at";

/// `Store` backed by a sqlx SQLite pool
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn parse_column<T>(row: &SqliteRow, table: &'static str, column: &str) -> Result<T, StoreError>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>()
        .map_err(|message| StoreError::Corrupt { table, message })
}

fn issue_from_row(row: &SqliteRow) -> Result<Issue, StoreError> {
    Ok(Issue {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        category: parse_column(row, "issues", "category")?,
        address: row.try_get("address")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        image_ref: row.try_get("image_ref")?,
        proof_image_ref: row.try_get("proof_image_ref")?,
        status: parse_column(row, "issues", "status")?,
        priority: parse_column::<Priority>(row, "issues", "priority")?,
        created_by: row.try_get("created_by")?,
        assigned_to: row.try_get("assigned_to")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        resolved_at: row.try_get("resolved_at")?,
    })
}

fn user_from_row(row: &SqliteRow) -> Result<User, StoreError> {
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role: parse_column(row, "users", "role")?,
        ward_number: row.try_get("ward_number")?,
        created_at: row.try_get("created_at")?,
    })
}

fn comment_from_row(row: &SqliteRow) -> Result<Comment, StoreError> {
    Ok(Comment {
        id: row.try_get("id")?,
        issue_id: row.try_get("issue_id")?,
        user_id: row.try_get("user_id")?,
        text: row.try_get("text")?,
        created_at: row.try_get("created_at")?,
    })
}

fn notification_from_row(row: &SqliteRow) -> Result<Notification, StoreError> {
    Ok(Notification {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        kind: parse_column(row, "notifications", "type")?,
        related_id: row.try_get("related_id")?,
        is_read: row.try_get("is_read")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO users (name, email, role, ward_number, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(&user.ward_number)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        user_from_row(&row)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_users_by_role(&self, role: Role) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = ?1 ORDER BY id ASC"
        ))
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    async fn update_user_role(&self, id: UserId, role: Role) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE users SET role = ?1 WHERE id = ?2 RETURNING {USER_COLUMNS}"
        ))
        .bind(role.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn update_user_ward(
        &self,
        id: UserId,
        ward_number: Option<String>,
    ) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE users SET ward_number = ?1 WHERE id = ?2 RETURNING {USER_COLUMNS}"
        ))
        .bind(ward_number)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn insert_issue(&self, issue: &NewIssue) -> Result<Issue, StoreError> {
        let draft = &issue.draft;
        let row = sqlx::query(&format!(
            "INSERT INTO issues (title, description, category, address, latitude, longitude,
                                 image_ref, status, priority, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8, ?9, ?10, ?10)
             RETURNING {ISSUE_COLUMNS}"
        ))
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.category.as_str())
        .bind(&draft.address)
        .bind(draft.latitude)
        .bind(draft.longitude)
        .bind(&issue.image_ref)
        .bind(draft.priority.as_str())
        .bind(issue.created_by)
        .bind(issue.created_at)
        .fetch_one(&self.pool)
        .await?;

        issue_from_row(&row)
    }

    async fn get_issue(&self, id: IssueId) -> Result<Option<Issue>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(issue_from_row).transpose()
    }

    async fn update_issue_status(
        &self,
        id: IssueId,
        expected: IssueStatus,
        update: &StatusUpdate,
    ) -> Result<Option<Issue>, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE issues
             SET status = ?1,
                 proof_image_ref = COALESCE(?2, proof_image_ref),
                 updated_at = ?3,
                 resolved_at = ?4
             WHERE id = ?5 AND status = ?6
             RETURNING {ISSUE_COLUMNS}"
        ))
        .bind(update.status.as_str())
        .bind(&update.proof_image_ref)
        .bind(update.updated_at)
        .bind(update.resolved_at)
        .bind(id)
        .bind(expected.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if row.is_none() {
            debug!(issue.id = id, expected = %expected, "Status compare-and-set matched no row");
        }
        row.as_ref().map(issue_from_row).transpose()
    }

    async fn assign_issue(
        &self,
        id: IssueId,
        assignee: UserId,
        at: DateTime<Utc>,
    ) -> Result<Option<Issue>, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE issues SET assigned_to = ?1, updated_at = ?2 WHERE id = ?3
             RETURNING {ISSUE_COLUMNS}"
        ))
        .bind(assignee)
        .bind(at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(issue_from_row).transpose()
    }

    async fn update_issue_priority(
        &self,
        id: IssueId,
        priority: Priority,
        at: DateTime<Utc>,
    ) -> Result<Option<Issue>, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE issues SET priority = ?1, updated_at = ?2 WHERE id = ?3
             RETURNING {ISSUE_COLUMNS}"
        ))
        .bind(priority.as_str())
        .bind(at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(issue_from_row).transpose()
    }

    async fn delete_issue_cascade(&self, id: IssueId) -> Result<bool, StoreError> {
        // Dropping the transaction without commit rolls everything back
        let mut tx = self.pool.begin().await?;

        let comments = sqlx::query("DELETE FROM comments WHERE issue_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let likes = sqlx::query("DELETE FROM likes WHERE issue_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let issue = sqlx::query("DELETE FROM issues WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(
            issue.id = id,
            comments = comments.rows_affected(),
            likes = likes.rows_affected(),
            "Deleted issue with dependents"
        );
        Ok(issue.rows_affected() > 0)
    }

    async fn insert_comment(
        &self,
        issue_id: IssueId,
        user_id: UserId,
        text: &str,
    ) -> Result<Comment, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO comments (issue_id, user_id, text, created_at)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(issue_id)
        .bind(user_id)
        .bind(text)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        comment_from_row(&row)
    }

    async fn list_comments(&self, issue_id: IssueId) -> Result<Vec<Comment>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE issue_id = ?1
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(issue_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(comment_from_row).collect()
    }

    async fn insert_like(&self, issue_id: IssueId, user_id: UserId) -> Result<LikeInsert, StoreError> {
        let result = sqlx::query(
            "INSERT INTO likes (issue_id, user_id, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (issue_id, user_id) DO NOTHING",
        )
        .bind(issue_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(if result.rows_affected() == 0 {
            LikeInsert::AlreadyPresent
        } else {
            LikeInsert::Inserted
        })
    }

    async fn delete_like(&self, issue_id: IssueId, user_id: UserId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM likes WHERE issue_id = ?1 AND user_id = ?2")
            .bind(issue_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn has_like(&self, issue_id: IssueId, user_id: UserId) -> Result<bool, StoreError> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM likes WHERE issue_id = ?1 AND user_id = ?2")
                .bind(issue_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(found.is_some())
    }

    async fn count_likes(&self, issue_id: IssueId) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE issue_id = ?1")
            .bind(issue_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as u64)
    }

    async fn insert_notification(&self, notification: &NewNotification) -> Result<Notification, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO notifications (user_id, title, message, type, related_id, is_read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)
             RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(notification.user_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.kind.as_str())
        .bind(notification.related_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        notification_from_row(&row)
    }

    async fn list_notifications(&self, user_id: UserId, limit: u32) -> Result<Vec<Notification>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2"
        ))
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(notification_from_row).collect()
    }

    async fn count_unread_notifications(&self, user_id: UserId) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }

    async fn mark_notification_read(
        &self,
        id: NotificationId,
        user_id: UserId,
    ) -> Result<Option<Notification>, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2
             RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(notification_from_row).transpose()
    }

    async fn mark_all_notifications_read(&self, user_id: UserId) -> Result<u64, StoreError> {
        let result =
            sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0")
                .bind(user_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }
}
