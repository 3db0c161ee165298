//! Turns a lifecycle event into the fixed set of side effects it fans out to.
//!
//! Planning is pure; recipients that need a store lookup (the official
//! roster, a user's email address) are resolved when the task runs.

use serde_json::{json, Value};

use crate::realtime::{ISSUE_DELETED, ISSUE_UPDATED, NEW_COMMENT, NEW_ISSUE};
use crate::types::*;

/// A completed transition handed to the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    IssueCreated { issue: Issue },
    StatusChanged { issue: Issue, previous: IssueStatus },
    Assigned { issue: Issue, assignee: UserId },
    CommentAdded { issue: Issue, comment: Comment },
    Deleted { issue: Issue, deleted_by: UserId },
    PriorityChanged { issue: Issue },
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::IssueCreated { .. } => "issue_created",
            LifecycleEvent::StatusChanged { .. } => "status_changed",
            LifecycleEvent::Assigned { .. } => "assigned",
            LifecycleEvent::CommentAdded { .. } => "comment_added",
            LifecycleEvent::Deleted { .. } => "deleted",
            LifecycleEvent::PriorityChanged { .. } => "priority_changed",
        }
    }

    pub fn issue(&self) -> &Issue {
        match self {
            LifecycleEvent::IssueCreated { issue }
            | LifecycleEvent::StatusChanged { issue, .. }
            | LifecycleEvent::Assigned { issue, .. }
            | LifecycleEvent::CommentAdded { issue, .. }
            | LifecycleEvent::Deleted { issue, .. }
            | LifecycleEvent::PriorityChanged { issue } => issue,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EmailTemplate {
    StatusUpdate { previous: IssueStatus },
    Resolved,
    NewComment { comment: Comment },
    Assignment,
    Deletion,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    Notify(NewNotification),
    /// One notification per user holding `role`, resolved at run time
    NotifyRole {
        role: Role,
        title: String,
        message: String,
        kind: NotificationKind,
        related_id: IssueId,
    },
    Email {
        recipient: UserId,
        issue: Box<Issue>,
        template: EmailTemplate,
    },
    BroadcastAll {
        event: &'static str,
        payload: Value,
    },
    BroadcastToIssue {
        issue_id: IssueId,
        event: &'static str,
        payload: Value,
    },
}

impl SideEffect {
    pub fn kind(&self) -> &'static str {
        match self {
            SideEffect::Notify(_) => "notify",
            SideEffect::NotifyRole { .. } => "notify_role",
            SideEffect::Email { .. } => "email",
            SideEffect::BroadcastAll { .. } => "broadcast_all",
            SideEffect::BroadcastToIssue { .. } => "broadcast_to_issue",
        }
    }
}

fn issue_payload(issue: &Issue) -> Value {
    serde_json::to_value(issue).unwrap_or_default()
}

fn notify(user_id: UserId, title: &str, message: String, kind: NotificationKind, issue: &Issue) -> SideEffect {
    SideEffect::Notify(NewNotification {
        user_id,
        title: title.to_string(),
        message,
        kind,
        related_id: Some(issue.id),
    })
}

fn email(recipient: UserId, issue: &Issue, template: EmailTemplate) -> SideEffect {
    SideEffect::Email {
        recipient,
        issue: Box::new(issue.clone()),
        template,
    }
}

pub fn plan(event: &LifecycleEvent) -> Vec<SideEffect> {
    match event {
        LifecycleEvent::IssueCreated { issue } => vec![
            notify(
                issue.created_by,
                "Issue Reported Successfully",
                format!("Your issue \"{}\" has been successfully reported.", issue.title),
                NotificationKind::IssueCreated,
                issue,
            ),
            SideEffect::NotifyRole {
                role: Role::Official,
                title: "New Issue Reported".to_string(),
                message: format!("A new issue \"{}\" has been reported in your area.", issue.title),
                kind: NotificationKind::NewIssue,
                related_id: issue.id,
            },
            SideEffect::BroadcastAll {
                event: NEW_ISSUE,
                payload: issue_payload(issue),
            },
        ],

        LifecycleEvent::StatusChanged { issue, previous } => {
            let template = if issue.status == IssueStatus::Resolved {
                EmailTemplate::Resolved
            } else {
                EmailTemplate::StatusUpdate { previous: *previous }
            };
            vec![
                notify(
                    issue.created_by,
                    "Issue Status Updated",
                    format!(
                        "Your issue \"{}\" has been updated to {}.",
                        issue.title,
                        issue.status.label()
                    ),
                    NotificationKind::StatusUpdate,
                    issue,
                ),
                email(issue.created_by, issue, template),
                SideEffect::BroadcastToIssue {
                    issue_id: issue.id,
                    event: ISSUE_UPDATED,
                    payload: issue_payload(issue),
                },
            ]
        }

        LifecycleEvent::Assigned { issue, assignee } => vec![
            notify(
                *assignee,
                "New Issue Assigned",
                format!("You have been assigned to issue \"{}\".", issue.title),
                NotificationKind::Assignment,
                issue,
            ),
            email(*assignee, issue, EmailTemplate::Assignment),
            SideEffect::BroadcastToIssue {
                issue_id: issue.id,
                event: ISSUE_UPDATED,
                payload: issue_payload(issue),
            },
        ],

        LifecycleEvent::CommentAdded { issue, comment } => {
            let mut effects = Vec::with_capacity(3);
            if comment.user_id != issue.created_by {
                effects.push(notify(
                    issue.created_by,
                    "New Comment",
                    format!("Someone commented on your issue \"{}\".", issue.title),
                    NotificationKind::Comment,
                    issue,
                ));
                effects.push(email(
                    issue.created_by,
                    issue,
                    EmailTemplate::NewComment {
                        comment: comment.clone(),
                    },
                ));
            }
            effects.push(SideEffect::BroadcastToIssue {
                issue_id: issue.id,
                event: NEW_COMMENT,
                payload: serde_json::to_value(comment).unwrap_or_default(),
            });
            effects
        }

        LifecycleEvent::Deleted { issue, deleted_by } => {
            let mut effects = Vec::with_capacity(2);
            if *deleted_by != issue.created_by {
                effects.push(email(issue.created_by, issue, EmailTemplate::Deletion));
            }
            effects.push(SideEffect::BroadcastAll {
                event: ISSUE_DELETED,
                payload: json!({ "id": issue.id }),
            });
            effects
        }

        LifecycleEvent::PriorityChanged { issue } => vec![SideEffect::BroadcastToIssue {
            issue_id: issue.id,
            event: ISSUE_UPDATED,
            payload: issue_payload(issue),
        }],
    }
}
