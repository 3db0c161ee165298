//! Real-time push channel.
//!
//! Publishing is fire-and-forget: nothing waits for subscribers and a publish
//! with nobody listening is not an error. Transport to browsers is somebody
//! else's concern; [`BroadcastHub`] is the in-process fan-in point a socket
//! server subscribes to.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{trace, warn};

use crate::types::IssueId;

pub const NEW_ISSUE: &str = "new-issue";
pub const ISSUE_UPDATED: &str = "issue-updated";
pub const ISSUE_DELETED: &str = "issue-deleted";
pub const NEW_COMMENT: &str = "new-comment";

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", content = "issue_id", rename_all = "snake_case")]
pub enum Scope {
    All,
    Issue(IssueId),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealtimeMessage {
    pub scope: Scope,
    pub event: String,
    pub payload: Value,
}

pub trait RealtimeChannel: Send + Sync {
    fn broadcast_all(&self, event: &str, payload: Value);
    fn broadcast_to_issue(&self, issue_id: IssueId, event: &str, payload: Value);
}

/// Broadcast bus backed by `tokio::sync::broadcast`
#[derive(Debug, Clone)]
pub struct BroadcastHub {
    sender: broadcast::Sender<RealtimeMessage>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Every message, whatever its scope
    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeMessage> {
        self.sender.subscribe()
    }

    /// Join one issue's room
    pub fn subscribe_issue(&self, issue_id: IssueId) -> IssueSubscription {
        IssueSubscription {
            issue_id,
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn publish(&self, message: RealtimeMessage) {
        trace!(event = %message.event, scope = ?message.scope, "Publishing realtime event");
        // No subscribers is fine
        let _ = self.sender.send(message);
    }
}

impl RealtimeChannel for BroadcastHub {
    fn broadcast_all(&self, event: &str, payload: Value) {
        self.publish(RealtimeMessage {
            scope: Scope::All,
            event: event.to_string(),
            payload,
        });
    }

    fn broadcast_to_issue(&self, issue_id: IssueId, event: &str, payload: Value) {
        self.publish(RealtimeMessage {
            scope: Scope::Issue(issue_id),
            event: event.to_string(),
            payload,
        });
    }
}

/// Receives only messages scoped to a single issue
pub struct IssueSubscription {
    issue_id: IssueId,
    receiver: broadcast::Receiver<RealtimeMessage>,
}

impl IssueSubscription {
    pub fn issue_id(&self) -> IssueId {
        self.issue_id
    }

    /// Next message for this issue, or `None` once the hub is gone
    pub async fn recv(&mut self) -> Option<RealtimeMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) if message.scope == Scope::Issue(self.issue_id) => return Some(message),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(issue.id = self.issue_id, skipped, "Realtime subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
