// HTML bodies for lifecycle emails. Layout and styling belong to the relay.

use super::EmailMessage;
use crate::types::{Comment, Issue, IssueStatus, User};

fn issue_link(frontend_url: &str, issue: &Issue) -> String {
    format!("{frontend_url}/issues/{}", issue.id)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn status_update(to: &User, issue: &Issue, previous: IssueStatus, frontend_url: &str) -> EmailMessage {
    EmailMessage {
        to: to.email.clone(),
        subject: format!("Issue Update: {}", issue.title),
        html: format!(
            "<h2>Issue Status Update</h2>\
             <p>Hello {name},</p>\
             <p>The status of your issue <strong>{title}</strong> has changed \
             from <strong>{old_status}</strong> to <strong>{new_status}</strong>.</p>\
             <p><a href=\"{link}\">View issue</a></p>",
            name = escape(&to.name),
            title = escape(&issue.title),
            old_status = previous.label(),
            new_status = issue.status.label(),
            link = issue_link(frontend_url, issue),
        ),
    }
}

pub fn resolved(to: &User, issue: &Issue, frontend_url: &str) -> EmailMessage {
    EmailMessage {
        to: to.email.clone(),
        subject: format!("✅ Issue Resolved: {}", issue.title),
        html: format!(
            "<h2>Your issue has been resolved</h2>\
             <p>Hello {name},</p>\
             <p>Good news! <strong>{title}</strong> at {address} has been resolved.</p>\
             <p>Thank you for helping keep the city clean.</p>\
             <p><a href=\"{link}\">See the proof photo</a></p>",
            name = escape(&to.name),
            title = escape(&issue.title),
            address = escape(&issue.address),
            link = issue_link(frontend_url, issue),
        ),
    }
}

pub fn new_comment(to: &User, issue: &Issue, comment: &Comment, frontend_url: &str) -> EmailMessage {
    EmailMessage {
        to: to.email.clone(),
        subject: format!("New comment on: {}", issue.title),
        html: format!(
            "<h2>New comment</h2>\
             <p>Hello {name},</p>\
             <p>Someone commented on your issue <strong>{title}</strong>:</p>\
             <blockquote>{text}</blockquote>\
             <p><a href=\"{link}\">Reply</a></p>",
            name = escape(&to.name),
            title = escape(&issue.title),
            text = escape(&comment.text),
            link = issue_link(frontend_url, issue),
        ),
    }
}

pub fn assignment(to: &User, issue: &Issue, frontend_url: &str) -> EmailMessage {
    EmailMessage {
        to: to.email.clone(),
        subject: format!("New Assignment: {}", issue.title),
        html: format!(
            "<h2>Issue assigned to you</h2>\
             <p>Hello {name},</p>\
             <p><strong>{title}</strong> ({priority} priority) at {address} \
             has been assigned to you.</p>\
             <p><a href=\"{link}\">Open issue</a></p>",
            name = escape(&to.name),
            title = escape(&issue.title),
            priority = issue.priority,
            address = escape(&issue.address),
            link = issue_link(frontend_url, issue),
        ),
    }
}

pub fn deletion(to: &User, issue: &Issue) -> EmailMessage {
    EmailMessage {
        to: to.email.clone(),
        subject: format!("Issue Removed: {}", issue.title),
        html: format!(
            "<h2>Issue removed</h2>\
             <p>Hello {name},</p>\
             <p>Your issue <strong>{title}</strong> was removed by city staff.</p>",
            name = escape(&to.name),
            title = escape(&issue.title),
        ),
    }
}
