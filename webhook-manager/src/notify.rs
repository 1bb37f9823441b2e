//! Transient user-facing notifications.
//!
//! Every operation outcome produces one. They expire after a fixed TTL and
//! are pruned whenever the center is read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_millis(5000);

const MAX_NOTIFICATIONS: usize = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

/// Level and text of a notification before it is timestamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NotificationLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub id: u64,
    pub level: NotificationLevel,
    pub text: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

pub struct NotificationCenter {
    ttl: chrono::Duration,
    next_id: u64,
    entries: VecDeque<Notification>,
}

impl NotificationCenter {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(5)),
            next_id: 1,
            entries: VecDeque::new(),
        }
    }

    pub fn push(&mut self, notice: Notice) -> Notification {
        self.push_at(notice, Utc::now())
    }

    pub fn push_at(&mut self, notice: Notice, now: DateTime<Utc>) -> Notification {
        let notification = Notification {
            id: self.next_id,
            level: notice.level,
            text: notice.text,
            created: now,
            expires: now + self.ttl,
        };
        self.next_id += 1;

        if self.entries.len() >= MAX_NOTIFICATIONS {
            self.entries.pop_front();
        }
        self.entries.push_back(notification.clone());
        notification
    }

    /// Notifications that have not expired yet, oldest first.
    pub fn active(&mut self) -> Vec<Notification> {
        self.active_at(Utc::now())
    }

    pub fn active_at(&mut self, now: DateTime<Utc>) -> Vec<Notification> {
        self.entries.retain(|n| n.expires > now);
        self.entries.iter().cloned().collect()
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_TTL)
    }
}
