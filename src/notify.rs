use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// Operator-facing message. Fire and forget, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Monotonic position, used by polling clients to resume
    pub sequence: u64,
    pub id: Uuid,
    pub level: NotificationLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

struct History {
    next_sequence: u64,
    entries: VecDeque<Notification>,
    capacity: usize,
}

/// Fan-out of notifications to live subscribers plus a bounded history
#[derive(Clone)]
pub struct Notifier {
    sender: broadcast::Sender<Notification>,
    history: Arc<Mutex<History>>,
}

impl Notifier {
    /// Create a notifier keeping the last `capacity` notifications
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            history: Arc::new(Mutex::new(History {
                next_sequence: 1,
                entries: VecDeque::with_capacity(capacity),
                capacity,
            })),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn notify<S: Into<String>>(&self, level: NotificationLevel, message: S) -> Notification {
        let message = message.into();
        match level {
            NotificationLevel::Info => info!("{}", message),
            NotificationLevel::Warning => warn!("{}", message),
            NotificationLevel::Error => error!("{}", message),
        }

        let notification = {
            let mut history = self.history.lock();
            let notification = Notification {
                sequence: history.next_sequence,
                id: Uuid::new_v4(),
                level,
                message,
                timestamp: Utc::now(),
            };
            history.next_sequence += 1;
            if history.entries.len() == history.capacity {
                history.entries.pop_front();
            }
            history.entries.push_back(notification.clone());
            notification
        };

        // No subscribers is fine
        let _ = self.sender.send(notification.clone());
        notification
    }

    pub fn info<S: Into<String>>(&self, message: S) -> Notification {
        self.notify(NotificationLevel::Info, message)
    }

    pub fn warning<S: Into<String>>(&self, message: S) -> Notification {
        self.notify(NotificationLevel::Warning, message)
    }

    pub fn error<S: Into<String>>(&self, message: S) -> Notification {
        self.notify(NotificationLevel::Error, message)
    }

    /// Retained notifications with a sequence greater than `sequence`
    pub fn since(&self, sequence: u64) -> Vec<Notification> {
        self.history
            .lock()
            .entries
            .iter()
            .filter(|n| n.sequence > sequence)
            .cloned()
            .collect()
    }

    pub fn recent(&self) -> Vec<Notification> {
        self.since(0)
    }
}
