use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::{ContactMessage, Registration, RegistrationTarget};

const CHANNEL_CAPACITY: usize = 256;

/// Payload handed to whatever delivers studio notifications (mail, chat, log).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    RegistrationCreated {
        registration: Registration,
        title: String,
        date: NaiveDate,
    },
    RegistrationDeleted {
        id: Ulid,
        target: RegistrationTarget,
    },
    MessageReceived {
        message: ContactMessage,
    },
}

/// Fire-and-forget broadcast of [`Notification`]s.
pub struct NotifyHub {
    sender: broadcast::Sender<Notification>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            sender: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// No-op if nobody is listening.
    pub fn send(&self, notification: Notification) {
        let _ = self.sender.send(notification);
    }
}

/// Drain the hub into the log until it closes.
pub async fn run_logger(mut rx: broadcast::Receiver<Notification>) {
    loop {
        match rx.recv().await {
            Ok(notification) => {
                let payload = serde_json::to_string(&notification).unwrap_or_default();
                tracing::info!(target: "yogabook::notify", %payload, "notification");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("notification logger lagged, skipped {skipped}");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
