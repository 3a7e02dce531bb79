//! Notification boundary. Push/email delivery lives outside this crate; the
//! booking core only hands `Notification`s to a `Notifier`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;
use ulid::Ulid;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingCreated,
    BookingConfirmed,
    BookingCancelled,
    Reminder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub user_id: Ulid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub booking_id: Ulid,
}

#[derive(Debug)]
pub struct NotifyError(pub String);

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "notification delivery failed: {}", self.0)
    }
}

impl std::error::Error for NotifyError {}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Fire-and-forget delivery after a commit. Failures are logged and counted,
/// never surfaced to the caller whose booking already succeeded.
pub fn dispatch(notifier: &Arc<dyn Notifier>, notification: Notification) {
    let notifier = notifier.clone();
    tokio::spawn(async move {
        let booking_id = notification.booking_id;
        let kind = notification.kind;
        match notifier.notify(notification).await {
            Ok(()) => {
                metrics::counter!(crate::observability::NOTIFICATIONS_TOTAL, "status" => "ok").increment(1);
            }
            Err(e) => {
                metrics::counter!(crate::observability::NOTIFICATIONS_TOTAL, "status" => "error").increment(1);
                tracing::warn!("{kind:?} notification for booking {booking_id} dropped: {e}");
            }
        }
    });
}

/// In-process broadcast of every committed notification. Delivery workers
/// subscribe and filter by recipient.
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
}

#[async_trait]
impl Notifier for NotifyHub {
    /// No-op when no worker is subscribed.
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        tracing::debug!(
            "notify {} about booking {}: {}",
            notification.user_id,
            notification.booking_id,
            notification.title
        );
        let _ = self.sender.send(notification);
        Ok(())
    }
}

/// Delivery worker for deployments without a push or email gateway: writes
/// each notification to the log. Returns once every hub handle is dropped.
pub async fn run_log_delivery(mut rx: broadcast::Receiver<Notification>) -> u64 {
    let mut delivered = 0;
    loop {
        match rx.recv().await {
            Ok(n) => {
                tracing::info!(
                    user_id = %n.user_id,
                    booking_id = %n.booking_id,
                    kind = ?n.kind,
                    "{}: {}",
                    n.title,
                    n.message
                );
                delivered += 1;
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                metrics::counter!(crate::observability::NOTIFICATIONS_TOTAL, "status" => "lagged")
                    .increment(missed);
                tracing::warn!("log delivery fell behind, {missed} notification(s) skipped");
            }
            Err(broadcast::error::RecvError::Closed) => return delivered,
        }
    }
}
