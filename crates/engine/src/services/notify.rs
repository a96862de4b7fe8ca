//! Fire-and-forget notification queue.
//!
//! Every outbound notification is fire-and-forget relative to the state
//! transition that triggered it: [`Notifier::enqueue`] never blocks, never
//! fails the caller, and delivery failures are logged by the worker - no
//! retry, no rollback. Tests inject a recording sink (or read the queue
//! directly) to assert on enqueued effects without real I/O.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, warn};
use uuid::Uuid;

/// Delivery failure reported by a sink. Absorbed by the worker.
#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// A customer-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A recurring order was created and paid.
    OrderConfirmation { email: String, order_id: Uuid },
    /// The parcel left the warehouse.
    OrderShipped {
        email: String,
        order_id: Uuid,
        tracking_url: Option<String>,
    },
}

/// Delivery backend for notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Handle for enqueueing notifications.
///
/// Cheap to clone; all clones feed the same worker.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    /// Start the delivery worker and return the enqueue handle.
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn spawn(sink: Arc<dyn NotificationSink>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();

        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                if let Err(e) = sink.deliver(&notification).await {
                    error!(error = %e, notification = ?notification, "notification delivery failed");
                }
            }
        });

        Self { tx }
    }

    /// Queue a notification for delivery. Never blocks and never fails;
    /// a dead worker only costs the notification, not the caller.
    pub fn enqueue(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            warn!("notification worker gone; dropping notification");
        }
    }

    /// A notifier without a worker, exposing the raw queue so tests can
    /// assert on enqueued notifications deterministically.
    #[cfg(test)]
    pub(crate) fn test_pair() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{Notification, NotificationSink, NotifyError};

    /// Records everything it is asked to deliver.
    #[derive(Default)]
    pub struct RecordingSink {
        pub delivered: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.delivered
                .lock()
                .expect("sink mutex")
                .push(notification.clone());
            Ok(())
        }
    }

    /// Fails every delivery.
    pub struct FailingSink;

    #[async_trait]
    impl NotificationSink for FailingSink {
        async fn deliver(&self, _notification: &Notification) -> Result<(), NotifyError> {
            Err(NotifyError("smtp unreachable".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{FailingSink, RecordingSink};
    use super::*;

    #[tokio::test]
    async fn test_worker_delivers_enqueued_notifications() {
        let sink = Arc::new(RecordingSink::default());
        let notifier = Notifier::spawn(sink.clone());

        let order_id = Uuid::new_v4();
        notifier.enqueue(Notification::OrderConfirmation {
            email: "claire@example.fr".to_string(),
            order_id,
        });

        // Give the worker a chance to drain the queue
        for _ in 0..20 {
            tokio::task::yield_now().await;
            if !sink.delivered.lock().expect("sink mutex").is_empty() {
                break;
            }
        }

        let delivered = sink.delivered.lock().expect("sink mutex");
        assert_eq!(delivered.len(), 1);
        assert!(matches!(
            delivered.first(),
            Some(Notification::OrderConfirmation { order_id: id, .. }) if *id == order_id
        ));
    }

    #[tokio::test]
    async fn test_delivery_failure_never_reaches_the_caller() {
        let notifier = Notifier::spawn(Arc::new(FailingSink));

        // enqueue is infallible; the failure is the worker's problem
        notifier.enqueue(Notification::OrderShipped {
            email: "claire@example.fr".to_string(),
            order_id: Uuid::new_v4(),
            tracking_url: None,
        });
        tokio::task::yield_now().await;
    }
}
