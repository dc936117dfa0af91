//! Notification delivery.
//!
//! Ledger operations collect the notifications they produce and hand them to
//! a [`NotificationSender`] only after their transaction has committed. A
//! failed delivery is logged and dropped; it never reaches the caller and
//! never undoes the committed mutation.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use greenrecycle_types::{Notification, RecycleError, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Delivers notifications to users.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<()>;
}

/// Send each notification, logging and swallowing failures.
pub async fn deliver(sender: &dyn NotificationSender, notifications: Vec<Notification>) {
    for notification in notifications {
        let user_id = notification.user_id;
        let category = notification.category;
        if let Err(e) = sender.send(notification).await {
            warn!(%user_id, %category, error = %e, "Notification delivery failed");
        }
    }
}

/// Writes notifications to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotificationSender;

#[async_trait]
impl NotificationSender for TracingNotificationSender {
    async fn send(&self, notification: Notification) -> Result<()> {
        info!(
            user_id = %notification.user_id,
            category = %notification.category,
            title = %notification.title,
            "Notification"
        );
        Ok(())
    }
}

// =========================================================================
// Outbox
// =========================================================================

/// Queues notifications on a bounded channel; a background task forwards
/// them to the inner sender. `send` never waits on the inner sender.
pub struct NotificationOutbox {
    queue: Mutex<Option<mpsc::Sender<Notification>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl NotificationOutbox {
    /// Spawn the dispatcher task. Must be called inside a tokio runtime.
    #[must_use]
    pub fn spawn(inner: Arc<dyn NotificationSender>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Notification>(capacity.max(1));
        let dispatcher = tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                let user_id = notification.user_id;
                if let Err(e) = inner.send(notification).await {
                    warn!(%user_id, error = %e, "Outbox delivery failed");
                }
            }
            debug!("Notification outbox drained");
        });
        Self {
            queue: Mutex::new(Some(tx)),
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Stop accepting notifications, deliver what is queued, and wait for
    /// the dispatcher to finish.
    pub async fn shutdown(&self) {
        drop(self.queue.lock().ok().and_then(|mut q| q.take()));
        let handle = self.dispatcher.lock().ok().and_then(|mut d| d.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Outbox dispatcher panicked");
            }
        }
    }
}

#[async_trait]
impl NotificationSender for NotificationOutbox {
    async fn send(&self, notification: Notification) -> Result<()> {
        let queue = self
            .queue
            .lock()
            .map_err(|_| RecycleError::Internal("outbox lock poisoned".into()))?
            .clone();
        let Some(queue) = queue else {
            return Err(RecycleError::Internal("notification outbox is shut down".into()));
        };
        queue.try_send(notification).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                RecycleError::Internal("notification outbox is full".into())
            }
            mpsc::error::TrySendError::Closed(_) => {
                RecycleError::Internal("notification outbox is closed".into())
            }
        })
    }
}

// =========================================================================
// Postgres
// =========================================================================

#[cfg(feature = "postgres")]
mod pg {
    use async_trait::async_trait;
    use greenrecycle_types::{Notification, Result};
    use sqlx::PgPool;

    use super::NotificationSender;
    use crate::store::postgres::storage_error;

    /// Inserts into the `notifications` table on its own pooled connection,
    /// outside any ledger transaction.
    #[derive(Debug, Clone)]
    pub struct PgNotificationSender {
        pool: PgPool,
    }

    impl PgNotificationSender {
        #[must_use]
        pub fn new(pool: PgPool) -> Self {
            Self { pool }
        }
    }

    #[async_trait]
    impl NotificationSender for PgNotificationSender {
        async fn send(&self, notification: Notification) -> Result<()> {
            sqlx::query(
                "INSERT INTO notifications \
                 (user_id, title, content, category, related_entity_type, related_entity_id) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(notification.user_id.0)
            .bind(&notification.title)
            .bind(&notification.content)
            .bind(notification.category.as_str())
            .bind(notification.related_entity_type.map(|t| t.as_str()))
            .bind(notification.related_entity_id)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
            Ok(())
        }
    }
}

#[cfg(feature = "postgres")]
pub use pg::PgNotificationSender;

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
pub mod testing {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use greenrecycle_types::{Notification, RecycleError, Result};

    use super::NotificationSender;

    /// Records every notification it is given.
    #[derive(Debug, Default)]
    pub struct RecordingSender {
        sent: Mutex<Vec<Notification>>,
    }

    impl RecordingSender {
        pub fn sent(&self) -> Vec<Notification> {
            self.sent.lock().map(|s| s.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl NotificationSender for RecordingSender {
        async fn send(&self, notification: Notification) -> Result<()> {
            if let Ok(mut sent) = self.sent.lock() {
                sent.push(notification);
            }
            Ok(())
        }
    }

    /// Fails every delivery.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct FailingSender;

    #[async_trait]
    impl NotificationSender for FailingSender {
        async fn send(&self, _notification: Notification) -> Result<()> {
            Err(RecycleError::Storage("notification backend unavailable".into()))
        }
    }
}
