//! Application-scoped notification bus
//!
//! A [`NotificationBus`] is created once per application instance and
//! handed to whoever publishes or displays notifications. Each
//! [`Subscription`] owns its receiving end and unsubscribes when dropped.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    /// Informational
    Info,
    /// Something may need attention
    Warning,
    /// An operation failed
    Error,
}

/// User-facing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Severity
    pub level: NotificationLevel,
    /// Text to display
    pub message: String,
    /// Machine-readable code
    pub code: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Create notification
    #[must_use]
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            code: None,
            created_at: Utc::now(),
        }
    }

    /// Create error notification
    #[inline]
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, message)
    }

    /// Create warning notification
    #[inline]
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Warning, message)
    }

    /// With code
    #[inline]
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Subscription identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Default)]
struct BusInner {
    subscribers: DashMap<SubscriptionId, mpsc::UnboundedSender<Notification>>,
    next_id: AtomicU64,
}

/// Publish/subscribe channel for notifications
#[derive(Debug, Clone, Default)]
pub struct NotificationBus {
    inner: Arc<BusInner>,
}

impl NotificationBus {
    /// Create bus without subscribers
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start receiving notifications
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::unbounded_channel();
        self.inner.subscribers.insert(id, sender);
        tracing::trace!(subscription = id.0, "subscribed");
        Subscription {
            id,
            receiver,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver to every subscriber, returning how many received it
    pub fn publish(&self, notification: Notification) -> usize {
        tracing::debug!(
            level = ?notification.level,
            code = notification.code.as_deref().unwrap_or(""),
            message = %notification.message,
            "notification"
        );
        let mut delivered = 0;
        self.inner.subscribers.retain(|_, sender| {
            let open = sender.send(notification.clone()).is_ok();
            if open {
                delivered += 1;
            }
            open
        });
        delivered
    }

    /// Number of live subscriptions
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

/// Receiving end of a bus; unsubscribes on drop
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    receiver: mpsc::UnboundedReceiver<Notification>,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// Subscription id
    #[inline]
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next notification; `None` once the bus is gone
    pub async fn recv(&mut self) -> Option<Notification> {
        self.receiver.recv().await
    }

    /// Next notification if one is queued
    pub fn try_recv(&mut self) -> Option<Notification> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.subscribers.remove(&self.id);
            tracing::trace!(subscription = self.id.0, "unsubscribed");
        }
    }
}
