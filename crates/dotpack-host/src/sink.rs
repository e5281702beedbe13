//! Outgoing message channel.

use dotpack_proto::{Notification, NotificationName};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Where handlers post notifications for the UI.
pub trait MessageSink: Send + Sync {
    fn post(&self, notification: Notification);
}

/// Forwards notifications into an unbounded channel.
///
/// The receiving end is usually a writer task that frames each notification
/// onto the transport.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MessageSink for ChannelSink {
    fn post(&self, notification: Notification) {
        let name = notification.name();
        if self.tx.send(notification).is_err() {
            warn!(name = %name, "transport closed, dropping notification");
        } else {
            debug!(name = %name, "posted");
        }
    }
}

/// Keeps every posted notification in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    posted: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything posted so far, in order.
    #[must_use]
    pub fn posted(&self) -> Vec<Notification> {
        self.posted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Posted notifications with the given name.
    #[must_use]
    pub fn named(&self, name: NotificationName) -> Vec<Notification> {
        self.posted()
            .into_iter()
            .filter(|n| n.name() == name)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.posted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.posted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl MessageSink for RecordingSink {
    fn post(&self, notification: Notification) {
        self.posted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}
