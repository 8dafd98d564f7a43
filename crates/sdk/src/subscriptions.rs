//! Tracks which executions the client wants live updates for.

use std::collections::HashSet;
use std::sync::Arc;

use ih_domain::error::{Error, Result};
use ih_protocol::OutboundMessage;
use parking_lot::Mutex;

use crate::link::SocketLink;

/// Set of subscribed execution ids plus the frames that declare them.
///
/// Adding an id that is already present leaves the set unchanged but still
/// sends another `subscribe` frame.
pub struct SubscriptionRegistry {
    ids: Mutex<HashSet<String>>,
    link: Arc<SocketLink>,
}

impl SubscriptionRegistry {
    pub(crate) fn new(link: Arc<SocketLink>) -> Self {
        Self {
            ids: Mutex::new(HashSet::new()),
            link,
        }
    }

    /// Send a `subscribe` frame and record `execution_id`.
    ///
    /// Fails with [`Error::NotConnected`] when no socket is live.
    pub async fn subscribe(&self, execution_id: &str) -> Result<()> {
        if !self.link.is_connected() {
            return Err(Error::NotConnected);
        }
        self.link
            .send(OutboundMessage::Subscribe {
                execution_id: execution_id.to_owned(),
            })
            .await?;
        self.ids.lock().insert(execution_id.to_owned());
        tracing::debug!(execution_id, "subscribed");
        Ok(())
    }

    /// Forget `execution_id` and send an `unsubscribe` frame.
    ///
    /// Returns `Ok(false)` without doing anything when disconnected.
    pub async fn unsubscribe(&self, execution_id: &str) -> Result<bool> {
        if !self.link.is_connected() {
            return Ok(false);
        }
        self.ids.lock().remove(execution_id);
        match self
            .link
            .send(OutboundMessage::Unsubscribe {
                execution_id: execution_id.to_owned(),
            })
            .await
        {
            Ok(()) => {
                tracing::debug!(execution_id, "unsubscribed");
                Ok(true)
            }
            // Socket went away between the check and the send.
            Err(Error::NotConnected) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn contains(&self, execution_id: &str) -> bool {
        self.ids.lock().contains(execution_id)
    }

    /// Snapshot of the subscribed ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.ids.lock().iter().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.lock().is_empty()
    }
}
