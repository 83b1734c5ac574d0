//! Live event feed.
//!
//! The feed carries the revision of the last write to the events collection.
//! Writes to other collections do not move it. Readers hold a
//! [`FeedSubscription`] for as long as they want updates; dropping the
//! subscription unsubscribes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Outcome of waiting on a subscription.
#[derive(Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The events revision moved to this value
    Changed(i64),
    TimedOut,
    Closed,
}

/// Publisher side of the feed, shared through application state.
#[derive(Debug, Clone)]
pub struct EventFeed {
    tx: Arc<watch::Sender<i64>>,
}

impl Default for EventFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl EventFeed {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// Record a write to the events collection at `revision_id`.
    ///
    /// Older revisions than the current one are ignored, so handlers
    /// finishing out of order never move the feed backwards.
    pub fn publish(&self, revision_id: i64) {
        let advanced = self.tx.send_if_modified(|current| {
            if revision_id > *current {
                *current = revision_id;
                true
            } else {
                false
            }
        });
        tracing::debug!(
            revision_id,
            advanced,
            receivers = self.tx.receiver_count(),
            "Published event feed update"
        );
    }

    /// Revision of the last events write.
    pub fn current(&self) -> i64 {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> FeedSubscription {
        FeedSubscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiving side of the feed. Unsubscribes on drop.
#[derive(Debug)]
pub struct FeedSubscription {
    rx: watch::Receiver<i64>,
}

impl FeedSubscription {
    /// Wait until the events revision differs from `since`, up to `timeout`.
    ///
    /// Returns at once when the client's revision is already stale.
    pub async fn wait_past(&mut self, since: i64, timeout: Duration) -> WaitOutcome {
        let changed = async {
            self.rx
                .wait_for(|revision| *revision != since)
                .await
                .map(|revision| *revision)
        };
        match tokio::time::timeout(timeout, changed).await {
            Ok(Ok(revision)) => WaitOutcome::Changed(revision),
            Ok(Err(_)) => WaitOutcome::Closed,
            Err(_) => WaitOutcome::TimedOut,
        }
    }
}
