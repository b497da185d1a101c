//! Snapshot fan-out for comment subscribers.
//!
//! Each subscribed post owns a `watch` channel holding the latest full
//! snapshot. Only the newest value is kept, so a slow reader skips
//! intermediate states and always lands on the current one.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, watch};

use crate::{error::AppError, models::comment::CommentRecord};

/// Published in place of store failures, whose detail only goes to the log.
pub const SNAPSHOT_UNAVAILABLE: &str = "Comments are temporarily unavailable";

/// What a subscriber receives on every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotEvent {
    /// Every comment currently stored for the post, unordered.
    Snapshot(Arc<Vec<CommentRecord>>),
    /// The store could not produce a snapshot.
    Error(String),
}

impl SnapshotEvent {
    fn from_fetch(result: Result<Vec<CommentRecord>, AppError>) -> Self {
        match result {
            Ok(records) => SnapshotEvent::Snapshot(Arc::new(records)),
            Err(AppError::InternalServerError(detail)) => {
                tracing::error!("Comment snapshot failed: {}", detail);
                SnapshotEvent::Error(SNAPSHOT_UNAVAILABLE.to_string())
            }
            Err(e) => {
                tracing::warn!("Comment snapshot failed: {}", e);
                SnapshotEvent::Error(e.to_string())
            }
        }
    }
}

/// Per-post snapshot channels.
///
/// Snapshots are fetched while the hub lock is held, so a value published
/// later was also read later.
#[derive(Clone, Default)]
pub struct SnapshotHub {
    channels: Arc<Mutex<HashMap<i64, watch::Sender<SnapshotEvent>>>>,
}

impl SnapshotHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a subscription seeded with the snapshot produced by `fetch`.
    ///
    /// Channels whose subscribers have all gone are dropped first.
    pub async fn subscribe<F>(&self, post_id: i64, fetch: F) -> Subscription
    where
        F: Future<Output = Result<Vec<CommentRecord>, AppError>>,
    {
        let mut channels = self.channels.lock().await;
        channels.retain(|_, sender| sender.receiver_count() > 0);
        let event = SnapshotEvent::from_fetch(fetch.await);

        let receiver = match channels.get(&post_id) {
            Some(sender) => {
                sender.send_if_modified(|current| {
                    if *current == event {
                        false
                    } else {
                        *current = event;
                        true
                    }
                });
                sender.subscribe()
            }
            None => {
                let (sender, receiver) = watch::channel(event);
                channels.insert(post_id, sender);
                receiver
            }
        };

        tracing::debug!(post_id, "Comment subscription opened");
        Subscription {
            post_id,
            receiver,
            primed: false,
        }
    }

    /// Re-reads the post's comments and pushes them to its subscribers.
    ///
    /// Does nothing (and skips `fetch`) when nobody is listening.
    pub async fn refresh<F>(&self, post_id: i64, fetch: F)
    where
        F: Future<Output = Result<Vec<CommentRecord>, AppError>>,
    {
        let mut channels = self.channels.lock().await;
        let Some(sender) = channels.get(&post_id) else {
            return;
        };
        if sender.receiver_count() == 0 {
            channels.remove(&post_id);
            tracing::debug!(post_id, "Dropped idle comment channel");
            return;
        }

        sender.send_replace(SnapshotEvent::from_fetch(fetch.await));
    }

    /// Number of posts with an open channel.
    pub async fn channel_count(&self) -> usize {
        self.channels.lock().await.len()
    }
}

/// Handle returned by `subscribe`. Dropping it ends the subscription.
pub struct Subscription {
    post_id: i64,
    receiver: watch::Receiver<SnapshotEvent>,
    primed: bool,
}

impl Subscription {
    pub fn post_id(&self) -> i64 {
        self.post_id
    }

    /// Waits for the next snapshot. The first call returns immediately.
    ///
    /// Returns `None` once the hub has gone away.
    pub async fn next(&mut self) -> Option<SnapshotEvent> {
        if self.primed {
            self.receiver.changed().await.ok()?;
        } else {
            self.primed = true;
        }
        Some(self.receiver.borrow_and_update().clone())
    }

    pub fn cancel(self) {
        tracing::debug!(post_id = self.post_id, "Comment subscription cancelled");
    }
}
