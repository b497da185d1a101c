//! Live comment thread built from store snapshots.

use crate::{
    models::comment::CommentNode,
    services::tree::build_tree,
    store::{SnapshotEvent, Subscription},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedUpdate {
    /// A fresh thread built from the latest snapshot.
    Forest(Vec<CommentNode>),
    /// The latest snapshot could not be used; the previous thread still stands.
    Notice(String),
}

/// Rebuilds the thread from scratch on every snapshot and remembers the
/// last one that built cleanly.
pub struct CommentFeed {
    subscription: Subscription,
    max_reply_depth: usize,
    forest: Vec<CommentNode>,
}

impl CommentFeed {
    pub fn new(subscription: Subscription, max_reply_depth: usize) -> Self {
        Self {
            subscription,
            max_reply_depth,
            forest: Vec::new(),
        }
    }

    /// Last successfully built thread.
    pub fn forest(&self) -> &[CommentNode] {
        &self.forest
    }

    pub async fn next(&mut self) -> Option<FeedUpdate> {
        let update = match self.subscription.next().await? {
            SnapshotEvent::Snapshot(records) => match build_tree(&records, self.max_reply_depth) {
                Ok(forest) => {
                    self.forest = forest.clone();
                    FeedUpdate::Forest(forest)
                }
                Err(e) => {
                    tracing::warn!(
                        post_id = self.subscription.post_id(),
                        "Keeping previous comment thread: {}",
                        e
                    );
                    FeedUpdate::Notice(e.to_string())
                }
            },
            SnapshotEvent::Error(msg) => FeedUpdate::Notice(msg),
        };
        Some(update)
    }
}
