//! Comment thread construction.
//!
//! A post's comments arrive as a flat, unordered collection. Threads are
//! rendered two levels deep: every reply, however deep its parent chain,
//! is listed under the top-level comment the chain starts from.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::AppError;
use crate::models::comment::{CommentNode, CommentRecord};

/// Default bound on the number of parent links followed for one record.
pub const DEFAULT_MAX_ANCESTOR_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Following `parent_id` from `comment_id` leads back to a comment already visited.
    AncestorCycle { comment_id: i64 },
    /// The parent chain of `comment_id` is longer than the configured bound.
    ChainTooDeep { comment_id: i64, limit: usize },
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::AncestorCycle { comment_id } => {
                write!(f, "comment {comment_id} has a cyclic parent chain")
            }
            TreeError::ChainTooDeep { comment_id, limit } => {
                write!(f, "comment {comment_id} is nested deeper than {limit} levels")
            }
        }
    }
}

impl std::error::Error for TreeError {}

impl From<TreeError> for AppError {
    fn from(err: TreeError) -> Self {
        AppError::MalformedRecord(err.to_string())
    }
}

/// Builds the two-level forest for one post.
///
/// Top-level comments and every reply list are sorted newest first.
/// A `parent_id` that matches no record makes the comment top-level.
pub fn build_tree(
    records: &[CommentRecord],
    max_ancestor_depth: usize,
) -> Result<Vec<CommentNode>, TreeError> {
    let by_id: HashMap<i64, &CommentRecord> = records.iter().map(|r| (r.id, r)).collect();

    let mut roots: Vec<CommentNode> = Vec::new();
    let mut replies: HashMap<i64, Vec<CommentNode>> = HashMap::new();

    for record in records {
        match root_ancestor(record, &by_id, max_ancestor_depth)? {
            None => roots.push(CommentNode::new(record.clone())),
            Some(root_id) => replies
                .entry(root_id)
                .or_default()
                .push(CommentNode::new(record.clone())),
        }
    }

    for root in &mut roots {
        if let Some(mut list) = replies.remove(&root.record.id) {
            sort_newest_first(&mut list);
            root.replies = list;
        }
    }
    sort_newest_first(&mut roots);

    Ok(roots)
}

/// Returns the id of the top-level comment `record` belongs under,
/// or `None` if `record` is itself top-level.
fn root_ancestor(
    record: &CommentRecord,
    by_id: &HashMap<i64, &CommentRecord>,
    max_depth: usize,
) -> Result<Option<i64>, TreeError> {
    let Some(mut current) = record.parent_id.and_then(|pid| by_id.get(&pid).copied()) else {
        return Ok(None);
    };

    let mut visited = HashSet::from([record.id]);
    let mut depth = 1;

    while let Some(parent) = current.parent_id.and_then(|pid| by_id.get(&pid).copied()) {
        if !visited.insert(current.id) {
            return Err(TreeError::AncestorCycle {
                comment_id: record.id,
            });
        }
        depth += 1;
        if depth > max_depth {
            return Err(TreeError::ChainTooDeep {
                comment_id: record.id,
                limit: max_depth,
            });
        }
        current = parent;
    }

    Ok(Some(current.id))
}

fn sort_newest_first(nodes: &mut [CommentNode]) {
    nodes.sort_by(|a, b| b.record.created_at.cmp(&a.record.created_at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    fn record(id: i64, parent_id: Option<i64>, ts: i64) -> CommentRecord {
        CommentRecord {
            id,
            post_id: 1,
            user_id: 10,
            username: "juan".to_string(),
            content: format!("comment {id}"),
            tagged_username: None,
            parent_id,
            created_at: at(ts),
        }
    }

    fn ids(nodes: &[CommentNode]) -> Vec<i64> {
        nodes.iter().map(|n| n.record.id).collect()
    }

    #[test]
    fn empty_input_gives_empty_forest() {
        assert!(build_tree(&[], DEFAULT_MAX_ANCESTOR_DEPTH).unwrap().is_empty());
    }

    #[test]
    fn single_top_level_comment() {
        let forest = build_tree(&[record(1, None, 1)], DEFAULT_MAX_ANCESTOR_DEPTH).unwrap();
        assert_eq!(ids(&forest), vec![1]);
        assert!(forest[0].replies.is_empty());
    }

    #[test]
    fn reply_to_reply_is_flattened_under_root() {
        let records = vec![
            record(1, None, 1),
            record(2, Some(1), 2),
            record(3, Some(2), 3),
        ];
        let forest = build_tree(&records, DEFAULT_MAX_ANCESTOR_DEPTH).unwrap();

        assert_eq!(ids(&forest), vec![1]);
        assert_eq!(ids(&forest[0].replies), vec![3, 2]);
        assert!(forest[0].replies.iter().all(|r| r.replies.is_empty()));
    }

    #[test]
    fn deep_chain_is_flattened_under_root() {
        let records = vec![
            record(1, None, 1),
            record(2, Some(1), 2),
            record(3, Some(2), 3),
            record(4, Some(3), 4),
            record(5, Some(4), 5),
        ];
        let forest = build_tree(&records, DEFAULT_MAX_ANCESTOR_DEPTH).unwrap();

        assert_eq!(ids(&forest), vec![1]);
        assert_eq!(ids(&forest[0].replies), vec![5, 4, 3, 2]);
    }

    #[test]
    fn dangling_parent_is_top_level() {
        let records = vec![record(1, None, 1), record(4, Some(99), 2)];
        let forest = build_tree(&records, DEFAULT_MAX_ANCESTOR_DEPTH).unwrap();

        assert_eq!(ids(&forest), vec![4, 1]);
    }

    #[test]
    fn replies_under_a_dangling_comment_attach_to_it() {
        // 5 lost its parent; 6 replies to 5 and must follow it to the top level.
        let records = vec![record(5, Some(99), 1), record(6, Some(5), 2)];
        let forest = build_tree(&records, DEFAULT_MAX_ANCESTOR_DEPTH).unwrap();

        assert_eq!(ids(&forest), vec![5]);
        assert_eq!(ids(&forest[0].replies), vec![6]);
    }

    #[test]
    fn top_level_and_replies_sorted_newest_first() {
        let records = vec![
            record(1, None, 100),
            record(2, None, 300),
            record(3, None, 200),
            record(4, Some(2), 10),
            record(5, Some(2), 30),
            record(6, Some(2), 20),
        ];
        let forest = build_tree(&records, DEFAULT_MAX_ANCESTOR_DEPTH).unwrap();

        assert_eq!(ids(&forest), vec![2, 3, 1]);
        assert_eq!(ids(&forest[0].replies), vec![5, 6, 4]);
    }

    #[test]
    fn grouping_does_not_depend_on_input_order() {
        let records = vec![
            record(1, None, 1),
            record(2, Some(1), 2),
            record(3, Some(2), 3),
            record(4, None, 4),
            record(5, Some(4), 5),
            record(6, Some(77), 6),
        ];
        let expected = build_tree(&records, DEFAULT_MAX_ANCESTOR_DEPTH).unwrap();

        let mut reversed = records.clone();
        reversed.reverse();
        let mut rotated = records.clone();
        rotated.rotate_left(2);

        for input in [reversed, rotated] {
            assert_eq!(build_tree(&input, DEFAULT_MAX_ANCESTOR_DEPTH).unwrap(), expected);
        }
    }

    #[test]
    fn every_record_appears_exactly_once() {
        let records = vec![
            record(1, None, 1),
            record(2, Some(1), 2),
            record(3, Some(2), 3),
            record(4, Some(50), 4),
            record(5, Some(4), 5),
        ];
        let forest = build_tree(&records, DEFAULT_MAX_ANCESTOR_DEPTH).unwrap();

        let mut seen: Vec<i64> = forest
            .iter()
            .flat_map(|n| std::iter::once(n.record.id).chain(n.replies.iter().map(|r| r.record.id)))
            .collect();
        seen.sort();
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn cycle_is_reported() {
        let records = vec![record(1, Some(3), 1), record(2, Some(1), 2), record(3, Some(2), 3)];
        let err = build_tree(&records, DEFAULT_MAX_ANCESTOR_DEPTH).unwrap_err();
        assert!(matches!(err, TreeError::AncestorCycle { .. }));
    }

    #[test]
    fn self_parent_is_reported() {
        let err = build_tree(&[record(1, Some(1), 1)], DEFAULT_MAX_ANCESTOR_DEPTH).unwrap_err();
        assert_eq!(err, TreeError::AncestorCycle { comment_id: 1 });
    }

    #[test]
    fn chain_longer_than_bound_is_reported() {
        let records: Vec<_> = (1..=5)
            .map(|id| record(id, if id == 1 { None } else { Some(id - 1) }, id))
            .collect();

        assert!(build_tree(&records, 4).is_ok());
        let err = build_tree(&records, 3).unwrap_err();
        assert_eq!(err, TreeError::ChainTooDeep { comment_id: 5, limit: 3 });
    }
}
