//! Activity history: recording entries and flattening their details.

use serde_json::Value;

use crate::models::activity::{ActivityEntry, ActivityKind, ActivityResponse, DetailRow};
use crate::store::ActivityStore;

/// Appends a history entry for `user_id`.
///
/// History is secondary to the action it describes, so a failed write is
/// logged and swallowed.
pub async fn record<S>(store: &S, user_id: i64, kind: ActivityKind, details: Value)
where
    S: ActivityStore + ?Sized,
{
    if let Err(e) = store.record_activity(user_id, kind, details).await {
        tracing::warn!(user_id, kind = kind.as_str(), "Failed to record activity: {}", e);
    }
}

/// Flattens nested JSON into `path = value` rows, object keys in sorted order.
///
/// Object keys join with `.`, array elements use their index as the segment.
/// `null` becomes an empty string and strings lose their quotes.
pub fn flatten_details(details: &Value) -> Vec<DetailRow> {
    let mut rows = Vec::new();
    flatten_into(details, String::new(), &mut rows);
    rows
}

fn flatten_into(value: &Value, path: String, rows: &mut Vec<DetailRow>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(child, join(&path, key), rows);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(child, join(&path, &index.to_string()), rows);
            }
        }
        leaf => rows.push(DetailRow {
            key: path,
            value: render_leaf(leaf),
        }),
    }
}

fn join(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{path}.{segment}")
    }
}

fn render_leaf(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl From<ActivityEntry> for ActivityResponse {
    fn from(entry: ActivityEntry) -> Self {
        Self {
            id: entry.id,
            details: flatten_details(&entry.details),
            kind: entry.kind,
            created_at: entry.created_at,
        }
    }
}
