use ironloop_config::{SummarizeStrategy, default_max_summary_size, default_summary_sample_size};
use serde_json::{Map, Value, json};

use super::ResultProcessor;

/// Nesting levels expanded before containers collapse to a one-line
/// description.
const MAX_DEPTH: usize = 2;

/// Keys listed in a map summary line.
const LISTED_KEYS: usize = 8;

/// Appended to a summary line that had to be cut.
const ELLIPSIS: &str = "...";

/// Replace bulky payloads with a `{type, count, sample, summary}` digest.
///
/// The digest is capped at `max_summary_size` serialized characters, and
/// the original is kept whenever the digest would not be smaller.
#[derive(Debug, Clone)]
pub struct Summarize {
    strategy: SummarizeStrategy,
    sample_size: usize,
    max_summary_size: usize,
}

impl Summarize {
    pub fn new(strategy: SummarizeStrategy) -> Self {
        Self {
            strategy,
            sample_size: default_summary_sample_size(),
            max_summary_size: default_max_summary_size(),
        }
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub fn with_max_summary_size(mut self, max_summary_size: usize) -> Self {
        self.max_summary_size = max_summary_size;
        self
    }

    fn applies_to(&self, value: &Value) -> bool {
        matches!(
            (self.strategy, value),
            (SummarizeStrategy::Auto, Value::Array(_) | Value::Object(_) | Value::String(_))
                | (SummarizeStrategy::List, Value::Array(_))
                | (SummarizeStrategy::Map, Value::Object(_))
                | (SummarizeStrategy::Text, Value::String(_))
        )
    }

    fn summarize(&self, value: &Value, depth: usize) -> Value {
        match value {
            Value::Array(items) => json!({
                "type": "list",
                "count": items.len(),
                "sample": items
                    .iter()
                    .take(self.sample_size)
                    .map(|item| self.nested(item, depth))
                    .collect::<Vec<_>>(),
                "summary": describe(value),
            }),
            Value::Object(map) => {
                let mut keys: Vec<&str> = map.keys().take(LISTED_KEYS).map(String::as_str).collect();
                if map.len() > LISTED_KEYS {
                    keys.push("...");
                }
                json!({
                    "type": "map",
                    "count": map.len(),
                    "sample": map
                        .iter()
                        .take(self.sample_size)
                        .map(|(k, v)| (k.clone(), self.nested(v, depth)))
                        .collect::<Map<_, _>>(),
                    "summary": format!("{}: {}", describe(value), keys.join(", ")),
                })
            }
            Value::String(text) => json!({
                "type": "text",
                "count": text.chars().count(),
                "sample": text.lines().take(self.sample_size).collect::<Vec<_>>(),
                "summary": describe(value),
            }),
            other => other.clone(),
        }
    }

    fn nested(&self, value: &Value, depth: usize) -> Value {
        match value {
            Value::Array(_) | Value::Object(_) if depth + 1 >= MAX_DEPTH => Value::String(describe(value)),
            Value::Array(_) | Value::Object(_) => self.summarize(value, depth + 1),
            other => other.clone(),
        }
    }

    /// Shrink the digest until it fits: trailing sample entries go first,
    /// then the summary line is cut, and as a last resort only
    /// `{type, count}` remains.
    fn fit(&self, mut summary: Value) -> Value {
        while serialized_len(&summary) > self.max_summary_size && pop_sample(&mut summary) {}

        if let Value::Object(obj) = &mut summary {
            self.shrink_fields(obj);
        }
        summary
    }

    fn shrink_fields(&self, obj: &mut Map<String, Value>) {
        if serialized_len_map(obj) > self.max_summary_size {
            obj.remove("sample");
        }

        let over = serialized_len_map(obj).saturating_sub(self.max_summary_size);
        if over > 0 {
            let cut = match obj.get("summary") {
                Some(Value::String(text)) => {
                    let keep = text.chars().count().saturating_sub(over + ELLIPSIS.len());
                    text.char_indices().nth(keep).filter(|_| keep > 0).map(|(at, _)| at)
                }
                _ => None,
            };
            match (cut, obj.get_mut("summary")) {
                (Some(at), Some(Value::String(text))) => {
                    text.truncate(at);
                    text.push_str(ELLIPSIS);
                }
                _ => {
                    obj.remove("summary");
                }
            }
        }
        if serialized_len_map(obj) > self.max_summary_size {
            obj.remove("summary");
        }
    }
}

/// Drop the last sample entry. Returns false once there is nothing left
/// to drop.
fn pop_sample(summary: &mut Value) -> bool {
    match summary.get_mut("sample") {
        Some(Value::Array(items)) => items.pop().is_some(),
        Some(Value::Object(map)) => match map.keys().next_back().cloned() {
            Some(key) => map.remove(&key).is_some(),
            None => false,
        },
        _ => false,
    }
}

impl ResultProcessor for Summarize {
    fn name(&self) -> &str {
        "summarize"
    }

    fn process_value(&self, value: Value) -> Value {
        if !self.applies_to(&value) {
            return value;
        }
        let summary = self.fit(self.summarize(&value, 0));
        if serialized_len(&summary) < serialized_len(&value) {
            summary
        } else {
            value
        }
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Array(items) => format!("list of {} items", items.len()),
        Value::Object(map) => format!("map with {} keys", map.len()),
        Value::String(text) => format!(
            "text of {} characters, {} lines",
            text.chars().count(),
            text.lines().count()
        ),
        Value::Null => "null".into(),
        Value::Bool(_) => "boolean".into(),
        Value::Number(_) => "number".into(),
    }
}

fn serialized_len(value: &Value) -> usize {
    value.to_string().chars().count()
}

fn serialized_len_map(map: &Map<String, Value>) -> usize {
    serde_json::to_string(map).map_or(usize::MAX, |s| s.chars().count())
}
