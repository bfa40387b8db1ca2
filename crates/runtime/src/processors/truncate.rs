use ironloop_config::default_truncate_marker;
use serde_json::{Map, Value};

use super::ResultProcessor;

/// Key that carries the marker when an object loses keys.
pub const TRUNCATED_KEY: &str = "__truncated__";

/// Cut oversized payloads down to `max_size`.
///
/// Strings are measured in characters, arrays in items and objects in
/// keys. Anything at or under the limit comes back exactly as it went in.
#[derive(Debug, Clone)]
pub struct Truncate {
    max_size: usize,
    marker: String,
}

impl Truncate {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            marker: default_truncate_marker(),
        }
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    fn truncate_str(&self, s: String) -> Value {
        match s.char_indices().nth(self.max_size) {
            Some((cut, _)) => Value::String(format!("{}{}", &s[..cut], self.marker)),
            None => Value::String(s),
        }
    }
}

impl ResultProcessor for Truncate {
    fn name(&self) -> &str {
        "truncate"
    }

    fn process_value(&self, value: Value) -> Value {
        match value {
            Value::String(s) => self.truncate_str(s),
            Value::Array(mut items) if items.len() > self.max_size => {
                items.truncate(self.max_size);
                items.push(Value::String(self.marker.clone()));
                Value::Array(items)
            }
            Value::Object(map) if map.len() > self.max_size => {
                let mut kept: Map<String, Value> = map.into_iter().take(self.max_size).collect();
                kept.insert(TRUNCATED_KEY.into(), Value::String(self.marker.clone()));
                Value::Object(kept)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn short_string_is_unchanged() {
        let t = Truncate::new(20);
        assert_eq!(t.process_value(json!("short result")), json!("short result"));
        // exactly at the limit
        assert_eq!(Truncate::new(5).process_value(json!("abcde")), json!("abcde"));
    }

    #[test]
    fn long_string_gets_marker() {
        let t = Truncate::new(4).with_marker("…");
        assert_eq!(t.process_value(json!("abcdefgh")), json!("abcd…"));
    }

    #[test]
    fn multibyte_text_is_cut_on_char_boundaries() {
        let t = Truncate::new(3).with_marker("");
        assert_eq!(t.process_value(json!("héllo wörld")), json!("hél"));
        assert_eq!(t.process_value(json!("🦀🦀🦀🦀")), json!("🦀🦀🦀"));
    }

    #[test]
    fn arrays_by_item_count() {
        let t = Truncate::new(2).with_marker("[more]");
        assert_eq!(t.process_value(json!([1, 2, 3, 4])), json!([1, 2, "[more]"]));
        assert_eq!(t.process_value(json!([1, 2])), json!([1, 2]));
    }

    #[test]
    fn objects_by_key_count() {
        let t = Truncate::new(1).with_marker("[more]");
        let out = t.process_value(json!({"a": 1, "b": 2, "c": 3}));
        assert_eq!(out, json!({"a": 1, "__truncated__": "[more]"}));
    }

    #[test]
    fn scalars_pass_through() {
        let t = Truncate::new(0);
        assert_eq!(t.process_value(json!(12345)), json!(12345));
        assert_eq!(t.process_value(Value::Null), Value::Null);
    }
}
