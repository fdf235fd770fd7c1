//! Named values available to template references during one event.

use serde_json::{Map, Value};

/// Template context: a JSON object addressed by dotted paths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    values: Map<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Merge every entry of `entries`, overwriting existing keys.
    pub fn extend(&mut self, entries: Map<String, Value>) {
        self.values.extend(entries);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Follow a dotted path such as `job.file.name`.
    ///
    /// Object segments are looked up by key and array segments by decimal
    /// index. Returns `None` as soon as a segment is missing.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.values.get(first)?;

        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl From<Map<String, Value>> for Context {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> Context {
        let Value::Object(map) = json!({
            "job": { "file": { "name": "cube.gcode", "size": 1024 } },
            "offsets": [ { "tool0": 210 }, { "bed": 60 } ],
            "plain": "text"
        }) else {
            unreachable!()
        };
        Context::from(map)
    }

    #[test]
    fn test_lookup_nested_paths() {
        let ctx = context();
        assert_eq!(ctx.lookup("job.file.name"), Some(&json!("cube.gcode")));
        assert_eq!(ctx.lookup("job.file"), Some(&json!({ "name": "cube.gcode", "size": 1024 })));
        assert_eq!(ctx.lookup("offsets.1.bed"), Some(&json!(60)));
    }

    #[test]
    fn test_lookup_misses() {
        let ctx = context();
        assert_eq!(ctx.lookup("missing"), None);
        assert_eq!(ctx.lookup("job.file.owner"), None);
        assert_eq!(ctx.lookup("plain.inner"), None);
        assert_eq!(ctx.lookup("offsets.7"), None);
        assert_eq!(ctx.lookup(""), None);
    }
}
