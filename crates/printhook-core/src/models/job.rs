//! Current job information reported by the printer host.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Snapshot of the printer's current job, as reported by the host.
///
/// Every field is optional; missing fields are simply absent from the
/// template context, except `job` and `meta` which degrade to empty maps.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Value>,
    #[serde(default, rename = "currentZ", skip_serializing_if = "Option::is_none")]
    pub current_z: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offsets: Option<Value>,
    /// File analysis metadata for the job's file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl JobInfo {
    /// Context entries contributed by this job.
    pub fn context_entries(&self) -> Map<String, Value> {
        let mut entries = Map::new();
        let empty = || Value::Object(Map::new());

        if let Some(state) = &self.state {
            entries.insert("state".to_string(), state.clone());
        }
        entries.insert("job".to_string(), self.job.clone().unwrap_or_else(empty));
        if let Some(progress) = &self.progress {
            entries.insert("progress".to_string(), progress.clone());
        }
        if let Some(current_z) = &self.current_z {
            entries.insert("currentZ".to_string(), current_z.clone());
        }
        if let Some(offsets) = &self.offsets {
            entries.insert("offsets".to_string(), offsets.clone());
        }
        entries.insert("meta".to_string(), self.meta.clone().unwrap_or_else(empty));
        entries
    }
}
