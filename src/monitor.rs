/// Monitor and tag records as delivered by the Uptime Kuma server.
///
/// Only `id`, `name`, `active` and `tags` are interpreted locally; every
/// other field is carried through untouched so an edit can re-submit it.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Value of the `active` field for a monitor that is running.
pub const ACTIVE_RUNNING: i64 = 1;

/// Server-owned monitor identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonitorId(pub u64);

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tag association on a monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub name: String,
    /// Remaining server fields (`tag_id`, `value`, `color`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Tag {
    #[cfg(test)]
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            extra: Map::new(),
        }
    }
}

/// A monitor summary from the monitor list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: MonitorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Embedded tags, when the server includes them. Filtering never relies
    /// on this; it looks tags up per monitor instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Monitor {
    #[cfg(test)]
    pub fn new(id: u64, name: &str) -> Self {
        Self {
            id: MonitorId(id),
            name: Some(name.to_string()),
            tags: None,
            fields: Map::new(),
        }
    }

    /// Human-facing label: the display name, or the id when there is none.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.id.to_string(),
        }
    }

    /// Whether the server reports this monitor as running.
    ///
    /// Older servers send `0`/`1`, newer ones send booleans.
    pub fn is_active(&self) -> Option<bool> {
        match self.fields.get("active")? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|v| v != 0),
            _ => None,
        }
    }

    /// Copy of this monitor with `active` forced to the running state and
    /// every other known field preserved.
    pub fn with_active_running(&self) -> Monitor {
        let mut resumed = self.clone();
        resumed
            .fields
            .insert("active".to_string(), Value::from(ACTIVE_RUNNING));
        resumed
    }
}
