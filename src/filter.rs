/// Target selection: which monitors a run acts on.
///
/// Matching is inclusive-OR. A monitor qualifies when its name equals any
/// requested name or it carries any requested tag, both compared
/// case-insensitively. An empty filter selects every monitor.
use crate::api::MonitorApi;
use crate::monitor::{Monitor, MonitorId, Tag};
use std::collections::HashSet;

/// Tag set assumed for a monitor whose tags could not be looked up.
pub const NO_TAGS: Vec<Tag> = Vec::new();

/// Requested names and tags, case-folded for matching.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    names: HashSet<String>,
    tags: HashSet<String>,
    /// Spellings as given, for the description.
    requested_names: Vec<String>,
    requested_tags: Vec<String>,
}

impl Filter {
    pub fn new(names: Vec<String>, tags: Vec<String>) -> Self {
        Self {
            names: names.iter().map(|n| n.to_lowercase()).collect(),
            tags: tags.iter().map(|t| t.to_lowercase()).collect(),
            requested_names: names,
            requested_tags: tags,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.tags.is_empty()
    }

    /// Human-readable summary echoed in the final report, e.g.
    /// `names: API Health | tags: prod`.
    pub fn description(&self) -> String {
        if self.is_empty() {
            return "all monitors".to_string();
        }
        let mut parts = Vec::new();
        if !self.requested_names.is_empty() {
            parts.push(format!("names: {}", sorted_join(&self.requested_names)));
        }
        if !self.requested_tags.is_empty() {
            parts.push(format!("tags: {}", sorted_join(&self.requested_tags)));
        }
        parts.join(" | ")
    }

    fn matches_name(&self, monitor: &Monitor) -> bool {
        if self.names.is_empty() {
            return false;
        }
        let name = monitor.name.as_deref().unwrap_or_default().to_lowercase();
        self.names.contains(&name)
    }

    fn matches_tags(&self, tags: &[Tag]) -> bool {
        tags.iter().any(|tag| self.tags.contains(&tag.name.to_lowercase()))
    }
}

fn sorted_join(values: &[String]) -> String {
    let mut sorted = values.to_vec();
    sorted.sort();
    sorted.join(", ")
}

/// Tags of one monitor, or `NO_TAGS` when the lookup fails.
pub async fn lookup_tags<A: MonitorApi + ?Sized>(api: &mut A, id: MonitorId) -> Vec<Tag> {
    match api.tags_for_monitor(id).await {
        Ok(tags) => tags,
        Err(e) => {
            tracing::debug!(monitor = %id, error = %e, "tag lookup failed, treating as untagged");
            NO_TAGS
        }
    }
}

/// Select the monitors `filter` applies to, in source order.
///
/// Tags are looked up per monitor, and only for monitors whose name did not
/// already match. Lookup failures never abort the selection.
pub async fn resolve<A: MonitorApi + ?Sized>(
    api: &mut A,
    monitors: Vec<Monitor>,
    filter: &Filter,
) -> Vec<Monitor> {
    if filter.is_empty() {
        return monitors;
    }

    let mut targets = Vec::new();
    for monitor in monitors {
        let selected = filter.matches_name(&monitor)
            || (!filter.tags.is_empty()
                && filter.matches_tags(&lookup_tags(api, monitor.id).await));
        if selected {
            tracing::debug!(monitor = %monitor.label(), "selected");
            targets.push(monitor);
        }
    }
    targets
}
