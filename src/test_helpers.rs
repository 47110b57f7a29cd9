//! In-memory `MonitorApi` for exercising the batch logic without a server.

use crate::api::{ApiError, Capabilities, Credentials, MonitorApi};
use crate::monitor::{Monitor, MonitorId, Tag};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

/// One recorded call against the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Login,
    List,
    Tags(MonitorId),
    Pause(MonitorId),
    Resume(MonitorId),
    Edit(MonitorId),
    Disconnect,
}

#[derive(Default)]
pub struct FakeApi {
    monitors: Vec<Monitor>,
    tags: HashMap<MonitorId, Vec<Tag>>,
    resume_unsupported: bool,
    fail_login: bool,
    fail_list: bool,
    fail_tags: HashSet<MonitorId>,
    fail_pause: HashSet<MonitorId>,
    fail_resume: HashSet<MonitorId>,
    fail_edit: HashSet<MonitorId>,
    pub calls: Vec<Call>,
    /// Every monitor payload passed to `edit_monitor`.
    pub edited: Vec<Monitor>,
}

impl FakeApi {
    pub fn new(monitors: Vec<Monitor>) -> Self {
        Self {
            monitors,
            ..Self::default()
        }
    }

    pub fn with_tags(mut self, id: u64, names: &[&str]) -> Self {
        self.tags
            .insert(MonitorId(id), names.iter().map(|n| Tag::named(n)).collect());
        self
    }

    pub fn without_resume(mut self) -> Self {
        self.resume_unsupported = true;
        self
    }

    pub fn failing_login(mut self) -> Self {
        self.fail_login = true;
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn failing_tags(mut self, id: u64) -> Self {
        self.fail_tags.insert(MonitorId(id));
        self
    }

    pub fn failing_pause(mut self, id: u64) -> Self {
        self.fail_pause.insert(MonitorId(id));
        self
    }

    pub fn failing_resume(mut self, id: u64) -> Self {
        self.fail_resume.insert(MonitorId(id));
        self
    }

    pub fn failing_edit(mut self, id: u64) -> Self {
        self.fail_edit.insert(MonitorId(id));
        self
    }

    /// Ids of monitors that received a state change, in call order.
    pub fn acted_on(&self) -> Vec<u64> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Pause(id) | Call::Resume(id) | Call::Edit(id) => Some(id.0),
                _ => None,
            })
            .collect()
    }

    fn rejected(operation: &str, id: MonitorId) -> ApiError {
        ApiError::Rejected {
            operation: operation.to_string(),
            message: format!("monitor {id} is broken"),
        }
    }
}

#[async_trait]
impl MonitorApi for FakeApi {
    async fn login(&mut self, _credentials: &Credentials) -> Result<(), ApiError> {
        self.calls.push(Call::Login);
        if self.fail_login {
            return Err(ApiError::Login("Incorrect username or password.".to_string()));
        }
        Ok(())
    }

    async fn list_monitors(&mut self) -> Result<Vec<Monitor>, ApiError> {
        self.calls.push(Call::List);
        if self.fail_list {
            return Err(ApiError::Timeout("monitorList".to_string()));
        }
        Ok(self.monitors.clone())
    }

    async fn tags_for_monitor(&mut self, id: MonitorId) -> Result<Vec<Tag>, ApiError> {
        self.calls.push(Call::Tags(id));
        if self.fail_tags.contains(&id) {
            return Err(Self::rejected("getMonitor", id));
        }
        Ok(self.tags.get(&id).cloned().unwrap_or_default())
    }

    async fn pause_monitor(&mut self, id: MonitorId) -> Result<(), ApiError> {
        self.calls.push(Call::Pause(id));
        if self.fail_pause.contains(&id) {
            return Err(Self::rejected("pauseMonitor", id));
        }
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            resume: !self.resume_unsupported,
        }
    }

    async fn resume_monitor(&mut self, id: MonitorId) -> Result<(), ApiError> {
        if self.resume_unsupported {
            return Err(ApiError::Unsupported("resume_monitor"));
        }
        self.calls.push(Call::Resume(id));
        if self.fail_resume.contains(&id) {
            return Err(Self::rejected("resumeMonitor", id));
        }
        Ok(())
    }

    async fn edit_monitor(&mut self, monitor: &Monitor) -> Result<(), ApiError> {
        self.calls.push(Call::Edit(monitor.id));
        self.edited.push(monitor.clone());
        if self.fail_edit.contains(&monitor.id) {
            return Err(Self::rejected("editMonitor", monitor.id));
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ApiError> {
        self.calls.push(Call::Disconnect);
        Ok(())
    }
}
