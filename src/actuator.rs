/// Batch application of pause/resume to the selected monitors.
///
/// Each monitor is acted on once, in order. What happens on a failure is
/// decided by `FailurePolicy`, identically for both actions.
use crate::api::{ApiError, Capabilities, MonitorApi};
use crate::monitor::Monitor;
use clap::ValueEnum;
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Action {
    Pause,
    Resume,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Pause => "pause",
            Action::Resume => "resume",
        }
    }

    /// Capitalized past tense used in the summary ("Paused", "Resumed").
    pub fn past_tense(self) -> &'static str {
        match self {
            Action::Pause => "Paused",
            Action::Resume => "Resumed",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a resume is carried out against a particular client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeStrategy {
    /// The client has a dedicated resume call.
    DirectResume,
    /// No resume call: re-submit the monitor with `active` set to running.
    EditFallback,
}

impl ResumeStrategy {
    pub fn probe(capabilities: Capabilities) -> Self {
        if capabilities.resume {
            ResumeStrategy::DirectResume
        } else {
            ResumeStrategy::EditFallback
        }
    }
}

/// What a failed monitor does to the rest of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Record the failure and carry on with the next monitor.
    #[default]
    Continue,
    /// Stop at the first failure and return it.
    Abort,
}

/// A monitor the action could not be applied to.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub monitor: String,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub action: Action,
    pub changed: usize,
    pub failures: Vec<Failure>,
    pub filter: String,
}

impl BatchReport {
    /// Final line, e.g. `Paused 1 monitor(s) (tags: prod)`.
    pub fn summary(&self) -> String {
        format!(
            "{} {} monitor(s) ({})",
            self.action.past_tense(),
            self.changed,
            self.filter
        )
    }
}

/// Resume one monitor using whichever strategy the client supports.
pub async fn resume<A: MonitorApi + ?Sized>(
    api: &mut A,
    monitor: &Monitor,
) -> Result<(), ApiError> {
    match ResumeStrategy::probe(api.capabilities()) {
        ResumeStrategy::DirectResume => api.resume_monitor(monitor.id).await,
        ResumeStrategy::EditFallback => {
            info!(
                monitor = %monitor.label(),
                "client has no resume call, re-submitting monitor as active"
            );
            api.edit_monitor(&monitor.with_active_running()).await
        }
    }
}

async fn act<A: MonitorApi + ?Sized>(
    api: &mut A,
    action: Action,
    monitor: &Monitor,
) -> Result<(), ApiError> {
    match action {
        Action::Pause => api.pause_monitor(monitor.id).await,
        Action::Resume => resume(api, monitor).await,
    }
}

/// Apply `action` to every target.
///
/// Under `FailurePolicy::Abort` the first failure is returned as-is; under
/// `Continue` it is recorded in the report for the caller to print.
pub async fn apply<A: MonitorApi + ?Sized>(
    api: &mut A,
    action: Action,
    targets: &[Monitor],
    filter_description: &str,
    policy: FailurePolicy,
) -> Result<BatchReport, ApiError> {
    let mut changed = 0;
    let mut failures = Vec::new();

    for monitor in targets {
        match act(api, action, monitor).await {
            Ok(()) => {
                debug!(monitor = %monitor.label(), %action, "done");
                changed += 1;
            }
            Err(e) if policy == FailurePolicy::Abort => {
                warn!(changed, %action, "stopping batch at first failure");
                return Err(e);
            }
            Err(e) => {
                let label = monitor.label();
                debug!(monitor = %label, %action, error = %e, "failed, continuing");
                failures.push(Failure {
                    monitor: label,
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(BatchReport {
        action,
        changed,
        failures,
        filter: filter_description.to_string(),
    })
}

/// One-line description of what a dry run would do to `monitor`.
pub fn describe_step(action: Action, capabilities: Capabilities, monitor: &Monitor) -> String {
    let how = match (action, ResumeStrategy::probe(capabilities)) {
        (Action::Pause, _) => "pause",
        (Action::Resume, ResumeStrategy::DirectResume) => "resume",
        (Action::Resume, ResumeStrategy::EditFallback) => "resume via edit (active=1)",
    };
    let state = match monitor.is_active() {
        Some(true) => "active",
        Some(false) => "paused",
        None => "unknown",
    };
    format!("{} [{}] {}: currently {}", how, monitor.id, monitor.label(), state)
}
