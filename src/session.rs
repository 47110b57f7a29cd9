/// One run against the server: login, list, select, act, and always
/// disconnect afterwards.
use crate::actuator::{self, Action, BatchReport, FailurePolicy};
use crate::api::{ApiError, Credentials, MonitorApi};
use crate::filter::{self, Filter};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;

/// What the user asked for, after argument parsing.
#[derive(Debug, Clone)]
pub struct Intent {
    pub action: Action,
    pub filter: Filter,
    pub policy: FailurePolicy,
    pub dry_run: bool,
}

/// Result of a run that did not hit an API fault.
#[derive(Debug)]
pub enum Outcome {
    /// The filter selected nothing.
    NoMatch { filter: String },
    /// Targets were selected but, in dry-run mode, left untouched.
    DryRun {
        action: Action,
        steps: Vec<String>,
        filter: String,
    },
    Applied(BatchReport),
}

impl Outcome {
    /// Lines printed to stdout for this outcome.
    pub fn lines(&self) -> Vec<String> {
        match self {
            Outcome::NoMatch { filter } => vec![format!("No monitors matched ({filter}).")],
            Outcome::DryRun {
                action,
                steps,
                filter,
            } => {
                let mut lines = steps.clone();
                lines.push(format!(
                    "Would {action} {} monitor(s) ({filter})",
                    steps.len()
                ));
                lines
            }
            Outcome::Applied(report) => vec![report.summary()],
        }
    }
}

/// Run `intent` on a fresh session.
///
/// `disconnect` is called whatever happens inside, including a panic, which
/// is re-raised once the session is closed. A failed disconnect is only
/// logged so it never hides the run's own result.
pub async fn run<A: MonitorApi + ?Sized>(
    api: &mut A,
    credentials: &Credentials,
    intent: &Intent,
) -> Result<Outcome, ApiError> {
    let result = AssertUnwindSafe(execute(api, credentials, intent))
        .catch_unwind()
        .await;

    if let Err(e) = api.disconnect().await {
        tracing::warn!(error = %e, "disconnect failed");
    }

    match result {
        Ok(outcome) => outcome,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

async fn execute<A: MonitorApi + ?Sized>(
    api: &mut A,
    credentials: &Credentials,
    intent: &Intent,
) -> Result<Outcome, ApiError> {
    api.login(credentials).await?;
    let monitors = api.list_monitors().await?;
    tracing::info!(count = monitors.len(), "fetched monitors");

    let filter_description = intent.filter.description();
    let targets = filter::resolve(api, monitors, &intent.filter).await;
    if targets.is_empty() {
        return Ok(Outcome::NoMatch {
            filter: filter_description,
        });
    }

    if intent.dry_run {
        let capabilities = api.capabilities();
        let steps = targets
            .iter()
            .map(|m| actuator::describe_step(intent.action, capabilities, m))
            .collect();
        return Ok(Outcome::DryRun {
            action: intent.action,
            steps,
            filter: filter_description,
        });
    }

    let report = actuator::apply(
        api,
        intent.action,
        &targets,
        &filter_description,
        intent.policy,
    )
    .await?;
    Ok(Outcome::Applied(report))
}
