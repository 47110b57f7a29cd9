mod actuator;
mod api;
mod config;
mod filter;
mod kuma;
mod monitor;
mod session;
mod socketio;
#[cfg(test)]
mod test_helpers;

use actuator::{Action, FailurePolicy};
use api::ApiError;
use clap::Parser;
use config::{ConfigError, KumaConfig, Overrides, Settings};
use filter::Filter;
use kuma::KumaClient;
use session::{Intent, Outcome};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit status for unreadable or incomplete configuration.
const EXIT_CONFIG: u8 = 1;
/// Exit status for faults reported by the server or the connection to it.
const EXIT_API: u8 = 3;

const DEFAULT_CONFIG: &str = "kuma.toml";

const EXAMPLES: &str = "\
Examples:
  kuma-downtime pause
  kuma-downtime resume -t prod -t staging
  kuma-downtime pause -n \"API Health\" -n \"DB Ping\"";

/// Pause or resume Uptime Kuma monitors, optionally filtered by tags and/or
/// names. With no filter every monitor is affected.
#[derive(Parser, Debug)]
#[command(name = "kuma-downtime", version, about, after_help = EXAMPLES)]
pub struct Cli {
    /// Action to perform
    #[arg(value_enum)]
    action: Action,

    /// Filter by tag name. Can be used multiple times.
    #[arg(short = 't', long = "tag", value_name = "TAG")]
    tags: Vec<String>,

    /// Filter by monitor friendly name (exact, case-insensitive). Can be used multiple times.
    #[arg(short = 'n', long = "name", value_name = "NAME")]
    names: Vec<String>,

    /// Config file path [default: kuma.toml]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Uptime Kuma base URL (overrides config)
    #[arg(long, env = "KUMA_URL")]
    url: Option<String>,

    /// Login user (overrides config). The password is read from KUMA_PASSWORD.
    #[arg(long, env = "KUMA_USERNAME")]
    username: Option<String>,

    /// Seconds to wait for each server reply (overrides config)
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// List the monitors that would be affected without changing them
    #[arg(long)]
    dry_run: bool,

    /// Stop at the first monitor that fails instead of continuing
    #[arg(long)]
    fail_fast: bool,

    /// Extra logging (connection, selection and per-monitor progress)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn intent(&self) -> Intent {
        Intent {
            action: self.action,
            filter: Filter::new(self.names.clone(), self.tags.clone()),
            policy: if self.fail_fast {
                FailurePolicy::Abort
            } else {
                FailurePolicy::Continue
            },
            dry_run: self.dry_run,
        }
    }

    fn settings(&self, password: Option<String>) -> Result<Settings, ConfigError> {
        let (path, required) = match &self.config {
            Some(path) => (path.clone(), true),
            None => (PathBuf::from(DEFAULT_CONFIG), false),
        };
        KumaConfig::load(&path, required)?.resolve(Overrides {
            url: self.url.clone(),
            username: self.username.clone(),
            password,
            timeout_secs: self.timeout,
        })
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "kuma_downtime=debug"
    } else {
        "kuma_downtime=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Everything a finished run prints, and the status it exits with.
#[derive(Debug, PartialEq)]
struct Finish {
    code: u8,
    stdout: Vec<String>,
    stderr: Vec<String>,
}

impl Finish {
    fn config_error(e: &ConfigError) -> Self {
        Self {
            code: EXIT_CONFIG,
            stdout: Vec::new(),
            stderr: vec![format!("Config error: {e}")],
        }
    }

    /// Per-monitor failures are listed on stderr but leave the status at 0.
    fn from_run(result: Result<Outcome, ApiError>) -> Self {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                return Self {
                    code: EXIT_API,
                    stdout: Vec::new(),
                    stderr: vec![format!("API error: {e}")],
                }
            }
        };

        let mut stderr = Vec::new();
        if let Outcome::Applied(report) = &outcome {
            if !report.failures.is_empty() {
                let labels: Vec<String> = report
                    .failures
                    .iter()
                    .map(|f| format!("\"{}\" ({})", f.monitor, f.error))
                    .collect();
                stderr.push(format!(
                    "{} monitor(s) could not be {}d: {}",
                    labels.len(),
                    report.action,
                    labels.join(", ")
                ));
            }
        }
        Self {
            code: 0,
            stdout: outcome.lines(),
            stderr,
        }
    }

    fn emit(self) -> ExitCode {
        for line in &self.stdout {
            println!("{line}");
        }
        for line in &self.stderr {
            eprintln!("{line}");
        }
        ExitCode::from(self.code)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    tracing::debug!(?cli, "parsed CLI arguments");

    let settings = match cli.settings(std::env::var("KUMA_PASSWORD").ok()) {
        Ok(settings) => settings,
        Err(e) => return Finish::config_error(&e).emit(),
    };

    let mut client = match KumaClient::new(&settings) {
        Ok(client) => client,
        Err(e) => return Finish::from_run(Err(e)).emit(),
    };

    let result = session::run(&mut client, &settings.credentials, &cli.intent()).await;
    Finish::from_run(result).emit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actuator::{BatchReport, Failure};
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("kuma-downtime").chain(args.iter().copied()))
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_action_only_means_all_monitors() {
        let cli = parse(&["pause"]).unwrap();
        assert_eq!(cli.action, Action::Pause);
        let intent = cli.intent();
        assert!(intent.filter.is_empty());
        assert_eq!(intent.filter.description(), "all monitors");
        assert_eq!(intent.policy, FailurePolicy::Continue);
        assert!(!intent.dry_run);
    }

    #[test]
    fn test_parse_repeatable_filters() {
        let cli = parse(&["resume", "-t", "prod", "--tag", "staging", "-n", "API Health"]).unwrap();
        assert_eq!(cli.action, Action::Resume);
        assert_eq!(cli.tags, vec!["prod", "staging"]);
        assert_eq!(cli.names, vec!["API Health"]);
        assert_eq!(
            cli.intent().filter.description(),
            "names: API Health | tags: prod, staging"
        );
    }

    #[test]
    fn test_parse_rejects_unknown_action() {
        let err = parse(&["restart"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_parse_requires_action() {
        let err = parse(&[]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_fail_fast_selects_abort_policy() {
        let cli = parse(&["pause", "--fail-fast", "--dry-run"]).unwrap();
        let intent = cli.intent();
        assert_eq!(intent.policy, FailurePolicy::Abort);
        assert!(intent.dry_run);
    }

    #[test]
    fn test_settings_from_flags_without_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("kuma.toml");
        let mut cli = parse(&[
            "pause",
            "--url",
            "http://kuma.local:3001",
            "--username",
            "admin",
            "--timeout",
            "4",
        ])
        .unwrap();

        // an explicit config path must exist
        cli.config = Some(missing);
        assert!(matches!(
            cli.settings(Some("pw".to_string())),
            Err(ConfigError::Read { .. })
        ));

        let settings = KumaConfig::default()
            .resolve(Overrides {
                url: cli.url.clone(),
                username: cli.username.clone(),
                password: Some("pw".to_string()),
                timeout_secs: cli.timeout,
            })
            .unwrap();
        assert_eq!(settings.url.as_str(), "http://kuma.local:3001/");
        assert_eq!(settings.timeout.as_secs(), 4);
    }

    #[test]
    fn test_settings_from_explicit_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[server]\nurl = \"https://status.example.com\"\nusername = \"ops\"\npassword = \"from-file\"\n",
        )
        .unwrap();
        let mut cli = parse(&["resume"]).unwrap();
        cli.config = Some(path);
        // flags and env are cleared so the environment of the test runner cannot leak in
        cli.url = None;
        cli.username = None;

        let settings = cli.settings(None).unwrap();
        assert_eq!(settings.url.as_str(), "https://status.example.com/");
        assert_eq!(settings.credentials.username, "ops");
        assert_eq!(settings.credentials.password, "from-file");
    }

    #[test]
    fn test_config_error_exits_1() {
        let finish = Finish::config_error(&ConfigError::Missing("url"));
        assert_eq!(finish.code, 1);
        assert!(finish.stdout.is_empty());
        assert_eq!(finish.stderr.len(), 1);
        assert!(finish.stderr[0].starts_with("Config error: missing setting `url`"));
    }

    #[test]
    fn test_api_error_exits_3() {
        let finish = Finish::from_run(Err(ApiError::Login("bad password".to_string())));
        assert_eq!(finish.code, 3);
        assert!(finish.stdout.is_empty());
        assert_eq!(finish.stderr, vec!["API error: login failed: bad password"]);

        let finish = Finish::from_run(Err(ApiError::Timeout("monitorList".to_string())));
        assert_eq!(finish.code, 3);
    }

    #[test]
    fn test_no_match_exits_0() {
        let finish = Finish::from_run(Ok(Outcome::NoMatch {
            filter: "tags: prod".to_string(),
        }));
        assert_eq!(
            finish,
            Finish {
                code: 0,
                stdout: vec!["No monitors matched (tags: prod).".to_string()],
                stderr: vec![],
            }
        );
    }

    #[test]
    fn test_item_failures_exit_0_and_are_listed_once() {
        let report = BatchReport {
            action: Action::Resume,
            changed: 1,
            failures: vec![Failure {
                monitor: "API".to_string(),
                error: "editMonitor rejected by server: locked".to_string(),
            }],
            filter: "all monitors".to_string(),
        };
        let finish = Finish::from_run(Ok(Outcome::Applied(report)));
        assert_eq!(finish.code, 0);
        assert_eq!(finish.stdout, vec!["Resumed 1 monitor(s) (all monitors)"]);
        assert_eq!(
            finish.stderr,
            vec![
                "1 monitor(s) could not be resumed: \"API\" \
                 (editMonitor rejected by server: locked)"
            ]
        );
    }
}
