//! `stackwatch` command line.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DurationRound, TimeDelta, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use stackwatch_adapter_dryrun::RecordingProvider;
use stackwatch_adapter_notification::NotificationService;
use stackwatch_application::{AlertPlan, Runtime};
use stackwatch_domain::{
    AlarmKind, AlarmStateChangeEvent, Namer, ProjectName, StackId, StackTopology,
    StackwatchConfig,
};
use stackwatch_ports::{InMemoryLogPort, PortSet};

use crate::render::{self, OutputFormat};
use crate::settings::{self, Overrides};

pub const LOG_ENV: &str = "STACKWATCH_LOG";

#[derive(Parser, Debug)]
#[command(name = "stackwatch", version, about = "Per-stack alarms and alert routing")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file; defaults to $HOME/.stackwatch/config.yaml or ./stackwatch.yaml.
    #[arg(long, global = true, env = settings::CONFIG_PATH_ENV)]
    pub config: Option<PathBuf>,

    /// Stack identity, overriding the config file.
    #[arg(long, global = true, env = "STACKWATCH_STACK")]
    pub stack: Option<String>,

    #[arg(long, global = true, env = "STACKWATCH_ALERT_EMAIL")]
    pub email: Option<String>,

    #[arg(long, global = true)]
    pub secondary_region: Option<String>,

    #[arg(long, global = true)]
    pub instance_id: Option<String>,

    #[arg(long, global = true)]
    pub distribution_id: Option<String>,
}

impl GlobalArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            stack: self.stack.clone(),
            email: self.email.clone(),
            secondary_region: self.secondary_region.clone(),
            instance_id: self.instance_id.clone(),
            distribution_id: self.distribution_id.clone(),
        }
    }

    fn load(&self) -> Result<StackwatchConfig> {
        let path = self.config.clone().unwrap_or_else(settings::config_path);
        settings::load_config(&path, &self.overrides())
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve the config into channels, alarms and rules.
    Plan {
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Provision the plan against the dry-run recorder.
    Apply {
        #[arg(long, default_value = "text")]
        format: OutputFormat,
        /// Print the recorded resource manifest instead of the report.
        #[arg(long)]
        manifest: bool,
    },
    /// Route an alarm state-change event read from a file (`-` for stdin).
    Route { input: PathBuf },
    /// Feed per-period datapoints to one alarm and route its transitions.
    Simulate {
        #[arg(long)]
        alarm: AlarmKind,
        /// Comma separated; `-` marks a period without data.
        #[arg(long)]
        values: String,
    },
    /// Print the static stack topology.
    Topology {
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub async fn run() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();
    let output = execute(cli).await?;
    print!("{output}");
    Ok(())
}

pub async fn execute(cli: Cli) -> Result<String> {
    let config = cli.global.load()?;
    match cli.command {
        Command::Plan { format } => render::render_plan(&resolve(&config)?, format),
        Command::Apply { format, manifest } => {
            let plan = resolve(&config)?;
            let provider = RecordingProvider::new(plan.account_id.clone());
            let mut runtime = dry_run_runtime(plan, provider.clone());
            let report = runtime.provision().await?;
            info!(resources = report.resources.len(), "Dry-run apply complete");
            if manifest {
                provider.manifest_json()
            } else {
                render::render_report(&report, format)
            }
        }
        Command::Route { input } => {
            let raw = read_input(&input)?;
            let event = AlarmStateChangeEvent::from_json(&raw)?;
            let mut runtime = dry_run_runtime(resolve(&config)?, RecordingProvider::default());
            let messages = runtime.dispatch(&event).await?;
            Ok(render::render_messages(&messages))
        }
        Command::Simulate { alarm, values } => {
            let datapoints = settings::parse_datapoints(&values)?;
            let plan = resolve(&config)?;
            let name = plan
                .alarm_by_kind(alarm)
                .map(|definition| definition.name.clone())
                .with_context(|| format!("alarm {} is not declared", alarm.slug()))?;
            let mut runtime = dry_run_runtime(plan, RecordingProvider::default());

            let period = TimeDelta::minutes(5);
            let start = Utc::now().duration_trunc(period)?;
            let mut out = String::new();
            for (index, datapoint) in datapoints.into_iter().enumerate() {
                let at = start + period * index as i32;
                let messages = runtime.observe(&name, datapoint, at).await?;
                let state = runtime
                    .alarm_state(&name)
                    .map(|state| state.as_str())
                    .unwrap_or("UNKNOWN");
                let shown = datapoint.map_or_else(|| "-".to_string(), |value| value.to_string());
                out.push_str(&format!("period {index}: {shown} -> {state}\n"));
                if !messages.is_empty() {
                    out.push_str(&render::render_messages(&messages));
                }
            }
            Ok(out)
        }
        Command::Topology { format } => {
            let namer = Namer::new(
                ProjectName::parse(&config.project)?,
                StackId::parse(&config.stack)?,
            );
            let topology = StackTopology::declare(&namer, &config.topology, &config.home_region);
            render::render_topology(&topology, format)
        }
    }
}

fn resolve(config: &StackwatchConfig) -> Result<AlertPlan> {
    AlertPlan::resolve(config).context("invalid stackwatch configuration")
}

fn dry_run_runtime(plan: AlertPlan, provider: RecordingProvider) -> Runtime {
    let log = InMemoryLogPort::default();
    let ports = PortSet {
        provision: Arc::new(provider.with_log(log.clone())),
        delivery: Arc::new(NotificationService::from_channels(&plan.channels).with_log(log.clone())),
        logs: Arc::new(log),
    };
    Runtime::new_with_ports(plan, ports)
}

fn read_input(input: &Path) -> Result<String> {
    if input.as_os_str() == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("failed to read event from stdin")?;
        return Ok(raw);
    }
    std::fs::read_to_string(input)
        .with_context(|| format!("failed to read event at {}", input.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "project: weprint\nstack: dev\naccount_id: \"123456789012\"\nalerts:\n  email: ops@example.com\n  secondary_region: us-east-1\nupstream:\n  instance_id: i-0abc\n  distribution_id: E2XYZ"
        )
        .unwrap();
        file
    }

    fn cli(file: &tempfile::NamedTempFile, args: &[&str]) -> Cli {
        let path = file.path().to_string_lossy().to_string();
        let mut argv = vec!["stackwatch", "--config", path.as_str()];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[tokio::test]
    async fn simulate_reports_one_alert_for_sustained_load() {
        let file = config_file();
        let out = execute(cli(&file, &["simulate", "--alarm", "cpu", "--values", "85,85,88"]))
            .await
            .unwrap();
        assert!(out.contains("period 1: 85 -> ALARM"));
        assert_eq!(out.matches("Subject: CRITICAL ALERT").count(), 1);
    }

    #[tokio::test]
    async fn apply_manifest_lists_dual_topics() {
        let file = config_file();
        let out = execute(cli(&file, &["apply", "--manifest"])).await.unwrap();
        let manifest: serde_json::Value = serde_json::from_str(&out).unwrap();
        let topics = manifest
            .as_array()
            .unwrap()
            .iter()
            .filter(|entry| entry["type"] == "aws:sns:Topic")
            .count();
        assert_eq!(topics, 2);
    }

    #[tokio::test]
    async fn stack_flag_renames_every_resource() {
        let file = config_file();
        let out = execute(cli(&file, &["--stack", "prod", "plan"])).await.unwrap();
        assert!(out.contains("weprint-prod-alerts"));
        assert!(!out.contains("weprint-dev-"));
    }

    #[tokio::test]
    async fn invalid_email_is_reported_before_planning() {
        let file = config_file();
        let err = execute(cli(&file, &["--email", "not-an-email", "plan"]))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("not-an-email"));
    }
}
