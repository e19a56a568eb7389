//! CLI command definitions for bifrost-monitor.
//!
//! Status and rerun operations run against a JSON snapshot of the sample
//! store, so the engine can be driven without the web dashboard.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use tracing::{info, warn};

use crate::config::MonitorConfig;
use crate::rerun::{RerunRequestStore, StagingAction};
use crate::scheduler::{GridDispatcher, GridKind};
use crate::status::{SampleRef, SampleStatusRow, StatusAggregator, StatusReport};
use crate::storage::SnapshotSource;

/// Pipeline status monitor and rerun dispatcher for bifrost.
#[derive(Parser)]
#[command(name = "bifrost-monitor")]
#[command(about = "Monitor bifrost pipeline status and dispatch component reruns")]
#[command(version)]
#[command(
    long_about = "bifrost-monitor aggregates per-sample component states and QC verdicts into a status table, and submits staged component reruns to slurm or torque.\n\nExample usage:\n  bifrost-monitor status --snapshot run.json\n  bifrost-monitor rerun --snapshot run.json --all-failed --grid dry-run"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// YAML configuration file. `BIFROST_*` variables override it.
    #[arg(short, long, global = true, env = "BIFROST_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Print the status table for the samples in a snapshot.
    Status(StatusArgs),

    /// Stage rerun requests and dispatch them to the grid.
    ///
    /// Staging flags are applied in a fixed order: cells, whole samples,
    /// whole components, then failed components.
    Rerun(RerunArgs),
}

/// Arguments for the status command.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// JSON snapshot with `samples` and `component_status` documents.
    #[arg(short, long)]
    pub snapshot: PathBuf,

    /// Sample ids to show (comma-separated). Defaults to every sample.
    #[arg(long, value_delimiter = ',')]
    pub samples: Vec<String>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,

    /// Reload the snapshot and reprint on the configured interval.
    #[arg(short, long)]
    pub watch: bool,
}

/// Arguments for the rerun command.
#[derive(Parser, Debug)]
pub struct RerunArgs {
    /// JSON snapshot with `samples` and `component_status` documents.
    #[arg(short, long)]
    pub snapshot: PathBuf,

    /// Stage one cell, as `<sample_id>:<component>`.
    #[arg(long = "cell")]
    pub cells: Vec<String>,

    /// Stage every component of a sample, given as an id or as the
    /// `<sample_id>:<name>` dropdown value.
    #[arg(long = "all-components")]
    pub all_components: Vec<String>,

    /// Stage a component for every sample.
    #[arg(long = "component-for-all")]
    pub component_for_all: Vec<String>,

    /// Stage every failed component of every sample.
    #[arg(long)]
    pub all_failed: bool,

    /// Override the configured grid (slurm, torque, dry-run).
    #[arg(short, long)]
    pub grid: Option<GridKind>,

    /// Output the dispatch report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Parse CLI arguments without running.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Status(args) => run_status_command(args, &config).await,
        Commands::Rerun(args) => run_rerun_command(args, config).await,
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<MonitorConfig> {
    let config = match path {
        Some(path) => MonitorConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => MonitorConfig::from_env()?,
    };
    Ok(config)
}

// ============================================================================
// Status Command Implementation
// ============================================================================

async fn run_status_command(args: StatusArgs, config: &MonitorConfig) -> anyhow::Result<()> {
    let aggregator = StatusAggregator::new(config.components.iter().cloned());

    if !args.watch {
        let report = load_report(&aggregator, &args.snapshot, &args.samples).await?;
        print_report(&report, args.json)?;
        return Ok(());
    }

    let mut interval = tokio::time::interval(Duration::from_secs(config.refresh_interval_secs));
    info!(
        "Watching {} every {}s",
        args.snapshot.display(),
        config.refresh_interval_secs
    );
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match load_report(&aggregator, &args.snapshot, &args.samples).await {
                    Ok(report) => print_report(&report, args.json)?,
                    Err(e) => warn!("Status refresh failed: {:#}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping status watch");
                return Ok(());
            }
        }
    }
}

async fn load_report(
    aggregator: &StatusAggregator,
    snapshot: &Path,
    samples: &[String],
) -> anyhow::Result<StatusReport> {
    let source = SnapshotSource::load(snapshot).await?;
    let ids = if samples.is_empty() {
        source.sample_ids()
    } else {
        samples.to_vec()
    };
    Ok(aggregator.refresh(&source, &ids).await?)
}

fn print_report(report: &StatusReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", render_table(report));
    }
    Ok(())
}

/// Renders the status table as aligned plain text.
pub fn render_table(report: &StatusReport) -> String {
    let header: Vec<&str> = report.columns.iter().map(|c| c.name.as_str()).collect();
    let cells: Vec<Vec<&str>> = report
        .rows
        .iter()
        .map(|row| report.columns.iter().map(|c| row.cell(&c.id)).collect())
        .collect();

    let widths: Vec<usize> = (0..header.len())
        .map(|i| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(header[i].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_line = |values: &[&str]| -> String {
        let padded: Vec<String> = values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<width$}", v, width = *w))
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    };

    let mut out = format_line(&header);
    for row in &cells {
        out.push_str(&format_line(row));
    }
    out
}

// ============================================================================
// Rerun Command Implementation
// ============================================================================

async fn run_rerun_command(args: RerunArgs, mut config: MonitorConfig) -> anyhow::Result<()> {
    if let Some(grid) = args.grid {
        config = config.with_grid(grid);
    }

    let source = SnapshotSource::load(&args.snapshot).await?;
    let aggregator = StatusAggregator::new(config.components.iter().cloned());
    let report = aggregator.refresh(&source, &source.sample_ids()).await?;

    let mut store = RerunRequestStore::new();
    stage_from_args(&args, &report, &mut store)?;
    info!("Staged {} rerun requests", store.len());

    let dispatcher = GridDispatcher::new(&config);
    let result = dispatcher.dispatch(&mut store, &source).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if result.show_notification {
        println!("{}", result.summary);
    } else {
        println!("Nothing staged for rerun.");
    }
    Ok(())
}

/// Applies the staging flags to `store`, in flag order.
fn stage_from_args(
    args: &RerunArgs,
    report: &StatusReport,
    store: &mut RerunRequestStore,
) -> anyhow::Result<()> {
    for cell in &args.cells {
        let (sample_id, component) = cell
            .rsplit_once(':')
            .with_context(|| format!("Expected <sample_id>:<component>, got '{}'", cell))?;
        let row = find_row(report, sample_id)?;
        store.apply(&StagingAction::CellSelected {
            sample: row.sample_ref(),
            component: component.to_string(),
        });
    }

    for value in &args.all_components {
        let row = match SampleRef::from_option_value(value) {
            Some(sample) => {
                let row = find_row(report, &sample.id)?;
                if row.name != sample.name {
                    anyhow::bail!(
                        "Sample '{}' is named '{}', not '{}'",
                        sample.id,
                        row.name,
                        sample.name
                    );
                }
                row
            }
            None => find_row(report, value)?,
        };
        store.apply(&StagingAction::AddAllComponentsForSample {
            sample: row.sample_ref(),
            catalog: &report.catalog,
        });
    }

    for component in &args.component_for_all {
        store.apply(&StagingAction::AddComponentForAllSamples {
            component: component.clone(),
            visible_rows: &report.rows,
        });
    }

    if args.all_failed {
        store.apply(&StagingAction::AddAllFailedForAllSamples {
            visible_rows: &report.rows,
            catalog: &report.catalog,
        });
    }

    Ok(())
}

fn find_row<'a>(report: &'a StatusReport, sample_id: &str) -> anyhow::Result<&'a SampleStatusRow> {
    report
        .row(sample_id)
        .with_context(|| format!("Sample '{}' is not in the status table", sample_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::ComponentStatus;
    use crate::storage::{ComponentStatusDoc, SampleDoc};
    use clap::CommandFactory;

    fn report() -> StatusReport {
        let samples = vec![SampleDoc::new("1", "S1"), SampleDoc::new("2", "S2")];
        let statuses = vec![
            ComponentStatusDoc::new("1")
                .with_component("assemblatron", "Failure")
                .with_component("qcquickie", "Success"),
            ComponentStatusDoc::new("2")
                .with_component("assemblatron", "Success")
                .with_component("qcquickie", "Failure"),
        ];
        StatusAggregator::new(crate::status::DEFAULT_COMPONENT_ORDER)
            .aggregate(&["1".to_string(), "2".to_string()], &statuses, &samples)
            .unwrap()
    }

    fn rerun_args(argv: &[&str]) -> RerunArgs {
        let mut full = vec!["bifrost-monitor", "rerun", "--snapshot", "snap.json"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).expect("should parse").command {
            Commands::Rerun(args) => args,
            _ => panic!("Expected Rerun command"),
        }
    }

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_status_command_defaults() {
        let cli = Cli::try_parse_from(["bifrost-monitor", "status", "--snapshot", "s.json"])
            .expect("should parse");
        assert_eq!(cli.log_level, "info");
        match cli.command {
            Commands::Status(args) => {
                assert_eq!(args.snapshot, PathBuf::from("s.json"));
                assert!(args.samples.is_empty());
                assert!(!args.json);
                assert!(!args.watch);
            }
            _ => panic!("Expected Status command"),
        }
    }

    #[test]
    fn test_status_samples_delimited() {
        let cli = Cli::try_parse_from([
            "bifrost-monitor",
            "status",
            "-s",
            "s.json",
            "--samples",
            "a,b,c",
        ])
        .expect("should parse");
        match cli.command {
            Commands::Status(args) => assert_eq!(args.samples, vec!["a", "b", "c"]),
            _ => panic!("Expected Status command"),
        }
    }

    #[test]
    fn test_rerun_command_options() {
        let args = rerun_args(&[
            "--cell",
            "1:assemblatron",
            "--cell",
            "2:qcquickie",
            "--all-components",
            "1",
            "--component-for-all",
            "analyzer",
            "--all-failed",
            "--grid",
            "slurm",
        ]);
        assert_eq!(args.cells.len(), 2);
        assert_eq!(args.all_components, vec!["1"]);
        assert_eq!(args.component_for_all, vec!["analyzer"]);
        assert!(args.all_failed);
        assert_eq!(args.grid, Some(GridKind::Slurm));
    }

    #[test]
    fn test_rerun_rejects_unknown_grid() {
        let result = Cli::try_parse_from([
            "bifrost-monitor",
            "rerun",
            "--snapshot",
            "s.json",
            "--grid",
            "lsf",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_stage_all_failed() {
        let report = report();
        let mut store = RerunRequestStore::new();
        stage_from_args(&rerun_args(&["--all-failed"]), &report, &mut store).unwrap();

        let failure = ComponentStatus::Failure.display_code();
        assert_eq!(store.len(), 2);
        for row in store.rows() {
            let status_row = report.row(&row.sample_id).unwrap();
            assert_eq!(status_row.code(&row.component), failure);
        }
    }

    #[test]
    fn test_stage_cells_and_replays() {
        let report = report();
        let mut store = RerunRequestStore::new();
        let args = rerun_args(&[
            "--cell",
            "1:assemblatron",
            "--cell",
            "1:assemblatron",
            "--all-components",
            "1",
        ]);
        stage_from_args(&args, &report, &mut store).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.rows()[0].component, "assemblatron");
        assert_eq!(store.rows()[1].component, "qcquickie");
    }

    #[test]
    fn test_stage_all_components_from_option_value() {
        let report = report();
        let option = report.row("2").unwrap().sample_ref().option_value();
        let mut store = RerunRequestStore::new();
        stage_from_args(&rerun_args(&["--all-components", option.as_str()]), &report, &mut store)
            .unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.rows().iter().all(|r| r.sample_id == "2" && r.sample_name == "S2"));

        let err = stage_from_args(&rerun_args(&["--all-components", "2:S1"]), &report, &mut store)
            .unwrap_err();
        assert!(err.to_string().contains("named 'S2'"));
    }

    #[test]
    fn test_stage_unknown_sample() {
        let report = report();
        let mut store = RerunRequestStore::new();
        let err = stage_from_args(&rerun_args(&["--cell", "9:assemblatron"]), &report, &mut store)
            .unwrap_err();
        assert!(err.to_string().contains("'9'"));
    }

    #[test]
    fn test_render_table() {
        let text = render_table(&report());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("assemblatron"));
        assert!(lines[1].contains("S1"));
        assert!(lines[1].contains("Fail"));
    }
}
