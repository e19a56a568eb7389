//! End-to-end tests for status aggregation, staging and dispatch.
//!
//! Real scheduler binaries are replaced by `echo`, `cat` and `false` on
//! unix hosts, so nothing here needs a cluster.

use std::sync::Mutex;

use async_trait::async_trait;
use bifrost_monitor::error::{DispatchError, SubmissionFailure};
use bifrost_monitor::rerun::{RerunRequestStore, StagingAction};
use bifrost_monitor::scheduler::{
    DryRunBackend, GridBackend, GridDispatcher, GridJobSpec, GridKind, PreparedSubmission,
    SubmissionOutput, SUMMARY_HEADER,
};
use bifrost_monitor::status::{
    ComponentStatus, SampleRef, StatusAggregator, DEFAULT_COMPONENT_ORDER,
};
use bifrost_monitor::storage::{ComponentStatusDoc, SampleDoc, SnapshotSource};
use bifrost_monitor::MonitorConfig;

fn sample(id: &str, name: &str, dir: &std::path::Path) -> SampleDoc {
    SampleDoc::new(id, name).with_run_directory(dir.join(name))
}

fn source(dir: &std::path::Path) -> SnapshotSource {
    for name in ["S1", "S2", "S3"] {
        std::fs::create_dir_all(dir.join(name)).unwrap();
    }
    SnapshotSource::new(
        vec![sample("1", "S1", dir), sample("2", "S2", dir), sample("3", "S3", dir)],
        vec![
            ComponentStatusDoc::new("1")
                .with_component("assemblatron", "Failure")
                .with_component("qcquickie", "Success"),
            ComponentStatusDoc::new("2")
                .with_component("assemblatron", "Success")
                .with_component("qcquickie", "Failure"),
            ComponentStatusDoc::new("3")
                .with_component("assemblatron", "Requirements not met")
                .with_component("qcquickie", "queued to run"),
        ],
    )
}

fn cell(store: &mut RerunRequestStore, id: &str, name: &str, component: &str) {
    store.apply(&StagingAction::CellSelected {
        sample: SampleRef::new(id, name),
        component: component.to_string(),
    });
}

/// Fails every sample named in `failing`, succeeds the rest.
struct ScriptedBackend {
    failing: Vec<String>,
    submitted: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn failing(names: &[&str]) -> Self {
        Self {
            failing: names.iter().map(|s| s.to_string()).collect(),
            submitted: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl GridBackend for ScriptedBackend {
    fn kind(&self) -> GridKind {
        GridKind::DryRun
    }

    fn prepare(&self, spec: &GridJobSpec) -> Result<PreparedSubmission, DispatchError> {
        DryRunBackend::new().prepare(spec)
    }

    async fn submit(&self, job: &PreparedSubmission) -> Result<SubmissionOutput, SubmissionFailure> {
        self.submitted.lock().unwrap().push(job.sample_name.clone());
        if self.failing.contains(&job.sample_name) {
            Err(SubmissionFailure::NonZeroExit {
                code: 1,
                stdout: String::new(),
                stderr: "sbatch: error: Batch job submission failed".to_string(),
            })
        } else {
            Ok(SubmissionOutput {
                stdout: format!("Submitted batch job for {}", job.sample_name),
                stderr: String::new(),
                exit_code: 0,
            })
        }
    }
}

#[tokio::test]
async fn test_dry_run_orders_component_steps() {
    let dir = tempfile::tempdir().unwrap();
    let source = source(dir.path());
    let config = MonitorConfig::default().with_bifrost_dir("/opt/bifrost");
    let dispatcher = GridDispatcher::new(&config);

    let mut store = RerunRequestStore::new();
    cell(&mut store, "1", "S1", "assemblatron");
    cell(&mut store, "1", "S1", "qcquickie");

    let report = dispatcher.dispatch(&mut store, &source).await.unwrap();
    assert_eq!(report.records.len(), 1);
    let text = &report.records[0].stdout;

    let markers = [
        "rm -r 'assemblatron'",
        "assemblatron/pipeline.smk' --config Sample='sample.yaml' --unlock;",
        "assemblatron/pipeline.smk' --config Sample='sample.yaml'; ",
        "rm -r 'qcquickie'",
        "qcquickie/pipeline.smk' --config Sample='sample.yaml' --unlock;",
        "qcquickie/pipeline.smk' --config Sample='sample.yaml'; ",
    ];
    let positions: Vec<usize> = markers
        .iter()
        .map(|m| text.find(m).unwrap_or_else(|| panic!("missing {}", m)))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert!(text.contains("--restart-times 2"));
    assert!(!dir.path().join("S1").join("manual_rerun.sh").exists());
}

#[tokio::test]
async fn test_failed_submission_does_not_stop_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let source = source(dir.path());
    let backend = ScriptedBackend::failing(&["S2"]);
    let config = MonitorConfig::default();

    let mut store = RerunRequestStore::new();
    cell(&mut store, "2", "S2", "qcquickie");
    cell(&mut store, "3", "S3", "assemblatron");

    let dispatcher = GridDispatcher::with_backend(&config, Box::new(backend));
    let report = dispatcher.dispatch(&mut store, &source).await.unwrap();

    assert_eq!(report.records.len(), 2);
    assert!(report.show_notification);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.succeeded(), 1);

    let lines: Vec<&str> = report.summary.lines().collect();
    assert_eq!(lines[0], SUMMARY_HEADER.trim_end());
    assert!(lines[1].starts_with("S2: FAILED (exit code 1)"));
    assert!(lines[1].contains("Batch job submission failed"));
    assert_eq!(lines[2], "S3: out: Submitted batch job for S3 | err: ");
}

#[tokio::test]
async fn test_status_to_dispatch_all_failed() {
    let dir = tempfile::tempdir().unwrap();
    let source = source(dir.path());
    let config = MonitorConfig::default();

    let ids = source.sample_ids();
    let report = StatusAggregator::new(DEFAULT_COMPONENT_ORDER)
        .refresh(&source, &ids)
        .await
        .unwrap();

    let s3 = report.row("3").unwrap();
    assert_eq!(s3.code("assemblatron"), ComponentStatus::RequirementsNotMet.display_code());
    let req = report.style_for("assemblatron", "Req.").unwrap();
    let ok = report.style_for("assemblatron", "OK").unwrap();
    assert_ne!(req.background_color, ok.background_color);

    let mut store = RerunRequestStore::new();
    let action = StagingAction::AddAllFailedForAllSamples {
        visible_rows: &report.rows,
        catalog: &report.catalog,
    };
    store.apply(&action);
    store.apply(&action);
    assert_eq!(store.len(), 2);
    assert!(store.contains("1", "assemblatron"));
    assert!(store.contains("2", "qcquickie"));

    let dispatch = GridDispatcher::new(&config)
        .dispatch(&mut store, &source)
        .await
        .unwrap();
    assert!(store.is_empty());
    let names: Vec<&str> = dispatch.records.iter().map(|r| r.sample_name.as_str()).collect();
    assert_eq!(names, vec!["S1", "S2"]);
}

#[tokio::test]
async fn test_snapshot_file_round_trip_through_source() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    let json = r#"{
        "samples": [
            {"_id": "a1", "name": "Sal_01", "priority": "High", "path": "/runs/r7/Sal_01",
             "stamps": {"supplying_lab_check": {"value": "fail:supplying lab"},
                        "ssi_stamper": {"value": "pass:OK"}}}
        ],
        "component_status": [
            {"_id": "a1", "s_cs": {"whats_my_species": "Success", "custom_typer": "Running"}}
        ]
    }"#;
    std::fs::write(&path, json).unwrap();

    let source = SnapshotSource::load(&path).await.unwrap();
    let report = StatusAggregator::new(DEFAULT_COMPONENT_ORDER)
        .refresh(&source, &source.sample_ids())
        .await
        .unwrap();

    let row = report.row("a1").unwrap();
    assert_eq!(row.priority, "high");
    assert_eq!(row.qc_code, "SL*");
    assert_eq!(report.catalog.as_slice(), &["whats_my_species", "custom_typer"]);
}

#[cfg(unix)]
mod processes {
    use super::*;

    fn slurm_config(bin: &str) -> MonitorConfig {
        MonitorConfig::default()
            .with_grid(GridKind::Slurm)
            .with_sbatch_bin(bin)
            .with_memory_gb(8)
            .with_priority("daytime")
            .with_threads(2)
            .with_walltime("02:00:00")
    }

    #[tokio::test]
    async fn test_slurm_submission_with_echo() {
        let dir = tempfile::tempdir().unwrap();
        let source = source(dir.path());
        let dispatcher = GridDispatcher::new(&slurm_config("echo"));

        let mut store = RerunRequestStore::new();
        cell(&mut store, "1", "S1", "assemblatron");

        let report = dispatcher.dispatch(&mut store, &source).await.unwrap();
        let out = &report.records[0].stdout;
        assert!(out.starts_with("--mem=8G -p daytime -c 2 -t 02:00:00 -J bifrost_S1 --wrap"));
        assert!(report.records[0].is_success());
    }

    #[tokio::test]
    async fn test_slurm_failure_with_false() {
        let dir = tempfile::tempdir().unwrap();
        let source = source(dir.path());
        let dispatcher = GridDispatcher::new(&slurm_config("false"));

        let mut store = RerunRequestStore::new();
        cell(&mut store, "1", "S1", "assemblatron");
        cell(&mut store, "3", "S3", "assemblatron");

        let report = dispatcher.dispatch(&mut store, &source).await.unwrap();
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.failed(), 2);
        assert!(report.show_notification);
    }

    #[tokio::test]
    async fn test_torque_script_written_and_submitted() {
        let dir = tempfile::tempdir().unwrap();
        let source = source(dir.path());
        let config = MonitorConfig::default()
            .with_grid(GridKind::Torque)
            .with_qsub_bin("cat")
            .with_memory_gb(12)
            .with_threads(4)
            .with_walltime("24:00:00")
            .with_group("ssi")
            .with_reservation("bifrost_res");

        let mut store = RerunRequestStore::new();
        cell(&mut store, "2", "S2", "qcquickie");

        let report = GridDispatcher::new(&config)
            .dispatch(&mut store, &source)
            .await
            .unwrap();

        let script_path = dir.path().join("S2").join("manual_rerun.sh");
        let script = std::fs::read_to_string(&script_path).unwrap();
        assert!(script.starts_with("#!/bin/sh\n#PBS -V -d . -w . -l mem=12gb,nodes=1:ppn=4"));
        assert!(script.contains(",advres=bifrost_res -N bifrost_S2 -W group_list=ssi -A ssi"));
        assert!(script.contains("rm -r 'qcquickie'"));
        assert_eq!(report.records[0].stdout, script.trim());
    }

    #[tokio::test]
    async fn test_torque_required_reservation_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let source = source(dir.path());
        let config = MonitorConfig::default()
            .with_grid(GridKind::Torque)
            .with_qsub_bin("cat")
            .with_memory_gb(12)
            .with_threads(4)
            .with_walltime("24:00:00")
            .with_group("ssi")
            .with_require_reservation(true);

        let mut store = RerunRequestStore::new();
        cell(&mut store, "2", "S2", "qcquickie");

        let err = GridDispatcher::new(&config)
            .dispatch(&mut store, &source)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::MalformedJobSpec { .. }));
        assert_eq!(store.len(), 1);
        assert!(!dir.path().join("S2").join("manual_rerun.sh").exists());
    }
}
