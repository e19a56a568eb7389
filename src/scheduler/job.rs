//! Rerun job definitions.
//!
//! This module turns staged rerun requests into scheduler-ready jobs:
//!
//! - `JobCommandBuilder`: composes the shell command for one sample
//! - `CommandStep`: one of the three steps issued per component
//! - `SampleCommand`: the composed command and the components it reruns
//! - `GridJobSpec`: a sample command plus its resource parameters

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MonitorConfig;
use crate::error::DispatchError;
use crate::status::{ComponentCatalog, SampleRef};
use crate::storage::SampleDoc;

/// File name of a component's job definition.
const DEFINITION_FILE: &str = "pipeline.smk";

static TOKEN_PATTERN: OnceLock<Regex> = OnceLock::new();
static WALLTIME_PATTERN: OnceLock<Regex> = OnceLock::new();

fn token_regex() -> &'static Regex {
    TOKEN_PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]*$").expect("Invalid regex for job tokens")
    })
}

/// Whether `value` is safe to place in a command line or job name.
pub fn is_valid_token(value: &str) -> bool {
    token_regex().is_match(value)
}

pub(crate) fn check_token(kind: &'static str, value: &str) -> Result<(), DispatchError> {
    if is_valid_token(value) {
        Ok(())
    } else {
        Err(DispatchError::InvalidToken {
            kind,
            value: value.to_string(),
        })
    }
}

/// Whether `value` looks like a scheduler walltime, e.g. `12:00:00` or `1-00:00:00`.
pub fn is_valid_walltime(value: &str) -> bool {
    WALLTIME_PATTERN
        .get_or_init(|| {
            Regex::new(r"^[0-9]+(-[0-9]+)?(:[0-9]+)*$").expect("Invalid regex for walltime")
        })
        .is_match(value)
}

pub(crate) fn check_walltime(value: &str) -> Result<(), DispatchError> {
    if is_valid_walltime(value) {
        Ok(())
    } else {
        Err(DispatchError::InvalidWalltime(value.to_string()))
    }
}

/// Quotes a string for POSIX sh.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// One step of a component rerun.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", content = "component", rename_all = "snake_case")]
pub enum CommandStep {
    /// Remove the component's previous output directory, if any.
    RemoveOutput(String),
    /// Release a lock left behind by a crashed run.
    Unlock(String),
    /// Run the component.
    Run(String),
}

impl CommandStep {
    pub fn component(&self) -> &str {
        match self {
            CommandStep::RemoveOutput(c) | CommandStep::Unlock(c) | CommandStep::Run(c) => c,
        }
    }
}

/// The composed command for one sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleCommand {
    pub sample: SampleRef,
    pub run_directory: PathBuf,
    /// Components in the order they run.
    pub components: Vec<String>,
    pub steps: Vec<CommandStep>,
    /// Shell text executing every step sequentially.
    pub text: String,
}

/// Composes rerun commands from staged requests.
#[derive(Debug, Clone)]
pub struct JobCommandBuilder {
    components_dir: PathBuf,
    shadow_prefix: String,
    restart_times: u32,
    cores: u32,
    sample_config: String,
    catalog: ComponentCatalog,
}

impl JobCommandBuilder {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            components_dir: config.components_dir(),
            shadow_prefix: config.shadow_prefix.clone(),
            restart_times: config.restart_times,
            cores: config.cores,
            sample_config: config.sample_config.clone(),
            catalog: ComponentCatalog::from_names(config.components.iter().cloned()),
        }
    }

    /// Path of a component's job definition.
    pub fn definition_path(&self, component: &str) -> PathBuf {
        self.components_dir.join(component).join(DEFINITION_FILE)
    }

    /// The three steps for one component, in execution order.
    pub fn steps_for(component: &str) -> [CommandStep; 3] {
        [
            CommandStep::RemoveOutput(component.to_string()),
            CommandStep::Unlock(component.to_string()),
            CommandStep::Run(component.to_string()),
        ]
    }

    /// Shell text of one step, terminated by `; `.
    pub fn render_step(&self, step: &CommandStep) -> String {
        match step {
            CommandStep::RemoveOutput(component) => {
                let dir = shell_quote(component);
                format!("if [ -d {dir} ]; then rm -r {dir}; fi; ")
            }
            CommandStep::Unlock(component) => format!("{} --unlock; ", self.snakemake(component)),
            CommandStep::Run(component) => format!("{}; ", self.snakemake(component)),
        }
    }

    fn snakemake(&self, component: &str) -> String {
        format!(
            "snakemake --shadow-prefix {} --restart-times {} --cores {} -s {} --config Sample={}",
            shell_quote(&self.shadow_prefix),
            self.restart_times,
            self.cores,
            shell_quote(&self.definition_path(component).to_string_lossy()),
            shell_quote(&self.sample_config),
        )
    }

    /// Composes the command for one sample.
    ///
    /// # Errors
    ///
    /// `UnknownComponent` for a component outside the catalog and
    /// `InvalidToken` for names that are unsafe to interpolate.
    pub fn build_sample(
        &self,
        sample: &SampleDoc,
        components: &[String],
    ) -> Result<SampleCommand, DispatchError> {
        check_token("sample name", &sample.name)?;
        if components.is_empty() {
            return Err(DispatchError::MalformedJobSpec {
                sample: sample.name.clone(),
                reason: "no components requested".to_string(),
            });
        }

        let mut steps = Vec::with_capacity(components.len() * 3);
        for component in components {
            if !self.catalog.contains(component) {
                return Err(DispatchError::UnknownComponent(component.clone()));
            }
            check_token("component", component)?;
            steps.extend(Self::steps_for(component));
        }

        let text: String = steps.iter().map(|step| self.render_step(step)).collect();
        debug!(
            "Composed {} steps for sample {}",
            steps.len(),
            sample.name
        );

        Ok(SampleCommand {
            sample: SampleRef::new(&sample.id, &sample.name),
            run_directory: sample.run_directory.clone(),
            components: components.to_vec(),
            steps,
            text,
        })
    }

    /// Composes commands for staged requests grouped by sample.
    ///
    /// Output follows the order of `requests`; every sample must be present
    /// in `samples`.
    pub fn build(
        &self,
        requests: &[(SampleRef, Vec<String>)],
        samples: &[SampleDoc],
    ) -> Result<Vec<SampleCommand>, DispatchError> {
        let by_id: HashMap<&str, &SampleDoc> = samples.iter().map(|s| (s.id.as_str(), s)).collect();

        requests
            .iter()
            .map(|(sample, components)| {
                let doc = by_id
                    .get(sample.id.as_str())
                    .ok_or_else(|| DispatchError::MissingSample(sample.id.clone()))?;
                self.build_sample(doc, components)
            })
            .collect()
    }
}

/// Scheduler resource parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceParams {
    pub memory_gb: Option<u32>,
    /// Partition (slurm) or queue priority.
    pub priority: Option<String>,
    pub threads: Option<u32>,
    pub walltime: Option<String>,
    pub reservation: Option<String>,
    /// Group and account (torque).
    pub group: Option<String>,
}

impl ResourceParams {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            memory_gb: config.memory_gb,
            priority: config.priority.clone(),
            threads: config.threads,
            walltime: config.walltime.clone(),
            reservation: config.reservation.clone(),
            group: config.group.clone(),
        }
    }
}

/// Everything needed to submit one sample's rerun.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridJobSpec {
    pub command: SampleCommand,
    pub resources: ResourceParams,
}

impl GridJobSpec {
    pub fn new(command: SampleCommand, resources: ResourceParams) -> Self {
        Self { command, resources }
    }

    pub fn sample_name(&self) -> &str {
        &self.command.sample.name
    }

    /// Scheduler job name.
    pub fn job_name(&self) -> String {
        format!("bifrost_{}", self.sample_name())
    }

    /// Unwraps a resource parameter the selected back-end needs.
    ///
    /// # Errors
    ///
    /// `MalformedJobSpec` naming `field` when the parameter is unset.
    pub fn required<'a, T>(&self, field: &str, value: &'a Option<T>) -> Result<&'a T, DispatchError> {
        value.as_ref().ok_or_else(|| DispatchError::MalformedJobSpec {
            sample: self.sample_name().to_string(),
            reason: format!("missing required resource parameter '{}'", field),
        })
    }
}
