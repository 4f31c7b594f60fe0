//! Workflow definition files.
//!
//! A workflow file is a TOML document that describes the cluster, the dataset and the job
//! that should be submitted:
//!
//! ```toml
//! [compute]
//! name = "gpu-cluster"
//! vm_size = "STANDARD_NC8AS_T4_V3"
//! max_instances = 4
//! idle_timeout = "120s"
//! tier = "low-priority"
//!
//! [dataset]
//! name = "TACO-annotations"
//! version = "1"
//!
//! [job]
//! task = "image-instance-segmentation"
//! validation_split = 0.2
//! target_column = "label"
//!
//! [limits]
//! max_trials = 8
//! max_concurrent_trials = 4
//! timeout = "60m"
//! ```
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::common::error::AutosegError;
use crate::common::utils::num::checked_count;
use crate::workflow::compute::{ComputeClusterSpec, ComputeTier};
use crate::workflow::dataset::DatasetRef;
use crate::workflow::job::{
    DEFAULT_EXPERIMENT_NAME, DEFAULT_JOB_TIMEOUT, JobDescriptor, JobParams, PrimaryMetric,
    TaskKind, TrialLimits, build_job_descriptor,
};
use crate::workflow::session::WorkspaceId;

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

fn deserialize_human_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let buf = String::deserialize(deserializer)?;
    humantime::parse_duration(&buf).map_err(serde::de::Error::custom)
}

fn deserialize_human_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let buf = Option::<String>::deserialize(deserializer)?;

    if let Some(b) = buf {
        humantime::parse_duration(&b)
            .map(Some)
            .map_err(serde::de::Error::custom)
    } else {
        Ok(None)
    }
}

fn default_idle_timeout() -> Duration {
    DEFAULT_IDLE_TIMEOUT
}

fn default_tier() -> ComputeTier {
    ComputeTier::Dedicated
}

fn default_task() -> TaskKind {
    TaskKind::ImageInstanceSegmentation
}

fn default_experiment_name() -> String {
    DEFAULT_EXPERIMENT_NAME.to_string()
}

fn default_count() -> i64 {
    1
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct ComputeDef {
    pub name: String,
    pub vm_size: String,
    #[serde(default)]
    pub min_instances: i64,
    pub max_instances: i64,
    #[serde(
        default = "default_idle_timeout",
        deserialize_with = "deserialize_human_duration"
    )]
    pub idle_timeout: Duration,
    #[serde(default = "default_tier")]
    pub tier: ComputeTier,
}

impl ComputeDef {
    pub fn into_spec(self) -> crate::Result<ComputeClusterSpec> {
        let spec = ComputeClusterSpec {
            min_instances: checked_count("min_instances", self.min_instances)?,
            max_instances: checked_count("max_instances", self.max_instances)?,
            name: self.name,
            vm_size: self.vm_size,
            idle_timeout: self.idle_timeout,
            tier: self.tier,
        };
        spec.validate()?;
        Ok(spec)
    }
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceDef {
    pub subscription_id: String,
    pub resource_group: String,
    pub workspace_name: String,
}

impl From<WorkspaceDef> for WorkspaceId {
    fn from(def: WorkspaceDef) -> Self {
        WorkspaceId::new(def.subscription_id, def.resource_group, def.workspace_name)
    }
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct DatasetDef {
    pub name: String,
    pub version: String,
}

impl From<DatasetDef> for DatasetRef {
    fn from(def: DatasetDef) -> Self {
        DatasetRef::new(def.name, def.version)
    }
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct JobDef {
    #[serde(default = "default_task")]
    pub task: TaskKind,
    pub validation_split: f64,
    pub target_column: String,
    #[serde(default = "default_experiment_name")]
    pub experiment_name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub primary_metric: Option<PrimaryMetric>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct LimitsDef {
    #[serde(default = "default_count")]
    pub max_trials: i64,
    #[serde(default = "default_count")]
    pub max_concurrent_trials: i64,
    #[serde(default, deserialize_with = "deserialize_human_duration_opt")]
    pub timeout: Option<Duration>,
}

impl Default for LimitsDef {
    fn default() -> Self {
        Self {
            max_trials: default_count(),
            max_concurrent_trials: default_count(),
            timeout: None,
        }
    }
}

impl LimitsDef {
    pub fn into_limits(self) -> crate::Result<TrialLimits> {
        let limits = TrialLimits {
            max_trials: checked_count("max_trials", self.max_trials)?,
            max_concurrent_trials: checked_count(
                "max_concurrent_trials",
                self.max_concurrent_trials,
            )?,
            timeout: Some(self.timeout.unwrap_or(DEFAULT_JOB_TIMEOUT)),
        };
        limits.validate()?;
        Ok(limits)
    }
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct WorkflowDef {
    #[serde(default)]
    pub workspace: Option<WorkspaceDef>,
    pub compute: ComputeDef,
    pub dataset: DatasetDef,
    pub job: JobDef,
    #[serde(default)]
    pub limits: LimitsDef,
}

impl WorkflowDef {
    pub fn parse(content: &str) -> crate::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Job settings of a workflow. The compute target and training data are filled in
/// from the other workflow steps.
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub task: TaskKind,
    pub validation_split: f64,
    pub target_column: String,
    pub experiment_name: String,
    pub display_name: Option<String>,
    pub primary_metric: Option<PrimaryMetric>,
}

impl JobSettings {
    pub fn to_params(&self, compute: &str, training_data: Option<DatasetRef>) -> JobParams {
        JobParams {
            task: self.task,
            compute: compute.to_string(),
            training_data,
            validation_split: self.validation_split,
            target_column: self.target_column.clone(),
            experiment_name: self.experiment_name.clone(),
            display_name: self.display_name.clone(),
            primary_metric: self.primary_metric,
        }
    }
}

/// Validated workflow, ready to be executed.
#[derive(Debug, Clone)]
pub struct WorkflowPlan {
    /// Workspace from the workflow file, if it was specified there.
    pub workspace: Option<WorkspaceId>,
    pub compute: ComputeClusterSpec,
    pub dataset: DatasetRef,
    pub job: JobSettings,
    pub limits: TrialLimits,
}

impl WorkflowPlan {
    pub fn from_def(def: WorkflowDef) -> crate::Result<Self> {
        let WorkflowDef {
            workspace,
            compute,
            dataset,
            job,
            limits,
        } = def;

        let dataset = DatasetRef::from(dataset);
        dataset.validate()?;
        let plan = WorkflowPlan {
            workspace: workspace.map(WorkspaceId::from),
            compute: compute.into_spec()?,
            dataset,
            job: JobSettings {
                task: job.task,
                validation_split: job.validation_split,
                target_column: job.target_column,
                experiment_name: job.experiment_name,
                display_name: job.display_name,
                primary_metric: job.primary_metric,
            },
            limits: limits.into_limits()?,
        };
        // Catch descriptor errors before anything is sent to the platform
        plan.build_descriptor(plan.dataset.clone())?;
        Ok(plan)
    }

    pub fn parse(content: &str) -> crate::Result<Self> {
        Self::from_def(WorkflowDef::parse(content)?)
    }

    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AutosegError::ConfigurationError(format!(
                "Cannot read workflow file {}: {e}",
                path.display()
            ))
        })?;
        Self::parse(&content)
    }

    /// Builds the job descriptor of this workflow (including limits) for the given training data.
    pub fn build_descriptor(&self, training_data: DatasetRef) -> crate::Result<JobDescriptor> {
        let mut descriptor =
            build_job_descriptor(self.job.to_params(&self.compute.name, Some(training_data)))?;
        descriptor.set_limits(self.limits.clone())?;
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::common::error::AutosegError;
    use crate::workflow::compute::ComputeTier;
    use crate::workflow::dataset::DatasetRef;
    use crate::workflow::job::{DEFAULT_EXPERIMENT_NAME, PrimaryMetric, TaskKind};
    use crate::workflow::plan::WorkflowPlan;
    use crate::workflow::session::WorkspaceId;

    const TACO_WORKFLOW: &str = r#"
[workspace]
subscription_id = "00000000-0000-0000-0000-000000000000"
resource_group = "rg-taco"
workspace_name = "ws-taco"

[compute]
name = "gpu-cluster"
vm_size = "STANDARD_NC8AS_T4_V3"
min_instances = 0
max_instances = 4
idle_timeout = "120s"
tier = "low-priority"

[dataset]
name = "TACO-annotations"
version = "1"

[job]
task = "image-instance-segmentation"
validation_split = 0.2
target_column = "label"

[limits]
max_trials = 8
max_concurrent_trials = 4
timeout = "60m"
"#;

    #[test]
    fn parse_taco_workflow() {
        let plan = WorkflowPlan::parse(TACO_WORKFLOW).unwrap();
        assert_eq!(
            plan.workspace,
            Some(WorkspaceId::new(
                "00000000-0000-0000-0000-000000000000",
                "rg-taco",
                "ws-taco"
            ))
        );
        assert_eq!(plan.compute.name, "gpu-cluster");
        assert_eq!(plan.compute.vm_size, "STANDARD_NC8AS_T4_V3");
        assert_eq!(plan.compute.min_instances, 0);
        assert_eq!(plan.compute.max_instances, 4);
        assert_eq!(plan.compute.idle_timeout, Duration::from_secs(120));
        assert_eq!(plan.compute.tier, ComputeTier::LowPriority);
        assert_eq!(plan.dataset, DatasetRef::new("TACO-annotations", "1"));
        assert_eq!(plan.job.task, TaskKind::ImageInstanceSegmentation);
        assert_eq!(plan.job.validation_split, 0.2);
        assert_eq!(plan.job.target_column, "label");
        assert_eq!(plan.limits.max_trials, 8);
        assert_eq!(plan.limits.max_concurrent_trials, 4);
        assert_eq!(plan.limits.timeout, Some(Duration::from_secs(60 * 60)));
    }

    #[test]
    fn parse_minimal_workflow() {
        let plan = WorkflowPlan::parse(
            r#"
[compute]
name = "gpu-cluster"
vm_size = "STANDARD_NC6S_V3"
max_instances = 2

[dataset]
name = "images"
version = "3"

[job]
validation_split = 0.1
target_column = "label"
"#,
        )
        .unwrap();
        assert!(plan.workspace.is_none());
        assert_eq!(plan.compute.min_instances, 0);
        assert_eq!(plan.compute.tier, ComputeTier::Dedicated);
        assert_eq!(plan.compute.idle_timeout, Duration::from_secs(120));
        assert_eq!(plan.job.task, TaskKind::ImageInstanceSegmentation);
        assert_eq!(plan.job.experiment_name, DEFAULT_EXPERIMENT_NAME);
        assert_eq!(plan.limits.max_trials, 1);
        assert_eq!(plan.limits.max_concurrent_trials, 1);

        let descriptor = plan.build_descriptor(plan.dataset.clone()).unwrap();
        assert_eq!(descriptor.primary_metric, PrimaryMetric::MeanAveragePrecision);
        assert_eq!(descriptor.compute, "gpu-cluster");
    }

    #[test]
    fn negative_instance_count() {
        let content = TACO_WORKFLOW.replace("min_instances = 0", "min_instances = -1");
        assert!(matches!(
            WorkflowPlan::parse(&content),
            Err(AutosegError::ValidationError(_))
        ));
    }

    #[test]
    fn invalid_validation_split() {
        let content = TACO_WORKFLOW.replace("validation_split = 0.2", "validation_split = 1.0");
        assert!(matches!(
            WorkflowPlan::parse(&content),
            Err(AutosegError::ValidationError(_))
        ));
    }

    #[test]
    fn concurrency_above_trials() {
        let content = TACO_WORKFLOW.replace("max_trials = 8", "max_trials = 2");
        assert!(matches!(
            WorkflowPlan::parse(&content),
            Err(AutosegError::ValidationError(_))
        ));
    }

    #[test]
    fn unknown_field() {
        let content = TACO_WORKFLOW.replace("target_column", "target_colum");
        assert!(matches!(
            WorkflowPlan::parse(&content),
            Err(AutosegError::DeserializationError(_))
        ));
    }

    #[test]
    fn unknown_dataset_field() {
        let content = TACO_WORKFLOW.replace("version = \"1\"", "versoin = \"1\"");
        assert!(matches!(
            WorkflowPlan::parse(&content),
            Err(AutosegError::DeserializationError(_))
        ));
    }

    #[test]
    fn unknown_workspace_field() {
        let content = TACO_WORKFLOW.replace("resource_group = ", "resourcegroup = ");
        assert!(matches!(
            WorkflowPlan::parse(&content),
            Err(AutosegError::DeserializationError(_))
        ));
    }

    #[test]
    fn idle_timeout_below_second() {
        let content = TACO_WORKFLOW.replace("\"120s\"", "\"500ms\"");
        assert!(matches!(
            WorkflowPlan::parse(&content),
            Err(AutosegError::ValidationError(_))
        ));
    }

    #[test]
    fn invalid_duration() {
        let content = TACO_WORKFLOW.replace("\"120s\"", "\"soon\"");
        assert!(matches!(
            WorkflowPlan::parse(&content),
            Err(AutosegError::DeserializationError(_))
        ));
    }

    #[test]
    fn missing_file() {
        let result = WorkflowPlan::load(std::path::Path::new("/nonexistent/autoseg.toml"));
        assert!(matches!(result, Err(AutosegError::ConfigurationError(_))));
    }
}
