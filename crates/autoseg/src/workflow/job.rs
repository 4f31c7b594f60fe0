use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Map;
use crate::common::error::{AutosegError, validation_error};
use crate::common::utils::str::non_blank;
use crate::common::utils::time::whole_minutes;
use crate::platform::ControlPlane;
use crate::workflow::dataset::DatasetRef;
use crate::workflow::session::Workspace;

pub const DEFAULT_EXPERIMENT_NAME: &str = "automl-image-instance-segmentation";
pub const DEFAULT_JOB_NAME_PREFIX: &str = "autoseg";
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    ImageInstanceSegmentation,
    ImageObjectDetection,
    ImageClassification,
    ImageClassificationMultilabel,
}

impl TaskKind {
    /// Name of the task type in job requests.
    pub fn wire_name(&self) -> &'static str {
        match self {
            TaskKind::ImageInstanceSegmentation => "ImageInstanceSegmentation",
            TaskKind::ImageObjectDetection => "ImageObjectDetection",
            TaskKind::ImageClassification => "ImageClassification",
            TaskKind::ImageClassificationMultilabel => "ImageClassificationMultilabel",
        }
    }

    pub fn default_metric(&self) -> PrimaryMetric {
        match self {
            TaskKind::ImageInstanceSegmentation | TaskKind::ImageObjectDetection => {
                PrimaryMetric::MeanAveragePrecision
            }
            TaskKind::ImageClassification => PrimaryMetric::Accuracy,
            TaskKind::ImageClassificationMultilabel => PrimaryMetric::Iou,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrimaryMetric {
    MeanAveragePrecision,
    Accuracy,
    Iou,
}

impl PrimaryMetric {
    pub fn wire_name(&self) -> &'static str {
        match self {
            PrimaryMetric::MeanAveragePrecision => "MeanAveragePrecision",
            PrimaryMetric::Accuracy => "Accuracy",
            PrimaryMetric::Iou => "IOU",
        }
    }

    fn is_supported_by(&self, task: TaskKind) -> bool {
        match task {
            TaskKind::ImageInstanceSegmentation | TaskKind::ImageObjectDetection => {
                matches!(self, PrimaryMetric::MeanAveragePrecision)
            }
            TaskKind::ImageClassification => matches!(self, PrimaryMetric::Accuracy),
            TaskKind::ImageClassificationMultilabel => {
                matches!(self, PrimaryMetric::Accuracy | PrimaryMetric::Iou)
            }
        }
    }
}

/// Bounds of the model search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialLimits {
    pub max_trials: u32,
    pub max_concurrent_trials: u32,
    /// Timeout of the whole job, enforced by the remote scheduler (whole minutes).
    pub timeout: Option<Duration>,
}

impl Default for TrialLimits {
    fn default() -> Self {
        Self {
            max_trials: 1,
            max_concurrent_trials: 1,
            timeout: Some(DEFAULT_JOB_TIMEOUT),
        }
    }
}

impl TrialLimits {
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_concurrent_trials < 1 {
            return validation_error("max_concurrent_trials must be at least 1");
        }
        if self.max_trials < self.max_concurrent_trials {
            return validation_error(format!(
                "max_trials ({}) must not be smaller than max_concurrent_trials ({})",
                self.max_trials, self.max_concurrent_trials
            ));
        }
        if let Some(timeout) = self.timeout {
            if whole_minutes(timeout) == 0 {
                return validation_error("job timeout must be at least one minute");
            }
        }
        Ok(())
    }
}

/// Inputs of [`build_job_descriptor`].
#[derive(Debug, Clone)]
pub struct JobParams {
    pub task: TaskKind,
    pub compute: String,
    pub training_data: Option<DatasetRef>,
    pub validation_split: f64,
    pub target_column: String,
    pub experiment_name: String,
    pub display_name: Option<String>,
    pub primary_metric: Option<PrimaryMetric>,
}

/// Declarative specification of an AutoML job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub task: TaskKind,
    /// Name of the compute cluster the trials run on.
    pub compute: String,
    pub training_data: DatasetRef,
    /// Fraction of the training data held out for validation, in (0, 1).
    pub validation_split: f64,
    pub target_column: String,
    pub experiment_name: String,
    pub display_name: Option<String>,
    pub primary_metric: PrimaryMetric,
    pub limits: TrialLimits,
}

impl JobDescriptor {
    pub fn validate(&self) -> crate::Result<()> {
        if non_blank(&self.compute).is_none() {
            return validation_error("job compute target is empty");
        }
        self.training_data.validate()?;
        // Negated comparison also rejects NaN
        if !(self.validation_split > 0.0 && self.validation_split < 1.0) {
            return validation_error(format!(
                "validation_split must be in the open interval (0, 1), got {}",
                self.validation_split
            ));
        }
        if non_blank(&self.target_column).is_none() {
            return validation_error("target column name is empty");
        }
        if non_blank(&self.experiment_name).is_none() {
            return validation_error("experiment name is empty");
        }
        if !self.primary_metric.is_supported_by(self.task) {
            return validation_error(format!(
                "primary metric {} cannot be used with task {}",
                self.primary_metric.wire_name(),
                self.task.wire_name()
            ));
        }
        self.limits.validate()
    }

    /// Replaces the trial/concurrency bounds of the job.
    pub fn set_limits(&mut self, limits: TrialLimits) -> crate::Result<()> {
        limits.validate()?;
        self.limits = limits;
        Ok(())
    }
}

/// Assembles a job descriptor. Pure, no remote call is made.
pub fn build_job_descriptor(params: JobParams) -> crate::Result<JobDescriptor> {
    let JobParams {
        task,
        compute,
        training_data,
        validation_split,
        target_column,
        experiment_name,
        display_name,
        primary_metric,
    } = params;

    let Some(training_data) = training_data else {
        return validation_error("job has no training data");
    };
    let descriptor = JobDescriptor {
        task,
        compute,
        training_data,
        validation_split,
        target_column,
        experiment_name,
        display_name,
        primary_metric: primary_metric.unwrap_or_else(|| task.default_metric()),
        limits: TrialLimits::default(),
    };
    descriptor.validate()?;
    Ok(descriptor)
}

/// Generates a fresh job name. Every submission gets a new name, so re-running a workflow
/// always creates a new job.
pub fn generate_job_name(prefix: &str) -> String {
    let suffix: [u8; 8] = rand::random();
    format!("{prefix}_{}", hex::encode(suffix))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    NotStarted,
    Starting,
    Provisioning,
    Preparing,
    Queued,
    Running,
    Finalizing,
    CancelRequested,
    Completed,
    Failed,
    Canceled,
    NotResponding,
    Paused,
    #[serde(other)]
    Unknown,
}

/// Tracking handle of a submitted job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHandle {
    /// Name of the job, unique in the workspace.
    pub id: String,
    pub resource_id: Option<String>,
    pub status: JobStatus,
    /// Link to the job in the platform web UI.
    pub studio_url: Option<String>,
    /// Tracking endpoints by service name.
    pub services: Map<String, String>,
    pub submitted_at: DateTime<Utc>,
}

/// Sends the descriptor to the remote scheduler and waits until the submission is acknowledged
/// (not until the job finishes).
pub async fn submit_job(
    plane: &dyn ControlPlane,
    workspace: &Workspace,
    job_name: &str,
    descriptor: &JobDescriptor,
) -> crate::Result<JobHandle> {
    if non_blank(job_name).is_none() {
        return Err(AutosegError::SubmissionError("job name is empty".to_string()));
    }
    descriptor
        .validate()
        .map_err(|e| AutosegError::SubmissionError(format!("malformed job descriptor: {e}")))?;

    log::info!(
        "Submitting job {job_name} ({}, {} trials, {} concurrent) to {}",
        descriptor.task.wire_name(),
        descriptor.limits.max_trials,
        descriptor.limits.max_concurrent_trials,
        descriptor.compute
    );
    let handle = plane.submit_job(workspace, job_name, descriptor).await?;
    log::info!("Job {} submitted ({:?})", handle.id, handle.status);
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::common::error::AutosegError;
    use crate::tests::utils::{FakeControlPlane, connect_test_workspace, taco_job_params};
    use crate::workflow::job::{
        JobStatus, PrimaryMetric, TaskKind, TrialLimits, build_job_descriptor, generate_job_name,
        submit_job,
    };

    #[test]
    fn build_taco_descriptor() {
        let descriptor = build_job_descriptor(taco_job_params()).unwrap();
        assert_eq!(descriptor.task, TaskKind::ImageInstanceSegmentation);
        assert_eq!(descriptor.validation_split, 0.2);
        assert_eq!(descriptor.target_column, "label");
        assert_eq!(descriptor.primary_metric, PrimaryMetric::MeanAveragePrecision);
        assert_eq!(descriptor.limits, TrialLimits::default());
    }

    #[test]
    fn validation_split_out_of_range() {
        for split in [0.0, 1.0, -0.1, 1.5, f64::NAN, f64::INFINITY] {
            let mut params = taco_job_params();
            params.validation_split = split;
            assert!(
                matches!(
                    build_job_descriptor(params),
                    Err(AutosegError::ValidationError(_))
                ),
                "split {split} should be rejected"
            );
        }
    }

    #[test]
    fn missing_required_fields() {
        let mut params = taco_job_params();
        params.training_data = None;
        assert!(matches!(
            build_job_descriptor(params),
            Err(AutosegError::ValidationError(_))
        ));

        let mut params = taco_job_params();
        params.target_column = "".to_string();
        assert!(matches!(
            build_job_descriptor(params),
            Err(AutosegError::ValidationError(_))
        ));

        let mut params = taco_job_params();
        params.compute = " ".to_string();
        assert!(matches!(
            build_job_descriptor(params),
            Err(AutosegError::ValidationError(_))
        ));
    }

    #[test]
    fn unsupported_metric() {
        let mut params = taco_job_params();
        params.primary_metric = Some(PrimaryMetric::Accuracy);
        assert!(matches!(
            build_job_descriptor(params),
            Err(AutosegError::ValidationError(_))
        ));
    }

    #[test]
    fn set_limits() {
        let mut descriptor = build_job_descriptor(taco_job_params()).unwrap();
        let limits = TrialLimits {
            max_trials: 8,
            max_concurrent_trials: 4,
            timeout: Some(Duration::from_secs(120 * 60)),
        };
        descriptor.set_limits(limits.clone()).unwrap();
        assert_eq!(descriptor.limits, limits);
    }

    #[test]
    fn set_limits_concurrency_above_trials() {
        let mut descriptor = build_job_descriptor(taco_job_params()).unwrap();
        let result = descriptor.set_limits(TrialLimits {
            max_trials: 2,
            max_concurrent_trials: 4,
            timeout: None,
        });
        assert!(matches!(result, Err(AutosegError::ValidationError(_))));
        assert_eq!(descriptor.limits, TrialLimits::default());
    }

    #[test]
    fn set_limits_zero_concurrency() {
        let mut descriptor = build_job_descriptor(taco_job_params()).unwrap();
        let result = descriptor.set_limits(TrialLimits {
            max_trials: 2,
            max_concurrent_trials: 0,
            timeout: None,
        });
        assert!(matches!(result, Err(AutosegError::ValidationError(_))));
    }

    #[test]
    fn set_limits_zero_timeout() {
        let mut descriptor = build_job_descriptor(taco_job_params()).unwrap();
        let result = descriptor.set_limits(TrialLimits {
            max_trials: 2,
            max_concurrent_trials: 1,
            timeout: Some(Duration::ZERO),
        });
        assert!(matches!(result, Err(AutosegError::ValidationError(_))));
    }

    #[test]
    fn job_names_are_unique() {
        let a = generate_job_name("autoseg");
        let b = generate_job_name("autoseg");
        assert!(a.starts_with("autoseg_"));
        assert_eq!(a.len(), "autoseg_".len() + 16);
        assert_ne!(a, b);
    }

    #[test]
    fn parse_unknown_status() {
        let status: JobStatus = serde_json::from_str("\"Running\"").unwrap();
        assert_eq!(status, JobStatus::Running);
        let status: JobStatus = serde_json::from_str("\"SomethingNew\"").unwrap();
        assert_eq!(status, JobStatus::Unknown);
    }

    #[tokio::test]
    async fn submit_returns_handle() {
        let plane = FakeControlPlane::default();
        let workspace = connect_test_workspace(&plane).await;
        let descriptor = build_job_descriptor(taco_job_params()).unwrap();
        let handle = submit_job(&plane, &workspace, "autoseg_0001", &descriptor)
            .await
            .unwrap();
        assert_eq!(handle.id, "autoseg_0001");
        assert_eq!(handle.status, JobStatus::NotStarted);
        assert_eq!(plane.state().submitted.len(), 1);
    }

    #[tokio::test]
    async fn submit_malformed_descriptor() {
        let plane = FakeControlPlane::default();
        let workspace = connect_test_workspace(&plane).await;
        let mut descriptor = build_job_descriptor(taco_job_params()).unwrap();
        descriptor.validation_split = 3.0;
        let result = submit_job(&plane, &workspace, "autoseg_0001", &descriptor).await;
        assert!(matches!(result, Err(AutosegError::SubmissionError(_))));
        assert!(plane.state().submitted.is_empty());
    }

    #[tokio::test]
    async fn submit_service_unavailable() {
        let plane = FakeControlPlane::default();
        let workspace = connect_test_workspace(&plane).await;
        plane.state_mut().scheduler_down = true;
        let descriptor = build_job_descriptor(taco_job_params()).unwrap();
        let result = submit_job(&plane, &workspace, "autoseg_0001", &descriptor).await;
        assert!(matches!(
            result,
            Err(AutosegError::ServiceUnavailableError(_))
        ));
    }
}
