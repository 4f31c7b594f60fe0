use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;
use std::time::Duration;

use chrono::Utc;
use derive_builder::Builder;

use crate::Map;
use crate::common::error::AutosegError;
use crate::platform::{ControlPlane, PlaneFuture};
use crate::workflow::compute::{ComputeClusterSpec, ComputeOperation, ComputeTier};
use crate::workflow::dataset::{DatasetAsset, DatasetRef};
use crate::workflow::job::{
    DEFAULT_EXPERIMENT_NAME, JobDescriptor, JobHandle, JobParams, JobStatus, TaskKind,
    TrialLimits,
};
use crate::workflow::plan::{JobSettings, WorkflowPlan};
use crate::workflow::session::{Credential, Workspace, WorkspaceId, WorkspaceInfo, connect};

pub const TEST_TOKEN: &str = "test-token";

pub fn test_credential() -> Credential {
    Credential::from_token(TEST_TOKEN)
}

pub fn test_workspace_id() -> WorkspaceId {
    WorkspaceId::new("00000000-0000-0000-0000-000000000000", "rg-taco", "ws-taco")
}

pub async fn connect_test_workspace(plane: &FakeControlPlane) -> Workspace {
    connect(plane, test_credential(), test_workspace_id())
        .await
        .unwrap()
}

pub fn taco_dataset() -> DatasetRef {
    DatasetRef::new("TACO-annotations", "1")
}

pub fn taco_cluster() -> ComputeClusterSpec {
    ComputeClusterSpec {
        name: "gpu-cluster".to_string(),
        vm_size: "STANDARD_NC8AS_T4_V3".to_string(),
        min_instances: 0,
        max_instances: 4,
        idle_timeout: Duration::from_secs(120),
        tier: ComputeTier::LowPriority,
    }
}

pub fn taco_job_params() -> JobParams {
    JobParams {
        task: TaskKind::ImageInstanceSegmentation,
        compute: "gpu-cluster".to_string(),
        training_data: Some(taco_dataset()),
        validation_split: 0.2,
        target_column: "label".to_string(),
        experiment_name: DEFAULT_EXPERIMENT_NAME.to_string(),
        display_name: None,
        primary_metric: None,
    }
}

#[derive(Builder)]
#[builder(pattern = "owned", build_fn(name = "finish"))]
pub struct Plan {
    #[builder(default)]
    workspace: Option<WorkspaceId>,
    #[builder(default = "taco_cluster()")]
    compute: ComputeClusterSpec,
    #[builder(default = "taco_dataset()")]
    dataset: DatasetRef,
    #[builder(default = "0.2")]
    validation_split: f64,
    #[builder(default = "8")]
    max_trials: u32,
    #[builder(default = "4")]
    max_concurrent_trials: u32,
    #[builder(default = "Some(Duration::from_secs(60 * 60))")]
    timeout: Option<Duration>,
}

impl PlanBuilder {
    /// Builds the plan without validating it, so that invalid plans can be tested.
    pub fn build(self) -> WorkflowPlan {
        let Plan {
            workspace,
            compute,
            dataset,
            validation_split,
            max_trials,
            max_concurrent_trials,
            timeout,
        } = self.finish().unwrap();
        WorkflowPlan {
            workspace,
            compute,
            dataset,
            job: JobSettings {
                task: TaskKind::ImageInstanceSegmentation,
                validation_split,
                target_column: "label".to_string(),
                experiment_name: DEFAULT_EXPERIMENT_NAME.to_string(),
                display_name: None,
                primary_metric: None,
            },
            limits: TrialLimits {
                max_trials,
                max_concurrent_trials,
                timeout,
            },
        }
    }
}

pub struct FakeState {
    /// Known workspaces, keyed by `WorkspaceId` display form.
    pub workspaces: Map<String, WorkspaceInfo>,
    pub datasets: Map<String, DatasetAsset>,
    pub clusters: Map<String, ComputeClusterSpec>,
    pub upsert_calls: Vec<ComputeClusterSpec>,
    pub submitted: Vec<(String, JobDescriptor)>,
    pub workspace_calls: usize,
    pub dataset_calls: usize,
    /// Maximum number of instances a cluster may scale to.
    pub compute_quota: Option<u32>,
    pub scheduler_down: bool,
}

impl Default for FakeState {
    fn default() -> Self {
        let id = test_workspace_id();
        let info = WorkspaceInfo {
            resource_id: format!(
                "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.MachineLearningServices/workspaces/{}",
                id.subscription_id, id.resource_group, id.workspace_name
            ),
            location: "westeurope".to_string(),
            discovery_url: None,
        };
        Self {
            workspaces: [(id.to_string(), info)].into_iter().collect(),
            datasets: Default::default(),
            clusters: Default::default(),
            upsert_calls: Default::default(),
            submitted: Default::default(),
            workspace_calls: 0,
            dataset_calls: 0,
            compute_quota: None,
            scheduler_down: false,
        }
    }
}

/// In-memory control plane. Clones share the same state.
#[derive(Clone, Default)]
pub struct FakeControlPlane {
    state: Rc<RefCell<FakeState>>,
}

impl FakeControlPlane {
    pub fn with_dataset(self, name: &str, version: &str) -> Self {
        let dataset = DatasetRef::new(name, version);
        let asset = DatasetAsset {
            asset_id: format!("/data/{name}/versions/{version}"),
            data_uri: format!("azureml://datastores/workspaceblobstore/paths/{name}/"),
            data_type: "mltable".to_string(),
            dataset: dataset.clone(),
        };
        self.state_mut().datasets.insert(dataset.to_string(), asset);
        self
    }

    pub fn state(&self) -> Ref<'_, FakeState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, FakeState> {
        self.state.borrow_mut()
    }
}

impl ControlPlane for FakeControlPlane {
    fn get_workspace(
        &self,
        credential: &Credential,
        id: &WorkspaceId,
    ) -> PlaneFuture<WorkspaceInfo> {
        let state = self.state.clone();
        let token = credential.token().to_string();
        let id = id.clone();
        Box::pin(async move {
            let mut state = state.borrow_mut();
            state.workspace_calls += 1;
            if token != TEST_TOKEN {
                return Err(AutosegError::AuthenticationError(
                    "token rejected".to_string(),
                ));
            }
            state.workspaces.get(&id.to_string()).cloned().ok_or_else(|| {
                AutosegError::ConfigurationError(format!("workspace {id} not found"))
            })
        })
    }

    fn upsert_compute(
        &self,
        _workspace: &Workspace,
        spec: &ComputeClusterSpec,
    ) -> PlaneFuture<ComputeOperation> {
        let state = self.state.clone();
        let spec = spec.clone();
        Box::pin(async move {
            let mut state = state.borrow_mut();
            state.upsert_calls.push(spec.clone());
            if let Some(quota) = state.compute_quota {
                if spec.max_instances > quota {
                    return Err(AutosegError::QuotaError(format!(
                        "{} instances requested, quota is {quota}",
                        spec.max_instances
                    )));
                }
            }
            let provisioning_state = if state.clusters.contains_key(&spec.name) {
                "Updating"
            } else {
                "Creating"
            };
            state.clusters.insert(spec.name.clone(), spec.clone());
            Ok(ComputeOperation {
                cluster_name: spec.name,
                provisioning_state: Some(provisioning_state.to_string()),
                operation_url: None,
            })
        })
    }

    fn get_dataset(
        &self,
        _workspace: &Workspace,
        dataset: &DatasetRef,
    ) -> PlaneFuture<DatasetAsset> {
        let state = self.state.clone();
        let dataset = dataset.clone();
        Box::pin(async move {
            let mut state = state.borrow_mut();
            state.dataset_calls += 1;
            state
                .datasets
                .get(&dataset.to_string())
                .cloned()
                .ok_or_else(|| AutosegError::NotFoundError(format!("dataset {dataset}")))
        })
    }

    fn submit_job(
        &self,
        workspace: &Workspace,
        job_name: &str,
        descriptor: &JobDescriptor,
    ) -> PlaneFuture<JobHandle> {
        let state = self.state.clone();
        let job_name = job_name.to_string();
        let descriptor = descriptor.clone();
        let resource_id = format!("{}/jobs/{job_name}", workspace.info().resource_id);
        Box::pin(async move {
            let mut state = state.borrow_mut();
            if state.scheduler_down {
                return Err(AutosegError::ServiceUnavailableError(
                    "scheduler is down".to_string(),
                ));
            }
            if state.submitted.iter().any(|(name, _)| *name == job_name) {
                return Err(AutosegError::SubmissionError(format!(
                    "job {job_name} already exists"
                )));
            }
            state.submitted.push((job_name.clone(), descriptor));
            let studio_url = format!("https://ml.azure.com/runs/{job_name}");
            Ok(JobHandle {
                id: job_name,
                resource_id: Some(resource_id),
                status: JobStatus::NotStarted,
                studio_url: Some(studio_url.clone()),
                services: [("Studio".to_string(), studio_url)].into_iter().collect(),
                submitted_at: Utc::now(),
            })
        })
    }
}
