//! The provisioning and submission workflow.
//!
//! The workflow is a strictly sequential chain of steps: connect to the workspace, provision
//! the compute cluster, resolve the training dataset, build the job descriptor, set its limits
//! and submit it. Each remote step is a single request to a [`ControlPlane`]; any error aborts
//! the remaining steps and is returned unmodified. Nothing is retried.
pub mod compute;
pub mod dataset;
pub mod job;
pub mod plan;
pub mod session;

use serde::Serialize;

use crate::platform::ControlPlane;
use crate::workflow::compute::{ComputeClusterSpec, ComputeOperation, provision_cluster};
use crate::workflow::dataset::{DatasetAsset, resolve_dataset};
use crate::workflow::job::{
    DEFAULT_JOB_NAME_PREFIX, JobHandle, TrialLimits, generate_job_name, submit_job,
};
use crate::workflow::plan::WorkflowPlan;
use crate::workflow::session::{Credential, Workspace, WorkspaceId, WorkspaceInfo, connect};

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowOutcome {
    pub workspace: WorkspaceInfo,
    pub compute: ComputeOperation,
    pub dataset: DatasetAsset,
    pub job: JobHandle,
}

/// Runs the whole workflow. The plan is checked before the first remote call.
pub async fn run_workflow(
    plane: &dyn ControlPlane,
    credential: Credential,
    workspace_id: WorkspaceId,
    plan: &WorkflowPlan,
) -> crate::Result<WorkflowOutcome> {
    plan.compute.validate()?;
    plan.build_descriptor(plan.dataset.clone())?;

    let workspace = connect(plane, credential, workspace_id).await?;
    let compute = provision_cluster(plane, &workspace, &plan.compute).await?;
    let (dataset, job) = submit_workflow_job(plane, &workspace, plan).await?;
    Ok(WorkflowOutcome {
        workspace: workspace.info().clone(),
        compute,
        dataset,
        job,
    })
}

/// Resolves the dataset of the workflow and submits its job to an already provisioned cluster.
pub async fn submit_workflow_job(
    plane: &dyn ControlPlane,
    workspace: &Workspace,
    plan: &WorkflowPlan,
) -> crate::Result<(DatasetAsset, JobHandle)> {
    plan.build_descriptor(plan.dataset.clone())?;

    let dataset = resolve_dataset(plane, workspace, &plan.dataset).await?;
    let descriptor = plan.build_descriptor(dataset.dataset.clone())?;
    check_parallelism(&plan.compute, &descriptor.limits);

    let job_name = generate_job_name(DEFAULT_JOB_NAME_PREFIX);
    let job = submit_job(plane, workspace, &job_name, &descriptor).await?;
    Ok((dataset, job))
}

/// Concurrent trials above the cluster size cannot run in parallel. This is only reported,
/// the job is submitted anyway.
pub fn check_parallelism(cluster: &ComputeClusterSpec, limits: &TrialLimits) -> bool {
    if limits.max_concurrent_trials > cluster.max_instances {
        log::warn!(
            "max_concurrent_trials ({}) is larger than max_instances ({}) of cluster {}, only {} trials can run at once",
            limits.max_concurrent_trials,
            cluster.max_instances,
            cluster.name,
            cluster.max_instances
        );
        false
    } else {
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::workflow::check_parallelism;
    use crate::workflow::job::TrialLimits;
    use crate::tests::utils::taco_cluster;

    #[test]
    fn parallelism_within_cluster() {
        let limits = TrialLimits {
            max_trials: 8,
            max_concurrent_trials: 4,
            timeout: None,
        };
        assert!(check_parallelism(&taco_cluster(), &limits));
    }

    #[test]
    fn parallelism_above_cluster() {
        let limits = TrialLimits {
            max_trials: 8,
            max_concurrent_trials: 8,
            timeout: None,
        };
        assert!(!check_parallelism(&taco_cluster(), &limits));
    }
}
