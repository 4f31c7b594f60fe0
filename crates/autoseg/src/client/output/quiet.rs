use crate::client::output::outputs::Output;
use crate::platform::rest::PlannedRequest;
use crate::workflow::WorkflowOutcome;
use crate::workflow::compute::ComputeOperation;
use crate::workflow::dataset::DatasetAsset;
use crate::workflow::job::JobHandle;
use crate::workflow::session::WorkspaceId;

#[derive(Default)]
pub struct Quiet;

impl Output for Quiet {
    // Workflow
    fn print_workflow_outcome(&self, outcome: &WorkflowOutcome) {
        println!("{}", outcome.job.id)
    }
    fn print_dry_run(&self, _workspace: &WorkspaceId, _requests: &[PlannedRequest]) {}

    // Compute
    fn print_compute_operation(&self, operation: &ComputeOperation) {
        println!(
            "{} {}",
            operation.cluster_name,
            operation.provisioning_state.as_deref().unwrap_or("UNKNOWN")
        )
    }

    // Datasets
    fn print_dataset(&self, asset: &DatasetAsset) {
        println!("{}", asset.asset_id)
    }

    // Jobs
    fn print_job_submitted(&self, job: &JobHandle) {
        println!("{}", job.id)
    }

    fn print_error(&self, error: anyhow::Error) {
        eprintln!("{error:?}");
    }
}
