use crate::platform::rest::PlannedRequest;
use crate::workflow::WorkflowOutcome;
use crate::workflow::compute::ComputeOperation;
use crate::workflow::dataset::DatasetAsset;
use crate::workflow::job::JobHandle;
use crate::workflow::session::WorkspaceId;

#[allow(clippy::upper_case_acronyms)]
#[derive(clap::ValueEnum, Clone)]
pub enum Outputs {
    CLI,
    JSON,
    Quiet,
}

pub trait Output {
    // Workflow
    fn print_workflow_outcome(&self, outcome: &WorkflowOutcome);
    fn print_dry_run(&self, workspace: &WorkspaceId, requests: &[PlannedRequest]);

    // Compute
    fn print_compute_operation(&self, operation: &ComputeOperation);

    // Datasets
    fn print_dataset(&self, asset: &DatasetAsset);

    // Jobs
    fn print_job_submitted(&self, job: &JobHandle);

    fn print_error(&self, error: anyhow::Error);
}
