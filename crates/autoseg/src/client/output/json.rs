use serde::Serialize;
use serde_json::json;

use crate::client::output::outputs::Output;
use crate::platform::rest::PlannedRequest;
use crate::workflow::WorkflowOutcome;
use crate::workflow::compute::ComputeOperation;
use crate::workflow::dataset::DatasetAsset;
use crate::workflow::job::JobHandle;
use crate::workflow::session::WorkspaceId;

#[derive(Default)]
pub struct JsonOutput;

impl JsonOutput {
    fn print(&self, data: impl Serialize) {
        match serde_json::to_string_pretty(&data) {
            Ok(output) => println!("{output}"),
            Err(e) => log::error!("Cannot serialize output to JSON: {e}"),
        }
    }
}

impl Output for JsonOutput {
    fn print_workflow_outcome(&self, outcome: &WorkflowOutcome) {
        self.print(outcome);
    }

    fn print_dry_run(&self, workspace: &WorkspaceId, requests: &[PlannedRequest]) {
        self.print(json!({
            "workspace": workspace,
            "requests": requests,
        }));
    }

    fn print_compute_operation(&self, operation: &ComputeOperation) {
        self.print(operation);
    }

    fn print_dataset(&self, asset: &DatasetAsset) {
        self.print(asset);
    }

    fn print_job_submitted(&self, job: &JobHandle) {
        self.print(job);
    }

    fn print_error(&self, error: anyhow::Error) {
        self.print(json!({
            "error": format!("{error:?}"),
        }));
    }
}
