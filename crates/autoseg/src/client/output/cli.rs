use cli_table::format::Separator;
use cli_table::{Cell, CellStruct, Color, ColorChoice, Style, Table, TableStruct, print_stdout};

use chrono::{DateTime, Local, Utc};
use colored::Colorize;
use humantime::format_duration;

use crate::client::output::outputs::Output;
use crate::common::utils::str::pluralize;
use crate::platform::rest::PlannedRequest;
use crate::workflow::WorkflowOutcome;
use crate::workflow::compute::ComputeOperation;
use crate::workflow::dataset::DatasetAsset;
use crate::workflow::job::{JobHandle, JobStatus};
use crate::workflow::session::WorkspaceId;

pub struct CliOutput {
    color_policy: ColorChoice,
}

impl CliOutput {
    pub fn new(color_policy: ColorChoice) -> CliOutput {
        CliOutput { color_policy }
    }

    fn print_vertical_table(&self, rows: Vec<Vec<CellStruct>>) {
        let table = rows.table().separator(
            Separator::builder()
                .column(Some(Default::default()))
                .build(),
        );
        self.print_table(table);
    }

    fn print_table(&self, table: TableStruct) {
        let table = table.color_choice(self.color_policy);
        if let Err(e) = print_stdout(table) {
            log::error!("Cannot print table to stdout: {e:?}");
        }
    }

    fn compute_rows(&self, operation: &ComputeOperation) -> Vec<Vec<CellStruct>> {
        vec![
            vec![
                "Cluster".cell().bold(true),
                operation.cluster_name.as_str().cell(),
            ],
            vec![
                "Provisioning state".cell().bold(true),
                optional_cell(operation.provisioning_state.as_deref()),
            ],
            vec![
                "Operation".cell().bold(true),
                optional_cell(operation.operation_url.as_deref()),
            ],
        ]
    }

    fn dataset_rows(&self, asset: &DatasetAsset) -> Vec<Vec<CellStruct>> {
        vec![
            vec!["Dataset".cell().bold(true), asset.dataset.to_string().cell()],
            vec!["Type".cell().bold(true), asset.data_type.as_str().cell()],
            vec!["Data URI".cell().bold(true), asset.data_uri.as_str().cell()],
            vec!["Asset ID".cell().bold(true), asset.asset_id.as_str().cell()],
        ]
    }

    fn job_rows(&self, job: &JobHandle) -> Vec<Vec<CellStruct>> {
        vec![
            vec!["Job".cell().bold(true), job.id.as_str().cell()],
            vec!["Status".cell().bold(true), job_status_to_cell(&job.status)],
            vec![
                "Submitted".cell().bold(true),
                format_datetime(job.submitted_at).cell(),
            ],
            vec![
                "Studio".cell().bold(true),
                optional_cell(job.studio_url.as_deref()),
            ],
        ]
    }

    fn print_job_summary(&self, job: &JobHandle) {
        println!(
            "Job submitted {}, job name: {}",
            "successfully".color(colored::Color::Green),
            job.id
        );
        if let Some(url) = &job.studio_url {
            println!("Track the job at {url}");
        }
    }
}

impl Output for CliOutput {
    fn print_workflow_outcome(&self, outcome: &WorkflowOutcome) {
        let mut rows = vec![
            vec![
                "Workspace".cell().bold(true),
                outcome.workspace.resource_id.as_str().cell(),
            ],
            vec![
                "Location".cell().bold(true),
                outcome.workspace.location.as_str().cell(),
            ],
        ];
        rows.extend(self.compute_rows(&outcome.compute));
        rows.extend(self.dataset_rows(&outcome.dataset));
        rows.extend(self.job_rows(&outcome.job));
        self.print_vertical_table(rows);
        self.print_job_summary(&outcome.job);
    }

    fn print_dry_run(&self, workspace: &WorkspaceId, requests: &[PlannedRequest]) {
        println!(
            "Dry run for workspace {}, {} {} would be sent:",
            workspace.to_string().bold(),
            requests.len(),
            pluralize("request", requests.len())
        );
        for request in requests {
            println!();
            println!("{} {}", request.method.bold(), request.url);
            if let Some(body) = &request.body {
                match serde_json::to_string_pretty(body) {
                    Ok(body) => println!("{body}"),
                    Err(e) => log::error!("Cannot format request body: {e}"),
                }
            }
        }
    }

    fn print_compute_operation(&self, operation: &ComputeOperation) {
        self.print_vertical_table(self.compute_rows(operation));
    }

    fn print_dataset(&self, asset: &DatasetAsset) {
        self.print_vertical_table(self.dataset_rows(asset));
    }

    fn print_job_submitted(&self, job: &JobHandle) {
        self.print_vertical_table(self.job_rows(job));
        self.print_job_summary(job);
    }

    fn print_error(&self, error: anyhow::Error) {
        eprintln!("{error:?}");
    }
}

fn optional_cell(value: Option<&str>) -> CellStruct {
    value.unwrap_or("N/A").cell()
}

fn job_status_to_cell(status: &JobStatus) -> CellStruct {
    let cell = format!("{status:?}").cell();
    match status {
        JobStatus::NotStarted | JobStatus::Queued => cell.foreground_color(Some(Color::Cyan)),
        JobStatus::Starting
        | JobStatus::Provisioning
        | JobStatus::Preparing
        | JobStatus::Running
        | JobStatus::Finalizing => cell.foreground_color(Some(Color::Yellow)),
        JobStatus::Completed => cell.foreground_color(Some(Color::Green)),
        JobStatus::Failed | JobStatus::NotResponding => cell.foreground_color(Some(Color::Red)),
        JobStatus::CancelRequested | JobStatus::Canceled | JobStatus::Paused => {
            cell.foreground_color(Some(Color::Magenta))
        }
        JobStatus::Unknown => cell,
    }
}

fn format_datetime(time: DateTime<Utc>) -> String {
    let local: DateTime<Local> = time.into();
    let elapsed = (Utc::now() - time).to_std().unwrap_or_default();
    format!(
        "{} ({} ago)",
        local.format("%d.%m.%Y %H:%M:%S"),
        format_duration(std::time::Duration::from_secs(elapsed.as_secs()))
    )
}
