use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use crate::client::globalsettings::GlobalSettings;
use crate::client::{connect_workspace, create_control_plane};
use crate::common::utils::fs::absolute_path;
use crate::workflow::plan::WorkflowPlan;
use crate::workflow::submit_workflow_job;

#[derive(Parser)]
pub struct JobOpts {
    #[clap(subcommand)]
    subcmd: JobCommand,
}

#[derive(Parser)]
enum JobCommand {
    /// Submit the job of a workflow file to an already provisioned cluster
    Submit(JobSubmitOpts),
}

#[derive(Parser)]
struct JobSubmitOpts {
    /// Path to a workflow file (TOML)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    file: PathBuf,
}

pub async fn command_job(gsettings: &GlobalSettings, opts: JobOpts) -> anyhow::Result<()> {
    match opts.subcmd {
        JobCommand::Submit(opts) => submit(gsettings, opts).await,
    }
}

async fn submit(gsettings: &GlobalSettings, opts: JobSubmitOpts) -> anyhow::Result<()> {
    let file = absolute_path(opts.file);
    log::debug!("Loading workflow file {}", file.display());
    let plan = WorkflowPlan::load(&file)
        .with_context(|| format!("Invalid workflow file {}", file.display()))?;
    let plane = create_control_plane(gsettings)?;
    let workspace = connect_workspace(gsettings, &plane, plan.workspace.clone()).await?;
    let (dataset, job) = submit_workflow_job(&plane, &workspace, &plan).await?;
    log::info!("Job uses dataset {}", dataset.asset_id);
    gsettings.printer().print_job_submitted(&job);
    Ok(())
}
