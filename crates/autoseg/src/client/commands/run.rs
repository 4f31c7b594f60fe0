use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use crate::client::globalsettings::GlobalSettings;
use crate::client::{create_control_plane, get_credential, resolve_workspace_id};
use crate::common::utils::fs::absolute_path;
use crate::workflow::job::{DEFAULT_JOB_NAME_PREFIX, generate_job_name};
use crate::workflow::plan::WorkflowPlan;
use crate::workflow::run_workflow;

#[derive(Parser)]
pub struct RunOpts {
    /// Path to a workflow file (TOML)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub file: PathBuf,

    /// Validate the workflow and print the requests that would be sent, without contacting
    /// the platform
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn command_run(gsettings: &GlobalSettings, opts: RunOpts) -> anyhow::Result<()> {
    let file = absolute_path(opts.file);
    log::debug!("Loading workflow file {}", file.display());
    let plan = WorkflowPlan::load(&file)
        .with_context(|| format!("Invalid workflow file {}", file.display()))?;
    let plane = create_control_plane(gsettings)?;
    let workspace_id = resolve_workspace_id(gsettings, plan.workspace.clone())?;

    if opts.dry_run {
        let job_name = generate_job_name(DEFAULT_JOB_NAME_PREFIX);
        let requests = plane.plan_requests(&workspace_id, &plan, &job_name)?;
        gsettings.printer().print_dry_run(&workspace_id, &requests);
        return Ok(());
    }

    let credential = get_credential(&plane).await?;
    let outcome = run_workflow(&plane, credential, workspace_id, &plan).await?;
    gsettings.printer().print_workflow_outcome(&outcome);
    Ok(())
}
