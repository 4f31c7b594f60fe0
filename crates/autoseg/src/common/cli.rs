use clap::Parser;
use clap_complete::Shell;

use crate::client::commands::compute::ComputeOpts;
use crate::client::commands::dataset::DatasetOpts;
use crate::client::commands::job::JobOpts;
use crate::client::commands::run::RunOpts;
use crate::client::output::outputs::Outputs;
use crate::platform::config::{DEFAULT_API_VERSION, DEFAULT_ENDPOINT};
use crate::workflow::session::WorkspaceOverrides;

#[derive(clap::ValueEnum, Clone)]
pub enum ColorPolicy {
    /// Use colors if the stdout is detected to be a terminal.
    Auto,
    /// Always use colors.
    Always,
    /// Never use colors.
    Never,
}

// Workspace selection
#[derive(Parser)]
pub struct WorkspaceOpts {
    /// Subscription that contains the workspace
    #[arg(
        long,
        env = "AUTOSEG_SUBSCRIPTION_ID",
        global = true,
        help_heading("WORKSPACE OPTIONS")
    )]
    pub subscription_id: Option<String>,

    /// Resource group that contains the workspace
    #[arg(
        long,
        env = "AUTOSEG_RESOURCE_GROUP",
        global = true,
        help_heading("WORKSPACE OPTIONS")
    )]
    pub resource_group: Option<String>,

    /// Name of the workspace
    #[arg(
        long = "workspace",
        env = "AUTOSEG_WORKSPACE",
        global = true,
        help_heading("WORKSPACE OPTIONS")
    )]
    pub workspace_name: Option<String>,
}

impl From<WorkspaceOpts> for WorkspaceOverrides {
    fn from(opts: WorkspaceOpts) -> Self {
        WorkspaceOverrides {
            subscription_id: opts.subscription_id,
            resource_group: opts.resource_group,
            workspace_name: opts.workspace_name,
        }
    }
}

// Common CLI options
#[derive(Parser)]
pub struct CommonOpts {
    /// Sets console color policy
    #[arg(
        long,
        default_value_t = ColorPolicy::Auto,
        value_enum,
        global = true,
        help_heading("GLOBAL OPTIONS"),
        hide_short_help(true)
    )]
    pub colors: ColorPolicy,

    /// Sets output formatting
    #[arg(
        long,
        env = "AUTOSEG_OUTPUT_MODE",
        default_value_t = Outputs::CLI,
        value_enum,
        global = true,
        help_heading("GLOBAL OPTIONS"),
        hide_short_help(true)
    )]
    pub output_mode: Outputs,

    /// Enables more detailed log output
    #[arg(
        long,
        env = "AUTOSEG_DEBUG",
        global = true,
        help_heading("GLOBAL OPTIONS"),
        hide_short_help(true)
    )]
    pub debug: bool,

    /// Resource manager endpoint of the platform
    #[arg(
        long,
        env = "AUTOSEG_ENDPOINT",
        default_value = DEFAULT_ENDPOINT,
        global = true,
        help_heading("GLOBAL OPTIONS"),
        hide_short_help(true)
    )]
    pub endpoint: String,

    /// API version used for control plane requests
    #[arg(
        long,
        env = "AUTOSEG_API_VERSION",
        default_value = DEFAULT_API_VERSION,
        global = true,
        help_heading("GLOBAL OPTIONS"),
        hide_short_help(true)
    )]
    pub api_version: String,

    #[clap(flatten)]
    pub workspace: WorkspaceOpts,
}

// Root CLI options
#[derive(Parser)]
#[command(
    author,
    about,
    version(crate::AUTOSEG_VERSION),
    disable_help_subcommand(true),
    help_expected(true)
)]
pub struct RootOptions {
    #[clap(flatten)]
    pub common: CommonOpts,

    #[clap(subcommand)]
    pub subcmd: SubCommand,
}

#[derive(Parser)]
pub enum SubCommand {
    /// Run the whole workflow described by a workflow file
    ///
    /// Connects to the workspace, provisions the compute cluster, resolves the dataset and
    /// submits the AutoML job.
    Run(RunOpts),
    /// Commands for compute clusters
    Compute(ComputeOpts),
    /// Commands for datasets
    Dataset(DatasetOpts),
    /// Commands for jobs
    Job(JobOpts),
    /// Generate shell completion script
    GenerateCompletion(GenerateCompletionOpts),
}

#[derive(Parser)]
pub struct GenerateCompletionOpts {
    /// Shell flavour for which the completion script should be generated
    #[arg(value_enum)]
    pub shell: Shell,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use crate::common::cli::{RootOptions, SubCommand};
    use crate::workflow::session::WorkspaceOverrides;

    #[test]
    fn verify_root_cli() {
        use clap::CommandFactory;
        RootOptions::command().debug_assert()
    }

    #[test]
    fn parse_run() {
        let opts = RootOptions::try_parse_from([
            "autoseg",
            "run",
            "taco.toml",
            "--dry-run",
            "--workspace",
            "ws-taco",
        ])
        .unwrap();
        let overrides: WorkspaceOverrides = opts.common.workspace.into();
        assert_eq!(overrides.workspace_name.as_deref(), Some("ws-taco"));
        assert!(matches!(opts.subcmd, SubCommand::Run(run) if run.dry_run));
    }
}
