use clap::Parser;

use crate::client::globalsettings::GlobalSettings;
use crate::client::{connect_workspace, create_control_plane};
use crate::common::utils::time::ArgDuration;
use crate::workflow::compute::{ComputeClusterSpec, ComputeTier, provision_cluster};

#[derive(Parser)]
pub struct ComputeOpts {
    #[clap(subcommand)]
    subcmd: ComputeCommand,
}

#[derive(Parser)]
enum ComputeCommand {
    /// Create or update an autoscaling compute cluster
    ///
    /// The command returns as soon as the platform accepts the request, provisioning
    /// continues in the background.
    Provision(ComputeProvisionOpts),
}

#[derive(Parser)]
struct ComputeProvisionOpts {
    /// Name of the cluster
    name: String,

    /// VM size of the cluster nodes
    #[arg(long)]
    vm_size: String,

    /// Minimum number of nodes
    #[arg(long, default_value_t = 0)]
    min_instances: u32,

    /// Maximum number of nodes
    #[arg(long)]
    max_instances: u32,

    /// Idle time before the cluster is scaled down
    #[arg(long, default_value = "120s")]
    idle_timeout: ArgDuration,

    /// VM priority tier
    #[arg(long, value_enum, default_value_t = ComputeTier::Dedicated)]
    tier: ComputeTier,
}

pub async fn command_compute(gsettings: &GlobalSettings, opts: ComputeOpts) -> anyhow::Result<()> {
    match opts.subcmd {
        ComputeCommand::Provision(opts) => provision(gsettings, opts).await,
    }
}

async fn provision(gsettings: &GlobalSettings, opts: ComputeProvisionOpts) -> anyhow::Result<()> {
    let spec = ComputeClusterSpec {
        name: opts.name,
        vm_size: opts.vm_size,
        min_instances: opts.min_instances,
        max_instances: opts.max_instances,
        idle_timeout: opts.idle_timeout.unpack(),
        tier: opts.tier,
    };
    spec.validate()?;

    let plane = create_control_plane(gsettings)?;
    let workspace = connect_workspace(gsettings, &plane, None).await?;
    let operation = provision_cluster(&plane, &workspace, &spec).await?;
    gsettings.printer().print_compute_operation(&operation);
    Ok(())
}
