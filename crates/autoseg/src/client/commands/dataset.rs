use clap::Parser;

use crate::client::globalsettings::GlobalSettings;
use crate::client::{connect_workspace, create_control_plane};
use crate::workflow::dataset::{DatasetRef, resolve_dataset};

#[derive(Parser)]
pub struct DatasetOpts {
    #[clap(subcommand)]
    subcmd: DatasetCommand,
}

#[derive(Parser)]
enum DatasetCommand {
    /// Display information about a registered dataset version
    Show(DatasetShowOpts),
}

#[derive(Parser)]
struct DatasetShowOpts {
    /// Name of the dataset
    name: String,

    /// Version of the dataset
    version: String,
}

pub async fn command_dataset(gsettings: &GlobalSettings, opts: DatasetOpts) -> anyhow::Result<()> {
    match opts.subcmd {
        DatasetCommand::Show(opts) => show_dataset(gsettings, opts).await,
    }
}

async fn show_dataset(gsettings: &GlobalSettings, opts: DatasetShowOpts) -> anyhow::Result<()> {
    let plane = create_control_plane(gsettings)?;
    let workspace = connect_workspace(gsettings, &plane, None).await?;
    let asset = resolve_dataset(
        &plane,
        &workspace,
        &DatasetRef::new(opts.name, opts.version),
    )
    .await?;
    gsettings.printer().print_dataset(&asset);
    Ok(())
}
