use anyhow::Context;

use crate::client::globalsettings::GlobalSettings;
use crate::common::utils::fs::get_current_dir;
use crate::platform::auth::{CredentialSource, acquire_credential};
use crate::platform::config::get_authority_host;
use crate::platform::rest::RestControlPlane;
use crate::workflow::session::{Credential, Workspace, WorkspaceId, connect};

pub mod commands;
pub mod globalsettings;
pub mod output;
pub mod utils;

pub fn create_control_plane(gsettings: &GlobalSettings) -> anyhow::Result<RestControlPlane> {
    let platform = gsettings.platform();
    RestControlPlane::new(&platform.endpoint, platform.api_version.clone())
        .context("Cannot create control plane client")
}

/// Resolves the workspace from command line/env overrides, `base` (typically the `[workspace]`
/// section of a workflow file) and a discovered workspace config.
pub fn resolve_workspace_id(
    gsettings: &GlobalSettings,
    base: Option<WorkspaceId>,
) -> anyhow::Result<WorkspaceId> {
    let id = gsettings
        .platform()
        .workspace
        .clone()
        .resolve(base, &get_current_dir())?;
    Ok(id)
}

pub async fn get_credential(plane: &RestControlPlane) -> anyhow::Result<Credential> {
    let source = CredentialSource::from_env()?;
    log::debug!("Using credential source {source:?}");
    let credential = acquire_credential(plane.client(), &get_authority_host(), source).await?;
    Ok(credential)
}

pub async fn connect_workspace(
    gsettings: &GlobalSettings,
    plane: &RestControlPlane,
    base: Option<WorkspaceId>,
) -> anyhow::Result<Workspace> {
    let id = resolve_workspace_id(gsettings, base)?;
    let credential = get_credential(plane).await?;
    let workspace = connect(plane, credential, id).await?;
    Ok(workspace)
}
