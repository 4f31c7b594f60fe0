use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::error::{AutosegError, configuration_error};
use crate::common::utils::fs::find_in_ancestors;
use crate::common::utils::str::non_blank;
use crate::platform::ControlPlane;

/// Files that are searched (in every ancestor of the working directory) when the workspace
/// is not specified explicitly.
pub const WORKSPACE_CONFIG_CANDIDATES: [&str; 2] = ["config.json", ".azureml/config.json"];

/// Identifiers of a remote workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceId {
    pub subscription_id: String,
    pub resource_group: String,
    pub workspace_name: String,
}

impl WorkspaceId {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        workspace_name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            workspace_name: workspace_name.into(),
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        for (field, value) in [
            ("subscription_id", &self.subscription_id),
            ("resource_group", &self.resource_group),
            ("workspace_name", &self.workspace_name),
        ] {
            if non_blank(value).is_none() {
                return configuration_error(format!("workspace field `{field}` is empty"));
            }
        }
        Ok(())
    }

    /// Loads workspace identifiers from a workspace config file.
    pub fn from_config_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AutosegError::ConfigurationError(format!(
                "Cannot read workspace config {}: {e}",
                path.display()
            ))
        })?;
        let id: WorkspaceId = serde_json::from_str(&content).map_err(|e| {
            AutosegError::ConfigurationError(format!(
                "Invalid workspace config {}: {e}",
                path.display()
            ))
        })?;
        Ok(id)
    }

    /// Finds a workspace config file in `start` or any of its parents.
    pub fn discover(start: &Path) -> Option<PathBuf> {
        find_in_ancestors(start, &WORKSPACE_CONFIG_CANDIDATES)
    }
}

impl std::fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.subscription_id, self.resource_group, self.workspace_name
        )
    }
}

/// Workspace identifiers passed explicitly (e.g. on the command line).
/// Each present field overrides the corresponding field of the base workspace.
#[derive(Debug, Default, Clone)]
pub struct WorkspaceOverrides {
    pub subscription_id: Option<String>,
    pub resource_group: Option<String>,
    pub workspace_name: Option<String>,
}

impl WorkspaceOverrides {
    fn is_complete(&self) -> bool {
        self.subscription_id.is_some()
            && self.resource_group.is_some()
            && self.workspace_name.is_some()
    }

    /// Resolves the final workspace identifiers.
    ///
    /// Priority: explicit overrides, then `base` (e.g. the workflow file), then a workspace
    /// config file discovered from `search_dir`.
    pub fn resolve(
        self,
        base: Option<WorkspaceId>,
        search_dir: &Path,
    ) -> crate::Result<WorkspaceId> {
        let base = match base {
            Some(base) => Some(base),
            None if self.is_complete() => None,
            None => match WorkspaceId::discover(search_dir) {
                Some(path) => {
                    log::debug!("Using workspace config {}", path.display());
                    Some(WorkspaceId::from_config_file(&path)?)
                }
                None => None,
            },
        };

        let id = match base {
            Some(mut id) => {
                if let Some(value) = self.subscription_id {
                    id.subscription_id = value;
                }
                if let Some(value) = self.resource_group {
                    id.resource_group = value;
                }
                if let Some(value) = self.workspace_name {
                    id.workspace_name = value;
                }
                id
            }
            None => match (self.subscription_id, self.resource_group, self.workspace_name) {
                (Some(subscription_id), Some(resource_group), Some(workspace_name)) => {
                    WorkspaceId::new(subscription_id, resource_group, workspace_name)
                }
                _ => {
                    return configuration_error(format!(
                        "No workspace specified. Pass --subscription-id, --resource-group and --workspace, add a [workspace] section to the workflow file or create one of {} in the working directory",
                        WORKSPACE_CONFIG_CANDIDATES.join(", ")
                    ));
                }
            },
        };
        id.validate()?;
        Ok(id)
    }
}

/// Bearer token used to authorize control plane requests.
#[derive(Clone)]
pub struct Credential {
    token: String,
}

impl Credential {
    pub fn from_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_empty(&self) -> bool {
        self.token.trim().is_empty()
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Workspace properties returned by the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceInfo {
    /// Fully qualified resource ID of the workspace.
    pub resource_id: String,
    pub location: String,
    pub discovery_url: Option<String>,
}

/// Connected workspace. Created once by [`connect`] and then only read.
#[derive(Debug, Clone)]
pub struct Workspace {
    id: WorkspaceId,
    credential: Credential,
    info: WorkspaceInfo,
}

impl Workspace {
    pub fn new(id: WorkspaceId, credential: Credential, info: WorkspaceInfo) -> Self {
        Self {
            id,
            credential,
            info,
        }
    }

    pub fn id(&self) -> &WorkspaceId {
        &self.id
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn info(&self) -> &WorkspaceInfo {
        &self.info
    }
}

/// Produces a workspace handle.
///
/// Fails with `AuthenticationError` if the credential is empty or rejected, and with
/// `ConfigurationError` if the identifiers are incomplete or do not resolve to a workspace.
pub async fn connect(
    plane: &dyn ControlPlane,
    credential: Credential,
    id: WorkspaceId,
) -> crate::Result<Workspace> {
    id.validate()?;
    if credential.is_empty() {
        return Err(AutosegError::AuthenticationError(
            "credential is empty".to_string(),
        ));
    }

    let info = plane.get_workspace(&credential, &id).await?;
    log::info!("Connected to workspace {} ({})", id.workspace_name, info.location);
    Ok(Workspace::new(id, credential, info))
}
