use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::common::error::validation_error;
use crate::common::utils::str::non_blank;
use crate::platform::ControlPlane;
use crate::workflow::session::Workspace;

/// Compute names accepted by the platform: 2-16 characters, starting with a letter,
/// followed by letters, digits or hyphens.
const MIN_CLUSTER_NAME_LEN: usize = 2;
const MAX_CLUSTER_NAME_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ComputeTier {
    /// Standard, non-preemptible VMs
    #[serde(alias = "standard")]
    #[value(alias = "standard")]
    Dedicated,
    /// Discounted, preemptible VMs
    LowPriority,
}

impl ComputeTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComputeTier::Dedicated => "dedicated",
            ComputeTier::LowPriority => "low-priority",
        }
    }
}

/// Desired shape of an autoscaling compute cluster. The name is the unique key of the cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeClusterSpec {
    pub name: String,
    pub vm_size: String,
    pub min_instances: u32,
    pub max_instances: u32,
    /// Idle time before the cluster is scaled down. Only whole seconds are sent to the platform.
    pub idle_timeout: Duration,
    pub tier: ComputeTier,
}

impl ComputeClusterSpec {
    pub fn validate(&self) -> crate::Result<()> {
        validate_cluster_name(&self.name)?;
        if non_blank(&self.vm_size).is_none() {
            return validation_error(format!("cluster `{}` has an empty VM size", self.name));
        }
        if self.min_instances > self.max_instances {
            return validation_error(format!(
                "cluster `{}`: min_instances ({}) is larger than max_instances ({})",
                self.name, self.min_instances, self.max_instances
            ));
        }
        if self.idle_timeout.as_secs() == 0 {
            return validation_error(format!(
                "cluster `{}`: idle timeout must be at least one second",
                self.name
            ));
        }
        Ok(())
    }
}

fn validate_cluster_name(name: &str) -> crate::Result<()> {
    let length = name.chars().count();
    if !(MIN_CLUSTER_NAME_LEN..=MAX_CLUSTER_NAME_LEN).contains(&length) {
        return validation_error(format!(
            "cluster name `{name}` must have between {MIN_CLUSTER_NAME_LEN} and {MAX_CLUSTER_NAME_LEN} characters"
        ));
    }
    let mut chars = name.chars();
    if !chars.next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return validation_error(format!("cluster name `{name}` must start with a letter"));
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return validation_error(format!(
            "cluster name `{name}` may only contain letters, digits and hyphens"
        ));
    }
    Ok(())
}

/// Handle of the (asynchronous) remote provisioning operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeOperation {
    pub cluster_name: String,
    /// Provisioning state reported right after the upsert (e.g. `Creating`, `Updating`).
    pub provisioning_state: Option<String>,
    /// URL that can be used to track the provisioning operation.
    pub operation_url: Option<String>,
}

/// Issues a create-or-update request for the cluster. The remote provisioning is not awaited.
pub async fn provision_cluster(
    plane: &dyn ControlPlane,
    workspace: &Workspace,
    spec: &ComputeClusterSpec,
) -> crate::Result<ComputeOperation> {
    spec.validate()?;
    log::info!(
        "Provisioning cluster {} ({}, {}-{} instances, {})",
        spec.name,
        spec.vm_size,
        spec.min_instances,
        spec.max_instances,
        spec.tier.as_str()
    );
    let operation = plane.upsert_compute(workspace, spec).await?;
    log::debug!("Cluster {} upsert accepted: {:?}", spec.name, operation);
    Ok(operation)
}
