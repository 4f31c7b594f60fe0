//! Access to the control plane of the remote ML platform.
//!
//! Every remote operation used by the workflow is one method of [`ControlPlane`], so that the
//! workflow can run against the real service ([`rest::RestControlPlane`]) or a fake.
pub mod auth;
pub mod config;
pub mod rest;

use std::future::Future;
use std::pin::Pin;

use crate::workflow::compute::{ComputeClusterSpec, ComputeOperation};
use crate::workflow::dataset::{DatasetAsset, DatasetRef};
use crate::workflow::job::{JobDescriptor, JobHandle};
use crate::workflow::session::{Credential, Workspace, WorkspaceId, WorkspaceInfo};

pub type PlaneFuture<T> = Pin<Box<dyn Future<Output = crate::Result<T>>>>;

/// Handler that can communicate with the control plane of a workspace.
pub trait ControlPlane {
    /// Look up the workspace with the given identifiers.
    ///
    /// Rejected credentials result in `AuthenticationError`, unknown workspaces in
    /// `ConfigurationError`.
    fn get_workspace(
        &self,
        credential: &Credential,
        id: &WorkspaceId,
    ) -> PlaneFuture<WorkspaceInfo>;

    /// Create or update a compute cluster. The service decides between create and update
    /// based on the cluster name. Returns as soon as the request is accepted.
    fn upsert_compute(
        &self,
        workspace: &Workspace,
        spec: &ComputeClusterSpec,
    ) -> PlaneFuture<ComputeOperation>;

    /// Fetch a registered dataset version.
    fn get_dataset(
        &self,
        workspace: &Workspace,
        dataset: &DatasetRef,
    ) -> PlaneFuture<DatasetAsset>;

    /// Submit a job under the given name. Resolves once the submission is acknowledged.
    fn submit_job(
        &self,
        workspace: &Workspace,
        job_name: &str,
        descriptor: &JobDescriptor,
    ) -> PlaneFuture<JobHandle>;
}
