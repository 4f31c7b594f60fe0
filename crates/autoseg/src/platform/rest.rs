use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::AUTOSEG_VERSION;
use crate::Map;
use crate::common::error::AutosegError;
use crate::common::utils::time::{format_iso8601_minutes, format_iso8601_seconds};
use crate::platform::config::get_http_timeout;
use crate::platform::{ControlPlane, PlaneFuture};
use crate::workflow::compute::{ComputeClusterSpec, ComputeOperation, ComputeTier};
use crate::workflow::dataset::{DatasetAsset, DatasetRef};
use crate::workflow::job::{JobDescriptor, JobHandle, JobStatus};
use crate::workflow::plan::WorkflowPlan;
use crate::workflow::session::{Credential, Workspace, WorkspaceId, WorkspaceInfo};

const ASYNC_OPERATION_HEADER: &str = "Azure-AsyncOperation";

/// Remote operation, used to map HTTP failures to errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GetWorkspace,
    UpsertCompute,
    GetDataset,
    SubmitJob,
}

impl Operation {
    fn describe(&self) -> &'static str {
        match self {
            Operation::GetWorkspace => "workspace lookup",
            Operation::UpsertCompute => "compute provisioning",
            Operation::GetDataset => "dataset lookup",
            Operation::SubmitJob => "job submission",
        }
    }
}

/// Control plane that talks to the resource manager REST API.
pub struct RestControlPlane {
    client: Client,
    endpoint: Url,
    api_version: String,
}

impl RestControlPlane {
    pub fn new(endpoint: &str, api_version: impl Into<String>) -> crate::Result<Self> {
        let client = Client::builder()
            .timeout(get_http_timeout())
            .user_agent(format!("autoseg/{AUTOSEG_VERSION}"))
            .build()
            .map_err(|e| AutosegError::GenericError(format!("Cannot create HTTP client: {e}")))?;
        Self::with_client(client, endpoint, api_version)
    }

    pub fn with_client(
        client: Client,
        endpoint: &str,
        api_version: impl Into<String>,
    ) -> crate::Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            AutosegError::ConfigurationError(format!("Invalid endpoint `{endpoint}`: {e}"))
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(AutosegError::ConfigurationError(format!(
                "Invalid endpoint `{endpoint}`"
            )));
        }
        Ok(Self {
            client,
            endpoint,
            api_version: api_version.into(),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn resource_url(&self, segments: &[String]) -> crate::Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| {
                AutosegError::ConfigurationError(format!("Invalid endpoint `{}`", self.endpoint))
            })?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        segments: &[String],
        credential: &Credential,
    ) -> crate::Result<RequestBuilder> {
        let url = self.resource_url(segments)?;
        log::debug!("{method} {url}");
        Ok(self
            .client
            .request(method, url)
            .bearer_auth(credential.token()))
    }

    /// Requests that a workflow run would send, without sending them.
    pub fn plan_requests(
        &self,
        id: &WorkspaceId,
        plan: &WorkflowPlan,
        job_name: &str,
    ) -> crate::Result<Vec<PlannedRequest>> {
        let descriptor = plan.build_descriptor(plan.dataset.clone())?;
        let compute_id = compute_resource_id(id, &descriptor.compute);
        Ok(vec![
            PlannedRequest {
                method: Method::GET.to_string(),
                url: self.resource_url(&workspace_segments(id))?.to_string(),
                body: None,
            },
            PlannedRequest {
                method: Method::PUT.to_string(),
                url: self
                    .resource_url(&compute_segments(id, &plan.compute.name))?
                    .to_string(),
                body: Some(compute_request_body(None, &plan.compute)),
            },
            PlannedRequest {
                method: Method::GET.to_string(),
                url: self
                    .resource_url(&dataset_segments(id, &plan.dataset))?
                    .to_string(),
                body: None,
            },
            PlannedRequest {
                method: Method::PUT.to_string(),
                url: self.resource_url(&job_segments(id, job_name))?.to_string(),
                body: Some(job_request_body(&compute_id, &descriptor)),
            },
        ])
    }
}

impl ControlPlane for RestControlPlane {
    fn get_workspace(
        &self,
        credential: &Credential,
        id: &WorkspaceId,
    ) -> PlaneFuture<WorkspaceInfo> {
        let request = self.request(Method::GET, &workspace_segments(id), credential);
        let id = id.clone();
        Box::pin(async move {
            let response = send(request?, Operation::GetWorkspace).await?;
            log::debug!("Workspace {id} found");
            parse_workspace_response(&response.body)
        })
    }

    fn upsert_compute(
        &self,
        workspace: &Workspace,
        spec: &ComputeClusterSpec,
    ) -> PlaneFuture<ComputeOperation> {
        let body = compute_request_body(Some(&workspace.info().location), spec);
        let request = self
            .request(
                Method::PUT,
                &compute_segments(workspace.id(), &spec.name),
                workspace.credential(),
            )
            .map(|request| request.json(&body));
        let name = spec.name.clone();
        Box::pin(async move {
            let response = send(request?, Operation::UpsertCompute).await?;
            parse_compute_response(name, &response)
        })
    }

    fn get_dataset(
        &self,
        workspace: &Workspace,
        dataset: &DatasetRef,
    ) -> PlaneFuture<DatasetAsset> {
        let request = self.request(
            Method::GET,
            &dataset_segments(workspace.id(), dataset),
            workspace.credential(),
        );
        let dataset = dataset.clone();
        Box::pin(async move {
            let response = send(request?, Operation::GetDataset).await?;
            parse_dataset_response(dataset, &response.body)
        })
    }

    fn submit_job(
        &self,
        workspace: &Workspace,
        job_name: &str,
        descriptor: &JobDescriptor,
    ) -> PlaneFuture<JobHandle> {
        let compute_id = compute_resource_id(workspace.id(), &descriptor.compute);
        let body = job_request_body(&compute_id, descriptor);
        let request = self
            .request(
                Method::PUT,
                &job_segments(workspace.id(), job_name),
                workspace.credential(),
            )
            .map(|request| request.json(&body));
        let job_name = job_name.to_string();
        Box::pin(async move {
            let response = send(request?, Operation::SubmitJob).await?;
            parse_job_response(job_name, &response.body)
        })
    }
}

/// HTTP request as it would be sent to the control plane.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedRequest {
    pub method: String,
    pub url: String,
    pub body: Option<Value>,
}

struct RestResponse {
    body: String,
    async_operation: Option<String>,
}

async fn send(request: RequestBuilder, operation: Operation) -> crate::Result<RestResponse> {
    let response = request.send().await.map_err(|e| {
        AutosegError::ServiceUnavailableError(format!("{} failed: {e}", operation.describe()))
    })?;
    let status = response.status();
    let async_operation = response
        .headers()
        .get(ASYNC_OPERATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());
    let body = response.text().await.map_err(|e| {
        AutosegError::ServiceUnavailableError(format!(
            "Cannot read response of {}: {e}",
            operation.describe()
        ))
    })?;
    if !status.is_success() {
        log::debug!("{} failed with {status}: {body}", operation.describe());
        return Err(classify_error(operation, status, &body));
    }
    Ok(RestResponse {
        body,
        async_operation,
    })
}

fn workspace_segments(id: &WorkspaceId) -> Vec<String> {
    [
        "subscriptions",
        id.subscription_id.as_str(),
        "resourceGroups",
        id.resource_group.as_str(),
        "providers",
        "Microsoft.MachineLearningServices",
        "workspaces",
        id.workspace_name.as_str(),
    ]
    .into_iter()
    .map(|s| s.to_string())
    .collect()
}

fn nested_segments(id: &WorkspaceId, nested: &[&str]) -> Vec<String> {
    let mut segments = workspace_segments(id);
    segments.extend(nested.iter().map(|s| s.to_string()));
    segments
}

fn compute_segments(id: &WorkspaceId, name: &str) -> Vec<String> {
    nested_segments(id, &["computes", name])
}

fn dataset_segments(id: &WorkspaceId, dataset: &DatasetRef) -> Vec<String> {
    nested_segments(
        id,
        &[
            "data",
            dataset.name.as_str(),
            "versions",
            dataset.version.as_str(),
        ],
    )
}

fn job_segments(id: &WorkspaceId, job_name: &str) -> Vec<String> {
    nested_segments(id, &["jobs", job_name])
}

/// Resource ID of a compute cluster, used as the compute target of jobs.
pub fn compute_resource_id(id: &WorkspaceId, name: &str) -> String {
    format!("/{}", compute_segments(id, name).join("/"))
}

pub fn compute_request_body(location: Option<&str>, spec: &ComputeClusterSpec) -> Value {
    let priority = match spec.tier {
        ComputeTier::Dedicated => "Dedicated",
        ComputeTier::LowPriority => "LowPriority",
    };
    let mut body = json!({
        "properties": {
            "computeType": "AmlCompute",
            "properties": {
                "vmSize": spec.vm_size,
                "vmPriority": priority,
                "scaleSettings": {
                    "minNodeCount": spec.min_instances,
                    "maxNodeCount": spec.max_instances,
                    "nodeIdleTimeBeforeScaleDown": format_iso8601_seconds(spec.idle_timeout),
                }
            }
        }
    });
    if let Some(location) = location {
        body["location"] = json!(location);
    }
    body
}

pub fn job_request_body(compute_id: &str, descriptor: &JobDescriptor) -> Value {
    let mut limits = json!({
        "maxTrials": descriptor.limits.max_trials,
        "maxConcurrentTrials": descriptor.limits.max_concurrent_trials,
    });
    if let Some(timeout) = descriptor.limits.timeout {
        limits["timeout"] = json!(format_iso8601_minutes(timeout));
    }

    let mut properties = json!({
        "jobType": "AutoML",
        "experimentName": descriptor.experiment_name,
        "computeId": compute_id,
        "taskDetails": {
            "taskType": descriptor.task.wire_name(),
            "targetColumnName": descriptor.target_column,
            "trainingData": {
                "jobInputType": "mltable",
                "uri": descriptor.training_data.asset_uri(),
            },
            "validationDataSize": descriptor.validation_split,
            "primaryMetric": descriptor.primary_metric.wire_name(),
            "limitSettings": limits,
        }
    });
    if let Some(display_name) = &descriptor.display_name {
        properties["displayName"] = json!(display_name);
    }
    json!({ "properties": properties })
}

fn parse_body<'a, T: Deserialize<'a>>(operation: Operation, body: &'a str) -> crate::Result<T> {
    serde_json::from_str(body).map_err(|e| {
        AutosegError::DeserializationError(format!(
            "Unexpected response of {}: {e}",
            operation.describe()
        ))
    })
}

#[derive(Deserialize)]
struct WorkspaceResponse {
    id: String,
    location: String,
    #[serde(default)]
    properties: WorkspaceProperties,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WorkspaceProperties {
    discovery_url: Option<String>,
}

fn parse_workspace_response(body: &str) -> crate::Result<WorkspaceInfo> {
    let response: WorkspaceResponse = parse_body(Operation::GetWorkspace, body)?;
    Ok(WorkspaceInfo {
        resource_id: response.id,
        location: response.location,
        discovery_url: response.properties.discovery_url,
    })
}

#[derive(Deserialize, Default)]
struct ComputeResponse {
    #[serde(default)]
    properties: ComputeProperties,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ComputeProperties {
    provisioning_state: Option<String>,
}

fn parse_compute_response(
    cluster_name: String,
    response: &RestResponse,
) -> crate::Result<ComputeOperation> {
    // Some responses (e.g. 202 Accepted) have no body at all
    let parsed: ComputeResponse = if response.body.trim().is_empty() {
        ComputeResponse::default()
    } else {
        parse_body(Operation::UpsertCompute, &response.body)?
    };
    Ok(ComputeOperation {
        cluster_name,
        provisioning_state: parsed.properties.provisioning_state,
        operation_url: response.async_operation.clone(),
    })
}

#[derive(Deserialize)]
struct DatasetResponse {
    id: String,
    properties: DatasetProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetProperties {
    data_uri: String,
    data_type: String,
}

fn parse_dataset_response(dataset: DatasetRef, body: &str) -> crate::Result<DatasetAsset> {
    let response: DatasetResponse = parse_body(Operation::GetDataset, body)?;
    Ok(DatasetAsset {
        dataset,
        asset_id: response.id,
        data_uri: response.properties.data_uri,
        data_type: response.properties.data_type,
    })
}

#[derive(Deserialize)]
struct JobResponse {
    id: Option<String>,
    #[serde(default)]
    properties: JobProperties,
}

#[derive(Deserialize, Default)]
struct JobProperties {
    status: Option<JobStatus>,
    #[serde(default)]
    services: Map<String, Option<JobService>>,
}

#[derive(Deserialize)]
struct JobService {
    endpoint: Option<String>,
}

fn parse_job_response(job_name: String, body: &str) -> crate::Result<JobHandle> {
    let response: JobResponse = parse_body(Operation::SubmitJob, body)?;
    let services: Map<String, String> = response
        .properties
        .services
        .into_iter()
        .filter_map(|(name, service)| Some((name, service?.endpoint?)))
        .collect();
    Ok(JobHandle {
        id: job_name,
        resource_id: response.id,
        status: response.properties.status.unwrap_or(JobStatus::NotStarted),
        studio_url: services.get("Studio").cloned(),
        services,
        submitted_at: Utc::now(),
    })
}

#[derive(Deserialize, Default)]
struct ErrorResponse {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize, Default)]
struct ErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Maps a failed HTTP response to an error kind.
pub fn classify_error(operation: Operation, status: StatusCode, body: &str) -> AutosegError {
    let detail = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|response| response.error)
        .unwrap_or_default();
    let message = if detail.code.is_empty() && detail.message.is_empty() {
        format!("{} failed ({status})", operation.describe())
    } else {
        format!(
            "{} failed ({status}): {}: {}",
            operation.describe(),
            detail.code,
            detail.message
        )
    };

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return AutosegError::AuthenticationError(message);
    }
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return AutosegError::ServiceUnavailableError(message);
    }
    let is_quota = detail.code.to_lowercase().contains("quota")
        || detail.message.to_lowercase().contains("quota");
    if operation == Operation::UpsertCompute && is_quota {
        return AutosegError::QuotaError(message);
    }
    if status == StatusCode::NOT_FOUND {
        return match operation {
            Operation::GetWorkspace | Operation::UpsertCompute => {
                AutosegError::ConfigurationError(message)
            }
            Operation::GetDataset => AutosegError::NotFoundError(message),
            Operation::SubmitJob => AutosegError::SubmissionError(message),
        };
    }
    if status.is_client_error() {
        return match operation {
            Operation::GetWorkspace => AutosegError::ConfigurationError(message),
            Operation::UpsertCompute | Operation::GetDataset => {
                AutosegError::ValidationError(message)
            }
            Operation::SubmitJob => AutosegError::SubmissionError(message),
        };
    }
    AutosegError::GenericError(message)
}
