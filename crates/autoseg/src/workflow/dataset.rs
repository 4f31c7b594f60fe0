use serde::{Deserialize, Serialize};

use crate::common::error::validation_error;
use crate::common::utils::str::non_blank;
use crate::platform::ControlPlane;
use crate::workflow::session::Workspace;

/// Name and version of a dataset registered in the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRef {
    pub name: String,
    pub version: String,
}

impl DatasetRef {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if non_blank(&self.name).is_none() {
            return validation_error("dataset name is empty");
        }
        if non_blank(&self.version).is_none() {
            return validation_error(format!("dataset `{}` has an empty version", self.name));
        }
        Ok(())
    }

    /// Short-form asset reference understood by the job service (`azureml:<name>:<version>`).
    pub fn asset_uri(&self) -> String {
        format!("azureml:{}:{}", self.name, self.version)
    }
}

impl std::fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.version)
    }
}

/// Resolved dataset. Never mutated locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetAsset {
    pub dataset: DatasetRef,
    /// Fully qualified resource ID of the dataset version.
    pub asset_id: String,
    /// Storage path of the data.
    pub data_uri: String,
    /// Kind of the asset (e.g. `mltable`, `uri_folder`).
    pub data_type: String,
}

/// Looks up a dataset version that was registered out of band.
/// Fails with `NotFoundError` if no such dataset/version exists.
pub async fn resolve_dataset(
    plane: &dyn ControlPlane,
    workspace: &Workspace,
    dataset: &DatasetRef,
) -> crate::Result<DatasetAsset> {
    dataset.validate()?;
    log::info!("Resolving dataset {dataset}");
    let asset = plane.get_dataset(workspace, dataset).await?;
    log::debug!("Dataset {dataset} resolved to {}", asset.data_uri);
    Ok(asset)
}

#[cfg(test)]
mod tests {
    use crate::common::error::AutosegError;
    use crate::tests::utils::{FakeControlPlane, connect_test_workspace};
    use crate::workflow::dataset::{DatasetRef, resolve_dataset};

    #[tokio::test]
    async fn resolve_registered() {
        let plane = FakeControlPlane::default().with_dataset("TACO-annotations", "1");
        let workspace = connect_test_workspace(&plane).await;
        let asset = resolve_dataset(&plane, &workspace, &DatasetRef::new("TACO-annotations", "1"))
            .await
            .unwrap();
        assert_eq!(asset.dataset, DatasetRef::new("TACO-annotations", "1"));
        assert_eq!(asset.data_type, "mltable");
        assert!(!asset.data_uri.is_empty());
    }

    #[tokio::test]
    async fn resolve_unknown_version() {
        let plane = FakeControlPlane::default().with_dataset("TACO-annotations", "1");
        let workspace = connect_test_workspace(&plane).await;
        let result =
            resolve_dataset(&plane, &workspace, &DatasetRef::new("TACO-annotations", "2")).await;
        assert!(matches!(result, Err(AutosegError::NotFoundError(_))));
    }

    #[tokio::test]
    async fn resolve_empty_name() {
        let plane = FakeControlPlane::default();
        let workspace = connect_test_workspace(&plane).await;
        let result = resolve_dataset(&plane, &workspace, &DatasetRef::new("", "1")).await;
        assert!(matches!(result, Err(AutosegError::ValidationError(_))));
        assert_eq!(plane.state().dataset_calls, 0);
    }

    #[test]
    fn asset_uri() {
        assert_eq!(
            DatasetRef::new("TACO-annotations", "1").asset_uri(),
            "azureml:TACO-annotations:1"
        );
    }
}
