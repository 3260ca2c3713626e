//! Workspace-related API endpoints

use crate::ClusterClient;
use crate::error::{ClientError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use nbrun_core::dto::workspace::{
    DeletePath, ImportArtifact, ImportFormat, Language, MakeDirectory,
};
use std::path::Path;
use tracing::{debug, info};

impl ClusterClient {
    // =============================================================================
    // Directories
    // =============================================================================

    /// Create a workspace directory, including missing parents
    pub async fn make_directory(&self, path: &str) -> Result<()> {
        debug!("Creating workspace directory {}", path);
        self.post_empty(
            "workspace/mkdirs",
            &MakeDirectory {
                path: path.to_string(),
            },
        )
        .await
    }

    /// Delete a workspace path
    ///
    /// Whatever the service answers for a missing path is surfaced as is.
    pub async fn delete_directory(&self, path: &str, recursive: bool) -> Result<()> {
        debug!("Deleting workspace path {} (recursive: {})", path, recursive);
        self.post_empty(
            "workspace/delete",
            &DeletePath {
                path: path.to_string(),
                recursive,
            },
        )
        .await
    }

    // =============================================================================
    // Artifacts
    // =============================================================================

    /// Upload a local notebook to the workspace, replacing any existing one
    ///
    /// # Arguments
    /// * `local` - Path of the notebook file on disk
    /// * `remote` - Destination workspace path
    ///
    /// # Errors
    /// `ClientError::Io` if the file cannot be read, `ClientError::Transport`
    /// if the service rejects the upload.
    pub async fn upload_artifact(&self, local: impl AsRef<Path>, remote: &str) -> Result<()> {
        let local = local.as_ref();
        let bytes = tokio::fs::read(local).await.map_err(|source| ClientError::Io {
            path: local.to_path_buf(),
            source,
        })?;

        info!(
            "Uploading {} ({} bytes) to {}",
            local.display(),
            bytes.len(),
            remote
        );

        self.post_empty(
            "workspace/import",
            &ImportArtifact {
                path: remote.to_string(),
                content: STANDARD.encode(&bytes),
                format: ImportFormat::Jupyter,
                language: Some(Language::Python),
                overwrite: true,
            },
        )
        .await
    }
}
