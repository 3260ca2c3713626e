//! Workspace DTOs

use serde::{Deserialize, Serialize};

/// Request body of `workspace/mkdirs`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MakeDirectory {
    pub path: String,
}

/// Request body of `workspace/delete`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletePath {
    pub path: String,
    pub recursive: bool,
}

/// Request body of `workspace/import`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportArtifact {
    pub path: String,
    /// Base64-encoded file content
    pub content: String,
    pub format: ImportFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    pub overwrite: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportFormat {
    Source,
    Html,
    Jupyter,
    Dbc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Language {
    Scala,
    Python,
    Sql,
    R,
}
