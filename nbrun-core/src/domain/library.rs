//! Library domain types
//!
//! A library is a dependency attached to the cluster for the duration of a run.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Library declared by a run submission
///
/// Serializes to the wire shape expected by the service, e.g.
/// `{"maven": {"coordinates": "com.acme:lib:1.0"}}` or `{"jar": "dbfs:/x.jar"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Library {
    Maven(MavenLibrary),
    Pypi(PypiLibrary),
    Jar(String),
    Whl(String),
    Egg(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MavenLibrary {
    pub coordinates: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PypiLibrary {
    pub package: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
}

impl Library {
    pub fn maven(coordinates: impl Into<String>) -> Self {
        Library::Maven(MavenLibrary {
            coordinates: coordinates.into(),
            repo: None,
        })
    }

    pub fn pypi(package: impl Into<String>) -> Self {
        Library::Pypi(PypiLibrary {
            package: package.into(),
            repo: None,
        })
    }
}

impl std::fmt::Display for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Library::Maven(m) => write!(f, "maven:{}", m.coordinates),
            Library::Pypi(p) => write!(f, "pypi:{}", p.package),
            Library::Jar(path) => write!(f, "jar:{}", path),
            Library::Whl(path) => write!(f, "whl:{}", path),
            Library::Egg(path) => write!(f, "egg:{}", path),
        }
    }
}

/// Error returned when a `kind:value` library string cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLibraryError(pub String);

impl std::fmt::Display for ParseLibraryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid library '{}': expected maven:, pypi:, jar:, whl: or egg: prefix",
            self.0
        )
    }
}

impl std::error::Error for ParseLibraryError {}

impl FromStr for Library {
    type Err = ParseLibraryError;

    /// Parses `maven:group:artifact:version`, `pypi:package`, `jar:path`,
    /// `whl:path` or `egg:path`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, value) = s
            .split_once(':')
            .ok_or_else(|| ParseLibraryError(s.to_string()))?;

        if value.is_empty() {
            return Err(ParseLibraryError(s.to_string()));
        }

        match kind {
            "maven" => Ok(Library::maven(value)),
            "pypi" => Ok(Library::pypi(value)),
            "jar" => Ok(Library::Jar(value.to_string())),
            "whl" => Ok(Library::Whl(value.to_string())),
            "egg" => Ok(Library::Egg(value.to_string())),
            _ => Err(ParseLibraryError(s.to_string())),
        }
    }
}
