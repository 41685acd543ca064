//! Project identity.
//!
//! Symbols defined in the project's own files are qualified with the project's
//! name and version. Both come from explicit settings when given, otherwise
//! from `pyproject.toml` (`[project]` or `[tool.poetry]`), and the version
//! finally falls back to the current git commit.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("Cannot determine project name for {root}; set project.name")]
    MissingName { root: PathBuf },

    #[error("Cannot determine project version for {root}; set project.version")]
    MissingVersion { root: PathBuf },

    #[error("Failed to parse {path}: {reason}")]
    Manifest { path: PathBuf, reason: String },
}

pub type ProjectResult<T> = Result<T, ProjectError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectIdentity {
    pub name: String,
    pub version: String,
}

impl ProjectIdentity {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Resolve the identity of the project rooted at `root`.
    pub fn resolve(root: &Path, name: Option<&str>, version: Option<&str>) -> ProjectResult<Self> {
        let manifest = read_pyproject(root)?;

        let name = name
            .map(str::to_string)
            .or_else(|| manifest.as_ref().and_then(|m| m.name.clone()))
            .ok_or_else(|| ProjectError::MissingName {
                root: root.to_path_buf(),
            })?;

        let version = version
            .map(str::to_string)
            .or_else(|| manifest.as_ref().and_then(|m| m.version.clone()))
            .or_else(|| git_head(root))
            .ok_or_else(|| ProjectError::MissingVersion {
                root: root.to_path_buf(),
            })?;

        tracing::debug!("[project] identity {name} {version}");
        Ok(Self { name, version })
    }
}

#[derive(Debug, Default)]
struct Manifest {
    name: Option<String>,
    version: Option<String>,
}

fn read_pyproject(root: &Path) -> ProjectResult<Option<Manifest>> {
    let path = root.join("pyproject.toml");
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(None);
    };

    let value: toml::Value = toml::from_str(&content).map_err(|e| ProjectError::Manifest {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    let field = |table: Option<&toml::Value>, key: &str| {
        table
            .and_then(|t| t.get(key))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };

    let project = value.get("project");
    let poetry = value.get("tool").and_then(|t| t.get("poetry"));

    Ok(Some(Manifest {
        name: field(project, "name").or_else(|| field(poetry, "name")),
        version: field(project, "version").or_else(|| field(poetry, "version")),
    }))
}

fn git_head(root: &Path) -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(root)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let head = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!head.is_empty()).then_some(head)
}
