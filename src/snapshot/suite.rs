//! Snapshot suites.
//!
//! A suite directory holds one case per subdirectory of `input/`:
//!
//! ```text
//! <root>/
//!   packageInfo.json          { default: {name, version}, special: {<case>: {...}} }
//!   environment.json          cached package environment (optional)
//!   input/<case>/...          source fixtures
//!   analysis/<case>/*.json    analyzer output for the case
//!   output/<case>/...         golden snapshots
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{SnapshotError, SnapshotResult, diff, render, write};
use crate::indexing::{
    FileAnalysis, FileFailure, NamingContext, Pipeline, PipelineConfig, index_metadata,
};
use crate::package::{CachedEnvironment, PackageRegistry, PackageSource, StaticPackages};
use crate::project::ProjectIdentity;
use crate::symbol::{Ecosystem, SymbolBuilder};
use crate::{debug_event, log_event};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotMode {
    /// Compare rendered output with the goldens.
    Check,
    /// Overwrite the goldens with rendered output.
    Update,
}

/// Project identity per case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageInfo {
    pub default: ProjectIdentity,
    #[serde(default)]
    pub special: HashMap<String, ProjectIdentity>,
}

impl PackageInfo {
    pub fn load(path: &Path) -> SnapshotResult<Self> {
        let json = fs::read_to_string(path).map_err(|e| SnapshotError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| SnapshotError::PackageInfo {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn for_case(&self, case: &str) -> &ProjectIdentity {
        self.special.get(case).unwrap_or(&self.default)
    }
}

#[derive(Debug, Default)]
pub struct SuiteReport {
    pub cases: usize,
    pub documents: usize,
    pub written: usize,
    pub mismatches: Vec<SnapshotError>,
    pub failures: Vec<FileFailure>,
}

impl SuiteReport {
    pub fn is_success(&self) -> bool {
        self.mismatches.is_empty() && self.failures.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotSuite {
    root: PathBuf,
    ecosystem: Ecosystem,
    manager: String,
    environment: Option<PathBuf>,
    only: Option<String>,
    config: PipelineConfig,
}

impl SnapshotSuite {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ecosystem: Ecosystem::python(),
            manager: "pypi".to_string(),
            environment: None,
            only: None,
            config: PipelineConfig::default(),
        }
    }

    pub fn with_ecosystem(mut self, ecosystem: Ecosystem, manager: impl Into<String>) -> Self {
        self.ecosystem = ecosystem;
        self.manager = manager.into();
        self
    }

    /// Package cache to use instead of `<root>/environment.json`.
    pub fn with_environment(mut self, path: impl Into<PathBuf>) -> Self {
        self.environment = Some(path.into());
        self
    }

    pub fn with_only(mut self, case: impl Into<String>) -> Self {
        self.only = Some(case.into());
        self
    }

    pub fn with_pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Case names, sorted. Plain files under `input/` are ignored.
    pub fn cases(&self) -> SnapshotResult<Vec<String>> {
        if let Some(only) = &self.only {
            return Ok(vec![only.clone()]);
        }

        let input = self.root.join("input");
        let entries = fs::read_dir(&input).map_err(|e| SnapshotError::Io {
            path: input.clone(),
            source: e,
        })?;

        let mut cases: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        cases.sort();
        Ok(cases)
    }

    pub fn run(&self, mode: SnapshotMode) -> SnapshotResult<SuiteReport> {
        let package_info_path = self.root.join("packageInfo.json");
        let package_info = if package_info_path.exists() {
            Some(PackageInfo::load(&package_info_path)?)
        } else {
            None
        };

        let registry = Arc::new(self.registry()?);

        let mut report = SuiteReport::default();
        for case in self.cases()? {
            self.run_case(&case, mode, package_info.as_ref(), &registry, &mut report)?;
            report.cases += 1;
        }

        log_event!(
            "snapshot",
            "suite complete",
            "cases={} documents={} written={} mismatches={} failures={}",
            report.cases,
            report.documents,
            report.written,
            report.mismatches.len(),
            report.failures.len()
        );
        Ok(report)
    }

    fn registry(&self) -> SnapshotResult<PackageRegistry> {
        let cache = self
            .environment
            .clone()
            .unwrap_or_else(|| self.root.join("environment.json"));
        let source: Box<dyn PackageSource> = if cache.exists() {
            Box::new(CachedEnvironment::new(cache))
        } else {
            Box::new(StaticPackages::default())
        };
        Ok(PackageRegistry::load(source.as_ref())?)
    }

    fn run_case(
        &self,
        case: &str,
        mode: SnapshotMode,
        package_info: Option<&PackageInfo>,
        registry: &Arc<PackageRegistry>,
        report: &mut SuiteReport,
    ) -> SnapshotResult<()> {
        let project_root = self.root.join("input").join(case);
        let identity = match package_info {
            Some(info) => info.for_case(case).clone(),
            None => ProjectIdentity::resolve(&project_root, None, None)?,
        };

        let files = FileAnalysis::load_dir(&self.root.join("analysis").join(case))?;
        let context = NamingContext::new(
            SymbolBuilder::new(self.ecosystem.clone()),
            self.manager.clone(),
            identity,
            project_root.clone(),
            Arc::clone(registry),
        );
        let pipeline = Pipeline::new(context, self.config.clone());
        let arguments = vec!["snapshot".to_string(), case.to_string()];
        let outcome = pipeline.run_files(index_metadata(&project_root, arguments), files)?;
        report.failures.extend(outcome.failures);

        let output_root = self.root.join("output").join(case);
        for document in &outcome.index.documents {
            if document.relative_path.starts_with("..") {
                debug_event!("snapshot", "skipped", "{}", document.relative_path);
                continue;
            }

            let input_path = project_root.join(&document.relative_path);
            let source = fs::read_to_string(&input_path).map_err(|e| SnapshotError::Io {
                path: input_path.clone(),
                source: e,
            })?;
            let rendered = render(&source, document);
            let output_path = output_root.join(&document.relative_path);
            report.documents += 1;

            match mode {
                SnapshotMode::Check => match diff(&output_path, &rendered) {
                    Ok(()) => {}
                    Err(mismatch @ SnapshotError::Mismatch { .. }) => {
                        report.mismatches.push(mismatch)
                    }
                    Err(other) => return Err(other),
                },
                SnapshotMode::Update => {
                    write(&output_path, &rendered)?;
                    report.written += 1;
                    debug_event!("snapshot", "updated", "{}", output_path.display());
                }
            }
        }

        Ok(())
    }
}
