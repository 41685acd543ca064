//! Registry data sources.
//!
//! The registry never decides on its own where packages come from; callers
//! inject a [`PackageSource`]. A cached environment is replayed verbatim and is
//! never topped up with a live query.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{Package, PackageError, PackageResult};

pub trait PackageSource: Send + Sync {
    /// Human-readable origin for logs and errors.
    fn describe(&self) -> String;

    fn load(&self) -> PackageResult<Vec<Package>>;
}

/// Packages read from a JSON cache: `[ { name, version, files: [...] } ]`.
#[derive(Debug, Clone)]
pub struct CachedEnvironment {
    path: PathBuf,
}

impl CachedEnvironment {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PackageSource for CachedEnvironment {
    fn describe(&self) -> String {
        format!("cached environment {}", self.path.display())
    }

    fn load(&self) -> PackageResult<Vec<Package>> {
        let json = fs::read_to_string(&self.path).map_err(|e| PackageError::CacheRead {
            path: self.path.clone(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| PackageError::CacheParse {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }
}

/// A fixed package list.
#[derive(Debug, Clone, Default)]
pub struct StaticPackages(pub Vec<Package>);

impl PackageSource for StaticPackages {
    fn describe(&self) -> String {
        format!("{} static packages", self.0.len())
    }

    fn load(&self) -> PackageResult<Vec<Package>> {
        Ok(self.0.clone())
    }
}

/// Use the cache when one is configured, the live source otherwise.
pub fn choose_source(
    cache: Option<&Path>,
    live: Box<dyn PackageSource>,
) -> Box<dyn PackageSource> {
    match cache {
        Some(path) => Box::new(CachedEnvironment::new(path)),
        None => live,
    }
}

/// Cache file for one project version inside `dir`.
pub fn cache_path_for(dir: &Path, project_version: &str) -> PathBuf {
    let key: String = project_version
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    dir.join(format!("environment-{key}.json"))
}

/// Write `packages` in the cache schema, replacing `path` atomically.
pub fn write_cache(path: &Path, packages: &[Package]) -> PackageResult<()> {
    let write_err = |reason: String| PackageError::CacheWrite {
        path: path.to_path_buf(),
        reason,
    };

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;

    let json = serde_json::to_string_pretty(packages).map_err(|e| write_err(e.to_string()))?;
    let mut file = tempfile::NamedTempFile::new_in(parent).map_err(|e| write_err(e.to_string()))?;
    file.write_all(json.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|e| write_err(e.to_string()))?;
    file.persist(path).map_err(|e| write_err(e.error.to_string()))?;

    tracing::debug!("[packages] wrote {} packages to {}", packages.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageRegistry;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingSource(Arc<AtomicUsize>);

    impl PackageSource for CountingSource {
        fn describe(&self) -> String {
            "counting".to_string()
        }

        fn load(&self) -> PackageResult<Vec<Package>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_cache_round_trip_keeps_schema() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("env.json");
        let packages = vec![Package::new("six", "1.16.0", ["/site/six.py"])];

        write_cache(&path, &packages).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[0]["name"], "six");
        assert_eq!(raw[0]["version"], "1.16.0");
        assert_eq!(raw[0]["files"][0], "/site/six.py");

        let loaded = CachedEnvironment::new(&path).load().unwrap();
        assert_eq!(loaded, packages);
    }

    #[test]
    fn test_cached_source_never_queries_live() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("env.json");
        fs::write(&path, "[]").unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let live = Box::new(CountingSource(Arc::clone(&calls)));
        let source = choose_source(Some(&path), live);
        let registry = PackageRegistry::load(source.as_ref()).unwrap();

        assert!(registry.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_live_source_used_without_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let live = Box::new(CountingSource(Arc::clone(&calls)));
        let source = choose_source(None, live);
        PackageRegistry::load(source.as_ref()).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_broken_cache_is_registry_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("env.json");
        fs::write(&path, "{ not json").unwrap();

        let err = PackageRegistry::load(&CachedEnvironment::new(&path)).unwrap_err();
        assert!(matches!(err, PackageError::RegistryUnavailable { .. }));
    }

    #[test]
    fn test_missing_cache_is_registry_unavailable() {
        let err =
            PackageRegistry::load(&CachedEnvironment::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, PackageError::RegistryUnavailable { .. }));
    }

    #[test]
    fn test_cache_path_is_keyed_by_version() {
        let dir = Path::new("/cache");
        assert_eq!(
            cache_path_for(dir, "1.2.3"),
            PathBuf::from("/cache/environment-1.2.3.json")
        );
        assert_eq!(
            cache_path_for(dir, "feature/x y"),
            PathBuf::from("/cache/environment-feature_x_y.json")
        );
    }
}
