//! Package attribution.
//!
//! Decides which installed dependency owns a source file, so the symbols defined
//! in it are qualified with that dependency's name and version instead of the
//! project's.
//!
//! A package claims a file when one of its recorded paths equals the file or is
//! one of its ancestor directories. When several packages claim the same file,
//! the most specific one wins: the package whose root (the common directory of
//! everything it installs) shares the longest prefix with the file. Two
//! packages with equally specific roots are a configuration error.

pub mod error;
pub mod pip;
pub mod source;

pub use error::{PackageError, PackageResult};
pub use pip::PipEnvironment;
pub use source::{
    CachedEnvironment, PackageSource, StaticPackages, cache_path_for, choose_source, write_cache,
};

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// An installed dependency and the paths it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    pub files: BTreeSet<PathBuf>,
}

impl Package {
    pub fn new<I, P>(name: impl Into<String>, version: impl Into<String>, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self {
            name: name.into(),
            version: version.into(),
            files: files.into_iter().map(|p| normalize_path(p.as_ref())).collect(),
        }
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=={}", self.name, self.version)
    }
}

/// Who owns the symbols defined in a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner<'a> {
    /// The indexed project itself.
    Project,
    /// An installed dependency.
    Package(&'a Package),
}

/// Lexically normalize a path (`.` and `..` folded, trailing separators dropped).
pub fn normalize_path(path: &Path) -> PathBuf {
    path_clean::clean(path)
}

fn common_prefix_len(a: &Path, b: &Path) -> usize {
    a.components()
        .zip(b.components())
        .take_while(|(x, y)| x == y)
        .count()
}

fn package_root(files: &BTreeSet<PathBuf>) -> PathBuf {
    let mut iter = files.iter();
    let Some(first) = iter.next() else {
        return PathBuf::new();
    };
    let mut root = first.clone();
    for file in iter {
        let shared = common_prefix_len(&root, file);
        root = root.components().take(shared).collect();
    }
    root
}

#[derive(Debug)]
struct Entry {
    package: Package,
    root: PathBuf,
}

/// Read-only lookup from file paths to their owning package.
///
/// Built once per run and shared between file passes.
#[derive(Debug, Default)]
pub struct PackageRegistry {
    entries: Vec<Entry>,
    claims: HashMap<PathBuf, Vec<usize>>,
    project_files: HashSet<PathBuf>,
}

impl PackageRegistry {
    pub fn new(packages: Vec<Package>) -> Self {
        let mut registry = Self::default();
        for package in packages {
            // cache files are deserialized verbatim
            let package = Package {
                files: package.files.iter().map(|f| normalize_path(f)).collect(),
                ..package
            };
            let index = registry.entries.len();
            for file in &package.files {
                registry.claims.entry(file.clone()).or_default().push(index);
            }
            let root = package_root(&package.files);
            registry.entries.push(Entry { package, root });
        }
        registry
    }

    /// Build from an injected source. Any source failure is fatal for the run.
    pub fn load(source: &dyn PackageSource) -> PackageResult<Self> {
        let packages = source
            .load()
            .map_err(|e| PackageError::RegistryUnavailable {
                reason: format!("{}: {e}", source.describe()),
            })?;
        tracing::debug!(
            "[packages] loaded {} packages from {}",
            packages.len(),
            source.describe()
        );
        Ok(Self::new(packages))
    }

    /// Files that always belong to the project, even if a package claims them
    /// (editable installs list the project's own sources).
    pub fn with_project_files<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.project_files
            .extend(files.into_iter().map(|p| normalize_path(p.as_ref())));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.entries.iter().map(|e| &e.package)
    }

    /// Resolve the owner of `path`.
    pub fn resolve(&self, path: &Path) -> PackageResult<Owner<'_>> {
        let path = normalize_path(path);
        if self.project_files.contains(&path) {
            return Ok(Owner::Project);
        }

        let mut candidates: Vec<usize> = path
            .ancestors()
            .filter_map(|ancestor| self.claims.get(ancestor))
            .flatten()
            .copied()
            .collect();
        candidates.sort_unstable();
        candidates.dedup();

        let mut best: Option<(usize, usize)> = None;
        let mut tied: Option<usize> = None;
        for index in candidates {
            let score = common_prefix_len(&self.entries[index].root, &path);
            match best {
                Some((_, best_score)) if score < best_score => {}
                Some((_, best_score)) if score == best_score => tied = Some(index),
                _ => {
                    best = Some((index, score));
                    tied = None;
                }
            }
        }

        match (best, tied) {
            (None, _) => Ok(Owner::Project),
            (Some((winner, _)), None) => Ok(Owner::Package(&self.entries[winner].package)),
            (Some((winner, _)), Some(other)) => Err(PackageError::AttributionConflict {
                path,
                first: self.entries[winner].package.to_string(),
                second: self.entries[other].package.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unclaimed_file_is_project_owned() {
        let registry = PackageRegistry::new(vec![Package::new(
            "requests",
            "2.31.0",
            ["/venv/site-packages/requests/"],
        )]);

        let owner = registry.resolve(Path::new("/proj/src/main.py")).unwrap();
        assert_eq!(owner, Owner::Project);
    }

    #[test]
    fn test_exact_file_claim() {
        let registry = PackageRegistry::new(vec![Package::new(
            "six",
            "1.16.0",
            ["/venv/site-packages/six.py"],
        )]);

        match registry.resolve(Path::new("/venv/site-packages/six.py")).unwrap() {
            Owner::Package(p) => assert_eq!(p.name, "six"),
            Owner::Project => panic!("expected six to own the file"),
        }
    }

    #[test]
    fn test_directory_claim_covers_descendants() {
        let registry = PackageRegistry::new(vec![Package::new(
            "requests",
            "2.31.0",
            ["/venv/site-packages/requests/"],
        )]);

        match registry
            .resolve(Path::new("/venv/site-packages/requests/adapters/http.py"))
            .unwrap()
        {
            Owner::Package(p) => assert_eq!(p.to_string(), "requests==2.31.0"),
            Owner::Project => panic!("expected requests to own the file"),
        }
    }

    #[test]
    fn test_directory_claim_does_not_match_sibling_prefix() {
        let registry = PackageRegistry::new(vec![Package::new(
            "req",
            "1.0",
            ["/venv/site-packages/req"],
        )]);

        let owner = registry
            .resolve(Path::new("/venv/site-packages/requests/api.py"))
            .unwrap();
        assert_eq!(owner, Owner::Project);
    }

    #[test]
    fn test_more_specific_package_wins_shared_file() {
        let a = Package::new("A", "1.0", ["/proj/vendor/x.py"]);
        let b = Package::new("B", "2.0", ["/proj/vendor/x.py", "/proj/vendor/"]);
        let registry = PackageRegistry::new(vec![b, a]);

        match registry.resolve(Path::new("/proj/vendor/x.py")).unwrap() {
            Owner::Package(p) => assert_eq!(p.name, "A"),
            Owner::Project => panic!("expected a package owner"),
        }

        // B still owns the rest of the vendor directory
        match registry.resolve(Path::new("/proj/vendor/y.py")).unwrap() {
            Owner::Package(p) => assert_eq!(p.name, "B"),
            Owner::Project => panic!("expected a package owner"),
        }
    }

    #[test]
    fn test_equal_precedence_is_a_conflict() {
        let registry = PackageRegistry::new(vec![
            Package::new("left", "1", ["/site/shared.py"]),
            Package::new("right", "2", ["/site/shared.py"]),
        ]);

        let err = registry.resolve(Path::new("/site/shared.py")).unwrap_err();
        match err {
            PackageError::AttributionConflict { first, second, .. } => {
                assert_eq!(first, "left==1");
                assert_eq!(second, "right==2");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_project_files_override_claims() {
        let registry = PackageRegistry::new(vec![Package::new("proj", "0.1", ["/src/proj/"])])
            .with_project_files(["/src/proj/main.py"]);

        assert_eq!(
            registry.resolve(Path::new("/src/proj/main.py")).unwrap(),
            Owner::Project
        );
        assert!(matches!(
            registry.resolve(Path::new("/src/proj/other.py")).unwrap(),
            Owner::Package(_)
        ));
    }

    #[test]
    fn test_paths_are_normalized_before_lookup() {
        let registry = PackageRegistry::new(vec![Package::new(
            "pkg",
            "1",
            ["/venv/lib/../site-packages/pkg/"],
        )]);

        assert!(matches!(
            registry
                .resolve(Path::new("/venv/site-packages/./pkg/mod.py"))
                .unwrap(),
            Owner::Package(_)
        ));
    }

    #[test]
    fn test_package_root_is_common_directory() {
        let files: BTreeSet<PathBuf> = ["/a/b/c.py", "/a/b/d/e.py"]
            .into_iter()
            .map(PathBuf::from)
            .collect();
        assert_eq!(package_root(&files), PathBuf::from("/a/b"));
    }
}
