//! Analyzer output consumed by the namer.
//!
//! The semantic analyzer is an external collaborator. It hands over one
//! [`FileAnalysis`] per source file: the entities it discovered (with their
//! containing scope) and every place they occur. Nothing here decides what is
//! a symbol; the namer only names what it is given.

use std::fs;
use std::path::{Path, PathBuf};

use scip::types::SymbolRole;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::error::{IndexError, IndexResult};
use crate::symbol::DescriptorKind;

pub type EntityId = u32;

fn default_language() -> String {
    "python".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAnalysis {
    /// Path relative to the project root, as written into the index.
    pub relative_path: String,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default)]
    pub entities: Vec<Entity>,

    #[serde(default)]
    pub occurrences: Vec<EntityOccurrence>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Cannot be referenced from another file.
    Local,
    #[default]
    Exported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub kind: DescriptorKind,

    #[serde(default)]
    pub disambiguator: String,

    #[serde(default)]
    pub visibility: Visibility,

    /// Containing entity; `None` for entities directly under the package root.
    #[serde(default)]
    pub scope: Option<EntityId>,

    /// File that defines the entity when it lives outside the analyzed file.
    #[serde(default)]
    pub defined_in: Option<PathBuf>,

    #[serde(default)]
    pub documentation: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Definition,
    Import,
    Write,
    Read,
    Generated,
    Test,
    ForwardDefinition,
}

impl Role {
    pub fn bit(self) -> i32 {
        let role = match self {
            Role::Definition => SymbolRole::Definition,
            Role::Import => SymbolRole::Import,
            Role::Write => SymbolRole::WriteAccess,
            Role::Read => SymbolRole::ReadAccess,
            Role::Generated => SymbolRole::Generated,
            Role::Test => SymbolRole::Test,
            Role::ForwardDefinition => SymbolRole::ForwardDefinition,
        };
        role as i32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityOccurrence {
    pub entity: EntityId,

    /// `[line, start, end]` or `[start_line, start, end_line, end]`, zero based.
    pub range: Vec<i32>,

    #[serde(default)]
    pub roles: Vec<Role>,
}

impl EntityOccurrence {
    pub fn symbol_roles(&self) -> i32 {
        self.roles.iter().fold(0, |acc, role| acc | role.bit())
    }

    pub fn is_definition(&self) -> bool {
        self.roles.contains(&Role::Definition)
    }

    pub fn has_valid_range(&self) -> bool {
        let ordered = match self.range.as_slice() {
            [_, start, end] => start <= end,
            [start_line, start, end_line, end] => (start_line, start) <= (end_line, end),
            _ => false,
        };
        ordered && self.range.iter().all(|v| *v >= 0)
    }
}

impl FileAnalysis {
    pub fn new(relative_path: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            language: default_language(),
            entities: Vec::new(),
            occurrences: Vec::new(),
        }
    }

    pub fn from_file(path: &Path) -> IndexResult<Self> {
        let json = fs::read_to_string(path).map_err(|e| IndexError::AnalysisRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| IndexError::AnalysisParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load every `*.json` analysis under `dir`, ordered by file path.
    ///
    /// A file that cannot be read or parsed is returned with its error so the
    /// caller's failure policy decides what happens to it. Only an unreadable
    /// `dir` fails the whole load; a missing one yields no analyses.
    pub fn load_dir(dir: &Path) -> IndexResult<Vec<AnalysisFile>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(dir) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(walk_error(dir, e)),
                Err(e) => {
                    let path = e.path().unwrap_or(dir).to_path_buf();
                    let error = walk_error(&path, e);
                    files.push(AnalysisFile {
                        path,
                        analysis: Err(error),
                    });
                    continue;
                }
            };

            let is_json = entry.path().extension().is_some_and(|ext| ext == "json");
            if entry.file_type().is_file() && is_json {
                files.push(AnalysisFile::load(entry.into_path()));
            }
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(files)
    }
}

fn walk_error(path: &Path, error: walkdir::Error) -> IndexError {
    let source = error
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
    IndexError::AnalysisRead {
        path: path.to_path_buf(),
        source,
    }
}

/// One analyzer output file. A read or parse failure stays with its file.
#[derive(Debug)]
pub struct AnalysisFile {
    pub path: PathBuf,
    pub analysis: IndexResult<FileAnalysis>,
}

impl AnalysisFile {
    pub fn load(path: PathBuf) -> Self {
        let analysis = FileAnalysis::from_file(&path);
        Self { path, analysis }
    }

    /// Name used in reports: the document path once parsed, the file otherwise.
    pub fn label(&self) -> String {
        match &self.analysis {
            Ok(analysis) => analysis.relative_path.clone(),
            Err(_) => self.path.display().to_string(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.analysis.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{
            "relative_path": "pkg/mod.py",
            "entities": [
                { "id": 1, "name": "Example", "kind": "type" },
                { "id": 2, "name": "tmp", "kind": "term", "visibility": "local", "scope": 1 }
            ],
            "occurrences": [
                { "entity": 1, "range": [0, 6, 13], "roles": ["definition"] }
            ]
        }"#;

        let analysis: FileAnalysis = serde_json::from_str(json).unwrap();
        assert_eq!(analysis.language, "python");
        assert_eq!(analysis.entities[0].visibility, Visibility::Exported);
        assert_eq!(analysis.entities[1].visibility, Visibility::Local);
        assert_eq!(analysis.entities[1].scope, Some(1));
        assert!(analysis.occurrences[0].is_definition());
    }

    #[test]
    fn test_symbol_roles_bitmask() {
        let occurrence = EntityOccurrence {
            entity: 1,
            range: vec![0, 0, 1],
            roles: vec![Role::Definition, Role::Write],
        };
        assert_eq!(
            occurrence.symbol_roles(),
            SymbolRole::Definition as i32 | SymbolRole::WriteAccess as i32
        );
    }

    #[test]
    fn test_range_validation() {
        let mut occurrence = EntityOccurrence {
            entity: 1,
            range: vec![3, 4, 8],
            roles: vec![],
        };
        assert!(occurrence.has_valid_range());

        occurrence.range = vec![1, 5, 2, 0];
        assert!(occurrence.has_valid_range());

        occurrence.range = vec![3, 8, 4];
        assert!(!occurrence.has_valid_range());

        occurrence.range = vec![-1, 0, 1];
        assert!(!occurrence.has_valid_range());

        occurrence.range = vec![1, 2];
        assert!(!occurrence.has_valid_range());
    }

    #[test]
    fn test_load_dir_is_sorted_and_skips_other_files() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("b.json"), r#"{ "relative_path": "b.py" }"#).unwrap();
        fs::write(dir.join("a.json"), r#"{ "relative_path": "a.py" }"#).unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let files = FileAnalysis::load_dir(dir).unwrap();
        let labels: Vec<_> = files.iter().map(AnalysisFile::label).collect();
        assert_eq!(labels, vec!["a.py", "b.py"]);
        assert!(files.iter().all(AnalysisFile::is_loaded));
    }

    #[test]
    fn test_load_dir_keeps_bad_file_in_place() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("a.json"), r#"{ "relative_path": "a.py" }"#).unwrap();
        fs::write(dir.join("b.json"), "{ truncated").unwrap();
        fs::write(dir.join("c.json"), r#"{ "relative_path": "c.py" }"#).unwrap();

        let files = FileAnalysis::load_dir(dir).unwrap();
        assert_eq!(files.len(), 3);
        assert!(files[0].is_loaded());
        assert!(matches!(
            files[1].analysis,
            Err(IndexError::AnalysisParse { .. })
        ));
        assert_eq!(files[1].label(), dir.join("b.json").display().to_string());
        assert!(files[2].is_loaded());
    }

    #[test]
    fn test_load_dir_missing_is_empty() {
        let files = FileAnalysis::load_dir(Path::new("/no/such/analysis/dir")).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_parse_error_names_the_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.json");
        fs::write(&path, "{").unwrap();

        match FileAnalysis::from_file(&path).unwrap_err() {
            IndexError::AnalysisParse { path: p, .. } => assert_eq!(p, path),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
