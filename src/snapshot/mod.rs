//! Snapshot rendering and golden-file verification.
//!
//! A snapshot is the source text of one document with every occurrence
//! annotated on the line below it:
//!
//! ```text
//! class Example:
//! #     ^^^^^^^ definition scip-python pypi snapshot-util 0.1 pkg/Example#
//! #     documentation An example class.
//! ```
//!
//! Rendering is a pure function of the source and the document, so the same
//! index always renders byte-identical output.

pub mod suite;

pub use suite::{PackageInfo, SnapshotMode, SnapshotSuite, SuiteReport};

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use scip::types::{Document, Occurrence, SymbolInformation, SymbolRole};
use similar::TextDiff;
use thiserror::Error;

use crate::indexing::IndexError;
use crate::package::PackageError;
use crate::project::ProjectError;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot mismatch for {path}:\n{diff}")]
    Mismatch { path: PathBuf, diff: String },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write snapshot {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error("Invalid package info {path}: {reason}")]
    PackageInfo { path: PathBuf, reason: String },

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error(transparent)]
    Project(#[from] ProjectError),
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Width of the indent between a documentation line and its `>` continuation.
const CONTINUATION_INDENT: usize = 12;

const MODIFIERS: [(SymbolRole, &str); 6] = [
    (SymbolRole::Import, "import"),
    (SymbolRole::WriteAccess, "write"),
    (SymbolRole::ReadAccess, "read"),
    (SymbolRole::Generated, "generated"),
    (SymbolRole::Test, "test"),
    (SymbolRole::ForwardDefinition, "forward_definition"),
];

fn comment_syntax(language: &str) -> &'static str {
    if language.eq_ignore_ascii_case("python") {
        "#"
    } else {
        "//"
    }
}

fn role_label(roles: i32) -> String {
    let mut label = if roles & SymbolRole::Definition as i32 != 0 {
        String::from("definition")
    } else {
        String::from("reference")
    };
    for (role, name) in MODIFIERS {
        if roles & role as i32 != 0 {
            label.push(' ');
            label.push_str(name);
        }
    }
    label
}

#[derive(Debug)]
struct Annotation<'a> {
    line: usize,
    start: usize,
    width: usize,
    symbol: &'a str,
    roles: i32,
}

impl<'a> Annotation<'a> {
    fn from_occurrence(occurrence: &'a Occurrence, lines: &[&str]) -> Option<Self> {
        let (line, start, end_line, end) = match occurrence.range.as_slice() {
            [line, start, end] => (*line, *start, *line, *end),
            [line, start, end_line, end] => (*line, *start, *end_line, *end),
            _ => return None,
        };
        let line = usize::try_from(line).ok()?;
        let start = usize::try_from(start).ok()?;
        let end_line = usize::try_from(end_line).ok()?;
        let end = usize::try_from(end).ok()?;

        // multi-line occurrences are underlined to the end of their first line
        let end = if end_line == line {
            end
        } else {
            lines.get(line).map_or(start, |text| text.len())
        };

        Some(Self {
            line,
            start,
            width: end.saturating_sub(start),
            symbol: occurrence.symbol.as_str(),
            roles: occurrence.symbol_roles,
        })
    }

    fn sort_key(&self) -> (usize, usize, &str, usize, i32) {
        (self.line, self.start, self.symbol, self.start + self.width, self.roles)
    }
}

/// Render `document`'s occurrences onto `source`.
///
/// Range columns are UTF-8 byte offsets, matching the index's text encoding.
pub fn render(source: &str, document: &Document) -> String {
    let comment = comment_syntax(&document.language);
    let documentation: HashMap<&str, &SymbolInformation> = document
        .symbols
        .iter()
        .map(|info| (info.symbol.as_str(), info))
        .collect();

    let lines: Vec<&str> = source.lines().collect();
    let mut annotations: Vec<Annotation> = document
        .occurrences
        .iter()
        .filter_map(|occurrence| Annotation::from_occurrence(occurrence, &lines))
        .collect();
    annotations.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    let mut out = String::with_capacity(source.len() * 2);
    let mut pending = annotations.iter().peekable();
    for (number, line) in lines.iter().enumerate() {
        out.push_str(line);
        out.push('\n');
        while let Some(annotation) = pending.next_if(|a| a.line == number) {
            push_annotation(&mut out, comment, annotation, &documentation);
        }
    }
    // occurrences past the end of the source
    for annotation in pending {
        push_annotation(&mut out, comment, annotation, &documentation);
    }

    out
}

fn push_annotation(
    out: &mut String,
    comment: &str,
    annotation: &Annotation<'_>,
    documentation: &HashMap<&str, &SymbolInformation>,
) {
    let comment_width = comment.len();
    let (indent, carets) = if annotation.start >= comment_width {
        let indent = format!("{comment}{}", " ".repeat(annotation.start - comment_width));
        let carets = "^".repeat(annotation.width.max(1));
        (indent, carets)
    } else {
        // starts inside the comment prefix: point at column 0
        (comment.to_string(), format!(" <{}", "^".repeat(annotation.width)))
    };

    out.push_str(&format!(
        "{indent}{carets} {} {}\n",
        role_label(annotation.roles),
        annotation.symbol
    ));

    if annotation.roles & SymbolRole::Definition as i32 == 0 {
        return;
    }
    let Some(info) = documentation.get(annotation.symbol) else {
        return;
    };

    let mut doc_lines = info.documentation.iter().flat_map(|doc| doc.lines());
    if let Some(first) = doc_lines.next() {
        out.push_str(&format!("{indent}documentation {first}\n"));
    }
    for line in doc_lines {
        out.push_str(&format!(
            "{indent}{}> {line}\n",
            " ".repeat(CONTINUATION_INDENT)
        ));
    }
}

/// Compare `rendered` against the golden file at `golden`.
///
/// A missing golden file counts as empty, so a new document always reports a
/// mismatch until it is written.
pub fn diff(golden: &Path, rendered: &str) -> SnapshotResult<()> {
    let expected = match fs::read_to_string(golden) {
        Ok(expected) => expected,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(SnapshotError::Io {
                path: golden.to_path_buf(),
                source: e,
            });
        }
    };

    if expected == rendered {
        return Ok(());
    }

    let label = golden.display().to_string();
    let diff = TextDiff::from_lines(expected.as_str(), rendered)
        .unified_diff()
        .context_radius(3)
        .header(&label, "obtained")
        .to_string();

    Err(SnapshotError::Mismatch {
        path: golden.to_path_buf(),
        diff,
    })
}

/// Write `rendered` to `path`, creating parent directories.
///
/// The content goes through a temp file in the target directory that is only
/// renamed into place once fully written.
pub fn write(path: &Path, rendered: &str) -> SnapshotResult<()> {
    let write_err = |reason: String| SnapshotError::Write {
        path: path.to_path_buf(),
        reason,
    };

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;

    let mut file = tempfile::NamedTempFile::new_in(parent).map_err(|e| write_err(e.to_string()))?;
    file.write_all(rendered.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|e| write_err(e.to_string()))?;
    file.persist(path)
        .map_err(|e| write_err(e.error.to_string()))?;

    Ok(())
}
