//! Live package source backed by `pip`.
//!
//! Lists installed distributions with `pip list --format=json`, then asks
//! `pip show -f` for their files in batches so the command line stays bounded.

use std::path::PathBuf;
use std::process::Command;

use serde::Deserialize;

use super::source::PackageSource;
use super::{Package, PackageError, PackageResult};

const DEFAULT_BATCH_SIZE: usize = 256;

#[derive(Debug, Deserialize)]
struct PipListEntry {
    name: String,
}

#[derive(Debug, Clone)]
pub struct PipEnvironment {
    program: String,
    batch_size: usize,
}

impl Default for PipEnvironment {
    fn default() -> Self {
        Self::new("pip")
    }
}

impl PipEnvironment {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn run(&self, args: &[&str]) -> PackageResult<String> {
        let command = format!("{} {}", self.program, args.first().copied().unwrap_or_default());
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| PackageError::Command {
                command: command.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(PackageError::Command {
                command,
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl PackageSource for PipEnvironment {
    fn describe(&self) -> String {
        format!("live query via '{}'", self.program)
    }

    fn load(&self) -> PackageResult<Vec<Package>> {
        let listed = self.run(&["list", "--format=json"])?;
        let entries: Vec<PipListEntry> =
            serde_json::from_str(&listed).map_err(|e| PackageError::Command {
                command: format!("{} list", self.program),
                reason: format!("unexpected output: {e}"),
            })?;

        let mut packages = Vec::with_capacity(entries.len());
        for batch in entries.chunks(self.batch_size) {
            let mut args = vec!["show", "-f"];
            args.extend(batch.iter().map(|e| e.name.as_str()));
            let shown = self.run(&args)?;
            packages.extend(parse_pip_show(&shown));
        }

        tracing::info!("[packages] pip reported {} packages", packages.len());
        Ok(packages)
    }
}

/// Parse the output of `pip show -f`, one package per `---` separated block.
pub fn parse_pip_show(output: &str) -> Vec<Package> {
    output
        .split("\n---")
        .filter_map(parse_pip_show_block)
        .collect()
}

fn parse_pip_show_block(block: &str) -> Option<Package> {
    let mut name = None;
    let mut version = None;
    let mut location: Option<PathBuf> = None;
    let mut files = Vec::new();
    let mut in_files = false;

    for line in block.lines() {
        if in_files {
            if line.starts_with(char::is_whitespace) {
                let file = line.trim();
                if !file.is_empty() {
                    files.push(PathBuf::from(file));
                }
                continue;
            }
            in_files = false;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "Name" => name = Some(value.to_string()),
            "Version" => version = Some(value.to_string()),
            "Location" => location = Some(PathBuf::from(value)),
            "Files" => in_files = true,
            _ => {}
        }
    }

    let files = files.into_iter().map(|file| match &location {
        Some(location) => location.join(&file),
        None => file,
    });
    Some(Package::new(name?, version?, files))
}
