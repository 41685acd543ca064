//! Parallel naming pipeline
//!
//! ## Architecture
//!
//! ```text
//! [analyses] → NAME (rayon pool) → (seq, result) → MERGE (single thread) → Index
//! ```
//!
//! - **NAME**: one `FileNamer` per file, any thread, shared read-only registry
//! - **MERGE**: owns the `IndexAccumulator`; buffers out-of-order results and
//!   merges strictly by input sequence, so the document order of the finished
//!   index never depends on thread scheduling
//!
//! The metadata partial is merged before any document. A failed file is
//! recorded and never reaches the accumulator, whether it failed to load or
//! to name.
//!
//! ## Usage
//!
//! ```ignore
//! use symdex::indexing::{FileAnalysis, Pipeline, PipelineConfig, index_metadata};
//!
//! let pipeline = Pipeline::new(context, PipelineConfig::from_settings(&settings));
//! let files = FileAnalysis::load_dir(&analysis_dir)?;
//! let report = pipeline.run_files(index_metadata(&root, args), files)?;
//! ```

pub mod config;

pub use config::{FailurePolicy, PipelineConfig};

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, bounded};
use rayon::prelude::*;
use scip::types::{Index, Metadata, ProtocolVersion, TextEncoding, ToolInfo};

use super::analysis::{AnalysisFile, FileAnalysis};
use super::error::{IndexError, IndexResult};
use super::merge::{IndexAccumulator, PartialIndex};
use super::namer::{FileNamer, NamingContext};
use crate::{debug_event, log_event};

/// A file that could not be indexed.
#[derive(Debug)]
pub struct FileFailure {
    pub path: String,
    pub error: IndexError,
}

/// Result of one pipeline run.
#[derive(Debug)]
pub struct PipelineReport {
    pub index: Index,
    pub failures: Vec<FileFailure>,
    /// Number of documents merged into `index`
    pub indexed: usize,
    pub elapsed: Duration,
}

impl PipelineReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

type Sequenced = (usize, String, IndexResult<PartialIndex>);

/// One unit of work for the NAME stage.
trait NameInput: Send {
    fn label(&self) -> String;
    fn name(self, context: &NamingContext) -> IndexResult<PartialIndex>;
}

impl NameInput for &FileAnalysis {
    fn label(&self) -> String {
        self.relative_path.clone()
    }

    fn name(self, context: &NamingContext) -> IndexResult<PartialIndex> {
        FileNamer::new(context).name(self)
    }
}

impl NameInput for AnalysisFile {
    fn label(&self) -> String {
        AnalysisFile::label(self)
    }

    fn name(self, context: &NamingContext) -> IndexResult<PartialIndex> {
        FileNamer::new(context).name(&self.analysis?)
    }
}

/// Build the metadata record for an index rooted at `project_root`.
pub fn index_metadata(project_root: &Path, arguments: Vec<String>) -> Metadata {
    let root = std::path::absolute(project_root).unwrap_or_else(|_| project_root.to_path_buf());
    Metadata {
        version: ProtocolVersion::UnspecifiedProtocolVersion.into(),
        tool_info: Some(ToolInfo {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            arguments,
            ..Default::default()
        })
        .into(),
        project_root: format!("file://{}", root.display()),
        text_document_encoding: TextEncoding::UTF8.into(),
        ..Default::default()
    }
}

/// The parallel naming pipeline.
pub struct Pipeline {
    context: Arc<NamingContext>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(context: NamingContext, config: PipelineConfig) -> Self {
        Self {
            context: Arc::new(context),
            config,
        }
    }

    pub fn context(&self) -> &NamingContext {
        &self.context
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Name every analysis and assemble the index.
    ///
    /// With [`FailurePolicy::Continue`] failed files are listed in the report.
    /// With [`FailurePolicy::Abort`] the first failure (in input order) is
    /// returned as [`IndexError::Aborted`] and nothing after it is merged.
    pub fn run(&self, metadata: Metadata, analyses: &[FileAnalysis]) -> IndexResult<PipelineReport> {
        self.execute(metadata, analyses.par_iter(), analyses.len())
    }

    /// Like [`Pipeline::run`], for files loaded with [`FileAnalysis::load_dir`].
    ///
    /// A file that failed to load is a failure of that file under the
    /// configured policy, in its input position.
    pub fn run_files(
        &self,
        metadata: Metadata,
        files: Vec<AnalysisFile>,
    ) -> IndexResult<PipelineReport> {
        let total = files.len();
        self.execute(metadata, files.into_par_iter(), total)
    }

    fn execute<I>(&self, metadata: Metadata, inputs: I, total: usize) -> IndexResult<PipelineReport>
    where
        I: IndexedParallelIterator,
        I::Item: NameInput,
    {
        let start = Instant::now();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .thread_name(|i| format!("symdex-name-{i}"))
            .build()
            .map_err(|e| IndexError::Pipeline(format!("failed to build thread pool: {e}")))?;

        let (tx, rx) = bounded::<Sequenced>(self.config.channel_size);
        let abort = Arc::new(AtomicBool::new(false));

        let policy = self.config.failure_policy;
        let merger_abort = Arc::clone(&abort);
        let merge_handle = thread::spawn(move || merge_in_order(rx, metadata, policy, merger_abort));

        let context = self.context.as_ref();
        pool.install(|| {
            inputs
                .enumerate()
                .for_each_with(tx, |tx, (seq, input)| {
                    let label = input.label();
                    let result = if abort.load(Ordering::Relaxed) {
                        Ok(PartialIndex::default())
                    } else {
                        input.name(context)
                    };
                    if let Err(e) = tx.send((seq, label, result)) {
                        debug_event!("pipeline", "merger gone", "{}", e.into_inner().1);
                    }
                });
        });

        let outcome = merge_handle
            .join()
            .map_err(|_| IndexError::Pipeline("MERGE thread panicked".to_string()))?;

        if let Some(FileFailure { path, error }) = outcome.aborted {
            return Err(IndexError::Aborted {
                path,
                source: Box::new(error),
            });
        }

        let index = outcome.accumulator.finish()?;
        let elapsed = start.elapsed();

        log_event!(
            "pipeline",
            "complete",
            "indexed={} failed={} of {} files in {:?}",
            outcome.indexed,
            outcome.failures.len(),
            total,
            elapsed
        );

        Ok(PipelineReport {
            index,
            failures: outcome.failures,
            indexed: outcome.indexed,
            elapsed,
        })
    }
}

struct MergeOutcome {
    accumulator: IndexAccumulator,
    failures: Vec<FileFailure>,
    aborted: Option<FileFailure>,
    indexed: usize,
}

fn merge_in_order(
    rx: Receiver<Sequenced>,
    metadata: Metadata,
    policy: FailurePolicy,
    abort: Arc<AtomicBool>,
) -> MergeOutcome {
    let mut outcome = MergeOutcome {
        accumulator: IndexAccumulator::new(),
        failures: Vec::new(),
        aborted: None,
        indexed: 0,
    };
    outcome.accumulator.merge(PartialIndex::metadata(metadata));

    let mut pending: BTreeMap<usize, (String, IndexResult<PartialIndex>)> = BTreeMap::new();
    let mut next = 0;

    // Keep draining after an abort so no sender blocks on a full channel.
    for (seq, path, result) in rx {
        pending.insert(seq, (path, result));

        while let Some((path, result)) = pending.remove(&next) {
            next += 1;
            if outcome.aborted.is_some() {
                continue;
            }
            match result {
                Ok(partial) => {
                    outcome.indexed += partial.documents.len();
                    outcome.accumulator.merge(partial);
                }
                Err(error) => {
                    tracing::warn!("[pipeline] failed to index {path}: {error}");
                    let failure = FileFailure { path, error };
                    match policy {
                        FailurePolicy::Continue => outcome.failures.push(failure),
                        FailurePolicy::Abort => {
                            abort.store(true, Ordering::Relaxed);
                            outcome.aborted = Some(failure);
                        }
                    }
                }
            }
        }
    }

    outcome
}
