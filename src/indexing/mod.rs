pub mod analysis;
pub mod error;
pub mod merge;
pub mod namer;
pub mod pipeline;

pub use analysis::{
    AnalysisFile, Entity, EntityId, EntityOccurrence, FileAnalysis, Role, Visibility,
};
pub use error::{IndexError, IndexResult};
pub use merge::{IndexAccumulator, PartialIndex};
pub use namer::{FileNamer, NamingContext};
pub use pipeline::{
    FailurePolicy, FileFailure, Pipeline, PipelineConfig, PipelineReport, index_metadata,
};
