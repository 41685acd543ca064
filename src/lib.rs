pub mod config;
pub mod indexing;
pub mod logging;
pub mod package;
pub mod project;
pub mod snapshot;
pub mod storage;
pub mod symbol;

pub use config::Settings;
pub use indexing::{
    AnalysisFile, FailurePolicy, FileAnalysis, FileNamer, IndexAccumulator, IndexError,
    NamingContext, PartialIndex, Pipeline, PipelineConfig, PipelineReport,
};
pub use package::{Owner, Package, PackageError, PackageRegistry, PackageSource};
pub use project::ProjectIdentity;
pub use snapshot::{SnapshotError, SnapshotMode, SnapshotSuite};
pub use storage::{IndexPersistence, StorageError, load_index, save_index};
pub use symbol::{
    Descriptor, DescriptorKind, Ecosystem, LocalIdAllocator, Symbol, SymbolBuilder, SymbolError,
};
