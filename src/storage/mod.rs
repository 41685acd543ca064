pub mod error;
pub mod persistence;

pub use error::{StorageError, StorageResult};
pub use persistence::{IndexPersistence, load_index, save_index};
