//! Error types for symbol construction.

use thiserror::Error;

/// Errors raised while naming a single entity.
///
/// Every variant is an internal-consistency failure: it aborts the entity being
/// named and surfaces as a per-file failure, never as a guessed symbol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    #[error("Grammar violation while encoding '{name}': {reason}")]
    GrammarViolation { name: String, reason: String },

    #[error("Cannot compose descriptor '{descriptor}' onto local symbol '{owner}'")]
    LocalOwner { owner: String, descriptor: String },

    #[error("Cannot compose descriptor '{descriptor}' onto the empty symbol")]
    EmptyOwner { descriptor: String },
}

impl SymbolError {
    pub(crate) fn grammar(name: &str, reason: impl Into<String>) -> Self {
        SymbolError::GrammarViolation {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

pub type SymbolResult<T> = Result<T, SymbolError>;
