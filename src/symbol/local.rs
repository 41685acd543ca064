//! Per-file local symbol numbering.

use super::Symbol;

/// Issues `local <n>` ids for one file-indexing pass.
///
/// Owned by the pass that creates it and dropped when the pass ends, so ids
/// never leak between files. Not shared across threads.
#[derive(Debug, Default)]
pub struct LocalIdAllocator {
    next: u32,
}

impl LocalIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the current id and advance.
    pub fn next(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Allocate the next id as a local symbol.
    pub fn next_symbol(&mut self) -> Symbol {
        Symbol::local(self.next())
    }

    /// Number of ids issued so far.
    pub fn issued(&self) -> u32 {
        self.next
    }
}
