//! Symbol naming.
//!
//! A [`Symbol`] is one of three closed shapes:
//!
//! ```text
//! empty   ""
//! local   "local <n>"
//! global  "<scheme> <manager> <name> <version> <descriptor>*"
//! ```
//!
//! Global symbols are prefix-stable: the symbol of an enclosing entity is a
//! strict prefix of the symbol of anything it contains, so containment can be
//! recovered from the string alone.

pub mod descriptor;
pub mod error;
pub mod local;

pub use descriptor::{Descriptor, DescriptorKind, MAX_FRAGMENT_LEN, escape_name};
pub use error::{SymbolError, SymbolResult};
pub use local::LocalIdAllocator;

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum number of descriptors in one global symbol.
pub const MAX_DESCRIPTOR_DEPTH: usize = 128;

const LOCAL_PREFIX: &str = "local ";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbol {
    Empty,
    Local(u32),
    Global(GlobalSymbol),
}

/// A package-qualified symbol and the number of descriptors after its package.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GlobalSymbol {
    value: String,
    depth: usize,
}

impl GlobalSymbol {
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_package_root(&self) -> bool {
        self.depth == 0
    }
}

impl Symbol {
    pub fn empty() -> Self {
        Symbol::Empty
    }

    /// Local symbol; the caller guarantees `counter` is unique within the file.
    pub fn local(counter: u32) -> Self {
        Symbol::Local(counter)
    }

    /// Append `descriptor` to a global owner.
    ///
    /// Local and empty owners are rejected: anything nested under a local can
    /// never be referenced from another file and must be named locally instead.
    pub fn global(owner: &Symbol, descriptor: &Descriptor) -> SymbolResult<Symbol> {
        let owner = match owner {
            Symbol::Global(global) => global,
            Symbol::Local(_) => {
                return Err(SymbolError::LocalOwner {
                    owner: owner.to_string(),
                    descriptor: descriptor.to_string(),
                });
            }
            Symbol::Empty => {
                return Err(SymbolError::EmptyOwner {
                    descriptor: descriptor.to_string(),
                });
            }
        };

        let depth = owner.depth + 1;
        if depth > MAX_DESCRIPTOR_DEPTH {
            return Err(SymbolError::grammar(
                descriptor.name(),
                format!("descriptor chain exceeds {MAX_DESCRIPTOR_DEPTH} levels"),
            ));
        }

        let fragment = descriptor.encode()?;
        let mut value = String::with_capacity(owner.value.len() + fragment.len());
        value.push_str(&owner.value);
        value.push_str(&fragment);

        Ok(Symbol::Global(GlobalSymbol { value, depth }))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Symbol::Empty)
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Symbol::Local(_))
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Symbol::Global(_))
    }

    /// Textual form as written into the index.
    pub fn value(&self) -> Cow<'_, str> {
        match self {
            Symbol::Empty => Cow::Borrowed(""),
            Symbol::Local(n) => Cow::Owned(format!("{LOCAL_PREFIX}{n}")),
            Symbol::Global(global) => Cow::Borrowed(&global.value),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Empty => Ok(()),
            Symbol::Local(n) => write!(f, "{LOCAL_PREFIX}{n}"),
            Symbol::Global(global) => f.write_str(&global.value),
        }
    }
}

/// How a package name is rewritten before it becomes part of a root symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "rule")]
pub enum NameNormalization {
    /// Keep the name as given (after trimming).
    Verbatim,
    /// Replace the first `from` with `to`.
    FirstSeparator { from: char, to: char },
}

impl NameNormalization {
    pub fn apply(&self, name: &str) -> String {
        match self {
            NameNormalization::Verbatim => name.trim().to_string(),
            NameNormalization::FirstSeparator { from, to } => {
                let mut buf = [0u8; 4];
                name.replacen(*from, to.encode_utf8(&mut buf), 1)
                    .trim()
                    .to_string()
            }
        }
    }
}

/// The naming conventions of one package ecosystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ecosystem {
    pub scheme: String,
    pub normalization: NameNormalization,
}

impl Ecosystem {
    pub fn python() -> Self {
        Self {
            scheme: "scip-python".to_string(),
            normalization: NameNormalization::FirstSeparator { from: '.', to: '/' },
        }
    }

    pub fn typescript() -> Self {
        Self {
            scheme: "scip-typescript".to_string(),
            normalization: NameNormalization::Verbatim,
        }
    }
}

impl Default for Ecosystem {
    fn default() -> Self {
        Self::python()
    }
}

/// Builds symbols for one ecosystem.
#[derive(Debug, Clone, Default)]
pub struct SymbolBuilder {
    ecosystem: Ecosystem,
}

impl SymbolBuilder {
    pub fn new(ecosystem: Ecosystem) -> Self {
        Self { ecosystem }
    }

    pub fn ecosystem(&self) -> &Ecosystem {
        &self.ecosystem
    }

    pub fn empty(&self) -> Symbol {
        Symbol::empty()
    }

    pub fn local(&self, counter: u32) -> Symbol {
        Symbol::local(counter)
    }

    /// Package root symbol: `<scheme> <manager> <name> <version> `.
    pub fn package(&self, manager: &str, name: &str, version: &str) -> Symbol {
        let name = self.ecosystem.normalization.apply(name);
        let value = format!(
            "{} {} {} {} ",
            self.ecosystem.scheme,
            escape_package_field(manager),
            escape_package_field(&name),
            escape_package_field(version),
        );
        Symbol::Global(GlobalSymbol { value, depth: 0 })
    }

    pub fn global(&self, owner: &Symbol, descriptor: &Descriptor) -> SymbolResult<Symbol> {
        Symbol::global(owner, descriptor)
    }

    /// Fold a descriptor path onto `owner`.
    pub fn path<'a>(
        &self,
        owner: &Symbol,
        descriptors: impl IntoIterator<Item = &'a Descriptor>,
    ) -> SymbolResult<Symbol> {
        descriptors
            .into_iter()
            .try_fold(owner.clone(), |acc, descriptor| Symbol::global(&acc, descriptor))
    }
}

/// Package fields are space separated: spaces are doubled, empty becomes `.`.
fn escape_package_field(field: &str) -> Cow<'_, str> {
    if field.is_empty() {
        Cow::Borrowed(".")
    } else if field.contains(' ') {
        Cow::Owned(field.replace(' ', "  "))
    } else {
        Cow::Borrowed(field)
    }
}
