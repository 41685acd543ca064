//! Descriptor encoding.
//!
//! A descriptor is one segment of a global symbol's path: an escaped name plus a
//! kind-specific suffix. Encoding is injective over valid descriptors, so two
//! distinct (name, kind, disambiguator) triples never produce the same fragment.
//!
//! | kind           | fragment            |
//! |----------------|---------------------|
//! | namespace      | `name/`             |
//! | type           | `name#`             |
//! | term           | `name.`             |
//! | method         | `name(disambig).`   |
//! | type parameter | `[name]`            |
//! | parameter      | `(name)`            |
//! | meta           | `name:`             |

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{SymbolError, SymbolResult};

/// Upper bound on the byte length of one encoded fragment.
pub const MAX_FRAGMENT_LEN: usize = 1024;

const QUOTE: char = '`';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorKind {
    Namespace,
    Type,
    Term,
    Method,
    TypeParameter,
    Parameter,
    Meta,
}

impl DescriptorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Namespace => "namespace",
            Self::Type => "type",
            Self::Term => "term",
            Self::Method => "method",
            Self::TypeParameter => "type_parameter",
            Self::Parameter => "parameter",
            Self::Meta => "meta",
        }
    }
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One path segment of a global symbol.
///
/// The disambiguator is only carried by methods; an empty string means none.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Descriptor {
    name: String,
    kind: DescriptorKind,
    disambiguator: String,
}

impl Descriptor {
    /// Build a descriptor from an analyzer triple.
    ///
    /// Rejects a disambiguator on any kind other than [`DescriptorKind::Method`],
    /// since the grammar has nowhere to put it.
    pub fn new(
        name: impl Into<String>,
        kind: DescriptorKind,
        disambiguator: impl Into<String>,
    ) -> SymbolResult<Self> {
        let name = name.into();
        let disambiguator = disambiguator.into();
        if kind != DescriptorKind::Method && !disambiguator.is_empty() {
            return Err(SymbolError::grammar(
                &name,
                format!("{kind} descriptors cannot carry disambiguator '{disambiguator}'"),
            ));
        }
        Ok(Self {
            name,
            kind,
            disambiguator,
        })
    }

    fn plain(name: impl Into<String>, kind: DescriptorKind) -> Self {
        Self {
            name: name.into(),
            kind,
            disambiguator: String::new(),
        }
    }

    pub fn namespace(name: impl Into<String>) -> Self {
        Self::plain(name, DescriptorKind::Namespace)
    }

    pub fn type_(name: impl Into<String>) -> Self {
        Self::plain(name, DescriptorKind::Type)
    }

    pub fn term(name: impl Into<String>) -> Self {
        Self::plain(name, DescriptorKind::Term)
    }

    pub fn method(name: impl Into<String>, disambiguator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DescriptorKind::Method,
            disambiguator: disambiguator.into(),
        }
    }

    pub fn type_parameter(name: impl Into<String>) -> Self {
        Self::plain(name, DescriptorKind::TypeParameter)
    }

    pub fn parameter(name: impl Into<String>) -> Self {
        Self::plain(name, DescriptorKind::Parameter)
    }

    pub fn meta(name: impl Into<String>) -> Self {
        Self::plain(name, DescriptorKind::Meta)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DescriptorKind {
        self.kind
    }

    pub fn disambiguator(&self) -> &str {
        &self.disambiguator
    }

    /// Encode into a symbol fragment.
    pub fn encode(&self) -> SymbolResult<String> {
        let name = escape_name(&self.name);
        let fragment = match self.kind {
            DescriptorKind::Namespace => format!("{name}/"),
            DescriptorKind::Type => format!("{name}#"),
            DescriptorKind::Term => format!("{name}."),
            DescriptorKind::Method => {
                if self.disambiguator.is_empty() {
                    format!("{name}().")
                } else {
                    format!("{name}({}).", escape_name(&self.disambiguator))
                }
            }
            DescriptorKind::TypeParameter => format!("[{name}]"),
            DescriptorKind::Parameter => format!("({name})"),
            DescriptorKind::Meta => format!("{name}:"),
        };

        if fragment.len() > MAX_FRAGMENT_LEN {
            return Err(SymbolError::grammar(
                &self.name,
                format!(
                    "encoded fragment is {} bytes, limit is {MAX_FRAGMENT_LEN}",
                    fragment.len()
                ),
            ));
        }

        Ok(fragment)
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.disambiguator.is_empty() {
            write!(f, "{} {}", self.kind, self.name)
        } else {
            write!(f, "{} {}({})", self.kind, self.name, self.disambiguator)
        }
    }
}

fn is_simple_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-' | '$')
}

/// Escape a descriptor name.
///
/// Simple identifiers pass through unchanged. Anything else, the empty name
/// included, is wrapped in backticks with internal backticks doubled.
pub fn escape_name(name: &str) -> Cow<'_, str> {
    if !name.is_empty() && name.chars().all(is_simple_identifier_char) {
        return Cow::Borrowed(name);
    }

    let mut escaped = String::with_capacity(name.len() + 2);
    escaped.push(QUOTE);
    for c in name.chars() {
        if c == QUOTE {
            escaped.push(QUOTE);
        }
        escaped.push(c);
    }
    escaped.push(QUOTE);
    Cow::Owned(escaped)
}
