//! Wire type tags.
//!
//! Every [`Value`](super::Value) carries a string tag identifying exactly how
//! its payload bytes are interpreted. The set of tags is closed: dispatch over
//! tags is an exhaustive `match`, and the string form exists only at the wire
//! boundary. An unrecognized tag fails loudly with `NotFound` instead of being
//! silently dropped.

use serde::{Deserialize, Serialize};

use crate::error::{PlugwireError, Result};

/// Closed set of wire type tags.
///
/// Tags cover the registered primitive, container, and domain-reference types.
/// `Direct` bundles positional values that are flattened into the candidate
/// pool before argument matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    /// Absent / nil value.
    Null,
    /// Boolean.
    Bool,
    /// Signed 64-bit integer.
    Int,
    /// 64-bit float.
    Float,
    /// UTF-8 string.
    String,
    /// Interned identifier (capability names, option keys).
    Symbol,
    /// Opaque binary blob.
    Bytes,
    /// Ordered list of wire values.
    List,
    /// String-keyed map of wire values.
    Hash,
    /// Filesystem path.
    Path,
    /// Time duration.
    TimeDuration,
    /// Bundle of positional values, flattened before matching.
    Direct,
    /// Reference to a target machine.
    Machine,
    /// Reference to a project (the machine's owning environment).
    Project,
}

/// All tags, in declaration order. Backs wire-string resolution.
pub(crate) const ALL_TAGS: &[TypeTag] = &[
    TypeTag::Null,
    TypeTag::Bool,
    TypeTag::Int,
    TypeTag::Float,
    TypeTag::String,
    TypeTag::Symbol,
    TypeTag::Bytes,
    TypeTag::List,
    TypeTag::Hash,
    TypeTag::Path,
    TypeTag::TimeDuration,
    TypeTag::Direct,
    TypeTag::Machine,
    TypeTag::Project,
];

impl TypeTag {
    /// Wire string form of this tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Null => "Null",
            TypeTag::Bool => "Bool",
            TypeTag::Int => "Int",
            TypeTag::Float => "Float",
            TypeTag::String => "String",
            TypeTag::Symbol => "Symbol",
            TypeTag::Bytes => "Bytes",
            TypeTag::List => "List",
            TypeTag::Hash => "Hash",
            TypeTag::Path => "Path",
            TypeTag::TimeDuration => "TimeDuration",
            TypeTag::Direct => "Direct",
            TypeTag::Machine => "Target.Machine",
            TypeTag::Project => "Project",
        }
    }

    /// Resolve a wire tag string to its tag.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the tag is not registered.
    pub fn parse(name: &str) -> Result<Self> {
        ALL_TAGS
            .iter()
            .copied()
            .find(|t| t.as_str() == name)
            .ok_or_else(|| PlugwireError::NotFound(format!("wire type tag `{name}'")))
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
