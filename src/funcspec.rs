//! Declared calling contracts.
//!
//! A [`FuncSpec`] lets two processes agree on a call's argument and result
//! shape without sharing source: the serving side declares the contract, the
//! calling side satisfies it slot by slot through the
//! [`Mapper`](crate::mapper::Mapper). Specs are immutable once built; use
//! [`FuncSpec::build`] to construct one.
//!
//! # Example
//!
//! ```
//! use plugwire::funcspec::FuncSpec;
//! use plugwire::wire::TypeTag;
//!
//! let spec = FuncSpec::build("mount_shared_folder")
//!     .arg(TypeTag::Machine)
//!     .named_arg("name", TypeTag::String)
//!     .named_arg("guestpath", TypeTag::Path)
//!     .result(TypeTag::Null)
//!     .finish();
//!
//! assert_eq!(spec.args.len(), 3);
//! assert_eq!(spec.named.get("guestpath").map(String::as_str), Some("Path"));
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::wire::{TypeTag, Value};

/// One declared argument or result slot: a type tag plus an optional name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncSpecValue {
    /// Slot name, empty if positional.
    #[serde(default)]
    pub name: String,
    /// Wire type tag the slot expects.
    pub type_tag: String,
}

impl FuncSpecValue {
    /// Positional slot for a tag.
    pub fn positional(tag: TypeTag) -> Self {
        Self {
            name: String::new(),
            type_tag: tag.as_str().to_string(),
        }
    }

    /// Named slot for a tag.
    pub fn named(name: impl Into<String>, tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            type_tag: tag.as_str().to_string(),
        }
    }
}

/// A declared calling contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncSpec {
    /// Contract name, usually the operation name.
    pub name: String,
    /// Ordered argument slots.
    pub args: Vec<FuncSpecValue>,
    /// Named slots: name to type tag.
    #[serde(default)]
    pub named: BTreeMap<String, String>,
    /// Ordered result slots.
    pub result: Vec<FuncSpecValue>,
}

impl FuncSpec {
    /// Start building a contract with the given name.
    pub fn build(name: impl Into<String>) -> FuncSpecBuilder {
        FuncSpecBuilder {
            name: name.into(),
            args: Vec::new(),
            named: BTreeMap::new(),
            result: Vec::new(),
        }
    }
}

/// Builder for [`FuncSpec`]; the result is immutable.
pub struct FuncSpecBuilder {
    name: String,
    args: Vec<FuncSpecValue>,
    named: BTreeMap<String, String>,
    result: Vec<FuncSpecValue>,
}

impl FuncSpecBuilder {
    /// Append a positional argument slot.
    pub fn arg(mut self, tag: TypeTag) -> Self {
        self.args.push(FuncSpecValue::positional(tag));
        self
    }

    /// Append a named argument slot. The slot is also recorded in the
    /// name-to-type map.
    pub fn named_arg(mut self, name: impl Into<String>, tag: TypeTag) -> Self {
        let name = name.into();
        self.named.insert(name.clone(), tag.as_str().to_string());
        self.args.push(FuncSpecValue::named(name, tag));
        self
    }

    /// Append a result slot.
    pub fn result(mut self, tag: TypeTag) -> Self {
        self.result.push(FuncSpecValue::positional(tag));
        self
    }

    /// Finish, producing the immutable contract.
    pub fn finish(self) -> FuncSpec {
        FuncSpec {
            name: self.name,
            args: self.args,
            named: self.named,
            result: self.result,
        }
    }
}

/// Wire arguments satisfying a [`FuncSpec`]: one [`Value`] per slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuncSpecArgs {
    /// Packed argument values, in slot order.
    pub args: Vec<Value>,
}

impl FuncSpecArgs {
    /// Wrap a list of packed values.
    pub fn new(args: Vec<Value>) -> Self {
        Self { args }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_orders_slots() {
        let spec = FuncSpec::build("execute")
            .arg(TypeTag::Machine)
            .arg(TypeTag::List)
            .result(TypeTag::Int)
            .finish();

        assert_eq!(spec.name, "execute");
        assert_eq!(spec.args[0].type_tag, "Target.Machine");
        assert_eq!(spec.args[1].type_tag, "List");
        assert_eq!(spec.result[0].type_tag, "Int");
        assert!(spec.named.is_empty());
    }

    #[test]
    fn test_named_slots_recorded_twice() {
        let spec = FuncSpec::build("mount")
            .named_arg("guestpath", TypeTag::Path)
            .finish();

        assert_eq!(spec.args[0].name, "guestpath");
        assert_eq!(spec.named["guestpath"], "Path");
    }

    #[test]
    fn test_spec_serializes() {
        let spec = FuncSpec::build("ping").result(TypeTag::Bool).finish();
        let json = serde_json::to_string(&spec).unwrap();
        let back: FuncSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
    }
}
