//! Exhaustive per-tag conversion table.
//!
//! One encode and one decode arm per [`TypeTag`], fixed at compile time.
//! Containers nest full wire values so heterogeneous lists and maps survive
//! the trip. Domain references travel as descriptors and are resolved back to
//! live objects through the registered [`DomainResolver`].

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{DomainResolver, Machine, MachineDescriptor, Project, ProjectDescriptor};
use crate::error::{PlugwireError, Result};
use crate::wire::{PayloadCodec, TypeTag, Value};

/// A native value on this side of the wire.
///
/// Closed union of every registered primitive, container, and
/// domain-reference type. [`Native::tag`] gives the wire tag a value packs
/// under; equality is structural (domain objects compare by resource id).
#[derive(Debug, Clone, PartialEq)]
pub enum Native {
    /// Absent / nil.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Interned identifier.
    Symbol(String),
    /// Binary blob.
    Bytes(Vec<u8>),
    /// Ordered list.
    List(Vec<Native>),
    /// String-keyed map.
    Map(BTreeMap<String, Native>),
    /// Filesystem path.
    Path(PathBuf),
    /// Time duration.
    Duration(Duration),
    /// Bundle of positional values, flattened before argument matching.
    Direct(Vec<Native>),
    /// Live target machine.
    Machine(Arc<Machine>),
    /// Live project.
    Project(Arc<Project>),
}

impl Native {
    /// The wire tag this value packs under.
    pub fn tag(&self) -> TypeTag {
        match self {
            Native::Null => TypeTag::Null,
            Native::Bool(_) => TypeTag::Bool,
            Native::Int(_) => TypeTag::Int,
            Native::Float(_) => TypeTag::Float,
            Native::Str(_) => TypeTag::String,
            Native::Symbol(_) => TypeTag::Symbol,
            Native::Bytes(_) => TypeTag::Bytes,
            Native::List(_) => TypeTag::List,
            Native::Map(_) => TypeTag::Hash,
            Native::Path(_) => TypeTag::Path,
            Native::Duration(_) => TypeTag::TimeDuration,
            Native::Direct(_) => TypeTag::Direct,
            Native::Machine(_) => TypeTag::Machine,
            Native::Project(_) => TypeTag::Project,
        }
    }
}

/// Duration payload: msgpack has no native duration.
#[derive(Serialize, Deserialize)]
struct DurationPayload {
    secs: u64,
    nanos: u32,
}

/// Encode a native value into its tag and payload bytes.
pub(crate) fn encode(native: &Native) -> Result<(TypeTag, Vec<u8>)> {
    let tag = native.tag();
    let payload = match native {
        Native::Null => PayloadCodec::encode(&())?,
        Native::Bool(b) => PayloadCodec::encode(b)?,
        Native::Int(i) => PayloadCodec::encode(i)?,
        Native::Float(f) => PayloadCodec::encode(f)?,
        Native::Str(s) | Native::Symbol(s) => PayloadCodec::encode(s)?,
        Native::Bytes(b) => PayloadCodec::encode(&serde_bytes::Bytes::new(b))?,
        Native::List(items) | Native::Direct(items) => {
            let packed = items.iter().map(pack_element).collect::<Result<Vec<_>>>()?;
            PayloadCodec::encode(&packed)?
        }
        Native::Map(entries) => {
            let packed = entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), pack_element(v)?)))
                .collect::<Result<BTreeMap<String, Value>>>()?;
            PayloadCodec::encode(&packed)?
        }
        Native::Path(p) => PayloadCodec::encode(&p.to_string_lossy().into_owned())?,
        Native::Duration(d) => PayloadCodec::encode(&DurationPayload {
            secs: d.as_secs(),
            nanos: d.subsec_nanos(),
        })?,
        Native::Machine(m) => PayloadCodec::encode(&m.descriptor())?,
        Native::Project(p) => PayloadCodec::encode(&p.descriptor())?,
    };
    Ok((tag, payload))
}

fn pack_element(native: &Native) -> Result<Value> {
    let (tag, payload) = encode(native)?;
    Ok(Value::positional(tag, payload))
}

/// Decode payload bytes for a tag back into a native value.
///
/// Domain-reference tags require a resolver; decoding one without a resolver
/// is a Conversion error.
pub(crate) fn decode(
    tag: TypeTag,
    payload: &[u8],
    resolver: Option<&Arc<dyn DomainResolver>>,
) -> Result<Native> {
    let native = match tag {
        TypeTag::Null => {
            let _: () = PayloadCodec::decode(payload).unwrap_or(());
            Native::Null
        }
        TypeTag::Bool => Native::Bool(PayloadCodec::decode(payload)?),
        TypeTag::Int => Native::Int(PayloadCodec::decode(payload)?),
        TypeTag::Float => Native::Float(PayloadCodec::decode(payload)?),
        TypeTag::String => Native::Str(PayloadCodec::decode(payload)?),
        TypeTag::Symbol => Native::Symbol(PayloadCodec::decode(payload)?),
        TypeTag::Bytes => {
            let buf: serde_bytes::ByteBuf = PayloadCodec::decode(payload)?;
            Native::Bytes(buf.into_vec())
        }
        TypeTag::List => Native::List(unpack_elements(payload, resolver)?),
        TypeTag::Direct => Native::Direct(unpack_elements(payload, resolver)?),
        TypeTag::Hash => {
            let packed: BTreeMap<String, Value> = PayloadCodec::decode(payload)?;
            let entries = packed
                .into_iter()
                .map(|(k, v)| Ok((k, unpack_element(&v, resolver)?)))
                .collect::<Result<BTreeMap<String, Native>>>()?;
            Native::Map(entries)
        }
        TypeTag::Path => {
            let s: String = PayloadCodec::decode(payload)?;
            Native::Path(PathBuf::from(s))
        }
        TypeTag::TimeDuration => {
            let d: DurationPayload = PayloadCodec::decode(payload)?;
            Native::Duration(Duration::new(d.secs, d.nanos))
        }
        TypeTag::Machine => {
            let desc: MachineDescriptor = PayloadCodec::decode(payload)?;
            Native::Machine(require_resolver(resolver, tag)?.resolve_machine(&desc)?)
        }
        TypeTag::Project => {
            let desc: ProjectDescriptor = PayloadCodec::decode(payload)?;
            Native::Project(require_resolver(resolver, tag)?.resolve_project(&desc)?)
        }
    };
    Ok(native)
}

fn unpack_elements(
    payload: &[u8],
    resolver: Option<&Arc<dyn DomainResolver>>,
) -> Result<Vec<Native>> {
    let packed: Vec<Value> = PayloadCodec::decode(payload)?;
    packed
        .iter()
        .map(|v| unpack_element(v, resolver))
        .collect()
}

fn unpack_element(value: &Value, resolver: Option<&Arc<dyn DomainResolver>>) -> Result<Native> {
    decode(value.tag()?, &value.payload, resolver)
}

fn require_resolver<'a>(
    resolver: Option<&'a Arc<dyn DomainResolver>>,
    tag: TypeTag,
) -> Result<&'a Arc<dyn DomainResolver>> {
    resolver.ok_or_else(|| {
        PlugwireError::Conversion(format!(
            "cannot decode `{tag}' value: no domain resolver registered"
        ))
    })
}

/// Whether a value tagged `from` can possibly satisfy `to`.
///
/// Tag-level mirror of [`convert_to`]; lets callers skip decoding values that
/// cannot match.
pub(crate) fn tag_convertible(from: TypeTag, to: TypeTag) -> bool {
    if from == to {
        return true;
    }
    matches!(
        (from, to),
        (TypeTag::Int, TypeTag::Float)
            | (TypeTag::String, TypeTag::Path)
            | (TypeTag::String, TypeTag::Symbol)
            | (TypeTag::Symbol, TypeTag::String)
            | (TypeTag::Machine, TypeTag::Project)
    )
}

/// Attempt a registered conversion of a candidate toward a target tag.
///
/// Identity plus the registered widenings: Int to Float, String to Path or
/// Symbol, and Machine to its owning Project.
pub(crate) fn convert_to(candidate: &Native, to: TypeTag) -> Option<Native> {
    if candidate.tag() == to {
        return Some(candidate.clone());
    }
    match (candidate, to) {
        (Native::Int(i), TypeTag::Float) => Some(Native::Float(*i as f64)),
        (Native::Str(s), TypeTag::Path) => Some(Native::Path(PathBuf::from(s))),
        (Native::Str(s), TypeTag::Symbol) => Some(Native::Symbol(s.clone())),
        (Native::Symbol(s), TypeTag::String) => Some(Native::Str(s.clone())),
        (Native::Machine(m), TypeTag::Project) => Some(Native::Project(m.project.clone())),
        _ => None,
    }
}
