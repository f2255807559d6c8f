//! Type marshaling between native values and generic typed wire values.
//!
//! The [`Mapper`] is purely data transformation: no side effects, safe under
//! arbitrary concurrent use. Its four operations are the heart of the bridge:
//!
//! - [`Mapper::map`] - pick the first candidate convertible to a target tag
//! - [`Mapper::find_type`] - resolve a wire tag string
//! - [`Mapper::funcspec_map`] - unpack a request's values against expected types
//! - [`Mapper::generate_funcspec_args`] - satisfy an arbitrary declared
//!   contract from a pool of native values
//!
//! Round-tripped values compare equal for every registered type.

mod convert;

use std::collections::BTreeMap;
use std::sync::Arc;

pub use convert::Native;

use crate::domain::DomainResolver;
use crate::error::{PlugwireError, Result};
use crate::funcspec::{FuncSpec, FuncSpecArgs};
use crate::wire::{TypeTag, Value};

/// A candidate value in a mapping pool: a native value with an optional name.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgValue {
    /// Name, if this candidate arrived as a named argument.
    pub name: Option<String>,
    /// The value itself.
    pub value: Native,
}

impl ArgValue {
    /// Positional candidate.
    pub fn positional(value: Native) -> Self {
        Self { name: None, value }
    }

    /// Named candidate.
    pub fn named(name: impl Into<String>, value: Native) -> Self {
        Self {
            name: Some(name.into()),
            value,
        }
    }
}

/// Ambient pool of pre-seeded arguments consulted during contract generation.
#[derive(Debug, Clone, Default)]
pub struct Seeds {
    /// Positional seed values.
    pub typed: Vec<Native>,
    /// Named seed values.
    pub named: BTreeMap<String, Native>,
}

/// Converts between native values and typed wire values.
#[derive(Clone, Default)]
pub struct Mapper {
    resolver: Option<Arc<dyn DomainResolver>>,
}

impl Mapper {
    /// Mapper without a domain resolver. Decoding a domain-reference tag
    /// through it is a Conversion error.
    pub fn new() -> Self {
        Self { resolver: None }
    }

    /// Mapper with a registered domain resolver.
    pub fn with_resolver(resolver: Arc<dyn DomainResolver>) -> Self {
        Self {
            resolver: Some(resolver),
        }
    }

    /// Resolve a wire type tag to its native type descriptor.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the tag is unregistered.
    pub fn find_type(&self, tag: &str) -> Result<TypeTag> {
        TypeTag::parse(tag)
    }

    /// Pack a native value into a wire value under the given slot name.
    pub fn pack(&self, native: &Native, name: &str) -> Result<Value> {
        let (tag, payload) = convert::encode(native)?;
        Ok(if name.is_empty() {
            Value::positional(tag, payload)
        } else {
            Value::named(name, tag, payload)
        })
    }

    /// Unpack a wire value back to a native value.
    pub fn unpack(&self, value: &Value) -> Result<Native> {
        convert::decode(value.tag()?, &value.payload, self.resolver.as_ref())
    }

    /// Scan candidates for the first whose type converts to `to` and return
    /// the converted value.
    ///
    /// When `named` is given, candidates carrying that name are tried first;
    /// positional candidates remain a fallback.
    ///
    /// # Errors
    ///
    /// Returns `Conversion` if no candidate matches.
    pub fn map(&self, args: &[ArgValue], to: TypeTag, named: Option<&str>) -> Result<Native> {
        if let Some(wanted) = named {
            for arg in args {
                if arg.name.as_deref() == Some(wanted) {
                    if let Some(converted) = convert::convert_to(&arg.value, to) {
                        return Ok(converted);
                    }
                }
            }
        }
        for arg in args {
            if let Some(converted) = convert::convert_to(&arg.value, to) {
                return Ok(converted);
            }
        }
        Err(PlugwireError::Conversion(format!(
            "no argument matched type `{to}'{}",
            named.map(|n| format!(" (named `{n}')")).unwrap_or_default()
        )))
    }

    /// Unpack the values of a request against a list of expected types.
    ///
    /// Each expected type consumes the first not-yet-consumed wire value it
    /// can be satisfied from; values with unknown tags are explicitly filtered
    /// (logged and skipped), never silently dropped mid-decode.
    ///
    /// # Errors
    ///
    /// Returns `Conversion` if any expected type cannot be satisfied.
    pub fn funcspec_map(&self, request: &FuncSpecArgs, expect: &[TypeTag]) -> Result<Vec<Native>> {
        let mut consumed = vec![false; request.args.len()];
        let mut out = Vec::with_capacity(expect.len());

        for want in expect {
            let mut found = None;
            for (idx, value) in request.args.iter().enumerate() {
                if consumed[idx] {
                    continue;
                }
                let tag = match value.tag() {
                    Ok(tag) => tag,
                    Err(err) => {
                        tracing::warn!(
                            type_tag = %value.type_tag,
                            name = %value.name,
                            %err,
                            "filtering wire value with unknown type tag"
                        );
                        consumed[idx] = true;
                        continue;
                    }
                };
                if !convert::tag_convertible(tag, *want) {
                    continue;
                }
                let native = self.unpack(value)?;
                if let Some(converted) = convert::convert_to(&native, *want) {
                    consumed[idx] = true;
                    found = Some(converted);
                    break;
                }
            }
            match found {
                Some(native) => out.push(native),
                None => {
                    return Err(PlugwireError::Conversion(format!(
                        "request has no value satisfying expected type `{want}'"
                    )))
                }
            }
        }
        Ok(out)
    }

    /// As [`Mapper::funcspec_map`] with a single expected type.
    pub fn funcspec_map_one(&self, request: &FuncSpecArgs, expect: TypeTag) -> Result<Native> {
        let mut values = self.funcspec_map(request, &[expect])?;
        Ok(values.remove(0))
    }

    /// Satisfy an arbitrary declared contract from a pool of native values.
    ///
    /// For every argument slot declared by `spec`, picks a matching value from
    /// `args` (plus the ambient `seeds` pool, plus the flattened contents of
    /// any `Direct` bundles) by name first and type second, and packs it as a
    /// wire value under the slot's declared name and tag. Pool values are not
    /// consumed: two slots of the same type see the same candidates.
    ///
    /// # Errors
    ///
    /// Returns `Conversion` if any slot cannot be satisfied, `NotFound` if the
    /// spec declares an unregistered tag.
    pub fn generate_funcspec_args(
        &self,
        spec: &FuncSpec,
        args: &[Native],
        seeds: Option<&Seeds>,
    ) -> Result<FuncSpecArgs> {
        let mut pool: Vec<ArgValue> = args
            .iter()
            .cloned()
            .map(ArgValue::positional)
            .collect();
        if let Some(seeds) = seeds {
            pool.extend(seeds.typed.iter().cloned().map(ArgValue::positional));
            pool.extend(
                seeds
                    .named
                    .iter()
                    .map(|(name, value)| ArgValue::named(name.clone(), value.clone())),
            );
        }
        // Direct bundles contribute their contents as positional candidates.
        let flattened: Vec<ArgValue> = pool
            .iter()
            .filter_map(|arg| match &arg.value {
                Native::Direct(items) => Some(items.clone()),
                _ => None,
            })
            .flatten()
            .map(ArgValue::positional)
            .collect();
        pool.extend(flattened);

        let mut packed = Vec::with_capacity(spec.args.len());
        for slot in &spec.args {
            let tag = self.find_type(&slot.type_tag)?;
            tracing::trace!(spec = %spec.name, slot = %slot.name, %tag, "generating funcspec arg");
            let named = if slot.name.is_empty() {
                None
            } else {
                Some(slot.name.as_str())
            };
            let native = self.map(&pool, tag, named)?;
            packed.push(self.pack(&native, &slot.name)?);
        }
        Ok(FuncSpecArgs::new(packed))
    }
}

impl std::fmt::Debug for Mapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapper")
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Machine, MachineDescriptor, Project, ProjectDescriptor};
    use std::path::PathBuf;
    use std::time::Duration;

    struct FixtureResolver;

    impl DomainResolver for FixtureResolver {
        fn resolve_machine(&self, desc: &MachineDescriptor) -> Result<Arc<Machine>> {
            Ok(Arc::new(Machine {
                resource_id: desc.resource_id.clone(),
                name: desc.name.clone(),
                project: self.resolve_project(&desc.project)?,
            }))
        }

        fn resolve_project(&self, desc: &ProjectDescriptor) -> Result<Arc<Project>> {
            Ok(Arc::new(Project {
                resource_id: desc.resource_id.clone(),
                path: PathBuf::from(&desc.path),
            }))
        }
    }

    fn mapper() -> Mapper {
        Mapper::with_resolver(Arc::new(FixtureResolver))
    }

    fn machine() -> Arc<Machine> {
        Arc::new(Machine {
            resource_id: "m-7".to_string(),
            name: "web".to_string(),
            project: Arc::new(Project {
                resource_id: "p-7".to_string(),
                path: PathBuf::from("/srv/site"),
            }),
        })
    }

    #[test]
    fn test_pack_unpack_round_trip_all_registered_types() {
        let m = mapper();
        let cases = vec![
            Native::Str("hello".to_string()),
            Native::Int(9000),
            Native::Float(0.25),
            Native::Bool(false),
            Native::Null,
            Native::Symbol("halt".to_string()),
            Native::List(vec![Native::Int(1), Native::Int(2)]),
            Native::Map(BTreeMap::from([(
                "owner".to_string(),
                Native::Str("root".to_string()),
            )])),
            Native::Path(PathBuf::from("/mnt/shared")),
            Native::Duration(Duration::from_millis(1500)),
            Native::Machine(machine()),
        ];
        for native in cases {
            let value = m.pack(&native, "").unwrap();
            assert_eq!(m.unpack(&value).unwrap(), native);
        }
    }

    #[test]
    fn test_find_type_not_found() {
        let err = mapper().find_type("Gopher").unwrap_err();
        assert!(matches!(err, PlugwireError::NotFound(_)));
    }

    #[test]
    fn test_map_prefers_named_candidate() {
        let m = mapper();
        let pool = vec![
            ArgValue::positional(Native::Str("positional".to_string())),
            ArgValue::named("guestpath", Native::Str("/mnt/shared".to_string())),
        ];
        let got = m.map(&pool, TypeTag::String, Some("guestpath")).unwrap();
        assert_eq!(got, Native::Str("/mnt/shared".to_string()));
    }

    #[test]
    fn test_map_falls_back_to_type_match() {
        let m = mapper();
        let pool = vec![ArgValue::positional(Native::Int(5))];
        // no candidate named "count"; the int still satisfies by type
        let got = m.map(&pool, TypeTag::Int, Some("count")).unwrap();
        assert_eq!(got, Native::Int(5));
    }

    #[test]
    fn test_map_conversion_error() {
        let m = mapper();
        let pool = vec![ArgValue::positional(Native::Bool(true))];
        let err = m.map(&pool, TypeTag::Path, None).unwrap_err();
        assert!(matches!(err, PlugwireError::Conversion(_)));
    }

    #[test]
    fn test_generate_then_map_is_identity() {
        let m = mapper();
        let spec = FuncSpec::build("configure_networks")
            .arg(TypeTag::String)
            .arg(TypeTag::Int)
            .arg(TypeTag::Path)
            .finish();
        let args = vec![
            Native::Str("eth0".to_string()),
            Native::Int(2),
            Native::Path(PathBuf::from("/etc/network")),
        ];

        let wire = m.generate_funcspec_args(&spec, &args, None).unwrap();
        let back = m
            .funcspec_map(&wire, &[TypeTag::String, TypeTag::Int, TypeTag::Path])
            .unwrap();
        assert_eq!(back, args);
    }

    #[test]
    fn test_generate_uses_seeds() {
        let m = mapper();
        let spec = FuncSpec::build("mount")
            .named_arg("guestpath", TypeTag::Path)
            .finish();
        let seeds = Seeds {
            typed: vec![],
            named: BTreeMap::from([(
                "guestpath".to_string(),
                Native::Path(PathBuf::from("/mnt/shared")),
            )]),
        };

        let wire = m.generate_funcspec_args(&spec, &[], Some(&seeds)).unwrap();
        assert_eq!(wire.args[0].name, "guestpath");
        assert_eq!(
            m.unpack(&wire.args[0]).unwrap(),
            Native::Path(PathBuf::from("/mnt/shared"))
        );
    }

    #[test]
    fn test_generate_flattens_direct_bundles() {
        let m = mapper();
        let spec = FuncSpec::build("halt").arg(TypeTag::Int).finish();
        let args = vec![Native::Direct(vec![Native::Int(30)])];

        let wire = m.generate_funcspec_args(&spec, &args, None).unwrap();
        assert_eq!(m.unpack(&wire.args[0]).unwrap(), Native::Int(30));
    }

    #[test]
    fn test_funcspec_map_filters_unknown_tags() {
        let m = mapper();
        let mystery = Value {
            name: String::new(),
            type_tag: "Mystery".to_string(),
            payload: vec![0xc0],
        };
        let known = m.pack(&Native::Int(3), "").unwrap();
        let request = FuncSpecArgs::new(vec![mystery, known]);

        let got = m.funcspec_map(&request, &[TypeTag::Int]).unwrap();
        assert_eq!(got, vec![Native::Int(3)]);
    }

    #[test]
    fn test_funcspec_map_resolves_machine_descriptor() {
        let m = mapper();
        let value = m.pack(&Native::Machine(machine()), "").unwrap();
        let request = FuncSpecArgs::new(vec![value]);

        let got = m.funcspec_map_one(&request, TypeTag::Machine).unwrap();
        match got {
            Native::Machine(mach) => {
                assert_eq!(mach.resource_id, "m-7");
                assert_eq!(mach.project.resource_id, "p-7");
            }
            other => panic!("expected machine, got {other:?}"),
        }
    }

    #[test]
    fn test_machine_satisfies_project_slot() {
        let m = mapper();
        let value = m.pack(&Native::Machine(machine()), "").unwrap();
        let request = FuncSpecArgs::new(vec![value]);

        let got = m.funcspec_map_one(&request, TypeTag::Project).unwrap();
        match got {
            Native::Project(p) => assert_eq!(p.resource_id, "p-7"),
            other => panic!("expected project, got {other:?}"),
        }
    }

    #[test]
    fn test_funcspec_map_unsatisfied_type_is_conversion_error() {
        let m = mapper();
        let request = FuncSpecArgs::new(vec![m.pack(&Native::Bool(true), "").unwrap()]);
        let err = m.funcspec_map(&request, &[TypeTag::TimeDuration]).unwrap_err();
        assert!(matches!(err, PlugwireError::Conversion(_)));
    }
}
