//! Type reference resolution
//!
//! A [`ResolverContext`] is built in a first pass over every domain so that
//! references may point forward or across domains. It maps each declared
//! `(domain, type)` to the Rust type used wherever that type is referenced.

use std::collections::{BTreeSet, HashMap};

use debugwire_utils::{DebugwireError, Result};

use crate::config::CodegenConfig;
use crate::model::{Domain, ItemDescriptor, PropertyDef, TypeKind};
use crate::naming::{module_ident, type_ident};

/// The Rust type a descriptor resolves to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolvedType {
    F64,
    I64,
    Bool,
    String,
    Any,
    /// Untyped object: `serde_json::Map<String, Value>`
    OpenMap,
    /// `HashMap<String, String>`
    StringMap,
    Vec(Box<ResolvedType>),
    /// A declared or synthesized record/enum/alias
    Named { domain: String, name: String },
}

impl ResolvedType {
    pub fn named(domain: &str, name: &str) -> Self {
        ResolvedType::Named {
            domain: domain.to_string(),
            name: name.to_string(),
        }
    }

    /// Rust source for this type as seen from `current_domain`'s module
    pub fn render(&self, current_domain: &str) -> String {
        match self {
            ResolvedType::F64 => "f64".to_string(),
            ResolvedType::I64 => "i64".to_string(),
            ResolvedType::Bool => "bool".to_string(),
            ResolvedType::String => "String".to_string(),
            ResolvedType::Any => "serde_json::Value".to_string(),
            ResolvedType::OpenMap => "serde_json::Map<String, serde_json::Value>".to_string(),
            ResolvedType::StringMap => "std::collections::HashMap<String, String>".to_string(),
            ResolvedType::Vec(inner) => format!("Vec<{}>", inner.render(current_domain)),
            ResolvedType::Named { domain, name } => {
                if domain == current_domain {
                    type_ident(name)
                } else {
                    format!("super::{}::{}", module_ident(domain), type_ident(name))
                }
            }
        }
    }

    /// Named types reachable from this one, for dependency tracking
    pub fn collect_named(&self, out: &mut BTreeSet<(String, String)>) {
        match self {
            ResolvedType::Vec(inner) => inner.collect_named(out),
            ResolvedType::Named { domain, name } => {
                out.insert((domain.clone(), name.clone()));
            }
            _ => {}
        }
    }
}

fn primitive(kind: TypeKind) -> Option<ResolvedType> {
    match kind {
        TypeKind::Number => Some(ResolvedType::F64),
        TypeKind::Integer => Some(ResolvedType::I64),
        TypeKind::Boolean => Some(ResolvedType::Bool),
        TypeKind::String => Some(ResolvedType::String),
        TypeKind::Any => Some(ResolvedType::Any),
        TypeKind::Object => Some(ResolvedType::OpenMap),
        TypeKind::Array | TypeKind::Unknown => None,
    }
}

/// An array of inline objects needs a record type of its own
#[derive(Debug, Clone, PartialEq)]
pub struct InlineRecord {
    pub name: String,
    pub properties: Vec<PropertyDef>,
}

#[derive(Debug, Clone, Default)]
struct DomainTypes {
    name: String,
    types: HashMap<String, ResolvedType>,
}

/// Per-run lookup table of every declared type
#[derive(Debug, Clone, Default)]
pub struct ResolverContext {
    // keyed by lowercased domain name
    domains: HashMap<String, DomainTypes>,
}

impl ResolverContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context over all domains, applying configured overrides
    pub fn build<'a>(domains: impl IntoIterator<Item = &'a Domain>, config: &CodegenConfig) -> Self {
        let mut ctx = Self::new();
        for domain in domains {
            ctx.register_domain(domain, config);
        }
        ctx
    }

    pub fn register_domain(&mut self, domain: &Domain, config: &CodegenConfig) {
        let entry = self
            .domains
            .entry(domain.name.to_ascii_lowercase())
            .or_insert_with(|| DomainTypes {
                name: domain.name.clone(),
                types: HashMap::new(),
            });

        for def in &domain.types {
            let resolved = match config.override_for(&domain.name, &def.name) {
                Some(rust_type) => rust_type.resolved(),
                None => ResolvedType::named(&domain.name, &def.name),
            };
            entry.types.insert(def.name.clone(), resolved);
        }
    }

    pub fn has_domain(&self, name: &str) -> bool {
        self.domains.contains_key(&name.to_ascii_lowercase())
    }

    /// Whether a declared type was replaced by an override
    pub fn is_overridden(&self, domain: &str, type_name: &str) -> bool {
        self.declared(domain, type_name)
            .is_some_and(|t| !matches!(t, ResolvedType::Named { .. }))
    }

    fn declared(&self, domain: &str, type_name: &str) -> Option<&ResolvedType> {
        self.domains
            .get(&domain.to_ascii_lowercase())
            .and_then(|d| d.types.get(type_name))
    }

    /// Resolve a `$ref`. `Name` looks in `current_domain` first, then in
    /// any domain declaring a unique match; `Domain.Name` is qualified.
    pub fn resolve_reference(&self, current_domain: &str, reference: &str) -> Result<ResolvedType> {
        let unresolved = || DebugwireError::UnresolvedReference {
            domain: current_domain.to_string(),
            reference: reference.to_string(),
        };

        if let Some((domain, name)) = reference.split_once('.') {
            return self.declared(domain, name).cloned().ok_or_else(unresolved);
        }

        if let Some(found) = self.declared(current_domain, reference) {
            return Ok(found.clone());
        }

        // Unqualified reference into another domain: accept only if unambiguous
        let mut matches: Vec<&DomainTypes> = self
            .domains
            .values()
            .filter(|d| d.types.contains_key(reference))
            .collect();
        if matches.len() == 1 {
            if let Some(found) = matches.pop().and_then(|d| d.types.get(reference)) {
                return Ok(found.clone());
            }
        }
        Err(unresolved())
    }

    /// Canonical (declared) spelling of a domain name
    pub fn domain_name(&self, name: &str) -> Option<&str> {
        self.domains
            .get(&name.to_ascii_lowercase())
            .map(|d| d.name.as_str())
    }

    /// Resolve a property. Arrays of inline objects push a record named
    /// `{owner}{Property}Item` onto `inline`.
    pub fn resolve_property(
        &self,
        current_domain: &str,
        owner: &str,
        property: &PropertyDef,
        inline: &mut Vec<InlineRecord>,
    ) -> Result<ResolvedType> {
        let item = format!("{}.{}", owner, property.name);

        if let Some(reference) = &property.reference {
            return self.resolve_reference(current_domain, reference);
        }

        match property.kind {
            Some(TypeKind::Array) => {
                let items = property.items.as_ref().ok_or_else(|| {
                    DebugwireError::malformed(&item, "array property without items")
                })?;
                let record_name = format!("{}{}Item", owner, type_ident(&property.name));
                self.resolve_items(current_domain, &record_name, items, inline)
            }
            Some(TypeKind::Unknown) => Err(DebugwireError::malformed(&item, "unknown type kind")),
            Some(kind) => primitive(kind)
                .ok_or_else(|| DebugwireError::malformed(&item, "unsupported type kind")),
            None => Err(DebugwireError::malformed(
                &item,
                "property has neither type nor $ref",
            )),
        }
    }

    /// Resolve an array element descriptor to `Vec<...>`
    pub fn resolve_items(
        &self,
        current_domain: &str,
        record_name: &str,
        items: &ItemDescriptor,
        inline: &mut Vec<InlineRecord>,
    ) -> Result<ResolvedType> {
        if let Some(reference) = &items.reference {
            let inner = self.resolve_reference(current_domain, reference)?;
            return Ok(ResolvedType::Vec(Box::new(inner)));
        }

        let inner = match items.kind {
            Some(TypeKind::Array) => {
                let nested = items.items.as_deref().ok_or_else(|| {
                    DebugwireError::malformed(record_name, "nested array without items")
                })?;
                self.resolve_items(current_domain, record_name, nested, inline)?
            }
            Some(TypeKind::Object) | None if !items.properties.is_empty() => {
                inline.push(InlineRecord {
                    name: record_name.to_string(),
                    properties: items.properties.clone(),
                });
                ResolvedType::named(current_domain, record_name)
            }
            None => {
                return Err(DebugwireError::malformed(
                    record_name,
                    "array items have neither type nor $ref",
                ))
            }
            Some(TypeKind::Unknown) => {
                return Err(DebugwireError::malformed(record_name, "unknown item kind"))
            }
            Some(kind) => primitive(kind).ok_or_else(|| {
                DebugwireError::malformed(record_name, "unsupported item kind")
            })?,
        };
        Ok(ResolvedType::Vec(Box::new(inner)))
    }
}
