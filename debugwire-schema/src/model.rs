//! In-memory protocol description
//!
//! Mirrors the JSON document served by the remote process's discovery
//! endpoint (`/json/protocol`) and shipped as `browser_protocol.json` /
//! `js_protocol.json`. Pure data plus lookup helpers.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use debugwire_utils::{DebugwireError, Result};

/// Protocol version. Major/minor are strings on the wire but some
/// descriptions use numbers, so both are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersion {
    #[serde(deserialize_with = "string_or_number")]
    pub major: String,
    #[serde(deserialize_with = "string_or_number")]
    pub minor: String,
}

impl ProtocolVersion {
    pub fn new(major: impl Into<String>, minor: impl Into<String>) -> Self {
        Self {
            major: major.into(),
            minor: minor.into(),
        }
    }

    /// Module name for this version's bindings, e.g. `v1_3`
    pub fn module_name(&self) -> String {
        format!("v{}_{}", self.major, self.minor)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(serde_json::Number),
    }

    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}

/// Primitive or structural kind of a type descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Number,
    Integer,
    Boolean,
    String,
    Any,
    Object,
    Array,
    #[serde(other)]
    Unknown,
}

/// Element descriptor of an array: a reference, a primitive, an inline
/// object, or a nested array
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemDescriptor {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TypeKind>,
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertyDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ItemDescriptor>>,
}

/// A named member: an object property, command parameter, or return value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TypeKind>,
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<ItemDescriptor>,
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub experimental: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A declared type in a domain's `types` list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    #[serde(rename = "id")]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TypeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertyDef>,
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<ItemDescriptor>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub experimental: bool,
}

impl TypeDef {
    pub fn is_enum(&self) -> bool {
        !self.enum_values.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<PropertyDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub returns: Vec<PropertyDef>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub experimental: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<PropertyDef>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub experimental: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    #[serde(rename = "domain")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub types: Vec<TypeDef>,
    #[serde(default)]
    pub commands: Vec<CommandDef>,
    #[serde(default)]
    pub events: Vec<EventDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub experimental: bool,
    #[serde(default)]
    pub deprecated: bool,
}

impl Domain {
    pub fn type_def(&self, name: &str) -> Option<&TypeDef> {
        self.types.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn command(&self, name: &str) -> Option<&CommandDef> {
        self.commands.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn event(&self, name: &str) -> Option<&EventDef> {
        self.events.iter().find(|e| e.name.eq_ignore_ascii_case(name))
    }
}

/// A complete protocol description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtocolDescription {
    pub version: ProtocolVersion,
    #[serde(default)]
    pub domains: Vec<Domain>,
}

impl ProtocolDescription {
    pub fn parse_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| DebugwireError::SchemaParse(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| DebugwireError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse_json(&text).map_err(|e| match e {
            DebugwireError::SchemaParse(msg) => {
                DebugwireError::SchemaParse(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Case-insensitive domain lookup
    pub fn domain(&self, name: &str) -> Option<&Domain> {
        self.domains.iter().find(|d| d.name.eq_ignore_ascii_case(name))
    }

    /// Append the domains of another description (e.g. the JS half of a
    /// split protocol). Domains already present are skipped and returned.
    pub fn merge(&mut self, other: ProtocolDescription) -> Vec<String> {
        let mut skipped = Vec::new();
        for domain in other.domains {
            if self.domain(&domain.name).is_some() {
                tracing::warn!("Skipping duplicate domain {} while merging", domain.name);
                skipped.push(domain.name);
            } else {
                self.domains.push(domain);
            }
        }
        skipped
    }

    /// Total declared types, commands, and events
    pub fn item_count(&self) -> usize {
        self.domains
            .iter()
            .map(|d| d.types.len() + d.commands.len() + d.events.len())
            .sum()
    }
}
