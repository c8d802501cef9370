//! Generator configuration, read from the `[codegen]` table of config.toml

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::resolver::ResolvedType;

/// Replacement Rust type for a declared protocol type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideType {
    /// `HashMap<String, String>`
    StringMap,
    /// `serde_json::Map<String, Value>`
    OpenMap,
    /// `serde_json::Value`
    Any,
    String,
}

impl OverrideType {
    pub fn resolved(self) -> ResolvedType {
        match self {
            OverrideType::StringMap => ResolvedType::StringMap,
            OverrideType::OpenMap => ResolvedType::OpenMap,
            OverrideType::Any => ResolvedType::Any,
            OverrideType::String => ResolvedType::String,
        }
    }
}

/// Forces a declared type to a fixed Rust type instead of its descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeOverride {
    pub domain: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub rust_type: OverrideType,
}

impl TypeOverride {
    pub fn new(domain: &str, type_name: &str, rust_type: OverrideType) -> Self {
        Self {
            domain: domain.to_string(),
            type_name: type_name.to_string(),
            rust_type,
        }
    }

    /// Domain matches case-insensitively, type name exactly
    pub fn matches(&self, domain: &str, type_name: &str) -> bool {
        self.domain.eq_ignore_ascii_case(domain) && self.type_name == type_name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodegenConfig {
    /// Where bindings are written when `--out` is not given
    pub output_dir: PathBuf,

    /// Emit protocol descriptions as doc comments
    pub doc_comments: bool,

    pub overrides: Vec<TypeOverride>,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("src/generated"),
            doc_comments: true,
            // Header values are free-form strings keyed by header name
            overrides: vec![TypeOverride::new(
                "Network",
                "Headers",
                OverrideType::StringMap,
            )],
        }
    }
}

impl CodegenConfig {
    /// Load from the user's config file, falling back to defaults
    pub fn load() -> Self {
        debugwire_utils::config::load_or_default("codegen")
    }

    pub fn override_for(&self, domain: &str, type_name: &str) -> Option<OverrideType> {
        self.overrides
            .iter()
            .find(|o| o.matches(domain, type_name))
            .map(|o| o.rust_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_overrides_headers() {
        let config = CodegenConfig::default();
        assert_eq!(
            config.override_for("Network", "Headers"),
            Some(OverrideType::StringMap)
        );
        assert_eq!(
            config.override_for("network", "Headers"),
            Some(OverrideType::StringMap)
        );
        assert_eq!(config.override_for("Network", "headers"), None);
        assert_eq!(config.override_for("Page", "Headers"), None);
    }

    #[test]
    fn test_load_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[codegen]
output_dir = "bindings"

[[codegen.overrides]]
domain = "Runtime"
type = "RemoteObjectId"
rust_type = "string"
"#
        )
        .unwrap();

        let config: CodegenConfig =
            debugwire_utils::config::load_section(file.path(), "codegen").unwrap();
        assert_eq!(config.output_dir, PathBuf::from("bindings"));
        assert!(config.doc_comments);
        assert_eq!(config.overrides.len(), 1);
        assert_eq!(
            config.override_for("Runtime", "RemoteObjectId"),
            Some(OverrideType::String)
        );
        // An explicit list replaces the defaults
        assert_eq!(config.override_for("Network", "Headers"), None);
    }

    #[test]
    fn test_override_type_resolution() {
        assert_eq!(OverrideType::StringMap.resolved(), ResolvedType::StringMap);
        assert_eq!(OverrideType::Any.resolved(), ResolvedType::Any);
    }
}
