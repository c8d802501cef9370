//! Protocol schema compiler
//!
//! Reads protocol descriptions (the JSON served at `/json/protocol`),
//! resolves every type reference, and renders one Rust module per domain
//! plus a method-name registry and a [`MethodTypeMap`] constructor.
//!
//! [`MethodTypeMap`]: debugwire_protocol::MethodTypeMap

pub mod config;
pub mod emitter;
pub mod model;
pub mod naming;
pub mod output;
pub mod render;
pub mod resolver;

use std::path::Path;

pub use config::{CodegenConfig, OverrideType, TypeOverride};
pub use emitter::{
    Binding, BindingKind, DomainBindings, FieldBinding, GeneratedBindings, GenerationReport,
    Generator, ItemKind, MethodConstant, SkippedItem, VariantBinding,
};
pub use model::{
    CommandDef, Domain, EventDef, ItemDescriptor, PropertyDef, ProtocolDescription,
    ProtocolVersion, TypeDef, TypeKind,
};
pub use output::{write_to_dir, WriteSummary};
pub use render::{render_files, GeneratedFile, GENERATED_MARKER};
pub use resolver::{ResolvedType, ResolverContext};

use debugwire_utils::Result;

/// Generate, render, and write bindings for `description` into `dir`
pub fn compile_to_dir(
    description: &ProtocolDescription,
    config: &CodegenConfig,
    dir: &Path,
) -> Result<(GenerationReport, WriteSummary)> {
    let bindings = Generator::new(config.clone()).generate(description);
    let files = render_files(&bindings, config.doc_comments);
    let summary = write_to_dir(dir, &files)?;
    Ok((bindings.report, summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_to_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let protocol = ProtocolDescription::parse_json(
            r#"{"version":{"major":"1","minor":"3"},"domains":[
                {"domain":"Foo","commands":[{"name":"bar","parameters":[{"name":"x","type":"integer"}]}]},
                {"domain":"Bar","events":[{"name":"broken","parameters":[{"name":"q","$ref":"Nowhere"}]}]}]}"#,
        )
        .unwrap();

        let (report, summary) =
            compile_to_dir(&protocol, &CodegenConfig::default(), tmp.path()).unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].item, "broken");
        assert_eq!(summary.written.len(), 4);
        for name in ["mod.rs", "methods.rs", "foo.rs", "bar.rs"] {
            assert!(tmp.path().join(name).exists(), "missing {}", name);
        }

        // A later run without Bar removes its module
        let mut smaller = protocol.clone();
        smaller.domains.retain(|d| d.name == "Foo");
        let (_, summary) =
            compile_to_dir(&smaller, &CodegenConfig::default(), tmp.path()).unwrap();
        assert_eq!(summary.removed, vec![tmp.path().join("bar.rs")]);
    }
}
