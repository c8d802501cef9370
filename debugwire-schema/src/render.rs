//! Rust source rendering for generated bindings
//!
//! Produces one file per domain, a `methods.rs` name registry, and a
//! `mod.rs` that declares them and builds the method → type map. Rendered
//! code depends only on `serde`, `serde_json`, and `debugwire-protocol`.
//!
//! Domain modules import nothing: protocol types are free to be called
//! `Response`, `Command`, or `Serialize`, so derives and trait impls use
//! full paths.

use std::collections::HashMap;

use debugwire_protocol::MethodKind;

use crate::emitter::{Binding, BindingKind, DomainBindings, GeneratedBindings};
use crate::naming::unraw;

/// First line of every generated file. Also how stale files are recognized.
pub const GENERATED_MARKER: &str = "// @generated by debugwire-codegen";

const STRUCT_DERIVES: &str =
    "#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]";
const ENUM_DERIVES: &str = "#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]";

const PROTOCOL: &str = "debugwire_protocol";

/// A rendered source file, named relative to the output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub name: String,
    pub contents: String,
}

#[derive(Debug, Default)]
struct Source {
    text: String,
    indent: usize,
}

impl Source {
    fn line(&mut self, line: impl AsRef<str>) {
        let line = line.as_ref();
        if !line.is_empty() {
            for _ in 0..self.indent {
                self.text.push_str("    ");
            }
            self.text.push_str(line);
        }
        self.text.push('\n');
    }

    fn blank(&mut self) {
        self.text.push('\n');
    }

    fn open(&mut self, line: impl AsRef<str>) {
        self.line(line);
        self.indent += 1;
    }

    fn close(&mut self, line: impl AsRef<str>) {
        self.indent = self.indent.saturating_sub(1);
        self.line(line);
    }

    fn header(&mut self, bindings: &GeneratedBindings) {
        self.line(format!(
            "{} from protocol {}. Do not edit.",
            GENERATED_MARKER, bindings.version
        ));
        self.blank();
    }

    fn docs(&mut self, prefix: &str, description: Option<&str>, deprecated: bool, experimental: bool) {
        let mut lines: Vec<String> = description
            .map(|d| d.lines().map(|l| l.trim_end().to_string()).collect())
            .unwrap_or_default();

        let mut markers = Vec::new();
        if deprecated {
            markers.push("Deprecated.");
        }
        if experimental {
            markers.push("Experimental.");
        }
        if !markers.is_empty() {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.push(markers.join(" "));
        }

        for l in lines {
            if l.is_empty() {
                self.line(prefix);
            } else {
                self.line(format!("{} {}", prefix, l));
            }
        }
    }
}

fn literal(s: &str) -> String {
    format!("{:?}", s)
}

/// Render every file for one protocol version
pub fn render_files(bindings: &GeneratedBindings, doc_comments: bool) -> Vec<GeneratedFile> {
    let mut files = vec![
        GeneratedFile {
            name: "mod.rs".to_string(),
            contents: render_mod(bindings),
        },
        GeneratedFile {
            name: "methods.rs".to_string(),
            contents: render_methods(bindings),
        },
    ];
    files.extend(bindings.domains.iter().map(|domain| GeneratedFile {
        name: format!("{}.rs", unraw(&domain.module)),
        contents: render_domain(bindings, domain, doc_comments),
    }));
    files
}

fn render_mod(bindings: &GeneratedBindings) -> String {
    let mut src = Source::default();
    src.header(bindings);
    src.line(format!("//! Bindings for protocol version {}", bindings.version));
    src.blank();
    src.line("pub mod methods;");
    src.blank();
    for domain in &bindings.domains {
        src.line(format!("pub mod {};", domain.module));
    }
    src.blank();
    src.line("use debugwire_protocol::MethodTypeMap;");
    src.blank();
    src.line("/// Every command and event of this protocol version, keyed by wire method");
    src.open("pub fn method_type_map() -> MethodTypeMap {");
    src.line("MethodTypeMap::builder()");
    src.indent += 1;
    for domain in &bindings.domains {
        for method in &domain.methods {
            let register = match method.kind {
                MethodKind::Command => "command",
                MethodKind::Event => "event",
            };
            src.line(format!(".{}::<{}::{}>()", register, domain.module, method.type_name));
        }
    }
    src.line(".build()");
    src.indent -= 1;
    src.close("}");
    src.text
}

fn render_methods(bindings: &GeneratedBindings) -> String {
    let mut src = Source::default();
    src.header(bindings);
    src.line("//! Wire method names, one module per domain");
    for domain in &bindings.domains {
        src.blank();
        if domain.methods.is_empty() {
            src.line(format!("pub mod {} {{}}", domain.module));
            continue;
        }
        src.open(format!("pub mod {} {{", domain.module));
        for method in &domain.methods {
            src.line(format!(
                "pub const {}: &str = {};",
                method.ident,
                literal(&method.method)
            ));
        }
        src.close("}");
    }
    src.text
}

fn render_domain(bindings: &GeneratedBindings, domain: &DomainBindings, doc_comments: bool) -> String {
    let mut src = Source::default();
    src.header(bindings);

    src.line(format!("//! {} domain", domain.name));
    if doc_comments && (domain.description.is_some() || domain.deprecated || domain.experimental) {
        src.line("//!");
        src.docs(
            "//!",
            domain.description.as_deref(),
            domain.deprecated,
            domain.experimental,
        );
    }

    if domain.bindings.is_empty() {
        return src.text;
    }

    let constants: HashMap<&str, &str> = domain
        .methods
        .iter()
        .map(|m| (m.method.as_str(), m.ident.as_str()))
        .collect();
    let method_path = |method: &str| match constants.get(method) {
        Some(ident) => format!("super::methods::{}::{}", domain.module, ident),
        None => literal(method),
    };

    for binding in &domain.bindings {
        src.blank();
        if doc_comments {
            src.docs(
                "///",
                binding.description.as_deref(),
                binding.deprecated,
                binding.experimental,
            );
        }
        match binding.kind {
            BindingKind::Enum => render_enum(&mut src, binding),
            BindingKind::Alias => {
                let target = binding
                    .alias
                    .as_ref()
                    .map(|t| t.render(&domain.name))
                    .unwrap_or_else(|| "serde_json::Value".to_string());
                src.line(format!("pub type {} = {};", binding.name, target));
            }
            _ => render_struct(&mut src, binding, &domain.name, doc_comments),
        }

        let Some(method) = binding.method.as_deref() else {
            continue;
        };
        let path = method_path(method);
        match binding.kind {
            BindingKind::Request => {
                src.blank();
                src.open(format!("impl {}::Command for {} {{", PROTOCOL, binding.name));
                src.line(format!("const METHOD: &'static str = {};", path));
                if let Some(response) = &binding.response {
                    src.line(format!("type Response = {};", response));
                }
                src.close("}");
            }
            BindingKind::Response => {
                src.blank();
                src.open(format!("impl {}::Response for {} {{", PROTOCOL, binding.name));
                src.line(format!("const METHOD: &'static str = {};", path));
                src.close("}");
            }
            BindingKind::Event => {
                src.blank();
                src.open(format!("impl {}::Event for {} {{", PROTOCOL, binding.name));
                src.line(format!("const METHOD: &'static str = {};", path));
                src.close("}");
            }
            _ => {}
        }
    }
    src.text
}

fn render_struct(src: &mut Source, binding: &Binding, domain: &str, doc_comments: bool) {
    src.line(STRUCT_DERIVES);
    if binding.fields.is_empty() {
        src.line(format!("pub struct {} {{}}", binding.name));
        return;
    }

    src.open(format!("pub struct {} {{", binding.name));
    for field in &binding.fields {
        if doc_comments {
            src.docs(
                "///",
                field.description.as_deref(),
                field.deprecated,
                field.experimental,
            );
        }

        let mut attrs = Vec::new();
        if field.needs_rename() {
            attrs.push(format!("rename = {}", literal(&field.wire_name)));
        }
        if field.optional {
            attrs.push("default".to_string());
            attrs.push("skip_serializing_if = \"Option::is_none\"".to_string());
        }
        if !attrs.is_empty() {
            src.line(format!("#[serde({})]", attrs.join(", ")));
        }
        src.line(format!("pub {}: {},", field.ident, field.render_type(domain)));
    }
    src.close("}");
}

fn render_enum(src: &mut Source, binding: &Binding) {
    src.line(ENUM_DERIVES);
    src.open(format!("pub enum {} {{", binding.name));
    for (i, variant) in binding.variants.iter().enumerate() {
        if i == 0 {
            src.line("#[default]");
        }
        if variant.needs_rename() {
            src.line(format!("#[serde(rename = {})]", literal(&variant.wire_value)));
        }
        src.line(format!("{},", variant.ident));
    }
    src.close("}");
}
