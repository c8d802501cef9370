//! Binding generation
//!
//! Turns a [`ProtocolDescription`] into an in-memory binding model, one
//! [`DomainBindings`] per domain. Items that fail to resolve are skipped and
//! recorded in the [`GenerationReport`]; generation itself never fails.
//!
//! Output is a pure function of the description and configuration: domains
//! and items keep their declaration order and no hash ordering leaks out.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use tracing::{debug, info, warn};

use debugwire_protocol::MethodKind;
use debugwire_utils::{DebugwireError, Result};

use crate::config::CodegenConfig;
use crate::model::{CommandDef, Domain, EventDef, PropertyDef, ProtocolDescription, TypeDef, TypeKind};
use crate::naming::{
    module_ident, to_screaming_snake_case, type_ident, unraw, FieldNamer, VariantNamer,
};
use crate::resolver::{InlineRecord, ResolvedType, ResolverContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Struct,
    Enum,
    Alias,
    Request,
    Response,
    Event,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldBinding {
    pub ident: String,
    pub wire_name: String,
    pub ty: ResolvedType,
    pub optional: bool,
    /// Part of a reference cycle, stored behind a `Box`
    pub boxed: bool,
    pub description: Option<String>,
    pub deprecated: bool,
    pub experimental: bool,
}

impl FieldBinding {
    /// Whether serde needs an explicit `rename` to reach the wire name
    pub fn needs_rename(&self) -> bool {
        unraw(&self.ident) != self.wire_name
    }

    pub fn render_type(&self, current_domain: &str) -> String {
        let mut ty = self.ty.render(current_domain);
        if self.boxed {
            ty = format!("Box<{}>", ty);
        }
        if self.optional {
            ty = format!("Option<{}>", ty);
        }
        ty
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantBinding {
    pub ident: String,
    pub wire_value: String,
}

impl VariantBinding {
    pub fn needs_rename(&self) -> bool {
        self.ident != self.wire_value
    }
}

/// One generated Rust item
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    pub kind: BindingKind,
    /// Wire method for requests, responses, and events
    pub method: Option<String>,
    /// Response type name, requests only
    pub response: Option<String>,
    pub description: Option<String>,
    pub deprecated: bool,
    pub experimental: bool,
    pub fields: Vec<FieldBinding>,
    pub variants: Vec<VariantBinding>,
    /// Target of an alias
    pub alias: Option<ResolvedType>,
}

impl Binding {
    fn new(name: impl Into<String>, kind: BindingKind) -> Self {
        Self {
            name: name.into(),
            kind,
            method: None,
            response: None,
            description: None,
            deprecated: false,
            experimental: false,
            fields: Vec::new(),
            variants: Vec::new(),
            alias: None,
        }
    }

    pub fn field(&self, wire_name: &str) -> Option<&FieldBinding> {
        self.fields.iter().find(|f| f.wire_name == wire_name)
    }

    fn collect_named(&self, out: &mut BTreeSet<(String, String)>) {
        for field in &self.fields {
            field.ty.collect_named(out);
        }
        if let Some(alias) = &self.alias {
            alias.collect_named(out);
        }
    }
}

/// A method-name constant in the registry module
#[derive(Debug, Clone, PartialEq)]
pub struct MethodConstant {
    pub ident: String,
    pub method: String,
    pub kind: MethodKind,
    /// Request type for commands, payload type for events
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DomainBindings {
    pub name: String,
    pub module: String,
    pub description: Option<String>,
    pub deprecated: bool,
    pub experimental: bool,
    pub bindings: Vec<Binding>,
    pub methods: Vec<MethodConstant>,
}

impl DomainBindings {
    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Domain,
    Type,
    Command,
    Event,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemKind::Domain => "domain",
            ItemKind::Type => "type",
            ItemKind::Command => "command",
            ItemKind::Event => "event",
        };
        f.write_str(s)
    }
}

/// An item left out of the output
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedItem {
    pub domain: String,
    pub item: String,
    pub kind: ItemKind,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationReport {
    /// Number of bindings emitted
    pub generated: usize,
    pub skipped: Vec<SkippedItem>,
}

impl GenerationReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedBindings {
    pub version: crate::model::ProtocolVersion,
    pub domains: Vec<DomainBindings>,
    pub report: GenerationReport,
}

impl GeneratedBindings {
    pub fn domain(&self, name: &str) -> Option<&DomainBindings> {
        self.domains.iter().find(|d| d.name.eq_ignore_ascii_case(name))
    }

    pub fn binding(&self, domain: &str, name: &str) -> Option<&Binding> {
        self.domain(domain).and_then(|d| d.binding(name))
    }

    /// Every registered wire method, in generation order
    pub fn methods(&self) -> impl Iterator<Item = &MethodConstant> {
        self.domains.iter().flat_map(|d| d.methods.iter())
    }
}

/// Output of one protocol item, kept together so a failed dependency drops
/// the whole item.
struct ItemOutput {
    item: String,
    kind: ItemKind,
    declared: Option<String>,
    bindings: Vec<Binding>,
    methods: Vec<MethodConstant>,
    deps: BTreeSet<(String, String)>,
}

struct DomainOutput<'a> {
    domain: &'a Domain,
    items: Vec<ItemOutput>,
}

pub struct Generator {
    config: CodegenConfig,
}

impl Generator {
    pub fn new(config: CodegenConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodegenConfig {
        &self.config
    }

    pub fn generate(&self, description: &ProtocolDescription) -> GeneratedBindings {
        let mut report = GenerationReport::default();

        let mut seen = HashSet::new();
        let mut domains = Vec::new();
        for domain in &description.domains {
            if seen.insert(domain.name.to_ascii_lowercase()) {
                domains.push(domain);
            } else {
                skip(
                    &mut report,
                    &domain.name,
                    &domain.name,
                    ItemKind::Domain,
                    DebugwireError::DuplicateDomain(domain.name.clone()),
                );
            }
        }

        let ctx = ResolverContext::build(domains.iter().copied(), &self.config);

        let mut outputs: Vec<DomainOutput> = domains
            .iter()
            .map(|&domain| DomainOutput {
                domain,
                items: self.emit_domain(&ctx, domain, &mut report),
            })
            .collect();

        prune_unsatisfied(&mut outputs, &mut report);

        let mut domains: Vec<DomainBindings> = outputs.into_iter().map(assemble_domain).collect();
        box_recursive_fields(&mut domains);
        report.generated = domains.iter().map(|d| d.bindings.len()).sum();

        info!(
            "Generated {} bindings across {} domains for protocol {} ({} skipped)",
            report.generated,
            domains.len(),
            description.version,
            report.skipped.len()
        );

        GeneratedBindings {
            version: description.version.clone(),
            domains,
            report,
        }
    }

    fn emit_domain(
        &self,
        ctx: &ResolverContext,
        domain: &Domain,
        report: &mut GenerationReport,
    ) -> Vec<ItemOutput> {
        debug!(
            "Emitting domain {} ({} types, {} commands, {} events)",
            domain.name,
            domain.types.len(),
            domain.commands.len(),
            domain.events.len()
        );

        let mut names = HashSet::new();
        let mut items = Vec::new();

        let results = domain
            .types
            .iter()
            .map(|t| (t.name.as_str(), ItemKind::Type, self.emit_type(ctx, domain, t)))
            .chain(domain.commands.iter().map(|c| {
                (c.name.as_str(), ItemKind::Command, self.emit_command(ctx, domain, c))
            }))
            .chain(
                domain
                    .events
                    .iter()
                    .map(|e| (e.name.as_str(), ItemKind::Event, self.emit_event(ctx, domain, e))),
            );

        for (item, kind, result) in results {
            let result = result.and_then(|output| {
                match output.bindings.iter().find(|b| names.contains(&b.name)) {
                    Some(clash) => Err(DebugwireError::malformed(
                        format!("{}.{}", domain.name, item),
                        format!("name {} is already in use", clash.name),
                    )),
                    None => Ok(output),
                }
            });

            match result {
                Ok(output) => {
                    names.extend(output.bindings.iter().map(|b| b.name.clone()));
                    items.push(output);
                }
                Err(e) => skip(report, &domain.name, item, kind, e),
            }
        }
        items
    }

    fn emit_type(&self, ctx: &ResolverContext, domain: &Domain, def: &TypeDef) -> Result<ItemOutput> {
        let name = type_ident(&def.name);
        let mut inline = Vec::new();

        let mut binding = if let Some(rust_type) = self.config.override_for(&domain.name, &def.name)
        {
            let mut alias = Binding::new(&name, BindingKind::Alias);
            alias.alias = Some(rust_type.resolved());
            alias
        } else if def.is_enum() {
            let mut binding = Binding::new(&name, BindingKind::Enum);
            let mut namer = VariantNamer::default();
            binding.variants = def
                .enum_values
                .iter()
                .map(|value| VariantBinding {
                    ident: namer.ident(value),
                    wire_value: value.clone(),
                })
                .collect();
            binding
        } else {
            match def.kind {
                TypeKind::Object if !def.properties.is_empty() => {
                    let mut binding = Binding::new(&name, BindingKind::Struct);
                    binding.fields =
                        self.emit_fields(ctx, &domain.name, &def.name, &def.properties, &mut inline)?;
                    binding
                }
                TypeKind::Array => {
                    let items = def.items.as_ref().ok_or_else(|| {
                        DebugwireError::malformed(
                            format!("{}.{}", domain.name, def.name),
                            "array type without items",
                        )
                    })?;
                    let record = format!("{}Item", def.name);
                    let mut alias = Binding::new(&name, BindingKind::Alias);
                    alias.alias =
                        Some(ctx.resolve_items(&domain.name, &record, items, &mut inline)?);
                    alias
                }
                TypeKind::Unknown => {
                    return Err(DebugwireError::malformed(
                        format!("{}.{}", domain.name, def.name),
                        "unknown type kind",
                    ))
                }
                kind => {
                    let prop = PropertyDef {
                        name: def.name.clone(),
                        kind: Some(kind),
                        ..PropertyDef::default()
                    };
                    let mut alias = Binding::new(&name, BindingKind::Alias);
                    alias.alias = Some(ctx.resolve_property(&domain.name, &def.name, &prop, &mut inline)?);
                    alias
                }
            }
        };

        binding.description = def.description.clone();
        binding.deprecated = def.deprecated;
        binding.experimental = def.experimental;

        let mut bindings = vec![binding];
        bindings.extend(self.emit_inline_records(ctx, &domain.name, inline)?);
        Ok(item_output(
            &domain.name,
            &def.name,
            ItemKind::Type,
            Some(def.name.clone()),
            bindings,
            Vec::new(),
        ))
    }

    fn emit_command(
        &self,
        ctx: &ResolverContext,
        domain: &Domain,
        def: &CommandDef,
    ) -> Result<ItemOutput> {
        let prefix = format!("{}{}", type_ident(&domain.name), type_ident(&def.name));
        let method = format!("{}.{}", domain.name, def.name);
        let mut inline = Vec::new();

        let request_name = format!("{}Request", prefix);
        let response_name = format!("{}Response", prefix);

        let mut request = Binding::new(&request_name, BindingKind::Request);
        request.fields =
            self.emit_fields(ctx, &domain.name, &request_name, &def.parameters, &mut inline)?;
        request.method = Some(method.clone());
        request.response = Some(response_name.clone());
        request.description = def.description.clone();
        request.deprecated = def.deprecated;
        request.experimental = def.experimental;

        let mut response = Binding::new(&response_name, BindingKind::Response);
        response.fields =
            self.emit_fields(ctx, &domain.name, &response_name, &def.returns, &mut inline)?;
        response.method = Some(method.clone());
        response.deprecated = def.deprecated;
        response.experimental = def.experimental;

        let mut bindings = vec![request, response];
        bindings.extend(self.emit_inline_records(ctx, &domain.name, inline)?);

        let constant = MethodConstant {
            ident: to_screaming_snake_case(&def.name),
            method,
            kind: MethodKind::Command,
            type_name: request_name,
        };
        Ok(item_output(
            &domain.name,
            &def.name,
            ItemKind::Command,
            None,
            bindings,
            vec![constant],
        ))
    }

    fn emit_event(&self, ctx: &ResolverContext, domain: &Domain, def: &EventDef) -> Result<ItemOutput> {
        let name = format!("{}{}Payload", type_ident(&domain.name), type_ident(&def.name));
        let method = format!("{}.{}", domain.name, def.name);
        let mut inline = Vec::new();

        let mut payload = Binding::new(&name, BindingKind::Event);
        payload.fields = self.emit_fields(ctx, &domain.name, &name, &def.parameters, &mut inline)?;
        payload.method = Some(method.clone());
        payload.description = def.description.clone();
        payload.deprecated = def.deprecated;
        payload.experimental = def.experimental;

        let mut bindings = vec![payload];
        bindings.extend(self.emit_inline_records(ctx, &domain.name, inline)?);

        let constant = MethodConstant {
            ident: to_screaming_snake_case(&def.name),
            method,
            kind: MethodKind::Event,
            type_name: name,
        };
        Ok(item_output(
            &domain.name,
            &def.name,
            ItemKind::Event,
            None,
            bindings,
            vec![constant],
        ))
    }

    fn emit_fields(
        &self,
        ctx: &ResolverContext,
        domain: &str,
        owner: &str,
        properties: &[PropertyDef],
        inline: &mut Vec<InlineRecord>,
    ) -> Result<Vec<FieldBinding>> {
        let mut namer = FieldNamer::new(owner);
        properties
            .iter()
            .map(|prop| {
                let ty = ctx.resolve_property(domain, owner, prop, inline)?;
                Ok(FieldBinding {
                    ident: namer.ident(&prop.name),
                    wire_name: prop.name.clone(),
                    ty,
                    optional: prop.optional,
                    boxed: false,
                    description: prop.description.clone(),
                    deprecated: prop.deprecated,
                    experimental: prop.experimental,
                })
            })
            .collect()
    }

    /// Records synthesized for arrays of inline objects. Each may queue more.
    fn emit_inline_records(
        &self,
        ctx: &ResolverContext,
        domain: &str,
        mut queue: Vec<InlineRecord>,
    ) -> Result<Vec<Binding>> {
        let mut bindings = Vec::new();
        let mut next = 0;
        while next < queue.len() {
            let record = queue[next].clone();
            next += 1;

            let mut binding = Binding::new(type_ident(&record.name), BindingKind::Struct);
            binding.fields =
                self.emit_fields(ctx, domain, &record.name, &record.properties, &mut queue)?;
            bindings.push(binding);
        }
        Ok(bindings)
    }
}

fn item_output(
    domain: &str,
    item: &str,
    kind: ItemKind,
    declared: Option<String>,
    bindings: Vec<Binding>,
    methods: Vec<MethodConstant>,
) -> ItemOutput {
    let own: HashSet<&str> = bindings.iter().map(|b| b.name.as_str()).collect();
    let mut deps = BTreeSet::new();
    for binding in &bindings {
        binding.collect_named(&mut deps);
    }
    deps.retain(|(d, n)| !(d == domain && own.contains(type_ident(n).as_str())));

    ItemOutput {
        item: item.to_string(),
        kind,
        declared,
        bindings,
        methods,
        deps,
    }
}

fn skip(report: &mut GenerationReport, domain: &str, item: &str, kind: ItemKind, error: DebugwireError) {
    warn!("Skipping {} {}.{}: {}", kind, domain, item, error);
    report.skipped.push(SkippedItem {
        domain: domain.to_string(),
        item: item.to_string(),
        kind,
        error: error.to_string(),
    });
}

/// Drop items that reference a type which was itself skipped, until every
/// remaining reference is satisfied.
fn prune_unsatisfied(outputs: &mut [DomainOutput], report: &mut GenerationReport) {
    loop {
        let available: HashSet<(String, String)> = outputs
            .iter()
            .flat_map(|o| {
                o.items
                    .iter()
                    .filter_map(move |i| i.declared.clone().map(|n| (o.domain.name.clone(), n)))
            })
            .collect();

        let mut removed = false;
        for output in outputs.iter_mut() {
            let domain = output.domain.name.clone();
            let mut kept = Vec::with_capacity(output.items.len());
            for item in output.items.drain(..) {
                match item.deps.iter().find(|dep| !available.contains(*dep)) {
                    Some((dep_domain, dep_name)) => {
                        let error = DebugwireError::UnresolvedReference {
                            domain: domain.clone(),
                            reference: format!("{}.{}", dep_domain, dep_name),
                        };
                        skip(report, &domain, &item.item, item.kind, error);
                        removed = true;
                    }
                    None => kept.push(item),
                }
            }
            output.items = kept;
        }

        if !removed {
            break;
        }
    }
}

fn assemble_domain(output: DomainOutput) -> DomainBindings {
    let domain = output.domain;
    let mut bindings = Vec::new();
    let mut methods: Vec<MethodConstant> = Vec::new();
    let mut idents = HashSet::new();

    for item in output.items {
        bindings.extend(item.bindings);
        for mut constant in item.methods {
            // A command and an event may share a name
            if !idents.insert(constant.ident.clone()) {
                let suffix = to_screaming_snake_case(&item.kind.to_string());
                constant.ident = format!("{}_{}", constant.ident, suffix);
                idents.insert(constant.ident.clone());
            }
            methods.push(constant);
        }
    }

    DomainBindings {
        name: domain.name.clone(),
        module: module_ident(&domain.name),
        description: domain.description.clone(),
        deprecated: domain.deprecated,
        experimental: domain.experimental,
        bindings,
        methods,
    }
}

/// Box every by-value field whose type leads back to its owner, so
/// recursive records (direct or through other types) have a finite size.
/// `Vec` fields already live on the heap and are left alone.
fn box_recursive_fields(domains: &mut [DomainBindings]) {
    let mut nodes: HashMap<(String, String), usize> = HashMap::new();
    for domain in domains.iter() {
        for binding in &domain.bindings {
            let next = nodes.len();
            nodes
                .entry((domain.name.clone(), binding.name.clone()))
                .or_insert(next);
        }
    }

    let target = |ty: &ResolvedType| match ty {
        ResolvedType::Named { domain, name } => {
            nodes.get(&(domain.clone(), type_ident(name))).copied()
        }
        _ => None,
    };

    let mut edges = vec![Vec::new(); nodes.len()];
    for domain in domains.iter() {
        for binding in &domain.bindings {
            let Some(&from) = nodes.get(&(domain.name.clone(), binding.name.clone())) else {
                continue;
            };
            edges[from].extend(binding.fields.iter().filter_map(|f| target(&f.ty)));
            edges[from].extend(binding.alias.as_ref().and_then(|a| target(a)));
        }
    }

    let component = strongly_connected(&edges);
    for domain in domains.iter_mut() {
        for binding in domain.bindings.iter_mut() {
            let Some(&from) = nodes.get(&(domain.name.clone(), binding.name.clone())) else {
                continue;
            };
            for field in binding.fields.iter_mut() {
                if let Some(to) = target(&field.ty) {
                    if component[to] == component[from] {
                        debug!("Boxing {}.{}.{}", domain.name, binding.name, field.wire_name);
                        field.boxed = true;
                    }
                }
            }
        }
    }
}

/// Tarjan's algorithm. Returns the component of each node; nodes share a
/// component exactly when they reach each other.
fn strongly_connected(edges: &[Vec<usize>]) -> Vec<usize> {
    struct Walk<'a> {
        edges: &'a [Vec<usize>],
        index: Vec<Option<usize>>,
        low: Vec<usize>,
        on_stack: Vec<bool>,
        stack: Vec<usize>,
        next_index: usize,
        component: Vec<usize>,
        components: usize,
    }

    fn visit(walk: &mut Walk, v: usize) {
        walk.index[v] = Some(walk.next_index);
        walk.low[v] = walk.next_index;
        walk.next_index += 1;
        walk.stack.push(v);
        walk.on_stack[v] = true;

        let edges = walk.edges;
        for &w in &edges[v] {
            match walk.index[w] {
                None => {
                    visit(walk, w);
                    walk.low[v] = walk.low[v].min(walk.low[w]);
                }
                Some(index) if walk.on_stack[w] => walk.low[v] = walk.low[v].min(index),
                Some(_) => {}
            }
        }

        if walk.index[v] == Some(walk.low[v]) {
            while let Some(w) = walk.stack.pop() {
                walk.on_stack[w] = false;
                walk.component[w] = walk.components;
                if w == v {
                    break;
                }
            }
            walk.components += 1;
        }
    }

    let n = edges.len();
    let mut walk = Walk {
        edges,
        index: vec![None; n],
        low: vec![0; n],
        on_stack: vec![false; n],
        stack: Vec::new(),
        next_index: 0,
        component: vec![0; n],
        components: 0,
    };
    for v in 0..n {
        if walk.index[v].is_none() {
            visit(&mut walk, v);
        }
    }
    walk.component
}
