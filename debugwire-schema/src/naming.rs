//! Identifier conversion from protocol names to Rust names

use std::collections::HashSet;

const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate",
    "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl",
    "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "self", "Self", "static", "struct", "super", "trait", "true", "try", "type",
    "typeof", "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// Keywords that cannot be written as raw identifiers
const NON_RAW_KEYWORDS: &[&str] = &["crate", "self", "Self", "super"];

pub fn is_keyword(s: &str) -> bool {
    KEYWORDS.contains(&s)
}

/// `backendNodeId` → `backend_node_id`, `remoteIPAddress` → `remote_ip_address`,
/// `DOMDebugger` → `dom_debugger`
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_alphanumeric() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }

        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let boundary = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower);
            if boundary && !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }

    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// `no-referrer` → `NoReferrer`, `getDocument` → `GetDocument`. Existing
/// capitals are kept, so `DOM` stays `DOM`.
pub fn to_pascal_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for part in s.split(|c: char| !c.is_ascii_alphanumeric()) {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.extend(chars);
        }
    }
    out
}

/// `getDocument` → `GET_DOCUMENT`
pub fn to_screaming_snake_case(s: &str) -> String {
    to_snake_case(s).to_ascii_uppercase()
}

/// Rust type name for a protocol name
pub fn type_ident(name: &str) -> String {
    let ident = to_pascal_case(name);
    if ident.is_empty() {
        return "Unnamed".to_string();
    }
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        return format!("T{}", ident);
    }
    if is_keyword(&ident) {
        return format!("{}_", ident);
    }
    ident
}

/// Enum variant for a wire value, e.g. `slow-mode` → `SlowMode`
pub fn variant_ident(value: &str) -> String {
    let ident = to_pascal_case(value);
    if ident.is_empty() {
        return "Empty".to_string();
    }
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        return format!("V{}", ident);
    }
    if is_keyword(&ident) {
        return format!("{}_", ident);
    }
    ident
}

/// Module name for a domain, e.g. `DOMDebugger` → `dom_debugger`
pub fn module_ident(domain: &str) -> String {
    escape_keyword(non_empty(to_snake_case(domain), "domain"))
}

/// Strip the `r#` prefix, yielding the name serde sees
pub fn unraw(ident: &str) -> &str {
    ident.strip_prefix("r#").unwrap_or(ident)
}

fn non_empty(ident: String, fallback: &str) -> String {
    if ident.is_empty() {
        fallback.to_string()
    } else if ident.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{}", ident)
    } else {
        ident
    }
}

fn escape_keyword(ident: String) -> String {
    if NON_RAW_KEYWORDS.contains(&ident.as_str()) {
        format!("{}_", ident)
    } else if is_keyword(&ident) {
        format!("r#{}", ident)
    } else {
        ident
    }
}

/// Assigns field identifiers within one record, keeping them unique.
///
/// A field whose name matches the record's own name gets a `_child` suffix;
/// remaining collisions get a numeric suffix.
#[derive(Debug)]
pub struct FieldNamer {
    owner: String,
    taken: HashSet<String>,
}

impl FieldNamer {
    pub fn new(owner: &str) -> Self {
        Self {
            owner: to_snake_case(owner),
            taken: HashSet::new(),
        }
    }

    pub fn ident(&mut self, wire_name: &str) -> String {
        let mut base = non_empty(to_snake_case(wire_name), "field");
        if base == self.owner {
            base.push_str("_child");
        }

        let mut candidate = base.clone();
        let mut n = 2;
        while self.taken.contains(&candidate) {
            candidate = format!("{}_{}", base, n);
            n += 1;
        }
        self.taken.insert(candidate.clone());
        escape_keyword(candidate)
    }
}

/// Keeps variant identifiers unique within one enum
#[derive(Debug, Default)]
pub struct VariantNamer {
    taken: HashSet<String>,
}

impl VariantNamer {
    pub fn ident(&mut self, value: &str) -> String {
        let base = variant_ident(value);
        let mut candidate = base.clone();
        let mut n = 2;
        while self.taken.contains(&candidate) {
            candidate = format!("{}{}", base, n);
            n += 1;
        }
        self.taken.insert(candidate.clone());
        candidate
    }
}
