//! Identifier legalisation for emitted scripts.

use std::collections::{BTreeMap, BTreeSet};

use crate::variables::VariableId;

/// Words the script dialect will not accept as identifiers.
pub const RESERVED_WORDS: &[&str] = &[
    "arguments", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "enum", "eval", "export", "extends", "false", "finally",
    "for", "function", "if", "implements", "import", "in", "instanceof", "interface", "let",
    "new", "null", "package", "private", "protected", "public", "return", "static", "super",
    "switch", "this", "throw", "true", "try", "typeof", "undefined", "var", "void", "while",
    "with", "yield", "Infinity", "NaN", "Math", "String", "host",
];

/// Hands out one legal, unique identifier per variable for a single emission.
#[derive(Debug, Default)]
pub struct NameDb {
    taken: BTreeSet<String>,
    assigned: BTreeMap<VariableId, String>,
}

impl NameDb {
    pub fn new() -> Self {
        Self {
            taken: RESERVED_WORDS.iter().map(|w| w.to_string()).collect(),
            assigned: BTreeMap::new(),
        }
    }

    /// Claim a name outside the variable table (the context identifier).
    pub fn reserve(&mut self, wanted: &str) -> String {
        let name = self.unique(&legalize(wanted));
        self.taken.insert(name.clone());
        name
    }

    pub fn variable(&mut self, id: &VariableId, display: &str) -> String {
        if let Some(name) = self.assigned.get(id) {
            return name.clone();
        }
        let name = self.unique(&legalize(display));
        self.taken.insert(name.clone());
        self.assigned.insert(id.clone(), name.clone());
        name
    }

    fn unique(&self, base: &str) -> String {
        if !self.taken.contains(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base}{n}"))
            .find(|candidate| !self.taken.contains(candidate))
            .unwrap_or_else(|| base.to_string())
    }
}

pub fn legalize(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
        .collect();
    if out.is_empty() {
        out.push_str("unnamed");
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}
