//! Graph-wide variables.
//!
//! Variables are global to one rule/function. Getters and binders refer to a
//! variable by id, so renaming never touches blocks. Protected variables are
//! the seeds implied by the automation target (`newRecord`, `thisLink`, ...):
//! their name and tag are fixed for the session.

use std::fmt;

use rulegraph_catalog::{SeedVariable, TypeTag};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId(pub String);

impl VariableId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VariableId {
    fn from(s: &str) -> Self {
        VariableId(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub id: VariableId,
    pub name: String,
    pub tag: TypeTag,
    pub protected: bool,
}

/// Insertion-ordered variable table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableMap {
    vars: Vec<Variable>,
    next_id: u32,
}

impl VariableMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a protected seed variable. Seeding the same name twice keeps the
    /// first.
    pub fn seed(&mut self, seed: &SeedVariable) -> VariableId {
        if let Some(existing) = self.by_name(&seed.name) {
            return existing.id.clone();
        }
        let id = VariableId(format!("seed-{}", seed.name));
        self.vars.push(Variable {
            id: id.clone(),
            name: seed.name.clone(),
            tag: seed.tag(),
            protected: true,
        });
        id
    }

    /// Create a user variable, or return the existing one with that name.
    pub fn create(&mut self, name: &str) -> VariableId {
        if let Some(existing) = self.by_name(name) {
            return existing.id.clone();
        }
        let id = self.fresh_id();
        self.insert(Variable {
            id: id.clone(),
            name: name.to_string(),
            tag: TypeTag::Unset,
            protected: false,
        });
        id
    }

    /// Insert a variable read from a diagram, keeping its id.
    ///
    /// A variable whose name matches a seed resolves to the seed instead, so a
    /// stored `newRecord` never shadows the protected one.
    pub fn restore(&mut self, id: VariableId, name: &str, tag: TypeTag) -> VariableId {
        if let Some(existing) = self.by_name(name) {
            return existing.id.clone();
        }
        let id = if id.0.is_empty() || self.get(&id).is_some() {
            self.fresh_id()
        } else {
            id
        };
        self.insert(Variable {
            id: id.clone(),
            name: name.to_string(),
            tag,
            protected: false,
        });
        id
    }

    fn insert(&mut self, var: Variable) {
        self.vars.push(var);
    }

    fn fresh_id(&mut self) -> VariableId {
        loop {
            self.next_id += 1;
            let id = VariableId(format!("var-{}", self.next_id));
            if self.get(&id).is_none() {
                return id;
            }
        }
    }

    pub fn get(&self, id: &VariableId) -> Option<&Variable> {
        self.vars.iter().find(|v| &v.id == id)
    }

    pub fn by_name(&self, name: &str) -> Option<&Variable> {
        self.vars.iter().find(|v| v.name == name)
    }

    pub fn tag(&self, id: &VariableId) -> TypeTag {
        self.get(id).map(|v| v.tag.clone()).unwrap_or_default()
    }

    pub fn is_protected(&self, id: &VariableId) -> bool {
        self.get(id).is_some_and(|v| v.protected)
    }

    /// Returns false when the variable is protected, missing, or the new name
    /// is taken by another variable.
    pub fn rename(&mut self, id: &VariableId, name: &str) -> bool {
        if name.is_empty() || self.by_name(name).is_some_and(|v| &v.id != id) {
            return false;
        }
        match self.vars.iter_mut().find(|v| &v.id == id) {
            Some(var) if !var.protected => {
                var.name = name.to_string();
                true
            }
            _ => false,
        }
    }

    /// Retype a user variable. Returns true when the tag changed.
    pub(crate) fn set_tag(&mut self, id: &VariableId, tag: TypeTag) -> bool {
        match self.vars.iter_mut().find(|v| &v.id == id) {
            Some(var) if !var.protected && var.tag != tag => {
                var.tag = tag;
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, id: &VariableId) -> Option<Variable> {
        let idx = self.vars.iter().position(|v| &v.id == id && !v.protected)?;
        Some(self.vars.remove(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vars.iter()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_are_protected() {
        let mut vars = VariableMap::new();
        let id = vars.seed(&SeedVariable::record("newRecord", "ord"));
        assert!(vars.is_protected(&id));
        assert!(!vars.rename(&id, "other"));
        assert!(vars.remove(&id).is_none());
        assert!(!vars.set_tag(&id, TypeTag::Unset));
        assert_eq!(vars.tag(&id), TypeTag::Record("ord".into()));
    }

    #[test]
    fn create_reuses_names_and_rename_rejects_collisions() {
        let mut vars = VariableMap::new();
        let a = vars.create("a");
        assert_eq!(vars.create("a"), a);
        let b = vars.create("b");
        assert!(!vars.rename(&b, "a"));
        assert!(vars.rename(&b, "c"));
        assert_eq!(vars.by_name("c").map(|v| v.id.clone()), Some(b));
    }

    #[test]
    fn restore_resolves_to_seed_by_name() {
        let mut vars = VariableMap::new();
        let seed = vars.seed(&SeedVariable::record("newRecord", "ord"));
        let restored = vars.restore("xyz".into(), "newRecord", TypeTag::Unset);
        assert_eq!(restored, seed);
        let user = vars.restore("xyz".into(), "total", TypeTag::Unset);
        assert_eq!(user.as_str(), "xyz");
        let clash = vars.restore("xyz".into(), "other", TypeTag::Unset);
        assert_ne!(clash.as_str(), "xyz");
    }
}
