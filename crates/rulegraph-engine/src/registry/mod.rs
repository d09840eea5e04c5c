//! Block registry.
//!
//! One `BlockDefinition` per block type: its shape (fields and sockets with
//! their check-lists), its output constraint and its code generator. The
//! registry is built per editing session from the catalog and the master
//! block type; nothing here is process-global.
//!
//! Blocks that exist once per link type (`{L}-link`, `{L}-link_instance`)
//! are registered on first use and memoized under their composite type name.

mod documents;
mod links;
mod statements;
mod values;
mod variables;

use std::collections::BTreeMap;

use rulegraph_catalog::{
    record_array_tag, record_tag, Catalog, MasterBlockType, ScalarType, TypeTag, Visibility,
};

use crate::block::{Block, BlockKind, Socket};
use crate::emit::{Code, Emitter};

pub type Generator = fn(&Block, &mut Emitter<'_>) -> Code;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Value,
    Statement,
}

/// Acceptable producer tags of one socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    Any,
    OneOf(Vec<TypeTag>),
}

impl Check {
    /// An unset producer carries no information and is always accepted.
    pub fn accepts(&self, tag: &TypeTag) -> bool {
        match self {
            _ if tag.is_unset() => true,
            Check::Any => true,
            Check::OneOf(tags) => tags.contains(tag),
        }
    }

    fn scalar(t: ScalarType) -> Check {
        Check::OneOf(vec![TypeTag::Scalar(t)])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldWidget {
    Dropdown,
    Text,
    Number,
    Checkbox,
    Variable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub widget: FieldWidget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSpec {
    pub socket: Socket,
    pub kind: InputKind,
    pub check: Check,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Shape {
    pub fields: Vec<FieldSpec>,
    pub inputs: Vec<InputSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputConstraint {
    /// Statement block: previous/next connections, no output.
    Statement,
    /// Value block whose output is never constrained (attribute reads).
    Any,
    Fixed(TypeTag),
    /// Recomputed by propagation.
    Derived,
}

#[derive(Debug, Clone)]
pub struct BlockDefinition {
    pub type_name: String,
    pub shape: Shape,
    pub output: OutputConstraint,
    pub visibility: Visibility,
    pub generator: Generator,
}

impl BlockDefinition {
    fn value(type_name: &str, output: OutputConstraint, generator: Generator) -> Self {
        Self {
            type_name: type_name.to_string(),
            shape: Shape::default(),
            output,
            visibility: Visibility::ALL,
            generator,
        }
    }

    fn statement(type_name: &str, generator: Generator) -> Self {
        Self::value(type_name, OutputConstraint::Statement, generator)
    }

    fn field(mut self, name: &'static str, widget: FieldWidget) -> Self {
        self.shape.fields.push(FieldSpec { name, widget });
        self
    }

    fn input(mut self, socket: Socket, check: Check) -> Self {
        self.shape.inputs.push(InputSpec {
            socket,
            kind: InputKind::Value,
            check,
        });
        self
    }

    fn body(mut self, socket: Socket) -> Self {
        self.shape.inputs.push(InputSpec {
            socket,
            kind: InputKind::Statement,
            check: Check::Any,
        });
        self
    }

    fn visible_in(mut self, masters: &[MasterBlockType]) -> Self {
        self.visibility = Visibility::only(masters);
        self
    }

    pub fn is_statement(&self) -> bool {
        self.output == OutputConstraint::Statement
    }

    pub fn input_spec(&self, socket: Socket) -> Option<&InputSpec> {
        self.shape.inputs.iter().find(|i| i.socket == socket)
    }
}

/// Check-lists shared by many sockets, computed once from the catalog.
#[derive(Debug, Clone)]
pub struct CheckSets {
    /// Any collection's record, or the unresolved link-document sentinel.
    pub records: Check,
    pub record_arrays: Check,
    pub links: Check,
    pub link_arrays: Check,
    pub links_and_arrays: Check,
    pub lists: Check,
    pub boolean: Check,
    pub number: Check,
}

impl CheckSets {
    fn from_catalog(catalog: &Catalog) -> Self {
        let collections = || catalog.collections.iter().map(|c| c.id.as_str());
        let link_types = || catalog.link_types.iter().map(|l| l.id.as_str());

        let mut records: Vec<TypeTag> = collections().map(record_tag).collect();
        records.push(TypeTag::Unresolved);
        let record_arrays: Vec<TypeTag> = collections().map(record_array_tag).collect();
        let links: Vec<TypeTag> = link_types().map(|l| TypeTag::Link(l.to_string())).collect();
        let link_arrays: Vec<TypeTag> = link_types()
            .map(|l| TypeTag::LinkArray(l.to_string()))
            .collect();
        let mut lists = record_arrays.clone();
        lists.extend(link_arrays.iter().cloned());
        lists.push(TypeTag::Scalar(ScalarType::Array));
        let mut links_and_arrays = links.clone();
        links_and_arrays.extend(link_arrays.iter().cloned());

        Self {
            records: Check::OneOf(records),
            record_arrays: Check::OneOf(record_arrays),
            links: Check::OneOf(links),
            link_arrays: Check::OneOf(link_arrays),
            links_and_arrays: Check::OneOf(links_and_arrays),
            lists: Check::OneOf(lists),
            boolean: Check::scalar(ScalarType::Boolean),
            number: Check::scalar(ScalarType::Number),
        }
    }
}

/// Session-scoped map from block type name to definition.
#[derive(Debug, Clone)]
pub struct BlockRegistry {
    master: MasterBlockType,
    definitions: BTreeMap<String, BlockDefinition>,
    checks: CheckSets,
}

impl BlockRegistry {
    pub fn new(catalog: &Catalog, master: MasterBlockType) -> Self {
        let mut registry = Self {
            master,
            definitions: BTreeMap::new(),
            checks: CheckSets::from_catalog(catalog),
        };
        values::register(&mut registry);
        variables::register(&mut registry);
        documents::register(&mut registry);
        links::register(&mut registry);
        statements::register(&mut registry);
        registry
    }

    fn add(&mut self, definition: BlockDefinition) {
        self.definitions
            .insert(definition.type_name.clone(), definition);
    }

    pub fn checks(&self) -> &CheckSets {
        &self.checks
    }

    pub fn master(&self) -> MasterBlockType {
        self.master
    }

    /// Register the per-link-type blocks for `link_type_id`. Repeated calls
    /// are no-ops. Returns true when something was registered.
    pub fn ensure_link_blocks(&mut self, catalog: &Catalog, link_type_id: &str) -> bool {
        let key = crate::block::linked_documents_type(link_type_id);
        if self.definitions.contains_key(&key) {
            return false;
        }
        for definition in links::per_link_type(catalog, link_type_id) {
            self.add(definition);
        }
        tracing::debug!(link_type = link_type_id, "registered link blocks");
        true
    }

    /// Make sure every block kind in use has a definition.
    pub fn ensure_kind(&mut self, catalog: &Catalog, kind: &BlockKind) {
        if let Some(link_type_id) = kind.link_type_variant() {
            self.ensure_link_blocks(catalog, link_type_id);
        }
    }

    pub fn definition(&self, type_name: &str) -> Option<&BlockDefinition> {
        self.definitions.get(type_name)
    }

    pub fn lookup(&self, kind: &BlockKind) -> Option<&BlockDefinition> {
        self.definitions.get(kind.type_name().as_ref())
    }

    pub fn is_statement(&self, kind: &BlockKind) -> bool {
        self.lookup(kind).is_some_and(BlockDefinition::is_statement)
    }

    pub fn input_spec(&self, kind: &BlockKind, socket: Socket) -> Option<&InputSpec> {
        self.lookup(kind)?.input_spec(socket)
    }

    /// Whether blocks of this kind may appear for the session's master type.
    pub fn is_visible(&self, kind: &BlockKind) -> bool {
        self.lookup(kind)
            .is_some_and(|d| d.visibility.allows(self.master))
    }

    /// Definitions offered for the session's master type, by type name.
    pub fn palette(&self) -> impl Iterator<Item = &BlockDefinition> {
        let master = self.master;
        self.definitions
            .values()
            .filter(move |d| d.visibility.allows(master))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rulegraph_catalog::{Collection, LinkType};

    fn catalog() -> Catalog {
        let collection = |id: &str| Collection {
            id: id.into(),
            name: id.to_uppercase(),
            icon: String::new(),
            color: String::new(),
            attributes: vec![],
            default_attribute_id: None,
        };
        Catalog {
            collections: vec![collection("ord"), collection("cus")],
            link_types: vec![LinkType {
                id: "oc".into(),
                name: "orders-customer".into(),
                collection_ids: ["ord".into(), "cus".into()],
                attributes: vec![],
            }],
            ..Catalog::default()
        }
    }

    #[test]
    fn unset_producers_pass_every_check() {
        let sets = CheckSets::from_catalog(&catalog());
        assert!(sets.records.accepts(&TypeTag::Unset));
        assert!(sets.records.accepts(&record_tag("ord")));
        assert!(sets.records.accepts(&TypeTag::Unresolved));
        assert!(!sets.records.accepts(&record_array_tag("ord")));
        assert!(sets.lists.accepts(&TypeTag::Scalar(ScalarType::Array)));
    }

    #[test]
    fn visibility_follows_master_type() {
        let rule = BlockRegistry::new(&catalog(), MasterBlockType::Rule);
        assert!(!rule.is_visible(&BlockKind::DeleteDocument));
        assert!(rule.is_visible(&BlockKind::DeleteLink));
        assert!(!rule.is_visible(&BlockKind::SetResult));

        let function = BlockRegistry::new(&catalog(), MasterBlockType::Function);
        assert!(function.is_visible(&BlockKind::DeleteDocument));
        assert!(!function.is_visible(&BlockKind::DeleteLink));

        let value = BlockRegistry::new(&catalog(), MasterBlockType::Value);
        assert!(value.is_visible(&BlockKind::SetResult));
    }

    #[test]
    fn link_blocks_register_once() {
        let catalog = catalog();
        let mut registry = BlockRegistry::new(&catalog, MasterBlockType::Rule);
        let before = registry.len();
        assert!(registry.ensure_link_blocks(&catalog, "oc"));
        assert!(!registry.ensure_link_blocks(&catalog, "oc"));
        assert_eq!(registry.len(), before + 2);
        let linked = registry.definition("oc-link").unwrap();
        let check = &linked.input_spec(Socket::Document).unwrap().check;
        assert!(check.accepts(&record_tag("cus")));
        assert!(!check.accepts(&record_tag("zzz")));
    }
}
