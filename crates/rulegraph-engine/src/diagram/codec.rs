//! Mapping between the element tree and typed blocks.
//!
//! This is the one place where fields and sockets are addressed by name.

use std::collections::HashMap;

use rulegraph_catalog::{Catalog, TypeTag};

use super::xml::Element;
use crate::block::{
    ArithmeticOp, BlockId, BlockKind, CompareOp, LogicOp, MessageLevel, Picker, Position, Socket,
};
use crate::graph::BlockGraph;
use crate::registry::{BlockRegistry, InputKind};
use crate::variables::{VariableId, VariableMap};

pub const BLOCKLY_NAMESPACE: &str = "https://developers.google.com/blockly/xml";

// ============================================================================
// Writing
// ============================================================================

pub fn save(graph: &BlockGraph, registry: &BlockRegistry, variables: &VariableMap) -> Element {
    let mut root = Element::new("xml").with_attr("xmlns", BLOCKLY_NAMESPACE);

    let mut vars = Element::new("variables");
    for var in variables.iter() {
        vars.push(
            Element::new("variable")
                .with_attr("id", var.id.as_str())
                .with_attr("type", var.tag.to_string())
                .with_text(var.name.as_str()),
        );
    }
    root.push(vars);

    for top in graph.top_blocks() {
        if let Some(element) = block_element(graph, registry, variables, top, true) {
            root.push(element);
        }
    }
    root
}

fn block_element(
    graph: &BlockGraph,
    registry: &BlockRegistry,
    variables: &VariableMap,
    id: BlockId,
    top: bool,
) -> Option<Element> {
    let block = graph.get(id)?;
    let mut element = Element::new("block")
        .with_attr("type", block.kind.type_name())
        .with_attr("id", id.to_string());
    if top {
        element = element
            .with_attr("x", block.position.x.to_string())
            .with_attr("y", block.position.y.to_string());
    }

    for (name, value, var_id) in fields_of(&block.kind, variables) {
        let mut field = Element::new("field").with_attr("name", name);
        if let Some(var_id) = var_id {
            field = field.with_attr("id", var_id);
        }
        element.push(field.with_text(value));
    }

    for (socket, child) in block.inputs() {
        let statement = registry
            .input_spec(&block.kind, socket)
            .is_some_and(|spec| spec.kind == InputKind::Statement);
        let tag = if statement { "statement" } else { "value" };
        let mut holder = Element::new(tag).with_attr("name", socket.name());
        if let Some(child) = block_element(graph, registry, variables, child, false) {
            holder.push(child);
        }
        element.push(holder);
    }

    if let Some(next) = block.next() {
        let mut holder = Element::new("next");
        if let Some(child) = block_element(graph, registry, variables, next, false) {
            holder.push(child);
        }
        element.push(holder);
    }
    Some(element)
}

fn flag(value: bool) -> String {
    if value { "TRUE" } else { "FALSE" }.to_string()
}

/// Field name, value and (for variable fields) the variable id.
fn fields_of(kind: &BlockKind, variables: &VariableMap) -> Vec<(&'static str, String, Option<String>)> {
    let plain = |name: &'static str, value: String| vec![(name, value, None)];
    let picked = |name: &'static str, picker: &Picker| match picker.selected() {
        Some(id) => vec![(name, id.to_string(), None)],
        None => Vec::new(),
    };
    match kind {
        BlockKind::VariableGet { variable }
        | BlockKind::VariableSet { variable }
        | BlockKind::ForEachDocument { variable }
        | BlockKind::ForEachLink { variable } => {
            let name = variables
                .get(variable)
                .map(|v| v.name.clone())
                .unwrap_or_default();
            vec![("VAR", name, Some(variable.to_string()))]
        }
        BlockKind::Text { text } => plain("TEXT", text.clone()),
        BlockKind::Number { value } => plain("NUM", value.to_string()),
        BlockKind::Boolean { value } => plain("BOOL", flag(*value)),
        BlockKind::Compare { op } => plain("OP", op.name().to_string()),
        BlockKind::Logic { op } => plain("OP", op.name().to_string()),
        BlockKind::Arithmetic { op } => plain("OP", op.name().to_string()),
        BlockKind::ProjectVariable { name } | BlockKind::SelectionList { name } => plain("NAME", name.clone()),
        BlockKind::ReadView { view_id } => plain("VIEW", view_id.clone()),
        BlockKind::CreateDocument { collection_id } => plain("COLLECTION", collection_id.clone()),
        BlockKind::LinkDocuments { link_type_id } => plain("LINKTYPE", link_type_id.clone()),
        BlockKind::LinkDocument { collection } => picked("COLLECTION", collection),
        BlockKind::GetAttribute { attribute }
        | BlockKind::GetLinkAttribute { attribute }
        | BlockKind::SetAttribute { attribute }
        | BlockKind::SetLinkAttribute { attribute }
        | BlockKind::GeneratePdf { attribute } => picked("ATTR", attribute),
        BlockKind::SendEmail { attachment } => picked("ATTACHMENT", attachment),
        BlockKind::ShowMessage { level } => plain("LEVEL", level.name().to_string()),
        BlockKind::Navigate { view_id, sidebar } => vec![
            ("VIEW", view_id.clone(), None),
            ("SIDEBAR", flag(*sidebar), None),
        ],
        _ => Vec::new(),
    }
}

// ============================================================================
// Reading
// ============================================================================

/// Builds a graph from a parsed `<xml>` root. Content that does not fit the
/// session (unknown block types, blocks hidden for the master type, unknown
/// sockets, bad field values) is dropped with a warning.
pub struct Loader<'a> {
    pub catalog: &'a Catalog,
    pub registry: &'a mut BlockRegistry,
    pub variables: &'a mut VariableMap,
    pub graph: BlockGraph,
    var_ids: HashMap<String, VariableId>,
}

impl<'a> Loader<'a> {
    pub fn new(catalog: &'a Catalog, registry: &'a mut BlockRegistry, variables: &'a mut VariableMap) -> Self {
        Self {
            catalog,
            registry,
            variables,
            graph: BlockGraph::new(),
            var_ids: HashMap::new(),
        }
    }

    pub fn load(mut self, root: &Element) -> BlockGraph {
        for section in root.children_named("variables") {
            for var in section.children_named("variable") {
                self.load_variable(var);
            }
        }
        for element in root.children_named("block") {
            let position = Position::new(int_attr(element, "x"), int_attr(element, "y"));
            self.load_block(element, position);
        }
        self.graph
    }

    fn load_variable(&mut self, element: &Element) {
        let name = element.text.trim();
        if name.is_empty() {
            tracing::warn!("dropping unnamed variable");
            return;
        }
        let stored_id = element.attr("id").unwrap_or_default();
        let tag = element
            .attr("type")
            .map(|t| t.parse::<TypeTag>())
            .transpose()
            .unwrap_or_else(|err| {
                tracing::warn!(variable = name, error = %err, "ignoring unreadable variable type");
                None
            })
            .unwrap_or_default();
        let id = self.variables.restore(VariableId::from(stored_id), name, tag);
        if !stored_id.is_empty() {
            self.var_ids.insert(stored_id.to_string(), id);
        }
    }

    fn resolve_variable(&mut self, field: &Element) -> Option<VariableId> {
        if let Some(id) = field.attr("id").and_then(|id| self.var_ids.get(id)) {
            return Some(id.clone());
        }
        let name = field.text.trim();
        if name.is_empty() {
            return None;
        }
        if let Some(var) = self.variables.by_name(name) {
            return Some(var.id.clone());
        }
        Some(self.variables.create(name))
    }

    fn load_block(&mut self, element: &Element, position: Position) -> Option<BlockId> {
        let type_name = element.attr("type").unwrap_or_default();
        let Some(mut kind) = BlockKind::from_type_name(type_name) else {
            tracing::warn!(block_type = type_name, "dropping block of unknown type");
            return None;
        };
        self.registry.ensure_kind(self.catalog, &kind);
        if !self.registry.is_visible(&kind) {
            tracing::warn!(
                block_type = type_name,
                master = %self.registry.master(),
                "dropping block not available for this master type"
            );
            return None;
        }

        for field in element.children_named("field") {
            let name = field.attr("name").unwrap_or_default();
            if !self.apply_field(&mut kind, name, field) {
                tracing::warn!(block_type = type_name, field = name, value = %field.text, "ignoring invalid field");
            }
        }
        if kind.variable().is_some_and(|v| v.as_str().is_empty()) {
            tracing::warn!(block_type = type_name, "dropping variable block without a variable");
            return None;
        }

        let wanted = element.attr("id").and_then(|id| id.parse().ok()).map(BlockId);
        let id = self.graph.insert_with_id(wanted, kind, position);

        for holder in &element.children {
            match holder.name.as_str() {
                "value" | "statement" => self.load_input(id, type_name, holder),
                "next" => self.load_next(id, holder),
                _ => {}
            }
        }
        Some(id)
    }

    fn load_input(&mut self, parent: BlockId, type_name: &str, holder: &Element) {
        let socket_name = holder.attr("name").unwrap_or_default();
        let Some(child_element) = holder.first_child("block") else {
            return;
        };
        let spec = Socket::from_name(socket_name).and_then(|socket| {
            let kind = &self.graph.get(parent)?.kind;
            let spec = self.registry.input_spec(kind, socket)?;
            Some((socket, spec.kind))
        });
        let Some((socket, input_kind)) = spec else {
            tracing::warn!(block_type = type_name, socket = socket_name, "dropping input on unknown socket");
            return;
        };
        let Some(child) = self.load_block(child_element, Position::default()) else {
            return;
        };
        let child_is_statement = self
            .graph
            .get(child)
            .is_some_and(|b| self.registry.is_statement(&b.kind));
        let statement = input_kind == InputKind::Statement;
        if child_is_statement != statement {
            tracing::warn!(block_type = type_name, socket = socket_name, "input holds the wrong kind of block; leaving it on the canvas");
            return;
        }
        if let Err(err) = self.graph.attach_input(parent, socket, child, statement) {
            tracing::warn!(error = %err, "could not restore connection");
        }
    }

    fn load_next(&mut self, prev: BlockId, holder: &Element) {
        let Some(child_element) = holder.first_child("block") else {
            return;
        };
        let Some(child) = self.load_block(child_element, Position::default()) else {
            return;
        };
        let fits = self
            .graph
            .get(child)
            .is_some_and(|b| self.registry.is_statement(&b.kind));
        if !fits {
            tracing::warn!(block = %child, "value block in a statement chain; leaving it on the canvas");
            return;
        }
        if let Err(err) = self.graph.attach_next(prev, child) {
            tracing::warn!(error = %err, "could not restore statement chain");
        }
    }

    /// Apply one stored field. Returns false when the field does not belong to
    /// the block or its value is unreadable.
    fn apply_field(&mut self, kind: &mut BlockKind, name: &str, field: &Element) -> bool {
        let value = field.text.as_str();
        match (kind, name) {
            (kind, "VAR") if kind.variable().is_some() => {
                let Some(resolved) = self.resolve_variable(field) else {
                    return false;
                };
                if let Some(slot) = kind.variable_mut() {
                    *slot = resolved;
                }
                true
            }
            (BlockKind::Text { text }, "TEXT") => {
                *text = value.to_string();
                true
            }
            (BlockKind::Number { value: number }, "NUM") => match value.trim().parse::<f64>() {
                Ok(parsed) => {
                    *number = parsed;
                    true
                }
                Err(_) => false,
            },
            (BlockKind::Boolean { value: flag }, "BOOL") => match value {
                "TRUE" => {
                    *flag = true;
                    true
                }
                "FALSE" => {
                    *flag = false;
                    true
                }
                _ => false,
            },
            (BlockKind::Compare { op }, "OP") => set_parsed(op, CompareOp::from_name(value)),
            (BlockKind::Logic { op }, "OP") => set_parsed(op, LogicOp::from_name(value)),
            (BlockKind::Arithmetic { op }, "OP") => set_parsed(op, ArithmeticOp::from_name(value)),
            (BlockKind::ShowMessage { level }, "LEVEL") => set_parsed(level, MessageLevel::from_name(value)),
            (BlockKind::ProjectVariable { name } | BlockKind::SelectionList { name }, "NAME") => {
                *name = value.to_string();
                true
            }
            (BlockKind::ReadView { view_id } | BlockKind::Navigate { view_id, .. }, "VIEW") => {
                *view_id = value.to_string();
                true
            }
            (BlockKind::Navigate { sidebar, .. }, "SIDEBAR") => {
                *sidebar = value == "TRUE";
                true
            }
            (BlockKind::CreateDocument { collection_id }, "COLLECTION") => {
                *collection_id = value.to_string();
                true
            }
            (BlockKind::LinkDocuments { link_type_id }, "LINKTYPE") => {
                *link_type_id = value.to_string();
                true
            }
            (BlockKind::LinkDocument { collection }, "COLLECTION") => {
                *collection = Picker::selecting(value);
                true
            }
            (BlockKind::SendEmail { attachment }, "ATTACHMENT") => {
                *attachment = Picker::selecting(value);
                true
            }
            (kind, "ATTR") if !matches!(kind, BlockKind::SendEmail { .. }) => {
                match kind.attribute_picker_mut() {
                    Some(picker) => {
                        *picker = Picker::selecting(value);
                        true
                    }
                    None => false,
                }
            }
            _ => false,
        }
    }
}

fn set_parsed<T>(slot: &mut T, parsed: Option<T>) -> bool {
    match parsed {
        Some(value) => {
            *slot = value;
            true
        }
        None => false,
    }
}

fn int_attr(element: &Element, key: &str) -> i32 {
    element
        .attr(key)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .map(|v| v.round() as i32)
        .unwrap_or_default()
}
