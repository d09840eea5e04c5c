//! Link blocks, including the two families registered once per link type.

use rulegraph_catalog::{record_tag, Catalog, MasterBlockType};

use super::{BlockDefinition, BlockRegistry, Check, FieldWidget, OutputConstraint};
use crate::block::{link_instances_type, linked_documents_type, Block, BlockKind, Socket};
use crate::emit::{quote, Code, Emitter, Order};

pub(super) fn register(reg: &mut BlockRegistry) {
    let checks = reg.checks().clone();

    reg.add(
        BlockDefinition::value("link_documents", OutputConstraint::Derived, link_documents)
            .field("LINKTYPE", FieldWidget::Dropdown)
            .input(Socket::Document, checks.records.clone())
            .input(Socket::Document2, checks.records.clone()),
    );
    reg.add(
        BlockDefinition::value("get_link_document", OutputConstraint::Derived, link_document)
            .field("COLLECTION", FieldWidget::Dropdown)
            .input(Socket::Link, checks.links_and_arrays.clone()),
    );
    reg.add(
        BlockDefinition::value("get_link_attribute", OutputConstraint::Any, get_link_attribute)
            .field("ATTR", FieldWidget::Dropdown)
            .input(Socket::Link, checks.links.clone()),
    );
    reg.add(
        BlockDefinition::statement("set_link_attribute", set_link_attribute)
            .field("ATTR", FieldWidget::Dropdown)
            .input(Socket::Link, checks.links.clone())
            .input(Socket::Value, Check::Any),
    );
    reg.add(
        BlockDefinition::statement("delete_link", delete_link)
            .input(Socket::Link, checks.links.clone())
            .visible_in(&[MasterBlockType::Rule, MasterBlockType::Link]),
    );
    reg.add(
        BlockDefinition::statement("foreach_link_array", foreach_link)
            .field("VAR", FieldWidget::Variable)
            .input(Socket::List, checks.link_arrays.clone())
            .body(Socket::Do),
    );
}

/// `{L}-link` and `{L}-link_instance`. Both accept a record of either
/// collection the link type connects; for a link type missing from the
/// catalog nothing typed is accepted.
pub(super) fn per_link_type(catalog: &Catalog, link_type_id: &str) -> [BlockDefinition; 2] {
    let mut sides: Vec<_> = catalog
        .link_type(link_type_id)
        .map(|l| l.collection_ids.iter().map(|c| record_tag(c)).collect())
        .unwrap_or_default();
    sides.dedup();
    let check = Check::OneOf(sides);

    [
        BlockDefinition::value(
            &linked_documents_type(link_type_id),
            OutputConstraint::Derived,
            linked_documents,
        )
        .input(Socket::Document, check.clone()),
        BlockDefinition::value(
            &link_instances_type(link_type_id),
            OutputConstraint::Derived,
            link_instances,
        )
        .input(Socket::Document, check),
    ]
}

fn selected_attribute(block: &Block) -> String {
    let selected = block
        .kind
        .attribute_picker()
        .and_then(|(picker, _)| picker.selected());
    quote(selected.unwrap_or_default())
}

fn link(block: &Block, e: &mut Emitter<'_>) -> String {
    e.value_or(block, Socket::Link, Order::Comma, "null")
}

fn link_documents(block: &Block, e: &mut Emitter<'_>) -> Code {
    let link_type_id = match &block.kind {
        BlockKind::LinkDocuments { link_type_id } => link_type_id.as_str(),
        _ => "",
    };
    let a = e.value_or(block, Socket::Document, Order::Comma, "null");
    let b = e.value_or(block, Socket::Document2, Order::Comma, "null");
    Code::Value(
        e.host_call("linkDocuments", &[a, b, quote(link_type_id)]),
        Order::FunctionCall,
    )
}

fn linked_documents(block: &Block, e: &mut Emitter<'_>) -> Code {
    let link_type_id = block.kind.link_type_variant().unwrap_or_default();
    let doc = e.value_or(block, Socket::Document, Order::Comma, "null");
    Code::Value(
        e.host_call("getLinkedDocuments", &[doc, quote(link_type_id)]),
        Order::FunctionCall,
    )
}

fn link_instances(block: &Block, e: &mut Emitter<'_>) -> Code {
    let link_type_id = block.kind.link_type_variant().unwrap_or_default();
    let doc = e.value_or(block, Socket::Document, Order::Comma, "null");
    Code::Value(
        e.host_call("getLinks", &[doc, quote(link_type_id)]),
        Order::FunctionCall,
    )
}

fn link_document(block: &Block, e: &mut Emitter<'_>) -> Code {
    let collection = match &block.kind {
        BlockKind::LinkDocument { collection } => collection.selected().unwrap_or_default(),
        _ => "",
    };
    let link = link(block, e);
    Code::Value(
        e.host_call("getLinkDocument", &[link, quote(collection)]),
        Order::FunctionCall,
    )
}

fn get_link_attribute(block: &Block, e: &mut Emitter<'_>) -> Code {
    let link = link(block, e);
    let attr = selected_attribute(block);
    Code::Value(e.host_call("getLinkAttribute", &[link, attr]), Order::FunctionCall)
}

fn set_link_attribute(block: &Block, e: &mut Emitter<'_>) -> Code {
    let link = link(block, e);
    let attr = selected_attribute(block);
    let value = e.value_or(block, Socket::Value, Order::Comma, "null");
    Code::Statement(format!(
        "{};\n",
        e.host_call("setLinkAttribute", &[link, attr, value])
    ))
}

fn delete_link(block: &Block, e: &mut Emitter<'_>) -> Code {
    let link = link(block, e);
    Code::Statement(format!("{};\n", e.host_call("removeLink", &[link])))
}

fn foreach_link(block: &Block, e: &mut Emitter<'_>) -> Code {
    super::statements::for_each(block, e)
}
