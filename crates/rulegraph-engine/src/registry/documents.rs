//! Blocks that read, create and act on records.

use rulegraph_catalog::MasterBlockType;

use super::{BlockDefinition, BlockRegistry, Check, FieldWidget, OutputConstraint};
use crate::block::{Block, BlockKind, Socket};
use crate::emit::{quote, Code, Emitter, Order};

pub(super) fn register(reg: &mut BlockRegistry) {
    let checks = reg.checks().clone();

    reg.add(
        BlockDefinition::value("read_documents", OutputConstraint::Derived, read_view)
            .field("VIEW", FieldWidget::Dropdown),
    );
    reg.add(
        BlockDefinition::value("get_parent_document", OutputConstraint::Derived, parent_document)
            .input(Socket::Document, checks.records.clone()),
    );
    reg.add(
        BlockDefinition::value("get_siblings", OutputConstraint::Derived, siblings)
            .input(Socket::Document, checks.records.clone()),
    );
    reg.add(
        BlockDefinition::value("get_children", OutputConstraint::Derived, children)
            .input(Socket::Document, checks.records.clone()),
    );
    reg.add(
        BlockDefinition::value("create_document", OutputConstraint::Derived, create_document)
            .field("COLLECTION", FieldWidget::Dropdown),
    );
    reg.add(
        BlockDefinition::value("get_attribute", OutputConstraint::Any, get_attribute)
            .field("ATTR", FieldWidget::Dropdown)
            .input(Socket::Document, checks.records.clone()),
    );
    reg.add(
        BlockDefinition::statement("set_attribute", set_attribute)
            .field("ATTR", FieldWidget::Dropdown)
            .input(Socket::Document, checks.records.clone())
            .input(Socket::Value, Check::Any),
    );
    reg.add(
        BlockDefinition::statement("delete_document", delete_document)
            .input(Socket::Document, checks.records.clone())
            .visible_in(&[MasterBlockType::Function]),
    );
    reg.add(
        BlockDefinition::statement("navigate_to_view", navigate)
            .field("VIEW", FieldWidget::Dropdown)
            .field("SIDEBAR", FieldWidget::Checkbox)
            .input(Socket::Document, checks.records.clone()),
    );
    reg.add(
        BlockDefinition::statement("send_email", send_email)
            .field("ATTACHMENT", FieldWidget::Dropdown)
            .input(Socket::To, Check::Any)
            .input(Socket::Subject, Check::Any)
            .input(Socket::Body, Check::Any)
            .input(Socket::Document, checks.records.clone()),
    );
    reg.add(
        BlockDefinition::statement("generate_pdf", generate_pdf)
            .field("ATTR", FieldWidget::Dropdown)
            .input(Socket::Document, checks.records.clone())
            .input(Socket::Html, Check::Any),
    );
}

fn selected_attribute(block: &Block) -> String {
    let selected = block
        .kind
        .attribute_picker()
        .and_then(|(picker, _)| picker.selected());
    quote(selected.unwrap_or_default())
}

fn document(block: &Block, e: &mut Emitter<'_>) -> String {
    e.value_or(block, Socket::Document, Order::Comma, "null")
}

fn read_view(block: &Block, e: &mut Emitter<'_>) -> Code {
    let view_id = match &block.kind {
        BlockKind::ReadView { view_id } => view_id.as_str(),
        _ => "",
    };
    Code::Value(e.host_call("readView", &[quote(view_id)]), Order::FunctionCall)
}

fn parent_document(block: &Block, e: &mut Emitter<'_>) -> Code {
    let doc = document(block, e);
    Code::Value(e.host_call("getParentDocument", &[doc]), Order::FunctionCall)
}

fn siblings(block: &Block, e: &mut Emitter<'_>) -> Code {
    let doc = document(block, e);
    Code::Value(e.host_call("getSiblingDocuments", &[doc]), Order::FunctionCall)
}

fn children(block: &Block, e: &mut Emitter<'_>) -> Code {
    let doc = document(block, e);
    Code::Value(e.host_call("getChildDocuments", &[doc]), Order::FunctionCall)
}

fn create_document(block: &Block, e: &mut Emitter<'_>) -> Code {
    let collection_id = match &block.kind {
        BlockKind::CreateDocument { collection_id } => collection_id.as_str(),
        _ => "",
    };
    Code::Value(
        e.host_call("createDocument", &[quote(collection_id)]),
        Order::FunctionCall,
    )
}

fn get_attribute(block: &Block, e: &mut Emitter<'_>) -> Code {
    let doc = document(block, e);
    let attr = selected_attribute(block);
    Code::Value(
        e.host_call("getDocumentAttribute", &[doc, attr]),
        Order::FunctionCall,
    )
}

fn set_attribute(block: &Block, e: &mut Emitter<'_>) -> Code {
    let doc = document(block, e);
    let attr = selected_attribute(block);
    let value = e.value_or(block, Socket::Value, Order::Comma, "null");
    Code::Statement(format!(
        "{};\n",
        e.host_call("setDocumentAttribute", &[doc, attr, value])
    ))
}

fn delete_document(block: &Block, e: &mut Emitter<'_>) -> Code {
    let doc = document(block, e);
    Code::Statement(format!("{};\n", e.host_call("removeDocument", &[doc])))
}

fn navigate(block: &Block, e: &mut Emitter<'_>) -> Code {
    let (view_id, sidebar) = match &block.kind {
        BlockKind::Navigate { view_id, sidebar } => (view_id.as_str(), *sidebar),
        _ => ("", false),
    };
    let doc = document(block, e);
    Code::Statement(format!(
        "{};\n",
        e.host_call("navigate", &[quote(view_id), doc, sidebar.to_string()])
    ))
}

fn send_email(block: &Block, e: &mut Emitter<'_>) -> Code {
    let to = e.value_or(block, Socket::To, Order::Comma, "\"\"");
    let subject = e.value_or(block, Socket::Subject, Order::Comma, "\"\"");
    let body = e.value_or(block, Socket::Body, Order::Comma, "\"\"");
    let doc = document(block, e);
    let attachment = selected_attribute(block);
    Code::Statement(format!(
        "{};\n",
        e.host_call("sendEmail", &[to, subject, body, doc, attachment])
    ))
}

fn generate_pdf(block: &Block, e: &mut Emitter<'_>) -> Code {
    let doc = document(block, e);
    let attr = selected_attribute(block);
    let html = e.value_or(block, Socket::Html, Order::Comma, "\"\"");
    Code::Statement(format!(
        "{};\n",
        e.host_call("generatePdf", &[doc, attr, html])
    ))
}
