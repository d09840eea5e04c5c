//! Control flow and host actions that do not belong to one entity family.

use rulegraph_catalog::MasterBlockType;

use super::{BlockDefinition, BlockRegistry, Check, FieldWidget};
use crate::block::{Block, BlockKind, Socket};
use crate::emit::{quote, Code, Emitter, Order};

pub(super) fn register(reg: &mut BlockRegistry) {
    let checks = reg.checks().clone();

    reg.add(
        BlockDefinition::statement("controls_if", controls_if)
            .input(Socket::Condition, checks.boolean.clone())
            .body(Socket::Do)
            .body(Socket::Else),
    );
    reg.add(
        BlockDefinition::statement("foreach_document_array", for_each)
            .field("VAR", FieldWidget::Variable)
            .input(Socket::List, checks.record_arrays.clone())
            .body(Socket::Do),
    );
    reg.add(
        BlockDefinition::statement("show_message", show_message)
            .field("LEVEL", FieldWidget::Dropdown)
            .input(Socket::Message, Check::Any),
    );
    reg.add(
        BlockDefinition::statement("set_result", set_result)
            .input(Socket::Value, Check::Any)
            .visible_in(&[MasterBlockType::Value]),
    );
}

fn controls_if(block: &Block, e: &mut Emitter<'_>) -> Code {
    let condition = e.value_or(block, Socket::Condition, Order::None, "false");
    let then = e.statements(block, Socket::Do);
    let mut code = format!("if ({condition}) {{\n{then}}}");
    if block.input(Socket::Else).is_some() {
        let otherwise = e.statements(block, Socket::Else);
        code.push_str(&format!(" else {{\n{otherwise}}}"));
    }
    code.push('\n');
    Code::Statement(code)
}

/// Shared by the record and link loops.
pub(super) fn for_each(block: &Block, e: &mut Emitter<'_>) -> Code {
    let item = match block.kind.variable() {
        Some(var) => e.variable_name(var),
        None => "item".to_string(),
    };
    let list = e.value_or(block, Socket::List, Order::None, "[]");
    let body = e.statements(block, Socket::Do);
    Code::Statement(format!("for ({item} of {list}) {{\n{body}}}\n"))
}

fn show_message(block: &Block, e: &mut Emitter<'_>) -> Code {
    let level = match block.kind {
        BlockKind::ShowMessage { level } => level.name(),
        _ => "info",
    };
    let message = e.value_or(block, Socket::Message, Order::Comma, "\"\"");
    Code::Statement(format!(
        "{};\n",
        e.host_call("showMessage", &[quote(level), message])
    ))
}

fn set_result(block: &Block, e: &mut Emitter<'_>) -> Code {
    let value = e.value_or(block, Socket::Value, Order::None, "null");
    Code::Statement(format!("{};\n", e.host_call("setResult", &[value])))
}
