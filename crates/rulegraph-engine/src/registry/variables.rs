use super::{BlockDefinition, BlockRegistry, Check, FieldWidget, OutputConstraint};
use crate::block::{Block, Socket};
use crate::emit::{Code, Emitter, Order};

pub(super) fn register(reg: &mut BlockRegistry) {
    reg.add(
        BlockDefinition::value("variables_get", OutputConstraint::Derived, get)
            .field("VAR", FieldWidget::Variable),
    );
    reg.add(
        BlockDefinition::statement("variables_set", set)
            .field("VAR", FieldWidget::Variable)
            .input(Socket::Value, Check::Any),
    );
}

fn get(block: &Block, e: &mut Emitter<'_>) -> Code {
    let name = match block.kind.variable() {
        Some(var) => e.variable_name(var),
        None => "undefined".to_string(),
    };
    Code::Value(name, Order::Atomic)
}

fn set(block: &Block, e: &mut Emitter<'_>) -> Code {
    let Some(var) = block.kind.variable() else {
        return Code::Statement(String::new());
    };
    let name = e.variable_name(var);
    let value = e.value_or(block, Socket::Value, Order::Assignment, "null");
    Code::Statement(format!("{name} = {value};\n"))
}
