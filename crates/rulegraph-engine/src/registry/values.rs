//! Literals, operators and host lookups that produce plain values.

use rulegraph_catalog::{ScalarType, TypeTag};

use super::{BlockDefinition, BlockRegistry, Check, FieldWidget, OutputConstraint};
use crate::block::{ArithmeticOp, Block, BlockKind, CompareOp, LogicOp, Socket};
use crate::emit::{quote, Code, Emitter, Order};

fn fixed(t: ScalarType) -> OutputConstraint {
    OutputConstraint::Fixed(TypeTag::Scalar(t))
}

pub(super) fn register(reg: &mut BlockRegistry) {
    let checks = reg.checks().clone();

    reg.add(BlockDefinition::value("text", fixed(ScalarType::String), text).field("TEXT", FieldWidget::Text));
    reg.add(
        BlockDefinition::value("math_number", fixed(ScalarType::Number), number)
            .field("NUM", FieldWidget::Number),
    );
    reg.add(
        BlockDefinition::value("logic_boolean", fixed(ScalarType::Boolean), boolean)
            .field("BOOL", FieldWidget::Dropdown),
    );
    reg.add(
        BlockDefinition::value("text_join", fixed(ScalarType::String), text_join)
            .input(Socket::A, Check::Any)
            .input(Socket::B, Check::Any),
    );
    reg.add(
        BlockDefinition::value("logic_compare", fixed(ScalarType::Boolean), compare)
            .field("OP", FieldWidget::Dropdown)
            .input(Socket::A, Check::Any)
            .input(Socket::B, Check::Any),
    );
    reg.add(
        BlockDefinition::value("logic_operation", fixed(ScalarType::Boolean), logic)
            .field("OP", FieldWidget::Dropdown)
            .input(Socket::A, checks.boolean.clone())
            .input(Socket::B, checks.boolean.clone()),
    );
    reg.add(
        BlockDefinition::value("logic_negate", fixed(ScalarType::Boolean), negate)
            .input(Socket::Value, checks.boolean.clone()),
    );
    reg.add(
        BlockDefinition::value("math_arithmetic", fixed(ScalarType::Number), arithmetic)
            .field("OP", FieldWidget::Dropdown)
            .input(Socket::A, checks.number.clone())
            .input(Socket::B, checks.number.clone()),
    );
    reg.add(BlockDefinition::value("date_now", fixed(ScalarType::Date), date_now));
    reg.add(BlockDefinition::value("current_user", fixed(ScalarType::String), current_user));
    reg.add(
        BlockDefinition::value("get_variable", fixed(ScalarType::String), project_variable)
            .field("NAME", FieldWidget::Dropdown),
    );
    reg.add(
        BlockDefinition::value("selection_list", fixed(ScalarType::Array), selection_list)
            .field("NAME", FieldWidget::Dropdown),
    );
    reg.add(
        BlockDefinition::value("list_length", fixed(ScalarType::Number), list_length)
            .input(Socket::List, checks.lists.clone()),
    );
}

fn text(block: &Block, _: &mut Emitter<'_>) -> Code {
    let BlockKind::Text { text } = &block.kind else {
        return Code::Value("\"\"".into(), Order::Atomic);
    };
    Code::Value(quote(text), Order::Atomic)
}

fn number(block: &Block, _: &mut Emitter<'_>) -> Code {
    let value = match &block.kind {
        BlockKind::Number { value } if value.is_finite() => *value,
        _ => 0.0,
    };
    let order = if value < 0.0 { Order::UnaryNegation } else { Order::Atomic };
    Code::Value(format!("{value}"), order)
}

fn boolean(block: &Block, _: &mut Emitter<'_>) -> Code {
    let value = matches!(block.kind, BlockKind::Boolean { value: true });
    Code::Value(value.to_string(), Order::Atomic)
}

fn text_join(block: &Block, e: &mut Emitter<'_>) -> Code {
    let a = e.value_or(block, Socket::A, Order::None, "\"\"");
    let b = e.value_or(block, Socket::B, Order::None, "\"\"");
    Code::Value(format!("String({a}) + String({b})"), Order::Addition)
}

fn compare(block: &Block, e: &mut Emitter<'_>) -> Code {
    let op = match block.kind {
        BlockKind::Compare { op } => op,
        _ => CompareOp::Eq,
    };
    let order = match op {
        CompareOp::Eq | CompareOp::Neq => Order::Equality,
        _ => Order::Relational,
    };
    let a = e.value_or(block, Socket::A, order, "0");
    let b = e.value_or(block, Socket::B, order, "0");
    Code::Value(format!("{a} {} {b}", op.symbol()), order)
}

fn logic(block: &Block, e: &mut Emitter<'_>) -> Code {
    let op = match block.kind {
        BlockKind::Logic { op } => op,
        _ => LogicOp::And,
    };
    let (symbol, order) = match op {
        LogicOp::And => ("&&", Order::LogicalAnd),
        LogicOp::Or => ("||", Order::LogicalOr),
    };
    let a = e.value(block, Socket::A, order);
    let b = e.value(block, Socket::B, order);
    // One missing operand becomes the identity of the operator.
    let identity = if op == LogicOp::And { "true" } else { "false" };
    let (a, b) = match (a, b) {
        (None, None) => ("false".to_string(), "false".to_string()),
        (a, b) => (
            a.unwrap_or_else(|| identity.to_string()),
            b.unwrap_or_else(|| identity.to_string()),
        ),
    };
    Code::Value(format!("{a} {symbol} {b}"), order)
}

fn negate(block: &Block, e: &mut Emitter<'_>) -> Code {
    let value = e.value_or(block, Socket::Value, Order::LogicalNot, "true");
    Code::Value(format!("!{value}"), Order::LogicalNot)
}

fn arithmetic(block: &Block, e: &mut Emitter<'_>) -> Code {
    let op = match block.kind {
        BlockKind::Arithmetic { op } => op,
        _ => ArithmeticOp::Add,
    };
    let (symbol, order) = match op {
        ArithmeticOp::Add => (" + ", Order::Addition),
        ArithmeticOp::Minus => (" - ", Order::Subtraction),
        ArithmeticOp::Multiply => (" * ", Order::Multiplication),
        ArithmeticOp::Divide => (" / ", Order::Division),
        ArithmeticOp::Power => {
            let a = e.value_or(block, Socket::A, Order::Comma, "0");
            let b = e.value_or(block, Socket::B, Order::Comma, "0");
            return Code::Value(format!("Math.pow({a}, {b})"), Order::FunctionCall);
        }
    };
    let a = e.value_or(block, Socket::A, order, "0");
    let b = e.value_or(block, Socket::B, order, "0");
    Code::Value(format!("{a}{symbol}{b}"), order)
}

fn date_now(_: &Block, e: &mut Emitter<'_>) -> Code {
    Code::Value(e.host_call("getCurrentDate", &[]), Order::FunctionCall)
}

fn current_user(_: &Block, e: &mut Emitter<'_>) -> Code {
    Code::Value(e.host_call("getCurrentUser", &[]), Order::FunctionCall)
}

fn project_variable(block: &Block, e: &mut Emitter<'_>) -> Code {
    let name = match &block.kind {
        BlockKind::ProjectVariable { name } => name.as_str(),
        _ => "",
    };
    Code::Value(e.host_call("getVariable", &[quote(name)]), Order::FunctionCall)
}

fn selection_list(block: &Block, e: &mut Emitter<'_>) -> Code {
    let name = match &block.kind {
        BlockKind::SelectionList { name } => name.as_str(),
        _ => "",
    };
    Code::Value(e.host_call("getSelectionList", &[quote(name)]), Order::FunctionCall)
}

fn list_length(block: &Block, e: &mut Emitter<'_>) -> Code {
    let list = e.value_or(block, Socket::List, Order::Member, "[]");
    Code::Value(format!("{list}.length"), Order::Member)
}
