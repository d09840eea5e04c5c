//! Script emission.
//!
//! One generator per block type (see `registry`) turns a block into a
//! `Code` fragment. Value fragments carry an `Order`, which decides whether a
//! parent has to wrap them in parentheses. All state of one emission run (the
//! context identifier, legal variable names, whether the host context was
//! touched) lives in the `Emitter` passed down the recursion.

pub mod names;

use rulegraph_catalog::Catalog;

use crate::block::{Block, BlockId, Socket};
use crate::config::EditorConfig;
use crate::graph::BlockGraph;
use crate::registry::BlockRegistry;
use crate::variables::{VariableId, VariableMap};

pub use names::NameDb;

/// Operator precedence of a value fragment, lowest binds tightest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Atomic = 0,
    Member = 12,
    FunctionCall = 20,
    UnaryNegation = 43,
    LogicalNot = 44,
    Multiplication = 51,
    Division = 52,
    Subtraction = 61,
    Addition = 62,
    Relational = 80,
    Equality = 90,
    LogicalAnd = 130,
    LogicalOr = 140,
    Conditional = 150,
    Assignment = 160,
    Comma = 180,
    None = 990,
}

impl Order {
    fn rank(self) -> u16 {
        self as u16
    }

    /// Pairs that never need parentheses even though the ranks say otherwise:
    /// `a.b().c`, `!!x`, `a * b * c`, `a + b + c`, `a && b && c`, `a || b || c`.
    fn overrides(inner: Order, outer: Order) -> bool {
        use Order::*;
        matches!(
            (outer, inner),
            (FunctionCall, Member)
                | (FunctionCall, FunctionCall)
                | (Member, Member)
                | (Member, FunctionCall)
                | (LogicalNot, LogicalNot)
                | (Multiplication, Multiplication)
                | (Addition, Addition)
                | (LogicalAnd, LogicalAnd)
                | (LogicalOr, LogicalOr)
        )
    }

    pub fn needs_parens(inner: Order, outer: Order) -> bool {
        if Order::overrides(inner, outer) {
            return false;
        }
        if inner == outer && matches!(outer, Order::Atomic | Order::None) {
            return false;
        }
        inner.rank() >= outer.rank()
    }
}

/// What one generator produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Code {
    Value(String, Order),
    Statement(String),
}

/// Session-scoped emission context.
pub struct Emitter<'a> {
    pub graph: &'a BlockGraph,
    pub catalog: &'a Catalog,
    pub variables: &'a VariableMap,
    pub config: &'a EditorConfig,
    registry: &'a BlockRegistry,
    names: NameDb,
    context_name: String,
    context_used: bool,
}

impl<'a> Emitter<'a> {
    pub fn new(
        graph: &'a BlockGraph,
        registry: &'a BlockRegistry,
        catalog: &'a Catalog,
        variables: &'a VariableMap,
        config: &'a EditorConfig,
    ) -> Self {
        let mut names = NameDb::new();
        let context_name = names.reserve(&config.context_identifier);
        Self {
            graph,
            catalog,
            variables,
            config,
            registry,
            names,
            context_name,
            context_used: false,
        }
    }

    /// The host context identifier. Using it adds the import to the prelude.
    pub fn ctx(&mut self) -> String {
        self.context_used = true;
        self.context_name.clone()
    }

    pub fn variable_name(&mut self, id: &VariableId) -> String {
        let display = self
            .variables
            .get(id)
            .map(|v| v.name.clone())
            .unwrap_or_else(|| id.to_string());
        self.names.variable(id, &display)
    }

    /// Code of the value plugged into `socket`, parenthesised for a position
    /// of precedence `outer`. `None` when the socket is empty.
    pub fn value(&mut self, block: &Block, socket: Socket, outer: Order) -> Option<String> {
        let graph = self.graph;
        let child = graph.get(block.input(socket)?)?;
        match self.generate(child) {
            Code::Value(code, inner) if Order::needs_parens(inner, outer) => Some(format!("({code})")),
            Code::Value(code, _) => Some(code),
            Code::Statement(_) => None,
        }
    }

    pub fn value_or(&mut self, block: &Block, socket: Socket, outer: Order, default: &str) -> String {
        self.value(block, socket, outer)
            .unwrap_or_else(|| default.to_string())
    }

    /// The statement chain in `socket`, indented one level.
    pub fn statements(&mut self, block: &Block, socket: Socket) -> String {
        let Some(first) = block.input(socket) else {
            return String::new();
        };
        let body = self.chain(first);
        indent(&body, &self.config.indent)
    }

    /// Emit a statement chain starting at `first`.
    pub fn chain(&mut self, first: BlockId) -> String {
        let graph = self.graph;
        let mut out = String::new();
        let mut cur = Some(first);
        while let Some(id) = cur {
            let Some(block) = graph.get(id) else { break };
            if let Code::Statement(code) = self.generate(block) {
                out.push_str(&code);
            }
            cur = block.next();
        }
        out
    }

    fn generate(&mut self, block: &Block) -> Code {
        let registry = self.registry;
        match registry.lookup(&block.kind) {
            Some(def) => (def.generator)(block, self),
            None => {
                tracing::warn!(block = %block.id, block_type = %block.kind.type_name(), "no generator registered");
                Code::Statement(String::new())
            }
        }
    }

    /// Host call expression: `ctx.name(args...)`.
    pub fn host_call(&mut self, name: &str, args: &[String]) -> String {
        let ctx = self.ctx();
        format!("{ctx}.{name}({})", args.join(", "))
    }
}

/// JSON string literal; valid in the script dialect as well.
pub fn quote(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}

fn indent(code: &str, unit: &str) -> String {
    code.lines()
        .map(|line| {
            if line.is_empty() {
                "\n".to_string()
            } else {
                format!("{unit}{line}\n")
            }
        })
        .collect::<Vec<_>>()
        .concat()
}

/// Emit the whole script. An empty string means the graph does nothing.
pub fn emit_script(
    graph: &BlockGraph,
    registry: &BlockRegistry,
    catalog: &Catalog,
    variables: &VariableMap,
    config: &EditorConfig,
) -> String {
    let mut emitter = Emitter::new(graph, registry, catalog, variables, config);

    let mut body = String::new();
    for top in graph.top_blocks() {
        let Some(block) = graph.get(top) else { continue };
        if !registry.is_statement(&block.kind) {
            continue;
        }
        body.push_str(&emitter.chain(top));
    }
    if body.trim().is_empty() {
        return String::new();
    }

    let declared: Vec<String> = variables
        .iter()
        .filter(|v| !v.protected)
        .map(|v| emitter.variable_name(&v.id))
        .collect();

    let mut prelude = String::new();
    if emitter.context_used {
        prelude.push_str(&format!(
            "var {} = {};\n",
            emitter.context_name, config.context_import
        ));
    }
    if !declared.is_empty() {
        prelude.push_str(&format!("var {};\n", declared.join(", ")));
    }
    if prelude.is_empty() {
        body
    } else {
        format!("{prelude}\n{body}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parenthesisation_follows_precedence() {
        assert!(Order::needs_parens(Order::Addition, Order::Multiplication));
        assert!(!Order::needs_parens(Order::Multiplication, Order::Addition));
        assert!(!Order::needs_parens(Order::Addition, Order::Addition));
        assert!(Order::needs_parens(Order::Subtraction, Order::Subtraction));
        assert!(!Order::needs_parens(Order::Atomic, Order::Atomic));
        assert!(!Order::needs_parens(Order::FunctionCall, Order::None));
        assert!(Order::needs_parens(Order::LogicalOr, Order::LogicalAnd));
    }

    #[test]
    fn quote_escapes_like_json() {
        assert_eq!(quote("say \"hi\"\n"), r#""say \"hi\"\n""#);
    }

    #[test]
    fn indent_skips_blank_lines() {
        assert_eq!(indent("a;\n\nb;\n", "  "), "  a;\n\n  b;\n");
    }
}
