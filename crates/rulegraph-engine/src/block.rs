//! Block nodes.
//!
//! A block is one node of the editing graph. Its `kind` is a tagged variant
//! carrying the block's own fields (dropdown selections, literals, variable
//! references); its value children hang off typed `Socket`s; statement blocks
//! additionally form `next` chains.
//!
//! Sockets and fields are addressed by name only at the diagram boundary
//! (`Socket::from_name`, `BlockKind::from_type_name`); engine code uses the
//! typed accessors.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use rulegraph_catalog::TypeTag;
use serde::{Deserialize, Serialize};

use crate::variables::VariableId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canvas position. Only meaningful for top-level blocks; it decides the order
/// in which top-level statement chains are emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, by: Position) -> Self {
        Self {
            x: self.x.saturating_add(by.x),
            y: self.y.saturating_add(by.y),
        }
    }
}

/// Named connection points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Socket {
    Document,
    Document2,
    Link,
    List,
    Value,
    Condition,
    Do,
    Else,
    A,
    B,
    Message,
    To,
    Subject,
    Body,
    Html,
}

impl Socket {
    pub const ALL: [Socket; 15] = [
        Socket::Document,
        Socket::Document2,
        Socket::Link,
        Socket::List,
        Socket::Value,
        Socket::Condition,
        Socket::Do,
        Socket::Else,
        Socket::A,
        Socket::B,
        Socket::Message,
        Socket::To,
        Socket::Subject,
        Socket::Body,
        Socket::Html,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Socket::Document => "DOCUMENT",
            Socket::Document2 => "DOCUMENT2",
            Socket::Link => "LINK",
            Socket::List => "LIST",
            Socket::Value => "VALUE",
            Socket::Condition => "IF",
            Socket::Do => "DO",
            Socket::Else => "ELSE",
            Socket::A => "A",
            Socket::B => "B",
            Socket::Message => "MESSAGE",
            Socket::To => "TO",
            Socket::Subject => "SUBJECT",
            Socket::Body => "BODY",
            Socket::Html => "HTML",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Socket::ALL.into_iter().find(|s| s.name() == name)
    }
}

impl fmt::Display for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Choice {
    pub id: String,
    pub label: String,
}

/// A dropdown whose options are recomputed by propagation (attribute and
/// collection pickers).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Picker {
    pub options: Vec<Choice>,
    pub selected: Option<String>,
}

impl Picker {
    /// A picker that remembers a selection but has not been populated yet.
    pub fn selecting(id: &str) -> Self {
        Self {
            options: Vec::new(),
            selected: Some(id.to_string()),
        }
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn has_option(&self, id: &str) -> bool {
        self.options.iter().any(|c| c.id == id)
    }

    /// Replace the options and pick the first candidate that is still offered,
    /// falling back to the first option. Returns the new picker; the caller
    /// compares it to decide whether anything changed.
    pub fn repopulated(&self, options: Vec<Choice>, preferred: &[Option<&str>]) -> Picker {
        let selected = preferred
            .iter()
            .flatten()
            .find(|id| options.iter().any(|c| c.id == **id))
            .map(|id| id.to_string())
            .or_else(|| options.first().map(|c| c.id.clone()));
        Picker { options, selected }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    pub const ALL: [CompareOp; 6] = [
        CompareOp::Eq,
        CompareOp::Neq,
        CompareOp::Lt,
        CompareOp::Lte,
        CompareOp::Gt,
        CompareOp::Gte,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CompareOp::Eq => "EQ",
            CompareOp::Neq => "NEQ",
            CompareOp::Lt => "LT",
            CompareOp::Lte => "LTE",
            CompareOp::Gt => "GT",
            CompareOp::Gte => "GTE",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Neq => "!=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        CompareOp::ALL.into_iter().find(|op| op.name() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicOp {
    And,
    Or,
}

impl LogicOp {
    pub fn name(self) -> &'static str {
        match self {
            LogicOp::And => "AND",
            LogicOp::Or => "OR",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "AND" => Some(LogicOp::And),
            "OR" => Some(LogicOp::Or),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add,
    Minus,
    Multiply,
    Divide,
    Power,
}

impl ArithmeticOp {
    pub const ALL: [ArithmeticOp; 5] = [
        ArithmeticOp::Add,
        ArithmeticOp::Minus,
        ArithmeticOp::Multiply,
        ArithmeticOp::Divide,
        ArithmeticOp::Power,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "ADD",
            ArithmeticOp::Minus => "MINUS",
            ArithmeticOp::Multiply => "MULTIPLY",
            ArithmeticOp::Divide => "DIVIDE",
            ArithmeticOp::Power => "POWER",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ArithmeticOp::ALL.into_iter().find(|op| op.name() == name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MessageLevel {
    #[default]
    Success,
    Info,
    Warning,
    Error,
}

impl MessageLevel {
    pub const ALL: [MessageLevel; 4] = [
        MessageLevel::Success,
        MessageLevel::Info,
        MessageLevel::Warning,
        MessageLevel::Error,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MessageLevel::Success => "success",
            MessageLevel::Info => "info",
            MessageLevel::Warning => "warning",
            MessageLevel::Error => "error",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        MessageLevel::ALL.into_iter().find(|l| l.name() == name)
    }
}

pub const LINKED_DOCUMENTS_SUFFIX: &str = "-link";
pub const LINK_INSTANCES_SUFFIX: &str = "-link_instance";

/// Every supported block kind with its own field values.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    VariableGet { variable: VariableId },
    VariableSet { variable: VariableId },
    Text { text: String },
    Number { value: f64 },
    Boolean { value: bool },
    TextJoin,
    Compare { op: CompareOp },
    Logic { op: LogicOp },
    Negate,
    Arithmetic { op: ArithmeticOp },
    CurrentDate,
    CurrentUser,
    ProjectVariable { name: String },
    SelectionList { name: String },
    ListLength,
    ReadView { view_id: String },
    ParentDocument,
    SiblingDocuments,
    ChildDocuments,
    CreateDocument { collection_id: String },
    LinkDocuments { link_type_id: String },
    LinkedDocuments { link_type_id: String },
    LinkInstances { link_type_id: String },
    LinkDocument { collection: Picker },
    GetAttribute { attribute: Picker },
    GetLinkAttribute { attribute: Picker },
    SetAttribute { attribute: Picker },
    SetLinkAttribute { attribute: Picker },
    ForEachDocument { variable: VariableId },
    ForEachLink { variable: VariableId },
    If,
    DeleteDocument,
    DeleteLink,
    ShowMessage { level: MessageLevel },
    Navigate { view_id: String, sidebar: bool },
    SendEmail { attachment: Picker },
    GeneratePdf { attribute: Picker },
    SetResult,
}

impl BlockKind {
    /// Registry key of this kind. Per-link-type kinds get a composite key.
    pub fn type_name(&self) -> Cow<'static, str> {
        let name = match self {
            BlockKind::VariableGet { .. } => "variables_get",
            BlockKind::VariableSet { .. } => "variables_set",
            BlockKind::Text { .. } => "text",
            BlockKind::Number { .. } => "math_number",
            BlockKind::Boolean { .. } => "logic_boolean",
            BlockKind::TextJoin => "text_join",
            BlockKind::Compare { .. } => "logic_compare",
            BlockKind::Logic { .. } => "logic_operation",
            BlockKind::Negate => "logic_negate",
            BlockKind::Arithmetic { .. } => "math_arithmetic",
            BlockKind::CurrentDate => "date_now",
            BlockKind::CurrentUser => "current_user",
            BlockKind::ProjectVariable { .. } => "get_variable",
            BlockKind::SelectionList { .. } => "selection_list",
            BlockKind::ListLength => "list_length",
            BlockKind::ReadView { .. } => "read_documents",
            BlockKind::ParentDocument => "get_parent_document",
            BlockKind::SiblingDocuments => "get_siblings",
            BlockKind::ChildDocuments => "get_children",
            BlockKind::CreateDocument { .. } => "create_document",
            BlockKind::LinkDocuments { .. } => "link_documents",
            BlockKind::LinkedDocuments { link_type_id } => {
                return Cow::Owned(linked_documents_type(link_type_id));
            }
            BlockKind::LinkInstances { link_type_id } => {
                return Cow::Owned(link_instances_type(link_type_id));
            }
            BlockKind::LinkDocument { .. } => "get_link_document",
            BlockKind::GetAttribute { .. } => "get_attribute",
            BlockKind::GetLinkAttribute { .. } => "get_link_attribute",
            BlockKind::SetAttribute { .. } => "set_attribute",
            BlockKind::SetLinkAttribute { .. } => "set_link_attribute",
            BlockKind::ForEachDocument { .. } => "foreach_document_array",
            BlockKind::ForEachLink { .. } => "foreach_link_array",
            BlockKind::If => "controls_if",
            BlockKind::DeleteDocument => "delete_document",
            BlockKind::DeleteLink => "delete_link",
            BlockKind::ShowMessage { .. } => "show_message",
            BlockKind::Navigate { .. } => "navigate_to_view",
            BlockKind::SendEmail { .. } => "send_email",
            BlockKind::GeneratePdf { .. } => "generate_pdf",
            BlockKind::SetResult => "set_result",
        };
        Cow::Borrowed(name)
    }

    /// A kind with empty fields for `type_name`, used when reading diagrams.
    /// Variable-bound kinds get a placeholder variable that the `VAR` field
    /// must overwrite.
    pub fn from_type_name(type_name: &str) -> Option<BlockKind> {
        let placeholder = VariableId::default;
        let kind = match type_name {
            "variables_get" => BlockKind::VariableGet { variable: placeholder() },
            "variables_set" => BlockKind::VariableSet { variable: placeholder() },
            "text" => BlockKind::Text { text: String::new() },
            "math_number" => BlockKind::Number { value: 0.0 },
            "logic_boolean" => BlockKind::Boolean { value: true },
            "text_join" => BlockKind::TextJoin,
            "logic_compare" => BlockKind::Compare { op: CompareOp::Eq },
            "logic_operation" => BlockKind::Logic { op: LogicOp::And },
            "logic_negate" => BlockKind::Negate,
            "math_arithmetic" => BlockKind::Arithmetic { op: ArithmeticOp::Add },
            "date_now" => BlockKind::CurrentDate,
            "current_user" => BlockKind::CurrentUser,
            "get_variable" => BlockKind::ProjectVariable { name: String::new() },
            "selection_list" => BlockKind::SelectionList { name: String::new() },
            "list_length" => BlockKind::ListLength,
            "read_documents" => BlockKind::ReadView { view_id: String::new() },
            "get_parent_document" => BlockKind::ParentDocument,
            "get_siblings" => BlockKind::SiblingDocuments,
            "get_children" => BlockKind::ChildDocuments,
            "create_document" => BlockKind::CreateDocument { collection_id: String::new() },
            "link_documents" => BlockKind::LinkDocuments { link_type_id: String::new() },
            "get_link_document" => BlockKind::LinkDocument { collection: Picker::default() },
            "get_attribute" => BlockKind::GetAttribute { attribute: Picker::default() },
            "get_link_attribute" => BlockKind::GetLinkAttribute { attribute: Picker::default() },
            "set_attribute" => BlockKind::SetAttribute { attribute: Picker::default() },
            "set_link_attribute" => BlockKind::SetLinkAttribute { attribute: Picker::default() },
            "foreach_document_array" => BlockKind::ForEachDocument { variable: placeholder() },
            "foreach_link_array" => BlockKind::ForEachLink { variable: placeholder() },
            "controls_if" => BlockKind::If,
            "delete_document" => BlockKind::DeleteDocument,
            "delete_link" => BlockKind::DeleteLink,
            "show_message" => BlockKind::ShowMessage { level: MessageLevel::default() },
            "navigate_to_view" => BlockKind::Navigate { view_id: String::new(), sidebar: false },
            "send_email" => BlockKind::SendEmail { attachment: Picker::default() },
            "generate_pdf" => BlockKind::GeneratePdf { attribute: Picker::default() },
            "set_result" => BlockKind::SetResult,
            other => {
                if let Some(link_type_id) = other.strip_suffix(LINK_INSTANCES_SUFFIX) {
                    return non_empty(link_type_id).map(|id| BlockKind::LinkInstances { link_type_id: id });
                }
                if let Some(link_type_id) = other.strip_suffix(LINKED_DOCUMENTS_SUFFIX) {
                    return non_empty(link_type_id).map(|id| BlockKind::LinkedDocuments { link_type_id: id });
                }
                return None;
            }
        };
        Some(kind)
    }

    /// Variable this block reads or binds, if any.
    pub fn variable(&self) -> Option<&VariableId> {
        match self {
            BlockKind::VariableGet { variable }
            | BlockKind::VariableSet { variable }
            | BlockKind::ForEachDocument { variable }
            | BlockKind::ForEachLink { variable } => Some(variable),
            _ => None,
        }
    }

    pub(crate) fn variable_mut(&mut self) -> Option<&mut VariableId> {
        match self {
            BlockKind::VariableGet { variable }
            | BlockKind::VariableSet { variable }
            | BlockKind::ForEachDocument { variable }
            | BlockKind::ForEachLink { variable } => Some(variable),
            _ => None,
        }
    }

    pub fn is_getter_of(&self, var: &VariableId) -> bool {
        matches!(self, BlockKind::VariableGet { variable } if variable == var)
    }

    /// Link type a per-link-type kind was registered for.
    pub fn link_type_variant(&self) -> Option<&str> {
        match self {
            BlockKind::LinkedDocuments { link_type_id } | BlockKind::LinkInstances { link_type_id } => {
                Some(link_type_id)
            }
            _ => None,
        }
    }

    /// Attribute picker and whether it only offers file attributes.
    pub fn attribute_picker(&self) -> Option<(&Picker, bool)> {
        match self {
            BlockKind::GetAttribute { attribute }
            | BlockKind::GetLinkAttribute { attribute }
            | BlockKind::SetAttribute { attribute }
            | BlockKind::SetLinkAttribute { attribute } => Some((attribute, false)),
            BlockKind::SendEmail { attachment } => Some((attachment, true)),
            BlockKind::GeneratePdf { attribute } => Some((attribute, true)),
            _ => None,
        }
    }

    pub(crate) fn attribute_picker_mut(&mut self) -> Option<&mut Picker> {
        match self {
            BlockKind::GetAttribute { attribute }
            | BlockKind::GetLinkAttribute { attribute }
            | BlockKind::SetAttribute { attribute }
            | BlockKind::SetLinkAttribute { attribute }
            | BlockKind::GeneratePdf { attribute } => Some(attribute),
            BlockKind::SendEmail { attachment } => Some(attachment),
            _ => None,
        }
    }

    /// Socket whose value an attribute picker reads its attributes from.
    pub fn attribute_subject(&self) -> Option<Socket> {
        match self {
            BlockKind::GetAttribute { .. }
            | BlockKind::SetAttribute { .. }
            | BlockKind::SendEmail { .. }
            | BlockKind::GeneratePdf { .. } => Some(Socket::Document),
            BlockKind::GetLinkAttribute { .. } | BlockKind::SetLinkAttribute { .. } => Some(Socket::Link),
            _ => None,
        }
    }
}

pub fn linked_documents_type(link_type_id: &str) -> String {
    format!("{link_type_id}{LINKED_DOCUMENTS_SUFFIX}")
}

pub fn link_instances_type(link_type_id: &str) -> String {
    format!("{link_type_id}{LINK_INSTANCES_SUFFIX}")
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Where a block hangs from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentLink {
    /// Plugged into `socket` of the parent (value or statement socket).
    Input(BlockId, Socket),
    /// Follows the parent in a statement chain.
    Next(BlockId),
}

impl ParentLink {
    pub fn block(self) -> BlockId {
        match self {
            ParentLink::Input(id, _) | ParentLink::Next(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub kind: BlockKind,
    pub position: Position,
    pub(crate) inputs: BTreeMap<Socket, BlockId>,
    pub(crate) parent: Option<ParentLink>,
    pub(crate) next: Option<BlockId>,
    pub(crate) output: TypeTag,
}

impl Block {
    pub(crate) fn new(id: BlockId, kind: BlockKind, position: Position) -> Self {
        Self {
            id,
            kind,
            position,
            inputs: BTreeMap::new(),
            parent: None,
            next: None,
            output: TypeTag::Unset,
        }
    }

    pub fn input(&self, socket: Socket) -> Option<BlockId> {
        self.inputs.get(&socket).copied()
    }

    pub fn inputs(&self) -> impl Iterator<Item = (Socket, BlockId)> + '_ {
        self.inputs.iter().map(|(s, id)| (*s, *id))
    }

    pub fn document(&self) -> Option<BlockId> {
        self.input(Socket::Document)
    }

    pub fn link(&self) -> Option<BlockId> {
        self.input(Socket::Link)
    }

    pub fn list(&self) -> Option<BlockId> {
        self.input(Socket::List)
    }

    pub fn value(&self) -> Option<BlockId> {
        self.input(Socket::Value)
    }

    pub fn next(&self) -> Option<BlockId> {
        self.next
    }

    pub fn parent(&self) -> Option<ParentLink> {
        self.parent
    }

    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    /// Current output tag (unset for statement blocks).
    pub fn output(&self) -> &TypeTag {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_round_trip_through_from_type_name() {
        for name in [
            "get_attribute",
            "show_message",
            "foreach_link_array",
            "ord-cus-link",
            "ord-cus-link_instance",
        ] {
            let kind = BlockKind::from_type_name(name).unwrap();
            assert_eq!(kind.type_name(), name);
        }
        assert!(BlockKind::from_type_name("-link").is_none());
        assert!(BlockKind::from_type_name("no_such_block").is_none());
    }

    #[test]
    fn link_instance_suffix_is_checked_first() {
        assert_eq!(
            BlockKind::from_type_name("l1-link_instance"),
            Some(BlockKind::LinkInstances { link_type_id: "l1".into() })
        );
        assert_eq!(
            BlockKind::from_type_name("l1-link"),
            Some(BlockKind::LinkedDocuments { link_type_id: "l1".into() })
        );
    }

    #[test]
    fn repopulated_prefers_candidates_in_order() {
        let options = vec![
            Choice { id: "a".into(), label: "A".into() },
            Choice { id: "b".into(), label: "B".into() },
        ];
        let picker = Picker::selecting("b");
        assert_eq!(picker.repopulated(options.clone(), &[Some("b"), Some("a")]).selected(), Some("b"));
        assert_eq!(picker.repopulated(options.clone(), &[Some("zz"), Some("b")]).selected(), Some("b"));
        assert_eq!(picker.repopulated(options.clone(), &[None, Some("zz")]).selected(), Some("a"));
        assert_eq!(picker.repopulated(Vec::new(), &[Some("b")]).selected(), None);
    }

    #[test]
    fn socket_names() {
        assert_eq!(Socket::from_name("IF"), Some(Socket::Condition));
        assert_eq!(Socket::Document2.to_string(), "DOCUMENT2");
        assert_eq!(Socket::from_name("NOPE"), None);
    }

    #[test]
    fn offset_saturates_at_canvas_edge() {
        let edge = Position::new(i32::MAX, i32::MIN);
        assert_eq!(
            edge.offset(Position::new(25, -25)),
            Position::new(i32::MAX, i32::MIN)
        );
    }
}
