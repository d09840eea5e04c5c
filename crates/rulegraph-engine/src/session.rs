//! Editing session: the host-facing surface.
//!
//! Every public mutating call is one mutation cycle:
//!
//! 1. the edit is applied to the graph and recorded with the observer,
//! 2. if anything structural happened, propagation runs to a fixpoint,
//! 3. script and diagram are regenerated,
//! 4. the change listeners fire.
//!
//! Local problems (stale selections, edges that stopped type-checking,
//! rejected connections) never surface as errors. Only unsupported
//! requests, unknown ids and unreadable input do.

use rulegraph_catalog::{AutomationTarget, Catalog, MasterBlockType, SeedVariable};

use crate::block::{
    ArithmeticOp, Block, BlockId, BlockKind, CompareOp, LogicOp, MessageLevel, ParentLink, Position, Socket,
};
use crate::config::EditorConfig;
use crate::debug::DryRunSlots;
use crate::diagram::{read_diagram, write_diagram, Loader};
use crate::emit::emit_script;
use crate::error::EngineError;
use crate::graph::BlockGraph;
use crate::observer::{GraphEvent, MutationObserver};
use crate::propagate::{PropagationReport, Propagator};
use crate::registry::{BlockRegistry, InputKind};
use crate::variables::{Variable, VariableId, VariableMap};

/// Outcome of a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    Connected,
    /// Incompatible types, wrong socket kind or a cycle. Nothing changed.
    Rejected,
}

/// A single field edit.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEdit {
    Text(String),
    Number(f64),
    Boolean(bool),
    Compare(CompareOp),
    Logic(LogicOp),
    Arithmetic(ArithmeticOp),
    /// Project variable or selection list name.
    Name(String),
    View(String),
    Sidebar(bool),
    Collection(String),
    LinkType(String),
    Attribute(String),
    Level(MessageLevel),
    Variable(VariableId),
}

impl FieldEdit {
    pub fn field_name(&self) -> &'static str {
        match self {
            FieldEdit::Text(_) => "TEXT",
            FieldEdit::Number(_) => "NUM",
            FieldEdit::Boolean(_) => "BOOL",
            FieldEdit::Compare(_) | FieldEdit::Logic(_) | FieldEdit::Arithmetic(_) => "OP",
            FieldEdit::Name(_) => "NAME",
            FieldEdit::View(_) => "VIEW",
            FieldEdit::Sidebar(_) => "SIDEBAR",
            FieldEdit::Collection(_) => "COLLECTION",
            FieldEdit::LinkType(_) => "LINKTYPE",
            FieldEdit::Attribute(_) => "ATTR",
            FieldEdit::Level(_) => "LEVEL",
            FieldEdit::Variable(_) => "VAR",
        }
    }
}

type Listener = Box<dyn FnMut(&str)>;

const SEED_ORIGIN: Position = Position { x: 20, y: 20 };
const SEED_SPACING: i32 = 40;

pub struct EditorSession {
    catalog: Catalog,
    target: Option<AutomationTarget>,
    master: MasterBlockType,
    config: EditorConfig,
    seeds: Vec<SeedVariable>,
    registry: BlockRegistry,
    graph: BlockGraph,
    variables: VariableMap,
    observer: MutationObserver,
    script: String,
    diagram: String,
    last_report: PropagationReport,
    script_listeners: Vec<Listener>,
    diagram_listeners: Vec<Listener>,
    /// Display state for the host's dry-run panel.
    pub dry_run: DryRunSlots,
}

impl EditorSession {
    /// Session for a concrete automation target. Seeds come from the target
    /// plus any the host listed in `catalog.variables`.
    pub fn for_target(
        catalog: Catalog,
        target: &AutomationTarget,
        config: EditorConfig,
    ) -> Result<Self, EngineError> {
        let seeds = target.seed_variables(&catalog)?;
        let mut session = Self::build(catalog, target.master, config, seeds);
        session.target = Some(target.clone());
        session.commit();
        Ok(session)
    }

    /// Session whose seeds are exactly `catalog.variables`.
    pub fn new(catalog: Catalog, master: MasterBlockType, config: EditorConfig) -> Self {
        let mut session = Self::build(catalog, master, config, Vec::new());
        session.commit();
        session
    }

    fn build(catalog: Catalog, master: MasterBlockType, config: EditorConfig, mut seeds: Vec<SeedVariable>) -> Self {
        for extra in &catalog.variables {
            if !seeds.iter().any(|s| s.name == extra.name) {
                seeds.push(extra.clone());
            }
        }
        let registry = BlockRegistry::new(&catalog, master);
        let mut session = Self {
            catalog,
            target: None,
            master,
            config,
            seeds,
            registry,
            graph: BlockGraph::new(),
            variables: VariableMap::new(),
            observer: MutationObserver::new(),
            script: String::new(),
            diagram: String::new(),
            last_report: PropagationReport::default(),
            script_listeners: Vec::new(),
            diagram_listeners: Vec::new(),
            dry_run: DryRunSlots::default(),
        };
        session.variables = session.seeded_variables();
        session.place_seed_getters();
        session.observer.record(GraphEvent::Loaded);
        session
    }

    fn seeded_variables(&self) -> VariableMap {
        let mut variables = VariableMap::new();
        for seed in &self.seeds {
            variables.seed(seed);
        }
        variables
    }

    /// One getter per protected variable that has none yet.
    fn place_seed_getters(&mut self) {
        if !self.config.seed_getters {
            return;
        }
        let missing: Vec<VariableId> = self
            .variables
            .iter()
            .filter(|v| v.protected)
            .map(|v| v.id.clone())
            .filter(|id| self.graph.getters_of(id).is_empty())
            .collect();
        for (i, variable) in missing.into_iter().enumerate() {
            let position = Position::new(SEED_ORIGIN.x, SEED_ORIGIN.y + SEED_SPACING * i as i32);
            let id = self.graph.insert(BlockKind::VariableGet { variable }, position);
            self.observer.record(GraphEvent::Created(id));
        }
    }

    // ------------------------------------------------------------------
    // Host surface
    // ------------------------------------------------------------------

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn diagram(&self) -> &str {
        &self.diagram
    }

    /// The script, or `EmptyScript` when the graph does nothing.
    pub fn compile(&self) -> Result<String, EngineError> {
        if self.script.is_empty() {
            return Err(EngineError::EmptyScript);
        }
        Ok(self.script.clone())
    }

    pub fn on_script_changed(&mut self, listener: impl FnMut(&str) + 'static) {
        self.script_listeners.push(Box::new(listener));
    }

    pub fn on_diagram_changed(&mut self, listener: impl FnMut(&str) + 'static) {
        self.diagram_listeners.push(Box::new(listener));
    }

    /// Replace the graph with a stored diagram and re-validate it.
    pub fn load_diagram(&mut self, xml: &str) -> Result<PropagationReport, EngineError> {
        let root = read_diagram(xml)?;
        let mut variables = self.seeded_variables();
        let graph = Loader::new(&self.catalog, &mut self.registry, &mut variables).load(&root);
        tracing::debug!(blocks = graph.len(), variables = variables.len(), "diagram loaded");
        self.graph = graph;
        self.variables = variables;
        self.place_seed_getters();
        self.observer.record(GraphEvent::Loaded);
        Ok(self.commit())
    }

    /// Rebuild the session against a new catalog, keeping the current diagram.
    pub fn rebuild_with_catalog(&mut self, catalog: Catalog) -> Result<PropagationReport, EngineError> {
        let mut seeds = match &self.target {
            Some(target) => target.seed_variables(&catalog)?,
            None => Vec::new(),
        };
        for extra in &catalog.variables {
            if !seeds.iter().any(|s| s.name == extra.name) {
                seeds.push(extra.clone());
            }
        }
        let stored = self.diagram.clone();
        self.registry = BlockRegistry::new(&catalog, self.master);
        self.catalog = catalog;
        self.seeds = seeds;
        self.observer.record(GraphEvent::CatalogReplaced);
        self.load_diagram(&stored)
    }

    /// Run propagation without an edit. On a consistent graph this changes
    /// nothing.
    pub fn revalidate(&mut self) -> PropagationReport {
        self.observer.record(GraphEvent::Revalidate);
        self.commit()
    }

    // ------------------------------------------------------------------
    // Graph edits
    // ------------------------------------------------------------------

    pub fn insert_block(&mut self, kind: BlockKind, position: Position) -> Result<BlockId, EngineError> {
        self.registry.ensure_kind(&self.catalog, &kind);
        let type_name = kind.type_name();
        if self.registry.lookup(&kind).is_none() {
            return Err(EngineError::UnknownBlockType(type_name.into_owned()));
        }
        if !self.registry.is_visible(&kind) {
            return Err(EngineError::UnsupportedConfiguration(format!(
                "`{type_name}` blocks are not available in {} graphs",
                self.master
            )));
        }
        if let Some(variable) = kind.variable() {
            if self.variables.get(variable).is_none() {
                return Err(EngineError::UnknownVariable(variable.to_string()));
            }
        }
        let id = self.graph.insert(kind, position);
        self.observer.record(GraphEvent::Created(id));
        self.commit();
        Ok(id)
    }

    /// Insert by registry type name with default fields.
    pub fn insert_block_type(&mut self, type_name: &str, position: Position) -> Result<BlockId, EngineError> {
        let kind = BlockKind::from_type_name(type_name)
            .ok_or_else(|| EngineError::UnknownBlockType(type_name.to_string()))?;
        self.insert_block(kind, position)
    }

    /// Delete a block and its inputs; the statement after it moves up.
    ///
    /// Getters of protected variables are never deleted: deleting one is a
    /// no-op, and one nested in a deleted subtree is left on the canvas.
    pub fn delete_block(&mut self, id: BlockId) -> Result<(), EngineError> {
        let block = self.graph.block(id)?;
        if self.is_protected_getter(block) {
            tracing::debug!(block = %id, "refusing to delete a protected getter");
            return Ok(());
        }
        self.rescue_protected_getters(id);
        let removed = self.graph.remove_block(id)?;
        self.observer.record(GraphEvent::Deleted(removed));
        self.commit();
        Ok(())
    }

    /// Plug a value block into a value socket.
    pub fn connect_value(&mut self, parent: BlockId, socket: Socket, child: BlockId) -> Result<Connection, EngineError> {
        let parent_block = self.graph.block(parent)?;
        let child_block = self.graph.block(child)?;
        let Some(spec) = self.registry.input_spec(&parent_block.kind, socket) else {
            return Ok(Connection::Rejected);
        };
        if spec.kind != InputKind::Value
            || self.registry.is_statement(&child_block.kind)
            || !spec.check.accepts(child_block.output())
        {
            return Ok(Connection::Rejected);
        }
        self.connect(parent, child, |graph| graph.attach_input(parent, socket, child, false))
    }

    /// Plug a statement chain into a statement socket (`DO`, `ELSE`).
    pub fn connect_statement(
        &mut self,
        parent: BlockId,
        socket: Socket,
        child: BlockId,
    ) -> Result<Connection, EngineError> {
        let parent_block = self.graph.block(parent)?;
        let child_block = self.graph.block(child)?;
        let fits = self
            .registry
            .input_spec(&parent_block.kind, socket)
            .is_some_and(|spec| spec.kind == InputKind::Statement);
        if !fits || !self.registry.is_statement(&child_block.kind) {
            return Ok(Connection::Rejected);
        }
        self.connect(parent, child, |graph| {
            graph.attach_input(parent, socket, child, true).map(|_| None)
        })
    }

    /// Chain `child` after the statement `prev`.
    pub fn connect_next(&mut self, prev: BlockId, child: BlockId) -> Result<Connection, EngineError> {
        let prev_block = self.graph.block(prev)?;
        let child_block = self.graph.block(child)?;
        if !self.registry.is_statement(&prev_block.kind) || !self.registry.is_statement(&child_block.kind) {
            return Ok(Connection::Rejected);
        }
        self.connect(prev, child, |graph| graph.attach_next(prev, child).map(|_| None))
    }

    fn connect(
        &mut self,
        parent: BlockId,
        child: BlockId,
        attach: impl FnOnce(&mut BlockGraph) -> Result<Option<BlockId>, EngineError>,
    ) -> Result<Connection, EngineError> {
        if parent == child || self.graph.is_ancestor(child, parent) {
            return Ok(Connection::Rejected);
        }
        self.graph.detach(child);
        let displaced = attach(&mut self.graph)?;
        if let Some(displaced) = displaced {
            self.place_beside_root(displaced, parent);
            self.observer.record(GraphEvent::Reconnected(displaced));
        }
        self.observer.record(GraphEvent::Reconnected(child));
        self.commit();
        Ok(Connection::Connected)
    }

    /// Pull a block (and what hangs below it) off its parent.
    pub fn disconnect(&mut self, child: BlockId) -> Result<(), EngineError> {
        self.graph.block(child)?;
        if self.sever(child) {
            self.observer.record(GraphEvent::Reconnected(child));
            self.commit();
        }
        Ok(())
    }

    /// Move a block on the canvas. A connected block is pulled off first.
    pub fn move_block(&mut self, id: BlockId, to: Position) -> Result<(), EngineError> {
        let connected = self.graph.block(id)?.parent().is_some();
        if connected {
            self.graph.detach(id);
            self.graph.block_mut(id)?.position = to;
            self.observer.record(GraphEvent::Reconnected(id));
        } else {
            let before = self.graph.top_blocks();
            self.graph.block_mut(id)?.position = to;
            let reordered = self.graph.top_blocks() != before;
            self.observer.record(GraphEvent::Moved {
                block: id,
                to,
                reordered,
            });
        }
        self.commit();
        Ok(())
    }

    pub fn set_field(&mut self, id: BlockId, edit: FieldEdit) -> Result<(), EngineError> {
        let block = self.graph.block(id)?;
        if let FieldEdit::Variable(variable) = &edit {
            if self.variables.get(variable).is_none() {
                return Err(EngineError::UnknownVariable(variable.to_string()));
            }
            if self.is_protected_getter(block) {
                tracing::debug!(block = %id, "refusing to retarget a protected getter");
                return Ok(());
            }
        }
        let field = edit.field_name();
        let block_type = block.kind.type_name().into_owned();
        let block = self.graph.block_mut(id)?;
        if !apply_edit(&mut block.kind, edit) {
            return Err(EngineError::FieldMismatch {
                edit: field.to_string(),
                block_type,
            });
        }
        self.observer.record(GraphEvent::FieldChanged { block: id, field });
        self.commit();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Variables
    // ------------------------------------------------------------------

    pub fn create_variable(&mut self, name: &str) -> Result<VariableId, EngineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::UnsupportedConfiguration(
                "variable names must not be empty".to_string(),
            ));
        }
        let id = self.variables.create(name);
        self.observer.record(GraphEvent::VariableCreated(id.clone()));
        self.commit();
        Ok(id)
    }

    /// Rename a user variable. Protected variables and names already in use
    /// are left alone; the return value says whether the rename happened.
    pub fn rename_variable(&mut self, id: &VariableId, name: &str) -> Result<bool, EngineError> {
        if self.variables.get(id).is_none() {
            return Err(EngineError::UnknownVariable(id.to_string()));
        }
        if !self.variables.rename(id, name.trim()) {
            return Ok(false);
        }
        self.observer.record(GraphEvent::VariableRenamed(id.clone()));
        self.commit();
        Ok(true)
    }

    /// Delete a user variable and every block that reads or binds it.
    /// Protected variables are left alone.
    pub fn delete_variable(&mut self, id: &VariableId) -> Result<(), EngineError> {
        let Some(variable) = self.variables.get(id) else {
            return Err(EngineError::UnknownVariable(id.to_string()));
        };
        if variable.protected {
            tracing::debug!(variable = %id, "refusing to delete a protected variable");
            return Ok(());
        }
        let mut removed = Vec::new();
        for block in self.graph.uses_of(id) {
            if self.graph.contains(block) {
                self.rescue_protected_getters(block);
                removed.extend(self.graph.remove_block(block)?);
            }
        }
        self.variables.remove(id);
        self.observer.record(GraphEvent::Deleted(removed));
        self.observer.record(GraphEvent::VariableDeleted(id.clone()));
        self.commit();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------

    pub fn graph(&self) -> &BlockGraph {
        &self.graph
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.graph.get(id)
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    pub fn variable_by_name(&self, name: &str) -> Option<&Variable> {
        self.variables.by_name(name)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn master(&self) -> MasterBlockType {
        self.master
    }

    pub fn last_report(&self) -> &PropagationReport {
        &self.last_report
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn is_protected_getter(&self, block: &Block) -> bool {
        matches!(&block.kind, BlockKind::VariableGet { variable } if self.variables.is_protected(variable))
    }

    /// Pull protected getters out of the inputs of `id` before it goes.
    fn rescue_protected_getters(&mut self, id: BlockId) {
        let rescue: Vec<BlockId> = self
            .graph
            .subtree(id)
            .into_iter()
            .filter(|b| *b != id)
            .filter(|b| self.graph.get(*b).is_some_and(|blk| self.is_protected_getter(blk)))
            .collect();
        for getter in rescue {
            self.sever(getter);
        }
    }

    /// Detach `id` and drop it next to the root of its former parent.
    fn sever(&mut self, id: BlockId) -> bool {
        let Some(link) = self.graph.detach(id) else {
            return false;
        };
        let parent = match link {
            ParentLink::Input(parent, _) | ParentLink::Next(parent) => parent,
        };
        self.place_beside_root(id, parent);
        true
    }

    fn place_beside_root(&mut self, id: BlockId, former_parent: BlockId) {
        let root = self.graph.root_of(former_parent);
        let landing = self
            .graph
            .get(root)
            .map(|r| r.position.offset(self.config.bump_offset))
            .unwrap_or_default();
        if let Some(block) = self.graph.get_mut(id) {
            block.position = landing;
        }
    }

    /// Finish a mutation cycle.
    fn commit(&mut self) -> PropagationReport {
        let (events, structural) = self.observer.drain();
        let report = if structural {
            Propagator::new(&self.catalog, &self.registry, &self.config)
                .run(&mut self.graph, &mut self.variables)
        } else {
            PropagationReport::default()
        };
        tracing::debug!(
            events = events.len(),
            structural,
            rounds = report.rounds,
            "mutation cycle"
        );

        let script = emit_script(&self.graph, &self.registry, &self.catalog, &self.variables, &self.config);
        let diagram = write_diagram(&self.graph, &self.registry, &self.variables);
        let script_changed = script != self.script;
        let diagram_changed = diagram != self.diagram;
        self.script = script;
        self.diagram = diagram;
        if script_changed {
            for listener in &mut self.script_listeners {
                listener(&self.script);
            }
        }
        if diagram_changed {
            for listener in &mut self.diagram_listeners {
                listener(&self.diagram);
            }
        }
        self.last_report = report.clone();
        report
    }
}

fn apply_edit(kind: &mut BlockKind, edit: FieldEdit) -> bool {
    match (kind, edit) {
        (kind, FieldEdit::Variable(new)) => match kind.variable_mut() {
            Some(slot) => {
                *slot = new;
                true
            }
            None => false,
        },
        (BlockKind::Text { text }, FieldEdit::Text(new)) => {
            *text = new;
            true
        }
        (BlockKind::Number { value }, FieldEdit::Number(new)) => {
            *value = new;
            true
        }
        (BlockKind::Boolean { value }, FieldEdit::Boolean(new)) => {
            *value = new;
            true
        }
        (BlockKind::Compare { op }, FieldEdit::Compare(new)) => {
            *op = new;
            true
        }
        (BlockKind::Logic { op }, FieldEdit::Logic(new)) => {
            *op = new;
            true
        }
        (BlockKind::Arithmetic { op }, FieldEdit::Arithmetic(new)) => {
            *op = new;
            true
        }
        (BlockKind::ProjectVariable { name } | BlockKind::SelectionList { name }, FieldEdit::Name(new)) => {
            *name = new;
            true
        }
        (BlockKind::ReadView { view_id } | BlockKind::Navigate { view_id, .. }, FieldEdit::View(new)) => {
            *view_id = new;
            true
        }
        (BlockKind::Navigate { sidebar, .. }, FieldEdit::Sidebar(new)) => {
            *sidebar = new;
            true
        }
        (BlockKind::CreateDocument { collection_id }, FieldEdit::Collection(new)) => {
            *collection_id = new;
            true
        }
        (BlockKind::LinkDocument { collection }, FieldEdit::Collection(new)) => {
            collection.selected = Some(new);
            true
        }
        (BlockKind::LinkDocuments { link_type_id }, FieldEdit::LinkType(new)) => {
            *link_type_id = new;
            true
        }
        (BlockKind::ShowMessage { level }, FieldEdit::Level(new)) => {
            *level = new;
            true
        }
        (kind, FieldEdit::Attribute(new)) => match kind.attribute_picker_mut() {
            Some(picker) => {
                picker.selected = Some(new);
                true
            }
            None => false,
        },
        _ => false,
    }
}
