//! Type propagation.
//!
//! One round is:
//!
//! 1. **forward derivation** (`derive`): every block recomputes its output
//!    tag from its own fields and the current tags of its children, children
//!    first;
//! 2. **dependent re-validation** (`revalidate`): attribute pickers are
//!    repopulated from their subject, then user variables are retyped from
//!    their binders and getters that no longer fit where they are plugged are
//!    removed;
//! 3. **connection sweep** (`connections`): every value edge whose producer
//!    tag is no longer accepted by the consumer socket is severed.
//!
//! Rounds repeat until one changes nothing. A graph that is already
//! consistent therefore costs exactly one round and is left untouched.

mod connections;
mod derive;
mod revalidate;

use rulegraph_catalog::Catalog;
use serde::Serialize;

use crate::block::BlockId;
use crate::config::EditorConfig;
use crate::graph::BlockGraph;
use crate::registry::BlockRegistry;
use crate::variables::VariableMap;

/// What one propagation run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PropagationReport {
    pub rounds: usize,
    /// Blocks whose output tag changed.
    pub retyped: usize,
    /// Dropdowns whose options or selection changed.
    pub pickers: usize,
    /// User variables whose tag changed.
    pub variables: usize,
    /// Blocks cut loose from an edge that became invalid.
    pub severed: Vec<BlockId>,
    /// Getters removed after their variable was retyped.
    pub removed: Vec<BlockId>,
    /// The round limit was hit before reaching a fixpoint.
    pub capped: bool,
}

impl PropagationReport {
    pub fn changed_anything(&self) -> bool {
        self.retyped > 0
            || self.pickers > 0
            || self.variables > 0
            || !self.severed.is_empty()
            || !self.removed.is_empty()
    }

    fn absorb(&mut self, round: RoundStats) {
        self.retyped += round.retyped;
        self.pickers += round.pickers;
        self.variables += round.variables;
        self.severed.extend(round.severed);
        self.removed.extend(round.removed);
    }
}

#[derive(Debug, Default)]
struct RoundStats {
    retyped: usize,
    pickers: usize,
    variables: usize,
    severed: Vec<BlockId>,
    removed: Vec<BlockId>,
}

impl RoundStats {
    fn is_quiet(&self) -> bool {
        self.retyped == 0
            && self.pickers == 0
            && self.variables == 0
            && self.severed.is_empty()
            && self.removed.is_empty()
    }
}

/// Propagation over one session's graph.
pub struct Propagator<'a> {
    catalog: &'a Catalog,
    registry: &'a BlockRegistry,
    config: &'a EditorConfig,
}

impl<'a> Propagator<'a> {
    pub fn new(catalog: &'a Catalog, registry: &'a BlockRegistry, config: &'a EditorConfig) -> Self {
        Self {
            catalog,
            registry,
            config,
        }
    }

    pub fn run(&self, graph: &mut BlockGraph, variables: &mut VariableMap) -> PropagationReport {
        let mut report = PropagationReport::default();
        loop {
            if report.rounds >= self.config.max_propagation_rounds {
                tracing::warn!(
                    rounds = report.rounds,
                    blocks = graph.len(),
                    "propagation did not settle within the round limit"
                );
                report.capped = true;
                break;
            }
            report.rounds += 1;

            let mut round = RoundStats::default();
            derive::forward(self, graph, variables, &mut round);
            revalidate::pickers(self, graph, &mut round);
            revalidate::variables(self, graph, variables, &mut round);
            connections::sweep(self, graph, &mut round);

            tracing::debug!(
                round = report.rounds,
                retyped = round.retyped,
                pickers = round.pickers,
                variables = round.variables,
                severed = round.severed.len(),
                removed = round.removed.len(),
                "propagation round"
            );
            let quiet = round.is_quiet();
            report.absorb(round);
            if quiet {
                break;
            }
        }
        report
    }
}
