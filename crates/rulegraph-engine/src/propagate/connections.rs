//! Connection validity sweep.

use super::{Propagator, RoundStats};
use crate::block::ParentLink;
use crate::graph::BlockGraph;
use crate::registry::InputKind;

/// Sever every value edge whose producer tag the consumer socket no longer
/// accepts. The severed block lands next to the root of its former parent.
pub(super) fn sweep(p: &Propagator<'_>, graph: &mut BlockGraph, round: &mut RoundStats) {
    for id in graph.pre_order() {
        let Some(child) = graph.get(id) else { continue };
        let Some(ParentLink::Input(parent, socket)) = child.parent() else {
            continue;
        };
        let Some(parent_block) = graph.get(parent) else { continue };

        let valid = match p.registry.input_spec(&parent_block.kind, socket) {
            Some(spec) if spec.kind == InputKind::Statement => true,
            Some(spec) => spec.check.accepts(child.output()),
            None => false,
        };
        if valid {
            continue;
        }

        tracing::debug!(
            block = %id,
            parent = %parent,
            socket = %socket,
            tag = %child.output(),
            "severing invalid connection"
        );
        let root = graph.root_of(parent);
        let landing = graph
            .get(root)
            .map(|r| r.position.offset(p.config.bump_offset))
            .unwrap_or_default();
        graph.detach(id);
        if let Some(block) = graph.get_mut(id) {
            block.position = landing;
        }
        round.severed.push(id);
    }
}
