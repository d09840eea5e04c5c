//! Pass 2: dependents of the freshly derived tags.

use rulegraph_catalog::TypeTag;

use super::{Propagator, RoundStats};
use crate::block::{BlockKind, Choice, ParentLink, Picker, Socket};
use crate::graph::BlockGraph;
use crate::variables::{VariableId, VariableMap};

/// Repopulate attribute dropdowns from the tag of their subject.
///
/// Selection order: the previous choice, then the collection's default
/// attribute, then the first eligible attribute. A subject without
/// attributes (disconnected, unresolved, scalar) clears the dropdown.
pub(super) fn pickers(p: &Propagator<'_>, graph: &mut BlockGraph, round: &mut RoundStats) {
    for id in graph.pre_order() {
        let Some(block) = graph.get(id) else { continue };
        let (Some((current, files_only)), Some(subject)) =
            (block.kind.attribute_picker(), block.kind.attribute_subject())
        else {
            continue;
        };

        let subject_tag = graph.input_tag(block, subject);
        let next = match p.catalog.attributes_of(&subject_tag) {
            Some((attributes, default_id)) => {
                let options = attributes
                    .iter()
                    .filter(|a| !files_only || a.is_file())
                    .map(|a| Choice {
                        id: a.id.clone(),
                        label: a.name.clone(),
                    })
                    .collect();
                current.repopulated(options, &[current.selected(), default_id])
            }
            None => Picker::default(),
        };
        if *current == next {
            continue;
        }
        if let Some(picker) = graph.get_mut(id).and_then(|b| b.kind.attribute_picker_mut()) {
            *picker = next;
            round.pickers += 1;
        }
    }
}

/// Retype user variables from their binders and drop getters that no longer
/// fit their socket.
///
/// The first binder in graph order that yields an entity tag decides: a loop
/// binds the element type of its list, an assignment binds the tag of its
/// value. Variables without such a binder fall back to unset. Protected
/// variables never change.
pub(super) fn variables(
    p: &Propagator<'_>,
    graph: &mut BlockGraph,
    variables: &mut VariableMap,
    round: &mut RoundStats,
) {
    let ids: Vec<VariableId> = variables
        .iter()
        .filter(|v| !v.protected)
        .map(|v| v.id.clone())
        .collect();
    let order = graph.pre_order();

    for var in ids {
        let bound = order
            .iter()
            .filter_map(|id| graph.get(*id))
            .filter(|b| b.kind.variable() == Some(&var))
            .find_map(|b| {
                let tag = match &b.kind {
                    BlockKind::ForEachDocument { .. } | BlockKind::ForEachLink { .. } => {
                        graph.input_tag(b, Socket::List).element()
                    }
                    BlockKind::VariableSet { .. } => graph.input_tag(b, Socket::Value),
                    _ => return None,
                };
                tag.is_entity().then_some(tag)
            })
            .unwrap_or(TypeTag::Unset);

        if !variables.set_tag(&var, bound.clone()) {
            continue;
        }
        tracing::debug!(variable = %var, tag = %bound, "variable retyped");
        round.variables += 1;

        for getter in graph.getters_of(&var) {
            let Some(ParentLink::Input(parent, socket)) = graph.get(getter).and_then(|b| b.parent()) else {
                continue;
            };
            let fits = graph
                .get(parent)
                .and_then(|pb| p.registry.input_spec(&pb.kind, socket))
                .is_some_and(|spec| spec.check.accepts(&bound));
            if fits {
                continue;
            }
            if let Ok(removed) = graph.remove_block(getter) {
                tracing::debug!(getter = %getter, variable = %var, "removed getter after retype");
                round.removed.extend(removed);
            }
        }
    }
}
