//! Pass 1: forward type derivation.

use rulegraph_catalog::{Catalog, TypeTag};

use super::{Propagator, RoundStats};
use crate::block::{Block, BlockKind, Choice, Picker, Socket};
use crate::graph::BlockGraph;
use crate::registry::OutputConstraint;
use crate::variables::VariableMap;

pub(super) fn forward(
    p: &Propagator<'_>,
    graph: &mut BlockGraph,
    variables: &VariableMap,
    round: &mut RoundStats,
) {
    for id in graph.post_order() {
        let Some(block) = graph.get(id) else { continue };
        let (output, collection) = output_of(p, graph, variables, block);

        let Some(block) = graph.get_mut(id) else { continue };
        if let (BlockKind::LinkDocument { collection: current }, Some(next)) = (&mut block.kind, collection) {
            if *current != next {
                *current = next;
                round.pickers += 1;
            }
        }
        if block.output != output {
            tracing::trace!(block = %id, from = %block.output, to = %output, "retyped");
            block.output = output;
            round.retyped += 1;
        }
    }
}

/// New output tag, plus the new collection picker for `get_link_document`.
fn output_of(
    p: &Propagator<'_>,
    graph: &BlockGraph,
    variables: &VariableMap,
    block: &Block,
) -> (TypeTag, Option<Picker>) {
    let Some(definition) = p.registry.lookup(&block.kind) else {
        return (TypeTag::Unset, None);
    };
    let (tag, picker) = match &definition.output {
        OutputConstraint::Statement | OutputConstraint::Any => (TypeTag::Unset, None),
        OutputConstraint::Fixed(tag) => (tag.clone(), None),
        OutputConstraint::Derived => derived(p.catalog, graph, variables, block),
    };
    (live_or_unresolved(p.catalog, tag), picker)
}

/// Entity tags whose entity left the catalog degrade to the sentinel.
fn live_or_unresolved(catalog: &Catalog, tag: TypeTag) -> TypeTag {
    if catalog.is_live(&tag) {
        tag
    } else {
        TypeTag::Unresolved
    }
}

fn derived(
    catalog: &Catalog,
    graph: &BlockGraph,
    variables: &VariableMap,
    block: &Block,
) -> (TypeTag, Option<Picker>) {
    let document = || graph.input_tag(block, Socket::Document);
    let tag = match &block.kind {
        BlockKind::VariableGet { variable } => variables.tag(variable),
        BlockKind::ReadView { view_id } if view_id.is_empty() => TypeTag::Unset,
        BlockKind::ReadView { view_id } => catalog
            .view_collection(view_id)
            .map(|c| TypeTag::RecordArray(c.id.clone()))
            .unwrap_or(TypeTag::Unresolved),
        BlockKind::ParentDocument => same_collection(document(), TypeTag::Record),
        BlockKind::SiblingDocuments | BlockKind::ChildDocuments => {
            same_collection(document(), TypeTag::RecordArray)
        }
        BlockKind::CreateDocument { collection_id } if collection_id.is_empty() => TypeTag::Unset,
        BlockKind::CreateDocument { collection_id } => TypeTag::Record(collection_id.clone()),
        BlockKind::LinkDocuments { link_type_id } if link_type_id.is_empty() => TypeTag::Unset,
        BlockKind::LinkDocuments { link_type_id } => TypeTag::Link(link_type_id.clone()),
        BlockKind::LinkedDocuments { link_type_id } => {
            let Some(link_type) = catalog.link_type(link_type_id) else {
                return (TypeTag::Unresolved, None);
            };
            match document() {
                TypeTag::Record(collection_id) => link_type
                    .counterpart(&collection_id)
                    .map(|other| TypeTag::RecordArray(other.to_string()))
                    .unwrap_or(TypeTag::Unresolved),
                TypeTag::Unresolved => TypeTag::Unresolved,
                _ => TypeTag::Unset,
            }
        }
        BlockKind::LinkInstances { link_type_id } => match catalog.link_type(link_type_id) {
            Some(_) => TypeTag::LinkArray(link_type_id.clone()),
            None => TypeTag::Unresolved,
        },
        BlockKind::LinkDocument { collection } => return link_document(catalog, graph, block, collection),
        _ => TypeTag::Unset,
    };
    (tag, None)
}

fn same_collection(input: TypeTag, make: fn(String) -> TypeTag) -> TypeTag {
    match input {
        TypeTag::Record(id) => make(id),
        TypeTag::Unresolved => TypeTag::Unresolved,
        _ => TypeTag::Unset,
    }
}

/// The collection dropdown follows the connected link type; without one the
/// block offers nothing and yields the sentinel.
fn link_document(
    catalog: &Catalog,
    graph: &BlockGraph,
    block: &Block,
    current: &Picker,
) -> (TypeTag, Option<Picker>) {
    let link_tag = graph.input_tag(block, Socket::Link);
    let link_type = link_tag.link_type_id().and_then(|id| catalog.link_type(id));
    let Some(link_type) = link_type else {
        return (TypeTag::Unresolved, Some(Picker::default()));
    };

    let mut options: Vec<Choice> = Vec::with_capacity(2);
    for collection_id in &link_type.collection_ids {
        if options.iter().any(|c| &c.id == collection_id) {
            continue;
        }
        let label = catalog
            .collection(collection_id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| collection_id.clone());
        options.push(Choice {
            id: collection_id.clone(),
            label,
        });
    }
    let picker = current.repopulated(options, &[current.selected()]);
    let tag = picker
        .selected()
        .map(|id| TypeTag::Record(id.to_string()))
        .unwrap_or(TypeTag::Unresolved);
    (tag, Some(picker))
}
