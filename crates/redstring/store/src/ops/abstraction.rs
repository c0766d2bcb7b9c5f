//! Abstraction chains: per-dimension generalization orderings that contain
//! the owning prototype itself, most generic first.

use crate::draft::Draft;
use crate::error::ValidationError;
use crate::request::{ChainDirection, OutcomeDetail};
use redstring_types::{PrototypeId, TargetKind};

pub(crate) fn add_to_chain(
    draft: &mut Draft,
    node_id: &PrototypeId,
    dimension: String,
    direction: ChainDirection,
    new_node_id: PrototypeId,
    insert_relative_to: Option<PrototypeId>,
) -> Result<OutcomeDetail, ValidationError> {
    let owner = draft.require_node_prototype(node_id)?;
    let mut chain = owner
        .abstraction_chains
        .get(&dimension)
        .cloned()
        .unwrap_or_else(|| vec![node_id.clone()]);
    draft.require_node_prototype(&new_node_id)?;

    if chain.contains(&new_node_id) {
        return Err(ValidationError::AlreadyExists {
            kind: "chain member",
            id: new_node_id.to_string(),
        });
    }
    let anchor = insert_relative_to.unwrap_or_else(|| node_id.clone());
    let pos = chain
        .iter()
        .position(|p| p == &anchor)
        .ok_or_else(|| {
            ValidationError::InvalidSelection(format!(
                "{} is not in the {} chain",
                anchor, dimension
            ))
        })?;
    let at = match direction {
        ChainDirection::Above => pos,
        ChainDirection::Below => pos + 1,
    };
    chain.insert(at, new_node_id);

    draft
        .node_prototype_mut(node_id)?
        .abstraction_chains
        .insert(dimension, chain);
    draft.record(TargetKind::NodePrototype, node_id);
    Ok(OutcomeDetail::None)
}

/// Remove a member. A chain left holding only its owner is dropped.
pub(crate) fn remove_from_chain(
    draft: &mut Draft,
    node_id: &PrototypeId,
    dimension: &str,
    remove_node_id: &PrototypeId,
) -> Result<OutcomeDetail, ValidationError> {
    let chain = draft
        .require_node_prototype(node_id)?
        .abstraction_chains
        .get(dimension)
        .ok_or_else(|| ValidationError::ChainNotFound {
            node: node_id.clone(),
            dimension: dimension.to_string(),
        })?;
    let pos = chain
        .iter()
        .position(|p| p == remove_node_id)
        .ok_or_else(|| {
            ValidationError::InvalidSelection(format!(
                "{} is not in the {} chain",
                remove_node_id, dimension
            ))
        })?;

    let proto = draft.node_prototype_mut(node_id)?;
    let emptied = match proto.abstraction_chains.get_mut(dimension) {
        Some(chain) => {
            chain.remove(pos);
            chain.len() <= 1
        }
        None => false,
    };
    if emptied {
        proto.abstraction_chains.remove(dimension);
    }
    draft.record(TargetKind::NodePrototype, node_id);
    Ok(OutcomeDetail::None)
}
