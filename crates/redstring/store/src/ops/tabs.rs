//! Right-panel tabs. The home tab sits at index 0 and cannot be closed.

use crate::draft::Draft;
use crate::error::ValidationError;
use crate::request::OutcomeDetail;
use redstring_types::{PanelTab, PrototypeId, TabTarget, TargetKind};

/// Open (or re-focus) the tab for a node prototype.
pub(crate) fn open_node_tab(
    draft: &mut Draft,
    node_id: &PrototypeId,
) -> Result<OutcomeDetail, ValidationError> {
    draft.require_node_prototype(node_id)?;
    let tabs = &mut draft.state_mut().right_panel_tabs;
    let index = match tabs.iter().position(|t| t.node_id() == Some(node_id)) {
        Some(index) => index,
        None => {
            tabs.push(PanelTab::node(node_id.clone()));
            tabs.len() - 1
        }
    };
    activate(tabs, index);
    draft.record(TargetKind::Tab, node_id);
    Ok(OutcomeDetail::None)
}

pub(crate) fn close_tab(draft: &mut Draft, index: usize) -> Result<OutcomeDetail, ValidationError> {
    let tabs = &mut draft.state_mut().right_panel_tabs;
    let tab = tabs.get(index).ok_or(ValidationError::TabOutOfRange(index))?;
    if tab.target == TabTarget::Home {
        return Err(ValidationError::HomeTabPinned);
    }

    let removed = tabs.remove(index);
    if removed.is_active && !tabs.is_empty() {
        let next = index.saturating_sub(1).min(tabs.len() - 1);
        activate(tabs, next);
    }
    draft.record(TargetKind::Tab, index);
    Ok(OutcomeDetail::None)
}

pub(crate) fn activate_tab(
    draft: &mut Draft,
    index: usize,
) -> Result<OutcomeDetail, ValidationError> {
    let tabs = &mut draft.state_mut().right_panel_tabs;
    if index >= tabs.len() {
        return Err(ValidationError::TabOutOfRange(index));
    }
    activate(tabs, index);
    draft.record(TargetKind::Tab, index);
    Ok(OutcomeDetail::None)
}

fn activate(tabs: &mut [PanelTab], index: usize) {
    for (i, tab) in tabs.iter_mut().enumerate() {
        tab.is_active = i == index;
    }
}

/// Collapse duplicate node tabs after a prototype id was rewritten. The first
/// tab survives and inherits the active flag of any removed duplicate.
pub(crate) fn dedup_tabs(tabs: &mut Vec<PanelTab>) {
    let mut seen: Vec<PanelTab> = Vec::with_capacity(tabs.len());
    for tab in tabs.drain(..) {
        match seen.iter_mut().find(|t| t.target == tab.target) {
            Some(existing) => existing.is_active |= tab.is_active,
            None => seen.push(tab),
        }
    }
    *tabs = seen;
}
