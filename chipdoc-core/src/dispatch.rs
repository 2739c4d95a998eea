//! The single entry point for mutating an open module.

use std::sync::Arc;

use chipdoc_types::{reduce, EditAction, EditError};

use crate::state::{CoalesceKey, Session};

/// Apply `action` to the session's module.
///
/// The edit runs against a copy-on-write clone of the tree and is committed
/// only when every member succeeds, so a failing compound leaves the module
/// untouched. On success the inverse is pushed to the undo history (with
/// coalescing) and the edit is appended to the journal when one is attached.
pub fn dispatch_edit(action: &EditAction, session: &mut Session) -> Result<(), EditError> {
    if action.is_noop() {
        return Ok(());
    }
    let config = Arc::clone(&session.module.config);
    let mut scratch = session.module.tree.clone();
    let inverse = reduce::apply(action, &mut scratch, config.schema())?;
    session.module.tree = scratch;

    log::debug!(target: "edit", "{} applied", action.kind().as_str());

    if let Some(journal) = session.journal.as_mut() {
        if let Err(e) = journal.record(action, &inverse) {
            log::warn!(target: "edit", "failed to write edit journal: {}", e);
        }
    }
    session
        .undo_history
        .push_coalesced(inverse, CoalesceKey::of(action));
    session.dirty = true;
    Ok(())
}

/// Undo the newest edit. Returns `Ok(false)` when there is nothing to undo.
pub fn undo(session: &mut Session) -> Result<bool, EditError> {
    let config = Arc::clone(&session.module.config);
    let undone = session
        .undo_history
        .undo(&mut session.module.tree, config.schema())?;
    if undone {
        log::debug!(target: "edit", "undo");
        session.dirty = true;
    }
    Ok(undone)
}

/// Redo the newest undone edit. Returns `Ok(false)` when there is nothing to redo.
pub fn redo(session: &mut Session) -> Result<bool, EditError> {
    let config = Arc::clone(&session.module.config);
    let redone = session
        .undo_history
        .redo(&mut session.module.tree, config.schema())?;
    if redone {
        log::debug!(target: "edit", "redo");
        session.dirty = true;
    }
    Ok(redone)
}
