//! Pure tree-mutation reducers.
//!
//! `apply` is the single entry point for changing a module tree. Every call
//! returns the structural inverse of the action it applied: an action which,
//! applied right after, restores the tree exactly (same instance ids, same
//! row counts, same values).
//!
//! Reducers do NOT:
//! - Keep undo history
//! - Log
//! - Touch anything outside the tree they are handed

mod block;
mod group;

pub use block::{insert_row, insert_rows, remove_row, remove_rows, set_cell, MAX_ROWS};

use crate::{EditAction, EditError, Node, NodePath, Payload, Schema};

/// Apply `action` to `root` and return its inverse.
///
/// On error the tree keeps every change made before the failing step; for a
/// compound this means earlier members stay applied.
pub fn apply(action: &EditAction, root: &mut Node, schema: &dyn Schema) -> Result<EditAction, EditError> {
    match action {
        EditAction::Set {
            parent,
            node,
            instances,
        } => match container(root, parent)? {
            Container::Block => block::apply_set(root, schema, parent, node, instances),
            Container::Group => group::apply_set(root, schema, parent, node, instances),
        },
        EditAction::Insert {
            parent,
            node,
            instances,
        } => match container(root, parent)? {
            Container::Block => block::apply_insert(root, schema, parent, node, instances),
            Container::Group => group::apply_insert(root, schema, parent, node, instances),
        },
        EditAction::Remove { parent, node, ids } => match container(root, parent)? {
            Container::Block => block::apply_remove(root, schema, parent, node, ids),
            Container::Group => group::apply_remove(root, schema, parent, node, ids),
        },
        EditAction::InsertRows {
            parent,
            block,
            specs,
        } => block::apply_insert_rows(root, schema, parent, block, specs),
        EditAction::RemoveRows {
            parent,
            block,
            specs,
        } => block::apply_remove_rows(root, schema, parent, block, specs),
        EditAction::Compound(actions) => {
            let mut inverses = Vec::with_capacity(actions.len());
            for action in actions {
                inverses.push(apply(action, root, schema)?);
            }
            inverses.reverse();
            Ok(EditAction::Compound(inverses))
        }
    }
}

/// Compute the inverse of `action` without changing `root`.
///
/// Works on a copy-on-write clone, so only the instances the action would
/// write are duplicated.
pub fn inverse_of(action: &EditAction, root: &Node, schema: &dyn Schema) -> Result<EditAction, EditError> {
    let mut scratch = root.clone();
    apply(action, &mut scratch, schema)
}

enum Container {
    Block,
    Group,
}

fn container(root: &Node, parent: &NodePath) -> Result<Container, EditError> {
    match &root.resolve(parent)?.payload {
        Payload::Block(_) => Ok(Container::Block),
        Payload::Group(_) => Ok(Container::Group),
        Payload::Field(_) => Err(EditError::NotAContainer(parent.clone())),
    }
}
