//! Edit actions: the unit of document mutation and of undo/redo.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Instance, InstanceId, NodeId, NodePath, PathNotFound, Row, Value};

/// A structural edit of a module tree.
///
/// `parent` always names a fully resolved instance. For `Set`, `Insert`
/// and `Remove` it is the instance that directly holds `node`: either a
/// group instance (the ids are instance ids of `node`) or a block instance
/// (`node` is a field column and the ids are row indices).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EditAction {
    Set {
        parent: NodePath,
        node: NodeId,
        instances: Vec<Instance>,
    },
    Insert {
        parent: NodePath,
        node: NodeId,
        instances: Vec<Instance>,
    },
    Remove {
        parent: NodePath,
        node: NodeId,
        ids: Vec<InstanceId>,
    },
    /// Insert whole rows into several instances of `block`, a child of the
    /// group instance at `parent`.
    InsertRows {
        parent: NodePath,
        block: NodeId,
        specs: Vec<RowInsert>,
    },
    /// Remove whole rows from several instances of `block`.
    RemoveRows {
        parent: NodePath,
        block: NodeId,
        specs: Vec<RowRemove>,
    },
    /// Applied strictly in order; later actions see the results of earlier ones.
    Compound(Vec<EditAction>),
}

/// Rows to splice into one block instance, keyed by their final row index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowInsert {
    pub instance: InstanceId,
    pub rows: Vec<(usize, Row)>,
}

/// Row indices to drop from one block instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowRemove {
    pub instance: InstanceId,
    pub rows: Vec<usize>,
}

/// The verb of an edit action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditKind {
    Set,
    Insert,
    Remove,
    Compound,
}

impl EditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditKind::Set => "set",
            EditKind::Insert => "insert",
            EditKind::Remove => "remove",
            EditKind::Compound => "compound",
        }
    }
}

impl FromStr for EditKind {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "set" => Ok(EditKind::Set),
            "insert" => Ok(EditKind::Insert),
            "remove" => Ok(EditKind::Remove),
            "compound" => Ok(EditKind::Compound),
            other => Err(EditError::UnsupportedActionKind(other.to_string())),
        }
    }
}

impl EditAction {
    pub fn kind(&self) -> EditKind {
        match self {
            EditAction::Set { .. } => EditKind::Set,
            EditAction::Insert { .. } | EditAction::InsertRows { .. } => EditKind::Insert,
            EditAction::Remove { .. } | EditAction::RemoveRows { .. } => EditKind::Remove,
            EditAction::Compound(_) => EditKind::Compound,
        }
    }

    /// Set cells of column `field` in the block instance at `block`.
    pub fn set_cells(block: &NodePath, field: &NodeId, cells: Vec<(usize, Value)>) -> Self {
        EditAction::Set {
            parent: block.clone(),
            node: field.clone(),
            instances: cells.into_iter().map(|(row, v)| Instance::cell(row, v)).collect(),
        }
    }

    /// Clearing a cell is a length-preserving set to the empty value.
    pub fn clear_cell(block: &NodePath, field: &NodeId, row: usize) -> Self {
        Self::set_cells(block, field, vec![(row, Value::Empty)])
    }

    pub fn insert_cell(block: &NodePath, field: &NodeId, row: usize, value: Value) -> Self {
        EditAction::Insert {
            parent: block.clone(),
            node: field.clone(),
            instances: vec![Instance::cell(row, value)],
        }
    }

    pub fn remove_cell(block: &NodePath, field: &NodeId, row: usize) -> Self {
        EditAction::Remove {
            parent: block.clone(),
            node: field.clone(),
            ids: vec![InstanceId::new(row as u32)],
        }
    }

    /// True for an action that cannot change anything (an empty compound).
    pub fn is_noop(&self) -> bool {
        match self {
            EditAction::Compound(actions) => actions.iter().all(EditAction::is_noop),
            EditAction::Set { instances, .. } | EditAction::Insert { instances, .. } => instances.is_empty(),
            EditAction::Remove { ids, .. } => ids.is_empty(),
            EditAction::InsertRows { specs, .. } => specs.iter().all(|s| s.rows.is_empty()),
            EditAction::RemoveRows { specs, .. } => specs.iter().all(|s| s.rows.is_empty()),
        }
    }

    /// Flatten a list of actions into one: drops no-ops and unwraps a single survivor.
    pub fn sequence(actions: Vec<EditAction>) -> EditAction {
        let mut actions: Vec<EditAction> = actions.into_iter().filter(|a| !a.is_noop()).collect();
        if actions.len() == 1 {
            actions.remove(0)
        } else {
            EditAction::Compound(actions)
        }
    }
}

/// Failure of an edit action. The tree is left as it was at the point of
/// failure; earlier members of a compound stay applied.
#[derive(Debug, Clone, PartialEq)]
pub enum EditError {
    PathNotFound(NodePath),
    UnsupportedActionKind(String),
    /// Insert of an instance id that already exists among its siblings.
    DuplicateInstance { node: NodeId, id: InstanceId },
    /// The supplied value does not fit the target (wrong payload kind or block width).
    InvalidValue(String),
    /// The parent path resolves to a field, which holds no children.
    NotAContainer(NodePath),
}

impl From<PathNotFound> for EditError {
    fn from(e: PathNotFound) -> Self {
        EditError::PathNotFound(e.0)
    }
}

impl std::fmt::Display for EditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditError::PathNotFound(p) => write!(f, "path not found: {}", p),
            EditError::UnsupportedActionKind(k) => write!(f, "unsupported action kind: {}", k),
            EditError::DuplicateInstance { node, id } => {
                write!(f, "instance {} of {} already exists", id, node)
            }
            EditError::InvalidValue(msg) => write!(f, "invalid value: {}", msg),
            EditError::NotAContainer(p) => write!(f, "{} is a field, not a block or group", p),
        }
    }
}

impl std::error::Error for EditError {}
