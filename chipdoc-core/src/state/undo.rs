use std::collections::VecDeque;
use std::time::Instant;

use chipdoc_types::{reduce, EditAction, EditError, InstanceId, Node, NodeId, NodePath, Payload, Schema};

/// Identifies a gesture for undo coalescing. Sequential edits with the same
/// key within `COALESCE_WINDOW` share a single undo entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoalesceKey {
    /// Repeated writes of one scalar: a block cell or a field instance.
    Value {
        parent: NodePath,
        node: NodeId,
        id: InstanceId,
    },
    /// No coalescing — structural changes always get their own entry.
    None,
}

impl CoalesceKey {
    /// A `Set` of exactly one scalar coalesces; everything else does not.
    pub fn of(action: &EditAction) -> Self {
        match action {
            EditAction::Set {
                parent,
                node,
                instances,
            } => match instances.as_slice() {
                [single] if matches!(single.payload, Payload::Field(_)) => CoalesceKey::Value {
                    parent: parent.clone(),
                    node: node.clone(),
                    id: single.id,
                },
                _ => CoalesceKey::None,
            },
            _ => CoalesceKey::None,
        }
    }
}

/// Maximum time between coalesced edits (500ms).
const COALESCE_WINDOW: std::time::Duration = std::time::Duration::from_millis(500);

/// Undo/redo stacks of inverse edit actions.
///
/// Each entry is the action that reverses one applied edit. Undoing applies
/// it and files the inverse of *that* on the redo stack, and vice versa.
pub struct UndoHistory {
    undo_stack: VecDeque<EditAction>,
    redo_stack: VecDeque<EditAction>,
    max_depth: usize,
    last_coalesce_key: CoalesceKey,
    last_push_time: Instant,
}

impl UndoHistory {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth,
            last_coalesce_key: CoalesceKey::None,
            last_push_time: Instant::now(),
        }
    }

    /// Record the inverse of an edit that was just applied.
    pub fn push(&mut self, inverse: EditAction) {
        if inverse.is_noop() {
            return;
        }
        if self.undo_stack.len() >= self.max_depth {
            self.undo_stack.pop_front();
        }
        self.undo_stack.push_back(inverse);
        self.redo_stack.clear();
    }

    /// Record with coalescing support. If `key` matches the previous push's
    /// key and less than `COALESCE_WINDOW` has elapsed, the push is skipped,
    /// keeping the inverse that restores the pre-gesture value.
    pub fn push_coalesced(&mut self, inverse: EditAction, key: CoalesceKey) {
        let now = Instant::now();
        if key != CoalesceKey::None
            && key == self.last_coalesce_key
            && now.duration_since(self.last_push_time) < COALESCE_WINDOW
            && !self.undo_stack.is_empty()
        {
            self.last_push_time = now;
            self.redo_stack.clear();
            return;
        }
        self.push(inverse);
        self.last_coalesce_key = key;
        self.last_push_time = now;
    }

    fn clear_coalesce(&mut self) {
        self.last_coalesce_key = CoalesceKey::None;
    }

    /// Apply the newest undo entry to `tree`. Returns `Ok(false)` when there
    /// is nothing to undo. A failing entry is put back and the tree is left
    /// unchanged.
    pub fn undo(&mut self, tree: &mut Node, schema: &dyn Schema) -> Result<bool, EditError> {
        self.clear_coalesce();
        let Some(entry) = self.undo_stack.pop_back() else {
            return Ok(false);
        };
        match apply_entry(&entry, tree, schema) {
            Ok(inverse) => {
                self.redo_stack.push_back(inverse);
                Ok(true)
            }
            Err(e) => {
                self.undo_stack.push_back(entry);
                Err(e)
            }
        }
    }

    /// Apply the newest redo entry to `tree`. Returns `Ok(false)` when there
    /// is nothing to redo.
    pub fn redo(&mut self, tree: &mut Node, schema: &dyn Schema) -> Result<bool, EditError> {
        self.clear_coalesce();
        let Some(entry) = self.redo_stack.pop_back() else {
            return Ok(false);
        };
        match apply_entry(&entry, tree, schema) {
            Ok(inverse) => {
                self.undo_stack.push_back(inverse);
                Ok(true)
            }
            Err(e) => {
                self.redo_stack.push_back(entry);
                Err(e)
            }
        }
    }

    /// The action the next `undo` would apply.
    pub fn peek_undo(&self) -> Option<&EditAction> {
        self.undo_stack.back()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.clear_coalesce();
    }
}

/// Apply on a copy-on-write clone and commit only on success.
fn apply_entry(entry: &EditAction, tree: &mut Node, schema: &dyn Schema) -> Result<EditAction, EditError> {
    let mut scratch = tree.clone();
    let inverse = reduce::apply(entry, &mut scratch, schema)?;
    *tree = scratch;
    Ok(inverse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chipdoc_types::{generate_tree, Command, CommandKind, SchemaDef, Value};

    fn schema() -> SchemaDef {
        SchemaDef::new("SONG")
            .group("SONG", &["TEMPO", "SEQ"])
            .field("TEMPO", Command::new(CommandKind::Int).with_default(Value::Int(120)))
            .block("SEQ", &["STEP"])
            .field("STEP", Command::new(CommandKind::Int))
    }

    fn seq() -> NodePath {
        "SONG/0/SEQ/0".parse().unwrap()
    }

    fn step(tree: &Node, row: usize) -> Option<Value> {
        tree.resolve(&seq()).unwrap().as_block().unwrap().cell(row, 0).cloned()
    }

    fn edit(history: &mut UndoHistory, tree: &mut Node, schema: &SchemaDef, action: EditAction) {
        let key = CoalesceKey::of(&action);
        let inverse = reduce::apply(&action, tree, schema).unwrap();
        history.push_coalesced(inverse, key);
    }

    #[test]
    fn undo_and_redo_restore_trees() {
        let schema = schema();
        let mut tree = generate_tree(&schema, 2);
        let original = tree.clone();
        let mut history = UndoHistory::new(10);

        edit(&mut history, &mut tree, &schema, EditAction::insert_cell(&seq(), &NodeId::new("STEP"), 5, Value::Int(9)));
        let edited = tree.clone();

        assert!(history.undo(&mut tree, &schema).unwrap());
        assert_eq!(tree, original);
        assert!(history.redo(&mut tree, &schema).unwrap());
        assert_eq!(tree, edited);
        assert!(!history.redo(&mut tree, &schema).unwrap());
    }

    #[test]
    fn repeated_cell_writes_coalesce() {
        let schema = schema();
        let mut tree = generate_tree(&schema, 2);
        let mut history = UndoHistory::new(10);
        let field = NodeId::new("STEP");
        for n in 1..=3 {
            edit(&mut history, &mut tree, &schema, EditAction::set_cells(&seq(), &field, vec![(0, Value::Int(n))]));
        }
        assert_eq!(step(&tree, 0), Some(Value::Int(3)));

        assert!(history.undo(&mut tree, &schema).unwrap());
        assert_eq!(step(&tree, 0), Some(Value::Empty));
        assert!(!history.can_undo());
    }

    #[test]
    fn different_cells_do_not_coalesce() {
        let schema = schema();
        let mut tree = generate_tree(&schema, 2);
        let mut history = UndoHistory::new(10);
        let field = NodeId::new("STEP");
        edit(&mut history, &mut tree, &schema, EditAction::set_cells(&seq(), &field, vec![(0, Value::Int(1))]));
        edit(&mut history, &mut tree, &schema, EditAction::set_cells(&seq(), &field, vec![(1, Value::Int(2))]));

        history.undo(&mut tree, &schema).unwrap();
        assert_eq!(step(&tree, 0), Some(Value::Int(1)));
        assert_eq!(step(&tree, 1), Some(Value::Empty));
    }

    #[test]
    fn depth_is_bounded() {
        let schema = schema();
        let mut tree = generate_tree(&schema, 2);
        let mut history = UndoHistory::new(2);
        for row in 0..4 {
            let action = EditAction::insert_cell(&seq(), &NodeId::new("STEP"), row, Value::Int(1));
            edit(&mut history, &mut tree, &schema, action);
        }
        assert!(history.undo(&mut tree, &schema).unwrap());
        assert!(history.undo(&mut tree, &schema).unwrap());
        assert!(!history.undo(&mut tree, &schema).unwrap());
    }

    #[test]
    fn new_edit_clears_redo() {
        let schema = schema();
        let mut tree = generate_tree(&schema, 2);
        let mut history = UndoHistory::new(10);
        let tempo = EditAction::Set {
            parent: "SONG/0".parse().unwrap(),
            node: NodeId::new("TEMPO"),
            instances: vec![chipdoc_types::Instance::field(0, Value::Int(90))],
        };
        edit(&mut history, &mut tree, &schema, tempo);
        history.undo(&mut tree, &schema).unwrap();
        assert!(history.can_redo());
        edit(&mut history, &mut tree, &schema, EditAction::remove_cell(&seq(), &NodeId::new("STEP"), 0));
        assert!(!history.can_redo());
    }

    #[test]
    fn failing_entry_stays_on_the_stack() {
        let schema = schema();
        let mut tree = generate_tree(&schema, 2);
        let mut history = UndoHistory::new(10);
        let stale = EditAction::clear_cell(&"SONG/0/SEQ/7".parse().unwrap(), &NodeId::new("STEP"), 0);
        history.push(stale);
        assert!(history.undo(&mut tree, &schema).is_err());
        assert!(history.can_undo());
    }
}
