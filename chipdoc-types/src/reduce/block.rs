//! Row engine: column-aligned edits of block instances.
//!
//! Out-of-range rows are never an error here. Writes pad the block with
//! all-empty rows, removals of rows that do not exist do nothing. The one
//! exception is [`MAX_ROWS`]: an edit that would grow a block past it is
//! rejected before anything is written.

use std::collections::BTreeSet;

use crate::{
    Block, EditAction, EditError, Instance, InstanceId, Node, NodeId, NodeKind, NodePath, Payload,
    Row, RowInsert, RowRemove, Schema, Value,
};

/// Upper bound on the length of any block instance.
pub const MAX_ROWS: usize = 1 << 16;

fn within_limit(len: usize) -> Result<(), EditError> {
    if len <= MAX_ROWS {
        Ok(())
    } else {
        Err(EditError::InvalidValue(format!(
            "edit would grow a block to {} rows, limit is {}",
            len, MAX_ROWS
        )))
    }
}

/// Write one cell, first padding the block with all-empty rows so that
/// `row` exists. Returns the previous value, or `None` when the row was created.
pub fn set_cell(block: &mut Block, row: usize, col: usize, value: Value) -> Option<Value> {
    let existed = row < block.len();
    block.pad_to(row + 1);
    let old = std::mem::replace(&mut block.rows_mut()[row][col], value);
    existed.then_some(old)
}

/// Delete element `row` of column `col` and append an empty cell to that
/// column. Other columns are untouched. `None` when `row` does not exist.
pub fn remove_row(block: &Block, row: usize, col: usize) -> Option<Block> {
    if row >= block.len() {
        return None;
    }
    let mut columns = block.columns();
    columns[col].remove(row);
    columns[col].push(Value::Empty);
    Some(Block::from_columns(columns))
}

/// Insert `value` at `row` of column `col`, appending an empty cell to every
/// other column. A block shorter than `row` is padded first. Always returns a
/// block rebuilt from its columns.
pub fn insert_row(block: &Block, row: usize, col: usize, value: Value) -> Block {
    let mut padded = block.clone();
    padded.pad_to(row);
    let mut columns = padded.columns();
    for (i, column) in columns.iter_mut().enumerate() {
        if i != col {
            column.push(Value::Empty);
        }
    }
    columns[col].insert(row, value);
    Block::from_columns(columns)
}

/// Splice whole rows in at their final indices, walking the indices in
/// ascending order. Gaps not covered by an existing or inserted row are
/// filled with all-empty rows.
///
/// Returns the rebuilt block and the indices of every row that was added
/// (inserted or padding), ascending.
pub fn insert_rows(block: &Block, rows: &[(usize, Row)]) -> (Block, Vec<usize>) {
    let mut pending = rows.to_vec();
    pending.sort_by_key(|(index, _)| *index);
    let mut pending = pending.into_iter().peekable();
    let mut existing = block.rows().iter();
    let mut out: Vec<Row> = Vec::with_capacity(block.len() + rows.len());
    let mut added = Vec::new();

    loop {
        if pending.peek().is_some_and(|(index, _)| *index <= out.len()) {
            if let Some((_, row)) = pending.next() {
                added.push(out.len());
                out.push(row);
            }
            continue;
        }
        match existing.next() {
            Some(row) => out.push(row.clone()),
            None if pending.peek().is_some() => {
                added.push(out.len());
                out.push(block.empty_row());
            }
            None => break,
        }
    }
    (Block::from_rows(block.width(), out), added)
}

/// Drop the given row indices, keeping the order of the remaining rows.
/// Indices past the end are ignored. Returns the rebuilt block and the
/// removed rows with their former indices, ascending.
pub fn remove_rows(block: &Block, rows: &[usize]) -> (Block, Vec<(usize, Row)>) {
    let targets: BTreeSet<usize> = rows.iter().copied().collect();
    let mut kept = Vec::with_capacity(block.len());
    let mut removed = Vec::new();
    for (index, row) in block.rows().iter().enumerate() {
        if targets.contains(&index) {
            removed.push((index, row.clone()));
        } else {
            kept.push(row.clone());
        }
    }
    (Block::from_rows(block.width(), kept), removed)
}

/// Where a block instance lives: its group path, block id and instance id.
fn location(parent: &NodePath) -> Result<(NodePath, NodeId, InstanceId), EditError> {
    let not_found = || EditError::PathNotFound(parent.clone());
    let (block, instance) = parent.last().cloned().ok_or_else(not_found)?;
    let group = parent.parent().filter(|p| !p.is_empty()).ok_or_else(not_found)?;
    Ok((group, block, instance))
}

fn column(schema: &dyn Schema, parent: &NodePath, block: &NodeId, field: &NodeId) -> Result<usize, EditError> {
    schema
        .column_index(block, field)
        .ok_or_else(|| EditError::PathNotFound(parent.child(field, InstanceId::default())))
}

fn block_mut<'a>(root: &'a mut Node, parent: &NodePath, col: usize) -> Result<&'a mut Block, EditError> {
    match &mut root.resolve_mut(parent)?.payload {
        Payload::Block(b) => {
            let width = b.width();
            if col < width {
                Ok(b)
            } else {
                Err(EditError::InvalidValue(format!(
                    "column {} outside block of width {}",
                    col, width
                )))
            }
        }
        _ => Err(EditError::NotAContainer(parent.clone())),
    }
}

fn cells(instances: &[Instance]) -> Result<Vec<(usize, Value)>, EditError> {
    instances
        .iter()
        .map(|i| match &i.payload {
            Payload::Field(v) => Ok((i.id.index(), v.clone())),
            other => Err(EditError::InvalidValue(format!(
                "block cells hold scalars, got a {:?} payload",
                other.kind()
            ))),
        })
        .collect()
}

fn trim_rows(group: NodePath, block: NodeId, instance: InstanceId, rows: Vec<usize>) -> EditAction {
    EditAction::RemoveRows {
        parent: group,
        block,
        specs: vec![RowRemove { instance, rows }],
    }
}

pub(super) fn apply_set(
    root: &mut Node,
    schema: &dyn Schema,
    parent: &NodePath,
    field: &NodeId,
    instances: &[Instance],
) -> Result<EditAction, EditError> {
    let (group, block_id, instance) = location(parent)?;
    let col = column(schema, parent, &block_id, field)?;
    let cells = cells(instances)?;
    let block = block_mut(root, parent, col)?;
    within_limit(cells.iter().fold(block.len(), |len, (row, _)| len.max(row.saturating_add(1))))?;

    let original_len = block.len();
    let mut restore = Vec::new();
    for (row, value) in cells {
        if let Some(old) = set_cell(block, row, col, value) {
            restore.push(Instance::cell(row, old));
        }
    }
    restore.reverse();

    let mut inverse = vec![EditAction::Set {
        parent: parent.clone(),
        node: field.clone(),
        instances: restore,
    }];
    if block.len() > original_len {
        inverse.push(trim_rows(group, block_id, instance, (original_len..block.len()).collect()));
    }
    Ok(EditAction::sequence(inverse))
}

pub(super) fn apply_insert(
    root: &mut Node,
    schema: &dyn Schema,
    parent: &NodePath,
    field: &NodeId,
    instances: &[Instance],
) -> Result<EditAction, EditError> {
    let (group, block_id, instance) = location(parent)?;
    let col = column(schema, parent, &block_id, field)?;
    let cells = cells(instances)?;
    let block = block_mut(root, parent, col)?;
    within_limit(cells.iter().fold(block.len(), |len, (row, _)| len.max(*row).saturating_add(1)))?;

    let mut inverse = Vec::with_capacity(cells.len());
    for (row, value) in cells {
        let before = block.len();
        *block = insert_row(block, row, col, value);
        inverse.push(EditAction::Compound(vec![
            EditAction::remove_cell(parent, field, row),
            trim_rows(group.clone(), block_id.clone(), instance, (before..block.len()).collect()),
        ]));
    }
    inverse.reverse();
    Ok(EditAction::sequence(inverse))
}

pub(super) fn apply_remove(
    root: &mut Node,
    schema: &dyn Schema,
    parent: &NodePath,
    field: &NodeId,
    ids: &[InstanceId],
) -> Result<EditAction, EditError> {
    let (group, block_id, instance) = location(parent)?;
    let col = column(schema, parent, &block_id, field)?;
    let block = block_mut(root, parent, col)?;

    let mut inverse = Vec::new();
    for id in ids {
        let row = id.index();
        let before = block.len();
        let Some(old) = block.cell(row, col).cloned() else {
            continue;
        };
        let Some(rebuilt) = remove_row(block, row, col) else {
            continue;
        };
        *block = rebuilt;
        inverse.push(EditAction::Compound(vec![
            EditAction::insert_cell(parent, field, row, old),
            trim_rows(group.clone(), block_id.clone(), instance, vec![before]),
        ]));
    }
    inverse.reverse();
    Ok(EditAction::sequence(inverse))
}

/// The block node `block` inside the group instance at `parent`, checking
/// that every instance named in `wanted` exists before anything is changed.
fn block_node<'a>(
    root: &'a mut Node,
    schema: &dyn Schema,
    parent: &NodePath,
    block: &NodeId,
    wanted: impl Iterator<Item = InstanceId>,
) -> Result<&'a mut Node, EditError> {
    if schema.node_kind(block) != Some(NodeKind::Block) {
        return Err(EditError::InvalidValue(format!("{} is not a block", block)));
    }
    let group = match &mut root.resolve_mut(parent)?.payload {
        Payload::Group(g) => g,
        _ => return Err(EditError::NotAContainer(parent.clone())),
    };
    let node = group
        .child_mut(block)
        .ok_or_else(|| EditError::PathNotFound(parent.child(block, InstanceId::default())))?;
    for id in wanted {
        if !node.contains(id) {
            return Err(EditError::PathNotFound(parent.child(block, id)));
        }
    }
    Ok(node)
}

fn instance_block<'a>(node: &'a mut Node, parent: &NodePath, id: InstanceId) -> Result<&'a mut Block, EditError> {
    let path = parent.child(&node.id, id);
    match node.get_mut(id).map(|i| &mut i.payload) {
        Some(Payload::Block(b)) => Ok(b),
        _ => Err(EditError::PathNotFound(path)),
    }
}

pub(super) fn apply_insert_rows(
    root: &mut Node,
    schema: &dyn Schema,
    parent: &NodePath,
    block: &NodeId,
    specs: &[RowInsert],
) -> Result<EditAction, EditError> {
    let node = block_node(root, schema, parent, block, specs.iter().map(|s| s.instance))?;
    for spec in specs {
        let len = instance_block(node, parent, spec.instance)?.len();
        let last = spec.rows.iter().map(|(index, _)| index.saturating_add(1)).max().unwrap_or(0);
        within_limit(last.max(len + spec.rows.len()))?;
    }
    let mut undo = Vec::with_capacity(specs.len());
    for spec in specs {
        let target = instance_block(node, parent, spec.instance)?;
        let (rebuilt, added) = insert_rows(target, &spec.rows);
        *target = rebuilt;
        undo.push(RowRemove {
            instance: spec.instance,
            rows: added,
        });
    }
    undo.reverse();
    Ok(EditAction::RemoveRows {
        parent: parent.clone(),
        block: block.clone(),
        specs: undo,
    })
}

pub(super) fn apply_remove_rows(
    root: &mut Node,
    schema: &dyn Schema,
    parent: &NodePath,
    block: &NodeId,
    specs: &[RowRemove],
) -> Result<EditAction, EditError> {
    let node = block_node(root, schema, parent, block, specs.iter().map(|s| s.instance))?;
    let mut undo = Vec::with_capacity(specs.len());
    for spec in specs {
        let target = instance_block(node, parent, spec.instance)?;
        let (rebuilt, removed) = remove_rows(target, &spec.rows);
        *target = rebuilt;
        undo.push(RowInsert {
            instance: spec.instance,
            rows: removed,
        });
    }
    undo.reverse();
    Ok(EditAction::InsertRows {
        parent: parent.clone(),
        block: block.clone(),
        specs: undo,
    })
}
