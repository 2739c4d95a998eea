//! Preview derivations.
//!
//! Both functions return a new tree and leave their input untouched. The
//! result is a copy-on-write clone, so every instance outside the rewritten
//! group instances is shared with the input.

use crate::{order_node_id, Block, Group, Instance, InstanceId, Node, NodeId, NodePath, Payload, Row, Schema, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum DeriveError {
    PathNotFound(NodePath),
    /// The group, or its order list, does not occur in the tree.
    NotFound(NodeId),
    OrderOutOfRange {
        group: NodeId,
        position: usize,
        len: usize,
    },
}

impl std::fmt::Display for DeriveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeriveError::PathNotFound(p) => write!(f, "path not found: {}", p),
            DeriveError::NotFound(id) => write!(f, "no {} in module", id),
            DeriveError::OrderOutOfRange { group, position, len } => write!(
                f,
                "order position {} out of range for {} ({} entries)",
                position, group, len
            ),
        }
    }
}

impl std::error::Error for DeriveError {}

/// Restrict every instance of `group` to a single order entry holding one
/// row: row `row` of each block referenced at `position`. A pattern shorter
/// than `row` contributes an all-empty row. The order list becomes
/// `(1, ref…)`, and unreferenced pattern instances are dropped.
pub fn single_row(
    root: &Node,
    schema: &dyn Schema,
    group: &NodeId,
    position: usize,
    row: usize,
) -> Result<Node, DeriveError> {
    rewrite_group(root, group, |g| {
        let mut entry = order_entry(g, group, position)?;
        let blocks = schema.pattern_blocks(group);
        for (k, block_id) in blocks.iter().enumerate() {
            let reference = InstanceId::new(reference_at(&entry, k + 1));
            let width = schema.child_ids(block_id).len();
            let picked = g
                .instance(block_id, reference)
                .and_then(Instance::as_block)
                .and_then(|b| b.row(row).cloned())
                .unwrap_or_else(|| vec![Value::Empty; width]);

            let mut node = Node::new(block_id.clone());
            let name = g.instance(block_id, reference).and_then(|i| i.name.clone());
            let mut instance = Instance::new(reference, Payload::Block(Block::from_rows(width, vec![picked])));
            instance.name = name;
            node.insert(instance);
            g.replace_node(node);

            if let Some(cell) = entry.get_mut(k + 1) {
                *cell = Value::Int(reference.get() as i64);
            }
        }
        if let Some(repeat) = entry.first_mut() {
            *repeat = Value::Int(1);
        }
        set_order(g, group, entry)
    })
}

/// Restrict every instance of `group` to the single order entry at
/// `position`. Pattern blocks are left as they are.
pub fn single_pattern(root: &Node, group: &NodeId, position: usize) -> Result<Node, DeriveError> {
    rewrite_group(root, group, |g| {
        let entry = order_entry(g, group, position)?;
        set_order(g, group, entry)
    })
}

fn rewrite_group(
    root: &Node,
    group: &NodeId,
    mut rewrite: impl FnMut(&mut Group) -> Result<(), DeriveError>,
) -> Result<Node, DeriveError> {
    let paths = root.find_paths(group);
    if paths.is_empty() {
        return Err(DeriveError::NotFound(group.clone()));
    }
    let mut derived = root.clone();
    for path in paths {
        let instance = derived
            .resolve_mut(&path)
            .map_err(|e| DeriveError::PathNotFound(e.0))?;
        match &mut instance.payload {
            Payload::Group(g) => rewrite(g)?,
            _ => return Err(DeriveError::NotFound(group.clone())),
        }
    }
    Ok(derived)
}

fn order_block<'a>(g: &'a Group, group: &NodeId) -> Result<(InstanceId, &'a Block), DeriveError> {
    let order = order_node_id(group);
    g.child(&order)
        .and_then(|n| n.instances().next())
        .and_then(|i| Some((i.id, i.as_block()?)))
        .ok_or(DeriveError::NotFound(order))
}

fn order_entry(g: &Group, group: &NodeId, position: usize) -> Result<Row, DeriveError> {
    let (_, block) = order_block(g, group)?;
    block.row(position).cloned().ok_or(DeriveError::OrderOutOfRange {
        group: group.clone(),
        position,
        len: block.len(),
    })
}

fn set_order(g: &mut Group, group: &NodeId, entry: Row) -> Result<(), DeriveError> {
    let (id, block) = order_block(g, group)?;
    let width = block.width();
    let order = order_node_id(group);
    if let Some(instance) = g.child_mut(&order).and_then(|n| n.get_mut(id)) {
        instance.payload = Payload::Block(Block::from_rows(width, vec![entry]));
    }
    Ok(())
}

/// Order list cells that are missing or not integers reference instance 0.
fn reference_at(entry: &Row, col: usize) -> u32 {
    entry
        .get(col)
        .and_then(Value::as_int)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{generate_tree, reduce, Command, CommandKind, EditAction, RowInsert, SchemaDef};

    fn schema() -> SchemaDef {
        SchemaDef::new("GLOBAL")
            .group("GLOBAL", &["BPM", "PATTERNS"])
            .field("BPM", Command::new(CommandKind::Int).with_default(Value::Int(120)))
            .group("PATTERNS", &["PATTERNS_ORDER", "NOTES", "FX"])
            .block("PATTERNS_ORDER", &["R", "NOTES_REF", "FX_REF"])
            .field("R", Command::new(CommandKind::Int))
            .field("NOTES_REF", Command::new(CommandKind::Reference))
            .field("FX_REF", Command::new(CommandKind::Reference))
            .block("NOTES", &["NOTE"])
            .field("NOTE", Command::new(CommandKind::Key))
            .block("FX", &["FX_CMD"])
            .field("FX_CMD", Command::new(CommandKind::Int))
    }

    fn patterns() -> NodePath {
        "GLOBAL/0/PATTERNS/0".parse().unwrap()
    }

    fn int_row(values: &[i64]) -> Row {
        values.iter().map(|n| Value::Int(*n)).collect()
    }

    /// Order list `[(4 0 0) (2 1 0)]`, NOTES/0 = `[c4 d4 e4 f4]`, NOTES/1 = `[g4 a4]`.
    fn two_pattern_tree(schema: &SchemaDef) -> Node {
        let mut tree = generate_tree(schema, 4);
        let keys = |names: &[&str]| -> Vec<Row> { names.iter().map(|n| vec![Value::key(n)]).collect() };
        let setup = EditAction::Compound(vec![
            EditAction::Set {
                parent: patterns(),
                node: NodeId::new("PATTERNS_ORDER"),
                instances: vec![Instance::block(
                    0,
                    Block::from_rows(3, vec![int_row(&[4, 0, 0]), int_row(&[2, 1, 0])]),
                )],
            },
            EditAction::Set {
                parent: patterns(),
                node: NodeId::new("NOTES"),
                instances: vec![
                    Instance::block(0, Block::from_rows(1, keys(&["c4", "d4", "e4", "f4"]))),
                    Instance::block(1, Block::from_rows(1, keys(&["g4", "a4"]))).named("chorus"),
                ],
            },
        ]);
        reduce::apply(&setup, &mut tree, schema).unwrap();
        tree
    }

    fn block_at<'a>(tree: &'a Node, path: &str) -> &'a Block {
        tree.resolve(&path.parse().unwrap()).unwrap().as_block().unwrap()
    }

    #[test]
    fn single_row_at_second_order_position() {
        let schema = schema();
        let tree = two_pattern_tree(&schema);
        let derived = single_row(&tree, &schema, &NodeId::new("PATTERNS"), 1, 0).unwrap();

        let order = block_at(&derived, "GLOBAL/0/PATTERNS/0/PATTERNS_ORDER/0");
        assert_eq!(order.rows(), &[int_row(&[1, 1, 0])]);

        let notes = block_at(&derived, "GLOBAL/0/PATTERNS/0/NOTES/1");
        assert_eq!(notes.rows(), &[vec![Value::key("g4")]]);
        let name = derived.resolve(&"GLOBAL/0/PATTERNS/0/NOTES/1".parse().unwrap()).unwrap().name.clone();
        assert_eq!(name.as_deref(), Some("chorus"));

        let live = block_at(&tree, "GLOBAL/0/PATTERNS/0/NOTES/1");
        assert_eq!(live.len(), 2);
    }

    #[test]
    fn single_row_past_pattern_end_is_empty() {
        let schema = schema();
        let tree = two_pattern_tree(&schema);
        let derived = single_row(&tree, &schema, &NodeId::new("PATTERNS"), 1, 3).unwrap();
        let notes = block_at(&derived, "GLOBAL/0/PATTERNS/0/NOTES/1");
        assert_eq!(notes.rows(), &[vec![Value::Empty]]);
    }

    #[test]
    fn single_row_drops_unreferenced_patterns() {
        let schema = schema();
        let tree = two_pattern_tree(&schema);
        let derived = single_row(&tree, &schema, &NodeId::new("PATTERNS"), 0, 2).unwrap();
        let group = derived.resolve(&patterns()).unwrap().as_group().unwrap();
        let notes = group.child(&NodeId::new("NOTES")).unwrap();
        assert_eq!(notes.ids(), vec![InstanceId::new(0)]);
        assert_eq!(block_at(&derived, "GLOBAL/0/PATTERNS/0/NOTES/0").rows(), &[vec![Value::key("e4")]]);
    }

    #[test]
    fn single_pattern_keeps_full_blocks() {
        let schema = schema();
        let tree = two_pattern_tree(&schema);
        let derived = single_pattern(&tree, &NodeId::new("PATTERNS"), 1).unwrap();

        let order = block_at(&derived, "GLOBAL/0/PATTERNS/0/PATTERNS_ORDER/0");
        assert_eq!(order.rows(), &[int_row(&[2, 1, 0])]);
        assert_eq!(block_at(&derived, "GLOBAL/0/PATTERNS/0/NOTES/0").len(), 4);
        assert_eq!(block_at(&derived, "GLOBAL/0/PATTERNS/0/NOTES/1").len(), 2);
    }

    #[test]
    fn derivation_shares_untouched_instances() {
        let schema = schema();
        let tree = two_pattern_tree(&schema);
        let derived = single_pattern(&tree, &NodeId::new("PATTERNS"), 0).unwrap();

        let tree_bpm = tree.resolve_node(&"GLOBAL/0".parse().unwrap(), &NodeId::new("BPM")).unwrap();
        let derived_bpm = derived.resolve_node(&"GLOBAL/0".parse().unwrap(), &NodeId::new("BPM")).unwrap();
        assert!(tree_bpm.shares_instance(derived_bpm, InstanceId::new(0)));

        let tree_notes = tree.resolve_node(&patterns(), &NodeId::new("NOTES")).unwrap();
        let derived_notes = derived.resolve_node(&patterns(), &NodeId::new("NOTES")).unwrap();
        assert!(tree_notes.shares_instance(derived_notes, InstanceId::new(1)));
    }

    #[test]
    fn errors() {
        let schema = schema();
        let tree = two_pattern_tree(&schema);
        assert_eq!(
            single_pattern(&tree, &NodeId::new("PATTERNS"), 2),
            Err(DeriveError::OrderOutOfRange {
                group: NodeId::new("PATTERNS"),
                position: 2,
                len: 2
            })
        );
        assert_eq!(
            single_row(&tree, &schema, &NodeId::new("SONGS"), 0, 0),
            Err(DeriveError::NotFound(NodeId::new("SONGS")))
        );
    }

    #[test]
    fn every_group_instance_is_rewritten() {
        let schema = schema();
        let mut tree = two_pattern_tree(&schema);
        let second = tree.resolve(&patterns()).unwrap().clone();
        let add = EditAction::Insert {
            parent: "GLOBAL/0".parse().unwrap(),
            node: NodeId::new("PATTERNS"),
            instances: vec![Instance { id: InstanceId::new(1), ..second }],
        };
        reduce::apply(&add, &mut tree, &schema).unwrap();
        let grow = EditAction::InsertRows {
            parent: "GLOBAL/0/PATTERNS/1".parse().unwrap(),
            block: NodeId::new("PATTERNS_ORDER"),
            specs: vec![RowInsert {
                instance: InstanceId::new(0),
                rows: vec![(2, int_row(&[1, 0, 0]))],
            }],
        };
        reduce::apply(&grow, &mut tree, &schema).unwrap();

        let derived = single_pattern(&tree, &NodeId::new("PATTERNS"), 1).unwrap();
        for id in 0..2 {
            let path = format!("GLOBAL/0/PATTERNS/{}/PATTERNS_ORDER/0", id);
            assert_eq!(block_at(&derived, &path).rows(), &[int_row(&[2, 1, 0])]);
        }
    }
}
