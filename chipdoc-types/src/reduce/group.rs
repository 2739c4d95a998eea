//! Instance-level edits of group children.

use crate::{EditAction, EditError, Group, Instance, InstanceId, Node, NodeId, NodePath, Payload, Schema};

/// The schema-declared child order of the group instance at `parent`,
/// after checking that `node` is one of its children.
fn child_order<'s>(schema: &'s dyn Schema, parent: &NodePath, node: &NodeId) -> Result<&'s [NodeId], EditError> {
    let group = parent
        .last()
        .map(|(id, _)| id)
        .ok_or_else(|| EditError::PathNotFound(parent.clone()))?;
    let order = schema.child_ids(group);
    if order.contains(node) {
        Ok(order)
    } else {
        Err(EditError::PathNotFound(parent.child(node, InstanceId::default())))
    }
}

fn group_mut<'a>(root: &'a mut Node, parent: &NodePath) -> Result<&'a mut Group, EditError> {
    match &mut root.resolve_mut(parent)?.payload {
        Payload::Group(g) => Ok(g),
        _ => Err(EditError::NotAContainer(parent.clone())),
    }
}

/// Reject instances whose payload cannot stand in for `node`.
fn validate(schema: &dyn Schema, node: &NodeId, instances: &[Instance]) -> Result<(), EditError> {
    let expected = schema
        .node_kind(node)
        .ok_or_else(|| EditError::InvalidValue(format!("{} has no kind in the schema", node)))?;
    for instance in instances {
        let kind = instance.payload.kind();
        if kind != expected {
            return Err(EditError::InvalidValue(format!(
                "{} instance {} is a {:?}, expected a {:?}",
                node, instance.id, kind, expected
            )));
        }
        if let Payload::Block(block) = &instance.payload {
            let width = schema.child_ids(node).len();
            if block.width() != width || !block.is_aligned() {
                return Err(EditError::InvalidValue(format!(
                    "{} instance {} has {} columns, expected {}",
                    node,
                    instance.id,
                    block.width(),
                    width
                )));
            }
        }
    }
    Ok(())
}

pub(super) fn apply_set(
    root: &mut Node,
    schema: &dyn Schema,
    parent: &NodePath,
    node: &NodeId,
    instances: &[Instance],
) -> Result<EditAction, EditError> {
    let order = child_order(schema, parent, node)?;
    validate(schema, node, instances)?;
    let group = group_mut(root, parent)?;

    let mut replaced = Vec::new();
    let mut created = Vec::new();
    for instance in instances {
        match group.upsert(node, instance.clone(), order) {
            Some(old) => replaced.push(old),
            None => created.push(instance.id),
        }
    }
    replaced.reverse();
    Ok(EditAction::sequence(vec![
        EditAction::Set {
            parent: parent.clone(),
            node: node.clone(),
            instances: replaced,
        },
        EditAction::Remove {
            parent: parent.clone(),
            node: node.clone(),
            ids: created,
        },
    ]))
}

/// Fails with `DuplicateInstance` before touching the tree if any id is
/// already taken, either in the tree or earlier in `instances`.
pub(super) fn apply_insert(
    root: &mut Node,
    schema: &dyn Schema,
    parent: &NodePath,
    node: &NodeId,
    instances: &[Instance],
) -> Result<EditAction, EditError> {
    let order = child_order(schema, parent, node)?;
    validate(schema, node, instances)?;
    let group = group_mut(root, parent)?;

    let mut seen = Vec::with_capacity(instances.len());
    for instance in instances {
        let taken = group.instance(node, instance.id).is_some() || seen.contains(&instance.id);
        if taken {
            return Err(EditError::DuplicateInstance {
                node: node.clone(),
                id: instance.id,
            });
        }
        seen.push(instance.id);
    }

    for instance in instances {
        group.upsert(node, instance.clone(), order);
    }
    Ok(EditAction::Remove {
        parent: parent.clone(),
        node: node.clone(),
        ids: seen,
    })
}

/// Ids that do not exist are skipped.
pub(super) fn apply_remove(
    root: &mut Node,
    schema: &dyn Schema,
    parent: &NodePath,
    node: &NodeId,
    ids: &[InstanceId],
) -> Result<EditAction, EditError> {
    child_order(schema, parent, node)?;
    let group = group_mut(root, parent)?;
    let removed: Vec<Instance> = ids.iter().filter_map(|id| group.remove(node, *id)).collect();
    Ok(EditAction::Insert {
        parent: parent.clone(),
        node: node.clone(),
        instances: removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Block, Command, CommandKind, SchemaDef, Value};

    fn schema() -> SchemaDef {
        SchemaDef::new("SONG")
            .group("SONG", &["NAME", "SEQ"])
            .field("NAME", Command::new(CommandKind::Text))
            .block("SEQ", &["STEP"])
            .field("STEP", Command::new(CommandKind::Int))
    }

    fn song() -> Node {
        Node::with_instances(NodeId::new("SONG"), vec![Instance::group(0, Group::new())])
    }

    fn root() -> NodePath {
        "SONG/0".parse().unwrap()
    }

    #[test]
    fn first_instance_creates_the_node_in_schema_order() {
        let schema = schema();
        let mut tree = song();
        let seq = EditAction::Insert {
            parent: root(),
            node: NodeId::new("SEQ"),
            instances: vec![Instance::block(2, Block::new(1, 3))],
        };
        let name = EditAction::Set {
            parent: root(),
            node: NodeId::new("NAME"),
            instances: vec![Instance::field(0, Value::text("demo"))],
        };
        crate::reduce::apply(&seq, &mut tree, &schema).unwrap();
        crate::reduce::apply(&name, &mut tree, &schema).unwrap();

        let group = tree.resolve(&root()).unwrap().as_group().unwrap();
        let ids: Vec<&str> = group.children().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["NAME", "SEQ"]);
    }

    #[test]
    fn duplicate_ids_within_one_insert() {
        let schema = schema();
        let mut tree = song();
        let action = EditAction::Insert {
            parent: root(),
            node: NodeId::new("NAME"),
            instances: vec![Instance::field(1, Value::Empty), Instance::field(1, Value::Empty)],
        };
        assert!(matches!(
            crate::reduce::apply(&action, &mut tree, &schema),
            Err(EditError::DuplicateInstance { .. })
        ));
        assert_eq!(tree, song());
    }

    #[test]
    fn unknown_child_is_not_found() {
        let schema = schema();
        let mut tree = song();
        let action = EditAction::Remove {
            parent: root(),
            node: NodeId::new("TEMPO"),
            ids: vec![InstanceId::new(0)],
        };
        assert_eq!(
            crate::reduce::apply(&action, &mut tree, &schema),
            Err(EditError::PathNotFound("SONG/0/TEMPO/0".parse().unwrap()))
        );
    }

    #[test]
    fn ragged_blocks_are_rejected() {
        let schema = schema();
        let instances = vec![Instance::block(0, Block::new(2, 1))];
        assert!(validate(&schema, &NodeId::new("SEQ"), &instances).is_err());
    }
}
