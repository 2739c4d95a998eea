//! The in-memory node tree.
//!
//! Instances are held behind `Arc` so that clones of a tree share every
//! unchanged sub-tree. Mutable access goes through `Arc::make_mut`, which
//! copies only the instances on the path being written.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::path::{NodePath, PathNotFound};
use super::schema::NodeKind;
use super::value::Value;
use crate::{InstanceId, NodeId};

/// One row of a block: a value per field column, in schema order.
pub type Row = Vec<Value>;

/// A node of the schema together with all of its instances, ordered by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    instances: Vec<Arc<Instance>>,
}

/// One occurrence of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Field(Value),
    Block(Block),
    Group(Group),
}

/// Row-oriented table. Every row has exactly `width` columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    width: usize,
    rows: Vec<Row>,
}

/// Child nodes of a group instance, in schema order. Nodes without any
/// instances are never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    children: Vec<Node>,
}

impl Payload {
    pub fn kind(&self) -> NodeKind {
        match self {
            Payload::Field(_) => NodeKind::Field,
            Payload::Block(_) => NodeKind::Block,
            Payload::Group(_) => NodeKind::Group,
        }
    }
}

impl Instance {
    pub fn new(id: InstanceId, payload: Payload) -> Self {
        Self {
            id,
            name: None,
            payload,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn field(id: u32, value: Value) -> Self {
        Self::new(InstanceId::new(id), Payload::Field(value))
    }

    /// A single cell of a block column; the instance id is the row index.
    pub fn cell(row: usize, value: Value) -> Self {
        Self::new(InstanceId::new(row as u32), Payload::Field(value))
    }

    pub fn block(id: u32, block: Block) -> Self {
        Self::new(InstanceId::new(id), Payload::Block(block))
    }

    pub fn group(id: u32, group: Group) -> Self {
        Self::new(InstanceId::new(id), Payload::Group(group))
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.payload {
            Payload::Field(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<&Block> {
        match &self.payload {
            Payload::Block(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match &self.payload {
            Payload::Group(g) => Some(g),
            _ => None,
        }
    }
}

impl Block {
    /// A block of `len` all-empty rows.
    pub fn new(width: usize, len: usize) -> Self {
        Self {
            width,
            rows: vec![vec![Value::Empty; width]; len],
        }
    }

    /// Build from rows, padding short rows with empty cells and cutting long ones.
    pub fn from_rows(width: usize, rows: Vec<Row>) -> Self {
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Empty);
                row
            })
            .collect();
        Self { width, rows }
    }

    /// Recompose rows from field columns. Shorter columns are padded with
    /// empty cells up to the longest one.
    pub fn from_columns(columns: Vec<Vec<Value>>) -> Self {
        let width = columns.len();
        let len = columns.iter().map(Vec::len).max().unwrap_or(0);
        let mut rows = vec![Vec::with_capacity(width); len];
        for column in columns {
            let mut cells = column.into_iter();
            for row in rows.iter_mut() {
                row.push(cells.next().unwrap_or(Value::Empty));
            }
        }
        Self { width, rows }
    }

    pub fn columns(&self) -> Vec<Vec<Value>> {
        (0..self.width)
            .map(|col| self.rows.iter().map(|row| row[col].clone()).collect())
            .collect()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    pub fn empty_row(&self) -> Row {
        vec![Value::Empty; self.width]
    }

    /// Append all-empty rows until the block holds `len` rows.
    pub fn pad_to(&mut self, len: usize) {
        while self.rows.len() < len {
            self.rows.push(self.empty_row());
        }
    }

    /// Keep only the first `len` rows.
    pub fn truncate(&mut self, len: usize) {
        self.rows.truncate(len);
    }

    pub fn is_aligned(&self) -> bool {
        self.rows.iter().all(|row| row.len() == self.width)
    }

    pub(crate) fn rows_mut(&mut self) -> &mut Vec<Row> {
        &mut self.rows
    }
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_children(children: Vec<Node>) -> Self {
        Self {
            children: children.into_iter().filter(|n| !n.is_empty()).collect(),
        }
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn child(&self, id: &NodeId) -> Option<&Node> {
        self.children.iter().find(|n| n.id == *id)
    }

    pub fn child_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.children.iter_mut().find(|n| n.id == *id)
    }

    pub fn instance(&self, node: &NodeId, id: InstanceId) -> Option<&Instance> {
        self.child(node).and_then(|n| n.get(id))
    }

    /// Insert or replace an instance of `node`, returning the replaced one.
    /// A node seen for the first time is placed according to `order`
    /// (the group's schema-declared child order).
    pub fn upsert(&mut self, node: &NodeId, instance: Instance, order: &[NodeId]) -> Option<Instance> {
        if let Some(existing) = self.child_mut(node) {
            return existing.insert(instance);
        }
        let rank = |id: &NodeId| order.iter().position(|o| o == id).unwrap_or(usize::MAX);
        let target = rank(node);
        let pos = self
            .children
            .iter()
            .position(|c| rank(&c.id) > target)
            .unwrap_or(self.children.len());
        let mut fresh = Node::new(node.clone());
        fresh.insert(instance);
        self.children.insert(pos, fresh);
        None
    }

    /// Remove an instance; a node left without instances is dropped.
    pub fn remove(&mut self, node: &NodeId, id: InstanceId) -> Option<Instance> {
        let pos = self.children.iter().position(|n| n.id == *node)?;
        let removed = self.children[pos].remove(id);
        if self.children[pos].is_empty() {
            self.children.remove(pos);
        }
        removed
    }

    /// Append a child node. Empty nodes are ignored.
    pub fn push_node(&mut self, node: Node) {
        if !node.is_empty() {
            self.children.push(node);
        }
    }

    /// Replace the whole child node with the same id, or append it.
    pub fn replace_node(&mut self, node: Node) {
        match self.children.iter().position(|n| n.id == node.id) {
            Some(pos) if node.is_empty() => {
                self.children.remove(pos);
            }
            Some(pos) => self.children[pos] = node,
            None => self.push_node(node),
        }
    }
}

impl Node {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            instances: Vec::new(),
        }
    }

    /// Build a node from instances. A later instance replaces an earlier one with the same id.
    pub fn with_instances(id: NodeId, instances: Vec<Instance>) -> Self {
        let mut node = Self::new(id);
        for instance in instances {
            node.insert(instance);
        }
        node
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.instances.iter().map(|i| i.as_ref())
    }

    pub fn ids(&self) -> Vec<InstanceId> {
        self.instances.iter().map(|i| i.id).collect()
    }

    fn position(&self, id: InstanceId) -> Result<usize, usize> {
        self.instances.binary_search_by_key(&id, |i| i.id)
    }

    pub fn get(&self, id: InstanceId) -> Option<&Instance> {
        self.position(id).ok().map(|pos| self.instances[pos].as_ref())
    }

    /// Copy-on-write access to one instance.
    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut Instance> {
        let pos = self.position(id).ok()?;
        Some(Arc::make_mut(&mut self.instances[pos]))
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.position(id).is_ok()
    }

    /// Insert keeping id order; returns the instance that was replaced, if any.
    pub fn insert(&mut self, instance: Instance) -> Option<Instance> {
        match self.position(instance.id) {
            Ok(pos) => {
                let old = std::mem::replace(&mut self.instances[pos], Arc::new(instance));
                Some(Arc::unwrap_or_clone(old))
            }
            Err(pos) => {
                self.instances.insert(pos, Arc::new(instance));
                None
            }
        }
    }

    pub fn remove(&mut self, id: InstanceId) -> Option<Instance> {
        let pos = self.position(id).ok()?;
        Some(Arc::unwrap_or_clone(self.instances.remove(pos)))
    }

    /// Keep only the instances for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&Instance) -> bool) {
        self.instances.retain(|i| keep(i));
    }

    /// True when both nodes hold the very same allocation for instance `id`.
    pub fn shares_instance(&self, other: &Node, id: InstanceId) -> bool {
        match (self.position(id), other.position(id)) {
            (Ok(a), Ok(b)) => Arc::ptr_eq(&self.instances[a], &other.instances[b]),
            _ => false,
        }
    }

    /// Resolve a path that starts at this node.
    pub fn resolve(&self, path: &NodePath) -> Result<&Instance, PathNotFound> {
        let not_found = || PathNotFound(path.clone());
        let ((root_id, root_instance), rest) = path.segments().split_first().ok_or_else(not_found)?;
        if *root_id != self.id {
            return Err(not_found());
        }
        let root = self.get(*root_instance).ok_or_else(not_found)?;
        descend(root, rest).ok_or_else(not_found)
    }

    /// Resolve a path for writing. Instances along the path that are shared
    /// with other trees are copied first.
    pub fn resolve_mut(&mut self, path: &NodePath) -> Result<&mut Instance, PathNotFound> {
        let not_found = || PathNotFound(path.clone());
        let ((root_id, root_instance), rest) = path.segments().split_first().ok_or_else(not_found)?;
        if *root_id != self.id {
            return Err(not_found());
        }
        let root = self.get_mut(*root_instance).ok_or_else(not_found)?;
        descend_mut(root, rest).ok_or_else(not_found)
    }

    /// Resolve the node `id` inside the group instance at `parent`.
    pub fn resolve_node(&self, parent: &NodePath, id: &NodeId) -> Result<&Node, PathNotFound> {
        self.resolve(parent)?
            .as_group()
            .and_then(|g| g.child(id))
            .ok_or_else(|| PathNotFound(parent.child(id, InstanceId::default())))
    }

    /// Paths to every instance of node `id` anywhere below (and including) this node.
    pub fn find_paths(&self, id: &NodeId) -> Vec<NodePath> {
        let mut found = Vec::new();
        collect_paths(self, &NodePath::default(), id, &mut found);
        found
    }
}

fn descend<'a>(instance: &'a Instance, rest: &[(NodeId, InstanceId)]) -> Option<&'a Instance> {
    match rest.split_first() {
        None => Some(instance),
        Some(((node, id), tail)) => match &instance.payload {
            Payload::Group(g) => descend(g.child(node)?.get(*id)?, tail),
            _ => None,
        },
    }
}

fn descend_mut<'a>(
    instance: &'a mut Instance,
    rest: &[(NodeId, InstanceId)],
) -> Option<&'a mut Instance> {
    match rest.split_first() {
        None => Some(instance),
        Some(((node, id), tail)) => match &mut instance.payload {
            Payload::Group(g) => descend_mut(g.child_mut(node)?.get_mut(*id)?, tail),
            _ => None,
        },
    }
}

fn collect_paths(node: &Node, prefix: &NodePath, target: &NodeId, found: &mut Vec<NodePath>) {
    for instance in node.instances() {
        let here = prefix.child(&node.id, instance.id);
        if node.id == *target {
            found.push(here.clone());
        }
        if let Payload::Group(g) = &instance.payload {
            for child in g.children() {
                collect_paths(child, &here, target, found);
            }
        }
    }
}
