//! The schema contract a module configuration provides, plus a data-driven
//! implementation of it.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use super::tree::{Block, Group, Instance, Node, Payload};
use super::value::Value;
use crate::{order_node_id, InstanceId, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Field,
    Block,
    Group,
}

/// What kind of data a source command carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Int,
    Key,
    Text,
    Bool,
    /// Instance id of a sibling block (order list columns).
    Reference,
    /// One-shot flag, set or unset.
    Trigger,
}

/// The command a field is bound to.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    pub default: Value,
    /// Width of the encoded value in bits.
    pub bits: u8,
}

impl Command {
    pub fn new(kind: CommandKind) -> Self {
        let bits = match kind {
            CommandKind::Bool | CommandKind::Trigger => 1,
            _ => 8,
        };
        Self {
            kind,
            default: Value::Empty,
            bits,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = default;
        self
    }

    pub fn with_bits(mut self, bits: u8) -> Self {
        self.bits = bits;
        self
    }

    /// Number of whole bytes needed for one value (at least one).
    pub fn byte_width(&self) -> usize {
        (self.bits as usize).div_ceil(8).max(1)
    }
}

/// Read-only view of a module configuration's node tree.
pub trait Schema {
    fn root_id(&self) -> &NodeId;

    fn node_kind(&self, id: &NodeId) -> Option<NodeKind>;

    /// Ordered child node ids of a group or block. Empty for fields and unknown ids.
    fn child_ids(&self, id: &NodeId) -> &[NodeId];

    fn source_command(&self, field: &NodeId) -> Option<&Command>;

    fn default_value(&self, field: &NodeId) -> Value {
        self.source_command(field)
            .map(|c| c.default.clone())
            .unwrap_or_default()
    }

    /// Column of `field` within rows of `block`.
    fn column_index(&self, block: &NodeId, field: &NodeId) -> Option<usize> {
        self.child_ids(block).iter().position(|c| c == field)
    }

    /// Non-order block children of `group`, in schema order. Order list
    /// column `k + 1` references instances of the k-th of these.
    fn pattern_blocks(&self, group: &NodeId) -> Vec<NodeId> {
        let order = order_node_id(group);
        self.child_ids(group)
            .iter()
            .filter(|c| **c != order && self.node_kind(c) == Some(NodeKind::Block))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone)]
struct NodeDef {
    kind: NodeKind,
    children: Vec<NodeId>,
    command: Option<NodeId>,
}

/// Schema held as plain data. Deserializes from the `[schema]` table of a
/// configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "SchemaSource")]
pub struct SchemaDef {
    root: NodeId,
    nodes: HashMap<NodeId, NodeDef>,
    commands: HashMap<NodeId, Command>,
}

impl SchemaDef {
    pub fn new(root: &str) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            NodeId::new(root),
            NodeDef {
                kind: NodeKind::Group,
                children: Vec::new(),
                command: None,
            },
        );
        Self {
            root: NodeId::new(root),
            nodes,
            commands: HashMap::new(),
        }
    }

    pub fn group(self, id: &str, children: &[&str]) -> Self {
        self.node(id, NodeKind::Group, children)
    }

    pub fn block(self, id: &str, children: &[&str]) -> Self {
        self.node(id, NodeKind::Block, children)
    }

    /// A field bound to a command of the same name.
    pub fn field(mut self, id: &str, command: Command) -> Self {
        self.commands.insert(NodeId::new(id), command);
        self.nodes.insert(
            NodeId::new(id),
            NodeDef {
                kind: NodeKind::Field,
                children: Vec::new(),
                command: Some(NodeId::new(id)),
            },
        );
        self
    }

    fn node(mut self, id: &str, kind: NodeKind, children: &[&str]) -> Self {
        self.nodes.insert(
            NodeId::new(id),
            NodeDef {
                kind,
                children: children.iter().map(|c| NodeId::new(c)).collect(),
                command: None,
            },
        );
        self
    }
}

impl Schema for SchemaDef {
    fn root_id(&self) -> &NodeId {
        &self.root
    }

    fn node_kind(&self, id: &NodeId) -> Option<NodeKind> {
        self.nodes.get(id).map(|n| n.kind)
    }

    fn child_ids(&self, id: &NodeId) -> &[NodeId] {
        self.nodes.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    fn source_command(&self, field: &NodeId) -> Option<&Command> {
        let def = self.nodes.get(field)?;
        self.commands.get(def.command.as_ref()?)
    }
}

#[derive(Deserialize)]
struct SchemaSource {
    root: String,
    nodes: BTreeMap<String, NodeSource>,
    #[serde(default)]
    commands: BTreeMap<String, CommandSource>,
}

#[derive(Deserialize)]
struct NodeSource {
    kind: NodeKind,
    #[serde(default)]
    children: Vec<String>,
    command: Option<String>,
}

#[derive(Deserialize)]
struct CommandSource {
    kind: CommandKind,
    default: Option<Literal>,
    bits: Option<u8>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Literal {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl Literal {
    fn into_value(self, kind: CommandKind) -> Value {
        match (self, kind) {
            (Literal::Bool(b), _) => Value::Bool(b),
            (Literal::Int(n), _) => Value::Int(n),
            (Literal::Str(s), CommandKind::Key) => Value::Key(s),
            (Literal::Str(s), _) => Value::Text(s),
        }
    }
}

impl TryFrom<SchemaSource> for SchemaDef {
    type Error = String;

    fn try_from(source: SchemaSource) -> Result<Self, Self::Error> {
        let root = NodeId::new(&source.root);
        let commands: HashMap<NodeId, Command> = source
            .commands
            .into_iter()
            .map(|(id, c)| {
                let mut command = Command::new(c.kind);
                if let Some(bits) = c.bits {
                    command.bits = bits;
                }
                if let Some(default) = c.default {
                    command.default = default.into_value(c.kind);
                }
                (NodeId::new(&id), command)
            })
            .collect();
        let nodes: HashMap<NodeId, NodeDef> = source
            .nodes
            .into_iter()
            .map(|(id, n)| {
                // A field without an explicit command uses the command of the same name.
                let command = match n.kind {
                    NodeKind::Field => Some(NodeId::new(n.command.as_deref().unwrap_or(&id))),
                    _ => None,
                };
                let def = NodeDef {
                    kind: n.kind,
                    children: n.children.iter().map(|c| NodeId::new(c)).collect(),
                    command,
                };
                (NodeId::new(&id), def)
            })
            .collect();
        match nodes.get(&root) {
            Some(def) if def.kind == NodeKind::Group => Ok(Self {
                root,
                nodes,
                commands,
            }),
            Some(_) => Err(format!("root node '{}' must be a group", root)),
            None => Err(format!("root node '{}' is not defined", root)),
        }
    }
}

/// Build a fresh module tree from a schema.
///
/// Every group and field gets instance 0 (fields hold their default value),
/// every pattern block gets instance 0 with `block_length` empty rows, and
/// every order list gets a single entry `(block_length, 0, 0, ...)`.
pub fn generate_tree(schema: &dyn Schema, block_length: usize) -> Node {
    let root = schema.root_id().clone();
    let group = generate_group(schema, &root, block_length);
    Node::with_instances(root, vec![Instance::group(0, group)])
}

fn generate_group(schema: &dyn Schema, group: &NodeId, block_length: usize) -> Group {
    let order = order_node_id(group);
    let children = schema
        .child_ids(group)
        .iter()
        .filter_map(|child| {
            let payload = match schema.node_kind(child)? {
                NodeKind::Field => Payload::Field(schema.default_value(child)),
                NodeKind::Block if *child == order => {
                    let width = schema.child_ids(child).len();
                    let mut entry = vec![Value::Int(0); width];
                    if let Some(repeat) = entry.first_mut() {
                        *repeat = Value::Int(block_length as i64);
                    }
                    Payload::Block(Block::from_rows(width, vec![entry]))
                }
                NodeKind::Block => Payload::Block(Block::new(schema.child_ids(child).len(), block_length)),
                NodeKind::Group => Payload::Group(generate_group(schema, child, block_length)),
            };
            Some(Node::with_instances(
                child.clone(),
                vec![Instance::new(InstanceId::default(), payload)],
            ))
        })
        .collect();
    Group::from_children(children)
}
