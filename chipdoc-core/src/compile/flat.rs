//! The `flat` target: a straight depth-first dump of the module tree.
//!
//! Every field and block cell becomes one little-endian value as wide as its
//! command's `bits` (rounded up to whole bytes). Text is written as UTF-8
//! followed by a zero byte. Empty cells take the command default. Each block
//! instance gets a `NODE_id` symbol holding its address, and each instance
//! is preceded by a comment naming it.

use chipdoc_types::{Command, CommandKind, Instance, NodeId, Payload, Schema, Value};

use super::{CompileContext, CompileError, Compiler, OutputNode};

pub struct FlatCompiler;

impl Compiler for FlatCompiler {
    fn name(&self) -> &str {
        "flat"
    }

    fn compile(&self, ctx: &CompileContext<'_>) -> Result<Vec<OutputNode>, CompileError> {
        let mut out = Emitter {
            address: ctx.origin as i64,
            nodes: Vec::new(),
        };
        for (name, value) in ctx.symbols {
            // Non-numeric bindings are not addressable in this target.
            if let Some(value) = value.as_int() {
                out.nodes.push(OutputNode::Symbol {
                    name: name.clone(),
                    value,
                });
            }
        }
        let schema = ctx.module.schema();
        let tree = &ctx.module.tree;
        for instance in tree.instances() {
            out.instance(schema, &tree.id, instance)?;
        }
        Ok(out.nodes)
    }
}

struct Emitter {
    address: i64,
    nodes: Vec<OutputNode>,
}

impl Emitter {
    fn bytes(&mut self, bytes: Vec<u8>) {
        if bytes.is_empty() {
            return;
        }
        self.address += bytes.len() as i64;
        self.nodes.push(OutputNode::Bytes(bytes));
    }

    fn instance(&mut self, schema: &dyn Schema, id: &NodeId, instance: &Instance) -> Result<(), CompileError> {
        let label = match &instance.name {
            Some(name) => format!("{} {} \"{}\"", id, instance.id, name),
            None => format!("{} {}", id, instance.id),
        };
        self.nodes.push(OutputNode::Comment(label));

        match &instance.payload {
            Payload::Field(value) => {
                let bytes = encode(schema, id, value)?;
                self.bytes(bytes);
            }
            Payload::Block(block) => {
                self.nodes.push(OutputNode::Symbol {
                    name: format!("{}_{}", id, instance.id),
                    value: self.address,
                });
                let columns = schema.child_ids(id);
                for row in block.rows() {
                    let mut bytes = Vec::new();
                    for (field, value) in columns.iter().zip(row) {
                        bytes.extend(encode(schema, field, value)?);
                    }
                    self.bytes(bytes);
                }
            }
            Payload::Group(group) => {
                for child in group.children() {
                    for instance in child.instances() {
                        self.instance(schema, &child.id, instance)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn encode(schema: &dyn Schema, field: &NodeId, value: &Value) -> Result<Vec<u8>, CompileError> {
    let command = schema
        .source_command(field)
        .ok_or_else(|| CompileError::new(format!("{} has no source command", field)))?;
    let value = if value.is_empty() { &command.default } else { value };

    if command.kind == CommandKind::Text {
        let mut bytes = match value {
            Value::Empty => Vec::new(),
            Value::Text(s) | Value::Key(s) => s.as_bytes().to_vec(),
            other => other.to_string().into_bytes(),
        };
        bytes.push(0);
        return Ok(bytes);
    }

    let n = numeric(command, field, value)?;
    let width = command.byte_width().min(8);
    Ok(n.to_le_bytes()[..width].to_vec())
}

fn numeric(command: &Command, field: &NodeId, value: &Value) -> Result<i64, CompileError> {
    match value {
        Value::Empty => Ok(0),
        Value::Int(n) => Ok(*n),
        Value::Bool(b) => Ok(*b as i64),
        Value::Key(k) if command.kind == CommandKind::Key => note_number(k)
            .ok_or_else(|| CompileError::new(format!("{}: '{}' is not a note name", field, k))),
        other => Err(CompileError::new(format!(
            "{}: cannot encode {} as {:?}",
            field, other, command.kind
        ))),
    }
}

/// `c4` -> 48: twelve semitones per octave, starting at c0.
/// Accepts `#` or `s` for sharp and `b` for flat after the letter.
pub fn note_number(name: &str) -> Option<i64> {
    let mut chars = name.chars();
    let base = match chars.next()?.to_ascii_lowercase() {
        'c' => 0,
        'd' => 2,
        'e' => 4,
        'f' => 5,
        'g' => 7,
        'a' => 9,
        'b' => 11,
        _ => return None,
    };
    let rest = chars.as_str();
    let (shift, octave) = match rest.chars().next()? {
        '#' | 's' => (1, &rest[1..]),
        'b' => (-1, &rest[1..]),
        _ => (0, rest),
    };
    let octave: i64 = octave.parse().ok()?;
    if !(0..=9).contains(&octave) {
        return None;
    }
    Some(octave * 12 + base + shift)
}
