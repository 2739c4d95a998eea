use std::fmt::Write;

use chipdoc_types::{Block, Instance, NodeId, Payload, Schema, Value};

use crate::state::module::Module;

const INDENT: &str = "  ";

pub fn write(module: &Module) -> String {
    let header = &module.header;
    let mut out = String::new();
    let _ = write!(
        out,
        "(chipdoc-module version: {} config: {} config-version: {}",
        header.format_version,
        Value::Text(header.config_id.clone()),
        header.config_version
    );
    let schema = module.schema();
    for root in module.tree.instances() {
        if let Payload::Group(group) = &root.payload {
            for child in group.children() {
                for instance in child.instances() {
                    write_node(&mut out, schema, &child.id, instance, 1);
                }
            }
        }
    }
    out.push_str(")\n");
    out
}

fn newline(out: &mut String, depth: usize) {
    out.push('\n');
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn write_node(out: &mut String, schema: &dyn Schema, id: &NodeId, instance: &Instance, depth: usize) {
    newline(out, depth);
    let _ = write!(out, "({}", id);
    if instance.id.get() != 0 {
        let _ = write!(out, " id: {}", instance.id);
    }
    if let Some(name) = &instance.name {
        let _ = write!(out, " name: {}", Value::Text(name.clone()));
    }
    match &instance.payload {
        Payload::Field(value) => {
            if !value.is_empty() {
                let _ = write!(out, " {}", value);
            }
        }
        Payload::Block(block) => {
            for item in block_items(schema, id, block) {
                newline(out, depth + 1);
                out.push_str(&item);
            }
        }
        Payload::Group(group) => {
            for child in group.children() {
                for child_instance in child.instances() {
                    write_node(out, schema, &child.id, child_instance, depth + 1);
                }
            }
        }
    }
    out.push(')');
}

/// Row forms for the non-empty rows, with each run of empty rows
/// (including a trailing one) collapsed to its length.
fn block_items(schema: &dyn Schema, id: &NodeId, block: &Block) -> Vec<String> {
    let columns = schema.child_ids(id);
    let mut items = Vec::new();
    let mut run = 0usize;
    for row in block.rows() {
        if row.iter().all(Value::is_empty) {
            run += 1;
            continue;
        }
        if run > 0 {
            items.push(run.to_string());
            run = 0;
        }
        let cells: Vec<String> = columns
            .iter()
            .zip(row)
            .filter(|(_, value)| !value.is_empty())
            .map(|(field, value)| format!("{} {}", field, value))
            .collect();
        items.push(format!("({})", cells.join(" ")));
    }
    if run > 0 {
        items.push(run.to_string());
    }
    items
}
