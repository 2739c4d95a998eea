use std::sync::Arc;

use chipdoc_types::{Block, Group, Instance, InstanceId, Node, NodeId, NodeKind, Payload, Row, Schema, Value};

use super::reader::{self, Sexp};
use super::ModuleError;
use crate::state::module::{Configuration, Module, ModuleHeader, FORMAT_VERSION};

const MODULE_TAG: &str = "chipdoc-module";

fn parse_error(sexp: &Sexp, message: impl Into<String>) -> ModuleError {
    ModuleError::Parse {
        line: sexp.line(),
        message: message.into(),
    }
}

/// The single top-level form and its items.
fn module_form(text: &str) -> Result<Vec<Sexp>, ModuleError> {
    let mut forms = reader::parse(text)?;
    if forms.len() != 1 {
        return Err(ModuleError::Format(format!(
            "expected one module form, found {}",
            forms.len()
        )));
    }
    match forms.remove(0) {
        Sexp::List { items, .. } => Ok(items),
        other => Err(parse_error(&other, "expected a module form")),
    }
}

/// Split the header keywords off the module form. Returns the header and
/// the index of the first child form.
fn header(items: &[Sexp]) -> Result<(ModuleHeader, usize), ModuleError> {
    match items.first() {
        Some(Sexp::Atom { text, .. }) if text == MODULE_TAG => {}
        Some(other) => return Err(parse_error(other, format!("expected '{}'", MODULE_TAG))),
        None => return Err(ModuleError::Format("empty module form".into())),
    }

    let mut format_version = None;
    let mut config_id = None;
    let mut config_version = None;
    let mut i = 1;
    while let Some(key) = items.get(i).and_then(Sexp::keyword) {
        let value = items
            .get(i + 1)
            .ok_or_else(|| parse_error(&items[i], format!("missing value for {}:", key)))?;
        match (key, value.literal()) {
            ("version", Some(Value::Int(n))) => format_version = u32::try_from(n).ok(),
            ("config", Some(Value::Text(s))) => config_id = Some(s),
            ("config-version", Some(Value::Int(n))) => config_version = u32::try_from(n).ok(),
            _ => return Err(parse_error(value, format!("bad header entry {}:", key))),
        }
        i += 2;
    }

    let header = ModuleHeader {
        format_version: format_version.ok_or_else(|| ModuleError::Format("missing version".into()))?,
        config_id: config_id.ok_or_else(|| ModuleError::Format("missing config".into()))?,
        config_version: config_version.unwrap_or(0),
    };
    Ok((header, i))
}

pub fn read_header(text: &str) -> Result<ModuleHeader, ModuleError> {
    let items = module_form(text)?;
    header(&items).map(|(h, _)| h)
}

pub fn read(text: &str, config: Arc<dyn Configuration>) -> Result<Module, ModuleError> {
    let items = module_form(text)?;
    let (header, body) = header(&items)?;

    if header.format_version > FORMAT_VERSION {
        return Err(ModuleError::Format(format!(
            "format version {} is newer than supported ({})",
            header.format_version, FORMAT_VERSION
        )));
    }
    if header.config_id != config.id() {
        return Err(ModuleError::Format(format!(
            "module is for configuration '{}', not '{}'",
            header.config_id,
            config.id()
        )));
    }
    if header.config_version != config.version() {
        log::warn!(
            target: "module",
            "module written for {} v{}, loading with v{}",
            header.config_id,
            header.config_version,
            config.version()
        );
    }

    let schema = config.schema();
    let root = schema.root_id().clone();
    let group = read_group(schema, &root, &items[body..])?;
    let tree = Node::with_instances(root, vec![Instance::group(0, group)]);
    Ok(Module {
        header,
        config,
        tree,
    })
}

fn read_group(schema: &dyn Schema, group: &NodeId, forms: &[Sexp]) -> Result<Group, ModuleError> {
    let order = schema.child_ids(group);
    let mut out = Group::new();
    for form in forms {
        let (node, instance) = read_node(schema, group, form)?;
        if out.instance(&node, instance.id).is_some() {
            return Err(parse_error(form, format!("duplicate instance {} of {}", instance.id, node)));
        }
        out.upsert(&node, instance, order);
    }
    Ok(out)
}

fn read_node(schema: &dyn Schema, parent: &NodeId, form: &Sexp) -> Result<(NodeId, Instance), ModuleError> {
    let Sexp::List { items, .. } = form else {
        return Err(parse_error(form, format!("expected a child form of {}", parent)));
    };
    let id = match items.first() {
        Some(Sexp::Atom { text, .. }) => NodeId::new(text),
        _ => return Err(parse_error(form, "node form must start with a node id")),
    };
    if !schema.child_ids(parent).contains(&id) {
        return Err(parse_error(form, format!("{} is not a child of {}", id, parent)));
    }

    let mut instance_id = InstanceId::default();
    let mut name = None;
    let mut i = 1;
    while let Some(key) = items.get(i).and_then(Sexp::keyword) {
        let value = items
            .get(i + 1)
            .ok_or_else(|| parse_error(&items[i], format!("missing value for {}:", key)))?;
        match (key, value.literal()) {
            ("id", Some(Value::Int(n))) => {
                let n = u32::try_from(n).map_err(|_| parse_error(value, "instance id out of range"))?;
                instance_id = InstanceId::new(n);
            }
            ("name", Some(Value::Text(s))) => name = Some(s),
            _ => return Err(parse_error(value, format!("bad option {}:", key))),
        }
        i += 2;
    }

    let rest = &items[i..];
    let payload = match schema.node_kind(&id) {
        Some(NodeKind::Field) => Payload::Field(read_field(rest)?),
        Some(NodeKind::Block) => Payload::Block(read_block(schema, &id, rest)?),
        Some(NodeKind::Group) => Payload::Group(read_group(schema, &id, rest)?),
        None => return Err(parse_error(form, format!("{} has no kind", id))),
    };
    let mut instance = Instance::new(instance_id, payload);
    instance.name = name;
    Ok((id, instance))
}

fn read_field(rest: &[Sexp]) -> Result<Value, ModuleError> {
    match rest {
        [] => Ok(Value::Empty),
        [single] => single
            .literal()
            .ok_or_else(|| parse_error(single, "field value must be a literal")),
        [_, extra, ..] => Err(parse_error(extra, "field takes a single value")),
    }
}

fn read_block(schema: &dyn Schema, block: &NodeId, rest: &[Sexp]) -> Result<Block, ModuleError> {
    let columns = schema.child_ids(block);
    let width = columns.len();
    let mut rows: Vec<Row> = Vec::new();
    for item in rest {
        match item {
            Sexp::Atom { .. } => match item.literal() {
                Some(Value::Int(n)) if n >= 0 => {
                    rows.extend(std::iter::repeat(vec![Value::Empty; width]).take(n as usize))
                }
                _ => return Err(parse_error(item, "expected a row form or an empty-row count")),
            },
            Sexp::List { items, .. } => {
                let mut row = vec![Value::Empty; width];
                for pair in items.chunks(2) {
                    let [field, value] = pair else {
                        return Err(parse_error(item, "row form needs FIELD value pairs"));
                    };
                    let col = match field {
                        Sexp::Atom { text, .. } => columns.iter().position(|c| c.as_str() == text),
                        _ => None,
                    }
                    .ok_or_else(|| parse_error(field, format!("not a column of {}", block)))?;
                    row[col] = value
                        .literal()
                        .ok_or_else(|| parse_error(value, "cell value must be a literal"))?;
                }
                rows.push(row);
            }
            Sexp::Str { .. } | Sexp::QuotedKey { .. } => {
                return Err(parse_error(item, "unexpected string in block"))
            }
        }
    }
    Ok(Block::from_rows(width, rows))
}
