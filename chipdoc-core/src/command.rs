//! Textual edit commands, as typed on the command line.
//!
//! ```text
//! set    GLOBAL/0/PATTERNS/0/NOTES/0 NOTE 0 c4 4 e4
//! insert GLOBAL/0/PATTERNS/0/NOTES/0 VOL 2 15
//! remove GLOBAL/0/PATTERNS/0/NOTES/0 NOTE 3
//! set    GLOBAL/0 TITLE 0 "intro theme"
//! ```
//!
//! `set` and `insert` take `id value` pairs, `remove` takes ids. Values use
//! the module file literal syntax. Several commands separated by `;` or
//! newlines become one compound edit.

use std::str::FromStr;

use chipdoc_types::{EditAction, EditError, EditKind, Instance, InstanceId, NodeId, NodePath, Payload};

use crate::state::persistence::reader::{self, Sexp};

/// Parse one or more commands into a single edit.
pub fn parse_commands(text: &str) -> Result<EditAction, EditError> {
    let mut actions = split_commands(text)
        .iter()
        .filter(|c| !c.trim().is_empty())
        .map(|c| parse_command(c))
        .collect::<Result<Vec<_>, _>>()?;
    match actions.len() {
        0 => Err(EditError::InvalidValue("no edit command given".into())),
        1 => Ok(actions.remove(0)),
        _ => Ok(EditAction::Compound(actions)),
    }
}

/// Split on `;` and newlines that are not inside a string.
fn split_commands(text: &str) -> Vec<String> {
    let mut commands = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if in_string {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            ';' | '\n' => commands.push(std::mem::take(&mut current)),
            '"' => {
                in_string = true;
                current.push(c);
            }
            _ => current.push(c),
        }
    }
    commands.push(current);
    commands
}

fn invalid(command: &str, message: &str) -> EditError {
    EditError::InvalidValue(format!("{}: '{}'", message, command.trim()))
}

fn parse_command(command: &str) -> Result<EditAction, EditError> {
    let mut forms = reader::parse(&format!("({})", command))
        .map_err(|e| EditError::InvalidValue(e.to_string()))?;
    let items = match forms.pop() {
        Some(Sexp::List { items, .. }) if forms.is_empty() => items,
        _ => return Err(invalid(command, "unbalanced command")),
    };
    let words: Vec<&str> = items
        .iter()
        .take(3)
        .map(|item| match item {
            Sexp::Atom { text, .. } => Ok(text.as_str()),
            _ => Err(invalid(command, "expected VERB PATH NODE")),
        })
        .collect::<Result<_, _>>()?;
    let [verb, path, node] = words.as_slice() else {
        return Err(invalid(command, "expected VERB PATH NODE"));
    };

    let kind = EditKind::from_str(verb)?;
    let parent = NodePath::from_str(path).map_err(|e| EditError::InvalidValue(e.0))?;
    let node = NodeId::new(node);
    let args = &items[3..];

    match kind {
        EditKind::Set | EditKind::Insert => {
            if args.is_empty() || args.len() % 2 != 0 {
                return Err(invalid(command, "expected id value pairs"));
            }
            let instances = args
                .chunks(2)
                .map(|pair| {
                    let id = instance_id(&pair[0]).ok_or_else(|| invalid(command, "bad instance id"))?;
                    let value = pair[1]
                        .literal()
                        .ok_or_else(|| invalid(command, "value must be a literal"))?;
                    Ok(Instance::new(id, Payload::Field(value)))
                })
                .collect::<Result<Vec<_>, EditError>>()?;
            Ok(if kind == EditKind::Set {
                EditAction::Set { parent, node, instances }
            } else {
                EditAction::Insert { parent, node, instances }
            })
        }
        EditKind::Remove => {
            if args.is_empty() {
                return Err(invalid(command, "expected instance ids"));
            }
            let ids = args
                .iter()
                .map(|a| instance_id(a).ok_or_else(|| invalid(command, "bad instance id")))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(EditAction::Remove { parent, node, ids })
        }
        EditKind::Compound => Err(invalid(command, "compound is written as several commands")),
    }
}

fn instance_id(item: &Sexp) -> Option<InstanceId> {
    match item {
        Sexp::Atom { text, .. } => text.parse::<u32>().ok().map(InstanceId::new),
        _ => None,
    }
}
