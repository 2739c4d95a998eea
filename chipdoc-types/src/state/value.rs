use serde::{Deserialize, Serialize};

/// Scalar held by a field instance or by one cell of a block row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    /// The "unset" marker.
    #[default]
    Empty,
    Int(i64),
    Bool(bool),
    /// Bare symbolic literal, e.g. a note name like `c4`.
    Key(String),
    /// Quoted string.
    Text(String),
}

impl Value {
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn key(name: &str) -> Self {
        Value::Key(name.to_string())
    }

    pub fn text(s: &str) -> Self {
        Value::Text(s.to_string())
    }

    /// Read a bare literal: `_`, `true`/`false`, decimal or `$hex` integers,
    /// anything else is a key.
    pub fn parse_bare(text: &str) -> Self {
        match text {
            "_" => return Value::Empty,
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            _ => {}
        }
        let int = match text.strip_prefix('$') {
            Some(hex) => i64::from_str_radix(hex, 16).ok(),
            None => text.parse::<i64>().ok(),
        };
        match int {
            Some(n) => Value::Int(n),
            None => Value::Key(text.to_string()),
        }
    }

    /// Whether `key` can be written as a bare atom and read back as the same key.
    /// Other keys are written in the quoted `#"..."` form.
    pub fn is_bare_key(key: &str) -> bool {
        !key.is_empty()
            && !key.ends_with(':')
            && !key.chars().any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';'))
            && matches!(Value::parse_bare(key), Value::Key(_))
    }
}

fn write_quoted(f: &mut std::fmt::Formatter<'_>, s: &str) -> std::fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            c => write!(f, "{}", c)?,
        }
    }
    f.write_str("\"")
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Literal form used by the module text format. `Empty` renders as `_`,
/// keys that would not read back as themselves render as `#"..."`.
impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Empty => f.write_str("_"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Key(k) if Value::is_bare_key(k) => f.write_str(k),
            Value::Key(k) => {
                f.write_str("#")?;
                write_quoted(f, k)
            }
            Value::Text(s) => write_quoted(f, s),
        }
    }
}
