//! Compiler invocation.
//!
//! A target format supplies a [`Compiler`]; the configuration of a module
//! names which one at load time. Everything here drives that compiler and
//! turns its output nodes into bytes, an assembly listing, or a file.

mod flat;

pub use flat::FlatCompiler;

use std::collections::BTreeMap;
use std::path::Path;

use chipdoc_types::Value;

use crate::state::Module;

/// Extra bindings handed to a compiler alongside the module.
pub type Symbols = BTreeMap<String, Value>;

pub struct CompileContext<'a> {
    pub module: &'a Module,
    /// Address the first emitted byte is loaded at.
    pub origin: u32,
    pub symbols: &'a Symbols,
}

/// One unit of compiler output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputNode {
    Bytes(Vec<u8>),
    Symbol { name: String, value: i64 },
    Comment(String),
}

/// Failure reported by a compiler. The message is passed through as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError(pub String);

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for CompileError {}

#[derive(Debug)]
pub enum ExportError {
    Compile(CompileError),
    Io(std::io::Error),
}

impl From<CompileError> for ExportError {
    fn from(e: CompileError) -> Self {
        Self::Compile(e)
    }
}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compile(e) => write!(f, "compile error: {}", e),
            Self::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for ExportError {}

/// Code generator for one target format.
pub trait Compiler: Send + Sync {
    fn name(&self) -> &str;

    fn compile(&self, ctx: &CompileContext<'_>) -> Result<Vec<OutputNode>, CompileError>;
}

/// Compilers shipped with chipdoc, looked up by the name a configuration gives.
pub fn builtin_compiler(name: &str) -> Option<Box<dyn Compiler>> {
    match name {
        "flat" => Some(Box::new(FlatCompiler)),
        _ => None,
    }
}

/// Run the module's compiler.
pub fn compile(module: &Module, origin: u32, symbols: &Symbols) -> Result<Vec<OutputNode>, CompileError> {
    let compiler = module.config.compiler().ok_or_else(|| {
        CompileError::new(format!("configuration {} has no compiler", module.config.id()))
    })?;
    log::debug!(target: "compile", "compiling with {} at origin ${:04x}", compiler.name(), origin);
    let ctx = CompileContext {
        module,
        origin,
        symbols,
    };
    match compiler.compile(&ctx) {
        Ok(nodes) => {
            log::debug!(target: "compile", "{} output nodes", nodes.len());
            Ok(nodes)
        }
        Err(e) => {
            log::warn!(target: "compile", "{} failed: {}", compiler.name(), e);
            Err(e)
        }
    }
}

/// Concatenate the byte-emitting nodes in order, dropping symbols and comments.
pub fn flatten(nodes: &[OutputNode]) -> Vec<u8> {
    nodes
        .iter()
        .filter_map(|n| match n {
            OutputNode::Bytes(b) => Some(b.as_slice()),
            _ => None,
        })
        .flatten()
        .copied()
        .collect()
}

pub fn compile_to_bytes(module: &Module, origin: u32, symbols: &Symbols) -> Result<Vec<u8>, CompileError> {
    compile(module, origin, symbols).map(|nodes| flatten(&nodes))
}

/// Render output nodes as an assembly listing: `org`, `db` lines of at
/// most 16 bytes, `name equ value` and `; comment`.
pub fn render_asm(nodes: &[OutputNode], origin: u32) -> String {
    let mut out = format!("    org ${:04x}\n", origin);
    for node in nodes {
        match node {
            OutputNode::Bytes(bytes) => {
                for chunk in bytes.chunks(16) {
                    let hex: Vec<String> = chunk.iter().map(|b| format!("${:02x}", b)).collect();
                    out.push_str(&format!("    db {}\n", hex.join(",")));
                }
            }
            OutputNode::Symbol { name, value } if *value >= 0 => {
                out.push_str(&format!("{} equ ${:04x}\n", name, value))
            }
            OutputNode::Symbol { name, value } => out.push_str(&format!("{} equ {}\n", name, value)),
            OutputNode::Comment(text) => out.push_str(&format!("; {}\n", text)),
        }
    }
    out
}

pub fn compile_to_asm(module: &Module, origin: u32, symbols: &Symbols) -> Result<String, CompileError> {
    compile(module, origin, symbols).map(|nodes| render_asm(&nodes, origin))
}

/// Write the flat byte sequence to `path`, with no header or trailer.
/// Returns the number of bytes written.
pub fn export_bin(module: &Module, origin: u32, symbols: &Symbols, path: &Path) -> Result<usize, ExportError> {
    let bytes = compile_to_bytes(module, origin, symbols)?;
    std::fs::write(path, &bytes)?;
    log::info!(target: "compile", "wrote {} bytes to {}", bytes.len(), path.display());
    Ok(bytes.len())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::state::LoadedConfig;
    use chipdoc_types::SchemaDef;

    /// Emits a fixed node list, and the first injected symbol as a comment.
    struct Scripted(Vec<OutputNode>);

    impl Compiler for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn compile(&self, ctx: &CompileContext<'_>) -> Result<Vec<OutputNode>, CompileError> {
            let mut out = self.0.clone();
            if let Some((name, _)) = ctx.symbols.iter().next() {
                out.push(OutputNode::Comment(name.clone()));
            }
            Ok(out)
        }
    }

    struct Failing;

    impl Compiler for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn compile(&self, _ctx: &CompileContext<'_>) -> Result<Vec<OutputNode>, CompileError> {
            Err(CompileError::new("operand out of range at PATTERNS/0"))
        }
    }

    fn module_with(compiler: Option<Box<dyn Compiler>>) -> Module {
        let schema = SchemaDef::new("GLOBAL").group("GLOBAL", &[]);
        let config = LoadedConfig::new("test", 1, schema, compiler);
        Module::new(Arc::new(config), 4)
    }

    fn scripted() -> Module {
        module_with(Some(Box::new(Scripted(vec![
            OutputNode::Bytes(vec![0x01]),
            OutputNode::Symbol {
                name: "foo".into(),
                value: 0x8001,
            },
            OutputNode::Bytes(vec![0x02]),
        ]))))
    }

    #[test]
    fn flat_bytes_skip_symbols() {
        let bytes = compile_to_bytes(&scripted(), 0x8000, &Symbols::new()).unwrap();
        assert_eq!(bytes, vec![0x01, 0x02]);
    }

    #[test]
    fn injected_symbols_reach_the_compiler() {
        let mut symbols = Symbols::new();
        symbols.insert("module".into(), Value::text("song"));
        let nodes = compile(&scripted(), 0, &symbols).unwrap();
        assert_eq!(nodes.last(), Some(&OutputNode::Comment("module".into())));
    }

    #[test]
    fn asm_listing() {
        let asm = compile_to_asm(&scripted(), 0x8000, &Symbols::new()).unwrap();
        assert_eq!(asm, "    org $8000\n    db $01\nfoo equ $8001\n    db $02\n");
    }

    #[test]
    fn compiler_errors_pass_through() {
        let module = module_with(Some(Box::new(Failing)));
        let err = compile_to_bytes(&module, 0, &Symbols::new()).unwrap_err();
        assert_eq!(err.to_string(), "operand out of range at PATTERNS/0");
    }

    #[test]
    fn missing_compiler_is_an_error() {
        assert!(compile_to_bytes(&module_with(None), 0, &Symbols::new()).is_err());
    }

    #[test]
    fn export_writes_raw_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let written = export_bin(&scripted(), 0x8000, &Symbols::new(), &path).unwrap();
        assert_eq!(written, 2);
        assert_eq!(std::fs::read(&path).unwrap(), vec![0x01, 0x02]);
    }

    #[test]
    fn export_reports_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.bin");
        assert!(matches!(
            export_bin(&scripted(), 0, &Symbols::new(), &path),
            Err(ExportError::Io(_))
        ));
    }
}
