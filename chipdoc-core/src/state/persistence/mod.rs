//! The module text format.
//!
//! ```text
//! (chipdoc-module version: 1 config: "flat-demo" config-version: 1
//!   (BPM 140)
//!   (PATTERNS
//!     (NOTES id: 1 name: "intro"
//!       (NOTE c4 VOL 8)
//!       3
//!       (NOTE e4))))
//! ```
//!
//! Node forms are `(ID [id: N] [name: "..."] payload...)`. A field payload
//! is one literal, or nothing when empty. A block payload lists its rows as
//! `(FIELD value ...)` forms with runs of fully empty rows written as a
//! count. A group payload is its child node forms.
//!
//! Keys are written bare unless they would read back as something else
//! (`12`, `true`, `_`, text with spaces or brackets); those are written
//! `#"..."` with string escapes.

pub mod load;
pub(crate) mod reader;
pub mod save;

use std::path::Path;
use std::sync::Arc;

use super::module::{Configuration, Module, ModuleHeader};

#[derive(Debug)]
pub enum ModuleError {
    Io(std::io::Error),
    Parse { line: usize, message: String },
    /// Well-formed text that does not describe a module for this configuration.
    Format(String),
}

impl From<std::io::Error> for ModuleError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl std::fmt::Display for ModuleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Parse { line, message } => write!(f, "line {}: {}", line, message),
            Self::Format(message) => write!(f, "invalid module: {}", message),
        }
    }
}

impl std::error::Error for ModuleError {}

/// Read only the header, e.g. to find which configuration a file needs.
pub fn read_header(text: &str) -> Result<ModuleHeader, ModuleError> {
    load::read_header(text)
}

pub fn read_module(text: &str, config: Arc<dyn Configuration>) -> Result<Module, ModuleError> {
    load::read(text, config)
}

pub fn write_module(module: &Module) -> String {
    save::write(module)
}

pub fn load_module(path: &Path, config: Arc<dyn Configuration>) -> Result<Module, ModuleError> {
    let text = std::fs::read_to_string(path)?;
    let module = read_module(&text, config)?;
    log::info!(target: "module", "loaded {}", path.display());
    Ok(module)
}

/// Write through a sibling temporary file and rename it into place, so an
/// interrupted save leaves the previous file intact.
pub fn save_module(path: &Path, module: &Module) -> Result<(), ModuleError> {
    let text = write_module(module);
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, text)?;
    std::fs::rename(&tmp, path)?;
    log::info!(target: "module", "saved {}", path.display());
    Ok(())
}
