pub mod module;
pub mod persistence;
pub mod undo;

pub use module::{ConfigError, Configuration, LoadedConfig, Module, ModuleHeader, FORMAT_VERSION};
pub use undo::{CoalesceKey, UndoHistory};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::journal::EditJournal;
use persistence::ModuleError;

/// One open module and everything that edits it.
pub struct Session {
    pub module: Module,
    pub undo_history: UndoHistory,
    /// Unsaved changes exist.
    pub dirty: bool,
    /// Where the module was loaded from or last saved to.
    pub path: Option<PathBuf>,
    pub journal: Option<EditJournal>,
}

impl Session {
    pub fn new(module: Module, undo_depth: usize) -> Self {
        Self {
            module,
            undo_history: UndoHistory::new(undo_depth),
            dirty: false,
            path: None,
            journal: None,
        }
    }

    pub fn open(path: &Path, config: Arc<dyn Configuration>, undo_depth: usize) -> Result<Self, ModuleError> {
        let module = persistence::load_module(path, config)?;
        let mut session = Self::new(module, undo_depth);
        session.path = Some(path.to_path_buf());
        Ok(session)
    }

    /// Append every edit from now on to `journal`.
    pub fn attach_journal(&mut self, journal: EditJournal) {
        self.journal = Some(journal);
    }

    pub fn save(&mut self) -> Result<(), ModuleError> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| ModuleError::Format("session has no file path".into()))?;
        self.save_as(&path)
    }

    pub fn save_as(&mut self, path: &Path) -> Result<(), ModuleError> {
        persistence::save_module(path, &self.module)?;
        self.path = Some(path.to_path_buf());
        self.dirty = false;
        Ok(())
    }
}
