//! Append-only JSONL journal of applied edits, for debugging and replay.
//!
//! The first line of every session is a header; each following line is one
//! applied edit with the inverse that was recorded for it. The file is
//! tailable via `tail -f`.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;

use chipdoc_types::{EditAction, EditError};

use crate::state::Module;

pub struct EditJournal {
    writer: BufWriter<File>,
    session_start: Instant,
}

#[derive(Serialize)]
struct SessionHeader<'a> {
    event: &'static str,
    epoch_ms: u128,
    pid: u32,
    config: &'a str,
}

#[derive(Serialize)]
struct JournalEntry<'a> {
    t_ms: u128,
    action: &'a EditAction,
    undo: &'a EditAction,
}

impl EditJournal {
    /// Open `path` for appending and write a session header.
    pub fn open(path: &Path, config_id: &str) -> std::io::Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);
        let header = SessionHeader {
            event: "session_start",
            epoch_ms: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis(),
            pid: std::process::id(),
            config: config_id,
        };
        writeln!(writer, "{}", serde_json::to_string(&header)?)?;
        writer.flush()?;
        Ok(Self {
            writer,
            session_start: Instant::now(),
        })
    }

    /// Journal location for a module file: `song.chip` -> `song.edits.jsonl`.
    pub fn path_for(module_path: &Path) -> PathBuf {
        module_path.with_extension("edits.jsonl")
    }

    pub fn record(&mut self, action: &EditAction, undo: &EditAction) -> std::io::Result<()> {
        let entry = JournalEntry {
            t_ms: self.session_start.elapsed().as_millis(),
            action,
            undo,
        };
        writeln!(self.writer, "{}", serde_json::to_string(&entry)?)?;
        self.writer.flush()
    }
}

#[derive(Debug)]
pub enum ReplayError {
    Io(std::io::Error),
    Json(serde_json::Error),
    /// A journaled edit no longer applies; `line` is 1-based.
    Edit { line: usize, error: EditError },
}

impl From<std::io::Error> for ReplayError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for ReplayError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl std::fmt::Display for ReplayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Json(e) => write!(f, "JSON error: {}", e),
            Self::Edit { line, error } => write!(f, "line {}: {}", line, error),
        }
    }
}

impl std::error::Error for ReplayError {}

/// Re-apply every journaled edit to `module`, in order. Returns the number
/// of edits applied.
///
/// Blank lines, session headers and lines that are not JSON are skipped. A
/// line that is JSON with an `action` that does not decode is an error.
pub fn replay_edit_log(path: &Path, module: &mut Module) -> Result<usize, ReplayError> {
    use chipdoc_types::reduce;

    let config = std::sync::Arc::clone(&module.config);
    let file = File::open(path)?;
    let mut applied = 0;
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut entry: serde_json::Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(_) => continue,
        };
        let Some(action) = entry.get_mut("action").map(serde_json::Value::take) else {
            continue;
        };
        let action: EditAction = serde_json::from_value(action)?;
        reduce::apply(&action, &mut module.tree, config.schema()).map_err(|error| ReplayError::Edit {
            line: index + 1,
            error,
        })?;
        applied += 1;
    }
    log::debug!(target: "edit", "replayed {} edits from {}", applied, path.display());
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::state::LoadedConfig;
    use chipdoc_types::{reduce, NodeId, NodePath, Value};

    fn module() -> Module {
        Module::new(Arc::new(LoadedConfig::builtin("flat-demo").unwrap()), 4)
    }

    fn notes() -> NodePath {
        "GLOBAL/0/PATTERNS/0/NOTES/0".parse().unwrap()
    }

    #[test]
    fn replay_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.jsonl");
        File::create(&path).unwrap();

        let mut m = module();
        assert_eq!(replay_edit_log(&path, &mut m).unwrap(), 0);
        assert_eq!(m.tree, module().tree);
    }

    #[test]
    fn recorded_edits_replay_to_the_same_tree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.edits.jsonl");
        let mut live = module();
        {
            let mut journal = EditJournal::open(&path, "flat-demo").unwrap();
            let config = Arc::clone(&live.config);
            for (row, key) in [(0, "c4"), (2, "g4"), (9, "c5")] {
                let action = EditAction::set_cells(&notes(), &NodeId::new("NOTE"), vec![(row, Value::key(key))]);
                let undo = reduce::apply(&action, &mut live.tree, config.schema()).unwrap();
                journal.record(&action, &undo).unwrap();
            }
        }

        let mut replayed = module();
        assert_eq!(replay_edit_log(&path, &mut replayed).unwrap(), 3);
        assert_eq!(replayed.tree, live.tree);
    }

    #[test]
    fn replay_skips_headers_and_noise() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.jsonl");
        let action = EditAction::clear_cell(&notes(), &NodeId::new("VOL"), 1);
        let mut f = File::create(&path).unwrap();
        writeln!(f, r#"{{"event":"session_start","epoch_ms":1739290222000,"pid":12345,"config":"flat-demo"}}"#).unwrap();
        writeln!(f, "not valid json at all").unwrap();
        writeln!(f).unwrap();
        writeln!(f, "{}", serde_json::json!({ "t_ms": 5, "action": action, "undo": action })).unwrap();

        let mut m = module();
        assert_eq!(replay_edit_log(&path, &mut m).unwrap(), 1);
    }

    #[test]
    fn replay_reports_stale_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.jsonl");
        let stale = EditAction::clear_cell(&"GLOBAL/0/PATTERNS/0/NOTES/5".parse().unwrap(), &NodeId::new("VOL"), 0);
        let mut f = File::create(&path).unwrap();
        writeln!(f, "{}", serde_json::json!({ "t_ms": 1, "action": stale })).unwrap();

        let mut m = module();
        assert!(matches!(
            replay_edit_log(&path, &mut m),
            Err(ReplayError::Edit { line: 1, .. })
        ));
    }

    #[test]
    fn replay_rejects_malformed_actions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        let mut f = File::create(&path).unwrap();
        writeln!(f, r#"{{"t_ms":1,"action":{{"Swap":{{}}}}}}"#).unwrap();

        let mut m = module();
        assert!(matches!(replay_edit_log(&path, &mut m), Err(ReplayError::Json(_))));
    }

    #[test]
    fn journal_path_sits_next_to_the_module() {
        let path = EditJournal::path_for(Path::new("/tmp/song.chip"));
        assert_eq!(path, PathBuf::from("/tmp/song.edits.jsonl"));
    }
}
