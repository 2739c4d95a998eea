use std::path::PathBuf;

use serde::Deserialize;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    defaults: DefaultsConfig,
    #[serde(default)]
    editor: EditorConfig,
}

#[derive(Deserialize, Default)]
struct DefaultsConfig {
    block_length: Option<usize>,
    origin: Option<u32>,
}

#[derive(Deserialize, Default)]
struct EditorConfig {
    undo_depth: Option<usize>,
    edit_journal: Option<bool>,
}

pub struct Config {
    defaults: DefaultsConfig,
    editor: EditorConfig,
}

impl Config {
    /// Embedded defaults, overridden key by key by `~/.config/chipdoc/config.toml`.
    pub fn load() -> Self {
        let mut config = Self::embedded();
        if let Some(path) = user_config_path() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(contents) => config.merge_str(&contents, &path.display().to_string()),
                    Err(e) => {
                        log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
                    }
                }
            }
        }
        config
    }

    fn embedded() -> Self {
        let base: ConfigFile =
            toml::from_str(DEFAULT_CONFIG).expect("Failed to parse embedded config.toml");
        Config {
            defaults: base.defaults,
            editor: base.editor,
        }
    }

    fn merge_str(&mut self, contents: &str, origin: &str) {
        match toml::from_str::<ConfigFile>(contents) {
            Ok(user) => {
                merge_defaults(&mut self.defaults, user.defaults);
                merge_editor(&mut self.editor, user.editor);
            }
            Err(e) => log::warn!(target: "config", "ignoring malformed config {}: {}", origin, e),
        }
    }

    /// Rows per pattern block in new modules (clamped to 1..=4096).
    pub fn block_length(&self) -> usize {
        self.defaults.block_length.unwrap_or(16).clamp(1, 4096)
    }

    pub fn origin(&self) -> u32 {
        self.defaults.origin.unwrap_or(0x8000)
    }

    pub fn undo_depth(&self) -> usize {
        self.editor.undo_depth.unwrap_or(500).max(1)
    }

    pub fn edit_journal(&self) -> bool {
        self.editor.edit_journal.unwrap_or(false)
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("chipdoc").join("config.toml"))
}

fn merge_defaults(base: &mut DefaultsConfig, user: DefaultsConfig) {
    if user.block_length.is_some() {
        base.block_length = user.block_length;
    }
    if user.origin.is_some() {
        base.origin = user.origin;
    }
}

fn merge_editor(base: &mut EditorConfig, user: EditorConfig) {
    if user.undo_depth.is_some() {
        base.undo_depth = user.undo_depth;
    }
    if user.edit_journal.is_some() {
        base.edit_journal = user.edit_journal;
    }
}
