//! Module documents and the configurations that give them their shape.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use chipdoc_types::derive::{self, DeriveError};
use chipdoc_types::{generate_tree, Command, NodeId, NodeKind, Node, Schema, SchemaDef};

use crate::compile::{builtin_compiler, Compiler};

/// Version of the module text format written by this crate.
pub const FORMAT_VERSION: u32 = 1;

/// Configurations compiled into the binary, by id.
const BUILTIN_CONFIGS: &[(&str, &str)] = &[("flat-demo", include_str!("../../configs/flat-demo.toml"))];

/// Everything a module needs from its format definition: the node schema
/// plus identity and the target compiler.
pub trait Configuration: Schema + Send + Sync {
    fn id(&self) -> &str;

    fn version(&self) -> u32;

    fn compiler(&self) -> Option<&dyn Compiler>;

    fn schema(&self) -> &dyn Schema;
}

/// A configuration read from TOML, with its compiler picked from the
/// built-in registry by name.
pub struct LoadedConfig {
    id: String,
    version: u32,
    schema: SchemaDef,
    compiler: Option<Box<dyn Compiler>>,
}

#[derive(Deserialize)]
struct ConfigSource {
    id: String,
    version: u32,
    compiler: Option<String>,
    schema: SchemaDef,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
    UnknownCompiler(String),
    NotFound(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Parse(e) => write!(f, "invalid configuration: {}", e),
            Self::UnknownCompiler(name) => write!(f, "unknown compiler '{}'", name),
            Self::NotFound(id) => write!(f, "no configuration named '{}'", id),
        }
    }
}

impl std::error::Error for ConfigError {}

impl LoadedConfig {
    pub fn new(id: &str, version: u32, schema: SchemaDef, compiler: Option<Box<dyn Compiler>>) -> Self {
        Self {
            id: id.to_string(),
            version,
            schema,
            compiler,
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let source: ConfigSource = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let compiler = match source.compiler {
            Some(name) => Some(builtin_compiler(&name).ok_or(ConfigError::UnknownCompiler(name))?),
            None => None,
        };
        Ok(Self::new(&source.id, source.version, source.schema, compiler))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        log::debug!(target: "config", "loaded configuration {} v{} from {}", config.id, config.version, path.display());
        Ok(config)
    }

    pub fn builtin(id: &str) -> Option<Self> {
        let (_, text) = BUILTIN_CONFIGS.iter().find(|(name, _)| *name == id)?;
        match Self::from_toml(text) {
            Ok(config) => Some(config),
            Err(e) => {
                log::error!(target: "config", "built-in configuration {} is broken: {}", id, e);
                None
            }
        }
    }

    /// A built-in configuration, or `<config dir>/chipdoc/configs/<id>.toml`.
    pub fn find(id: &str) -> Result<Self, ConfigError> {
        if let Some(config) = Self::builtin(id) {
            return Ok(config);
        }
        match user_config_file(id) {
            Some(path) if path.exists() => Self::load(&path),
            _ => Err(ConfigError::NotFound(id.to_string())),
        }
    }
}

fn user_config_file(id: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("chipdoc").join("configs").join(format!("{}.toml", id)))
}

impl Schema for LoadedConfig {
    fn root_id(&self) -> &NodeId {
        self.schema.root_id()
    }

    fn node_kind(&self, id: &NodeId) -> Option<NodeKind> {
        self.schema.node_kind(id)
    }

    fn child_ids(&self, id: &NodeId) -> &[NodeId] {
        self.schema.child_ids(id)
    }

    fn source_command(&self, field: &NodeId) -> Option<&Command> {
        self.schema.source_command(field)
    }
}

impl Configuration for LoadedConfig {
    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn compiler(&self) -> Option<&dyn Compiler> {
        self.compiler.as_deref()
    }

    fn schema(&self) -> &dyn Schema {
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleHeader {
    pub format_version: u32,
    pub config_id: String,
    pub config_version: u32,
}

impl ModuleHeader {
    pub fn for_config(config: &dyn Configuration) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            config_id: config.id().to_string(),
            config_version: config.version(),
        }
    }
}

/// A node tree together with the configuration that describes it.
/// Clones share the configuration and every instance of the tree.
#[derive(Clone)]
pub struct Module {
    pub header: ModuleHeader,
    pub config: Arc<dyn Configuration>,
    pub tree: Node,
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("header", &self.header)
            .field("tree", &self.tree)
            .finish()
    }
}

impl Module {
    /// A fresh module: schema defaults and `block_length` empty rows per pattern.
    pub fn new(config: Arc<dyn Configuration>, block_length: usize) -> Self {
        let tree = generate_tree(config.schema(), block_length);
        Self::from_tree(config, tree)
    }

    pub fn from_tree(config: Arc<dyn Configuration>, tree: Node) -> Self {
        Self {
            header: ModuleHeader::for_config(config.as_ref()),
            config,
            tree,
        }
    }

    pub fn schema(&self) -> &dyn Schema {
        self.config.schema()
    }

    fn derived(&self, tree: Node) -> Self {
        Self {
            header: self.header.clone(),
            config: Arc::clone(&self.config),
            tree,
        }
    }

    /// Preview copy holding one row of the patterns at `position` in the
    /// order list of `group`.
    pub fn single_row(&self, group: &NodeId, position: usize, row: usize) -> Result<Self, DeriveError> {
        log::debug!(target: "derive", "single row {} of {} at order {}", row, group, position);
        let tree = derive::single_row(&self.tree, self.schema(), group, position, row)?;
        Ok(self.derived(tree))
    }

    /// Preview copy playing only the order entry at `position`.
    pub fn single_pattern(&self, group: &NodeId, position: usize) -> Result<Self, DeriveError> {
        log::debug!(target: "derive", "single pattern of {} at order {}", group, position);
        let tree = derive::single_pattern(&self.tree, group, position)?;
        Ok(self.derived(tree))
    }
}
