use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chipdoc_core::command::parse_commands;
use chipdoc_core::compile::{self, CompileError, ExportError, Symbols};
use chipdoc_core::config::Config;
use chipdoc_core::dispatch::dispatch_edit;
use chipdoc_core::journal::{replay_edit_log, EditJournal, ReplayError};
use chipdoc_core::state::persistence::{read_header, read_module, save_module, ModuleError};
use chipdoc_core::state::{ConfigError, LoadedConfig, Module, Session};
use chipdoc_types::derive::DeriveError;
use chipdoc_types::{EditError, Instance, NodeId, Payload, Value};

use crate::args::{Command, OutputArgs};

#[derive(Debug)]
pub enum CliError {
    Usage(String),
    Module(ModuleError),
    Config(ConfigError),
    Edit(EditError),
    Derive(DeriveError),
    Compile(CompileError),
    Replay(ReplayError),
    Io(std::io::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usage(m) => write!(f, "{}", m),
            Self::Module(e) => write!(f, "{}", e),
            Self::Config(e) => write!(f, "{}", e),
            Self::Edit(e) => write!(f, "edit failed: {}", e),
            Self::Derive(e) => write!(f, "preview failed: {}", e),
            Self::Compile(e) => write!(f, "compile failed: {}", e),
            Self::Replay(e) => write!(f, "replay failed: {}", e),
            Self::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for CliError {}

macro_rules! from_error {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(impl From<$ty> for CliError {
            fn from(e: $ty) -> Self {
                Self::$variant(e)
            }
        })*
    };
}

from_error!(
    Module(ModuleError),
    Config(ConfigError),
    Edit(EditError),
    Derive(DeriveError),
    Compile(CompileError),
    Replay(ReplayError),
    Io(std::io::Error),
);

impl From<ExportError> for CliError {
    fn from(e: ExportError) -> Self {
        match e {
            ExportError::Compile(e) => Self::Compile(e),
            ExportError::Io(e) => Self::Io(e),
        }
    }
}

/// Run one subcommand. Returns text for stdout.
pub fn run(command: Command, config: &Config) -> Result<String, CliError> {
    match command {
        Command::New { file, config: id, rows } => new_module(&file, &id, rows, config),
        Command::Info { file } => info(&file),
        Command::Edit {
            file,
            commands,
            journal,
        } => edit(file, &commands, journal, config),
        Command::Compile { file, output } => compile_module(&file, &output, config),
        Command::Preview {
            file,
            group,
            position,
            row,
            output,
        } => preview(&file, &NodeId::new(&group), position, row, &output, config),
        Command::Replay { journal, base, out } => replay(&journal, &base, &out),
    }
}

/// Load a module with the configuration its header names.
fn open_module(path: &Path) -> Result<Module, CliError> {
    let text = std::fs::read_to_string(path).map_err(ModuleError::from)?;
    let header = read_header(&text)?;
    let config = LoadedConfig::find(&header.config_id)?;
    Ok(read_module(&text, Arc::new(config))?)
}

fn new_module(path: &Path, id: &str, rows: Option<usize>, config: &Config) -> Result<String, CliError> {
    let rows = rows.unwrap_or_else(|| config.block_length());
    let module = Module::new(Arc::new(LoadedConfig::find(id)?), rows);
    save_module(path, &module)?;
    Ok(format!(
        "created {} ({} v{}, {} rows)\n",
        path.display(),
        id,
        module.config.version(),
        rows
    ))
}

fn info(path: &Path) -> Result<String, CliError> {
    let module = open_module(path)?;
    let mut out = format!(
        "{} v{} (format {})\n",
        module.header.config_id, module.header.config_version, module.header.format_version
    );
    for instance in module.tree.instances() {
        outline(&mut out, &module.tree.id, instance, 0);
    }
    Ok(out)
}

fn outline(out: &mut String, id: &NodeId, instance: &Instance, depth: usize) {
    let _ = write!(out, "{}{} {}", "  ".repeat(depth), id, instance.id);
    if let Some(name) = &instance.name {
        let _ = write!(out, " {}", Value::Text(name.clone()));
    }
    match &instance.payload {
        Payload::Field(value) => {
            let _ = writeln!(out, " = {}", value);
        }
        Payload::Block(block) => {
            let _ = writeln!(out, ": {} rows", block.len());
        }
        Payload::Group(group) => {
            out.push('\n');
            for child in group.children() {
                for child_instance in child.instances() {
                    outline(out, &child.id, child_instance, depth + 1);
                }
            }
        }
    }
}

fn edit(path: PathBuf, commands: &str, journal: bool, config: &Config) -> Result<String, CliError> {
    let action = parse_commands(commands)?;
    let shown = path.display().to_string();

    let module = open_module(&path)?;
    let config_id = module.config.id().to_string();
    let mut session = Session::new(module, config.undo_depth());
    if config.edit_journal() || journal {
        session.attach_journal(EditJournal::open(&EditJournal::path_for(&path), &config_id)?);
    }
    session.path = Some(path);

    dispatch_edit(&action, &mut session)?;
    session.save()?;
    Ok(format!("{}: {} applied\n", shown, action.kind().as_str()))
}

fn write_output(module: &Module, output: &OutputArgs, config: &Config) -> Result<String, CliError> {
    let origin = output.origin.unwrap_or_else(|| config.origin());
    let symbols = Symbols::new();
    if output.asm {
        let asm = compile::compile_to_asm(module, origin, &symbols)?;
        return match &output.output {
            Some(out) => {
                std::fs::write(out, asm)?;
                Ok(format!("wrote {}\n", out.display()))
            }
            None => Ok(asm),
        };
    }
    let out = output
        .output
        .as_deref()
        .ok_or_else(|| CliError::Usage("binary output needs -o OUT".into()))?;
    let written = compile::export_bin(module, origin, &symbols, out)?;
    Ok(format!("wrote {} bytes to {}\n", written, out.display()))
}

fn compile_module(path: &Path, output: &OutputArgs, config: &Config) -> Result<String, CliError> {
    let module = open_module(path)?;
    write_output(&module, output, config)
}

fn preview(
    path: &Path,
    group: &NodeId,
    position: usize,
    row: Option<usize>,
    output: &OutputArgs,
    config: &Config,
) -> Result<String, CliError> {
    let module = open_module(path)?;
    let derived = match row {
        Some(row) => module.single_row(group, position, row)?,
        None => module.single_pattern(group, position)?,
    };
    write_output(&derived, output, config)
}

fn replay(journal: &Path, base: &Path, out: &Path) -> Result<String, CliError> {
    let mut module = open_module(base)?;
    let applied = replay_edit_log(journal, &mut module)?;
    save_module(out, &module)?;
    Ok(format!("replayed {} edits into {}\n", applied, out.display()))
}
