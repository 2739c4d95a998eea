#![allow(dead_code)]
//! Fixtures for chipdoc-core integration tests.

use std::sync::Arc;

use chipdoc_core::compile::{CompileContext, CompileError, Compiler, OutputNode};
use chipdoc_core::state::{Configuration, LoadedConfig, Module, Session};
use chipdoc_types::{Command, CommandKind, NodeId, NodePath, SchemaDef, Value};

/// SONG with a tempo field and a PATTERNS group holding an order list and
/// two pattern blocks: SEQ (STEP, GATE) and DRUMS (HIT).
pub fn song_schema() -> SchemaDef {
    SchemaDef::new("SONG")
        .group("SONG", &["TEMPO", "PATTERNS"])
        .field("TEMPO", Command::new(CommandKind::Int).with_default(Value::Int(120)).with_bits(8))
        .group("PATTERNS", &["PATTERNS_ORDER", "SEQ", "DRUMS"])
        .block("PATTERNS_ORDER", &["REPEAT", "SEQ_REF", "DRUMS_REF"])
        .field("REPEAT", Command::new(CommandKind::Int))
        .field("SEQ_REF", Command::new(CommandKind::Reference))
        .field("DRUMS_REF", Command::new(CommandKind::Reference))
        .block("SEQ", &["STEP", "GATE"])
        .field("STEP", Command::new(CommandKind::Int))
        .field("GATE", Command::new(CommandKind::Int))
        .block("DRUMS", &["HIT"])
        .field("HIT", Command::new(CommandKind::Key))
}

/// Compiler that ignores the module and returns a fixed node list.
pub struct Scripted(pub Vec<OutputNode>);

impl Compiler for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    fn compile(&self, _ctx: &CompileContext<'_>) -> Result<Vec<OutputNode>, CompileError> {
        Ok(self.0.clone())
    }
}

pub fn song_config(compiler: Option<Box<dyn Compiler>>) -> Arc<dyn Configuration> {
    Arc::new(LoadedConfig::new("song-test", 1, song_schema(), compiler))
}

pub fn song_module(block_length: usize) -> Module {
    Module::new(song_config(None), block_length)
}

pub fn song_session(block_length: usize) -> Session {
    Session::new(song_module(block_length), 100)
}

pub fn path(text: &str) -> NodePath {
    text.parse().unwrap()
}

pub fn seq(id: u32) -> NodePath {
    path(&format!("SONG/0/PATTERNS/0/SEQ/{}", id))
}

pub fn id(name: &str) -> NodeId {
    NodeId::new(name)
}

/// Rows of a block instance, rendered with `Value`'s display form.
pub fn rows(module: &Module, block: &NodePath) -> Vec<Vec<String>> {
    module
        .tree
        .resolve(block)
        .unwrap()
        .as_block()
        .unwrap()
        .rows()
        .iter()
        .map(|row| row.iter().map(|v| v.to_string()).collect())
        .collect()
}

pub fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| row.iter().map(|s| s.to_string()).collect())
        .collect()
}
