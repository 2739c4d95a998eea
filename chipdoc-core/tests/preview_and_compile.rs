//! Preview derivation and compiler invocation on whole modules.

mod common;

use std::sync::Arc;

use chipdoc_core::command::parse_commands;
use chipdoc_core::compile::{
    compile, compile_to_asm, compile_to_bytes, export_bin, CompileContext, CompileError, Compiler, ExportError,
    FlatCompiler, OutputNode, Symbols,
};
use chipdoc_core::dispatch::dispatch_edit;
use chipdoc_core::state::{Module, Session};
use chipdoc_types::derive::DeriveError;
use chipdoc_types::{Block, EditAction, Instance, Value};

use common::*;

const ORDER: &str = "SONG/0/PATTERNS/0/PATTERNS_ORDER/0";

/// Order list `[(4 . (0 0)) (2 . (1 0))]` with a second SEQ pattern whose
/// first row is `(9 3)`.
fn two_entry_song(compiler: Option<Box<dyn Compiler>>) -> Module {
    let mut s = Session::new(Module::new(song_config(compiler), 4), 10);
    dispatch_edit(
        &EditAction::Insert {
            parent: path("SONG/0/PATTERNS/0"),
            node: id("SEQ"),
            instances: vec![Instance::block(1, Block::new(2, 4))],
        },
        &mut s,
    )
    .unwrap();
    let commands = format!(
        "set {o} REPEAT 1 2; set {o} SEQ_REF 1 1; set {o} DRUMS_REF 1 0; \
         set SONG/0/PATTERNS/0/SEQ/1 STEP 0 9; set SONG/0/PATTERNS/0/SEQ/1 GATE 0 3",
        o = ORDER
    );
    dispatch_edit(&parse_commands(&commands).unwrap(), &mut s).unwrap();
    s.module
}

#[test]
fn single_row_preview_at_second_order_entry() {
    let module = two_entry_song(None);
    assert_eq!(rows(&module, &path(ORDER)), grid(&[&["4", "0", "0"], &["2", "1", "0"]]));
    let live = module.tree.clone();

    let preview = module.single_row(&id("PATTERNS"), 1, 0).unwrap();
    assert_eq!(rows(&preview, &path(ORDER)), grid(&[&["1", "1", "0"]]));
    assert_eq!(rows(&preview, &seq(1)), grid(&[&["9", "3"]]));
    assert_eq!(rows(&preview, &path("SONG/0/PATTERNS/0/DRUMS/0")), grid(&[&["_"]]));
    assert!(preview.tree.resolve(&seq(0)).is_err());

    // Untouched parts are shared with the live module, which is unchanged.
    assert!(preview.tree.resolve(&path("SONG/0/TEMPO/0")).is_ok());
    assert_eq!(module.tree, live);
}

#[test]
fn single_row_past_pattern_end_is_blank() {
    let module = two_entry_song(None);
    let preview = module.single_row(&id("PATTERNS"), 1, 40).unwrap();
    assert_eq!(rows(&preview, &seq(1)), grid(&[&["_", "_"]]));
}

#[test]
fn single_pattern_preview_keeps_whole_pattern() {
    let module = two_entry_song(None);
    let preview = module.single_pattern(&id("PATTERNS"), 1).unwrap();
    assert_eq!(rows(&preview, &path(ORDER)), grid(&[&["2", "1", "0"]]));
    assert_eq!(rows(&preview, &seq(1)).len(), 4);
    assert_eq!(rows(&preview, &seq(0)).len(), 4);
}

#[test]
fn preview_rejects_bad_positions() {
    let module = two_entry_song(None);
    assert!(matches!(
        module.single_row(&id("PATTERNS"), 2, 0),
        Err(DeriveError::OrderOutOfRange { position: 2, len: 2, .. })
    ));
    assert!(module.single_pattern(&id("NOPE"), 0).is_err());
}

#[test]
fn flattening_keeps_only_bytes() {
    let module = Module::new(
        song_config(Some(Box::new(Scripted(vec![
            OutputNode::Bytes(vec![0x01]),
            OutputNode::Symbol {
                name: "foo".into(),
                value: 0x10,
            },
            OutputNode::Bytes(vec![0x02]),
        ])))),
        4,
    );
    let symbols = Symbols::new();
    assert_eq!(compile_to_bytes(&module, 0x8000, &symbols).unwrap(), vec![0x01, 0x02]);

    let asm = compile_to_asm(&module, 0x8000, &symbols).unwrap();
    assert_eq!(asm, "    org $8000\n    db $01\nfoo equ $0010\n    db $02\n");

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("song.bin");
    assert_eq!(export_bin(&module, 0x8000, &symbols, &out).unwrap(), 2);
    assert_eq!(std::fs::read(&out).unwrap(), vec![0x01, 0x02]);
}

struct Refusing;

impl Compiler for Refusing {
    fn name(&self) -> &str {
        "refusing"
    }

    fn compile(&self, ctx: &CompileContext<'_>) -> Result<Vec<OutputNode>, CompileError> {
        Err(CompileError::new(format!("origin ${:04x} not allowed", ctx.origin)))
    }
}

#[test]
fn compiler_errors_pass_through_verbatim() {
    let module = Module::new(song_config(Some(Box::new(Refusing))), 4);
    let err = compile_to_bytes(&module, 0x100, &Symbols::new()).unwrap_err();
    assert_eq!(err, CompileError::new("origin $0100 not allowed"));

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("never.bin");
    assert!(matches!(
        export_bin(&module, 0x100, &Symbols::new(), &out),
        Err(ExportError::Compile(_))
    ));
    assert!(!out.exists());
}

#[test]
fn flat_target_sees_injected_symbols_and_preview_shrinks_output() {
    let module = two_entry_song(Some(Box::new(FlatCompiler)));
    let mut symbols = Symbols::new();
    symbols.insert("CURRENT_MODULE".into(), Value::Int(7));
    symbols.insert("LABEL".into(), Value::text("ignored"));

    let nodes = compile(&module, 0x8000, &symbols).unwrap();
    assert_eq!(
        nodes[0],
        OutputNode::Symbol {
            name: "CURRENT_MODULE".into(),
            value: 7
        }
    );
    assert!(!nodes.iter().any(|n| matches!(n, OutputNode::Symbol { name, .. } if name == "LABEL")));

    let full = compile_to_bytes(&module, 0x8000, &symbols).unwrap();
    assert_eq!(full[0], 120);
    let preview = module.single_row(&id("PATTERNS"), 1, 0).unwrap();
    let short = compile_to_bytes(&preview, 0x8000, &symbols).unwrap();
    assert!(short.len() < full.len());
    assert!(Arc::ptr_eq(&preview.config, &module.config));
}
