//! # chipdoc-core
//!
//! Backend library for chipdoc. Loads and saves modules, applies edits with
//! undo/redo, and compiles modules into binary images for a sound driver,
//! independent of any user interface.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use chipdoc_core::config::Config;
//! use chipdoc_core::state::{LoadedConfig, Module, Session};
//! use chipdoc_core::{command, compile, dispatch};
//!
//! let config = Config::load();
//! let flavor = Arc::new(LoadedConfig::find("flat-demo")?);
//! let mut session = Session::new(Module::new(flavor, config.block_length()), config.undo_depth());
//!
//! let edit = command::parse_commands("set GLOBAL/0/PATTERNS/0/NOTES/0 NOTE 0 c4")?;
//! dispatch::dispatch_edit(&edit, &mut session)?;
//! dispatch::undo(&mut session)?;
//!
//! let bytes = compile::compile_to_bytes(&session.module, config.origin(), &Default::default())?;
//! ```
//!
//! ## Module Overview
//!
//! - [`state`] — `Module`, `Session`, configurations, undo history and the
//!   module text format
//! - [`dispatch`] — `dispatch_edit()`, the single entry point for edits
//! - [`command`] — textual edit commands
//! - [`compile`] — the `Compiler` trait, flattening, assembly and binary export
//! - [`journal`] — JSONL edit journal and replay
//! - [`config`] — TOML configuration loading (embedded + user override)

pub mod command;
pub mod compile;
pub mod config;
pub mod dispatch;
pub mod journal;
pub mod state;
