//! avrasm-lsp: a Language Server Protocol implementation for AVR assembly
//!
//! This crate provides editor assistance for AVR assembly sources (`.asm`,
//! `.inc`, `.s`), cross-referencing Microchip Device Family Packs (DFP).
//!
//! # Overview
//!
//! - **Local symbols**: labels, `.equ` and `.set` definitions of the open file
//! - **Pack index**: `#define`s, enum members, `.equ`/`.set` and ATDF names of
//!   the device's pack, built lazily and cached until invalidated
//! - **Providers**: hover, go-to-definition, completion, document and
//!   workspace symbols, find-references
//! - **Commands**: `avrasm.lookupSymbol`, `avrasm.rebuildDfpIndex`, `avrasm.dfpInfo`
//!
//! # Architecture
//!
//! - [`local`]: regex scan of one document, cached by URI and version
//! - [`dfp`]: pack and device resolution, file scanning, the shared index cache
//! - [`completion`], [`hover`], [`gotodef`], [`references`], [`symbol`]: the providers
//! - [`server`]: the `tower_lsp` backend wiring requests to providers
//!
//! ```ignore
//! use avrasm_lsp::{config::Settings, dfp::DfpIndex};
//!
//! let settings = Settings::new(Some(&root))?;
//! let index = DfpIndex::build(&settings, &[root]);
//! println!("{:?}", index.lookup("PORTB"));
//! ```

// Symbol sources
pub mod dfp;
pub mod instructions;
pub mod local;

// LSP feature modules
pub mod commands;
pub mod completion;
pub mod gotodef;
pub mod hover;
pub mod references;
pub mod symbol;

// Server, documents and workspace access
pub mod document;
pub mod server;
pub mod workspace;

// Configuration and command line
pub mod cli;
pub mod config;

// Test utilities (only available in test builds)
#[cfg(test)]
pub mod test_utils;
