//! Shared test utilities for avrasm-lsp.
//!
//! This module provides common helpers used across multiple test modules.
//! It is only compiled when running tests.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tower_lsp::lsp_types::Url;

use crate::dfp::dev_lib_name;
use crate::document::Document;

/// Creates a temporary directory for testing.
///
/// Returns a tuple of (TempDir, PathBuf) where:
/// - TempDir: The temp directory handle (must be kept alive for the test duration)
/// - PathBuf: The path to a non-hidden subdirectory
///
/// Workspace scanning skips hidden directories, and on some systems temp
/// directories live under paths like `/tmp/.tmpXXXXX`, so everything is
/// created below a plain `work` subdirectory.
pub fn create_test_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let dir = temp_dir.path().join("work");
    fs::create_dir(&dir).expect("Failed to create work subdirectory");
    (temp_dir, dir)
}

/// Writes a minimal Device Family Pack for `device` at `pack_root`.
///
/// # Pack Structure
///
/// ```text
/// pack_root/
/// ├── atdf/<device>.atdf
/// ├── avrasm/inc/<lib>def.inc
/// └── include/avr/io<lib>.h
/// ```
///
/// Each file defines `PORTB`, plus `DDRB` (header), `RAMEND` (inc) and the
/// `IOPORT` module (atdf).
pub fn create_pack(pack_root: &Path, device: &str) {
    let lib = dev_lib_name(device);

    let include = pack_root.join("include").join("avr");
    let inc = pack_root.join("avrasm").join("inc");
    let atdf = pack_root.join("atdf");
    for dir in [&include, &inc, &atdf] {
        fs::create_dir_all(dir).expect("Failed to create pack directory");
    }

    fs::write(
        include.join(format!("io{lib}.h")),
        "#define PORTB _SFR_IO8(0x05)\n#define DDRB _SFR_IO8(0x04)\n",
    )
    .unwrap();
    fs::write(
        inc.join(format!("{lib}def.inc")),
        ".equ PORTB = 0x05 ; Port B\n.equ RAMEND = 0x08ff\n",
    )
    .unwrap();
    fs::write(
        atdf.join(format!("{device}.atdf")),
        format!(
            "<device name=\"{device}\">\n  <module caption=\"I/O Port\" name=\"IOPORT\">\n    <register caption=\"Port B Data Register\" name=\"PORTB\" offset=\"0x25\" size=\"1\"/>\n  </module>\n</device>\n"
        ),
    )
    .unwrap();
}

/// An open document at a fake path.
pub fn document(text: &str) -> Document {
    Document::new(
        Url::parse("file:///tmp/work/main.asm").unwrap(),
        1,
        text.to_string(),
    )
}
