//! Integration tests for the avrasm-lsp library public API.
//!
//! These tests use the crate the way the binary does: resolve a pack from
//! settings and project files, build the index, then run providers over it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::TempDir;
use tower_lsp::lsp_types::{CompletionResponse, Position, Url};

use avrasm_lsp::commands::lookup_symbol;
use avrasm_lsp::completion::{get_completions, Context};
use avrasm_lsp::config::Settings;
use avrasm_lsp::dfp::{DfpCache, DfpIndex};
use avrasm_lsp::document::Document;
use avrasm_lsp::local::LocalSymbols;

/// Helper: Create a temporary workspace directory for testing.
///
/// Returns (TempDir, PathBuf) - keep TempDir alive for test duration.
fn create_test_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let dir = temp_dir.path().join("work");
    fs::create_dir(&dir).expect("Failed to create work subdirectory");
    (temp_dir, dir)
}

/// Helper: A minimal ATtiny85 pack with one include file and one ATDF file.
fn write_tiny_pack(pack_root: &Path) {
    fs::create_dir_all(pack_root.join("avrasm").join("inc")).unwrap();
    fs::create_dir_all(pack_root.join("atdf")).unwrap();
    fs::write(
        pack_root.join("avrasm").join("inc").join("tn85def.inc"),
        ".equ PORTB = 0x18\n.equ TIMSK = 0x39\n",
    )
    .unwrap();
    fs::write(
        pack_root.join("atdf").join("ATtiny85.atdf"),
        "<device name=\"ATtiny85\">\n  <register name=\"TIMSK\" offset=\"0x59\"/>\n</device>\n",
    )
    .unwrap();
}

// ============================================================================
// Pack resolution
// ============================================================================

#[test]
fn test_project_file_selects_pack_and_device() {
    let (_temp_dir, dir) = create_test_dir();
    let packs = dir.join("packs").join("Microchip");
    write_tiny_pack(&packs.join("ATtiny_DFP").join("2.0.368"));
    write_tiny_pack(&packs.join("ATtiny_DFP").join("1.10.348"));

    let root = dir.join("project");
    fs::create_dir_all(root.join(".vscode")).unwrap();
    fs::write(
        root.join(".vscode").join("blink.mplab.json"),
        r#"{"configurations": [{"device": "ATtiny85", "packs": [{"name": "ATtiny_DFP", "vendor": "Microchip"}]}]}"#,
    )
    .unwrap();

    let settings = Settings {
        packs_directory: Some(packs.to_string_lossy().to_string()),
        ..Settings::default()
    };
    let index = DfpIndex::build(&settings, &[root]);

    assert_eq!(
        index.pack_root.as_deref(),
        Some(packs.join("ATtiny_DFP").join("2.0.368").as_path())
    );
    assert_eq!(index.device.as_deref(), Some("ATtiny85"));
    assert_eq!(index.dev_lib_name.as_deref(), Some("tn85"));
    assert_eq!(index.scanned_files.len(), 2);
    assert_eq!(index.lookup("TIMSK").len(), 2);
}

#[test]
fn test_malformed_project_file_is_skipped() {
    let (_temp_dir, dir) = create_test_dir();
    fs::write(dir.join("broken.mplab.json"), "{ not json").unwrap();

    let settings = Settings {
        packs_directory: Some(dir.join("no-packs").to_string_lossy().to_string()),
        ..Settings::default()
    };
    let index = DfpIndex::build(&settings, &[dir]);
    assert!(index.is_empty());
    assert_eq!(index.summary().symbol_count, 0);
}

// ============================================================================
// Providers over a built index
// ============================================================================

#[test]
fn test_completion_and_lookup_from_external_crate() {
    let (_temp_dir, dir) = create_test_dir();
    let pack = dir.join("pack");
    write_tiny_pack(&pack);
    let settings = Settings {
        dfp_path: Some(pack.to_string_lossy().to_string()),
        ..Settings::default()
    };
    let index = DfpIndex::build(&settings, &[]);
    assert_eq!(index.device.as_deref(), Some("ATtiny85"));

    let text = "timer:\n    out TI";
    let document = Document::new(
        Url::from_file_path(dir.join("main.asm")).unwrap(),
        1,
        text.to_string(),
    );
    let local = LocalSymbols::parse(text);
    let context = Context {
        document: &document,
        local: &local,
        dfp: Some(&index),
        settings: &settings,
    };

    let Some(CompletionResponse::List(list)) = get_completions(
        context,
        Position {
            line: 1,
            character: 10,
        },
    ) else {
        panic!("expected a completion list");
    };
    let labels = list
        .items
        .iter()
        .map(|item| item.label.as_str())
        .collect::<Vec<_>>();
    assert_eq!(labels, vec!["timer", "TIMSK"]);

    let items = lookup_symbol("timsk", Some((&document.uri, &local)), Some(&index));
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|item| item.source == "dfp"));
}

// ============================================================================
// Index cache
// ============================================================================

#[tokio::test]
async fn test_configuration_change_forces_a_fresh_scan() {
    let (_temp_dir, dir) = create_test_dir();
    let pack = dir.join("pack");
    write_tiny_pack(&pack);
    let settings = Settings {
        dfp_path: Some(pack.to_string_lossy().to_string()),
        ..Settings::default()
    };

    let cache = DfpCache::new();
    let scans = Arc::new(AtomicUsize::new(0));
    let build = |scans: Arc<AtomicUsize>, settings: Settings| {
        move || {
            scans.fetch_add(1, Ordering::SeqCst);
            DfpIndex::build(&settings, &[])
        }
    };

    let first = cache
        .get_or_build(build(scans.clone(), settings.clone()))
        .await;
    let again = cache
        .get_or_build(build(scans.clone(), settings.clone()))
        .await;
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(scans.load(Ordering::SeqCst), 1);

    // What the server does on a configuration change touching `avrasm`
    cache.invalidate();
    fs::write(
        pack.join("avrasm").join("inc").join("tn85def.inc"),
        ".equ PORTB = 0x18\n.equ TIMSK = 0x39\n.equ GIMSK = 0x3b\n",
    )
    .unwrap();

    let rebuilt = cache.get_or_build(build(scans.clone(), settings)).await;
    assert_eq!(scans.load(Ordering::SeqCst), 2);
    assert_eq!(rebuilt.lookup("GIMSK").len(), 1);
    assert!(first.lookup("GIMSK").is_empty());
}
