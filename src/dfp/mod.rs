//! Device Family Pack symbol index.
//!
//! A pack is resolved from the settings, an MPLAB project file or the
//! installed packs, then its C header, assembler include and ATDF device file
//! are scanned line by line into one `symbol -> occurrences` map.
//!
//! ```text
//! Settings + roots -> ProjectInfo -> pack root -> PackListing -> PackFiles
//!                                            \-> device      -/      |
//!                                                          scan_* <--/
//! ```

mod cache;
mod locate;
mod project;
mod scan;
mod version;

pub use cache::DfpCache;
pub use locate::{
    dev_lib_name, device_from_atdf_names, discover_default_pack, highest_version_dir,
    locate_files, resolve_device, resolve_pack_root, PackFiles, PackListing,
};
pub use project::{is_project_file, PackRef, ProjectInfo};
pub use scan::{scan_atdf, scan_header, scan_inc};
pub use version::compare_versions;

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use itertools::Itertools;
use serde::Serialize;
use thiserror::Error;
use tower_lsp::lsp_types::{Location, Position, Range, Url};
use tracing::{debug, info};

use crate::{config::Settings, local::SymbolKind};

/// Occurrences kept per symbol; ATDF files repeat names a lot.
pub const MAX_OCCURRENCES_PER_SYMBOL: usize = 20;

#[derive(Debug, Error)]
pub enum DfpError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed project file {path}: {source}")]
    Project {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("project file {0} has no configurations")]
    EmptyProject(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DfpOccurrence {
    pub symbol: String,
    pub kind: SymbolKind,
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
    pub detail: String,
}

impl DfpOccurrence {
    pub fn location(&self) -> Option<Location> {
        let uri = Url::from_file_path(&self.file).ok()?;
        let start = Position {
            line: self.line,
            character: self.column,
        };
        let end = Position {
            line: self.line,
            character: self.column + self.symbol.chars().count() as u32,
        };
        Some(Location {
            uri,
            range: Range { start, end },
        })
    }

    pub fn file_name(&self) -> String {
        self.file
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct DfpIndex {
    pub pack_root: Option<PathBuf>,
    pub device: Option<String>,
    pub dev_lib_name: Option<String>,
    /// Sorted, one entry per symbol
    pub symbol_list: Vec<String>,
    pub symbols: HashMap<String, Vec<DfpOccurrence>>,
    pub scanned_files: Vec<PathBuf>,
    pub built_at: DateTime<Local>,
    lowercase: HashMap<String, String>,
}

/// What the rebuild and info commands report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DfpSummary {
    pub pack_root: Option<PathBuf>,
    pub device: Option<String>,
    pub dev_lib_name: Option<String>,
    pub symbol_count: usize,
    pub scanned_files: Vec<PathBuf>,
    pub built_at: String,
}

impl DfpIndex {
    pub fn empty() -> DfpIndex {
        DfpIndex {
            pack_root: None,
            device: None,
            dev_lib_name: None,
            symbol_list: Vec::new(),
            symbols: HashMap::new(),
            scanned_files: Vec::new(),
            built_at: Local::now(),
            lowercase: HashMap::new(),
        }
    }

    /// Resolve everything from the settings and workspace roots, then scan.
    /// Missing pieces produce an index with fewer (or zero) scanned files.
    pub fn build(settings: &Settings, roots: &[PathBuf]) -> DfpIndex {
        let project = ProjectInfo::discover(roots);
        let requested_device = settings
            .device()
            .filter(|device| !device.is_empty())
            .map(str::to_string)
            .or_else(|| project.as_ref().and_then(|it| it.device.clone()));

        let Some(pack_root) =
            resolve_pack_root(settings, project.as_ref(), requested_device.as_deref())
        else {
            info!("no device family pack found");
            return DfpIndex {
                device: requested_device,
                ..DfpIndex::empty()
            };
        };

        let listing = PackListing::read(&pack_root);
        let device = resolve_device(settings, project.as_ref(), Some(&listing));
        let files = device
            .as_deref()
            .map(|device| locate_files(&listing, device))
            .unwrap_or_default();

        DfpIndex::scan(Some(pack_root), device, &files)
    }

    /// Read and scan the chosen files. Unreadable files are skipped.
    pub fn scan(pack_root: Option<PathBuf>, device: Option<String>, files: &PackFiles) -> DfpIndex {
        let mut index = DfpIndex {
            pack_root,
            dev_lib_name: device.as_deref().map(dev_lib_name),
            device,
            ..DfpIndex::empty()
        };

        let scanners: [(&Option<PathBuf>, fn(&Path, &str) -> Vec<DfpOccurrence>); 3] = [
            (&files.header, scan_header),
            (&files.inc, scan_inc),
            (&files.atdf, scan_atdf),
        ];

        for (file, scanner) in scanners {
            let Some(file) = file else {
                continue;
            };
            let text = match std::fs::read(file) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(err) => {
                    debug!(file = %file.display(), "skipping unreadable pack file: {err}");
                    continue;
                }
            };

            for occurrence in scanner(file, &text) {
                index.insert(occurrence);
            }
            index.scanned_files.push(file.clone());
        }

        index.symbol_list = index.symbols.keys().cloned().sorted().collect();
        index.lowercase = index
            .symbol_list
            .iter()
            .rev()
            .map(|symbol| (symbol.to_ascii_lowercase(), symbol.clone()))
            .collect();

        info!(
            device = ?index.device,
            files = index.scanned_files.len(),
            symbols = index.symbol_list.len(),
            "built dfp index"
        );
        index
    }

    fn insert(&mut self, occurrence: DfpOccurrence) {
        let occurrences = self.symbols.entry(occurrence.symbol.clone()).or_default();
        if occurrences.len() < MAX_OCCURRENCES_PER_SYMBOL {
            occurrences.push(occurrence);
        }
    }

    /// Occurrences of a symbol, exact name first then ignoring case.
    pub fn lookup(&self, name: &str) -> &[DfpOccurrence] {
        self.symbols
            .get(name)
            .or_else(|| {
                self.lowercase
                    .get(&name.to_ascii_lowercase())
                    .and_then(|symbol| self.symbols.get(symbol))
            })
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Symbols starting with `prefix`, ignoring case, in sorted order.
    pub fn with_prefix<'a>(&'a self, prefix: &str) -> impl Iterator<Item = &'a str> + 'a {
        let prefix = prefix.to_ascii_lowercase();
        self.symbol_list
            .iter()
            .filter(move |symbol| symbol.to_ascii_lowercase().starts_with(&prefix))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.scanned_files.is_empty()
    }

    pub fn summary(&self) -> DfpSummary {
        DfpSummary {
            pack_root: self.pack_root.clone(),
            device: self.device.clone(),
            dev_lib_name: self.dev_lib_name.clone(),
            symbol_count: self.symbol_list.len(),
            scanned_files: self.scanned_files.clone(),
            built_at: self.built_at.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_pack, create_test_dir};

    #[test]
    fn builds_from_explicit_pack_and_device() {
        let (_temp_dir, dir) = create_test_dir();
        let pack = dir.join("ATmega_DFP").join("3.0.0");
        create_pack(&pack, "ATmega328P");

        let settings = Settings {
            dfp_path: Some(pack.to_string_lossy().to_string()),
            device: Some("ATmega328P".to_string()),
            ..Settings::default()
        };
        let index = DfpIndex::build(&settings, &[]);

        assert_eq!(index.pack_root.as_deref(), Some(pack.as_path()));
        assert_eq!(index.dev_lib_name.as_deref(), Some("m328p"));
        assert_eq!(index.scanned_files.len(), 3);

        let kinds = index
            .lookup("PORTB")
            .iter()
            .map(|it| it.kind)
            .collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![SymbolKind::Macro, SymbolKind::Equ, SymbolKind::Atdf]
        );
        assert_eq!(index.lookup("portb").len(), 3);
        assert!(index.lookup("NOPE").is_empty());

        let mut sorted = index.symbol_list.clone();
        sorted.sort();
        assert_eq!(index.symbol_list, sorted);
    }

    #[test]
    fn device_falls_back_to_atdf_names() {
        let (_temp_dir, dir) = create_test_dir();
        let pack = dir.join("pack");
        create_pack(&pack, "ATtiny85");

        let settings = Settings {
            dfp_path: Some(pack.to_string_lossy().to_string()),
            ..Settings::default()
        };
        let index = DfpIndex::build(&settings, &[]);
        assert_eq!(index.device.as_deref(), Some("ATtiny85"));
        assert_eq!(index.scanned_files.len(), 3);
    }

    #[test]
    fn missing_pack_is_an_empty_index() {
        let (_temp_dir, dir) = create_test_dir();
        let settings = Settings {
            packs_directory: Some(dir.join("nothing").to_string_lossy().to_string()),
            ..Settings::default()
        };
        let index = DfpIndex::build(&settings, &[]);
        assert!(index.is_empty());
        assert!(index.symbol_list.is_empty());
    }

    #[test]
    fn occurrences_are_capped_per_symbol() {
        let (_temp_dir, dir) = create_test_dir();
        let inc = dir.join("many.inc");
        let text = (0..30)
            .map(|n| format!(".set COUNTER = {n}"))
            .collect::<Vec<_>>()
            .join("\n");
        std::fs::write(&inc, text).unwrap();

        let files = PackFiles {
            inc: Some(inc),
            ..Default::default()
        };
        let index = DfpIndex::scan(None, None, &files);
        assert_eq!(index.lookup("COUNTER").len(), MAX_OCCURRENCES_PER_SYMBOL);
        assert_eq!(index.lookup("COUNTER")[0].detail, ".set COUNTER = 0");
    }

    #[test]
    fn prefix_search_ignores_case() {
        let (_temp_dir, dir) = create_test_dir();
        let pack = dir.join("pack");
        create_pack(&pack, "ATmega328P");
        let listing = PackListing::read(&pack);
        let index = DfpIndex::scan(
            Some(pack),
            Some("ATmega328P".to_string()),
            &locate_files(&listing, "ATmega328P"),
        );

        let found = index.with_prefix("port").collect::<Vec<_>>();
        assert_eq!(found, vec!["PORTB"]);
    }
}
