//! The workspace as the providers see it: open buffers plus files on disk.
//!
//! [`Workspace`] is the capability the workspace-wide providers depend on;
//! the server hands them a [`DiskWorkspace`] snapshot, tests may hand them
//! anything else.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use glob::Pattern;
use itertools::Itertools;
use rayon::prelude::*;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::Settings;

/// Files larger than this are not read while scanning the workspace.
pub const MAX_SCAN_FILE_BYTES: u64 = 2 * 1024 * 1024;

pub trait Workspace: Sync {
    /// Open buffers; their text wins over what is on disk.
    fn open_documents(&self) -> Vec<(PathBuf, String)>;

    /// Files matching any of the patterns, at most `limit` of them.
    fn find_files(&self, patterns: &[Pattern], limit: usize) -> Vec<PathBuf>;

    fn read_file(&self, path: &Path) -> Option<String>;
}

/// A file's text, from an open buffer or from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
}

#[derive(Debug, Default, Clone)]
pub struct DiskWorkspace {
    roots: Vec<PathBuf>,
    open: HashMap<PathBuf, String>,
}

impl DiskWorkspace {
    pub fn new(roots: Vec<PathBuf>, open: HashMap<PathBuf, String>) -> DiskWorkspace {
        DiskWorkspace { roots, open }
    }
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

impl Workspace for DiskWorkspace {
    fn open_documents(&self) -> Vec<(PathBuf, String)> {
        self.open
            .iter()
            .map(|(path, text)| (path.clone(), text.clone()))
            .sorted()
            .collect()
    }

    fn find_files(&self, patterns: &[Pattern], limit: usize) -> Vec<PathBuf> {
        let mut found = Vec::new();

        for root in &self.roots {
            let files = WalkDir::new(root)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| !is_hidden(entry))
                .flatten()
                .filter(|entry| entry.file_type().is_file())
                .filter(|entry| {
                    let relative = pathdiff::diff_paths(entry.path(), root)
                        .unwrap_or_else(|| entry.path().to_path_buf());
                    patterns
                        .iter()
                        .any(|pattern| pattern.matches_path(&relative))
                });

            for entry in files {
                if found.len() >= limit {
                    return found;
                }
                found.push(entry.into_path());
            }
        }

        found
    }

    fn read_file(&self, path: &Path) -> Option<String> {
        let metadata = std::fs::metadata(path).ok()?;
        if metadata.len() > MAX_SCAN_FILE_BYTES {
            debug!(path = %path.display(), "skipping large file");
            return None;
        }
        let bytes = std::fs::read(path).ok()?;
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}

pub fn compile_globs(globs: &[String]) -> Vec<Pattern> {
    globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(pattern) => Some(pattern),
            Err(err) => {
                warn!("ignoring workspace glob {glob:?}: {err}");
                None
            }
        })
        .collect()
}

/// Open buffers first, then matching files on disk that are not open.
/// Only the disk files count against `max_workspace_scan_files`.
pub fn collect_sources(workspace: &impl Workspace, settings: &Settings) -> Vec<SourceFile> {
    let open = workspace.open_documents();
    let open_paths: HashSet<&PathBuf> = open.iter().map(|(path, _)| path).collect();

    let patterns = compile_globs(&settings.workspace_globs);
    let on_disk = workspace
        .find_files(&patterns, settings.max_workspace_scan_files + open.len())
        .into_iter()
        .filter(|path| !open_paths.contains(path))
        .take(settings.max_workspace_scan_files)
        .collect_vec();

    let from_disk = on_disk
        .par_iter()
        .filter_map(|path| {
            workspace.read_file(path).map(|text| SourceFile {
                path: path.clone(),
                text,
            })
        })
        .collect::<Vec<_>>();

    open.iter()
        .map(|(path, text)| SourceFile {
            path: path.clone(),
            text: text.clone(),
        })
        .chain(from_disk)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::test_utils::create_test_dir;

    #[test]
    fn finds_files_by_glob_and_skips_hidden() {
        let (_temp_dir, root) = create_test_dir();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("main.asm"), "main:").unwrap();
        fs::write(root.join("src").join("util.inc"), "util:").unwrap();
        fs::write(root.join("src").join("notes.txt"), "x:").unwrap();
        fs::write(root.join(".git").join("hidden.asm"), "x:").unwrap();

        let workspace = DiskWorkspace::new(vec![root.clone()], HashMap::new());
        let patterns = compile_globs(&Settings::default().workspace_globs);
        let files = workspace.find_files(&patterns, 10);

        assert_eq!(
            files,
            vec![root.join("main.asm"), root.join("src").join("util.inc")]
        );
        assert_eq!(workspace.find_files(&patterns, 1).len(), 1);
    }

    #[test]
    fn open_buffers_are_authoritative() {
        let (_temp_dir, root) = create_test_dir();
        fs::write(root.join("a.asm"), "on_disk:").unwrap();
        fs::write(root.join("b.asm"), "other:").unwrap();

        let open = HashMap::from([(root.join("a.asm"), "in_buffer:".to_string())]);
        let workspace = DiskWorkspace::new(vec![root.clone()], open);
        let sources = collect_sources(&workspace, &Settings::default());

        assert_eq!(
            sources,
            vec![
                SourceFile {
                    path: root.join("a.asm"),
                    text: "in_buffer:".to_string(),
                },
                SourceFile {
                    path: root.join("b.asm"),
                    text: "other:".to_string(),
                },
            ]
        );
    }

    #[test]
    fn disk_files_are_capped() {
        let (_temp_dir, root) = create_test_dir();
        for n in 0..5 {
            fs::write(root.join(format!("f{n}.asm")), "x:").unwrap();
        }
        let workspace = DiskWorkspace::new(vec![root], HashMap::new());
        let settings = Settings {
            max_workspace_scan_files: 3,
            ..Settings::default()
        };
        assert_eq!(collect_sources(&workspace, &settings).len(), 3);
    }
}
