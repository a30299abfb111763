//! MPLAB project metadata (`*.mplab.json`).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use super::DfpError;

const PROJECT_SUFFIX: &str = ".mplab.json";

#[derive(Deserialize, Debug)]
struct ProjectFile {
    #[serde(default)]
    configurations: Vec<ProjectConfiguration>,
}

#[derive(Deserialize, Debug)]
struct ProjectConfiguration {
    device: Option<String>,
    #[serde(default)]
    packs: Vec<PackRef>,
}

/// A pack a project configuration depends on.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PackRef {
    pub name: String,
    pub vendor: Option<String>,
    pub version: Option<String>,
}

/// What the first configuration of a project file says about the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    pub file: PathBuf,
    pub device: Option<String>,
    pub packs: Vec<PackRef>,
}

pub fn is_project_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(PROJECT_SUFFIX))
}

impl ProjectInfo {
    pub fn from_json(file: &Path, text: &str) -> Result<ProjectInfo, DfpError> {
        let project: ProjectFile =
            serde_json::from_str(text).map_err(|source| DfpError::Project {
                path: file.to_path_buf(),
                source,
            })?;

        let configuration = project
            .configurations
            .into_iter()
            .next()
            .ok_or_else(|| DfpError::EmptyProject(file.to_path_buf()))?;

        Ok(ProjectInfo {
            file: file.to_path_buf(),
            device: configuration
                .device
                .map(|device| device.trim().to_string())
                .filter(|device| !device.is_empty()),
            packs: configuration.packs,
        })
    }

    pub fn read(file: &Path) -> Result<ProjectInfo, DfpError> {
        let text = std::fs::read_to_string(file).map_err(|source| DfpError::Io {
            path: file.to_path_buf(),
            source,
        })?;
        ProjectInfo::from_json(file, &text)
    }

    /// First readable project file in a workspace root or its `.vscode`
    /// directory. Malformed files are skipped.
    pub fn discover(roots: &[PathBuf]) -> Option<ProjectInfo> {
        roots
            .iter()
            .flat_map(|root| [root.clone(), root.join(".vscode")])
            .flat_map(|dir| project_files(&dir))
            .find_map(|file| match ProjectInfo::read(&file) {
                Ok(project) => {
                    debug!(file = %file.display(), device = ?project.device, "found project file");
                    Some(project)
                }
                Err(err) => {
                    warn!("skipping project file: {err}");
                    None
                }
            })
    }
}

fn project_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_project_file(path))
        .collect();
    files.sort();
    files
}
