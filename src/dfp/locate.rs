//! Finding the pack root, the device and the files to scan inside a pack.

use std::path::{Path, PathBuf};

use itertools::Itertools;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{compare_versions, ProjectInfo};
use crate::config::Settings;

/// Deep enough for `<pack>/avrasm/inc` and `<pack>/include/avr`.
const PACK_SCAN_DEPTH: usize = 6;

/// The files of a pack grouped by the scanner that reads them.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PackListing {
    pub headers: Vec<PathBuf>,
    pub incs: Vec<PathBuf>,
    pub atdfs: Vec<PathBuf>,
}

impl PackListing {
    pub fn read(pack_root: &Path) -> PackListing {
        let mut listing = PackListing::default();

        for entry in WalkDir::new(pack_root)
            .max_depth(PACK_SCAN_DEPTH)
            .into_iter()
            .flatten()
            .filter(|entry| entry.file_type().is_file())
        {
            let path = entry.into_path();
            match extension(&path).as_deref() {
                Some("h") => listing.headers.push(path),
                Some("inc") => listing.incs.push(path),
                Some("atdf") => listing.atdfs.push(path),
                _ => {}
            }
        }

        listing.headers.sort();
        listing.incs.sort();
        listing.atdfs.sort();
        listing
    }
}

/// The header, `.inc` and `.atdf` chosen for one device.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PackFiles {
    pub header: Option<PathBuf>,
    pub inc: Option<PathBuf>,
    pub atdf: Option<PathBuf>,
}

impl PackFiles {
    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        [&self.header, &self.inc, &self.atdf].into_iter().flatten()
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

fn file_name_lowercase(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_ascii_lowercase())
}

fn is_dir(path: &Path) -> bool {
    path.is_dir()
}

/// Pack root by precedence: explicit setting, project packs, default discovery.
pub fn resolve_pack_root(
    settings: &Settings,
    project: Option<&ProjectInfo>,
    device: Option<&str>,
) -> Option<PathBuf> {
    if let Some(explicit) = settings.dfp_path() {
        if is_dir(&explicit) {
            debug!(path = %explicit.display(), "using configured pack root");
            return Some(explicit);
        }
        warn!(path = %explicit.display(), "configured pack root is not a directory");
    }

    let packs_dir = settings.packs_directory();

    if let Some(project) = project {
        for pack in &project.packs {
            let family_dir = pack
                .vendor
                .as_deref()
                .filter(|vendor| packs_dir.file_name().and_then(|it| it.to_str()) != Some(*vendor))
                .and_then(|vendor| packs_dir.parent().map(|parent| parent.join(vendor)))
                .filter(|dir| is_dir(dir))
                .unwrap_or_else(|| packs_dir.clone())
                .join(&pack.name);

            let resolved = match &pack.version {
                Some(version) => Some(family_dir.join(version)).filter(|dir| is_dir(dir)),
                None => highest_version_dir(&family_dir),
            };

            if let Some(resolved) = resolved {
                debug!(path = %resolved.display(), "using project pack");
                return Some(resolved);
            }
        }
    }

    discover_default_pack(&packs_dir, device)
}

fn version_dirs(family_dir: &Path) -> Vec<(String, PathBuf)> {
    let Ok(entries) = std::fs::read_dir(family_dir) else {
        return Vec::new();
    };

    entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| is_dir(path))
        .filter_map(|path| {
            let version = path.file_name()?.to_str()?.to_string();
            Some((version, path))
        })
        .collect()
}

/// The newest `<version>` directory below a pack family directory.
pub fn highest_version_dir(family_dir: &Path) -> Option<PathBuf> {
    version_dirs(family_dir)
        .into_iter()
        .max_by(|(a, _), (b, _)| compare_versions(a, b))
        .map(|(_, path)| path)
}

struct PackCandidate {
    family: String,
    version: String,
    path: PathBuf,
}

/// Look through every `<family>/<version>` directory under the vendor
/// directory. Packs that describe the device are preferred, then the highest
/// version; equal versions go to the alphabetically first family.
pub fn discover_default_pack(packs_dir: &Path, device: Option<&str>) -> Option<PathBuf> {
    let Ok(families) = std::fs::read_dir(packs_dir) else {
        debug!(dir = %packs_dir.display(), "no packs directory");
        return None;
    };

    let candidates = families
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| is_dir(path))
        .flat_map(|family_dir| {
            let family = family_dir
                .file_name()
                .and_then(|it| it.to_str())
                .unwrap_or_default()
                .to_string();
            version_dirs(&family_dir)
                .into_iter()
                .map(move |(version, path)| PackCandidate {
                    family: family.clone(),
                    version,
                    path,
                })
        })
        .collect_vec();

    let describing_device = match device {
        Some(device) => candidates
            .iter()
            .filter(|candidate| pack_describes_device(&candidate.path, device))
            .collect_vec(),
        None => Vec::new(),
    };

    let pool = if describing_device.is_empty() {
        candidates.iter().collect_vec()
    } else {
        describing_device
    };

    pool.into_iter()
        .max_by(|a, b| {
            compare_versions(&a.version, &b.version).then_with(|| b.family.cmp(&a.family))
        })
        .map(|candidate| candidate.path.clone())
}

fn pack_describes_device(pack_root: &Path, device: &str) -> bool {
    let wanted = format!("{}.atdf", device.to_ascii_lowercase());
    WalkDir::new(pack_root)
        .max_depth(PACK_SCAN_DEPTH)
        .into_iter()
        .flatten()
        .any(|entry| file_name_lowercase(entry.path()).as_deref() == Some(wanted.as_str()))
}

/// Best effort device name from the `.atdf` files of a pack: the shortest
/// stem is taken as the most generic, ties go to the lexically first.
pub fn device_from_atdf_names(atdfs: &[PathBuf]) -> Option<String> {
    atdfs
        .iter()
        .filter_map(|path| path.file_stem()?.to_str())
        .min_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
        .map(str::to_string)
}

/// Device by precedence: explicit setting, project device, pack `.atdf` names.
pub fn resolve_device(
    settings: &Settings,
    project: Option<&ProjectInfo>,
    listing: Option<&PackListing>,
) -> Option<String> {
    settings
        .device()
        .filter(|device| !device.is_empty())
        .map(str::to_string)
        .or_else(|| project.and_then(|project| project.device.clone()))
        .or_else(|| listing.and_then(|listing| device_from_atdf_names(&listing.atdfs)))
}

/// The name device headers and include files are built from, e.g.
/// `ATmega328P` -> `m328p`, `ATtiny85` -> `tn85`.
pub fn dev_lib_name(device: &str) -> String {
    let lower = device.trim().to_ascii_lowercase();
    for (prefix, replacement) in [
        ("atxmega", "x"),
        ("atmega", "m"),
        ("attiny", "tn"),
        ("at90", "90"),
    ] {
        if let Some(rest) = lower.strip_prefix(prefix) {
            return format!("{replacement}{rest}");
        }
    }
    lower
}

/// Exact file name first, then the shortest (then lexically first) name
/// containing the token.
fn pick_file(candidates: &[PathBuf], exact: &str, token: &str) -> Option<PathBuf> {
    let named = candidates
        .iter()
        .filter_map(|path| Some((file_name_lowercase(path)?, path)))
        .collect_vec();

    if let Some((_, path)) = named.iter().find(|(name, _)| name == exact) {
        return Some((*path).clone());
    }

    named
        .into_iter()
        .filter(|(name, _)| name.contains(token))
        .sorted_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
        .next()
        .map(|(_, path)| path.clone())
}

pub fn locate_files(listing: &PackListing, device: &str) -> PackFiles {
    let device = device.trim().to_ascii_lowercase();
    let lib = dev_lib_name(&device);

    PackFiles {
        header: pick_file(&listing.headers, &format!("io{lib}.h"), &lib),
        inc: pick_file(&listing.incs, &format!("{lib}def.inc"), &lib),
        atdf: pick_file(&listing.atdfs, &format!("{device}.atdf"), &device),
    }
}
