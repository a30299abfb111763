use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context as _};
use config::{Config, File};
use serde::Deserialize;
use serde_json::Value;

/// Section name the client stores our settings under.
pub const SETTINGS_SECTION: &str = "avrasm";

/// Per-workspace settings file, same keys as the client section.
pub const SETTINGS_FILE: &str = ".avrasm.json";

const DEFAULT_PACKS_DIRECTORY: &str = "~/.mchp_packs/Microchip";

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Settings {
    pub enable_hover: bool,
    pub enable_definition: bool,
    pub enable_completion: bool,
    pub enable_document_symbols: bool,
    pub enable_workspace_symbols: bool,
    pub enable_references: bool,
    /// Build and consult the Device Family Pack index
    pub enable_dfp: bool,
    /// Explicit pack root; wins over project detection and default discovery
    pub dfp_path: Option<String>,
    /// Explicit device name, e.g. `ATmega328P`
    pub device: Option<String>,
    /// Vendor directory holding `<family>/<version>` pack folders
    pub packs_directory: Option<String>,
    pub max_hover_results: usize,
    pub max_completion_items: usize,
    pub max_workspace_scan_files: usize,
    pub max_workspace_symbols: usize,
    pub max_reference_results: usize,
    #[serde(default = "default_workspace_globs")]
    pub workspace_globs: Vec<String>,
}

fn default_workspace_globs() -> Vec<String> {
    vec![
        "**/*.asm".to_string(),
        "**/*.inc".to_string(),
        "**/*.s".to_string(),
    ]
}

/// The camelCase shape clients send through `initializationOptions` and
/// `workspace/didChangeConfiguration`. Every key is optional and only
/// overrides what it names.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct ClientSettings {
    enable_hover: Option<bool>,
    enable_definition: Option<bool>,
    enable_completion: Option<bool>,
    enable_document_symbols: Option<bool>,
    enable_workspace_symbols: Option<bool>,
    enable_references: Option<bool>,
    enable_dfp: Option<bool>,
    dfp_path: Option<String>,
    device: Option<String>,
    packs_directory: Option<String>,
    max_hover_results: Option<usize>,
    max_completion_items: Option<usize>,
    max_workspace_scan_files: Option<usize>,
    max_workspace_symbols: Option<usize>,
    max_reference_results: Option<usize>,
    workspace_globs: Option<Vec<String>>,
}

impl Settings {
    /// Layer the user settings file and `<root>/.avrasm` over the defaults.
    pub fn new(root_dir: Option<&Path>) -> anyhow::Result<Settings> {
        let expanded = shellexpand::tilde("~/.config/avrasm/settings");
        let mut builder = Config::builder().add_source(File::with_name(&expanded).required(false));

        if let Some(root_dir) = root_dir {
            builder = builder.add_source(
                File::with_name(&format!(
                    "{}/.avrasm",
                    root_dir
                        .to_str()
                        .ok_or(anyhow!("Can't convert root_dir to str"))?
                ))
                .required(false),
            );
        }

        let settings = builder
            .set_default("enable_hover", true)?
            .set_default("enable_definition", true)?
            .set_default("enable_completion", true)?
            .set_default("enable_document_symbols", true)?
            .set_default("enable_workspace_symbols", true)?
            .set_default("enable_references", true)?
            .set_default("enable_dfp", true)?
            .set_default("max_hover_results", 5)?
            .set_default("max_completion_items", 200)?
            .set_default("max_workspace_scan_files", 2000)?
            .set_default("max_workspace_symbols", 500)?
            .set_default("max_reference_results", 1000)?
            .build()
            .map_err(|err| anyhow!("Build err: {err}"))?;

        let mut settings = settings.try_deserialize::<Settings>()?;

        // `config` lowercases keys, so the camelCase spelling is applied here
        if let Some(root_dir) = root_dir {
            let path = root_dir.join(SETTINGS_FILE);
            if path.is_file() {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                let value: Value = serde_json::from_str(&text)
                    .with_context(|| format!("parsing {}", path.display()))?;
                settings
                    .apply_client_settings(&value)
                    .with_context(|| format!("applying {}", path.display()))?;
            }
        }

        anyhow::Ok(settings)
    }

    /// Apply client supplied overrides. Accepts either the whole settings
    /// object (`{"avrasm": {...}}`) or the section itself.
    pub fn apply_client_settings(&mut self, value: &Value) -> anyhow::Result<()> {
        let section = value.get(SETTINGS_SECTION).unwrap_or(value);
        if section.is_null() {
            return Ok(());
        }

        let client: ClientSettings = serde_json::from_value(section.clone())?;

        macro_rules! apply {
            ($($field:ident),*) => {
                $(if let Some(value) = client.$field {
                    self.$field = value;
                })*
            };
        }
        apply!(
            enable_hover,
            enable_definition,
            enable_completion,
            enable_document_symbols,
            enable_workspace_symbols,
            enable_references,
            enable_dfp,
            max_hover_results,
            max_completion_items,
            max_workspace_scan_files,
            max_workspace_symbols,
            max_reference_results,
            workspace_globs
        );

        // An empty string clears the override
        if let Some(path) = client.dfp_path {
            self.dfp_path = Some(path).filter(|it| !it.trim().is_empty());
        }
        if let Some(device) = client.device {
            self.device = Some(device).filter(|it| !it.trim().is_empty());
        }
        if let Some(dir) = client.packs_directory {
            self.packs_directory = Some(dir).filter(|it| !it.trim().is_empty());
        }

        Ok(())
    }

    pub fn dfp_path(&self) -> Option<PathBuf> {
        self.dfp_path
            .as_deref()
            .map(|path| PathBuf::from(shellexpand::tilde(path).as_ref()))
    }

    pub fn packs_directory(&self) -> PathBuf {
        let dir = self
            .packs_directory
            .as_deref()
            .unwrap_or(DEFAULT_PACKS_DIRECTORY);
        PathBuf::from(shellexpand::tilde(dir).as_ref())
    }

    pub fn device(&self) -> Option<&str> {
        self.device.as_deref().map(str::trim)
    }
}

/// Whether a `workspace/didChangeConfiguration` payload concerns our section.
/// Pull-model clients send `null`, which we treat as "maybe".
pub fn touches_section(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty() || map.contains_key(SETTINGS_SECTION),
        _ => false,
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            enable_hover: true,
            enable_definition: true,
            enable_completion: true,
            enable_document_symbols: true,
            enable_workspace_symbols: true,
            enable_references: true,
            enable_dfp: true,
            dfp_path: None,
            device: None,
            packs_directory: None,
            max_hover_results: 5,
            max_completion_items: 200,
            max_workspace_scan_files: 2000,
            max_workspace_symbols: 500,
            max_reference_results: 1000,
            workspace_globs: default_workspace_globs(),
        }
    }
}
