//! Command line interface of the `avrasm-lsp` binary.
//!
//! Without a subcommand the binary serves LSP on stdio; the other
//! subcommands run the symbol parsers once and print what they found.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use crate::{config::Settings, dfp::DfpIndex, local::LocalSymbols};

#[derive(Parser, Debug)]
#[command(name = "avrasm-lsp", version)]
#[command(about = "Language Server for AVR assembly with Device Family Pack lookups")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Accepted for editors that always pass it; stdio is the only transport
    #[arg(long, global = true)]
    pub stdio: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the language server on stdin/stdout (the default)
    Serve,
    /// Print the labels, `.equ` and `.set` definitions of a file
    Symbols { file: PathBuf },
    /// Build the Device Family Pack index and print a summary as JSON
    Index {
        #[command(flatten)]
        pack: PackArgs,
        /// Workspace root searched for `*.mplab.json` project files
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Print the pack occurrences of a symbol
    Lookup {
        symbol: String,
        #[command(flatten)]
        pack: PackArgs,
    },
}

#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub struct PackArgs {
    /// Pack root, e.g. ~/.mchp_packs/Microchip/ATmega_DFP/3.1.264
    #[arg(long)]
    pub pack: Option<PathBuf>,
    /// Device name, e.g. ATmega328P
    #[arg(long)]
    pub device: Option<String>,
}

impl PackArgs {
    /// Settings from the current directory with the flags on top.
    fn settings(&self, root: Option<&Path>) -> anyhow::Result<Settings> {
        let mut settings = Settings::new(root)?;
        if let Some(pack) = &self.pack {
            settings.dfp_path = Some(pack.to_string_lossy().to_string());
        }
        if let Some(device) = &self.device {
            settings.device = Some(device.clone());
        }
        Ok(settings)
    }
}

pub fn symbols(file: &Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let text = String::from_utf8_lossy(&bytes);
    let symbols = LocalSymbols::parse(&text);

    Ok(symbols
        .entries()
        .iter()
        .map(|symbol| {
            format!(
                "{}:{}\t{}\t{}\t{}",
                symbol.line + 1,
                symbol.column + 1,
                symbol.kind,
                symbol.symbol,
                symbol.detail
            )
        })
        .collect::<Vec<_>>()
        .join("\n"))
}

pub fn index(pack: &PackArgs, root: Option<PathBuf>) -> anyhow::Result<String> {
    let root = match root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    let settings = pack.settings(Some(&root))?;
    let index = DfpIndex::build(&settings, &[root]);
    Ok(serde_json::to_string_pretty(&index.summary())?)
}

pub fn lookup(symbol: &str, pack: &PackArgs) -> anyhow::Result<String> {
    let root = std::env::current_dir()?;
    let settings = pack.settings(Some(&root))?;
    let index = DfpIndex::build(&settings, &[root]);

    let occurrences = index.lookup(symbol);
    if occurrences.is_empty() {
        anyhow::bail!("{symbol} not found in the device pack");
    }

    Ok(occurrences
        .iter()
        .map(|occurrence| {
            format!(
                "{}:{}:{}\t{}\t{}",
                occurrence.file.display(),
                occurrence.line + 1,
                occurrence.column + 1,
                occurrence.kind,
                occurrence.detail
            )
        })
        .collect::<Vec<_>>()
        .join("\n"))
}
