//! Symbols defined in the document being edited.
//!
//! Every line is matched against three patterns in priority order (label,
//! `.equ`, `.set`); the first match wins. Parsing is a pure function of the
//! text, and the cache keyed by URI and version only ever replaces whole
//! results.

use std::{
    collections::HashMap,
    fmt::{self, Display},
    sync::Arc,
};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tower_lsp::lsp_types::{Location, Position, Range, Url};
use tracing::debug;

/// Kinds of symbols this server knows about, from local text and from packs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Label,
    Equ,
    Set,
    Macro,
    Enum,
    Atdf,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Label => "label",
            SymbolKind::Equ => "equ",
            SymbolKind::Set => "set",
            SymbolKind::Macro => "macro",
            SymbolKind::Enum => "enum",
            SymbolKind::Atdf => "atdf",
        }
    }

    pub fn completion_kind(&self) -> tower_lsp::lsp_types::CompletionItemKind {
        use tower_lsp::lsp_types::CompletionItemKind;
        match self {
            SymbolKind::Label => CompletionItemKind::FUNCTION,
            SymbolKind::Equ | SymbolKind::Macro => CompletionItemKind::CONSTANT,
            SymbolKind::Set => CompletionItemKind::VARIABLE,
            SymbolKind::Enum => CompletionItemKind::ENUM_MEMBER,
            SymbolKind::Atdf => CompletionItemKind::FIELD,
        }
    }

    pub fn lsp_kind(&self) -> tower_lsp::lsp_types::SymbolKind {
        use tower_lsp::lsp_types::SymbolKind as Lsp;
        match self {
            SymbolKind::Label => Lsp::FUNCTION,
            SymbolKind::Equ | SymbolKind::Macro => Lsp::CONSTANT,
            SymbolKind::Set => Lsp::VARIABLE,
            SymbolKind::Enum => Lsp::ENUM_MEMBER,
            SymbolKind::Atdf => Lsp::FIELD,
        }
    }
}

impl Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSymbol {
    pub symbol: String,
    pub kind: SymbolKind,
    pub line: u32,
    pub column: u32,
    pub detail: String,
}

impl LocalSymbol {
    pub fn range(&self) -> Range {
        Range {
            start: Position {
                line: self.line,
                character: self.column,
            },
            end: Position {
                line: self.line,
                character: self.column + self.symbol.chars().count() as u32,
            },
        }
    }

    pub fn location(&self, uri: &Url) -> Location {
        Location {
            uri: uri.clone(),
            range: self.range(),
        }
    }
}

static LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?<name>[A-Za-z_][\w.]*)\s*:").unwrap());
static EQU_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*\.equ\s+(?<name>[A-Za-z_]\w*)\s*=\s*(?<value>.*)$").unwrap());
static SET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*\.set\s+(?<name>[A-Za-z_]\w*)\s*=\s*(?<value>.*)$").unwrap());

/// Drop a trailing `;` or `//` comment.
pub fn strip_comment(text: &str) -> &str {
    let cut = [text.find(';'), text.find("//")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(text.len());
    text[..cut].trim()
}

/// A definition found on a single line: name, kind, character column and detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineDefinition {
    pub name: String,
    pub kind: SymbolKind,
    pub column: u32,
    pub detail: String,
}

/// Apply the label, `.equ` and `.set` patterns to one line, first match wins.
pub fn classify_definition(line: &str) -> Option<LineDefinition> {
    let (captures, kind) = LABEL_RE
        .captures(line)
        .map(|it| (it, SymbolKind::Label))
        .or_else(|| EQU_RE.captures(line).map(|it| (it, SymbolKind::Equ)))
        .or_else(|| SET_RE.captures(line).map(|it| (it, SymbolKind::Set)))?;

    let name = captures.name("name")?;
    let detail = match captures.name("value") {
        Some(value) => format!("= {}", strip_comment(value.as_str())),
        None => "label".to_string(),
    };

    Some(LineDefinition {
        name: name.as_str().to_string(),
        kind,
        column: line[..name.start()].chars().count() as u32,
        detail,
    })
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LocalSymbols {
    map: HashMap<String, LocalSymbol>,
    entries: Vec<LocalSymbol>,
}

impl LocalSymbols {
    pub fn parse(text: &str) -> LocalSymbols {
        let mut symbols = LocalSymbols::default();

        for (line_nr, line) in text.lines().enumerate() {
            let Some(definition) = classify_definition(line) else {
                continue;
            };

            let symbol = LocalSymbol {
                symbol: definition.name,
                kind: definition.kind,
                line: line_nr as u32,
                column: definition.column,
                detail: definition.detail,
            };

            if !symbols.map.contains_key(&symbol.symbol) {
                symbols.entries.push(symbol.clone());
            }
            symbols.map.insert(symbol.symbol.clone(), symbol);
        }

        symbols
    }

    /// Exact match first, then ASCII case-insensitive like the assembler.
    pub fn get(&self, name: &str) -> Option<&LocalSymbol> {
        self.map.get(name).or_else(|| {
            self.entries
                .iter()
                .find(|entry| entry.symbol.eq_ignore_ascii_case(name))
                .and_then(|entry| self.map.get(&entry.symbol))
        })
    }

    /// One entry per symbol, in order of first definition.
    pub fn entries(&self) -> &[LocalSymbol] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parsed symbols of open documents keyed by URI and version.
#[derive(Debug, Default)]
pub struct LocalSymbolCache {
    entries: HashMap<Url, (i32, Arc<LocalSymbols>)>,
}

impl LocalSymbolCache {
    pub fn get_or_parse(&mut self, uri: &Url, version: i32, text: &str) -> Arc<LocalSymbols> {
        if let Some((cached_version, symbols)) = self.entries.get(uri) {
            if *cached_version == version {
                return symbols.clone();
            }
        }

        debug!(%uri, version, "parsing local symbols");
        let symbols = Arc::new(LocalSymbols::parse(text));
        self.entries.insert(uri.clone(), (version, symbols.clone()));
        symbols
    }

    pub fn evict(&mut self, uri: &Url) {
        self.entries.remove(uri);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
