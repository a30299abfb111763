//! Hover provider for AVR assembly.
//!
//! This module implements the LSP `textDocument/hover` capability for the
//! symbol under the cursor.
//!
//! # Hover Sections
//!
//! | Source | Shows |
//! |--------|-------|
//! | Local definition | Kind, line and value of the label / `.equ` / `.set` |
//! | Built-in | Instruction signature and summary, register description |
//! | Device Family Pack | Up to `maxHoverResults` occurrences with file and line |
//!
//! Sections are separated by a horizontal rule. Hover can be disabled via
//! [`Settings::enable_hover`].

use itertools::Itertools;
use tower_lsp::lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind, Position};

use crate::{
    config::Settings,
    dfp::DfpIndex,
    document::Document,
    instructions::{instruction, register},
    local::{LocalSymbol, LocalSymbols, SymbolKind},
};

/// Generate hover content for the word at `position`.
///
/// Returns `None` when hover is disabled, the cursor is not on a word or
/// nothing is known about the word.
pub fn hover(
    document: &Document,
    local: &LocalSymbols,
    dfp: Option<&DfpIndex>,
    position: Position,
    settings: &Settings,
) -> Option<Hover> {
    if !settings.enable_hover {
        return None;
    }

    let (word, range) = document.word_at(position)?;

    let mut sections = Vec::new();

    if let Some(symbol) = local.get(&word) {
        sections.push(local_section(symbol));
    }

    if let Some(instruction) = instruction(&word) {
        sections.push(format!(
            "**{}** `{}`\n\n{}",
            instruction.mnemonic, instruction.operands, instruction.summary
        ));
    } else if let Some(register) = register(&word) {
        sections.push(format!("**{}**: {}", register.name, register.description));
    }

    if let Some(index) = dfp {
        let occurrences = index.lookup(&word);
        if !occurrences.is_empty() {
            let mut section = occurrences
                .iter()
                .take(settings.max_hover_results)
                .map(|occurrence| {
                    format!(
                        "**{}** ({}) `{}:{}`\n\n`{}`",
                        occurrence.symbol,
                        occurrence.kind,
                        occurrence.file_name(),
                        occurrence.line + 1,
                        occurrence.detail
                    )
                })
                .join("\n\n");

            let hidden = occurrences.len().saturating_sub(settings.max_hover_results);
            if hidden > 0 {
                section.push_str(&format!("\n\n_{hidden} more in the device pack_"));
            }
            sections.push(section);
        }
    }

    if sections.is_empty() {
        return None;
    }

    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: sections.join("\n\n---\n\n"),
        }),
        range: Some(range),
    })
}

fn local_section(symbol: &LocalSymbol) -> String {
    let line = symbol.line + 1;
    match symbol.kind {
        SymbolKind::Label => format!("**{}** (label, line {line})", symbol.symbol),
        kind => format!(
            "**{}** (.{kind}, line {line})\n\n`.{kind} {} {}`",
            symbol.symbol, symbol.symbol, symbol.detail
        ),
    }
}
