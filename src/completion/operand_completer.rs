use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionItemLabelDetails, CompletionTextEdit, Range,
    TextEdit,
};

use crate::{
    dfp::DfpOccurrence,
    instructions::{Register, REGISTERS},
    local::{LocalSymbol, SymbolKind},
};

use super::{partial_range, statement_before_cursor, Completable, Completer, Context};

/// Completes operands: registers, then symbols of this file, then pack symbols.
pub struct OperandCompleter<'a> {
    context: Context<'a>,
    partial: String,
    range: Range,
}

/// A mnemonic or directive followed by whitespace; the rest is operands.
static OPERANDS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\.?[A-Za-z_]\w*\s+(?<operands>.*)$").unwrap());
static PARTIAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\w.]*$").unwrap());

impl<'a> Completer<'a> for OperandCompleter<'a> {
    fn construct(context: Context<'a>, line: usize, character: usize) -> Option<Self>
    where
        Self: Sized + Completer<'a>,
    {
        let statement = statement_before_cursor(&context, line, character)?;
        let operands = OPERANDS_RE.captures(&statement)?.name("operands")?.as_str();

        // inside a string literal, e.g. `.include "m328`
        if operands.matches('"').count() % 2 == 1 {
            return None;
        }

        let partial = PARTIAL_RE.find(operands)?.as_str();
        if partial.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }

        Some(OperandCompleter {
            context,
            partial: partial.to_string(),
            range: partial_range(line, character, partial.chars().count()),
        })
    }

    fn completions(&self) -> Vec<impl Completable<'a, Self>>
    where
        Self: Sized,
    {
        let prefix = self.partial.to_ascii_lowercase();
        let matches = |name: &str| name.to_ascii_lowercase().starts_with(&prefix);

        let registers = REGISTERS
            .iter()
            .enumerate()
            .filter(|(_, register)| matches(register.name.as_str()))
            .map(|(n, register)| OperandCandidate::Register(n, register));

        let local = self
            .context
            .local
            .entries()
            .iter()
            .filter(|symbol| matches(symbol.symbol.as_str()))
            .map(OperandCandidate::Local);

        // pack symbols shadowed by a local definition are listed once
        let local_names = self
            .context
            .local
            .entries()
            .iter()
            .map(|symbol| symbol.symbol.to_ascii_lowercase())
            .collect::<HashSet<_>>();
        let local_names = &local_names;
        let partial = self.partial.as_str();
        let pack = self.context.dfp.into_iter().flat_map(move |index| {
            index
                .with_prefix(partial)
                .filter(move |symbol| !local_names.contains(&symbol.to_ascii_lowercase()))
                .map(move |symbol| OperandCandidate::Pack(symbol, index.lookup(symbol).first()))
        });

        registers.chain(local).chain(pack).collect::<Vec<_>>()
    }

    fn replace_range(&self) -> Range {
        self.range
    }
}

enum OperandCandidate<'a> {
    Register(usize, &'a Register),
    Local(&'a LocalSymbol),
    Pack(&'a str, Option<&'a DfpOccurrence>),
}

impl<'a> Completable<'a, OperandCompleter<'a>> for OperandCandidate<'a> {
    fn completions(&self, completer: &OperandCompleter<'a>) -> Option<CompletionItem> {
        let (label, kind, detail, sort_text, description) = match *self {
            OperandCandidate::Register(n, register) => (
                register.name.as_str(),
                CompletionItemKind::VARIABLE,
                register.description.clone(),
                format!("0_{n:02}"),
                None,
            ),
            OperandCandidate::Local(symbol) => (
                symbol.symbol.as_str(),
                symbol.kind.completion_kind(),
                match symbol.kind {
                    SymbolKind::Label => symbol.kind.to_string(),
                    kind => format!(".{kind} {} {}", symbol.symbol, symbol.detail),
                },
                format!("0_{}", symbol.symbol),
                None,
            ),
            OperandCandidate::Pack(symbol, occurrence) => (
                symbol,
                occurrence
                    .map(|it| it.kind.completion_kind())
                    .unwrap_or(CompletionItemKind::CONSTANT),
                occurrence.map(|it| it.detail.clone()).unwrap_or_default(),
                format!("1_{symbol}"),
                occurrence.map(DfpOccurrence::file_name),
            ),
        };

        Some(CompletionItem {
            label: label.to_string(),
            kind: Some(kind),
            detail: Some(detail),
            label_details: description.map(|description| CompletionItemLabelDetails {
                detail: None,
                description: Some(description),
            }),
            sort_text: Some(sort_text),
            filter_text: Some(label.to_string()),
            text_edit: Some(CompletionTextEdit::Edit(TextEdit {
                range: completer.replace_range(),
                new_text: label.to_string(),
            })),
            ..Default::default()
        })
    }
}
