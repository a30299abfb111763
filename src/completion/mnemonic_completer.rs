use once_cell::sync::Lazy;
use regex::Regex;
use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionTextEdit, Documentation, Range, TextEdit,
};

use crate::instructions::{instruction, Instruction, DIRECTIVES, INSTRUCTIONS};

use super::{partial_range, statement_before_cursor, Completable, Completer, Context};

/// Completes the first token of a statement: instructions and directives.
pub struct MnemonicCompleter {
    partial: String,
    range: Range,
}

static MNEMONIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?<partial>\.?(?:[A-Za-z_]\w*)?)$").unwrap());

impl<'a> Completer<'a> for MnemonicCompleter {
    fn construct(context: Context<'a>, line: usize, character: usize) -> Option<Self>
    where
        Self: Sized + Completer<'a>,
    {
        let statement = statement_before_cursor(&context, line, character)?;
        let captures = MNEMONIC_RE.captures(&statement)?;
        let partial = captures.name("partial")?.as_str();

        Some(MnemonicCompleter {
            partial: partial.to_string(),
            range: partial_range(line, character, partial.chars().count()),
        })
    }

    fn completions(&self) -> Vec<impl Completable<'a, Self>>
    where
        Self: Sized,
    {
        if !self.partial.is_empty() {
            if let Some(exact) = instruction(&self.partial) {
                return vec![exact];
            }
        }

        let prefix = self.partial.to_ascii_lowercase();
        INSTRUCTIONS
            .iter()
            .chain(DIRECTIVES.iter())
            .filter(|instruction| instruction.mnemonic.starts_with(&prefix))
            .collect::<Vec<_>>()
    }

    fn replace_range(&self) -> Range {
        self.range
    }
}

impl Completable<'_, MnemonicCompleter> for &'static Instruction {
    fn completions(&self, completer: &MnemonicCompleter) -> Option<CompletionItem> {
        let insert_text = self.insert_text();
        let detail = format!("{} {}", self.mnemonic, self.operands)
            .trim_end()
            .to_string();

        Some(CompletionItem {
            label: self.mnemonic.to_string(),
            kind: Some(CompletionItemKind::KEYWORD),
            detail: Some(detail),
            documentation: Some(Documentation::String(self.summary.to_string())),
            filter_text: Some(self.mnemonic.to_string()),
            insert_text: Some(insert_text.clone()),
            text_edit: Some(CompletionTextEdit::Edit(TextEdit {
                range: completer.replace_range(),
                new_text: insert_text,
            })),
            ..Default::default()
        })
    }
}
