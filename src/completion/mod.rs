use once_cell::sync::Lazy;
use regex::Regex;
use tower_lsp::lsp_types::{
    CompletionItem, CompletionList, CompletionResponse, Position, Range,
};

use crate::{config::Settings, dfp::DfpIndex, document::Document, local::LocalSymbols};

use self::{mnemonic_completer::MnemonicCompleter, operand_completer::OperandCompleter};

mod mnemonic_completer;
mod operand_completer;

#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub document: &'a Document,
    pub local: &'a LocalSymbols,
    /// `None` when the pack index is disabled or not built
    pub dfp: Option<&'a DfpIndex>,
    pub settings: &'a Settings,
}

pub trait Completer<'a>: Sized {
    fn construct(context: Context<'a>, line: usize, character: usize) -> Option<Self>
    where
        Self: Sized + Completer<'a>;

    fn completions(&self) -> Vec<impl Completable<'a, Self>>
    where
        Self: Sized;

    /// The part of the line the chosen item replaces.
    fn replace_range(&self) -> Range;
}

pub trait Completable<'a, T: Completer<'a>>: Sized {
    fn completions(&self, completer: &T) -> Option<CompletionItem>;
}

/// Leading `label:` is skipped before deciding where the cursor is.
static LABEL_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[A-Za-z_][\w.]*\s*:").unwrap());

/// Text before the cursor with any leading label removed, or `None` when the
/// cursor sits inside a comment.
fn statement_before_cursor(context: &Context, line: usize, character: usize) -> Option<String> {
    let before = context.document.text_before(Position {
        line: line as u32,
        character: character as u32,
    })?;
    if before.contains(';') || before.contains("//") {
        return None;
    }

    Some(match LABEL_PREFIX_RE.find(&before) {
        Some(label) => before[label.end()..].to_string(),
        None => before,
    })
}

/// Range covering the last `len` characters before the cursor.
fn partial_range(line: usize, character: usize, len: usize) -> Range {
    Range {
        start: Position {
            line: line as u32,
            character: character.saturating_sub(len) as u32,
        },
        end: Position {
            line: line as u32,
            character: character as u32,
        },
    }
}

pub fn get_completions(context: Context, position: Position) -> Option<CompletionResponse> {
    if !context.settings.enable_completion {
        return None;
    }

    run_completer::<MnemonicCompleter>(context, position.line, position.character)
        .or_else(|| run_completer::<OperandCompleter>(context, position.line, position.character))
}

fn run_completer<'a, T: Completer<'a>>(
    context: Context<'a>,
    line: u32,
    character: u32,
) -> Option<CompletionResponse> {
    let completer = T::construct(context, line as usize, character as usize)?;
    let limit = context.settings.max_completion_items;

    let items = completer
        .completions()
        .into_iter()
        .filter_map(|completable| completable.completions(&completer))
        .collect::<Vec<CompletionItem>>();

    let is_incomplete = items.len() > limit;
    Some(CompletionResponse::List(CompletionList {
        is_incomplete,
        items: items.into_iter().take(limit).collect(),
    }))
}
