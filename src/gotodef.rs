use tower_lsp::lsp_types::{Location, Position};

use crate::{config::Settings, dfp::DfpIndex, document::Document, local::LocalSymbols};

/// The local definition when the file has one, otherwise every pack
/// occurrence of the word.
pub fn goto_definition(
    document: &Document,
    local: &LocalSymbols,
    dfp: Option<&DfpIndex>,
    cursor_position: Position,
    settings: &Settings,
) -> Option<Vec<Location>> {
    if !settings.enable_definition {
        return None;
    }

    let (word, _) = document.word_at(cursor_position)?;

    if let Some(symbol) = local.get(&word) {
        return Some(vec![symbol.location(&document.uri)]);
    }

    let locations = dfp?
        .lookup(&word)
        .iter()
        .filter_map(|occurrence| occurrence.location())
        .collect::<Vec<_>>();

    (!locations.is_empty()).then_some(locations)
}
