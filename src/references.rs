use rayon::prelude::*;
use tower_lsp::lsp_types::{Location, Position, Range, Url};

use crate::{
    config::Settings,
    document::{is_symbol_char, Document},
    local::classify_definition,
    workspace::{collect_sources, Workspace},
};

/// One whole-word hit of the searched name on a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordMatch {
    pub column: u32,
    pub is_definition: bool,
}

/// Case-insensitive whole-word matches of `word` in `line`, ignoring anything
/// after `;`. The match the definition patterns capture is marked as such.
pub fn find_in_line(line: &str, word: &str) -> Vec<WordMatch> {
    let code = line.split(';').next().unwrap_or_default();
    let haystack = code.to_ascii_lowercase();
    let needle = word.to_ascii_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let definition_column = classify_definition(line)
        .filter(|definition| definition.name.eq_ignore_ascii_case(word))
        .map(|definition| definition.column);

    haystack
        .match_indices(&needle)
        .filter(|(start, _)| {
            let before = haystack[..*start].chars().next_back();
            let after = haystack[start + needle.len()..].chars().next();
            !before.is_some_and(is_symbol_char) && !after.is_some_and(is_symbol_char)
        })
        .map(|(start, _)| {
            let column = code[..start].chars().count() as u32;
            WordMatch {
                column,
                is_definition: definition_column == Some(column),
            }
        })
        .collect()
}

/// Every use of the word under the cursor across the workspace, open buffers
/// taking precedence over disk.
pub fn references(
    workspace: &impl Workspace,
    document: &Document,
    cursor_position: Position,
    include_declaration: bool,
    settings: &Settings,
) -> Option<Vec<Location>> {
    if !settings.enable_references {
        return None;
    }

    let (word, _) = document.word_at(cursor_position)?;
    let width = word.chars().count() as u32;

    let locations = collect_sources(workspace, settings)
        .par_iter()
        .map(|source| {
            let Ok(uri) = Url::from_file_path(&source.path) else {
                return Vec::new();
            };

            source
                .text
                .lines()
                .enumerate()
                .flat_map(|(line_nr, line)| {
                    find_in_line(line, &word)
                        .into_iter()
                        .filter(move |it| include_declaration || !it.is_definition)
                        .map(move |it| Range {
                            start: Position {
                                line: line_nr as u32,
                                character: it.column,
                            },
                            end: Position {
                                line: line_nr as u32,
                                character: it.column + width,
                            },
                        })
                })
                .map(|range| Location {
                    uri: uri.clone(),
                    range,
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .take(settings.max_reference_results)
        .collect();

    Some(locations)
}
