//! Symbol providers for AVR assembly.
//!
//! This module implements LSP symbol capabilities:
//! - `textDocument/documentSymbol` - outline view of current file
//! - `workspace/symbol` - substring search across the workspace
//!
//! # Document Symbols
//!
//! | Definition | LSP Kind | Example |
//! |------------|----------|---------|
//! | Label | `Function` | `main:` |
//! | `.equ` | `Constant` | `.equ BAUD = 9600` |
//! | `.set` | `Variable` | `.set counter = 0` |
//!
//! Symbols are returned in document order, one per name.
//!
//! # Workspace Symbols
//!
//! Every workspace file matching `workspaceGlobs` is parsed with the local
//! symbol parser; open buffers replace their on-disk copies. Names containing
//! the query (ignoring case) are returned, at most `maxWorkspaceSymbols`.

use rayon::prelude::*;
use tower_lsp::lsp_types::{
    DocumentSymbol, DocumentSymbolResponse, Location, SymbolInformation, Url,
};

use crate::{
    config::Settings,
    local::{LocalSymbol, LocalSymbols},
    workspace::{collect_sources, Workspace},
};

#[allow(deprecated)] // field deprecated has been deprecated in favor of using tags
fn to_document_symbol(symbol: &LocalSymbol) -> DocumentSymbol {
    DocumentSymbol {
        name: symbol.symbol.clone(),
        detail: Some(symbol.detail.clone()),
        kind: symbol.kind.lsp_kind(),
        tags: None,
        deprecated: None,
        range: symbol.range(),
        selection_range: symbol.range(),
        children: None,
    }
}

pub fn document_symbol(
    local: &LocalSymbols,
    settings: &Settings,
) -> Option<DocumentSymbolResponse> {
    if !settings.enable_document_symbols {
        return None;
    }

    Some(DocumentSymbolResponse::Nested(
        local.entries().iter().map(to_document_symbol).collect(),
    ))
}

#[allow(deprecated)] // field deprecated has been deprecated in favor of using tags
fn to_symbol_information(symbol: &LocalSymbol, uri: &Url, container: &str) -> SymbolInformation {
    SymbolInformation {
        name: symbol.symbol.clone(),
        kind: symbol.kind.lsp_kind(),
        tags: None,
        deprecated: None,
        location: Location {
            uri: uri.clone(),
            range: symbol.range(),
        },
        container_name: Some(container.to_string()),
    }
}

/// Search for symbols across the workspace.
pub fn workspace_symbol(
    workspace: &impl Workspace,
    query: &str,
    settings: &Settings,
) -> Option<Vec<SymbolInformation>> {
    if !settings.enable_workspace_symbols {
        return None;
    }

    let query = query.to_ascii_lowercase();

    let symbols = collect_sources(workspace, settings)
        .par_iter()
        .map(|source| {
            let Ok(uri) = Url::from_file_path(&source.path) else {
                return Vec::new();
            };
            let container = source
                .path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default();

            LocalSymbols::parse(&source.text)
                .entries()
                .iter()
                .filter(|symbol| symbol.symbol.to_ascii_lowercase().contains(&query))
                .map(|symbol| to_symbol_information(symbol, &uri, &container))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .take(settings.max_workspace_symbols)
        .collect();

    Some(symbols)
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, fs};

    use tower_lsp::lsp_types::SymbolKind;

    use super::*;
    use crate::{test_utils::create_test_dir, workspace::DiskWorkspace};

    #[test]
    fn document_symbols_in_order_with_kinds() {
        let text = "main:\n.equ BAUD = 9600\n.set counter = 0\nmain:\n";
        let local = LocalSymbols::parse(text);

        let Some(DocumentSymbolResponse::Nested(symbols)) =
            document_symbol(&local, &Settings::default())
        else {
            panic!("expected nested document symbols");
        };

        let summary = symbols
            .iter()
            .map(|it| (it.name.as_str(), it.kind, it.range.start.line))
            .collect::<Vec<_>>();
        assert_eq!(
            summary,
            vec![
                ("main", SymbolKind::FUNCTION, 0),
                ("BAUD", SymbolKind::CONSTANT, 1),
                ("counter", SymbolKind::VARIABLE, 2),
            ]
        );
        assert_eq!(symbols[1].detail.as_deref(), Some("= 9600"));

        let disabled = Settings {
            enable_document_symbols: false,
            ..Settings::default()
        };
        assert!(document_symbol(&local, &disabled).is_none());
    }

    #[test]
    fn workspace_symbols_by_substring() {
        let (_temp_dir, root) = create_test_dir();
        fs::write(root.join("main.asm"), "reset:\n    rjmp uart_init\n").unwrap();
        fs::write(root.join("uart.inc"), "uart_init:\n.equ UART_BAUD = 9600\n").unwrap();

        let open = HashMap::from([(root.join("main.asm"), "reset_vector:\n".to_string())]);
        let workspace = DiskWorkspace::new(vec![root], open);

        let found = workspace_symbol(&workspace, "UART", &Settings::default()).unwrap();
        let names = found.iter().map(|it| it.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["uart_init", "UART_BAUD"]);
        assert_eq!(found[0].container_name.as_deref(), Some("uart.inc"));

        let found = workspace_symbol(&workspace, "reset", &Settings::default()).unwrap();
        let names = found.iter().map(|it| it.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["reset_vector"]);

        let capped = Settings {
            max_workspace_symbols: 1,
            ..Settings::default()
        };
        assert_eq!(workspace_symbol(&workspace, "", &capped).unwrap().len(), 1);
    }
}
