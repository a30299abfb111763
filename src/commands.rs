//! `workspace/executeCommand` handlers that do not need the client.

use serde::Serialize;
use serde_json::Value;
use tower_lsp::lsp_types::{MessageType, Url};

use crate::{
    dfp::{DfpIndex, DfpSummary},
    local::LocalSymbols,
};

pub const LOOKUP_SYMBOL: &str = "avrasm.lookupSymbol";
pub const REBUILD_DFP_INDEX: &str = "avrasm.rebuildDfpIndex";
pub const DFP_INFO: &str = "avrasm.dfpInfo";

pub fn all() -> Vec<String> {
    [LOOKUP_SYMBOL, REBUILD_DFP_INDEX, DFP_INFO]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// One quick-pick entry of the lookup command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupItem {
    pub label: String,
    pub description: String,
    pub detail: String,
    /// `local` or `dfp`
    pub source: String,
    pub uri: Option<Url>,
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupArgs {
    pub symbol: String,
    pub uri: Option<Url>,
}

/// `[symbol, uri?]`; a missing or blank symbol is rejected.
pub fn parse_lookup_args(arguments: &[Value]) -> Option<LookupArgs> {
    let symbol = arguments.first()?.as_str()?.trim();
    if symbol.is_empty() {
        return None;
    }
    let uri = arguments
        .get(1)
        .and_then(Value::as_str)
        .and_then(|uri| Url::parse(uri).ok());

    Some(LookupArgs {
        symbol: symbol.to_string(),
        uri,
    })
}

/// The local definition (when a document is given) followed by pack occurrences.
pub fn lookup_symbol(
    symbol: &str,
    local: Option<(&Url, &LocalSymbols)>,
    dfp: Option<&DfpIndex>,
) -> Vec<LookupItem> {
    let local_item = local.and_then(|(uri, symbols)| {
        let entry = symbols.get(symbol)?;
        Some(LookupItem {
            label: entry.symbol.clone(),
            description: format!("local {}", entry.kind),
            detail: entry.detail.clone(),
            source: "local".to_string(),
            uri: Some(uri.clone()),
            line: entry.line,
            character: entry.column,
        })
    });

    let pack_items = dfp
        .map(|index| index.lookup(symbol))
        .unwrap_or_default()
        .iter()
        .map(|occurrence| LookupItem {
            label: occurrence.symbol.clone(),
            description: format!("{} in {}", occurrence.kind, occurrence.file_name()),
            detail: occurrence.detail.clone(),
            source: "dfp".to_string(),
            uri: Url::from_file_path(&occurrence.file).ok(),
            line: occurrence.line,
            character: occurrence.column,
        });

    local_item.into_iter().chain(pack_items).collect()
}

/// What to tell the user after a forced rebuild.
pub fn rebuild_message(summary: &DfpSummary) -> (MessageType, String) {
    if summary.scanned_files.is_empty() {
        return (
            MessageType::WARNING,
            "AVR DFP index: no pack files found. Set avrasm.dfpPath or avrasm.device, or install a pack under avrasm.packsDirectory.".to_string(),
        );
    }

    (
        MessageType::INFO,
        format!(
            "AVR DFP index rebuilt: {} symbols from {} files (device {})",
            summary.symbol_count,
            summary.scanned_files.len(),
            summary.device.as_deref().unwrap_or("unknown"),
        ),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        config::Settings,
        test_utils::{create_pack, create_test_dir},
    };

    #[test]
    fn lookup_arguments() {
        assert_eq!(
            parse_lookup_args(&[json!("PORTB"), json!("file:///tmp/main.asm")]),
            Some(LookupArgs {
                symbol: "PORTB".to_string(),
                uri: Some(Url::parse("file:///tmp/main.asm").unwrap()),
            })
        );
        assert_eq!(
            parse_lookup_args(&[json!("PORTB")]).map(|it| it.uri),
            Some(None)
        );
        assert!(parse_lookup_args(&[]).is_none());
        assert!(parse_lookup_args(&[json!("  ")]).is_none());
        assert!(parse_lookup_args(&[json!(42)]).is_none());
    }

    #[test]
    fn local_result_comes_first() {
        let (_temp_dir, dir) = create_test_dir();
        let pack = dir.join("pack");
        create_pack(&pack, "ATmega328P");
        let settings = Settings {
            dfp_path: Some(pack.to_string_lossy().to_string()),
            device: Some("ATmega328P".to_string()),
            ..Settings::default()
        };
        let index = DfpIndex::build(&settings, &[]);

        let uri = Url::parse("file:///tmp/work/main.asm").unwrap();
        let local = LocalSymbols::parse("nop\n.equ RAMEND = 0x100\n");
        let items = lookup_symbol("ramend", Some((&uri, &local)), Some(&index));

        let sources = items
            .iter()
            .map(|it| (it.source.as_str(), it.description.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            sources,
            vec![("local", "local equ"), ("dfp", "equ in m328pdef.inc")]
        );
        assert_eq!(items[0].line, 1);
        assert_eq!(items[0].uri.as_ref(), Some(&uri));

        let value = serde_json::to_value(&items[1]).unwrap();
        assert_eq!(value["label"], "RAMEND");
        assert_eq!(value["character"], 5);
    }

    #[test]
    fn rebuild_warns_when_nothing_was_scanned() {
        let (kind, message) = rebuild_message(&DfpIndex::empty().summary());
        assert_eq!(kind, MessageType::WARNING);
        assert!(message.contains("no pack files found"));
    }
}
