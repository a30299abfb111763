//! Line scanners for pack files. Each returns the occurrences in file order.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use super::DfpOccurrence;
use crate::local::{strip_comment, SymbolKind};

static DEFINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*#\s*define\s+(?<name>[A-Za-z_]\w*)(?<value>.*)$").unwrap());

fn occurrence(
    file: &Path,
    line_nr: usize,
    line: &str,
    start: usize,
    symbol: &str,
    kind: SymbolKind,
    detail: String,
) -> DfpOccurrence {
    DfpOccurrence {
        symbol: symbol.to_string(),
        kind,
        file: file.to_path_buf(),
        line: line_nr as u32,
        column: line[..start].chars().count() as u32,
        detail,
    }
}

fn strip_c_comment(text: &str) -> &str {
    let cut = [text.find("/*"), text.find("//")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(text.len());
    text[..cut].trim()
}

fn scan_define(file: &Path, line_nr: usize, line: &str) -> Option<DfpOccurrence> {
    let captures = DEFINE_RE.captures(line)?;
    let name = captures.name("name")?;
    let value = captures
        .name("value")
        .map(|value| strip_c_comment(value.as_str()))
        .unwrap_or_default();

    let detail = if value.is_empty() {
        format!("#define {}", name.as_str())
    } else {
        format!("#define {} {}", name.as_str(), value)
    };

    Some(occurrence(
        file,
        line_nr,
        line,
        name.start(),
        name.as_str(),
        SymbolKind::Macro,
        detail,
    ))
}

/// `#define` macros and members of `enum { ... }` blocks in a C header.
pub fn scan_header(file: &Path, text: &str) -> Vec<DfpOccurrence> {
    static ENUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\benum\b").unwrap());
    static ENUM_MEMBER_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^\s*(?<name>[A-Za-z_]\w*)\s*(?:=\s*(?<value>[^,]+?))?\s*,?\s*$").unwrap()
    });

    let mut occurrences = Vec::new();
    let mut enum_pending = false;
    let mut in_enum = false;

    for (line_nr, line) in text.lines().enumerate() {
        if let Some(define) = scan_define(file, line_nr, line) {
            occurrences.push(define);
            continue;
        }

        if !in_enum {
            if ENUM_RE.is_match(line) {
                enum_pending = true;
            }
            if enum_pending && line.contains('{') {
                in_enum = true;
                enum_pending = false;
            }
            if enum_pending && line.contains(';') {
                // forward declaration
                enum_pending = false;
            }
            if !in_enum {
                continue;
            }
        }

        // Members may share the line with the braces
        let code = strip_c_comment(line);
        let code_start = line.len() - line.trim_start().len();
        let body_start = code.rfind('{').map_or(0, |brace| brace + 1);
        let body = &code[body_start..];
        let (body, closes) = match body.split_once('}') {
            Some((before, _)) => (before, true),
            None => (body, false),
        };

        // byte offset of each comma separated part within `line`
        let mut part_start = code_start + body_start;
        for part in body.split(',') {
            let offset = part_start + part.len() - part.trim_start().len();
            part_start += part.len() + 1;

            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let Some(captures) = ENUM_MEMBER_RE.captures(part) else {
                continue;
            };
            let Some(name) = captures.name("name") else {
                continue;
            };
            let start = offset + name.start();
            let detail = match captures.name("value") {
                Some(value) => format!("enum {} = {}", name.as_str(), value.as_str().trim()),
                None => format!("enum {}", name.as_str()),
            };
            occurrences.push(occurrence(
                file,
                line_nr,
                line,
                start,
                name.as_str(),
                SymbolKind::Enum,
                detail,
            ));
        }

        if closes {
            in_enum = false;
        }
    }

    occurrences
}

/// `.equ`, `.set` and `#define` lines of an assembler include file.
pub fn scan_inc(file: &Path, text: &str) -> Vec<DfpOccurrence> {
    static ASSIGN_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)^\s*\.(?<directive>equ|set)\s+(?<name>[A-Za-z_]\w*)\s*=\s*(?<value>.*)$")
            .unwrap()
    });

    text.lines()
        .enumerate()
        .filter_map(|(line_nr, line)| {
            if let Some(captures) = ASSIGN_RE.captures(line) {
                let name = captures.name("name")?;
                let directive = captures.name("directive")?.as_str().to_ascii_lowercase();
                let kind = if directive == "set" {
                    SymbolKind::Set
                } else {
                    SymbolKind::Equ
                };
                let value = captures
                    .name("value")
                    .map(|value| strip_comment(value.as_str()))
                    .unwrap_or_default();

                return Some(occurrence(
                    file,
                    line_nr,
                    line,
                    name.start(),
                    name.as_str(),
                    kind,
                    format!(".{directive} {} = {value}", name.as_str()),
                ));
            }

            scan_define(file, line_nr, line)
        })
        .collect()
}

/// The first `name="..."` attribute of each line of an ATDF device file.
pub fn scan_atdf(file: &Path, text: &str) -> Vec<DfpOccurrence> {
    static NAME_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"\bname="(?<name>[A-Za-z_][\w]*)""#).unwrap());
    static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<\s*(?<tag>[A-Za-z][\w-]*)").unwrap());
    static CAPTION_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"\bcaption="(?<caption>[^"]*)""#).unwrap());
    static OFFSET_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"\boffset="(?<offset>[^"]*)""#).unwrap());

    text.lines()
        .enumerate()
        .filter_map(|(line_nr, line)| {
            let name = NAME_RE.captures(line)?.name("name")?;

            let mut detail = TAG_RE
                .captures(line)
                .and_then(|it| it.name("tag"))
                .map(|tag| format!("{} {}", tag.as_str(), name.as_str()))
                .unwrap_or_else(|| name.as_str().to_string());
            if let Some(offset) = OFFSET_RE.captures(line).and_then(|it| it.name("offset")) {
                detail.push_str(&format!(" @ {}", offset.as_str()));
            }
            if let Some(caption) = CAPTION_RE
                .captures(line)
                .and_then(|it| it.name("caption"))
                .filter(|caption| !caption.as_str().is_empty())
            {
                detail.push_str(&format!(": {}", caption.as_str()));
            }

            Some(occurrence(
                file,
                line_nr,
                line,
                name.start(),
                name.as_str(),
                SymbolKind::Atdf,
                detail,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(occurrences: &[DfpOccurrence]) -> Vec<(&str, SymbolKind, u32, u32)> {
        occurrences
            .iter()
            .map(|it| (it.symbol.as_str(), it.kind, it.line, it.column))
            .collect()
    }

    #[test]
    fn header_defines_and_enums() {
        let text = r#"
#define PORTB _SFR_IO8(0x05) /* Port B */
#  define PB5 5
#define _SFR_IO8(io_addr) _MMIO_BYTE((io_addr) + 0x20)
typedef enum
{
    CLKCTRL_CLKSEL_OSC20M_gc = (0x00<<0),  /* 20MHz */
    CLKCTRL_CLKSEL_OSCULP32K_gc = (0x01<<0),
} CLKCTRL_CLKSEL_t;
enum forward;
int not_an_enum_member;
enum { A, B = 2 };
"#;
        let occurrences = scan_header(Path::new("io.h"), text);
        assert_eq!(
            names(&occurrences),
            vec![
                ("PORTB", SymbolKind::Macro, 1, 8),
                ("PB5", SymbolKind::Macro, 2, 10),
                ("_SFR_IO8", SymbolKind::Macro, 3, 8),
                ("CLKCTRL_CLKSEL_OSC20M_gc", SymbolKind::Enum, 6, 4),
                ("CLKCTRL_CLKSEL_OSCULP32K_gc", SymbolKind::Enum, 7, 4),
                ("A", SymbolKind::Enum, 11, 7),
                ("B", SymbolKind::Enum, 11, 10),
            ]
        );
        assert_eq!(occurrences[0].detail, "#define PORTB _SFR_IO8(0x05)");
        assert_eq!(occurrences[1].detail, "#define PB5 5");
        assert_eq!(
            occurrences[3].detail,
            "enum CLKCTRL_CLKSEL_OSC20M_gc = (0x00<<0)"
        );
    }

    #[test]
    fn enum_member_columns_are_their_own() {
        let text = "enum { AB, B };\ntypedef enum { PB, B2, P } pins_t;\n";
        let occurrences = scan_header(Path::new("io.h"), text);
        assert_eq!(
            names(&occurrences),
            vec![
                ("AB", SymbolKind::Enum, 0, 7),
                ("B", SymbolKind::Enum, 0, 11),
                ("PB", SymbolKind::Enum, 1, 15),
                ("B2", SymbolKind::Enum, 1, 19),
                ("P", SymbolKind::Enum, 1, 23),
            ]
        );
    }

    #[test]
    fn inc_assignments_and_defines() {
        let text =
            ".equ PORTB = 0x05 ; Port B\n.SET tmp = 3\n#define XH r27\n; .equ COMMENTED = 1\n";
        let occurrences = scan_inc(Path::new("m328Pdef.inc"), text);
        assert_eq!(
            names(&occurrences),
            vec![
                ("PORTB", SymbolKind::Equ, 0, 5),
                ("tmp", SymbolKind::Set, 1, 5),
                ("XH", SymbolKind::Macro, 2, 8),
            ]
        );
        assert_eq!(occurrences[0].detail, ".equ PORTB = 0x05");
        assert_eq!(occurrences[1].detail, ".set tmp = 3");
    }

    #[test]
    fn atdf_name_attributes() {
        let text = r#"<?xml version="1.0"?>
  <module caption="I/O Port" name="PORT">
    <register caption="Port B Data Register" name="PORTB" offset="0x25" size="1"/>
    <bitfield caption="" mask="0x01" name="PB0"/>
    <value-group name="PIN_MODE"/>
  </module>"#;
        let occurrences = scan_atdf(Path::new("ATmega328P.atdf"), text);
        assert_eq!(
            names(&occurrences)
                .iter()
                .map(|it| it.0)
                .collect::<Vec<_>>(),
            vec!["PORT", "PORTB", "PB0", "PIN_MODE"]
        );
        assert_eq!(occurrences[0].detail, "module PORT: I/O Port");
        assert_eq!(
            occurrences[1].detail,
            "register PORTB @ 0x25: Port B Data Register"
        );
        assert_eq!(occurrences[2].detail, "bitfield PB0");
        assert_eq!(occurrences[3].detail, "value-group PIN_MODE");
        assert_eq!(occurrences[1].column, 51);
    }
}
