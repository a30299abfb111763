//! Open text documents as the client last sent them.

use std::path::PathBuf;

use ropey::Rope;
use tower_lsp::lsp_types::{Position, Range, Url};

#[derive(Debug, Clone)]
pub struct Document {
    pub uri: Url,
    pub version: i32,
    pub text: String,
    rope: Rope,
}

/// Characters that may appear inside an assembler symbol.
pub fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

impl Document {
    pub fn new(uri: Url, version: i32, text: String) -> Document {
        let rope = Rope::from_str(&text);
        Document {
            uri,
            version,
            text,
            rope,
        }
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.uri.to_file_path().ok()
    }

    /// The line without its terminator.
    pub fn line(&self, line: usize) -> Option<String> {
        let slice = self.rope.get_line(line)?;
        let text = slice.to_string();
        Some(text.trim_end_matches(['\n', '\r']).to_string())
    }

    /// Text of the line up to (not including) the cursor.
    pub fn text_before(&self, position: Position) -> Option<String> {
        let line = self.line(position.line as usize)?;
        Some(line.chars().take(position.character as usize).collect())
    }

    /// The symbol under the cursor along with its range. A cursor placed
    /// just after the last character of a word still selects it.
    pub fn word_at(&self, position: Position) -> Option<(String, Range)> {
        let chars: Vec<char> = self.line(position.line as usize)?.chars().collect();
        let cursor = (position.character as usize).min(chars.len());

        let mut start = cursor;
        while start > 0 && is_symbol_char(chars[start - 1]) {
            start -= 1;
        }
        let mut end = cursor;
        while end < chars.len() && is_symbol_char(chars[end]) {
            end += 1;
        }
        if start == end {
            return None;
        }

        let word: String = chars[start..end].iter().collect();
        // `.equ` directives are not symbols, but `PORTB.` typos still resolve
        let word = word.trim_end_matches('.');
        if word.is_empty() || word.starts_with('.') {
            return None;
        }

        Some((
            word.to_string(),
            Range {
                start: Position {
                    line: position.line,
                    character: start as u32,
                },
                end: Position {
                    line: position.line,
                    character: (start + word.chars().count()) as u32,
                },
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(text: &str) -> Document {
        Document::new(
            Url::parse("file:///tmp/main.asm").unwrap(),
            1,
            text.to_string(),
        )
    }

    #[test]
    fn word_under_cursor() {
        let doc = document("main:\n    ldi r16, LOW(RAMEND)\n");

        let (word, range) = doc
            .word_at(Position {
                line: 1,
                character: 19,
            })
            .unwrap();
        assert_eq!(word, "RAMEND");
        assert_eq!(range.start.character, 17);
        assert_eq!(range.end.character, 23);

        let (word, _) = doc
            .word_at(Position {
                line: 0,
                character: 4,
            })
            .unwrap();
        assert_eq!(word, "main");
    }

    #[test]
    fn no_word_on_whitespace_or_directive() {
        let doc = document("  \n.equ FOO = 1");
        assert!(doc
            .word_at(Position {
                line: 0,
                character: 1
            })
            .is_none());
        assert!(doc
            .word_at(Position {
                line: 1,
                character: 2
            })
            .is_none());
    }

    #[test]
    fn text_before_cursor_strips_line_ending() {
        let doc = document("  ldi r16, 1\r\nnext");
        assert_eq!(
            doc.text_before(Position {
                line: 0,
                character: 6
            })
            .unwrap(),
            "  ldi "
        );
        assert_eq!(doc.line(0).unwrap(), "  ldi r16, 1");
    }
}
