//! Position translation between protocol coordinates and byte offsets
//!
//! Protocol positions are zero-based `(line, character)` pairs where
//! `character` counts UTF-16 code units. Documents are stored as UTF-8, so
//! every request position is translated into a byte offset before use.

use tree_sitter::Point;

use crate::error::PositionError;
use crate::models::lsp::Position;

/// Byte offset of `position` in `text`.
///
/// A character past the end of its line clamps to the line end (before any
/// `\r\n`), a line past the end of the document clamps to the document end.
/// A character that falls inside a surrogate pair resolves to the start of
/// that code point.
pub fn offset_for_position(text: &str, position: Position) -> Result<usize, PositionError> {
    if position.line < 0 || position.character < 0 {
        return Err(PositionError::Negative {
            line: position.line,
            character: position.character,
        });
    }

    let Some(line_start) = line_start_offset(text, position.line as usize) else {
        return Ok(text.len());
    };

    let rest = &text[line_start..];
    let line = match rest.find('\n') {
        Some(end) => &rest[..end],
        None => rest,
    };
    let line = line.strip_suffix('\r').unwrap_or(line);

    let target = position.character as usize;
    let mut units = 0usize;
    for (idx, ch) in line.char_indices() {
        if units + ch.len_utf16() > target {
            return Ok(line_start + idx);
        }
        units += ch.len_utf16();
    }

    Ok(line_start + line.len())
}

/// Byte offset where zero-based `line` starts, `None` past the last line
fn line_start_offset(text: &str, line: usize) -> Option<usize> {
    if line == 0 {
        return Some(0);
    }
    text.match_indices('\n')
        .nth(line - 1)
        .map(|(idx, _)| idx + 1)
}

/// Tree-sitter point (row, byte column) for a byte offset, clamped to `text`
pub fn point_for_offset(text: &str, offset: usize) -> Point {
    let offset = offset.min(text.len());
    let before = &text.as_bytes()[..offset];
    let row = before.iter().filter(|&&b| b == b'\n').count();
    let column = match before.iter().rposition(|&b| b == b'\n') {
        Some(newline) => offset - newline - 1,
        None => offset,
    };
    Point { row, column }
}

/// Largest char boundary at or below `offset`
pub fn floor_char_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// Smallest char boundary at or above `offset`
pub fn ceil_char_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset += 1;
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset(text: &str, line: i64, character: i64) -> usize {
        offset_for_position(text, Position::new(line, character)).unwrap()
    }

    /// Straightforward scanner over UTF-16 units used as the reference
    fn reference_offset(text: &str, line: usize, character: usize) -> usize {
        let mut base = 0;
        for (i, l) in text.split('\n').enumerate() {
            if i == line {
                let mut units = 0;
                for (idx, ch) in l.char_indices() {
                    let mut buf = [0u16; 2];
                    let width = ch.encode_utf16(&mut buf).len();
                    if units + width > character {
                        return base + idx;
                    }
                    units += width;
                }
                return base + l.len();
            }
            base += l.len() + 1;
        }
        text.len()
    }

    #[test]
    fn test_ascii() {
        let text = "package main\n\nfunc main() {}\n";
        assert_eq!(offset(text, 0, 0), 0);
        assert_eq!(offset(text, 0, 7), 7);
        assert_eq!(offset(text, 1, 0), 13);
        assert_eq!(offset(text, 2, 4), 18);
    }

    #[test]
    fn test_multibyte_and_surrogate_pairs() {
        // 'é' is 2 bytes / 1 unit, '😀' is 4 bytes / 2 units
        let text = "aé😀b";
        assert_eq!(offset(text, 0, 1), 1);
        assert_eq!(offset(text, 0, 2), 3);
        assert_eq!(offset(text, 0, 4), 7);
        assert_eq!(offset(text, 0, 5), 8);
    }

    #[test]
    fn test_character_inside_surrogate_pair_stops_before_code_point() {
        let text = "😀x";
        assert_eq!(offset(text, 0, 1), 0);
        assert_eq!(offset(text, 0, 2), 4);
    }

    #[test]
    fn test_clamps_character_to_line_end() {
        let text = "ab\ncd";
        assert_eq!(offset(text, 0, 99), 2);
        assert_eq!(offset(text, 1, 99), 5);
    }

    #[test]
    fn test_crlf_line_end_excludes_carriage_return() {
        let text = "ab\r\ncd";
        assert_eq!(offset(text, 0, 99), 2);
        assert_eq!(offset(text, 1, 1), 5);
    }

    #[test]
    fn test_clamps_line_to_document_end() {
        let text = "ab\ncd";
        assert_eq!(offset(text, 7, 0), text.len());
        assert_eq!(offset("", 3, 3), 0);
        // Trailing newline opens an empty final line
        assert_eq!(offset("ab\n", 1, 5), 3);
    }

    #[test]
    fn test_negative_rejected() {
        let err = offset_for_position("abc", Position::new(-1, 0)).unwrap_err();
        assert_eq!(
            err,
            PositionError::Negative {
                line: -1,
                character: 0
            }
        );
        assert!(offset_for_position("abc", Position::new(0, -3)).is_err());
    }

    #[test]
    fn test_matches_reference_scanner() {
        let text = "fn main() {\n\tlet s = \"héllo 🌍\";\n\n\tprintln!(\"{s}\");\n}";
        for line in 0..7 {
            for character in 0..40 {
                assert_eq!(
                    offset(text, line as i64, character as i64),
                    reference_offset(text, line, character),
                    "line {line} character {character}"
                );
            }
        }
    }

    #[test]
    fn test_point_for_offset() {
        let text = "ab\ncdé\nf";
        assert_eq!(point_for_offset(text, 0), Point { row: 0, column: 0 });
        assert_eq!(point_for_offset(text, 4), Point { row: 1, column: 1 });
        assert_eq!(point_for_offset(text, 7), Point { row: 1, column: 4 });
        assert_eq!(point_for_offset(text, 100), Point { row: 2, column: 1 });
    }

    #[test]
    fn test_char_boundaries() {
        let text = "a😀b";
        assert_eq!(floor_char_boundary(text, 3), 1);
        assert_eq!(ceil_char_boundary(text, 3), 5);
        assert_eq!(floor_char_boundary(text, 5), 5);
        assert_eq!(ceil_char_boundary(text, 99), text.len());
    }
}
