/// Convert a UTF-16 column offset (from LSP Position.character) to a byte
/// offset within the given line. Columns past the end clamp to `line.len()`.
pub fn utf16_column_to_byte_offset(line: &str, utf16_col: u32) -> usize {
    let mut utf16_count = 0;
    for (byte_idx, ch) in line.char_indices() {
        if utf16_count >= utf16_col as usize {
            return byte_idx;
        }
        utf16_count += ch.len_utf16();
    }
    line.len()
}

/// Convert a byte offset within a line to a UTF-16 column
pub fn byte_offset_to_utf16_column(line: &str, byte_offset: usize) -> u32 {
    line.char_indices()
        .take_while(|(idx, _)| *idx < byte_offset)
        .map(|(_, ch)| ch.len_utf16() as u32)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii() {
        assert_eq!(utf16_column_to_byte_offset("abc", 2), 2);
        assert_eq!(byte_offset_to_utf16_column("abc", 2), 2);
    }

    #[test]
    fn test_multibyte() {
        // 'é' is 2 bytes / 1 unit, '𝄞' is 4 bytes / 2 units
        let line = "é𝄞x";
        assert_eq!(utf16_column_to_byte_offset(line, 1), 2);
        assert_eq!(utf16_column_to_byte_offset(line, 3), 6);
        assert_eq!(byte_offset_to_utf16_column(line, 6), 3);
    }

    #[test]
    fn test_past_end_clamps() {
        assert_eq!(utf16_column_to_byte_offset("ab", 10), 2);
    }
}
