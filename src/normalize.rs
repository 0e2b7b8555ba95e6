//! Text normalization.
//!
//! Extractors hand the pipeline raw text in whatever shape the source
//! produced (CRLF line endings, stray control characters, runs of blank
//! lines). Normalization happens once, before chunking, and the result
//! is what the store persists — chunk offsets and citations refer to the
//! normalized text.

/// Normalize raw extracted text for chunking and indexing.
///
/// - `\r\n` and bare `\r` become `\n`
/// - control characters other than `\n` and `\t` are dropped
/// - runs of three or more newlines collapse to two (one blank line)
/// - trailing whitespace is trimmed from each line and from the end
pub fn normalize_text(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");

    let mut cleaned = String::with_capacity(unified.len());
    for ch in unified.chars() {
        if ch == '\n' || ch == '\t' || !ch.is_control() {
            cleaned.push(ch);
        }
    }

    let mut out = String::with_capacity(cleaned.len());
    let mut blank_run = 0usize;
    for line in cleaned.split('\n') {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crlf_to_lf() {
        assert_eq!(normalize_text("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_control_chars_stripped() {
        assert_eq!(normalize_text("a\u{0000}b\u{0007}c"), "abc");
    }

    #[test]
    fn test_tabs_preserved() {
        assert_eq!(normalize_text("a\tb"), "a\tb");
    }

    #[test]
    fn test_blank_runs_collapsed() {
        assert_eq!(normalize_text("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_trailing_whitespace_trimmed() {
        assert_eq!(normalize_text("a   \nb\n\n"), "a\nb");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_idempotent() {
        let raw = "First line.\r\n\r\n\r\nSecond\u{0008} line.  \n";
        let once = normalize_text(raw);
        assert_eq!(normalize_text(&once), once);
    }
}
