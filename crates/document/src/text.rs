//! Text helpers for the standard PDF fonts

use text_splitter::{ChunkConfig, TextSplitter};

/// Average Helvetica glyph width as a fraction of the font size
const AVG_GLYPH_WIDTH_EM: f32 = 0.5;

/// Encode text for a WinAnsiEncoding font. Unmappable characters become `?`.
pub fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\t' | '\n' | '\r' => b' ',
            c if (c as u32) < 0x20 => b' ',
            c if (c as u32) < 0x7F => c as u8,
            c if (0xA0..=0xFF).contains(&(c as u32)) => c as u32 as u8,
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            _ => b'?',
        })
        .collect()
}

/// How many characters fit into `width` points at `font_size`
pub fn chars_per_line(width: f32, font_size: f32) -> usize {
    ((width / (font_size * AVG_GLYPH_WIDTH_EM)).floor() as usize).max(1)
}

/// Wrap text into lines of at most `max_chars` characters.
///
/// Explicit line breaks are kept; blank lines survive as empty strings.
pub fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let splitter = TextSplitter::new(ChunkConfig::new(max_chars));
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        if paragraph.trim().is_empty() {
            lines.push(String::new());
            continue;
        }
        lines.extend(splitter.chunks(paragraph).map(str::to_string));
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_win_ansi_umlauts() {
        assert_eq!(win_ansi("Größe"), vec![b'G', b'r', 0xF6, 0xDF, b'e']);
        assert_eq!(win_ansi("€"), vec![0x80]);
        assert_eq!(win_ansi("日"), vec![b'?']);
    }

    #[test]
    fn test_wrap_respects_width() {
        let text = "Das Fahrzeug stand an der Ampel als ein anderes Fahrzeug von hinten auffuhr und dabei die Heckklappe beschädigte.";
        let lines = wrap(text, 30);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.chars().count() <= 30));
    }

    #[test]
    fn test_wrap_keeps_paragraphs() {
        let lines = wrap("Erste Zeile\n\nDritte Zeile\n", 80);
        assert_eq!(lines, vec!["Erste Zeile", "", "Dritte Zeile"]);
    }

    #[test]
    fn test_chars_per_line() {
        assert_eq!(chars_per_line(100.0, 10.0), 20);
        assert_eq!(chars_per_line(1.0, 50.0), 1);
    }
}
