//! Base-14 Helvetica metrics and WinAnsi encoding.
//!
//! The renderer only uses the two standard Helvetica faces, so text is
//! measured from their AFM advance widths (1/1000 em) and encoded as
//! WinAnsi bytes without embedding any font program.

/// Advance widths for ASCII 32..=126, Helvetica.
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

/// Advance widths for ASCII 32..=126, Helvetica-Bold.
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // '0'..'?'
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 'P'..'_'
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // '`'..'o'
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 'p'..'~'
];

/// Width used for anything outside printable ASCII.
const FALLBACK_WIDTH: u16 = 556;

/// Typographic characters WinAnsi places in 0x80..=0x9F.
fn win_ansi_special(c: char) -> Option<(u8, u16)> {
    Some(match c {
        '\u{2022}' => (0x95, 350),  // bullet
        '\u{2013}' => (0x96, 556),  // en dash
        '\u{2014}' => (0x97, 1000), // em dash
        '\u{2018}' => (0x91, 222),
        '\u{2019}' => (0x92, 222),
        '\u{201C}' => (0x93, 333),
        '\u{201D}' => (0x94, 333),
        '\u{2026}' => (0x85, 1000),
        '\u{20AC}' => (0x80, 556),
        _ => return None,
    })
}

/// Advance width of one character in 1/1000 em.
pub fn char_width(c: char, bold: bool) -> u16 {
    let code = c as u32;
    if (32..=126).contains(&code) {
        let table = if bold { &HELVETICA_BOLD } else { &HELVETICA };
        return table[(code - 32) as usize];
    }
    if c == '\u{a0}' {
        return 278;
    }
    win_ansi_special(c).map_or(FALLBACK_WIDTH, |(_, w)| w)
}

/// Width of `text` in points at `size`.
pub fn text_width(text: &str, size: f32, bold: bool) -> f32 {
    let units: u32 = text.chars().map(|c| u32::from(char_width(c, bold))).sum();
    units as f32 * size / 1000.0
}

/// Encode text as WinAnsi bytes. Unmappable characters become `?`.
pub fn to_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u8,
            _ => win_ansi_special(c).map_or(b'?', |(byte, _)| byte),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_widths() {
        assert_eq!(char_width(' ', false), 278);
        assert_eq!(char_width('A', false), 667);
        assert_eq!(char_width('A', true), 722);
        assert_eq!(char_width('~', true), 584);
        assert_eq!(char_width('\u{4e2d}', false), FALLBACK_WIDTH);
    }

    #[test]
    fn test_text_width_scales_with_size() {
        let w10 = text_width("Hello", 10.0, false);
        let w20 = text_width("Hello", 20.0, false);
        assert!((w20 - 2.0 * w10).abs() < 0.001);
        assert!(text_width("Hello", 10.0, true) > w10);
    }

    #[test]
    fn test_win_ansi_encoding() {
        assert_eq!(to_win_ansi("a\u{2022}é"), vec![b'a', 0x95, 0xE9]);
        assert_eq!(to_win_ansi("\u{4e2d}"), vec![b'?']);
    }
}
