//! Bold-marker runs and word wrapping.

use crate::normalize::{BOLD_CLOSE, BOLD_OPEN, unescape_markers};

use super::metrics::text_width;

/// A piece of one wrapped line.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub bold: bool,
    /// Offset from the line start, in points.
    pub x: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Line {
    pub spans: Vec<Span>,
    pub width: f32,
}

impl Line {
    pub fn plain_text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join("")
    }
}

/// Split marked text into `(text, bold)` runs. Markers nest; unbalanced
/// closers are ignored.
pub fn parse_runs(text: &str, base_bold: bool) -> Vec<(String, bool)> {
    let mut runs: Vec<(String, bool)> = Vec::new();
    let mut depth = 0usize;
    let mut rest = text;

    loop {
        let open = rest.find(BOLD_OPEN);
        let close = rest.find(BOLD_CLOSE);
        let (idx, is_open) = match (open, close) {
            (Some(o), Some(c)) if o < c => (o, true),
            (Some(_), Some(c)) | (None, Some(c)) => (c, false),
            (Some(o), None) => (o, true),
            (None, None) => {
                push_run(&mut runs, rest, base_bold || depth > 0);
                return runs;
            }
        };

        push_run(&mut runs, &rest[..idx], base_bold || depth > 0);
        if is_open {
            depth += 1;
            rest = &rest[idx + BOLD_OPEN.len()..];
        } else {
            depth = depth.saturating_sub(1);
            rest = &rest[idx + BOLD_CLOSE.len()..];
        }
    }
}

fn push_run(runs: &mut Vec<(String, bool)>, text: &str, bold: bool) {
    let text = unescape_markers(text);
    if text.is_empty() {
        return;
    }
    match runs.last_mut() {
        Some((last, last_bold)) if *last_bold == bold => last.push_str(&text),
        _ => runs.push((text, bold)),
    }
}

/// Text without bold markers.
pub fn strip_markers(text: &str) -> String {
    parse_runs(text, false)
        .into_iter()
        .map(|(t, _)| t)
        .collect()
}

struct Word {
    text: String,
    bold: bool,
    space_before: bool,
}

fn words(runs: &[(String, bool)]) -> Vec<Word> {
    let mut out = Vec::new();
    let mut pending_space = false;
    for (text, bold) in runs {
        let mut current = String::new();
        for c in text.chars() {
            if c.is_whitespace() {
                if !current.is_empty() {
                    out.push(Word {
                        text: std::mem::take(&mut current),
                        bold: *bold,
                        space_before: pending_space,
                    });
                    pending_space = false;
                }
                pending_space = true;
            } else {
                current.push(c);
            }
        }
        if !current.is_empty() {
            out.push(Word {
                text: current,
                bold: *bold,
                space_before: pending_space,
            });
            pending_space = false;
        }
    }
    out
}

/// Wrap marked text to `max_width` points.
pub fn wrap(text: &str, size: f32, max_width: f32, base_bold: bool) -> Vec<Line> {
    let runs = parse_runs(text, base_bold);
    let mut lines = Vec::new();
    let mut line = Line::default();

    for word in words(&runs) {
        let word_width = text_width(&word.text, size, word.bold);
        let space = if word.space_before && !line.spans.is_empty() {
            text_width(" ", size, word.bold)
        } else {
            0.0
        };

        if !line.spans.is_empty() && line.width + space + word_width > max_width {
            lines.push(std::mem::take(&mut line));
        }

        if line.spans.is_empty() && word_width > max_width {
            for piece in split_long_word(&word.text, size, max_width, word.bold) {
                if !line.spans.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                let w = text_width(&piece, size, word.bold);
                place(&mut line, piece, word.bold, 0.0, w);
            }
            continue;
        }

        let space = if line.spans.is_empty() { 0.0 } else { space };
        place(&mut line, word.text, word.bold, space, word_width);
    }

    if !line.spans.is_empty() {
        lines.push(line);
    }
    lines
}

fn place(line: &mut Line, text: String, bold: bool, space: f32, width: f32) {
    if let Some(last) = line.spans.last_mut()
        && last.bold == bold
    {
        if space > 0.0 {
            last.text.push(' ');
        }
        last.text.push_str(&text);
    } else {
        let x = line.width + space;
        line.spans.push(Span { text, bold, x });
    }
    line.width += space + width;
}

fn split_long_word(word: &str, size: f32, max_width: f32, bold: bool) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for c in word.chars() {
        let candidate_width = text_width(&current, size, bold) + text_width(&c.to_string(), size, bold);
        if !current.is_empty() && candidate_width > max_width {
            pieces.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_runs() {
        assert_eq!(
            parse_runs("a [[B]]b[[/B]] c", false),
            vec![("a ".into(), false), ("b".into(), true), (" c".into(), false)]
        );
    }

    #[test]
    fn test_nested_and_stray_markers() {
        assert_eq!(
            parse_runs("[[B]]x [[B]][y][[/B]] z[[/B]][[/B]]w", false),
            vec![("x [y] z".into(), true), ("w".into(), false)]
        );
        assert_eq!(strip_markers("[[B]][Grak][[/B]]"), "[Grak]");
    }

    #[test]
    fn test_escaped_markers_render_literally() {
        let escaped = crate::normalize::escape_markers("type [[B]]x[[/B]] here");
        assert_eq!(
            parse_runs(&escaped, false),
            vec![("type [[B]]x[[/B]] here".into(), false)]
        );
        assert_eq!(strip_markers(&escaped), "type [[B]]x[[/B]] here");
    }

    #[test]
    fn test_wrap_respects_width() {
        let text = "the quick brown fox jumps over the lazy dog ".repeat(10);
        let lines = wrap(&text, 11.0, 200.0, false);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.width <= 200.0 + 0.01, "{}", line.width);
        }
        let rejoined: Vec<String> = lines.iter().map(|l| l.plain_text()).collect();
        assert_eq!(rejoined.join(" "), text.trim());
    }

    #[test]
    fn test_wrap_keeps_bold_spans() {
        let lines = wrap("Deals [[B]]2d6[[/B]] damage", 11.0, 500.0, false);
        assert_eq!(lines.len(), 1);
        let spans = &lines[0].spans;
        assert_eq!(spans.len(), 3);
        assert!(spans[1].bold);
        assert_eq!(spans[1].text, "2d6");
        assert!(spans[1].x > 0.0 && spans[2].x > spans[1].x);
    }

    #[test]
    fn test_long_word_is_split() {
        let lines = wrap(&"W".repeat(100), 11.0, 100.0, false);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.width <= 100.0 + 0.01));
    }

    #[test]
    fn test_empty_text() {
        assert!(wrap("", 11.0, 100.0, false).is_empty());
        assert!(wrap("[[B]][[/B]]", 11.0, 100.0, false).is_empty());
    }
}
