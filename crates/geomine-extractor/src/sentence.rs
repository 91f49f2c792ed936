//! Sentence segmentation and span context
//!
//! A rule-based splitter: a sentence ends at `.`, `!` or `?` (plus any
//! closing quotes or brackets) followed by whitespace, or at a blank line.
//! Offsets are bytes into the original text.

use std::ops::Range;

const TERMINALS: [char; 3] = ['.', '!', '?'];
const CLOSERS: [char; 7] = ['"', '\'', ')', ']', '\u{201d}', '\u{2019}', '\u{00bb}'];

/// Byte ranges of the sentences in `text`, trimmed of surrounding whitespace
pub fn sentence_bounds(text: &str) -> Vec<Range<usize>> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut bounds = Vec::new();
    let mut start: Option<usize> = None;
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];

        let Some(sentence_start) = start else {
            if !c.is_whitespace() {
                start = Some(pos);
            } else {
                i += 1;
            }
            continue;
        };

        if TERMINALS.contains(&c) {
            let mut j = i + 1;
            while j < chars.len() && (TERMINALS.contains(&chars[j].1) || CLOSERS.contains(&chars[j].1)) {
                j += 1;
            }
            if j == chars.len() || chars[j].1.is_whitespace() {
                let end = chars.get(j).map(|(p, _)| *p).unwrap_or(text.len());
                push_trimmed(&mut bounds, text, sentence_start, end);
                start = None;
            }
            i = j;
            continue;
        }

        if c == '\n' && is_paragraph_break(&chars[i + 1..]) {
            push_trimmed(&mut bounds, text, sentence_start, pos);
            start = None;
        }
        i += 1;
    }

    if let Some(sentence_start) = start {
        push_trimmed(&mut bounds, text, sentence_start, text.len());
    }
    bounds
}

/// Only horizontal whitespace before the next newline
fn is_paragraph_break(rest: &[(usize, char)]) -> bool {
    for &(_, c) in rest {
        match c {
            '\n' => return true,
            ' ' | '\t' | '\r' => continue,
            _ => return false,
        }
    }
    false
}

fn push_trimmed(bounds: &mut Vec<Range<usize>>, text: &str, start: usize, end: usize) {
    let trimmed = text[start..end].trim_end();
    if !trimmed.is_empty() {
        bounds.push(start..start + trimmed.len());
    }
}

/// Context for the span `start..end`: the sentence containing it, or
/// `window` characters either side when no single sentence does.
pub fn context_for(text: &str, start: usize, end: usize, window: usize) -> String {
    let end = end.min(text.len());
    let start = start.min(end);
    if !text.is_char_boundary(start) || !text.is_char_boundary(end) {
        return text.trim().to_string();
    }

    if let Some(range) = sentence_bounds(text)
        .into_iter()
        .find(|r| r.start <= start && end <= r.end)
    {
        return text[range].to_string();
    }

    let lo = text[..start]
        .char_indices()
        .rev()
        .take(window)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(start);
    let hi = text[end..]
        .char_indices()
        .nth(window)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    text[lo..hi].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentences(text: &str) -> Vec<&str> {
        sentence_bounds(text).into_iter().map(|r| &text[r]).collect()
    }

    #[test]
    fn test_basic_split() {
        let text = "Golden Ridge Mine is located near Kalgoorlie. Drilling resumed in May!  Is it open?";
        assert_eq!(
            sentences(text),
            vec![
                "Golden Ridge Mine is located near Kalgoorlie.",
                "Drilling resumed in May!",
                "Is it open?"
            ]
        );
    }

    #[test]
    fn test_decimals_and_closers() {
        let text = "Grades averaged 2.5 g/t Au (\"high grade.\") The pit deepened";
        assert_eq!(
            sentences(text),
            vec!["Grades averaged 2.5 g/t Au (\"high grade.\")", "The pit deepened"]
        );
    }

    #[test]
    fn test_blank_line_ends_sentence() {
        let text = "EXPLORATION SUMMARY\n  \nThe Nova deposit lies east of Norseman.";
        assert_eq!(
            sentences(text),
            vec!["EXPLORATION SUMMARY", "The Nova deposit lies east of Norseman."]
        );
    }

    #[test]
    fn test_single_newline_does_not_split() {
        let text = "The Nova deposit lies\neast of Norseman.";
        assert_eq!(sentences(text).len(), 1);
    }

    #[test]
    fn test_context_is_containing_sentence() {
        let text = "Intro text. Golden Ridge Mine is located near Kalgoorlie. Outro.";
        let start = text.find("Golden").unwrap();
        let ctx = context_for(text, start, start + "Golden Ridge".len(), 200);
        assert_eq!(ctx, "Golden Ridge Mine is located near Kalgoorlie.");
    }

    #[test]
    fn test_context_falls_back_to_window() {
        // The span crosses the break after "Mt."
        let text = "Work continued at the Mt. Magnet operation during the quarter.";
        let start = text.find("Mt.").unwrap();
        let end = start + "Mt. Magnet".len();

        let ctx = context_for(text, start, end, 5);
        assert_eq!(ctx, " the Mt. Magnet oper");

        let wide = context_for(text, start, end, 200);
        assert_eq!(wide, text);
    }

    #[test]
    fn test_window_respects_char_boundaries() {
        let text = "Zürich–Kalgoorlie. Ünit";
        let start = text.find("Kalgoorlie.").unwrap();
        // Span crosses the sentence end
        let end = text.len();
        let ctx = context_for(text, start, end, 3);
        assert!(ctx.starts_with("ch–"));
        assert!(ctx.ends_with("Ünit"));
    }
}
