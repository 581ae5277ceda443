//! Length optimisation for titles and descriptions.

use crate::util::html::collapse_whitespace;

pub const TITLE_MAX_CHARS: usize = 60;
/// Titles are cut at or before this character index.
pub const TITLE_CUT_CHARS: usize = 57;
pub const DESCRIPTION_TARGET_CHARS: usize = 160;

const ELLIPSIS: &str = "...";
const BOUNDARY_RATIO_PERCENT: usize = 70;

/// Fit `title` into [`TITLE_MAX_CHARS`] without splitting a word.
///
/// Over-long titles are cut at the last whitespace whose index is at most
/// [`TITLE_CUT_CHARS`] and suffixed with `...`. A single word longer than the
/// cut point is hard-truncated.
pub fn optimize_title(title: &str) -> String {
    let title = collapse_whitespace(title);
    let chars: Vec<char> = title.chars().collect();
    if chars.len() <= TITLE_MAX_CHARS {
        return title;
    }

    let window = &chars[..=TITLE_CUT_CHARS];
    let head: String = match window.iter().rposition(|ch| ch.is_whitespace()) {
        Some(index) if index > 0 => window[..index].iter().collect(),
        _ => chars[..TITLE_CUT_CHARS].iter().collect(),
    };
    format!("{}{ELLIPSIS}", head.trim_end())
}

/// Fit `text` into `target` characters.
///
/// Whole sentences are preferred. When not even the first sentence fits, the
/// text is cut at a word boundary no earlier than 70% of `target`, falling
/// back to a hard cut.
pub fn optimize_description(text: &str, target: usize) -> String {
    let text = collapse_whitespace(text);
    if text.chars().count() <= target {
        return text;
    }

    let mut accumulated = String::new();
    for sentence in sentences(&text) {
        let candidate_len = if accumulated.is_empty() {
            sentence.chars().count()
        } else {
            accumulated.chars().count() + 1 + sentence.chars().count()
        };
        if candidate_len > target {
            break;
        }
        if !accumulated.is_empty() {
            accumulated.push(' ');
        }
        accumulated.push_str(sentence);
    }
    if !accumulated.is_empty() {
        return accumulated;
    }

    let chars: Vec<char> = text.chars().collect();
    let limit = target.saturating_sub(ELLIPSIS.len());
    let floor = (target * BOUNDARY_RATIO_PERCENT).div_ceil(100);
    let head: String = match chars[..=limit].iter().rposition(|ch| ch.is_whitespace()) {
        Some(index) if index >= floor => chars[..index].iter().collect(),
        _ => chars[..limit].iter().collect(),
    };
    format!("{}{ELLIPSIS}", head.trim_end())
}

// Sentences end at `.`, `!` or `?` followed by whitespace or end of input.
fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut iter = text.char_indices().peekable();
    while let Some((index, ch)) = iter.next() {
        if !matches!(ch, '.' | '!' | '?') {
            continue;
        }
        let at_boundary = iter.peek().is_none_or(|&(_, next)| next.is_whitespace());
        if at_boundary {
            let end = index + ch.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                out.push(sentence);
            }
            start = end;
        }
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        out.push(rest);
    }
    out
}
