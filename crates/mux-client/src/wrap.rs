//! Greedy word wrap for chat messages.
//!
//! `say` and `tell` bodies are wrapped to the game's line width and sent
//! as one command per wrapped line, continuation lines carrying an indent
//! marker. The indent counts against the width of continuation lines, and
//! a word longer than the available width is split rather than overflowing.

/// Wrap `text` to `width` columns, prefixing every line after the first
/// with `subsequent_indent`. Whitespace runs collapse to single spaces.
pub fn wrap(text: &str, width: usize, subsequent_indent: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut pending: std::collections::VecDeque<String> =
        text.split_whitespace().map(str::to_string).collect();
    let mut current = String::new();

    while let Some(word) = pending.pop_front() {
        let indent = if lines.is_empty() { "" } else { subsequent_indent };
        let available = width.saturating_sub(indent.len()).max(1);

        if current.is_empty() {
            if word.len() <= available {
                current = word;
            } else {
                let cut = split_point(&word, available);
                lines.push(format!("{indent}{}", &word[..cut]));
                pending.push_front(word[cut..].to_string());
            }
        } else if current.len() + 1 + word.len() <= available {
            current.push(' ');
            current.push_str(&word);
        } else {
            lines.push(format!("{indent}{current}"));
            current.clear();
            pending.push_front(word);
        }
    }

    if !current.is_empty() {
        let indent = if lines.is_empty() { "" } else { subsequent_indent };
        lines.push(format!("{indent}{current}"));
    }
    lines
}

/// Largest char boundary not exceeding `limit`, but at least one char.
fn split_point(word: &str, limit: usize) -> usize {
    let mut cut = limit.min(word.len());
    while cut > 0 && !word.is_char_boundary(cut) {
        cut -= 1;
    }
    if cut == 0 {
        word.chars().next().map(char::len_utf8).unwrap_or(0)
    } else {
        cut
    }
}
