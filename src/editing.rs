//! Markup editing helpers for Typst source.
//!
//! All offsets are byte offsets into the document. Offsets past the end are
//! clamped to it, offsets inside a multi-byte character move back to its
//! start, and reversed selections are normalised.

use std::ops::Range;

/// Deepest heading level Typst editors cycle through.
pub const MAX_HEADING_LEVEL: usize = 6;

/// Inline formatting with its opening and closing markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formatting {
    Bold,
    Italic,
    Underline,
}

impl Formatting {
    pub fn markers(self) -> (&'static str, &'static str) {
        match self {
            Self::Bold => ("*", "*"),
            Self::Italic => ("_", "_"),
            Self::Underline => ("#underline[", "]"),
        }
    }
}

/// Result of an edit: the new document and the selection to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub text: String,
    pub selection: Range<usize>,
}

/// Toggle `style` on `selection`.
///
/// An empty selection inserts both markers and places the cursor between
/// them. A selection that is already wrapped, either by including the
/// markers or by being directly surrounded by them, is unwrapped.
pub fn toggle_formatting(text: &str, selection: Range<usize>, style: Formatting) -> Edit {
    let (open, close) = style.markers();
    let Range { start, end } = clamp_selection(text, selection);

    if start == end {
        let mut out = String::with_capacity(text.len() + open.len() + close.len());
        out.push_str(&text[..start]);
        out.push_str(open);
        out.push_str(close);
        out.push_str(&text[start..]);
        let cursor = start + open.len();
        return Edit {
            text: out,
            selection: cursor..cursor,
        };
    }

    let selected = &text[start..end];
    if selected.len() >= open.len() + close.len()
        && selected.starts_with(open)
        && selected.ends_with(close)
    {
        let inner = &selected[open.len()..selected.len() - close.len()];
        return Edit {
            text: format!("{}{inner}{}", &text[..start], &text[end..]),
            selection: start..start + inner.len(),
        };
    }

    if text[..start].ends_with(open) && text[end..].starts_with(close) {
        let outer_start = start - open.len();
        return Edit {
            text: format!(
                "{}{selected}{}",
                &text[..outer_start],
                &text[end + close.len()..]
            ),
            selection: outer_start..outer_start + selected.len(),
        };
    }

    Edit {
        text: format!("{}{open}{selected}{close}{}", &text[..start], &text[end..]),
        selection: start + open.len()..end + open.len(),
    }
}

/// Heading level of a line: the number of leading `=` followed by a space.
pub fn heading_level(line: &str) -> usize {
    let level = line.chars().take_while(|&c| c == '=').count();
    let rest = &line[level..];
    if level > 0 && (rest.is_empty() || rest.starts_with(' ')) {
        level
    } else {
        0
    }
}

/// Rewrite a line as a heading of `level`; level 0 strips the heading.
pub fn set_heading_level(line: &str, level: usize) -> String {
    let current = heading_level(line);
    let body = if current > 0 {
        line[current..].trim_start_matches(' ')
    } else {
        line
    };
    match level.min(MAX_HEADING_LEVEL) {
        0 => body.to_string(),
        n => format!("{} {body}", "=".repeat(n)),
    }
}

/// Make the line containing `offset` one level deeper, up to level 6.
pub fn increase_heading_level(text: &str, offset: usize) -> Edit {
    shift_heading(text, offset, |level| (level + 1).min(MAX_HEADING_LEVEL))
}

/// Make the line containing `offset` one level shallower; level 1 becomes text.
pub fn decrease_heading_level(text: &str, offset: usize) -> Edit {
    shift_heading(text, offset, |level| level.saturating_sub(1))
}

fn shift_heading(text: &str, offset: usize, next: impl Fn(usize) -> usize) -> Edit {
    let offset = char_floor(text, offset);
    let line_start = text[..offset].rfind('\n').map_or(0, |i| i + 1);
    let line_end = text[offset..].find('\n').map_or(text.len(), |i| offset + i);
    let line = &text[line_start..line_end];

    let rewritten = set_heading_level(line, next(heading_level(line)));
    let cursor = line_start + rewritten.len();
    Edit {
        text: format!("{}{rewritten}{}", &text[..line_start], &text[line_end..]),
        selection: cursor..cursor,
    }
}

/// Largest char boundary at or below `offset`, within `text`.
fn char_floor(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

fn clamp_selection(text: &str, selection: Range<usize>) -> Range<usize> {
    let a = char_floor(text, selection.start);
    let b = char_floor(text, selection.end);
    a.min(b)..a.max(b)
}
