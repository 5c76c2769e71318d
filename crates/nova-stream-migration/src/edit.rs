//! Text edit primitives and utilities.

use nova_types::Span;
use serde::Serialize;

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TextEdit {
    pub range: Span,
    pub replacement: String,
}

impl TextEdit {
    pub fn new(range: Span, replacement: impl Into<String>) -> Self {
        Self {
            range,
            replacement: replacement.into(),
        }
    }

    pub fn insert(offset: usize, text: impl Into<String>) -> Self {
        Self::new(Span::new(offset, offset), text)
    }

    pub fn delete(range: Span) -> Self {
        Self::new(range, String::new())
    }
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum EditError {
    #[error("edit range {range:?} is out of bounds for text length {text_len}")]
    RangeOutOfBounds { range: Span, text_len: usize },
    #[error("offset {offset} is not a UTF-8 character boundary")]
    InvalidUtf8Boundary { offset: usize },
    #[error("overlapping edits: {first:?} overlaps {second:?}")]
    OverlappingEdits { first: Span, second: Span },
}

/// Apply a list of edits to a text snapshot.
///
/// The function is deterministic: edits are first sorted by `(start, end)` and
/// applied from the end of the text backwards.
pub fn apply_text_edits(text: &str, edits: &[TextEdit]) -> Result<String, EditError> {
    let mut edits = edits.to_vec();
    normalize_text_edits(text, &mut edits)?;

    let mut out = text.to_string();
    for edit in edits.into_iter().rev() {
        debug_assert!(out.is_char_boundary(edit.range.start) && out.is_char_boundary(edit.range.end));
        out.replace_range(edit.range.start..edit.range.end, &edit.replacement);
    }
    Ok(out)
}

/// Sort edits and check for overlaps / out-of-bounds.
pub fn normalize_text_edits(text: &str, edits: &mut Vec<TextEdit>) -> Result<(), EditError> {
    edits.sort_by_key(|e| (e.range.start, e.range.end));

    let text_len = text.len();
    for edit in edits.iter() {
        if edit.range.start > edit.range.end || edit.range.end > text_len {
            return Err(EditError::RangeOutOfBounds {
                range: edit.range,
                text_len,
            });
        }
        for offset in [edit.range.start, edit.range.end] {
            if !text.is_char_boundary(offset) {
                return Err(EditError::InvalidUtf8Boundary { offset });
            }
        }
    }

    for pair in edits.windows(2) {
        let first = &pair[0];
        let second = &pair[1];
        if first.range.end > second.range.start
            || (first.range.is_empty()
                && second.range.is_empty()
                && first.range.start == second.range.start)
        {
            return Err(EditError::OverlappingEdits {
                first: first.range,
                second: second.range,
            });
        }
    }

    // Coalesce adjacent edits (e.g. two back-to-back deletions).
    let mut merged: Vec<TextEdit> = Vec::with_capacity(edits.len());
    for edit in edits.drain(..) {
        if let Some(last) = merged.last_mut() {
            if last.range.end == edit.range.start {
                last.range = Span::new(last.range.start, edit.range.end);
                last.replacement.push_str(&edit.replacement);
                continue;
            }
        }
        merged.push(edit);
    }
    *edits = merged;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_multiple_edits_is_deterministic() {
        let text = "abcdef";
        let mut edits = vec![
            TextEdit::new(Span::new(2, 4), "XX"),
            TextEdit::insert(0, "!"),
            TextEdit::delete(Span::new(5, 6)),
        ];

        let out1 = apply_text_edits(text, &edits).unwrap();

        edits.reverse();
        let out2 = apply_text_edits(text, &edits).unwrap();

        assert_eq!(out1, out2);
        assert_eq!(out1, "!abXXe");
    }

    #[test]
    fn detect_overlapping_edits() {
        let text = "abcdef";
        let edits = vec![
            TextEdit::new(Span::new(1, 4), "X"),
            TextEdit::new(Span::new(3, 5), "Y"),
        ];

        assert!(matches!(
            apply_text_edits(text, &edits),
            Err(EditError::OverlappingEdits { .. })
        ));

        let inserts = vec![TextEdit::insert(2, "a"), TextEdit::insert(2, "b")];
        assert!(matches!(
            apply_text_edits(text, &inserts),
            Err(EditError::OverlappingEdits { .. })
        ));
    }

    #[test]
    fn rejects_ranges_outside_the_text() {
        let edits = vec![TextEdit::new(Span::new(4, 9), "")];
        assert_eq!(
            apply_text_edits("abcdef", &edits),
            Err(EditError::RangeOutOfBounds {
                range: Span::new(4, 9),
                text_len: 6
            })
        );

        let edits = vec![TextEdit::insert(1, "x")];
        assert_eq!(
            apply_text_edits("éa", &edits),
            Err(EditError::InvalidUtf8Boundary { offset: 1 })
        );
    }

    #[test]
    fn adjacent_deletions_are_coalesced() {
        let mut edits = vec![
            TextEdit::delete(Span::new(3, 5)),
            TextEdit::delete(Span::new(1, 3)),
        ];
        normalize_text_edits("abcdef", &mut edits).unwrap();
        assert_eq!(edits, vec![TextEdit::delete(Span::new(1, 5))]);
    }
}
