//! Renderable view: a single paragraph of styled text runs, rebuilt from
//! scratch after every change.

use super::Selection;
use super::schema::{Schema, SchemaError};
use crate::core::mark::{MarkType, span_ranges};
use crate::doc::FormattedText;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextRun {
    pub text: String,
    /// Active marks in the schema's canonical order.
    pub marks: Vec<MarkType>,
}

impl TextRun {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// One paragraph of runs. No run is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EditorDoc {
    runs: Vec<TextRun>,
}

/// A position clamped into the paragraph, with its content offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPos {
    pub pos: usize,
    pub offset: usize,
}

impl EditorDoc {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> &[TextRun] {
        &self.runs
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }

    pub fn text_len(&self) -> usize {
        self.runs.iter().map(TextRun::char_len).sum()
    }

    /// Size including the paragraph's opening and closing boundaries.
    pub fn content_size(&self) -> usize {
        self.text_len() + 2
    }

    /// Resolves `pos` against this view. Positions outside the paragraph's
    /// text are clamped to its nearest end.
    pub fn resolve(&self, pos: usize) -> ResolvedPos {
        let pos = pos.clamp(1, self.text_len() + 1);
        ResolvedPos {
            pos,
            offset: pos - 1,
        }
    }

    /// Marks in effect at `pos`: those of the character before it, or of
    /// the first character at the start of the paragraph.
    pub fn marks_at(&self, pos: usize) -> &[MarkType] {
        let offset = self.resolve(pos).offset;
        let target = offset.saturating_sub(1);
        let mut seen = 0usize;
        for run in &self.runs {
            let len = run.char_len();
            if target < seen + len {
                return &run.marks;
            }
            seen += len;
        }
        &[]
    }
}

/// Maps format spans onto text runs, one run per span.
pub fn build_view(formatted: &FormattedText, schema: &Schema) -> Result<EditorDoc, SchemaError> {
    let chars: Vec<char> = formatted.text.chars().collect();
    let mut runs = Vec::with_capacity(formatted.spans.len());
    for (range, marks) in span_ranges(&formatted.spans, chars.len()) {
        runs.push(TextRun {
            text: chars[range].iter().collect(),
            marks: schema.order(marks)?,
        });
    }
    Ok(EditorDoc { runs })
}

/// Re-resolves a selection taken against an older view.
pub fn remap_selection(selection: Selection, view: &EditorDoc) -> Selection {
    Selection::new(
        view.resolve(selection.anchor).pos,
        view.resolve(selection.head).pos,
    )
}
