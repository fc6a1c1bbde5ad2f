//! Editor-side model: the parts of a linear rich-text editor the bridge
//! reads and writes.
//!
//! The editor document is a single paragraph. Position 0 sits before the
//! paragraph, position 1 before the first character, and `len + 1` after
//! the last one.

use crate::core::mark::MarkType;

pub mod schema;
pub mod translate;
pub mod view;

pub use schema::{Schema, SchemaError};
pub use translate::{TranslateError, translate};
pub use view::{EditorDoc, ResolvedPos, TextRun, build_view, remap_selection};

/// Maps an editor position to a content index. Position 0 is the paragraph
/// boundary and has no content index.
pub fn content_index(pos: usize) -> Option<usize> {
    pos.checked_sub(1)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Replaces `from..to` with `text`. `None` is a pure deletion.
    Replace {
        from: usize,
        to: usize,
        text: Option<String>,
    },
    AddMark {
        from: usize,
        to: usize,
        mark: MarkType,
    },
    RemoveMark {
        from: usize,
        to: usize,
        mark: MarkType,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub anchor: usize,
    pub head: usize,
}

impl Selection {
    pub fn new(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    pub fn cursor(pos: usize) -> Self {
        Self::new(pos, pos)
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.head
    }
}

/// Ordered steps plus the selection the editor wants afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transaction {
    pub steps: Vec<Step>,
    pub selection: Selection,
}

impl Transaction {
    pub fn new(selection: Selection) -> Self {
        Self {
            steps: Vec::new(),
            selection,
        }
    }

    pub fn replace(mut self, from: usize, to: usize, text: &str) -> Self {
        self.steps.push(Step::Replace {
            from,
            to,
            text: Some(text.to_string()),
        });
        self
    }

    pub fn insert(self, pos: usize, text: &str) -> Self {
        self.replace(pos, pos, text)
    }

    pub fn delete(mut self, from: usize, to: usize) -> Self {
        self.steps.push(Step::Replace {
            from,
            to,
            text: None,
        });
        self
    }

    pub fn add_mark(mut self, from: usize, to: usize, mark: MarkType) -> Self {
        self.steps.push(Step::AddMark { from, to, mark });
        self
    }

    pub fn remove_mark(mut self, from: usize, to: usize, mark: MarkType) -> Self {
        self.steps.push(Step::RemoveMark { from, to, mark });
        self
    }

    pub fn is_selection_only(&self) -> bool {
        self.steps.is_empty()
    }
}
