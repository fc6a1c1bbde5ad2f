//! Transaction translation: editor steps to document operations.

use super::{Step, Transaction, content_index};
use crate::doc::{ContentPath, Operation};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslateError {
    #[error("editor position {pos} lies before the content")]
    BeforeContent { pos: usize },
    #[error("step range {from}..{to} is inverted")]
    InvertedRange { from: usize, to: usize },
}

/// Decomposes `txn` into operations on `path`, in step order. A
/// selection-only transaction yields no operations.
///
/// Each step's positions refer to the document as left by the previous
/// steps, which matches applying the operations in sequence.
pub fn translate(txn: &Transaction, path: &ContentPath) -> Result<Vec<Operation>, TranslateError> {
    let mut operations = Vec::new();

    for step in &txn.steps {
        match step {
            Step::Replace { from, to, text } => {
                let (from, to) = (*from, *to);
                if from > to {
                    return Err(TranslateError::InvertedRange { from, to });
                }
                let text = text.as_deref().unwrap_or("");
                if from == to && text.is_empty() {
                    continue;
                }
                let index = index_of(from)?;
                if from != to {
                    operations.push(Operation::delete(path.clone(), index, to - from));
                }
                if !text.is_empty() {
                    operations.push(Operation::insert(path.clone(), index, text));
                }
            }
            Step::AddMark { from, to, mark } => {
                if let Some((start, end)) = mark_range(*from, *to)? {
                    operations.push(Operation::add_mark(path.clone(), start, end, mark.clone()));
                }
            }
            Step::RemoveMark { from, to, mark } => {
                if let Some((start, end)) = mark_range(*from, *to)? {
                    operations.push(Operation::remove_mark(path.clone(), start, end, mark.clone()));
                }
            }
        }
    }

    Ok(operations)
}

fn index_of(pos: usize) -> Result<usize, TranslateError> {
    content_index(pos).ok_or(TranslateError::BeforeContent { pos })
}

/// Editor ranges are half-open; stored mark ranges end on the last affected
/// character.
fn mark_range(from: usize, to: usize) -> Result<Option<(usize, usize)>, TranslateError> {
    if from > to {
        return Err(TranslateError::InvertedRange { from, to });
    }
    if from == to {
        return Ok(None);
    }
    Ok(Some((index_of(from)?, index_of(to - 1)?)))
}
