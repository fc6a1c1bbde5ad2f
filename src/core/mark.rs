//! Rich text marks: anchored mark operations and span resolution.
//!
//! Mark operations are persisted with [`Anchor`]s that point at element ids,
//! so concurrent inserts and deletes elsewhere never invalidate them. At
//! render time every operation is resolved to integer offsets and the whole
//! log is flattened by [`resolve_format_spans`].

use super::{OffsetIndex, OpId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Name of a mark, e.g. `strong` or `em`. The vocabulary belongs to the
/// rendering schema; the CRDT stores any name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkType(String);

impl MarkType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn strong() -> Self {
        Self::new("strong")
    }

    pub fn em() -> Self {
        Self::new("em")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MarkType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkAction {
    Add,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorBias {
    Before,
    After,
}

/// Stable reference to a character boundary: just before or just after the
/// element `elem_id`, whether or not that element is still visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub elem_id: OpId,
    pub bias: AnchorBias,
}

impl Anchor {
    pub fn before(elem_id: OpId) -> Self {
        Self {
            elem_id,
            bias: AnchorBias::Before,
        }
    }

    pub fn after(elem_id: OpId) -> Self {
        Self {
            elem_id,
            bias: AnchorBias::After,
        }
    }

    pub fn resolve(&self, offsets: &OffsetIndex<'_>) -> Option<usize> {
        let (before, visible) = offsets.locate(&self.elem_id)?;
        Some(match self.bias {
            AnchorBias::Before => before,
            AnchorBias::After => before + usize::from(visible),
        })
    }
}

/// A persisted add/remove mark operation, in causal log order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkRecord {
    pub id: OpId,
    pub action: MarkAction,
    pub mark_type: MarkType,
    pub start: Anchor,
    pub end: Anchor,
}

impl MarkRecord {
    /// Current half-open offsets of this operation.
    pub fn resolve(&self, offsets: &OffsetIndex<'_>) -> Option<ResolvedMark> {
        Some(ResolvedMark {
            action: self.action,
            mark_type: self.mark_type.clone(),
            start: self.start.resolve(offsets)?,
            end: self.end.resolve(offsets)?,
        })
    }
}

/// A mark operation resolved to half-open offsets `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMark {
    pub action: MarkAction,
    pub mark_type: MarkType,
    pub start: usize,
    pub end: usize,
}

impl ResolvedMark {
    pub fn add(mark_type: impl Into<MarkType>, start: usize, end: usize) -> Self {
        Self {
            action: MarkAction::Add,
            mark_type: mark_type.into(),
            start,
            end,
        }
    }

    pub fn remove(mark_type: impl Into<MarkType>, start: usize, end: usize) -> Self {
        Self {
            action: MarkAction::Remove,
            mark_type: mark_type.into(),
            start,
            end,
        }
    }
}

/// A maximal run of text sharing one exact set of active marks. The run
/// extends to the next span's start, or to the text length for the last one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatSpan {
    pub start: usize,
    pub marks: BTreeSet<MarkType>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("empty format span at offset {start}")]
pub struct EmptySpanError {
    pub start: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Open,
    Close,
}

#[derive(Debug)]
struct DeltaEvent<'a> {
    offset: usize,
    log_seq: usize,
    edge: Edge,
    action: MarkAction,
    mark_type: &'a MarkType,
}

/// Flattens a causally ordered mark log into non-overlapping spans that
/// exactly cover `[0, len)`.
///
/// For each mark type, the state at an offset is decided by the covering
/// operation that comes latest in `log`: an add makes it active, a remove
/// inactive. Offsets not covered by any operation are unmarked. Events are
/// ordered by `(offset, log_seq)`; all events at one offset are applied
/// before the active set is compared, so a boundary is emitted only where
/// the set really changes.
pub fn resolve_format_spans(log: &[ResolvedMark], len: usize) -> Vec<FormatSpan> {
    if len == 0 {
        return Vec::new();
    }

    let mut events = Vec::with_capacity(log.len() * 2);
    for (log_seq, mark) in log.iter().enumerate() {
        let start = mark.start.min(len);
        let end = mark.end.min(len);
        if start >= end {
            continue;
        }
        for (offset, edge) in [(start, Edge::Open), (end, Edge::Close)] {
            events.push(DeltaEvent {
                offset,
                log_seq,
                edge,
                action: mark.action,
                mark_type: &mark.mark_type,
            });
        }
    }
    events.sort_by_key(|event| (event.offset, event.log_seq));

    let mut covering: BTreeMap<&MarkType, BTreeMap<usize, MarkAction>> = BTreeMap::new();
    let mut active: BTreeSet<MarkType> = BTreeSet::new();
    let mut current: BTreeSet<MarkType> = BTreeSet::new();
    let mut span_start = 0usize;
    let mut spans = Vec::new();

    let mut next = 0usize;
    while let Some(first) = events.get(next) {
        let offset = first.offset;
        if offset >= len {
            break;
        }

        let mut touched: BTreeSet<&MarkType> = BTreeSet::new();
        while let Some(event) = events.get(next).filter(|event| event.offset == offset) {
            let ops = covering.entry(event.mark_type).or_default();
            match event.edge {
                Edge::Open => {
                    ops.insert(event.log_seq, event.action);
                }
                Edge::Close => {
                    ops.remove(&event.log_seq);
                }
            }
            touched.insert(event.mark_type);
            next += 1;
        }

        for mark_type in touched {
            let on = covering
                .get(mark_type)
                .and_then(|ops| ops.last_key_value())
                .is_some_and(|(_, action)| *action == MarkAction::Add);
            if on {
                active.insert(mark_type.clone());
            } else {
                active.remove(mark_type);
            }
        }

        if active != current {
            if offset > span_start {
                spans.push(FormatSpan {
                    start: span_start,
                    marks: std::mem::replace(&mut current, active.clone()),
                });
                span_start = offset;
            } else {
                current = active.clone();
            }
        }
    }

    spans.push(FormatSpan {
        start: span_start,
        marks: current,
    });
    spans
}

/// Pairs each span with its half-open range, dropping (and logging) any span
/// that would be empty. The resolver never produces one; spans from another
/// source might.
pub fn span_ranges(
    spans: &[FormatSpan],
    len: usize,
) -> Vec<(std::ops::Range<usize>, &BTreeSet<MarkType>)> {
    let mut ranges = Vec::with_capacity(spans.len());
    for (idx, span) in spans.iter().enumerate() {
        let end = spans.get(idx + 1).map_or(len, |next| next.start).min(len);
        if end <= span.start {
            let defect = EmptySpanError { start: span.start };
            tracing::warn!(error = %defect, "dropping format span");
            continue;
        }
        ranges.push((span.start..end, &span.marks));
    }
    ranges
}
