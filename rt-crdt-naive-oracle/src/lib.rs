//! A naive, simple oracle implementation for differential testing.
use rt_crdt::core::mark::{
    Anchor, AnchorBias, FormatSpan, MarkAction, MarkRecord, MarkType, ResolvedMark,
};
use rt_crdt::core::{OpId, SequenceOp};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Element<T> {
    id: OpId,
    value: Option<T>,
    after: Option<OpId>,
}

/// RGA that recomputes the whole order as a tree walk after every insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence<T> {
    elements: Vec<Element<T>>,
}

impl<T: Clone> Default for Sequence<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Sequence<T> {
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
        }
    }

    pub fn apply(&mut self, op: SequenceOp<T>) {
        match op {
            SequenceOp::Insert { after, id, value } => self.insert(after, value, id),
            SequenceOp::Delete { target } => self.delete(target),
        }
    }

    pub fn insert(&mut self, after: Option<OpId>, value: T, id: OpId) {
        if self.elements.iter().any(|elem| elem.id == id) {
            return;
        }
        if let Some(anchor) = &after {
            if !self.elements.iter().any(|elem| elem.id == *anchor) {
                return;
            }
        }

        self.elements.push(Element {
            id,
            value: Some(value),
            after,
        });
        self.rebuild_order();
    }

    pub fn delete(&mut self, target: OpId) {
        if let Some(elem) = self.elements.iter_mut().find(|elem| elem.id == target) {
            elem.value = None;
        }
    }

    pub fn elements(&self) -> Vec<T> {
        self.elements
            .iter()
            .filter_map(|elem| elem.value.clone())
            .collect()
    }

    /// Every element id in document order, tombstones included.
    pub fn order(&self) -> Vec<OpId> {
        self.elements.iter().map(|elem| elem.id.clone()).collect()
    }

    /// Offset of an anchor, computed by scanning the full order.
    pub fn resolve_anchor(&self, anchor: &Anchor) -> Option<usize> {
        let position = self
            .elements
            .iter()
            .position(|elem| elem.id == anchor.elem_id)?;
        let before = self.elements[..position]
            .iter()
            .filter(|elem| elem.value.is_some())
            .count();
        let visible = self.elements[position].value.is_some();
        Some(match anchor.bias {
            AnchorBias::Before => before,
            AnchorBias::After => before + usize::from(visible),
        })
    }

    fn rebuild_order(&mut self) {
        let mut element_map: BTreeMap<OpId, Element<T>> = BTreeMap::new();
        for elem in self.elements.drain(..) {
            element_map.insert(elem.id.clone(), elem);
        }

        let mut children: BTreeMap<Option<OpId>, Vec<OpId>> = BTreeMap::new();
        for elem in element_map.values() {
            children
                .entry(elem.after.clone())
                .or_default()
                .push(elem.id.clone());
        }
        for ids in children.values_mut() {
            ids.sort_by(|a, b| b.cmp(a));
        }

        let mut ordered_ids = Vec::with_capacity(element_map.len());
        Self::walk_children(None, &children, &mut ordered_ids);

        self.elements = ordered_ids
            .into_iter()
            .filter_map(|id| element_map.remove(&id))
            .collect();
    }

    fn walk_children(
        parent: Option<OpId>,
        children: &BTreeMap<Option<OpId>, Vec<OpId>>,
        out: &mut Vec<OpId>,
    ) {
        if let Some(kids) = children.get(&parent) {
            for id in kids {
                out.push(id.clone());
                Self::walk_children(Some(id.clone()), children, out);
            }
        }
    }
}

/// Resolves a mark log character by character: for every offset, each mark
/// type takes the action of the last covering operation in the log.
pub fn resolve_format_spans(log: &[ResolvedMark], len: usize) -> Vec<FormatSpan> {
    let mut marks_at: Vec<BTreeSet<MarkType>> = vec![BTreeSet::new(); len];
    for (offset, marks) in marks_at.iter_mut().enumerate() {
        let mut latest: BTreeMap<&MarkType, MarkAction> = BTreeMap::new();
        for mark in log {
            if mark.start <= offset && offset < mark.end {
                latest.insert(&mark.mark_type, mark.action);
            }
        }
        for (mark_type, action) in latest {
            if action == MarkAction::Add {
                marks.insert(mark_type.clone());
            }
        }
    }

    let mut spans: Vec<FormatSpan> = Vec::new();
    for (offset, marks) in marks_at.into_iter().enumerate() {
        if spans.last().is_some_and(|span| span.marks == marks) {
            continue;
        }
        spans.push(FormatSpan {
            start: offset,
            marks,
        });
    }
    spans
}

/// Resolves stored mark records against `sequence` and flattens them.
pub fn render_spans(sequence: &Sequence<char>, records: &[MarkRecord]) -> Vec<FormatSpan> {
    let log: Vec<ResolvedMark> = records
        .iter()
        .filter_map(|record| {
            Some(ResolvedMark {
                action: record.action,
                mark_type: record.mark_type.clone(),
                start: sequence.resolve_anchor(&record.start)?,
                end: sequence.resolve_anchor(&record.end)?,
            })
        })
        .collect();
    resolve_format_spans(&log, sequence.elements().len())
}
