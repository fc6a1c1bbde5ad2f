//! Replicated text document.
//!
//! A [`Document`] holds named RGA character lists plus, per list, a log of
//! anchored mark operations. Local edits arrive as index-based
//! [`Operation`]s and leave as a [`Change`] of identity-based [`ChangeOp`]s;
//! remote changes are applied with [`Document::apply_change`].

use crate::core::mark::{
    Anchor, FormatSpan, MarkAction, MarkRecord, MarkType, ResolvedMark, resolve_format_spans,
};
use crate::core::{ActorId, OpId, Sequence, StateVector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Actor that authors the bootstrap change every replica shares.
pub const GENESIS_ACTOR: &str = "genesis";

/// Key of the single content list.
pub const DEFAULT_CONTENT_KEY: &str = "content";

/// Keys addressing one list-valued field of the document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentPath(Vec<String>);

impl ContentPath {
    pub fn new(key: impl Into<String>) -> Self {
        Self(vec![key.into()])
    }

    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// The list key, if the path addresses exactly one list.
    pub fn key(&self) -> Option<&str> {
        match self.0.as_slice() {
            [key] => Some(key),
            _ => None,
        }
    }
}

impl Default for ContentPath {
    fn default() -> Self {
        Self::new(DEFAULT_CONTENT_KEY)
    }
}

impl fmt::Display for ContentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

/// Index-based edit, as produced by the transaction translator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub path: ContentPath,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    MakeList {
        key: String,
    },
    Insert {
        index: usize,
        values: Vec<char>,
    },
    Delete {
        index: usize,
        count: usize,
    },
    /// Marks `start..=end`; the end is the last affected character.
    AddMark {
        start: usize,
        end: usize,
        mark_type: MarkType,
    },
    RemoveMark {
        start: usize,
        end: usize,
        mark_type: MarkType,
    },
}

impl Operation {
    pub fn make_list(key: impl Into<String>) -> Self {
        Self {
            path: ContentPath::root(),
            action: Action::MakeList { key: key.into() },
        }
    }

    pub fn insert(path: ContentPath, index: usize, text: &str) -> Self {
        Self {
            path,
            action: Action::Insert {
                index,
                values: text.chars().collect(),
            },
        }
    }

    pub fn delete(path: ContentPath, index: usize, count: usize) -> Self {
        Self {
            path,
            action: Action::Delete { index, count },
        }
    }

    pub fn add_mark(path: ContentPath, start: usize, end: usize, mark_type: MarkType) -> Self {
        Self {
            path,
            action: Action::AddMark {
                start,
                end,
                mark_type,
            },
        }
    }

    pub fn remove_mark(path: ContentPath, start: usize, end: usize, mark_type: MarkType) -> Self {
        Self {
            path,
            action: Action::RemoveMark {
                start,
                end,
                mark_type,
            },
        }
    }
}

/// Identity-based operation carried inside a [`Change`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ChangeOp {
    MakeList {
        id: OpId,
        key: String,
    },
    Insert {
        id: OpId,
        key: String,
        after: Option<OpId>,
        value: char,
    },
    Delete {
        id: OpId,
        key: String,
        target: OpId,
    },
    Mark {
        key: String,
        record: MarkRecord,
    },
}

impl ChangeOp {
    pub fn id(&self) -> &OpId {
        match self {
            ChangeOp::MakeList { id, .. }
            | ChangeOp::Insert { id, .. }
            | ChangeOp::Delete { id, .. } => id,
            ChangeOp::Mark { record, .. } => &record.id,
        }
    }
}

/// Atomic batch of operations from one actor, the unit of replication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub actor: ActorId,
    pub seq: u64,
    pub deps: StateVector,
    pub start_op: u64,
    pub ops: Vec<ChangeOp>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocError {
    #[error("change {seq} from {actor} is out of order, expected {expected}")]
    SequenceGap {
        actor: ActorId,
        expected: u64,
        seq: u64,
    },
    #[error("change {seq} from {actor} needs {needed} changes from {dep}, have {have}")]
    MissingDependency {
        actor: ActorId,
        seq: u64,
        dep: ActorId,
        needed: u64,
        have: u64,
    },
    #[error("offset {index} out of range for length {len}")]
    OutOfRange { index: usize, len: usize },
    #[error("invalid mark range {start}..={end}")]
    InvalidMarkRange { start: usize, end: usize },
    #[error("unknown content path {0}")]
    UnknownPath(String),
    #[error("change references unknown element {0}")]
    UnknownElement(OpId),
    #[error("operation counter exhausted")]
    ClockOverflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyResult {
    Applied,
    /// The change was already reflected; nothing happened.
    Duplicate,
}

/// Text of one list together with its resolved format spans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedText {
    pub text: String,
    pub spans: Vec<FormatSpan>,
}

impl FormattedText {
    /// Length in characters, the unit of every offset in this crate.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct TextList {
    chars: Sequence<char>,
    /// Mark log keyed by op id: Lamport order is a causal order that every
    /// replica agrees on.
    marks: BTreeMap<OpId, MarkRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    actor: ActorId,
    lists: BTreeMap<String, TextList>,
    clock: StateVector,
    max_op: u64,
}

impl Document {
    pub fn new(actor: ActorId) -> Self {
        Self {
            actor,
            lists: BTreeMap::new(),
            clock: StateVector::new(),
            max_op: 0,
        }
    }

    /// The bootstrap change creating list `key`. Identical on every replica,
    /// so independently started replicas share the same list identity.
    pub fn genesis_change(key: &str) -> Change {
        Change {
            actor: ActorId::from(GENESIS_ACTOR),
            seq: 1,
            deps: StateVector::new(),
            start_op: 1,
            ops: vec![ChangeOp::MakeList {
                id: OpId::new(1, GENESIS_ACTOR),
                key: key.to_string(),
            }],
        }
    }

    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    pub fn clock(&self) -> &StateVector {
        &self.clock
    }

    pub fn has_applied(&self, actor: &ActorId, seq: u64) -> bool {
        self.clock.get(actor).unwrap_or(0) >= seq
    }

    /// Turns local operations into a change and applies it. Nothing is
    /// applied if any operation is rejected.
    pub fn change(&mut self, operations: Vec<Operation>) -> Result<Change, DocError> {
        let mut staged = self.lists.clone();
        let mut counter = self.max_op;
        let mut ops = Vec::new();

        for operation in operations {
            let mut next_id = || {
                counter = counter.checked_add(1).ok_or(DocError::ClockOverflow)?;
                Ok::<_, DocError>(OpId::new(counter, self.actor.clone()))
            };

            match operation.action {
                Action::MakeList { key } => {
                    let op = ChangeOp::MakeList {
                        id: next_id()?,
                        key,
                    };
                    apply_op(&mut staged, &op)?;
                    ops.push(op);
                }
                Action::Insert { index, values } => {
                    let key = list_key(&operation.path)?;
                    let list = list_mut(&mut staged, key)?;
                    let len = list.chars.len_visible();
                    if index > len {
                        return Err(DocError::OutOfRange { index, len });
                    }
                    let mut after = match index {
                        0 => None,
                        _ => list.chars.visible_id(index - 1).cloned(),
                    };
                    for value in values {
                        let id = next_id()?;
                        let op = ChangeOp::Insert {
                            id: id.clone(),
                            key: key.to_string(),
                            after,
                            value,
                        };
                        apply_op(&mut staged, &op)?;
                        ops.push(op);
                        after = Some(id);
                    }
                }
                Action::Delete { index, count } => {
                    let key = list_key(&operation.path)?;
                    let len = list_mut(&mut staged, key)?.chars.len_visible();
                    let end = index.saturating_add(count);
                    if end > len {
                        return Err(DocError::OutOfRange { index: end, len });
                    }
                    for _ in 0..count {
                        let target = list_mut(&mut staged, key)?
                            .chars
                            .visible_id(index)
                            .cloned()
                            .ok_or(DocError::OutOfRange { index, len })?;
                        let op = ChangeOp::Delete {
                            id: next_id()?,
                            key: key.to_string(),
                            target,
                        };
                        apply_op(&mut staged, &op)?;
                        ops.push(op);
                    }
                }
                Action::AddMark {
                    start,
                    end,
                    mark_type,
                } => {
                    let op = mark_op(
                        &mut staged,
                        &operation.path,
                        MarkAction::Add,
                        start,
                        end,
                        mark_type,
                        next_id()?,
                    )?;
                    ops.push(op);
                }
                Action::RemoveMark {
                    start,
                    end,
                    mark_type,
                } => {
                    let op = mark_op(
                        &mut staged,
                        &operation.path,
                        MarkAction::Remove,
                        start,
                        end,
                        mark_type,
                        next_id()?,
                    )?;
                    ops.push(op);
                }
            }
        }

        let seq = self
            .clock
            .get(&self.actor)
            .unwrap_or(0)
            .checked_add(1)
            .ok_or(DocError::ClockOverflow)?;
        let start_op = self
            .max_op
            .checked_add(1)
            .ok_or(DocError::ClockOverflow)?;
        let change = Change {
            actor: self.actor.clone(),
            seq,
            deps: self.clock.clone(),
            start_op,
            ops,
        };

        self.lists = staged;
        self.max_op = counter;
        self.clock.set(self.actor.clone(), seq);
        tracing::debug!(
            actor = %change.actor,
            seq,
            ops = change.ops.len(),
            "created local change"
        );
        Ok(change)
    }

    /// Applies a change produced by any replica. Changes must arrive in
    /// per-actor sequence order with their dependencies satisfied; anything
    /// else is rejected without touching the document.
    pub fn apply_change(&mut self, change: &Change) -> Result<ApplyResult, DocError> {
        let applied = self.clock.get(&change.actor).unwrap_or(0);
        if change.seq <= applied {
            tracing::debug!(actor = %change.actor, seq = change.seq, "change already applied");
            return Ok(ApplyResult::Duplicate);
        }
        if change.seq != applied + 1 {
            return Err(DocError::SequenceGap {
                actor: change.actor.clone(),
                expected: applied + 1,
                seq: change.seq,
            });
        }
        for (dep, needed) in change.deps.iter() {
            if *dep == change.actor {
                continue;
            }
            let have = self.clock.get(dep).unwrap_or(0);
            if have < needed {
                return Err(DocError::MissingDependency {
                    actor: change.actor.clone(),
                    seq: change.seq,
                    dep: dep.clone(),
                    needed,
                    have,
                });
            }
        }

        let mut staged = self.lists.clone();
        for op in &change.ops {
            apply_op(&mut staged, op)?;
        }

        self.lists = staged;
        self.clock.set(change.actor.clone(), change.seq);
        if let Some(max) = change.ops.iter().map(|op| op.id().counter).max() {
            self.max_op = self.max_op.max(max);
        }
        tracing::debug!(
            actor = %change.actor,
            seq = change.seq,
            ops = change.ops.len(),
            "applied change"
        );
        Ok(ApplyResult::Applied)
    }

    pub fn text(&self, path: &ContentPath) -> Result<String, DocError> {
        Ok(self.list(path)?.chars.iter().collect())
    }

    pub fn len(&self, path: &ContentPath) -> Result<usize, DocError> {
        Ok(self.list(path)?.chars.len_visible())
    }

    /// The mark log in replay order.
    pub fn marks(&self, path: &ContentPath) -> Result<Vec<&MarkRecord>, DocError> {
        Ok(self.list(path)?.marks.values().collect())
    }

    /// Current text and its format spans, recomputed from the full mark log.
    pub fn text_with_formatting(&self, path: &ContentPath) -> Result<FormattedText, DocError> {
        let list = self.list(path)?;
        let offsets = list.chars.offsets();
        let resolved: Vec<ResolvedMark> = list
            .marks
            .values()
            .filter_map(|record| record.resolve(&offsets))
            .collect();
        let spans = resolve_format_spans(&resolved, offsets.visible_len());
        Ok(FormattedText {
            text: list.chars.iter().collect(),
            spans,
        })
    }

    fn list(&self, path: &ContentPath) -> Result<&TextList, DocError> {
        let key = list_key(path)?;
        self.lists
            .get(key)
            .ok_or_else(|| DocError::UnknownPath(path.to_string()))
    }
}

fn list_key(path: &ContentPath) -> Result<&str, DocError> {
    path.key()
        .ok_or_else(|| DocError::UnknownPath(path.to_string()))
}

fn list_mut<'a>(
    lists: &'a mut BTreeMap<String, TextList>,
    key: &str,
) -> Result<&'a mut TextList, DocError> {
    lists
        .get_mut(key)
        .ok_or_else(|| DocError::UnknownPath(ContentPath::new(key).to_string()))
}

fn mark_op(
    lists: &mut BTreeMap<String, TextList>,
    path: &ContentPath,
    action: MarkAction,
    start: usize,
    end: usize,
    mark_type: MarkType,
    id: OpId,
) -> Result<ChangeOp, DocError> {
    if start > end {
        return Err(DocError::InvalidMarkRange { start, end });
    }
    let key = list_key(path)?;
    let list = list_mut(lists, key)?;
    let len = list.chars.len_visible();
    let (Some(first), Some(last)) = (list.chars.visible_id(start), list.chars.visible_id(end))
    else {
        return Err(DocError::OutOfRange { index: end, len });
    };
    let op = ChangeOp::Mark {
        key: key.to_string(),
        record: MarkRecord {
            id,
            action,
            mark_type,
            start: Anchor::before(first.clone()),
            end: Anchor::after(last.clone()),
        },
    };
    apply_op(lists, &op)?;
    Ok(op)
}

fn apply_op(lists: &mut BTreeMap<String, TextList>, op: &ChangeOp) -> Result<(), DocError> {
    match op {
        ChangeOp::MakeList { key, .. } => {
            lists.entry(key.clone()).or_default();
        }
        ChangeOp::Insert {
            id,
            key,
            after,
            value,
        } => {
            let list = list_mut(lists, key)?;
            if !list.chars.insert(after.clone(), *value, id.clone()) {
                let missing = after.clone().unwrap_or_else(|| id.clone());
                return Err(DocError::UnknownElement(missing));
            }
        }
        ChangeOp::Delete { key, target, .. } => {
            let list = list_mut(lists, key)?;
            if !list.chars.delete(target) {
                return Err(DocError::UnknownElement(target.clone()));
            }
        }
        ChangeOp::Mark { key, record } => {
            let list = list_mut(lists, key)?;
            for anchor in [&record.start, &record.end] {
                if !list.chars.contains(&anchor.elem_id) {
                    return Err(DocError::UnknownElement(anchor.elem_id.clone()));
                }
            }
            list.marks.insert(record.id.clone(), record.clone());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content() -> ContentPath {
        ContentPath::default()
    }

    fn doc(actor: &str) -> Document {
        let mut doc = Document::new(ActorId::from(actor));
        doc.apply_change(&Document::genesis_change(DEFAULT_CONTENT_KEY))
            .unwrap();
        doc
    }

    #[test]
    fn test_insert_and_delete() {
        let mut doc = doc("a");
        doc.change(vec![Operation::insert(content(), 0, "hello")])
            .unwrap();
        doc.change(vec![Operation::delete(content(), 1, 3)]).unwrap();
        assert_eq!(doc.text(&content()).unwrap(), "ho");
    }

    #[test]
    fn test_change_sequence_numbers_are_gapless() {
        let mut doc = doc("a");
        let first = doc
            .change(vec![Operation::insert(content(), 0, "x")])
            .unwrap();
        let second = doc
            .change(vec![Operation::insert(content(), 1, "y")])
            .unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
        assert_eq!(second.start_op, first.start_op + 1);
    }

    #[test]
    fn test_rejected_change_leaves_document_untouched() {
        let mut doc = doc("a");
        doc.change(vec![Operation::insert(content(), 0, "abc")])
            .unwrap();
        let before = doc.clone();
        let err = doc
            .change(vec![
                Operation::insert(content(), 0, "zz"),
                Operation::delete(content(), 4, 5),
            ])
            .unwrap_err();
        assert!(matches!(err, DocError::OutOfRange { .. }));
        assert_eq!(doc, before);
    }

    #[test]
    fn test_sequence_gap_rejected() {
        let mut alice = doc("alice");
        let mut bob = doc("bob");
        let _c1 = alice
            .change(vec![Operation::insert(content(), 0, "a")])
            .unwrap();
        let c2 = alice
            .change(vec![Operation::insert(content(), 1, "b")])
            .unwrap();

        let err = bob.apply_change(&c2).unwrap_err();
        assert_eq!(
            err,
            DocError::SequenceGap {
                actor: ActorId::from("alice"),
                expected: 1,
                seq: 2,
            }
        );
        assert_eq!(bob.text(&content()).unwrap(), "");
    }

    #[test]
    fn test_duplicate_change_is_reported() {
        let mut alice = doc("alice");
        let change = alice
            .change(vec![Operation::insert(content(), 0, "a")])
            .unwrap();
        assert_eq!(alice.apply_change(&change), Ok(ApplyResult::Duplicate));
        assert_eq!(alice.text(&content()).unwrap(), "a");
    }

    #[test]
    fn test_exhausted_counter_rejects_local_change() {
        let mut alice = doc("alice");
        let remote = Change {
            actor: ActorId::from("bob"),
            seq: 1,
            deps: StateVector::new(),
            start_op: u64::MAX,
            ops: vec![ChangeOp::Insert {
                id: OpId::new(u64::MAX, "bob"),
                key: DEFAULT_CONTENT_KEY.to_string(),
                after: None,
                value: 'z',
            }],
        };
        alice.apply_change(&remote).unwrap();
        let before = alice.clone();

        let err = alice
            .change(vec![Operation::insert(content(), 1, "a")])
            .unwrap_err();
        assert_eq!(err, DocError::ClockOverflow);
        assert_eq!(alice, before);
        assert_eq!(alice.text(&content()).unwrap(), "z");
    }

    #[test]
    fn test_missing_dependency_rejected() {
        let mut alice = doc("alice");
        let mut bob = doc("bob");
        let mut carol = doc("carol");
        let from_alice = alice
            .change(vec![Operation::insert(content(), 0, "a")])
            .unwrap();
        bob.apply_change(&from_alice).unwrap();
        let from_bob = bob
            .change(vec![Operation::insert(content(), 1, "b")])
            .unwrap();

        assert!(matches!(
            carol.apply_change(&from_bob),
            Err(DocError::MissingDependency { .. })
        ));
        carol.apply_change(&from_alice).unwrap();
        carol.apply_change(&from_bob).unwrap();
        assert_eq!(carol.text(&content()).unwrap(), "ab");
    }

    #[test]
    fn test_mark_range_is_inclusive() {
        let mut doc = doc("a");
        doc.change(vec![
            Operation::insert(content(), 0, "abcd"),
            Operation::add_mark(content(), 1, 2, MarkType::strong()),
        ])
        .unwrap();
        let formatted = doc.text_with_formatting(&content()).unwrap();
        let starts: Vec<usize> = formatted.spans.iter().map(|span| span.start).collect();
        assert_eq!(starts, vec![0, 1, 3]);
        assert!(formatted.spans[1].marks.contains(&MarkType::strong()));
    }

    #[test]
    fn test_invalid_mark_ranges() {
        let mut doc = doc("a");
        doc.change(vec![Operation::insert(content(), 0, "ab")])
            .unwrap();
        assert_eq!(
            doc.change(vec![Operation::add_mark(content(), 1, 0, MarkType::em())]),
            Err(DocError::InvalidMarkRange { start: 1, end: 0 })
        );
        assert_eq!(
            doc.change(vec![Operation::add_mark(content(), 0, 2, MarkType::em())]),
            Err(DocError::OutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn test_unknown_path() {
        let mut doc = doc("a");
        let err = doc
            .change(vec![Operation::insert(ContentPath::new("title"), 0, "x")])
            .unwrap_err();
        assert!(matches!(err, DocError::UnknownPath(_)));
    }

    #[test]
    fn test_mark_survives_concurrent_insert() {
        let mut alice = doc("alice");
        let mut bob = doc("bob");
        let base = alice
            .change(vec![Operation::insert(content(), 0, "hello")])
            .unwrap();
        bob.apply_change(&base).unwrap();

        let bold = alice
            .change(vec![Operation::add_mark(content(), 1, 3, MarkType::strong())])
            .unwrap();
        let typed = bob
            .change(vec![Operation::insert(content(), 0, ">>")])
            .unwrap();

        alice.apply_change(&typed).unwrap();
        bob.apply_change(&bold).unwrap();

        let a = alice.text_with_formatting(&content()).unwrap();
        let b = bob.text_with_formatting(&content()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.text, ">>hello");
        let starts: Vec<usize> = a.spans.iter().map(|span| span.start).collect();
        assert_eq!(starts, vec![0, 3, 6]);
    }

    #[test]
    fn test_change_serializes_as_json() {
        let mut doc = doc("a");
        let change = doc
            .change(vec![
                Operation::insert(content(), 0, "hi"),
                Operation::add_mark(content(), 0, 1, MarkType::em()),
            ])
            .unwrap();
        let json = serde_json::to_string(&change).unwrap();
        let back: Change = serde_json::from_str(&json).unwrap();
        assert_eq!(back, change);
    }
}
