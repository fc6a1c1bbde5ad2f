//! Core CRDT building blocks shared by the document and the bridge.
//!
//! - [`ActorId`] - Stable identity of one replica
//! - [`OpId`] - Unique operation identifiers using Lamport timestamps
//! - [`StateVector`] - Per-actor change sequence numbers
//! - [`Sequence`] - RGA-based ordered sequence with tombstones
//! - [`mark`] - Anchored mark operations and the format span resolver

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod mark;

/// Identity of a replica. Hosts usually hand us an address or a user id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random actor id for hosts that do not provide one.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ActorId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Lamport timestamp. Ordered by counter first, actor second.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OpId {
    pub counter: u64,
    pub actor: ActorId,
}

impl OpId {
    pub fn new(counter: u64, actor: impl Into<ActorId>) -> Self {
        Self {
            counter,
            actor: actor.into(),
        }
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.counter, self.actor)
    }
}

/// Highest change sequence number applied per actor.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateVector {
    actors: BTreeMap<ActorId, u64>,
}

impl StateVector {
    pub fn new() -> Self {
        Self {
            actors: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn get(&self, actor: &ActorId) -> Option<u64> {
        self.actors.get(actor).copied()
    }

    pub fn set(&mut self, actor: ActorId, seq: u64) {
        self.actors.insert(actor, seq);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ActorId, u64)> {
        self.actors.iter().map(|(actor, seq)| (actor, *seq))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element<T> {
    pub id: OpId,
    pub value: Option<T>,
    pub after: Option<OpId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceOp<T> {
    Insert {
        after: Option<OpId>,
        id: OpId,
        value: T,
    },
    Delete {
        target: OpId,
    },
}

/// Replicated Growable Array.
///
/// Elements are kept in document order including tombstones, so an element
/// id stays resolvable to an offset after the element itself is deleted.
/// Siblings inserted after the same element are ordered by descending
/// [`OpId`], which makes the order a pure function of the element set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Sequence<T> {
    elements: Vec<Element<T>>,
    index: BTreeMap<OpId, usize>,
}

impl<T: Clone> Sequence<T> {
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            index: BTreeMap::new(),
        }
    }

    /// Inserts `value` after `after` (or at the head). Returns false when the
    /// anchor element is unknown. Re-inserting a known id is a no-op.
    pub fn insert(&mut self, after: Option<OpId>, value: T, id: OpId) -> bool {
        if self.index.contains_key(&id) {
            return true;
        }

        let mut position = match &after {
            None => 0,
            Some(anchor) => match self.index.get(anchor) {
                Some(idx) => idx + 1,
                None => return false,
            },
        };

        // Skip concurrent siblings (and their subtrees) with greater ids.
        // Descendants of a greater sibling always carry greater counters.
        while let Some(elem) = self.elements.get(position) {
            if elem.id > id {
                position += 1;
            } else {
                break;
            }
        }

        self.elements.insert(
            position,
            Element {
                id,
                value: Some(value),
                after,
            },
        );
        self.rebuild_index_from(position);
        true
    }

    /// Tombstones `target`. Returns false when the element is unknown.
    pub fn delete(&mut self, target: &OpId) -> bool {
        let Some(index) = self.index.get(target).copied() else {
            return false;
        };
        if let Some(elem) = self.elements.get_mut(index) {
            elem.value = None;
        }
        true
    }

    pub fn apply(&mut self, op: SequenceOp<T>) -> bool {
        match op {
            SequenceOp::Insert { after, id, value } => self.insert(after, value, id),
            SequenceOp::Delete { target } => self.delete(&target),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.elements.iter().filter_map(|elem| elem.value.as_ref())
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    pub fn len_visible(&self) -> usize {
        self.elements
            .iter()
            .filter(|elem| elem.value.is_some())
            .count()
    }

    pub fn contains(&self, id: &OpId) -> bool {
        self.index.contains_key(id)
    }

    /// Id of the visible element at `index`.
    pub fn visible_id(&self, index: usize) -> Option<&OpId> {
        self.elements
            .iter()
            .filter(|elem| elem.value.is_some())
            .nth(index)
            .map(|elem| &elem.id)
    }

    pub fn element_ids(&self) -> Vec<OpId> {
        self.elements.iter().map(|elem| elem.id.clone()).collect()
    }

    /// Snapshot mapping element ids to visible offsets. Built in one pass so
    /// that resolving many anchors stays linear in the sequence length.
    pub fn offsets(&self) -> OffsetIndex<'_> {
        let mut before = Vec::with_capacity(self.elements.len());
        let mut visible = 0usize;
        for elem in &self.elements {
            before.push(visible);
            if elem.value.is_some() {
                visible += 1;
            }
        }
        OffsetIndex {
            index: &self.index,
            before,
            visible: self
                .elements
                .iter()
                .map(|elem| elem.value.is_some())
                .collect(),
            len: visible,
        }
    }

    fn rebuild_index_from(&mut self, start: usize) {
        for (idx, elem) in self.elements.iter().enumerate().skip(start) {
            self.index.insert(elem.id.clone(), idx);
        }
    }
}

/// Offsets of every element at the time [`Sequence::offsets`] was called.
#[derive(Debug)]
pub struct OffsetIndex<'a> {
    index: &'a BTreeMap<OpId, usize>,
    before: Vec<usize>,
    visible: Vec<bool>,
    len: usize,
}

impl OffsetIndex<'_> {
    /// Number of visible elements preceding `id`, and whether `id` itself is
    /// visible. `None` for unknown ids.
    pub fn locate(&self, id: &OpId) -> Option<(usize, bool)> {
        let idx = *self.index.get(id)?;
        Some((self.before[idx], self.visible[idx]))
    }

    pub fn visible_len(&self) -> usize {
        self.len
    }
}
