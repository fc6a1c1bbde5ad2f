use crate::doc::Change;

/// Destination of flushed changes, usually the transport.
pub trait ChangeSink {
    fn publish(&mut self, changes: Vec<Change>);
}

impl<F> ChangeSink for F
where
    F: FnMut(Vec<Change>),
{
    fn publish(&mut self, changes: Vec<Change>) {
        self(changes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    Staged,
}

/// Buffers locally produced changes until the host decides to send them.
///
/// `flush` only ever hands a non-empty batch to the sink, so an automatic
/// flush (a timer, a debounce) can call it freely.
#[derive(Debug)]
pub struct ChangeQueue<S> {
    staged: Vec<Change>,
    sink: S,
}

impl<S: ChangeSink> ChangeQueue<S> {
    pub fn new(sink: S) -> Self {
        Self {
            staged: Vec::new(),
            sink,
        }
    }

    pub fn enqueue(&mut self, change: Change) {
        self.staged.push(change);
    }

    /// Sends every staged change, oldest first, in one batch. Returns how
    /// many were sent.
    pub fn flush(&mut self) -> usize {
        if self.staged.is_empty() {
            return 0;
        }
        let batch = std::mem::take(&mut self.staged);
        let count = batch.len();
        tracing::debug!(count, "flushing staged changes");
        self.sink.publish(batch);
        count
    }

    /// Discards staged changes without sending them. Returns how many were
    /// dropped.
    pub fn drop_staged(&mut self) -> usize {
        let count = self.staged.len();
        self.staged.clear();
        if count > 0 {
            tracing::debug!(count, "dropped staged changes");
        }
        count
    }

    pub fn state(&self) -> QueueState {
        if self.staged.is_empty() {
            QueueState::Idle
        } else {
            QueueState::Staged
        }
    }

    pub fn staged(&self) -> &[Change] {
        &self.staged
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }
}
