//! The per-actor bridge between an editor and a replicated document.
//!
//! A [`Bridge`] exclusively owns one [`Document`], the outgoing
//! [`ChangeQueue`], and the last rendered [`EditorDoc`]. Every entry point
//! runs to completion synchronously; the host serializes calls.
//!
//! Each change rebuilds the whole view and re-resolves the selection
//! against it. Editor state beyond the selection (scroll position, for
//! one) does not survive a rebuild.

use crate::config::BridgeConfig;
use crate::core::ActorId;
use crate::core::mark::MarkType;
use crate::doc::{ApplyResult, Change, ChangeOp, ContentPath, Document, FormattedText, Operation};
use crate::editor::{
    EditorDoc, Schema, SchemaError, Selection, Step, Transaction, build_view, remap_selection,
    translate,
};
use crate::error::{Error, Result};
use crate::sync::{
    ChangeQueue, ChangeSink, Delivery, HostUpdate, UpdateFeed, ValidationLimits, should_apply,
    validate_batch,
};

#[derive(Debug)]
pub struct Bridge<S> {
    doc: Document,
    path: ContentPath,
    schema: Schema,
    limits: ValidationLimits,
    queue: ChangeQueue<S>,
    feed: UpdateFeed,
    view: EditorDoc,
    selection: Selection,
    needs_resync: bool,
}

impl<S: ChangeSink> Bridge<S> {
    pub fn new(config: BridgeConfig, sink: S) -> Result<Self> {
        let actor = config.actor_id.unwrap_or_else(ActorId::random);
        let path = ContentPath::new(config.content_key.as_str());
        let mut doc = Document::new(actor);
        doc.apply_change(&Document::genesis_change(&config.content_key))?;

        let mut queue = ChangeQueue::new(sink);
        if !config.initial_value.is_empty() {
            let change = doc.change(vec![Operation::insert(
                path.clone(),
                0,
                &config.initial_value,
            )])?;
            queue.enqueue(change);
        }

        let view = build_view(&doc.text_with_formatting(&path)?, &config.schema)?;
        let selection = remap_selection(Selection::cursor(1), &view);
        tracing::debug!(actor = %doc.actor(), "bridge created");

        Ok(Self {
            doc,
            path,
            schema: config.schema,
            limits: config.limits,
            queue,
            feed: UpdateFeed::new(),
            view,
            selection,
            needs_resync: false,
        })
    }

    /// Handles a transaction dispatched by the editor: translates it,
    /// applies the resulting change locally, stages it for sending, rebuilds
    /// the view, and installs the transaction's selection.
    ///
    /// The change is applied to a copy of the document and committed only
    /// once the new view is built, so a failure leaves document, queue and
    /// view as they were.
    pub fn dispatch(&mut self, txn: &Transaction) -> Result<()> {
        if txn.is_selection_only() {
            self.selection = remap_selection(txn.selection, &self.view);
            return Ok(());
        }

        for step in &txn.steps {
            if let Step::AddMark { mark, .. } | Step::RemoveMark { mark, .. } = step {
                self.ensure_known(mark)?;
            }
        }

        let operations = translate(txn, &self.path)?;
        if !operations.is_empty() {
            let mut staged = self.doc.clone();
            let change = staged.change(operations).inspect_err(|err| {
                tracing::warn!(error = %err, "local change rejected");
                self.needs_resync = true;
            })?;
            let view = build_view(&staged.text_with_formatting(&self.path)?, &self.schema)?;

            self.doc = staged;
            self.queue.enqueue(change);
            self.view = view;
        }
        self.selection = remap_selection(txn.selection, &self.view);
        Ok(())
    }

    /// Applies changes pushed by another replica. Stops at the first
    /// rejected change; changes before it stay applied and are shown.
    pub fn receive(&mut self, changes: &[Change]) -> Result<usize> {
        validate_batch(changes, &self.limits)?;
        self.ensure_marks_known(changes)?;
        self.apply_remote(changes.iter())
    }

    /// Marks every host update up to `max_serial` as catch-up replay.
    pub fn begin_catch_up(&mut self, max_serial: u64) {
        self.feed.begin_catch_up(max_serial);
    }

    /// Applies one batch from the host update channel. Catch-up batches are
    /// applied in full; live batches skip our own changes the document
    /// already reflects.
    pub fn handle_update(&mut self, update: &HostUpdate) -> Result<usize> {
        validate_batch(&update.payload, &self.limits)?;
        self.ensure_marks_known(&update.payload)?;
        let delivery = self.feed.classify(update);
        let local = self.doc.actor().clone();
        let doc = &self.doc;
        let selected: Vec<&Change> = update
            .payload
            .iter()
            .filter(|change| {
                should_apply(delivery, change, &local, |actor, seq| {
                    doc.has_applied(actor, seq)
                })
            })
            .collect();
        if delivery == Delivery::Live && selected.len() < update.payload.len() {
            tracing::debug!(
                serial = update.serial,
                skipped = update.payload.len() - selected.len(),
                "skipped own changes"
            );
        }
        self.apply_remote(selected.into_iter())
    }

    /// Sends staged changes to the sink.
    pub fn flush(&mut self) -> usize {
        self.queue.flush()
    }

    /// Forgets staged changes, e.g. history reconstructed at startup.
    pub fn drop_staged(&mut self) -> usize {
        self.queue.drop_staged()
    }

    pub fn actor(&self) -> &ActorId {
        self.doc.actor()
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn queue(&self) -> &ChangeQueue<S> {
        &self.queue
    }

    /// Text and format spans straight from the document, before any
    /// schema is applied.
    pub fn formatted(&self) -> Result<FormattedText> {
        Ok(self.doc.text_with_formatting(&self.path)?)
    }

    pub fn view(&self) -> &EditorDoc {
        &self.view
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Marks in effect at an editor position of the current view.
    pub fn marks_at(&self, pos: usize) -> &[MarkType] {
        self.view.marks_at(pos)
    }

    /// Set once a change was rejected in a way only a full state refetch
    /// can repair.
    pub fn needs_resync(&self) -> bool {
        self.needs_resync
    }

    fn apply_remote<'a>(&mut self, changes: impl Iterator<Item = &'a Change>) -> Result<usize> {
        let mut applied = 0;
        for change in changes {
            match self.doc.apply_change(change) {
                Ok(ApplyResult::Applied) => applied += 1,
                Ok(ApplyResult::Duplicate) => {}
                Err(err) => {
                    tracing::warn!(
                        actor = %change.actor,
                        seq = change.seq,
                        error = %err,
                        "remote change rejected"
                    );
                    let err = Error::from(err);
                    self.needs_resync |= err.requires_resync();
                    if applied > 0 {
                        if let Err(rebuild) = self.rebuild() {
                            tracing::warn!(error = %rebuild, "view rebuild failed");
                        }
                    }
                    return Err(err);
                }
            }
        }
        if applied > 0 {
            self.rebuild()?;
        }
        Ok(applied)
    }

    /// Replaces the view with one built from the document and re-resolves
    /// the selection against it.
    fn rebuild(&mut self) -> Result<()> {
        let formatted = self.doc.text_with_formatting(&self.path)?;
        self.view = build_view(&formatted, &self.schema)?;
        self.selection = remap_selection(self.selection, &self.view);
        Ok(())
    }

    fn ensure_known(&self, mark: &MarkType) -> std::result::Result<(), SchemaError> {
        self.schema.rank(mark).map(|_| ())
    }

    /// Rejects a batch carrying a mark the schema cannot render, before any
    /// of it reaches the document.
    fn ensure_marks_known(&self, changes: &[Change]) -> std::result::Result<(), SchemaError> {
        changes
            .iter()
            .flat_map(|change| &change.ops)
            .try_for_each(|op| match op {
                ChangeOp::Mark { record, .. } => self.ensure_known(&record.mark_type),
                _ => Ok(()),
            })
    }
}
