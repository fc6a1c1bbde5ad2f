//! rt-crdt: collaborative rich text between a linear editor and a CRDT document.
//!
//! The crate keeps a replicated sequence of characters plus a log of anchored
//! mark operations, resolves the log into non-overlapping format spans, and
//! mirrors the result into an editor view. It includes:
//!
//! - **Core CRDT algorithms** - RGA sequences, anchored mark records and the format span resolver
//! - **Document model** - Causally ordered changes against named text lists
//! - **Editor model** - Transactions, the mark schema and the rendered view
//! - **Sync plumbing** - Outgoing change queue, pub/sub hub and host update feed
//! - **Bridge** - The per-actor glue that keeps editor and document in step
//!
//! # Quick Start
//!
//! ```rust
//! use rt_crdt::{Bridge, BridgeConfig, Change, MarkType, Selection, Transaction};
//!
//! let mut bridge = Bridge::new(BridgeConfig::for_actor("alice"), |_: Vec<Change>| {}).unwrap();
//! let txn = Transaction::new(Selection::cursor(3))
//!     .insert(1, "ab")
//!     .add_mark(1, 3, MarkType::strong());
//! bridge.dispatch(&txn).unwrap();
//!
//! assert_eq!(bridge.view().runs()[0].text, "ab");
//! assert_eq!(bridge.view().runs()[0].marks, vec![MarkType::strong()]);
//! ```
//!
//! # Features
//!
//! - `cli` - Builds the `rt-crdt` command-line tool (on by default)

// Core CRDT algorithms
pub mod core;

// Replicated document and change model
pub mod doc;

// Editor-side model
pub mod editor;

// Change transport
pub mod sync;

pub mod bridge;
pub mod config;
pub mod error;

// Re-export core types
pub use crate::core::{ActorId, Element, OffsetIndex, OpId, Sequence, SequenceOp, StateVector};

// Re-export mark types
pub use crate::core::mark::{
    Anchor, AnchorBias, EmptySpanError, FormatSpan, MarkAction, MarkRecord, MarkType,
    ResolvedMark, resolve_format_spans, span_ranges,
};

// Re-export doc types
pub use doc::{
    Action, ApplyResult, Change, ChangeOp, ContentPath, DocError, Document, FormattedText,
    Operation,
};

// Re-export editor types
pub use editor::{
    EditorDoc, Schema, SchemaError, Selection, Step, TextRun, Transaction, TranslateError,
};

// Re-export sync types
pub use sync::{
    ChangeQueue, ChangeSink, Delivery, HostUpdate, Publisher, QueueState, UpdateFeed,
    ValidationError, ValidationLimits, validate_batch,
};

pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use error::{Error, Result};
