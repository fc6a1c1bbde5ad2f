#![no_main]

use libfuzzer_sys::fuzz_target;
use rt_crdt::core::ActorId;
use rt_crdt::doc::{Change, ContentPath, Document};
use rt_crdt::sync::{ValidationLimits, validate_batch};

fuzz_target!(|data: &[u8]| {
    let Ok(changes) = serde_json::from_slice::<Vec<Change>>(data) else {
        return;
    };
    if validate_batch(&changes, &ValidationLimits::default()).is_err() {
        return;
    }

    let path = ContentPath::default();
    let mut doc = Document::new(ActorId::from("fuzz"));
    let _ = doc.apply_change(&Document::genesis_change("content"));
    for change in &changes {
        let before = doc.clone();
        if doc.apply_change(change).is_err() {
            assert_eq!(doc, before, "rejected change mutated the document");
        }
    }

    if let Ok(formatted) = doc.text_with_formatting(&path) {
        let len = formatted.char_len();
        assert_eq!(formatted.spans.is_empty(), len == 0);
        for pair in formatted.spans.windows(2) {
            assert!(pair[0].start < pair[1].start);
        }
        if let Some(last) = formatted.spans.last() {
            assert!(last.start < len);
        }
    }
});
