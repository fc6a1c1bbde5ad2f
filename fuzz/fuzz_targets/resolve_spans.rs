#![no_main]

use libfuzzer_sys::fuzz_target;
use rt_crdt::core::mark::{MarkAction, MarkType, ResolvedMark, resolve_format_spans};

fuzz_target!(|data: &[u8]| {
    let Some((&len, rest)) = data.split_first() else {
        return;
    };
    let len = usize::from(len);

    let log: Vec<ResolvedMark> = rest
        .chunks_exact(3)
        .map(|chunk| {
            let (a, b) = (usize::from(chunk[1]), usize::from(chunk[2]));
            ResolvedMark {
                action: if chunk[0] & 1 == 0 {
                    MarkAction::Add
                } else {
                    MarkAction::Remove
                },
                mark_type: MarkType::new(format!("m{}", (chunk[0] >> 1) % 4)),
                start: a.min(b),
                end: a.max(b),
            }
        })
        .collect();

    let spans = resolve_format_spans(&log, len);
    assert_eq!(spans, rt_crdt_naive_oracle::resolve_format_spans(&log, len));
});
