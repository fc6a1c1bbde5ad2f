//! Property-based tests for the format span resolver

use proptest::collection::vec;
use proptest::prelude::*;
use rt_crdt::core::mark::{FormatSpan, MarkAction, MarkType, ResolvedMark, resolve_format_spans};

fn mark_type_strategy() -> impl Strategy<Value = MarkType> {
    prop_oneof![
        Just(MarkType::strong()),
        Just(MarkType::em()),
        Just(MarkType::from("code")),
    ]
}

fn mark_strategy(max_len: usize) -> impl Strategy<Value = ResolvedMark> {
    (
        prop::bool::ANY,
        mark_type_strategy(),
        0..=max_len + 2,
        0..=max_len + 2,
    )
        .prop_map(|(add, mark_type, a, b)| ResolvedMark {
            action: if add {
                MarkAction::Add
            } else {
                MarkAction::Remove
            },
            mark_type,
            start: a.min(b),
            end: a.max(b),
        })
}

fn log_and_len() -> impl Strategy<Value = (Vec<ResolvedMark>, usize)> {
    (0usize..40).prop_flat_map(|len| (vec(mark_strategy(len), 0..24), Just(len)))
}

fn span_end(spans: &[FormatSpan], idx: usize, len: usize) -> usize {
    spans.get(idx + 1).map_or(len, |next| next.start)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(proptest_config::cases()))]

    #[test]
    fn prop_spans_partition_the_text((log, len) in log_and_len()) {
        let spans = resolve_format_spans(&log, len);
        if len == 0 {
            prop_assert!(spans.is_empty());
            return Ok(());
        }
        prop_assert_eq!(spans[0].start, 0);
        for idx in 0..spans.len() {
            let end = span_end(&spans, idx, len);
            prop_assert!(spans[idx].start < end, "empty span at {}", spans[idx].start);
            prop_assert!(end <= len);
        }
    }

    #[test]
    fn prop_adjacent_spans_differ((log, len) in log_and_len()) {
        let spans = resolve_format_spans(&log, len);
        for pair in spans.windows(2) {
            prop_assert_ne!(&pair[0].marks, &pair[1].marks);
        }
    }

    #[test]
    fn prop_matches_naive_oracle((log, len) in log_and_len()) {
        let fast = resolve_format_spans(&log, len);
        let naive = rt_crdt_naive_oracle::resolve_format_spans(&log, len);
        prop_assert_eq!(fast, naive);
    }

    #[test]
    fn prop_replay_is_deterministic((log, len) in log_and_len()) {
        prop_assert_eq!(resolve_format_spans(&log, len), resolve_format_spans(&log, len));
    }

    #[test]
    fn prop_trailing_full_remove_clears_type((log, len) in log_and_len()) {
        let mut log = log;
        log.push(ResolvedMark::remove(MarkType::strong(), 0, len));
        let spans = resolve_format_spans(&log, len);
        prop_assert!(spans.iter().all(|span| !span.marks.contains(&MarkType::strong())));
    }
}

#[test]
fn test_no_marks_yields_one_plain_span() {
    let spans = resolve_format_spans(&[], 7);
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].start, 0);
    assert!(spans[0].marks.is_empty());
}

#[test]
fn test_equal_offsets_follow_log_order() {
    // Same range, opposite order: the later operation wins.
    let add_then_remove = [
        ResolvedMark::add("em", 1, 3),
        ResolvedMark::remove("em", 1, 3),
    ];
    let remove_then_add = [
        ResolvedMark::remove("em", 1, 3),
        ResolvedMark::add("em", 1, 3),
    ];
    let spans = resolve_format_spans(&add_then_remove, 4);
    assert_eq!(spans.len(), 1);
    assert!(spans[0].marks.is_empty());

    let spans = resolve_format_spans(&remove_then_add, 4);
    let starts: Vec<usize> = spans.iter().map(|span| span.start).collect();
    assert_eq!(starts, vec![0, 1, 3]);
    assert!(spans[1].marks.contains(&MarkType::em()));
}

#[test]
fn test_mark_types_are_independent() {
    let log = [
        ResolvedMark::add("strong", 0, 4),
        ResolvedMark::add("em", 2, 6),
        ResolvedMark::remove("strong", 0, 1),
    ];
    let spans = resolve_format_spans(&log, 6);
    let shape: Vec<(usize, Vec<&str>)> = spans
        .iter()
        .map(|span| (span.start, span.marks.iter().map(MarkType::as_str).collect()))
        .collect();
    assert_eq!(
        shape,
        vec![
            (0, vec![]),
            (1, vec!["strong"]),
            (2, vec!["em", "strong"]),
            (4, vec!["em"]),
        ]
    );
}
