use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rt_crdt::core::mark::{MarkType, ResolvedMark, resolve_format_spans};
use rt_crdt::{ContentPath, Document, Operation};

/// Overlapping add/remove operations spread across a text of `len` chars.
fn mark_log(marks: usize, len: usize) -> Vec<ResolvedMark> {
    (0..marks)
        .map(|i| {
            let start = (i * 7919) % len;
            let end = (start + 1 + (i * 104_729) % 64).min(len);
            let mark_type = if i % 2 == 0 {
                MarkType::strong()
            } else {
                MarkType::em()
            };
            if i % 5 == 4 {
                ResolvedMark::remove(mark_type, start, end)
            } else {
                ResolvedMark::add(mark_type, start, end)
            }
        })
        .collect()
}

fn bench_resolver(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_format_spans");

    for marks in [10usize, 100, 1_000, 10_000] {
        let log = mark_log(marks, 10_000);
        group.bench_with_input(BenchmarkId::from_parameter(marks), &log, |b, log| {
            b.iter(|| black_box(resolve_format_spans(black_box(log), 10_000)));
        });
    }

    group.finish();
}

fn bench_text_with_formatting(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_with_formatting");
    let path = ContentPath::default();

    for len in [100usize, 1_000, 5_000] {
        let mut doc = Document::new("alice".into());
        doc.apply_change(&Document::genesis_change("content"))
            .expect("genesis");
        let text: String = std::iter::repeat_n('x', len).collect();
        doc.change(vec![Operation::insert(path.clone(), 0, &text)])
            .expect("insert");
        for i in (0..len).step_by(10) {
            let end = (i + 4).min(len - 1);
            doc.change(vec![Operation::add_mark(path.clone(), i, end, MarkType::strong())])
                .expect("mark");
        }

        group.bench_with_input(BenchmarkId::from_parameter(len), &doc, |b, doc| {
            b.iter(|| black_box(doc.text_with_formatting(&path)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_resolver, bench_text_with_formatting);
criterion_main!(benches);
