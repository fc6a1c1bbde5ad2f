use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rt_crdt::core::{OpId, Sequence};

/// Create a sequence with N elements for benchmarking
fn create_sequence(size: usize) -> Sequence<char> {
    let mut seq = Sequence::new();
    let mut prev = None;
    for i in 0..size {
        let id = OpId::new(i as u64 + 1, "alice");
        seq.insert(prev, 'a', id.clone());
        prev = Some(id);
    }
    seq
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");

    for size in [10usize, 100, 1_000, 10_000] {
        for (label, pick) in [("start", 0usize), ("middle", size / 2), ("end", size - 1)] {
            group.bench_with_input(BenchmarkId::new(label, size), &size, |b, &size| {
                let mut seq = create_sequence(size);
                let after = seq.element_ids().get(pick).cloned();
                let mut counter = size as u64 + 1;
                b.iter(|| {
                    let id = OpId::new(counter, "bob");
                    counter += 1;
                    seq.insert(after.clone(), 'b', id);
                    black_box(&seq);
                });
            });
        }
    }

    group.finish();
}

fn bench_offsets(c: &mut Criterion) {
    let mut group = c.benchmark_group("offsets");

    for size in [100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut seq = create_sequence(size);
            for id in seq.element_ids().into_iter().step_by(3) {
                seq.delete(&id);
            }
            let probe = OpId::new(size as u64 / 2, "alice");
            b.iter(|| {
                let offsets = seq.offsets();
                black_box(offsets.locate(&probe));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_insert, bench_offsets);
criterion_main!(benches);
