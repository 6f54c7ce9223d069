use std::collections::BTreeSet;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde_json::Value;
use strata_core::serial::{self, JsonCodec};
use strata_core::{CommitId, Repository};

type Repo = Repository<String, String>;

const SIZES: [usize; 3] = [100, 1_000, 5_000];

/// Linear edits with a merge of the last two commits every tenth step.
fn build_history(len: usize) -> Repo {
    let mut repo = Repo::new();
    let mut ids: Vec<CommitId> = Vec::with_capacity(len);
    for i in 0..len {
        let mut previous = BTreeSet::new();
        if let Some(last) = ids.last() {
            previous.insert(last.clone());
        }
        if i % 10 == 0 && ids.len() >= 2 {
            previous.insert(ids[ids.len() - 2].clone());
        }
        let id = repo
            .insert(format!("edit {i}"), previous, i as i64, "bench".into())
            .expect("insert");
        ids.push(id);
    }
    repo
}

fn bench_history(c: &mut Criterion) {
    let mut group = c.benchmark_group("history");
    let codec = JsonCodec::<String>::new();

    for len in SIZES {
        group.throughput(Throughput::Elements(len as u64));

        group.bench_with_input(BenchmarkId::new("add_in_order", len), &len, |b, &len| {
            b.iter(|| black_box(build_history(len)));
        });

        let repo = build_history(len);
        let Value::Array(mut items) = serial::to_value(&repo, &codec, &codec).expect("serialize")
        else {
            unreachable!("history serializes to a list");
        };
        items.reverse();
        let reversed = Value::Array(items);

        group.bench_with_input(
            BenchmarkId::new("load_reversed_cascade", len),
            &reversed,
            |b, value| {
                b.iter(|| {
                    let loaded: Repo =
                        serial::deserialize(value, &codec, &codec).expect("deserialize");
                    black_box(loaded.resolved_len())
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_history);
criterion_main!(benches);
