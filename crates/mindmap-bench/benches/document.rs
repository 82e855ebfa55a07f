use criterion::{Criterion, criterion_group, criterion_main};
use mindmap_bench::util;
use mindmap_core::NodeId;
use mindmap_storage::{Document, Storage};
use std::hint::black_box;

fn bench_document_round_trip(c: &mut Criterion) {
    let (store, _) = util::generate_tree(5, 4).expect("tree");
    let snapshot = store.snapshot();
    let json = Document::from_snapshot(&snapshot).to_json().expect("encode");

    c.bench_function("document_encode_tree_5x4", |b| {
        b.iter(|| black_box(Document::from_snapshot(&snapshot).to_json().expect("encode")))
    });
    c.bench_function("document_decode_tree_5x4", |b| {
        b.iter(|| {
            let mut next = 0;
            let document = Document::from_json(black_box(&json)).expect("parse");
            black_box(
                document
                    .into_snapshot(|| {
                        next += 1;
                        NodeId(next)
                    })
                    .expect("decode"),
            )
        })
    });
}

fn bench_local_save(c: &mut Criterion) {
    let (store, _) = util::generate_tree(5, 3).expect("tree");
    let document = Document::from_snapshot(&store.snapshot());
    let storage = Storage::new_in_memory().expect("in-memory storage");

    c.bench_function("local_save_tree_5x3", |b| {
        b.iter(|| storage.save_document(black_box(&document)).expect("save"))
    });
}

criterion_group!(benches, bench_document_round_trip, bench_local_save);
criterion_main!(benches);
