use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use richpad_engine::editing::step::Assoc;
use richpad_engine::editing::{EditorState, Transaction};
use richpad_engine::html::{parse_document, serialize_body};
use richpad_engine::model::Node;

fn medium_doc() -> Node {
    let mut blocks = Vec::new();
    for i in 0..200 {
        blocks.push(Node::heading(2, vec![Node::text(format!("Section {i}"), Vec::new())]));
        blocks.push(Node::paragraph_text(
            "The quick brown fox jumps over the lazy dog, repeatedly and at length.",
        ));
    }
    Node::doc(blocks)
}

fn bench_insert_text(c: &mut Criterion) {
    let state = EditorState::new(medium_doc());
    let middle = richpad_engine::editing::selection::nearest_text_pos(
        &state.doc,
        state.doc.content_size() / 2,
    )
    .expect("doc has textblocks");
    c.bench_function("transaction/insert_text_middle", |b| {
        b.iter(|| {
            let mut tx = Transaction::new(&state);
            tx.insert_text(black_box(middle), "x", Vec::new()).unwrap();
            black_box(tx.doc().content_size())
        })
    });
}

fn bench_position_mapping(c: &mut Criterion) {
    let state = EditorState::new(medium_doc());
    let mut tx = Transaction::new(&state);
    // Positions 12.. sit inside the first paragraph's text run.
    for i in 0..50 {
        tx.insert_text(12 + i, "y", Vec::new()).unwrap();
    }
    let size = state.doc.content_size();
    c.bench_function("mapping/thread_positions", |b| {
        b.iter(|| {
            let mut acc = 0;
            for pos in (0..size).step_by(97) {
                acc += tx.mapping().map(black_box(pos), Assoc::After);
            }
            black_box(acc)
        })
    });
}

fn bench_html_round_trip(c: &mut Criterion) {
    let doc = medium_doc();
    let html = serialize_body(&doc);
    c.bench_function("html/serialize", |b| {
        b.iter(|| black_box(serialize_body(black_box(&doc))))
    });
    c.bench_function("html/parse", |b| {
        b.iter(|| black_box(parse_document(black_box(&html))))
    });
}

criterion_group!(
    benches,
    bench_insert_text,
    bench_position_mapping,
    bench_html_round_trip
);
criterion_main!(benches);
