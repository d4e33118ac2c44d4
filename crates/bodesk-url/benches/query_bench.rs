//! Benchmarks for the modal query codec.
//!
//! Run with: `cargo bench --package bodesk-url --bench query_bench`

use bodesk_modal::{ModalConfiguration, ModalMode, ModalSize};
use bodesk_url::{ModalQuery, strip};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

const HOST_QUERY: &str = "page=3&sort=name&filter=active&modal=true&modalEntity=store\
                          &modalId=12&modalMode=edit&modalTab=staff&mp_from=list";

fn bench_parse(c: &mut Criterion) {
    c.bench_function("query/parse", |b| {
        b.iter(|| ModalQuery::parse(black_box(HOST_QUERY)));
    });
}

fn bench_apply(c: &mut Criterion) {
    let config: ModalConfiguration = ModalConfiguration::entity("cashier", "42")
        .with_mode(ModalMode::Edit)
        .with_size(ModalSize::Lg)
        .with_param("from", "list");
    let q = ModalQuery::from_config(&config);
    c.bench_function("query/apply_to", |b| {
        b.iter(|| q.apply_to(black_box(HOST_QUERY)));
    });
    c.bench_function("query/strip", |b| {
        b.iter(|| strip(black_box(HOST_QUERY)));
    });
}

criterion_group!(benches, bench_parse, bench_apply);
criterion_main!(benches);
