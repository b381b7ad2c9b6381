use std::{
    hint::black_box,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use topichub::{topic::parse_topic_with_prefix, HandlerRef, Message, TopicFilter, TopicHandlerMap};

const TOPIC: &str = "lab/rack/left/sensor/:/temp";

fn bench_filter_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_match");
    for filter in [
        "lab/rack/left/sensor/:/temp",
        "lab/rack/+/sensor/:/temp",
        "lab/#",
        "lab/rack/right/#",
    ] {
        let parsed = TopicFilter::parse(filter);
        group.bench_with_input(BenchmarkId::from_parameter(filter), &parsed, |b, f| {
            b.iter(|| black_box(f.matches(black_box(TOPIC))))
        });
    }
    group.finish();
}

fn bench_parse_topic(c: &mut Criterion) {
    c.bench_function("parse_topic_with_prefix", |b| {
        b.iter(|| black_box(parse_topic_with_prefix(black_box(TOPIC), "lab/")))
    });
}

/// Рассылка по мультиплексору с `n` группами, из которых совпадает одна
/// точная и одна по `#`.
fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    let msg = Message::raw(Bytes::from_static(b"21.5"), false);

    for groups in [1usize, 16, 256] {
        let map = TopicHandlerMap::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let handler = {
            let hits = hits.clone();
            HandlerRef::new(move |_, _| {
                hits.fetch_add(1, Ordering::Relaxed);
            })
        };
        let mut filters: Vec<String> = (0..groups.saturating_sub(2))
            .map(|i| format!("lab/rack/unit{i}/+/:/temp"))
            .collect();
        filters.push(TOPIC.to_string());
        filters.push("lab/rack/#".to_string());
        map.add(&filters, &handler);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(groups), &map, |b, map| {
            b.iter(|| black_box(map.dispatch(black_box(TOPIC), &msg)))
        });
    }
    group.finish();
}

fn bench_subscribe_cycle(c: &mut Criterion) {
    let map = TopicHandlerMap::new();
    let filters = vec!["lab/rack/+/sensor/:/temp".to_string()];
    c.bench_function("add_remove_handler", |b| {
        b.iter(|| {
            let handler = HandlerRef::new(|_, _| {});
            black_box(map.add(&filters, &handler));
            black_box(map.remove(&filters, &handler));
        })
    });
}

criterion_group!(
    benches,
    bench_filter_match,
    bench_parse_topic,
    bench_dispatch,
    bench_subscribe_cycle
);
criterion_main!(benches);
