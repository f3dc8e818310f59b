use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::hint::black_box;
use std::rc::Rc;

use trellis_core::instance::{ComponentOptions, Instance, WatchOptions};
use trellis_core::reactive::{observe, Value, Watcher};
use trellis_core::scheduler::UpdateScheduler;

fn observe_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("observe_tree");

    for width in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            b.iter(|| {
                let rows: Vec<serde_json::Value> = (0..width)
                    .map(|i| json!({ "id": i, "label": format!("row {i}"), "tags": ["a", "b"] }))
                    .collect();
                let value = Value::from(json!({ "rows": rows }));
                observe(&value, false);
                black_box(value)
            });
        });
    }

    group.finish();
}

fn tracked_write_benchmark(c: &mut Criterion) {
    let value = Value::from(json!({ "count": 0 }));
    observe(&value, false);
    let state = value.as_object().cloned().unwrap();

    let reader = state.clone();
    let _watcher = Watcher::builder(move || Ok(reader.get("count")))
        .sync()
        .build();

    c.bench_function("tracked_write", |b| {
        let mut i = 0;
        b.iter(|| {
            state.set("count", Value::from(black_box(i)));
            i += 1;
        });
    });
}

fn computed_read_benchmark(c: &mut Criterion) {
    let vm = Instance::new(
        ComponentOptions::new()
            .data(json!({ "a": 5, "b": 10 }))
            .computed("sum", |vm| {
                let a = vm.get("a").as_f64().unwrap_or(0.0);
                let b = vm.get("b").as_f64().unwrap_or(0.0);
                Ok(Value::from(a + b))
            }),
    );

    c.bench_function("computed_cached_read", |b| {
        b.iter(|| {
            black_box(vm.get("sum"));
        });
    });
}

fn flush_benchmark(c: &mut Criterion) {
    let scheduler = Rc::new(UpdateScheduler::new());
    let vm = Instance::new(
        ComponentOptions::new()
            .scheduler(scheduler.clone())
            .data(json!({ "n": 0 })),
    );
    for _ in 0..100 {
        vm.watch("n", |_, _, _| Ok(()), WatchOptions::default());
    }

    c.bench_function("flush_100_watchers", |b| {
        let mut i = 0;
        b.iter(|| {
            vm.set("n", i);
            i += 1;
            black_box(scheduler.flush());
        });
    });
}

criterion_group!(
    benches,
    observe_benchmark,
    tracked_write_benchmark,
    computed_read_benchmark,
    flush_benchmark,
);
criterion_main!(benches);
