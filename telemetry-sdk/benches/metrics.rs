use criterion::{criterion_group, criterion_main, Criterion};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use telemetry::{Context, KeyValue};
use telemetry_sdk::export::metrics::aggregation::{
    cumulative_temporality_selector, delta_temporality_selector,
};
use telemetry_sdk::metrics::controllers::{self, BasicController};
use telemetry_sdk::metrics::selectors::simple::Selector;
use telemetry_sdk::metrics::{processors, Counter, MeterProvider};
use telemetry_sdk::Resource;

// Run this benchmark with:
// cargo bench --bench metrics
fn controller(delta: bool) -> BasicController {
    let builder = if delta {
        controllers::basic(processors::factory(
            Selector::Inexpensive,
            delta_temporality_selector(),
        ))
    } else {
        controllers::basic(processors::factory(
            Selector::Inexpensive,
            cumulative_temporality_selector(),
        ))
    };
    builder.with_resource(Resource::empty()).build()
}

fn create_counter(controller: &BasicController) -> Counter<u64> {
    controller.meter("benchmarks").u64_counter("counter_bench").init()
}

const ATTRIBUTE_VALUES: [&str; 10] = [
    "value1", "value2", "value3", "value4", "value5", "value6", "value7", "value8", "value9",
    "value10",
];

fn random_attributes(rng: &mut SmallRng) -> [KeyValue; 4] {
    // 4*4*10*10 = 1600 time series.
    [
        KeyValue::new("attribute1", ATTRIBUTE_VALUES[rng.random_range(0..4)]),
        KeyValue::new("attribute2", ATTRIBUTE_VALUES[rng.random_range(0..4)]),
        KeyValue::new("attribute3", ATTRIBUTE_VALUES[rng.random_range(0..10)]),
        KeyValue::new("attribute4", ATTRIBUTE_VALUES[rng.random_range(0..10)]),
    ]
}

fn counter_add(c: &mut Criterion) {
    let controller = controller(true);
    let counter = create_counter(&controller);
    let mut rng = SmallRng::from_os_rng();

    c.bench_function("Counter_Add_NoAttributes", |b| {
        b.iter(|| counter.add(1, &[]));
    });

    c.bench_function("Counter_Add_Random", |b| {
        b.iter(|| counter.add(1, &random_attributes(&mut rng)));
    });

    c.bench_function("Counter_Add_Unsorted", |b| {
        b.iter(|| {
            counter.add(
                1,
                &[
                    KeyValue::new("attribute4", ATTRIBUTE_VALUES[3]),
                    KeyValue::new("attribute2", ATTRIBUTE_VALUES[1]),
                    KeyValue::new("attribute1", ATTRIBUTE_VALUES[0]),
                    KeyValue::new("attribute3", ATTRIBUTE_VALUES[2]),
                ],
            )
        });
    });
}

fn histogram_record(c: &mut Criterion) {
    let controller = controllers::basic(processors::factory(
        Selector::Histogram(vec![0.0, 5.0, 10.0, 25.0, 50.0, 75.0, 100.0, 250.0, 500.0, 1000.0]),
        delta_temporality_selector(),
    ))
    .with_resource(Resource::empty())
    .build();
    let histogram = controller
        .meter("benchmarks")
        .f64_histogram("histogram_bench")
        .init();
    let mut rng = SmallRng::from_os_rng();

    c.bench_function("Histogram_Record", |b| {
        b.iter(|| histogram.record(rng.random_range(0.0..1000.0), &[]));
    });
}

fn collect(c: &mut Criterion) {
    let mut rng = SmallRng::from_os_rng();
    for (name, delta) in [("Collect_Delta_1600", true), ("Collect_Cumulative_1600", false)] {
        let controller = controller(delta);
        let counter = create_counter(&controller);
        let cx = Context::new();

        c.bench_function(name, |b| {
            b.iter(|| {
                for _ in 0..1600 {
                    counter.add(1, &random_attributes(&mut rng));
                }
                controller.collect(&cx)
            });
        });
    }
}

criterion_group!(benches, counter_add, histogram_record, collect);
criterion_main!(benches);
