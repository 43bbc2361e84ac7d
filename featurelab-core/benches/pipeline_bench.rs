//! Criterion benchmarks for the feature pipeline hot paths.
//!
//! 1. Full `fit_transform` over the whole catalogue
//! 2. Single-row `transform` after a fit (the live-prediction path)
//! 3. Causal lowess over a long series

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use featurelab_core::config::FeatureConfig;
use featurelab_core::data::synthetic_prices;
use featurelab_core::domain::{PriceTable, SortOrder};
use featurelab_core::features::{lowess, FeaturePipeline};

fn prices(n: usize) -> PriceTable {
    let end = NaiveDate::from_ymd_opt(2024, 6, 28).unwrap();
    synthetic_prices("BENCH", end, n, SortOrder::Ascending)
}

fn bench_fit_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit_transform");
    group.sample_size(10);
    for n in [250usize, 1_000] {
        let p = prices(n);
        let labels = vec![0.0; n];
        group.bench_with_input(BenchmarkId::from_parameter(n), &p, |b, p| {
            b.iter(|| {
                let mut pipeline = FeaturePipeline::new(&FeatureConfig::default()).unwrap();
                black_box(pipeline.fit_transform(p, &labels).unwrap())
            })
        });
    }
    group.finish();
}

fn bench_single_row(c: &mut Criterion) {
    let p = prices(500);
    let (head, tail) = p.split_tail(1);
    let bar = tail.bars()[0].clone();
    let mut pipeline = FeaturePipeline::new(&FeatureConfig::default()).unwrap();
    pipeline.fit_transform(&head, &vec![0.0; head.len()]).unwrap();

    c.bench_function("transform_bar", |b| {
        b.iter(|| black_box(pipeline.transform_bar(&bar).unwrap()))
    });
}

fn bench_lowess(c: &mut Criterion) {
    let series: Vec<f64> = prices(2_000).bars().iter().map(|b| b.close).collect();
    let mut group = c.benchmark_group("lowess");
    for iterations in [1usize, 3] {
        group.bench_with_input(
            BenchmarkId::from_parameter(iterations),
            &iterations,
            |b, &it| b.iter(|| black_box(lowess(&series, 10, it))),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_fit_transform, bench_single_row, bench_lowess);
criterion_main!(benches);
