/// Benchmarks for the binning engine.
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pickup_explorer::binning::{bin, BinningConfig};
use pickup_explorer::column::Column;
use pickup_explorer::dataset::{Dataset, ScanOptions};
use pickup_explorer::limits::{Limits, Range};
use pickup_explorer::models::MonthFilter;

/// Records on a regular grid in `[-1, 1)`, with times stepping through 2015.
fn grid_dataset(rows: usize) -> Dataset {
    let coordinate = |i: usize, period: usize| (i % period) as f32 / period as f32 * 2.0 - 1.0;
    let x = (0..rows).map(|i| coordinate(i, 997)).collect();
    let y = (0..rows).map(|i| coordinate(i, 991)).collect();
    // 2015-01-01T00:00:00Z
    let start = 1_420_070_400_i64;
    let t = (0..rows)
        .map(|i| start + (i as i64 * 3_163) % 31_536_000)
        .collect();
    Dataset::from_columns(
        "x",
        "y",
        "t",
        Column::Float32(x),
        Column::Float32(y),
        Column::Int64(t),
    )
    .unwrap()
}

fn criterion_benchmark(c: &mut Criterion) {
    let limits = Limits::new(Range::new(-0.5, 0.5), Range::new(-0.5, 0.5));
    for rows_k in [64, 1024] {
        let dataset = grid_dataset(rows_k * 1024);
        for parallel in [false, true] {
            for filter in [MonthFilter::ALL, MonthFilter(6)] {
                let config = BinningConfig {
                    shape: 256,
                    scan: ScanOptions {
                        chunk_size: 65_536,
                        parallel,
                    },
                };
                let name = format!(
                    "bin({}k, parallel={}, month={})",
                    rows_k, parallel, filter.0
                );
                c.bench_function(&name, |b| {
                    b.iter(|| {
                        bin(&dataset, black_box(filter), black_box(&limits), &config).unwrap()
                    })
                });
            }
        }
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
