//! Benchmarks for pattern detection and scan orchestration.

use std::collections::HashMap;

use async_trait::async_trait;
use chartscan::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Generate realistic random bars
fn generate_bars(n: usize) -> Vec<Bar> {
  let mut bars = Vec::with_capacity(n);
  let mut price = 100.0;

  for i in 0..n {
    let change = ((i * 7 + 13) % 100) as f64 / 50.0 - 1.0; // Deterministic "random"
    let volatility = 2.0 + ((i * 3) % 10) as f64 / 5.0;
    let volume = 1000.0 + ((i * 11) % 500) as f64;

    let o = price;
    let c = (price + change).max(1.0);
    let h = o.max(c) + volatility * 0.5;
    let l = (o.min(c) - volatility * 0.5).max(0.5);

    bars.push(Bar { timestamp: i as i64 * 86_400_000, open: o, high: h, low: l, close: c, volume });
    price = c;
  }

  bars
}

fn generate_series(n: usize) -> TimeSeries {
  TimeSeries::new(generate_bars(n)).unwrap()
}

fn bench_single_detector(c: &mut Criterion) {
  let series = generate_series(1000);
  let detector = HeadShouldersDetector::with_defaults();

  c.bench_function("head_shoulders_1000_bars", |b| {
    b.iter(|| {
      let _ = black_box(detector.detect(black_box(&series)));
    })
  });
}

fn bench_all_detectors(c: &mut Criterion) {
  let series = generate_series(1000);

  c.bench_function("all_patterns_1000_bars", |b| {
    b.iter(|| {
      for pattern in Pattern::ALL {
        let _ = black_box(pattern.detector().detect(black_box(&series)));
      }
    })
  });
}

fn bench_scaling(c: &mut Criterion) {
  let detector = DoubleTopDetector::with_defaults();

  let mut group = c.benchmark_group("scaling");

  for size in [100, 500, 1000, 5000].iter() {
    let series = generate_series(*size);

    group.bench_with_input(BenchmarkId::new("double_top", size), size, |b, _| {
      b.iter(|| {
        let _ = black_box(detector.detect(black_box(&series)));
      })
    });
  }

  group.finish();
}

struct StaticProvider(HashMap<String, Vec<Bar>>);

#[async_trait]
impl MarketDataProvider for StaticProvider {
  async fn fetch_batch(
    &self,
    _symbols: &[String],
    _timeframe: Timeframe,
    _lookback: Lookback,
    _limit: usize,
  ) -> std::result::Result<HashMap<String, Vec<Bar>>, ProviderError> {
    Ok(self.0.clone())
  }
}

fn bench_cached_universe_scan(c: &mut Criterion) {
  let payload: HashMap<String, Vec<Bar>> =
    DEFAULT_UNIVERSE.iter().map(|s| (s.to_string(), generate_bars(500))).collect();

  let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
  let client = MarketDataClient::new(StaticProvider(payload), ClientConfig::default());
  let scanner = Scanner::with_default_universe(client);

  // Warm the cache so iterations measure evaluation, not the mock fetch.
  runtime
    .block_on(scanner.scan(Pattern::VolumeSpike, Timeframe::D1, Lookback::Y1))
    .unwrap();

  c.bench_function("cached_scan_50_tickers", |b| {
    b.iter(|| {
      let summary = runtime
        .block_on(scanner.scan(Pattern::VolumeSpike, Timeframe::D1, Lookback::Y1))
        .unwrap();
      black_box(summary);
    })
  });
}

criterion_group!(
  benches,
  bench_single_detector,
  bench_all_detectors,
  bench_scaling,
  bench_cached_universe_scan,
);

criterion_main!(benches);
