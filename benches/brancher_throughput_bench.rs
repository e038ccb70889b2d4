//! # Brancher Throughput Benchmark
//!
//! Pushes `count` items through a DataBrancher and drains both branches.
//! Compares the identity duplicate with a copy function and bounded buffers.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use streamweave_brancher::{DataBrancher, DataflowOptions, GraphNode, copy_fn};

/// Runs one brancher to completion on a current_thread runtime, matching #[tokio::test] behavior.
fn brancher_sync(count: usize, capacity: Option<usize>, transform: bool) {
  let rt = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .unwrap();
  rt.block_on(brancher_round_trip(count, capacity, transform));
}

async fn brancher_round_trip(count: usize, capacity: Option<usize>, transform: bool) {
  let mut options = DataflowOptions::new().with_name("bench");
  if let Some(capacity) = capacity {
    options = options.with_recommended_capacity(capacity);
  }
  let brancher = if transform {
    DataBrancher::with_copy_fn(copy_fn(|x: &u64| x.wrapping_mul(31)), options)
  } else {
    DataBrancher::new(options)
  };

  let input = brancher.input();
  tokio::spawn(async move {
    for i in 0..count as u64 {
      input.send(i).await.unwrap();
    }
    input.complete();
  });

  let output = brancher.output();
  let primary = tokio::spawn(async move {
    let mut received = 0;
    while output.recv().await.is_some() {
      received += 1;
    }
    received
  });

  let copies = brancher.copied_output();
  let mut copied = 0;
  while copies.recv().await.is_some() {
    copied += 1;
  }

  assert_eq!(primary.await.unwrap(), count);
  assert_eq!(copied, count);
  assert!(brancher.wait_completion().await.is_success());
}

fn brancher_benchmark(c: &mut Criterion) {
  let mut group = c.benchmark_group("brancher_throughput");
  group.sample_size(10);
  group.warm_up_time(std::time::Duration::from_secs(1));
  group.measurement_time(std::time::Duration::from_secs(3));

  for size in [100, 1000, 10000].iter() {
    group.throughput(Throughput::Elements(*size as u64));
    group.bench_with_input(BenchmarkId::new("identity", size), size, |b, &size| {
      b.iter(|| brancher_sync(size, None, false));
    });
    group.bench_with_input(BenchmarkId::new("copy_fn", size), size, |b, &size| {
      b.iter(|| brancher_sync(size, None, true));
    });
    group.bench_with_input(BenchmarkId::new("bounded_16", size), size, |b, &size| {
      b.iter(|| brancher_sync(size, Some(16), false));
    });
  }

  group.finish();
}

criterion_group!(benches, brancher_benchmark);
criterion_main!(benches);
