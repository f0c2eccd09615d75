use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use resilient_fallback::{operation, FallbackExecutor, OperationId, ResolutionContext, ResolveError};
use std::sync::Arc;
use std::thread;

#[derive(Debug, thiserror::Error)]
enum BenchError {
    #[error("unavailable")]
    Unavailable,
    #[error("rejected")]
    Rejected,
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

trait Backend: Send + Sync {
    fn fetch(&self, key: u64) -> Result<u64, BenchError>;
}

struct Healthy;
struct Down;
struct Rejecting;

impl Backend for Healthy {
    fn fetch(&self, key: u64) -> Result<u64, BenchError> {
        Ok(key.wrapping_mul(31))
    }
}

impl Backend for Down {
    fn fetch(&self, _: u64) -> Result<u64, BenchError> {
        Err(BenchError::Unavailable)
    }
}

impl Backend for Rejecting {
    fn fetch(&self, _: u64) -> Result<u64, BenchError> {
        Err(BenchError::Rejected)
    }
}

resilient_fallback::implements!(dyn Backend => Healthy);

fn fetch_op() -> OperationId {
    operation!(dyn Backend => fetch(u64))
}

/// Chain whose first `failing` implementations are down, followed by a healthy one
fn chain(failing: usize) -> FallbackExecutor<dyn Backend, BenchError> {
    let mut builder = FallbackExecutor::<dyn Backend, BenchError>::builder();
    for _ in 0..failing {
        builder = builder.with_instance(Arc::new(Down));
    }
    builder.with_instance(Arc::new(Healthy)).build().unwrap()
}

/// Benchmark operation identity construction and hashing
fn bench_operation_identity(c: &mut Criterion) {
    let mut group = c.benchmark_group("operation_identity");

    group.bench_function("macro", |b| b.iter(|| black_box(fetch_op())));

    let op = fetch_op();
    group.bench_function("fingerprint", |b| b.iter(|| black_box(&op).fingerprint()));

    group.finish();
}

/// Benchmark chains of growing length where only the last implementation works
fn bench_fallback_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("fallback_depth");
    let op = fetch_op();

    for failing in [0usize, 1, 4, 16] {
        let executor = chain(failing);
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(failing), &failing, |b, _| {
            b.iter(|| executor.execute(&op, |backend| backend.fetch(black_box(7))))
        });
    }

    group.finish();
}

/// Benchmark exclusion lookup cost on the failure path
fn bench_exclusion_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("exclusion_lookup");
    let op = fetch_op();

    for rules in [0usize, 1, 64] {
        let mut builder = FallbackExecutor::<dyn Backend, BenchError>::builder()
            .with_instance(Arc::new(Rejecting))
            .with_instance(Arc::new(Healthy));
        // Rules on unrelated operations populate the map without matching
        for i in 0..rules {
            let unrelated = OperationId::new("Backend", format!("op_{}", i), ["u64"]);
            builder = builder.with_exclusion(unrelated, |_| true);
        }
        let executor = builder.build().unwrap();

        group.bench_with_input(BenchmarkId::new("unrelated_rules", rules), &rules, |b, _| {
            b.iter(|| executor.execute(&op, |backend| backend.fetch(black_box(7))))
        });
    }

    let propagating = FallbackExecutor::<dyn Backend, BenchError>::builder()
        .with_instance(Arc::new(Rejecting))
        .with_instance(Arc::new(Healthy))
        .with_exclusion(op.clone(), |err| matches!(err, BenchError::Rejected))
        .build()
        .unwrap();
    group.bench_function("propagated", |b| {
        b.iter(|| propagating.execute(&op, |backend| backend.fetch(black_box(7))))
    });

    group.finish();
}

/// Benchmark lazy resolution through the context
fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");
    let op = fetch_op();

    let registered = FallbackExecutor::<dyn Backend, BenchError>::builder()
        .with_context(ResolutionContext::new().with_instance(Arc::new(Healthy)))
        .with_type::<Healthy>()
        .build()
        .unwrap();
    group.bench_function("registered_instance", |b| {
        b.iter(|| registered.execute(&op, |backend| backend.fetch(black_box(7))))
    });

    let constructed = FallbackExecutor::<dyn Backend, BenchError>::builder()
        .with_context(ResolutionContext::new().with_constructor(|_| Ok(Healthy)))
        .with_type::<Healthy>()
        .build()
        .unwrap();
    group.bench_function("constructor", |b| {
        b.iter(|| constructed.execute(&op, |backend| backend.fetch(black_box(7))))
    });

    group.finish();
}

/// Benchmark concurrent execution on a shared executor
fn bench_concurrent_execution(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent");

    for thread_count in [2, 4, 8] {
        let executor = chain(1);
        let ops_per_thread = 1000;
        group.throughput(Throughput::Elements((thread_count * ops_per_thread) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(thread_count),
            &thread_count,
            |b, &threads| {
                b.iter(|| {
                    let handles: Vec<_> = (0..threads)
                        .map(|_| {
                            let executor = executor.clone();
                            thread::spawn(move || {
                                let op = fetch_op();
                                for key in 0..ops_per_thread as u64 {
                                    let _ = executor.execute(&op, |backend| backend.fetch(key));
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_operation_identity,
    bench_fallback_depth,
    bench_exclusion_lookup,
    bench_resolution,
    bench_concurrent_execution
);
criterion_main!(benches);
