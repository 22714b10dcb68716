use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use matmul_bencher::{
    buffers_to_bind_groups, data::generate_inputs, dispatch, AdapterPreference, GPUBuffer,
    GPUHandle, KernelKind, KernelSource, OpMetadata, Problem, WgpuTimer,
};

lazy_static::lazy_static! {
    pub static ref TIMER: WgpuTimer = {
        let preference = AdapterPreference {
            name: std::env::var("MATBENCH_ADAPTER").ok(),
            allow_cpu: true,
        };
        let handle = pollster::block_on(GPUHandle::new(&preference))
            .expect("no adapter available for benchmarking");
        WgpuTimer::new(handle).expect("adapter does not support timestamp queries")
    };
}

const DIMS: [usize; 3] = [64, 128, 256];

/// Profiles the naive one-item-per-cell matmul kernel
pub fn matmul_bench(c: &mut Criterion<&WgpuTimer>) {
    let handle = TIMER.handle();
    let kind = KernelKind::Matmul;
    let kernel = KernelSource::for_kind(kind)
        .compile(handle, &kind.workgroup_size())
        .unwrap();

    let mut group = c.benchmark_group("wgpu kernel");
    group.warm_up_time(Duration::from_secs(2)); //Limit warmup time to avoid MAX_QUERIES limit
    for dim in DIMS {
        let problem = Problem::new(dim, kind);
        let workload = problem.workload();
        let (a, b) = generate_inputs(dim, 42);
        let a_buf = GPUBuffer::upload(handle, "A", &a).unwrap();
        let b_buf = GPUBuffer::upload(handle, "B", &b).unwrap();
        let c_buf = GPUBuffer::output(handle, "C", problem.buffer_bytes()).unwrap();
        let meta = problem.matmul_meta().into_buffer(handle).unwrap();
        let bind_groups =
            buffers_to_bind_groups(handle, &[&a_buf, &b_buf, &c_buf, &meta], kernel.pipeline())
                .unwrap();

        group.throughput(Throughput::Elements(2 * (dim as u64).pow(3)));
        group.bench_function(BenchmarkId::new(kernel.name(), dim), |bencher| {
            bencher.iter(|| {
                dispatch(
                    handle,
                    &workload,
                    &bind_groups,
                    kernel.pipeline(),
                    Some(&*TIMER),
                );
                TIMER.increment_query();
            });
        });
    }
    group.finish()
}

criterion_group!(
    name = bench;
    config = Criterion::default().with_measurement(&*TIMER);
    targets = matmul_bench
);
criterion_main!(bench);
