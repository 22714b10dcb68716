use std::time::Instant;

use crate::{
    BenchError, CompiledKernel, GPUBuffer, GPUHandle, KernelKind, KernelRegistry, Matrix,
    OpMetadata, Problem, Result, TimingSample, WgpuTimer, Workload,
};

/// Output of one accelerated dispatch.
#[derive(Debug)]
pub struct AcceleratedRun {
    pub output: Matrix,
    pub timing: TimingSample,
    pub workload: Workload,
}

/// Records one compute pass over `workload`, submits it and blocks until the
/// device is idle. There is no timeout.
pub fn dispatch(
    handle: &GPUHandle,
    workload: &Workload,
    bind_groups: &[wgpu::BindGroup],
    pipeline: &wgpu::ComputePipeline,
    timer: Option<&WgpuTimer>,
) {
    let mut encoder = handle
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    {
        let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: None,
            timestamp_writes: timer.map(WgpuTimer::timestamp_writes),
        });
        for (i, bind_group) in bind_groups.iter().enumerate() {
            cpass.set_bind_group(i as _, bind_group, &[]);
        }
        cpass.set_pipeline(pipeline);
        let (x, y, z) = workload.count().as_tuple();
        cpass.dispatch_workgroups(x, y, z);
    }
    handle.queue().submit(Some(encoder.finish()));
    handle.device().poll(wgpu::Maintain::Wait);
}

/// Binds `buffers` in order, four bindings per group. Layout mismatches and
/// oversize bindings are returned instead of reaching the uncaptured handler.
pub fn buffers_to_bind_groups(
    handle: &GPUHandle,
    buffers: &[&GPUBuffer],
    pipeline: &wgpu::ComputePipeline,
) -> Result<Vec<wgpu::BindGroup>> {
    let bind_group_entries = buffers
        .iter()
        .enumerate()
        .map(|(i, buffer)| wgpu::BindGroupEntry {
            binding: (i % 4) as u32,
            resource: buffer.as_entire_binding(),
        })
        .collect::<Vec<_>>();

    let device = handle.device();
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let bind_groups = bind_group_entries
        .chunks(4)
        .enumerate()
        .map(|(i, entries)| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: None,
                layout: &pipeline.get_bind_group_layout(i as _),
                entries,
            })
        })
        .collect::<Vec<_>>();
    if let Some(e) = pollster::block_on(device.pop_error_scope()) {
        return Err(BenchError::BufferAllocation {
            bytes: buffers.iter().map(|b| b.size()).sum(),
            message: e.to_string(),
        });
    }
    Ok(bind_groups)
}

/// # Accelerator
///
/// Owns the device, the compiled kernels and the timestamp queries for the
/// lifetime of a run.
#[derive(Debug)]
pub struct Accelerator {
    handle: GPUHandle,
    kernels: KernelRegistry,
    timer: Option<WgpuTimer>,
}

impl Accelerator {
    pub fn new(handle: GPUHandle) -> Result<Self> {
        let kernels = KernelRegistry::compile_all(&handle)?;
        let timer = WgpuTimer::new(handle.clone());
        Ok(Self {
            handle,
            kernels,
            timer,
        })
    }

    pub fn handle(&self) -> &GPUHandle {
        &self.handle
    }

    pub fn matmul(&self, a: &Matrix, b: &Matrix) -> Result<AcceleratedRun> {
        self.run(KernelKind::Matmul, a, b)
    }

    pub fn elementwise_mul(&self, a: &Matrix, b: &Matrix) -> Result<AcceleratedRun> {
        self.run(KernelKind::Elementwise, a, b)
    }

    /// Runs `kind` over two square inputs of equal side.
    pub fn run(&self, kind: KernelKind, a: &Matrix, b: &Matrix) -> Result<AcceleratedRun> {
        let dim = match (a.dim(), b.dim()) {
            (Some(m), Some(n)) if m == n => m,
            _ => {
                return Err(BenchError::DimensionMismatch {
                    lhs: a.shape(),
                    rhs: b.shape(),
                })
            }
        };
        let problem = Problem::new(dim, kind);
        let workload = problem.workload();
        let limits = self.handle.device().limits();
        workload.check_limits(&limits)?;
        problem.check_buffer_limits(&limits)?;
        log::debug!(
            "Dispatching {} over {:?} ({:?} invocations)",
            kind,
            workload,
            workload.invocations()
        );

        let kernel = self.kernels.get(kind);
        let metadata = match kind {
            KernelKind::Matmul => problem.matmul_meta().into_buffer(&self.handle)?,
            KernelKind::Elementwise => problem.elementwise_meta().into_buffer(&self.handle)?,
        };
        let (output, timing) = self.execute(kernel, &problem, &workload, a, b, &metadata)?;
        Ok(AcceleratedRun {
            output,
            timing,
            workload,
        })
    }

    fn execute(
        &self,
        kernel: &CompiledKernel,
        problem: &Problem,
        workload: &Workload,
        a: &Matrix,
        b: &Matrix,
        metadata: &GPUBuffer,
    ) -> Result<(Matrix, TimingSample)> {
        let handle = &self.handle;
        let a_buf = GPUBuffer::upload(handle, "A", a)?;
        let b_buf = GPUBuffer::upload(handle, "B", b)?;
        let c_buf = GPUBuffer::output(handle, "C", problem.buffer_bytes())?;

        let bind_groups =
            buffers_to_bind_groups(handle, &[&a_buf, &b_buf, &c_buf, metadata], kernel.pipeline())?;

        let host_start = Instant::now();
        dispatch(
            handle,
            workload,
            &bind_groups,
            kernel.pipeline(),
            self.timer.as_ref(),
        );
        let timing = match &self.timer {
            Some(timer) => timer.sample()?,
            None => TimingSample::host(host_start, Instant::now()),
        };
        log::debug!("{} finished in {:.3} ms", kernel.name(), timing.elapsed_ms());

        let output = c_buf.read_matrix(handle, problem.dim(), problem.dim())?;
        Ok((output, timing))
    }
}
