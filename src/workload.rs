use crate::{BenchError, KernelKind, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkgroupCount(pub u32, pub u32, pub u32); //Analagous to gridDim in CUDA

impl WorkgroupCount {
    pub fn as_tuple(&self) -> (u32, u32, u32) {
        (self.0, self.1, self.2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkgroupSize(pub u32, pub u32, pub u32); //Analagous to blockDim in CUDA

///The Workload represents the entire piece of work.
///For more read: https://surma.dev/things/webgpu/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Workload {
    count: WorkgroupCount,
    size: WorkgroupSize,
}

impl Workload {
    pub fn new(count: WorkgroupCount, size: WorkgroupSize) -> Self {
        Self { count, size }
    }

    pub fn count(&self) -> &WorkgroupCount {
        &self.count
    }

    pub fn size(&self) -> &WorkgroupSize {
        &self.size
    }

    /// Number of work items launched along each axis, including the padding
    /// items that fall outside the problem and return immediately.
    pub fn invocations(&self) -> (u64, u64, u64) {
        (
            self.count.0 as u64 * self.size.0 as u64,
            self.count.1 as u64 * self.size.1 as u64,
            self.count.2 as u64 * self.size.2 as u64,
        )
    }

    pub fn ceil(num: usize, div: usize) -> usize {
        (num + div - 1) / div
    }

    /// Rejects grids the device cannot launch.
    pub fn check_limits(&self, limits: &wgpu::Limits) -> Result<()> {
        let per_dim = limits.max_compute_workgroups_per_dimension;
        for (axis, count) in ['x', 'y', 'z'].into_iter().zip([
            self.count.0,
            self.count.1,
            self.count.2,
        ]) {
            if count > per_dim {
                return Err(BenchError::GridTooLarge {
                    axis,
                    count: count as u64,
                    limit: per_dim,
                });
            }
        }
        Ok(())
    }
}

/// Square problem of side `dim`.
///
/// Both the device allocation and the dispatch grid are derived from the
/// same `dim`, so they always agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Problem {
    dim: usize,
    kind: KernelKind,
}

impl Problem {
    pub fn new(dim: usize, kind: KernelKind) -> Self {
        Self { dim, kind }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn numel(&self) -> usize {
        self.dim * self.dim
    }

    pub fn buffer_bytes(&self) -> u64 {
        (self.numel() * std::mem::size_of::<f32>()) as u64
    }

    /// Grid that gives every output cell exactly one work item.
    ///
    /// Counts saturate at `u32::MAX` so oversize problems are caught by
    /// [`Workload::check_limits`] rather than wrapping.
    pub fn workload(&self) -> Workload {
        let size = self.kind.workgroup_size();
        let clamp = |n: usize| u32::try_from(n).unwrap_or(u32::MAX);
        let count = match self.kind {
            KernelKind::Matmul => WorkgroupCount(
                clamp(Workload::ceil(self.dim, size.0 as usize)),
                clamp(Workload::ceil(self.dim, size.1 as usize)),
                1,
            ),
            KernelKind::Elementwise => {
                WorkgroupCount(clamp(Workload::ceil(self.numel(), size.0 as usize)), 1, 1)
            }
        };
        Workload::new(count, size)
    }

    /// Rejects problems whose matrices cannot be bound as one storage buffer.
    pub fn check_buffer_limits(&self, limits: &wgpu::Limits) -> Result<()> {
        let bytes = self.buffer_bytes();
        let limit = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
        if bytes > limit {
            return Err(BenchError::BufferAllocation {
                bytes,
                message: format!("device binding limit is {} bytes", limit),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn ceil_div() {
        assert_eq!(Workload::ceil(1, 16), 1);
        assert_eq!(Workload::ceil(16, 16), 1);
        assert_eq!(Workload::ceil(17, 16), 2);
    }

    #[test]
    pub fn grid_tracks_dim() {
        for dim in [1, 2, 15, 16, 17, 100, 256, 1000] {
            let problem = Problem::new(dim, KernelKind::Matmul);
            let workload = problem.workload();
            let (x, y, z) = workload.invocations();
            assert!(x >= dim as u64 && x < dim as u64 + 16);
            assert!(y >= dim as u64 && y < dim as u64 + 16);
            assert_eq!(z, 1);
            assert_eq!(problem.buffer_bytes(), (dim * dim * 4) as u64);
        }
    }

    #[test]
    pub fn changing_dim_updates_allocation_and_grid() {
        let small = Problem::new(10, KernelKind::Matmul);
        let large = Problem::new(40, KernelKind::Matmul);
        assert_eq!(small.buffer_bytes() * 16, large.buffer_bytes());
        assert_eq!(small.workload().count(), &WorkgroupCount(1, 1, 1));
        assert_eq!(large.workload().count(), &WorkgroupCount(3, 3, 1));
    }

    #[test]
    pub fn elementwise_grid_is_flat() {
        let problem = Problem::new(30, KernelKind::Elementwise);
        let workload = problem.workload();
        assert_eq!(workload.size(), &WorkgroupSize(64, 1, 1));
        assert_eq!(workload.count(), &WorkgroupCount(15, 1, 1));
        assert!(workload.invocations().0 >= problem.numel() as u64);
    }

    #[test]
    pub fn oversize_grid_rejected() {
        let limits = wgpu::Limits {
            max_compute_workgroups_per_dimension: 4,
            ..wgpu::Limits::downlevel_defaults()
        };
        assert!(Problem::new(64, KernelKind::Matmul)
            .workload()
            .check_limits(&limits)
            .is_ok());
        let err = Problem::new(65, KernelKind::Matmul)
            .workload()
            .check_limits(&limits)
            .unwrap_err();
        assert!(matches!(
            err,
            BenchError::GridTooLarge {
                axis: 'x',
                count: 5,
                limit: 4
            }
        ));
    }

    #[test]
    pub fn oversize_buffer_rejected() {
        let limits = wgpu::Limits {
            max_storage_buffer_binding_size: 1024,
            ..wgpu::Limits::downlevel_defaults()
        };
        assert!(Problem::new(16, KernelKind::Matmul)
            .check_buffer_limits(&limits)
            .is_ok());
        let err = Problem::new(17, KernelKind::Elementwise)
            .check_buffer_limits(&limits)
            .unwrap_err();
        assert!(matches!(
            err,
            BenchError::BufferAllocation { bytes: 1156, .. }
        ));
        assert_eq!(err.code(), -7);
    }
}
