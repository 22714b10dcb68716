use encase::{private::WriteInto, ShaderType, UniformBuffer};

use crate::{BenchError, GPUBuffer, GPUHandle, Problem, Result};

pub const UNIFORM_ALIGN: usize = 256;

/// Uniform data handed to a kernel alongside its storage buffers.
pub trait OpMetadata: Sized + ShaderType + WriteInto + std::fmt::Debug {
    fn into_buffer(&self, handle: &GPUHandle) -> Result<GPUBuffer> {
        let size: usize = self.size().get() as _;
        let aligned_size = size + (UNIFORM_ALIGN - size % UNIFORM_ALIGN);

        let mut uniform = UniformBuffer::new(Vec::with_capacity(aligned_size));
        uniform
            .write(self)
            .map_err(|e| BenchError::BufferAllocation {
                bytes: size as u64,
                message: e.to_string(),
            })?;

        let buffer = GPUBuffer::allocate(
            handle,
            "metadata",
            aligned_size as u64,
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        )?;
        handle
            .queue()
            .write_buffer(&buffer, 0, &uniform.into_inner());
        Ok(buffer)
    }
}

/// Dimensions of C = A·B with A: MxK, B: KxN.
#[derive(ShaderType, Debug, Clone, Copy, PartialEq)]
pub struct MatmulMeta {
    pub dims: glam::UVec3,
}

impl MatmulMeta {
    pub fn new(m: u32, n: u32, k: u32) -> Self {
        Self {
            dims: glam::UVec3::new(m, n, k),
        }
    }
}

impl OpMetadata for MatmulMeta {}

#[derive(ShaderType, Debug, Clone, Copy, PartialEq)]
pub struct ElementwiseMeta {
    pub numel: u32,
}

impl OpMetadata for ElementwiseMeta {}

impl Problem {
    pub fn matmul_meta(&self) -> MatmulMeta {
        let dim = self.dim() as u32;
        MatmulMeta::new(dim, dim, dim)
    }

    pub fn elementwise_meta(&self) -> ElementwiseMeta {
        ElementwiseMeta {
            numel: self.numel() as u32,
        }
    }
}
