use wgpu::{BufferAddress, BufferUsages};

use crate::{BenchError, GPUHandle, Matrix, Result};

/// Minimum size wgpu accepts for a storage binding.
pub const MIN_STORAGE_BUFFER_SIZE: u64 = 16;

/// # GPUBuffer
///
/// Sole owner of one device allocation. The allocation is destroyed as soon
/// as the value is dropped, on success and error paths alike.
pub struct GPUBuffer {
    inner: wgpu::Buffer,
    label: &'static str,
}

impl std::ops::Deref for GPUBuffer {
    type Target = wgpu::Buffer;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl std::fmt::Debug for GPUBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GPUBuffer")
            .field("label", &self.label)
            .field("size", &self.inner.size())
            .field("usage", &self.inner.usage())
            .finish()
    }
}

impl Drop for GPUBuffer {
    fn drop(&mut self) {
        log::trace!("Releasing buffer {}", self.label);
        self.inner.destroy();
    }
}

impl GPUBuffer {
    /// Allocates `size` bytes, surfacing out-of-memory and validation
    /// failures as [`BenchError::BufferAllocation`].
    pub fn allocate(
        handle: &GPUHandle,
        label: &'static str,
        size: BufferAddress,
        usage: BufferUsages,
    ) -> Result<Self> {
        let size = size.max(MIN_STORAGE_BUFFER_SIZE);
        let device = handle.device();
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let inner = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        });
        let validation = pollster::block_on(device.pop_error_scope());
        let oom = pollster::block_on(device.pop_error_scope());
        if let Some(e) = validation.or(oom) {
            return Err(BenchError::BufferAllocation {
                bytes: size,
                message: e.to_string(),
            });
        }
        Ok(Self { inner, label })
    }

    /// Read-only input populated with a blocking copy from `matrix`.
    pub fn upload(handle: &GPUHandle, label: &'static str, matrix: &Matrix) -> Result<Self> {
        let buffer = Self::allocate(
            handle,
            label,
            matrix.n_bytes() as u64,
            BufferUsages::STORAGE | BufferUsages::COPY_DST,
        )?;
        handle.queue().write_buffer(&buffer, 0, matrix.as_bytes());
        handle.queue().submit(None);
        handle.device().poll(wgpu::Maintain::Wait);
        Ok(buffer)
    }

    /// Zero-initialised read-write output the host can copy back from.
    pub fn output(handle: &GPUHandle, label: &'static str, size: BufferAddress) -> Result<Self> {
        Self::allocate(
            handle,
            label,
            size,
            BufferUsages::STORAGE | BufferUsages::COPY_SRC,
        )
    }

    /// Blocks until the first `rows * cols` floats are on the host.
    pub fn read_matrix(&self, handle: &GPUHandle, rows: usize, cols: usize) -> Result<Matrix> {
        if !self.usage().contains(BufferUsages::COPY_SRC) {
            return Err(BenchError::BufferRead(format!(
                "{} was created without COPY_SRC",
                self.label
            )));
        }
        let n_bytes = (rows * cols * std::mem::size_of::<f32>()) as BufferAddress;
        if n_bytes > self.size() {
            return Err(BenchError::BufferRead(format!(
                "{} holds {} bytes, {} requested",
                self.label,
                self.size(),
                n_bytes
            )));
        }
        if n_bytes == 0 {
            return Ok(Matrix::zeros(rows, cols));
        }

        let buffer_slice = self.slice(..n_bytes);
        let (tx, rx) = std::sync::mpsc::channel();
        wgpu::util::DownloadBuffer::read_buffer(
            handle.device(),
            handle.queue(),
            &buffer_slice,
            move |buffer| {
                // Called on download completed
                let result = buffer
                    .map(|db| bytemuck::cast_slice::<u8, f32>(&db).to_vec())
                    .map_err(|e| BenchError::BufferRead(e.to_string()));
                let _ = tx.send(result);
            },
        );
        handle.device().poll(wgpu::Maintain::Wait);
        let data = rx
            .recv()
            .map_err(|e| BenchError::BufferRead(e.to_string()))??;
        Matrix::from_vec(rows, cols, data)
    }
}
