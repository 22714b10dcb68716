use std::borrow::Cow;
use std::collections::HashMap;

use crate::{BenchError, GPUHandle, KernelKind, Result, WorkgroupSize};

pub trait KernelContextExt {
    fn insert_workgroup_size(&mut self, size: &WorkgroupSize);
}

impl KernelContextExt for tera::Context {
    fn insert_workgroup_size(&mut self, size: &WorkgroupSize) {
        self.insert("workgroup_size_x", &size.0);
        self.insert("workgroup_size_y", &size.1);
        self.insert("workgroup_size_z", &size.2);
    }
}

/// A named WGSL template embedded in the binary.
#[derive(Debug, Clone, Copy)]
pub struct KernelSource {
    pub name: &'static str,
    pub template: &'static str,
    pub entry_point: &'static str,
}

impl KernelSource {
    pub const MATMUL: KernelSource = KernelSource {
        name: "matmul",
        template: include_str!("../kernels/matmul.wgsl"),
        entry_point: "main",
    };

    pub const ELEMENTWISE: KernelSource = KernelSource {
        name: "elementwise",
        template: include_str!("../kernels/elementwise.wgsl"),
        entry_point: "main",
    };

    pub fn for_kind(kind: KernelKind) -> Self {
        match kind {
            KernelKind::Matmul => Self::MATMUL,
            KernelKind::Elementwise => Self::ELEMENTWISE,
        }
    }

    pub fn render(&self, size: &WorkgroupSize) -> Result<String> {
        let template_error = |source| BenchError::KernelTemplate {
            name: self.name,
            source,
        };
        let mut tera = tera::Tera::default();
        let mut context = tera::Context::new();
        tera.add_raw_template(self.name, self.template)
            .map_err(template_error)?;
        context.insert_workgroup_size(size);
        tera.render(self.name, &context).map_err(template_error)
    }

    /// Renders, compiles and links the kernel. Validation errors raised by
    /// the device are returned instead of reaching the uncaptured handler.
    pub fn compile(&self, handle: &GPUHandle, size: &WorkgroupSize) -> Result<CompiledKernel> {
        let source = self.render(size)?;
        let device = handle.device();

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(self.name),
            source: wgpu::ShaderSource::Wgsl(Cow::Owned(source)),
        });
        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            return Err(BenchError::ShaderCompilation {
                name: self.name,
                message: e.to_string(),
            });
        }

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(self.name),
            layout: None,
            module: &module,
            entry_point: self.entry_point,
        });
        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            return Err(BenchError::EntryPoint {
                name: self.name,
                message: e.to_string(),
            });
        }
        log::info!("Compiled kernel {} with workgroup size {:?}", self.name, size);

        Ok(CompiledKernel {
            name: self.name,
            pipeline,
        })
    }
}

#[derive(Debug)]
pub struct CompiledKernel {
    name: &'static str,
    pipeline: wgpu::ComputePipeline,
}

impl CompiledKernel {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn pipeline(&self) -> &wgpu::ComputePipeline {
        &self.pipeline
    }
}

/// Every kernel the harness can dispatch, compiled once up front.
#[derive(Debug)]
pub struct KernelRegistry {
    kernels: HashMap<KernelKind, CompiledKernel>,
}

impl KernelRegistry {
    pub fn compile_all(handle: &GPUHandle) -> Result<Self> {
        let kernels = KernelKind::ALL
            .into_iter()
            .map(|kind| {
                let kernel = KernelSource::for_kind(kind).compile(handle, &kind.workgroup_size())?;
                Ok((kind, kernel))
            })
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(Self { kernels })
    }

    pub fn get(&self, kind: KernelKind) -> &CompiledKernel {
        // compile_all fills every kind
        &self.kernels[&kind]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn render_substitutes_workgroup_size() {
        for kind in KernelKind::ALL {
            let size = kind.workgroup_size();
            let source = KernelSource::for_kind(kind).render(&size).unwrap();
            let expected = format!("@workgroup_size({}, {}, {})", size.0, size.1, size.2);
            assert!(source.contains(&expected), "{source}");
            assert!(!source.contains("{{"));
            assert!(source.contains("fn main("));
        }
    }

    #[test]
    pub fn broken_template_is_reported() {
        let source = KernelSource {
            name: "broken",
            template: "{{ workgroup_size_x ",
            entry_point: "main",
        };
        let err = source.render(&WorkgroupSize(1, 1, 1)).unwrap_err();
        assert!(matches!(err, BenchError::KernelTemplate { name: "broken", .. }));
    }
}
