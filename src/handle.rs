use std::sync::Arc;

use wgpu::Adapter;
use wgpu::DeviceType;

use wgpu::Limits;

use crate::{AdapterPreference, BenchError, Result};

/// # GPUHandle
///
/// A reference counted handle to a GPU device and queue.
///
/// Dropping the last clone releases the device and queue.
#[derive(Debug, Clone)]
pub struct GPUHandle {
    inner: Arc<Inner>,
}

#[derive(Debug)]
pub struct Inner {
    device: wgpu::Device,
    queue: wgpu::Queue,
    info: wgpu::AdapterInfo,
}

impl std::ops::Deref for GPUHandle {
    type Target = Inner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Higher is better. `None` means the adapter does not qualify.
fn device_score(device_type: DeviceType, allow_cpu: bool) -> Option<i32> {
    match device_type {
        DeviceType::DiscreteGpu => Some(5),
        DeviceType::Other => Some(4), //Other is usually discrete
        DeviceType::IntegratedGpu => Some(3),
        DeviceType::VirtualGpu => Some(2),
        DeviceType::Cpu if allow_cpu => Some(1),
        DeviceType::Cpu => None,
    }
}

/// Picks the index of the best candidate. A name match beats any device type.
fn pick(candidates: &[wgpu::AdapterInfo], preference: &AdapterPreference) -> Option<usize> {
    let wanted = preference.name.as_ref().map(|n| n.to_lowercase());
    candidates
        .iter()
        .enumerate()
        .filter_map(|(i, info)| {
            let score = device_score(info.device_type, preference.allow_cpu)?;
            let named = wanted
                .as_ref()
                .is_some_and(|w| info.name.to_lowercase().contains(w.as_str()));
            Some((i, if named { score + 100 } else { score }))
        })
        // max_by_key keeps the last maximum, reverse so the first one wins on ties
        .rev()
        .max_by_key(|(_, score)| *score)
        .map(|(i, _)| i)
}

impl GPUHandle {
    fn get_features(adapter: &Adapter) -> wgpu::Features {
        let wanted = wgpu::Features::default() | wgpu::Features::TIMESTAMP_QUERY;
        let supported = adapter.features() & wanted;
        if !supported.contains(wgpu::Features::TIMESTAMP_QUERY) {
            log::warn!("Adapter does not support timestamp queries, falling back to host timing");
        }
        supported
    }

    pub async fn new(preference: &AdapterPreference) -> Result<Self> {
        let adapter = Self::select_adapter(preference)?;

        let mut device_descriptor = wgpu::DeviceDescriptor {
            label: Some("matmul-bencher"),
            required_features: Self::get_features(&adapter),
            required_limits: Limits {
                max_buffer_size: (2 << 29) - 1,
                max_storage_buffer_binding_size: (2 << 29) - 1,
                ..Default::default()
            },
        };
        let device_request = adapter.request_device(&device_descriptor, None).await;
        let (device, queue) = match device_request {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("Failed to create device with error: {:?}", e);
                log::warn!("Trying again with reduced limits");
                device_descriptor.required_limits = adapter.limits();
                adapter.request_device(&device_descriptor, None).await?
            }
        };

        Ok(Self {
            inner: Arc::new(Inner {
                device,
                queue,
                info: adapter.get_info(),
            }),
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn info(&self) -> &wgpu::AdapterInfo {
        &self.info
    }

    pub fn supports_timestamps(&self) -> bool {
        self.device
            .features()
            .contains(wgpu::Features::TIMESTAMP_QUERY)
    }

    fn select_adapter(preference: &AdapterPreference) -> Result<Adapter> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::util::backend_bits_from_env().unwrap_or(wgpu::Backends::PRIMARY),
            dx12_shader_compiler: wgpu::util::dx12_shader_compiler_from_env().unwrap_or_default(),
            ..Default::default()
        });
        let backends = wgpu::util::backend_bits_from_env().unwrap_or(wgpu::Backends::PRIMARY);

        let mut adapters = instance.enumerate_adapters(backends);
        if adapters.is_empty() {
            return Err(BenchError::NoPlatform);
        }
        let infos = adapters.iter().map(|a| a.get_info()).collect::<Vec<_>>();
        for info in &infos {
            log::debug!("Found adapter {} ({:?}, {:?})", info.name, info.device_type, info.backend);
        }

        let Some(index) = pick(&infos, preference) else {
            return Err(BenchError::NoQualifyingDevice {
                allow_cpu: preference.allow_cpu,
                preferred: preference.name.clone(),
            });
        };
        let adapter = adapters.swap_remove(index);
        log::info!("Using adapter {:?}", adapter.get_info());
        Ok(adapter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str, device_type: DeviceType) -> wgpu::AdapterInfo {
        wgpu::AdapterInfo {
            name: name.to_string(),
            vendor: 0,
            device: 0,
            device_type,
            driver: String::new(),
            driver_info: String::new(),
            backend: wgpu::Backend::Vulkan,
        }
    }

    #[test]
    pub fn discrete_beats_integrated() {
        let candidates = [
            info("Intel UHD", DeviceType::IntegratedGpu),
            info("Radeon", DeviceType::DiscreteGpu),
        ];
        assert_eq!(pick(&candidates, &AdapterPreference::default()), Some(1));
    }

    #[test]
    pub fn name_preference_wins() {
        let candidates = [
            info("AMD Radeon", DeviceType::DiscreteGpu),
            info("NVIDIA GeForce", DeviceType::IntegratedGpu),
        ];
        let preference = AdapterPreference {
            name: Some("nvidia".into()),
            allow_cpu: false,
        };
        assert_eq!(pick(&candidates, &preference), Some(1));
    }

    #[test]
    pub fn default_prefers_nvidia() {
        let candidates = [
            info("AMD Radeon", DeviceType::DiscreteGpu),
            info("NVIDIA GeForce RTX", DeviceType::DiscreteGpu),
        ];
        assert_eq!(pick(&candidates, &AdapterPreference::default()), Some(1));
    }

    #[test]
    pub fn unknown_name_falls_back_to_device_type() {
        let candidates = [
            info("Intel UHD", DeviceType::IntegratedGpu),
            info("AMD Radeon", DeviceType::DiscreteGpu),
        ];
        let preference = AdapterPreference {
            name: Some("nvidia".into()),
            allow_cpu: false,
        };
        assert_eq!(pick(&candidates, &preference), Some(1));
    }

    #[test]
    pub fn cpu_only_when_allowed() {
        let candidates = [info("llvmpipe", DeviceType::Cpu)];
        assert_eq!(pick(&candidates, &AdapterPreference::default()), None);
        let preference = AdapterPreference {
            name: None,
            allow_cpu: true,
        };
        assert_eq!(pick(&candidates, &preference), Some(0));
    }

    #[test]
    pub fn first_wins_on_ties() {
        let candidates = [
            info("gpu0", DeviceType::DiscreteGpu),
            info("gpu1", DeviceType::DiscreteGpu),
        ];
        assert_eq!(pick(&candidates, &AdapterPreference::default()), Some(0));
    }
}
