//! [`GpuBackend`] that uploads representations into real `wgpu` buffers.

use std::collections::HashMap;

use anyhow::Result;
use wgpu::util::DeviceExt;

use crate::geometry::Geometry;
use crate::gpu::backend::{GeometryHandle, GpuBackend, MaterialHandle};
use crate::material::Material;

/// Smallest buffer we hand to wgpu; empty point clouds still get one.
const MIN_BUFFER_SIZE: usize = 16;

struct GpuGeometry {
    vertex_buffer: wgpu::Buffer,
    index_buffer: Option<wgpu::Buffer>,
}

struct GpuMaterial {
    uniform_buffer: wgpu::Buffer,
    size: usize,
}

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    next_id: u64,
    geometries: HashMap<GeometryHandle, GpuGeometry>,
    materials: HashMap<MaterialHandle, GpuMaterial>,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, adapter_name: impl Into<String>) -> Self {
        Self {
            device,
            queue,
            adapter_name: adapter_name.into(),
            next_id: 0,
            geometries: HashMap::new(),
            materials: HashMap::new(),
        }
    }

    /// Request a headless adapter and device.
    pub async fn headless() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None, // Headless
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("No adapter found"))?;

        let info = adapter.get_info();
        log::info!("using adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default(), None)
            .await?;

        Ok(Self::new(device, queue, format!("{} ({:?})", info.name, info.backend)))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn padded(mut bytes: Vec<u8>) -> Vec<u8> {
        if bytes.len() < MIN_BUFFER_SIZE {
            bytes.resize(MIN_BUFFER_SIZE, 0);
        }
        bytes
    }
}

impl GpuBackend for WgpuBackend {
    fn create_geometry(&mut self, geometry: &Geometry) -> GeometryHandle {
        let handle = GeometryHandle(self.next());
        let label = format!("Effect Geometry {}", handle.0);

        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&label),
            contents: &Self::padded(geometry.vertex_bytes()),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = geometry.index_bytes().map(|bytes| {
            self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&label),
                contents: &Self::padded(bytes),
                usage: wgpu::BufferUsages::INDEX,
            })
        });

        self.geometries.insert(
            handle,
            GpuGeometry {
                vertex_buffer,
                index_buffer,
            },
        );
        handle
    }

    fn create_material(&mut self, material: &Material) -> MaterialHandle {
        let handle = MaterialHandle(self.next());
        let bytes = material.uniform_bytes();

        let uniform_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Uniforms", material.name)),
            contents: &bytes,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        self.materials.insert(
            handle,
            GpuMaterial {
                uniform_buffer,
                size: bytes.len(),
            },
        );
        handle
    }

    fn write_uniforms(&mut self, handle: MaterialHandle, material: &Material) {
        let Some(gpu) = self.materials.get(&handle) else {
            log::warn!("uniform write to released material {:?}", handle);
            return;
        };
        let bytes = material.uniform_bytes();
        if bytes.len() != gpu.size {
            log::warn!(
                "uniform layout of '{}' changed ({} -> {} bytes), skipping write",
                material.name,
                gpu.size,
                bytes.len()
            );
            return;
        }
        self.queue.write_buffer(&gpu.uniform_buffer, 0, &bytes);
    }

    fn release_geometry(&mut self, handle: GeometryHandle) -> bool {
        match self.geometries.remove(&handle) {
            Some(gpu) => {
                gpu.vertex_buffer.destroy();
                if let Some(index) = gpu.index_buffer {
                    index.destroy();
                }
                true
            }
            None => {
                log::warn!("release of non-live geometry {:?}", handle);
                false
            }
        }
    }

    fn release_material(&mut self, handle: MaterialHandle) -> bool {
        match self.materials.remove(&handle) {
            Some(gpu) => {
                gpu.uniform_buffer.destroy();
                true
            }
            None => {
                log::warn!("release of non-live material {:?}", handle);
                false
            }
        }
    }

    fn live_resources(&self) -> usize {
        self.geometries.len() + self.materials.len()
    }

    fn describe(&self) -> String {
        format!("wgpu: {}", self.adapter_name)
    }
}
