use std::mem::size_of;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use wgpu::util::{BufferInitDescriptor, DeviceExt};
use wgpu::{
    Adapter, BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingType, Buffer, BufferBindingType, BufferDescriptor, BufferUsages,
    CommandEncoderDescriptor, ComputePassDescriptor, ComputePipeline, ComputePipelineDescriptor, Device,
    DeviceDescriptor, Dx12Compiler, Features, Instance, InstanceDescriptor, Limits, Maintain, MapMode,
    PipelineLayoutDescriptor, PowerPreference, Queue, RequestAdapterOptions, ShaderModuleDescriptor,
    ShaderSource, ShaderStages,
};

use crate::error::BackendError;
use crate::gpu::{CameraUniform, ComputeBackend, SceneBuffers};

const PATH_TRACE_WGSL: &str = include_str!("../shaders/path_trace.wgsl");

/// Must match `@workgroup_size` in the kernel.
const WORKGROUP_SIZE: u32 = 8;

const PIXEL_STRIDE: u64 = size_of::<[f32; 4]>() as u64;

pub struct WgpuBackend {
    context: GpuContext,
    adapter_name: String,
    buffers: Option<FrameBuffers>,
}

struct GpuContext {
    device: Device,
    queue: Queue,
    pipeline: ComputePipeline,
    bind_group_layout: BindGroupLayout,
}

struct FrameBuffers {
    camera: Buffer,
    spheres: Buffer,
    materials: Buffer,
    output: Buffer,
    staging: Buffer,
    bind_group: BindGroup,
}

impl WgpuBackend {
    pub fn new() -> Result<Self, BackendError> {
        pollster::block_on(Self::new_async())
    }

    async fn new_async() -> Result<Self, BackendError> {
        let instance = Instance::new(InstanceDescriptor {
            backends: wgpu::Backends::all(),
            dx12_shader_compiler: Dx12Compiler::default(),
        });

        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or(BackendError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    label: Some("Lantern Compute Device"),
                    features: Features::empty(),
                    limits: Limits::default(),
                },
                None,
            )
            .await?;

        Ok(Self::with_device(&adapter, device, queue))
    }

    fn with_device(adapter: &Adapter, device: Device, queue: Queue) -> Self {
        let adapter_name = adapter.get_info().name;
        log::info!("compute backend using adapter {adapter_name}");

        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Lantern Path Trace Kernel"),
            source: ShaderSource::Wgsl(PATH_TRACE_WGSL.into()),
        });

        let storage = |binding, read_only| BindGroupLayoutEntry {
            binding,
            visibility: ShaderStages::COMPUTE,
            ty: BindingType::Buffer {
                ty: BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Lantern Bind Group Layout"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage(1, true),
                storage(2, true),
                storage(3, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Lantern Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("Lantern Path Trace Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "main",
        });

        Self {
            context: GpuContext {
                device,
                queue,
                pipeline,
                bind_group_layout,
            },
            adapter_name,
            buffers: None,
        }
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }
}

impl GpuContext {
    fn upload<'a>(
        &self,
        slot: &'a mut Option<FrameBuffers>,
        camera: &CameraUniform,
        scene: &SceneBuffers,
    ) -> &'a FrameBuffers {
        let spheres = scene.sphere_bytes();
        let materials = scene.material_bytes();
        let output_size = camera.pixel_count() as u64 * PIXEL_STRIDE;

        let reusable = slot.as_ref().is_some_and(|buffers| {
            buffers.spheres.size() == spheres.len() as u64
                && buffers.materials.size() == materials.len() as u64
                && buffers.output.size() == output_size
        });

        if reusable {
            if let Some(buffers) = slot.as_ref() {
                self.queue.write_buffer(&buffers.camera, 0, bytemuck::bytes_of(camera));
                self.queue.write_buffer(&buffers.spheres, 0, spheres);
                self.queue.write_buffer(&buffers.materials, 0, materials);
            }
        } else {
            log::debug!(
                "reallocating compute buffers for {} pixels, {} spheres",
                camera.pixel_count(),
                scene.spheres.len()
            );
            *slot = None;
        }

        slot.get_or_insert_with(|| {
            let camera = self.device.create_buffer_init(&BufferInitDescriptor {
                label: Some("Lantern Camera"),
                contents: bytemuck::bytes_of(camera),
                usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            });
            let spheres = self.device.create_buffer_init(&BufferInitDescriptor {
                label: Some("Lantern Spheres"),
                contents: spheres,
                usage: BufferUsages::STORAGE | BufferUsages::COPY_DST,
            });
            let materials = self.device.create_buffer_init(&BufferInitDescriptor {
                label: Some("Lantern Materials"),
                contents: materials,
                usage: BufferUsages::STORAGE | BufferUsages::COPY_DST,
            });
            let output = self.device.create_buffer(&BufferDescriptor {
                label: Some("Lantern Samples"),
                size: output_size,
                usage: BufferUsages::STORAGE | BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            });
            let staging = self.device.create_buffer(&BufferDescriptor {
                label: Some("Lantern Readback"),
                size: output_size,
                usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });

            let bind_group = self.device.create_bind_group(&BindGroupDescriptor {
                label: Some("Lantern Bind Group"),
                layout: &self.bind_group_layout,
                entries: &[
                    BindGroupEntry {
                        binding: 0,
                        resource: camera.as_entire_binding(),
                    },
                    BindGroupEntry {
                        binding: 1,
                        resource: spheres.as_entire_binding(),
                    },
                    BindGroupEntry {
                        binding: 2,
                        resource: materials.as_entire_binding(),
                    },
                    BindGroupEntry {
                        binding: 3,
                        resource: output.as_entire_binding(),
                    },
                ],
            });

            FrameBuffers {
                camera,
                spheres,
                materials,
                output,
                staging,
                bind_group,
            }
        })
    }
}

impl ComputeBackend for WgpuBackend {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn dispatch(
        &mut self,
        camera: &CameraUniform,
        scene: &SceneBuffers,
        output: &mut [[f32; 4]],
    ) -> Result<Duration, BackendError> {
        let expected = camera.pixel_count();
        if output.len() != expected {
            return Err(BackendError::OutputSize {
                expected,
                actual: output.len(),
            });
        }
        if expected == 0 {
            return Ok(Duration::ZERO);
        }

        let started = Instant::now();
        let [width, height, ..] = camera.viewport;

        let context = &self.context;
        let buffers = context.upload(&mut self.buffers, camera, scene);

        let mut encoder = context.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("Lantern Compute Encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some("Lantern Path Trace Pass"),
            });
            pass.set_pipeline(&context.pipeline);
            pass.set_bind_group(0, &buffers.bind_group, &[]);
            pass.dispatch_workgroups(
                (width + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE,
                (height + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE,
                1,
            );
        }
        encoder.copy_buffer_to_buffer(&buffers.output, 0, &buffers.staging, 0, buffers.output.size());
        context.queue.submit(Some(encoder.finish()));

        let slice = buffers.staging.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        context.device.poll(Maintain::Wait);
        receiver.recv().map_err(|_| BackendError::ChannelClosed)??;

        {
            let mapped = slice.get_mapped_range();
            let samples: &[[f32; 4]] = bytemuck::cast_slice(&mapped);
            output.copy_from_slice(&samples[..expected]);
        }
        buffers.staging.unmap();

        Ok(started.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::lantern::scene::Scene;
    use crate::lantern::TraceSettings;

    #[test]
    fn test_output_size_is_checked() {
        // no adapter on headless machines, nothing to check there
        let Ok(mut backend) = WgpuBackend::new() else {
            return;
        };

        let mut camera = Camera::default();
        camera.resize(4, 4);
        let scene = Scene::demo();
        let uniform = CameraUniform::new(&camera, 1, &TraceSettings::default(), &scene);
        let buffers = SceneBuffers::from_scene(&scene);

        let mut short = vec![[0.0; 4]; 3];
        assert!(matches!(
            backend.dispatch(&uniform, &buffers, &mut short),
            Err(BackendError::OutputSize { expected: 16, actual: 3 })
        ));

        let mut output = vec![[-1.0; 4]; 16];
        backend.dispatch(&uniform, &buffers, &mut output).unwrap();
        assert!(output.iter().all(|sample| sample.iter().all(|c| c.is_finite() && *c >= 0.0)));
    }
}
