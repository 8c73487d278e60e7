//! Interactive window around the renderer.
//!
//! Hold the right mouse button to look around, WASD to move, Q/E for down/up.
//! R restarts accumulation, M cycles the render mode, Esc quits.

use std::iter;
use std::sync::Arc;
use std::time::Instant;

use lantern::display::{Present, TextureTarget};
use lantern::gpu::WgpuBackend;
use lantern::{Camera, CursorMode, InputState, Lantern, RenderMode, Scene};
use nalgebra::{Point3, Vector3};
use wgpu::{
    BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry,
    BindingResource, BindingType, Color, ColorTargetState, ColorWrites, CommandEncoderDescriptor,
    CompositeAlphaMode, Device, DeviceDescriptor, Dx12Compiler, Features, FragmentState, Instance,
    InstanceDescriptor, Limits, LoadOp, MultisampleState, Operations, PipelineLayoutDescriptor,
    PowerPreference, PresentMode, PrimitiveState, Queue, RenderPassColorAttachment, RenderPassDescriptor,
    RenderPipeline, RenderPipelineDescriptor, RequestAdapterOptions, SamplerBindingType, ShaderModuleDescriptor,
    ShaderSource, ShaderStages, Surface, SurfaceConfiguration, SurfaceError, TextureSampleType, TextureUsages,
    TextureViewDescriptor, TextureViewDimension, VertexState,
};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Window, WindowBuilder};

const BLIT_WGSL: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@group(0) @binding(0) var frame_texture: texture_2d<f32>;
@group(0) @binding(1) var frame_sampler: sampler;

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOutput {
    let x = f32((index << 1u) & 2u);
    let y = f32(index & 2u);
    var out: VertexOutput;
    out.position = vec4<f32>(x * 2.0 - 1.0, y * 2.0 - 1.0, 0.0, 1.0);
    // texture row 0 is the bottom of the frame
    out.uv = vec2<f32>(x, y);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(frame_texture, frame_sampler, in.uv);
}
"#;

// fields drop in order, so the surface goes before the window it draws to
struct Viewer {
    surface: Surface,
    window: Window,
    device: Arc<Device>,
    queue: Arc<Queue>,
    config: SurfaceConfiguration,
    target: TextureTarget,
    blit: RenderPipeline,
    blit_layout: BindGroupLayout,
}

impl Viewer {
    async fn new(window: Window) -> Self {
        let size = window.inner_size();

        let instance = Instance::new(InstanceDescriptor {
            backends: wgpu::Backends::all(),
            dx12_shader_compiler: Dx12Compiler::default(),
        });

        let surface = unsafe { instance.create_surface(&window) }.expect("failed to create surface");

        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: PowerPreference::default(),
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            })
            .await
            .expect("no adapter for this window");

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    label: Some("Lantern Viewer"),
                    features: Features::empty(),
                    limits: Limits::default(),
                },
                None,
            )
            .await
            .expect("failed to acquire device");
        let device = Arc::new(device);
        let queue = Arc::new(queue);

        // frames carry display values already, so skip the sRGB encode on write
        let capabilities = surface.get_capabilities(&adapter);
        let surface_format = capabilities
            .formats
            .iter()
            .find(|format| !format.is_srgb())
            .copied()
            .unwrap_or(capabilities.formats[0]);
        let config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: PresentMode::AutoVsync,
            alpha_mode: CompositeAlphaMode::Auto,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let blit_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Blit Bind Group Layout"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        multisampled: false,
                        view_dimension: TextureViewDimension::D2,
                        sample_type: TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Blit Shader"),
            source: ShaderSource::Wgsl(BLIT_WGSL.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Blit Pipeline Layout"),
            bind_group_layouts: &[&blit_layout],
            push_constant_ranges: &[],
        });
        let blit = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Blit Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[],
            },
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(ColorTargetState {
                    format: surface_format,
                    blend: None,
                    write_mask: ColorWrites::ALL,
                })],
            }),
            primitive: PrimitiveState::default(),
            depth_stencil: None,
            multisample: MultisampleState::default(),
            multiview: None,
        });

        let target = TextureTarget::new(device.clone(), queue.clone(), size.width, size.height, "Lantern Output");

        Self {
            surface,
            window,
            device,
            queue,
            config,
            target,
            blit,
            blit_layout,
        }
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
    }

    fn draw(&mut self) -> Result<(), SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&TextureViewDescriptor::default());

        // the target texture may have been recreated, so bind it fresh each frame
        let bind_group = self.device.create_bind_group(&BindGroupDescriptor {
            label: Some("Blit Bind Group"),
            layout: &self.blit_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(self.target.view()),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Sampler(self.target.sampler()),
                },
            ],
        });

        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("Blit Encoder"),
        });
        {
            let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("Blit Pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(Color::BLACK),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });
            render_pass.set_pipeline(&self.blit);
            render_pass.set_bind_group(0, &bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }

        self.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

fn next_mode(mode: RenderMode, has_backend: bool) -> RenderMode {
    match mode {
        RenderMode::Sequential => RenderMode::Parallel,
        RenderMode::Parallel if has_backend => RenderMode::Accelerated,
        _ => RenderMode::Sequential,
    }
}

fn main() {
    env_logger::init();

    let event_loop = EventLoop::new();
    let window = WindowBuilder::new()
        .with_title("Lantern")
        .with_inner_size(PhysicalSize::new(960, 540))
        .build(&event_loop)
        .expect("failed to open window");
    let mut viewer = pollster::block_on(Viewer::new(window));

    let scene = Scene::demo();
    let mut camera = Camera::default();
    camera.set_position(Point3::new(4.0, 2.0, 3.0));
    camera.set_direction(Vector3::new(-0.6, -0.2, -0.8));

    let size = viewer.window.inner_size();
    camera.resize(size.width, size.height);
    let mut lantern = Lantern::new(size.width, size.height);

    let has_backend = match WgpuBackend::new() {
        Ok(backend) => {
            log::info!("accelerated mode available on {}", backend.adapter_name());
            lantern.set_backend(Box::new(backend));
            true
        }
        Err(error) => {
            log::warn!("accelerated mode unavailable: {error}");
            false
        }
    };

    let mut input = InputState::default();
    let mut cursor = CursorMode::Normal;
    let mut last_frame = Instant::now();

    event_loop.run(move |event, _, control_flow| match event {
        Event::WindowEvent { ref event, window_id } if window_id == viewer.window.id() => {
            if input.handle_event(event) {
                return;
            }

            match event {
                WindowEvent::CloseRequested
                | WindowEvent::KeyboardInput {
                    input:
                        KeyboardInput {
                            state: ElementState::Pressed,
                            virtual_keycode: Some(VirtualKeyCode::Escape),
                            ..
                        },
                    ..
                } => *control_flow = ControlFlow::Exit,
                WindowEvent::KeyboardInput {
                    input:
                        KeyboardInput {
                            state: ElementState::Pressed,
                            virtual_keycode: Some(key),
                            ..
                        },
                    ..
                } => match key {
                    VirtualKeyCode::R => lantern.reset_frame_index(),
                    VirtualKeyCode::M => {
                        let settings = lantern.settings_mut();
                        settings.mode = next_mode(settings.mode, has_backend);
                        log::info!("render mode {:?}", settings.mode);
                    }
                    _ => {}
                },
                WindowEvent::Resized(size) => viewer.resize(*size),
                WindowEvent::ScaleFactorChanged { new_inner_size, .. } => viewer.resize(**new_inner_size),
                _ => {}
            }
        }
        Event::RedrawRequested(window_id) if window_id == viewer.window.id() => {
            let time_step = last_frame.elapsed().as_secs_f32();
            last_frame = Instant::now();

            if camera.update(time_step, &mut input) {
                lantern.reset_frame_index();
            }
            if input.cursor_mode() != cursor {
                cursor = input.cursor_mode();
                cursor.apply(&viewer.window);
            }

            let size = viewer.window.inner_size();
            camera.resize(size.width, size.height);
            lantern.resize(size.width, size.height);

            if let Err(error) = lantern.render(&scene, &camera) {
                log::error!("render failed: {error}");
                *control_flow = ControlFlow::Exit;
                return;
            }
            if let Err(error) = viewer.target.present(&lantern.frame()) {
                log::error!("upload failed: {error}");
            }

            match viewer.draw() {
                Ok(()) => {}
                Err(SurfaceError::Lost) => viewer.resize(viewer.window.inner_size()),
                Err(SurfaceError::OutOfMemory) => *control_flow = ControlFlow::Exit,
                Err(error) => log::warn!("{error:?}"),
            }

            viewer.window.set_title(&format!(
                "Lantern - {:.1} ms, {} frames",
                lantern.last_render_time().as_secs_f64() * 1000.0,
                lantern.frame_index() - 1
            ));
        }
        Event::MainEventsCleared => viewer.window.request_redraw(),
        _ => {}
    });
}
