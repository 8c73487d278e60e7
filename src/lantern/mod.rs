use std::time::{Duration, Instant};

use nalgebra::{Vector3, Vector4};
use rayon::prelude::*;

use crate::camera::Camera;
use crate::display::FrameView;
use crate::error::{LanternError, Result};
use crate::gpu::{CameraUniform, ComputeBackend, SceneBuffers};
use crate::lantern::scene::Scene;
use crate::util::PixelRng;
use crate::vec4_to_rgba;

pub use hit::{closest_hit, trace_ray, HitPayload};
pub use integrator::{per_pixel, Background, Scatter, TraceSettings, SURFACE_OFFSET};
pub use ray::Ray;

mod hit;
pub mod integrator;
mod ray;
pub mod scene;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    Sequential,
    /// One rayon task per image row
    #[default]
    Parallel,
    /// Delegates sampling to the installed [`ComputeBackend`]
    Accelerated,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    /// When off, every frame replaces the previous one instead of blending with it
    pub accumulate: bool,
    pub mode: RenderMode,
    pub trace: TraceSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            accumulate: true,
            mode: RenderMode::default(),
            trace: TraceSettings::default(),
        }
    }
}

/// Progressive renderer. Owns the display image and the running per-pixel sums.
///
/// `frame_index` is the number of samples the next frame will average over and
/// never drops below 1. When it is 1 the accumulation buffer is cleared before
/// the new samples land.
pub struct Lantern {
    image_data: Vec<u32>,
    accumulation: Vec<Vector3<f32>>,
    samples: Vec<[f32; 4]>,
    width: u32,
    height: u32,
    frame_index: u32,
    settings: Settings,
    backend: Option<Box<dyn ComputeBackend>>,
    last_render_time: Duration,
    last_dispatch_time: Duration,
}

impl Lantern {
    pub fn new(width: u32, height: u32) -> Self {
        let pixels = (width * height) as usize;
        Self {
            image_data: vec![0; pixels],
            accumulation: vec![Vector3::zeros(); pixels],
            samples: Vec::new(),
            width,
            height,
            frame_index: 1,
            settings: Default::default(),
            backend: None,
            last_render_time: Duration::ZERO,
            last_dispatch_time: Duration::ZERO,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }

        log::debug!("renderer resized to {width}x{height}");
        let pixels = (width * height) as usize;
        self.width = width;
        self.height = height;
        self.image_data = vec![0; pixels];
        self.accumulation = vec![Vector3::zeros(); pixels];
        self.samples = Vec::new();
        self.frame_index = 1;
    }

    pub fn reset_frame_index(&mut self) {
        self.frame_index = 1;
    }

    /// Traces one sample per pixel and refreshes the display image.
    pub fn render(&mut self, scene: &Scene, camera: &Camera) -> Result<()> {
        let started = Instant::now();

        scene.validate()?;
        if camera.viewport() != self.viewport() {
            return Err(LanternError::ViewportMismatch {
                camera: camera.viewport(),
                renderer: self.viewport(),
            });
        }

        if self.width == 0 || self.height == 0 {
            self.last_render_time = started.elapsed();
            return Ok(());
        }

        let mode = self.settings.mode;
        let rendered = match mode {
            RenderMode::Sequential => {
                self.clear_if_first_frame();
                let frame = self.frame_context(scene, camera);
                self.accumulation
                    .chunks_mut(self.width as usize)
                    .zip(self.image_data.chunks_mut(self.width as usize))
                    .enumerate()
                    .for_each(|(y, (sums, pixels))| frame.render_row(y as u32, sums, pixels));
                true
            }
            RenderMode::Parallel => {
                self.clear_if_first_frame();
                let frame = self.frame_context(scene, camera);
                self.accumulation
                    .par_chunks_mut(self.width as usize)
                    .zip(self.image_data.par_chunks_mut(self.width as usize))
                    .enumerate()
                    .for_each(|(y, (sums, pixels))| frame.render_row(y as u32, sums, pixels));
                true
            }
            RenderMode::Accelerated => self.render_accelerated(scene, camera)?,
        };

        if rendered {
            if self.settings.accumulate {
                self.frame_index += 1;
            } else {
                self.frame_index = 1;
            }
        }

        self.last_render_time = started.elapsed();
        log::trace!(
            "{mode:?} frame {} rendered in {:?}",
            self.frame_index,
            self.last_render_time
        );
        Ok(())
    }

    fn frame_context<'a>(&self, scene: &'a Scene, camera: &'a Camera) -> Frame<'a> {
        Frame {
            scene,
            camera,
            trace: self.settings.trace,
            width: self.width,
            frame_index: self.frame_index,
        }
    }

    fn clear_if_first_frame(&mut self) {
        if self.frame_index == 1 {
            self.accumulation.fill(Vector3::zeros());
        }
    }

    /// Returns false when the backend failed and the frame should not count.
    fn render_accelerated(&mut self, scene: &Scene, camera: &Camera) -> Result<bool> {
        let Some(backend) = self.backend.as_mut() else {
            return Err(LanternError::NoAcceleratedBackend);
        };

        let uniform = CameraUniform::new(camera, self.frame_index, &self.settings.trace, scene);
        let buffers = SceneBuffers::from_scene(scene);
        self.samples.resize(self.accumulation.len(), [0.0; 4]);

        match backend.dispatch(&uniform, &buffers, &mut self.samples) {
            Ok(elapsed) => self.last_dispatch_time = elapsed,
            Err(error) => {
                log::warn!("{} dispatch failed, keeping previous frame: {error}", backend.name());
                return Ok(false);
            }
        }

        self.clear_if_first_frame();
        let frame_index = self.frame_index;
        self.accumulation
            .par_iter_mut()
            .zip(self.image_data.par_iter_mut())
            .zip(self.samples.par_iter())
            .for_each(|((sum, pixel), sample)| {
                accumulate(sum, pixel, Vector3::new(sample[0], sample[1], sample[2]), frame_index)
            });
        Ok(true)
    }

    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    pub fn image_data(&self) -> &[u32] {
        &self.image_data
    }

    pub fn viewport(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Changing trace settings mid-accumulation blends old and new samples; call
    /// `reset_frame_index` afterwards if that matters.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn set_backend(&mut self, backend: Box<dyn ComputeBackend>) {
        self.backend = Some(backend);
    }

    pub fn last_render_time(&self) -> Duration {
        self.last_render_time
    }

    pub fn last_dispatch_time(&self) -> Duration {
        self.last_dispatch_time
    }

    pub fn frame(&self) -> FrameView<'_> {
        FrameView {
            width: self.width,
            height: self.height,
            pixels: &self.image_data,
        }
    }
}

struct Frame<'a> {
    scene: &'a Scene,
    camera: &'a Camera,
    trace: TraceSettings,
    width: u32,
    frame_index: u32,
}

impl Frame<'_> {
    fn render_row(&self, y: u32, sums: &mut [Vector3<f32>], pixels: &mut [u32]) {
        let origin = self.camera.position();
        for (x, (sum, pixel)) in sums.iter_mut().zip(pixels.iter_mut()).enumerate() {
            let x = x as u32;
            let index = y * self.width + x;

            let mut rng = PixelRng::for_sample(index, self.frame_index);
            let ray = Ray::new(origin, self.camera.ray_direction(x, y));
            let color = per_pixel(self.scene, ray, &self.trace, &mut rng);

            accumulate(sum, pixel, color, self.frame_index);
        }
    }
}

/// Shared tail of every render mode: add, average, clamp, encode.
fn accumulate(sum: &mut Vector3<f32>, pixel: &mut u32, sample: Vector3<f32>, frame_index: u32) {
    *sum += sample;
    let average = *sum / frame_index as f32;
    *pixel = vec4_to_rgba(&Vector4::new(average.x, average.y, average.z, 1.0));
}
