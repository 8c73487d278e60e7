//! Accelerated backend: the integrator as a compute kernel.

mod layout;
mod wgpu_backend;

use std::time::Duration;

pub use layout::{CameraUniform, GpuMaterial, GpuSphere, SceneBuffers, FLAG_SKY_GRADIENT, FLAG_SPECULAR};
pub use wgpu_backend::WgpuBackend;

use crate::error::BackendError;

pub trait ComputeBackend: Send {
    fn name(&self) -> &str;

    /// Traces one sample per pixel into `output` (row-major, `width * height` long).
    ///
    /// Returns how long the dispatch took. On error `output` must be left untouched.
    fn dispatch(
        &mut self,
        camera: &CameraUniform,
        scene: &SceneBuffers,
        output: &mut [[f32; 4]],
    ) -> Result<Duration, BackendError>;
}
