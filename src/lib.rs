//! Progressive path tracer for scenes made of analytic spheres.

use nalgebra::Vector4;

pub mod camera;
pub mod display;
pub mod error;
pub mod gpu;
pub mod input;
pub mod lantern;
pub mod util;

pub use camera::{Camera, CameraSettings};
pub use error::{BackendError, DisplayError, LanternError, Result};
pub use input::{CursorMode, InputState, Key};
pub use lantern::scene::{Material, Scene, Sphere};
pub use lantern::{Background, Lantern, RenderMode, Scatter, Settings, TraceSettings};

/// Packs a linear color into `0xAABBGGRR`, so the bytes in memory read R, G, B, A.
pub fn vec4_to_rgba(color: &Vector4<f32>) -> u32 {
    let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0) as u32;

    let r = channel(color.x);
    let g = channel(color.y);
    let b = channel(color.z);
    let a = channel(color.w);

    (a << 24) | (b << 16) | (g << 8) | r
}
