use bytemuck::{Pod, Zeroable};
use nalgebra::Matrix4;

use crate::camera::Camera;
use crate::lantern::integrator::{Background, Scatter, TraceSettings};
use crate::lantern::scene::{Material, Scene, Sphere};

pub const FLAG_SKY_GRADIENT: u32 = 1;
pub const FLAG_SPECULAR: u32 = 1 << 1;

/// Matches `struct Camera` in path_trace.wgsl. Matrices are column-major.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraUniform {
    pub view: [[f32; 4]; 4],
    pub inverse_view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub inverse_projection: [[f32; 4]; 4],
    /// xyz = camera position, w = frame index
    pub position: [f32; 4],
    pub direction: [f32; 4],
    /// width, height, bounces, flags
    pub viewport: [u32; 4],
    /// sphere count, material count
    pub counts: [u32; 4],
}

impl CameraUniform {
    pub fn new(camera: &Camera, frame_index: u32, settings: &TraceSettings, scene: &Scene) -> Self {
        let position = camera.position();
        let direction = camera.direction();
        let (width, height) = camera.viewport();

        let mut flags = 0;
        if settings.background == Background::SkyGradient {
            flags |= FLAG_SKY_GRADIENT;
        }
        if settings.scatter == Scatter::Specular {
            flags |= FLAG_SPECULAR;
        }

        Self {
            view: columns(camera.view()),
            inverse_view: columns(camera.inverse_view()),
            projection: columns(camera.projection()),
            inverse_projection: columns(camera.inverse_projection()),
            position: [position.x, position.y, position.z, frame_index as f32],
            direction: [direction.x, direction.y, direction.z, 0.0],
            viewport: [width, height, settings.bounces, flags],
            counts: [scene.spheres.len() as u32, scene.materials.len() as u32, 0, 0],
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.viewport[0] as usize * self.viewport[1] as usize
    }
}

fn columns(matrix: &Matrix4<f32>) -> [[f32; 4]; 4] {
    let mut out = [[0.0; 4]; 4];
    for (c, column) in out.iter_mut().enumerate() {
        for (r, value) in column.iter_mut().enumerate() {
            *value = matrix[(r, c)];
        }
    }
    out
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GpuSphere {
    pub position: [f32; 3],
    pub radius: f32,
    pub material_index: u32,
    pub _padding: [u32; 3],
}

impl From<&Sphere> for GpuSphere {
    fn from(sphere: &Sphere) -> Self {
        Self {
            position: sphere.position.into(),
            radius: sphere.radius,
            material_index: sphere.material_index as u32,
            _padding: [0; 3],
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GpuMaterial {
    pub albedo: [f32; 3],
    pub roughness: f32,
    pub emission: [f32; 3],
    pub emission_power: f32,
}

impl From<&Material> for GpuMaterial {
    fn from(material: &Material) -> Self {
        Self {
            albedo: material.albedo.into(),
            roughness: material.roughness,
            emission: material.emission.into(),
            emission_power: material.emission_power,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SceneBuffers {
    pub spheres: Vec<GpuSphere>,
    pub materials: Vec<GpuMaterial>,
}

impl SceneBuffers {
    pub fn from_scene(scene: &Scene) -> Self {
        Self {
            spheres: scene.spheres.iter().map(GpuSphere::from).collect(),
            materials: scene.materials.iter().map(GpuMaterial::from).collect(),
        }
    }

    /// Storage bindings cannot be empty, so an empty list uploads one zeroed element.
    pub fn sphere_bytes(&self) -> &[u8] {
        padded_bytes(&self.spheres, &PLACEHOLDER_SPHERE)
    }

    pub fn material_bytes(&self) -> &[u8] {
        padded_bytes(&self.materials, &PLACEHOLDER_MATERIAL)
    }
}

static PLACEHOLDER_SPHERE: [GpuSphere; 1] = [GpuSphere {
    position: [0.0; 3],
    radius: 0.0,
    material_index: 0,
    _padding: [0; 3],
}];

static PLACEHOLDER_MATERIAL: [GpuMaterial; 1] = [GpuMaterial {
    albedo: [0.0; 3],
    roughness: 0.0,
    emission: [0.0; 3],
    emission_power: 0.0,
}];

fn padded_bytes<'a, T: Pod>(items: &'a [T], placeholder: &'a [T; 1]) -> &'a [u8] {
    if items.is_empty() {
        bytemuck::cast_slice(&placeholder[..])
    } else {
        bytemuck::cast_slice(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;
    use std::mem::size_of;

    #[test]
    fn test_layout_sizes_match_wgsl() {
        assert_eq!(size_of::<GpuSphere>(), 32);
        assert_eq!(size_of::<GpuMaterial>(), 32);
        assert_eq!(size_of::<CameraUniform>(), 320);
        assert_eq!(size_of::<CameraUniform>() % 16, 0);
    }

    #[test]
    fn test_camera_uniform_packing() {
        let mut camera = Camera::default();
        camera.resize(20, 10);
        camera.set_position(Point3::new(1.0, 2.0, 3.0));

        let scene = Scene::demo();
        let settings = TraceSettings {
            bounces: 4,
            background: Background::SkyGradient,
            scatter: Scatter::Specular,
        };
        let uniform = CameraUniform::new(&camera, 7, &settings, &scene);

        assert_eq!(uniform.position, [1.0, 2.0, 3.0, 7.0]);
        assert_eq!(uniform.viewport, [20, 10, 4, FLAG_SKY_GRADIENT | FLAG_SPECULAR]);
        assert_eq!(uniform.counts[..2], [3, 3]);
        assert_eq!(uniform.pixel_count(), 200);
        // translation lives in the last column
        let inverse_view = camera.inverse_view();
        assert_eq!(uniform.inverse_view[3][0], inverse_view[(0, 3)]);
        assert!((uniform.inverse_view[3][2] - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_scene_buffers() {
        let scene = Scene::demo();
        let buffers = SceneBuffers::from_scene(&scene);
        assert_eq!(buffers.spheres.len(), 3);
        assert_eq!(buffers.spheres[1].radius, 50.0);
        assert_eq!(buffers.spheres[2].material_index, 2);
        assert_eq!(buffers.materials[2].emission_power, 5.0);
        assert_eq!(buffers.sphere_bytes().len(), 3 * 32);

        let empty = SceneBuffers::from_scene(&Scene::default());
        assert_eq!(empty.sphere_bytes().len(), 32);
        assert_eq!(empty.material_bytes().len(), 32);
    }
}
