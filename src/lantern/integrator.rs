use nalgebra::{Reflection3, Unit, Vector3};
use rand::Rng;

use crate::lantern::hit::{trace_ray, HitPayload};
use crate::lantern::ray::Ray;
use crate::lantern::scene::Scene;
use crate::util::{random_unit_vector, random_vec};

/// Offset along the normal for the next ray origin, keeps it off the surface it just left.
pub const SURFACE_OFFSET: f32 = 0.0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Background {
    /// Paths that escape contribute nothing.
    #[default]
    Black,
    /// White at the horizon blending to light blue straight up.
    SkyGradient,
}

impl Background {
    pub fn sample(&self, direction: &Unit<Vector3<f32>>) -> Vector3<f32> {
        match self {
            Background::Black => Vector3::zeros(),
            Background::SkyGradient => {
                let a = 0.5 * (direction.y + 1.0);
                Vector3::new(1.0, 1.0, 1.0) * (1.0 - a) + Vector3::new(0.5, 0.7, 1.0) * a
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scatter {
    /// Normal plus a roughness-scaled random unit vector. Cosine-weighted at roughness 1.
    #[default]
    Diffuse,
    /// Mirror reflection about a normal jittered by roughness.
    Specular,
}

impl Scatter {
    pub fn bounce<R: Rng + ?Sized>(
        &self,
        incoming: &Unit<Vector3<f32>>,
        normal: &Unit<Vector3<f32>>,
        roughness: f32,
        rng: &mut R,
    ) -> Unit<Vector3<f32>> {
        match self {
            Scatter::Diffuse => {
                let direction = normal.as_ref() + random_unit_vector(rng) * roughness;
                Unit::try_new(direction, 1e-6).unwrap_or(*normal)
            }
            Scatter::Specular => {
                let jitter = random_vec(-0.5f32..0.5, rng) * roughness;
                let axis = Unit::try_new(normal.as_ref() + jitter, 1e-6).unwrap_or(*normal);

                let mut direction = incoming.into_inner();
                Reflection3::new(axis, 0.0).reflect(&mut direction);
                Unit::try_new(direction, 1e-6).unwrap_or(*normal)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceSettings {
    pub bounces: u32,
    pub background: Background,
    pub scatter: Scatter,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            bounces: 10,
            background: Background::default(),
            scatter: Scatter::default(),
        }
    }
}

/// Same role as a DirectX RayGen shader: one linear-light sample for one camera ray.
pub fn per_pixel<R: Rng + ?Sized>(
    scene: &Scene,
    mut ray: Ray,
    settings: &TraceSettings,
    rng: &mut R,
) -> Vector3<f32> {
    let mut light = Vector3::zeros();
    let mut throughput = Vector3::new(1.0, 1.0, 1.0);

    for _ in 0..settings.bounces {
        let Some(HitPayload { position, normal, object_index, .. }) = trace_ray(&ray, scene) else {
            light += throughput.component_mul(&settings.background.sample(&ray.direction));
            break;
        };

        // material indices are checked by Scene::validate before a frame starts
        let Ok(material) = scene.material_for(object_index) else {
            break;
        };

        light += throughput.component_mul(&material.emitted());
        throughput.component_mul_assign(&material.albedo);

        ray.origin = position + normal.as_ref() * SURFACE_OFFSET;
        ray.direction = settings
            .scatter
            .bounce(&ray.direction, &normal, material.roughness, rng);
    }

    light
}
