use nalgebra::{Point3, Unit, Vector3};

use crate::lantern::ray::Ray;
use crate::lantern::scene::Scene;

// HitPayload only records where the path went; shading happens later in per_pixel
#[derive(Debug, Clone, Copy)]
pub struct HitPayload {
    pub distance: f32,
    pub position: Point3<f32>,
    pub normal: Unit<Vector3<f32>>,
    pub object_index: usize,
}

/// Nearest sphere hit in front of the ray origin, `None` on a miss.
///
/// Only the near root of the quadratic is considered, so a ray starting inside
/// a sphere does not see that sphere. Ties go to the sphere listed first.
pub fn trace_ray(ray: &Ray, scene: &Scene) -> Option<HitPayload> {
    // a = direction . direction
    // b = 2 * (origin - center) . direction
    // c = (origin - center) . (origin - center) - r^2
    // the sphere is moved to the world origin by shifting the ray origin instead
    let first = ray.direction.magnitude_squared();
    if !(first > f32::EPSILON) {
        return None;
    }

    let mut closest: Option<(usize, f32)> = None;
    for (index, sphere) in scene.spheres.iter().enumerate() {
        if !(sphere.radius > 0.0) {
            continue;
        }

        let origin = ray.origin - sphere.position;

        let second = 2.0 * origin.coords.dot(ray.direction.as_ref());
        let third = origin.coords.magnitude_squared() - sphere.radius.powi(2);

        let discriminant = second.powi(2) - 4.0 * first * third;
        if discriminant < 0.0 {
            continue;
        }

        let distance = (-second - discriminant.sqrt()) / (2.0 * first);
        if distance <= 0.0 {
            continue;
        }

        match closest {
            Some((_, previous)) if previous <= distance => {}
            _ => closest = Some((index, distance)),
        }
    }

    closest.and_then(|(index, distance)| closest_hit(ray, distance, scene, index))
}

pub fn closest_hit(ray: &Ray, distance: f32, scene: &Scene, object_index: usize) -> Option<HitPayload> {
    let sphere = scene.spheres.get(object_index)?;

    let position = ray.at(distance);
    let normal = Unit::try_new(position.coords - sphere.position, f32::EPSILON)?;

    Some(HitPayload {
        distance,
        position,
        normal,
        object_index,
    })
}
