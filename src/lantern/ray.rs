use nalgebra::{Point3, Unit, Vector3};

#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Unit<Vector3<f32>>,
}

impl Ray {
    pub fn new(origin: Point3<f32>, direction: Unit<Vector3<f32>>) -> Self {
        Self { origin, direction }
    }

    #[inline]
    pub fn at(&self, t: f32) -> Point3<f32> {
        self.origin + self.direction.as_ref() * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_at() {
        let ray = Ray::new(Point3::new(1.0, 0.0, 0.0), Vector3::y_axis());

        assert_eq!(ray.at(0.0), Point3::new(1.0, 0.0, 0.0));
        assert_eq!(ray.at(2.5), Point3::new(1.0, 2.5, 0.0));
    }
}
