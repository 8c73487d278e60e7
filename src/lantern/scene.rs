use nalgebra::Vector3;

use crate::error::{LanternError, Result};

/// Spheres reference materials by index into `Scene::materials`.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub spheres: Vec<Sphere>,
    pub materials: Vec<Material>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sphere {
    pub position: Vector3<f32>,
    pub radius: f32,
    pub material_index: usize,
}

impl Default for Sphere {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            radius: 1.0,
            material_index: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub albedo: Vector3<f32>,
    /// 0 is a perfect mirror, 1 fully perturbs the bounce direction
    pub roughness: f32,
    pub emission: Vector3<f32>,
    pub emission_power: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: Vector3::new(1.0, 1.0, 1.0),
            roughness: 0.0,
            emission: Vector3::new(1.0, 1.0, 1.0),
            emission_power: 0.0,
        }
    }
}

impl Material {
    pub fn emitted(&self) -> Vector3<f32> {
        self.emission * self.emission_power
    }
}

impl Scene {
    pub fn validate(&self) -> Result<()> {
        let count = self.materials.len();
        match self
            .spheres
            .iter()
            .enumerate()
            .find(|(_, sphere)| sphere.material_index >= count)
        {
            Some((sphere, invalid)) => Err(LanternError::MaterialOutOfRange {
                sphere,
                index: invalid.material_index,
                count,
            }),
            None => Ok(()),
        }
    }

    pub fn material_for(&self, sphere_index: usize) -> Result<&Material> {
        let sphere = self.spheres.get(sphere_index).ok_or(LanternError::SphereOutOfRange {
            sphere: sphere_index,
            count: self.spheres.len(),
        })?;
        self.materials
            .get(sphere.material_index)
            .ok_or(LanternError::MaterialOutOfRange {
                sphere: sphere_index,
                index: sphere.material_index,
                count: self.materials.len(),
            })
    }

    pub fn demo() -> Self {
        let materials = vec![
            Material {
                albedo: Vector3::new(0.2, 1.0, 0.2),
                roughness: 0.05,
                ..Default::default()
            },
            Material {
                albedo: Vector3::new(0.2, 0.6, 0.8),
                roughness: 0.1,
                ..Default::default()
            },
            Material {
                albedo: Vector3::zeros(),
                roughness: 0.01,
                emission: Vector3::new(0.7, 0.2, 0.0),
                emission_power: 5.0,
            },
        ];

        let spheres = vec![
            Sphere {
                position: Vector3::new(0.0, 1.0, 0.0),
                radius: 1.0,
                material_index: 0,
            },
            Sphere {
                position: Vector3::new(0.0, -50.0, 0.0),
                radius: 50.0,
                material_index: 1,
            },
            Sphere {
                position: Vector3::new(0.0, 5.0, -30.0),
                radius: 10.0,
                material_index: 2,
            },
        ];

        Self { spheres, materials }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_scene_is_valid() {
        let scene = Scene::demo();
        assert_eq!(scene.spheres.len(), 3);
        assert!(scene.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_dangling_material() {
        let scene = Scene {
            spheres: vec![
                Sphere::default(),
                Sphere {
                    material_index: 4,
                    ..Default::default()
                },
            ],
            materials: vec![Material::default()],
        };

        match scene.validate() {
            Err(LanternError::MaterialOutOfRange {
                sphere,
                index,
                count,
            }) => {
                assert_eq!(sphere, 1);
                assert_eq!(index, 4);
                assert_eq!(count, 1);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(scene.material_for(0).is_ok());
        assert!(scene.material_for(1).is_err());
    }

    #[test]
    fn test_material_for_missing_sphere() {
        let scene = Scene::demo();
        assert!(matches!(
            scene.material_for(3),
            Err(LanternError::SphereOutOfRange { sphere: 3, count: 3 })
        ));
        assert!(Scene::default().material_for(0).is_err());
    }

    #[test]
    fn test_emitted_scales_with_power() {
        let material = Material {
            emission: Vector3::new(0.5, 1.0, 0.0),
            emission_power: 4.0,
            ..Default::default()
        };
        assert_eq!(material.emitted(), Vector3::new(2.0, 4.0, 0.0));
        assert_eq!(Material::default().emitted(), Vector3::zeros());
    }
}
