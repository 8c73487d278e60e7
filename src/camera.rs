use nalgebra::{Isometry3, Matrix4, Perspective3, Point3, Unit, UnitQuaternion, Vector2, Vector3, Vector4};
use rayon::prelude::*;

use crate::input::{CursorMode, InputState, Key};

const VERTICAL_LIMIT: f32 = 0.999;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSettings {
    /// Vertical field of view in degrees
    pub vertical_fov: f32,
    pub near: f32,
    pub far: f32,
    pub movement_speed: f32,
    pub rotation_speed: f32,
    /// Scale applied to raw pointer deltas (pixels) before rotation
    pub mouse_sensitivity: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            vertical_fov: 45.0,
            near: 0.1,
            far: 1000.0,
            movement_speed: 2.0,
            rotation_speed: 0.3,
            mouse_sensitivity: 0.002,
        }
    }
}

pub struct Camera {
    projection: Matrix4<f32>,
    inverse_projection: Matrix4<f32>,
    view: Matrix4<f32>,
    inverse_view: Matrix4<f32>,

    settings: CameraSettings,

    position: Point3<f32>,
    forward: Unit<Vector3<f32>>,

    rays: Vec<Unit<Vector3<f32>>>,
    last_mouse: Vector2<f32>,

    viewport_width: u32,
    viewport_height: u32,
}

impl Camera {
    pub fn new(vertical_fov: f32, near: f32, far: f32) -> Self {
        Self::with_settings(CameraSettings {
            vertical_fov,
            near,
            far,
            ..Default::default()
        })
    }

    pub fn with_settings(settings: CameraSettings) -> Self {
        let mut camera = Self {
            projection: Matrix4::identity(),
            inverse_projection: Matrix4::identity(),
            view: Matrix4::identity(),
            inverse_view: Matrix4::identity(),
            settings,
            position: Point3::new(0.0, 1.0, 7.0),
            forward: -Vector3::z_axis(),
            rays: vec![],
            last_mouse: Vector2::zeros(),
            viewport_width: 0,
            viewport_height: 0,
        };
        camera.reevaluate_view();
        camera
    }

    pub fn set_position(&mut self, position: Point3<f32>) {
        self.position = position;
        self.reevaluate_view();
        self.reevaluate_rays();
    }

    pub fn set_direction(&mut self, direction: Vector3<f32>) {
        if let Some(forward) = Unit::try_new(direction, f32::EPSILON) {
            self.forward = forward;
            self.reevaluate_view();
            self.reevaluate_rays();
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == self.viewport_width && height == self.viewport_height {
            return;
        }

        log::debug!("camera resize {}x{} -> {}x{}", self.viewport_width, self.viewport_height, width, height);
        self.viewport_width = width;
        self.viewport_height = height;

        self.reevaluate_projection();
        self.reevaluate_rays();
    }

    /// Applies one step of fly-camera input; returns whether the camera moved.
    pub fn update(&mut self, time_step: f32, input: &mut InputState) -> bool {
        let mouse = input.pointer();
        let delta = (mouse - self.last_mouse) * self.settings.mouse_sensitivity;
        self.last_mouse = mouse;

        if !input.is_look_held() {
            input.request_cursor_mode(CursorMode::Normal);
            return false;
        }
        input.request_cursor_mode(CursorMode::Locked);

        let up = Vector3::y_axis();
        let right = Unit::try_new(self.forward.cross(up.as_ref()), f32::EPSILON).unwrap_or(Vector3::x_axis());
        let step = self.movement_speed() * time_step;
        let mut moved = false;

        // opposite keys cancel out to the first one in each pair
        if input.is_key_down(Key::W) {
            self.position += self.forward.scale(step);
            moved = true;
        } else if input.is_key_down(Key::S) {
            self.position -= self.forward.scale(step);
            moved = true;
        }

        if input.is_key_down(Key::A) {
            self.position -= right.scale(step);
            moved = true;
        } else if input.is_key_down(Key::D) {
            self.position += right.scale(step);
            moved = true;
        }

        if input.is_key_down(Key::E) {
            self.position += up.scale(step);
            moved = true;
        } else if input.is_key_down(Key::Q) {
            self.position -= up.scale(step);
            moved = true;
        }

        if delta.x != 0.0 || delta.y != 0.0 {
            let pitch_delta = delta.y * self.rotation_speed();
            let yaw_delta = delta.x * self.rotation_speed();

            // pitch stops short of straight up or down
            let limit = VERTICAL_LIMIT.asin();
            let pitch = self.forward.y.clamp(-1.0, 1.0).asin();
            let pitch_angle = (pitch - pitch_delta).clamp(-limit, limit) - pitch;

            let mut q = UnitQuaternion::from_axis_angle(&right, pitch_angle)
                * UnitQuaternion::from_axis_angle(&up, -yaw_delta);
            q.renormalize_fast();

            self.forward = q * self.forward;
            self.forward.renormalize_fast();
            moved = true;
        }

        if moved {
            self.reevaluate_view();
            self.reevaluate_rays();
        }

        moved
    }

    pub fn rotation_speed(&self) -> f32 {
        self.settings.rotation_speed
    }

    pub fn movement_speed(&self) -> f32 {
        self.settings.movement_speed
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    pub fn projection(&self) -> &Matrix4<f32> {
        &self.projection
    }

    pub fn inverse_projection(&self) -> &Matrix4<f32> {
        &self.inverse_projection
    }

    pub fn view(&self) -> &Matrix4<f32> {
        &self.view
    }

    pub fn inverse_view(&self) -> &Matrix4<f32> {
        &self.inverse_view
    }

    pub fn position(&self) -> Point3<f32> {
        self.position
    }

    pub fn direction(&self) -> Unit<Vector3<f32>> {
        self.forward
    }

    pub fn viewport(&self) -> (u32, u32) {
        (self.viewport_width, self.viewport_height)
    }

    /// Row 0 is the bottom of the image, matching normalized device coordinates.
    pub fn ray_direction(&self, x: u32, y: u32) -> Unit<Vector3<f32>> {
        self.rays[(y * self.viewport_width + x) as usize]
    }

    pub fn ray_directions(&self) -> &[Unit<Vector3<f32>>] {
        &self.rays
    }

    fn reevaluate_projection(&mut self) {
        // an empty viewport has no aspect ratio, keep the last projection
        if self.viewport_width == 0 || self.viewport_height == 0 {
            return;
        }

        let aspect = self.viewport_width as f32 / self.viewport_height as f32;
        let perspective = Perspective3::new(
            aspect,
            self.settings.vertical_fov.to_radians(),
            self.settings.near,
            self.settings.far,
        );
        self.projection = perspective.to_homogeneous();
        self.inverse_projection = perspective.inverse();
    }

    fn reevaluate_view(&mut self) {
        let target = self.position + self.forward.into_inner();
        // look_at_rh breaks down when looking along the up axis
        let up = if self.forward.y.abs() > VERTICAL_LIMIT {
            Vector3::z_axis()
        } else {
            Vector3::y_axis()
        };
        let view = Isometry3::look_at_rh(&self.position, &target, &up);
        self.view = view.to_homogeneous();
        self.inverse_view = view.inverse().to_homogeneous();
    }

    fn reevaluate_rays(&mut self) {
        let width = self.viewport_width;
        let height = self.viewport_height;
        let inverse_projection = self.inverse_projection;
        let inverse_view = self.inverse_view;

        (0..width * height)
            .into_par_iter()
            .map(|index| {
                let x = index % width;
                let y = index / width;

                let coord = Vector2::new(x as f32 / width as f32, y as f32 / height as f32) * 2.0
                    - Vector2::new(1.0, 1.0);

                let target = inverse_projection * Vector4::new(coord.x, coord.y, 1.0, 1.0);
                let direction = (target.xyz() / target.w).normalize();

                Unit::new_normalize((inverse_view * direction.to_homogeneous()).xyz())
            })
            .collect_into_vec(&mut self.rays);
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::with_settings(CameraSettings::default())
    }
}
