use std::time::Duration;

use lantern::gpu::{CameraUniform, ComputeBackend, SceneBuffers, WgpuBackend};
use lantern::{
    Background, BackendError, Camera, InputState, Key, Lantern, Material, RenderMode, Scene, Sphere,
};
use nalgebra::{Point3, Vector3};

const OPAQUE_BLACK: u32 = 0xFF000000;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn viewport(width: u32, height: u32) -> (Lantern, Camera) {
    let mut camera = Camera::default();
    camera.resize(width, height);
    (Lantern::new(width, height), camera)
}

fn channel(pixel: u32, shift: u32) -> u32 {
    (pixel >> shift) & 0xFF
}

/// Fills every pixel with `frame_index / 10` in the red channel.
struct FrameRamp;

impl ComputeBackend for FrameRamp {
    fn name(&self) -> &str {
        "ramp"
    }

    fn dispatch(
        &mut self,
        camera: &CameraUniform,
        _scene: &SceneBuffers,
        output: &mut [[f32; 4]],
    ) -> Result<Duration, BackendError> {
        let value = camera.position[3] / 10.0;
        output.fill([value, 0.0, 0.0, 1.0]);
        Ok(Duration::from_micros(10))
    }
}

fn emitter_filling_view() -> Scene {
    Scene {
        spheres: vec![Sphere {
            position: Vector3::new(0.0, 0.0, -100.0),
            radius: 90.0,
            material_index: 0,
        }],
        materials: vec![Material {
            albedo: Vector3::zeros(),
            emission: Vector3::new(1.0, 0.5, 0.0),
            emission_power: 1.0,
            ..Default::default()
        }],
    }
}

#[test]
fn emitter_behind_camera_renders_black() {
    init_logger();
    let scene = Scene {
        spheres: vec![Sphere {
            position: Vector3::new(0.0, 1.0, 20.0),
            radius: 2.0,
            material_index: 0,
        }],
        materials: vec![Material {
            emission_power: 10.0,
            ..Default::default()
        }],
    };

    let (mut lantern, camera) = viewport(16, 12);
    for _ in 0..4 {
        lantern.render(&scene, &camera).unwrap();
    }
    assert!(lantern.image_data().iter().all(|&pixel| pixel == OPAQUE_BLACK));
}

#[test]
fn empty_scene_shows_only_the_background() {
    init_logger();
    let scene = Scene::default();
    let (mut lantern, camera) = viewport(10, 10);

    lantern.render(&scene, &camera).unwrap();
    assert!(lantern.image_data().iter().all(|&pixel| pixel == OPAQUE_BLACK));

    lantern.settings_mut().trace.background = Background::SkyGradient;
    lantern.reset_frame_index();
    lantern.render(&scene, &camera).unwrap();

    let pixels = lantern.image_data();
    assert!(pixels.iter().all(|&pixel| channel(pixel, 16) == 0xFF));
    // row 0 looks below the horizon, the last row above it
    let bottom = channel(pixels[5], 0);
    let top = channel(pixels[95], 0);
    assert!(top < bottom, "top {top}, bottom {bottom}");
}

#[test]
fn reset_matches_a_fresh_renderer() {
    init_logger();
    let scene = Scene::demo();
    let (mut lantern, mut camera) = viewport(12, 8);
    camera.set_position(Point3::new(4.0, 2.0, 3.0));
    camera.set_direction(Vector3::new(-0.6, -0.2, -0.8));

    for _ in 0..3 {
        lantern.render(&scene, &camera).unwrap();
    }
    lantern.reset_frame_index();
    lantern.render(&scene, &camera).unwrap();

    let mut fresh = Lantern::new(12, 8);
    fresh.render(&scene, &camera).unwrap();
    assert_eq!(lantern.image_data(), fresh.image_data());
    assert_eq!(lantern.frame_index(), 2);
}

#[test]
fn accumulation_is_a_running_mean() {
    init_logger();
    let scene = Scene::demo();
    let (mut lantern, camera) = viewport(4, 4);
    lantern.settings_mut().mode = RenderMode::Accelerated;
    lantern.set_backend(Box::new(FrameRamp));

    // samples 0.1, 0.2, 0.3, 0.4
    let expected = [25, 38, 51, 63];
    for red in expected {
        lantern.render(&scene, &camera).unwrap();
        assert!(lantern.image_data().iter().all(|&pixel| channel(pixel, 0) == red));
    }
    assert_eq!(lantern.frame_index(), 5);
    assert_eq!(lantern.last_dispatch_time(), Duration::from_micros(10));
}

#[test]
fn switching_backends_keeps_accumulating() {
    init_logger();
    let scene = emitter_filling_view();
    let (mut lantern, mut camera) = viewport(6, 6);
    camera.set_position(Point3::origin());

    lantern.render(&scene, &camera).unwrap();
    lantern.settings_mut().mode = RenderMode::Sequential;
    lantern.render(&scene, &camera).unwrap();

    assert_eq!(lantern.frame_index(), 3);
    let expected = OPAQUE_BLACK | (127 << 8) | 0xFF;
    assert!(lantern.image_data().iter().all(|&pixel| pixel == expected));
}

#[test]
fn camera_motion_restarts_accumulation() {
    init_logger();
    let scene = Scene::demo();
    let (mut lantern, mut camera) = viewport(8, 8);
    let mut input = InputState::default();

    lantern.render(&scene, &camera).unwrap();
    lantern.render(&scene, &camera).unwrap();

    // without the look button held nothing moves
    input.press(Key::W);
    assert!(!camera.update(0.1, &mut input));

    input.set_look(true);
    if camera.update(0.1, &mut input) {
        lantern.reset_frame_index();
    }
    assert_eq!(lantern.frame_index(), 1);
    assert!(camera.position().z < 7.0);

    lantern.render(&scene, &camera).unwrap();
    assert_eq!(lantern.frame_index(), 2);
}

#[test]
fn window_resize_flow() {
    init_logger();
    let scene = Scene::demo();
    let (mut lantern, mut camera) = viewport(8, 8);
    lantern.render(&scene, &camera).unwrap();

    camera.resize(20, 5);
    lantern.resize(20, 5);
    assert_eq!(lantern.frame_index(), 1);
    lantern.render(&scene, &camera).unwrap();
    assert_eq!(lantern.image_data().len(), 100);
    assert_eq!(lantern.frame().width, 20);
}

#[test]
fn gpu_backend_matches_cpu_on_a_flat_emitter() {
    init_logger();
    // skipped on machines without any wgpu adapter
    let Ok(backend) = WgpuBackend::new() else {
        return;
    };

    let scene = emitter_filling_view();
    let (mut gpu, mut camera) = viewport(9, 7);
    camera.set_position(Point3::origin());
    gpu.settings_mut().mode = RenderMode::Accelerated;
    gpu.set_backend(Box::new(backend));

    let mut cpu = Lantern::new(9, 7);
    for _ in 0..2 {
        gpu.render(&scene, &camera).unwrap();
        cpu.render(&scene, &camera).unwrap();
    }
    assert_eq!(gpu.image_data(), cpu.image_data());
}
