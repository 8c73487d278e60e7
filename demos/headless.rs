//! Renders the demo scene without a window and saves the result.
//!
//! cargo run --release --example headless -- [frames] [output.png] [--gpu]

use std::path::PathBuf;

use lantern::display::{Present, Snapshot};
use lantern::gpu::WgpuBackend;
use lantern::{Camera, Lantern, RenderMode, Scene};
use nalgebra::{Point3, Vector3};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 360;

fn main() -> lantern::Result<()> {
    env_logger::init();

    let mut frames = 64;
    let mut output = PathBuf::from("lantern.png");
    let mut use_gpu = false;
    for arg in std::env::args().skip(1) {
        if arg == "--gpu" {
            use_gpu = true;
        } else if let Ok(count) = arg.parse() {
            frames = count;
        } else {
            output = PathBuf::from(arg);
        }
    }

    let scene = Scene::demo();
    let mut camera = Camera::default();
    camera.set_position(Point3::new(4.0, 2.0, 3.0));
    camera.set_direction(Vector3::new(-0.6, -0.2, -0.8));
    camera.resize(WIDTH, HEIGHT);

    let mut lantern = Lantern::new(WIDTH, HEIGHT);
    if use_gpu {
        match WgpuBackend::new() {
            Ok(backend) => {
                log::info!("rendering on {}", backend.adapter_name());
                lantern.set_backend(Box::new(backend));
                lantern.settings_mut().mode = RenderMode::Accelerated;
            }
            Err(error) => log::warn!("falling back to the CPU: {error}"),
        }
    }

    for _ in 0..frames {
        lantern.render(&scene, &camera)?;
        log::info!(
            "frame {} took {:?}",
            lantern.frame_index() - 1,
            lantern.last_render_time()
        );
    }

    let mut snapshot = Snapshot::new(&output);
    snapshot.present(&lantern.frame())?;
    log::info!("saved {}", snapshot.path().display());
    Ok(())
}
