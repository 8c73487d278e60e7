use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ColorType;
use wgpu::{
    Device, Extent3d, FilterMode, ImageCopyTexture, ImageDataLayout, Origin3d, Queue, Sampler, SamplerDescriptor,
    Texture, TextureAspect, TextureDescriptor, TextureDimension, TextureFormat, TextureUsages, TextureView,
    TextureViewDescriptor,
};

use crate::error::DisplayError;

/// A finished frame: packed RGBA8 pixels, row 0 at the bottom.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub width: u32,
    pub height: u32,
    pub pixels: &'a [u32],
}

impl FrameView<'_> {
    fn check(&self) -> Result<(), DisplayError> {
        let expected = (self.width * self.height) as usize;
        if self.pixels.len() != expected {
            return Err(DisplayError::SizeMismatch {
                expected,
                actual: self.pixels.len(),
            });
        }
        Ok(())
    }

    pub fn top_down_bytes(&self) -> Vec<u8> {
        let row_bytes = self.width as usize * 4;
        let bytes: &[u8] = bytemuck::cast_slice(self.pixels);

        let mut flipped = Vec::with_capacity(bytes.len());
        if row_bytes == 0 {
            return flipped;
        }
        for row in bytes.chunks_exact(row_bytes).rev() {
            flipped.extend_from_slice(row);
        }
        flipped
    }
}

pub trait Present {
    fn present(&mut self, frame: &FrameView) -> Result<(), DisplayError>;
}

pub struct Snapshot {
    path: PathBuf,
}

impl Snapshot {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Present for Snapshot {
    fn present(&mut self, frame: &FrameView) -> Result<(), DisplayError> {
        frame.check()?;
        image::save_buffer(
            &self.path,
            &frame.top_down_bytes(),
            frame.width,
            frame.height,
            ColorType::Rgba8,
        )?;
        log::debug!("wrote {}x{} frame to {}", frame.width, frame.height, self.path.display());
        Ok(())
    }
}

pub struct TextureTarget {
    device: Arc<Device>,
    queue: Arc<Queue>,
    texture: Texture,
    view: TextureView,
    sampler: Sampler,
    label: String,
}

impl TextureTarget {
    pub fn new(device: Arc<Device>, queue: Arc<Queue>, width: u32, height: u32, label: &str) -> Self {
        let (texture, view, sampler) = Self::create(&device, width, height, label);
        Self {
            device,
            queue,
            texture,
            view,
            sampler,
            label: label.to_string(),
        }
    }

    fn create(device: &Device, width: u32, height: u32, label: &str) -> (Texture, TextureView, Sampler) {
        let texture = device.create_texture(&TextureDescriptor {
            label: Some(label),
            size: Extent3d {
                // wgpu rejects empty textures
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let view = texture.create_view(&TextureViewDescriptor {
            label: Some(&format!("{label} view")),
            ..Default::default()
        });

        let sampler = device.create_sampler(&SamplerDescriptor {
            label: Some(&format!("{label} sampler")),
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Nearest,
            ..Default::default()
        });

        (texture, view, sampler)
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.texture.width() == width && self.texture.height() == height {
            return;
        }

        log::debug!("recreating {} texture at {width}x{height}", self.label);
        let (texture, view, sampler) = Self::create(&self.device, width, height, &self.label);
        self.texture = texture;
        self.view = view;
        self.sampler = sampler;
    }

    pub fn view(&self) -> &TextureView {
        &self.view
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }
}

impl Present for TextureTarget {
    fn present(&mut self, frame: &FrameView) -> Result<(), DisplayError> {
        frame.check()?;
        if frame.width == 0 || frame.height == 0 {
            return Ok(());
        }

        self.resize(frame.width, frame.height);
        // rows go up bottom first, a fullscreen quad samples with v pointing up
        self.queue.write_texture(
            ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: Origin3d::ZERO,
                aspect: TextureAspect::All,
            },
            bytemuck::cast_slice(frame.pixels),
            ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * frame.width),
                rows_per_image: Some(frame.height),
            },
            self.texture.size(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_down_bytes_flips_rows() {
        // bottom row red, top row blue
        let red = 0xFF0000FF;
        let blue = 0xFFFF0000;
        let pixels = [red, red, blue, blue];
        let frame = FrameView {
            width: 2,
            height: 2,
            pixels: &pixels,
        };

        let bytes = frame.top_down_bytes();
        assert_eq!(&bytes[..4], &[0x00, 0x00, 0xFF, 0xFF]);
        assert_eq!(&bytes[8..12], &[0xFF, 0x00, 0x00, 0xFF]);
    }

    #[test]
    fn test_snapshot_writes_png() {
        let path = std::env::temp_dir().join(format!("lantern-snapshot-{}.png", std::process::id()));
        let pixels = [0xFF0000FF, 0xFF00FF00, 0xFFFF0000, 0xFFFFFFFF, 0xFF000000, 0xFF808080];
        let frame = FrameView {
            width: 3,
            height: 2,
            pixels: &pixels,
        };

        let mut snapshot = Snapshot::new(&path);
        assert_eq!(snapshot.path(), path.as_path());
        snapshot.present(&frame).unwrap();

        let written = image::open(&path).unwrap().into_rgba8();
        assert_eq!(written.dimensions(), (3, 2));
        // last row of the frame is the top of the image
        assert_eq!(written.get_pixel(0, 0).0, [0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(written.get_pixel(2, 0).0, [0x80, 0x80, 0x80, 0xFF]);
        assert_eq!(written.get_pixel(1, 1).0, [0x00, 0xFF, 0x00, 0xFF]);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_size_mismatch() {
        let pixels = [0u32; 3];
        let frame = FrameView {
            width: 2,
            height: 2,
            pixels: &pixels,
        };
        let mut snapshot = Snapshot::new(std::env::temp_dir().join("lantern-never-written.png"));
        assert!(matches!(
            snapshot.present(&frame),
            Err(DisplayError::SizeMismatch { expected: 4, actual: 3 })
        ));
    }
}
