use thiserror::Error;

pub type Result<T, E = LanternError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum LanternError {
    #[error("sphere {sphere} references material {index}, but the scene only has {count} materials")]
    MaterialOutOfRange {
        sphere: usize,
        index: usize,
        count: usize,
    },

    #[error("sphere {sphere} does not exist, the scene has {count} spheres")]
    SphereOutOfRange { sphere: usize, count: usize },

    #[error("camera viewport {camera:?} does not match renderer viewport {renderer:?}")]
    ViewportMismatch {
        camera: (u32, u32),
        renderer: (u32, u32),
    },

    #[error("accelerated render mode selected without a compute backend")]
    NoAcceleratedBackend,

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Display(#[from] DisplayError),
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("no compatible GPU adapter found")]
    NoAdapter,

    #[error("failed to acquire GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("failed to map the GPU result buffer: {0}")]
    Map(#[from] wgpu::BufferAsyncError),

    #[error("GPU readback channel closed before the buffer was mapped")]
    ChannelClosed,

    #[error("output buffer holds {actual} pixels, expected {expected}")]
    OutputSize { expected: usize, actual: usize },
}

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("frame holds {actual} pixels, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("failed to write image: {0}")]
    Image(#[from] image::ImageError),
}
