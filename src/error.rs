//! Crate-wide error type.

/// Everything that can stop the scene from coming up.
///
/// None of these are recoverable at runtime: a bad grid spec or a shader
/// that fails validation is a programming error, and GPU bring-up failures
/// leave nothing to render to.
#[derive(thiserror::Error, Debug)]
pub enum TerrainError {
    #[error("invalid grid texture spec: {0}")]
    InvalidSpec(String),

    #[error("invalid scene configuration: {0}")]
    InvalidConfig(String),

    #[error("shader `{label}` failed validation: {message}")]
    Shader { label: String, message: String },

    #[error("surface creation failed: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("surface reports no supported texture formats")]
    UnsupportedSurface,

    #[error("no suitable adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("device request failed: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("window creation failed: {0}")]
    Window(#[from] winit::error::OsError),
}

impl TerrainError {
    pub fn invalid_spec<T: ToString>(msg: T) -> Self {
        TerrainError::InvalidSpec(msg.to_string())
    }

    pub fn invalid_config<T: ToString>(msg: T) -> Self {
        TerrainError::InvalidConfig(msg.to_string())
    }

    pub fn shader<L: ToString, M: ToString>(label: L, message: M) -> Self {
        TerrainError::Shader {
            label: label.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TerrainError>;
