use std::fmt;
use std::path::PathBuf;

/// Engine-level errors used across glint crates.
///
/// Contract rule: this type lives in `glint-core` and is re-exported by the runtime crates.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    // ---- Core / config ----
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("json parse error at {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid config at {}: {msg}", path.display())]
    InvalidConfig { path: PathBuf, msg: String },

    // ---- Context / capabilities ----
    /// None of the requested API variants produced a context.
    #[error("no rendering context could be created (tried: {})", tried.join(", "))]
    ContextCreation { tried: Vec<String> },

    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    // ---- Shaders ----
    #[error("vertex shader compile error: {0}")]
    VertexCompile(String),
    #[error("fragment shader compile error: {0}")]
    FragmentCompile(String),
    #[error("program link error: {0}")]
    Link(String),
    #[error("backend object creation failed: {0}")]
    GlCreate(String),

    #[error("uniform `{name}` expects {expected} components, got {got}")]
    UniformShape {
        name: String,
        expected: &'static str,
        got: usize,
    },

    #[error("attribute `{0}` not found in program")]
    AttributeNotFound(String),

    // ---- Buffers / textures ----
    #[error("buffer layout error: {0}")]
    BufferLayout(String),

    #[error("buffer update size mismatch: buffer holds {expected} bytes, update has {got}")]
    BufferSizeMismatch { expected: usize, got: usize },

    #[error("texture size {width}x{height} exceeds limit {max}")]
    TextureSize { width: u32, height: u32, max: u32 },

    // ---- Render targets ----
    #[error("render target incomplete: {0}")]
    RenderTargetIncomplete(FramebufferIncomplete),

    #[error("attachment count mismatch: {requested} attachment points requested, {textures} textures supplied")]
    AttachmentCountMismatch { requested: usize, textures: usize },

    #[error("attachment count {count} outside supported range (0, {max})")]
    AttachmentLimit { count: usize, max: usize },

    // ---- Fallback ----
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    pub fn other<T: Into<String>>(s: T) -> Self {
        EngineError::Other(s.into())
    }

    pub fn invalid_config(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        EngineError::InvalidConfig {
            path: path.into(),
            msg: msg.into(),
        }
    }
}

/// Distinguishable framebuffer completeness failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramebufferIncomplete {
    Unsupported,
    IncompleteAttachment,
    IncompleteDimensions,
    MissingAttachment,
    Unknown(u32),
}

impl fmt::Display for FramebufferIncomplete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramebufferIncomplete::Unsupported => write!(f, "unsupported attachment combination"),
            FramebufferIncomplete::IncompleteAttachment => write!(f, "incomplete attachment"),
            FramebufferIncomplete::IncompleteDimensions => {
                write!(f, "attachments have mismatched dimensions")
            }
            FramebufferIncomplete::MissingAttachment => write!(f, "missing attachment"),
            FramebufferIncomplete::Unknown(status) => write!(f, "unknown status 0x{status:x}"),
        }
    }
}
