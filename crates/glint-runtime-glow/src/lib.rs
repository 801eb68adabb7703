//! GPU layer for glint: the device seam, rendering context, and the resources built on it
//! (shaders, buffers, vertex layouts, textures, render targets, meshes, transform feedback).
//!
//! Everything is generic over [`GpuDevice`]: [`GlowDevice`] drives a real GL/WebGL context,
//! [`HeadlessDevice`] is a software state machine for tests.

#![deny(missing_debug_implementations)]

pub mod buffer;
pub mod camera;
#[cfg(target_arch = "wasm32")]
pub mod canvas;
pub mod context;
pub mod device;
pub mod feedback;
pub mod glow_device;
pub mod headless;
pub mod mesh;
pub mod quad;
pub mod render_target;
pub mod shader;
pub mod texture;
pub mod vertex_layout;

pub use glint_core::{EngineError, FramebufferIncomplete};

pub use buffer::{flatten_rows, Buffer, BufferKind, BufferSource, Usage};
pub use camera::{Camera, Projection};
#[cfg(target_arch = "wasm32")]
pub use canvas::{CanvasSurface, PendingResize};
pub use context::{
    create_context, ApiVariant, Capabilities, DrawMode, EntryPoint, ExtensionHandle, GlslDialect,
    Limits, RenderingContext, Surface,
};
pub use device::GpuDevice;
pub use feedback::TransformFeedbackBuffer;
pub use glow_device::GlowDevice;
pub use headless::{HeadlessConfig, HeadlessDevice, HeadlessSurface};
pub use mesh::{DrawDispatch, Mesh};
pub use quad::{FullscreenQuad, INPUT_TEXTURE};
pub use render_target::{
    AttachmentFormat, BoundTarget, ColorAttachments, RenderTarget, RenderTargetOptions,
};
pub use shader::{
    AttributeDecl, FeedbackMode, Shader, ShaderSource, ShaderSpec, ShaderStage, UniformDecl,
    UniformSlot, DEFAULT_UNIFORMS,
};
pub use texture::{
    check_texture_size, color_attachment_format, CubeTexture, DecodedImage, PixelData, Texture,
    TextureFormat, TextureView,
};
pub use vertex_layout::{AttributeSpec, VertexLayout};
