//! Fullscreen drawing: one oversized triangle covering clip space.

use glint_core::EngineError;

use crate::context::{DrawMode, RenderingContext};
use crate::device::GpuDevice;
use crate::mesh::Mesh;
use crate::shader::{Shader, ShaderSource, ShaderSpec};
use crate::texture::TextureView;
use crate::vertex_layout::AttributeSpec;

/// Clip-space corners of the covering triangle.
pub const FULLSCREEN_TRIANGLE: [f32; 6] = [-1.0, -1.0, -1.0, 4.0, 4.0, -1.0];

/// Sampler name the passthrough shader reads.
pub const INPUT_TEXTURE: &str = "inputTexture";

pub const FULLSCREEN_VERT: &str = r#"in vec2 position;
out vec2 vUv;
void main() {
    vUv = position * 0.5 + 0.5;
    gl_Position = vec4(position, 0.0, 1.0);
}
"#;

pub const FULLSCREEN_VERT_LEGACY: &str = r#"attribute vec2 position;
varying vec2 vUv;
void main() {
    vUv = position * 0.5 + 0.5;
    gl_Position = vec4(position, 0.0, 1.0);
}
"#;

pub const PASSTHROUGH_FRAG: &str = r#"uniform sampler2D inputTexture;
in vec2 vUv;
out vec4 glFragColor;
void main() {
    glFragColor = texture(inputTexture, vUv);
}
"#;

pub const PASSTHROUGH_FRAG_LEGACY: &str = r#"uniform sampler2D inputTexture;
varying vec2 vUv;
void main() {
    gl_FragColor = texture2D(inputTexture, vUv);
}
"#;

/// A fullscreen triangle with its own fragment shader. `position` is bound to location 0.
#[derive(Debug)]
pub struct FullscreenQuad<D: GpuDevice> {
    mesh: Mesh<D>,
}

impl<D: GpuDevice> FullscreenQuad<D> {
    /// Passthrough quad sampling [`INPUT_TEXTURE`].
    pub fn new(ctx: &RenderingContext<D>) -> Result<Self, EngineError> {
        let fragment = ShaderSource::for_context(ctx, PASSTHROUGH_FRAG_LEGACY, PASSTHROUGH_FRAG);
        Self::with_fragment(ctx, fragment, &[INPUT_TEXTURE])
    }

    /// Quad running `fragment`, which sees `vUv` in `[0, 1]`.
    pub fn with_fragment(
        ctx: &RenderingContext<D>,
        fragment: impl Into<ShaderSource>,
        uniforms: &[&str],
    ) -> Result<Self, EngineError> {
        let vertex = ShaderSource::for_context(ctx, FULLSCREEN_VERT_LEGACY, FULLSCREEN_VERT);
        let spec = ShaderSpec::new(vertex, fragment)
            .uniforms(uniforms.iter().copied())
            .attribute(("position", 2, 0));
        let shader = Shader::new(ctx, spec)?;

        let mut mesh = Mesh::new(DrawMode::Triangles);
        mesh.set_shader(ctx, shader)?;
        if let Err(e) = mesh.add_attribute(
            ctx,
            "position",
            &FULLSCREEN_TRIANGLE[..],
            AttributeSpec::new(2).at(0),
        ) {
            mesh.destroy(ctx);
            return Err(e);
        }
        Ok(Self { mesh })
    }

    pub fn shader(&self) -> Option<&Shader<D>> {
        self.mesh.shader()
    }

    /// Draw into whatever target is bound; `uniforms` runs with the program bound.
    pub fn draw<F>(&self, ctx: &RenderingContext<D>, uniforms: F) -> Result<(), EngineError>
    where
        F: FnOnce(&Shader<D>, &RenderingContext<D>) -> Result<(), EngineError>,
    {
        self.mesh.draw_ortho(ctx, uniforms)
    }

    /// Draw `view` on unit 0 through [`INPUT_TEXTURE`].
    pub fn draw_texture(
        &self,
        ctx: &RenderingContext<D>,
        view: TextureView<D>,
    ) -> Result<(), EngineError> {
        view.bind(ctx, 0);
        let result = self.draw(ctx, |shader, ctx| {
            shader.set_texture(ctx, INPUT_TEXTURE, 0);
            Ok(())
        });
        view.unbind(ctx, 0);
        result
    }

    pub fn destroy(self, ctx: &RenderingContext<D>) {
        self.mesh.destroy(ctx);
    }
}
