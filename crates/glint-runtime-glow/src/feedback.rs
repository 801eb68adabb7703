//! GPU-side simulation state: a vertex-only program writes its varyings back into buffers
//! with transform feedback, bouncing between two buffer sets each step.
//!
//! Attribute `i` is read from location `i` and written to feedback index `i`, so the vertex
//! shader declares its inputs with `layout(location = i)` in the order they are added and
//! lists one varying per attribute in the same order. Modern contexts only.

use glint_core::EngineError;
use tracing::{debug, trace};

use crate::buffer::{Buffer, Usage};
use crate::context::{DrawMode, RenderingContext};
use crate::device::GpuDevice;
use crate::shader::{FeedbackMode, Shader, ShaderSource, ShaderSpec};
use crate::vertex_layout::{AttributeSpec, VertexLayout};

/// Uniform set on every [`TransformFeedbackBuffer::update`].
pub const TIME_UNIFORM: &str = "uTime";

const DISCARD_FRAGMENT: &str =
    "out vec4 glFragColor;\nvoid main() {\n    glFragColor = vec4(1.0);\n}\n";

#[derive(Debug)]
struct FeedbackAttribute<D: GpuDevice> {
    name: String,
    size: i32,
    buffers: [Buffer<D>; 2],
}

#[derive(Debug)]
pub struct TransformFeedbackBuffer<D: GpuDevice> {
    feedback: D::TransformFeedback,
    layouts: [VertexLayout<D>; 2],
    attributes: Vec<FeedbackAttribute<D>>,
    shader: Shader<D>,
    num_items: i32,
    num_items_locked: bool,
    /// Index of the buffer set holding the latest results.
    current: usize,
}

fn feedback_shader<D: GpuDevice>(
    ctx: &RenderingContext<D>,
    vertex: ShaderSource,
    varyings: &[&str],
    uniforms: &[&str],
) -> Result<Shader<D>, EngineError> {
    let spec = ShaderSpec::new(vertex, DISCARD_FRAGMENT)
        .uniform(TIME_UNIFORM)
        .uniforms(uniforms.iter().copied())
        .varyings(varyings.iter().copied())
        .feedback_mode(FeedbackMode::Separate);
    Shader::new(ctx, spec)
}

impl<D: GpuDevice> TransformFeedbackBuffer<D> {
    /// Build the update program from a vertex source; the fragment stage is a stub since
    /// rasterization is discarded during updates.
    pub fn new(
        ctx: &RenderingContext<D>,
        vertex: impl Into<ShaderSource>,
        varyings: &[&str],
        uniforms: &[&str],
    ) -> Result<Self, EngineError> {
        if !ctx.is_modern() {
            return Err(EngineError::CapabilityUnavailable(
                "transform feedback needs a WebGL2 context".into(),
            ));
        }
        let shader = feedback_shader(ctx, vertex.into(), varyings, uniforms)?;

        let gl = ctx.gl();
        let feedback = match gl.create_transform_feedback() {
            Ok(f) => f,
            Err(e) => {
                shader.destroy(ctx);
                return Err(EngineError::GlCreate(format!(
                    "create_transform_feedback failed: {e}"
                )));
            }
        };
        let front = match VertexLayout::new(ctx, true) {
            Ok(layout) => layout,
            Err(e) => {
                gl.delete_transform_feedback(feedback);
                shader.destroy(ctx);
                return Err(e);
            }
        };
        let back = match VertexLayout::new(ctx, true) {
            Ok(layout) => layout,
            Err(e) => {
                front.destroy(ctx);
                gl.delete_transform_feedback(feedback);
                shader.destroy(ctx);
                return Err(e);
            }
        };

        Ok(Self {
            feedback,
            layouts: [front, back],
            attributes: Vec::new(),
            shader,
            num_items: 0,
            num_items_locked: false,
            current: 0,
        })
    }

    /// Replace the update program. Attributes and their buffers are kept.
    pub fn set_shader(
        &mut self,
        ctx: &RenderingContext<D>,
        vertex: impl Into<ShaderSource>,
        varyings: &[&str],
        uniforms: &[&str],
    ) -> Result<(), EngineError> {
        let shader = feedback_shader(ctx, vertex.into(), varyings, uniforms)?;
        std::mem::replace(&mut self.shader, shader).destroy(ctx);
        Ok(())
    }

    pub fn shader(&self) -> &Shader<D> {
        &self.shader
    }

    /// Seed a new simulated attribute; both buffer sets start with `data`.
    pub fn add_attribute(
        &mut self,
        ctx: &RenderingContext<D>,
        name: &str,
        data: &[f32],
        size: i32,
    ) -> Result<(), EngineError> {
        if size <= 0 || data.len() % size as usize != 0 {
            return Err(EngineError::BufferLayout(format!(
                "`{name}`: {} floats do not split into {size}-component items",
                data.len()
            )));
        }
        let front = Buffer::vertex(ctx, data, Usage::Dynamic)?;
        let back = match Buffer::vertex(ctx, data, Usage::Dynamic) {
            Ok(b) => b,
            Err(e) => {
                front.destroy(ctx);
                return Err(e);
            }
        };

        let location = self.attributes.len() as u32;
        let spec = AttributeSpec::new(size).at(location);
        let mut failed = None;
        for (layout, buffer) in self.layouts.iter_mut().zip([&front, &back]) {
            if let Err(e) = layout.add_attribute(ctx, &self.shader, name, buffer, spec) {
                failed = Some(e);
                break;
            }
        }
        if let Some(e) = failed {
            front.destroy(ctx);
            back.destroy(ctx);
            return Err(e);
        }
        if !self.num_items_locked && self.attributes.is_empty() {
            self.num_items = (data.len() / size as usize) as i32;
        }
        trace!(attribute = name, location, size, "feedback attribute added");
        self.attributes.push(FeedbackAttribute {
            name: name.to_string(),
            size,
            buffers: [front, back],
        });
        Ok(())
    }

    /// Items processed per update. Overrides the count taken from the first attribute.
    pub fn set_num_items(&mut self, n: i32) {
        self.num_items = n.max(0);
        self.num_items_locked = true;
    }

    pub fn num_items(&self) -> i32 {
        self.num_items
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Buffer holding the latest values of attribute `name`.
    pub fn buffer(&self, name: &str) -> Option<&Buffer<D>> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.buffers[self.current])
    }

    /// Run one simulation step: read the current set, capture into the other, then swap.
    pub fn update(&mut self, ctx: &RenderingContext<D>, time: f32) -> Result<(), EngineError> {
        if self.attributes.is_empty() {
            trace!("no feedback attributes; update skipped");
            return Ok(());
        }
        for attribute in &self.attributes {
            let needed = self.num_items as usize * attribute.size as usize;
            if attribute.buffers[0].len() < needed {
                return Err(EngineError::BufferLayout(format!(
                    "`{}` holds {} floats, {} items need {needed}",
                    attribute.name,
                    attribute.buffers[0].len(),
                    self.num_items
                )));
            }
        }

        let gl = ctx.gl();
        let (src, dst) = (self.current, 1 - self.current);
        self.shader.bind(ctx);
        self.shader.set_float(ctx, TIME_UNIFORM, time);
        self.layouts[src].bind(ctx);

        gl.bind_transform_feedback(glow::TRANSFORM_FEEDBACK, Some(self.feedback));
        for (index, attribute) in self.attributes.iter().enumerate() {
            gl.bind_buffer_base(
                glow::TRANSFORM_FEEDBACK_BUFFER,
                index as u32,
                Some(attribute.buffers[dst].handle()),
            );
        }
        gl.enable(glow::RASTERIZER_DISCARD);
        gl.begin_transform_feedback(glow::POINTS);
        ctx.draw_arrays(DrawMode::Points, 0, self.num_items);
        gl.end_transform_feedback();
        gl.disable(glow::RASTERIZER_DISCARD);

        for index in 0..self.attributes.len() {
            gl.bind_buffer_base(glow::TRANSFORM_FEEDBACK_BUFFER, index as u32, None);
        }
        gl.bind_transform_feedback(glow::TRANSFORM_FEEDBACK, None);
        self.layouts[src].unbind(ctx);
        self.shader.unbind(ctx);

        self.swap();
        Ok(())
    }

    /// Flip which buffer set is current without running the program.
    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }

    /// Bind the layout reading the latest values, for drawing them.
    pub fn bind(&self, ctx: &RenderingContext<D>) {
        self.layouts[self.current].bind(ctx);
    }

    pub fn unbind(&self, ctx: &RenderingContext<D>) {
        self.layouts[self.current].unbind(ctx);
    }

    pub fn destroy(self, ctx: &RenderingContext<D>) {
        let [a, b] = self.layouts;
        a.destroy(ctx);
        b.destroy(ctx);
        for attribute in self.attributes {
            let [front, back] = attribute.buffers;
            front.destroy(ctx);
            back.destroy(ctx);
        }
        ctx.gl().delete_transform_feedback(self.feedback);
        self.shader.destroy(ctx);
        debug!("transform feedback buffer destroyed");
    }
}
