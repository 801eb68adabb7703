//! Attribute bindings: which buffer feeds which shader input, and how.
//!
//! A layout is backed by a native vertex array object when the context has one. Without
//! it the layout is emulated: attribute pointers are recorded and replayed on `bind`,
//! then disabled again on `unbind` so the default vertex state is left as it was.

use std::collections::BTreeMap;

use glint_core::EngineError;
use tracing::{debug, trace};

use crate::buffer::Buffer;
use crate::context::RenderingContext;
use crate::device::GpuDevice;
use crate::shader::Shader;

/// Pointer description for one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpec {
    /// Components per vertex (1..=4).
    pub size: i32,
    /// Overrides the shader's location.
    pub location: Option<u32>,
    pub normalized: bool,
    pub stride: i32,
    pub offset: i32,
}

impl AttributeSpec {
    pub fn new(size: i32) -> Self {
        Self {
            size,
            location: None,
            normalized: false,
            stride: 0,
            offset: 0,
        }
    }

    pub fn at(mut self, location: u32) -> Self {
        self.location = Some(location);
        self
    }

    pub fn normalized(mut self, normalized: bool) -> Self {
        self.normalized = normalized;
        self
    }

    pub fn stride(mut self, stride: i32) -> Self {
        self.stride = stride;
        self
    }

    pub fn offset(mut self, offset: i32) -> Self {
        self.offset = offset;
        self
    }
}

#[derive(Debug)]
pub struct LayoutAttribute<D: GpuDevice> {
    pub location: u32,
    pub buffer: D::Buffer,
    pub spec: AttributeSpec,
    /// 0 advances per vertex, 1 per instance.
    pub divisor: u32,
    pub enabled: bool,
}

impl<D: GpuDevice> LayoutAttribute<D> {
    pub fn is_instanced(&self) -> bool {
        self.divisor > 0
    }
}

#[derive(Debug)]
pub struct VertexLayout<D: GpuDevice> {
    vao: Option<D::VertexArray>,
    attributes: BTreeMap<String, LayoutAttribute<D>>,
}

impl<D: GpuDevice> VertexLayout<D> {
    /// Native vertex array when `use_native` is set and the context supports it.
    pub fn new(ctx: &RenderingContext<D>, use_native: bool) -> Result<Self, EngineError> {
        let vao = if use_native && ctx.capabilities().supports_vertex_arrays() {
            Some(
                ctx.gl()
                    .create_vertex_array()
                    .map_err(|e| EngineError::GlCreate(format!("create_vertex_array failed: {e}")))?,
            )
        } else {
            if use_native {
                debug!("vertex array objects unavailable; emulating layout");
            }
            None
        };
        Ok(Self {
            vao,
            attributes: BTreeMap::new(),
        })
    }

    pub fn is_native(&self) -> bool {
        self.vao.is_some()
    }

    pub fn attributes(&self) -> &BTreeMap<String, LayoutAttribute<D>> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&LayoutAttribute<D>> {
        self.attributes.get(name)
    }

    pub fn location(&self, name: &str) -> Option<u32> {
        self.attributes.get(name).map(|a| a.location)
    }

    /// Resolve `name` on `shader`, enable its slot and point it at `buffer`.
    ///
    /// Returns the attribute location.
    pub fn add_attribute(
        &mut self,
        ctx: &RenderingContext<D>,
        shader: &Shader<D>,
        name: &str,
        buffer: &Buffer<D>,
        spec: AttributeSpec,
    ) -> Result<u32, EngineError> {
        let location = spec
            .location
            .or_else(|| shader.attribute_location(ctx, name))
            .ok_or_else(|| EngineError::AttributeNotFound(name.to_string()))?;

        let attribute = LayoutAttribute {
            location,
            buffer: buffer.handle(),
            spec,
            divisor: 0,
            enabled: true,
        };
        if let Some(vao) = self.vao {
            let gl = ctx.gl();
            gl.bind_vertex_array(Some(vao));
            apply_pointer(gl, &attribute);
            gl.bind_vertex_array(None);
        }
        trace!(attribute = name, location, size = spec.size, "attribute added");
        self.attributes.insert(name.to_string(), attribute);
        Ok(location)
    }

    /// Advance `name` once per instance instead of once per vertex.
    pub fn make_instanced_attribute(
        &mut self,
        ctx: &RenderingContext<D>,
        name: &str,
    ) -> Result<(), EngineError> {
        self.set_divisor(ctx, name, 1)
    }

    pub fn disable_instanced_attribute(
        &mut self,
        ctx: &RenderingContext<D>,
        name: &str,
    ) -> Result<(), EngineError> {
        self.set_divisor(ctx, name, 0)
    }

    fn set_divisor(
        &mut self,
        ctx: &RenderingContext<D>,
        name: &str,
        divisor: u32,
    ) -> Result<(), EngineError> {
        if !ctx.capabilities().supports_instancing() {
            return Err(EngineError::CapabilityUnavailable(format!(
                "instanced attribute `{name}` needs ANGLE_instanced_arrays"
            )));
        }
        let attribute = self
            .attributes
            .get_mut(name)
            .ok_or_else(|| EngineError::AttributeNotFound(name.to_string()))?;
        attribute.divisor = divisor;
        if let Some(vao) = self.vao {
            let gl = ctx.gl();
            gl.bind_vertex_array(Some(vao));
            gl.vertex_attrib_divisor(attribute.location, divisor);
            gl.bind_vertex_array(None);
        }
        Ok(())
    }

    pub fn enable_attribute(
        &mut self,
        ctx: &RenderingContext<D>,
        name: &str,
    ) -> Result<(), EngineError> {
        self.toggle(ctx, name, true)
    }

    pub fn disable_attribute(
        &mut self,
        ctx: &RenderingContext<D>,
        name: &str,
    ) -> Result<(), EngineError> {
        self.toggle(ctx, name, false)
    }

    fn toggle(
        &mut self,
        ctx: &RenderingContext<D>,
        name: &str,
        enabled: bool,
    ) -> Result<(), EngineError> {
        let attribute = self
            .attributes
            .get_mut(name)
            .ok_or_else(|| EngineError::AttributeNotFound(name.to_string()))?;
        attribute.enabled = enabled;
        if let Some(vao) = self.vao {
            let gl = ctx.gl();
            gl.bind_vertex_array(Some(vao));
            if enabled {
                gl.enable_vertex_attrib_array(attribute.location);
            } else {
                gl.disable_vertex_attrib_array(attribute.location);
            }
            gl.bind_vertex_array(None);
        }
        Ok(())
    }

    pub fn bind(&self, ctx: &RenderingContext<D>) {
        let gl = ctx.gl();
        match self.vao {
            Some(vao) => gl.bind_vertex_array(Some(vao)),
            None => {
                for attribute in self.attributes.values().filter(|a| a.enabled) {
                    apply_pointer(gl, attribute);
                }
            }
        }
    }

    pub fn unbind(&self, ctx: &RenderingContext<D>) {
        let gl = ctx.gl();
        match self.vao {
            Some(_) => gl.bind_vertex_array(None),
            None => {
                for attribute in self.attributes.values().filter(|a| a.enabled) {
                    if attribute.is_instanced() {
                        gl.vertex_attrib_divisor(attribute.location, 0);
                    }
                    gl.disable_vertex_attrib_array(attribute.location);
                }
            }
        }
    }

    pub fn destroy(self, ctx: &RenderingContext<D>) {
        if let Some(vao) = self.vao {
            ctx.gl().delete_vertex_array(vao);
        }
    }
}

/// Enable the slot and issue the pointer (and divisor) for `attribute`'s buffer.
/// Leaves `ARRAY_BUFFER` unbound.
fn apply_pointer<D: GpuDevice>(gl: &D, attribute: &LayoutAttribute<D>) {
    let spec = attribute.spec;
    gl.bind_buffer(glow::ARRAY_BUFFER, Some(attribute.buffer));
    if attribute.enabled {
        gl.enable_vertex_attrib_array(attribute.location);
    }
    gl.vertex_attrib_pointer_f32(
        attribute.location,
        spec.size,
        glow::FLOAT,
        spec.normalized,
        spec.stride,
        spec.offset,
    );
    if attribute.divisor > 0 {
        gl.vertex_attrib_divisor(attribute.location, attribute.divisor);
    }
    gl.bind_buffer(glow::ARRAY_BUFFER, None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{Buffer, Usage};
    use crate::context::{create_context, ApiVariant};
    use crate::headless::{HeadlessConfig, HeadlessDevice, HeadlessSurface};
    use crate::shader::ShaderSpec;
    use glint_core::ContextOptions;

    const VS: &str = "in vec3 position;\nin vec2 uv;\nin vec3 offset;\nvoid main() {}";
    const FS: &str = "void main() {}";

    fn ctx_with(surface: &mut HeadlessSurface) -> RenderingContext<HeadlessDevice> {
        create_context(surface, &ContextOptions::default()).expect("context")
    }

    #[test]
    fn native_layout_records_pointer_in_its_vao() {
        let ctx = ctx_with(&mut HeadlessSurface::webgl2(8, 8));
        let shader = Shader::new(&ctx, ShaderSpec::new(VS, FS)).expect("shader");
        let buf = Buffer::vertex(&ctx, &[0.0; 12], Usage::Static).expect("buffer");
        let mut layout = VertexLayout::new(&ctx, true).expect("layout");
        assert!(layout.is_native());

        let loc = layout
            .add_attribute(&ctx, &shader, "position", &buf, AttributeSpec::new(3))
            .expect("position");
        assert_eq!(Some(loc), shader.attribute_location(&ctx, "position"));

        let vao = layout.vao;
        let slot = ctx.gl().attrib_slot(vao, loc).expect("slot");
        assert!(slot.enabled);
        assert_eq!(slot.size, 3);
        assert_eq!(slot.buffer, Some(buf.handle()));
        // the default vertex array is untouched
        assert!(ctx.gl().attrib_slot(None, loc).is_none());
    }

    #[test]
    fn explicit_location_wins_over_shader() {
        let ctx = ctx_with(&mut HeadlessSurface::webgl2(8, 8));
        let shader = Shader::new(&ctx, ShaderSpec::new(VS, FS)).expect("shader");
        let buf = Buffer::vertex(&ctx, &[0.0; 8], Usage::Static).expect("buffer");
        let mut layout = VertexLayout::new(&ctx, true).expect("layout");
        let loc = layout
            .add_attribute(&ctx, &shader, "uv", &buf, AttributeSpec::new(2).at(7))
            .expect("uv");
        assert_eq!(loc, 7);
    }

    #[test]
    fn unknown_attribute_is_an_error() {
        let ctx = ctx_with(&mut HeadlessSurface::webgl2(8, 8));
        let shader = Shader::new(&ctx, ShaderSpec::new(VS, FS)).expect("shader");
        let buf = Buffer::vertex(&ctx, &[0.0; 3], Usage::Static).expect("buffer");
        let mut layout = VertexLayout::new(&ctx, true).expect("layout");
        let err = layout
            .add_attribute(&ctx, &shader, "normal", &buf, AttributeSpec::new(3))
            .expect_err("not declared");
        assert!(matches!(err, EngineError::AttributeNotFound(n) if n == "normal"));
    }

    #[test]
    fn instanced_attribute_sets_divisor_one() {
        let ctx = ctx_with(&mut HeadlessSurface::webgl2(8, 8));
        let shader = Shader::new(&ctx, ShaderSpec::new(VS, FS)).expect("shader");
        let buf = Buffer::vertex(&ctx, &[0.0; 30], Usage::Static).expect("buffer");
        let mut layout = VertexLayout::new(&ctx, true).expect("layout");
        let loc = layout
            .add_attribute(&ctx, &shader, "offset", &buf, AttributeSpec::new(3))
            .expect("offset");
        layout
            .make_instanced_attribute(&ctx, "offset")
            .expect("instanced");
        assert_eq!(ctx.gl().attrib_slot(layout.vao, loc).map(|s| s.divisor), Some(1));
        assert!(layout.attribute("offset").is_some_and(|a| a.is_instanced()));

        layout
            .disable_instanced_attribute(&ctx, "offset")
            .expect("per-vertex again");
        assert_eq!(ctx.gl().attrib_slot(layout.vao, loc).map(|s| s.divisor), Some(0));
    }

    #[test]
    fn emulated_layout_replays_on_bind_and_restores_on_unbind() {
        let mut surface = HeadlessSurface::new(
            vec![ApiVariant::WebGl],
            HeadlessConfig::webgl1_full().without_extension("OES_vertex_array_object"),
            (8, 8),
        );
        let ctx = ctx_with(&mut surface);
        let shader = Shader::new(&ctx, ShaderSpec::new(VS, FS)).expect("shader");
        let buf = Buffer::vertex(&ctx, &[0.0; 12], Usage::Static).expect("buffer");
        let mut layout = VertexLayout::new(&ctx, true).expect("layout");
        assert!(!layout.is_native());

        let before = ctx.gl().bindings();
        let loc = layout
            .add_attribute(&ctx, &shader, "position", &buf, AttributeSpec::new(3))
            .expect("position");
        layout
            .make_instanced_attribute(&ctx, "position")
            .expect("ANGLE route");
        assert_eq!(ctx.gl().bindings(), before, "recording alone changes nothing");

        layout.bind(&ctx);
        let slot = ctx.gl().attrib_slot(None, loc).expect("slot");
        assert!(slot.enabled);
        assert_eq!(slot.divisor, 1);
        assert_eq!(ctx.gl().bindings().enabled_attribs, vec![loc]);

        layout.unbind(&ctx);
        assert_eq!(ctx.gl().bindings(), before);
        assert_eq!(ctx.gl().attrib_slot(None, loc).map(|s| s.divisor), Some(0));
    }

    #[test]
    fn instancing_without_capability_fails_clearly() {
        let mut surface = HeadlessSurface::webgl1(HeadlessConfig::webgl1_bare(), 8, 8);
        let ctx = ctx_with(&mut surface);
        let shader = Shader::new(&ctx, ShaderSpec::new(VS, FS)).expect("shader");
        let buf = Buffer::vertex(&ctx, &[0.0; 3], Usage::Static).expect("buffer");
        let mut layout = VertexLayout::new(&ctx, true).expect("layout");
        layout
            .add_attribute(&ctx, &shader, "offset", &buf, AttributeSpec::new(3))
            .expect("offset");
        let err = layout
            .make_instanced_attribute(&ctx, "offset")
            .expect_err("no instancing");
        assert!(matches!(err, EngineError::CapabilityUnavailable(_)));
        assert!(layout.attribute("offset").is_some_and(|a| !a.is_instanced()));
    }

    #[test]
    fn disabled_attribute_is_skipped_on_bind() {
        let mut surface = HeadlessSurface::webgl1(HeadlessConfig::webgl1_bare(), 8, 8);
        let ctx = ctx_with(&mut surface);
        let shader = Shader::new(&ctx, ShaderSpec::new(VS, FS)).expect("shader");
        let buf = Buffer::vertex(&ctx, &[0.0; 6], Usage::Static).expect("buffer");
        let mut layout = VertexLayout::new(&ctx, false).expect("layout");
        layout
            .add_attribute(&ctx, &shader, "uv", &buf, AttributeSpec::new(2))
            .expect("uv");
        layout.disable_attribute(&ctx, "uv").expect("disable");
        layout.bind(&ctx);
        assert!(ctx.gl().bindings().enabled_attribs.is_empty());
        layout.unbind(&ctx);
    }
}
