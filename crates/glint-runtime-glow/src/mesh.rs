//! Drawable meshes: a shader, its vertex layout, the buffers feeding it and a model transform.
//!
//! Attributes and indices can only be added once a shader is set, since the shader owns
//! the attribute locations. Before that they are ignored.

use std::collections::BTreeMap;

use glam::{Mat3, Mat4, Vec3};
use glint_core::EngineError;
use tracing::trace;

use crate::buffer::{Buffer, BufferKind, BufferSource, Usage};
use crate::camera::Camera;
use crate::context::{DrawMode, RenderingContext};
use crate::device::GpuDevice;
use crate::shader::{Shader, ShaderSpec, DEFAULT_UNIFORMS};
use crate::vertex_layout::{AttributeSpec, VertexLayout};

/// Short aliases uploaded next to `modelMatrix` / `viewMatrix`.
const SHORT_UNIFORMS: &[&str] = &["model", "view"];

/// The draw call a mesh issues for its current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawDispatch {
    Arrays { count: i32 },
    Elements { count: i32 },
    ArraysInstanced { count: i32, instances: i32 },
    ElementsInstanced { count: i32, instances: i32 },
}

impl DrawDispatch {
    fn issue<D: GpuDevice>(self, ctx: &RenderingContext<D>, mode: DrawMode) -> Result<(), EngineError> {
        match self {
            DrawDispatch::Arrays { count } => ctx.draw_arrays(mode, 0, count),
            DrawDispatch::Elements { count } => ctx.draw_elements(mode, count, 0),
            DrawDispatch::ArraysInstanced { count, instances } => {
                ctx.draw_arrays_instanced(mode, 0, count, instances)?
            }
            DrawDispatch::ElementsInstanced { count, instances } => {
                ctx.draw_elements_instanced(mode, count, 0, instances)?
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Bound<D: GpuDevice> {
    shader: Shader<D>,
    layout: VertexLayout<D>,
}

#[derive(Debug)]
pub struct Mesh<D: GpuDevice> {
    bound: Option<Bound<D>>,
    attributes: BTreeMap<String, Buffer<D>>,
    indices: Option<Buffer<D>>,
    mode: DrawMode,
    vertex_count: i32,
    vertex_count_locked: bool,
    instanced: bool,
    num_instances: i32,
    model: Mat4,
    position: Vec3,
    /// Accumulated rotation in degrees, per axis.
    rotation: Vec3,
    scale: Vec3,
}

impl<D: GpuDevice> Default for Mesh<D> {
    fn default() -> Self {
        Self::new(DrawMode::Triangles)
    }
}

impl<D: GpuDevice> Mesh<D> {
    pub fn new(mode: DrawMode) -> Self {
        Self {
            bound: None,
            attributes: BTreeMap::new(),
            indices: None,
            mode,
            vertex_count: 3,
            vertex_count_locked: false,
            instanced: false,
            num_instances: 1,
            model: Mat4::IDENTITY,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }

    /// Build `spec` (plus the default uniform set) and make it this mesh's shader.
    pub fn with_shader(
        ctx: &RenderingContext<D>,
        spec: ShaderSpec,
        mode: DrawMode,
    ) -> Result<Self, EngineError> {
        let mut mesh = Self::new(mode);
        mesh.set_shader(ctx, Shader::new(ctx, spec.with_default_uniforms())?)?;
        Ok(mesh)
    }

    /// Attach `shader`. A previous shader and everything bound to it are released.
    pub fn set_shader(
        &mut self,
        ctx: &RenderingContext<D>,
        mut shader: Shader<D>,
    ) -> Result<(), EngineError> {
        let layout = VertexLayout::new(ctx, true)?;
        shader.ensure_uniforms(ctx, DEFAULT_UNIFORMS);
        shader.ensure_uniforms(ctx, SHORT_UNIFORMS);
        if let Some(old) = self.bound.take() {
            self.release_buffers(ctx);
            old.layout.destroy(ctx);
            old.shader.destroy(ctx);
        }
        self.bound = Some(Bound { shader, layout });
        Ok(())
    }

    pub fn has_shader(&self) -> bool {
        self.bound.is_some()
    }

    pub fn shader(&self) -> Option<&Shader<D>> {
        self.bound.as_ref().map(|b| &b.shader)
    }

    pub fn layout(&self) -> Option<&VertexLayout<D>> {
        self.bound.as_ref().map(|b| &b.layout)
    }

    pub fn attribute_buffer(&self, name: &str) -> Option<&Buffer<D>> {
        self.attributes.get(name)
    }

    pub fn index_buffer(&self) -> Option<&Buffer<D>> {
        self.indices.as_ref()
    }

    /// Upload `data` into a new vertex buffer and bind it to attribute `name`.
    pub fn add_attribute<'a>(
        &mut self,
        ctx: &RenderingContext<D>,
        name: &str,
        data: impl Into<BufferSource<'a>>,
        spec: AttributeSpec,
    ) -> Result<(), EngineError> {
        if self.bound.is_none() {
            trace!(attribute = name, "no shader set; attribute ignored");
            return Ok(());
        }
        let buffer = Buffer::new(ctx, BufferKind::Vertex, Some(data.into()), Usage::Static)?;
        self.add_attribute_buffer(ctx, name, buffer, spec)
    }

    /// Bind a pre-built vertex buffer to attribute `name`. The mesh takes ownership.
    pub fn add_attribute_buffer(
        &mut self,
        ctx: &RenderingContext<D>,
        name: &str,
        buffer: Buffer<D>,
        spec: AttributeSpec,
    ) -> Result<(), EngineError> {
        let Some(bound) = self.bound.as_mut() else {
            trace!(attribute = name, "no shader set; attribute ignored");
            buffer.destroy(ctx);
            return Ok(());
        };
        if let Err(e) = bound
            .layout
            .add_attribute(ctx, &bound.shader, name, &buffer, spec)
        {
            buffer.destroy(ctx);
            return Err(e);
        }
        if !self.vertex_count_locked && self.attributes.is_empty() && spec.size > 0 {
            self.vertex_count = (buffer.len() / spec.size as usize) as i32;
        }
        if let Some(old) = self.attributes.insert(name.to_string(), buffer) {
            old.destroy(ctx);
        }
        Ok(())
    }

    /// Like [`Mesh::add_attribute`], advancing once per instance.
    ///
    /// Fails with `CapabilityUnavailable` when the context cannot draw instanced. The mesh
    /// is left as it was.
    pub fn add_instanced_attribute<'a>(
        &mut self,
        ctx: &RenderingContext<D>,
        name: &str,
        data: impl Into<BufferSource<'a>>,
        spec: AttributeSpec,
    ) -> Result<(), EngineError> {
        if self.bound.is_none() {
            trace!(attribute = name, "no shader set; instanced attribute ignored");
            return Ok(());
        }
        let buffer = Buffer::new(ctx, BufferKind::Vertex, Some(data.into()), Usage::Static)?;
        self.add_instanced_attribute_buffer(ctx, name, buffer, spec)
    }

    pub fn add_instanced_attribute_buffer(
        &mut self,
        ctx: &RenderingContext<D>,
        name: &str,
        buffer: Buffer<D>,
        spec: AttributeSpec,
    ) -> Result<(), EngineError> {
        if self.bound.is_none() {
            trace!(attribute = name, "no shader set; instanced attribute ignored");
            buffer.destroy(ctx);
            return Ok(());
        }
        if !ctx.capabilities().supports_instancing() {
            buffer.destroy(ctx);
            return Err(EngineError::CapabilityUnavailable(format!(
                "instanced attribute `{name}` needs ANGLE_instanced_arrays"
            )));
        }
        // Keep the per-vertex count inference away from per-instance data.
        let locked = self.vertex_count_locked;
        let count = self.vertex_count;
        self.vertex_count_locked = true;
        let added = self.add_attribute_buffer(ctx, name, buffer, spec);
        self.vertex_count_locked = locked;
        self.vertex_count = count;
        added?;

        if let Some(bound) = self.bound.as_mut() {
            bound.layout.make_instanced_attribute(ctx, name)?;
        }
        self.instanced = true;
        Ok(())
    }

    /// Overwrite the data of attribute `name` in place (same size as before).
    pub fn update_attribute<'a>(
        &mut self,
        ctx: &RenderingContext<D>,
        name: &str,
        data: impl Into<BufferSource<'a>>,
    ) -> Result<(), EngineError> {
        let buffer = self
            .attributes
            .get_mut(name)
            .ok_or_else(|| EngineError::AttributeNotFound(name.to_string()))?;
        buffer.update(ctx, data.into())
    }

    /// Upload 16-bit indices; the draw count becomes the index count.
    pub fn add_indices<'a>(
        &mut self,
        ctx: &RenderingContext<D>,
        data: impl Into<BufferSource<'a>>,
    ) -> Result<(), EngineError> {
        if self.bound.is_none() {
            trace!("no shader set; indices ignored");
            return Ok(());
        }
        let buffer = Buffer::new(ctx, BufferKind::Index, Some(data.into()), Usage::Static)?;
        if let Some(old) = self.indices.replace(buffer) {
            old.destroy(ctx);
        }
        Ok(())
    }

    pub fn has_indices(&self) -> bool {
        self.indices.is_some()
    }

    pub fn is_instanced(&self) -> bool {
        self.instanced
    }

    pub fn set_num_instances(&mut self, n: i32) {
        self.num_instances = n.max(0);
    }

    pub fn num_instances(&self) -> i32 {
        self.num_instances
    }

    /// Vertices per non-indexed draw. Overrides the count inferred from the first attribute.
    pub fn set_vertex_count(&mut self, n: i32) {
        self.vertex_count = n.max(0);
        self.vertex_count_locked = true;
    }

    pub fn vertex_count(&self) -> i32 {
        self.vertex_count
    }

    pub fn set_mode(&mut self, mode: DrawMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> DrawMode {
        self.mode
    }

    /// Which of the four draw calls the current state maps to.
    pub fn dispatch(&self) -> DrawDispatch {
        let instances = self.num_instances;
        match (&self.indices, self.instanced) {
            (Some(idx), false) => DrawDispatch::Elements {
                count: idx.len() as i32,
            },
            (Some(idx), true) => DrawDispatch::ElementsInstanced {
                count: idx.len() as i32,
                instances,
            },
            (None, false) => DrawDispatch::Arrays {
                count: self.vertex_count,
            },
            (None, true) => DrawDispatch::ArraysInstanced {
                count: self.vertex_count,
                instances,
            },
        }
    }

    // ---- Transform ----
    //
    // Every operation post-multiplies the model matrix, so calls compose in the order made.

    pub fn model_matrix(&self) -> Mat4 {
        self.model
    }

    pub fn set_model_matrix(&mut self, model: Mat4) {
        self.model = model;
    }

    pub fn reset_transform(&mut self) {
        self.model = Mat4::IDENTITY;
        self.position = Vec3::ZERO;
        self.rotation = Vec3::ZERO;
        self.scale = Vec3::ONE;
    }

    /// Accumulated translation.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Accumulated rotation in degrees around x, y and z.
    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    /// Accumulated scale.
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn translate(&mut self, offset: Vec3) {
        self.position += offset;
        self.model *= Mat4::from_translation(offset);
    }

    pub fn translate_x(&mut self, x: f32) {
        self.translate(Vec3::new(x, 0.0, 0.0));
    }

    pub fn translate_y(&mut self, y: f32) {
        self.translate(Vec3::new(0.0, y, 0.0));
    }

    pub fn translate_z(&mut self, z: f32) {
        self.translate(Vec3::new(0.0, 0.0, z));
    }

    pub fn scale_model(&mut self, factors: Vec3) {
        self.scale *= factors;
        self.model *= Mat4::from_scale(factors);
    }

    pub fn rotate_x(&mut self, degrees: f32) {
        self.rotation.x += degrees;
        self.model *= Mat4::from_rotation_x(degrees.to_radians());
    }

    pub fn rotate_y(&mut self, degrees: f32) {
        self.rotation.y += degrees;
        self.model *= Mat4::from_rotation_y(degrees.to_radians());
    }

    pub fn rotate_z(&mut self, degrees: f32) {
        self.rotation.z += degrees;
        self.model *= Mat4::from_rotation_z(degrees.to_radians());
    }

    /// Inverse-transpose of the upper 3×3 of `view * model`.
    pub fn normal_matrix(&self, view: &Mat4) -> Mat3 {
        Mat3::from_mat4(*view * self.model).inverse().transpose()
    }

    // ---- Drawing ----

    pub fn draw(&self, ctx: &RenderingContext<D>, camera: &Camera) -> Result<(), EngineError> {
        self.draw_with(ctx, camera, |_, _| Ok(()))
    }

    /// Draw with the camera uniforms, letting `uniforms` set extra values first.
    pub fn draw_with<F>(
        &self,
        ctx: &RenderingContext<D>,
        camera: &Camera,
        uniforms: F,
    ) -> Result<(), EngineError>
    where
        F: FnOnce(&Shader<D>, &RenderingContext<D>) -> Result<(), EngineError>,
    {
        let Some(bound) = &self.bound else {
            trace!("no shader set; draw skipped");
            return Ok(());
        };
        let shader = &bound.shader;
        shader.bind(ctx);
        let result = self
            .upload_camera(ctx, shader, camera)
            .and_then(|()| uniforms(shader, ctx))
            .and_then(|()| self.dispatch_bound(ctx, bound));
        shader.unbind(ctx);
        result
    }

    /// Draw without camera uniforms (screen-space geometry).
    pub fn draw_ortho<F>(&self, ctx: &RenderingContext<D>, uniforms: F) -> Result<(), EngineError>
    where
        F: FnOnce(&Shader<D>, &RenderingContext<D>) -> Result<(), EngineError>,
    {
        let Some(bound) = &self.bound else {
            trace!("no shader set; draw skipped");
            return Ok(());
        };
        bound.shader.bind(ctx);
        let result = uniforms(&bound.shader, ctx).and_then(|()| self.dispatch_bound(ctx, bound));
        bound.shader.unbind(ctx);
        result
    }

    fn upload_camera(
        &self,
        ctx: &RenderingContext<D>,
        shader: &Shader<D>,
        camera: &Camera,
    ) -> Result<(), EngineError> {
        let view = camera.view_matrix();
        shader.set_matrix4(ctx, "projectionMatrix", &camera.projection_matrix())?;
        shader.set_matrix4(ctx, "modelViewMatrix", &(view * self.model))?;
        shader.set_matrix3(ctx, "normalMatrix", &self.normal_matrix(&view))?;
        shader.set_matrix4(ctx, "viewMatrix", &view)?;
        shader.set_matrix4(ctx, "view", &view)?;
        shader.set_matrix4(ctx, "modelMatrix", &self.model)?;
        shader.set_matrix4(ctx, "model", &self.model)
    }

    fn dispatch_bound(&self, ctx: &RenderingContext<D>, bound: &Bound<D>) -> Result<(), EngineError> {
        bound.layout.bind(ctx);
        if let Some(indices) = &self.indices {
            indices.bind(ctx);
        }
        let result = self.dispatch().issue(ctx, self.mode);
        if let Some(indices) = &self.indices {
            indices.unbind(ctx);
        }
        bound.layout.unbind(ctx);
        result
    }

    fn release_buffers(&mut self, ctx: &RenderingContext<D>) {
        for (_, buffer) in std::mem::take(&mut self.attributes) {
            buffer.destroy(ctx);
        }
        if let Some(indices) = self.indices.take() {
            indices.destroy(ctx);
        }
        self.instanced = false;
    }

    pub fn destroy(mut self, ctx: &RenderingContext<D>) {
        self.release_buffers(ctx);
        if let Some(bound) = self.bound.take() {
            bound.layout.destroy(ctx);
            bound.shader.destroy(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{create_context, ApiVariant};
    use crate::headless::{HeadlessConfig, HeadlessDevice, HeadlessSurface};
    use glint_core::ContextOptions;

    const VS: &str = "in vec3 position;\nin vec3 offset;\n\
        uniform mat4 projectionMatrix;\nuniform mat4 modelViewMatrix;\n\
        uniform mat3 normalMatrix;\nuniform mat4 modelMatrix;\nuniform mat4 model;\n\
        uniform mat4 viewMatrix;\nuniform mat4 view;\nvoid main() {}\n";
    const FS: &str = "uniform float tint;\nout vec4 o;\nvoid main() {}\n";

    const QUAD: [f32; 12] = [
        -1.0, -1.0, 0.0, 1.0, -1.0, 0.0, 1.0, 1.0, 0.0, -1.0, 1.0, 0.0,
    ];

    fn ctx() -> RenderingContext<HeadlessDevice> {
        create_context(&mut HeadlessSurface::webgl2(16, 16), &ContextOptions::default())
            .expect("context")
    }

    fn mesh(ctx: &RenderingContext<HeadlessDevice>) -> Mesh<HeadlessDevice> {
        Mesh::with_shader(ctx, ShaderSpec::new(VS, FS).uniform("tint"), DrawMode::Triangles)
            .expect("mesh")
    }

    fn camera() -> Camera {
        let mut cam = Camera::perspective(60.0, 1.0, 0.1, 100.0);
        cam.look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        cam
    }

    #[test]
    fn attributes_before_shader_are_ignored() {
        let ctx = ctx();
        let mut mesh = Mesh::<HeadlessDevice>::new(DrawMode::Triangles);
        mesh.add_attribute(&ctx, "position", &QUAD[..], AttributeSpec::new(3))
            .expect("ignored");
        mesh.add_indices(&ctx, &[0u16, 1, 2][..]).expect("ignored");
        assert!(mesh.attribute_buffer("position").is_none());
        assert!(!mesh.has_indices());
        mesh.draw(&ctx, &camera()).expect("no-op");
        assert!(ctx.gl().draw_calls().is_empty());
    }

    #[test]
    fn indexed_quad_is_one_element_draw() {
        let ctx = ctx();
        let mut mesh = mesh(&ctx);
        mesh.add_attribute(&ctx, "position", &QUAD[..], AttributeSpec::new(3))
            .expect("position");
        mesh.add_indices(&ctx, &[0u16, 1, 2, 0, 2, 3][..]).expect("indices");

        mesh.draw(&ctx, &camera()).expect("draw");
        let calls = ctx.gl().take_draw_calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].is_indexed());
        assert!(!calls[0].is_instanced());
        assert_eq!(calls[0].count, 6);
        assert_eq!(calls[0].element_type, Some(glow::UNSIGNED_SHORT));
        assert_eq!(
            calls[0].element_buffer,
            mesh.index_buffer().map(|b| b.handle())
        );
    }

    #[test]
    fn vertex_count_follows_first_attribute() {
        let ctx = ctx();
        let mut mesh = mesh(&ctx);
        mesh.add_attribute(&ctx, "position", &QUAD[..], AttributeSpec::new(3))
            .expect("position");
        assert_eq!(mesh.dispatch(), DrawDispatch::Arrays { count: 4 });
        mesh.set_vertex_count(3);
        assert_eq!(mesh.dispatch(), DrawDispatch::Arrays { count: 3 });
    }

    #[test]
    fn non_indexed_instanced_draw_is_dispatched() {
        let ctx = ctx();
        let mut mesh = mesh(&ctx);
        mesh.add_attribute(&ctx, "position", &QUAD[..], AttributeSpec::new(3))
            .expect("position");
        mesh.add_instanced_attribute(&ctx, "offset", &[0.0f32; 30][..], AttributeSpec::new(3))
            .expect("offset");
        mesh.set_num_instances(10);
        assert_eq!(
            mesh.dispatch(),
            DrawDispatch::ArraysInstanced {
                count: 4,
                instances: 10
            }
        );

        mesh.draw(&ctx, &camera()).expect("draw");
        let calls = ctx.gl().take_draw_calls();
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].is_indexed());
        assert_eq!(calls[0].instances, Some(10));
        assert_eq!(calls[0].count, 4);
    }

    #[test]
    fn indexed_instanced_draw_is_dispatched() {
        let ctx = ctx();
        let mut mesh = mesh(&ctx);
        mesh.add_attribute(&ctx, "position", &QUAD[..], AttributeSpec::new(3))
            .expect("position");
        mesh.add_instanced_attribute(&ctx, "offset", &[0.0f32; 6][..], AttributeSpec::new(3))
            .expect("offset");
        mesh.add_indices(&ctx, &[0u16, 1, 2, 0, 2, 3][..]).expect("indices");
        mesh.set_num_instances(2);

        mesh.draw(&ctx, &camera()).expect("draw");
        let calls = ctx.gl().take_draw_calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].is_indexed() && calls[0].is_instanced());
        assert_eq!((calls[0].count, calls[0].instances), (6, Some(2)));
    }

    #[test]
    fn instanced_attribute_without_instancing_fails() {
        let mut surface = HeadlessSurface::webgl1(HeadlessConfig::webgl1_bare(), 8, 8);
        let ctx = create_context(&mut surface, &ContextOptions::default()).expect("context");
        let vs = "attribute vec3 position;\nattribute vec3 offset;\nvoid main() {}\n";
        let mut mesh = Mesh::with_shader(&ctx, ShaderSpec::new(vs, "void main() {}"), DrawMode::Triangles)
            .expect("mesh");
        let err = mesh
            .add_instanced_attribute(&ctx, "offset", &[0.0f32; 3][..], AttributeSpec::new(3))
            .expect_err("no instancing");
        assert!(matches!(err, EngineError::CapabilityUnavailable(_)));
        assert!(!mesh.is_instanced());
        assert!(mesh.attribute_buffer("offset").is_none());
        assert!(mesh.layout().is_some_and(|l| l.attribute("offset").is_none()));
    }

    #[test]
    fn draw_uploads_default_uniforms_under_both_names() {
        let ctx = ctx();
        let mut mesh = mesh(&ctx);
        mesh.add_attribute(&ctx, "position", &QUAD[..], AttributeSpec::new(3))
            .expect("position");
        mesh.translate(Vec3::new(1.0, 2.0, 3.0));
        let cam = camera();
        mesh.draw_with(&ctx, &cam, |shader, ctx| {
            shader.set_float(ctx, "tint", 0.5);
            Ok(())
        })
        .expect("draw");

        let gl = ctx.gl();
        let program = mesh.shader().map(|s| s.program()).expect("shader");
        let model = mesh.model_matrix().to_cols_array().to_vec();
        let view = cam.view_matrix().to_cols_array().to_vec();
        assert_eq!(gl.uniform_value(program, "modelMatrix"), Some(model.clone()));
        assert_eq!(gl.uniform_value(program, "model"), Some(model));
        assert_eq!(gl.uniform_value(program, "viewMatrix"), Some(view.clone()));
        assert_eq!(gl.uniform_value(program, "view"), Some(view));
        assert_eq!(
            gl.uniform_value(program, "modelViewMatrix"),
            Some((cam.view_matrix() * mesh.model_matrix()).to_cols_array().to_vec())
        );
        assert_eq!(gl.uniform_value(program, "tint"), Some(vec![0.5]));
    }

    #[test]
    fn draw_ortho_skips_camera_uniforms() {
        let ctx = ctx();
        let mut mesh = mesh(&ctx);
        mesh.add_attribute(&ctx, "position", &QUAD[..], AttributeSpec::new(3))
            .expect("position");
        mesh.draw_ortho(&ctx, |_, _| Ok(())).expect("draw");
        let program = mesh.shader().map(|s| s.program()).expect("shader");
        assert_eq!(ctx.gl().uniform_value(program, "projectionMatrix"), None);
        assert_eq!(ctx.gl().draw_calls().len(), 1);
    }

    #[test]
    fn normal_matrix_handles_non_uniform_scale() {
        let mut mesh = Mesh::<HeadlessDevice>::new(DrawMode::Triangles);
        mesh.scale_model(Vec3::new(2.0, 1.0, 1.0));
        let n = mesh.normal_matrix(&Mat4::IDENTITY);
        // a normal of (1, 1, 0) on the stretched surface tilts towards y
        let normal = (n * Vec3::new(1.0, 1.0, 0.0)).normalize();
        assert!((normal.x - 0.5 / 1.25f32.sqrt()).abs() < 1e-5);
        assert!((normal.y - 1.0 / 1.25f32.sqrt()).abs() < 1e-5);
        assert_eq!(mesh.scale(), Vec3::new(2.0, 1.0, 1.0));
    }

    #[test]
    fn transforms_compose_in_call_order() {
        let mut a = Mesh::<HeadlessDevice>::new(DrawMode::Triangles);
        a.translate_x(2.0);
        a.rotate_z(90.0);

        let mut b = Mesh::<HeadlessDevice>::new(DrawMode::Triangles);
        b.rotate_z(90.0);
        b.translate_x(2.0);

        let expected = Mat4::from_translation(Vec3::X * 2.0) * Mat4::from_rotation_z(90f32.to_radians());
        assert!(a.model_matrix().abs_diff_eq(expected, 1e-6));
        assert!(!a.model_matrix().abs_diff_eq(b.model_matrix(), 1e-3));
        assert_eq!(a.position(), Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn rotation_accumulates_per_axis() {
        let mut mesh = Mesh::<HeadlessDevice>::new(DrawMode::Triangles);
        mesh.rotate_x(30.0);
        mesh.rotate_y(-45.0);
        mesh.rotate_x(15.0);
        mesh.rotate_z(90.0);
        assert_eq!(mesh.rotation(), Vec3::new(45.0, -45.0, 90.0));

        mesh.reset_transform();
        assert_eq!(mesh.rotation(), Vec3::ZERO);
        assert_eq!(mesh.model_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn draw_leaves_bindings_as_found() {
        let mut surface = HeadlessSurface::new(
            vec![ApiVariant::WebGl],
            HeadlessConfig::webgl1_full().without_extension("OES_vertex_array_object"),
            (8, 8),
        );
        let ctx = create_context(&mut surface, &ContextOptions::default()).expect("context");
        let vs = "attribute vec3 position;\nvoid main() {}\n";
        let mut mesh = Mesh::with_shader(&ctx, ShaderSpec::new(vs, "void main() {}"), DrawMode::Triangles)
            .expect("mesh");
        mesh.add_attribute(&ctx, "position", &QUAD[..], AttributeSpec::new(3))
            .expect("position");
        mesh.add_indices(&ctx, &[0u16, 1, 2][..]).expect("indices");

        let before = ctx.gl().bindings();
        mesh.draw(&ctx, &camera()).expect("draw");
        assert_eq!(ctx.gl().bindings(), before);
        assert_eq!(ctx.gl().draw_calls().len(), 1);
    }

    #[test]
    fn update_attribute_requires_matching_size() {
        let ctx = ctx();
        let mut mesh = mesh(&ctx);
        mesh.add_attribute(&ctx, "position", &QUAD[..], AttributeSpec::new(3))
            .expect("position");
        mesh.update_attribute(&ctx, "position", &[1.0f32; 12][..])
            .expect("same size");
        let err = mesh
            .update_attribute(&ctx, "position", &[1.0f32; 3][..])
            .expect_err("smaller");
        assert!(matches!(err, EngineError::BufferSizeMismatch { .. }));
        assert!(matches!(
            mesh.update_attribute(&ctx, "normal", &[1.0f32; 3][..]),
            Err(EngineError::AttributeNotFound(_))
        ));
    }
}
