//! Shader programs: preprocessing, compile/link, uniform + attribute reflection, and
//! typed uniform upload.

use std::collections::{BTreeMap, HashMap};

use glam::{Mat3, Mat4};
use glint_core::EngineError;
use tracing::{debug, trace, warn};

use crate::camera::Camera;
use crate::context::{GlslDialect, RenderingContext};
use crate::device::GpuDevice;

/// Uniforms every mesh draw uploads.
pub const DEFAULT_UNIFORMS: &[&str] = &[
    "projectionMatrix",
    "modelMatrix",
    "modelViewMatrix",
    "normalMatrix",
    "viewMatrix",
    "time",
    "uTime",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn gl(self) -> u32 {
        match self {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        }
    }
}

/// GLSL source for one stage: one string, or fragments concatenated in order
/// (e.g. a noise library followed by the main body).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderSource {
    Single(String),
    Fragments(Vec<String>),
}

impl ShaderSource {
    pub fn concat(&self) -> String {
        match self {
            ShaderSource::Single(s) => s.clone(),
            ShaderSource::Fragments(parts) => parts.concat(),
        }
    }

    /// Pick between a legacy and a modern source depending on the context.
    pub fn for_context<D: GpuDevice>(
        ctx: &RenderingContext<D>,
        legacy: impl Into<ShaderSource>,
        modern: impl Into<ShaderSource>,
    ) -> Self {
        if ctx.dialect().is_modern() {
            modern.into()
        } else {
            legacy.into()
        }
    }
}

impl From<&str> for ShaderSource {
    fn from(s: &str) -> Self {
        ShaderSource::Single(s.to_string())
    }
}

impl From<String> for ShaderSource {
    fn from(s: String) -> Self {
        ShaderSource::Single(s)
    }
}

impl From<Vec<String>> for ShaderSource {
    fn from(parts: Vec<String>) -> Self {
        ShaderSource::Fragments(parts)
    }
}

impl From<&[&str]> for ShaderSource {
    fn from(parts: &[&str]) -> Self {
        ShaderSource::Fragments(parts.iter().map(|p| p.to_string()).collect())
    }
}

/// A uniform to resolve: a plain location, or a uniform block (buffer-backed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniformDecl {
    Plain(String),
    Block { name: String, binding: Option<u32> },
}

impl UniformDecl {
    pub fn name(&self) -> &str {
        match self {
            UniformDecl::Plain(name) | UniformDecl::Block { name, .. } => name,
        }
    }
}

impl From<&str> for UniformDecl {
    fn from(name: &str) -> Self {
        UniformDecl::Plain(name.to_string())
    }
}

impl From<String> for UniformDecl {
    fn from(name: String) -> Self {
        UniformDecl::Plain(name)
    }
}

/// `[name, componentCount, explicitLocation?]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDecl {
    pub name: String,
    pub size: i32,
    pub location: Option<u32>,
}

impl From<(&str, i32)> for AttributeDecl {
    fn from((name, size): (&str, i32)) -> Self {
        Self {
            name: name.to_string(),
            size,
            location: None,
        }
    }
}

impl From<(&str, i32, u32)> for AttributeDecl {
    fn from((name, size, location): (&str, i32, u32)) -> Self {
        Self {
            name: name.to_string(),
            size,
            location: Some(location),
        }
    }
}

/// How captured varyings are laid out in the transform feedback buffers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeedbackMode {
    /// All varyings written into one buffer, one vertex after another.
    #[default]
    Interleaved,
    /// Varying `i` goes to the buffer bound at index `i`.
    Separate,
}

impl FeedbackMode {
    pub fn gl(self) -> u32 {
        match self {
            FeedbackMode::Interleaved => glow::INTERLEAVED_ATTRIBS,
            FeedbackMode::Separate => glow::SEPARATE_ATTRIBS,
        }
    }
}

/// Everything needed to build a [`Shader`].
#[derive(Debug, Clone)]
pub struct ShaderSpec {
    pub vertex: ShaderSource,
    pub fragment: ShaderSource,
    pub uniforms: Vec<UniformDecl>,
    pub attributes: Vec<AttributeDecl>,
    /// Transform feedback outputs (modern contexts only).
    pub varyings: Vec<String>,
    pub feedback_mode: FeedbackMode,
    /// Fragment float precision, `highp` when unset.
    pub precision: Option<String>,
    /// Full `#version ...` line overriding the context default.
    pub version: Option<String>,
}

impl ShaderSpec {
    pub fn new(vertex: impl Into<ShaderSource>, fragment: impl Into<ShaderSource>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
            uniforms: Vec::new(),
            attributes: Vec::new(),
            varyings: Vec::new(),
            feedback_mode: FeedbackMode::default(),
            precision: None,
            version: None,
        }
    }

    pub fn uniform(mut self, decl: impl Into<UniformDecl>) -> Self {
        self.uniforms.push(decl.into());
        self
    }

    pub fn uniforms<I, U>(mut self, decls: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<UniformDecl>,
    {
        self.uniforms.extend(decls.into_iter().map(Into::into));
        self
    }

    pub fn uniform_block(mut self, name: &str, binding: Option<u32>) -> Self {
        self.uniforms.push(UniformDecl::Block {
            name: name.to_string(),
            binding,
        });
        self
    }

    /// Adds the names in [`DEFAULT_UNIFORMS`] that are not declared yet.
    pub fn with_default_uniforms(mut self) -> Self {
        for name in DEFAULT_UNIFORMS {
            if !self.uniforms.iter().any(|u| u.name() == *name) {
                self.uniforms.push((*name).into());
            }
        }
        self
    }

    pub fn attribute(mut self, decl: impl Into<AttributeDecl>) -> Self {
        self.attributes.push(decl.into());
        self
    }

    pub fn varyings<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.varyings.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn feedback_mode(mut self, mode: FeedbackMode) -> Self {
        self.feedback_mode = mode;
        self
    }

    pub fn precision(mut self, precision: &str) -> Self {
        self.precision = Some(precision.to_string());
        self
    }

    pub fn version(mut self, directive: &str) -> Self {
        self.version = Some(directive.to_string());
        self
    }
}

/// Prepend the version directive (both stages) and the float precision (fragment only).
///
/// Sources that already start with `#version` are returned unchanged.
pub fn preprocess(
    body: &str,
    stage: ShaderStage,
    dialect: GlslDialect,
    precision: Option<&str>,
    version: Option<&str>,
) -> String {
    if body.trim_start().starts_with("#version") {
        return body.to_string();
    }
    let mut out = String::with_capacity(body.len() + 48);
    if let Some(v) = version.or(dialect.version_directive()) {
        out.push_str(v);
        out.push('\n');
    }
    if stage == ShaderStage::Fragment {
        out.push_str("precision ");
        out.push_str(precision.unwrap_or("highp"));
        out.push_str(" float;\n");
    }
    out.push_str(body);
    out
}

pub fn compile_shader<D: GpuDevice>(
    gl: &D,
    stage: ShaderStage,
    source: &str,
) -> Result<D::Shader, EngineError> {
    let shader = gl
        .create_shader(stage.gl())
        .map_err(|e| EngineError::GlCreate(format!("create_shader({stage:?}) failed: {e}")))?;
    gl.shader_source(shader, source);
    gl.compile_shader(shader);
    if !gl.get_shader_compile_status(shader) {
        let log = gl.get_shader_info_log(shader);
        gl.delete_shader(shader);
        return Err(match stage {
            ShaderStage::Vertex => EngineError::VertexCompile(log),
            ShaderStage::Fragment => EngineError::FragmentCompile(log),
        });
    }
    Ok(shader)
}

/// Link `vs` + `fs`. Both shader objects are detached and deleted whatever the outcome.
pub fn link_program<D: GpuDevice>(
    gl: &D,
    vs: D::Shader,
    fs: D::Shader,
    attribute_bindings: &[(u32, &str)],
    varyings: &[&str],
    feedback_mode: FeedbackMode,
) -> Result<D::Program, EngineError> {
    let program = match gl.create_program() {
        Ok(p) => p,
        Err(e) => {
            gl.delete_shader(vs);
            gl.delete_shader(fs);
            return Err(EngineError::GlCreate(format!("create_program failed: {e}")));
        }
    };
    gl.attach_shader(program, vs);
    gl.attach_shader(program, fs);
    for &(index, name) in attribute_bindings {
        gl.bind_attrib_location(program, index, name);
    }
    if !varyings.is_empty() {
        gl.transform_feedback_varyings(program, varyings, feedback_mode.gl());
    }
    gl.link_program(program);

    gl.detach_shader(program, vs);
    gl.detach_shader(program, fs);
    gl.delete_shader(vs);
    gl.delete_shader(fs);

    if !gl.get_program_link_status(program) {
        let log = gl.get_program_info_log(program);
        gl.delete_program(program);
        return Err(EngineError::Link(log));
    }
    Ok(program)
}

/// Resolution result for one declared uniform.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformSlot<L> {
    Location(L),
    Block(u32),
    /// Declared but not active in the program; writes are no-ops.
    Missing,
}

impl<L> UniformSlot<L> {
    pub fn is_missing(&self) -> bool {
        matches!(self, UniformSlot::Missing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeMeta {
    pub size: i32,
    /// `None` when the linker dropped the attribute.
    pub location: Option<u32>,
    /// Location was bound before linking rather than assigned by the linker.
    pub explicit: bool,
}

#[derive(Debug)]
pub struct Shader<D: GpuDevice> {
    program: D::Program,
    vertex_source: String,
    fragment_source: String,
    uniforms: HashMap<String, UniformSlot<D::UniformLocation>>,
    attributes: BTreeMap<String, AttributeMeta>,
}

impl<D: GpuDevice> Shader<D> {
    pub fn new(ctx: &RenderingContext<D>, spec: ShaderSpec) -> Result<Self, EngineError> {
        let gl = ctx.gl();
        let dialect = ctx.dialect();
        let precision = spec.precision.as_deref();
        let version = spec.version.as_deref();

        let vertex_source = preprocess(
            &spec.vertex.concat(),
            ShaderStage::Vertex,
            dialect,
            precision,
            version,
        );
        let fragment_source = preprocess(
            &spec.fragment.concat(),
            ShaderStage::Fragment,
            dialect,
            precision,
            version,
        );

        let vs = compile_shader(gl, ShaderStage::Vertex, &vertex_source)?;
        let fs = match compile_shader(gl, ShaderStage::Fragment, &fragment_source) {
            Ok(fs) => fs,
            Err(e) => {
                gl.delete_shader(vs);
                return Err(e);
            }
        };

        let bindings: Vec<(u32, &str)> = spec
            .attributes
            .iter()
            .filter_map(|a| a.location.map(|loc| (loc, a.name.as_str())))
            .collect();
        let varyings: Vec<&str> = if spec.varyings.is_empty() {
            Vec::new()
        } else if ctx.is_modern() {
            spec.varyings.iter().map(String::as_str).collect()
        } else {
            warn!(
                count = spec.varyings.len(),
                "transform feedback needs a modern context; varyings ignored"
            );
            Vec::new()
        };
        let program = link_program(gl, vs, fs, &bindings, &varyings, spec.feedback_mode)?;

        let mut shader = Self {
            program,
            vertex_source,
            fragment_source,
            uniforms: HashMap::with_capacity(spec.uniforms.len()),
            attributes: BTreeMap::new(),
        };
        for decl in &spec.uniforms {
            shader.resolve_uniform(ctx, decl);
        }
        for decl in &spec.attributes {
            let location = decl
                .location
                .or_else(|| gl.get_attrib_location(program, &decl.name));
            shader.attributes.insert(
                decl.name.clone(),
                AttributeMeta {
                    size: decl.size,
                    location,
                    explicit: decl.location.is_some(),
                },
            );
        }

        let missing: Vec<&str> = shader
            .uniforms
            .iter()
            .filter(|(_, slot)| slot.is_missing())
            .map(|(name, _)| name.as_str())
            .collect();
        debug!(
            uniforms = shader.uniforms.len(),
            ?missing,
            attributes = shader.attributes.len(),
            "shader built"
        );
        Ok(shader)
    }

    fn resolve_uniform(&mut self, ctx: &RenderingContext<D>, decl: &UniformDecl) {
        let gl = ctx.gl();
        let slot = match decl {
            UniformDecl::Plain(name) => match gl.get_uniform_location(self.program, name) {
                Some(loc) => UniformSlot::Location(loc),
                None => UniformSlot::Missing,
            },
            UniformDecl::Block { name, .. } if !ctx.is_modern() => {
                warn!(block = %name, "uniform blocks need a modern context; left unresolved");
                UniformSlot::Missing
            }
            UniformDecl::Block { name, binding } => {
                match gl.get_uniform_block_index(self.program, name) {
                    Some(index) => {
                        if let Some(binding) = binding {
                            gl.uniform_block_binding(self.program, index, *binding);
                        }
                        UniformSlot::Block(index)
                    }
                    None => UniformSlot::Missing,
                }
            }
        };
        self.uniforms.insert(decl.name().to_string(), slot);
    }

    /// Resolve `names` that are not in the uniform map yet.
    pub fn ensure_uniforms(&mut self, ctx: &RenderingContext<D>, names: &[&str]) {
        for name in names {
            if !self.uniforms.contains_key(*name) {
                self.resolve_uniform(ctx, &UniformDecl::Plain(name.to_string()));
            }
        }
    }

    pub fn program(&self) -> D::Program {
        self.program
    }

    pub fn vertex_source(&self) -> &str {
        &self.vertex_source
    }

    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }

    pub fn uniforms(&self) -> &HashMap<String, UniformSlot<D::UniformLocation>> {
        &self.uniforms
    }

    pub fn uniform_slot(&self, name: &str) -> Option<&UniformSlot<D::UniformLocation>> {
        self.uniforms.get(name)
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttributeMeta> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeMeta> {
        self.attributes.get(name)
    }

    /// Location of `name`: declared metadata first, then the linker.
    pub fn attribute_location(&self, ctx: &RenderingContext<D>, name: &str) -> Option<u32> {
        self.attributes
            .get(name)
            .and_then(|a| a.location)
            .or_else(|| ctx.gl().get_attrib_location(self.program, name))
    }

    pub fn bind(&self, ctx: &RenderingContext<D>) {
        ctx.gl().use_program(Some(self.program));
    }

    pub fn unbind(&self, ctx: &RenderingContext<D>) {
        ctx.gl().use_program(None);
    }

    /// Bind and upload the camera's projection and view matrices.
    pub fn bind_with_camera(
        &self,
        ctx: &RenderingContext<D>,
        camera: &Camera,
    ) -> Result<(), EngineError> {
        self.bind(ctx);
        self.set_matrix4(ctx, "projectionMatrix", &camera.projection_matrix())?;
        self.set_matrix4(ctx, "viewMatrix", &camera.view_matrix())
    }

    pub fn bind_uniform_block(&self, ctx: &RenderingContext<D>, name: &str, binding: u32) {
        match self.uniforms.get(name) {
            Some(UniformSlot::Block(index)) => {
                ctx.gl().uniform_block_binding(self.program, *index, binding)
            }
            _ => trace!(uniform = name, "not a resolved uniform block; binding skipped"),
        }
    }

    // ---- Uniform upload (program must be bound) ----

    fn location(&self, name: &str) -> Option<&D::UniformLocation> {
        match self.uniforms.get(name) {
            Some(UniformSlot::Location(loc)) => Some(loc),
            _ => {
                trace!(uniform = name, "uniform not resolved; write skipped");
                None
            }
        }
    }

    pub fn set_mat4(
        &self,
        ctx: &RenderingContext<D>,
        name: &str,
        value: &[f32],
    ) -> Result<(), EngineError> {
        check_shape(name, value, 16, "16 (mat4)")?;
        if let Some(loc) = self.location(name) {
            ctx.gl().uniform_matrix_4_f32_slice(Some(loc), false, value);
        }
        Ok(())
    }

    pub fn set_mat3(
        &self,
        ctx: &RenderingContext<D>,
        name: &str,
        value: &[f32],
    ) -> Result<(), EngineError> {
        check_shape(name, value, 9, "9 (mat3)")?;
        if let Some(loc) = self.location(name) {
            ctx.gl().uniform_matrix_3_f32_slice(Some(loc), false, value);
        }
        Ok(())
    }

    pub fn set_vec2(
        &self,
        ctx: &RenderingContext<D>,
        name: &str,
        value: &[f32],
    ) -> Result<(), EngineError> {
        check_shape(name, value, 2, "2 (vec2)")?;
        if let Some(loc) = self.location(name) {
            ctx.gl().uniform_2_f32(Some(loc), value[0], value[1]);
        }
        Ok(())
    }

    pub fn set_vec3(
        &self,
        ctx: &RenderingContext<D>,
        name: &str,
        value: &[f32],
    ) -> Result<(), EngineError> {
        check_shape(name, value, 3, "3 (vec3)")?;
        if let Some(loc) = self.location(name) {
            ctx.gl().uniform_3_f32(Some(loc), value[0], value[1], value[2]);
        }
        Ok(())
    }

    pub fn set_vec4(
        &self,
        ctx: &RenderingContext<D>,
        name: &str,
        value: &[f32],
    ) -> Result<(), EngineError> {
        check_shape(name, value, 4, "4 (vec4)")?;
        if let Some(loc) = self.location(name) {
            ctx.gl()
                .uniform_4_f32(Some(loc), value[0], value[1], value[2], value[3]);
        }
        Ok(())
    }

    pub fn set_float(&self, ctx: &RenderingContext<D>, name: &str, value: f32) {
        if let Some(loc) = self.location(name) {
            ctx.gl().uniform_1_f32(Some(loc), value);
        }
    }

    pub fn set_int(&self, ctx: &RenderingContext<D>, name: &str, value: i32) {
        if let Some(loc) = self.location(name) {
            ctx.gl().uniform_1_i32(Some(loc), value);
        }
    }

    pub fn set_bool(&self, ctx: &RenderingContext<D>, name: &str, value: bool) {
        self.set_int(ctx, name, value as i32);
    }

    /// Point a sampler uniform at texture `unit`.
    pub fn set_texture(&self, ctx: &RenderingContext<D>, name: &str, unit: u32) {
        self.set_int(ctx, name, unit as i32);
    }

    pub fn set_matrix4(
        &self,
        ctx: &RenderingContext<D>,
        name: &str,
        m: &Mat4,
    ) -> Result<(), EngineError> {
        self.set_mat4(ctx, name, &m.to_cols_array())
    }

    pub fn set_matrix3(
        &self,
        ctx: &RenderingContext<D>,
        name: &str,
        m: &Mat3,
    ) -> Result<(), EngineError> {
        self.set_mat3(ctx, name, &m.to_cols_array())
    }

    /// Upload `value`, picking the setter from its length:
    /// 16 is a mat4, 3 a vec3, 2 a vec2, 1 a float. Anything else is a shape error.
    pub fn uniform(
        &self,
        ctx: &RenderingContext<D>,
        name: &str,
        value: &[f32],
    ) -> Result<(), EngineError> {
        match value.len() {
            16 => self.set_mat4(ctx, name, value),
            3 => self.set_vec3(ctx, name, value),
            2 => self.set_vec2(ctx, name, value),
            1 => {
                self.set_float(ctx, name, value[0]);
                Ok(())
            }
            got => Err(EngineError::UniformShape {
                name: name.to_string(),
                expected: "16, 3, 2 or 1",
                got,
            }),
        }
    }

    pub fn destroy(self, ctx: &RenderingContext<D>) {
        ctx.gl().delete_program(self.program);
    }
}

fn check_shape(
    name: &str,
    value: &[f32],
    len: usize,
    expected: &'static str,
) -> Result<(), EngineError> {
    if value.len() == len {
        Ok(())
    } else {
        Err(EngineError::UniformShape {
            name: name.to_string(),
            expected,
            got: value.len(),
        })
    }
}
