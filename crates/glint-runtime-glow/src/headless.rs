//! A software `GpuDevice` that tracks GL object and binding state without a GPU.
//!
//! It is what the unit and contract tests render against. Shaders are "compiled" by
//! scanning their declarations (a source containing `#error` fails to compile, a stage
//! without `main(` fails to link), clears write into attached texture storage so
//! read-backs are observable, framebuffer completeness is checked structurally, and
//! every draw dispatch is recorded instead of rasterized.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use glint_core::ContextOptions;

use crate::context::{ApiVariant, Surface};
use crate::device::{GpuDevice, FRAMEBUFFER_INCOMPLETE_DIMENSIONS};

/// Object name handed out by [`HeadlessDevice`]. Names are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeadlessId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessUniform {
    program: HeadlessId,
    index: usize,
}

/// Capabilities the fake device advertises.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    pub extensions: BTreeSet<String>,
    pub max_color_attachments: i32,
    pub max_draw_buffers: i32,
    pub max_texture_size: i32,
    /// Size of the default framebuffer.
    pub surface_size: (i32, i32),
}

impl HeadlessConfig {
    /// A WebGL2 class device with float render targets.
    pub fn webgl2() -> Self {
        Self {
            extensions: ["EXT_color_buffer_float"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_color_attachments: 8,
            max_draw_buffers: 8,
            max_texture_size: 4096,
            surface_size: (300, 150),
        }
    }

    /// A WebGL1 device exposing every extension the engine probes for.
    pub fn webgl1_full() -> Self {
        Self {
            extensions: [
                "OES_texture_float",
                "OES_vertex_array_object",
                "ANGLE_instanced_arrays",
                "OES_texture_half_float",
                "OES_texture_float_linear",
                "OES_texture_half_float_linear",
                "WEBGL_color_buffer_float",
                "EXT_color_buffer_half_float",
                "OES_standard_derivatives",
                "WEBGL_draw_buffers",
                "WEBGL_depth_texture",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            max_color_attachments: 4,
            max_draw_buffers: 4,
            max_texture_size: 4096,
            surface_size: (300, 150),
        }
    }

    /// A WebGL1 device with no extensions at all.
    pub fn webgl1_bare() -> Self {
        Self {
            extensions: BTreeSet::new(),
            max_color_attachments: 1,
            max_draw_buffers: 1,
            max_texture_size: 2048,
            surface_size: (300, 150),
        }
    }

    pub fn with_extension(mut self, name: &str) -> Self {
        self.extensions.insert(name.to_string());
        self
    }

    pub fn without_extension(mut self, name: &str) -> Self {
        self.extensions.remove(name);
        self
    }

    pub fn with_max_color_attachments(mut self, max: i32) -> Self {
        self.max_color_attachments = max;
        self.max_draw_buffers = max;
        self
    }

    pub fn with_max_texture_size(mut self, max: i32) -> Self {
        self.max_texture_size = max;
        self
    }
}

/// One recorded draw dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawCall {
    pub mode: u32,
    pub first: i32,
    pub count: i32,
    /// `Some(type)` for indexed draws.
    pub element_type: Option<u32>,
    pub offset: i32,
    /// `Some(n)` for instanced draws.
    pub instances: Option<i32>,
    pub program: Option<HeadlessId>,
    pub vertex_array: Option<HeadlessId>,
    pub element_buffer: Option<HeadlessId>,
    pub framebuffer: Option<HeadlessId>,
    /// Buffers bound for capture, by index, when transform feedback was active.
    pub feedback: Vec<(u32, HeadlessId)>,
    pub rasterizer_discard: bool,
}

impl DrawCall {
    pub fn is_indexed(&self) -> bool {
        self.element_type.is_some()
    }

    pub fn is_instanced(&self) -> bool {
        self.instances.is_some()
    }

    pub fn is_captured(&self) -> bool {
        !self.feedback.is_empty()
    }
}

/// Vertex attribute slot as seen by the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttribSlot {
    pub enabled: bool,
    pub buffer: Option<HeadlessId>,
    pub size: i32,
    pub divisor: u32,
}

/// Every piece of global binding state the engine is expected to restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSnapshot {
    pub program: Option<HeadlessId>,
    pub vertex_array: Option<HeadlessId>,
    pub array_buffer: Option<HeadlessId>,
    pub element_buffer: Option<HeadlessId>,
    pub framebuffer: Option<HeadlessId>,
    pub active_unit: u32,
    /// `(unit, target, texture)` for every non-empty texture binding.
    pub textures: Vec<(u32, u32, HeadlessId)>,
    /// Enabled attribute slots of the current vertex array.
    pub enabled_attribs: Vec<u32>,
    pub viewport: [i32; 4],
    pub transform_feedback: Option<HeadlessId>,
    /// Indexed `TRANSFORM_FEEDBACK_BUFFER` bindings of the bound feedback object.
    pub feedback_buffers: Vec<(u32, HeadlessId)>,
}

#[derive(Debug, Default)]
struct ShaderObj {
    stage: u32,
    source: String,
    compiled: bool,
    log: String,
}

#[derive(Debug, Default)]
struct ProgramObj {
    attached: Vec<HeadlessId>,
    attrib_bindings: HashMap<String, u32>,
    varyings: Vec<String>,
    feedback_mode: u32,
    linked: bool,
    log: String,
    uniforms: Vec<String>,
    blocks: Vec<String>,
    block_bindings: HashMap<u32, u32>,
    attributes: HashMap<String, u32>,
}

#[derive(Debug, Default)]
struct TextureObj {
    target: u32,
    width: i32,
    height: i32,
    internal_format: i32,
    format: u32,
    ty: u32,
    /// RGBA texels of level 0 (face 0 for cube maps).
    texels: Vec<f32>,
    levels: BTreeSet<i32>,
    params: HashMap<u32, i32>,
}

#[derive(Debug, Default)]
struct FramebufferObj {
    attachments: BTreeMap<u32, HeadlessId>,
    draw_buffers: Vec<u32>,
}

#[derive(Debug, Default, Clone)]
struct FeedbackObj {
    buffers: BTreeMap<u32, HeadlessId>,
}

#[derive(Debug, Default, Clone)]
struct VaoState {
    attribs: BTreeMap<u32, AttribSlot>,
    element_buffer: Option<HeadlessId>,
}

#[derive(Debug)]
struct State {
    next_id: u32,
    shaders: HashMap<HeadlessId, ShaderObj>,
    programs: HashMap<HeadlessId, ProgramObj>,
    buffers: HashMap<HeadlessId, Vec<u8>>,
    vaos: HashMap<Option<HeadlessId>, VaoState>,
    textures: HashMap<HeadlessId, TextureObj>,
    framebuffers: HashMap<HeadlessId, FramebufferObj>,
    /// `None` is the default feedback object.
    feedbacks: HashMap<Option<HeadlessId>, FeedbackObj>,

    program: Option<HeadlessId>,
    vertex_array: Option<HeadlessId>,
    array_buffer: Option<HeadlessId>,
    framebuffer: Option<HeadlessId>,
    active_unit: u32,
    texture_bindings: BTreeMap<(u32, u32), HeadlessId>,
    transform_feedback: Option<HeadlessId>,
    /// Primitive mode while a capture is running.
    capturing: Option<u32>,

    viewport: [i32; 4],
    clear_color: [f32; 4],
    caps: BTreeSet<u32>,
    blend_func: (u32, u32),
    blend_equation: u32,
    unpack_flip_y: bool,
    screen: Vec<f32>,
    uniform_values: HashMap<(HeadlessId, usize), Vec<f32>>,
    draws: Vec<DrawCall>,
}

#[derive(Debug)]
pub struct HeadlessDevice {
    modern: bool,
    config: HeadlessConfig,
    state: RefCell<State>,
}

impl HeadlessDevice {
    pub fn new(modern: bool, config: HeadlessConfig) -> Self {
        let (w, h) = config.surface_size;
        let mut vaos = HashMap::new();
        vaos.insert(None, VaoState::default());
        let mut feedbacks = HashMap::new();
        feedbacks.insert(None, FeedbackObj::default());
        let state = State {
            next_id: 1,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            vaos,
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            feedbacks,
            program: None,
            vertex_array: None,
            array_buffer: None,
            framebuffer: None,
            active_unit: 0,
            texture_bindings: BTreeMap::new(),
            transform_feedback: None,
            capturing: None,
            viewport: [0, 0, w, h],
            clear_color: [0.0; 4],
            caps: BTreeSet::new(),
            blend_func: (glow::ONE, glow::ZERO),
            blend_equation: glow::FUNC_ADD,
            unpack_flip_y: false,
            screen: vec![0.0; (w.max(0) * h.max(0) * 4) as usize],
            uniform_values: HashMap::new(),
            draws: Vec::new(),
        };
        Self {
            modern,
            config,
            state: RefCell::new(state),
        }
    }

    pub fn webgl2() -> Self {
        Self::new(true, HeadlessConfig::webgl2())
    }

    pub fn is_modern(&self) -> bool {
        self.modern
    }

    pub fn config(&self) -> &HeadlessConfig {
        &self.config
    }

    // ---- Inspection (tests) ----

    pub fn bindings(&self) -> BindingSnapshot {
        let st = self.state.borrow();
        let vao = st.vaos.get(&st.vertex_array).cloned().unwrap_or_default();
        BindingSnapshot {
            program: st.program,
            vertex_array: st.vertex_array,
            array_buffer: st.array_buffer,
            element_buffer: vao.element_buffer,
            framebuffer: st.framebuffer,
            active_unit: st.active_unit,
            textures: st
                .texture_bindings
                .iter()
                .map(|(&(unit, target), &tex)| (unit, target, tex))
                .collect(),
            enabled_attribs: vao
                .attribs
                .iter()
                .filter(|(_, s)| s.enabled)
                .map(|(&loc, _)| loc)
                .collect(),
            viewport: st.viewport,
            transform_feedback: st.transform_feedback,
            feedback_buffers: st
                .feedbacks
                .get(&st.transform_feedback)
                .map(|f| f.buffers.iter().map(|(&i, &b)| (i, b)).collect())
                .unwrap_or_default(),
        }
    }

    pub fn draw_calls(&self) -> Vec<DrawCall> {
        self.state.borrow().draws.clone()
    }

    pub fn take_draw_calls(&self) -> Vec<DrawCall> {
        std::mem::take(&mut self.state.borrow_mut().draws)
    }

    pub fn live_shaders(&self) -> usize {
        self.state.borrow().shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    pub fn live_textures(&self) -> usize {
        self.state.borrow().textures.len()
    }

    pub fn is_enabled(&self, cap: u32) -> bool {
        self.state.borrow().caps.contains(&cap)
    }

    pub fn blend_state(&self) -> (u32, u32, u32) {
        let st = self.state.borrow();
        (st.blend_func.0, st.blend_func.1, st.blend_equation)
    }

    pub fn clear_color_value(&self) -> [f32; 4] {
        self.state.borrow().clear_color
    }

    pub fn texture_size(&self, texture: HeadlessId) -> Option<(i32, i32)> {
        self.state
            .borrow()
            .textures
            .get(&texture)
            .map(|t| (t.width, t.height))
    }

    /// `(bind target, internal format, texel type)` of a texture's storage.
    pub fn texture_format(&self, texture: HeadlessId) -> Option<(u32, i32, u32)> {
        self.state
            .borrow()
            .textures
            .get(&texture)
            .map(|t| (t.target, t.internal_format, t.ty))
    }

    pub fn texture_levels(&self, texture: HeadlessId) -> usize {
        self.state
            .borrow()
            .textures
            .get(&texture)
            .map_or(0, |t| t.levels.len())
    }

    pub fn texture_parameter(&self, texture: HeadlessId, parameter: u32) -> Option<i32> {
        self.state
            .borrow()
            .textures
            .get(&texture)
            .and_then(|t| t.params.get(&parameter).copied())
    }

    /// Texels of level 0 as RGBA floats.
    pub fn texture_texels(&self, texture: HeadlessId) -> Option<Vec<f32>> {
        self.state
            .borrow()
            .textures
            .get(&texture)
            .map(|t| t.texels.clone())
    }

    /// Attribute slot of a vertex array (`None` = default vertex array).
    pub fn attrib_slot(&self, vao: Option<HeadlessId>, location: u32) -> Option<AttribSlot> {
        self.state
            .borrow()
            .vaos
            .get(&vao)
            .and_then(|v| v.attribs.get(&location).copied())
    }

    pub fn buffer_contents(&self, buffer: HeadlessId) -> Option<Vec<u8>> {
        self.state.borrow().buffers.get(&buffer).cloned()
    }

    pub fn draw_buffers_of(&self, framebuffer: HeadlessId) -> Vec<u32> {
        self.state
            .borrow()
            .framebuffers
            .get(&framebuffer)
            .map(|f| f.draw_buffers.clone())
            .unwrap_or_default()
    }

    pub fn attachment_of(&self, framebuffer: HeadlessId, attachment: u32) -> Option<HeadlessId> {
        self.state
            .borrow()
            .framebuffers
            .get(&framebuffer)
            .and_then(|f| f.attachments.get(&attachment).copied())
    }

    pub fn transform_feedback_varyings_of(&self, program: HeadlessId) -> Vec<String> {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|p| p.varyings.clone())
            .unwrap_or_default()
    }

    /// `INTERLEAVED_ATTRIBS` or `SEPARATE_ATTRIBS`, as passed with the varyings.
    pub fn transform_feedback_mode_of(&self, program: HeadlessId) -> Option<u32> {
        self.state
            .borrow()
            .programs
            .get(&program)
            .filter(|p| !p.varyings.is_empty())
            .map(|p| p.feedback_mode)
    }

    pub fn live_transform_feedbacks(&self) -> usize {
        self.state.borrow().feedbacks.len() - 1
    }

    pub fn is_capturing(&self) -> bool {
        self.state.borrow().capturing.is_some()
    }

    pub fn uniform_block_binding_of(&self, program: HeadlessId, index: u32) -> Option<u32> {
        self.state
            .borrow()
            .programs
            .get(&program)
            .and_then(|p| p.block_bindings.get(&index).copied())
    }

    /// Last value uploaded to a uniform of `program`.
    pub fn uniform_value(&self, program: HeadlessId, name: &str) -> Option<Vec<f32>> {
        let st = self.state.borrow();
        let index = st.programs.get(&program)?.uniforms.iter().position(|u| u == name)?;
        st.uniform_values.get(&(program, index)).cloned()
    }

    fn alloc(st: &mut State) -> HeadlessId {
        let id = HeadlessId(st.next_id);
        st.next_id += 1;
        id
    }

    fn float_renderable(&self, tex: &TextureObj) -> bool {
        let float_type = matches!(tex.ty, glow::FLOAT | glow::HALF_FLOAT);
        if !float_type {
            return true;
        }
        if self.modern {
            self.config.extensions.contains("EXT_color_buffer_float")
        } else {
            self.config.extensions.contains("WEBGL_color_buffer_float")
                || self.config.extensions.contains("EXT_color_buffer_half_float")
        }
    }

    fn set_uniform(&self, location: Option<&HeadlessUniform>, values: &[f32]) {
        let Some(loc) = location else {
            return;
        };
        self.state
            .borrow_mut()
            .uniform_values
            .insert((loc.program, loc.index), values.to_vec());
    }

    fn record_draw(
        &self,
        mode: u32,
        first: i32,
        count: i32,
        element_type: Option<u32>,
        offset: i32,
        instances: Option<i32>,
    ) {
        let mut st = self.state.borrow_mut();
        let element_buffer = st
            .vaos
            .get(&st.vertex_array)
            .and_then(|v| v.element_buffer);
        let feedback = match st.capturing {
            Some(_) => st
                .feedbacks
                .get(&st.transform_feedback)
                .map(|f| f.buffers.iter().map(|(&i, &b)| (i, b)).collect())
                .unwrap_or_default(),
            None => Vec::new(),
        };
        let rasterizer_discard = st.caps.contains(&glow::RASTERIZER_DISCARD);
        let call = DrawCall {
            mode,
            first,
            count,
            element_type,
            offset,
            instances,
            program: st.program,
            vertex_array: st.vertex_array,
            element_buffer,
            framebuffer: st.framebuffer,
            feedback,
            rasterizer_discard,
        };
        st.draws.push(call);
    }

    fn with_attrib<F: FnOnce(&mut AttribSlot)>(&self, index: u32, f: F) {
        let mut st = self.state.borrow_mut();
        let key = st.vertex_array;
        let vao = st.vaos.entry(key).or_default();
        f(vao.attribs.entry(index).or_default());
    }
}

/// Test surface that accepts a fixed set of API variants.
#[derive(Debug)]
pub struct HeadlessSurface {
    accepted: Vec<ApiVariant>,
    config: HeadlessConfig,
    size: (u32, u32),
    attempts: Vec<ApiVariant>,
}

impl HeadlessSurface {
    pub fn new(accepted: Vec<ApiVariant>, config: HeadlessConfig, size: (u32, u32)) -> Self {
        Self {
            accepted,
            config,
            size,
            attempts: Vec::new(),
        }
    }

    pub fn webgl2(width: u32, height: u32) -> Self {
        Self::new(
            vec![ApiVariant::WebGl2],
            HeadlessConfig::webgl2(),
            (width, height),
        )
    }

    pub fn webgl1(config: HeadlessConfig, width: u32, height: u32) -> Self {
        Self::new(vec![ApiVariant::WebGl], config, (width, height))
    }

    /// Variants requested so far, in order.
    pub fn attempts(&self) -> &[ApiVariant] {
        &self.attempts
    }
}

impl Surface for HeadlessSurface {
    type Device = HeadlessDevice;

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn acquire(&mut self, variant: ApiVariant, _options: &ContextOptions) -> Option<HeadlessDevice> {
        self.attempts.push(variant);
        if !self.accepted.contains(&variant) {
            return None;
        }
        let mut config = self.config.clone();
        config.surface_size = (self.size.0 as i32, self.size.1 as i32);
        Some(HeadlessDevice::new(variant.is_modern(), config))
    }
}

// ---- Declaration scanning ----

#[derive(Debug, Default)]
struct Declarations {
    uniforms: Vec<String>,
    blocks: Vec<String>,
    /// `(name, explicit layout location)`
    inputs: Vec<(String, Option<u32>)>,
}

fn attached_stage<'a>(
    shaders: &'a HashMap<HeadlessId, ShaderObj>,
    attached: &[HeadlessId],
    stage: u32,
) -> Option<&'a ShaderObj> {
    attached
        .iter()
        .filter_map(|id| shaders.get(id))
        .find(|s| s.stage == stage)
}

const QUALIFIERS: &[&str] =&["lowp", "mediump", "highp", "flat", "smooth", "centroid"];

fn scan_declarations(source: &str, vertex: bool) -> Declarations {
    let mut out = Declarations::default();
    for raw in source.lines() {
        let line = raw.split("//").next().unwrap_or("").trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut layout_location = None;
        let mut rest = line;
        if let Some(after) = rest.strip_prefix("layout") {
            let Some(close) = after.find(')') else {
                continue;
            };
            let inside = &after[..close];
            layout_location = inside
                .split(',')
                .filter_map(|kv| kv.split_once('='))
                .find(|(k, _)| k.trim().trim_start_matches('(') == "location")
                .and_then(|(_, v)| v.trim().parse::<u32>().ok());
            rest = after[close + 1..].trim();
        }

        let mut tokens = rest
            .split(|c: char| c.is_whitespace() || c == '{')
            .filter(|t| !t.is_empty());
        let Some(keyword) = tokens.next() else {
            continue;
        };
        let is_input = keyword == "attribute" || (vertex && keyword == "in");
        if keyword != "uniform" && !is_input {
            continue;
        }

        let mut tokens = tokens.skip_while(|t| QUALIFIERS.contains(t));
        let Some(ty) = tokens.next() else {
            continue;
        };

        if keyword == "uniform" && (rest.contains('{') || !rest.contains(';')) {
            out.blocks.push(ty.trim_end_matches(';').to_string());
            continue;
        }

        let names = tokens.collect::<Vec<_>>().join(" ");
        for name in names.split(',') {
            let name = name
                .trim()
                .trim_end_matches(';')
                .split('[')
                .next()
                .unwrap_or("")
                .trim();
            if name.is_empty() {
                continue;
            }
            if keyword == "uniform" {
                if !out.uniforms.iter().any(|u| u == name) {
                    out.uniforms.push(name.to_string());
                }
            } else {
                out.inputs.push((name.to_string(), layout_location));
            }
        }
    }
    out
}

impl GpuDevice for HeadlessDevice {
    type Shader = HeadlessId;
    type Program = HeadlessId;
    type Buffer = HeadlessId;
    type VertexArray = HeadlessId;
    type Texture = HeadlessId;
    type Framebuffer = HeadlessId;
    type TransformFeedback = HeadlessId;
    type UniformLocation = HeadlessUniform;

    fn has_extension(&self, name: &str) -> bool {
        self.config.extensions.contains(name)
    }

    fn get_parameter_i32(&self, parameter: u32) -> i32 {
        match parameter {
            glow::MAX_COLOR_ATTACHMENTS => self.config.max_color_attachments,
            glow::MAX_DRAW_BUFFERS => self.config.max_draw_buffers,
            glow::MAX_TEXTURE_SIZE => self.config.max_texture_size,
            glow::ACTIVE_TEXTURE => (glow::TEXTURE0 + self.state.borrow().active_unit) as i32,
            _ => 0,
        }
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.state.borrow_mut().viewport = [x, y, width, height];
    }

    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        self.state.borrow_mut().clear_color = [r, g, b, a];
    }

    fn clear(&self, mask: u32) {
        if mask & glow::COLOR_BUFFER_BIT == 0 {
            return;
        }
        let mut st = self.state.borrow_mut();
        let color = st.clear_color;
        let Some(fb) = st.framebuffer else {
            for px in st.screen.chunks_exact_mut(4) {
                px.copy_from_slice(&color);
            }
            return;
        };
        let targets: Vec<HeadlessId> = match st.framebuffers.get(&fb) {
            Some(obj) => {
                let points: Vec<u32> = if obj.draw_buffers.is_empty() {
                    vec![glow::COLOR_ATTACHMENT0]
                } else {
                    obj.draw_buffers.clone()
                };
                points
                    .iter()
                    .filter_map(|p| obj.attachments.get(p).copied())
                    .collect()
            }
            None => Vec::new(),
        };
        for tex in targets {
            if let Some(t) = st.textures.get_mut(&tex) {
                let quantize = t.ty == glow::UNSIGNED_BYTE;
                for px in t.texels.chunks_exact_mut(4) {
                    for (dst, src) in px.iter_mut().zip(color) {
                        *dst = if quantize {
                            (src.clamp(0.0, 1.0) * 255.0).round() / 255.0
                        } else {
                            src
                        };
                    }
                }
            }
        }
    }

    fn enable(&self, cap: u32) {
        self.state.borrow_mut().caps.insert(cap);
    }

    fn disable(&self, cap: u32) {
        self.state.borrow_mut().caps.remove(&cap);
    }

    fn blend_func(&self, src: u32, dst: u32) {
        self.state.borrow_mut().blend_func = (src, dst);
    }

    fn blend_equation(&self, mode: u32) {
        self.state.borrow_mut().blend_equation = mode;
    }

    fn create_shader(&self, stage: u32) -> Result<Self::Shader, String> {
        if stage != glow::VERTEX_SHADER && stage != glow::FRAGMENT_SHADER {
            return Err(format!("unsupported shader stage 0x{stage:x}"));
        }
        let mut st = self.state.borrow_mut();
        let id = Self::alloc(&mut st);
        st.shaders.insert(
            id,
            ShaderObj {
                stage,
                ..ShaderObj::default()
            },
        );
        Ok(id)
    }

    fn shader_source(&self, shader: Self::Shader, source: &str) {
        if let Some(s) = self.state.borrow_mut().shaders.get_mut(&shader) {
            s.source = source.to_string();
        }
    }

    fn compile_shader(&self, shader: Self::Shader) {
        if let Some(s) = self.state.borrow_mut().shaders.get_mut(&shader) {
            match s.source.lines().find(|l| l.trim_start().starts_with("#error")) {
                Some(line) => {
                    s.compiled = false;
                    s.log = format!("ERROR: 0:1: '{}'", line.trim());
                }
                None => {
                    s.compiled = true;
                    s.log.clear();
                }
            }
        }
    }

    fn get_shader_compile_status(&self, shader: Self::Shader) -> bool {
        self.state
            .borrow()
            .shaders
            .get(&shader)
            .is_some_and(|s| s.compiled)
    }

    fn get_shader_info_log(&self, shader: Self::Shader) -> String {
        self.state
            .borrow()
            .shaders
            .get(&shader)
            .map(|s| s.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&self, shader: Self::Shader) {
        self.state.borrow_mut().shaders.remove(&shader);
    }

    fn create_program(&self) -> Result<Self::Program, String> {
        let mut st = self.state.borrow_mut();
        let id = Self::alloc(&mut st);
        st.programs.insert(id, ProgramObj::default());
        Ok(id)
    }

    fn attach_shader(&self, program: Self::Program, shader: Self::Shader) {
        if let Some(p) = self.state.borrow_mut().programs.get_mut(&program) {
            p.attached.push(shader);
        }
    }

    fn detach_shader(&self, program: Self::Program, shader: Self::Shader) {
        if let Some(p) = self.state.borrow_mut().programs.get_mut(&program) {
            p.attached.retain(|s| *s != shader);
        }
    }

    fn bind_attrib_location(&self, program: Self::Program, index: u32, name: &str) {
        if let Some(p) = self.state.borrow_mut().programs.get_mut(&program) {
            p.attrib_bindings.insert(name.to_string(), index);
        }
    }

    fn transform_feedback_varyings(&self, program: Self::Program, varyings: &[&str], mode: u32) {
        if let Some(p) = self.state.borrow_mut().programs.get_mut(&program) {
            p.varyings = varyings.iter().map(|v| v.to_string()).collect();
            p.feedback_mode = mode;
        }
    }

    fn link_program(&self, program: Self::Program) {
        let mut st = self.state.borrow_mut();
        let State {
            shaders, programs, ..
        } = &mut *st;
        let Some(p) = programs.get_mut(&program) else {
            return;
        };

        let shaders: &HashMap<HeadlessId, ShaderObj> = shaders;
        let vs = attached_stage(shaders, &p.attached, glow::VERTEX_SHADER);
        let fs = attached_stage(shaders, &p.attached, glow::FRAGMENT_SHADER);
        let (Some(vs), Some(fs)) = (vs, fs) else {
            p.linked = false;
            p.log = "program needs a vertex and a fragment shader".into();
            return;
        };
        if !vs.compiled || !fs.compiled {
            p.linked = false;
            p.log = "attached shader is not compiled".into();
            return;
        }
        for s in [vs, fs] {
            if !s.source.contains("main(") {
                p.linked = false;
                p.log = "missing main() entry point".into();
                return;
            }
        }

        let vdecl = scan_declarations(&vs.source, true);
        let fdecl = scan_declarations(&fs.source, false);

        let mut uniforms = vdecl.uniforms;
        for u in fdecl.uniforms {
            if !uniforms.contains(&u) {
                uniforms.push(u);
            }
        }
        let mut blocks = vdecl.blocks;
        for b in fdecl.blocks {
            if !blocks.contains(&b) {
                blocks.push(b);
            }
        }

        let mut attributes = HashMap::new();
        let mut used = BTreeSet::new();
        for (name, loc) in &vdecl.inputs {
            if let Some(loc) = loc.or_else(|| p.attrib_bindings.get(name).copied()) {
                attributes.insert(name.clone(), loc);
                used.insert(loc);
            }
        }
        let mut next = 0u32;
        for (name, _) in &vdecl.inputs {
            if attributes.contains_key(name) {
                continue;
            }
            while used.contains(&next) {
                next += 1;
            }
            attributes.insert(name.clone(), next);
            used.insert(next);
        }

        p.uniforms = uniforms;
        p.blocks = blocks;
        p.attributes = attributes;
        p.linked = true;
        p.log.clear();
    }

    fn get_program_link_status(&self, program: Self::Program) -> bool {
        self.state
            .borrow()
            .programs
            .get(&program)
            .is_some_and(|p| p.linked)
    }

    fn get_program_info_log(&self, program: Self::Program) -> String {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|p| p.log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&self, program: Self::Program) {
        let mut st = self.state.borrow_mut();
        st.programs.remove(&program);
        if st.program == Some(program) {
            st.program = None;
        }
    }

    fn use_program(&self, program: Option<Self::Program>) {
        self.state.borrow_mut().program = program;
    }

    fn get_attrib_location(&self, program: Self::Program, name: &str) -> Option<u32> {
        self.state
            .borrow()
            .programs
            .get(&program)
            .filter(|p| p.linked)
            .and_then(|p| p.attributes.get(name).copied())
    }

    fn get_uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        let st = self.state.borrow();
        let p = st.programs.get(&program).filter(|p| p.linked)?;
        let index = p.uniforms.iter().position(|u| u == name)?;
        Some(HeadlessUniform { program, index })
    }

    fn get_uniform_block_index(&self, program: Self::Program, name: &str) -> Option<u32> {
        if !self.modern {
            return None;
        }
        let st = self.state.borrow();
        let p = st.programs.get(&program).filter(|p| p.linked)?;
        p.blocks.iter().position(|b| b == name).map(|i| i as u32)
    }

    fn uniform_block_binding(&self, program: Self::Program, index: u32, binding: u32) {
        if let Some(p) = self.state.borrow_mut().programs.get_mut(&program) {
            p.block_bindings.insert(index, binding);
        }
    }

    fn uniform_1_f32(&self, location: Option<&Self::UniformLocation>, x: f32) {
        self.set_uniform(location, &[x]);
    }

    fn uniform_2_f32(&self, location: Option<&Self::UniformLocation>, x: f32, y: f32) {
        self.set_uniform(location, &[x, y]);
    }

    fn uniform_3_f32(&self, location: Option<&Self::UniformLocation>, x: f32, y: f32, z: f32) {
        self.set_uniform(location, &[x, y, z]);
    }

    fn uniform_4_f32(
        &self,
        location: Option<&Self::UniformLocation>,
        x: f32,
        y: f32,
        z: f32,
        w: f32,
    ) {
        self.set_uniform(location, &[x, y, z, w]);
    }

    fn uniform_1_i32(&self, location: Option<&Self::UniformLocation>, x: i32) {
        self.set_uniform(location, &[x as f32]);
    }

    fn uniform_matrix_3_f32_slice(
        &self,
        location: Option<&Self::UniformLocation>,
        _transpose: bool,
        v: &[f32],
    ) {
        self.set_uniform(location, v);
    }

    fn uniform_matrix_4_f32_slice(
        &self,
        location: Option<&Self::UniformLocation>,
        _transpose: bool,
        v: &[f32],
    ) {
        self.set_uniform(location, v);
    }

    fn create_buffer(&self) -> Result<Self::Buffer, String> {
        let mut st = self.state.borrow_mut();
        let id = Self::alloc(&mut st);
        st.buffers.insert(id, Vec::new());
        Ok(id)
    }

    fn bind_buffer(&self, target: u32, buffer: Option<Self::Buffer>) {
        let mut st = self.state.borrow_mut();
        match target {
            glow::ARRAY_BUFFER => st.array_buffer = buffer,
            glow::ELEMENT_ARRAY_BUFFER => {
                let key = st.vertex_array;
                st.vaos.entry(key).or_default().element_buffer = buffer;
            }
            _ => {}
        }
    }

    fn buffer_data_u8_slice(&self, target: u32, data: &[u8], _usage: u32) {
        let mut st = self.state.borrow_mut();
        let bound = match target {
            glow::ARRAY_BUFFER => st.array_buffer,
            glow::ELEMENT_ARRAY_BUFFER => st.vaos.get(&st.vertex_array).and_then(|v| v.element_buffer),
            _ => None,
        };
        if let Some(buf) = bound.and_then(|id| st.buffers.get_mut(&id)) {
            *buf = data.to_vec();
        }
    }

    fn buffer_sub_data_u8_slice(&self, target: u32, offset: i32, data: &[u8]) {
        let mut st = self.state.borrow_mut();
        let bound = match target {
            glow::ARRAY_BUFFER => st.array_buffer,
            glow::ELEMENT_ARRAY_BUFFER => st.vaos.get(&st.vertex_array).and_then(|v| v.element_buffer),
            _ => None,
        };
        if let Some(buf) = bound.and_then(|id| st.buffers.get_mut(&id)) {
            let start = offset.max(0) as usize;
            let end = (start + data.len()).min(buf.len());
            if start < end {
                buf[start..end].copy_from_slice(&data[..end - start]);
            }
        }
    }

    fn delete_buffer(&self, buffer: Self::Buffer) {
        let mut st = self.state.borrow_mut();
        st.buffers.remove(&buffer);
        if st.array_buffer == Some(buffer) {
            st.array_buffer = None;
        }
    }

    fn create_vertex_array(&self) -> Result<Self::VertexArray, String> {
        let mut st = self.state.borrow_mut();
        let id = Self::alloc(&mut st);
        st.vaos.insert(Some(id), VaoState::default());
        Ok(id)
    }

    fn bind_vertex_array(&self, vao: Option<Self::VertexArray>) {
        self.state.borrow_mut().vertex_array = vao;
    }

    fn delete_vertex_array(&self, vao: Self::VertexArray) {
        let mut st = self.state.borrow_mut();
        st.vaos.remove(&Some(vao));
        if st.vertex_array == Some(vao) {
            st.vertex_array = None;
        }
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        self.with_attrib(index, |slot| slot.enabled = true);
    }

    fn disable_vertex_attrib_array(&self, index: u32) {
        self.with_attrib(index, |slot| slot.enabled = false);
    }

    fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        size: i32,
        _data_type: u32,
        _normalized: bool,
        _stride: i32,
        _offset: i32,
    ) {
        let buffer = self.state.borrow().array_buffer;
        self.with_attrib(index, |slot| {
            slot.buffer = buffer;
            slot.size = size;
        });
    }

    fn vertex_attrib_divisor(&self, index: u32, divisor: u32) {
        self.with_attrib(index, |slot| slot.divisor = divisor);
    }

    fn create_texture(&self) -> Result<Self::Texture, String> {
        let mut st = self.state.borrow_mut();
        let id = Self::alloc(&mut st);
        st.textures.insert(id, TextureObj::default());
        Ok(id)
    }

    fn delete_texture(&self, texture: Self::Texture) {
        let mut st = self.state.borrow_mut();
        st.textures.remove(&texture);
        st.texture_bindings.retain(|_, t| *t != texture);
    }

    fn active_texture(&self, unit: u32) {
        self.state.borrow_mut().active_unit = unit.saturating_sub(glow::TEXTURE0);
    }

    fn bind_texture(&self, target: u32, texture: Option<Self::Texture>) {
        let mut st = self.state.borrow_mut();
        let key = (st.active_unit, target);
        match texture {
            Some(tex) => {
                st.texture_bindings.insert(key, tex);
                if let Some(t) = st.textures.get_mut(&tex) {
                    t.target = target;
                }
            }
            None => {
                st.texture_bindings.remove(&key);
            }
        }
    }

    fn tex_parameter_i32(&self, target: u32, parameter: u32, value: i32) {
        let mut st = self.state.borrow_mut();
        let key = (st.active_unit, target);
        if let Some(tex) = st.texture_bindings.get(&key).copied() {
            if let Some(t) = st.textures.get_mut(&tex) {
                t.params.insert(parameter, value);
            }
        }
    }

    fn tex_image_2d(
        &self,
        target: u32,
        level: i32,
        internal_format: i32,
        width: i32,
        height: i32,
        _border: i32,
        format: u32,
        ty: u32,
        pixels: Option<&[u8]>,
    ) {
        let face = target.wrapping_sub(glow::TEXTURE_CUBE_MAP_POSITIVE_X);
        let (bind_target, first_face) = if face < 6 {
            (glow::TEXTURE_CUBE_MAP, face == 0)
        } else {
            (target, true)
        };
        let mut st = self.state.borrow_mut();
        let key = (st.active_unit, bind_target);
        let Some(tex) = st.texture_bindings.get(&key).copied() else {
            return;
        };
        let Some(t) = st.textures.get_mut(&tex) else {
            return;
        };
        t.levels.insert(level);
        if level != 0 || !first_face {
            return;
        }

        t.width = width;
        t.height = height;
        t.internal_format = internal_format;
        t.format = format;
        t.ty = ty;

        let count = (width.max(0) * height.max(0)) as usize;
        let channels = match format {
            glow::RGBA => 4,
            glow::RGB => 3,
            glow::LUMINANCE_ALPHA | glow::RG => 2,
            _ => 1,
        };
        let mut texels = vec![0.0f32; count * 4];
        for px in texels.chunks_exact_mut(4) {
            px[3] = 1.0;
        }
        if let Some(bytes) = pixels {
            let values: Vec<f32> = match ty {
                glow::UNSIGNED_BYTE => bytes.iter().map(|b| *b as f32 / 255.0).collect(),
                glow::FLOAT => bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
                _ => Vec::new(),
            };
            if values.len() == count * channels {
                for (i, px) in texels.chunks_exact_mut(4).enumerate() {
                    px[..channels].copy_from_slice(&values[i * channels..(i + 1) * channels]);
                }
                if st.unpack_flip_y && height > 1 {
                    let row = width as usize * 4;
                    let rows: Vec<Vec<f32>> =
                        texels.chunks_exact(row).rev().map(|r| r.to_vec()).collect();
                    texels = rows.concat();
                }
            }
        }
        if let Some(t) = st.textures.get_mut(&tex) {
            t.texels = texels;
        }
    }

    fn generate_mipmap(&self, target: u32) {
        let mut st = self.state.borrow_mut();
        let key = (st.active_unit, target);
        if let Some(tex) = st.texture_bindings.get(&key).copied() {
            if let Some(t) = st.textures.get_mut(&tex) {
                let levels = 32 - (t.width.max(t.height).max(1) as u32).leading_zeros();
                t.levels.extend(0..levels as i32);
            }
        }
    }

    fn pixel_store_bool(&self, parameter: u32, value: bool) {
        if parameter == crate::device::UNPACK_FLIP_Y_WEBGL {
            self.state.borrow_mut().unpack_flip_y = value;
        }
    }

    fn create_framebuffer(&self) -> Result<Self::Framebuffer, String> {
        let mut st = self.state.borrow_mut();
        let id = Self::alloc(&mut st);
        st.framebuffers.insert(id, FramebufferObj::default());
        Ok(id)
    }

    fn delete_framebuffer(&self, framebuffer: Self::Framebuffer) {
        let mut st = self.state.borrow_mut();
        st.framebuffers.remove(&framebuffer);
        if st.framebuffer == Some(framebuffer) {
            st.framebuffer = None;
        }
    }

    fn bind_framebuffer(&self, _target: u32, framebuffer: Option<Self::Framebuffer>) {
        self.state.borrow_mut().framebuffer = framebuffer;
    }

    fn framebuffer_texture_2d(
        &self,
        _target: u32,
        attachment: u32,
        _texture_target: u32,
        texture: Option<Self::Texture>,
        _level: i32,
    ) {
        let mut st = self.state.borrow_mut();
        let Some(fb) = st.framebuffer else {
            return;
        };
        if let Some(obj) = st.framebuffers.get_mut(&fb) {
            match texture {
                Some(tex) => {
                    obj.attachments.insert(attachment, tex);
                }
                None => {
                    obj.attachments.remove(&attachment);
                }
            }
        }
    }

    fn check_framebuffer_status(&self, _target: u32) -> u32 {
        let st = self.state.borrow();
        let Some(fb) = st.framebuffer else {
            return glow::FRAMEBUFFER_COMPLETE;
        };
        let Some(obj) = st.framebuffers.get(&fb) else {
            return glow::FRAMEBUFFER_UNSUPPORTED;
        };
        if obj.attachments.is_empty() {
            return glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT;
        }

        let mut dims = None;
        for (&point, tex) in &obj.attachments {
            let Some(t) = st.textures.get(tex) else {
                return glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT;
            };
            if t.width <= 0 || t.height <= 0 {
                return glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT;
            }
            let is_depth = point == glow::DEPTH_ATTACHMENT;
            if is_depth != (t.format == glow::DEPTH_COMPONENT) {
                return glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT;
            }
            if !is_depth {
                let index = point.wrapping_sub(glow::COLOR_ATTACHMENT0);
                if index >= self.config.max_color_attachments.max(0) as u32 {
                    return glow::FRAMEBUFFER_UNSUPPORTED;
                }
                if !self.float_renderable(t) {
                    return glow::FRAMEBUFFER_UNSUPPORTED;
                }
            }
            match dims {
                None => dims = Some((t.width, t.height)),
                Some(d) if d != (t.width, t.height) => return FRAMEBUFFER_INCOMPLETE_DIMENSIONS,
                Some(_) => {}
            }
        }
        glow::FRAMEBUFFER_COMPLETE
    }

    fn draw_buffers(&self, buffers: &[u32]) {
        let mut st = self.state.borrow_mut();
        let Some(fb) = st.framebuffer else {
            return;
        };
        if let Some(obj) = st.framebuffers.get_mut(&fb) {
            obj.draw_buffers = buffers.to_vec();
        }
    }

    fn read_pixels(
        &self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        _format: u32,
        ty: u32,
        out: &mut [u8],
    ) {
        let st = self.state.borrow();
        let (texels, src_w, src_h) = match st.framebuffer {
            None => {
                let (w, h) = self.config.surface_size;
                (&st.screen, w, h)
            }
            Some(fb) => {
                let tex = st
                    .framebuffers
                    .get(&fb)
                    .and_then(|f| f.attachments.get(&glow::COLOR_ATTACHMENT0))
                    .and_then(|t| st.textures.get(t));
                match tex {
                    Some(t) => (&t.texels, t.width, t.height),
                    None => return,
                }
            }
        };

        let mut cursor = 0usize;
        for row in y..y + height {
            for col in x..x + width {
                let px: [f32; 4] = if row >= 0 && col >= 0 && row < src_h && col < src_w {
                    let i = ((row * src_w + col) * 4) as usize;
                    [texels[i], texels[i + 1], texels[i + 2], texels[i + 3]]
                } else {
                    [0.0; 4]
                };
                for v in px {
                    if ty == glow::FLOAT {
                        let bytes = v.to_ne_bytes();
                        if cursor + 4 > out.len() {
                            return;
                        }
                        out[cursor..cursor + 4].copy_from_slice(&bytes);
                        cursor += 4;
                    } else {
                        if cursor >= out.len() {
                            return;
                        }
                        out[cursor] = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
                        cursor += 1;
                    }
                }
            }
        }
    }

    fn create_transform_feedback(&self) -> Result<Self::TransformFeedback, String> {
        if !self.modern {
            return Err("transform feedback needs a WebGL2 context".into());
        }
        let mut st = self.state.borrow_mut();
        let id = Self::alloc(&mut st);
        st.feedbacks.insert(Some(id), FeedbackObj::default());
        Ok(id)
    }

    fn delete_transform_feedback(&self, feedback: Self::TransformFeedback) {
        let mut st = self.state.borrow_mut();
        st.feedbacks.remove(&Some(feedback));
        if st.transform_feedback == Some(feedback) {
            st.transform_feedback = None;
        }
    }

    fn bind_transform_feedback(&self, _target: u32, feedback: Option<Self::TransformFeedback>) {
        self.state.borrow_mut().transform_feedback = feedback;
    }

    fn bind_buffer_base(&self, target: u32, index: u32, buffer: Option<Self::Buffer>) {
        if target != glow::TRANSFORM_FEEDBACK_BUFFER {
            return;
        }
        let mut st = self.state.borrow_mut();
        let key = st.transform_feedback;
        let obj = st.feedbacks.entry(key).or_default();
        match buffer {
            Some(b) => {
                obj.buffers.insert(index, b);
            }
            None => {
                obj.buffers.remove(&index);
            }
        }
    }

    fn begin_transform_feedback(&self, primitive_mode: u32) {
        self.state.borrow_mut().capturing = Some(primitive_mode);
    }

    fn end_transform_feedback(&self) {
        self.state.borrow_mut().capturing = None;
    }

    fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        self.record_draw(mode, first, count, None, 0, None);
    }

    fn draw_arrays_instanced(&self, mode: u32, first: i32, count: i32, instances: i32) {
        self.record_draw(mode, first, count, None, 0, Some(instances));
    }

    fn draw_elements(&self, mode: u32, count: i32, element_type: u32, offset: i32) {
        self.record_draw(mode, 0, count, Some(element_type), offset, None);
    }

    fn draw_elements_instanced(
        &self,
        mode: u32,
        count: i32,
        element_type: u32,
        offset: i32,
        instances: i32,
    ) {
        self.record_draw(mode, 0, count, Some(element_type), offset, Some(instances));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_uniforms_blocks_and_inputs() {
        let vs = r#"
            layout(location = 3) in vec3 position;
            in highp vec2 uv, offset;
            uniform mat4 projectionMatrix;
            uniform float weights[4];
            layout(std140) uniform Lights {
                vec4 color;
            };
            void main() {}
        "#;
        let d = scan_declarations(vs, true);
        assert_eq!(d.uniforms, vec!["projectionMatrix", "weights"]);
        assert_eq!(d.blocks, vec!["Lights"]);
        assert_eq!(
            d.inputs,
            vec![
                ("position".to_string(), Some(3)),
                ("uv".to_string(), None),
                ("offset".to_string(), None),
            ]
        );
    }

    #[test]
    fn fragment_inputs_are_not_attributes() {
        let fs = "in vec2 vUv;\nuniform sampler2D tex0;\nvoid main() {}";
        let d = scan_declarations(fs, false);
        assert!(d.inputs.is_empty());
        assert_eq!(d.uniforms, vec!["tex0"]);
    }

    #[test]
    fn link_assigns_bound_then_free_locations() {
        let dev = HeadlessDevice::webgl2();
        let vs = dev.create_shader(glow::VERTEX_SHADER).expect("vs");
        dev.shader_source(vs, "in vec3 a;\nin vec3 b;\nvoid main() {}");
        dev.compile_shader(vs);
        let fs = dev.create_shader(glow::FRAGMENT_SHADER).expect("fs");
        dev.shader_source(fs, "void main() {}");
        dev.compile_shader(fs);

        let p = dev.create_program().expect("program");
        dev.attach_shader(p, vs);
        dev.attach_shader(p, fs);
        dev.bind_attrib_location(p, 0, "b");
        dev.link_program(p);

        assert!(dev.get_program_link_status(p));
        assert_eq!(dev.get_attrib_location(p, "b"), Some(0));
        assert_eq!(dev.get_attrib_location(p, "a"), Some(1));
    }

    #[test]
    fn error_directive_fails_compile_with_log() {
        let dev = HeadlessDevice::webgl2();
        let s = dev.create_shader(glow::FRAGMENT_SHADER).expect("fs");
        dev.shader_source(s, "#error broken\nvoid main() {}");
        dev.compile_shader(s);
        assert!(!dev.get_shader_compile_status(s));
        assert!(dev.get_shader_info_log(s).contains("broken"));
    }

    #[test]
    fn mismatched_attachment_sizes_report_dimensions() {
        let dev = HeadlessDevice::webgl2();
        let mk = |w, h| {
            let t = dev.create_texture().expect("tex");
            dev.bind_texture(glow::TEXTURE_2D, Some(t));
            dev.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                w,
                h,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                None,
            );
            t
        };
        let a = mk(4, 4);
        let b = mk(8, 8);
        let fb = dev.create_framebuffer().expect("fb");
        dev.bind_framebuffer(glow::FRAMEBUFFER, Some(fb));
        dev.framebuffer_texture_2d(glow::FRAMEBUFFER, glow::COLOR_ATTACHMENT0, glow::TEXTURE_2D, Some(a), 0);
        dev.framebuffer_texture_2d(glow::FRAMEBUFFER, glow::COLOR_ATTACHMENT1, glow::TEXTURE_2D, Some(b), 0);
        assert_eq!(
            dev.check_framebuffer_status(glow::FRAMEBUFFER),
            FRAMEBUFFER_INCOMPLETE_DIMENSIONS
        );
    }
}
