//! Rendering context: the one GPU connection plus the capability flags resolved when it
//! was created.
//!
//! Every other module takes `&RenderingContext<D>` and asks it what the hardware can do;
//! nothing re-detects capabilities at call sites.

use std::cell::Cell;
use std::collections::BTreeMap;

use glint_core::{ContextOptions, EngineError};
use tracing::{debug, info, trace, warn};

use crate::device::GpuDevice;

/// Context flavours, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiVariant {
    WebGl2,
    ExperimentalWebGl2,
    WebGl,
    ExperimentalWebGl,
    /// A desktop GL 3.3+ context built by the host.
    NativeGl,
}

const MODERN_FIRST: &[ApiVariant] = &[
    ApiVariant::WebGl2,
    ApiVariant::ExperimentalWebGl2,
    ApiVariant::WebGl,
    ApiVariant::ExperimentalWebGl,
];
const LEGACY_ONLY: &[ApiVariant] = &[ApiVariant::WebGl, ApiVariant::ExperimentalWebGl];

impl ApiVariant {
    /// Name passed to `canvas.getContext`.
    pub fn context_name(self) -> &'static str {
        match self {
            ApiVariant::WebGl2 => "webgl2",
            ApiVariant::ExperimentalWebGl2 => "experimental-webgl2",
            ApiVariant::WebGl => "webgl",
            ApiVariant::ExperimentalWebGl => "experimental-webgl",
            ApiVariant::NativeGl => "native-gl",
        }
    }

    pub fn is_modern(self) -> bool {
        matches!(
            self,
            ApiVariant::WebGl2 | ApiVariant::ExperimentalWebGl2 | ApiVariant::NativeGl
        )
    }

    /// Variants to try for `options`, most preferred first.
    pub fn preference(options: &ContextOptions) -> &'static [ApiVariant] {
        if options.prefer_legacy {
            LEGACY_ONLY
        } else {
            MODERN_FIRST
        }
    }

    pub fn dialect(self) -> GlslDialect {
        match self {
            ApiVariant::WebGl2 | ApiVariant::ExperimentalWebGl2 => GlslDialect::Es300,
            ApiVariant::WebGl | ApiVariant::ExperimentalWebGl => GlslDialect::Es100,
            ApiVariant::NativeGl => GlslDialect::Core330,
        }
    }
}

/// Shading language flavour matching the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlslDialect {
    Es100,
    Es300,
    Core330,
}

impl GlslDialect {
    pub fn version_directive(self) -> Option<&'static str> {
        match self {
            GlslDialect::Es100 => None,
            GlslDialect::Es300 => Some("#version 300 es"),
            GlslDialect::Core330 => Some("#version 330 core"),
        }
    }

    /// `in`/`out` style declarations rather than `attribute`/`varying`.
    pub fn is_modern(self) -> bool {
        !matches!(self, GlslDialect::Es100)
    }
}

/// How a feature is reached on this context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    Core,
    Extension(&'static str),
    Unavailable,
}

impl EntryPoint {
    pub fn is_available(self) -> bool {
        !matches!(self, EntryPoint::Unavailable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub modern: bool,
    pub instancing: EntryPoint,
    pub vertex_arrays: EntryPoint,
    pub draw_buffers: EntryPoint,
    pub float_textures: bool,
    pub half_float_textures: bool,
    pub float_color_buffers: bool,
    pub depth_textures: bool,
    pub derivatives: bool,
}

impl Capabilities {
    pub fn supports_instancing(&self) -> bool {
        self.instancing.is_available()
    }

    pub fn supports_vertex_arrays(&self) -> bool {
        self.vertex_arrays.is_available()
    }

    pub fn supports_multi_render_target(&self) -> bool {
        self.draw_buffers.is_available()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_color_attachments: usize,
    pub max_draw_buffers: usize,
    pub max_texture_size: u32,
}

/// Proof that an optional extension was enabled on this context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionHandle {
    name: &'static str,
}

impl ExtensionHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Extensions probed on legacy contexts.
pub const LEGACY_EXTENSIONS: &[&str] = &[
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
];

/// Extensions probed on modern contexts.
pub const MODERN_EXTENSIONS: &[&str] = &["EXT_color_buffer_float"];

/// Something that can hand out a device for a given API variant (a canvas, a test harness).
pub trait Surface {
    type Device: GpuDevice;

    /// Drawing buffer size in pixels.
    fn size(&self) -> (u32, u32);

    /// Try to create a device of `variant`. `None` means the variant is not available.
    fn acquire(&mut self, variant: ApiVariant, options: &ContextOptions) -> Option<Self::Device>;
}

/// Try every variant allowed by `options` on `surface`; the first one that succeeds wins.
pub fn create_context<S: Surface>(
    surface: &mut S,
    options: &ContextOptions,
) -> Result<RenderingContext<S::Device>, EngineError> {
    let mut tried = Vec::new();
    for &variant in ApiVariant::preference(options) {
        tried.push(variant.context_name().to_string());
        if let Some(device) = surface.acquire(variant, options) {
            return Ok(RenderingContext::from_device(
                device,
                variant,
                options,
                surface.size(),
            ));
        }
        debug!(variant = variant.context_name(), "context variant unavailable");
    }
    Err(EngineError::ContextCreation { tried })
}

/// Primitive assembly mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawMode {
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
    Lines,
    LineStrip,
    Points,
}

impl DrawMode {
    pub fn gl(self) -> u32 {
        match self {
            DrawMode::Triangles => glow::TRIANGLES,
            DrawMode::TriangleStrip => glow::TRIANGLE_STRIP,
            DrawMode::TriangleFan => glow::TRIANGLE_FAN,
            DrawMode::Lines => glow::LINES,
            DrawMode::LineStrip => glow::LINE_STRIP,
            DrawMode::Points => glow::POINTS,
        }
    }
}

pub struct RenderingContext<D: GpuDevice> {
    gl: D,
    variant: ApiVariant,
    caps: Capabilities,
    limits: Limits,
    extensions: BTreeMap<&'static str, Option<ExtensionHandle>>,
    viewport: Cell<[i32; 4]>,
    clear_color: Cell<[f32; 4]>,
}

impl<D: GpuDevice> std::fmt::Debug for RenderingContext<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderingContext")
            .field("gl", &self.gl)
            .field("variant", &self.variant)
            .field("caps", &self.caps)
            .field("limits", &self.limits)
            .field("viewport", &self.viewport.get())
            .finish()
    }
}

impl<D: GpuDevice> RenderingContext<D> {
    /// Wrap an already-created device and resolve its capabilities once.
    pub fn from_device(
        gl: D,
        variant: ApiVariant,
        options: &ContextOptions,
        size: (u32, u32),
    ) -> Self {
        let modern = variant.is_modern();
        let mut extensions = BTreeMap::new();

        if options.common_extensions && variant != ApiVariant::NativeGl {
            let list = if modern {
                MODERN_EXTENSIONS
            } else {
                LEGACY_EXTENSIONS
            };
            for &name in list {
                let handle = gl.has_extension(name).then_some(ExtensionHandle { name });
                if handle.is_none() {
                    warn!(extension = name, "capability extension unavailable");
                }
                extensions.insert(name, handle);
            }
        }

        let enabled = |name: &str| extensions.get(name).is_some_and(|h| h.is_some());
        let via_ext = |name: &'static str| {
            if modern {
                EntryPoint::Core
            } else if enabled(name) {
                EntryPoint::Extension(name)
            } else {
                EntryPoint::Unavailable
            }
        };

        let caps = Capabilities {
            modern,
            instancing: via_ext("ANGLE_instanced_arrays"),
            vertex_arrays: via_ext("OES_vertex_array_object"),
            draw_buffers: via_ext("WEBGL_draw_buffers"),
            float_textures: modern || enabled("OES_texture_float"),
            half_float_textures: modern || enabled("OES_texture_half_float"),
            float_color_buffers: variant == ApiVariant::NativeGl
                || (modern && enabled("EXT_color_buffer_float"))
                || (!modern && enabled("WEBGL_color_buffer_float")),
            depth_textures: modern || enabled("WEBGL_depth_texture"),
            derivatives: modern || enabled("OES_standard_derivatives"),
        };

        let limits = if caps.supports_multi_render_target() {
            Limits {
                max_color_attachments: gl.get_parameter_i32(glow::MAX_COLOR_ATTACHMENTS).max(1)
                    as usize,
                max_draw_buffers: gl.get_parameter_i32(glow::MAX_DRAW_BUFFERS).max(1) as usize,
                max_texture_size: gl.get_parameter_i32(glow::MAX_TEXTURE_SIZE).max(0) as u32,
            }
        } else {
            Limits {
                max_color_attachments: 1,
                max_draw_buffers: 1,
                max_texture_size: gl.get_parameter_i32(glow::MAX_TEXTURE_SIZE).max(0) as u32,
            }
        };

        info!(
            variant = variant.context_name(),
            instancing = ?caps.instancing,
            vertex_arrays = ?caps.vertex_arrays,
            draw_buffers = ?caps.draw_buffers,
            float_color_buffers = caps.float_color_buffers,
            max_color_attachments = limits.max_color_attachments,
            "rendering context created"
        );

        let (w, h) = (size.0 as i32, size.1 as i32);
        gl.viewport(0, 0, w, h);

        Self {
            gl,
            variant,
            caps,
            limits,
            extensions,
            viewport: Cell::new([0, 0, w, h]),
            clear_color: Cell::new([0.0, 0.0, 0.0, 1.0]),
        }
    }

    pub fn gl(&self) -> &D {
        &self.gl
    }

    pub fn variant(&self) -> ApiVariant {
        self.variant
    }

    pub fn is_modern(&self) -> bool {
        self.caps.modern
    }

    pub fn dialect(&self) -> GlslDialect {
        self.variant.dialect()
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Every probed extension, `None` where it was unavailable.
    pub fn extensions(&self) -> &BTreeMap<&'static str, Option<ExtensionHandle>> {
        &self.extensions
    }

    pub fn extension(&self, name: &str) -> Option<ExtensionHandle> {
        self.extensions.get(name).copied().flatten()
    }

    // ---- Viewport ----

    pub fn set_viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.viewport.set([x, y, width, height]);
        self.gl.viewport(x, y, width, height);
    }

    pub fn viewport(&self) -> [i32; 4] {
        self.viewport.get()
    }

    /// Full-viewport resize; hosts call this from their resize listener.
    pub fn resize_viewport(&self, width: u32, height: u32) {
        self.set_viewport(0, 0, width as i32, height as i32);
    }

    /// Re-issue the stored viewport (after drawing into a differently sized target).
    pub fn restore_viewport(&self) {
        let [x, y, w, h] = self.viewport.get();
        self.gl.viewport(x, y, w, h);
    }

    // ---- Blending / depth ----

    pub fn enable_blending(&self) {
        self.gl.enable(glow::BLEND);
    }

    pub fn disable_blending(&self) {
        self.gl.disable(glow::BLEND);
    }

    pub fn enable_alpha_blending(&self) {
        self.gl.enable(glow::BLEND);
        self.gl.blend_func(glow::SRC_ALPHA, glow::ONE);
    }

    pub fn enable_additive_blending(&self) {
        self.gl.enable(glow::BLEND);
        self.gl.blend_equation(glow::FUNC_ADD);
        self.gl.blend_func(glow::ONE, glow::ONE);
    }

    /// Premultiplied "over" compositing.
    pub fn blend_layers(&self) {
        self.gl.enable(glow::BLEND);
        self.gl.blend_func(glow::ONE, glow::ONE_MINUS_SRC_ALPHA);
    }

    pub fn enable_depth(&self) {
        self.gl.enable(glow::DEPTH_TEST);
    }

    pub fn disable_depth(&self) {
        self.gl.disable(glow::DEPTH_TEST);
    }

    // ---- Clearing ----

    pub fn set_clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        self.clear_color.set([r, g, b, a]);
        self.gl.clear_color(r, g, b, a);
    }

    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color.get()
    }

    /// Clear color and depth of the bound target with the stored clear color.
    pub fn clear_screen(&self) {
        let [r, g, b, a] = self.clear_color.get();
        self.gl.clear_color(r, g, b, a);
        self.gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
    }

    /// Clear only the color of the bound target to `rgba`; the stored clear color is kept.
    pub fn clear_color_only(&self, rgba: [f32; 4]) {
        self.gl.clear_color(rgba[0], rgba[1], rgba[2], rgba[3]);
        self.gl.clear(glow::COLOR_BUFFER_BIT);
        let [r, g, b, a] = self.clear_color.get();
        self.gl.clear_color(r, g, b, a);
    }

    pub fn clear_transparent(&self) {
        self.clear_color_only([0.0; 4]);
    }

    /// Unbind 2D textures from units `0..units`, leaving unit 0 active.
    pub fn clear_textures(&self, units: u32) {
        for unit in (0..units).rev() {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl.bind_texture(glow::TEXTURE_2D, None);
        }
    }

    // ---- Draw dispatch ----

    pub fn draw_arrays(&self, mode: DrawMode, first: i32, count: i32) {
        self.gl.draw_arrays(mode.gl(), first, count);
    }

    /// Indexed draw over 16-bit indices.
    pub fn draw_elements(&self, mode: DrawMode, count: i32, offset: i32) {
        self.gl
            .draw_elements(mode.gl(), count, glow::UNSIGNED_SHORT, offset);
    }

    pub fn draw_arrays_instanced(
        &self,
        mode: DrawMode,
        first: i32,
        count: i32,
        instances: i32,
    ) -> Result<(), EngineError> {
        self.instancing_route()?;
        self.gl
            .draw_arrays_instanced(mode.gl(), first, count, instances);
        Ok(())
    }

    pub fn draw_elements_instanced(
        &self,
        mode: DrawMode,
        count: i32,
        offset: i32,
        instances: i32,
    ) -> Result<(), EngineError> {
        self.instancing_route()?;
        self.gl
            .draw_elements_instanced(mode.gl(), count, glow::UNSIGNED_SHORT, offset, instances);
        Ok(())
    }

    fn instancing_route(&self) -> Result<(), EngineError> {
        match self.caps.instancing {
            EntryPoint::Unavailable => Err(EngineError::CapabilityUnavailable(
                "instanced drawing (ANGLE_instanced_arrays)".into(),
            )),
            route => {
                trace!(?route, "instanced draw");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessConfig, HeadlessSurface};

    #[test]
    fn modern_variant_wins_when_available() {
        let mut surface = HeadlessSurface::webgl2(64, 32);
        let ctx = create_context(&mut surface, &ContextOptions::default()).expect("context");
        assert_eq!(ctx.variant(), ApiVariant::WebGl2);
        assert!(ctx.is_modern());
        assert_eq!(ctx.capabilities().instancing, EntryPoint::Core);
        assert_eq!(ctx.viewport(), [0, 0, 64, 32]);
    }

    #[test]
    fn falls_back_through_variants_in_order() {
        let mut surface = HeadlessSurface::new(
            vec![ApiVariant::ExperimentalWebGl],
            HeadlessConfig::webgl1_full(),
            (8, 8),
        );
        let ctx = create_context(&mut surface, &ContextOptions::default()).expect("context");
        assert_eq!(ctx.variant(), ApiVariant::ExperimentalWebGl);
        assert_eq!(
            surface.attempts(),
            &[
                ApiVariant::WebGl2,
                ApiVariant::ExperimentalWebGl2,
                ApiVariant::WebGl,
                ApiVariant::ExperimentalWebGl
            ]
        );
        assert_eq!(
            ctx.capabilities().instancing,
            EntryPoint::Extension("ANGLE_instanced_arrays")
        );
    }

    #[test]
    fn prefer_legacy_skips_modern_variants() {
        let mut surface = HeadlessSurface::new(
            vec![ApiVariant::WebGl2, ApiVariant::WebGl],
            HeadlessConfig::webgl1_full(),
            (8, 8),
        );
        let opts = ContextOptions {
            prefer_legacy: true,
            ..ContextOptions::default()
        };
        let ctx = create_context(&mut surface, &opts).expect("context");
        assert_eq!(ctx.variant(), ApiVariant::WebGl);
    }

    #[test]
    fn no_variant_is_a_context_creation_error() {
        let mut surface = HeadlessSurface::new(vec![], HeadlessConfig::webgl2(), (8, 8));
        let err = create_context(&mut surface, &ContextOptions::default())
            .expect_err("must fail");
        match err {
            EngineError::ContextCreation { tried } => assert_eq!(tried.len(), 4),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_extensions_are_recorded_as_none() {
        let mut surface = HeadlessSurface::new(
            vec![ApiVariant::WebGl],
            HeadlessConfig::webgl1_bare().with_extension("OES_texture_float"),
            (8, 8),
        );
        let ctx = create_context(&mut surface, &ContextOptions::default()).expect("context");
        assert_eq!(ctx.extensions().len(), LEGACY_EXTENSIONS.len());
        assert!(ctx.extension("OES_texture_float").is_some());
        assert!(ctx.extension("ANGLE_instanced_arrays").is_none());
        let caps = ctx.capabilities();
        assert!(caps.float_textures);
        assert!(!caps.supports_instancing());
        assert!(!caps.supports_vertex_arrays());
        assert_eq!(ctx.limits().max_color_attachments, 1);
    }

    #[test]
    fn skipping_probes_leaves_legacy_features_off() {
        let mut surface = HeadlessSurface::new(
            vec![ApiVariant::WebGl],
            HeadlessConfig::webgl1_full(),
            (8, 8),
        );
        let opts = ContextOptions {
            common_extensions: false,
            ..ContextOptions::default()
        };
        let ctx = create_context(&mut surface, &opts).expect("context");
        assert!(ctx.extensions().is_empty());
        assert!(!ctx.capabilities().supports_instancing());
    }

    #[test]
    fn instanced_draw_without_support_fails_cleanly() {
        let mut surface =
            HeadlessSurface::new(vec![ApiVariant::WebGl], HeadlessConfig::webgl1_bare(), (8, 8));
        let ctx = create_context(&mut surface, &ContextOptions::default()).expect("context");
        let err = ctx
            .draw_arrays_instanced(DrawMode::Triangles, 0, 3, 10)
            .expect_err("must fail");
        assert!(matches!(err, EngineError::CapabilityUnavailable(_)));
        assert!(ctx.gl().draw_calls().is_empty());
    }

    #[test]
    fn blend_helpers_set_expected_state() {
        let mut surface = HeadlessSurface::webgl2(8, 8);
        let ctx = create_context(&mut surface, &ContextOptions::default()).expect("context");

        ctx.enable_additive_blending();
        assert!(ctx.gl().is_enabled(glow::BLEND));
        assert_eq!(
            ctx.gl().blend_state(),
            (glow::ONE, glow::ONE, glow::FUNC_ADD)
        );

        ctx.blend_layers();
        assert_eq!(ctx.gl().blend_state().1, glow::ONE_MINUS_SRC_ALPHA);

        ctx.disable_blending();
        assert!(!ctx.gl().is_enabled(glow::BLEND));
    }

    #[test]
    fn clear_color_only_keeps_stored_color() {
        let mut surface = HeadlessSurface::webgl2(8, 8);
        let ctx = create_context(&mut surface, &ContextOptions::default()).expect("context");
        ctx.set_clear_color(0.2, 0.3, 0.4, 1.0);
        ctx.clear_color_only([1.0, 0.0, 0.0, 1.0]);
        assert_eq!(ctx.gl().clear_color_value(), [0.2, 0.3, 0.4, 1.0]);
    }

    #[test]
    fn resize_viewport_updates_state() {
        let mut surface = HeadlessSurface::webgl2(8, 8);
        let ctx = create_context(&mut surface, &ContextOptions::default()).expect("context");
        ctx.resize_viewport(1280, 720);
        assert_eq!(ctx.viewport(), [0, 0, 1280, 720]);
        assert_eq!(ctx.gl().bindings().viewport, [0, 0, 1280, 720]);
    }
}
