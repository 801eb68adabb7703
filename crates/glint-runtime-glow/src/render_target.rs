//! Offscreen render targets (framebuffer + color/depth textures).

use glint_core::{EngineError, FramebufferIncomplete};
use tracing::debug;

use crate::context::RenderingContext;
use crate::device::{GpuDevice, FRAMEBUFFER_INCOMPLETE_DIMENSIONS};
use crate::texture::{color_attachment_format, PixelData, Texture, TextureView};

/// Ordered color attachments: texture `i` goes to `COLOR_ATTACHMENT0 + i`.
#[derive(Debug)]
pub struct AttachmentFormat<D: GpuDevice> {
    textures: Vec<Texture<D>>,
    max_attachments: usize,
}

impl<D: GpuDevice> AttachmentFormat<D> {
    /// `requested` attachment points backed by `textures`.
    ///
    /// Fails when the counts differ or when the count is not in `(0, max_color_attachments)`.
    /// The textures are released on failure.
    pub fn new(
        ctx: &RenderingContext<D>,
        requested: usize,
        textures: Vec<Texture<D>>,
    ) -> Result<Self, EngineError> {
        let max = ctx.limits().max_color_attachments;
        let err = if requested != textures.len() {
            Some(EngineError::AttachmentCountMismatch {
                requested,
                textures: textures.len(),
            })
        } else if requested == 0 || requested >= max {
            Some(EngineError::AttachmentLimit {
                count: requested,
                max,
            })
        } else {
            None
        };
        if let Some(err) = err {
            for t in textures {
                t.destroy(ctx);
            }
            return Err(err);
        }
        Ok(Self {
            textures,
            max_attachments: max,
        })
    }

    pub fn from_textures(
        ctx: &RenderingContext<D>,
        textures: Vec<Texture<D>>,
    ) -> Result<Self, EngineError> {
        Self::new(ctx, textures.len(), textures)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn max_attachments(&self) -> usize {
        self.max_attachments
    }

    /// `COLOR_ATTACHMENT0 + i` for every texture.
    pub fn attachments(&self) -> Vec<u32> {
        (0..self.textures.len() as u32)
            .map(|i| glow::COLOR_ATTACHMENT0 + i)
            .collect()
    }

    pub fn textures(&self) -> &[Texture<D>] {
        &self.textures
    }
}

/// Where a render target's color storage comes from.
#[derive(Debug)]
pub enum ColorAttachments<D: GpuDevice> {
    /// One float attachment (RGBA8 when float rendering is unavailable).
    Default,
    /// A caller-built texture as attachment 0.
    Texture(Texture<D>),
    Format(AttachmentFormat<D>),
}

#[derive(Debug)]
pub struct RenderTargetOptions<D: GpuDevice> {
    pub width: u32,
    pub height: u32,
    pub color: ColorAttachments<D>,
    pub needs_depth: bool,
}

impl<D: GpuDevice> RenderTargetOptions<D> {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            color: ColorAttachments::Default,
            needs_depth: false,
        }
    }

    pub fn with_texture(mut self, texture: Texture<D>) -> Self {
        self.color = ColorAttachments::Texture(texture);
        self
    }

    pub fn with_attachments(mut self, format: AttachmentFormat<D>) -> Self {
        self.color = ColorAttachments::Format(format);
        self
    }

    pub fn with_depth(mut self, needs_depth: bool) -> Self {
        self.needs_depth = needs_depth;
        self
    }
}

fn incomplete_kind(status: u32) -> FramebufferIncomplete {
    match status {
        glow::FRAMEBUFFER_UNSUPPORTED => FramebufferIncomplete::Unsupported,
        glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => FramebufferIncomplete::IncompleteAttachment,
        FRAMEBUFFER_INCOMPLETE_DIMENSIONS => FramebufferIncomplete::IncompleteDimensions,
        glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => {
            FramebufferIncomplete::MissingAttachment
        }
        other => FramebufferIncomplete::Unknown(other),
    }
}

#[derive(Debug)]
pub struct RenderTarget<D: GpuDevice> {
    fbo: D::Framebuffer,
    /// Never empty.
    color: Vec<Texture<D>>,
    depth: Option<Texture<D>>,
    attachment_points: Vec<u32>,
    width: u32,
    height: u32,
}

impl<D: GpuDevice> RenderTarget<D> {
    pub fn new(
        ctx: &RenderingContext<D>,
        options: RenderTargetOptions<D>,
    ) -> Result<Self, EngineError> {
        let RenderTargetOptions {
            width,
            height,
            color,
            needs_depth,
        } = options;

        let color = match color {
            ColorAttachments::Default => {
                vec![Texture::empty(ctx, width, height, color_attachment_format(ctx))?]
            }
            ColorAttachments::Texture(t) => vec![t],
            ColorAttachments::Format(format) => format.textures,
        };
        let (width, height) = color[0].dimensions();
        let attachment_points: Vec<u32> = (0..color.len() as u32)
            .map(|i| glow::COLOR_ATTACHMENT0 + i)
            .collect();

        let depth = if needs_depth {
            match Texture::depth(ctx, width, height) {
                Ok(d) => Some(d),
                Err(e) => {
                    release(ctx, color, None);
                    return Err(e);
                }
            }
        } else {
            None
        };

        let gl = ctx.gl();
        let fbo = match gl.create_framebuffer() {
            Ok(fbo) => fbo,
            Err(e) => {
                release(ctx, color, depth);
                return Err(EngineError::GlCreate(format!(
                    "create_framebuffer failed: {e}"
                )));
            }
        };

        gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
        for (&point, texture) in attachment_points.iter().zip(&color) {
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                point,
                glow::TEXTURE_2D,
                Some(texture.handle()),
                0,
            );
        }
        if let Some(depth) = &depth {
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::DEPTH_ATTACHMENT,
                glow::TEXTURE_2D,
                Some(depth.handle()),
                0,
            );
        }
        if ctx.capabilities().supports_multi_render_target() {
            gl.draw_buffers(&attachment_points);
        }

        let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
        gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        if status != glow::FRAMEBUFFER_COMPLETE {
            gl.delete_framebuffer(fbo);
            release(ctx, color, depth);
            return Err(EngineError::RenderTargetIncomplete(incomplete_kind(status)));
        }

        debug!(
            width,
            height,
            attachments = attachment_points.len(),
            depth = depth.is_some(),
            "render target created"
        );
        Ok(Self {
            fbo,
            color,
            depth,
            attachment_points,
            width,
            height,
        })
    }

    /// Make this the draw destination: viewport to the target size and every attachment
    /// enabled for output.
    pub fn bind(&self, ctx: &RenderingContext<D>) {
        let gl = ctx.gl();
        gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.fbo));
        gl.viewport(0, 0, self.width as i32, self.height as i32);
        self.draw_buffers(ctx);
    }

    /// Back to the default framebuffer and the context viewport.
    pub fn unbind(&self, ctx: &RenderingContext<D>) {
        ctx.gl().bind_framebuffer(glow::FRAMEBUFFER, None);
        ctx.restore_viewport();
    }

    /// Bound until the guard drops.
    pub fn bind_scoped<'a>(&'a self, ctx: &'a RenderingContext<D>) -> BoundTarget<'a, D> {
        self.bind(ctx);
        BoundTarget { target: self, ctx }
    }

    /// Issue `drawBuffers` over all attachment points (target must be bound).
    pub fn draw_buffers(&self, ctx: &RenderingContext<D>) {
        if ctx.capabilities().supports_multi_render_target() {
            ctx.gl().draw_buffers(&self.attachment_points);
        }
    }

    pub fn framebuffer(&self) -> D::Framebuffer {
        self.fbo
    }

    pub fn attachment_points(&self) -> &[u32] {
        &self.attachment_points
    }

    pub fn num_attachments(&self) -> usize {
        self.color.len()
    }

    /// Color texture `idx`; out-of-range indices fall back to attachment 0.
    pub fn texture(&self, idx: usize) -> &Texture<D> {
        self.color.get(idx).unwrap_or(&self.color[0])
    }

    pub fn textures(&self) -> &[Texture<D>] {
        &self.color
    }

    pub fn view(&self, idx: usize) -> TextureView<D> {
        self.texture(idx).view()
    }

    /// Attachment 0, the texture passes sample.
    pub fn color_view(&self) -> TextureView<D> {
        self.color[0].view()
    }

    pub fn depth_texture(&self) -> Option<&Texture<D>> {
        self.depth.as_ref()
    }

    pub fn bind_texture(&self, ctx: &RenderingContext<D>, unit: u32) {
        self.color[0].bind(ctx, unit);
    }

    /// Attachment `i` on unit `i`.
    pub fn bind_attachment_textures(&self, ctx: &RenderingContext<D>) {
        for (unit, texture) in self.color.iter().enumerate() {
            texture.bind(ctx, unit as u32);
        }
    }

    pub fn unbind_attachment_textures(&self, ctx: &RenderingContext<D>) {
        ctx.clear_textures(self.color.len() as u32);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Reallocate every attachment at `width`×`height`. Attachment bindings are kept.
    pub fn resize(
        &mut self,
        ctx: &RenderingContext<D>,
        width: u32,
        height: u32,
    ) -> Result<(), EngineError> {
        for texture in &mut self.color {
            texture.resize(ctx, width, height)?;
        }
        if let Some(depth) = &mut self.depth {
            depth.resize(ctx, width, height)?;
        }
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Read a rectangle of attachment 0 as bytes or floats, matching its texel type.
    pub fn read_pixels(
        &self,
        ctx: &RenderingContext<D>,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    ) -> PixelData {
        let gl = ctx.gl();
        let values = width as usize * height as usize * 4;
        gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.fbo));
        let pixels = if self.color[0].format().is_float() {
            let mut out = vec![0.0f32; values];
            gl.read_pixels(
                x,
                y,
                width as i32,
                height as i32,
                glow::RGBA,
                glow::FLOAT,
                bytemuck::cast_slice_mut(&mut out),
            );
            PixelData::F32(out)
        } else {
            let mut out = vec![0u8; values];
            gl.read_pixels(
                x,
                y,
                width as i32,
                height as i32,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                &mut out,
            );
            PixelData::U8(out)
        };
        gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        pixels
    }

    pub fn destroy(self, ctx: &RenderingContext<D>) {
        ctx.gl().delete_framebuffer(self.fbo);
        release(ctx, self.color, self.depth);
    }
}

fn release<D: GpuDevice>(
    ctx: &RenderingContext<D>,
    color: Vec<Texture<D>>,
    depth: Option<Texture<D>>,
) {
    for texture in color.into_iter().chain(depth) {
        texture.destroy(ctx);
    }
}

/// Unbinds its render target on drop.
#[derive(Debug)]
pub struct BoundTarget<'a, D: GpuDevice> {
    target: &'a RenderTarget<D>,
    ctx: &'a RenderingContext<D>,
}

impl<D: GpuDevice> Drop for BoundTarget<'_, D> {
    fn drop(&mut self) {
        self.target.unbind(self.ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{create_context, ApiVariant};
    use crate::headless::{HeadlessConfig, HeadlessDevice, HeadlessSurface};
    use crate::texture::TextureFormat;
    use glint_core::ContextOptions;

    fn ctx() -> RenderingContext<HeadlessDevice> {
        create_context(&mut HeadlessSurface::webgl2(32, 32), &ContextOptions::default())
            .expect("context")
    }

    fn textures(ctx: &RenderingContext<HeadlessDevice>, n: usize) -> Vec<Texture<HeadlessDevice>> {
        (0..n)
            .map(|_| Texture::empty(ctx, 4, 4, TextureFormat::rgba8()).expect("texture"))
            .collect()
    }

    #[test]
    fn attachment_points_follow_texture_order() {
        let ctx = ctx();
        let texs = textures(&ctx, 3);
        let handles: Vec<_> = texs.iter().map(|t| t.handle()).collect();
        let format = AttachmentFormat::from_textures(&ctx, texs).expect("format");
        assert_eq!(
            format.attachments(),
            vec![
                glow::COLOR_ATTACHMENT0,
                glow::COLOR_ATTACHMENT1,
                glow::COLOR_ATTACHMENT2
            ]
        );

        let target = RenderTarget::new(&ctx, RenderTargetOptions::new(4, 4).with_attachments(format))
            .expect("target");
        for (i, handle) in handles.iter().enumerate() {
            assert_eq!(
                ctx.gl()
                    .attachment_of(target.framebuffer(), glow::COLOR_ATTACHMENT0 + i as u32),
                Some(*handle)
            );
        }
    }

    #[test]
    fn count_mismatch_is_a_hard_error() {
        let ctx = ctx();
        let err = AttachmentFormat::new(&ctx, 3, textures(&ctx, 2)).expect_err("3 vs 2");
        assert!(matches!(
            err,
            EngineError::AttachmentCountMismatch { requested: 3, textures: 2 }
        ));
        assert_eq!(ctx.gl().live_textures(), 0, "textures released");
    }

    #[test]
    fn count_must_be_strictly_below_limit() {
        let ctx = ctx();
        assert!(matches!(
            AttachmentFormat::from_textures(&ctx, Vec::new()),
            Err(EngineError::AttachmentLimit { count: 0, .. })
        ));
        let max = ctx.limits().max_color_attachments;
        assert!(matches!(
            AttachmentFormat::from_textures(&ctx, textures(&ctx, max)),
            Err(EngineError::AttachmentLimit { .. })
        ));
        assert!(AttachmentFormat::from_textures(&ctx, textures(&ctx, max - 1)).is_ok());
    }

    #[test]
    fn default_target_is_float_and_clears_red() {
        let ctx = ctx();
        let target = RenderTarget::new(&ctx, RenderTargetOptions::new(1, 1)).expect("target");
        assert!(target.texture(0).format().is_float());

        target.bind(&ctx);
        ctx.clear_color_only([1.0, 0.0, 0.0, 1.0]);
        target.unbind(&ctx);

        assert_eq!(
            target.read_pixels(&ctx, 0, 0, 1, 1),
            PixelData::F32(vec![1.0, 0.0, 0.0, 1.0])
        );
    }

    #[test]
    fn byte_target_reads_back_bytes() {
        let mut surface = HeadlessSurface::webgl1(HeadlessConfig::webgl1_bare(), 8, 8);
        let ctx = create_context(&mut surface, &ContextOptions::default()).expect("context");
        let target = RenderTarget::new(&ctx, RenderTargetOptions::new(1, 1)).expect("target");
        target.bind(&ctx);
        ctx.clear_color_only([1.0, 0.0, 0.0, 1.0]);
        target.unbind(&ctx);
        assert_eq!(
            target.read_pixels(&ctx, 0, 0, 1, 1),
            PixelData::U8(vec![255, 0, 0, 255])
        );
    }

    #[test]
    fn bind_sets_viewport_and_unbind_restores_it() {
        let ctx = ctx();
        let target = RenderTarget::new(&ctx, RenderTargetOptions::new(8, 4)).expect("target");
        let before = ctx.gl().bindings();
        for _ in 0..2 {
            target.bind(&ctx);
            let bound = ctx.gl().bindings();
            assert_eq!(bound.framebuffer, Some(target.framebuffer()));
            assert_eq!(bound.viewport, [0, 0, 8, 4]);
            target.unbind(&ctx);
        }
        assert_eq!(ctx.gl().bindings(), before);
    }

    #[test]
    fn scoped_binding_unbinds_on_drop() {
        let ctx = ctx();
        let target = RenderTarget::new(&ctx, RenderTargetOptions::new(2, 2)).expect("target");
        {
            let _bound = target.bind_scoped(&ctx);
            assert_eq!(ctx.gl().bindings().framebuffer, Some(target.framebuffer()));
        }
        assert_eq!(ctx.gl().bindings().framebuffer, None);
        assert_eq!(ctx.gl().bindings().viewport, [0, 0, 32, 32]);
    }

    #[test]
    fn bind_enables_all_draw_buffers() {
        let ctx = ctx();
        let format = AttachmentFormat::from_textures(&ctx, textures(&ctx, 2)).expect("format");
        let target = RenderTarget::new(&ctx, RenderTargetOptions::new(4, 4).with_attachments(format))
            .expect("target");
        target.bind(&ctx);
        assert_eq!(
            ctx.gl().draw_buffers_of(target.framebuffer()),
            vec![glow::COLOR_ATTACHMENT0, glow::COLOR_ATTACHMENT1]
        );
        target.unbind(&ctx);
    }

    #[test]
    fn resize_round_trips_and_keeps_attachments() {
        let ctx = ctx();
        let mut target = RenderTarget::new(&ctx, RenderTargetOptions::new(4, 4).with_depth(true))
            .expect("target");
        let color = target.texture(0).handle();
        target.resize(&ctx, 64, 48).expect("resize");
        assert_eq!(target.dimensions(), (64, 48));
        assert_eq!(ctx.gl().texture_size(color), Some((64, 48)));
        assert_eq!(
            target.depth_texture().and_then(|d| ctx.gl().texture_size(d.handle())),
            Some((64, 48))
        );
        assert_eq!(
            ctx.gl().attachment_of(target.framebuffer(), glow::COLOR_ATTACHMENT0),
            Some(color)
        );
    }

    #[test]
    fn mismatched_sizes_are_incomplete_dimensions() {
        let ctx = ctx();
        let texs = vec![
            Texture::empty(&ctx, 4, 4, TextureFormat::rgba8()).expect("a"),
            Texture::empty(&ctx, 8, 8, TextureFormat::rgba8()).expect("b"),
        ];
        let format = AttachmentFormat::from_textures(&ctx, texs).expect("format");
        let err = RenderTarget::new(&ctx, RenderTargetOptions::new(4, 4).with_attachments(format))
            .expect_err("mismatch");
        assert!(matches!(
            err,
            EngineError::RenderTargetIncomplete(FramebufferIncomplete::IncompleteDimensions)
        ));
        assert_eq!(ctx.gl().live_textures(), 0);
    }

    #[test]
    fn float_target_without_color_buffer_extension_is_unsupported() {
        let mut surface = HeadlessSurface::new(
            vec![ApiVariant::WebGl2],
            HeadlessConfig::webgl2().without_extension("EXT_color_buffer_float"),
            (8, 8),
        );
        let ctx = create_context(&mut surface, &ContextOptions::default()).expect("context");
        let float = TextureFormat::float_rgba(&ctx).expect("float textures are core");
        let tex = Texture::empty(&ctx, 2, 2, float).expect("texture");
        let err = RenderTarget::new(&ctx, RenderTargetOptions::new(2, 2).with_texture(tex))
            .expect_err("not renderable");
        assert!(matches!(
            err,
            EngineError::RenderTargetIncomplete(FramebufferIncomplete::Unsupported)
        ));

        // the default attachment falls back to RGBA8 instead
        let target = RenderTarget::new(&ctx, RenderTargetOptions::new(2, 2)).expect("fallback");
        assert!(!target.texture(0).format().is_float());
    }
}
