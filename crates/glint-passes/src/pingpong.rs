use glint_runtime_glow::{
    color_attachment_format, AttachmentFormat, EngineError, GpuDevice, RenderTarget,
    RenderTargetOptions, RenderingContext, Texture, TextureView,
};

/// A pair of render targets with the same attachment layout, for feedback simulations.
///
/// - `prev()` holds last frame's result; sample it
/// - `next()` is the target to render into this frame
/// - call `swap()` once the frame is done
#[derive(Debug)]
pub struct PingPongTarget<D: GpuDevice> {
    a: RenderTarget<D>,
    b: RenderTarget<D>,
    a_is_prev: bool,
}

impl<D: GpuDevice> PingPongTarget<D> {
    /// Both targets get `attachments` color textures in the default color format and start
    /// cleared to opaque black.
    pub fn new(
        ctx: &RenderingContext<D>,
        width: u32,
        height: u32,
        attachments: usize,
    ) -> Result<Self, EngineError> {
        let a = build_target(ctx, width, height, attachments)?;
        let b = match build_target(ctx, width, height, attachments) {
            Ok(b) => b,
            Err(e) => {
                a.destroy(ctx);
                return Err(e);
            }
        };
        let pair = Self {
            a,
            b,
            a_is_prev: true,
        };
        pair.clear(ctx);
        Ok(pair)
    }

    fn clear(&self, ctx: &RenderingContext<D>) {
        for target in [&self.a, &self.b] {
            target.bind(ctx);
            ctx.clear_color_only([0.0, 0.0, 0.0, 1.0]);
            target.unbind(ctx);
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.a.dimensions()
    }

    pub fn attachments(&self) -> usize {
        self.a.num_attachments()
    }

    pub fn prev(&self) -> &RenderTarget<D> {
        if self.a_is_prev {
            &self.a
        } else {
            &self.b
        }
    }

    pub fn next(&self) -> &RenderTarget<D> {
        if self.a_is_prev {
            &self.b
        } else {
            &self.a
        }
    }

    /// Attachment `idx` of the previous frame.
    pub fn prev_view(&self, idx: usize) -> TextureView<D> {
        self.prev().view(idx)
    }

    pub fn swap(&mut self) {
        self.a_is_prev = !self.a_is_prev;
    }

    /// Reallocate both targets at the new size, cleared to black.
    pub fn resize(
        &mut self,
        ctx: &RenderingContext<D>,
        width: u32,
        height: u32,
    ) -> Result<(), EngineError> {
        self.a.resize(ctx, width, height)?;
        self.b.resize(ctx, width, height)?;
        self.clear(ctx);
        Ok(())
    }

    pub fn destroy(self, ctx: &RenderingContext<D>) {
        self.a.destroy(ctx);
        self.b.destroy(ctx);
    }
}

fn build_target<D: GpuDevice>(
    ctx: &RenderingContext<D>,
    width: u32,
    height: u32,
    attachments: usize,
) -> Result<RenderTarget<D>, EngineError> {
    let format = color_attachment_format(ctx);
    let mut textures = Vec::with_capacity(attachments);
    for _ in 0..attachments.max(1) {
        match Texture::empty(ctx, width, height, format) {
            Ok(t) => textures.push(t),
            Err(e) => {
                for t in textures {
                    t.destroy(ctx);
                }
                return Err(e);
            }
        }
    }

    let options = RenderTargetOptions::new(width, height);
    let options = if attachments <= 1 {
        match textures.pop() {
            Some(t) => options.with_texture(t),
            None => options,
        }
    } else {
        options.with_attachments(AttachmentFormat::new(ctx, attachments, textures)?)
    };
    RenderTarget::new(ctx, options)
}
