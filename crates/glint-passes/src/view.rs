use glint_runtime_glow::{
    EngineError, FullscreenQuad, GpuDevice, RenderTarget, RenderTargetOptions, RenderingContext,
    TextureView,
};

use crate::PostPass;

/// An offscreen scene layer.
///
/// Draw a scene into it between [`View::bind_view`] and [`View::unbind_view`], then present
/// it with [`View::draw`]. Inside a [`crate::Composer`] it additively blends its input over
/// whatever it already holds.
#[derive(Debug)]
pub struct View<D: GpuDevice> {
    target: RenderTarget<D>,
    quad: FullscreenQuad<D>,
    input: Option<TextureView<D>>,
    in_composer: bool,
}

impl<D: GpuDevice> View<D> {
    pub fn new(ctx: &RenderingContext<D>, width: u32, height: u32) -> Result<Self, EngineError> {
        let target =
            RenderTarget::new(ctx, RenderTargetOptions::new(width, height).with_depth(true))?;
        let quad = match FullscreenQuad::new(ctx) {
            Ok(quad) => quad,
            Err(e) => {
                target.destroy(ctx);
                return Err(e);
            }
        };
        Ok(Self {
            target,
            quad,
            input: None,
            in_composer: false,
        })
    }

    /// Render into the layer with the viewport at `(x, y)` and the layer's size.
    pub fn bind_view(&self, ctx: &RenderingContext<D>, x: i32, y: i32) {
        self.target.bind(ctx);
        let (w, h) = self.target.dimensions();
        ctx.gl().viewport(x, y, w as i32, h as i32);
    }

    pub fn unbind_view(&self, ctx: &RenderingContext<D>) {
        self.target.unbind(ctx);
    }

    /// Present the layer into whatever target is bound.
    pub fn draw(&self, ctx: &RenderingContext<D>) -> Result<(), EngineError> {
        self.quad.draw_texture(ctx, self.target.color_view())
    }

    pub fn texture(&self) -> TextureView<D> {
        self.target.color_view()
    }

    pub fn target(&self) -> &RenderTarget<D> {
        &self.target
    }

    /// Whether a composer has linked an input into this view.
    pub fn in_composer(&self) -> bool {
        self.in_composer
    }

    pub fn destroy(self, ctx: &RenderingContext<D>) {
        self.quad.destroy(ctx);
        self.target.destroy(ctx);
    }
}

impl<D: GpuDevice> PostPass<D> for View<D> {
    fn input(&self) -> Option<TextureView<D>> {
        self.input
    }

    fn set_input(&mut self, input: Option<TextureView<D>>) {
        self.in_composer = input.is_some();
        self.input = input;
    }

    fn output(&self) -> TextureView<D> {
        self.target.color_view()
    }

    fn resolution(&self) -> (u32, u32) {
        self.target.dimensions()
    }

    fn resize(
        &mut self,
        ctx: &RenderingContext<D>,
        width: u32,
        height: u32,
    ) -> Result<(), EngineError> {
        self.target.resize(ctx, width, height)
    }

    fn run(&mut self, ctx: &RenderingContext<D>) -> Result<(), EngineError> {
        let Some(input) = self.input else {
            return Ok(());
        };
        self.target.bind(ctx);
        ctx.clear_screen();
        ctx.enable_additive_blending();
        let result = self.quad.draw_texture(ctx, input);
        self.target.unbind(ctx);
        ctx.disable_blending();
        result
    }

    fn destroy(self: Box<Self>, ctx: &RenderingContext<D>) {
        View::destroy(*self, ctx);
    }
}
