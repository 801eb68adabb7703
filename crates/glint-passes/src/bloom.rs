use glint_runtime_glow::{EngineError, GpuDevice, RenderingContext, TextureView};

use crate::fx::FxPass;
use crate::shaders;
use crate::PostPass;

/// Horizontal gaussian glow added over the input.
#[derive(Debug)]
pub struct BloomPass<D: GpuDevice> {
    fx: FxPass<D>,
}

impl<D: GpuDevice> BloomPass<D> {
    pub fn new(ctx: &RenderingContext<D>, width: u32, height: u32) -> Result<Self, EngineError> {
        let fragment = shaders::fragment(ctx, shaders::BLOOM);
        let mut fx = FxPass::new(ctx, fragment, width, height, &["sample_offset"])?;
        fx.set_uniform("sample_offset", &sample_offset(width))?;
        Ok(Self { fx })
    }

    pub fn fx(&self) -> &FxPass<D> {
        &self.fx
    }

    pub fn fx_mut(&mut self) -> &mut FxPass<D> {
        &mut self.fx
    }
}

/// One texel step along x.
fn sample_offset(width: u32) -> [f32; 2] {
    [1.0 / width.max(1) as f32, 0.0]
}

impl<D: GpuDevice> PostPass<D> for BloomPass<D> {
    fn input(&self) -> Option<TextureView<D>> {
        self.fx.input()
    }

    fn set_input(&mut self, input: Option<TextureView<D>>) {
        self.fx.set_input(input);
    }

    fn output(&self) -> TextureView<D> {
        self.fx.output()
    }

    fn resolution(&self) -> (u32, u32) {
        PostPass::resolution(&self.fx)
    }

    fn resize(
        &mut self,
        ctx: &RenderingContext<D>,
        width: u32,
        height: u32,
    ) -> Result<(), EngineError> {
        self.fx.resize(ctx, width, height)?;
        self.fx.set_uniform("sample_offset", &sample_offset(width))
    }

    fn run(&mut self, ctx: &RenderingContext<D>) -> Result<(), EngineError> {
        self.fx.run(ctx)
    }

    fn destroy(self: Box<Self>, ctx: &RenderingContext<D>) {
        self.fx.destroy(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ctx;

    #[test]
    fn offset_is_one_texel_wide() {
        let ctx = ctx();
        let mut bloom = BloomPass::new(&ctx, 200, 100).expect("bloom");
        bloom.run(&ctx).expect("run");
        let program = bloom.fx().shader().expect("shader").program();
        assert_eq!(
            ctx.gl().uniform_value(program, "sample_offset"),
            Some(vec![0.005, 0.0])
        );

        bloom.resize(&ctx, 400, 100).expect("resize");
        assert_eq!(bloom.fx().uniform_value("sample_offset"), Some(&[0.0025, 0.0][..]));
    }
}
