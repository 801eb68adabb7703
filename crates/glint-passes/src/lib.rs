//! Post-processing on top of `glint-runtime-glow`: fullscreen passes, the composer that chains
//! them, and the ping-pong target pair used for feedback simulations.

#![deny(missing_debug_implementations)]

use std::fmt::Debug;

use glint_runtime_glow::{EngineError, GpuDevice, RenderingContext, TextureView};

pub mod bloom;
pub mod composer;
pub mod fx;
pub mod glitch;
pub mod pingpong;
pub mod shaders;
pub mod view;

pub use bloom::BloomPass;
pub use composer::Composer;
pub use fx::FxPass;
pub use glitch::{GlitchPass, GlitchUniforms};
pub use pingpong::PingPongTarget;
pub use view::View;

/// One stage of a [`Composer`] chain.
///
/// A pass renders into a target it owns and exposes that target's color texture as its
/// output. The composer links each pass's input to the output of the one before it.
pub trait PostPass<D: GpuDevice>: Debug {
    fn input(&self) -> Option<TextureView<D>>;

    fn set_input(&mut self, input: Option<TextureView<D>>);

    fn output(&self) -> TextureView<D>;

    fn resolution(&self) -> (u32, u32);

    fn resize(
        &mut self,
        ctx: &RenderingContext<D>,
        width: u32,
        height: u32,
    ) -> Result<(), EngineError>;

    fn run(&mut self, ctx: &RenderingContext<D>) -> Result<(), EngineError>;

    /// Release the pass's GPU resources.
    fn destroy(self: Box<Self>, ctx: &RenderingContext<D>);
}

#[cfg(test)]
pub(crate) mod test_support {
    use glint_core::ContextOptions;
    use glint_runtime_glow::{create_context, HeadlessDevice, HeadlessSurface, RenderingContext};

    pub fn ctx() -> RenderingContext<HeadlessDevice> {
        create_context(&mut HeadlessSurface::webgl2(16, 16), &ContextOptions::default())
            .expect("context")
    }
}
