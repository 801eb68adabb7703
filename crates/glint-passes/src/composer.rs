use glint_runtime_glow::{EngineError, GpuDevice, RenderingContext, TextureView};
use tracing::debug;

use crate::PostPass;

/// A linear chain of passes, each sampling the finished output of the one before.
///
/// Pass 0 reads the composer input. Links are rebuilt whenever the list or the input
/// changes, so they never go stale.
#[derive(Debug)]
pub struct Composer<D: GpuDevice> {
    input: Option<TextureView<D>>,
    passes: Vec<Box<dyn PostPass<D>>>,
}

impl<D: GpuDevice> Composer<D> {
    pub fn new(input: Option<TextureView<D>>, passes: Vec<Box<dyn PostPass<D>>>) -> Self {
        let mut composer = Self { input, passes };
        composer.relink();
        composer
    }

    /// Insert `pass` at `index`, or append when `index` is `None` or past the end.
    pub fn add_pass(&mut self, pass: Box<dyn PostPass<D>>, index: Option<usize>) {
        match index {
            Some(i) if i < self.passes.len() => self.passes.insert(i, pass),
            _ => self.passes.push(pass),
        }
        self.relink();
    }

    /// Take the pass at `index` out of the chain; its input is cleared.
    pub fn remove_pass(&mut self, index: usize) -> Option<Box<dyn PostPass<D>>> {
        if index >= self.passes.len() {
            return None;
        }
        let mut pass = self.passes.remove(index);
        pass.set_input(None);
        self.relink();
        Some(pass)
    }

    pub fn set_input(&mut self, input: Option<TextureView<D>>) {
        self.input = input;
        self.relink();
    }

    pub fn input(&self) -> Option<TextureView<D>> {
        self.input
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn passes(&self) -> &[Box<dyn PostPass<D>>] {
        &self.passes
    }

    pub fn pass(&self, index: usize) -> Option<&dyn PostPass<D>> {
        self.passes.get(index).map(|p| p.as_ref())
    }

    pub fn pass_mut(&mut self, index: usize) -> Option<&mut (dyn PostPass<D> + 'static)> {
        self.passes.get_mut(index).map(|p| p.as_mut())
    }

    fn relink(&mut self) {
        let mut prev = self.input;
        for pass in &mut self.passes {
            pass.set_input(prev);
            prev = Some(pass.output());
        }
        debug!(passes = self.passes.len(), "composer relinked");
    }

    /// Run every pass in order with blending off and depth testing on.
    pub fn run(&mut self, ctx: &RenderingContext<D>) -> Result<(), EngineError> {
        ctx.disable_blending();
        ctx.enable_depth();
        for pass in &mut self.passes {
            pass.run(ctx)?;
        }
        Ok(())
    }

    /// Output of the last pass; the input itself when there are no passes.
    pub fn output(&self) -> Option<TextureView<D>> {
        match self.passes.last() {
            Some(pass) => Some(pass.output()),
            None => self.input,
        }
    }

    /// Resize every pass. Outputs keep their handles, so links stay valid.
    pub fn resize(
        &mut self,
        ctx: &RenderingContext<D>,
        width: u32,
        height: u32,
    ) -> Result<(), EngineError> {
        for pass in &mut self.passes {
            pass.resize(ctx, width, height)?;
        }
        Ok(())
    }

    pub fn destroy(self, ctx: &RenderingContext<D>) {
        for pass in self.passes {
            pass.destroy(ctx);
        }
    }
}
