use std::collections::BTreeMap;

use glint_runtime_glow::{
    EngineError, FullscreenQuad, GpuDevice, RenderTarget, RenderTargetOptions, RenderingContext,
    Shader, ShaderSource, TextureView,
};
use tracing::trace;

use crate::shaders;
use crate::PostPass;

/// Uniforms every [`FxPass`] shader can read.
pub const FX_UNIFORMS: &[&str] = &["resolution", "time", "tex0"];

/// A fullscreen effect rendered into its own target.
///
/// The input is sampled as `tex0` on unit 0. Extra samplers go on units 1 and up, in the
/// order they were added. Stored uniform values are re-uploaded on every run.
#[derive(Debug)]
pub struct FxPass<D: GpuDevice> {
    target: RenderTarget<D>,
    quad: FullscreenQuad<D>,
    input: Option<TextureView<D>>,
    resolution: [f32; 2],
    time: f32,
    values: BTreeMap<String, Vec<f32>>,
    samplers: Vec<(String, TextureView<D>)>,
}

impl<D: GpuDevice> FxPass<D> {
    /// `fragment` is a complete fragment source; see [`shaders::fragment`] for the prelude
    /// the built-in bodies use. `uniforms` adds names beyond [`FX_UNIFORMS`].
    pub fn new(
        ctx: &RenderingContext<D>,
        fragment: impl Into<ShaderSource>,
        width: u32,
        height: u32,
        uniforms: &[&str],
    ) -> Result<Self, EngineError> {
        let target = RenderTarget::new(ctx, RenderTargetOptions::new(width, height))?;
        let names: Vec<&str> = FX_UNIFORMS.iter().chain(uniforms).copied().collect();
        let quad = match FullscreenQuad::with_fragment(ctx, fragment, &names) {
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
            resolution: [width as f32, height as f32],
            time: 0.0,
            values: BTreeMap::new(),
            samplers: Vec::new(),
        })
    }

    /// Copies its input unchanged.
    pub fn passthrough(
        ctx: &RenderingContext<D>,
        width: u32,
        height: u32,
    ) -> Result<Self, EngineError> {
        Self::new(ctx, shaders::fragment(ctx, shaders::COPY), width, height, &[])
    }

    /// Store a value uploaded on every run. Lengths follow [`Shader::uniform`].
    pub fn set_uniform(&mut self, name: &str, value: &[f32]) -> Result<(), EngineError> {
        if !matches!(value.len(), 1 | 2 | 3 | 16) {
            return Err(EngineError::UniformShape {
                name: name.to_string(),
                expected: "16, 3, 2 or 1",
                got: value.len(),
            });
        }
        self.values.insert(name.to_string(), value.to_vec());
        Ok(())
    }

    pub fn uniform_value(&self, name: &str) -> Option<&[f32]> {
        self.values.get(name).map(Vec::as_slice)
    }

    pub fn set_time(&mut self, time: f32) {
        self.time = time;
    }

    /// Sample `view` through `name`; re-adding a name replaces its texture and keeps its unit.
    pub fn add_sampler(&mut self, name: &str, view: TextureView<D>) {
        match self.samplers.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = view,
            None => self.samplers.push((name.to_string(), view)),
        }
    }

    /// Unit a sampler added with [`FxPass::add_sampler`] is bound to.
    pub fn sampler_unit(&self, name: &str) -> Option<u32> {
        self.samplers
            .iter()
            .position(|(n, _)| n == name)
            .map(|i| i as u32 + 1)
    }

    /// Change the `resolution` uniform only; the target keeps its size.
    pub fn update_resolution(&mut self, width: u32, height: u32) {
        self.resolution = [width as f32, height as f32];
    }

    pub fn target(&self) -> &RenderTarget<D> {
        &self.target
    }

    pub fn shader(&self) -> Option<&Shader<D>> {
        self.quad.shader()
    }

    /// Run the pass; `extra` sets further uniforms after the stored ones.
    pub fn run_with<F>(&self, ctx: &RenderingContext<D>, extra: F) -> Result<(), EngineError>
    where
        F: FnOnce(&Shader<D>, &RenderingContext<D>) -> Result<(), EngineError>,
    {
        self.target.bind(ctx);
        ctx.clear_screen();

        match self.input {
            Some(input) => input.bind(ctx, 0),
            None => trace!("fx pass has no input"),
        }
        for (unit, (_, view)) in self.samplers.iter().enumerate() {
            view.bind(ctx, unit as u32 + 1);
        }

        let result = self.quad.draw(ctx, |shader, ctx| {
            shader.set_vec2(ctx, "resolution", &self.resolution)?;
            shader.set_float(ctx, "time", self.time);
            if self.input.is_some() {
                shader.set_texture(ctx, "tex0", 0);
            }
            for (unit, (name, _)) in self.samplers.iter().enumerate() {
                shader.set_texture(ctx, name, unit as u32 + 1);
            }
            for (name, value) in &self.values {
                shader.uniform(ctx, name, value)?;
            }
            extra(shader, ctx)
        });

        ctx.clear_textures(self.samplers.len() as u32 + 1);
        self.target.unbind(ctx);
        result
    }

    pub fn destroy(self, ctx: &RenderingContext<D>) {
        self.quad.destroy(ctx);
        self.target.destroy(ctx);
    }
}

impl<D: GpuDevice> PostPass<D> for FxPass<D> {
    fn input(&self) -> Option<TextureView<D>> {
        self.input
    }

    fn set_input(&mut self, input: Option<TextureView<D>>) {
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
        self.target.resize(ctx, width, height)?;
        self.update_resolution(width, height);
        Ok(())
    }

    fn run(&mut self, ctx: &RenderingContext<D>) -> Result<(), EngineError> {
        self.run_with(ctx, |_, _| Ok(()))
    }

    fn destroy(self: Box<Self>, ctx: &RenderingContext<D>) {
        FxPass::destroy(*self, ctx);
    }
}
