use std::f32::consts::PI;

use glint_runtime_glow::{
    EngineError, GpuDevice, PixelData, RenderingContext, Texture, TextureFormat, TextureView,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::fx::FxPass;
use crate::shaders;
use crate::PostPass;

/// Side of the square displacement map.
pub const DISPLACEMENT_SIZE: u32 = 64;

const GLITCH_UNIFORMS: &[&str] = &[
    "seed",
    "amount",
    "angle",
    "seed_x",
    "seed_y",
    "distortion_x",
    "distortion_y",
    "col_s",
    "tDisp",
    "byp",
];

/// Values the glitch shader reads each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlitchUniforms {
    pub seed: f32,
    pub amount: f32,
    pub angle: f32,
    pub seed_x: f32,
    pub seed_y: f32,
    pub distortion_x: f32,
    pub distortion_y: f32,
    pub col_s: f32,
    /// When set the shader copies its input untouched.
    pub bypass: bool,
}

impl Default for GlitchUniforms {
    fn default() -> Self {
        Self {
            seed: 0.02,
            amount: 0.0,
            angle: 0.0,
            seed_x: 0.0,
            seed_y: 0.0,
            distortion_x: 0.0,
            distortion_y: 0.0,
            col_s: 0.0,
            bypass: true,
        }
    }
}

impl GlitchUniforms {
    fn pairs(&self) -> [(&'static str, f32); 9] {
        [
            ("seed", self.seed),
            ("amount", self.amount),
            ("angle", self.angle),
            ("seed_x", self.seed_x),
            ("seed_y", self.seed_y),
            ("distortion_x", self.distortion_x),
            ("distortion_y", self.distortion_y),
            ("col_s", self.col_s),
            ("byp", if self.bypass { 1.0 } else { 0.0 }),
        ]
    }
}

/// Digital glitch: RGB split, slice distortion and snow, driven by a random displacement map.
///
/// A strong burst fires every `trigger` frames (re-rolled in `120..=240` after each burst);
/// the first fifth of each cycle gets milder jitter, the rest passes the input through
/// unless the per-frame coin flip enables the effect.
#[derive(Debug)]
pub struct GlitchPass<D: GpuDevice, R: Rng = StdRng> {
    fx: FxPass<D>,
    displacement: Texture<D>,
    rng: R,
    uniforms: GlitchUniforms,
    frame: u32,
    trigger: u32,
}

impl<D: GpuDevice> GlitchPass<D> {
    pub fn new(ctx: &RenderingContext<D>, width: u32, height: u32) -> Result<Self, EngineError> {
        Self::with_rng(ctx, width, height, StdRng::from_os_rng())
    }
}

impl<D: GpuDevice, R: Rng> GlitchPass<D, R> {
    pub fn with_rng(
        ctx: &RenderingContext<D>,
        width: u32,
        height: u32,
        mut rng: R,
    ) -> Result<Self, EngineError> {
        let displacement = displacement_map(ctx, &mut rng)?;
        let fragment = shaders::fragment(ctx, shaders::GLITCH);
        let mut fx = match FxPass::new(ctx, fragment, width, height, GLITCH_UNIFORMS) {
            Ok(fx) => fx,
            Err(e) => {
                displacement.destroy(ctx);
                return Err(e);
            }
        };
        fx.add_sampler("tDisp", displacement.view());
        let trigger = rng.random_range(120..=240);
        Ok(Self {
            fx,
            displacement,
            rng,
            uniforms: GlitchUniforms::default(),
            frame: 0,
            trigger,
        })
    }

    pub fn uniforms(&self) -> &GlitchUniforms {
        &self.uniforms
    }

    /// Frames since the last burst.
    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn trigger(&self) -> u32 {
        self.trigger
    }

    pub fn displacement(&self) -> TextureView<D> {
        self.displacement.view()
    }

    pub fn fx(&self) -> &FxPass<D> {
        &self.fx
    }

    /// Roll this frame's uniforms.
    fn step(&mut self) {
        let rng = &mut self.rng;
        let u = &mut self.uniforms;
        if rng.random::<f32>() * 20.0 > 10.0 {
            u.bypass = false;
            u.seed = rng.random();
        }

        let phase = self.frame % self.trigger;
        if phase == 0 {
            u.amount = rng.random::<f32>() / 2.0;
            u.angle = rng.random_range(-PI..PI);
            u.seed_x = rng.random_range(-1.0..1.0);
            u.seed_y = rng.random_range(-1.0..1.0);
            u.distortion_x = rng.random_range(0.0..1.0);
            u.distortion_y = rng.random_range(0.0..1.0);
            self.frame = 0;
            self.trigger = rng.random_range(120..=240);
            trace!(next = self.trigger, "glitch burst");
        } else if phase < self.trigger / 5 {
            u.amount = rng.random::<f32>() / 40.0;
            u.angle = rng.random_range(-PI..PI);
            u.distortion_x = rng.random_range(0.0..1.0);
            u.distortion_y = rng.random_range(0.0..1.0);
            u.seed_x = rng.random_range(-0.3..0.3);
            u.seed_y = rng.random_range(-0.3..0.3);
        } else {
            u.bypass = true;
        }
    }
}

/// 64×64 grey noise, float when the context samples float textures.
fn displacement_map<D: GpuDevice, R: Rng>(
    ctx: &RenderingContext<D>,
    rng: &mut R,
) -> Result<Texture<D>, EngineError> {
    let texels = (DISPLACEMENT_SIZE * DISPLACEMENT_SIZE) as usize;
    let grey: Vec<f32> = (0..texels).map(|_| rng.random::<f32>()).collect();
    let (format, data) = match TextureFormat::float_rgba(ctx) {
        Some(format) => (
            format,
            PixelData::F32(grey.iter().flat_map(|&v| [v, v, v, 1.0]).collect()),
        ),
        None => (
            TextureFormat::rgba8(),
            PixelData::U8(
                grey.iter()
                    .flat_map(|&v| {
                        let b = (v * 255.0).round() as u8;
                        [b, b, b, 255]
                    })
                    .collect(),
            ),
        ),
    };
    let format = format.with_filter(glow::NEAREST, glow::NEAREST);
    Texture::with_data(ctx, DISPLACEMENT_SIZE, DISPLACEMENT_SIZE, format, data)
}

impl<D: GpuDevice, R: Rng + std::fmt::Debug> PostPass<D> for GlitchPass<D, R> {
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
        self.fx.resize(ctx, width, height)
    }

    fn run(&mut self, ctx: &RenderingContext<D>) -> Result<(), EngineError> {
        self.step();
        let values = self.uniforms.pairs();
        let result = self.fx.run_with(ctx, |shader, ctx| {
            for (name, value) in values {
                shader.set_float(ctx, name, value);
            }
            Ok(())
        });
        self.uniforms.bypass = true;
        self.uniforms.seed = 0.0;
        self.frame += 1;
        result
    }

    fn destroy(self: Box<Self>, ctx: &RenderingContext<D>) {
        let this = *self;
        this.fx.destroy(ctx);
        this.displacement.destroy(ctx);
    }
}
