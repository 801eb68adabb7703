use glam::Vec3;
use glint_core::GalleryConfig;
use glint_passes::shaders::fragment;
use glint_passes::PingPongTarget;
use glint_runtime_glow::{
    flatten_rows, AttributeSpec, Camera, DecodedImage, DrawMode, EngineError, GpuDevice, Mesh,
    RenderingContext, ShaderSource, ShaderSpec, Texture, TextureFormat,
};
use tracing::{debug, trace, warn};

use crate::navigation::Navigation;
use crate::shaders::{IMAGE_FRAG, IMAGE_VERT, IMAGE_VERT_LEGACY};
use crate::transition::Transition;

/// Unit quad drawn once per grid cell.
pub const PLANE_POSITIONS: [f32; 12] = [
    -0.5, -0.5, 0.0, //
    0.5, -0.5, 0.0, //
    0.5, 0.5, 0.0, //
    -0.5, 0.5, 0.0,
];

pub const PLANE_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

/// Attachments of the simulation buffers: position, velocity, acceleration, scale.
pub const SIMULATION_ATTACHMENTS: usize = 4;

const IMAGE_UNIFORMS: &[&str] = &[
    "currentImage",
    "nextImage",
    "mixTexture",
    "mixRatio",
    "threshold",
    "animateTransition",
];

/// Per-instance offsets and texture coordinates for a grid of `width`×`height` cells,
/// centred on the origin with `y` up. Texture coordinates are flipped on both axes.
pub fn plane_grid(width: f32, height: f32) -> (Vec<[f32; 3]>, Vec<[f32; 2]>) {
    let (nx, ny) = (width.max(1.0), height.max(1.0));
    let (cols, rows) = (nx.floor() as u32, ny.floor() as u32);
    let cells = (cols as usize + 1) * (rows as usize + 1);
    let mut positions = Vec::with_capacity(cells);
    let mut uvs = Vec::with_capacity(cells);
    for iy in 0..=rows {
        for ix in 0..=cols {
            let (fx, fy) = (ix as f32, iy as f32);
            positions.push([fx - nx / 2.0, ny / 2.0 - fy, 0.0]);
            uvs.push([1.0 - fx / nx, 1.0 - fy / ny]);
        }
    }
    (positions, uvs)
}

/// The gallery: one image spread over an instanced grid of quads, cross-fading to the next
/// through a mask texture.
#[derive(Debug)]
pub struct GalleryScene<D: GpuDevice> {
    images: Vec<Texture<D>>,
    mix_texture: Option<Texture<D>>,
    mesh: Mesh<D>,
    simulation: Option<PingPongTarget<D>>,
    transition: Transition,
    threshold: f32,
    grid_height: f32,
    time: f32,
}

impl<D: GpuDevice> GalleryScene<D> {
    pub fn new(
        ctx: &RenderingContext<D>,
        config: &GalleryConfig,
        images: &[DecodedImage],
    ) -> Result<Self, EngineError> {
        if images.is_empty() {
            return Err(EngineError::other("gallery needs at least one image"));
        }
        let mut textures = Vec::with_capacity(images.len());
        for image in images {
            match Texture::from_decoded(ctx, image, image_format()) {
                Ok(t) => textures.push(t),
                Err(e) => {
                    for t in textures {
                        t.destroy(ctx);
                    }
                    return Err(e);
                }
            }
        }

        let (grid_w, grid_h) = (
            config.image_width as f32 * 0.5,
            config.image_height as f32 * 0.5,
        );
        let mesh = match build_mesh(ctx, grid_w, grid_h) {
            Ok(mesh) => mesh,
            Err(e) => {
                for t in textures {
                    t.destroy(ctx);
                }
                return Err(e);
            }
        };

        let simulation = match PingPongTarget::new(
            ctx,
            config.image_width,
            config.image_height,
            SIMULATION_ATTACHMENTS,
        ) {
            Ok(pair) => Some(pair),
            Err(
                e @ (EngineError::AttachmentLimit { .. } | EngineError::RenderTargetIncomplete(_)),
            ) => {
                warn!(error = %e, "simulation buffers unavailable");
                None
            }
            Err(e) => {
                mesh.destroy(ctx);
                for t in textures {
                    t.destroy(ctx);
                }
                return Err(e);
            }
        };

        debug!(
            images = textures.len(),
            instances = mesh.num_instances(),
            "gallery scene built"
        );
        Ok(Self {
            transition: Transition::new(textures.len(), config.transition_secs),
            images: textures,
            mix_texture: None,
            mesh,
            simulation,
            threshold: config.threshold,
            grid_height: grid_h,
            time: 0.0,
        })
    }

    /// Upload the transition mask. Drawing starts once it is present.
    pub fn set_mix_texture(
        &mut self,
        ctx: &RenderingContext<D>,
        image: &DecodedImage,
    ) -> Result<(), EngineError> {
        let texture = Texture::from_decoded(ctx, image, image_format())?;
        if let Some(old) = self.mix_texture.replace(texture) {
            old.destroy(ctx);
        }
        Ok(())
    }

    pub fn has_mix_texture(&self) -> bool {
        self.mix_texture.is_some()
    }

    /// Scale the grid uniformly so it spans `height` world units.
    pub fn fit_height(&mut self, height: f32) {
        self.mesh.reset_transform();
        self.mesh
            .scale_model(Vec3::splat(height / self.grid_height.max(1.0)));
    }

    pub fn navigate(&mut self, nav: Navigation) -> bool {
        nav.apply(&mut self.transition)
    }

    pub fn next(&mut self) -> bool {
        self.transition.next()
    }

    pub fn previous(&mut self) -> bool {
        self.transition.previous()
    }

    pub fn update(&mut self, dt: f32) {
        self.time += dt;
        if self.transition.update(dt) {
            debug!(current = self.transition.current(), "transition finished");
        }
    }

    pub fn transition(&self) -> &Transition {
        &self.transition
    }

    pub fn mesh(&self) -> &Mesh<D> {
        &self.mesh
    }

    pub fn simulation(&self) -> Option<&PingPongTarget<D>> {
        self.simulation.as_ref()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Current image on unit 0, next on unit 1, mask on unit 2.
    pub fn draw(&self, ctx: &RenderingContext<D>, camera: &Camera) -> Result<(), EngineError> {
        let Some(mix) = &self.mix_texture else {
            trace!("mix texture not loaded; gallery draw skipped");
            return Ok(());
        };
        let current = &self.images[self.transition.current()];
        let next = &self.images[self.transition.upcoming()];
        current.bind(ctx, 0);
        next.bind(ctx, 1);
        mix.bind(ctx, 2);

        let animating = self.transition.is_animating();
        let result = self.mesh.draw_with(ctx, camera, |shader, ctx| {
            shader.set_bool(ctx, "animateTransition", animating);
            shader.set_float(ctx, "threshold", self.threshold);
            shader.set_texture(ctx, "currentImage", 0);
            shader.set_texture(ctx, "nextImage", 1);
            shader.set_texture(ctx, "mixTexture", 2);
            shader.set_float(ctx, "mixRatio", self.transition.mix());
            shader.set_float(ctx, "time", self.time);
            Ok(())
        });

        ctx.clear_textures(3);
        result
    }

    pub fn destroy(self, ctx: &RenderingContext<D>) {
        for t in self.images {
            t.destroy(ctx);
        }
        if let Some(t) = self.mix_texture {
            t.destroy(ctx);
        }
        if let Some(sim) = self.simulation {
            sim.destroy(ctx);
        }
        self.mesh.destroy(ctx);
    }
}

fn image_format() -> TextureFormat {
    TextureFormat::rgba8().with_flip_y(true)
}

fn build_mesh<D: GpuDevice>(
    ctx: &RenderingContext<D>,
    grid_w: f32,
    grid_h: f32,
) -> Result<Mesh<D>, EngineError> {
    let vertex = ShaderSource::for_context(ctx, IMAGE_VERT_LEGACY, IMAGE_VERT);
    let spec = ShaderSpec::new(vertex, fragment(ctx, IMAGE_FRAG))
        .uniforms(IMAGE_UNIFORMS.iter().copied())
        .attribute(("position", 3, 0))
        .attribute(("ppos", 3, 1))
        .attribute(("uv", 2, 2));
    let mut mesh = Mesh::with_shader(ctx, spec, DrawMode::Triangles)?;

    let (positions, uvs) = plane_grid(grid_w, grid_h);
    let instances = positions.len() as i32;
    let built = mesh
        .add_attribute(
            ctx,
            "position",
            &PLANE_POSITIONS[..],
            AttributeSpec::new(3).at(0),
        )
        .and_then(|()| {
            mesh.add_instanced_attribute(
                ctx,
                "ppos",
                &flatten_rows(&positions),
                AttributeSpec::new(3).at(1),
            )
        })
        .and_then(|()| {
            let uvs = flatten_rows(&uvs);
            mesh.add_instanced_attribute(ctx, "uv", &uvs, AttributeSpec::new(2).at(2))
        })
        .and_then(|()| mesh.add_indices(ctx, &PLANE_INDICES[..]));
    if let Err(e) = built {
        mesh.destroy(ctx);
        return Err(e);
    }
    mesh.set_num_instances(instances);
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glint_core::ContextOptions;
    use glint_runtime_glow::{
        create_context, HeadlessConfig, HeadlessDevice, HeadlessSurface, PixelData,
    };

    fn small_config() -> GalleryConfig {
        GalleryConfig {
            image_width: 8,
            image_height: 6,
            ..GalleryConfig::default()
        }
    }

    fn solid(rgba: [u8; 4]) -> DecodedImage {
        DecodedImage::new(PixelData::U8(rgba.repeat(8 * 6)), 8, 6)
    }

    fn ctx() -> RenderingContext<HeadlessDevice> {
        create_context(&mut HeadlessSurface::webgl2(32, 32), &ContextOptions::default())
            .expect("context")
    }

    #[test]
    fn grid_covers_half_resolution_with_flipped_uvs() {
        let (positions, uvs) = plane_grid(4.0, 3.0);
        assert_eq!(positions.len(), 5 * 4);
        assert_eq!(positions[0], [-2.0, 1.5, 0.0]);
        assert_eq!(positions[19], [2.0, -1.5, 0.0]);
        assert_eq!(uvs[0], [1.0, 1.0]);
        assert_eq!(uvs[19], [0.0, 0.0]);
    }

    #[test]
    fn nothing_drawn_without_mix_texture() {
        let ctx = ctx();
        let scene = GalleryScene::new(&ctx, &small_config(), &[solid([255, 0, 0, 255])])
            .expect("scene");
        let camera = Camera::perspective(60.0, 1.0, 0.1, 100.0);
        scene.draw(&ctx, &camera).expect("draw");
        assert!(ctx.gl().take_draw_calls().is_empty());
    }

    #[test]
    fn draws_one_instanced_indexed_call_with_unit_bindings() {
        let ctx = ctx();
        let images = [solid([255, 0, 0, 255]), solid([0, 0, 255, 255])];
        let mut scene = GalleryScene::new(&ctx, &small_config(), &images).expect("scene");
        scene
            .set_mix_texture(&ctx, &solid([128, 128, 128, 255]))
            .expect("mix");
        assert!(scene.next());
        scene.update(0.5);

        let camera = Camera::perspective(60.0, 1.0, 0.1, 100.0);
        scene.draw(&ctx, &camera).expect("draw");

        let calls = ctx.gl().take_draw_calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].is_indexed());
        assert_eq!(calls[0].count, 6);
        assert_eq!(calls[0].instances, Some((5 * 4) as i32));

        let program = scene.mesh().shader().expect("shader").program();
        let value = |name| ctx.gl().uniform_value(program, name);
        assert_eq!(value("currentImage"), Some(vec![0.0]));
        assert_eq!(value("nextImage"), Some(vec![1.0]));
        assert_eq!(value("mixTexture"), Some(vec![2.0]));
        assert_eq!(value("animateTransition"), Some(vec![1.0]));
        assert_eq!(value("mixRatio"), Some(vec![0.5]));
        assert!(ctx.gl().bindings().textures.is_empty());
    }

    #[test]
    fn builds_four_attachment_simulation_buffers() {
        let ctx = ctx();
        let scene = GalleryScene::new(&ctx, &small_config(), &[solid([0; 4])]).expect("scene");
        let sim = scene.simulation().expect("simulation");
        assert_eq!(sim.attachments(), SIMULATION_ATTACHMENTS);
        assert_eq!(sim.size(), (8, 6));
    }

    #[test]
    fn legacy_context_without_instancing_fails_clearly() {
        let mut surface = HeadlessSurface::webgl1(HeadlessConfig::webgl1_bare(), 8, 8);
        let ctx = create_context(&mut surface, &ContextOptions::default()).expect("context");
        let live = ctx.gl().live_textures();
        let err = GalleryScene::new(&ctx, &small_config(), &[solid([0; 4])])
            .expect_err("no instancing");
        assert!(matches!(err, EngineError::CapabilityUnavailable(_)));
        assert_eq!(ctx.gl().live_textures(), live);
    }

    #[test]
    fn empty_image_list_is_rejected() {
        let ctx = ctx();
        assert!(GalleryScene::new(&ctx, &small_config(), &[]).is_err());
    }
}
