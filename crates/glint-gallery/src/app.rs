use std::task::{Context, Poll};

use futures_util::future::{FutureExt, LocalBoxFuture};
use futures_util::task::noop_waker_ref;
use glint_core::GalleryConfig;
use glint_runtime_glow::{Camera, DecodedImage, EngineError, GpuDevice, RenderingContext};
use tracing::{error, info};

use crate::clock::Clock;
use crate::loader::{load_all, ImageSource, LoadError, LoadHandle};
use crate::navigation::Navigation;
use crate::scene::GalleryScene;

pub const FOV_Y_DEG: f32 = 60.0;

type Pending<T> = LocalBoxFuture<'static, Result<T, LoadError>>;

enum Stage<D: GpuDevice> {
    Loading,
    Ready(GalleryScene<D>),
    Failed,
}

impl<D: GpuDevice> std::fmt::Debug for Stage<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Loading => f.write_str("Loading"),
            Stage::Ready(scene) => f.debug_tuple("Ready").field(scene).finish(),
            Stage::Failed => f.write_str("Failed"),
        }
    }
}

/// Drives the gallery frame by frame: polls the image loads, builds the scene once they
/// land, then advances and draws it.
///
/// Load failures are logged and leave the gallery blank; they never stop the frame loop.
pub struct GalleryApp<D: GpuDevice> {
    config: GalleryConfig,
    camera: Camera,
    clock: Clock,
    stage: Stage<D>,
    images: Option<Pending<Vec<DecodedImage>>>,
    mix: Option<Pending<Vec<DecodedImage>>>,
    loaded_mix: Option<DecodedImage>,
    handles: [LoadHandle; 2],
}

impl<D: GpuDevice> std::fmt::Debug for GalleryApp<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GalleryApp")
            .field("stage", &self.stage)
            .field("images_pending", &self.images.is_some())
            .field("mix_pending", &self.mix.is_some())
            .finish()
    }
}

impl<D: GpuDevice> GalleryApp<D> {
    /// Start loading `images` and the transition mask `mix`. `deadline`, when given, bounds
    /// the image load.
    pub fn new<S, M>(
        config: GalleryConfig,
        aspect: f32,
        images: &[S],
        mix: M,
        deadline: Option<LocalBoxFuture<'static, ()>>,
    ) -> Self
    where
        S: ImageSource,
        M: ImageSource,
    {
        let mut camera = Camera::perspective(FOV_Y_DEG, aspect, 0.1, config.radius * 10.0);
        camera.set_zoom(config.radius);

        let (image_handle, image_load) = load_all(images, deadline);
        let (mix_handle, mix_load) = load_all(&[mix], None);
        Self {
            config,
            camera,
            clock: Clock::new(),
            stage: Stage::Loading,
            images: Some(image_load),
            mix: Some(mix_load),
            loaded_mix: None,
            handles: [image_handle, mix_handle],
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn scene(&self) -> Option<&GalleryScene<D>> {
        match &self.stage {
            Stage::Ready(scene) => Some(scene),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.stage, Stage::Loading)
    }

    pub fn has_failed(&self) -> bool {
        matches!(self.stage, Stage::Failed)
    }

    /// Abort any load still in flight.
    pub fn cancel_loading(&self) {
        for handle in &self.handles {
            handle.cancel();
        }
    }

    pub fn navigate(&mut self, nav: Navigation) -> bool {
        match &mut self.stage {
            Stage::Ready(scene) => scene.navigate(nav),
            _ => false,
        }
    }

    /// Full-canvas viewport and a matching camera aspect.
    pub fn resize(&mut self, ctx: &RenderingContext<D>, width: u32, height: u32) {
        ctx.resize_viewport(width, height);
        if height > 0 {
            self.camera.update_aspect_ratio(width as f32 / height as f32);
        }
    }

    /// One frame at `now_ms`.
    pub fn frame(&mut self, ctx: &RenderingContext<D>, now_ms: f64) -> Result<(), EngineError> {
        let dt = self.clock.delta(now_ms);
        self.poll_loads(ctx)?;

        ctx.clear_screen();
        if let Stage::Ready(scene) = &mut self.stage {
            scene.update(dt);
            scene.draw(ctx, &self.camera)?;
        }
        Ok(())
    }

    fn poll_loads(&mut self, ctx: &RenderingContext<D>) -> Result<(), EngineError> {
        if let Some(images) = poll_once(&mut self.images) {
            match images {
                Ok(images) => {
                    let mut scene = GalleryScene::new(ctx, &self.config, &images)?;
                    scene.fit_height(self.visible_height());
                    info!(images = images.len(), "gallery ready");
                    self.stage = Stage::Ready(scene);
                }
                Err(e) => {
                    error!(error = %e, "gallery images failed to load");
                    self.stage = Stage::Failed;
                    self.handles[1].cancel();
                }
            }
        }

        match poll_once(&mut self.mix) {
            Some(Ok(mut mix)) => self.loaded_mix = mix.pop(),
            Some(Err(e)) => error!(error = %e, "transition mask failed to load"),
            None => {}
        }
        if let Stage::Ready(scene) = &mut self.stage {
            if let Some(mix) = self.loaded_mix.take() {
                scene.set_mix_texture(ctx, &mix)?;
            }
        }
        Ok(())
    }

    /// World-space height visible at the image plane.
    fn visible_height(&self) -> f32 {
        2.0 * self.config.radius * (FOV_Y_DEG.to_radians() * 0.5).tan()
    }

    pub fn destroy(self, ctx: &RenderingContext<D>) {
        self.cancel_loading();
        if let Stage::Ready(scene) = self.stage {
            scene.destroy(ctx);
        }
    }
}

/// Poll `slot` once without a waker; the future is dropped once it resolves.
fn poll_once<T>(slot: &mut Option<Pending<T>>) -> Option<Result<T, LoadError>> {
    let future = slot.as_mut()?;
    let mut cx = Context::from_waker(noop_waker_ref());
    match future.poll_unpin(&mut cx) {
        Poll::Ready(result) => {
            *slot = None;
            Some(result)
        }
        Poll::Pending => None,
    }
}
