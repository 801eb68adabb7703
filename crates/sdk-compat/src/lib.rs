//! Compile-only compatibility crate.
//!
//! This crate exists to ensure the public SDK surface remains usable by third-party
//! consumers. It is not shipped or run; it must only build.

use glint_core::{ContextOptions, EngineError, GalleryConfig};
use glint_gallery::{GalleryApp, MemoryImage, Navigation};
use glint_passes::{BloomPass, Composer, FxPass, GlitchPass, PostPass, View};
use glint_runtime_glow::{
    create_context, AttributeSpec, Camera, DrawMode, GpuDevice, Mesh, RenderTarget,
    RenderTargetOptions, RenderingContext, ShaderSpec, Surface, TransformFeedbackBuffer,
};

/// Everything a host needs, written against the device seam only.
#[allow(dead_code)]
pub fn _compile_witness<S>(surface: &mut S) -> Result<(), EngineError>
where
    S: Surface,
    S::Device: 'static,
{
    let ctx = create_context(surface, &ContextOptions::default())?;
    let (width, height) = surface.size();

    // Mesh building and the draw entry points stay generic over the device.
    let mut mesh = Mesh::with_shader(
        &ctx,
        ShaderSpec::new("void main() {}", "void main() {}").with_default_uniforms(),
        DrawMode::Triangles,
    )?;
    mesh.add_attribute(&ctx, "position", &[0.0f32; 9][..], AttributeSpec::new(3))?;
    mesh.draw(&ctx, &Camera::perspective(60.0, 1.0, 0.1, 100.0))?;

    // Transform feedback only exists on modern contexts.
    if ctx.is_modern() {
        let mut particles =
            TransformFeedbackBuffer::new(&ctx, "void main() {}", &["outPosition"], &[])?;
        particles.add_attribute(&ctx, "position", &[0.0; 3], 3)?;
        particles.update(&ctx, 0.0)?;
        particles.destroy(&ctx);
    }

    let scene = RenderTarget::new(&ctx, RenderTargetOptions::new(width, height))?;
    let mut composer = composer_chain(&ctx, width, height)?;
    composer.set_input(Some(scene.color_view()));
    composer.run(&ctx)?;

    // The gallery only needs a config and image sources.
    let mut app: GalleryApp<S::Device> = GalleryApp::new(
        GalleryConfig::default(),
        1.0,
        &[MemoryImage::solid("one", 1, 1, [0; 4])],
        MemoryImage::solid("mask", 1, 1, [0; 4]),
        None,
    );
    app.frame(&ctx, 0.0)?;
    let _ = app.navigate(Navigation::Next);

    app.destroy(&ctx);
    composer.destroy(&ctx);
    scene.destroy(&ctx);
    mesh.destroy(&ctx);
    Ok(())
}

fn composer_chain<D: GpuDevice + 'static>(
    ctx: &RenderingContext<D>,
    width: u32,
    height: u32,
) -> Result<Composer<D>, EngineError> {
    let passes: Vec<Box<dyn PostPass<D>>> = vec![
        Box::new(FxPass::passthrough(ctx, width, height)?),
        Box::new(BloomPass::new(ctx, width, height)?),
        Box::new(GlitchPass::new(ctx, width, height)?),
        Box::new(View::new(ctx, width, height)?),
    ];
    Ok(Composer::new(None, passes))
}
