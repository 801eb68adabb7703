use futures::executor::block_on;
use glint_core::GalleryConfig;
use glint_gallery::{load_all, GalleryScene, LoadError, MemoryImage};
use glint_passes::{BloomPass, Composer, FxPass, PostPass, View};
use glint_runtime_glow::{
    Camera, HeadlessDevice, PixelData, RenderTarget, RenderTargetOptions, Texture, TextureFormat,
};

use crate::support::webgl2;

/// Input X flows through pass 0, 1, 2 and the composer's output is pass 2's texture.
#[test]
fn three_pass_composer_links_in_order() {
    let ctx = webgl2();
    let source = RenderTarget::new(&ctx, RenderTargetOptions::new(16, 16)).expect("source");
    let x = source.color_view();

    let passes: Vec<Box<dyn PostPass<HeadlessDevice>>> = vec![
        Box::new(FxPass::passthrough(&ctx, 16, 16).expect("copy")),
        Box::new(BloomPass::new(&ctx, 16, 16).expect("bloom")),
        Box::new(View::new(&ctx, 16, 16).expect("view")),
    ];
    let mut composer = Composer::new(Some(x), passes);
    composer.run(&ctx).expect("run");

    let p = composer.passes();
    assert_eq!(p[0].input(), Some(x));
    assert_eq!(p[1].input(), Some(p[0].output()));
    assert_eq!(p[2].input(), Some(p[1].output()));
    assert_eq!(composer.output(), Some(p[2].output()));

    // three fullscreen draws, each into its own pass target
    let calls = ctx.gl().take_draw_calls();
    assert_eq!(calls.len(), 3);
    let targets: Vec<_> = calls.iter().map(|c| c.framebuffer).collect();
    assert!(targets.iter().all(Option::is_some));
    assert_ne!(targets[0], targets[1]);
    assert_ne!(targets[1], targets[2]);

    composer.destroy(&ctx);
    source.destroy(&ctx);
}

#[test]
fn gallery_builds_only_after_every_image_decodes() {
    let ctx = webgl2();
    let config = GalleryConfig {
        image_width: 8,
        image_height: 8,
        ..GalleryConfig::default()
    };
    let sources = [
        MemoryImage::solid("a", 4, 4, [255, 0, 0, 255]),
        MemoryImage::solid("b", 4, 4, [0, 0, 255, 255]),
    ];
    let textures_before = ctx.gl().live_textures();

    let (_handle, load) = load_all(&sources, None);
    assert_eq!(ctx.gl().live_textures(), textures_before);
    let images = block_on(load).expect("decoded");

    let mut scene = GalleryScene::new(&ctx, &config, &images).expect("scene");
    let mask = MemoryImage::solid("mask", 4, 4, [128, 128, 128, 255]);
    let (_mask_handle, mask_load) = load_all(&[mask], None);
    let mask = block_on(mask_load).expect("mask").remove(0);
    scene.set_mix_texture(&ctx, &mask).expect("mask texture");

    scene.draw(&ctx, &Camera::perspective(60.0, 1.0, 0.1, 1000.0))
        .expect("draw");
    assert_eq!(ctx.gl().take_draw_calls().len(), 1);
    scene.destroy(&ctx);
}

#[test]
fn cancelled_load_never_yields_images() {
    let sources = [MemoryImage::solid("a", 2, 2, [0; 4])];
    let (handle, load) = load_all(&sources, None);
    handle.cancel();
    assert_eq!(block_on(load), Err(LoadError::Cancelled));
}

#[test]
fn byte_images_stay_bytes_on_upload() {
    let ctx = webgl2();
    let image = MemoryImage::solid("a", 2, 2, [9, 8, 7, 255]);
    let (_handle, load) = load_all(&[image], None);
    let decoded = block_on(load).expect("decoded").remove(0);
    assert!(matches!(decoded.data, PixelData::U8(_)));

    let texture =
        Texture::from_decoded(&ctx, &decoded, TextureFormat::rgba8()).expect("texture");
    let (_, _, ty) = ctx.gl().texture_format(texture.handle()).expect("format");
    assert_eq!(ty, glow::UNSIGNED_BYTE);
    texture.destroy(&ctx);
}
