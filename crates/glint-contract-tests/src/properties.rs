use glint_runtime_glow::{
    color_attachment_format, AttachmentFormat, AttributeSpec, Buffer, HeadlessConfig,
    RenderTarget, RenderTargetOptions, Shader, ShaderSpec, Texture, TextureFormat, Usage,
    VertexLayout,
};

use crate::support::{webgl1, webgl2, FS, VS};

/// Unresolved uniforms stay in the map as explicit misses.
#[test]
fn uniform_map_has_one_entry_per_declaration() {
    let ctx = webgl2();
    let declared = ["tint", "projectionMatrix", "ghost", "alsoGhost", "modelViewMatrix"];
    let shader = Shader::new(&ctx, ShaderSpec::new(VS, FS).uniforms(declared)).expect("shader");

    assert_eq!(shader.uniforms().len(), declared.len());
    let missing: Vec<&str> = declared
        .iter()
        .copied()
        .filter(|name| shader.uniform_slot(name).is_some_and(|s| s.is_missing()))
        .collect();
    assert_eq!(missing, ["ghost", "alsoGhost"]);
    shader.destroy(&ctx);
}

/// Attachment point `i` holds `textures[i]` for every count in `(0, max)`.
#[test]
fn attachment_points_follow_texture_order() {
    for ctx in [webgl2(), webgl1(HeadlessConfig::webgl1_full())] {
        let max = ctx.limits().max_color_attachments;
        for count in 1..max {
            let textures = (0..count)
                .map(|_| Texture::empty(&ctx, 4, 4, color_attachment_format(&ctx)))
                .collect::<Result<Vec<_>, _>>()
                .expect("textures");
            let handles: Vec<_> = textures.iter().map(Texture::handle).collect();

            let format = AttachmentFormat::new(&ctx, count, textures).expect("format");
            assert_eq!(format.len(), count);
            let options = RenderTargetOptions::new(4, 4).with_attachments(format);
            let target = RenderTarget::new(&ctx, options).expect("target");

            assert_eq!(target.num_attachments(), count);
            for (i, handle) in handles.iter().enumerate() {
                let point = glow::COLOR_ATTACHMENT0 + i as u32;
                assert_eq!(target.attachment_points()[i], point);
                assert_eq!(ctx.gl().attachment_of(target.framebuffer(), point), Some(*handle));
            }
            target.destroy(&ctx);
        }
    }
}

#[test]
fn resize_reports_the_requested_size() {
    let ctx = webgl2();
    let mut texture = Texture::empty(&ctx, 8, 8, TextureFormat::rgba8()).expect("texture");
    texture.resize(&ctx, 33, 17).expect("resize texture");
    assert_eq!(texture.dimensions(), (33, 17));
    assert_eq!(ctx.gl().texture_size(texture.handle()), Some((33, 17)));

    let mut target = RenderTarget::new(&ctx, RenderTargetOptions::new(8, 8).with_depth(true))
        .expect("target");
    target.resize(&ctx, 64, 48).expect("resize target");
    assert_eq!(target.dimensions(), (64, 48));
    assert_eq!(target.color_view().dimensions(), (64, 48));
    assert_eq!(
        ctx.gl().texture_size(target.color_view().handle()),
        Some((64, 48))
    );

    texture.destroy(&ctx);
    target.destroy(&ctx);
}

/// Two bind/unbind rounds on each bindable leave the device where it started.
#[test]
fn bind_unbind_twice_restores_binding_state() {
    for ctx in [webgl2(), webgl1(HeadlessConfig::webgl1_full())] {
        let vs = if ctx.dialect().is_modern() {
            VS.to_string()
        } else {
            "attribute vec3 position;\nuniform mat4 projectionMatrix;\nvoid main() {}\n".into()
        };
        let fs = if ctx.dialect().is_modern() { FS } else { "void main() {}\n" };

        let shader = Shader::new(&ctx, ShaderSpec::new(vs, fs)).expect("shader");
        let buffer = Buffer::vertex(&ctx, &[0.0; 12], Usage::Static).expect("buffer");
        let mut layout = VertexLayout::new(&ctx, true).expect("layout");
        layout
            .add_attribute(&ctx, &shader, "position", &buffer, AttributeSpec::new(3))
            .expect("position");
        let target = RenderTarget::new(&ctx, RenderTargetOptions::new(4, 4)).expect("target");
        let texture = Texture::empty(&ctx, 4, 4, TextureFormat::rgba8()).expect("texture");

        let before = ctx.gl().bindings();
        for _ in 0..2 {
            shader.bind(&ctx);
            shader.unbind(&ctx);
        }
        assert_eq!(ctx.gl().bindings(), before, "shader");
        for _ in 0..2 {
            layout.bind(&ctx);
            layout.unbind(&ctx);
        }
        assert_eq!(ctx.gl().bindings(), before, "vertex layout");
        for _ in 0..2 {
            target.bind(&ctx);
            target.unbind(&ctx);
        }
        assert_eq!(ctx.gl().bindings(), before, "render target");
        for _ in 0..2 {
            texture.bind(&ctx, 3);
            texture.unbind(&ctx, 3);
        }
        assert_eq!(ctx.gl().bindings(), before, "texture");
    }
}
