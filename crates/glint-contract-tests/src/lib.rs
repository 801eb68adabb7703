#![forbid(unsafe_code)]

#[cfg(test)]
mod support {
    use glint_core::ContextOptions;
    use glint_runtime_glow::{
        create_context, HeadlessConfig, HeadlessDevice, HeadlessSurface, RenderingContext,
    };

    pub const VS: &str = "in vec3 position;\nin vec3 offset;\n\
        uniform mat4 projectionMatrix;\nuniform mat4 modelViewMatrix;\nvoid main() {}\n";
    pub const FS: &str = "uniform vec4 tint;\nout vec4 color;\nvoid main() {}\n";

    pub const QUAD: [f32; 12] = [
        -1.0, -1.0, 0.0, 1.0, -1.0, 0.0, -1.0, 1.0, 0.0, 1.0, 1.0, 0.0,
    ];

    pub fn webgl2() -> RenderingContext<HeadlessDevice> {
        create_context(&mut HeadlessSurface::webgl2(32, 32), &ContextOptions::default())
            .expect("webgl2 context")
    }

    pub fn webgl1(config: HeadlessConfig) -> RenderingContext<HeadlessDevice> {
        create_context(
            &mut HeadlessSurface::webgl1(config, 32, 32),
            &ContextOptions::default(),
        )
        .expect("webgl1 context")
    }
}

#[cfg(test)]
mod tests {
    use glint_core::{ContextOptions, EngineError};
    use glint_runtime_glow::{
        color_attachment_format, create_context, AttachmentFormat, AttributeSpec, Camera,
        DrawMode, HeadlessConfig, HeadlessSurface, Mesh, PixelData, RenderTarget,
        RenderTargetOptions, ShaderSpec, Texture,
    };

    use crate::support::{webgl1, webgl2, FS, QUAD, VS};

    #[test]
    fn no_api_variant_is_a_context_creation_error() {
        let mut surface = HeadlessSurface::new(Vec::new(), HeadlessConfig::webgl2(), (4, 4));
        let err = create_context(&mut surface, &ContextOptions::default())
            .expect_err("nothing to create");
        assert!(matches!(err, EngineError::ContextCreation { .. }));
    }

    /// A 1×1 default target cleared to red reads back red in its own texel type.
    #[test]
    fn cleared_target_reads_back_red() {
        for ctx in [webgl2(), webgl1(HeadlessConfig::webgl1_bare())] {
            let target =
                RenderTarget::new(&ctx, RenderTargetOptions::new(1, 1)).expect("1x1 target");
            target.bind(&ctx);
            ctx.clear_color_only([1.0, 0.0, 0.0, 1.0]);
            target.unbind(&ctx);

            match target.read_pixels(&ctx, 0, 0, 1, 1) {
                PixelData::F32(px) => assert_eq!(px, vec![1.0, 0.0, 0.0, 1.0]),
                PixelData::U8(px) => assert_eq!(px, vec![255, 0, 0, 255]),
            }
            target.destroy(&ctx);
        }
    }

    #[test]
    fn strip_quad_is_one_indexed_draw_of_six() {
        let ctx = webgl2();
        let mut mesh = Mesh::with_shader(&ctx, ShaderSpec::new(VS, FS), DrawMode::TriangleStrip)
            .expect("mesh");
        mesh.add_attribute(&ctx, "position", &QUAD[..], AttributeSpec::new(3))
            .expect("position");
        mesh.add_indices(&ctx, &[0u16, 1, 2, 2, 1, 3][..])
            .expect("indices");

        mesh.draw(&ctx, &Camera::perspective(60.0, 1.0, 0.1, 10.0))
            .expect("draw");
        let calls = ctx.gl().take_draw_calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].is_indexed());
        assert!(!calls[0].is_instanced());
        assert_eq!(calls[0].mode, glow::TRIANGLE_STRIP);
        assert_eq!(calls[0].count, 6);
        mesh.destroy(&ctx);
    }

    #[test]
    fn attachment_count_mismatch_fails_construction() {
        let ctx = webgl2();
        let before = ctx.gl().live_textures();
        let textures = (0..2)
            .map(|_| Texture::empty(&ctx, 4, 4, color_attachment_format(&ctx)))
            .collect::<Result<Vec<_>, _>>()
            .expect("textures");

        let err = AttachmentFormat::new(&ctx, 3, textures).expect_err("2 textures for 3 points");
        assert!(matches!(
            err,
            EngineError::AttachmentCountMismatch {
                requested: 3,
                textures: 2
            }
        ));
        assert_eq!(ctx.gl().live_textures(), before);
    }

    #[test]
    fn instanced_attribute_without_instancing_is_a_clear_error() {
        let ctx = webgl1(HeadlessConfig::webgl1_bare());
        let vs = "attribute vec3 position;\nattribute vec3 offset;\nvoid main() {}\n";
        let mut mesh = Mesh::with_shader(
            &ctx,
            ShaderSpec::new(vs, "void main() {}"),
            DrawMode::Triangles,
        )
        .expect("mesh");
        mesh.add_attribute(&ctx, "position", &QUAD[..], AttributeSpec::new(3))
            .expect("position");

        let err = mesh
            .add_instanced_attribute(&ctx, "offset", &[0.0f32; 6][..], AttributeSpec::new(3))
            .expect_err("no instancing");
        assert!(matches!(err, EngineError::CapabilityUnavailable(_)));
        assert!(!mesh.is_instanced());
        assert!(mesh.attribute_buffer("offset").is_none());

        // the mesh stays drawable without the instanced attribute
        mesh.draw_ortho(&ctx, |_, _| Ok(())).expect("draw");
        assert_eq!(ctx.gl().take_draw_calls().len(), 1);
    }
}

#[cfg(test)]
mod properties;

#[cfg(test)]
mod pipeline;
