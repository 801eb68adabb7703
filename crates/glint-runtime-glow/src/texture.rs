//! 2D and cube textures.

use glint_core::EngineError;
use rand::Rng;
use tracing::{trace, warn};

use crate::context::RenderingContext;
use crate::device::{GpuDevice, UNPACK_FLIP_Y_WEBGL};

/// Storage and sampling settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureFormat {
    pub internal_format: i32,
    pub format: u32,
    /// Texel type: `UNSIGNED_BYTE`, `FLOAT`, `UNSIGNED_SHORT` (depth).
    pub ty: u32,
    pub wrap_s: u32,
    pub wrap_t: u32,
    pub min_filter: u32,
    pub mag_filter: u32,
    pub mipmaps: bool,
    pub flip_y: bool,
}

impl Default for TextureFormat {
    fn default() -> Self {
        Self::rgba8()
    }
}

impl TextureFormat {
    pub fn rgba8() -> Self {
        Self {
            internal_format: glow::RGBA8 as i32,
            format: glow::RGBA,
            ty: glow::UNSIGNED_BYTE,
            wrap_s: glow::CLAMP_TO_EDGE,
            wrap_t: glow::CLAMP_TO_EDGE,
            min_filter: glow::LINEAR,
            mag_filter: glow::LINEAR,
            mipmaps: false,
            flip_y: false,
        }
    }

    /// Float RGBA for this context: `RGBA16F`/`FLOAT` on modern contexts, `RGBA`/`FLOAT`
    /// through `OES_texture_float` on legacy ones. `None` when float textures are unavailable.
    pub fn float_rgba<D: GpuDevice>(ctx: &RenderingContext<D>) -> Option<Self> {
        let caps = ctx.capabilities();
        if !caps.float_textures {
            return None;
        }
        let internal_format = if caps.modern {
            glow::RGBA16F as i32
        } else {
            glow::RGBA as i32
        };
        Some(Self {
            internal_format,
            ty: glow::FLOAT,
            ..Self::rgba8()
        })
    }

    /// Depth storage for a render target's depth attachment.
    pub fn depth<D: GpuDevice>(ctx: &RenderingContext<D>) -> Self {
        let internal_format = if ctx.is_modern() {
            glow::DEPTH_COMPONENT16 as i32
        } else {
            glow::DEPTH_COMPONENT as i32
        };
        Self {
            internal_format,
            format: glow::DEPTH_COMPONENT,
            ty: glow::UNSIGNED_SHORT,
            min_filter: glow::NEAREST,
            mag_filter: glow::NEAREST,
            ..Self::rgba8()
        }
    }

    pub fn with_wrap(mut self, wrap: u32) -> Self {
        self.wrap_s = wrap;
        self.wrap_t = wrap;
        self
    }

    pub fn with_filter(mut self, min: u32, mag: u32) -> Self {
        self.min_filter = min;
        self.mag_filter = mag;
        self
    }

    pub fn with_mipmaps(mut self, mipmaps: bool) -> Self {
        self.mipmaps = mipmaps;
        self
    }

    pub fn with_flip_y(mut self, flip_y: bool) -> Self {
        self.flip_y = flip_y;
        self
    }

    pub fn is_float(&self) -> bool {
        matches!(self.ty, glow::FLOAT | glow::HALF_FLOAT)
    }

    pub fn channels(&self) -> usize {
        match self.format {
            glow::RGBA => 4,
            glow::RGB => 3,
            glow::LUMINANCE_ALPHA | glow::RG => 2,
            _ => 1,
        }
    }

    /// Adjust the texel type to what `data` holds, picking a float internal format when needed.
    fn matching<D: GpuDevice>(self, ctx: &RenderingContext<D>, data: &PixelData) -> Self {
        match data {
            PixelData::U8(_) if self.ty != glow::UNSIGNED_BYTE => Self {
                internal_format: glow::RGBA8 as i32,
                ty: glow::UNSIGNED_BYTE,
                ..self
            },
            PixelData::F32(_) if self.ty != glow::FLOAT => Self {
                internal_format: if ctx.is_modern() {
                    glow::RGBA16F as i32
                } else {
                    glow::RGBA as i32
                },
                ty: glow::FLOAT,
                ..self
            },
            _ => self,
        }
    }
}

/// Texel storage kept on the CPU side.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    U8(Vec<u8>),
    F32(Vec<f32>),
}

impl PixelData {
    pub fn len(&self) -> usize {
        match self {
            PixelData::U8(v) => v.len(),
            PixelData::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            PixelData::U8(v) => v,
            PixelData::F32(v) => bytemuck::cast_slice(v),
        }
    }

    pub fn texel_type(&self) -> u32 {
        match self {
            PixelData::U8(_) => glow::UNSIGNED_BYTE,
            PixelData::F32(_) => glow::FLOAT,
        }
    }
}

/// A decoded image (or one mip level / cube face) handed over by an asset loader.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub data: PixelData,
    /// `[width, height]`
    pub shape: [u32; 2],
}

impl DecodedImage {
    pub fn new(data: PixelData, width: u32, height: u32) -> Self {
        Self {
            data,
            shape: [width, height],
        }
    }

    pub fn width(&self) -> u32 {
        self.shape[0]
    }

    pub fn height(&self) -> u32 {
        self.shape[1]
    }
}

/// Fails when either side exceeds the context's `MAX_TEXTURE_SIZE`.
pub fn check_texture_size<D: GpuDevice>(
    ctx: &RenderingContext<D>,
    width: u32,
    height: u32,
) -> Result<(), EngineError> {
    let max = ctx.limits().max_texture_size;
    if width > max || height > max {
        return Err(EngineError::TextureSize { width, height, max });
    }
    Ok(())
}

fn check_data_len(
    format: &TextureFormat,
    width: u32,
    height: u32,
    data: &PixelData,
) -> Result<(), EngineError> {
    let expected = width as usize * height as usize * format.channels();
    if data.len() != expected {
        return Err(EngineError::BufferLayout(format!(
            "{width}x{height} texture with {} channels needs {expected} values, got {}",
            format.channels(),
            data.len()
        )));
    }
    if data.texel_type() != format.ty {
        return Err(EngineError::BufferLayout(format!(
            "pixel data type 0x{:x} does not match texture type 0x{:x}",
            data.texel_type(),
            format.ty
        )));
    }
    Ok(())
}

/// Texture unit reserved for uploads, so storage changes never disturb sampler bindings.
/// WebGL1 guarantees eight combined units; the engine samples from the low ones.
pub const SCRATCH_TEXTURE_UNIT: u32 = 7;

/// Run `f` with `texture` bound on the scratch unit, then restore the active unit.
fn with_scratch_binding<D: GpuDevice>(gl: &D, target: u32, texture: D::Texture, f: impl FnOnce()) {
    let active = (gl.get_parameter_i32(glow::ACTIVE_TEXTURE) as u32).max(glow::TEXTURE0);
    gl.active_texture(glow::TEXTURE0 + SCRATCH_TEXTURE_UNIT);
    gl.bind_texture(target, Some(texture));
    f();
    gl.bind_texture(target, None);
    gl.active_texture(active);
}

fn apply_parameters<D: GpuDevice>(gl: &D, target: u32, format: &TextureFormat) {
    gl.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, format.min_filter as i32);
    gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, format.mag_filter as i32);
    gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_S, format.wrap_s as i32);
    gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_T, format.wrap_t as i32);
}

fn upload<D: GpuDevice>(
    gl: &D,
    target: u32,
    level: i32,
    format: &TextureFormat,
    width: u32,
    height: u32,
    data: Option<&PixelData>,
) {
    if format.flip_y {
        gl.pixel_store_bool(UNPACK_FLIP_Y_WEBGL, true);
    }
    gl.tex_image_2d(
        target,
        level,
        format.internal_format,
        width as i32,
        height as i32,
        0,
        format.format,
        format.ty,
        data.map(PixelData::as_bytes),
    );
    if format.flip_y {
        gl.pixel_store_bool(UNPACK_FLIP_Y_WEBGL, false);
    }
}

#[derive(Debug)]
pub struct Texture<D: GpuDevice> {
    handle: D::Texture,
    width: u32,
    height: u32,
    format: TextureFormat,
    /// Kept for re-upload on resize.
    data: Option<PixelData>,
}

impl<D: GpuDevice> Texture<D> {
    pub fn new(
        ctx: &RenderingContext<D>,
        width: u32,
        height: u32,
        format: TextureFormat,
        data: Option<PixelData>,
    ) -> Result<Self, EngineError> {
        check_texture_size(ctx, width, height)?;
        if let Some(data) = &data {
            check_data_len(&format, width, height, data)?;
        }

        let gl = ctx.gl();
        let handle = gl
            .create_texture()
            .map_err(|e| EngineError::GlCreate(format!("create_texture failed: {e}")))?;
        with_scratch_binding(gl, glow::TEXTURE_2D, handle, || {
            apply_parameters(gl, glow::TEXTURE_2D, &format);
            upload(gl, glow::TEXTURE_2D, 0, &format, width, height, data.as_ref());
            if format.mipmaps {
                gl.generate_mipmap(glow::TEXTURE_2D);
            }
        });

        Ok(Self {
            handle,
            width,
            height,
            format,
            data,
        })
    }

    /// Uninitialized storage.
    pub fn empty(
        ctx: &RenderingContext<D>,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<Self, EngineError> {
        Self::new(ctx, width, height, format, None)
    }

    pub fn with_data(
        ctx: &RenderingContext<D>,
        width: u32,
        height: u32,
        format: TextureFormat,
        data: PixelData,
    ) -> Result<Self, EngineError> {
        Self::new(ctx, width, height, format, Some(data))
    }

    /// Upload a decoded image; the texel type follows the image data.
    pub fn from_decoded(
        ctx: &RenderingContext<D>,
        image: &DecodedImage,
        format: TextureFormat,
    ) -> Result<Self, EngineError> {
        let format = format.matching(ctx, &image.data);
        Self::new(
            ctx,
            image.width(),
            image.height(),
            format,
            Some(image.data.clone()),
        )
    }

    /// Storage filled with random RGB in `[0, 2)` and alpha 1 (float formats), or random
    /// bytes with opaque alpha.
    pub fn random<R: Rng>(
        ctx: &RenderingContext<D>,
        width: u32,
        height: u32,
        format: TextureFormat,
        rng: &mut R,
    ) -> Result<Self, EngineError> {
        let texels = width as usize * height as usize;
        let data = if format.ty == glow::FLOAT {
            let mut v = Vec::with_capacity(texels * 4);
            for _ in 0..texels {
                v.extend([
                    rng.random::<f32>() * 2.0,
                    rng.random::<f32>() * 2.0,
                    rng.random::<f32>() * 2.0,
                    1.0,
                ]);
            }
            PixelData::F32(v)
        } else {
            let mut v = Vec::with_capacity(texels * 4);
            for _ in 0..texels {
                v.extend([rng.random::<u8>(), rng.random::<u8>(), rng.random::<u8>(), 255]);
            }
            PixelData::U8(v)
        };
        let format = TextureFormat {
            format: glow::RGBA,
            ..format
        };
        Self::new(ctx, width, height, format, Some(data))
    }

    /// Two identically formatted textures (ping-pong storage).
    pub fn pair(
        ctx: &RenderingContext<D>,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<(Self, Self), EngineError> {
        let a = Self::empty(ctx, width, height, format)?;
        match Self::empty(ctx, width, height, format) {
            Ok(b) => Ok((a, b)),
            Err(e) => {
                a.destroy(ctx);
                Err(e)
            }
        }
    }

    /// Depth texture; needs `WEBGL_depth_texture` on legacy contexts.
    pub fn depth(ctx: &RenderingContext<D>, width: u32, height: u32) -> Result<Self, EngineError> {
        if !ctx.capabilities().depth_textures {
            return Err(EngineError::CapabilityUnavailable(
                "depth textures (WEBGL_depth_texture)".into(),
            ));
        }
        Self::empty(ctx, width, height, TextureFormat::depth(ctx))
    }

    /// Reallocate storage at `width`×`height`, keeping the format. Retained pixel data is
    /// re-uploaded only while it still fits the new size.
    pub fn resize(
        &mut self,
        ctx: &RenderingContext<D>,
        width: u32,
        height: u32,
    ) -> Result<(), EngineError> {
        check_texture_size(ctx, width, height)?;
        if let Some(data) = &self.data {
            if check_data_len(&self.format, width, height, data).is_err() {
                trace!(width, height, "dropping retained pixels that no longer fit");
                self.data = None;
            }
        }
        let gl = ctx.gl();
        with_scratch_binding(gl, glow::TEXTURE_2D, self.handle, || {
            upload(
                gl,
                glow::TEXTURE_2D,
                0,
                &self.format,
                width,
                height,
                self.data.as_ref(),
            );
            if self.format.mipmaps {
                gl.generate_mipmap(glow::TEXTURE_2D);
            }
        });
        self.width = width;
        self.height = height;
        Ok(())
    }

    pub fn bind(&self, ctx: &RenderingContext<D>, unit: u32) {
        self.view().bind(ctx, unit);
    }

    pub fn unbind(&self, ctx: &RenderingContext<D>, unit: u32) {
        self.view().unbind(ctx, unit);
    }

    pub fn view(&self) -> TextureView<D> {
        TextureView {
            handle: self.handle,
            target: glow::TEXTURE_2D,
            width: self.width,
            height: self.height,
        }
    }

    pub fn handle(&self) -> D::Texture {
        self.handle
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> &TextureFormat {
        &self.format
    }

    pub fn data(&self) -> Option<&PixelData> {
        self.data.as_ref()
    }

    pub fn destroy(self, ctx: &RenderingContext<D>) {
        ctx.gl().delete_texture(self.handle);
    }
}

/// Non-owning handle for sampling a texture someone else owns.
pub struct TextureView<D: GpuDevice> {
    handle: D::Texture,
    target: u32,
    width: u32,
    height: u32,
}

impl<D: GpuDevice> Clone for TextureView<D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D: GpuDevice> Copy for TextureView<D> {}

impl<D: GpuDevice> PartialEq for TextureView<D> {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle && self.target == other.target
    }
}

impl<D: GpuDevice> std::fmt::Debug for TextureView<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureView")
            .field("handle", &self.handle)
            .field("size", &(self.width, self.height))
            .finish()
    }
}

impl<D: GpuDevice> TextureView<D> {
    pub fn handle(&self) -> D::Texture {
        self.handle
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Bind to texture unit `unit` (`TEXTURE0 + unit`).
    pub fn bind(&self, ctx: &RenderingContext<D>, unit: u32) {
        let gl = ctx.gl();
        gl.active_texture(glow::TEXTURE0 + unit);
        gl.bind_texture(self.target, Some(self.handle));
    }

    /// Clear unit `unit` and leave unit 0 active.
    pub fn unbind(&self, ctx: &RenderingContext<D>, unit: u32) {
        let gl = ctx.gl();
        gl.active_texture(glow::TEXTURE0 + unit);
        gl.bind_texture(self.target, None);
        gl.active_texture(glow::TEXTURE0);
    }
}

/// Cube map built from decoded faces.
#[derive(Debug)]
pub struct CubeTexture<D: GpuDevice> {
    handle: D::Texture,
    size: (u32, u32),
    levels: usize,
}

const CUBE_FACES: [u32; 6] = [
    glow::TEXTURE_CUBE_MAP_POSITIVE_X,
    glow::TEXTURE_CUBE_MAP_NEGATIVE_X,
    glow::TEXTURE_CUBE_MAP_POSITIVE_Y,
    glow::TEXTURE_CUBE_MAP_NEGATIVE_Y,
    glow::TEXTURE_CUBE_MAP_POSITIVE_Z,
    glow::TEXTURE_CUBE_MAP_NEGATIVE_Z,
];

impl<D: GpuDevice> CubeTexture<D> {
    /// `images` holds 6 × mip levels entries, face-major: face `f`, level `l` is at
    /// `f * levels + l`, faces in +X, -X, +Y, -Y, +Z, -Z order.
    pub fn from_decoded(
        ctx: &RenderingContext<D>,
        images: &[DecodedImage],
        format: TextureFormat,
    ) -> Result<Self, EngineError> {
        if images.is_empty() || images.len() % 6 != 0 {
            return Err(EngineError::BufferLayout(format!(
                "cube map needs 6 x mip levels images, got {}",
                images.len()
            )));
        }
        let levels = images.len() / 6;
        let mut format = format.matching(ctx, &images[0].data);
        format.flip_y = false;
        if levels > 1 {
            format.min_filter = glow::LINEAR_MIPMAP_LINEAR;
        }
        for image in images {
            check_texture_size(ctx, image.width(), image.height())?;
            check_data_len(&format, image.width(), image.height(), &image.data)?;
        }

        let gl = ctx.gl();
        let handle = gl
            .create_texture()
            .map_err(|e| EngineError::GlCreate(format!("create_texture failed: {e}")))?;
        with_scratch_binding(gl, glow::TEXTURE_CUBE_MAP, handle, || {
            for (face, &target) in CUBE_FACES.iter().enumerate() {
                for level in 0..levels {
                    let image = &images[face * levels + level];
                    upload(
                        gl,
                        target,
                        level as i32,
                        &format,
                        image.width(),
                        image.height(),
                        Some(&image.data),
                    );
                }
            }
            apply_parameters(gl, glow::TEXTURE_CUBE_MAP, &format);
        });

        Ok(Self {
            handle,
            size: (images[0].width(), images[0].height()),
            levels,
        })
    }

    pub fn levels(&self) -> usize {
        self.levels
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn view(&self) -> TextureView<D> {
        TextureView {
            handle: self.handle,
            target: glow::TEXTURE_CUBE_MAP,
            width: self.size.0,
            height: self.size.1,
        }
    }

    pub fn bind(&self, ctx: &RenderingContext<D>, unit: u32) {
        self.view().bind(ctx, unit);
    }

    pub fn unbind(&self, ctx: &RenderingContext<D>, unit: u32) {
        self.view().unbind(ctx, unit);
    }

    pub fn destroy(self, ctx: &RenderingContext<D>) {
        ctx.gl().delete_texture(self.handle);
    }
}

/// Default color attachment format: float when the context can render to it, RGBA8 otherwise.
pub fn color_attachment_format<D: GpuDevice>(ctx: &RenderingContext<D>) -> TextureFormat {
    match TextureFormat::float_rgba(ctx) {
        Some(format) if ctx.capabilities().float_color_buffers => format,
        _ => {
            warn!("float color buffers unavailable; render target falls back to RGBA8");
            TextureFormat::rgba8()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::create_context;
    use crate::headless::{HeadlessConfig, HeadlessDevice, HeadlessSurface};
    use glint_core::ContextOptions;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ctx() -> RenderingContext<HeadlessDevice> {
        create_context(&mut HeadlessSurface::webgl2(8, 8), &ContextOptions::default())
            .expect("context")
    }

    #[test]
    fn resize_round_trips_dimensions() {
        let ctx = ctx();
        let mut tex = Texture::empty(&ctx, 16, 16, TextureFormat::rgba8()).expect("texture");
        tex.resize(&ctx, 640, 360).expect("resize");
        assert_eq!(tex.dimensions(), (640, 360));
        assert_eq!(ctx.gl().texture_size(tex.handle()), Some((640, 360)));
        assert_eq!(
            ctx.gl().texture_format(tex.handle()).map(|f| f.1),
            Some(glow::RGBA8 as i32),
            "format preserved"
        );
    }

    #[test]
    fn resize_leaves_sampler_bindings_alone() {
        let ctx = ctx();
        let sampled = Texture::empty(&ctx, 4, 4, TextureFormat::rgba8()).expect("sampled");
        let mut resized = Texture::empty(&ctx, 4, 4, TextureFormat::rgba8()).expect("resized");
        sampled.bind(&ctx, 2);
        let before = ctx.gl().bindings();

        resized.resize(&ctx, 8, 8).expect("resize");
        assert_eq!(ctx.gl().bindings(), before);
        assert!(before.textures.contains(&(2, glow::TEXTURE_2D, sampled.handle())));
        assert_eq!(before.active_unit, 2);

        let _late = Texture::empty(&ctx, 2, 2, TextureFormat::rgba8()).expect("late");
        assert_eq!(ctx.gl().bindings(), before, "creation uses the scratch unit too");
    }

    #[test]
    fn resize_keeps_pixels_only_while_they_fit() {
        let ctx = ctx();
        let data = PixelData::U8(vec![255; 2 * 2 * 4]);
        let mut tex = Texture::with_data(&ctx, 2, 2, TextureFormat::rgba8(), data).expect("tex");
        tex.resize(&ctx, 2, 2).expect("same size");
        assert!(tex.data().is_some());
        tex.resize(&ctx, 4, 4).expect("grow");
        assert!(tex.data().is_none());
    }

    #[test]
    fn oversize_texture_is_rejected() {
        let ctx = ctx();
        let err = Texture::empty(&ctx, 8192, 4, TextureFormat::rgba8()).expect_err("too wide");
        assert!(matches!(
            err,
            EngineError::TextureSize { width: 8192, max: 4096, .. }
        ));
        assert_eq!(ctx.gl().live_textures(), 0);
    }

    #[test]
    fn data_length_must_match_shape() {
        let ctx = ctx();
        let err = Texture::with_data(
            &ctx,
            2,
            2,
            TextureFormat::rgba8(),
            PixelData::U8(vec![0; 15]),
        )
        .expect_err("short data");
        assert!(matches!(err, EngineError::BufferLayout(_)));
    }

    #[test]
    fn decoded_float_image_gets_float_storage() {
        let ctx = ctx();
        let image = DecodedImage::new(PixelData::F32(vec![0.5; 4]), 1, 1);
        let tex = Texture::from_decoded(&ctx, &image, TextureFormat::rgba8()).expect("tex");
        let (_, internal, ty) = ctx.gl().texture_format(tex.handle()).expect("format");
        assert_eq!(internal, glow::RGBA16F as i32);
        assert_eq!(ty, glow::FLOAT);
        assert_eq!(ctx.gl().texture_texels(tex.handle()), Some(vec![0.5; 4]));
    }

    #[test]
    fn bind_unbind_twice_restores_bindings() {
        let ctx = ctx();
        let tex = Texture::empty(&ctx, 4, 4, TextureFormat::rgba8()).expect("tex");
        let before = ctx.gl().bindings();
        for _ in 0..2 {
            tex.bind(&ctx, 3);
            assert!(ctx
                .gl()
                .bindings()
                .textures
                .contains(&(3, glow::TEXTURE_2D, tex.handle())));
            tex.unbind(&ctx, 3);
        }
        assert_eq!(ctx.gl().bindings(), before);
    }

    #[test]
    fn random_float_texture_stays_in_range() {
        let ctx = ctx();
        let format = TextureFormat::float_rgba(&ctx).expect("float");
        let mut rng = StdRng::seed_from_u64(7);
        let tex = Texture::random(&ctx, 4, 4, format, &mut rng).expect("random");
        let texels = ctx.gl().texture_texels(tex.handle()).expect("texels");
        assert_eq!(texels.len(), 64);
        for px in texels.chunks_exact(4) {
            assert!(px[..3].iter().all(|v| (0.0..2.0).contains(v)));
            assert_eq!(px[3], 1.0);
        }
    }

    #[test]
    fn mipmaps_are_generated_when_requested() {
        let ctx = ctx();
        let tex = Texture::empty(
            &ctx,
            8,
            8,
            TextureFormat::rgba8()
                .with_mipmaps(true)
                .with_filter(glow::LINEAR_MIPMAP_LINEAR, glow::LINEAR),
        )
        .expect("tex");
        assert_eq!(ctx.gl().texture_levels(tex.handle()), 4);
        assert_eq!(
            ctx.gl().texture_parameter(tex.handle(), glow::TEXTURE_MIN_FILTER),
            Some(glow::LINEAR_MIPMAP_LINEAR as i32)
        );
    }

    #[test]
    fn depth_texture_needs_capability() {
        let mut surface = HeadlessSurface::webgl1(HeadlessConfig::webgl1_bare(), 8, 8);
        let legacy = create_context(&mut surface, &ContextOptions::default()).expect("context");
        assert!(matches!(
            Texture::depth(&legacy, 4, 4),
            Err(EngineError::CapabilityUnavailable(_))
        ));

        let ctx = ctx();
        let depth = Texture::depth(&ctx, 4, 4).expect("depth");
        assert_eq!(depth.format().format, glow::DEPTH_COMPONENT);
    }

    #[test]
    fn cube_map_takes_six_faces_per_level() {
        let ctx = ctx();
        let face = |size: u32| {
            DecodedImage::new(PixelData::U8(vec![0; (size * size * 4) as usize]), size, size)
        };
        let mut images = Vec::new();
        for _ in 0..6 {
            images.push(face(4));
            images.push(face(2));
        }
        let cube = CubeTexture::from_decoded(&ctx, &images, TextureFormat::rgba8()).expect("cube");
        assert_eq!(cube.levels(), 2);
        assert_eq!(cube.size(), (4, 4));
        assert_eq!(ctx.gl().texture_levels(cube.view().handle()), 2);
        assert_eq!(
            ctx.gl().texture_parameter(cube.view().handle(), glow::TEXTURE_MIN_FILTER),
            Some(glow::LINEAR_MIPMAP_LINEAR as i32)
        );

        let err = CubeTexture::from_decoded(&ctx, &images[..5], TextureFormat::rgba8())
            .expect_err("five faces");
        assert!(err.to_string().contains('5'));
    }

    #[test]
    fn legacy_context_without_float_color_falls_back_to_rgba8() {
        let mut surface = HeadlessSurface::webgl1(
            HeadlessConfig::webgl1_full().without_extension("WEBGL_color_buffer_float"),
            8,
            8,
        );
        let ctx = create_context(&mut surface, &ContextOptions::default()).expect("context");
        assert_eq!(color_attachment_format(&ctx), TextureFormat::rgba8());
    }
}
