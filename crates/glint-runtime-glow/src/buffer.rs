//! GPU buffers holding vertex (`f32`) or index (`u16`) data.

use std::borrow::Cow;

use glint_core::EngineError;
use tracing::trace;

use crate::context::RenderingContext;
use crate::device::GpuDevice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// `ARRAY_BUFFER`, 32-bit floats.
    Vertex,
    /// `ELEMENT_ARRAY_BUFFER`, 16-bit unsigned indices.
    Index,
}

impl BufferKind {
    pub fn target(self) -> u32 {
        match self {
            BufferKind::Vertex => glow::ARRAY_BUFFER,
            BufferKind::Index => glow::ELEMENT_ARRAY_BUFFER,
        }
    }

    /// Size in bytes of one element.
    pub fn element_size(self) -> usize {
        match self {
            BufferKind::Vertex => std::mem::size_of::<f32>(),
            BufferKind::Index => std::mem::size_of::<u16>(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Usage {
    #[default]
    Static,
    Dynamic,
    Stream,
}

impl Usage {
    pub fn gl(self) -> u32 {
        match self {
            Usage::Static => glow::STATIC_DRAW,
            Usage::Dynamic => glow::DYNAMIC_DRAW,
            Usage::Stream => glow::STREAM_DRAW,
        }
    }
}

/// Data handed to a buffer.
///
/// `Numbers` is converted to the buffer's element type; the typed variants pass through
/// as long as they match the buffer kind.
#[derive(Debug, Clone, Copy)]
pub enum BufferSource<'a> {
    Numbers(&'a [f64]),
    F32(&'a [f32]),
    U16(&'a [u16]),
    Bytes(&'a [u8]),
}

impl<'a> From<&'a [f32]> for BufferSource<'a> {
    fn from(v: &'a [f32]) -> Self {
        BufferSource::F32(v)
    }
}

impl<'a> From<&'a [u16]> for BufferSource<'a> {
    fn from(v: &'a [u16]) -> Self {
        BufferSource::U16(v)
    }
}

impl<'a> From<&'a [f64]> for BufferSource<'a> {
    fn from(v: &'a [f64]) -> Self {
        BufferSource::Numbers(v)
    }
}

impl<'a> From<&'a Vec<f32>> for BufferSource<'a> {
    fn from(v: &'a Vec<f32>) -> Self {
        BufferSource::F32(v)
    }
}

impl<'a> From<&'a Vec<u16>> for BufferSource<'a> {
    fn from(v: &'a Vec<u16>) -> Self {
        BufferSource::U16(v)
    }
}

impl<'a> BufferSource<'a> {
    /// Bytes laid out for `kind`.
    pub fn to_bytes(self, kind: BufferKind) -> Result<Cow<'a, [u8]>, EngineError> {
        match (kind, self) {
            (BufferKind::Vertex, BufferSource::F32(v)) => Ok(Cow::Borrowed(bytemuck::cast_slice(v))),
            (BufferKind::Index, BufferSource::U16(v)) => Ok(Cow::Borrowed(bytemuck::cast_slice(v))),
            (BufferKind::Vertex, BufferSource::Numbers(v)) => {
                let floats: Vec<f32> = v.iter().map(|&x| x as f32).collect();
                Ok(Cow::Owned(bytemuck::allocation::pod_collect_to_vec(&floats)))
            }
            (BufferKind::Index, BufferSource::Numbers(v)) => {
                let mut indices = Vec::with_capacity(v.len());
                for (i, &x) in v.iter().enumerate() {
                    if x.fract() != 0.0 || !(0.0..=u16::MAX as f64).contains(&x) {
                        return Err(EngineError::BufferLayout(format!(
                            "index {i} ({x}) is not a 16-bit unsigned integer"
                        )));
                    }
                    indices.push(x as u16);
                }
                Ok(Cow::Owned(bytemuck::allocation::pod_collect_to_vec(&indices)))
            }
            (kind, BufferSource::Bytes(b)) => {
                if b.len() % kind.element_size() != 0 {
                    return Err(EngineError::BufferLayout(format!(
                        "{} bytes is not a whole number of {}-byte elements",
                        b.len(),
                        kind.element_size()
                    )));
                }
                Ok(Cow::Borrowed(b))
            }
            (BufferKind::Vertex, BufferSource::U16(_)) => Err(EngineError::BufferLayout(
                "vertex buffers hold 32-bit floats, got u16 data".into(),
            )),
            (BufferKind::Index, BufferSource::F32(_)) => Err(EngineError::BufferLayout(
                "index buffers hold 16-bit unsigned integers, got f32 data".into(),
            )),
        }
    }
}

/// Flatten `[[x, y, z], ...]` rows into one contiguous float slice.
pub fn flatten_rows<const N: usize>(rows: &[[f32; N]]) -> Vec<f32> {
    rows.iter().flatten().copied().collect()
}

#[derive(Debug)]
pub struct Buffer<D: GpuDevice> {
    handle: D::Buffer,
    kind: BufferKind,
    usage: Usage,
    byte_len: usize,
}

impl<D: GpuDevice> Buffer<D> {
    pub fn new(
        ctx: &RenderingContext<D>,
        kind: BufferKind,
        data: Option<BufferSource<'_>>,
        usage: Usage,
    ) -> Result<Self, EngineError> {
        // Convert first so a layout error never leaves a GL object behind.
        let bytes = data.map(|d| d.to_bytes(kind)).transpose()?;
        let handle = ctx
            .gl()
            .create_buffer()
            .map_err(|e| EngineError::GlCreate(format!("create_buffer failed: {e}")))?;
        let mut buffer = Self {
            handle,
            kind,
            usage,
            byte_len: 0,
        };
        if let Some(bytes) = bytes {
            buffer.upload(ctx, &bytes, usage);
        }
        Ok(buffer)
    }

    pub fn vertex(
        ctx: &RenderingContext<D>,
        data: &[f32],
        usage: Usage,
    ) -> Result<Self, EngineError> {
        Self::new(ctx, BufferKind::Vertex, Some(BufferSource::F32(data)), usage)
    }

    pub fn index(ctx: &RenderingContext<D>, data: &[u16]) -> Result<Self, EngineError> {
        Self::new(ctx, BufferKind::Index, Some(BufferSource::U16(data)), Usage::Static)
    }

    fn upload(&mut self, ctx: &RenderingContext<D>, bytes: &[u8], usage: Usage) {
        let gl = ctx.gl();
        let target = self.kind.target();
        gl.bind_buffer(target, Some(self.handle));
        gl.buffer_data_u8_slice(target, bytes, usage.gl());
        gl.bind_buffer(target, None);
        self.byte_len = bytes.len();
        self.usage = usage;
    }

    /// Reallocate storage with `data`.
    pub fn fill(
        &mut self,
        ctx: &RenderingContext<D>,
        data: BufferSource<'_>,
        usage: Usage,
    ) -> Result<(), EngineError> {
        let bytes = data.to_bytes(self.kind)?;
        self.upload(ctx, &bytes, usage);
        Ok(())
    }

    /// Overwrite the contents in place. `data` must be exactly as large as the storage.
    pub fn update(
        &mut self,
        ctx: &RenderingContext<D>,
        data: BufferSource<'_>,
    ) -> Result<(), EngineError> {
        let bytes = data.to_bytes(self.kind)?;
        if bytes.len() != self.byte_len {
            return Err(EngineError::BufferSizeMismatch {
                expected: self.byte_len,
                got: bytes.len(),
            });
        }
        let gl = ctx.gl();
        let target = self.kind.target();
        gl.bind_buffer(target, Some(self.handle));
        gl.buffer_sub_data_u8_slice(target, 0, &bytes);
        gl.bind_buffer(target, None);
        trace!(bytes = bytes.len(), kind = ?self.kind, "buffer updated");
        Ok(())
    }

    pub fn handle(&self) -> D::Buffer {
        self.handle
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    pub fn usage(&self) -> Usage {
        self.usage
    }

    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Number of elements (floats or indices).
    pub fn len(&self) -> usize {
        self.byte_len / self.kind.element_size()
    }

    pub fn is_empty(&self) -> bool {
        self.byte_len == 0
    }

    pub fn bind(&self, ctx: &RenderingContext<D>) {
        ctx.gl().bind_buffer(self.kind.target(), Some(self.handle));
    }

    pub fn unbind(&self, ctx: &RenderingContext<D>) {
        ctx.gl().bind_buffer(self.kind.target(), None);
    }

    pub fn destroy(self, ctx: &RenderingContext<D>) {
        ctx.gl().delete_buffer(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::create_context;
    use crate::headless::{HeadlessDevice, HeadlessSurface};
    use glint_core::ContextOptions;

    fn ctx() -> RenderingContext<HeadlessDevice> {
        create_context(&mut HeadlessSurface::webgl2(8, 8), &ContextOptions::default())
            .expect("context")
    }

    #[test]
    fn numbers_become_f32_for_vertex_buffers() {
        let ctx = ctx();
        let buf = Buffer::new(
            &ctx,
            BufferKind::Vertex,
            Some(BufferSource::Numbers(&[0.5, 1.0, -2.0])),
            Usage::Static,
        )
        .expect("buffer");
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.byte_len(), 12);

        let bytes = ctx.gl().buffer_contents(buf.handle()).expect("storage");
        let floats: Vec<f32> = bytemuck::allocation::pod_collect_to_vec(&bytes);
        assert_eq!(floats, vec![0.5, 1.0, -2.0]);
    }

    #[test]
    fn numbers_become_u16_for_index_buffers() {
        let ctx = ctx();
        let buf = Buffer::new(
            &ctx,
            BufferKind::Index,
            Some(BufferSource::Numbers(&[0.0, 1.0, 2.0, 2.0, 1.0, 3.0])),
            Usage::Static,
        )
        .expect("buffer");
        assert_eq!(buf.len(), 6);
        assert_eq!(buf.byte_len(), 12);
    }

    #[test]
    fn non_integer_indices_are_rejected() {
        let ctx = ctx();
        let err = Buffer::new(
            &ctx,
            BufferKind::Index,
            Some(BufferSource::Numbers(&[0.0, 1.5])),
            Usage::Static,
        )
        .expect_err("1.5 is not an index");
        assert!(err.to_string().contains("1.5"), "got: {err}");

        let err = Buffer::new(
            &ctx,
            BufferKind::Index,
            Some(BufferSource::Numbers(&[70000.0])),
            Usage::Static,
        )
        .expect_err("out of range");
        assert!(matches!(err, EngineError::BufferLayout(_)));
    }

    #[test]
    fn mismatched_typed_data_is_rejected() {
        let ctx = ctx();
        assert!(Buffer::new(&ctx, BufferKind::Vertex, Some(BufferSource::U16(&[1, 2])), Usage::Static).is_err());
        assert!(Buffer::new(&ctx, BufferKind::Index, Some(BufferSource::F32(&[1.0])), Usage::Static).is_err());
        assert!(Buffer::new(&ctx, BufferKind::Vertex, Some(BufferSource::Bytes(&[0; 6])), Usage::Static).is_err());
    }

    #[test]
    fn update_requires_identical_size() {
        let ctx = ctx();
        let mut buf = Buffer::vertex(&ctx, &[0.0; 4], Usage::Dynamic).expect("buffer");
        buf.update(&ctx, BufferSource::F32(&[1.0, 2.0, 3.0, 4.0]))
            .expect("same size");
        let bytes = ctx.gl().buffer_contents(buf.handle()).expect("storage");
        assert_eq!(bytemuck::allocation::pod_collect_to_vec::<u8, f32>(&bytes), vec![1.0, 2.0, 3.0, 4.0]);

        let err = buf
            .update(&ctx, BufferSource::F32(&[1.0, 2.0]))
            .expect_err("smaller update");
        assert!(matches!(
            err,
            EngineError::BufferSizeMismatch { expected: 16, got: 8 }
        ));
    }

    #[test]
    fn fill_reallocates() {
        let ctx = ctx();
        let mut buf = Buffer::vertex(&ctx, &[0.0; 3], Usage::Static).expect("buffer");
        buf.fill(&ctx, BufferSource::F32(&[0.0; 9]), Usage::Dynamic)
            .expect("fill");
        assert_eq!(buf.len(), 9);
        assert_eq!(buf.usage(), Usage::Dynamic);
    }

    #[test]
    fn construction_leaves_no_buffer_bound() {
        let ctx = ctx();
        let before = ctx.gl().bindings();
        let _v = Buffer::vertex(&ctx, &[1.0, 2.0], Usage::Static).expect("vertex");
        let _i = Buffer::index(&ctx, &[0, 1, 2]).expect("index");
        assert_eq!(ctx.gl().bindings(), before);
    }

    #[test]
    fn rows_flatten_in_order() {
        let rows = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        assert_eq!(flatten_rows(&rows), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn rows_of_any_width_flatten() {
        let wide = [[0.5f32; 40]; 2];
        assert_eq!(flatten_rows(&wide).len(), 80);
        let empty: [[f32; 4]; 0] = [];
        assert!(flatten_rows(&empty).is_empty());
    }
}
