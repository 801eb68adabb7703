//! Fragment bodies for the built-in passes.
//!
//! Bodies are written against a small prelude so one source serves both GLSL dialects:
//! `TEX` samples a 2D texture, `FRAG_COLOR` is the output and `vUv` the interpolated
//! coordinate from the fullscreen vertex stage.

use glint_runtime_glow::{GpuDevice, RenderingContext, ShaderSource};

const PRELUDE_MODERN: &str = "#define TEX texture
out vec4 fragColor;
#define FRAG_COLOR fragColor
in vec2 vUv;
";

const PRELUDE_LEGACY: &str = "#define TEX texture2D
#define FRAG_COLOR gl_FragColor
varying vec2 vUv;
";

/// Prefix `body` with the prelude for `ctx`'s dialect.
pub fn fragment<D: GpuDevice>(ctx: &RenderingContext<D>, body: &str) -> ShaderSource {
    let prelude = if ctx.dialect().is_modern() {
        PRELUDE_MODERN
    } else {
        PRELUDE_LEGACY
    };
    ShaderSource::Fragments(vec![prelude.to_string(), body.to_string()])
}

pub const COPY: &str = r#"uniform sampler2D tex0;
uniform vec2 resolution;
uniform float time;
void main() {
    FRAG_COLOR = TEX(tex0, vUv);
}
"#;

/// Nine-tap gaussian along `sample_offset`, added on top of the source.
pub const BLOOM: &str = r#"uniform sampler2D tex0;
uniform vec2 resolution;
uniform vec2 sample_offset;
void main() {
    vec4 base = TEX(tex0, vUv);
    vec4 sum = base * 0.227027;
    sum += (TEX(tex0, vUv + sample_offset) + TEX(tex0, vUv - sample_offset)) * 0.1945946;
    sum += (TEX(tex0, vUv + sample_offset * 2.0) + TEX(tex0, vUv - sample_offset * 2.0)) * 0.1216216;
    sum += (TEX(tex0, vUv + sample_offset * 3.0) + TEX(tex0, vUv - sample_offset * 3.0)) * 0.054054;
    sum += (TEX(tex0, vUv + sample_offset * 4.0) + TEX(tex0, vUv - sample_offset * 4.0)) * 0.016216;
    FRAG_COLOR = base + sum * 0.5;
}
"#;

pub const GLITCH: &str = r#"uniform sampler2D tex0;
uniform sampler2D tDisp;
uniform vec2 resolution;
uniform float byp;
uniform float amount;
uniform float angle;
uniform float seed;
uniform float seed_x;
uniform float seed_y;
uniform float distortion_x;
uniform float distortion_y;
uniform float col_s;

float rand(vec2 co) {
    return fract(sin(dot(co.xy, vec2(12.9898, 78.233))) * 43758.5453);
}

void main() {
    if (byp > 0.5) {
        FRAG_COLOR = TEX(tex0, vUv);
        return;
    }
    vec2 p = vUv;
    float xs = floor(gl_FragCoord.x / 0.5);
    float ys = floor(gl_FragCoord.y / 0.5);
    vec4 normal = TEX(tDisp, p * seed * seed);
    if (p.y < distortion_x + col_s && p.y > distortion_x - col_s * seed) {
        if (seed_x > 0.0) {
            p.y = 1.0 - (p.y + distortion_y);
        } else {
            p.y = distortion_y;
        }
    }
    if (p.x < distortion_y + col_s && p.x > distortion_y - col_s * seed) {
        if (seed_y > 0.0) {
            p.x = distortion_x;
        } else {
            p.x = 1.0 - (p.x + distortion_x);
        }
    }
    p.x += normal.x * seed_x * (seed / 5.0);
    p.y += normal.y * seed_y * (seed / 5.0);
    vec2 offset = amount * vec2(cos(angle), sin(angle));
    vec4 cr = TEX(tex0, p + offset);
    vec4 cga = TEX(tex0, p);
    vec4 cb = TEX(tex0, p - offset);
    vec4 snow = 200.0 * amount * vec4(rand(vec2(xs * seed, ys * seed * 50.0)) * 0.2);
    FRAG_COLOR = vec4(cr.r, cga.g, cb.b, cga.a) + snow;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use glint_core::ContextOptions;
    use glint_runtime_glow::{create_context, ApiVariant, HeadlessConfig, HeadlessSurface};

    #[test]
    fn prelude_follows_dialect() {
        let modern = crate::test_support::ctx();
        let src = fragment(&modern, COPY).concat();
        assert!(src.starts_with("#define TEX texture\n"));
        assert!(src.contains("in vec2 vUv;"));

        let mut surface =
            HeadlessSurface::new(vec![ApiVariant::WebGl], HeadlessConfig::webgl1_full(), (4, 4));
        let legacy = create_context(&mut surface, &ContextOptions::default()).expect("context");
        let src = fragment(&legacy, COPY).concat();
        assert!(src.contains("#define FRAG_COLOR gl_FragColor"));
        assert!(src.contains("varying vec2 vUv;"));
    }
}
