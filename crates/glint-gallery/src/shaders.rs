//! Image-plane shaders. Fragment bodies use the `glint_passes::shaders` prelude.

pub const IMAGE_VERT: &str = r#"in vec3 position;
in vec3 ppos;
in vec2 uv;
uniform mat4 projectionMatrix;
uniform mat4 modelViewMatrix;
out vec2 vUv;
void main() {
    vUv = uv;
    gl_Position = projectionMatrix * modelViewMatrix * vec4(position + ppos, 1.0);
}
"#;

pub const IMAGE_VERT_LEGACY: &str = r#"attribute vec3 position;
attribute vec3 ppos;
attribute vec2 uv;
uniform mat4 projectionMatrix;
uniform mat4 modelViewMatrix;
varying vec2 vUv;
void main() {
    vUv = uv;
    gl_Position = projectionMatrix * modelViewMatrix * vec4(position + ppos, 1.0);
}
"#;

/// Cross-fade from `currentImage` to `nextImage`, gated per texel by the red channel of
/// `mixTexture`. `mixRatio` 1 shows the current image, 0 the next one; `threshold` sets how
/// soft the edge of the wipe is.
pub const IMAGE_FRAG: &str = r#"uniform sampler2D currentImage;
uniform sampler2D nextImage;
uniform sampler2D mixTexture;
uniform float mixRatio;
uniform float threshold;
uniform float time;
uniform bool animateTransition;
void main() {
    vec4 current = TEX(currentImage, vUv);
    if (!animateTransition) {
        FRAG_COLOR = current;
        return;
    }
    vec4 next = TEX(nextImage, vUv);
    float mask = TEX(mixTexture, vUv).r;
    float edge = mixRatio * (1.0 + threshold * 2.0) - threshold;
    float w = clamp((mask - edge) / threshold, 0.0, 1.0);
    FRAG_COLOR = mix(current, next, w);
}
"#;
