//! The GL call surface the engine is written against.
//!
//! Method names and argument order follow `glow::HasContext` so the glow backend is a
//! straight passthrough. Enum arguments are the `glow::*` constants.

use std::fmt::Debug;

/// GLES 3 constant missing from the desktop enum set glow exposes.
pub const FRAMEBUFFER_INCOMPLETE_DIMENSIONS: u32 = 0x8CD9;
/// WebGL pixel-store flag.
pub const UNPACK_FLIP_Y_WEBGL: u32 = 0x9240;

pub trait GpuDevice: Debug {
    type Shader: Copy + Debug;
    type Program: Copy + Debug + PartialEq;
    type Buffer: Copy + Debug + PartialEq;
    type VertexArray: Copy + Debug + PartialEq;
    type Texture: Copy + Debug + PartialEq;
    type Framebuffer: Copy + Debug + PartialEq;
    type TransformFeedback: Copy + Debug + PartialEq;
    type UniformLocation: Clone + Debug;

    // ---- Queries ----
    fn has_extension(&self, name: &str) -> bool;
    fn get_parameter_i32(&self, parameter: u32) -> i32;

    // ---- Fixed-function state ----
    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32);
    fn clear(&self, mask: u32);
    fn enable(&self, cap: u32);
    fn disable(&self, cap: u32);
    fn blend_func(&self, src: u32, dst: u32);
    fn blend_equation(&self, mode: u32);

    // ---- Shaders / programs ----
    fn create_shader(&self, stage: u32) -> Result<Self::Shader, String>;
    fn shader_source(&self, shader: Self::Shader, source: &str);
    fn compile_shader(&self, shader: Self::Shader);
    fn get_shader_compile_status(&self, shader: Self::Shader) -> bool;
    fn get_shader_info_log(&self, shader: Self::Shader) -> String;
    fn delete_shader(&self, shader: Self::Shader);

    fn create_program(&self) -> Result<Self::Program, String>;
    fn attach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn detach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn bind_attrib_location(&self, program: Self::Program, index: u32, name: &str);
    fn transform_feedback_varyings(&self, program: Self::Program, varyings: &[&str], mode: u32);
    fn link_program(&self, program: Self::Program);
    fn get_program_link_status(&self, program: Self::Program) -> bool;
    fn get_program_info_log(&self, program: Self::Program) -> String;
    fn delete_program(&self, program: Self::Program);
    fn use_program(&self, program: Option<Self::Program>);

    fn get_attrib_location(&self, program: Self::Program, name: &str) -> Option<u32>;
    fn get_uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation>;
    fn get_uniform_block_index(&self, program: Self::Program, name: &str) -> Option<u32>;
    fn uniform_block_binding(&self, program: Self::Program, index: u32, binding: u32);

    fn uniform_1_f32(&self, location: Option<&Self::UniformLocation>, x: f32);
    fn uniform_2_f32(&self, location: Option<&Self::UniformLocation>, x: f32, y: f32);
    fn uniform_3_f32(&self, location: Option<&Self::UniformLocation>, x: f32, y: f32, z: f32);
    fn uniform_4_f32(
        &self,
        location: Option<&Self::UniformLocation>,
        x: f32,
        y: f32,
        z: f32,
        w: f32,
    );
    fn uniform_1_i32(&self, location: Option<&Self::UniformLocation>, x: i32);
    fn uniform_matrix_3_f32_slice(
        &self,
        location: Option<&Self::UniformLocation>,
        transpose: bool,
        v: &[f32],
    );
    fn uniform_matrix_4_f32_slice(
        &self,
        location: Option<&Self::UniformLocation>,
        transpose: bool,
        v: &[f32],
    );

    // ---- Buffers ----
    fn create_buffer(&self) -> Result<Self::Buffer, String>;
    fn bind_buffer(&self, target: u32, buffer: Option<Self::Buffer>);
    fn buffer_data_u8_slice(&self, target: u32, data: &[u8], usage: u32);
    fn buffer_sub_data_u8_slice(&self, target: u32, offset: i32, data: &[u8]);
    fn delete_buffer(&self, buffer: Self::Buffer);

    // ---- Vertex arrays ----
    fn create_vertex_array(&self) -> Result<Self::VertexArray, String>;
    fn bind_vertex_array(&self, vao: Option<Self::VertexArray>);
    fn delete_vertex_array(&self, vao: Self::VertexArray);
    fn enable_vertex_attrib_array(&self, index: u32);
    fn disable_vertex_attrib_array(&self, index: u32);
    #[allow(clippy::too_many_arguments)]
    fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    );
    fn vertex_attrib_divisor(&self, index: u32, divisor: u32);

    // ---- Textures ----
    fn create_texture(&self) -> Result<Self::Texture, String>;
    fn delete_texture(&self, texture: Self::Texture);
    fn active_texture(&self, unit: u32);
    fn bind_texture(&self, target: u32, texture: Option<Self::Texture>);
    fn tex_parameter_i32(&self, target: u32, parameter: u32, value: i32);
    #[allow(clippy::too_many_arguments)]
    fn tex_image_2d(
        &self,
        target: u32,
        level: i32,
        internal_format: i32,
        width: i32,
        height: i32,
        border: i32,
        format: u32,
        ty: u32,
        pixels: Option<&[u8]>,
    );
    fn generate_mipmap(&self, target: u32);
    fn pixel_store_bool(&self, parameter: u32, value: bool);

    // ---- Framebuffers ----
    fn create_framebuffer(&self) -> Result<Self::Framebuffer, String>;
    fn delete_framebuffer(&self, framebuffer: Self::Framebuffer);
    fn bind_framebuffer(&self, target: u32, framebuffer: Option<Self::Framebuffer>);
    fn framebuffer_texture_2d(
        &self,
        target: u32,
        attachment: u32,
        texture_target: u32,
        texture: Option<Self::Texture>,
        level: i32,
    );
    fn check_framebuffer_status(&self, target: u32) -> u32;
    fn draw_buffers(&self, buffers: &[u32]);
    #[allow(clippy::too_many_arguments)]
    fn read_pixels(
        &self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        out: &mut [u8],
    );

    // ---- Transform feedback (modern contexts) ----
    fn create_transform_feedback(&self) -> Result<Self::TransformFeedback, String>;
    fn delete_transform_feedback(&self, feedback: Self::TransformFeedback);
    fn bind_transform_feedback(&self, target: u32, feedback: Option<Self::TransformFeedback>);
    fn bind_buffer_base(&self, target: u32, index: u32, buffer: Option<Self::Buffer>);
    fn begin_transform_feedback(&self, primitive_mode: u32);
    fn end_transform_feedback(&self);

    // ---- Draws ----
    fn draw_arrays(&self, mode: u32, first: i32, count: i32);
    fn draw_arrays_instanced(&self, mode: u32, first: i32, count: i32, instances: i32);
    fn draw_elements(&self, mode: u32, count: i32, element_type: u32, offset: i32);
    fn draw_elements_instanced(
        &self,
        mode: u32,
        count: i32,
        element_type: u32,
        offset: i32,
        instances: i32,
    );
}
