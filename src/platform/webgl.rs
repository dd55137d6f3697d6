//! WebGL2 backend
//!
//! Thin forwarding layer from `GlBackend` onto `WebGl2RenderingContext`.
//! The only real work is in `get_parameter`, which has to sort a dynamically
//! typed `JsValue` into a `Parameter`.

use crate::bridge::graphics::{BufferData, GlBackend, Parameter};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    WebGl2RenderingContext, WebGlBuffer, WebGlFramebuffer, WebGlProgram, WebGlShader,
    WebGlTexture, WebGlUniformLocation,
};

pub struct WebGl2Backend {
    gl: WebGl2RenderingContext,
}

impl WebGl2Backend {
    pub fn new(gl: WebGl2RenderingContext) -> Self {
        Self { gl }
    }
}

/// Log a throwing call; the guest learns about failures through glGetError
fn report(call: &str, result: Result<(), JsValue>) {
    if let Err(e) = result {
        crate::console_error!("[gl] {} threw: {:?}", call, e);
    }
}

fn to_parameter(value: JsValue) -> Parameter<WebGl2Backend> {
    if value.is_null() || value.is_undefined() {
        return Parameter::None;
    }
    if let Some(b) = value.as_bool() {
        return Parameter::Bool(b);
    }
    if let Some(n) = value.as_f64() {
        return if n.fract() == 0.0 && n >= i32::MIN as f64 && n <= u32::MAX as f64 {
            Parameter::Int(n as i64 as i32)
        } else {
            Parameter::Float(n as f32)
        };
    }
    if let Some(a) = value.dyn_ref::<js_sys::Int32Array>() {
        return Parameter::Ints(a.to_vec());
    }
    if let Some(a) = value.dyn_ref::<js_sys::Uint32Array>() {
        return Parameter::Ints(a.to_vec().into_iter().map(|v| v as i32).collect());
    }
    if let Some(a) = value.dyn_ref::<js_sys::Float32Array>() {
        return Parameter::Floats(a.to_vec());
    }
    if let Some(a) = value.dyn_ref::<js_sys::Array>() {
        // COLOR_WRITEMASK is the only array-of-bool query
        return Parameter::Bools(a.iter().map(|v| v.as_bool().unwrap_or(false)).collect());
    }
    let value = match value.dyn_into::<WebGlFramebuffer>() {
        Ok(fb) => return Parameter::Framebuffer(fb),
        Err(v) => v,
    };
    let value = match value.dyn_into::<WebGlTexture>() {
        Ok(t) => return Parameter::Texture(t),
        Err(v) => v,
    };
    let value = match value.dyn_into::<WebGlBuffer>() {
        Ok(b) => return Parameter::Buffer(b),
        Err(v) => v,
    };
    match value.dyn_into::<WebGlProgram>() {
        Ok(p) => Parameter::Program(p),
        Err(v) => {
            crate::console_warn!("[gl] unrecognized parameter value {:?}", v);
            Parameter::None
        }
    }
}

impl GlBackend for WebGl2Backend {
    type Framebuffer = WebGlFramebuffer;
    type Texture = WebGlTexture;
    type Buffer = WebGlBuffer;
    type Shader = WebGlShader;
    type Program = WebGlProgram;
    type UniformLocation = WebGlUniformLocation;

    fn create_framebuffer(&mut self) -> Option<WebGlFramebuffer> {
        self.gl.create_framebuffer()
    }

    fn delete_framebuffer(&mut self, framebuffer: &WebGlFramebuffer) {
        self.gl.delete_framebuffer(Some(framebuffer));
    }

    fn bind_framebuffer(&mut self, target: u32, framebuffer: Option<&WebGlFramebuffer>) {
        self.gl.bind_framebuffer(target, framebuffer);
    }

    fn blit_framebuffer(&mut self, src: [i32; 4], dst: [i32; 4], mask: u32, filter: u32) {
        self.gl.blit_framebuffer(
            src[0], src[1], src[2], src[3], dst[0], dst[1], dst[2], dst[3], mask, filter,
        );
    }

    fn framebuffer_texture_2d(
        &mut self,
        target: u32,
        attachment: u32,
        textarget: u32,
        texture: Option<&WebGlTexture>,
        level: i32,
    ) {
        self.gl
            .framebuffer_texture_2d(target, attachment, textarget, texture, level);
    }

    fn enable(&mut self, cap: u32) {
        self.gl.enable(cap);
    }

    fn disable(&mut self, cap: u32) {
        self.gl.disable(cap);
    }

    fn is_enabled(&self, cap: u32) -> bool {
        self.gl.is_enabled(cap)
    }

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.gl.viewport(x, y, width, height);
    }

    fn scissor(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.gl.scissor(x, y, width, height);
    }

    fn get_parameter(&self, pname: u32) -> Parameter<Self> {
        match self.gl.get_parameter(pname) {
            Ok(value) => to_parameter(value),
            Err(e) => {
                crate::console_error!("[gl] getParameter(0x{:X}) threw: {:?}", pname, e);
                Parameter::None
            }
        }
    }

    fn get_error(&mut self) -> u32 {
        self.gl.get_error()
    }

    fn finish(&mut self) {
        self.gl.finish();
    }

    fn clear(&mut self, mask: u32) {
        self.gl.clear(mask);
    }

    fn clear_color(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.gl.clear_color(r, g, b, a);
    }

    fn blend_func(&mut self, sfactor: u32, dfactor: u32) {
        self.gl.blend_func(sfactor, dfactor);
    }

    fn blend_func_separate(&mut self, src_rgb: u32, dst_rgb: u32, src_alpha: u32, dst_alpha: u32) {
        self.gl
            .blend_func_separate(src_rgb, dst_rgb, src_alpha, dst_alpha);
    }

    fn blend_equation(&mut self, mode: u32) {
        self.gl.blend_equation(mode);
    }

    fn blend_equation_separate(&mut self, mode_rgb: u32, mode_alpha: u32) {
        self.gl.blend_equation_separate(mode_rgb, mode_alpha);
    }

    fn create_texture(&mut self) -> Option<WebGlTexture> {
        self.gl.create_texture()
    }

    fn delete_texture(&mut self, texture: &WebGlTexture) {
        self.gl.delete_texture(Some(texture));
    }

    fn bind_texture(&mut self, target: u32, texture: Option<&WebGlTexture>) {
        self.gl.bind_texture(target, texture);
    }

    fn active_texture(&mut self, texture: u32) {
        self.gl.active_texture(texture);
    }

    fn tex_parameter_i(&mut self, target: u32, pname: u32, param: i32) {
        self.gl.tex_parameteri(target, pname, param);
    }

    fn tex_image_2d(
        &mut self,
        target: u32,
        level: i32,
        internal_format: i32,
        width: i32,
        height: i32,
        border: i32,
        format: u32,
        ty: u32,
        pixels: Option<&[u8]>,
    ) {
        report(
            "texImage2D",
            self.gl
                .tex_image_2d_with_i32_and_i32_and_i32_and_format_and_type_and_opt_u8_array(
                    target,
                    level,
                    internal_format,
                    width,
                    height,
                    border,
                    format,
                    ty,
                    pixels,
                ),
        );
    }

    fn tex_sub_image_2d(
        &mut self,
        target: u32,
        level: i32,
        xoffset: i32,
        yoffset: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        pixels: Option<&[u8]>,
    ) {
        report(
            "texSubImage2D",
            self.gl
                .tex_sub_image_2d_with_i32_and_i32_and_u32_and_type_and_opt_u8_array(
                    target, level, xoffset, yoffset, width, height, format, ty, pixels,
                ),
        );
    }

    fn create_buffer(&mut self) -> Option<WebGlBuffer> {
        self.gl.create_buffer()
    }

    fn delete_buffer(&mut self, buffer: &WebGlBuffer) {
        self.gl.delete_buffer(Some(buffer));
    }

    fn bind_buffer(&mut self, target: u32, buffer: Option<&WebGlBuffer>) {
        self.gl.bind_buffer(target, buffer);
    }

    fn buffer_data(&mut self, target: u32, data: BufferData<'_>, usage: u32) {
        match data {
            BufferData::Size(size) => self.gl.buffer_data_with_i32(target, size, usage),
            BufferData::Bytes(bytes) => self.gl.buffer_data_with_u8_array(target, bytes, usage),
        }
    }

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        self.gl.enable_vertex_attrib_array(index);
    }

    fn vertex_attrib_pointer(
        &mut self,
        index: u32,
        size: i32,
        ty: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    ) {
        self.gl
            .vertex_attrib_pointer_with_i32(index, size, ty, normalized, stride, offset);
    }

    fn draw_elements(&mut self, mode: u32, count: i32, ty: u32, offset: i32) {
        self.gl.draw_elements_with_i32(mode, count, ty, offset);
    }

    fn create_shader(&mut self, ty: u32) -> Option<WebGlShader> {
        self.gl.create_shader(ty)
    }

    fn shader_source(&mut self, shader: &WebGlShader, source: &str) {
        self.gl.shader_source(shader, source);
    }

    fn compile_shader(&mut self, shader: &WebGlShader) {
        self.gl.compile_shader(shader);
    }

    fn shader_parameter(&self, shader: &WebGlShader, pname: u32) -> Parameter<Self> {
        to_parameter(self.gl.get_shader_parameter(shader, pname))
    }

    fn shader_info_log(&self, shader: &WebGlShader) -> String {
        self.gl.get_shader_info_log(shader).unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: &WebGlShader) {
        self.gl.delete_shader(Some(shader));
    }

    fn create_program(&mut self) -> Option<WebGlProgram> {
        self.gl.create_program()
    }

    fn attach_shader(&mut self, program: &WebGlProgram, shader: &WebGlShader) {
        self.gl.attach_shader(program, shader);
    }

    fn detach_shader(&mut self, program: &WebGlProgram, shader: &WebGlShader) {
        self.gl.detach_shader(program, shader);
    }

    fn link_program(&mut self, program: &WebGlProgram) {
        self.gl.link_program(program);
    }

    fn program_parameter(&self, program: &WebGlProgram, pname: u32) -> Parameter<Self> {
        to_parameter(self.gl.get_program_parameter(program, pname))
    }

    fn program_info_log(&self, program: &WebGlProgram) -> String {
        self.gl.get_program_info_log(program).unwrap_or_default()
    }

    fn use_program(&mut self, program: Option<&WebGlProgram>) {
        self.gl.use_program(program);
    }

    fn delete_program(&mut self, program: &WebGlProgram) {
        self.gl.delete_program(Some(program));
    }

    fn get_attrib_location(&self, program: &WebGlProgram, name: &str) -> i32 {
        self.gl.get_attrib_location(program, name)
    }

    fn get_uniform_location(
        &self,
        program: &WebGlProgram,
        name: &str,
    ) -> Option<WebGlUniformLocation> {
        self.gl.get_uniform_location(program, name)
    }

    fn uniform1i(&mut self, location: Option<&WebGlUniformLocation>, value: i32) {
        self.gl.uniform1i(location, value);
    }

    fn uniform_matrix4fv(
        &mut self,
        location: Option<&WebGlUniformLocation>,
        transpose: bool,
        data: &[f32],
    ) {
        self.gl
            .uniform_matrix4fv_with_f32_array(location, transpose, data);
    }
}
