//! Headless Platform Implementation
//!
//! Runs the bridge without a browser:
//! - `HeadlessGl` records every call and fabricates object ids
//! - guest stdout/stderr and diagnostics are captured in strings
//! - the clock only moves when told to
//!
//! Used by the test suites and by anything driving a guest natively.

use super::{DroppedFile, Platform, PlatformError, PlatformResult};
use crate::bridge::graphics::{BufferData, GlBackend, Parameter};
use crate::bridge::memory::VecMemory;
use crate::config::ContextAttributes;
use std::collections::{HashMap, HashSet, VecDeque};

/// Headless platform state
#[derive(Debug)]
pub struct HeadlessPlatform {
    /// Viewport size reported to the guest
    pub viewport: (u32, u32),
    /// Current canvas backing size, once created
    pub canvas_size: Option<(u32, u32)>,
    /// Attributes of the context the guest asked for
    pub context: Option<ContextAttributes>,
    pub title: String,
    pub stdout: String,
    pub stderr: String,
    pub warnings: Vec<String>,
    /// Files queued as if dropped onto the page
    pub pending_drops: VecDeque<DroppedFile>,
    pub drop_target: bool,
    /// When false, canvas creation fails as if WebGL2 were unavailable
    pub gl_available: bool,
    clock_ns: u64,
}

impl HeadlessPlatform {
    pub fn new() -> Self {
        Self {
            viewport: (800, 600),
            canvas_size: None,
            context: None,
            title: String::new(),
            stdout: String::new(),
            stderr: String::new(),
            warnings: Vec::new(),
            pending_drops: VecDeque::new(),
            drop_target: false,
            gl_available: true,
            clock_ns: 0,
        }
    }

    /// Platform reporting the given viewport
    pub fn with_viewport(width: u32, height: u32) -> Self {
        Self {
            viewport: (width, height),
            ..Self::new()
        }
    }

    /// Set the clock
    pub fn set_time_ns(&mut self, ns: u64) {
        self.clock_ns = ns;
    }

    /// Advance the clock
    pub fn advance_ns(&mut self, ns: u64) {
        self.clock_ns = self.clock_ns.saturating_add(ns);
    }

    /// Queue a file as if the user dropped it
    pub fn drop_file(&mut self, name: &str, data: &[u8]) {
        self.pending_drops.push_back(DroppedFile {
            name: name.to_string(),
            data: data.to_vec(),
        });
    }
}

impl Default for HeadlessPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for HeadlessPlatform {
    type Gl = HeadlessGl;
    type Memory = VecMemory;

    fn viewport_size(&self) -> (u32, u32) {
        self.viewport
    }

    fn create_canvas(
        &mut self,
        _canvas_id: &str,
        attributes: &ContextAttributes,
    ) -> PlatformResult<HeadlessGl> {
        if !self.gl_available {
            return Err(PlatformError::NotSupported("WebGL2".to_string()));
        }
        self.context = Some(*attributes);
        self.canvas_size = Some(self.viewport);
        Ok(HeadlessGl::new())
    }

    fn resize_canvas(&mut self) {
        if self.canvas_size.is_some() {
            self.canvas_size = Some(self.viewport);
        }
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    fn register_drop_target(&mut self) -> PlatformResult<()> {
        self.drop_target = true;
        Ok(())
    }

    fn take_dropped_files(&mut self) -> Vec<DroppedFile> {
        if !self.drop_target {
            return Vec::new();
        }
        self.pending_drops.drain(..).collect()
    }

    fn now_ns(&self) -> u64 {
        self.clock_ns
    }

    fn write_stdout(&mut self, text: &str) {
        self.stdout.push_str(text);
    }

    fn write_stderr(&mut self, text: &str) {
        self.stderr.push_str(text);
    }

    fn warn(&mut self, text: &str) {
        self.warnings.push(text.to_string());
    }
}

// Query enums the recording backend answers
const BLEND: u32 = 0x0BE2;
const VIEWPORT: u32 = 0x0BA2;
const SCISSOR_BOX: u32 = 0x0C10;
const COLOR_CLEAR_VALUE: u32 = 0x0C22;
const MAX_TEXTURE_SIZE: u32 = 0x0D33;
const TEXTURE_BINDING_2D: u32 = 0x8069;
const ARRAY_BUFFER: u32 = 0x8892;
const ARRAY_BUFFER_BINDING: u32 = 0x8894;
const FRAMEBUFFER: u32 = 0x8D40;
const DRAW_FRAMEBUFFER: u32 = 0x8CA9;
const FRAMEBUFFER_BINDING: u32 = 0x8CA6;
const CURRENT_PROGRAM: u32 = 0x8B8D;
const ATTACHED_SHADERS: u32 = 0x8B85;
const COMPILE_STATUS: u32 = 0x8B81;
const LINK_STATUS: u32 = 0x8B82;

macro_rules! fake_objects {
    ($($name:ident),*) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            pub struct $name(pub u32);
        )*
    };
}

fake_objects!(FakeFramebuffer, FakeTexture, FakeBuffer, FakeShader, FakeProgram);

/// Uniform location handed out by `HeadlessGl`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeUniform {
    pub program: u32,
    pub name: String,
}

/// A `glTexImage2D`/`glTexSubImage2D` as the backend saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureUpload {
    pub target: u32,
    pub level: i32,
    pub width: i32,
    pub height: i32,
    pub pixels: Option<Vec<u8>>,
}

/// Recording GL backend
///
/// Object ids come from one counter shared by all classes, so a handle that
/// matched its object id by accident would be caught by the tests.
#[derive(Debug)]
pub struct HeadlessGl {
    /// Every call, in order, as a short description
    pub calls: Vec<String>,
    /// Result of every shader compile
    pub compile_ok: bool,
    /// Result of every program link
    pub link_ok: bool,
    pub info_log: String,
    /// Uniforms no program has
    pub absent_uniforms: HashSet<String>,
    pub attrib_locations: HashMap<String, i32>,
    /// Errors returned by `get_error`, oldest first
    pub errors: VecDeque<u32>,
    /// When false every `create_*` fails, as after a context loss
    pub can_create: bool,

    pub shader_sources: HashMap<u32, String>,
    /// Sizes of size-only `buffer_data` calls
    pub buffer_sizes: Vec<i32>,
    pub buffer_bytes: Vec<Vec<u8>>,
    pub texture_uploads: Vec<TextureUpload>,
    pub uniform_ints: Vec<(Option<FakeUniform>, i32)>,
    pub uniform_matrices: Vec<(Option<FakeUniform>, Vec<f32>)>,
    pub deleted: Vec<String>,

    next_id: u32,
    enabled: HashSet<u32>,
    viewport: [i32; 4],
    scissor: [i32; 4],
    clear_color: [f32; 4],
    bound_framebuffer: Option<FakeFramebuffer>,
    bound_texture: Option<FakeTexture>,
    bound_array_buffer: Option<FakeBuffer>,
    current_program: Option<FakeProgram>,
    attached: HashMap<u32, Vec<u32>>,
}

impl HeadlessGl {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            compile_ok: true,
            link_ok: true,
            info_log: String::new(),
            absent_uniforms: HashSet::new(),
            attrib_locations: HashMap::new(),
            errors: VecDeque::new(),
            can_create: true,
            shader_sources: HashMap::new(),
            buffer_sizes: Vec::new(),
            buffer_bytes: Vec::new(),
            texture_uploads: Vec::new(),
            uniform_ints: Vec::new(),
            uniform_matrices: Vec::new(),
            deleted: Vec::new(),
            next_id: 100,
            enabled: HashSet::new(),
            viewport: [0; 4],
            scissor: [0; 4],
            clear_color: [0.0; 4],
            bound_framebuffer: None,
            bound_texture: None,
            bound_array_buffer: None,
            current_program: None,
            attached: HashMap::new(),
        }
    }

    fn record(&mut self, call: String) {
        self.calls.push(call);
    }

    fn fresh(&mut self, what: &str) -> Option<u32> {
        if !self.can_create {
            self.record(format!("{}() -> null", what));
            return None;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.record(format!("{}() -> {}", what, id));
        Some(id)
    }

    /// Whether a call starting with `prefix` was recorded
    pub fn called(&self, prefix: &str) -> bool {
        self.calls.iter().any(|c| c.starts_with(prefix))
    }

    /// Shader ids attached to a program
    pub fn attached_shaders(&self, program: FakeProgram) -> &[u32] {
        self.attached.get(&program.0).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Default for HeadlessGl {
    fn default() -> Self {
        Self::new()
    }
}

impl GlBackend for HeadlessGl {
    type Framebuffer = FakeFramebuffer;
    type Texture = FakeTexture;
    type Buffer = FakeBuffer;
    type Shader = FakeShader;
    type Program = FakeProgram;
    type UniformLocation = FakeUniform;

    fn create_framebuffer(&mut self) -> Option<FakeFramebuffer> {
        self.fresh("createFramebuffer").map(FakeFramebuffer)
    }

    fn delete_framebuffer(&mut self, framebuffer: &FakeFramebuffer) {
        self.deleted.push(format!("framebuffer {}", framebuffer.0));
        if self.bound_framebuffer == Some(*framebuffer) {
            self.bound_framebuffer = None;
        }
    }

    fn bind_framebuffer(&mut self, target: u32, framebuffer: Option<&FakeFramebuffer>) {
        self.record(format!("bindFramebuffer(0x{:X}, {:?})", target, framebuffer.map(|f| f.0)));
        if target == FRAMEBUFFER || target == DRAW_FRAMEBUFFER {
            self.bound_framebuffer = framebuffer.copied();
        }
    }

    fn blit_framebuffer(&mut self, src: [i32; 4], dst: [i32; 4], mask: u32, filter: u32) {
        self.record(format!(
            "blitFramebuffer({:?}, {:?}, 0x{:X}, 0x{:X})",
            src, dst, mask, filter
        ));
    }

    fn framebuffer_texture_2d(
        &mut self,
        target: u32,
        attachment: u32,
        textarget: u32,
        texture: Option<&FakeTexture>,
        level: i32,
    ) {
        self.record(format!(
            "framebufferTexture2D(0x{:X}, 0x{:X}, 0x{:X}, {:?}, {})",
            target,
            attachment,
            textarget,
            texture.map(|t| t.0),
            level
        ));
    }

    fn enable(&mut self, cap: u32) {
        self.record(format!("enable(0x{:X})", cap));
        self.enabled.insert(cap);
    }

    fn disable(&mut self, cap: u32) {
        self.record(format!("disable(0x{:X})", cap));
        self.enabled.remove(&cap);
    }

    fn is_enabled(&self, cap: u32) -> bool {
        self.enabled.contains(&cap)
    }

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.record(format!("viewport({}, {}, {}, {})", x, y, width, height));
        self.viewport = [x, y, width, height];
    }

    fn scissor(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.record(format!("scissor({}, {}, {}, {})", x, y, width, height));
        self.scissor = [x, y, width, height];
    }

    fn get_parameter(&self, pname: u32) -> Parameter<Self> {
        match pname {
            BLEND => Parameter::Bool(self.enabled.contains(&BLEND)),
            VIEWPORT => Parameter::Ints(self.viewport.to_vec()),
            SCISSOR_BOX => Parameter::Ints(self.scissor.to_vec()),
            COLOR_CLEAR_VALUE => Parameter::Floats(self.clear_color.to_vec()),
            MAX_TEXTURE_SIZE => Parameter::Int(4096),
            FRAMEBUFFER_BINDING => match self.bound_framebuffer {
                Some(fb) => Parameter::Framebuffer(fb),
                None => Parameter::None,
            },
            TEXTURE_BINDING_2D => match self.bound_texture {
                Some(t) => Parameter::Texture(t),
                None => Parameter::None,
            },
            ARRAY_BUFFER_BINDING => match self.bound_array_buffer {
                Some(b) => Parameter::Buffer(b),
                None => Parameter::None,
            },
            CURRENT_PROGRAM => match self.current_program {
                Some(p) => Parameter::Program(p),
                None => Parameter::None,
            },
            _ => Parameter::None,
        }
    }

    fn get_error(&mut self) -> u32 {
        self.errors.pop_front().unwrap_or(0)
    }

    fn finish(&mut self) {
        self.record("finish()".to_string());
    }

    fn clear(&mut self, mask: u32) {
        self.record(format!("clear(0x{:X})", mask));
    }

    fn clear_color(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.record(format!("clearColor({}, {}, {}, {})", r, g, b, a));
        self.clear_color = [r, g, b, a];
    }

    fn blend_func(&mut self, sfactor: u32, dfactor: u32) {
        self.record(format!("blendFunc(0x{:X}, 0x{:X})", sfactor, dfactor));
    }

    fn blend_func_separate(&mut self, src_rgb: u32, dst_rgb: u32, src_alpha: u32, dst_alpha: u32) {
        self.record(format!(
            "blendFuncSeparate(0x{:X}, 0x{:X}, 0x{:X}, 0x{:X})",
            src_rgb, dst_rgb, src_alpha, dst_alpha
        ));
    }

    fn blend_equation(&mut self, mode: u32) {
        self.record(format!("blendEquation(0x{:X})", mode));
    }

    fn blend_equation_separate(&mut self, mode_rgb: u32, mode_alpha: u32) {
        self.record(format!("blendEquationSeparate(0x{:X}, 0x{:X})", mode_rgb, mode_alpha));
    }

    fn create_texture(&mut self) -> Option<FakeTexture> {
        self.fresh("createTexture").map(FakeTexture)
    }

    fn delete_texture(&mut self, texture: &FakeTexture) {
        self.deleted.push(format!("texture {}", texture.0));
        if self.bound_texture == Some(*texture) {
            self.bound_texture = None;
        }
    }

    fn bind_texture(&mut self, target: u32, texture: Option<&FakeTexture>) {
        self.record(format!("bindTexture(0x{:X}, {:?})", target, texture.map(|t| t.0)));
        self.bound_texture = texture.copied();
    }

    fn active_texture(&mut self, texture: u32) {
        self.record(format!("activeTexture(0x{:X})", texture));
    }

    fn tex_parameter_i(&mut self, target: u32, pname: u32, param: i32) {
        self.record(format!("texParameteri(0x{:X}, 0x{:X}, {})", target, pname, param));
    }

    fn tex_image_2d(
        &mut self,
        target: u32,
        level: i32,
        _internal_format: i32,
        width: i32,
        height: i32,
        _border: i32,
        _format: u32,
        _ty: u32,
        pixels: Option<&[u8]>,
    ) {
        self.record(format!("texImage2D(0x{:X}, {}, {}x{})", target, level, width, height));
        self.texture_uploads.push(TextureUpload {
            target,
            level,
            width,
            height,
            pixels: pixels.map(<[u8]>::to_vec),
        });
    }

    fn tex_sub_image_2d(
        &mut self,
        target: u32,
        level: i32,
        xoffset: i32,
        yoffset: i32,
        width: i32,
        height: i32,
        _format: u32,
        _ty: u32,
        pixels: Option<&[u8]>,
    ) {
        self.record(format!(
            "texSubImage2D(0x{:X}, {}, {}, {}, {}x{})",
            target, level, xoffset, yoffset, width, height
        ));
        self.texture_uploads.push(TextureUpload {
            target,
            level,
            width,
            height,
            pixels: pixels.map(<[u8]>::to_vec),
        });
    }

    fn create_buffer(&mut self) -> Option<FakeBuffer> {
        self.fresh("createBuffer").map(FakeBuffer)
    }

    fn delete_buffer(&mut self, buffer: &FakeBuffer) {
        self.deleted.push(format!("buffer {}", buffer.0));
        if self.bound_array_buffer == Some(*buffer) {
            self.bound_array_buffer = None;
        }
    }

    fn bind_buffer(&mut self, target: u32, buffer: Option<&FakeBuffer>) {
        self.record(format!("bindBuffer(0x{:X}, {:?})", target, buffer.map(|b| b.0)));
        if target == ARRAY_BUFFER {
            self.bound_array_buffer = buffer.copied();
        }
    }

    fn buffer_data(&mut self, target: u32, data: BufferData<'_>, usage: u32) {
        match data {
            BufferData::Size(size) => {
                self.record(format!("bufferData(0x{:X}, size {}, 0x{:X})", target, size, usage));
                self.buffer_sizes.push(size);
            }
            BufferData::Bytes(bytes) => {
                self.record(format!(
                    "bufferData(0x{:X}, {} bytes, 0x{:X})",
                    target,
                    bytes.len(),
                    usage
                ));
                self.buffer_bytes.push(bytes.to_vec());
            }
        }
    }

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        self.record(format!("enableVertexAttribArray({})", index));
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
        self.record(format!(
            "vertexAttribPointer({}, {}, 0x{:X}, {}, {}, {})",
            index, size, ty, normalized, stride, offset
        ));
    }

    fn draw_elements(&mut self, mode: u32, count: i32, ty: u32, offset: i32) {
        self.record(format!("drawElements(0x{:X}, {}, 0x{:X}, {})", mode, count, ty, offset));
    }

    fn create_shader(&mut self, ty: u32) -> Option<FakeShader> {
        self.fresh(&format!("createShader(0x{:X})", ty)).map(FakeShader)
    }

    fn shader_source(&mut self, shader: &FakeShader, source: &str) {
        self.record(format!("shaderSource({})", shader.0));
        self.shader_sources.insert(shader.0, source.to_string());
    }

    fn compile_shader(&mut self, shader: &FakeShader) {
        self.record(format!("compileShader({})", shader.0));
    }

    fn shader_parameter(&self, _shader: &FakeShader, pname: u32) -> Parameter<Self> {
        match pname {
            COMPILE_STATUS => Parameter::Bool(self.compile_ok),
            _ => Parameter::None,
        }
    }

    fn shader_info_log(&self, _shader: &FakeShader) -> String {
        self.info_log.clone()
    }

    fn delete_shader(&mut self, shader: &FakeShader) {
        self.deleted.push(format!("shader {}", shader.0));
    }

    fn create_program(&mut self) -> Option<FakeProgram> {
        self.fresh("createProgram").map(FakeProgram)
    }

    fn attach_shader(&mut self, program: &FakeProgram, shader: &FakeShader) {
        self.record(format!("attachShader({}, {})", program.0, shader.0));
        self.attached.entry(program.0).or_default().push(shader.0);
    }

    fn detach_shader(&mut self, program: &FakeProgram, shader: &FakeShader) {
        self.record(format!("detachShader({}, {})", program.0, shader.0));
        if let Some(shaders) = self.attached.get_mut(&program.0) {
            shaders.retain(|s| *s != shader.0);
        }
    }

    fn link_program(&mut self, program: &FakeProgram) {
        self.record(format!("linkProgram({})", program.0));
    }

    fn program_parameter(&self, program: &FakeProgram, pname: u32) -> Parameter<Self> {
        match pname {
            LINK_STATUS => Parameter::Bool(self.link_ok),
            ATTACHED_SHADERS => Parameter::Int(self.attached_shaders(*program).len() as i32),
            _ => Parameter::None,
        }
    }

    fn program_info_log(&self, _program: &FakeProgram) -> String {
        self.info_log.clone()
    }

    fn use_program(&mut self, program: Option<&FakeProgram>) {
        self.record(format!("useProgram({:?})", program.map(|p| p.0)));
        self.current_program = program.copied();
    }

    fn delete_program(&mut self, program: &FakeProgram) {
        self.deleted.push(format!("program {}", program.0));
        if self.current_program == Some(*program) {
            self.current_program = None;
        }
    }

    fn get_attrib_location(&self, _program: &FakeProgram, name: &str) -> i32 {
        self.attrib_locations.get(name).copied().unwrap_or(-1)
    }

    fn get_uniform_location(&self, program: &FakeProgram, name: &str) -> Option<FakeUniform> {
        if self.absent_uniforms.contains(name) {
            return None;
        }
        Some(FakeUniform {
            program: program.0,
            name: name.to_string(),
        })
    }

    fn uniform1i(&mut self, location: Option<&FakeUniform>, value: i32) {
        self.record(format!("uniform1i({:?}, {})", location.map(|l| &l.name), value));
        self.uniform_ints.push((location.cloned(), value));
    }

    fn uniform_matrix4fv(&mut self, location: Option<&FakeUniform>, transpose: bool, data: &[f32]) {
        self.record(format!(
            "uniformMatrix4fv({:?}, {}, {} floats)",
            location.map(|l| &l.name),
            transpose,
            data.len()
        ));
        self.uniform_matrices.push((location.cloned(), data.to_vec()));
    }
}
