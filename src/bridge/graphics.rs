//! Graphics façade
//!
//! Translates the guest's GL ES 2/3 style calls (integer names, pointers into
//! linear memory) into calls on a `GlBackend`, which owns real host objects.
//! Every object the guest can name lives in one of the `ObjectTables`; a
//! handle of one class can never be resolved through another class's table
//! because each table is typed by the backend's object type for that class.
//!
//! Host errors are not intercepted here. The guest polls them through
//! `glGetError`, except for shader compile and program link status, which
//! are reported as soon as the guest asks for them.

use super::abi::gl;
use super::error::BridgeResult;
use super::handles::{Handle, HandleTable};
use super::memory::{LinearMemory, MemoryView, latin1};
use super::textures::TextureState;
use crate::console_warn;

/// Value of a host state query, before it is written back to the guest
pub enum Parameter<G: GlBackend + ?Sized> {
    /// Unknown or unsupported query
    None,
    Int(i32),
    Float(f32),
    Bool(bool),
    Ints(Vec<i32>),
    Floats(Vec<f32>),
    Bools(Vec<bool>),
    Framebuffer(G::Framebuffer),
    Texture(G::Texture),
    Buffer(G::Buffer),
    Program(G::Program),
}

/// Contents for `glBufferData`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferData<'a> {
    /// Allocate without initializing
    Size(i32),
    Bytes(&'a [u8]),
}

/// A WebGL2-shaped rendering context
///
/// Object types must compare equal only when they name the same host
/// object, since queries that return objects are mapped back to handles by
/// comparison.
pub trait GlBackend {
    type Framebuffer: Clone + PartialEq;
    type Texture: Clone + PartialEq;
    type Buffer: Clone + PartialEq;
    type Shader: Clone + PartialEq;
    type Program: Clone + PartialEq;
    type UniformLocation: Clone;

    // Framebuffers
    fn create_framebuffer(&mut self) -> Option<Self::Framebuffer>;
    fn delete_framebuffer(&mut self, framebuffer: &Self::Framebuffer);
    fn bind_framebuffer(&mut self, target: u32, framebuffer: Option<&Self::Framebuffer>);
    fn blit_framebuffer(&mut self, src: [i32; 4], dst: [i32; 4], mask: u32, filter: u32);
    fn framebuffer_texture_2d(
        &mut self,
        target: u32,
        attachment: u32,
        textarget: u32,
        texture: Option<&Self::Texture>,
        level: i32,
    );

    // State
    fn enable(&mut self, cap: u32);
    fn disable(&mut self, cap: u32);
    fn is_enabled(&self, cap: u32) -> bool;
    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32);
    fn scissor(&mut self, x: i32, y: i32, width: i32, height: i32);
    fn get_parameter(&self, pname: u32) -> Parameter<Self>;
    fn get_error(&mut self) -> u32;
    fn finish(&mut self);
    fn clear(&mut self, mask: u32);
    fn clear_color(&mut self, r: f32, g: f32, b: f32, a: f32);
    fn blend_func(&mut self, sfactor: u32, dfactor: u32);
    fn blend_func_separate(&mut self, src_rgb: u32, dst_rgb: u32, src_alpha: u32, dst_alpha: u32);
    fn blend_equation(&mut self, mode: u32);
    fn blend_equation_separate(&mut self, mode_rgb: u32, mode_alpha: u32);

    // Textures
    fn create_texture(&mut self) -> Option<Self::Texture>;
    fn delete_texture(&mut self, texture: &Self::Texture);
    fn bind_texture(&mut self, target: u32, texture: Option<&Self::Texture>);
    fn active_texture(&mut self, texture: u32);
    fn tex_parameter_i(&mut self, target: u32, pname: u32, param: i32);
    #[allow(clippy::too_many_arguments)]
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
    );
    #[allow(clippy::too_many_arguments)]
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
    );

    // Buffers and vertex state
    fn create_buffer(&mut self) -> Option<Self::Buffer>;
    fn delete_buffer(&mut self, buffer: &Self::Buffer);
    fn bind_buffer(&mut self, target: u32, buffer: Option<&Self::Buffer>);
    fn buffer_data(&mut self, target: u32, data: BufferData<'_>, usage: u32);
    fn enable_vertex_attrib_array(&mut self, index: u32);
    fn vertex_attrib_pointer(
        &mut self,
        index: u32,
        size: i32,
        ty: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    );
    fn draw_elements(&mut self, mode: u32, count: i32, ty: u32, offset: i32);

    // Shaders and programs
    fn create_shader(&mut self, ty: u32) -> Option<Self::Shader>;
    fn shader_source(&mut self, shader: &Self::Shader, source: &str);
    fn compile_shader(&mut self, shader: &Self::Shader);
    fn shader_parameter(&self, shader: &Self::Shader, pname: u32) -> Parameter<Self>;
    fn shader_info_log(&self, shader: &Self::Shader) -> String;
    fn delete_shader(&mut self, shader: &Self::Shader);
    fn create_program(&mut self) -> Option<Self::Program>;
    fn attach_shader(&mut self, program: &Self::Program, shader: &Self::Shader);
    fn detach_shader(&mut self, program: &Self::Program, shader: &Self::Shader);
    fn link_program(&mut self, program: &Self::Program);
    fn program_parameter(&self, program: &Self::Program, pname: u32) -> Parameter<Self>;
    fn program_info_log(&self, program: &Self::Program) -> String;
    fn use_program(&mut self, program: Option<&Self::Program>);
    fn delete_program(&mut self, program: &Self::Program);
    fn get_attrib_location(&self, program: &Self::Program, name: &str) -> i32;
    fn get_uniform_location(
        &self,
        program: &Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation>;
    fn uniform1i(&mut self, location: Option<&Self::UniformLocation>, value: i32);
    fn uniform_matrix4fv(
        &mut self,
        location: Option<&Self::UniformLocation>,
        transpose: bool,
        data: &[f32],
    );
}

/// A uniform location and the program it was looked up in
#[derive(Debug, Clone)]
pub struct UniformEntry<L> {
    pub program: Handle,
    pub name: String,
    pub location: L,
}

/// One handle table per object class
pub struct ObjectTables<G: GlBackend> {
    pub framebuffers: HandleTable<G::Framebuffer>,
    pub textures: HandleTable<G::Texture>,
    pub buffers: HandleTable<G::Buffer>,
    pub shaders: HandleTable<G::Shader>,
    pub programs: HandleTable<G::Program>,
    pub uniform_locations: HandleTable<UniformEntry<G::UniformLocation>>,
}

impl<G: GlBackend> ObjectTables<G> {
    pub fn new() -> Self {
        Self {
            framebuffers: HandleTable::new("framebuffer"),
            textures: HandleTable::new("texture"),
            buffers: HandleTable::new("buffer"),
            shaders: HandleTable::new("shader"),
            programs: HandleTable::new("program"),
            uniform_locations: HandleTable::new("uniform location"),
        }
    }
}

impl<G: GlBackend> Default for ObjectTables<G> {
    fn default() -> Self {
        Self::new()
    }
}

/// Rendering context plus everything the guest can name in it
pub struct Graphics<G: GlBackend> {
    gl: G,
    objects: ObjectTables<G>,
    textures: TextureState,
}

fn count(n: i32) -> u32 {
    n.max(0) as u32
}

fn generate<T, M: LinearMemory + ?Sized>(
    mem: &mut MemoryView<'_, M>,
    table: &mut HandleTable<T>,
    n: i32,
    ids: u32,
    mut create: impl FnMut() -> Option<T>,
) -> BridgeResult<()> {
    mem.check(ids, count(n) as u64 * 4)?;
    let handles: Vec<u32> = (0..count(n))
        .map(|_| match create() {
            Some(object) => table.allocate(object).0,
            None => {
                console_warn!("[gl] context refused to create a {}", table.class());
                Handle::NULL.0
            }
        })
        .collect();
    mem.write_u32s(ids, &handles)
}

fn delete<T, M: LinearMemory + ?Sized>(
    mem: &MemoryView<'_, M>,
    table: &mut HandleTable<T>,
    n: i32,
    ids: u32,
    mut destroy: impl FnMut(Handle, T),
) -> BridgeResult<()> {
    for raw in mem.read_u32s(ids, count(n))? {
        let handle = Handle(raw);
        if handle.is_null() {
            continue;
        }
        destroy(handle, table.release(handle)?);
    }
    Ok(())
}

impl<G: GlBackend> Graphics<G> {
    pub fn new(gl: G) -> Self {
        Self {
            gl,
            objects: ObjectTables::new(),
            textures: TextureState::new(),
        }
    }

    /// The context, for calls that take no object names
    pub fn backend(&mut self) -> &mut G {
        &mut self.gl
    }

    pub fn objects(&self) -> &ObjectTables<G> {
        &self.objects
    }

    pub fn textures(&self) -> &TextureState {
        &self.textures
    }

    // ===== Framebuffers =====

    pub fn gen_framebuffers<M: LinearMemory + ?Sized>(
        &mut self,
        mem: &mut MemoryView<'_, M>,
        n: i32,
        ids: u32,
    ) -> BridgeResult<()> {
        generate(mem, &mut self.objects.framebuffers, n, ids, || {
            self.gl.create_framebuffer()
        })
    }

    pub fn delete_framebuffers<M: LinearMemory + ?Sized>(
        &mut self,
        mem: &MemoryView<'_, M>,
        n: i32,
        ids: u32,
    ) -> BridgeResult<()> {
        delete(mem, &mut self.objects.framebuffers, n, ids, |_, fb| {
            self.gl.delete_framebuffer(&fb)
        })
    }

    pub fn bind_framebuffer(&mut self, target: u32, framebuffer: Handle) -> BridgeResult<()> {
        let framebuffer = self.objects.framebuffers.resolve_optional(framebuffer)?;
        self.gl.bind_framebuffer(target, framebuffer);
        Ok(())
    }

    pub fn framebuffer_texture_2d(
        &mut self,
        target: u32,
        attachment: u32,
        textarget: u32,
        texture: Handle,
        level: i32,
    ) -> BridgeResult<()> {
        let texture = self.objects.textures.resolve_optional(texture)?;
        self.gl
            .framebuffer_texture_2d(target, attachment, textarget, texture, level);
        Ok(())
    }

    // ===== State queries =====

    /// Flatten a query result into numbers, mapping objects back to handles
    fn parameter_values(&self, parameter: Parameter<G>) -> Vec<f64> {
        let handle = |h: Option<Handle>| h.unwrap_or(Handle::NULL).0 as f64;
        match parameter {
            Parameter::None => vec![0.0],
            Parameter::Int(v) => vec![v as f64],
            Parameter::Float(v) => vec![v as f64],
            Parameter::Bool(v) => vec![v as u8 as f64],
            Parameter::Ints(v) => v.into_iter().map(|x| x as f64).collect(),
            Parameter::Floats(v) => v.into_iter().map(|x| x as f64).collect(),
            Parameter::Bools(v) => v.into_iter().map(|x| x as u8 as f64).collect(),
            Parameter::Framebuffer(fb) => vec![handle(self.objects.framebuffers.handle_of(&fb))],
            Parameter::Texture(t) => vec![handle(self.objects.textures.handle_of(&t))],
            Parameter::Buffer(b) => vec![handle(self.objects.buffers.handle_of(&b))],
            Parameter::Program(p) => vec![handle(self.objects.programs.handle_of(&p))],
        }
    }

    pub fn get_integerv<M: LinearMemory + ?Sized>(
        &mut self,
        mem: &mut MemoryView<'_, M>,
        pname: u32,
        data: u32,
    ) -> BridgeResult<()> {
        let values: Vec<i32> = self
            .parameter_values(self.gl.get_parameter(pname))
            .into_iter()
            .map(|v| v.round() as i32)
            .collect();
        mem.write_i32s(data, &values)
    }

    pub fn get_floatv<M: LinearMemory + ?Sized>(
        &mut self,
        mem: &mut MemoryView<'_, M>,
        pname: u32,
        data: u32,
    ) -> BridgeResult<()> {
        let values: Vec<f32> = self
            .parameter_values(self.gl.get_parameter(pname))
            .into_iter()
            .map(|v| v as f32)
            .collect();
        mem.write_f32s(data, &values)
    }

    // ===== Textures =====

    pub fn gen_textures<M: LinearMemory + ?Sized>(
        &mut self,
        mem: &mut MemoryView<'_, M>,
        n: i32,
        ids: u32,
    ) -> BridgeResult<()> {
        generate(mem, &mut self.objects.textures, n, ids, || {
            self.gl.create_texture()
        })
    }

    pub fn delete_textures<M: LinearMemory + ?Sized>(
        &mut self,
        mem: &MemoryView<'_, M>,
        n: i32,
        ids: u32,
    ) -> BridgeResult<()> {
        delete(mem, &mut self.objects.textures, n, ids, |handle, t| {
            self.gl.delete_texture(&t);
            self.textures.forget(handle);
        })
    }

    pub fn bind_texture(&mut self, target: u32, texture: Handle) -> BridgeResult<()> {
        let object = self.objects.textures.resolve_optional(texture)?;
        self.gl.bind_texture(target, object);
        self.textures.bind(target, texture);
        Ok(())
    }

    pub fn active_texture(&mut self, texture: u32) {
        self.gl.active_texture(texture);
        self.textures.set_active_unit(texture);
    }

    pub fn get_tex_level_parameteriv<M: LinearMemory + ?Sized>(
        &mut self,
        mem: &mut MemoryView<'_, M>,
        target: u32,
        level: i32,
        pname: u32,
        params: u32,
    ) -> BridgeResult<()> {
        let value = self.textures.level_parameter(target, level, pname);
        mem.write_i32(params, value)
    }

    /// Exact upload bytes at `data`, or `None` for a null pointer
    fn pixels<M: LinearMemory + ?Sized>(
        mem: &MemoryView<'_, M>,
        data: u32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
    ) -> BridgeResult<Option<Vec<u8>>> {
        if data == 0 {
            return Ok(None);
        }
        match gl::image_size(width.max(0) as u32, height.max(0) as u32, format, ty) {
            Some(len) => mem.read_bytes(data, len as u32).map(Some),
            None => {
                console_warn!(
                    "[gl] unknown pixel format 0x{:X}/0x{:X}, uploading no data",
                    format,
                    ty
                );
                Ok(None)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn tex_image_2d<M: LinearMemory + ?Sized>(
        &mut self,
        mem: &MemoryView<'_, M>,
        target: u32,
        level: i32,
        internal_format: i32,
        width: i32,
        height: i32,
        border: i32,
        format: u32,
        ty: u32,
        data: u32,
    ) -> BridgeResult<()> {
        let pixels = Self::pixels(mem, data, width, height, format, ty)?;
        self.gl.tex_image_2d(
            target,
            level,
            internal_format,
            width,
            height,
            border,
            format,
            ty,
            pixels.as_deref(),
        );
        self.textures
            .record_upload(target, level, width.max(0) as u32, height.max(0) as u32);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn tex_sub_image_2d<M: LinearMemory + ?Sized>(
        &mut self,
        mem: &MemoryView<'_, M>,
        target: u32,
        level: i32,
        xoffset: i32,
        yoffset: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        data: u32,
    ) -> BridgeResult<()> {
        let pixels = Self::pixels(mem, data, width, height, format, ty)?;
        self.gl.tex_sub_image_2d(
            target,
            level,
            xoffset,
            yoffset,
            width,
            height,
            format,
            ty,
            pixels.as_deref(),
        );
        Ok(())
    }

    // ===== Buffers =====

    pub fn gen_buffers<M: LinearMemory + ?Sized>(
        &mut self,
        mem: &mut MemoryView<'_, M>,
        n: i32,
        ids: u32,
    ) -> BridgeResult<()> {
        generate(mem, &mut self.objects.buffers, n, ids, || {
            self.gl.create_buffer()
        })
    }

    pub fn delete_buffers<M: LinearMemory + ?Sized>(
        &mut self,
        mem: &MemoryView<'_, M>,
        n: i32,
        ids: u32,
    ) -> BridgeResult<()> {
        delete(mem, &mut self.objects.buffers, n, ids, |_, b| {
            self.gl.delete_buffer(&b)
        })
    }

    pub fn bind_buffer(&mut self, target: u32, buffer: Handle) -> BridgeResult<()> {
        let buffer = self.objects.buffers.resolve_optional(buffer)?;
        self.gl.bind_buffer(target, buffer);
        Ok(())
    }

    pub fn buffer_data<M: LinearMemory + ?Sized>(
        &mut self,
        mem: &MemoryView<'_, M>,
        target: u32,
        size: i32,
        data: u32,
        usage: u32,
    ) -> BridgeResult<()> {
        if data == 0 {
            self.gl.buffer_data(target, BufferData::Size(size), usage);
            return Ok(());
        }
        let bytes = mem.read_bytes(data, count(size))?;
        self.gl.buffer_data(target, BufferData::Bytes(&bytes), usage);
        Ok(())
    }

    // ===== Shaders =====

    pub fn create_shader(&mut self, ty: u32) -> Handle {
        match self.gl.create_shader(ty) {
            Some(shader) => self.objects.shaders.allocate(shader),
            None => Handle::NULL,
        }
    }

    /// Concatenate `count` source fragments in order
    ///
    /// With a null `lengths` array, or a negative entry in it, a fragment is
    /// NUL-terminated; otherwise the entry is its exact length.
    pub fn shader_source<M: LinearMemory + ?Sized>(
        &mut self,
        mem: &MemoryView<'_, M>,
        shader: Handle,
        n: i32,
        strings: u32,
        lengths: u32,
    ) -> BridgeResult<()> {
        let shader = self.objects.shaders.resolve(shader)?;
        let pointers = mem.read_u32s(strings, count(n))?;
        let lengths = if lengths == 0 {
            None
        } else {
            Some(mem.read_u32s(lengths, count(n))?)
        };

        let mut source = Vec::new();
        for (i, &ptr) in pointers.iter().enumerate() {
            let len = lengths.as_ref().map(|l| l[i] as i32).unwrap_or(-1);
            if len < 0 {
                source.extend(mem.c_bytes(ptr)?);
            } else {
                source.extend(mem.read_bytes(ptr, len as u32)?);
            }
        }

        self.gl.shader_source(shader, &latin1(&source));
        Ok(())
    }

    pub fn compile_shader(&mut self, shader: Handle) -> BridgeResult<()> {
        let shader = self.objects.shaders.resolve(shader)?;
        self.gl.compile_shader(shader);
        Ok(())
    }

    /// `GL_COMPILE_STATUS` as 0/1; a failed compile hands its info log to
    /// `warn` right away. Other pnames read as 0.
    pub fn get_shaderiv<M: LinearMemory + ?Sized>(
        &mut self,
        mem: &mut MemoryView<'_, M>,
        shader: Handle,
        pname: u32,
        params: u32,
        warn: &mut dyn FnMut(&str),
    ) -> BridgeResult<()> {
        let shader = self.objects.shaders.resolve(shader)?;
        let value = match pname {
            gl::COMPILE_STATUS => {
                let compiled = self.parameter_values(self.gl.shader_parameter(shader, pname));
                let compiled = compiled.first().is_some_and(|v| *v != 0.0);
                if !compiled {
                    warn(&self.gl.shader_info_log(shader));
                }
                compiled as i32
            }
            _ => 0,
        };
        mem.write_i32(params, value)
    }

    /// The log was already surfaced by `get_shaderiv`; report it as empty
    pub fn get_shader_info_log<M: LinearMemory + ?Sized>(
        &mut self,
        mem: &mut MemoryView<'_, M>,
        shader: Handle,
        buf_size: i32,
        length: u32,
        log: u32,
    ) -> BridgeResult<()> {
        self.objects.shaders.resolve(shader)?;
        if length != 0 {
            mem.write_i32(length, 0)?;
        }
        if log != 0 && buf_size > 0 {
            mem.write_bytes(log, &[0])?;
        }
        Ok(())
    }

    pub fn delete_shader(&mut self, shader: Handle) -> BridgeResult<()> {
        if shader.is_null() {
            return Ok(());
        }
        let shader = self.objects.shaders.release(shader)?;
        self.gl.delete_shader(&shader);
        Ok(())
    }

    // ===== Programs =====

    pub fn create_program(&mut self) -> Handle {
        match self.gl.create_program() {
            Some(program) => self.objects.programs.allocate(program),
            None => Handle::NULL,
        }
    }

    pub fn attach_shader(&mut self, program: Handle, shader: Handle) -> BridgeResult<()> {
        let program = self.objects.programs.resolve(program)?;
        let shader = self.objects.shaders.resolve(shader)?;
        self.gl.attach_shader(program, shader);
        Ok(())
    }

    pub fn detach_shader(&mut self, program: Handle, shader: Handle) -> BridgeResult<()> {
        let program = self.objects.programs.resolve(program)?;
        let shader = self.objects.shaders.resolve(shader)?;
        self.gl.detach_shader(program, shader);
        Ok(())
    }

    pub fn link_program(&mut self, program: Handle) -> BridgeResult<()> {
        let program = self.objects.programs.resolve(program)?;
        self.gl.link_program(program);
        Ok(())
    }

    /// `GL_LINK_STATUS` as 0/1, logging the program info log on failure;
    /// other pnames pass the host's value through
    pub fn get_programiv<M: LinearMemory + ?Sized>(
        &mut self,
        mem: &mut MemoryView<'_, M>,
        program: Handle,
        pname: u32,
        params: u32,
        warn: &mut dyn FnMut(&str),
    ) -> BridgeResult<()> {
        let program = self.objects.programs.resolve(program)?;
        let values = self.parameter_values(self.gl.program_parameter(program, pname));
        let value = values.first().copied().unwrap_or(0.0) as i32;

        if pname == gl::LINK_STATUS && value == 0 {
            warn(&self.gl.program_info_log(program));
        }
        mem.write_i32(params, value)
    }

    pub fn use_program(&mut self, program: Handle) -> BridgeResult<()> {
        let program = self.objects.programs.resolve_optional(program)?;
        self.gl.use_program(program);
        Ok(())
    }

    /// Releases the program together with every uniform location looked up
    /// in it
    pub fn delete_program(&mut self, program: Handle) -> BridgeResult<()> {
        if program.is_null() {
            return Ok(());
        }
        let object = self.objects.programs.release(program)?;
        self.objects
            .uniform_locations
            .drain_where(|entry| entry.program == program);
        self.gl.delete_program(&object);
        Ok(())
    }

    pub fn get_attrib_location<M: LinearMemory + ?Sized>(
        &mut self,
        mem: &MemoryView<'_, M>,
        program: Handle,
        name: u32,
    ) -> BridgeResult<i32> {
        let name = mem.string(name)?;
        let program = self.objects.programs.resolve(program)?;
        Ok(self.gl.get_attrib_location(program, &name))
    }

    /// Handle of a uniform location, or -1 if the program has no such
    /// uniform. Asking again for the same name returns the same handle.
    pub fn get_uniform_location<M: LinearMemory + ?Sized>(
        &mut self,
        mem: &MemoryView<'_, M>,
        program: Handle,
        name: u32,
    ) -> BridgeResult<i32> {
        let name = mem.string(name)?;
        let object = self.objects.programs.resolve(program)?;

        if let Some(existing) = self
            .objects
            .uniform_locations
            .find(|entry| entry.program == program && entry.name == name)
        {
            return Ok(existing.0 as i32);
        }

        Ok(match self.gl.get_uniform_location(object, &name) {
            Some(location) => {
                let entry = UniformEntry {
                    program,
                    name,
                    location,
                };
                self.objects.uniform_locations.allocate(entry).0 as i32
            }
            None => -1,
        })
    }

    /// -1 and 0 name no location; the call then has no effect
    fn uniform_location(&self, location: i32) -> BridgeResult<Option<&G::UniformLocation>> {
        if location <= 0 {
            return Ok(None);
        }
        self.objects
            .uniform_locations
            .resolve(Handle(location as u32))
            .map(|entry| Some(&entry.location))
    }

    pub fn uniform1i(&mut self, location: i32, value: i32) -> BridgeResult<()> {
        let location = self.uniform_location(location)?.cloned();
        self.gl.uniform1i(location.as_ref(), value);
        Ok(())
    }

    pub fn uniform_matrix4fv<M: LinearMemory + ?Sized>(
        &mut self,
        mem: &MemoryView<'_, M>,
        location: i32,
        n: i32,
        transpose: bool,
        value: u32,
    ) -> BridgeResult<()> {
        let data = mem.read_f32s(value, count(n).saturating_mul(16))?;
        let location = self.uniform_location(location)?.cloned();
        self.gl
            .uniform_matrix4fv(location.as_ref(), transpose, &data);
        Ok(())
    }
}
