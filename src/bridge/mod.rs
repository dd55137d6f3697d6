//! Import bridge
//!
//! A guest module compiled against libmatoya imports a fixed set of host
//! functions. `Bridge` implements all of them on top of a `Platform`:
//!
//! - graphics calls go through `Graphics` to the platform's GL context
//! - `wasi_snapshot_preview1` calls go to the `Syscalls` shim
//! - window calls reach the platform directly
//! - `web_raf` arms the `FrameDriver`
//!
//! Every import enters through `Bridge::call`, which matches on `Import`
//! exhaustively. The guest passes bare integers and floats; arguments are
//! decoded positionally and a missing one reads as 0.

pub mod abi;
pub mod error;
pub mod frame;
pub mod graphics;
pub mod handles;
pub mod memory;
pub mod syscalls;
pub mod textures;
mod window;

#[cfg(test)]
mod tests;

pub use abi::{Import, ValType, Value};
pub use error::{BridgeError, BridgeResult};
pub use frame::{FrameCallback, FrameDriver, FrameState, TickOutcome};
pub use handles::{Handle, HandleTable};

use crate::config::BridgeConfig;
use crate::platform::{DroppedFile, Platform};
use abi::{Args, errno};
use graphics::{GlBackend, Graphics};
use memory::MemoryView;
use syscalls::Syscalls;

/// Host state behind every import of one guest instance
pub struct Bridge<P: Platform> {
    platform: P,
    config: BridgeConfig,
    /// Bound once the guest is instantiated
    memory: Option<P::Memory>,
    /// Created by `web_create_canvas`
    graphics: Option<Graphics<P::Gl>>,
    syscalls: Syscalls,
    frame: FrameDriver,
}

fn unit(result: BridgeResult<()>) -> BridgeResult<Option<Value>> {
    result.map(|()| None)
}

fn int(result: BridgeResult<i32>) -> BridgeResult<Option<Value>> {
    result.map(|v| Some(Value::I32(v)))
}

impl<P: Platform> Bridge<P> {
    pub fn new(platform: P, config: BridgeConfig) -> Self {
        let syscalls = Syscalls::new(config.trace_stubs);
        Self {
            platform,
            config,
            memory: None,
            graphics: None,
            syscalls,
            frame: FrameDriver::new(),
        }
    }

    /// Attach the guest's exported memory
    pub fn bind_memory(&mut self, memory: P::Memory) {
        self.memory = Some(memory);
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn graphics(&self) -> Option<&Graphics<P::Gl>> {
        self.graphics.as_ref()
    }

    pub fn graphics_mut(&mut self) -> Option<&mut Graphics<P::Gl>> {
        self.graphics.as_mut()
    }

    pub fn frame(&self) -> &FrameDriver {
        &self.frame
    }

    pub fn frame_mut(&mut self) -> &mut FrameDriver {
        &mut self.frame
    }

    /// Code the guest passed to `proc_exit`, if it exited
    pub fn exit_code(&self) -> Option<i32> {
        self.syscalls.exit_code()
    }

    /// A fresh view of guest memory
    pub fn memory(&mut self) -> BridgeResult<MemoryView<'_, P::Memory>> {
        Self::view(&mut self.memory)
    }

    fn view(memory: &mut Option<P::Memory>) -> BridgeResult<MemoryView<'_, P::Memory>> {
        memory
            .as_mut()
            .map(MemoryView::new)
            .ok_or(BridgeError::MissingExport {
                name: abi::exports::MEMORY,
            })
    }

    /// Files dropped onto the page since the last tick
    pub fn take_dropped_files(&mut self) -> Vec<DroppedFile> {
        self.platform.take_dropped_files()
    }

    fn with_gl<R>(
        &mut self,
        import: Import,
        f: impl FnOnce(&mut Graphics<P::Gl>, &mut MemoryView<'_, P::Memory>, &mut P) -> BridgeResult<R>,
    ) -> BridgeResult<R> {
        let graphics = self
            .graphics
            .as_mut()
            .ok_or(BridgeError::NoGraphicsContext {
                import: import.name(),
            })?;
        let mut mem = Self::view(&mut self.memory)?;
        f(graphics, &mut mem, &mut self.platform)
    }

    fn with_sys<R>(
        &mut self,
        f: impl FnOnce(&mut Syscalls, &mut MemoryView<'_, P::Memory>, &mut P) -> BridgeResult<R>,
    ) -> BridgeResult<R> {
        let mut mem = Self::view(&mut self.memory)?;
        f(&mut self.syscalls, &mut mem, &mut self.platform)
    }

    /// Service one import
    ///
    /// `Ok` carries the import's result, if its signature has one. `Err` must
    /// unwind the guest: `Unwind` and `Exit` are the guest's own control
    /// flow, anything else is a defect in the call.
    pub fn call(&mut self, import: Import, values: &[Value]) -> BridgeResult<Option<Value>> {
        let a = Args(values);

        let result = match import {
            // ===== Framebuffers =====
            Import::GlGenFramebuffers => {
                unit(self.with_gl(import, |g, m, _| g.gen_framebuffers(m, a.i32(0), a.u32(1))))
            }
            Import::GlDeleteFramebuffers => {
                unit(self.with_gl(import, |g, m, _| g.delete_framebuffers(m, a.i32(0), a.u32(1))))
            }
            Import::GlBindFramebuffer => {
                unit(self.with_gl(import, |g, _, _| g.bind_framebuffer(a.u32(0), a.handle(1))))
            }
            Import::GlBlitFramebuffer => unit(self.with_gl(import, |g, _, _| {
                g.backend().blit_framebuffer(
                    [a.i32(0), a.i32(1), a.i32(2), a.i32(3)],
                    [a.i32(4), a.i32(5), a.i32(6), a.i32(7)],
                    a.u32(8),
                    a.u32(9),
                );
                Ok(())
            })),
            Import::GlFramebufferTexture2D => unit(self.with_gl(import, |g, _, _| {
                g.framebuffer_texture_2d(a.u32(0), a.u32(1), a.u32(2), a.handle(3), a.i32(4))
            })),

            // ===== State =====
            Import::GlEnable => unit(self.with_gl(import, |g, _, _| {
                g.backend().enable(a.u32(0));
                Ok(())
            })),
            Import::GlIsEnabled => int(self.with_gl(import, |g, _, _| {
                Ok(g.backend().is_enabled(a.u32(0)) as i32)
            })),
            Import::GlDisable => unit(self.with_gl(import, |g, _, _| {
                g.backend().disable(a.u32(0));
                Ok(())
            })),
            Import::GlViewport => unit(self.with_gl(import, |g, _, _| {
                g.backend().viewport(a.i32(0), a.i32(1), a.i32(2), a.i32(3));
                Ok(())
            })),
            Import::GlScissor => unit(self.with_gl(import, |g, _, _| {
                g.backend().scissor(a.i32(0), a.i32(1), a.i32(2), a.i32(3));
                Ok(())
            })),
            Import::GlGetIntegerv => {
                unit(self.with_gl(import, |g, m, _| g.get_integerv(m, a.u32(0), a.u32(1))))
            }
            Import::GlGetFloatv => {
                unit(self.with_gl(import, |g, m, _| g.get_floatv(m, a.u32(0), a.u32(1))))
            }
            Import::GlGetError => {
                int(self.with_gl(import, |g, _, _| Ok(g.backend().get_error() as i32)))
            }
            Import::GlFinish => unit(self.with_gl(import, |g, _, _| {
                g.backend().finish();
                Ok(())
            })),
            Import::GlClear => unit(self.with_gl(import, |g, _, _| {
                g.backend().clear(a.u32(0));
                Ok(())
            })),
            Import::GlClearColor => unit(self.with_gl(import, |g, _, _| {
                g.backend().clear_color(a.f32(0), a.f32(1), a.f32(2), a.f32(3));
                Ok(())
            })),
            Import::GlBlendFunc => unit(self.with_gl(import, |g, _, _| {
                g.backend().blend_func(a.u32(0), a.u32(1));
                Ok(())
            })),
            Import::GlBlendEquation => unit(self.with_gl(import, |g, _, _| {
                g.backend().blend_equation(a.u32(0));
                Ok(())
            })),
            Import::GlBlendEquationSeparate => unit(self.with_gl(import, |g, _, _| {
                g.backend().blend_equation_separate(a.u32(0), a.u32(1));
                Ok(())
            })),
            Import::GlBlendFuncSeparate => unit(self.with_gl(import, |g, _, _| {
                g.backend()
                    .blend_func_separate(a.u32(0), a.u32(1), a.u32(2), a.u32(3));
                Ok(())
            })),

            // ===== Textures =====
            Import::GlGenTextures => {
                unit(self.with_gl(import, |g, m, _| g.gen_textures(m, a.i32(0), a.u32(1))))
            }
            Import::GlDeleteTextures => {
                unit(self.with_gl(import, |g, m, _| g.delete_textures(m, a.i32(0), a.u32(1))))
            }
            Import::GlBindTexture => {
                unit(self.with_gl(import, |g, _, _| g.bind_texture(a.u32(0), a.handle(1))))
            }
            Import::GlActiveTexture => unit(self.with_gl(import, |g, _, _| {
                g.active_texture(a.u32(0));
                Ok(())
            })),
            Import::GlTexParameteri => unit(self.with_gl(import, |g, _, _| {
                g.backend().tex_parameter_i(a.u32(0), a.u32(1), a.i32(2));
                Ok(())
            })),
            Import::GlTexImage2D => unit(self.with_gl(import, |g, m, _| {
                g.tex_image_2d(
                    m,
                    a.u32(0),
                    a.i32(1),
                    a.i32(2),
                    a.i32(3),
                    a.i32(4),
                    a.i32(5),
                    a.u32(6),
                    a.u32(7),
                    a.u32(8),
                )
            })),
            Import::GlTexSubImage2D => unit(self.with_gl(import, |g, m, _| {
                g.tex_sub_image_2d(
                    m,
                    a.u32(0),
                    a.i32(1),
                    a.i32(2),
                    a.i32(3),
                    a.i32(4),
                    a.i32(5),
                    a.u32(6),
                    a.u32(7),
                    a.u32(8),
                )
            })),
            Import::GlGetTexLevelParameteriv => unit(self.with_gl(import, |g, m, _| {
                g.get_tex_level_parameteriv(m, a.u32(0), a.i32(1), a.u32(2), a.u32(3))
            })),

            // ===== Buffers and vertex state =====
            Import::GlGenBuffers => {
                unit(self.with_gl(import, |g, m, _| g.gen_buffers(m, a.i32(0), a.u32(1))))
            }
            Import::GlDeleteBuffers => {
                unit(self.with_gl(import, |g, m, _| g.delete_buffers(m, a.i32(0), a.u32(1))))
            }
            Import::GlBindBuffer => {
                unit(self.with_gl(import, |g, _, _| g.bind_buffer(a.u32(0), a.handle(1))))
            }
            Import::GlBufferData => unit(self.with_gl(import, |g, m, _| {
                g.buffer_data(m, a.u32(0), a.i32(1), a.u32(2), a.u32(3))
            })),
            Import::GlEnableVertexAttribArray => unit(self.with_gl(import, |g, _, _| {
                g.backend().enable_vertex_attrib_array(a.u32(0));
                Ok(())
            })),
            Import::GlVertexAttribPointer => unit(self.with_gl(import, |g, _, _| {
                g.backend().vertex_attrib_pointer(
                    a.u32(0),
                    a.i32(1),
                    a.u32(2),
                    a.bool(3),
                    a.i32(4),
                    a.i32(5),
                );
                Ok(())
            })),
            Import::GlDrawElements => unit(self.with_gl(import, |g, _, _| {
                g.backend()
                    .draw_elements(a.u32(0), a.i32(1), a.u32(2), a.i32(3));
                Ok(())
            })),

            // ===== Shaders and programs =====
            Import::GlCreateShader => int(self.with_gl(import, |g, _, _| {
                Ok(g.create_shader(a.u32(0)).0 as i32)
            })),
            Import::GlShaderSource => unit(self.with_gl(import, |g, m, _| {
                g.shader_source(m, a.handle(0), a.i32(1), a.u32(2), a.u32(3))
            })),
            Import::GlCompileShader => {
                unit(self.with_gl(import, |g, _, _| g.compile_shader(a.handle(0))))
            }
            Import::GlGetShaderiv => unit(self.with_gl(import, |g, m, p| {
                g.get_shaderiv(m, a.handle(0), a.u32(1), a.u32(2), &mut |log: &str| p.warn(log))
            })),
            Import::GlGetShaderInfoLog => unit(self.with_gl(import, |g, m, _| {
                g.get_shader_info_log(m, a.handle(0), a.i32(1), a.u32(2), a.u32(3))
            })),
            Import::GlDeleteShader => {
                unit(self.with_gl(import, |g, _, _| g.delete_shader(a.handle(0))))
            }
            Import::GlCreateProgram => {
                int(self.with_gl(import, |g, _, _| Ok(g.create_program().0 as i32)))
            }
            Import::GlAttachShader => {
                unit(self.with_gl(import, |g, _, _| g.attach_shader(a.handle(0), a.handle(1))))
            }
            Import::GlDetachShader => {
                unit(self.with_gl(import, |g, _, _| g.detach_shader(a.handle(0), a.handle(1))))
            }
            Import::GlLinkProgram => {
                unit(self.with_gl(import, |g, _, _| g.link_program(a.handle(0))))
            }
            Import::GlGetProgramiv => unit(self.with_gl(import, |g, m, p| {
                g.get_programiv(m, a.handle(0), a.u32(1), a.u32(2), &mut |log: &str| p.warn(log))
            })),
            Import::GlUseProgram => {
                unit(self.with_gl(import, |g, _, _| g.use_program(a.handle(0))))
            }
            Import::GlDeleteProgram => {
                unit(self.with_gl(import, |g, _, _| g.delete_program(a.handle(0))))
            }
            Import::GlGetAttribLocation => int(self.with_gl(import, |g, m, _| {
                g.get_attrib_location(m, a.handle(0), a.u32(1))
            })),
            Import::GlGetUniformLocation => int(self.with_gl(import, |g, m, _| {
                g.get_uniform_location(m, a.handle(0), a.u32(1))
            })),
            Import::GlUniform1i => {
                unit(self.with_gl(import, |g, _, _| g.uniform1i(a.i32(0), a.i32(1))))
            }
            Import::GlUniformMatrix4fv => unit(self.with_gl(import, |g, m, _| {
                g.uniform_matrix4fv(m, a.i32(0), a.i32(1), a.bool(2), a.u32(3))
            })),

            // ===== Audio =====
            Import::AudioCreate => int(Ok(self.audio_stub(import.name(), 0))),
            Import::AudioDestroy
            | Import::AudioPlay
            | Import::AudioStop
            | Import::AudioQueue => {
                self.audio_stub(import.name(), 0);
                Ok(None)
            }
            Import::AudioIsPlaying | Import::AudioGetQueuedFrames => {
                int(Ok(self.audio_stub(import.name(), 0)))
            }

            // ===== Window =====
            Import::WebGetSize => unit(self.web_get_size(a.u32(0), a.u32(1))),
            Import::WebResizeCanvas => {
                self.web_resize_canvas();
                Ok(None)
            }
            Import::WebSetTitle => unit(self.web_set_title(a.u32(0))),
            Import::WebCreateCanvas => unit(self.web_create_canvas()),
            Import::WebRegisterDrag => unit(self.web_register_drag()),
            Import::WebRaf => Err(self.web_raf(a.u32(0), a.u32(1))),

            // ===== Syscalls =====
            Import::ArgsGet | Import::EnvironGet => {
                int(Ok(self.syscalls.list_get(&mut self.platform, import.name())))
            }
            Import::ArgsSizesGet | Import::EnvironSizesGet => int(self.with_sys(|s, m, p| {
                s.sizes_get(m, p, import.name(), a.u32(0), a.u32(1))
            })),
            Import::ClockTimeGet => {
                int(self.with_sys(|s, m, p| s.clock_time_get(m, p, a.u32(2))))
            }
            Import::FdClose => int(Ok(self.syscalls.fd_close(&mut self.platform, a.i32(0)))),
            Import::FdFdstatGet => {
                int(self.with_sys(|s, m, p| s.fd_fdstat_get(m, p, a.i32(0), a.u32(1))))
            }
            Import::FdFdstatSetFlags => int(Ok(self.syscalls.refuse(
                &mut self.platform,
                import.name(),
                errno::NOSYS,
            ))),
            Import::FdPrestatGet | Import::FdReaddir => int(Ok(self.syscalls.refuse(
                &mut self.platform,
                import.name(),
                errno::BADF,
            ))),
            Import::FdPrestatDirName => int(Ok(self.syscalls.refuse(
                &mut self.platform,
                import.name(),
                errno::INVAL,
            ))),
            Import::FdRead => {
                int(self.with_sys(|s, m, p| s.fd_read(m, p, a.i32(0), a.u32(3))))
            }
            Import::FdSeek => int(Ok(self.syscalls.fd_seek(&mut self.platform, a.i32(0)))),
            Import::FdWrite => int(self.with_sys(|s, m, p| {
                s.fd_write(m, p, a.i32(0), a.u32(1), a.u32(2), a.u32(3))
            })),
            Import::PathCreateDirectory | Import::PathOpen | Import::PathReadlink => {
                int(Ok(self.syscalls.refuse(
                    &mut self.platform,
                    import.name(),
                    errno::NOTCAPABLE,
                )))
            }
            Import::PollOneoff => int(self.with_sys(|s, m, p| s.poll_oneoff(m, p, a.u32(3)))),
            Import::ProcExit => {
                self.frame.halt();
                Err(self.syscalls.proc_exit(a.i32(0)))
            }
        };

        if let Err(e) = &result {
            if !e.is_control_flow() {
                crate::console_error!("[bridge] {} failed: {}", import, e);
            }
        }
        result
    }
}
