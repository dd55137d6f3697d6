//! Import ABI: every function the guest may import, with its exact signature
//!
//! The guest is compiled against these prototypes and passes no type tags,
//! so a wrong arity or scalar width here silently corrupts the guest rather
//! than failing. `Import::ALL` is the single list the import object is built
//! from, and `Bridge::call` matches on it exhaustively.

use super::handles::Handle;
use std::fmt;

/// Import namespace for graphics, window and audio calls
pub const ENV_NAMESPACE: &str = "env";

/// Import namespace for the syscall shim
pub const WASI_NAMESPACE: &str = "wasi_snapshot_preview1";

/// Required and optional module exports
pub mod exports {
    pub const MEMORY: &str = "memory";
    pub const START: &str = "_start";
    pub const FUNCTION_TABLE: &str = "__indirect_function_table";
    /// Optional: used to hand dropped files to the module
    pub const MALLOC: &str = "malloc";
}

/// Standard file descriptors
pub mod fd {
    pub const STDIN: i32 = 0;
    pub const STDOUT: i32 = 1;
    pub const STDERR: i32 = 2;
}

/// WASI errno values returned by the shim
pub mod errno {
    pub const SUCCESS: i32 = 0;
    pub const BADF: i32 = 8;
    pub const INVAL: i32 = 28;
    pub const NOSYS: i32 = 52;
    pub const SPIPE: i32 = 70;
    pub const NOTCAPABLE: i32 = 76;
}

/// GL enums the bridge interprets itself; everything else passes through
pub mod gl {
    pub const TEXTURE_WIDTH: u32 = 0x1000;
    pub const TEXTURE_HEIGHT: u32 = 0x1001;

    pub const TEXTURE_2D: u32 = 0x0DE1;
    pub const TEXTURE_CUBE_MAP: u32 = 0x8513;
    pub const TEXTURE_CUBE_MAP_POSITIVE_X: u32 = 0x8515;
    pub const TEXTURE_CUBE_MAP_NEGATIVE_Z: u32 = 0x851A;
    pub const TEXTURE0: u32 = 0x84C0;

    pub const COMPILE_STATUS: u32 = 0x8B81;
    pub const LINK_STATUS: u32 = 0x8B82;

    // Pixel formats
    pub const ALPHA: u32 = 0x1906;
    pub const RGB: u32 = 0x1907;
    pub const RGBA: u32 = 0x1908;
    pub const LUMINANCE: u32 = 0x1909;
    pub const LUMINANCE_ALPHA: u32 = 0x190A;
    pub const RED: u32 = 0x1903;
    pub const RG: u32 = 0x8227;
    pub const RED_INTEGER: u32 = 0x8D94;
    pub const RG_INTEGER: u32 = 0x8228;
    pub const RGB_INTEGER: u32 = 0x8D98;
    pub const RGBA_INTEGER: u32 = 0x8D99;
    pub const DEPTH_COMPONENT: u32 = 0x1902;
    pub const DEPTH_STENCIL: u32 = 0x84F9;

    // Pixel types
    pub const BYTE: u32 = 0x1400;
    pub const UNSIGNED_BYTE: u32 = 0x1401;
    pub const SHORT: u32 = 0x1402;
    pub const UNSIGNED_SHORT: u32 = 0x1403;
    pub const INT: u32 = 0x1404;
    pub const UNSIGNED_INT: u32 = 0x1405;
    pub const FLOAT: u32 = 0x1406;
    pub const HALF_FLOAT: u32 = 0x140B;
    pub const UNSIGNED_SHORT_4_4_4_4: u32 = 0x8033;
    pub const UNSIGNED_SHORT_5_5_5_1: u32 = 0x8034;
    pub const UNSIGNED_SHORT_5_6_5: u32 = 0x8363;
    pub const UNSIGNED_INT_2_10_10_10_REV: u32 = 0x8368;
    pub const UNSIGNED_INT_24_8: u32 = 0x84FA;
    pub const UNSIGNED_INT_10F_11F_11F_REV: u32 = 0x8C3B;
    pub const UNSIGNED_INT_5_9_9_9_REV: u32 = 0x8C3E;

    /// Default `GL_UNPACK_ALIGNMENT`; the import surface has no `glPixelStorei`
    pub const UNPACK_ALIGNMENT: usize = 4;

    /// Bytes per pixel for a format/type pair, or `None` if unknown
    pub fn pixel_size(format: u32, ty: u32) -> Option<usize> {
        let packed = match ty {
            UNSIGNED_SHORT_4_4_4_4 | UNSIGNED_SHORT_5_5_5_1 | UNSIGNED_SHORT_5_6_5 => Some(2),
            UNSIGNED_INT_2_10_10_10_REV
            | UNSIGNED_INT_24_8
            | UNSIGNED_INT_10F_11F_11F_REV
            | UNSIGNED_INT_5_9_9_9_REV => Some(4),
            _ => None,
        };
        if packed.is_some() {
            return packed;
        }

        let components = match format {
            ALPHA | LUMINANCE | RED | RED_INTEGER | DEPTH_COMPONENT => 1,
            LUMINANCE_ALPHA | RG | RG_INTEGER | DEPTH_STENCIL => 2,
            RGB | RGB_INTEGER => 3,
            RGBA | RGBA_INTEGER => 4,
            _ => return None,
        };
        let component_size = match ty {
            BYTE | UNSIGNED_BYTE => 1,
            SHORT | UNSIGNED_SHORT | HALF_FLOAT => 2,
            INT | UNSIGNED_INT | FLOAT => 4,
            _ => return None,
        };
        Some(components * component_size)
    }

    /// Exact byte length of a `width x height` image upload
    ///
    /// Rows are padded to `UNPACK_ALIGNMENT`, the last row is not.
    pub fn image_size(width: u32, height: u32, format: u32, ty: u32) -> Option<usize> {
        let bpp = pixel_size(format, ty)?;
        if width == 0 || height == 0 {
            return Some(0);
        }
        let row = width as usize * bpp;
        let stride = row.div_ceil(UNPACK_ALIGNMENT) * UNPACK_ALIGNMENT;
        Some(stride * (height as usize - 1) + row)
    }

    /// Binding point a `glTexImage2D` target uploads through
    pub fn binding_target(target: u32) -> u32 {
        if (TEXTURE_CUBE_MAP_POSITIVE_X..=TEXTURE_CUBE_MAP_NEGATIVE_Z).contains(&target) {
            TEXTURE_CUBE_MAP
        } else {
            target
        }
    }
}

/// Scalar type of an import parameter or result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValType {
    I32,
    I64,
    F32,
}

/// A scalar crossing the import boundary
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
}

impl Value {
    /// Zero of the given type, used for missing arguments
    pub fn zero(ty: ValType) -> Self {
        match ty {
            ValType::I32 => Value::I32(0),
            ValType::I64 => Value::I64(0),
            ValType::F32 => Value::F32(0.0),
        }
    }

    pub fn ty(&self) -> ValType {
        match self {
            Value::I32(_) => ValType::I32,
            Value::I64(_) => ValType::I64,
            Value::F32(_) => ValType::F32,
        }
    }
}

/// Parameter and result types of an import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub params: &'static [ValType],
    pub result: Option<ValType>,
}

/// Positional view over an import's arguments
///
/// Missing arguments read as zero, which is what a JS host passes for an
/// absent parameter.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a>(pub &'a [Value]);

impl<'a> Args<'a> {
    fn get(&self, index: usize) -> Value {
        self.0.get(index).copied().unwrap_or(Value::I32(0))
    }

    pub fn i32(&self, index: usize) -> i32 {
        match self.get(index) {
            Value::I32(v) => v,
            Value::I64(v) => v as i32,
            Value::F32(v) => v as i32,
        }
    }

    pub fn u32(&self, index: usize) -> u32 {
        self.i32(index) as u32
    }

    pub fn f32(&self, index: usize) -> f32 {
        match self.get(index) {
            Value::I32(v) => v as f32,
            Value::I64(v) => v as f32,
            Value::F32(v) => v,
        }
    }

    pub fn bool(&self, index: usize) -> bool {
        self.i32(index) != 0
    }

    pub fn handle(&self, index: usize) -> Handle {
        Handle(self.u32(index))
    }
}

macro_rules! import_table {
    ($(
        $variant:ident = $ns:ident $name:literal ( $($param:ident),* ) $(-> $result:ident)?;
    )*) => {
        /// Every function the guest may import
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Import {
            $($variant,)*
        }

        impl Import {
            /// All imports, in declaration order
            pub const ALL: &'static [Import] = &[$(Import::$variant,)*];

            /// Field name inside its namespace
            pub fn name(self) -> &'static str {
                match self {
                    $(Import::$variant => $name,)*
                }
            }

            /// Import module namespace
            pub fn namespace(self) -> &'static str {
                match self {
                    $(Import::$variant => $ns,)*
                }
            }

            pub fn signature(self) -> Signature {
                match self {
                    $(Import::$variant => Signature {
                        params: &[$(ValType::$param),*],
                        result: import_table!(@result $($result)?),
                    },)*
                }
            }
        }
    };
    (@result) => { None };
    (@result $result:ident) => { Some(ValType::$result) };
}

const ENV: &str = ENV_NAMESPACE;
const WASI: &str = WASI_NAMESPACE;

import_table! {
    // Framebuffers
    GlGenFramebuffers = ENV "glGenFramebuffers" (I32, I32);
    GlDeleteFramebuffers = ENV "glDeleteFramebuffers" (I32, I32);
    GlBindFramebuffer = ENV "glBindFramebuffer" (I32, I32);
    GlBlitFramebuffer = ENV "glBlitFramebuffer" (I32, I32, I32, I32, I32, I32, I32, I32, I32, I32);
    GlFramebufferTexture2D = ENV "glFramebufferTexture2D" (I32, I32, I32, I32, I32);

    // State
    GlEnable = ENV "glEnable" (I32);
    GlIsEnabled = ENV "glIsEnabled" (I32) -> I32;
    GlDisable = ENV "glDisable" (I32);
    GlViewport = ENV "glViewport" (I32, I32, I32, I32);
    GlScissor = ENV "glScissor" (I32, I32, I32, I32);
    GlGetIntegerv = ENV "glGetIntegerv" (I32, I32);
    GlGetFloatv = ENV "glGetFloatv" (I32, I32);
    GlGetError = ENV "glGetError" () -> I32;
    GlFinish = ENV "glFinish" ();
    GlClear = ENV "glClear" (I32);
    GlClearColor = ENV "glClearColor" (F32, F32, F32, F32);
    GlBlendFunc = ENV "glBlendFunc" (I32, I32);
    GlBlendEquation = ENV "glBlendEquation" (I32);
    GlBlendEquationSeparate = ENV "glBlendEquationSeparate" (I32, I32);
    GlBlendFuncSeparate = ENV "glBlendFuncSeparate" (I32, I32, I32, I32);

    // Textures
    GlGenTextures = ENV "glGenTextures" (I32, I32);
    GlDeleteTextures = ENV "glDeleteTextures" (I32, I32);
    GlBindTexture = ENV "glBindTexture" (I32, I32);
    GlActiveTexture = ENV "glActiveTexture" (I32);
    GlTexParameteri = ENV "glTexParameteri" (I32, I32, I32);
    GlTexImage2D = ENV "glTexImage2D" (I32, I32, I32, I32, I32, I32, I32, I32, I32);
    GlTexSubImage2D = ENV "glTexSubImage2D" (I32, I32, I32, I32, I32, I32, I32, I32, I32);
    GlGetTexLevelParameteriv = ENV "glGetTexLevelParameteriv" (I32, I32, I32, I32);

    // Buffers and vertex state
    GlGenBuffers = ENV "glGenBuffers" (I32, I32);
    GlDeleteBuffers = ENV "glDeleteBuffers" (I32, I32);
    GlBindBuffer = ENV "glBindBuffer" (I32, I32);
    GlBufferData = ENV "glBufferData" (I32, I32, I32, I32);
    GlEnableVertexAttribArray = ENV "glEnableVertexAttribArray" (I32);
    GlVertexAttribPointer = ENV "glVertexAttribPointer" (I32, I32, I32, I32, I32, I32);
    GlDrawElements = ENV "glDrawElements" (I32, I32, I32, I32);

    // Shaders and programs
    GlCreateShader = ENV "glCreateShader" (I32) -> I32;
    GlShaderSource = ENV "glShaderSource" (I32, I32, I32, I32);
    GlCompileShader = ENV "glCompileShader" (I32);
    GlGetShaderiv = ENV "glGetShaderiv" (I32, I32, I32);
    GlGetShaderInfoLog = ENV "glGetShaderInfoLog" (I32, I32, I32, I32);
    GlDeleteShader = ENV "glDeleteShader" (I32);
    GlCreateProgram = ENV "glCreateProgram" () -> I32;
    GlAttachShader = ENV "glAttachShader" (I32, I32);
    GlDetachShader = ENV "glDetachShader" (I32, I32);
    GlLinkProgram = ENV "glLinkProgram" (I32);
    GlGetProgramiv = ENV "glGetProgramiv" (I32, I32, I32);
    GlUseProgram = ENV "glUseProgram" (I32);
    GlDeleteProgram = ENV "glDeleteProgram" (I32);
    GlGetAttribLocation = ENV "glGetAttribLocation" (I32, I32) -> I32;
    GlGetUniformLocation = ENV "glGetUniformLocation" (I32, I32) -> I32;
    GlUniform1i = ENV "glUniform1i" (I32, I32);
    GlUniformMatrix4fv = ENV "glUniformMatrix4fv" (I32, I32, I32, I32);

    // Audio (stubbed)
    AudioCreate = ENV "MTY_AudioCreate" (I32, I32, I32) -> I32;
    AudioDestroy = ENV "MTY_AudioDestroy" (I32);
    AudioPlay = ENV "MTY_AudioPlay" (I32);
    AudioStop = ENV "MTY_AudioStop" (I32);
    AudioQueue = ENV "MTY_AudioQueue" (I32, I32, I32);
    AudioIsPlaying = ENV "MTY_AudioIsPlaying" (I32) -> I32;
    AudioGetQueuedFrames = ENV "MTY_AudioGetQueuedFrames" (I32) -> I32;

    // Window
    WebGetSize = ENV "web_get_size" (I32, I32);
    WebResizeCanvas = ENV "web_resize_canvas" ();
    WebSetTitle = ENV "web_set_title" (I32);
    WebCreateCanvas = ENV "web_create_canvas" ();
    WebRegisterDrag = ENV "web_register_drag" ();
    WebRaf = ENV "web_raf" (I32, I32);

    // Syscalls
    ArgsGet = WASI "args_get" (I32, I32) -> I32;
    ArgsSizesGet = WASI "args_sizes_get" (I32, I32) -> I32;
    EnvironGet = WASI "environ_get" (I32, I32) -> I32;
    EnvironSizesGet = WASI "environ_sizes_get" (I32, I32) -> I32;
    ClockTimeGet = WASI "clock_time_get" (I32, I64, I32) -> I32;
    FdClose = WASI "fd_close" (I32) -> I32;
    FdFdstatGet = WASI "fd_fdstat_get" (I32, I32) -> I32;
    FdFdstatSetFlags = WASI "fd_fdstat_set_flags" (I32, I32) -> I32;
    FdPrestatGet = WASI "fd_prestat_get" (I32, I32) -> I32;
    FdPrestatDirName = WASI "fd_prestat_dir_name" (I32, I32, I32) -> I32;
    FdRead = WASI "fd_read" (I32, I32, I32, I32) -> I32;
    FdReaddir = WASI "fd_readdir" (I32, I32, I32, I64, I32) -> I32;
    FdSeek = WASI "fd_seek" (I32, I64, I32, I32) -> I32;
    FdWrite = WASI "fd_write" (I32, I32, I32, I32) -> I32;
    PathCreateDirectory = WASI "path_create_directory" (I32, I32, I32) -> I32;
    PathOpen = WASI "path_open" (I32, I32, I32, I32, I32, I64, I64, I32, I32) -> I32;
    PathReadlink = WASI "path_readlink" (I32, I32, I32, I32, I32, I32) -> I32;
    PollOneoff = WASI "poll_oneoff" (I32, I32, I32, I32) -> I32;
    ProcExit = WASI "proc_exit" (I32);
}

impl Import {
    /// Find an import by namespace and field name
    pub fn lookup(namespace: &str, name: &str) -> Option<Import> {
        Import::ALL
            .iter()
            .copied()
            .find(|i| i.namespace() == namespace && i.name() == name)
    }
}

impl fmt::Display for Import {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace(), self.name())
    }
}

/// WASI `iovec`/`ciovec`: 8 bytes, two little-endian u32
#[derive(Debug, Clone, Copy, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Iovec {
    pub buf: u32,
    pub buf_len: u32,
}

impl Iovec {
    pub const SIZE: u32 = 8;

    pub fn from_le(self) -> Self {
        Self {
            buf: u32::from_le(self.buf),
            buf_len: u32::from_le(self.buf_len),
        }
    }
}

/// WASI `fdstat`: 24 bytes
#[derive(Debug, Clone, Copy, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct FdStat {
    pub filetype: u8,
    pub _pad0: u8,
    pub flags: u16,
    pub _pad1: u32,
    pub rights_base: u64,
    pub rights_inheriting: u64,
}

impl FdStat {
    pub const SIZE: usize = 24;

    /// `__WASI_FILETYPE_CHARACTER_DEVICE`
    pub const FILETYPE_CHARACTER_DEVICE: u8 = 2;

    /// `fd_read` | `fd_write` rights
    pub const RIGHTS_READ_WRITE: u64 = (1 << 1) | (1 << 6);

    /// A terminal-like stdio stream
    pub fn character_device() -> Self {
        Self {
            filetype: Self::FILETYPE_CHARACTER_DEVICE,
            rights_base: Self::RIGHTS_READ_WRITE.to_le(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_unique_per_namespace() {
        let mut seen = HashSet::new();
        for import in Import::ALL {
            assert!(
                seen.insert((import.namespace(), import.name())),
                "duplicate import {}",
                import
            );
        }
    }

    #[test]
    fn test_signatures_match_c_prototypes() {
        use ValType::*;

        let sig = Import::GlBlitFramebuffer.signature();
        assert_eq!(sig.params.len(), 10);
        assert_eq!(sig.result, None);

        let sig = Import::GlClearColor.signature();
        assert_eq!(sig.params, &[F32, F32, F32, F32]);

        let sig = Import::GlTexImage2D.signature();
        assert_eq!(sig.params.len(), 9);

        assert_eq!(Import::GlCreateProgram.signature().params, &[] as &[ValType]);
        assert_eq!(Import::GlCreateProgram.signature().result, Some(I32));
        assert_eq!(Import::GlGetError.signature().result, Some(I32));

        let sig = Import::ClockTimeGet.signature();
        assert_eq!(sig.params, &[I32, I64, I32]);
        assert_eq!(sig.result, Some(I32));

        assert_eq!(Import::FdSeek.signature().params, &[I32, I64, I32, I32]);
        assert_eq!(Import::ProcExit.signature().result, None);
        assert_eq!(Import::WebRaf.signature().params, &[I32, I32]);
    }

    #[test]
    fn test_every_wasi_call_returns_errno_except_exit() {
        for import in Import::ALL {
            if import.namespace() == WASI_NAMESPACE && *import != Import::ProcExit {
                assert_eq!(import.signature().result, Some(ValType::I32), "{}", import);
            }
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(Import::lookup("env", "glClear"), Some(Import::GlClear));
        assert_eq!(
            Import::lookup("wasi_snapshot_preview1", "fd_write"),
            Some(Import::FdWrite)
        );
        assert_eq!(Import::lookup("env", "fd_write"), None);
    }

    #[test]
    fn test_args_missing_read_as_zero() {
        let values = [Value::I32(-1), Value::F32(2.5)];
        let args = Args(&values);
        assert_eq!(args.i32(0), -1);
        assert_eq!(args.u32(0), u32::MAX);
        assert_eq!(args.f32(1), 2.5);
        assert_eq!(args.i32(5), 0);
        assert_eq!(args.handle(7), Handle::NULL);
    }

    #[test]
    fn test_image_size() {
        // 3 RGB bytes per pixel, rows padded to 4
        assert_eq!(gl::image_size(5, 2, gl::RGB, gl::UNSIGNED_BYTE), Some(16 + 15));
        assert_eq!(gl::image_size(64, 32, gl::RGBA, gl::UNSIGNED_BYTE), Some(64 * 32 * 4));
        assert_eq!(gl::image_size(4, 4, gl::RGB, gl::UNSIGNED_SHORT_5_6_5), Some(32));
        assert_eq!(gl::image_size(2, 2, gl::RGBA, gl::FLOAT), Some(64));
        assert_eq!(gl::image_size(0, 9, gl::RGBA, gl::UNSIGNED_BYTE), Some(0));
        assert_eq!(gl::image_size(1, 1, 0xFFFF, gl::UNSIGNED_BYTE), None);
    }

    #[test]
    fn test_cube_faces_bind_through_cube_map() {
        assert_eq!(gl::binding_target(0x8517), gl::TEXTURE_CUBE_MAP);
        assert_eq!(gl::binding_target(gl::TEXTURE_2D), gl::TEXTURE_2D);
    }

    #[test]
    fn test_pod_layouts() {
        assert_eq!(std::mem::size_of::<Iovec>(), Iovec::SIZE as usize);
        assert_eq!(std::mem::size_of::<FdStat>(), FdStat::SIZE);
    }
}
