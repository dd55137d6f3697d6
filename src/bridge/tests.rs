//! End-to-end tests through `Bridge::call` on the headless platform

use super::*;
use crate::bridge::abi::gl;
use crate::platform::headless::{HeadlessGl, HeadlessPlatform};
use memory::VecMemory;

const FRAMEBUFFER: i32 = 0x8D40;
const FRAMEBUFFER_BINDING: i32 = 0x8CA6;
const VIEWPORT: i32 = 0x0BA2;
const COLOR_CLEAR_VALUE: i32 = 0x0C22;
const BLEND: i32 = 0x0BE2;
const ARRAY_BUFFER: i32 = 0x8892;
const STATIC_DRAW: i32 = 0x88E4;
const VERTEX_SHADER: i32 = 0x8B31;
const TEXTURE_2D: i32 = gl::TEXTURE_2D as i32;

// Scratch addresses in guest memory
const IDS: u32 = 0x100;
const OUT: u32 = 0x180;
const STRINGS: u32 = 0x200;
const DATA: u32 = 0x1000;

fn bridge() -> Bridge<HeadlessPlatform> {
    let mut bridge = Bridge::new(HeadlessPlatform::new(), BridgeConfig::default());
    bridge.bind_memory(VecMemory::with_pages(1));
    bridge
}

fn with_canvas() -> Bridge<HeadlessPlatform> {
    let mut bridge = bridge();
    bridge.call(Import::WebCreateCanvas, &[]).unwrap();
    bridge
}

fn call(bridge: &mut Bridge<HeadlessPlatform>, import: Import, args: &[i32]) -> BridgeResult<Option<Value>> {
    let values: Vec<Value> = args.iter().map(|&v| Value::I32(v)).collect();
    bridge.call(import, &values)
}

/// Call an import that returns an i32
fn ret(bridge: &mut Bridge<HeadlessPlatform>, import: Import, args: &[i32]) -> i32 {
    match call(bridge, import, args).unwrap() {
        Some(Value::I32(v)) => v,
        other => panic!("{} returned {:?}", import, other),
    }
}

fn gl(bridge: &mut Bridge<HeadlessPlatform>) -> &mut HeadlessGl {
    bridge.graphics_mut().unwrap().backend()
}

fn write(bridge: &mut Bridge<HeadlessPlatform>, addr: u32, bytes: &[u8]) {
    bridge.memory().unwrap().write_bytes(addr, bytes).unwrap();
}

fn write_str(bridge: &mut Bridge<HeadlessPlatform>, addr: u32, s: &str) {
    let mut bytes = s.as_bytes().to_vec();
    bytes.push(0);
    write(bridge, addr, &bytes);
}

fn write_u32s(bridge: &mut Bridge<HeadlessPlatform>, addr: u32, values: &[u32]) {
    bridge.memory().unwrap().write_u32s(addr, values).unwrap();
}

fn read_u32s(bridge: &mut Bridge<HeadlessPlatform>, addr: u32, count: u32) -> Vec<u32> {
    bridge.memory().unwrap().read_u32s(addr, count).unwrap()
}

fn read_i32(bridge: &mut Bridge<HeadlessPlatform>, addr: u32) -> i32 {
    bridge.memory().unwrap().read_i32(addr).unwrap()
}

fn gen_textures(bridge: &mut Bridge<HeadlessPlatform>, n: i32) -> Vec<u32> {
    call(bridge, Import::GlGenTextures, &[n, IDS as i32]).unwrap();
    read_u32s(bridge, IDS, n as u32)
}

fn create_program(bridge: &mut Bridge<HeadlessPlatform>) -> i32 {
    ret(bridge, Import::GlCreateProgram, &[])
}

// ============================================================================
// Handles
// ============================================================================

#[test]
fn test_handles_start_at_one_and_are_never_reused() {
    let mut b = with_canvas();
    assert_eq!(gen_textures(&mut b, 2), vec![1, 2]);

    write_u32s(&mut b, IDS, &[1]);
    call(&mut b, Import::GlDeleteTextures, &[1, IDS as i32]).unwrap();
    assert_eq!(gen_textures(&mut b, 1), vec![3]);
    assert!(gl(&mut b).deleted.iter().any(|d| d.starts_with("texture")));
}

#[test]
fn test_classes_count_independently() {
    let mut b = with_canvas();
    assert_eq!(gen_textures(&mut b, 1), vec![1]);
    call(&mut b, Import::GlGenBuffers, &[1, IDS as i32]).unwrap();
    assert_eq!(read_u32s(&mut b, IDS, 1), vec![1]);
    assert_eq!(ret(&mut b, Import::GlCreateShader, &[VERTEX_SHADER]), 1);
    assert_eq!(create_program(&mut b), 1);
}

#[test]
fn test_unknown_handle_is_a_defect() {
    let mut b = with_canvas();
    let err = call(&mut b, Import::GlBindTexture, &[TEXTURE_2D, 42]).unwrap_err();
    assert_eq!(
        err,
        BridgeError::UnknownHandle {
            class: "texture",
            handle: 42
        }
    );

    // A texture handle does not name a buffer
    gen_textures(&mut b, 1);
    let err = call(&mut b, Import::GlBindBuffer, &[ARRAY_BUFFER, 1]).unwrap_err();
    assert!(matches!(err, BridgeError::UnknownHandle { class: "buffer", .. }));
}

#[test]
fn test_null_handle_unbinds() {
    let mut b = with_canvas();
    call(&mut b, Import::GlBindTexture, &[TEXTURE_2D, 0]).unwrap();
    assert!(gl(&mut b).called("bindTexture(0xDE1, None)"));

    // Deleting the null name is ignored
    write_u32s(&mut b, IDS, &[0]);
    call(&mut b, Import::GlDeleteTextures, &[1, IDS as i32]).unwrap();
    assert!(gl(&mut b).deleted.is_empty());
}

#[test]
fn test_host_refusal_yields_null_handle() {
    let mut b = with_canvas();
    gl(&mut b).can_create = false;
    assert_eq!(gen_textures(&mut b, 2), vec![0, 0]);
    assert_eq!(ret(&mut b, Import::GlCreateProgram, &[]), 0);
    assert!(b.graphics().unwrap().objects().textures.is_empty());
}

// ============================================================================
// Context
// ============================================================================

#[test]
fn test_graphics_before_canvas_is_rejected() {
    let mut b = bridge();
    let err = call(&mut b, Import::GlClear, &[0x4000]).unwrap_err();
    assert_eq!(err, BridgeError::NoGraphicsContext { import: "glClear" });
}

#[test]
fn test_canvas_created_once_with_configured_attributes() {
    let mut b = with_canvas();
    gen_textures(&mut b, 1);
    call(&mut b, Import::WebCreateCanvas, &[]).unwrap();

    assert_eq!(b.graphics().unwrap().objects().textures.len(), 1);
    let context = b.platform().context.unwrap();
    assert!(!context.depth);
    assert!(!context.antialias);
    assert_eq!(b.platform().canvas_size, Some((800, 600)));
}

#[test]
fn test_canvas_failure_leaves_no_context() {
    let mut platform = HeadlessPlatform::new();
    platform.gl_available = false;
    let mut b = Bridge::new(platform, BridgeConfig::default());
    b.bind_memory(VecMemory::with_pages(1));

    let err = call(&mut b, Import::WebCreateCanvas, &[]).unwrap_err();
    assert!(matches!(err, BridgeError::Platform { .. }));
    assert!(b.graphics().is_none());
}

// ============================================================================
// State queries
// ============================================================================

#[test]
fn test_get_integerv_maps_objects_back_to_handles() {
    let mut b = with_canvas();
    call(&mut b, Import::GlGenFramebuffers, &[2, IDS as i32]).unwrap();
    call(&mut b, Import::GlBindFramebuffer, &[FRAMEBUFFER, 2]).unwrap();

    call(&mut b, Import::GlGetIntegerv, &[FRAMEBUFFER_BINDING, OUT as i32]).unwrap();
    assert_eq!(read_i32(&mut b, OUT), 2);

    call(&mut b, Import::GlBindFramebuffer, &[FRAMEBUFFER, 0]).unwrap();
    call(&mut b, Import::GlGetIntegerv, &[FRAMEBUFFER_BINDING, OUT as i32]).unwrap();
    assert_eq!(read_i32(&mut b, OUT), 0);
}

#[test]
fn test_get_integerv_writes_every_component() {
    let mut b = with_canvas();
    call(&mut b, Import::GlViewport, &[1, 2, 640, 480]).unwrap();
    call(&mut b, Import::GlGetIntegerv, &[VIEWPORT, OUT as i32]).unwrap();
    assert_eq!(read_u32s(&mut b, OUT, 4), vec![1, 2, 640, 480]);
}

#[test]
fn test_get_floatv_and_is_enabled() {
    let mut b = with_canvas();
    b.call(
        Import::GlClearColor,
        &[Value::F32(0.25), Value::F32(0.5), Value::F32(0.75), Value::F32(1.0)],
    )
    .unwrap();
    call(&mut b, Import::GlGetFloatv, &[COLOR_CLEAR_VALUE, OUT as i32]).unwrap();
    let floats = b.memory().unwrap().read_f32s(OUT, 4).unwrap();
    assert_eq!(floats, vec![0.25, 0.5, 0.75, 1.0]);

    assert_eq!(ret(&mut b, Import::GlIsEnabled, &[BLEND]), 0);
    call(&mut b, Import::GlEnable, &[BLEND]).unwrap();
    assert_eq!(ret(&mut b, Import::GlIsEnabled, &[BLEND]), 1);
}

#[test]
fn test_get_error_drains_host_errors() {
    let mut b = with_canvas();
    gl(&mut b).errors.push_back(0x0502);
    assert_eq!(ret(&mut b, Import::GlGetError, &[]), 0x0502);
    assert_eq!(ret(&mut b, Import::GlGetError, &[]), 0);
}

// ============================================================================
// Textures
// ============================================================================

fn tex_image(b: &mut Bridge<HeadlessPlatform>, width: i32, height: i32, data: u32) {
    call(
        b,
        Import::GlTexImage2D,
        &[
            TEXTURE_2D,
            0,
            gl::RGBA as i32,
            width,
            height,
            0,
            gl::RGBA as i32,
            gl::UNSIGNED_BYTE as i32,
            data as i32,
        ],
    )
    .unwrap();
}

fn level_parameter(b: &mut Bridge<HeadlessPlatform>, level: i32, pname: u32) -> i32 {
    call(
        b,
        Import::GlGetTexLevelParameteriv,
        &[TEXTURE_2D, level, pname as i32, OUT as i32],
    )
    .unwrap();
    read_i32(b, OUT)
}

#[test]
fn test_texture_size_follows_binding() {
    let mut b = with_canvas();
    let ids = gen_textures(&mut b, 2);

    call(&mut b, Import::GlBindTexture, &[TEXTURE_2D, ids[0] as i32]).unwrap();
    tex_image(&mut b, 4, 2, 0);
    call(&mut b, Import::GlBindTexture, &[TEXTURE_2D, ids[1] as i32]).unwrap();
    tex_image(&mut b, 8, 8, 0);

    call(&mut b, Import::GlBindTexture, &[TEXTURE_2D, ids[0] as i32]).unwrap();
    assert_eq!(level_parameter(&mut b, 0, gl::TEXTURE_WIDTH), 4);
    assert_eq!(level_parameter(&mut b, 0, gl::TEXTURE_HEIGHT), 2);
    // Level 1 derives from level 0
    assert_eq!(level_parameter(&mut b, 1, gl::TEXTURE_WIDTH), 2);
    assert_eq!(level_parameter(&mut b, 1, gl::TEXTURE_HEIGHT), 1);

    call(&mut b, Import::GlBindTexture, &[TEXTURE_2D, ids[1] as i32]).unwrap();
    assert_eq!(level_parameter(&mut b, 0, gl::TEXTURE_WIDTH), 8);
}

#[test]
fn test_texture_size_is_per_unit() {
    let mut b = with_canvas();
    let ids = gen_textures(&mut b, 1);
    call(&mut b, Import::GlBindTexture, &[TEXTURE_2D, ids[0] as i32]).unwrap();
    tex_image(&mut b, 16, 16, 0);

    call(&mut b, Import::GlActiveTexture, &[gl::TEXTURE0 as i32 + 1]).unwrap();
    assert_eq!(level_parameter(&mut b, 0, gl::TEXTURE_WIDTH), 0);
    call(&mut b, Import::GlActiveTexture, &[gl::TEXTURE0 as i32]).unwrap();
    assert_eq!(level_parameter(&mut b, 0, gl::TEXTURE_WIDTH), 16);
}

#[test]
fn test_deleted_texture_forgets_binding_and_size() {
    let mut b = with_canvas();
    let ids = gen_textures(&mut b, 1);
    call(&mut b, Import::GlBindTexture, &[TEXTURE_2D, ids[0] as i32]).unwrap();
    tex_image(&mut b, 4, 4, 0);

    write_u32s(&mut b, IDS, &ids);
    call(&mut b, Import::GlDeleteTextures, &[1, IDS as i32]).unwrap();

    let handle = Handle(ids[0]);
    let textures = b.graphics().unwrap().textures();
    assert_eq!(textures.bound(gl::TEXTURE_2D), None);
    assert_eq!(textures.meta(handle, 0), None);
    assert_eq!(level_parameter(&mut b, 0, gl::TEXTURE_WIDTH), 0);
}

#[test]
fn test_delete_stopped_by_unknown_handle_still_forgets_released_ones() {
    let mut b = with_canvas();
    let ids = gen_textures(&mut b, 2);
    call(&mut b, Import::GlBindTexture, &[TEXTURE_2D, ids[0] as i32]).unwrap();
    tex_image(&mut b, 4, 4, 0);

    write_u32s(&mut b, IDS, &[ids[0], 99, ids[1]]);
    let err = call(&mut b, Import::GlDeleteTextures, &[3, IDS as i32]).unwrap_err();
    assert!(matches!(err, BridgeError::UnknownHandle { handle: 99, .. }));

    let graphics = b.graphics().unwrap();
    assert!(!graphics.objects().textures.contains(Handle(ids[0])));
    assert!(graphics.objects().textures.contains(Handle(ids[1])));
    assert_eq!(graphics.textures().bound(gl::TEXTURE_2D), None);
    assert_eq!(graphics.textures().meta(Handle(ids[0]), 0), None);
}

#[test]
fn test_tex_image_reads_exact_upload_length() {
    let mut b = with_canvas();
    let ids = gen_textures(&mut b, 1);
    call(&mut b, Import::GlBindTexture, &[TEXTURE_2D, ids[0] as i32]).unwrap();

    // 3x2 RGB: rows of 9 bytes padded to 12, last row unpadded
    call(
        &mut b,
        Import::GlTexImage2D,
        &[
            TEXTURE_2D,
            0,
            gl::RGB as i32,
            3,
            2,
            0,
            gl::RGB as i32,
            gl::UNSIGNED_BYTE as i32,
            DATA as i32,
        ],
    )
    .unwrap();
    tex_image(&mut b, 2, 2, 0);

    let uploads = &gl(&mut b).texture_uploads;
    assert_eq!(uploads[0].pixels.as_ref().map(Vec::len), Some(21));
    assert_eq!(uploads[1].pixels, None);
}

#[test]
fn test_upload_past_end_of_memory_is_a_defect() {
    let mut b = with_canvas();
    let size = b.memory().unwrap().size() as i32;
    let err = call(
        &mut b,
        Import::GlTexSubImage2D,
        &[
            TEXTURE_2D,
            0,
            0,
            0,
            4,
            4,
            gl::RGBA as i32,
            gl::UNSIGNED_BYTE as i32,
            size - 8,
        ],
    )
    .unwrap_err();
    assert!(matches!(err, BridgeError::MemoryAccessOutOfBounds { .. }));
}

// ============================================================================
// Buffers
// ============================================================================

#[test]
fn test_buffer_data_uploads_exact_bytes_or_size() {
    let mut b = with_canvas();
    call(&mut b, Import::GlGenBuffers, &[1, IDS as i32]).unwrap();
    call(&mut b, Import::GlBindBuffer, &[ARRAY_BUFFER, 1]).unwrap();

    write(&mut b, DATA, &[1, 2, 3, 4, 5, 6, 7, 8, 9]);
    call(&mut b, Import::GlBufferData, &[ARRAY_BUFFER, 8, DATA as i32, STATIC_DRAW]).unwrap();
    call(&mut b, Import::GlBufferData, &[ARRAY_BUFFER, 64, 0, STATIC_DRAW]).unwrap();

    let backend = gl(&mut b);
    assert_eq!(backend.buffer_bytes, vec![vec![1, 2, 3, 4, 5, 6, 7, 8]]);
    assert_eq!(backend.buffer_sizes, vec![64]);
}

// ============================================================================
// Shaders and programs
// ============================================================================

#[test]
fn test_shader_source_concatenates_fragments() {
    let mut b = with_canvas();
    let shader = ret(&mut b, Import::GlCreateShader, &[VERTEX_SHADER]);

    write_str(&mut b, STRINGS, "void ");
    write_str(&mut b, STRINGS + 0x40, "main() {}");
    write_u32s(&mut b, IDS, &[STRINGS, STRINGS + 0x40]);
    call(&mut b, Import::GlShaderSource, &[shader, 2, IDS as i32, 0]).unwrap();
    assert!(gl(&mut b).shader_sources.values().any(|s| s == "void main() {}"));

    // Exact length for the first fragment, NUL-terminated for the second
    write_u32s(&mut b, OUT, &[4, u32::MAX]);
    call(&mut b, Import::GlShaderSource, &[shader, 2, IDS as i32, OUT as i32]).unwrap();
    assert!(gl(&mut b).shader_sources.values().any(|s| s == "voidmain() {}"));
}

#[test]
fn test_compile_failure_is_reported_immediately() {
    let mut b = with_canvas();
    let shader = ret(&mut b, Import::GlCreateShader, &[VERTEX_SHADER]);
    call(&mut b, Import::GlCompileShader, &[shader]).unwrap();

    call(&mut b, Import::GlGetShaderiv, &[shader, gl::COMPILE_STATUS as i32, OUT as i32]).unwrap();
    assert_eq!(read_i32(&mut b, OUT), 1);
    assert!(b.platform().warnings.is_empty());

    gl(&mut b).compile_ok = false;
    gl(&mut b).info_log = "ERROR: 0:1: 'x' : undeclared identifier".to_string();
    call(&mut b, Import::GlGetShaderiv, &[shader, gl::COMPILE_STATUS as i32, OUT as i32]).unwrap();
    assert_eq!(read_i32(&mut b, OUT), 0);
    assert!(b.platform().warnings[0].contains("undeclared identifier"));

    // The guest's own info log query comes back empty
    write(&mut b, STRINGS, b"stale");
    call(
        &mut b,
        Import::GlGetShaderInfoLog,
        &[shader, 64, OUT as i32, STRINGS as i32],
    )
    .unwrap();
    assert_eq!(read_i32(&mut b, OUT), 0);
    assert_eq!(b.memory().unwrap().string(STRINGS).unwrap(), "");
}

#[test]
fn test_link_failure_is_reported() {
    let mut b = with_canvas();
    let program = create_program(&mut b);
    gl(&mut b).link_ok = false;
    gl(&mut b).info_log = "missing main".to_string();
    call(&mut b, Import::GlLinkProgram, &[program]).unwrap();
    call(&mut b, Import::GlGetProgramiv, &[program, gl::LINK_STATUS as i32, OUT as i32]).unwrap();

    assert_eq!(read_i32(&mut b, OUT), 0);
    assert_eq!(b.platform().warnings, vec!["missing main".to_string()]);
}

#[test]
fn test_attach_and_detach_shaders() {
    let mut b = with_canvas();
    let program = create_program(&mut b);
    let vs = ret(&mut b, Import::GlCreateShader, &[VERTEX_SHADER]);
    call(&mut b, Import::GlAttachShader, &[program, vs]).unwrap();

    call(&mut b, Import::GlGetProgramiv, &[program, 0x8B85, OUT as i32]).unwrap();
    assert_eq!(read_i32(&mut b, OUT), 1);

    call(&mut b, Import::GlDetachShader, &[program, vs]).unwrap();
    call(&mut b, Import::GlDeleteShader, &[vs]).unwrap();
    call(&mut b, Import::GlGetProgramiv, &[program, 0x8B85, OUT as i32]).unwrap();
    assert_eq!(read_i32(&mut b, OUT), 0);
    assert!(call(&mut b, Import::GlCompileShader, &[vs]).is_err());
}

#[test]
fn test_attrib_location_passes_through() {
    let mut b = with_canvas();
    let program = create_program(&mut b);
    gl(&mut b).attrib_locations.insert("pos".to_string(), 2);

    write_str(&mut b, STRINGS, "pos");
    assert_eq!(ret(&mut b, Import::GlGetAttribLocation, &[program, STRINGS as i32]), 2);
    write_str(&mut b, STRINGS, "uv");
    assert_eq!(ret(&mut b, Import::GlGetAttribLocation, &[program, STRINGS as i32]), -1);
}

#[test]
fn test_uniform_locations_are_stable_and_die_with_program() {
    let mut b = with_canvas();
    let program = create_program(&mut b);
    gl(&mut b).absent_uniforms.insert("u_missing".to_string());

    write_str(&mut b, STRINGS, "u_tex");
    let tex = ret(&mut b, Import::GlGetUniformLocation, &[program, STRINGS as i32]);
    assert!(tex > 0);
    assert_eq!(ret(&mut b, Import::GlGetUniformLocation, &[program, STRINGS as i32]), tex);

    write_str(&mut b, STRINGS, "u_proj");
    let proj = ret(&mut b, Import::GlGetUniformLocation, &[program, STRINGS as i32]);
    assert_ne!(proj, tex);

    write_str(&mut b, STRINGS, "u_missing");
    assert_eq!(ret(&mut b, Import::GlGetUniformLocation, &[program, STRINGS as i32]), -1);

    call(&mut b, Import::GlUniform1i, &[tex, 3]).unwrap();
    let (location, value) = gl(&mut b).uniform_ints.last().cloned().unwrap();
    assert_eq!(location.map(|l| l.name), Some("u_tex".to_string()));
    assert_eq!(value, 3);

    // -1 is silently ignored
    call(&mut b, Import::GlUniform1i, &[-1, 5]).unwrap();
    assert_eq!(gl(&mut b).uniform_ints.last().cloned().unwrap(), (None, 5));

    call(&mut b, Import::GlDeleteProgram, &[program]).unwrap();
    assert!(b.graphics().unwrap().objects().uniform_locations.is_empty());
    let err = call(&mut b, Import::GlUniform1i, &[tex, 3]).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::UnknownHandle {
            class: "uniform location",
            ..
        }
    ));
}

#[test]
fn test_uniform_matrix_reads_sixteen_floats_per_matrix() {
    let mut b = with_canvas();
    let program = create_program(&mut b);
    write_str(&mut b, STRINGS, "u_mvp");
    let location = ret(&mut b, Import::GlGetUniformLocation, &[program, STRINGS as i32]);

    let matrices: Vec<f32> = (0..32).map(|i| i as f32).collect();
    b.memory().unwrap().write_f32s(DATA, &matrices).unwrap();
    call(&mut b, Import::GlUniformMatrix4fv, &[location, 2, 0, DATA as i32]).unwrap();

    let (_, data) = gl(&mut b).uniform_matrices.last().cloned().unwrap();
    assert_eq!(data, matrices);
}

// ============================================================================
// Window and audio
// ============================================================================

#[test]
fn test_window_size_and_title() {
    let mut b = bridge();
    b.platform_mut().viewport = (1280, 720);
    call(&mut b, Import::WebGetSize, &[OUT as i32, OUT as i32 + 4]).unwrap();
    assert_eq!(read_u32s(&mut b, OUT, 2), vec![1280, 720]);

    write_str(&mut b, STRINGS, "Demo");
    call(&mut b, Import::WebSetTitle, &[STRINGS as i32]).unwrap();
    assert_eq!(b.platform().title, "Demo");
}

#[test]
fn test_resize_follows_viewport() {
    let mut b = with_canvas();
    b.platform_mut().viewport = (1024, 768);
    call(&mut b, Import::WebResizeCanvas, &[]).unwrap();
    assert_eq!(b.platform().canvas_size, Some((1024, 768)));
}

#[test]
fn test_dropped_files_are_copied_into_guest_memory() {
    let mut b = with_canvas();
    b.platform_mut().drop_file("level.dat", b"LEVEL");
    assert!(b.take_dropped_files().is_empty());

    call(&mut b, Import::WebRegisterDrag, &[]).unwrap();
    b.platform_mut().drop_file("level.dat", b"LEVEL");
    let files = b.take_dropped_files();
    assert_eq!(files.len(), 1);

    b.deliver_file(DATA, &files[0].data).unwrap();
    assert_eq!(b.memory().unwrap().read_bytes(DATA, 5).unwrap(), b"LEVEL");
}

#[test]
fn test_audio_reports_no_device() {
    let mut b = bridge();
    assert_eq!(ret(&mut b, Import::AudioCreate, &[0, 0, 0, 0, 0]), 0);
    assert_eq!(ret(&mut b, Import::AudioIsPlaying, &[0]), 0);
    assert_eq!(ret(&mut b, Import::AudioGetQueuedFrames, &[0]), 0);
    assert_eq!(call(&mut b, Import::AudioQueue, &[0, DATA as i32, 64]).unwrap(), None);
}

// ============================================================================
// Syscalls and frame loop
// ============================================================================

#[test]
fn test_fd_write_gathers_iovecs() {
    let mut b = bridge();
    write(&mut b, DATA, b"hello ");
    write(&mut b, DATA + 0x10, b"world\n");
    write_u32s(&mut b, IDS, &[DATA, 6, DATA + 0x10, 6]);

    let errno = ret(&mut b, Import::FdWrite, &[1, IDS as i32, 2, OUT as i32]);
    assert_eq!(errno, 0);
    assert_eq!(read_u32s(&mut b, OUT, 1), vec![12]);
    assert_eq!(b.platform().stdout, "hello world\n");

    assert_eq!(ret(&mut b, Import::FdWrite, &[2, IDS as i32, 1, OUT as i32]), 0);
    assert_eq!(b.platform().stderr, "hello ");

    assert_eq!(ret(&mut b, Import::FdWrite, &[5, IDS as i32, 1, OUT as i32]), 8);
}

#[test]
fn test_clock_never_goes_backwards() {
    let mut b = bridge();
    b.platform_mut().set_time_ns(5_000);
    let args = [Value::I32(1), Value::I64(1), Value::I32(OUT as i32)];
    b.call(Import::ClockTimeGet, &args).unwrap();
    assert_eq!(b.memory().unwrap().read_u64(OUT).unwrap(), 5_000);

    b.platform_mut().set_time_ns(1_000);
    b.call(Import::ClockTimeGet, &args).unwrap();
    assert_eq!(b.memory().unwrap().read_u64(OUT).unwrap(), 5_000);
}

#[test]
fn test_web_raf_registers_and_unwinds() {
    let mut b = bridge();
    let err = call(&mut b, Import::WebRaf, &[7, 0x4242]).unwrap_err();
    assert_eq!(err, BridgeError::Unwind);
    assert_eq!(
        b.frame().state(),
        FrameState::Scheduled(FrameCallback {
            func: 7,
            opaque: 0x4242
        })
    );

    // Registering again replaces the callback
    let _ = call(&mut b, Import::WebRaf, &[9, 1]);
    assert_eq!(b.frame_mut().begin_tick(), Some(FrameCallback { func: 9, opaque: 1 }));
}

#[test]
fn test_proc_exit_halts_the_frame_loop() {
    let mut b = bridge();
    let _ = call(&mut b, Import::WebRaf, &[7, 0]);

    let err = call(&mut b, Import::ProcExit, &[3]).unwrap_err();
    assert_eq!(err, BridgeError::Exit { code: 3 });
    assert_eq!(b.exit_code(), Some(3));
    assert!(b.frame().is_halted());

    let _ = call(&mut b, Import::WebRaf, &[7, 0]);
    assert_eq!(b.frame_mut().begin_tick(), None);
}

#[test]
fn test_memory_must_be_bound() {
    let mut b = Bridge::new(HeadlessPlatform::new(), BridgeConfig::default());
    let err = call(&mut b, Import::FdWrite, &[1, 0, 0, 0]).unwrap_err();
    assert_eq!(err, BridgeError::MissingExport { name: "memory" });
}

#[test]
fn test_stub_tracing() {
    let config = BridgeConfig::builder().trace_stubs(true).build();
    let mut b = Bridge::new(HeadlessPlatform::new(), config);
    b.bind_memory(VecMemory::with_pages(1));

    assert_eq!(ret(&mut b, Import::PathOpen, &[3, 0, 0, 0, 0, 0, 0, 0, 0]), 76);
    assert_eq!(ret(&mut b, Import::AudioCreate, &[]), 0);
    let warnings = &b.platform().warnings;
    assert!(warnings.iter().any(|w| w.contains("path_open")));
    assert!(warnings.iter().any(|w| w.contains("MTY_AudioCreate")));
}

#[test]
fn test_every_import_is_serviced() {
    let mut b = with_canvas();
    for &import in Import::ALL {
        let args: Vec<Value> = import
            .signature()
            .params
            .iter()
            .map(|&ty| Value::zero(ty))
            .collect();

        // Results vary; what matters is that each call is answered with
        // the declared result type and nothing panics
        if let Ok(result) = b.call(import, &args) {
            assert_eq!(result.map(|v| v.ty()), import.signature().result, "{}", import);
        }
    }
}
