//! Guest linear memory access
//!
//! The guest's memory can grow at any time it is running, and growth may
//! move or detach the backing storage. The bridge therefore never caches a
//! view: each import builds a fresh `MemoryView` over the memory as it is
//! right now, and every accessor re-checks the current extent.
//!
//! All scalars are little-endian, as in the wasm32 ABI.

use super::error::{BridgeError, BridgeResult};

/// WASM page size in bytes
pub const PAGE_SIZE: usize = 65536;

/// Upper bound when scanning for a NUL terminator
pub const MAX_STRING_SCAN: u32 = 0x7FFF_FFFF;

/// Chunk size used when scanning strings, so JS-backed memories are not
/// read one byte per call
const SCAN_CHUNK: usize = 256;

/// Raw access to a guest's linear memory
///
/// Implementations must read the current backing storage on every call.
/// Offsets passed to `load`/`store` have already been bounds-checked.
pub trait LinearMemory {
    /// Current size in bytes
    fn size(&self) -> u64;

    /// Copy `buf.len()` bytes starting at `offset` into `buf`
    fn load(&self, offset: u32, buf: &mut [u8]);

    /// Copy `data` into memory starting at `offset`
    fn store(&mut self, offset: u32, data: &[u8]);
}

/// Typed accessor over a guest memory, valid for one import call
pub struct MemoryView<'m, M: LinearMemory + ?Sized> {
    mem: &'m mut M,
}

impl<'m, M: LinearMemory + ?Sized> MemoryView<'m, M> {
    pub fn new(mem: &'m mut M) -> Self {
        Self { mem }
    }

    /// Current size in bytes
    pub fn size(&self) -> u64 {
        self.mem.size()
    }

    /// Fail unless `len` bytes at `offset` lie inside the current memory
    pub fn check(&self, offset: u32, len: u64) -> BridgeResult<()> {
        let memory_size = self.mem.size();
        if offset as u64 + len > memory_size {
            return Err(BridgeError::MemoryAccessOutOfBounds {
                address: offset,
                size: len,
                memory_size,
            });
        }
        Ok(())
    }

    /// Fill `buf` from memory at `offset`
    pub fn read_into(&self, offset: u32, buf: &mut [u8]) -> BridgeResult<()> {
        self.check(offset, buf.len() as u64)?;
        self.mem.load(offset, buf);
        Ok(())
    }

    /// Copy exactly `len` bytes out of memory
    pub fn read_bytes(&self, offset: u32, len: u32) -> BridgeResult<Vec<u8>> {
        self.read_checked(offset, len as u64)
    }

    /// Bounds are checked before the buffer is allocated, so a bogus guest
    /// length costs nothing
    fn read_checked(&self, offset: u32, len: u64) -> BridgeResult<Vec<u8>> {
        self.check(offset, len)?;
        let mut buf = vec![0u8; len as usize];
        self.mem.load(offset, &mut buf);
        Ok(buf)
    }

    /// Write `data` at `offset`
    pub fn write_bytes(&mut self, offset: u32, data: &[u8]) -> BridgeResult<()> {
        self.check(offset, data.len() as u64)?;
        self.mem.store(offset, data);
        Ok(())
    }

    fn read_array<const N: usize>(&self, offset: u32) -> BridgeResult<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_into(offset, &mut buf)?;
        Ok(buf)
    }

    pub fn read_u32(&self, offset: u32) -> BridgeResult<u32> {
        self.read_array(offset).map(u32::from_le_bytes)
    }

    pub fn read_i32(&self, offset: u32) -> BridgeResult<i32> {
        self.read_array(offset).map(i32::from_le_bytes)
    }

    pub fn read_f32(&self, offset: u32) -> BridgeResult<f32> {
        self.read_array(offset).map(f32::from_le_bytes)
    }

    pub fn read_u64(&self, offset: u32) -> BridgeResult<u64> {
        self.read_array(offset).map(u64::from_le_bytes)
    }

    pub fn write_u32(&mut self, offset: u32, value: u32) -> BridgeResult<()> {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    pub fn write_i32(&mut self, offset: u32, value: i32) -> BridgeResult<()> {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    pub fn write_f32(&mut self, offset: u32, value: f32) -> BridgeResult<()> {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    pub fn write_u64(&mut self, offset: u32, value: u64) -> BridgeResult<()> {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    /// Read `count` consecutive u32 values (handle arrays, pointer arrays)
    pub fn read_u32s(&self, offset: u32, count: u32) -> BridgeResult<Vec<u32>> {
        let bytes = self.read_checked(offset, count as u64 * 4)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|word| u32::from_le(bytemuck::pod_read_unaligned(word)))
            .collect())
    }

    /// Read `count` consecutive f32 values
    pub fn read_f32s(&self, offset: u32, count: u32) -> BridgeResult<Vec<f32>> {
        Ok(self
            .read_u32s(offset, count)?
            .into_iter()
            .map(f32::from_bits)
            .collect())
    }

    /// Write consecutive u32 values
    pub fn write_u32s(&mut self, offset: u32, values: &[u32]) -> BridgeResult<()> {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.write_bytes(offset, &bytes)
    }

    pub fn write_i32s(&mut self, offset: u32, values: &[i32]) -> BridgeResult<()> {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.write_bytes(offset, &bytes)
    }

    pub fn write_f32s(&mut self, offset: u32, values: &[f32]) -> BridgeResult<()> {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.write_bytes(offset, &bytes)
    }

    /// Read a `#[repr(C)]` plain-old-data record
    pub fn read_pod<T: bytemuck::Pod>(&self, offset: u32) -> BridgeResult<T> {
        let bytes = self.read_bytes(offset, std::mem::size_of::<T>() as u32)?;
        Ok(bytemuck::pod_read_unaligned(&bytes))
    }

    /// Write a `#[repr(C)]` plain-old-data record
    pub fn write_pod<T: bytemuck::Pod>(&mut self, offset: u32, value: &T) -> BridgeResult<()> {
        self.write_bytes(offset, bytemuck::bytes_of(value))
    }

    /// Raw bytes of a NUL-terminated string, without the terminator
    pub fn c_bytes(&self, offset: u32) -> BridgeResult<Vec<u8>> {
        let memory_size = self.mem.size();
        if offset as u64 > memory_size {
            return Err(BridgeError::MemoryAccessOutOfBounds {
                address: offset,
                size: 1,
                memory_size,
            });
        }

        let limit = (offset as u64 + MAX_STRING_SCAN as u64).min(memory_size);
        let mut bytes = Vec::new();
        let mut chunk = [0u8; SCAN_CHUNK];
        let mut pos = offset as u64;

        while pos < limit {
            let len = ((limit - pos) as usize).min(SCAN_CHUNK);
            self.mem.load(pos as u32, &mut chunk[..len]);
            if let Some(nul) = chunk[..len].iter().position(|&b| b == 0) {
                bytes.extend_from_slice(&chunk[..nul]);
                return Ok(bytes);
            }
            bytes.extend_from_slice(&chunk[..len]);
            pos += len as u64;
        }

        if limit < memory_size {
            // Scan cap reached; treat the capped run as the string
            return Ok(bytes);
        }
        Err(BridgeError::UnterminatedString { address: offset })
    }

    /// Decode a NUL-terminated string, one character per byte
    pub fn string(&self, offset: u32) -> BridgeResult<String> {
        self.c_bytes(offset).map(|b| latin1(&b))
    }
}

/// Decode bytes as 8-bit characters (U+0000..=U+00FF)
pub fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Memory backed by a host `Vec`, used by the headless platform and tests
///
/// Growth reallocates the vector. Because a `MemoryView` mutably borrows the
/// memory, a view cannot outlive a grow.
#[derive(Debug, Clone)]
pub struct VecMemory {
    data: Vec<u8>,
}

impl VecMemory {
    /// Memory of `pages` zeroed WASM pages
    pub fn with_pages(pages: usize) -> Self {
        Self {
            data: vec![0u8; pages * PAGE_SIZE],
        }
    }

    /// Memory of exactly `size` zeroed bytes
    pub fn with_size(size: usize) -> Self {
        Self {
            data: vec![0u8; size],
        }
    }

    /// Grow by `pages` pages, returning the previous size in pages
    pub fn grow(&mut self, pages: usize) -> usize {
        let previous = self.data.len() / PAGE_SIZE;
        self.data.resize(self.data.len() + pages * PAGE_SIZE, 0);
        previous
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl LinearMemory for VecMemory {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn load(&self, offset: u32, buf: &mut [u8]) {
        let start = offset as usize;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
    }

    fn store(&mut self, offset: u32, data: &[u8]) {
        let start = offset as usize;
        self.data[start..start + data.len()].copy_from_slice(data);
    }
}

/// Memory exported by a guest instantiated through `WebAssembly`
///
/// `memory.buffer()` is fetched on every access: after `memory.grow` the old
/// `ArrayBuffer` is detached and any typed array over it reads as empty.
#[cfg(target_arch = "wasm32")]
pub struct JsMemory {
    memory: js_sys::WebAssembly::Memory,
}

#[cfg(target_arch = "wasm32")]
impl JsMemory {
    pub fn new(memory: js_sys::WebAssembly::Memory) -> Self {
        Self { memory }
    }

    fn bytes(&self, offset: u32, len: usize) -> js_sys::Uint8Array {
        js_sys::Uint8Array::new_with_byte_offset_and_length(
            &self.memory.buffer(),
            offset,
            len as u32,
        )
    }
}

#[cfg(target_arch = "wasm32")]
impl LinearMemory for JsMemory {
    fn size(&self) -> u64 {
        use wasm_bindgen::JsCast;

        let buffer: js_sys::ArrayBuffer = self.memory.buffer().unchecked_into();
        buffer.byte_length() as u64
    }

    fn load(&self, offset: u32, buf: &mut [u8]) {
        self.bytes(offset, buf.len()).copy_to(buf);
    }

    fn store(&mut self, offset: u32, data: &[u8]) {
        self.bytes(offset, data.len()).copy_from(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_roundtrip_little_endian() {
        let mut mem = VecMemory::with_size(64);
        let mut view = MemoryView::new(&mut mem);
        view.write_u32(0, 0xDEADBEEF).unwrap();
        view.write_f32(4, 1.5).unwrap();
        view.write_u64(8, 0x0102_0304_0506_0708).unwrap();

        assert_eq!(view.read_u32(0).unwrap(), 0xDEADBEEF);
        assert_eq!(view.read_f32(4).unwrap(), 1.5);
        assert_eq!(view.read_u64(8).unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(&mem.as_slice()[0..4], &[0xEF, 0xBE, 0xAD, 0xDE]);
        assert_eq!(mem.as_slice()[8], 0x08);
    }

    #[test]
    fn test_out_of_bounds_is_an_error() {
        let mut mem = VecMemory::with_size(16);
        let mut view = MemoryView::new(&mut mem);
        assert!(view.read_u32(12).is_ok());
        assert_eq!(
            view.read_u32(13),
            Err(BridgeError::MemoryAccessOutOfBounds {
                address: 13,
                size: 4,
                memory_size: 16,
            })
        );
        assert!(view.write_bytes(10, &[0u8; 7]).is_err());
        assert!(view.read_bytes(u32::MAX, 2).is_err());
    }

    #[test]
    fn test_oversized_length_is_rejected_before_reading() {
        let mut mem = VecMemory::with_pages(1);
        let view = MemoryView::new(&mut mem);
        assert_eq!(
            view.read_bytes(16, 0x7FFF_FFFF),
            Err(BridgeError::MemoryAccessOutOfBounds {
                address: 16,
                size: 0x7FFF_FFFF,
                memory_size: PAGE_SIZE as u64,
            })
        );
        assert!(view.read_u32s(0, u32::MAX).is_err());
        assert!(view.read_f32s(0, 0x4000_0000).is_err());
    }

    #[test]
    fn test_string_roundtrip_lengths() {
        for n in [0usize, 1, 255, 4096] {
            let mut mem = VecMemory::with_pages(1);
            let payload: Vec<u8> = (0..n).map(|i| (i % 255) as u8 + 1).collect();
            let offset = 100u32;
            {
                let mut view = MemoryView::new(&mut mem);
                view.write_bytes(offset, &payload).unwrap();
                view.write_bytes(offset + n as u32, &[0]).unwrap();
            }
            let view = MemoryView::new(&mut mem);
            let decoded = view.string(offset).unwrap();
            assert_eq!(decoded.chars().count(), n);
            let expected: String = payload.iter().map(|&b| b as char).collect();
            assert_eq!(decoded, expected);
        }
    }

    #[test]
    fn test_string_high_bytes_are_latin1() {
        let mut mem = VecMemory::with_size(8);
        mem.as_mut_slice()[..3].copy_from_slice(&[0x41, 0xE9, 0x00]);
        let view = MemoryView::new(&mut mem);
        assert_eq!(view.string(0).unwrap(), "A\u{e9}");
    }

    #[test]
    fn test_unterminated_string() {
        let mut mem = VecMemory::with_size(8);
        mem.as_mut_slice().fill(b'x');
        let view = MemoryView::new(&mut mem);
        assert_eq!(
            view.string(2),
            Err(BridgeError::UnterminatedString { address: 2 })
        );
    }

    #[test]
    fn test_view_sees_grown_memory() {
        let mut mem = VecMemory::with_pages(1);
        assert!(MemoryView::new(&mut mem).write_u32(PAGE_SIZE as u32, 7).is_err());

        mem.grow(1);
        let mut view = MemoryView::new(&mut mem);
        view.write_u32(PAGE_SIZE as u32, 7).unwrap();
        assert_eq!(view.read_u32(PAGE_SIZE as u32).unwrap(), 7);
        assert_eq!(view.size(), 2 * PAGE_SIZE as u64);
    }

    #[test]
    fn test_read_f32s() {
        let mut mem = VecMemory::with_size(32);
        {
            let mut view = MemoryView::new(&mut mem);
            for (i, v) in [1.0f32, -2.0, 0.25].iter().enumerate() {
                view.write_f32(4 + i as u32 * 4, *v).unwrap();
            }
        }
        let view = MemoryView::new(&mut mem);
        assert_eq!(view.read_f32s(4, 3).unwrap(), vec![1.0, -2.0, 0.25]);
    }
}
