//! WASI preview1 syscall shim
//!
//! Just enough of `wasi_snapshot_preview1` for a libc-based guest to start,
//! print and read the clock. There is no file system: stdio works, every
//! other descriptor is bad, and every path call is refused. All results are
//! errno values; nothing here traps except a malformed pointer.

use super::abi::{FdStat, Iovec, errno, fd};
use super::error::{BridgeError, BridgeResult};
use super::memory::{LinearMemory, MemoryView, latin1};
use crate::platform::Platform;

/// Syscall state that outlives a single call
#[derive(Debug, Default)]
pub struct Syscalls {
    /// Last value returned by `clock_time_get`
    last_clock_ns: u64,
    /// Code passed to `proc_exit`
    exit_code: Option<i32>,
    /// Log calls into stubs
    trace: bool,
}

fn is_stdio(descriptor: i32) -> bool {
    (fd::STDIN..=fd::STDERR).contains(&descriptor)
}

impl Syscalls {
    pub fn new(trace: bool) -> Self {
        Self {
            trace,
            ..Self::default()
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Report a stub call when tracing, then return its errno
    fn stub<P: Platform + ?Sized>(&self, platform: &mut P, name: &str, result: i32) -> i32 {
        if self.trace {
            platform.warn(&format!("[wasi] {} (stub) -> {}", name, result));
        }
        result
    }

    /// `args_sizes_get` / `environ_sizes_get`: no arguments, no environment
    pub fn sizes_get<M: LinearMemory + ?Sized, P: Platform + ?Sized>(
        &self,
        mem: &mut MemoryView<'_, M>,
        platform: &mut P,
        name: &str,
        count: u32,
        buf_size: u32,
    ) -> BridgeResult<i32> {
        mem.write_u32(count, 0)?;
        mem.write_u32(buf_size, 0)?;
        Ok(self.stub(platform, name, errno::SUCCESS))
    }

    /// `args_get` / `environ_get`: nothing to write
    pub fn list_get<P: Platform + ?Sized>(&self, platform: &mut P, name: &str) -> i32 {
        self.stub(platform, name, errno::SUCCESS)
    }

    /// Nanoseconds from the platform timer, never less than the last reading
    pub fn clock_time_get<M: LinearMemory + ?Sized, P: Platform + ?Sized>(
        &mut self,
        mem: &mut MemoryView<'_, M>,
        platform: &mut P,
        out: u32,
    ) -> BridgeResult<i32> {
        let now = platform.now_ns().max(self.last_clock_ns);
        self.last_clock_ns = now;
        mem.write_u64(out, now)?;
        Ok(errno::SUCCESS)
    }

    /// Gather the iovecs of an `fd_write` into one byte string
    fn gather<M: LinearMemory + ?Sized>(
        mem: &MemoryView<'_, M>,
        iovs: u32,
        iovs_len: u32,
    ) -> BridgeResult<Vec<u8>> {
        let raw = mem.read_bytes(iovs, iovs_len.saturating_mul(Iovec::SIZE))?;

        let mut bytes = Vec::new();
        for chunk in raw.chunks_exact(Iovec::SIZE as usize) {
            let iov = bytemuck::pod_read_unaligned::<Iovec>(chunk).from_le();
            bytes.extend(mem.read_bytes(iov.buf, iov.buf_len)?);
        }
        Ok(bytes)
    }

    /// Stdout and stderr go to the platform's streams, one emission per call
    pub fn fd_write<M: LinearMemory + ?Sized, P: Platform + ?Sized>(
        &self,
        mem: &mut MemoryView<'_, M>,
        platform: &mut P,
        descriptor: i32,
        iovs: u32,
        iovs_len: u32,
        nwritten: u32,
    ) -> BridgeResult<i32> {
        if descriptor != fd::STDOUT && descriptor != fd::STDERR {
            return Ok(errno::BADF);
        }

        let bytes = Self::gather(mem, iovs, iovs_len)?;
        let text = latin1(&bytes);
        if descriptor == fd::STDOUT {
            platform.write_stdout(&text);
        } else {
            platform.write_stderr(&text);
        }

        mem.write_u32(nwritten, bytes.len() as u32)?;
        Ok(errno::SUCCESS)
    }

    /// Stdin is always at end of file
    pub fn fd_read<M: LinearMemory + ?Sized, P: Platform + ?Sized>(
        &self,
        mem: &mut MemoryView<'_, M>,
        platform: &mut P,
        descriptor: i32,
        nread: u32,
    ) -> BridgeResult<i32> {
        if descriptor != fd::STDIN {
            return Ok(self.stub(platform, "fd_read", errno::BADF));
        }
        mem.write_u32(nread, 0)?;
        Ok(self.stub(platform, "fd_read", errno::SUCCESS))
    }

    pub fn fd_fdstat_get<M: LinearMemory + ?Sized, P: Platform + ?Sized>(
        &self,
        mem: &mut MemoryView<'_, M>,
        platform: &mut P,
        descriptor: i32,
        out: u32,
    ) -> BridgeResult<i32> {
        if !is_stdio(descriptor) {
            return Ok(self.stub(platform, "fd_fdstat_get", errno::BADF));
        }
        mem.write_pod(out, &FdStat::character_device())?;
        Ok(self.stub(platform, "fd_fdstat_get", errno::SUCCESS))
    }

    pub fn fd_close<P: Platform + ?Sized>(&self, platform: &mut P, descriptor: i32) -> i32 {
        let result = if is_stdio(descriptor) {
            errno::SUCCESS
        } else {
            errno::BADF
        };
        self.stub(platform, "fd_close", result)
    }

    pub fn fd_seek<P: Platform + ?Sized>(&self, platform: &mut P, descriptor: i32) -> i32 {
        let result = if is_stdio(descriptor) {
            errno::SPIPE
        } else {
            errno::BADF
        };
        self.stub(platform, "fd_seek", result)
    }

    /// Calls with a fixed answer: no preopens, no directories, no paths
    pub fn refuse<P: Platform + ?Sized>(&self, platform: &mut P, name: &str, result: i32) -> i32 {
        self.stub(platform, name, result)
    }

    /// No subscriptions ever fire
    pub fn poll_oneoff<M: LinearMemory + ?Sized, P: Platform + ?Sized>(
        &self,
        mem: &mut MemoryView<'_, M>,
        platform: &mut P,
        nevents: u32,
    ) -> BridgeResult<i32> {
        mem.write_u32(nevents, 0)?;
        Ok(self.stub(platform, "poll_oneoff", errno::SUCCESS))
    }

    /// Record the exit code and unwind the guest
    pub fn proc_exit(&mut self, code: i32) -> BridgeError {
        crate::console_log!("[wasi] proc_exit({})", code);
        self.exit_code = Some(code);
        BridgeError::Exit { code }
    }
}
