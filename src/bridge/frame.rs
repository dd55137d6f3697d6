//! Frame driver
//!
//! The guest's entry point never returns normally: it registers a frame
//! callback through `web_raf` and then has to be unwound, after which the
//! host calls the callback once per paint tick, forever.
//!
//! ```text
//!   Idle --web_raf--> Scheduled --proc_exit--> Halted
//!                       |   ^
//!                       +---+ web_raf again replaces the callback
//! ```

use super::error::{BridgeError, BridgeResult};
use crate::console_error;

/// The guest's frame callback: an index into its indirect function table and
/// an opaque pointer passed back unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCallback {
    pub func: u32,
    pub opaque: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// No callback registered yet
    Idle,
    Scheduled(FrameCallback),
    /// The guest exited; nothing runs again
    Halted,
}

/// What the host loop should do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Request the next frame
    Continue,
    /// Stop requesting frames
    Stop,
}

/// Something that can call into the guest
pub trait FrameInvoker {
    /// Call `table[callback.func](callback.opaque)`
    fn invoke(&mut self, callback: FrameCallback) -> BridgeResult<()>;
}

#[derive(Debug)]
pub struct FrameDriver {
    state: FrameState,
    frames: u64,
}

impl FrameDriver {
    pub fn new() -> Self {
        Self {
            state: FrameState::Idle,
            frames: 0,
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Number of callbacks run so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn is_halted(&self) -> bool {
        self.state == FrameState::Halted
    }

    /// Register (or replace) the callback. A halted driver stays halted.
    pub fn schedule(&mut self, func: u32, opaque: u32) {
        if self.is_halted() {
            return;
        }
        self.state = FrameState::Scheduled(FrameCallback { func, opaque });
    }

    pub fn halt(&mut self) {
        self.state = FrameState::Halted;
    }

    /// Callback to run this tick, if any
    ///
    /// Split from `end_tick` so a host that shares the driver behind a
    /// `RefCell` can release its borrow while the guest runs.
    pub fn begin_tick(&mut self) -> Option<FrameCallback> {
        match self.state {
            FrameState::Scheduled(callback) => {
                self.frames += 1;
                Some(callback)
            }
            FrameState::Idle | FrameState::Halted => None,
        }
    }

    /// Account for the callback's result
    ///
    /// A callback that registers itself again unwinds the same way the entry
    /// point did; that is not a failure. A callback that traps is reported
    /// and the chain keeps going, as it would in a browser where the next
    /// frame was requested before the callback ran.
    pub fn end_tick(&mut self, result: BridgeResult<()>) -> TickOutcome {
        match result {
            Ok(()) | Err(BridgeError::Unwind) => {}
            Err(BridgeError::Exit { code }) => {
                crate::console_log!("[frame] guest exited with code {}", code);
                self.halt();
            }
            Err(e) => console_error!("[frame] callback failed: {}", e),
        }

        if self.is_halted() {
            TickOutcome::Stop
        } else {
            TickOutcome::Continue
        }
    }

    /// Run one tick: invoke the callback exactly once with its opaque value
    pub fn tick(&mut self, invoker: &mut impl FrameInvoker) -> TickOutcome {
        match self.begin_tick() {
            Some(callback) => {
                let result = invoker.invoke(callback);
                self.end_tick(result)
            }
            None if self.is_halted() => TickOutcome::Stop,
            None => TickOutcome::Continue,
        }
    }
}

impl Default for FrameDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        seen: Vec<FrameCallback>,
        result: fn(usize) -> BridgeResult<()>,
    }

    impl FrameInvoker for Recorder {
        fn invoke(&mut self, callback: FrameCallback) -> BridgeResult<()> {
            self.seen.push(callback);
            (self.result)(self.seen.len())
        }
    }

    fn recorder(result: fn(usize) -> BridgeResult<()>) -> Recorder {
        Recorder {
            seen: Vec::new(),
            result,
        }
    }

    #[test]
    fn test_idle_driver_does_nothing() {
        let mut driver = FrameDriver::new();
        let mut guest = recorder(|_| Ok(()));
        assert_eq!(driver.tick(&mut guest), TickOutcome::Continue);
        assert!(guest.seen.is_empty());
    }

    #[test]
    fn test_callback_runs_once_per_tick_with_same_opaque() {
        let mut driver = FrameDriver::new();
        driver.schedule(7, 0xABCD);
        let mut guest = recorder(|_| Ok(()));

        for _ in 0..5 {
            assert_eq!(driver.tick(&mut guest), TickOutcome::Continue);
        }
        assert_eq!(guest.seen.len(), 5);
        assert!(guest.seen.iter().all(|c| *c == FrameCallback { func: 7, opaque: 0xABCD }));
        assert_eq!(driver.frames(), 5);
    }

    #[test]
    fn test_reregistration_replaces_callback() {
        let mut driver = FrameDriver::new();
        driver.schedule(1, 10);
        driver.schedule(2, 20);
        assert_eq!(
            driver.state(),
            FrameState::Scheduled(FrameCallback { func: 2, opaque: 20 })
        );
    }

    #[test]
    fn test_unwind_from_callback_is_not_a_failure() {
        let mut driver = FrameDriver::new();
        driver.schedule(1, 0);
        let mut guest = recorder(|_| Err(BridgeError::Unwind));
        assert_eq!(driver.tick(&mut guest), TickOutcome::Continue);
    }

    #[test]
    fn test_exit_halts_the_chain() {
        let mut driver = FrameDriver::new();
        driver.schedule(1, 0);
        let mut guest = recorder(|n| {
            if n == 3 {
                Err(BridgeError::Exit { code: 0 })
            } else {
                Ok(())
            }
        });

        assert_eq!(driver.tick(&mut guest), TickOutcome::Continue);
        assert_eq!(driver.tick(&mut guest), TickOutcome::Continue);
        assert_eq!(driver.tick(&mut guest), TickOutcome::Stop);
        assert_eq!(driver.tick(&mut guest), TickOutcome::Stop);
        assert_eq!(guest.seen.len(), 3);

        // Nothing can bring a halted driver back
        driver.schedule(1, 0);
        assert!(driver.is_halted());
    }

    #[test]
    fn test_trapping_callback_keeps_the_chain() {
        let mut driver = FrameDriver::new();
        driver.schedule(4, 4);
        let mut guest = recorder(|_| Err(BridgeError::UnterminatedString { address: 0 }));
        assert_eq!(driver.tick(&mut guest), TickOutcome::Continue);
        assert_eq!(driver.tick(&mut guest), TickOutcome::Continue);
        assert_eq!(guest.seen.len(), 2);
    }
}
