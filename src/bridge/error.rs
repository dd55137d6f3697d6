//! Error types for the import bridge
//!
//! Nothing here is ever returned to the guest module. Its calling convention
//! has no notion of exceptions: an `Err` coming out of an import is turned
//! into a JS throw by the glue, which unwinds (or traps) the guest.

use std::fmt;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors raised while booting the module or servicing an import
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// A handle that is not live in its class table
    UnknownHandle {
        class: &'static str,
        handle: u32,
    },

    /// Memory access out of bounds
    MemoryAccessOutOfBounds {
        address: u32,
        size: u64,
        memory_size: u64,
    },

    /// NUL-terminated string ran off the end of memory
    UnterminatedString {
        address: u32,
    },

    /// Graphics import called before `web_create_canvas`
    NoGraphicsContext {
        import: &'static str,
    },

    /// The module registered its frame callback; the entry point must not
    /// continue running
    Unwind,

    /// The module called `proc_exit`
    Exit {
        code: i32,
    },

    /// The module trapped or threw outside the bridge's control flow
    Trap {
        reason: String,
    },

    /// Fetching the module binary failed
    Fetch {
        url: String,
        reason: String,
    },

    /// Module compilation or instantiation failed
    InstantiationFailed {
        reason: String,
    },

    /// Required export is missing
    MissingExport {
        name: &'static str,
    },

    /// Export has wrong type
    WrongExportType {
        name: &'static str,
        expected: &'static str,
    },

    /// Platform setup failed (no window, no canvas, no WebGL2)
    Platform {
        reason: String,
    },

    /// Configuration could not be parsed
    Config {
        reason: String,
    },
}

impl BridgeError {
    /// Errors that are the module's intended control flow rather than defects
    pub fn is_control_flow(&self) -> bool {
        matches!(self, Self::Unwind | Self::Exit { .. })
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownHandle { class, handle } => {
                write!(f, "unknown {} handle: {}", class, handle)
            }
            Self::MemoryAccessOutOfBounds {
                address,
                size,
                memory_size,
            } => {
                write!(
                    f,
                    "memory access out of bounds: address {} + size {} > memory size {}",
                    address, size, memory_size
                )
            }
            Self::UnterminatedString { address } => {
                write!(f, "string at {} has no terminator before end of memory", address)
            }
            Self::NoGraphicsContext { import } => {
                write!(f, "'{}' called before a graphics context was created", import)
            }
            Self::Unwind => write!(f, "frame callback registered, unwinding entry point"),
            Self::Exit { code } => write!(f, "module exited with code {}", code),
            Self::Trap { reason } => write!(f, "module trapped: {}", reason),
            Self::Fetch { url, reason } => write!(f, "failed to fetch '{}': {}", url, reason),
            Self::InstantiationFailed { reason } => {
                write!(f, "module instantiation failed: {}", reason)
            }
            Self::MissingExport { name } => write!(f, "missing required export: '{}'", name),
            Self::WrongExportType { name, expected } => {
                write!(f, "export '{}' has wrong type: expected {}", name, expected)
            }
            Self::Platform { reason } => write!(f, "platform error: {}", reason),
            Self::Config { reason } => write!(f, "invalid bridge config: {}", reason),
        }
    }
}

impl std::error::Error for BridgeError {}

impl From<crate::platform::PlatformError> for BridgeError {
    fn from(err: crate::platform::PlatformError) -> Self {
        Self::Platform {
            reason: err.to_string(),
        }
    }
}
