//! Error types and the transport status-code mapping.
//!
//! Every fallible transport operation reports a numeric status code plus an
//! owned message (see [`Fault`](crate::transport::Fault)). Converting a fault
//! into an [`Error`] moves the message out of the fault exactly once; Rust
//! move semantics make a second read, a double free or a leak on the failure
//! path unrepresentable.

use crate::transport::Fault;

/// Numeric status codes used by FPGALink-compatible transports.
///
/// The values mirror libfpgalink's `FLStatus` vocabulary, so a transport
/// wrapping the C library can pass its return codes straight through.
pub mod status {
    /// The operation completed successfully.
    pub const SUCCESS: i32 = 0;
    /// There was a memory allocation error.
    pub const ALLOC_ERR: i32 = 1;
    /// There was some USB-related problem.
    pub const USB_ERR: i32 = 2;
    /// The device is probably not a valid FPGALink device.
    pub const PROTOCOL_ERR: i32 = 3;
    /// The device did an unexpected early read termination.
    pub const EARLY_TERM: i32 = 4;
    /// There was some problem talking to the FX2 chip.
    pub const FX2_ERR: i32 = 5;
    /// There was a file-related problem.
    pub const FILE_ERR: i32 = 6;
    /// A programming file contains an unsupported command.
    pub const UNSUPPORTED_CMD_ERR: i32 = 7;
    /// A programming file contains unsupported data.
    pub const UNSUPPORTED_DATA_ERR: i32 = 8;
    /// A programming file needs more buffer space than is available.
    pub const UNSUPPORTED_SIZE_ERR: i32 = 9;
    /// An SVF file is not parseable.
    pub const SVF_PARSE_ERR: i32 = 10;
    /// The supplied programming config is malformed.
    pub const CONF_FORMAT: i32 = 11;
    /// There was a problem remapping ports for programming.
    pub const PROG_PORT_MAP: i32 = 12;
    /// There was a problem sending data during programming.
    pub const PROG_SEND: i32 = 13;
    /// There was a problem receiving data during programming.
    pub const PROG_RECV: i32 = 14;
    /// There was a problem with the requested shift operation.
    pub const PROG_SHIFT: i32 = 15;
    /// There was a problem navigating the JTAG state machine.
    pub const PROG_JTAG_FSM: i32 = 16;
    /// There was a problem issuing clocks during programming.
    pub const PROG_JTAG_CLOCKS: i32 = 17;
    /// An SVF compare operation failed.
    pub const PROG_SVF_COMPARE: i32 = 18;
    /// An unknown SVF command was encountered.
    pub const PROG_SVF_UNKNOWN_CMD: i32 = 19;
    /// The device failed to start after programming.
    pub const PROG_ERR: i32 = 20;
    /// There was a problem doing port I/O.
    pub const PORT_IO: i32 = 21;
    /// The operation is illegal in the current state.
    pub const BAD_STATE: i32 = 22;
    /// An internal error occurred.
    pub const INTERNAL_ERR: i32 = 23;
}

/// The error type for FPGALink operations.
///
/// Errors originating from a transport fault carry the transport's numeric
/// status code and message; errors detected client-side (before any transport
/// call) carry code `0`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Native buffer exhaustion inside the transport.
    #[error("allocation failure (status {code}): {message}")]
    Alloc {
        /// Transport status code.
        code: i32,
        /// Transport-supplied description.
        message: String,
    },

    /// A USB-level I/O failure, including early read termination.
    #[error("transport error (status {code}): {message}")]
    Transport {
        /// Transport status code.
        code: i32,
        /// Transport-supplied description.
        message: String,
    },

    /// A malformed configuration string, a length mismatch, an out-of-range
    /// parameter, or an illegal operation ordering. Where possible this is
    /// detected and rejected before any transport call (code `0`).
    #[error("protocol error: {message}")]
    Protocol {
        /// Transport status code, or `0` when detected client-side.
        code: i32,
        /// Description of the violation.
        message: String,
    },

    /// An operation was attempted without the required device capability.
    #[error("capability error: {0}")]
    Capability(String),

    /// The firmware explicitly rejected a command: port mapping, data
    /// acceptance, TAP navigation, clocking or port I/O.
    #[error("device refused (status {code}): {message}")]
    Refused {
        /// Transport status code.
        code: i32,
        /// Transport-supplied description.
        message: String,
    },

    /// A bounded wait elapsed without the device becoming available.
    #[error("timed out waiting for device")]
    Timeout,
}

impl Error {
    /// Build a client-side protocol error (status code `0`).
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol {
            code: 0,
            message: message.into(),
        }
    }

    /// The machine-checkable status code attached to this error.
    ///
    /// Client-side rejections, capability errors and timeouts report `0`.
    pub fn status_code(&self) -> i32 {
        match self {
            Error::Alloc { code, .. }
            | Error::Transport { code, .. }
            | Error::Protocol { code, .. }
            | Error::Refused { code, .. } => *code,
            Error::Capability(_) | Error::Timeout => 0,
        }
    }
}

impl From<Fault> for Error {
    /// Convert a raw transport fault into a typed error.
    ///
    /// The fault's message is moved, not cloned: it is read once and released
    /// when the resulting error is dropped.
    fn from(fault: Fault) -> Self {
        let Fault { code, message } = fault;
        match code {
            status::ALLOC_ERR => Error::Alloc { code, message },
            status::PROTOCOL_ERR
            | status::FILE_ERR
            | status::UNSUPPORTED_CMD_ERR
            | status::UNSUPPORTED_DATA_ERR
            | status::UNSUPPORTED_SIZE_ERR
            | status::SVF_PARSE_ERR
            | status::CONF_FORMAT
            | status::PROG_SVF_COMPARE
            | status::PROG_SVF_UNKNOWN_CMD
            | status::BAD_STATE => Error::Protocol { code, message },
            status::PROG_PORT_MAP..=status::PROG_JTAG_CLOCKS
            | status::PROG_ERR
            | status::PORT_IO => Error::Refused { code, message },
            _ => Error::Transport { code, message },
        }
    }
}

/// A specialized `Result` type for FPGALink operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn fault(code: i32) -> Fault {
        Fault {
            code,
            message: format!("status {code}"),
        }
    }

    #[test]
    fn alloc_code_maps_to_alloc() {
        assert!(matches!(
            Error::from(fault(status::ALLOC_ERR)),
            Error::Alloc { code: 1, .. }
        ));
    }

    #[test]
    fn usb_and_early_term_map_to_transport() {
        for code in [status::USB_ERR, status::EARLY_TERM, status::FX2_ERR] {
            assert!(matches!(
                Error::from(fault(code)),
                Error::Transport { .. }
            ));
        }
    }

    #[test]
    fn config_and_state_codes_map_to_protocol() {
        for code in [status::PROTOCOL_ERR, status::CONF_FORMAT, status::BAD_STATE] {
            assert!(matches!(Error::from(fault(code)), Error::Protocol { .. }));
        }
    }

    #[test]
    fn firmware_rejections_map_to_refused() {
        for code in [
            status::PROG_PORT_MAP,
            status::PROG_SEND,
            status::PROG_RECV,
            status::PROG_SHIFT,
            status::PROG_JTAG_FSM,
            status::PROG_JTAG_CLOCKS,
            status::PROG_ERR,
            status::PORT_IO,
        ] {
            assert!(matches!(Error::from(fault(code)), Error::Refused { .. }));
        }
    }

    #[test]
    fn conversion_preserves_code_and_message() {
        let err = Error::from(Fault {
            code: status::USB_ERR,
            message: "endpoint stalled".to_string(),
        });
        assert_eq!(err.status_code(), status::USB_ERR);
        assert_eq!(
            err.to_string(),
            "transport error (status 2): endpoint stalled"
        );
    }

    #[test]
    fn client_side_errors_report_code_zero() {
        let err = Error::protocol("zero-length reads are illegal");
        assert_eq!(err.status_code(), 0);
    }
}
