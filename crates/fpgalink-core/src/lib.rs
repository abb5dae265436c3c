//! Client library for FPGALink-compatible USB FPGA/microcontroller bridge
//! devices.
//!
//! A bridge device exposes two protocol families over one USB connection:
//!
//! - **CommFPGA** — byte-oriented channel reads and writes between host and
//!   FPGA logic, over a numbered conduit, with both synchronous and
//!   pipelined (submit/await) transfer modes.
//! - **NeroProg** — bit-level programming and debug access: JTAG shifting
//!   and chain scan, SPI transfer, raw microcontroller port access, and
//!   firmware management.
//!
//! The physical USB plumbing and the firmware wire protocol live behind the
//! [`Transport`] trait; this crate supplies the client-side contract on top
//! of it — capability caching, operation ordering, parameter validation,
//! staging through a session-owned [`ScratchBuffer`], and a typed error
//! taxonomy carrying the transport's numeric status codes.
//!
//! Open a [`FpgaLink`] handle from a transport, issue channel or JTAG/SPI
//! operations against it, and drop (or [`close`](FpgaLink::close)) it to
//! release the device claim deterministically. The handle is single-use and
//! not thread-safe: exactly one operation is outstanding at a time, and
//! "asynchronous" means pipelined rather than parallel.
//!
//! An in-memory emulated device for tests and hardware-free development is
//! provided by the `fpgalink-dummy` crate.

pub mod comm;
pub mod device;
pub mod error;
pub mod jtag;
pub mod scratch;
pub mod spi;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

// ---- Convenience re-exports ----

pub use device::{
    await_device, is_device_available, load_custom_firmware, load_standard_firmware, FpgaLink,
};
pub use error::{status, Error, Result};
pub use jtag::bits_to_bytes;
pub use scratch::ScratchBuffer;
pub use transport::{Fault, TdiSource, Transport, TransportResult};
pub use types::{
    BitOrder, Conduit, LogicalPort, PhysicalPort, PinConfig, PinSpec, ProgPorts,
};
