//! The transport boundary.
//!
//! Everything below the client — USB plumbing, firmware wire protocol,
//! renumeration mechanics — sits behind the [`Transport`] trait. The
//! [`FpgaLink`](crate::FpgaLink) handle layers capability checks, operation
//! ordering, staging and error typing on top of these primitives.
//!
//! Implementations: a USB backend would wrap the native device protocol;
//! `fpgalink-dummy` provides an in-memory emulated bridge for tests and
//! hardware-free development.

use std::path::Path;

use crate::types::{BitOrder, Conduit, PinConfig, PinSpec, ProgPorts};

/// A raw failure reported by a transport operation: the numeric status code
/// plus an owned, human-readable message.
///
/// The message is owned by the fault; converting the fault into an
/// [`Error`](crate::Error) moves it out exactly once.
#[derive(Debug)]
pub struct Fault {
    /// Status code, one of the [`status`](crate::error::status) values.
    pub code: i32,
    /// Human-readable description produced by the transport.
    pub message: String,
}

impl Fault {
    /// Build a fault from a status code and message.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Result type for raw transport operations.
pub type TransportResult<T> = std::result::Result<T, Fault>;

/// The source of bits clocked into TDI during a JTAG shift.
///
/// The all-zeros and all-ones generators avoid materialising a pattern
/// buffer on the host; each transport chooses its own efficient
/// representation (the native wire protocol has dedicated encodings for
/// them).
#[derive(Debug, Clone, Copy)]
pub enum TdiSource<'a> {
    /// An explicit little-endian bit buffer of exactly
    /// [`bits_to_bytes(num_bits)`](crate::bits_to_bytes) bytes.
    Explicit(&'a [u8]),
    /// Clock in a run of `0` bits.
    AllZeros,
    /// Clock in a run of `1` bits.
    AllOnes,
}

/// Low-level access to an FPGALink-compatible bridge device.
///
/// Contract notes:
///
/// - `open` must leave the transport closed on failure; `close` must be
///   idempotent. The handle guarantees `close` runs on every exit path.
/// - The capability reads (`is_nero_capable`, `is_comm_capable`,
///   `firmware_id`, `firmware_version`) are infallible reads of state
///   established by a successful `open`.
/// - The asynchronous write primitives may defer a discovered failure to a
///   later `flush_async_writes` / `await_async_writes` /
///   `read_channel_async_await` call.
/// - `read_channel_async_await` resolves submitted reads strictly in
///   submission order.
pub trait Transport {
    /// Open a connection to the device matching `selector`
    /// (`"VVVV:PPPP"` with an optional `":DDDD"` device ID).
    fn open(&mut self, selector: &str) -> TransportResult<()>;

    /// Release the device claim. Idempotent.
    fn close(&mut self);

    /// Check whether a device matching `selector` is present on the bus.
    /// Usable without an open connection.
    fn is_device_available(&mut self, selector: &str) -> TransportResult<bool>;

    /// Sleep for `millis` milliseconds. Test transports may count instead of
    /// sleeping, which keeps poll timing reproducible.
    fn sleep(&mut self, millis: u32);

    /// Whether the device supports NeroProg (JTAG/SPI/port programming).
    fn is_nero_capable(&self) -> bool;

    /// Whether the device supports CommFPGA on the given conduit.
    fn is_comm_capable(&self, conduit: Conduit) -> bool;

    /// The 16-bit firmware ID.
    fn firmware_id(&self) -> u16;

    /// The 32-bit firmware version (an ISO date when printed in hex).
    fn firmware_version(&self) -> u32;

    /// Select the conduit for subsequent CommFPGA operations.
    fn select_conduit(&mut self, conduit: Conduit) -> TransportResult<()>;

    /// Whether the FPGA reports itself ready on the selected conduit.
    fn is_fpga_running(&mut self) -> TransportResult<bool>;

    /// Set the async write chunk size (`1..=0x10000`; range-checked by the
    /// caller before this is invoked).
    fn set_async_write_chunk_size(&mut self, size: u32) -> TransportResult<()>;

    /// Queue `data` for the FPGA channel without waiting for completion.
    fn write_channel_async(&mut self, channel: u8, data: &[u8]) -> TransportResult<()>;

    /// Force buffered write chunks onto the wire without awaiting
    /// acknowledgment.
    fn flush_async_writes(&mut self) -> TransportResult<()>;

    /// Block until every queued write has been received by the
    /// microcontroller, surfacing the first deferred failure.
    fn await_async_writes(&mut self) -> TransportResult<()>;

    /// Submit a read of `count` bytes (`1..=0x10000`) from the channel.
    fn read_channel_async_submit(&mut self, channel: u8, count: usize) -> TransportResult<()>;

    /// Complete the oldest submitted read into `buf`, returning the number
    /// of bytes actually produced (a short count is an early termination,
    /// not an error).
    fn read_channel_async_await(&mut self, buf: &mut [u8]) -> TransportResult<usize>;

    /// Map the four programming pins and drive them to their idle states.
    fn prog_open(&mut self, ports: &ProgPorts) -> TransportResult<()>;

    /// Tri-state the programming pins and end the session.
    fn prog_close(&mut self) -> TransportResult<()>;

    /// Shift `num_bits` bits LSB-first into TDI, discarding TDO. `is_last`
    /// exits to Exit1-xR on the final bit instead of remaining in Shift-xR.
    fn jtag_shift_in_only(
        &mut self,
        num_bits: u32,
        tdi: TdiSource<'_>,
        is_last: bool,
    ) -> TransportResult<()>;

    /// Shift `num_bits` bits LSB-first into TDI while capturing the same
    /// count from TDO into `tdo` (sized by the caller).
    fn jtag_shift_in_out(
        &mut self,
        num_bits: u32,
        tdi: TdiSource<'_>,
        tdo: &mut [u8],
        is_last: bool,
    ) -> TransportResult<()>;

    /// Clock `transition_count` bits of `bit_pattern`, LSB first, into TMS.
    fn jtag_clock_fsm(&mut self, bit_pattern: u32, transition_count: u8) -> TransportResult<()>;

    /// Toggle TCK `count` times.
    fn jtag_clocks(&mut self, count: u32) -> TransportResult<()>;

    /// Scan the JTAG chain, filling `idcodes` with little-endian 32-bit
    /// IDCODEs up to its capacity, and return the true number of devices on
    /// the chain (which may exceed the capacity).
    fn jtag_scan_chain(&mut self, ports: &ProgPorts, idcodes: &mut [u8]) -> TransportResult<usize>;

    /// Send whole bytes over SPI with the given bit order.
    fn spi_send(&mut self, data: &[u8], bit_order: BitOrder) -> TransportResult<()>;

    /// Receive `buf.len()` bytes over SPI with the given bit order.
    fn spi_recv(&mut self, buf: &mut [u8], bit_order: BitOrder) -> TransportResult<()>;

    /// Configure a single port bit and read back its current state.
    fn single_bit_port_access(
        &mut self,
        port: u8,
        bit: u8,
        config: PinConfig,
    ) -> TransportResult<bool>;

    /// Configure several port bits and read back their states, LSB first in
    /// list order.
    fn multi_bit_port_access(&mut self, pins: &[PinSpec]) -> TransportResult<u32>;

    /// Load precompiled firmware into the RAM of the device currently at
    /// `current_vp`, renumerating as `new_vp`. Usable without an open
    /// connection.
    fn load_standard_firmware(&mut self, current_vp: &str, new_vp: &str) -> TransportResult<()>;

    /// Flash precompiled firmware into the device's EEPROM so it enumerates
    /// as `new_vp` on power-on.
    fn flash_standard_firmware(&mut self, new_vp: &str) -> TransportResult<()>;

    /// Load a custom firmware file into the RAM of the device currently at
    /// `current_vp`. Usable without an open connection.
    fn load_custom_firmware(&mut self, current_vp: &str, firmware: &Path) -> TransportResult<()>;

    /// Flash a custom firmware file into the device's EEPROM.
    fn flash_custom_firmware(&mut self, firmware: &Path) -> TransportResult<()>;

    /// Save the device's existing EEPROM firmware to a backup file.
    fn save_firmware(&mut self, eeprom_kbits: u32, dest: &Path) -> TransportResult<()>;

    /// Put the device into its firmware-upgrade bootloader.
    fn bootloader(&mut self) -> TransportResult<()>;
}
