//! The device handle: connection lifecycle, capability cache and port
//! access.
//!
//! [`FpgaLink`] is the main type in this crate. It represents one open
//! connection to a bridge device, caches the capability flags and firmware
//! identity queried at open time, and owns the scratch buffer and the
//! async-transfer bookkeeping that the channel and JTAG/SPI engines rely on.

use std::collections::VecDeque;
use std::path::Path;

use crate::error::{Error, Result};
use crate::scratch::ScratchBuffer;
use crate::transport::Transport;
use crate::types::{Conduit, PinConfig, PinSpec, ProgPorts};

/// Default async write chunk size: the 64 KiB framing ceiling of the
/// channel protocol.
pub(crate) const DEFAULT_CHUNK_SIZE: u32 = 0x10000;

/// A read submitted with
/// [`read_channel_async_submit`](FpgaLink::read_channel_async_submit) and
/// not yet awaited.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PendingRead {
    #[allow(dead_code)] // Kept for diagnostics; the transport tracks the channel itself
    pub channel: u8,
    pub count: usize,
}

/// An open connection to an FPGALink-compatible bridge device.
///
/// Exactly one `FpgaLink` models one physical connection. The handle is
/// single-use: it is created by a successful [`open`](Self::open), consumed
/// by [`close`](Self::close), and releases the underlying device claim on
/// drop, so the claim cannot leak on early-return paths.
///
/// One operation is outstanding at a time; "asynchronous" operations are
/// pipelined, not parallel, and their ordering rules are enforced by the
/// submit/await and pending-write state rather than locks.
pub struct FpgaLink<T: Transport> {
    pub(crate) transport: T,
    closed: bool,

    // Capabilities and identity cached at open
    nero_capable: bool,
    comm_capable: u16,
    firmware_id: u16,
    firmware_version: u32,

    conduit: Conduit,
    pub(crate) scratch: ScratchBuffer,

    // Async write state
    pub(crate) chunk_size: u32,
    pub(crate) pending_bytes: bool,

    // Async read state, FIFO in submission order
    pub(crate) pending_reads: VecDeque<PendingRead>,

    // Port map recorded by the most recent prog_open
    pub(crate) prog_ports: Option<ProgPorts>,
}

impl<T: Transport> std::fmt::Debug for FpgaLink<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FpgaLink")
            .field("nero_capable", &self.nero_capable)
            .field("comm_capable", &format_args!("{:#06x}", self.comm_capable))
            .field("firmware_id", &format_args!("{:#06x}", self.firmware_id))
            .field("conduit", &self.conduit)
            .finish_non_exhaustive()
    }
}

// ---- Construction / lifecycle ----

impl<T: Transport> FpgaLink<T> {
    /// Open a connection to the device matching `selector` (`"VVVV:PPPP"`,
    /// optionally with a `":DDDD"` device ID).
    ///
    /// Connects, verifies the device speaks the bridge protocol, and caches
    /// its capability flags and firmware identity. On failure no handle
    /// exists, so the capability accessors cannot be called against a failed
    /// open.
    pub fn open(mut transport: T, selector: &str) -> Result<Self> {
        transport.open(selector)?;
        let nero_capable = transport.is_nero_capable();
        let mut comm_capable = 0u16;
        for value in 0..16u8 {
            if let Some(conduit) = Conduit::new(value) {
                if transport.is_comm_capable(conduit) {
                    comm_capable |= 1 << value;
                }
            }
        }
        let firmware_id = transport.firmware_id();
        let firmware_version = transport.firmware_version();
        log::debug!(
            "opened {selector}: nero={nero_capable} comm={comm_capable:#06x} \
             firmware {firmware_id:04X}/{firmware_version:08X}"
        );
        Ok(Self {
            transport,
            closed: false,
            nero_capable,
            comm_capable,
            firmware_id,
            firmware_version,
            conduit: Conduit::default(),
            scratch: ScratchBuffer::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            pending_bytes: false,
            pending_reads: VecDeque::new(),
            prog_ports: None,
        })
    }

    /// Close the connection, consuming the handle.
    ///
    /// Dropping the handle has the same effect; `close` exists for callers
    /// who want the release to be visible in the source.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            if self.pending_bytes {
                // Best-effort: push any buffered write data out before the
                // claim goes away, as the device expects.
                let _ = self.transport.flush_async_writes();
            }
            self.transport.close();
        }
    }

    /// Borrow the underlying transport, e.g. to inspect an emulated device.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the underlying transport.
    ///
    /// Intended for scripting emulated devices; driving the transport's
    /// transfer operations directly bypasses the handle's ordering
    /// invariants.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

impl<T: Transport> Drop for FpgaLink<T> {
    fn drop(&mut self) {
        self.release();
    }
}

// ---- Capability cache ----

impl<T: Transport> FpgaLink<T> {
    /// Whether the device supports NeroProg (JTAG/SPI/port programming).
    ///
    /// Returns a flag determined at open; cannot fail.
    pub fn is_nero_capable(&self) -> bool {
        self.nero_capable
    }

    /// Whether the device supports CommFPGA on the given conduit.
    ///
    /// Returns a flag determined at open; cannot fail. Note this reflects
    /// the microcontroller's capabilities only — it cannot know whether the
    /// FPGA currently holds logic implementing the protocol.
    pub fn is_comm_capable(&self, conduit: Conduit) -> bool {
        self.comm_capable & (1 << conduit.value()) != 0
    }

    /// The 16-bit firmware ID, determined at open.
    pub fn firmware_id(&self) -> u16 {
        self.firmware_id
    }

    /// The 32-bit firmware version, determined at open. Printed as hex it
    /// gives an eight-digit ISO date.
    pub fn firmware_version(&self) -> u32 {
        self.firmware_version
    }

    /// The conduit CommFPGA operations currently go through.
    pub fn selected_conduit(&self) -> Conduit {
        self.conduit
    }

    /// Current capacity of the session's scratch buffer. Grows to the
    /// high-water mark of past operations and never shrinks.
    pub fn scratch_capacity(&self) -> usize {
        self.scratch.capacity()
    }

    pub(crate) fn require_comm(&self, operation: &str) -> Result<()> {
        if !self.is_comm_capable(self.conduit) {
            return Err(Error::Capability(format!(
                "{operation}(): this device does not support CommFPGA on conduit {}",
                self.conduit
            )));
        }
        Ok(())
    }

    pub(crate) fn require_nero(&self, operation: &str) -> Result<()> {
        if !self.nero_capable {
            return Err(Error::Capability(format!(
                "{operation}(): this device does not support NeroProg"
            )));
        }
        Ok(())
    }

    pub(crate) fn require_no_async_reads(&self, operation: &str) -> Result<()> {
        if !self.pending_reads.is_empty() {
            return Err(Error::protocol(format!(
                "{operation}(): illegal while an asynchronous read is outstanding"
            )));
        }
        Ok(())
    }
}

// ---- Conduit selection / FPGA status ----

impl<T: Transport> FpgaLink<T> {
    /// Select the conduit for subsequent CommFPGA operations.
    ///
    /// Fails if the device rejects the selection. Out-of-range conduit
    /// numbers are unrepresentable: construct the [`Conduit`] with
    /// [`Conduit::new`].
    pub fn select_conduit(&mut self, conduit: Conduit) -> Result<()> {
        self.transport.select_conduit(conduit)?;
        self.conduit = conduit;
        Ok(())
    }

    /// Check whether the FPGA asserts readiness on the selected conduit.
    ///
    /// Conduits without this capability optimistically report `true`.
    pub fn is_fpga_running(&mut self) -> Result<bool> {
        self.require_comm("is_fpga_running")?;
        Ok(self.transport.is_fpga_running()?)
    }
}

// ---- Raw port access ----

impl<T: Transport> FpgaLink<T> {
    /// Configure a single microcontroller port bit and read back its
    /// current state.
    pub fn single_bit_port_access(
        &mut self,
        port: u8,
        bit: u8,
        config: PinConfig,
    ) -> Result<bool> {
        Ok(self.transport.single_bit_port_access(port, bit, config)?)
    }

    /// Configure several port bits from a spec such as `"A12-,B2+,C7?"`
    /// (`+` high, `-` low, `?` input) and read back their states, LSB
    /// first in list order.
    ///
    /// A malformed spec is rejected before any transport call.
    pub fn multi_bit_port_access(&mut self, port_config: &str) -> Result<u32> {
        let pins = PinSpec::parse_list(port_config)?;
        Ok(self.transport.multi_bit_port_access(&pins)?)
    }
}

// ---- Firmware management (delegated to the transport) ----

impl<T: Transport> FpgaLink<T> {
    /// Flash precompiled bridge firmware into the device's EEPROM so that
    /// it enumerates as `new_vp` on power-on.
    ///
    /// This permanently alters the hardware; take a backup first with
    /// [`save_firmware`](Self::save_firmware).
    pub fn flash_standard_firmware(&mut self, new_vp: &str) -> Result<()> {
        Ok(self.transport.flash_standard_firmware(new_vp)?)
    }

    /// Flash a custom firmware file into the device's EEPROM.
    pub fn flash_custom_firmware(&mut self, firmware: &Path) -> Result<()> {
        Ok(self.transport.flash_custom_firmware(firmware)?)
    }

    /// Save the device's existing EEPROM firmware to `dest` for backup.
    /// `eeprom_kbits` is the EEPROM size in kilobits.
    pub fn save_firmware(&mut self, eeprom_kbits: u32, dest: &Path) -> Result<()> {
        Ok(self.transport.save_firmware(eeprom_kbits, dest)?)
    }

    /// Put the device into its firmware-upgrade bootloader.
    pub fn bootloader(&mut self) -> Result<()> {
        Ok(self.transport.bootloader()?)
    }
}

// ---- Handle-free operations ----

/// Check whether a device matching `selector` is connected, without opening
/// it.
///
/// Shortly after a firmware load the old identity may still be visible;
/// either wait, or pick a new VID:PID distinct from the current one.
pub fn is_device_available<T: Transport>(transport: &mut T, selector: &str) -> Result<bool> {
    Ok(transport.is_device_available(selector)?)
}

/// Wait for a device to (re)appear after renumeration or connection.
///
/// Sleeps a fixed 1000 ms (covering the typical renumeration window), then
/// polls every 100 ms, decrementing a countdown that starts at
/// `timeout_deciseconds`. Returns as soon as the device is available, and
/// fails with [`Error::Timeout`] once the countdown is exhausted. The loop
/// always polls at least once.
pub fn await_device<T: Transport>(
    transport: &mut T,
    selector: &str,
    timeout_deciseconds: u32,
) -> Result<()> {
    transport.sleep(1000);
    let mut remaining = timeout_deciseconds;
    loop {
        transport.sleep(100);
        if transport.is_device_available(selector)? {
            return Ok(());
        }
        if remaining <= 1 {
            return Err(Error::Timeout);
        }
        remaining -= 1;
    }
}

/// Load precompiled bridge firmware into the RAM of the device currently at
/// `current_vp`, making it renumerate as `new_vp`.
///
/// The change is not permanent. Follow up with [`await_device`] on the new
/// VID:PID before opening.
pub fn load_standard_firmware<T: Transport>(
    transport: &mut T,
    current_vp: &str,
    new_vp: &str,
) -> Result<()> {
    Ok(transport.load_standard_firmware(current_vp, new_vp)?)
}

/// Load a custom firmware file into the RAM of the device currently at
/// `current_vp`. The change is not permanent.
pub fn load_custom_firmware<T: Transport>(
    transport: &mut T,
    current_vp: &str,
    firmware: &Path,
) -> Result<()> {
    Ok(transport.load_custom_firmware(current_vp, firmware)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::NullTransport;

    #[test]
    fn open_caches_capabilities() {
        let transport = NullTransport::new();
        let link = FpgaLink::open(transport, "1D50:602B").unwrap();
        assert!(link.is_nero_capable());
        assert!(link.is_comm_capable(Conduit::default()));
        assert!(!link.is_comm_capable(Conduit::new(2).unwrap()));
        assert_eq!(link.firmware_id(), 0xFFFF);
        assert_eq!(link.firmware_version(), 0x2013_1217);
        assert_eq!(link.selected_conduit(), Conduit::default());
    }

    #[test]
    fn capability_error_without_comm_support() {
        let transport = NullTransport::without_capabilities();
        let mut link = FpgaLink::open(transport, "1D50:602B").unwrap();
        let err = link.is_fpga_running().unwrap_err();
        assert!(matches!(err, Error::Capability(_)));
        // No transport call was made for the rejected operation.
        assert_eq!(link.transport().calls_after_open(), 0);
    }

    #[test]
    fn malformed_port_spec_rejected_before_transport() {
        let transport = NullTransport::new();
        let mut link = FpgaLink::open(transport, "1D50:602B").unwrap();
        let err = link.multi_bit_port_access("A0*").unwrap_err();
        assert!(matches!(err, Error::Protocol { code: 0, .. }));
        assert_eq!(link.transport().calls_after_open(), 0);
    }
}
