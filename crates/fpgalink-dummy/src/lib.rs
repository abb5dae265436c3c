//! fpgalink-dummy - In-memory emulated bridge device.
//!
//! This crate provides a [`Transport`] implementation that emulates an
//! FPGALink-compatible device entirely in memory: per-channel byte stores,
//! a TDI→TDO loopback JTAG chain, an SPI echo queue and a pin-state map.
//! It's useful for testing and development without real hardware, and its
//! scripting hooks (recorded sleeps, scheduled faults, operation log) let
//! tests reproduce timing and failure paths deterministically.

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;

use fpgalink_core::status;
use fpgalink_core::transport::{Fault, TdiSource, Transport, TransportResult};
use fpgalink_core::types::{BitOrder, Conduit, PinConfig, PinSpec, ProgPorts};

/// Configuration for the emulated device.
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Whether the device advertises NeroProg support.
    pub nero_capable: bool,
    /// Bitmask of conduits with CommFPGA support (bit n = conduit n).
    pub comm_conduits: u16,
    /// 16-bit firmware ID.
    pub firmware_id: u16,
    /// 32-bit firmware version (an ISO date in hex).
    pub firmware_version: u32,
    /// IDCODEs of the emulated JTAG chain, in scan order.
    pub chain: Vec<u32>,
    /// Whether the FPGA reports itself ready.
    pub fpga_running: bool,
    /// When set, channel reads that drain a store dry are padded with this
    /// byte instead of terminating early.
    pub fill: Option<u8>,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            nero_capable: true,
            comm_conduits: 1 << 1,
            firmware_id: 0xFFFF,
            firmware_version: 0x2013_1217,
            chain: vec![0x2400_1093], // a lone Spartan-6 LX9
            fpga_running: true,
            fill: None,
        }
    }
}

/// An emulated bridge device.
///
/// Channel writes append to per-channel byte stores and reads drain them,
/// so a test can preload a channel and observe exactly what a read
/// returns. JTAG shifts loop TDI straight back into TDO, as if the chain
/// were a zero-length wire. SPI sends queue bytes that subsequent receives
/// echo back, honouring the requested bit order.
pub struct DummyTransport {
    config: DummyConfig,
    open: bool,
    selected: Conduit,

    channels: BTreeMap<u8, VecDeque<u8>>,
    read_queue: VecDeque<(u8, usize)>,

    chunk_size: u32,
    buffered_writes: bool,
    in_flight_writes: bool,

    spi_echo: VecDeque<u8>,
    pins: BTreeMap<(u8, u8), bool>,
    prog_session: bool,

    available: bool,
    available_after: Option<u32>,
    sleeps: Vec<u32>,
    fail_next: Option<Fault>,
    deferred_fault: Option<Fault>,
    ops: Vec<&'static str>,
}

impl DummyTransport {
    /// Create an emulated device with the given configuration.
    pub fn new(config: DummyConfig) -> Self {
        Self {
            config,
            open: false,
            selected: Conduit::default(),
            channels: BTreeMap::new(),
            read_queue: VecDeque::new(),
            chunk_size: 0x10000,
            buffered_writes: false,
            in_flight_writes: false,
            spi_echo: VecDeque::new(),
            pins: BTreeMap::new(),
            prog_session: false,
            available: true,
            available_after: None,
            sleeps: Vec::new(),
            fail_next: None,
            deferred_fault: None,
            ops: Vec::new(),
        }
    }

    /// Create an emulated device with the default configuration.
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    // ---- Scripting hooks ----

    /// Deposit bytes into a channel's store, as if the FPGA had produced
    /// them.
    pub fn preload_channel(&mut self, channel: u8, data: &[u8]) {
        self.channels.entry(channel).or_default().extend(data);
    }

    /// Bytes currently stored for a channel (writes land here).
    pub fn channel_contents(&self, channel: u8) -> Vec<u8> {
        self.channels
            .get(&channel)
            .map(|store| store.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Fix the answer `is_device_available` gives.
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    /// Report the device unavailable for the next `polls` availability
    /// checks, then available.
    pub fn available_after(&mut self, polls: u32) {
        self.available_after = Some(polls);
    }

    /// Schedule a fault for the next fallible operation.
    pub fn fail_next(&mut self, code: i32, message: impl Into<String>) {
        self.fail_next = Some(Fault::new(code, message));
    }

    /// Schedule a fault that surfaces at the next flush/await, the way a
    /// USB error discovered mid-pipeline would.
    pub fn defer_fault(&mut self, code: i32, message: impl Into<String>) {
        self.deferred_fault = Some(Fault::new(code, message));
    }

    /// Every `sleep` duration requested so far, in milliseconds.
    pub fn sleeps(&self) -> &[u32] {
        &self.sleeps
    }

    /// Names of the operations invoked so far, in order.
    pub fn ops(&self) -> &[&'static str] {
        &self.ops
    }

    /// How many times the named operation was invoked.
    pub fn count_op(&self, name: &str) -> usize {
        self.ops.iter().filter(|op| **op == name).count()
    }

    /// Whether a programming session is currently open.
    pub fn prog_session_open(&self) -> bool {
        self.prog_session
    }

    /// The conduit most recently selected.
    pub fn selected_conduit(&self) -> Conduit {
        self.selected
    }

    // ---- Internals ----

    fn record(&mut self, op: &'static str) {
        self.ops.push(op);
    }

    fn take_fault(&mut self) -> TransportResult<()> {
        match self.fail_next.take() {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    fn take_deferred(&mut self) -> TransportResult<()> {
        match self.deferred_fault.take() {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }
}

/// Normalise a byte to MSB-first order for storage.
fn apply_order(byte: u8, order: BitOrder) -> u8 {
    match order {
        BitOrder::MsbFirst => byte,
        BitOrder::LsbFirst => byte.reverse_bits(),
    }
}

/// Accept `"VVVV:PPPP"` with an optional `":DDDD"` device ID.
fn selector_is_valid(selector: &str) -> bool {
    let hex4 = |part: &str| part.len() == 4 && part.chars().all(|c| c.is_ascii_hexdigit());
    let mut parts = selector.split(':');
    let (Some(vid), Some(pid)) = (parts.next(), parts.next()) else {
        return false;
    };
    if !hex4(vid) || !hex4(pid) {
        return false;
    }
    if let Some(did) = parts.next() {
        if !hex4(did) {
            return false;
        }
    }
    parts.next().is_none()
}

impl Transport for DummyTransport {
    fn open(&mut self, selector: &str) -> TransportResult<()> {
        self.record("open");
        self.take_fault()?;
        if !selector_is_valid(selector) {
            return Err(Fault::new(
                status::USB_ERR,
                format!(
                    "the supplied VID:PID {selector:?} is invalid; it should look like 1D50:602B"
                ),
            ));
        }
        if !self.available {
            return Err(Fault::new(
                status::USB_ERR,
                format!("device {selector} not found"),
            ));
        }
        log::debug!("dummy: opened as {selector}");
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.record("close");
        self.open = false;
    }

    fn is_device_available(&mut self, _selector: &str) -> TransportResult<bool> {
        self.record("isDeviceAvailable");
        self.take_fault()?;
        Ok(match self.available_after.as_mut() {
            Some(0) => true,
            Some(polls) => {
                *polls -= 1;
                false
            }
            None => self.available,
        })
    }

    fn sleep(&mut self, millis: u32) {
        // Recorded rather than slept, so tests can assert exact timing.
        self.sleeps.push(millis);
    }

    fn is_nero_capable(&self) -> bool {
        self.config.nero_capable
    }

    fn is_comm_capable(&self, conduit: Conduit) -> bool {
        self.config.comm_conduits & (1 << conduit.value()) != 0
    }

    fn firmware_id(&self) -> u16 {
        self.config.firmware_id
    }

    fn firmware_version(&self) -> u32 {
        self.config.firmware_version
    }

    fn select_conduit(&mut self, conduit: Conduit) -> TransportResult<()> {
        self.record("selectConduit");
        self.take_fault()?;
        self.selected = conduit;
        Ok(())
    }

    fn is_fpga_running(&mut self) -> TransportResult<bool> {
        self.record("isFpgaRunning");
        self.take_fault()?;
        Ok(self.config.fpga_running)
    }

    fn set_async_write_chunk_size(&mut self, size: u32) -> TransportResult<()> {
        self.record("setAsyncWriteChunkSize");
        self.take_fault()?;
        self.chunk_size = size;
        Ok(())
    }

    fn write_channel_async(&mut self, channel: u8, data: &[u8]) -> TransportResult<()> {
        self.record("writeChannelAsync");
        self.take_fault()?;
        self.channels.entry(channel).or_default().extend(data);
        self.buffered_writes = true;
        Ok(())
    }

    fn flush_async_writes(&mut self) -> TransportResult<()> {
        self.record("flushAsyncWrites");
        self.take_deferred()?;
        if self.buffered_writes {
            self.buffered_writes = false;
            self.in_flight_writes = true;
        }
        Ok(())
    }

    fn await_async_writes(&mut self) -> TransportResult<()> {
        self.record("awaitAsyncWrites");
        self.take_deferred()?;
        self.in_flight_writes = false;
        Ok(())
    }

    fn read_channel_async_submit(&mut self, channel: u8, count: usize) -> TransportResult<()> {
        self.record("readChannelAsyncSubmit");
        self.take_fault()?;
        self.read_queue.push_back((channel, count));
        Ok(())
    }

    fn read_channel_async_await(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        self.record("readChannelAsyncAwait");
        self.take_deferred()?;
        self.take_fault()?;
        let Some((channel, count)) = self.read_queue.pop_front() else {
            return Err(Fault::new(
                status::BAD_STATE,
                "no asynchronous read was submitted",
            ));
        };
        let wanted = count.min(buf.len());
        let store = self.channels.entry(channel).or_default();
        let mut produced = 0;
        while produced < wanted {
            match store.pop_front() {
                Some(byte) => {
                    buf[produced] = byte;
                    produced += 1;
                }
                None => break,
            }
        }
        if produced < wanted {
            if let Some(fill) = self.config.fill {
                buf[produced..wanted].fill(fill);
                produced = wanted;
            }
        }
        Ok(produced)
    }

    fn prog_open(&mut self, ports: &ProgPorts) -> TransportResult<()> {
        self.record("progOpen");
        self.take_fault()?;
        log::debug!(
            "dummy: programming session on MISO={} MOSI={} SS={} SCK={}",
            ports.miso,
            ports.mosi,
            ports.ss,
            ports.sck
        );
        self.prog_session = true;
        Ok(())
    }

    fn prog_close(&mut self) -> TransportResult<()> {
        self.record("progClose");
        self.take_fault()?;
        self.prog_session = false;
        Ok(())
    }

    fn jtag_shift_in_only(
        &mut self,
        _num_bits: u32,
        _tdi: TdiSource<'_>,
        _is_last: bool,
    ) -> TransportResult<()> {
        self.record("jtagShiftInOnly");
        self.take_fault()
    }

    fn jtag_shift_in_out(
        &mut self,
        _num_bits: u32,
        tdi: TdiSource<'_>,
        tdo: &mut [u8],
        _is_last: bool,
    ) -> TransportResult<()> {
        self.record("jtagShiftInOut");
        self.take_fault()?;
        // TDI wired straight to TDO.
        match tdi {
            TdiSource::Explicit(data) => {
                let len = data.len().min(tdo.len());
                tdo[..len].copy_from_slice(&data[..len]);
            }
            TdiSource::AllZeros => tdo.fill(0x00),
            TdiSource::AllOnes => tdo.fill(0xFF),
        }
        Ok(())
    }

    fn jtag_clock_fsm(&mut self, _bit_pattern: u32, _transition_count: u8) -> TransportResult<()> {
        self.record("jtagClockFsm");
        self.take_fault()
    }

    fn jtag_clocks(&mut self, _count: u32) -> TransportResult<()> {
        self.record("jtagClocks");
        self.take_fault()
    }

    fn jtag_scan_chain(
        &mut self,
        _ports: &ProgPorts,
        idcodes: &mut [u8],
    ) -> TransportResult<usize> {
        self.record("jtagScanChain");
        self.take_fault()?;
        let capacity = idcodes.len() / 4;
        for (slot, idcode) in idcodes
            .chunks_exact_mut(4)
            .zip(self.config.chain.iter())
            .take(capacity)
        {
            slot.copy_from_slice(&idcode.to_le_bytes());
        }
        Ok(self.config.chain.len())
    }

    fn spi_send(&mut self, data: &[u8], bit_order: BitOrder) -> TransportResult<()> {
        self.record("spiSend");
        self.take_fault()?;
        self.spi_echo
            .extend(data.iter().map(|&byte| apply_order(byte, bit_order)));
        Ok(())
    }

    fn spi_recv(&mut self, buf: &mut [u8], bit_order: BitOrder) -> TransportResult<()> {
        self.record("spiRecv");
        self.take_fault()?;
        for slot in buf.iter_mut() {
            let byte = self.spi_echo.pop_front().unwrap_or(0x00);
            *slot = apply_order(byte, bit_order);
        }
        Ok(())
    }

    fn single_bit_port_access(
        &mut self,
        port: u8,
        bit: u8,
        config: PinConfig,
    ) -> TransportResult<bool> {
        self.record("singleBitPortAccess");
        self.take_fault()?;
        let state = self.pins.entry((port, bit)).or_insert(false);
        match config {
            PinConfig::High => *state = true,
            PinConfig::Low => *state = false,
            PinConfig::Input => {}
        }
        Ok(*state)
    }

    fn multi_bit_port_access(&mut self, pins: &[PinSpec]) -> TransportResult<u32> {
        self.record("multiBitPortAccess");
        self.take_fault()?;
        let mut read_state = 0u32;
        for (index, spec) in pins.iter().enumerate() {
            let state = self
                .pins
                .entry((spec.pin.port, spec.pin.bit))
                .or_insert(false);
            match spec.config {
                PinConfig::High => *state = true,
                PinConfig::Low => *state = false,
                PinConfig::Input => {}
            }
            if *state {
                read_state |= 1 << index;
            }
        }
        Ok(read_state)
    }

    fn load_standard_firmware(&mut self, _current: &str, _new: &str) -> TransportResult<()> {
        self.record("loadStandardFirmware");
        self.take_fault()
    }

    fn flash_standard_firmware(&mut self, _new: &str) -> TransportResult<()> {
        self.record("flashStandardFirmware");
        self.take_fault()
    }

    fn load_custom_firmware(&mut self, _current: &str, _firmware: &Path) -> TransportResult<()> {
        self.record("loadCustomFirmware");
        self.take_fault()
    }

    fn flash_custom_firmware(&mut self, _firmware: &Path) -> TransportResult<()> {
        self.record("flashCustomFirmware");
        self.take_fault()
    }

    fn save_firmware(&mut self, _eeprom_kbits: u32, _dest: &Path) -> TransportResult<()> {
        self.record("saveFirmware");
        self.take_fault()
    }

    fn bootloader(&mut self) -> TransportResult<()> {
        self.record("bootloader");
        self.take_fault()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_validation() {
        assert!(selector_is_valid("1D50:602B"));
        assert!(selector_is_valid("04b4:8613"));
        assert!(selector_is_valid("1D50:602B:0004"));
        assert!(!selector_is_valid("1D50"));
        assert!(!selector_is_valid("1D50:602"));
        assert!(!selector_is_valid("1D50:602B:0004:1"));
        assert!(!selector_is_valid("xxxx:yyyy"));
    }

    #[test]
    fn bit_order_normalisation_round_trips() {
        assert_eq!(apply_order(0b1000_0000, BitOrder::LsbFirst), 0b0000_0001);
        assert_eq!(apply_order(0xA5, BitOrder::MsbFirst), 0xA5);
        for byte in [0x00u8, 0xFF, 0x5A, 0x81] {
            assert_eq!(
                apply_order(apply_order(byte, BitOrder::LsbFirst), BitOrder::LsbFirst),
                byte
            );
        }
    }

    #[test]
    fn channel_store_drains_in_order() {
        let mut dummy = DummyTransport::new_default();
        dummy.preload_channel(7, &[1, 2, 3, 4]);
        dummy.read_channel_async_submit(7, 4).unwrap();
        let mut buf = [0u8; 4];
        let actual = dummy.read_channel_async_await(&mut buf).unwrap();
        assert_eq!(actual, 4);
        assert_eq!(buf, [1, 2, 3, 4]);
        assert!(dummy.channel_contents(7).is_empty());
    }

    #[test]
    fn dry_store_terminates_early_without_fill() {
        let mut dummy = DummyTransport::new_default();
        dummy.preload_channel(0, &[9, 9]);
        dummy.read_channel_async_submit(0, 8).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(dummy.read_channel_async_await(&mut buf).unwrap(), 2);
    }

    #[test]
    fn dry_store_pads_with_fill_byte() {
        let mut dummy = DummyTransport::new(DummyConfig {
            fill: Some(0xAB),
            ..DummyConfig::default()
        });
        dummy.read_channel_async_submit(0, 4).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(dummy.read_channel_async_await(&mut buf).unwrap(), 4);
        assert_eq!(buf, [0xAB; 4]);
    }

    #[test]
    fn availability_countdown() {
        let mut dummy = DummyTransport::new_default();
        dummy.available_after(2);
        assert!(!dummy.is_device_available("1D50:602B").unwrap());
        assert!(!dummy.is_device_available("1D50:602B").unwrap());
        assert!(dummy.is_device_available("1D50:602B").unwrap());
    }
}
