//! Minimal transport stub for unit tests.
//!
//! Every operation succeeds and is recorded by name, so tests can assert
//! that a rejected call never reached the transport. Reads produce
//! zero-filled buffers of the requested length. The full-fidelity emulated
//! device lives in the `fpgalink-dummy` crate.

use std::path::Path;

use crate::transport::{TdiSource, Transport, TransportResult};
use crate::types::{BitOrder, Conduit, PinConfig, PinSpec, ProgPorts};

pub(crate) struct NullTransport {
    nero_capable: bool,
    comm_capable: bool,
    ops: Vec<&'static str>,
}

impl NullTransport {
    pub fn new() -> Self {
        Self {
            nero_capable: true,
            comm_capable: true,
            ops: Vec::new(),
        }
    }

    pub fn without_capabilities() -> Self {
        Self {
            nero_capable: false,
            comm_capable: false,
            ops: Vec::new(),
        }
    }

    /// Fallible operations invoked since `open`.
    pub fn calls_after_open(&self) -> usize {
        self.ops.iter().filter(|op| **op != "open").count()
    }

    pub fn count_op(&self, name: &str) -> usize {
        self.ops.iter().filter(|op| **op == name).count()
    }

    fn record(&mut self, op: &'static str) {
        self.ops.push(op);
    }
}

impl Transport for NullTransport {
    fn open(&mut self, _selector: &str) -> TransportResult<()> {
        self.record("open");
        Ok(())
    }

    fn close(&mut self) {}

    fn is_device_available(&mut self, _selector: &str) -> TransportResult<bool> {
        self.record("isDeviceAvailable");
        Ok(true)
    }

    fn sleep(&mut self, _millis: u32) {}

    fn is_nero_capable(&self) -> bool {
        self.nero_capable
    }

    fn is_comm_capable(&self, conduit: Conduit) -> bool {
        self.comm_capable && conduit == Conduit::default()
    }

    fn firmware_id(&self) -> u16 {
        0xFFFF
    }

    fn firmware_version(&self) -> u32 {
        0x2013_1217
    }

    fn select_conduit(&mut self, _conduit: Conduit) -> TransportResult<()> {
        self.record("selectConduit");
        Ok(())
    }

    fn is_fpga_running(&mut self) -> TransportResult<bool> {
        self.record("isFpgaRunning");
        Ok(true)
    }

    fn set_async_write_chunk_size(&mut self, _size: u32) -> TransportResult<()> {
        self.record("setAsyncWriteChunkSize");
        Ok(())
    }

    fn write_channel_async(&mut self, _channel: u8, _data: &[u8]) -> TransportResult<()> {
        self.record("writeChannelAsync");
        Ok(())
    }

    fn flush_async_writes(&mut self) -> TransportResult<()> {
        self.record("flushAsyncWrites");
        Ok(())
    }

    fn await_async_writes(&mut self) -> TransportResult<()> {
        self.record("awaitAsyncWrites");
        Ok(())
    }

    fn read_channel_async_submit(&mut self, _channel: u8, _count: usize) -> TransportResult<()> {
        self.record("readChannelAsyncSubmit");
        Ok(())
    }

    fn read_channel_async_await(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        self.record("readChannelAsyncAwait");
        buf.fill(0);
        Ok(buf.len())
    }

    fn prog_open(&mut self, _ports: &ProgPorts) -> TransportResult<()> {
        self.record("progOpen");
        Ok(())
    }

    fn prog_close(&mut self) -> TransportResult<()> {
        self.record("progClose");
        Ok(())
    }

    fn jtag_shift_in_only(
        &mut self,
        _num_bits: u32,
        _tdi: TdiSource<'_>,
        _is_last: bool,
    ) -> TransportResult<()> {
        self.record("jtagShiftInOnly");
        Ok(())
    }

    fn jtag_shift_in_out(
        &mut self,
        _num_bits: u32,
        _tdi: TdiSource<'_>,
        tdo: &mut [u8],
        _is_last: bool,
    ) -> TransportResult<()> {
        self.record("jtagShiftInOut");
        tdo.fill(0);
        Ok(())
    }

    fn jtag_clock_fsm(&mut self, _bit_pattern: u32, _transition_count: u8) -> TransportResult<()> {
        self.record("jtagClockFsm");
        Ok(())
    }

    fn jtag_clocks(&mut self, _count: u32) -> TransportResult<()> {
        self.record("jtagClocks");
        Ok(())
    }

    fn jtag_scan_chain(
        &mut self,
        _ports: &ProgPorts,
        idcodes: &mut [u8],
    ) -> TransportResult<usize> {
        self.record("jtagScanChain");
        idcodes.fill(0);
        Ok(0)
    }

    fn spi_send(&mut self, _data: &[u8], _bit_order: BitOrder) -> TransportResult<()> {
        self.record("spiSend");
        Ok(())
    }

    fn spi_recv(&mut self, buf: &mut [u8], _bit_order: BitOrder) -> TransportResult<()> {
        self.record("spiRecv");
        buf.fill(0);
        Ok(())
    }

    fn single_bit_port_access(
        &mut self,
        _port: u8,
        _bit: u8,
        _config: PinConfig,
    ) -> TransportResult<bool> {
        self.record("singleBitPortAccess");
        Ok(false)
    }

    fn multi_bit_port_access(&mut self, _pins: &[PinSpec]) -> TransportResult<u32> {
        self.record("multiBitPortAccess");
        Ok(0)
    }

    fn load_standard_firmware(&mut self, _current: &str, _new: &str) -> TransportResult<()> {
        self.record("loadStandardFirmware");
        Ok(())
    }

    fn flash_standard_firmware(&mut self, _new: &str) -> TransportResult<()> {
        self.record("flashStandardFirmware");
        Ok(())
    }

    fn load_custom_firmware(&mut self, _current: &str, _firmware: &Path) -> TransportResult<()> {
        self.record("loadCustomFirmware");
        Ok(())
    }

    fn flash_custom_firmware(&mut self, _firmware: &Path) -> TransportResult<()> {
        self.record("flashCustomFirmware");
        Ok(())
    }

    fn save_firmware(&mut self, _eeprom_kbits: u32, _dest: &Path) -> TransportResult<()> {
        self.record("saveFirmware");
        Ok(())
    }

    fn bootloader(&mut self) -> TransportResult<()> {
        self.record("bootloader");
        Ok(())
    }
}
