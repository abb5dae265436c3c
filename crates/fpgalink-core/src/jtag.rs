//! NeroProg JTAG engine: bit-level shifts, TAP navigation and chain scan.
//!
//! All shifts are LSB-first per bit. Operations other than
//! [`jtag_scan_chain`](FpgaLink::jtag_scan_chain) require a programming
//! session opened with [`prog_open`](FpgaLink::prog_open); calling them
//! outside a session is a caller contract violation and is not defensively
//! checked here.

use crate::device::FpgaLink;
use crate::error::{Error, Result};
use crate::transport::{TdiSource, Transport};
use crate::types::{LogicalPort, PhysicalPort, ProgPorts};

/// Chain capacity assumed for the first scan probe, in devices.
const INITIAL_CHAIN_CAPACITY: usize = 16;

/// Number of bytes needed to store `bits` bits.
///
/// Exact integer ceiling division; used everywhere a bit count must be
/// sized into a byte buffer.
pub fn bits_to_bytes(bits: u32) -> usize {
    (bits as usize).div_ceil(8)
}

impl<T: Transport> FpgaLink<T> {
    /// Validate a shift request and return its byte length.
    fn checked_shift_len(operation: &str, num_bits: u32, tdi: &TdiSource<'_>) -> Result<usize> {
        if num_bits == 0 {
            return Err(Error::protocol(format!(
                "{operation}(): zero-length shifts are illegal"
            )));
        }
        let num_bytes = bits_to_bytes(num_bits);
        if let TdiSource::Explicit(data) = tdi {
            if data.len() != num_bytes {
                return Err(Error::protocol(format!(
                    "{operation}(): tdi data has incorrect length (expected {num_bytes}, \
                     got {})",
                    data.len()
                )));
            }
        }
        Ok(num_bytes)
    }

    /// Shift `num_bits` bits LSB-first into TDI while capturing the same
    /// count of bits from TDO.
    ///
    /// Use [`TdiSource::AllZeros`] or [`TdiSource::AllOnes`] to clock in a
    /// constant pattern without materialising a buffer. If `is_last` is
    /// `false` the TAP remains in `Shift-xR`; otherwise it exits to
    /// `Exit1-xR` on the final bit. An explicit TDI buffer whose length is
    /// not exactly [`bits_to_bytes`]`(num_bits)` is rejected before the
    /// transport is touched.
    pub fn jtag_shift_in_out(
        &mut self,
        num_bits: u32,
        tdi: TdiSource<'_>,
        is_last: bool,
    ) -> Result<Vec<u8>> {
        self.require_nero("jtag_shift_in_out")?;
        let num_bytes = Self::checked_shift_len("jtag_shift_in_out", num_bits, &tdi)?;
        self.scratch.ensure(num_bytes);
        self.transport
            .jtag_shift_in_out(num_bits, tdi, &mut self.scratch.data[..num_bytes], is_last)?;
        Ok(self.scratch.data[..num_bytes].to_vec())
    }

    /// Shift `num_bits` bits LSB-first into TDI, discarding whatever comes
    /// out of TDO. Same validation rules as
    /// [`jtag_shift_in_out`](Self::jtag_shift_in_out).
    pub fn jtag_shift_in_only(
        &mut self,
        num_bits: u32,
        tdi: TdiSource<'_>,
        is_last: bool,
    ) -> Result<()> {
        self.require_nero("jtag_shift_in_only")?;
        Self::checked_shift_len("jtag_shift_in_only", num_bits, &tdi)?;
        self.transport.jtag_shift_in_only(num_bits, tdi, is_last)?;
        Ok(())
    }

    /// Navigate the TAP state machine by clocking `transition_count` bits
    /// of `bit_pattern` into TMS, starting with the LSB.
    pub fn jtag_clock_fsm(&mut self, bit_pattern: u32, transition_count: u8) -> Result<()> {
        self.require_nero("jtag_clock_fsm")?;
        if transition_count > 32 {
            return Err(Error::protocol(format!(
                "jtag_clock_fsm(): transition count {transition_count} exceeds the \
                 32-bit pattern"
            )));
        }
        self.transport.jtag_clock_fsm(bit_pattern, transition_count)?;
        Ok(())
    }

    /// Toggle TCK `count` times with TMS held.
    pub fn jtag_clocks(&mut self, count: u32) -> Result<()> {
        self.require_nero("jtag_clocks")?;
        self.transport.jtag_clocks(count)?;
        Ok(())
    }

    /// Scan the JTAG chain on the given ports and return the IDCODE of
    /// every device on it, in scan order.
    ///
    /// The scan probes with an assumed capacity of 16 devices; if the chain
    /// turns out to be longer, the capture buffer is grown to fit and the
    /// scan is reissued exactly once — the device's count report is trusted.
    pub fn jtag_scan_chain(&mut self, port_config: &str) -> Result<Vec<u32>> {
        self.require_nero("jtag_scan_chain")?;
        let ports = ProgPorts::parse(port_config)?;

        let mut capacity = INITIAL_CHAIN_CAPACITY;
        self.scratch.ensure(4 * capacity);
        let mut count = self
            .transport
            .jtag_scan_chain(&ports, &mut self.scratch.data[..4 * capacity])?;
        if count > capacity {
            log::debug!("jtag_scan_chain: {count} devices exceed probe capacity {capacity}, rescanning");
            capacity = count;
            self.scratch.ensure(4 * capacity);
            count = self
                .transport
                .jtag_scan_chain(&ports, &mut self.scratch.data[..4 * capacity])?;
            count = count.min(capacity);
        }

        Ok(self.scratch.data[..4 * count]
            .chunks_exact(4)
            .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
            .collect())
    }

    /// Open an SPI/JTAG programming session.
    ///
    /// `port_config` names the pins for MISO(TDO), MOSI(TDI), SS(TMS) and
    /// SCK(TCK), e.g. `"D0D2D3D4"`; it is parsed and validated before the
    /// device is asked to map its ports. Shift, clock and SPI operations
    /// are only valid while a session is open, and the session must be
    /// ended with [`prog_close`](Self::prog_close).
    pub fn prog_open(&mut self, port_config: &str) -> Result<()> {
        self.require_nero("prog_open")?;
        let ports = ProgPorts::parse(port_config)?;
        self.transport.prog_open(&ports)?;
        self.prog_ports = Some(ports);
        Ok(())
    }

    /// Close the programming session opened by [`prog_open`](Self::prog_open)
    /// and tri-state the four programming pins.
    pub fn prog_close(&mut self) -> Result<()> {
        self.transport.prog_close()?;
        self.prog_ports = None;
        Ok(())
    }

    /// The physical pin assigned to a logical port by the most recent
    /// [`prog_open`](Self::prog_open).
    ///
    /// A pure lookup against the recorded mapping — no device I/O, cannot
    /// fail. The result is only meaningful while a programming session is
    /// open; outside one it reports `A0`.
    pub fn prog_get_port(&self, port: LogicalPort) -> PhysicalPort {
        match &self.prog_ports {
            Some(ports) => ports.get(port),
            None => PhysicalPort::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::NullTransport;

    fn open() -> FpgaLink<NullTransport> {
        FpgaLink::open(NullTransport::new(), "1D50:602B").unwrap()
    }

    #[test]
    fn bits_to_bytes_is_ceiling_division() {
        assert_eq!(bits_to_bytes(0), 0);
        assert_eq!(bits_to_bytes(1), 1);
        assert_eq!(bits_to_bytes(7), 1);
        assert_eq!(bits_to_bytes(8), 1);
        assert_eq!(bits_to_bytes(9), 2);
        assert_eq!(bits_to_bytes(128), 16);
        assert_eq!(bits_to_bytes(129), 17);
    }

    #[test]
    fn shift_length_mismatch_never_reaches_transport() {
        let mut link = open();
        let short = [0u8; 3];
        let err = link
            .jtag_shift_in_out(32, TdiSource::Explicit(&short), true)
            .unwrap_err();
        assert!(matches!(err, Error::Protocol { code: 0, .. }));
        assert!(link
            .jtag_shift_in_only(8, TdiSource::Explicit(&short), false)
            .is_err());
        assert_eq!(link.transport().calls_after_open(), 0);
    }

    #[test]
    fn zero_bit_shift_rejected() {
        let mut link = open();
        assert!(link
            .jtag_shift_in_out(0, TdiSource::AllZeros, false)
            .is_err());
        assert_eq!(link.transport().calls_after_open(), 0);
    }

    #[test]
    fn sentinel_shift_needs_no_caller_buffer() {
        let mut link = open();
        let tdo = link.jtag_shift_in_out(100, TdiSource::AllOnes, true).unwrap();
        assert_eq!(tdo.len(), bits_to_bytes(100));
    }

    #[test]
    fn clock_fsm_transition_count_bounded() {
        let mut link = open();
        link.jtag_clock_fsm(0x0000_001F, 5).unwrap();
        assert!(link.jtag_clock_fsm(0, 33).is_err());
    }

    #[test]
    fn prog_get_port_tracks_session() {
        let mut link = open();
        assert_eq!(
            link.prog_get_port(LogicalPort::Sck),
            PhysicalPort { port: 0, bit: 0 }
        );
        link.prog_open("D0D2D3D4").unwrap();
        assert_eq!(
            link.prog_get_port(LogicalPort::Miso),
            PhysicalPort { port: 3, bit: 0 }
        );
        assert_eq!(
            link.prog_get_port(LogicalPort::Sck),
            PhysicalPort { port: 3, bit: 4 }
        );
        link.prog_close().unwrap();
        assert_eq!(
            link.prog_get_port(LogicalPort::Sck),
            PhysicalPort { port: 0, bit: 0 }
        );
    }

    #[test]
    fn malformed_scan_port_config_rejected_before_transport() {
        let mut link = open();
        assert!(link.jtag_scan_chain("D0D2").is_err());
        assert_eq!(link.transport().calls_after_open(), 0);
    }

    #[test]
    fn nero_capability_gates_jtag() {
        let transport = NullTransport::without_capabilities();
        let mut link = FpgaLink::open(transport, "1D50:602B").unwrap();
        assert!(matches!(
            link.jtag_clocks(8).unwrap_err(),
            Error::Capability(_)
        ));
    }
}
