//! Type definitions for the CommFPGA and NeroProg vocabularies.
//!
//! The raw byte values these devices speak are kept behind small closed
//! enums with explicit wire encodings, so the logical vocabulary is
//! decoupled from its byte representation.

use std::fmt;

use crate::error::{Error, Result};

/// A CommFPGA conduit number (0–15).
///
/// A microcontroller typically implements its first CommFPGA protocol on
/// conduit 1, with additional protocol variants on conduits 2, 3, etc.
/// Conduit 0 is reserved for comms over JTAG using a virtual TAP state
/// machine in the FPGA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Conduit(u8);

impl Conduit {
    /// Conduit 0, reserved for JTAG-virtual comms.
    pub const JTAG: Conduit = Conduit(0);

    /// Create a conduit, rejecting values outside the supported range 0–15.
    pub fn new(value: u8) -> Option<Conduit> {
        (value <= 15).then_some(Conduit(value))
    }

    /// The wire value of this conduit.
    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Conduit {
    /// Conduit 1, the conventional first CommFPGA conduit.
    fn default() -> Self {
        Conduit(1)
    }
}

impl fmt::Display for Conduit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bit order for SPI byte transfers.
///
/// This governs SPI only; JTAG shifts are always LSB-first per bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BitOrder {
    /// Shift each byte most-significant bit first.
    #[default]
    MsbFirst,
    /// Shift each byte least-significant bit first.
    LsbFirst,
}

impl BitOrder {
    /// Wire encoding understood by the firmware.
    pub fn wire_value(self) -> u8 {
        match self {
            Self::MsbFirst => 0x01,
            Self::LsbFirst => 0x02,
        }
    }
}

/// Logical programming-port roles, resolved to physical pins by
/// [`prog_open`](crate::FpgaLink::prog_open).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalPort {
    /// MISO, doubling as TDO in JTAG mode.
    Miso,
    /// MOSI, doubling as TDI in JTAG mode.
    Mosi,
    /// SS, doubling as TMS in JTAG mode.
    Ss,
    /// SCK, doubling as TCK in JTAG mode.
    Sck,
}

impl LogicalPort {
    /// Wire encoding understood by the firmware.
    pub fn wire_value(self) -> u8 {
        match self {
            Self::Miso => 0x01,
            Self::Mosi => 0x02,
            Self::Ss => 0x03,
            Self::Sck => 0x04,
        }
    }
}

/// Direction and drive configuration for a microcontroller pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinConfig {
    /// Output, driven high.
    High,
    /// Output, driven low.
    Low,
    /// High-impedance input.
    Input,
}

impl PinConfig {
    /// Wire encoding understood by the firmware.
    pub fn wire_value(self) -> u8 {
        match self {
            Self::High => 0x01,
            Self::Low => 0x02,
            Self::Input => 0x03,
        }
    }
}

/// A physical microcontroller pin: port index plus bit within the port.
///
/// Displays in the conventional notation, e.g. `D2` for port D bit 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PhysicalPort {
    /// Port index (0 = port A, 1 = port B, ...).
    pub port: u8,
    /// Bit number within the port.
    pub bit: u8,
}

impl fmt::Display for PhysicalPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'A' + self.port) as char, self.bit)
    }
}

/// The four physical pins of a programming session, in MISO/TDO, MOSI/TDI,
/// SS/TMS, SCK/TCK order.
///
/// Parsed from strings such as `"D0D2D3D4"` (TDO on PD0, TDI on PD2, TMS on
/// PD3, TCK on PD4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgPorts {
    /// MISO/TDO pin.
    pub miso: PhysicalPort,
    /// MOSI/TDI pin.
    pub mosi: PhysicalPort,
    /// SS/TMS pin.
    pub ss: PhysicalPort,
    /// SCK/TCK pin.
    pub sck: PhysicalPort,
}

impl ProgPorts {
    /// Parse a port-config string of exactly four port/bit pairs.
    ///
    /// Each pin must be distinct; duplicates and trailing characters are
    /// rejected.
    pub fn parse(config: &str) -> Result<ProgPorts> {
        let mut cursor = Cursor::new(config);
        let miso = cursor.pair()?;
        let mosi = cursor.pair()?;
        let ss = cursor.pair()?;
        let sck = cursor.pair()?;
        cursor.expect_end()?;
        let pins = [miso, mosi, ss, sck];
        for (i, pin) in pins.iter().enumerate() {
            if pins[..i].contains(pin) {
                return Err(Error::protocol(format!(
                    "port config {config:?}: port {pin} is already used"
                )));
            }
        }
        Ok(ProgPorts { miso, mosi, ss, sck })
    }

    /// Look up the physical pin assigned to a logical port.
    pub fn get(&self, port: LogicalPort) -> PhysicalPort {
        match port {
            LogicalPort::Miso => self.miso,
            LogicalPort::Mosi => self.mosi,
            LogicalPort::Ss => self.ss,
            LogicalPort::Sck => self.sck,
        }
    }
}

/// One entry of a multi-bit port access: a pin plus the configuration to
/// apply to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinSpec {
    /// The pin to configure.
    pub pin: PhysicalPort,
    /// The configuration to apply before reading the pin back.
    pub config: PinConfig,
}

impl PinSpec {
    /// Parse a comma-separated list such as `"A12-,B2+,C7?"`.
    ///
    /// A `+` suffix drives the pin high, `-` drives it low and `?` makes it
    /// an input. At most 32 pins may be listed, since the read-back state is
    /// returned as 32 bits.
    pub fn parse_list(config: &str) -> Result<Vec<PinSpec>> {
        let mut cursor = Cursor::new(config);
        let mut specs = Vec::new();
        loop {
            let pin = cursor.pair()?;
            let config = match cursor.next() {
                Some('+') => PinConfig::High,
                Some('-') => PinConfig::Low,
                Some('?') => PinConfig::Input,
                _ => {
                    return Err(cursor.malformed("expecting '+', '-' or '?'"));
                }
            };
            specs.push(PinSpec { pin, config });
            match cursor.next() {
                Some(',') => continue,
                Some(_) => return Err(cursor.malformed("expecting ',' separator")),
                None => break,
            }
        }
        if specs.len() > 32 {
            return Err(Error::protocol(format!(
                "port config {config:?}: at most 32 pins can be read back"
            )));
        }
        Ok(specs)
    }
}

/// Character-by-character parser shared by the port-config grammars.
struct Cursor<'a> {
    config: &'a str,
    rest: std::str::Chars<'a>,
}

impl<'a> Cursor<'a> {
    fn new(config: &'a str) -> Self {
        Self {
            config,
            rest: config.chars(),
        }
    }

    fn next(&mut self) -> Option<char> {
        self.rest.next()
    }

    fn malformed(&self, reason: &str) -> Error {
        Error::protocol(format!("port config {:?}: {reason}", self.config))
    }

    /// Parse one port/bit pair: a letter `A`–`Z` followed by a decimal bit
    /// number 0–31.
    fn pair(&mut self) -> Result<PhysicalPort> {
        let port = match self.next() {
            Some(ch @ 'A'..='Z') => ch as u8 - b'A',
            _ => return Err(self.malformed("port is not valid (try 'A', 'B', 'C', ...)")),
        };
        let digits = self.rest.as_str();
        let len = digits.chars().take_while(char::is_ascii_digit).count();
        if len == 0 {
            return Err(self.malformed("bit number is not valid"));
        }
        let bit: u32 = digits[..len]
            .parse()
            .map_err(|_| self.malformed("bit number is not valid"))?;
        if bit > 31 {
            return Err(self.malformed("bit number out of range (0-31)"));
        }
        self.rest = digits[len..].chars();
        Ok(PhysicalPort {
            port,
            bit: bit as u8,
        })
    }

    fn expect_end(&mut self) -> Result<()> {
        if self.next().is_some() {
            return Err(self.malformed("unexpected trailing characters"));
        }
        Ok(())
    }
}
