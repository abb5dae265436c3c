//! CLI argument parsing.

use clap::{Parser, Subcommand};

/// Parse a hex byte string such as `CAFEBABE` into bytes.
pub fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, String> {
    let cleaned: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() || cleaned.len() % 2 != 0 {
        return Err(format!("invalid hex byte string: {s:?}"));
    }
    (0..cleaned.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&cleaned[i..i + 2], 16)
                .map_err(|e| format!("invalid hex byte string: {e}"))
        })
        .collect()
}

#[derive(Parser)]
#[command(name = "fpgalink")]
#[command(author, version, about = "Talk to FPGALink-compatible USB bridge devices", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Device VID:PID selector (optionally VID:PID:DID)
    #[arg(long, global = true, default_value = "1D50:602B")]
    pub vp: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show device capabilities and firmware identity
    Probe,

    /// Scan the JTAG chain and print the IDCODEs found
    Scan {
        /// Port bits to use for TDO, TDI, TMS & TCK, e.g. D0D2D3D4
        #[arg(short, long, default_value = "D0D2D3D4")]
        ports: String,
    },

    /// Read bytes from a CommFPGA channel
    Read {
        /// The FPGA channel to read (0-127)
        #[arg(short, long)]
        channel: u8,

        /// Number of bytes to read
        #[arg(short = 'n', long, default_value_t = 16)]
        count: usize,

        /// Conduit to select before reading
        #[arg(long, default_value_t = 1)]
        conduit: u8,
    },

    /// Write hex bytes to a CommFPGA channel
    Write {
        /// The FPGA channel to write (0-127)
        #[arg(short, long)]
        channel: u8,

        /// Bytes to write, as a hex string (e.g. CAFEBABE)
        data: String,

        /// Conduit to select before writing
        #[arg(long, default_value_t = 1)]
        conduit: u8,
    },

    /// Configure microcontroller port pins and read them back
    Port {
        /// Comma-separated pin configs, e.g. A12-,B2+,C7?
        config: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_bytes_round_trip() {
        assert_eq!(parse_hex_bytes("CAFEBABE").unwrap(), vec![0xCA, 0xFE, 0xBA, 0xBE]);
        assert_eq!(parse_hex_bytes("ca fe").unwrap(), vec![0xCA, 0xFE]);
        assert!(parse_hex_bytes("").is_err());
        assert!(parse_hex_bytes("ABC").is_err());
        assert!(parse_hex_bytes("ZZ").is_err());
    }
}
