//! fpgalink - command-line front-end for FPGALink-compatible USB bridge
//! devices.
//!
//! Exercises the `fpgalink-core` client library against the in-memory
//! emulated device from `fpgalink-dummy`: probing capabilities, scanning
//! the JTAG chain, moving bytes over CommFPGA channels and poking
//! microcontroller port pins. A real USB backend plugs in through the same
//! `Transport` seam.

mod cli;

use clap::Parser;
use cli::{parse_hex_bytes, Cli, Commands};
use fpgalink_core::{Conduit, FpgaLink};
use fpgalink_dummy::{DummyConfig, DummyTransport};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    // The emulated device: a small JTAG chain, CommFPGA on conduit 1, and
    // channels that stream zeros when nothing has been deposited.
    let transport = DummyTransport::new(DummyConfig {
        chain: vec![0x2400_1093, 0x0634_4093],
        fill: Some(0x00),
        ..DummyConfig::default()
    });

    match cli.command {
        Commands::Probe => {
            let link = FpgaLink::open(transport, &cli.vp)?;
            println!("Device {}", cli.vp);
            println!("=================");
            println!("NeroProg:         {}", yes_no(link.is_nero_capable()));
            let conduits: Vec<String> = (0..16)
                .filter_map(Conduit::new)
                .filter(|c| link.is_comm_capable(*c))
                .map(|c| c.to_string())
                .collect();
            if conduits.is_empty() {
                println!("CommFPGA:         no");
            } else {
                println!("CommFPGA:         conduit {}", conduits.join(", "));
            }
            println!("Firmware ID:      0x{:04X}", link.firmware_id());
            println!("Firmware version: 0x{:08X}", link.firmware_version());
            link.close();
        }
        Commands::Scan { ports } => {
            let mut link = FpgaLink::open(transport, &cli.vp)?;
            let idcodes = link.jtag_scan_chain(&ports)?;
            println!("{} device(s) in the JTAG chain:", idcodes.len());
            for (index, idcode) in idcodes.iter().enumerate() {
                println!("  {index}: 0x{idcode:08X}");
            }
        }
        Commands::Read {
            channel,
            count,
            conduit,
        } => {
            let mut link = FpgaLink::open(transport, &cli.vp)?;
            select(&mut link, conduit)?;
            let data = link.read_channel(channel, count)?;
            print_hex(&data);
        }
        Commands::Write {
            channel,
            data,
            conduit,
        } => {
            let bytes = parse_hex_bytes(&data)?;
            let mut link = FpgaLink::open(transport, &cli.vp)?;
            select(&mut link, conduit)?;
            link.write_channel(channel, &bytes)?;
            println!("wrote {} byte(s) to channel {channel}", bytes.len());
        }
        Commands::Port { config } => {
            let mut link = FpgaLink::open(transport, &cli.vp)?;
            let state = link.multi_bit_port_access(&config)?;
            println!("read-back state: 0x{state:08X}");
        }
    }

    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn select(link: &mut FpgaLink<DummyTransport>, conduit: u8) -> Result<(), Box<dyn std::error::Error>> {
    let conduit =
        Conduit::new(conduit).ok_or_else(|| format!("conduit {conduit} is out of range (0-15)"))?;
    link.select_conduit(conduit)?;
    Ok(())
}

fn print_hex(data: &[u8]) {
    for row in data.chunks(16) {
        let bytes: Vec<String> = row.iter().map(|b| format!("{b:02X}")).collect();
        println!("{}", bytes.join(" "));
    }
}
