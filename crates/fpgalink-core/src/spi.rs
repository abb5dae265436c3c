//! NeroProg SPI engine: byte-granularity transfers with selectable bit
//! order.
//!
//! Requires a programming session opened with
//! [`prog_open`](FpgaLink::prog_open); the session precondition is a caller
//! contract and is not defensively checked.

use crate::device::FpgaLink;
use crate::error::Result;
use crate::transport::Transport;
use crate::types::BitOrder;

impl<T: Transport> FpgaLink<T> {
    /// Send whole bytes into the device's SPI bus, MSB-first or LSB-first.
    pub fn spi_send(&mut self, data: &[u8], bit_order: BitOrder) -> Result<()> {
        self.require_nero("spi_send")?;
        if data.is_empty() {
            return Ok(());
        }
        self.transport.spi_send(data, bit_order)?;
        Ok(())
    }

    /// Receive `count` whole bytes from the device's SPI bus, MSB-first or
    /// LSB-first.
    pub fn spi_recv(&mut self, count: usize, bit_order: BitOrder) -> Result<Vec<u8>> {
        self.require_nero("spi_recv")?;
        if count == 0 {
            return Ok(Vec::new());
        }
        self.scratch.ensure(count);
        self.transport
            .spi_recv(&mut self.scratch.data[..count], bit_order)?;
        Ok(self.scratch.data[..count].to_vec())
    }
}
