//! CommFPGA channel I/O: synchronous and pipelined transfer engines.
//!
//! Synchronous reads and writes are compositions of the asynchronous
//! primitives, exactly as the native library builds them: a sync write is an
//! async write followed by an await, and a large sync read is issued as a
//! sequence of 64 KiB submit/await pairs. The asynchronous surface is
//! exposed directly so callers can keep several requests in flight and
//! saturate the USB host controller's pipeline.

use crate::device::{FpgaLink, PendingRead};
use crate::error::{status, Error, Result};
use crate::transport::Transport;

/// Largest single channel transfer the wire protocol can frame.
const MAX_TRANSFER: usize = 0x10000;

fn check_channel(operation: &str, channel: u8) -> Result<()> {
    if channel > 127 {
        return Err(Error::protocol(format!(
            "{operation}(): channel {channel} is out of range (0-127)"
        )));
    }
    Ok(())
}

impl<T: Transport> FpgaLink<T> {
    /// Synchronously read `count` bytes from a channel.
    ///
    /// Blocks until the data has been returned. Requires CommFPGA on the
    /// selected conduit, and must not be called between an async read
    /// submit...await pair. Reads larger than 64 KiB are split into
    /// multiple transfers internally.
    pub fn read_channel(&mut self, channel: u8, count: usize) -> Result<Vec<u8>> {
        check_channel("read_channel", channel)?;
        if count == 0 {
            return Err(Error::protocol("read_channel(): zero-length reads are illegal"));
        }
        self.require_comm("read_channel")?;
        self.require_no_async_reads("read_channel")?;

        let mut data = Vec::with_capacity(count);
        let mut remaining = count;
        while remaining > 0 {
            let chunk = remaining.min(MAX_TRANSFER);
            self.transport.read_channel_async_submit(channel, chunk)?;
            self.scratch.ensure(chunk);
            let actual = self
                .transport
                .read_channel_async_await(&mut self.scratch.data[..chunk])?;
            if actual != chunk {
                return Err(Error::Transport {
                    code: status::EARLY_TERM,
                    message: format!(
                        "read_channel(): early termination: requested {chunk} bytes, \
                         device returned {actual}"
                    ),
                });
            }
            data.extend_from_slice(&self.scratch.data[..chunk]);
            remaining -= chunk;
        }
        log::trace!("read_channel({channel}): {count} bytes");
        Ok(data)
    }

    /// Synchronously write `data` to a channel.
    ///
    /// Blocks until the data has been sent over USB and received by the
    /// microcontroller. It may still be waiting in the micro's output
    /// buffer, so receipt by the FPGA itself is not confirmed. Must not be
    /// called between an async read submit...await pair.
    pub fn write_channel(&mut self, channel: u8, data: &[u8]) -> Result<()> {
        self.require_no_async_reads("write_channel")?;
        self.write_channel_async(channel, data)?;
        self.await_async_writes()?;
        log::trace!("write_channel({channel}): {} bytes", data.len());
        Ok(())
    }

    /// Set the chunk size used to buffer future async writes.
    ///
    /// Buffering up to 64 KiB (the default) before hitting the wire is more
    /// efficient than sending many small messages, but smaller chunks can
    /// give better steady-state pipelining. Legal values are
    /// `1..=0x10000`; anything else is rejected before the transport is
    /// touched. Illegal while write data is buffered: call it before the
    /// first async write, or directly after a flush.
    pub fn set_async_write_chunk_size(&mut self, size: u32) -> Result<()> {
        if size == 0 || size as usize > MAX_TRANSFER {
            return Err(Error::protocol(format!(
                "set_async_write_chunk_size(): chunk size {size:#x} is out of range \
                 (1-0x10000)"
            )));
        }
        self.require_no_async_reads("set_async_write_chunk_size")?;
        if self.pending_bytes {
            return Err(Error::protocol(
                "set_async_write_chunk_size(): cannot change chunk size while send data \
                 is pending",
            ));
        }
        self.transport.set_async_write_chunk_size(size)?;
        self.chunk_size = size;
        Ok(())
    }

    /// The chunk size future async writes will be buffered with.
    pub fn async_write_chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Asynchronously write `data` to a channel.
    ///
    /// Returns as soon as the bytes are handed to the transport, usually
    /// before anything reaches the wire. A failure the transport discovers
    /// later is deferred until the next flush/await. The data is copied
    /// internally, so the buffer need not outlive the call.
    pub fn write_channel_async(&mut self, channel: u8, data: &[u8]) -> Result<()> {
        check_channel("write_channel_async", channel)?;
        if data.is_empty() {
            return Err(Error::protocol(
                "write_channel_async(): zero-length writes are illegal",
            ));
        }
        self.require_comm("write_channel_async")?;
        self.transport.write_channel_async(channel, data)?;
        self.pending_bytes = true;
        Ok(())
    }

    /// Force any buffered async write data onto the wire.
    ///
    /// Does not wait for the device to acknowledge; see
    /// [`await_async_writes`](Self::await_async_writes) for that. A no-op
    /// when nothing is buffered.
    pub fn flush_async_writes(&mut self) -> Result<()> {
        if !self.pending_bytes {
            return Ok(());
        }
        self.require_comm("flush_async_writes")?;
        self.transport.flush_async_writes()?;
        self.pending_bytes = false;
        Ok(())
    }

    /// Block until every queued async write has been received by the
    /// microcontroller.
    ///
    /// Flushes first, then waits for the transport to confirm transmission,
    /// surfacing the first deferred failure if any write went wrong.
    /// Receipt by the FPGA logic itself is not confirmed. Must not be
    /// called between an async read submit...await pair.
    pub fn await_async_writes(&mut self) -> Result<()> {
        self.require_no_async_reads("await_async_writes")?;
        self.flush_async_writes()?;
        self.transport.await_async_writes()?;
        self.pending_bytes = false;
        Ok(())
    }

    /// Submit an asynchronous read of `count` bytes (at most 64 KiB) from a
    /// channel.
    ///
    /// Returns immediately; the outcome is not known until the matching
    /// [`read_channel_async_await`](Self::read_channel_async_await). Every
    /// submit must eventually be awaited, and
    /// [`set_async_write_chunk_size`](Self::set_async_write_chunk_size),
    /// [`await_async_writes`](Self::await_async_writes),
    /// [`write_channel`](Self::write_channel) and
    /// [`read_channel`](Self::read_channel) are illegal while a submit is
    /// unresolved. One level of nesting (submit, submit, await, submit,
    /// await, ..., await) is typically enough to keep a USB host controller
    /// busy.
    pub fn read_channel_async_submit(&mut self, channel: u8, count: usize) -> Result<()> {
        check_channel("read_channel_async_submit", channel)?;
        if count == 0 || count > MAX_TRANSFER {
            return Err(Error::protocol(format!(
                "read_channel_async_submit(): read length {count:#x} is out of range \
                 (1-0x10000)"
            )));
        }
        self.require_comm("read_channel_async_submit")?;
        self.transport.read_channel_async_submit(channel, count)?;
        self.pending_reads.push_back(PendingRead { channel, count });
        Ok(())
    }

    /// Await the oldest submitted asynchronous read, in FIFO order.
    ///
    /// Blocks until that read completes and returns its data. The device
    /// may legitimately return fewer bytes than requested. A transport
    /// failure resolves (consumes) the request and is returned as the
    /// error, including any failure deferred from earlier async writes.
    pub fn read_channel_async_await(&mut self) -> Result<Vec<u8>> {
        let request = self.pending_reads.pop_front().ok_or_else(|| {
            Error::protocol("read_channel_async_await(): no asynchronous read is outstanding")
        })?;
        self.scratch.ensure(request.count);
        let actual = self
            .transport
            .read_channel_async_await(&mut self.scratch.data[..request.count])?;
        Ok(self.scratch.data[..actual.min(request.count)].to_vec())
    }

    /// Number of submitted asynchronous reads not yet awaited.
    pub fn outstanding_reads(&self) -> usize {
        self.pending_reads.len()
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
    fn chunk_size_out_of_range_never_reaches_transport() {
        let mut link = open();
        for size in [0u32, 0x10001, u32::MAX] {
            let err = link.set_async_write_chunk_size(size).unwrap_err();
            assert!(matches!(err, Error::Protocol { code: 0, .. }));
        }
        assert_eq!(link.transport().calls_after_open(), 0);
        assert_eq!(link.async_write_chunk_size(), 0x10000);
    }

    #[test]
    fn chunk_size_change_illegal_while_bytes_pending() {
        let mut link = open();
        link.write_channel_async(3, &[1, 2, 3]).unwrap();
        assert!(link.set_async_write_chunk_size(512).is_err());
        // Legal again directly after a flush.
        link.flush_async_writes().unwrap();
        link.set_async_write_chunk_size(512).unwrap();
        assert_eq!(link.async_write_chunk_size(), 512);
    }

    #[test]
    fn zero_length_transfers_rejected() {
        let mut link = open();
        assert!(link.read_channel(0, 0).is_err());
        assert!(link.write_channel(0, &[]).is_err());
        assert_eq!(link.transport().calls_after_open(), 0);
    }

    #[test]
    fn channel_out_of_range_rejected() {
        let mut link = open();
        assert!(link.read_channel(128, 4).is_err());
        assert!(link.write_channel_async(200, &[0xAA]).is_err());
        assert_eq!(link.transport().calls_after_open(), 0);
    }

    #[test]
    fn oversized_async_read_rejected() {
        let mut link = open();
        let err = link.read_channel_async_submit(0, 0x10001).unwrap_err();
        assert!(matches!(err, Error::Protocol { code: 0, .. }));
        assert_eq!(link.transport().calls_after_open(), 0);
    }

    #[test]
    fn await_without_submit_is_an_error() {
        let mut link = open();
        assert!(link.read_channel_async_await().is_err());
    }

    #[test]
    fn sync_ops_illegal_while_read_outstanding() {
        let mut link = open();
        link.read_channel_async_submit(0, 16).unwrap();
        assert!(link.read_channel(1, 4).is_err());
        assert!(link.write_channel(1, &[1]).is_err());
        assert!(link.await_async_writes().is_err());
        assert!(link.set_async_write_chunk_size(1024).is_err());
        // Resolving the read makes them legal again.
        link.read_channel_async_await().unwrap();
        assert_eq!(link.outstanding_reads(), 0);
        link.set_async_write_chunk_size(1024).unwrap();
    }

    #[test]
    fn large_sync_read_is_chunked() {
        let mut link = open();
        let data = link.read_channel(5, 0x28000).unwrap();
        assert_eq!(data.len(), 0x28000);
        // 2 full chunks + 1 partial, each a submit/await pair.
        let submits = link.transport().count_op("readChannelAsyncSubmit");
        let awaits = link.transport().count_op("readChannelAsyncAwait");
        assert_eq!(submits, 3);
        assert_eq!(awaits, 3);
        assert_eq!(link.scratch_capacity(), 0x10000);
    }

    #[test]
    fn scratch_capacity_monotone_across_operations() {
        let mut link = open();
        let mut high_water = 0;
        for count in [16usize, 4096, 64, 0x10000, 100] {
            link.read_channel(0, count).unwrap();
            high_water = high_water.max(count);
            assert_eq!(link.scratch_capacity(), high_water);
        }
    }
}
