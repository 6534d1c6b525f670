//! Decimated frame update scheduling
//!
//! A new coded frame is read only on ticks where `f % dec == 0`. On every
//! other tick the last received frame is handed to the decoder again.

use std::io::{self, Read};

use tracing::{debug, warn};

use crate::channel::ChannelSimulator;
use crate::config::QuantizerConfig;
use crate::error::{QuantError, Result};

/// What the scheduler did on a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// A new frame was read and passed through the channel
    Update,
    /// The last received frame is reused
    Hold,
    /// The source ran dry on an update tick
    EndOfStream {
        /// Bytes that were available before the source ended
        partial: usize,
    },
}

/// Frame tick counter plus the last received coded frame
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    dec: usize,
    f: u64,
    last_frame: Vec<u8>,
    incoming: Vec<u8>,
    frames_read: u64,
    bits_read: u64,
}

impl FrameScheduler {
    /// Create a scheduler for `bits_per_frame`-bit frames updated every `dec` ticks
    ///
    /// # Errors
    ///
    /// Returns [`QuantError::InvalidConfig`] if `dec` or `bits_per_frame` is zero.
    pub fn new(dec: usize, bits_per_frame: usize) -> Result<Self> {
        if dec == 0 {
            return Err(QuantError::invalid_config("decimation factor must be at least 1"));
        }
        if bits_per_frame == 0 {
            return Err(QuantError::invalid_config("coded frames must carry at least one bit"));
        }
        Ok(Self {
            dec,
            f: 0,
            last_frame: vec![0; bits_per_frame],
            incoming: vec![0; bits_per_frame],
            frames_read: 0,
            bits_read: 0,
        })
    }

    /// Scheduler matching a quantiser configuration
    pub fn from_config(config: &QuantizerConfig) -> Result<Self> {
        Self::new(config.decimation(), config.bits_per_frame())
    }

    /// Whether the current tick reads a new frame
    pub fn is_update_tick(&self) -> bool {
        self.f % self.dec as u64 == 0
    }

    /// Fetch the frame for the current tick
    ///
    /// On update ticks reads `bits_per_frame` bytes from `source` and runs
    /// them through `channel`. A short read leaves the last received frame
    /// untouched and reports [`Tick::EndOfStream`]. The tick counter is not
    /// advanced; call [`FrameScheduler::advance`] once the tick is processed.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from `source`.
    pub fn next_frame<R: Read>(
        &mut self,
        source: &mut R,
        channel: &mut ChannelSimulator,
    ) -> Result<Tick> {
        if !self.is_update_tick() {
            return Ok(Tick::Hold);
        }

        let n = read_frame(source, &mut self.incoming)?;
        if n < self.incoming.len() {
            if n > 0 {
                warn!(
                    "Discarding partial trailing frame: {} of {} bits",
                    n,
                    self.incoming.len()
                );
            }
            debug!("End of coded stream at tick {}", self.f);
            return Ok(Tick::EndOfStream { partial: n });
        }

        self.frames_read += 1;
        self.bits_read += n as u64;
        let flipped = channel.corrupt(&mut self.incoming);
        std::mem::swap(&mut self.last_frame, &mut self.incoming);
        debug!(
            "Tick {}: read frame {} ({} bit errors)",
            self.f, self.frames_read, flipped
        );

        Ok(Tick::Update)
    }

    /// Last received coded frame, all zeros before the first update
    pub fn frame(&self) -> &[u8] {
        &self.last_frame
    }

    /// Move to the next tick
    pub fn advance(&mut self) {
        self.f += 1;
    }

    /// Ticks processed so far
    pub fn tick_count(&self) -> u64 {
        self.f
    }

    /// Complete frames read from the source
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Bits read from the source in complete frames
    pub fn bits_read(&self) -> u64 {
        self.bits_read
    }

    /// Decimation factor
    pub fn decimation(&self) -> usize {
        self.dec
    }

    /// Restart at tick zero with an all-zero last frame
    pub fn reset(&mut self) {
        self.f = 0;
        self.last_frame.fill(0);
        self.frames_read = 0;
        self.bits_read = 0;
    }
}

/// Fill `buf` from `source`, returning fewer bytes only at end of stream
fn read_frame<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
