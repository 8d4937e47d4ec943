//! Streaming HDLC frame decoder

use crate::hdlc::frame::{HdlcFrame, FLAG};
use crate::hdlc::statistics::HdlcStatistics;
use bytes::{Buf, BytesMut};

const LENGTH_MASK: u16 = 0x07FF;
/// Smallest length field: format, two addresses, control, check sequence
const MIN_FRAME_LENGTH: usize = 7;

/// Reassembles HDLC frames from arbitrarily split TCP chunks
///
/// Bytes before a start flag are discarded. A partial frame stays buffered
/// until the rest arrives. Frames that fail their checks are dropped and
/// counted in [`HdlcStatistics`]; they are never returned.
#[derive(Debug, Default)]
pub struct HdlcFrameDecoder {
    buffer: BytesMut,
    statistics: HdlcStatistics,
}

impl HdlcFrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every frame it completes
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<HdlcFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        loop {
            match self.buffer.iter().position(|b| *b == FLAG) {
                None => {
                    self.discard(self.buffer.len());
                    break;
                }
                Some(0) => {}
                Some(start) => self.discard(start),
            }

            if self.buffer.len() < 3 {
                break;
            }
            // Consecutive flags: the first one closes or pads, the second opens.
            if self.buffer[1] == FLAG {
                self.buffer.advance(1);
                continue;
            }

            let format = u16::from_be_bytes([self.buffer[1], self.buffer[2]]);
            let length = (format & LENGTH_MASK) as usize;
            if format & 0xF000 != 0xA000 || length < MIN_FRAME_LENGTH {
                log::warn!("HDLC: illegal frame format 0x{:04X}, resynchronizing", format);
                self.reject();
                continue;
            }

            let total = length + 2;
            if self.buffer.len() < total {
                break;
            }
            if self.buffer[total - 1] != FLAG {
                log::warn!("HDLC: frame of {} bytes has no closing flag, resynchronizing", total);
                self.reject();
                continue;
            }

            // The closing flag stays buffered; it may also open the next frame.
            let raw = self.buffer[..total].to_vec();
            self.buffer.advance(total - 1);
            match HdlcFrame::decode(&raw) {
                Ok(frame) => {
                    self.statistics.frames_received += 1;
                    frames.push(frame);
                }
                Err(e) => {
                    log::warn!("HDLC: dropping frame: {}", e);
                    self.statistics.frames_rejected += 1;
                }
            }
        }

        frames
    }

    pub fn statistics(&self) -> HdlcStatistics {
        self.statistics
    }

    /// Bytes held back waiting for the rest of a frame
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drop all buffered bytes
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    fn discard(&mut self, count: usize) {
        if count > 0 {
            log::debug!("HDLC: discarding {} bytes before start flag", count);
            self.statistics.bytes_discarded += count as u64;
            self.buffer.advance(count);
        }
    }

    fn reject(&mut self) {
        self.statistics.frames_rejected += 1;
        self.buffer.advance(1);
    }
}
