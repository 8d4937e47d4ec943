//! HDLC receive statistics

/// Counters kept by the streaming frame decoder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HdlcStatistics {
    pub frames_received: u64,
    /// Frames dropped for a bad format, length, HCS or FCS
    pub frames_rejected: u64,
    /// Bytes skipped while hunting for a start flag
    pub bytes_discarded: u64,
}

impl HdlcStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
