//! Invoke-id-and-priority byte
//!
//! ```text
//! bit 7: priority (1 = high)   bit 6: service class (1 = confirmed)
//! bits 3..0: invoke id
//! ```

/// Invoke-id-and-priority byte carried by every service APDU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InvokeIdAndPriority(u8);

impl InvokeIdAndPriority {
    const HIGH_PRIORITY: u8 = 0x80;
    const CONFIRMED: u8 = 0x40;
    const ID_MASK: u8 = 0x0F;

    /// Confirmed, high-priority request with `invoke_id` (low four bits kept)
    pub const fn new(invoke_id: u8) -> Self {
        Self(Self::HIGH_PRIORITY | Self::CONFIRMED | (invoke_id & Self::ID_MASK))
    }

    pub const fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    pub fn byte(&self) -> u8 {
        self.0
    }

    pub fn invoke_id(&self) -> u8 {
        self.0 & Self::ID_MASK
    }

    pub fn is_confirmed(&self) -> bool {
        self.0 & Self::CONFIRMED != 0
    }

    pub fn is_high_priority(&self) -> bool {
        self.0 & Self::HIGH_PRIORITY != 0
    }
}

/// Monotonic invoke id source, wrapping at 16
#[derive(Debug, Clone)]
pub struct InvokeIdCounter {
    next: u8,
}

impl InvokeIdCounter {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_id(&mut self) -> InvokeIdAndPriority {
        let current = InvokeIdAndPriority::new(self.next);
        self.next = (self.next + 1) & 0x0F;
        current
    }
}

impl Default for InvokeIdCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoke_byte() {
        let invoke = InvokeIdAndPriority::new(1);
        assert_eq!(invoke.byte(), 0xC1);
        assert!(invoke.is_confirmed());
        assert!(invoke.is_high_priority());
        assert_eq!(InvokeIdAndPriority::new(0x1F).invoke_id(), 0x0F);
    }

    #[test]
    fn test_counter_wraps() {
        let mut counter = InvokeIdCounter::new();
        let ids: Vec<u8> = (0..17).map(|_| counter.next_id().invoke_id()).collect();
        assert_eq!(ids[0], 1);
        assert_eq!(ids[14], 15);
        assert_eq!(ids[15], 0);
        assert_eq!(ids[16], 1);
    }
}
