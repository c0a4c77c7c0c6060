//! Capability bitset negotiated with the guest agent.

/// Number of 32-bit words in a capability set.
pub const CAPABILITY_WORDS: usize = 4;

/// Optional protocol features, addressed by bit index.
///
/// Only compile-time-known indices belong here; the raw-index accessors
/// on [`CapabilitySet`] exist for forward compatibility with bits this
/// build does not know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
#[non_exhaustive]
pub enum Capability {
    /// Printer sharing and print-job forwarding.
    Printing = 0,
}

impl From<Capability> for u32 {
    fn from(cap: Capability) -> Self {
        cap as Self
    }
}

/// 128-bit feature bitset, one bit per optional capability.
///
/// A capabilities frame replaces the whole set; there is no merge. Bits
/// outside the representable range read as unsupported and writes to
/// them are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilitySet {
    words: [u32; CAPABILITY_WORDS],
}

impl CapabilitySet {
    /// Total number of addressable capability bits.
    pub const BITS: u32 = (CAPABILITY_WORDS as u32) * 32;

    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set from its raw wire words.
    pub fn from_words(words: [u32; CAPABILITY_WORDS]) -> Self {
        Self { words }
    }

    /// Sets bit `cap`. Out-of-range indices are ignored.
    pub fn set(&mut self, cap: impl Into<u32>) {
        let cap = cap.into();
        if cap < Self::BITS {
            self.words[(cap / 32) as usize] |= 1 << (cap % 32);
        }
    }

    /// Returns whether bit `cap` is set; false for out-of-range indices.
    pub fn supports(&self, cap: impl Into<u32>) -> bool {
        let cap = cap.into();
        cap < Self::BITS && (self.words[(cap / 32) as usize] & (1 << (cap % 32))) != 0
    }

    /// Replaces the set wholesale with new raw words.
    pub fn replace(&mut self, words: [u32; CAPABILITY_WORDS]) {
        self.words = words;
    }

    /// Clears every bit.
    pub fn clear(&mut self) {
        self.words = [0; CAPABILITY_WORDS];
    }

    /// Returns the raw wire words.
    pub fn words(&self) -> [u32; CAPABILITY_WORDS] {
        self.words
    }
}
