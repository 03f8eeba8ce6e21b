//! bTag sequencing
//!
//! USBTMC hosts pick a fresh bTag for every Bulk-OUT transfer so the device
//! can match headers to transfers. Zero is never used.

/// Generator of bTag values cycling through `1..=255`
#[derive(Debug, Clone)]
pub struct TagSequence {
    next: u8,
}

impl TagSequence {
    /// Start at bTag 1
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Start at `tag`; zero is bumped to 1
    pub fn starting_at(tag: u8) -> Self {
        Self { next: tag.max(1) }
    }

    /// The tag the next call to [`TagSequence::next_tag`] returns
    pub fn peek(&self) -> u8 {
        self.next
    }

    /// Take the next tag and advance, wrapping 255 back to 1
    pub fn next_tag(&mut self) -> u8 {
        let tag = self.next;
        self.next = if tag == u8::MAX { 1 } else { tag + 1 };
        tag
    }
}

impl Default for TagSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for TagSequence {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        Some(self.next_tag())
    }
}
