//! Wrapping message id arithmetic.
//!
//! Message ids are 16-bit counters that wrap at 65536. Two ids are ordered by
//! their signed distance, so `0` is newer than `65535` and ids more than half
//! the space apart are treated as unrelated.

/// Signed distance from `b` to `a` in the wrapping id space.
#[must_use]
pub const fn distance(a: u16, b: u16) -> i16 {
    a.wrapping_sub(b) as i16
}

/// Returns true if `a` was issued after `b`.
#[must_use]
pub const fn is_newer(a: u16, b: u16) -> bool {
    distance(a, b) > 0
}

/// Returns true if `a` was issued before `b`.
#[must_use]
pub const fn is_older(a: u16, b: u16) -> bool {
    distance(a, b) < 0
}

/// Monotonic message id allocator.
#[derive(Debug, Clone)]
pub struct SequenceCounter {
    next: u16,
}

impl SequenceCounter {
    /// Creates a counter whose first id is `start`.
    #[must_use]
    pub const fn new(start: u16) -> Self {
        Self { next: start }
    }

    /// Returns the next id and advances the counter, wrapping at 65536.
    pub const fn next_id(&mut self) -> u16 {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        id
    }
}
