//! Per-field dirty-bit tracking.

use std::fmt;

use smallvec::SmallVec;

/// Records which fields of a record the most recent decode altered.
///
/// One bit per declared field, indexed in declaration order. Decode clears
/// the set before writing new bits, so it always answers "what changed in
/// the last decode"; bits can also be cleared individually.
///
/// Not part of the wire format, and excluded from record equality.
#[derive(Default, Clone)]
pub struct ChangeSet {
    // inline storage covers records with up to 64 fields
    bits: SmallVec<[u8; 8]>,
}

impl ChangeSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the field at `index` as changed.
    pub fn set(&mut self, index: usize) {
        let byte = index / 8;
        if byte >= self.bits.len() {
            self.bits.resize(byte + 1, 0);
        }

        self.bits[byte] |= 1 << (index % 8);
    }

    /// Whether the field at `index` is marked changed.
    #[must_use]
    pub fn test(&self, index: usize) -> bool {
        self.bits
            .get(index / 8)
            .is_some_and(|byte| byte & (1 << (index % 8)) != 0)
    }

    /// Clears the mark for the field at `index`.
    pub fn clear(&mut self, index: usize) {
        if let Some(byte) = self.bits.get_mut(index / 8) {
            *byte &= !(1 << (index % 8));
        }
    }

    /// Clears all marks.
    pub fn clear_all(&mut self) {
        self.bits.clear();
    }

    /// Whether any field is marked changed.
    #[must_use]
    pub fn any(&self) -> bool {
        self.bits.iter().any(|byte| *byte != 0)
    }
}

impl fmt::Debug for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let indices = (0..self.bits.len() * 8).filter(|i| self.test(*i));
        f.debug_set().entries(indices).finish()
    }
}
