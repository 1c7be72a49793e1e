//! Structural record identity.
//!
//! A record type's wire identity is a 64-bit UID derived from its declared
//! name and the `(type name, field name)` pair of every *mandatory* field, in
//! declaration order. Optional and dynamic fields are excluded from the hash
//! on purpose: adding trailing optional fields to an existing record must not
//! change its wire identity.
//!
//! The two low bits are flags: bit 0 says the record carries a payload (it
//! has at least one field of any kind), bit 1 says it carries dynamic
//! fields. The remaining 62 bits hold the string hash, so collisions between
//! structurally different records are possible and accepted; a receiver
//! resolves them by attempting a full field decode.

use std::fmt;

/// 64-bit structural fingerprint identifying a record type on the wire.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uid(u64);

impl Uid {
    /// Creates a UID from its raw wire value.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw wire value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Whether records of this type carry a payload, i.e. declare fields.
    ///
    /// Only when this is set does the envelope contain a payload length.
    #[must_use]
    pub const fn has_payload(self) -> bool {
        self.0 & 1 != 0
    }

    /// Whether records of this type declare dynamic (variant) fields.
    #[must_use]
    pub const fn has_dynamic(self) -> bool {
        self.0 & 2 != 0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Iterative string-hash accumulator producing a [`Uid`].
///
/// All methods are `const fn` so a record type's UID can be a `const` item,
/// which also pins the identity to the exact declared name bytes: identical
/// declarations produce identical UIDs on every platform.
///
/// # Examples
///
/// ```
/// use hob::UidBuilder;
///
/// const UID: hob::Uid = UidBuilder::new()
///     .text("Position")
///     .field("f64", "x")
///     .field("f64", "y")
///     .finish(true, false);
/// assert!(UID.has_payload());
/// assert!(!UID.has_dynamic());
/// ```
#[derive(Debug, Clone, Copy)]
#[must_use]
pub struct UidBuilder(u64);

impl UidBuilder {
    const FACTOR: u64 = 65599;

    /// Creates a builder with a zeroed accumulator.
    pub const fn new() -> Self {
        Self(0)
    }

    /// Creates a builder from a prior accumulator value, for extending an
    /// existing identity.
    pub const fn from_acc(acc: u64) -> Self {
        Self(acc)
    }

    /// Current accumulator value.
    #[must_use]
    pub const fn acc(self) -> u64 {
        self.0
    }

    /// Folds every byte of `text` into the accumulator.
    pub const fn text(self, text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut acc = self.0;
        let mut i = 0;
        while i < bytes.len() {
            acc = acc.wrapping_mul(Self::FACTOR).wrapping_add(bytes[i] as u64);
            i += 1;
        }

        Self(acc)
    }

    /// Folds one mandatory field's type name and field name.
    pub const fn field(self, type_name: &str, field_name: &str) -> Self {
        self.text(type_name).text(field_name)
    }

    /// Finalizes the hash into a [`Uid`], reserving the two low flag bits.
    #[must_use]
    pub const fn finish(self, has_fields: bool, has_dynamic: bool) -> Uid {
        Uid((self.0 << 2) | ((has_dynamic as u64) << 1) | has_fields as u64)
    }
}

impl Default for UidBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_uid() -> Uid {
        UidBuilder::new()
            .text("Point")
            .field("i32", "x")
            .field("i32", "y")
            .finish(true, false)
    }

    #[test]
    fn deterministic_across_builders() {
        assert_eq!(point_uid(), point_uid());

        // optional fields never reach the builder, so a type with extra
        // optional fields hashes the same way
        let with_optional = UidBuilder::new()
            .text("Point")
            .field("i32", "x")
            .field("i32", "y")
            .finish(true, false);
        assert_eq!(point_uid(), with_optional);
    }

    #[test]
    fn sensitive_to_mandatory_shape() {
        let renamed = UidBuilder::new()
            .text("Point")
            .field("i32", "x")
            .field("i32", "z")
            .finish(true, false);
        assert_ne!(point_uid(), renamed, "field rename must change the uid");

        let reordered = UidBuilder::new()
            .text("Point")
            .field("i32", "y")
            .field("i32", "x")
            .finish(true, false);
        assert_ne!(point_uid(), reordered, "field order must change the uid");

        let fewer = UidBuilder::new()
            .text("Point")
            .field("i32", "x")
            .finish(true, false);
        assert_ne!(point_uid(), fewer, "field removal must change the uid");

        let retyped = UidBuilder::new()
            .text("Point")
            .field("i64", "x")
            .field("i32", "y")
            .finish(true, false);
        assert_ne!(point_uid(), retyped, "field retype must change the uid");
    }

    #[test]
    fn flag_bits() {
        let empty = UidBuilder::new().text("Empty").finish(false, false);
        assert!(!empty.has_payload());
        assert!(!empty.has_dynamic());

        let dynamic = UidBuilder::new().text("Dyn").finish(true, true);
        assert!(dynamic.has_payload());
        assert!(dynamic.has_dynamic());
        assert_eq!(dynamic.raw() & 0b11, 0b11);
    }
}
