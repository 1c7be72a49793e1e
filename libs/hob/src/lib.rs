//! # HOB — Hashed OBject serialization
//!
//! Self-describing binary records without a schema registry: a record type's
//! wire identity is a 64-bit UID hashed from its declared name and mandatory
//! field names, so structurally identical declarations agree on identity
//! across processes while a receiver can probe any incoming record against
//! its locally known shapes — and skip the ones it doesn't know, byte-exact.
//!
//! The wire building blocks are:
//!
//! - `varint`: unsigned integer in 1..=9 bytes, unary length prefix,
//!   big-endian value bits
//! - `record`: `varint` UID, then — iff the UID's payload flag is set —
//!   a `varint` payload length and exactly that many field bytes
//! - signed integers ZigZag-map onto `varint`; floats are raw native byte
//!   images (deliberately *not* byte-order-normalized, unlike integers —
//!   cross-endian float interop is not guaranteed)
//! - strings and byte strings are length-prefixed; options carry a presence
//!   byte; sequences and maps a count prefix; bit containers a byte-count
//!   prefix; nested records a full inner envelope
//! - `variant`: runtime-typed values with a one-byte shape tag, usable as
//!   dynamic record fields
//!
//! Record types are declared with [`record!`]:
//!
//! ```
//! hob::record! {
//!     pub struct Greeting("Greeting") {
//!         required { who: String, count: u32 }
//!     }
//! }
//!
//! use hob::Record as _;
//!
//! let mut hello = Greeting::default();
//! hello.who = String::from("world");
//! hello.count = 2;
//!
//! let buf = hob::to_vec(&hello).expect("encoding works");
//!
//! // a receiver probes the stream against the types it knows
//! let mut src: &[u8] = &buf;
//! let envelope = hob::Envelope::read(&mut src)
//!     .expect("reading works")
//!     .expect("a record is present");
//! let back: Greeting = envelope
//!     .decode()
//!     .expect("payload is well-formed")
//!     .expect("uid matches");
//! assert_eq!(back, hello);
//! ```

pub mod bits;
mod changes;
mod error;
pub mod field;
pub mod io;
mod macros;
pub mod record;
pub mod uid;
pub mod varint;
pub mod variant;

pub use bits::{BitVec, Bitset};
pub use changes::ChangeSet;
pub use error::{Error, Result};
pub use field::{Bytes, Field};
pub use io::{IoSink, IoSource, Sink, Source};
pub use record::{Envelope, RawRecord, Record, encode, encoded_size, from_slice, to_vec};
pub use uid::{Uid, UidBuilder};
pub use variant::{FromVariant, IntoVariant, Kind, Scalar, ScalarValue, Value, Variant};

#[cfg(test)]
mod tests {
    // end-to-end coverage of the framing and identity guarantees; the
    // per-kind codec details live in the individual modules
    use std::collections::BTreeMap;

    use indexmap::IndexMap;

    use super::*;

    crate::record! {
        struct KnownA("KnownA") {
            required { id: u32, name: String }
        }
    }

    crate::record! {
        struct KnownB("KnownB") {
            required { value: i64 }
        }
    }

    crate::record! {
        struct UnknownX("UnknownX") {
            required { blob: Bytes }
        }
    }

    crate::record! {
        struct Inner("Inner") {
            required { a: u16, b: String }
        }
    }

    crate::record! {
        struct Outer("Outer") {
            required {
                one: Inner,
                many: Vec<Inner>,
                maybe: Option<Vec<u32>>,
                lookup: BTreeMap<String, Inner>,
                flags: Bitset<10>,
                trail: BitVec,
            }
        }
    }

    // two declarations of the same wire shape, one with extra optional
    // fields: their UIDs must agree (additive schema evolution)
    crate::record! {
        struct ItemV1("Item") {
            required { id: u32 }
        }
    }

    crate::record! {
        struct ItemV2("Item") {
            required { id: u32 }
            optional { note: Option<String>, rating: u16 }
        }
    }

    crate::record! {
        struct Tagged("Tagged") {
            required { label: String }
            dynamic { extra }
        }
    }

    crate::record! {
        struct Empty("Empty") {}
    }

    fn inner(a: u16, b: &str) -> Inner {
        let mut value = Inner::default();
        value.a = a;
        value.b = String::from(b);
        value
    }

    #[test]
    fn round_trip_composites() {
        let mut outer = Outer::default();
        outer.one = inner(1, "one");
        outer.many = vec![inner(2, "two"), inner(3, "three")];
        outer.maybe = Some(vec![10, 20, 30]);
        outer.lookup = BTreeMap::from_iter([
            (String::from("k1"), inner(4, "four")),
            (String::from("k2"), inner(5, "five")),
        ]);
        outer.flags.set(2, true);
        outer.flags.set(9, true);
        outer.trail = [true, true, false].into_iter().collect();

        let buf = to_vec(&outer).expect("encoding works");
        assert_eq!(buf.len(), encoded_size(&outer), "size must predict");

        let back: Outer = from_slice(&buf).expect("decoding works");
        assert_eq!(back, outer);
    }

    #[test]
    fn empty_record_has_no_payload() {
        assert!(!Empty::UID.has_payload());

        let buf = to_vec(&Empty::default()).expect("encoding works");
        assert_eq!(buf.len(), varint::size(Empty::UID.raw()), "uid only");

        let back: Empty = from_slice(&buf).expect("decoding works");
        assert_eq!(back, Empty::default());
    }

    #[test]
    fn uid_determinism() {
        assert_eq!(ItemV1::UID, ItemV2::UID, "optional fields don't hash");
        assert_ne!(KnownA::UID, KnownB::UID);
        assert_ne!(ItemV1::UID, KnownB::UID);
        assert!(Tagged::UID.has_dynamic());
        assert!(!KnownA::UID.has_dynamic());
    }

    fn sample_stream() -> Vec<u8> {
        let mut a = KnownA::default();
        a.id = 42;
        a.name = String::from("first");

        let mut x = UnknownX::default();
        x.blob = Bytes(vec![0xAB; 36]); // 1-byte length prefix + 36 = 37

        let mut b = KnownB::default();
        b.value = -12345;

        let mut buf = Vec::new();
        encode(&a, &mut buf).expect("encoding works");
        encode(&x, &mut buf).expect("encoding works");
        encode(&b, &mut buf).expect("encoding works");
        buf
    }

    #[test]
    fn skip_and_resync() {
        let buf = sample_stream();
        assert_eq!(UnknownX::default().payload_size() + 36, 37);

        // the consumer knows only KnownA and KnownB
        let mut src: &[u8] = &buf;
        let mut seen_a = None;
        let mut seen_b = None;
        let mut skipped = 0;

        while let Some(envelope) = Envelope::read(&mut src).expect("reading works") {
            if let Some(a) = envelope.decode::<KnownA>().expect("well-formed") {
                seen_a = Some(a);
            } else if let Some(b) = envelope.decode::<KnownB>().expect("well-formed") {
                seen_b = Some(b);
            } else {
                skipped += 1;
            }
        }

        let a = seen_a.expect("KnownA must be found");
        assert_eq!((a.id, a.name.as_str()), (42, "first"));
        let b = seen_b.expect("KnownB must decode correctly after the skip");
        assert_eq!(b.value, -12345);
        assert_eq!(skipped, 1, "exactly the unknown record is skipped");
    }

    #[test]
    fn skip_without_buffering() {
        let buf = sample_stream();
        let mut src = IoSource::new(std::io::Cursor::new(buf));

        let mut records = 0;
        while Envelope::skip(&mut src).expect("skipping works") {
            records += 1;
        }

        assert_eq!(records, 3);
        assert_eq!(src.get().expect("eof is clean"), None);
    }

    #[test]
    fn additive_schema_tolerance() {
        // a newer producer writes extra trailing optional fields
        let mut item = ItemV2::default();
        item.id = 7;
        item.note = Some(String::from("fresh"));
        item.rating = 9;

        let mut buf = Vec::new();
        encode(&item, &mut buf).expect("encoding works");
        let mut b = KnownB::default();
        b.value = 1;
        encode(&b, &mut buf).expect("encoding works");

        // an older consumer decodes its known fields and resyncs exactly
        let mut src: &[u8] = &buf;
        let envelope = Envelope::read(&mut src).expect("reading works");
        let old: ItemV1 = envelope
            .expect("record present")
            .decode()
            .expect("well-formed")
            .expect("same uid");
        assert_eq!(old.id, 7);

        let next = Envelope::read(&mut src).expect("cursor is at the next record");
        let b: KnownB = next
            .expect("record present")
            .decode()
            .expect("well-formed")
            .expect("same uid");
        assert_eq!(b.value, 1);

        // and the other direction: an older producer, a newer consumer
        let buf = to_vec(&ItemV1 { id: 3, ..Default::default() }).expect("encoding works");
        let new: ItemV2 = from_slice(&buf).expect("absent optionals are fine");
        assert_eq!(new.id, 3);
        assert_eq!(new.note, None);
        assert_eq!(new.rating, 0);
        assert!(new.changed(0), "id changed from default");
        assert!(!new.changed(1), "absent fields keep their value");
    }

    #[test]
    fn change_tracking() {
        let mut a = KnownA::default();
        a.id = 5;
        a.name = String::from("x");
        let first = Envelope::read(&mut to_vec(&a).expect("encoding works").as_slice())
            .expect("reading works")
            .expect("record present");

        let mut target = KnownA::default();
        assert!(first.decode_into(&mut target).expect("well-formed"));
        assert!(target.changed(0), "id: default 0 -> 5");
        assert!(target.changed(1), "name: default -> x");

        // same bytes again: nothing changes
        assert!(first.decode_into(&mut target).expect("well-formed"));
        assert!(!target.changes().any(), "identical decode sets no bits");

        // alter exactly one field
        a.name = String::from("y");
        let second = Envelope::read(&mut to_vec(&a).expect("encoding works").as_slice())
            .expect("reading works")
            .expect("record present");
        assert!(second.decode_into(&mut target).expect("well-formed"));
        assert!(!target.changed(0), "id is unchanged");
        assert!(target.changed(1), "name changed");

        // bits reset independently
        target.changes_mut().set(0);
        target.changes_mut().clear(1);
        assert!(target.changed(0));
        assert!(!target.changed(1));

        assert_eq!(KnownA::field_index("name"), Some(1));
        assert_eq!(KnownA::field_index("nope"), None);
    }

    #[test]
    fn map_duplicate_key_overwrites() {
        // handcrafted map field: two entries with the same key
        let dup: Vec<u8> = vec![
            2, // count
            1, b'k', 7, // "k" -> 7
            1, b'k', 9, // "k" -> 9
        ];
        let mut src: &[u8] = &dup;
        let map = IndexMap::<String, u32>::read(&mut src).expect("decoding works");
        assert_eq!(map.len(), 1, "duplicate key collapses to one entry");
        assert_eq!(map.get("k"), Some(&9), "the later value wins");

        // and it stays collapsed through a full round trip
        let mut buf = Vec::new();
        map.encode(&mut buf).expect("encoding works");
        let mut src: &[u8] = &buf;
        let back = IndexMap::<String, u32>::read(&mut src).expect("decoding works");
        assert_eq!(map, back);
    }

    #[test]
    fn dynamic_fields_round_trip() {
        let mut tagged = Tagged::default();
        tagged.label = String::from("measurements");
        tagged.extra.set_id(4);
        tagged.extra.set(vec![1.5f64, -2.5, 0.25]);

        let buf = to_vec(&tagged).expect("encoding works");
        let back: Tagged = from_slice(&buf).expect("decoding works");
        assert_eq!(back, tagged);
        assert_eq!(back.extra.id(), 4);
        assert!(back.extra.is_vector());
        assert_eq!(back.extra.get::<Vec<f64>>(), Some(vec![1.5, -2.5, 0.25]));
    }

    #[test]
    fn record_inside_variant() {
        let mut tagged = Tagged::default();
        tagged.label = String::from("wrapped");
        tagged.extra.set_record(&inner(8, "deep")).expect("capture works");

        let buf = to_vec(&tagged).expect("encoding works");
        let back: Tagged = from_slice(&buf).expect("decoding works");
        assert_eq!(
            back.extra.get_record::<Inner>(),
            Some(inner(8, "deep")),
            "typed record extraction after the round trip"
        );
        assert_eq!(
            back.extra.get_record::<KnownB>(),
            None,
            "a different record type must not match"
        );
    }

    #[test]
    fn wrong_uid_is_not_an_error() {
        let buf = to_vec(&KnownB::default()).expect("encoding works");
        let envelope = Envelope::read(&mut buf.as_slice())
            .expect("reading works")
            .expect("record present");

        assert!(!envelope.is::<KnownA>());
        assert!(envelope.decode::<KnownA>().expect("mismatch is routine").is_none());

        // the strict entry point does treat it as an error
        let err = from_slice::<KnownA>(&buf).expect_err("strict decode fails");
        assert!(matches!(err, Error::UidMismatch { .. }), "got: {err:?}");
    }

    #[test]
    fn truncated_record_is_an_error() {
        let buf = sample_stream();
        let mut src: &[u8] = &buf[..buf.len() - 3];
        assert!(Envelope::read(&mut src).expect("first is intact").is_some());
        assert!(Envelope::read(&mut src).expect("second is intact").is_some());
        assert!(
            Envelope::read(&mut src).is_err(),
            "a truncated envelope is fatal, not a clean eof"
        );
    }
}
