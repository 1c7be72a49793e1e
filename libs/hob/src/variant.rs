//! Dynamically typed field values.
//!
//! A [`Variant`] carries a field identifier, a one-byte type tag, and a
//! payload whose shape the tag determines. The tag packs two 4-bit kind
//! nibbles — outer in the high bits, inner in the low bits — and reuses the
//! `Special` sentinel nibble to distinguish four shapes:
//!
//! | shape        | outer     | inner     |
//! |--------------|-----------|-----------|
//! | unknown      | `Unknown` | `Unknown` |
//! | basic scalar | `Unknown` | element   |
//! | vector       | `Special` | element   |
//! | optional     | element   | `Special` |
//! | map          | key       | value     |
//!
//! The asymmetry (vector marks the outer slot, optional the inner one) is
//! intentional compression of four shapes into one byte and must be decoded
//! exactly this way. Every other nibble combination is rejected.
//!
//! Extraction is checked: [`Variant::get`] returns [`None`] on any shape or
//! kind mismatch instead of misreading the payload.

use std::hash::Hash;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::field::Field;
use crate::io::{Sink, Source};
use crate::record::{RawRecord, Record};
use crate::varint;

/// 4-bit scalar kind nibble of a [`Variant`] tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    /// No kind assigned; also the sentinel for "no value yet".
    Unknown = 0x0,
    U8 = 0x1,
    U16 = 0x2,
    U32 = 0x3,
    U64 = 0x4,
    I8 = 0x5,
    I16 = 0x6,
    I32 = 0x7,
    I64 = 0x8,
    Bool = 0x9,
    F32 = 0xA,
    F64 = 0xB,
    Str = 0xC,
    Record = 0xD,
    /// Container marker nibble, never a scalar kind of its own.
    Special = 0xF,
}

impl Kind {
    /// Reinterprets a nibble value as a kind.
    #[must_use]
    pub const fn from_nibble(nibble: u8) -> Option<Self> {
        Some(match nibble {
            0x0 => Self::Unknown,
            0x1 => Self::U8,
            0x2 => Self::U16,
            0x3 => Self::U32,
            0x4 => Self::U64,
            0x5 => Self::I8,
            0x6 => Self::I16,
            0x7 => Self::I32,
            0x8 => Self::I64,
            0x9 => Self::Bool,
            0xA => Self::F32,
            0xB => Self::F64,
            0xC => Self::Str,
            0xD => Self::Record,
            0xF => Self::Special,
            _ => return None,
        })
    }

    /// Whether this is an actual scalar kind, not a marker nibble.
    #[must_use]
    pub const fn is_real(self) -> bool {
        !matches!(self, Self::Unknown | Self::Special)
    }
}

/// One scalar value inside a [`Variant`].
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Bool(bool),
    F32(f32),
    F64(f64),
    Str(String),
    Record(RawRecord),
}

impl Scalar {
    /// Kind nibble of this value.
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Self::U8(_) => Kind::U8,
            Self::U16(_) => Kind::U16,
            Self::U32(_) => Kind::U32,
            Self::U64(_) => Kind::U64,
            Self::I8(_) => Kind::I8,
            Self::I16(_) => Kind::I16,
            Self::I32(_) => Kind::I32,
            Self::I64(_) => Kind::I64,
            Self::Bool(_) => Kind::Bool,
            Self::F32(_) => Kind::F32,
            Self::F64(_) => Kind::F64,
            Self::Str(_) => Kind::Str,
            Self::Record(_) => Kind::Record,
        }
    }

    fn size(&self) -> usize {
        match self {
            Self::U8(v) => v.size(),
            Self::U16(v) => v.size(),
            Self::U32(v) => v.size(),
            Self::U64(v) => v.size(),
            Self::I8(v) => v.size(),
            Self::I16(v) => v.size(),
            Self::I32(v) => v.size(),
            Self::I64(v) => v.size(),
            Self::Bool(v) => v.size(),
            Self::F32(v) => v.size(),
            Self::F64(v) => v.size(),
            Self::Str(v) => v.size(),
            Self::Record(v) => v.size(),
        }
    }

    fn encode<S: Sink + ?Sized>(&self, sink: &mut S) -> Result<()> {
        match self {
            Self::U8(v) => v.encode(sink),
            Self::U16(v) => v.encode(sink),
            Self::U32(v) => v.encode(sink),
            Self::U64(v) => v.encode(sink),
            Self::I8(v) => v.encode(sink),
            Self::I16(v) => v.encode(sink),
            Self::I32(v) => v.encode(sink),
            Self::I64(v) => v.encode(sink),
            Self::Bool(v) => v.encode(sink),
            Self::F32(v) => v.encode(sink),
            Self::F64(v) => v.encode(sink),
            Self::Str(v) => v.encode(sink),
            Self::Record(v) => v.encode(sink),
        }
    }

    fn read<S: Source + ?Sized>(kind: Kind, src: &mut S) -> Result<Self> {
        Ok(match kind {
            Kind::U8 => Self::U8(Field::read(src)?),
            Kind::U16 => Self::U16(Field::read(src)?),
            Kind::U32 => Self::U32(Field::read(src)?),
            Kind::U64 => Self::U64(Field::read(src)?),
            Kind::I8 => Self::I8(Field::read(src)?),
            Kind::I16 => Self::I16(Field::read(src)?),
            Kind::I32 => Self::I32(Field::read(src)?),
            Kind::I64 => Self::I64(Field::read(src)?),
            Kind::Bool => Self::Bool(Field::read(src)?),
            Kind::F32 => Self::F32(Field::read(src)?),
            Kind::F64 => Self::F64(Field::read(src)?),
            Kind::Str => Self::Str(Field::read(src)?),
            Kind::Record => Self::Record(Field::read(src)?),
            Kind::Unknown | Kind::Special => {
                return Err(Error::InvalidVariantTag(kind as u8));
            },
        })
    }
}

/// Shape and payload of a [`Variant`].
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// No value assigned yet.
    #[default]
    Unknown,
    /// A single scalar.
    Basic(Scalar),
    /// A homogeneous sequence of scalars.
    Vector {
        /// Element kind; authoritative even when `items` is empty.
        elem: Kind,
        items: Vec<Scalar>,
    },
    /// An optional scalar.
    Optional {
        /// Wrapped kind; authoritative even when absent.
        elem: Kind,
        value: Option<Box<Scalar>>,
    },
    /// Key-value pairs, both sides homogeneous.
    Map {
        key: Kind,
        value: Kind,
        entries: Vec<(Scalar, Scalar)>,
    },
}

/// A runtime-typed field value.
///
/// Default-constructed as "unknown"; becomes typed on first assignment, and
/// reassignment replaces the owned payload entirely.
///
/// # Examples
///
/// ```
/// let mut value = hob::Variant::new(7);
/// value.set(42i32);
/// assert!(value.is_basic());
/// assert_eq!(value.get::<i32>(), Some(42));
///
/// value.set(vec![String::from("a"), String::from("b")]);
/// assert!(!value.is_basic());
/// assert!(value.is_vector());
/// assert_eq!(value.get::<i32>(), None);
/// assert_eq!(
///     value.get::<Vec<String>>(),
///     Some(vec![String::from("a"), String::from("b")])
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variant {
    id: u64,
    value: Value,
}

impl Variant {
    /// Creates an unknown-typed variant with a field identifier.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            id,
            value: Value::Unknown,
        }
    }

    /// Field identifier.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Replaces the field identifier.
    pub fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    /// Shape and payload.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The packed tag byte: outer kind in the high nibble, inner in the low.
    #[must_use]
    pub fn tag(&self) -> u8 {
        let (outer, inner) = match &self.value {
            Value::Unknown => (Kind::Unknown, Kind::Unknown),
            Value::Basic(scalar) => (Kind::Unknown, scalar.kind()),
            Value::Vector { elem, .. } => (Kind::Special, *elem),
            Value::Optional { elem, .. } => (*elem, Kind::Special),
            Value::Map { key, value, .. } => (*key, *value),
        };

        (outer as u8) << 4 | inner as u8
    }

    /// Whether no value has been assigned.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self.value, Value::Unknown)
    }

    /// Whether the value is a single scalar.
    #[must_use]
    pub fn is_basic(&self) -> bool {
        matches!(self.value, Value::Basic(_))
    }

    /// Whether the value is a vector of scalars.
    #[must_use]
    pub fn is_vector(&self) -> bool {
        matches!(self.value, Value::Vector { .. })
    }

    /// Whether the value is an optional scalar.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        matches!(self.value, Value::Optional { .. })
    }

    /// Whether the value is a map.
    #[must_use]
    pub fn is_map(&self) -> bool {
        matches!(self.value, Value::Map { .. })
    }

    /// Assigns a value, replacing the prior one and its type.
    pub fn set<T: IntoVariant>(&mut self, value: T) {
        self.value = value.into_value();
    }

    /// Extracts the value as `T`.
    ///
    /// Returns [`None`] when the stored shape or kind doesn't match `T`.
    #[must_use]
    pub fn get<T: FromVariant>(&self) -> Option<T> {
        T::from_value(&self.value)
    }

    /// Assigns a typed record, captured into its raw form.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature matches the encode path.
    pub fn set_record<R: Record>(&mut self, record: &R) -> Result<()> {
        self.value = Value::Basic(Scalar::Record(RawRecord::capture(record)?));
        Ok(())
    }

    /// Extracts a typed record.
    ///
    /// Returns [`None`] when the value is not a record of `R`'s type or its
    /// payload doesn't decode as `R`.
    #[must_use]
    pub fn get_record<R: Record>(&self) -> Option<R> {
        match &self.value {
            Value::Basic(Scalar::Record(raw)) => raw.open().ok().flatten(),
            _ => None,
        }
    }

    fn payload_size(&self) -> usize {
        match &self.value {
            Value::Unknown => 0,
            Value::Basic(scalar) => scalar.size(),
            Value::Vector { items, .. } => {
                let content: usize = items.iter().map(Scalar::size).sum();
                varint::size(items.len() as u64) + content
            },
            Value::Optional { value, .. } => match value {
                Some(scalar) => 1 + scalar.size(),
                None => 1,
            },
            Value::Map { entries, .. } => {
                let content: usize = entries
                    .iter()
                    .map(|(key, value)| key.size() + value.size())
                    .sum();
                varint::size(entries.len() as u64) + content
            },
        }
    }

    fn encode_payload<S: Sink + ?Sized>(&self, sink: &mut S) -> Result<()> {
        match &self.value {
            Value::Unknown => Ok(()),
            Value::Basic(scalar) => scalar.encode(sink),
            Value::Vector { items, .. } => {
                varint::write(sink, items.len() as u64)?;
                for item in items {
                    item.encode(sink)?;
                }

                Ok(())
            },
            Value::Optional { value, .. } => match value {
                Some(scalar) => {
                    sink.put(1)?;
                    scalar.encode(sink)
                },
                None => sink.put(0),
            },
            Value::Map { entries, .. } => {
                varint::write(sink, entries.len() as u64)?;
                for (key, value) in entries {
                    key.encode(sink)?;
                    value.encode(sink)?;
                }

                Ok(())
            },
        }
    }

    fn read_payload<S: Source + ?Sized>(tag: u8, src: &mut S) -> Result<Value> {
        let outer = Kind::from_nibble(tag >> 4);
        let inner = Kind::from_nibble(tag & 0xF);
        let (Some(outer), Some(inner)) = (outer, inner) else {
            return Err(Error::InvalidVariantTag(tag));
        };

        match (outer, inner) {
            (Kind::Unknown, Kind::Unknown) => Ok(Value::Unknown),
            (Kind::Unknown, elem) if elem.is_real() => {
                Ok(Value::Basic(Scalar::read(elem, src)?))
            },
            (Kind::Special, elem) if elem.is_real() => {
                let count = varint::read_len(src)?;
                let mut items = Vec::with_capacity(count.min(0x1000));
                for _ in 0..count {
                    items.push(Scalar::read(elem, src)?);
                }

                Ok(Value::Vector { elem, items })
            },
            (elem, Kind::Special) if elem.is_real() => {
                let value = match src.get()?.ok_or_else(crate::error::eof)? {
                    0 => None,
                    1 => Some(Box::new(Scalar::read(elem, src)?)),
                    _ => return Err(Error::InvalidPresence),
                };

                Ok(Value::Optional { elem, value })
            },
            (key, value) if key.is_real() && value.is_real() => {
                let count = varint::read_len(src)?;
                let mut entries = Vec::with_capacity(count.min(0x1000));
                for _ in 0..count {
                    let entry_key = Scalar::read(key, src)?;
                    let entry_value = Scalar::read(value, src)?;
                    entries.push((entry_key, entry_value));
                }

                Ok(Value::Map {
                    key,
                    value,
                    entries,
                })
            },
            _ => Err(Error::InvalidVariantTag(tag)),
        }
    }
}

impl Field for Variant {
    fn size(&self) -> usize {
        varint::size(self.id) + 1 + self.payload_size()
    }

    fn encode<S: Sink + ?Sized>(&self, sink: &mut S) -> Result<()> {
        varint::write(sink, self.id)?;
        sink.put(self.tag())?;
        self.encode_payload(sink)
    }

    fn read<S: Source + ?Sized>(src: &mut S) -> Result<Self> {
        let id = varint::read(src)?;
        let tag = src.get()?.ok_or_else(crate::error::eof)?;
        let value = Self::read_payload(tag, src)?;
        Ok(Self { id, value })
    }
}

/// A concrete Rust type corresponding to one scalar [`Kind`].
pub trait ScalarValue: Sized {
    /// Kind nibble of this type.
    const KIND: Kind;

    /// Wraps the value into a [`Scalar`].
    fn into_scalar(self) -> Scalar;

    /// Extracts the value if the scalar holds this kind.
    fn from_scalar(scalar: &Scalar) -> Option<Self>;
}

macro_rules! impl_scalar_value {
    ($($Ty:ty => $Arm:ident),* $(,)?) => { $(
        impl ScalarValue for $Ty {
            const KIND: Kind = Kind::$Arm;

            fn into_scalar(self) -> Scalar {
                Scalar::$Arm(self)
            }

            fn from_scalar(scalar: &Scalar) -> Option<Self> {
                match scalar {
                    Scalar::$Arm(value) => Some(*value),
                    _ => None,
                }
            }
        }
    )* };
}

impl_scalar_value! {
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    bool => Bool,
    f32 => F32,
    f64 => F64,
}

impl ScalarValue for String {
    const KIND: Kind = Kind::Str;

    fn into_scalar(self) -> Scalar {
        Scalar::Str(self)
    }

    fn from_scalar(scalar: &Scalar) -> Option<Self> {
        match scalar {
            Scalar::Str(value) => Some(value.clone()),
            _ => None,
        }
    }
}

impl ScalarValue for RawRecord {
    const KIND: Kind = Kind::Record;

    fn into_scalar(self) -> Scalar {
        Scalar::Record(self)
    }

    fn from_scalar(scalar: &Scalar) -> Option<Self> {
        match scalar {
            Scalar::Record(value) => Some(value.clone()),
            _ => None,
        }
    }
}

/// Conversion of a typed value into a [`Variant`] payload.
pub trait IntoVariant {
    /// Builds the shape and payload for this value.
    fn into_value(self) -> Value;
}

/// Checked extraction of a typed value out of a [`Variant`] payload.
pub trait FromVariant: Sized {
    /// Extracts the value if the shape and kinds match.
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! impl_variant_basic {
    ($($Ty:ty),* $(,)?) => { $(
        impl IntoVariant for $Ty {
            fn into_value(self) -> Value {
                Value::Basic(self.into_scalar())
            }
        }

        impl FromVariant for $Ty {
            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::Basic(scalar) => Self::from_scalar(scalar),
                    _ => None,
                }
            }
        }
    )* };
}

impl_variant_basic!(u8, u16, u32, u64, i8, i16, i32, i64, bool, f32, f64, String, RawRecord);

impl<T: ScalarValue> IntoVariant for Vec<T> {
    fn into_value(self) -> Value {
        Value::Vector {
            elem: T::KIND,
            items: self.into_iter().map(T::into_scalar).collect(),
        }
    }
}

impl<T: ScalarValue> FromVariant for Vec<T> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Vector { elem, items } if *elem == T::KIND => {
                items.iter().map(T::from_scalar).collect()
            },
            _ => None,
        }
    }
}

impl<T: ScalarValue> IntoVariant for Option<T> {
    fn into_value(self) -> Value {
        Value::Optional {
            elem: T::KIND,
            value: self.map(|value| Box::new(value.into_scalar())),
        }
    }
}

impl<T: ScalarValue> FromVariant for Option<T> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Optional { elem, value } if *elem == T::KIND => match value {
                Some(scalar) => T::from_scalar(scalar).map(Some),
                None => Some(None),
            },
            _ => None,
        }
    }
}

impl<K: ScalarValue + Eq + Hash, V: ScalarValue> IntoVariant for IndexMap<K, V> {
    fn into_value(self) -> Value {
        Value::Map {
            key: K::KIND,
            value: V::KIND,
            entries: self
                .into_iter()
                .map(|(key, value)| (key.into_scalar(), value.into_scalar()))
                .collect(),
        }
    }
}

impl<K: ScalarValue + Eq + Hash, V: ScalarValue> FromVariant for IndexMap<K, V> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Map {
                key,
                value,
                entries,
            } if *key == K::KIND && *value == V::KIND => {
                let mut map = Self::with_capacity(entries.len());
                for (entry_key, entry_value) in entries {
                    // repeated insertion: a later duplicate key overwrites
                    map.insert(K::from_scalar(entry_key)?, V::from_scalar(entry_value)?);
                }

                Some(map)
            },
            _ => None,
        }
    }
}
