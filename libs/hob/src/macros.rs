//! Declarative record definition.

/// Declares a record type: the struct, its [`Record`](crate::Record)
/// implementation with a compile-time UID, nested-record
/// [`Field`](crate::Field) support, and equality over the declared fields.
///
/// Fields are split into three sections, each omissible:
///
/// - `required` — mandatory fields; these and only these contribute to the
///   UID hash, so changing one changes the wire identity.
/// - `optional` — trailing fields excluded from the hash; decoders that
///   don't know them skip them, decoders that expect them tolerate their
///   absence. This is what makes additive schema evolution work.
/// - `dynamic` — runtime-typed [`Variant`](crate::Variant) fields (no type
///   annotation); their presence sets the UID's dynamic flag.
///
/// The UID hashes the names exactly as written in the declaration, so two
/// identical declarations — even in different builds or processes — always
/// agree on the wire identity.
///
/// Change bits use declaration order across all sections; resolve an index
/// with [`Record::field_index`](crate::Record::field_index).
///
/// # Examples
///
/// ```
/// hob::record! {
///     /// A named 2D position.
///     pub struct Position("Position") {
///         required {
///             x: f64,
///             y: f64,
///         }
///         optional {
///             label: Option<String>,
///         }
///     }
/// }
///
/// use hob::Record as _;
///
/// let mut point = Position::default();
/// point.x = 1.5;
/// point.label = Some(String::from("origin"));
///
/// let buf = hob::to_vec(&point).expect("encoding works");
/// let back: Position = hob::from_slice(&buf).expect("decoding works");
/// assert_eq!(point, back);
/// assert!(back.changed(Position::field_index("x").expect("declared")));
/// ```
#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $Name:ident ($wire:literal) {
            $(required { $($(#[$rmeta:meta])* $rf:ident : $rt:ty),* $(,)? })?
            $(optional { $($(#[$ometa:meta])* $of:ident : $ot:ty),* $(,)? })?
            $(dynamic { $($(#[$dmeta:meta])* $df:ident),* $(,)? })?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Default, Clone)]
        $vis struct $Name {
            $($( $(#[$rmeta])* pub $rf: $rt, )*)?
            $($( $(#[$ometa])* pub $of: $ot, )*)?
            $($( $(#[$dmeta])* pub $df: $crate::Variant, )*)?
            changes: $crate::ChangeSet,
        }

        impl $crate::Record for $Name {
            const NAME: &'static str = $wire;

            const FIELDS: &'static [&'static str] = &[
                $($( stringify!($rf), )*)?
                $($( stringify!($of), )*)?
                $($( stringify!($df), )*)?
            ];

            const UID: $crate::Uid = {
                let builder = $crate::UidBuilder::new().text($wire);
                $($( let builder = builder.field(stringify!($rt), stringify!($rf)); )*)?
                let mut dynamic_count = 0usize;
                $($( let _ = stringify!($df); dynamic_count += 1; )*)?
                builder.finish(!Self::FIELDS.is_empty(), dynamic_count > 0)
            };

            fn payload_size(&self) -> usize {
                let mut size = 0usize;
                $($( size += $crate::Field::size(&self.$rf); )*)?
                $($( size += $crate::Field::size(&self.$of); )*)?
                $($( size += $crate::Field::size(&self.$df); )*)?
                size
            }

            fn encode_fields<S: $crate::Sink + ?Sized>(
                &self,
                sink: &mut S,
            ) -> $crate::Result<()> {
                $($( $crate::Field::encode(&self.$rf, sink)?; )*)?
                $($( $crate::Field::encode(&self.$of, sink)?; )*)?
                $($( $crate::Field::encode(&self.$df, sink)?; )*)?
                let _ = sink;
                Ok(())
            }

            fn decode_fields(&mut self, window: &mut &[u8]) -> $crate::Result<()> {
                let mut index = 0usize;
                $($(
                    if $crate::Field::decode(&mut self.$rf, window)? {
                        self.changes.set(index);
                    }
                    index += 1;
                )*)?
                $($(
                    if !window.is_empty() && $crate::Field::decode(&mut self.$of, window)? {
                        self.changes.set(index);
                    }
                    index += 1;
                )*)?
                $($(
                    if !window.is_empty() && $crate::Field::decode(&mut self.$df, window)? {
                        self.changes.set(index);
                    }
                    index += 1;
                )*)?
                let _ = (index, &window);
                Ok(())
            }

            fn changes(&self) -> &$crate::ChangeSet {
                &self.changes
            }

            fn changes_mut(&mut self) -> &mut $crate::ChangeSet {
                &mut self.changes
            }
        }

        impl $crate::Field for $Name {
            fn size(&self) -> usize {
                $crate::record::encoded_size(self)
            }

            fn encode<S: $crate::Sink + ?Sized>(&self, sink: &mut S) -> $crate::Result<()> {
                $crate::record::encode(self, sink)
            }

            fn read<S: $crate::Source + ?Sized>(src: &mut S) -> $crate::Result<Self> {
                $crate::record::read_nested(src)
            }
        }

        // equality covers the declared fields; change bits are bookkeeping
        impl ::std::cmp::PartialEq for $Name {
            fn eq(&self, other: &Self) -> bool {
                let mut eq = true;
                $($( eq = eq && self.$rf == other.$rf; )*)?
                $($( eq = eq && self.$of == other.$of; )*)?
                $($( eq = eq && self.$df == other.$df; )*)?
                let _ = other;
                eq
            }
        }
    };
}
