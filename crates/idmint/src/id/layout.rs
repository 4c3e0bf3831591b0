//! Macro-defined packed 64-bit identifier layouts.
//!
//! Every snowflake-family layout is a 64-bit word packed from **MSB to LSB**
//! with one reserved sign bit so the value stays in the positive half of a
//! signed 64-bit integer:
//!
//! ```text
//!  Bit Index:  high bits                         low bits
//!              +----------+-------------+---------------+
//!  Field:      | time (N) | middle (M)  |   low (K)     |
//!              +----------+-------------+---------------+
//!              |<----- MSB ---- 64 bits ---- LSB ------>|
//! ```
//!
//! The field *names* differ per variant (node vs. shard vs. machine, and
//! Sonyflake swaps sequence and machine), so the macro takes the three field
//! idents and generates accessors named after them.

/// Declares a packed 64-bit identifier type with a custom three-field layout.
///
/// Field widths are checked at compile time: `reserved` plus the three field
/// widths must cover exactly 64 bits, otherwise the build fails. Construction
/// masks each component to its declared width, so an oversized input can
/// never alias a neighboring field.
#[macro_export]
macro_rules! define_layout64 {
    (
        $(#[$meta:meta])*
        $name:ident,
        reserved: $reserved:expr,
        $time:ident: $time_bits:expr,
        $mid:ident: $mid_bits:expr,
        $low:ident: $low_bits:expr
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        #[repr(transparent)]
        pub struct $name {
            id: u64,
        }

        const _: () = {
            // Compile-time check: the layout must cover the word exactly.
            assert!(
                $reserved + $time_bits + $mid_bits + $low_bits == 64,
                "layout must cover all 64 bits"
            );
        };

        impl $name {
            pub const RESERVED_BITS: u32 = $reserved;
            pub const TIME_BITS: u32 = $time_bits;
            pub const MID_BITS: u32 = $mid_bits;
            pub const LOW_BITS: u32 = $low_bits;

            pub const MID_SHIFT: u32 = Self::LOW_BITS;
            pub const TIME_SHIFT: u32 = Self::LOW_BITS + Self::MID_BITS;

            pub const MAX_TIME: u64 = (1 << Self::TIME_BITS) - 1;
            pub const MAX_MID: u64 = (1 << Self::MID_BITS) - 1;
            pub const MAX_LOW: u64 = (1 << Self::LOW_BITS) - 1;

            /// Packs the three components, masking each to its field width.
            #[must_use]
            pub const fn from_parts($time: u64, $mid: u64, $low: u64) -> Self {
                Self {
                    id: (($time & Self::MAX_TIME) << Self::TIME_SHIFT)
                        | (($mid & Self::MAX_MID) << Self::MID_SHIFT)
                        | ($low & Self::MAX_LOW),
                }
            }

            #[doc = concat!("Extracts the `", stringify!($time), "` field (epoch-relative).")]
            #[must_use]
            pub const fn $time(&self) -> u64 {
                (self.id >> Self::TIME_SHIFT) & Self::MAX_TIME
            }

            #[doc = concat!("Extracts the `", stringify!($mid), "` field.")]
            #[must_use]
            pub const fn $mid(&self) -> u64 {
                (self.id >> Self::MID_SHIFT) & Self::MAX_MID
            }

            #[doc = concat!("Extracts the `", stringify!($low), "` field.")]
            #[must_use]
            pub const fn $low(&self) -> u64 {
                self.id & Self::MAX_LOW
            }

            /// Converts this identifier into its raw packed representation.
            #[must_use]
            pub const fn to_raw(&self) -> u64 {
                self.id
            }

            /// Reinterprets a raw packed word as this layout.
            #[must_use]
            pub const fn from_raw(raw: u64) -> Self {
                Self { id: raw }
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.id, f)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> u64 {
                id.to_raw()
            }
        }
    };
}
