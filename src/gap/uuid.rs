#![allow(clippy::use_self)]

use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};

use structbuf::{Packer, Unpack};

const SHIFT: u32 = u128::BITS - u32::BITS;
const BASE: u128 = 0x00000000_0000_1000_8000_00805F9B34FB;

/// 16-, 32-, or 128-bit UUID ([Vol 3] Part B, Section 2.5.1).
///
/// The three widths are interconvertible: a 16- or 32-bit UUID is shorthand
/// for `xxxxxxxx-0000-1000-8000-00805F9B34FB`. Equality, ordering, and
/// hashing operate on the expanded 128-bit form, so `Uuid::U16(0x2800)`
/// equals its widened representations. The stored width is preserved for
/// wire encoding.
#[derive(Clone, Copy)]
pub enum Uuid {
    U16(u16),
    U32(u32),
    U128(u128),
}

impl Uuid {
    /// Returns the expanded 128-bit form.
    #[inline]
    #[must_use]
    pub const fn as_u128(self) -> u128 {
        match self {
            Self::U16(v) => (v as u128) << SHIFT | BASE,
            Self::U32(v) => (v as u128) << SHIFT | BASE,
            Self::U128(v) => v,
        }
    }

    /// Returns the raw 16-bit value or [`None`] if the UUID was not declared
    /// 16-bit.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> Option<u16> {
        match self {
            Self::U16(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the encoded length in bytes (2, 4, or 16).
    #[inline]
    #[must_use]
    pub const fn len(self) -> usize {
        match self {
            Self::U16(_) => 2,
            Self::U32(_) => 4,
            Self::U128(_) => 16,
        }
    }

    /// Returns the UUID widened to 128 bits.
    #[inline]
    #[must_use]
    pub const fn widen(self) -> Self {
        Self::U128(self.as_u128())
    }

    /// Writes the UUID in its declared width, little-endian.
    #[inline]
    pub fn pack(self, p: &mut Packer) {
        match self {
            Self::U16(v) => p.u16(v),
            Self::U32(v) => p.u32(v),
            Self::U128(v) => p.u128(v),
        };
    }

    /// Returns the UUID as little-endian bytes in its declared width.
    #[must_use]
    pub fn to_bytes(self) -> Vec<u8> {
        match self {
            Self::U16(v) => v.to_le_bytes().to_vec(),
            Self::U32(v) => v.to_le_bytes().to_vec(),
            Self::U128(v) => v.to_le_bytes().to_vec(),
        }
    }
}

impl TryFrom<&[u8]> for Uuid {
    type Error = ();

    /// Decodes a little-endian UUID of 2, 4, or 16 bytes.
    #[inline]
    fn try_from(v: &[u8]) -> Result<Self, Self::Error> {
        match v.len() {
            2 => Ok(Self::U16(v.unpack().u16())),
            4 => Ok(Self::U32(v.unpack().u32())),
            16 => Ok(Self::U128(v.unpack().u128())),
            _ => Err(()),
        }
    }
}

impl PartialEq for Uuid {
    #[inline]
    fn eq(&self, rhs: &Self) -> bool {
        self.as_u128() == rhs.as_u128()
    }
}

impl Eq for Uuid {}

#[allow(clippy::derive_hash_xor_eq)]
impl Hash for Uuid {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_u128().hash(state);
    }
}

impl PartialOrd for Uuid {
    #[inline]
    fn partial_cmp(&self, rhs: &Self) -> Option<Ordering> {
        Some(self.cmp(rhs))
    }
}

impl Ord for Uuid {
    #[inline]
    fn cmp(&self, rhs: &Self) -> Ordering {
        self.as_u128().cmp(&rhs.as_u128())
    }
}

impl Debug for Uuid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        #[allow(clippy::cast_possible_truncation)]
        match *self {
            Self::U16(v) => write!(f, "{v:#06X}"),
            Self::U32(v) => write!(f, "{v:#010X}"),
            Self::U128(v) => write!(
                f,
                "{:08X}-{:04X}-{:04X}-{:04X}-{:012X}",
                (v >> 96) as u32,
                (v >> 80) as u16,
                (v >> 64) as u16,
                (v >> 48) as u16,
                (v & ((1 << 48) - 1)) as u64
            ),
        }
    }
}

impl Display for Uuid {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

impl From<u16> for Uuid {
    #[inline]
    fn from(v: u16) -> Self {
        Self::U16(v)
    }
}

impl From<u32> for Uuid {
    #[inline]
    fn from(v: u32) -> Self {
        Self::U32(v)
    }
}

impl From<u128> for Uuid {
    #[inline]
    fn from(v: u128) -> Self {
        Self::U128(v)
    }
}

impl From<Uuid> for u128 {
    #[inline]
    fn from(u: Uuid) -> Self {
        u.as_u128()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expansion() {
        let u = Uuid::U16(0x2A00);
        assert_eq!(u.as_u128(), 0x00002A00_0000_1000_8000_00805F9B34FB);
        let u = Uuid::U32(0xDEAD2A00);
        assert_eq!(u.as_u128(), 0xDEAD2A00_0000_1000_8000_00805F9B34FB);
        // Bytes 12..14 of the little-endian form carry the 16-bit value.
        let b = Uuid::U16(0x2A00).widen().to_bytes();
        assert_eq!(&b[12..14], &[0x00, 0x2A]);
    }

    #[test]
    fn equality() {
        assert_eq!(Uuid::U16(0x180F), Uuid::U32(0x180F));
        assert_eq!(Uuid::U16(0x180F), Uuid::U16(0x180F).widen());
        assert_ne!(Uuid::U16(0x180F), Uuid::U128(0x180F));
    }

    #[test]
    fn wire() {
        assert_eq!(Uuid::try_from([0xF1, 0xFF].as_ref()), Ok(Uuid::U16(0xFFF1)));
        assert_eq!(Uuid::U16(0xFFF1).to_bytes(), [0xF1, 0xFF]);
        assert!(Uuid::try_from([0u8; 3].as_ref()).is_err());
        let v = Uuid::U128(BASE | 1 << SHIFT);
        assert_eq!(Uuid::try_from(v.to_bytes().as_ref()), Ok(Uuid::U16(1)));
    }

    #[test]
    fn display() {
        assert_eq!(Uuid::U16(0x2902).to_string(), "0x2902");
        assert_eq!(
            Uuid::U16(1).widen().to_string(),
            "00000001-0000-1000-8000-00805F9B34FB"
        );
    }
}
