//! Advertising and scan response data ([Vol 3] Part C, Section 11 and
//! [Core Specification Supplement] Part A, Section 1).
//!
//! An advertising payload is a concatenation of length-type-value records.
//! Each record type is a typed [`AdStructure`] variant with its own payload
//! codec; [`AdvData`] packs records into the 31-byte legacy payload and
//! unpacks received payloads back into records.

use structbuf::{Pack, Packer, StructBuf, Unpacker};

use crate::le::TxPower;

/// AD type constants ([Assigned Numbers] Section 2.3).
#[derive(Clone, Copy, Debug, Eq, PartialEq, num_enum::IntoPrimitive)]
#[non_exhaustive]
#[repr(u8)]
pub enum DataType {
    Flags = 0x01,
    IncompleteServiceClass16 = 0x02,
    CompleteServiceClass16 = 0x03,
    IncompleteServiceClass32 = 0x04,
    CompleteServiceClass32 = 0x05,
    IncompleteServiceClass128 = 0x06,
    CompleteServiceClass128 = 0x07,
    ShortLocalName = 0x08,
    CompleteLocalName = 0x09,
    TxPower = 0x0A,
    PeripheralConnectionIntervalRange = 0x12,
    ServiceData16 = 0x16,
    Appearance = 0x19,
    ManufacturerData = 0xFF,
}

bitflags::bitflags! {
    /// Advertising data flags (\[CSS\] Part A, Section 1.3).
    #[derive(Default)]
    #[repr(transparent)]
    pub struct AdvFlag: u8 {
        /// LE Limited Discoverable Mode.
        const LE_LIMITED = 1 << 0;
        /// LE General Discoverable Mode.
        const LE_GENERAL = 1 << 1;
        /// BR/EDR Not Supported.
        const NO_BREDR = 1 << 2;
        /// Simultaneous LE and BR/EDR to Same Device Capable (Controller).
        const LE_BREDR_CONTROLLER = 1 << 3;
        /// Simultaneous LE and BR/EDR to Same Device Capable (Host).
        const LE_BREDR_HOST = 1 << 4;
    }
}

/// External device appearance ([Assigned Numbers] Section 2.6).
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct Appearance(pub u16);

impl Appearance {
    pub const UNKNOWN: Self = Self(0x0000);
    pub const GENERIC_PHONE: Self = Self(0x0040);
    pub const GENERIC_COMPUTER: Self = Self(0x0080);
    pub const GENERIC_WATCH: Self = Self(0x00C0);
    pub const GENERIC_SENSOR: Self = Self(0x0540);
    pub const GENERIC_THERMOMETER: Self = Self(0x0300);
    pub const GENERIC_HEART_RATE_SENSOR: Self = Self(0x0340);
    pub const GENERIC_HID: Self = Self(0x03C0);
    pub const KEYBOARD: Self = Self(0x03C1);
    pub const MOUSE: Self = Self(0x03C2);
}

impl From<Appearance> for u16 {
    #[inline]
    fn from(v: Appearance) -> Self {
        v.0
    }
}

/// One typed advertising data record.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum AdStructure {
    /// Device flags and baseband capabilities (\[CSS\] Part A, Section 1.3).
    Flags(AdvFlag),
    /// 16-bit service class UUID list (\[CSS\] Part A, Section 1.1).
    ServiceClass16 { complete: bool, uuids: Vec<u16> },
    /// 32-bit service class UUID list (\[CSS\] Part A, Section 1.1).
    ServiceClass32 { complete: bool, uuids: Vec<u32> },
    /// 128-bit service class UUID list (\[CSS\] Part A, Section 1.1).
    ServiceClass128 { complete: bool, uuids: Vec<u128> },
    /// Shortened or complete local device name (\[CSS\] Part A, Section 1.2).
    LocalName { complete: bool, name: String },
    /// TX power level in dBm (\[CSS\] Part A, Section 1.5).
    TxPower(TxPower),
    /// Peripheral connection interval range in 1.25 ms units, `0xFFFF`
    /// meaning no preference (\[CSS\] Part A, Section 1.9).
    PeripheralConnectionIntervalRange { min: u16, max: u16 },
    /// Service data with a 16-bit service UUID (\[CSS\] Part A,
    /// Section 1.11).
    ServiceData16 { uuid: u16, data: Vec<u8> },
    /// External device appearance (\[CSS\] Part A, Section 1.12).
    Appearance(Appearance),
    /// Manufacturer-specific data (\[CSS\] Part A, Section 1.4).
    ManufacturerData { company: u16, data: Vec<u8> },
    /// Unrecognized record preserved raw.
    Unknown { typ: u8, data: Vec<u8> },
}

impl AdStructure {
    /// Returns the AD type byte.
    #[must_use]
    pub fn data_type(&self) -> u8 {
        match *self {
            Self::Flags(_) => DataType::Flags.into(),
            Self::ServiceClass16 { complete, .. } => {
                u8::from(DataType::IncompleteServiceClass16) + u8::from(complete)
            }
            Self::ServiceClass32 { complete, .. } => {
                u8::from(DataType::IncompleteServiceClass32) + u8::from(complete)
            }
            Self::ServiceClass128 { complete, .. } => {
                u8::from(DataType::IncompleteServiceClass128) + u8::from(complete)
            }
            Self::LocalName { complete, .. } => {
                u8::from(DataType::ShortLocalName) + u8::from(complete)
            }
            Self::TxPower(_) => DataType::TxPower.into(),
            Self::PeripheralConnectionIntervalRange { .. } => {
                DataType::PeripheralConnectionIntervalRange.into()
            }
            Self::ServiceData16 { .. } => DataType::ServiceData16.into(),
            Self::Appearance(_) => DataType::Appearance.into(),
            Self::ManufacturerData { .. } => DataType::ManufacturerData.into(),
            Self::Unknown { typ, .. } => typ,
        }
    }

    /// Writes the record payload (everything after the type byte).
    pub fn pack_data(&self, p: &mut Packer) {
        match *self {
            Self::Flags(v) => {
                p.u8(v.bits());
            }
            Self::ServiceClass16 { ref uuids, .. } => {
                for &u in uuids {
                    p.u16(u);
                }
            }
            Self::ServiceClass32 { ref uuids, .. } => {
                for &u in uuids {
                    p.u32(u);
                }
            }
            Self::ServiceClass128 { ref uuids, .. } => {
                for &u in uuids {
                    p.u128(u);
                }
            }
            Self::LocalName { ref name, .. } => {
                p.put(name.as_bytes());
            }
            Self::TxPower(v) => {
                p.i8(v);
            }
            Self::PeripheralConnectionIntervalRange { min, max } => {
                p.u16(min).u16(max);
            }
            Self::ServiceData16 { uuid, ref data } => {
                p.u16(uuid).put(data);
            }
            Self::Appearance(v) => {
                p.u16(v);
            }
            Self::ManufacturerData { company, ref data } => {
                p.u16(company).put(data);
            }
            Self::Unknown { ref data, .. } => {
                p.put(data);
            }
        }
    }

    /// Decodes one record payload. Unrecognized types and malformed payloads
    /// of known types are preserved as [`AdStructure::Unknown`].
    #[must_use]
    pub fn decode(typ: u8, data: &[u8]) -> Self {
        let unknown = || Self::Unknown {
            typ,
            data: data.to_vec(),
        };
        let p = Unpacker::new(data);
        match typ {
            0x01 => (p.map(|p| AdvFlag::from_bits_truncate(p.u8()))).map_or_else(unknown, Self::Flags),
            0x02 | 0x03 => Self::uuid_list(data, 2).map_or_else(unknown, |uuids| {
                Self::ServiceClass16 {
                    complete: typ == 0x03,
                    uuids,
                }
            }),
            0x04 | 0x05 => Self::uuid_list(data, 4).map_or_else(unknown, |uuids| {
                Self::ServiceClass32 {
                    complete: typ == 0x05,
                    uuids,
                }
            }),
            0x06 | 0x07 => Self::uuid_list(data, 16).map_or_else(unknown, |uuids| {
                Self::ServiceClass128 {
                    complete: typ == 0x07,
                    uuids,
                }
            }),
            0x08 | 0x09 => (String::from_utf8(data.to_vec()).ok()).map_or_else(unknown, |name| {
                Self::LocalName {
                    complete: typ == 0x09,
                    name,
                }
            }),
            0x0A => (p.map(|p| TxPower::new(p.i8())))
                .flatten()
                .map_or_else(unknown, Self::TxPower),
            0x12 => (p.map(|p| (p.u16(), p.u16()))).map_or_else(unknown, |(min, max)| {
                Self::PeripheralConnectionIntervalRange { min, max }
            }),
            0x16 => (data.len() >= 2)
                .then(|| {
                    let mut p = Unpacker::new(data);
                    Self::ServiceData16 {
                        uuid: p.u16(),
                        data: take_rest(&mut p),
                    }
                })
                .unwrap_or_else(unknown),
            0x19 => (p.map(|p| Appearance(p.u16()))).map_or_else(unknown, Self::Appearance),
            0xFF => (data.len() >= 2)
                .then(|| {
                    let mut p = Unpacker::new(data);
                    Self::ManufacturerData {
                        company: p.u16(),
                        data: take_rest(&mut p),
                    }
                })
                .unwrap_or_else(unknown),
            _ => unknown(),
        }
    }

    /// Decodes a uniform-width UUID list.
    fn uuid_list<T: UuidWidth>(data: &[u8], width: usize) -> Option<Vec<T>> {
        if data.len() % width != 0 {
            return None;
        }
        let mut p = Unpacker::new(data);
        let mut v = Vec::with_capacity(data.len() / width);
        while !p.is_empty() {
            v.push(T::unpack(&mut p));
        }
        Some(v)
    }
}

/// Consumes and returns all remaining payload bytes.
#[inline]
fn take_rest(p: &mut Unpacker) -> Vec<u8> {
    let v = p.as_ref().to_vec();
    p.skip(v.len());
    v
}

/// Helper for decoding UUID lists of each width.
trait UuidWidth: Sized {
    fn unpack(p: &mut Unpacker) -> Self;
}

impl UuidWidth for u16 {
    #[inline]
    fn unpack(p: &mut Unpacker) -> Self {
        p.u16()
    }
}

impl UuidWidth for u32 {
    #[inline]
    fn unpack(p: &mut Unpacker) -> Self {
        p.u32()
    }
}

impl UuidWidth for u128 {
    #[inline]
    fn unpack(p: &mut Unpacker) -> Self {
        p.u128()
    }
}

/// Error returned when a record does not fit in the advertising payload.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[error("advertising data overflow")]
pub struct AdvDataOverflow;

/// Concatenated advertising payload (legacy 31-byte limit).
#[derive(Clone, Debug)]
pub struct AdvData(StructBuf);

impl Default for AdvData {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl AdvData {
    /// Maximum legacy advertising payload length
    /// ([Vol 6] Part B, Section 2.3.1).
    pub const MAX_LEN: usize = 31;

    /// Creates an empty payload.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(StructBuf::new(Self::MAX_LEN))
    }

    /// Appends one record, or fails if the payload would exceed
    /// [`Self::MAX_LEN`].
    pub fn append(&mut self, ad: &AdStructure) -> Result<(), AdvDataOverflow> {
        let mut rec = StructBuf::new(256);
        {
            let mut p = rec.append();
            p.u8(0_u8).u8(ad.data_type());
            ad.pack_data(&mut p);
        }
        let n = rec.len() - 1;
        rec[0] = u8::try_from(n).map_err(|_| AdvDataOverflow)?;
        if self.0.len() + rec.len() > Self::MAX_LEN {
            return Err(AdvDataOverflow);
        }
        self.0.append().put(rec.as_ref());
        Ok(())
    }

    /// Returns an iterator over decoded records. Iteration stops at the
    /// first malformed record header.
    pub fn records(&self) -> impl Iterator<Item = AdStructure> + '_ {
        RecordIter(Unpacker::new(self.0.as_ref()))
    }

    /// Wraps a received payload.
    pub fn from_bytes(b: &[u8]) -> Result<Self, AdvDataOverflow> {
        if b.len() > Self::MAX_LEN {
            return Err(AdvDataOverflow);
        }
        let mut sb = StructBuf::new(Self::MAX_LEN);
        sb.append().put(b);
        Ok(Self(sb))
    }

    /// Returns the payload length.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the payload is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for AdvData {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

struct RecordIter<'a>(Unpacker<'a>);

impl Iterator for RecordIter<'_> {
    type Item = AdStructure;

    fn next(&mut self) -> Option<Self::Item> {
        if self.0.is_empty() {
            return None;
        }
        let n = usize::from(self.0.u8());
        let rec = self.0.skip(n)?;
        let (&typ, data) = rec.as_ref().split_first()?;
        Some(AdStructure::decode(typ, data))
    }
}
