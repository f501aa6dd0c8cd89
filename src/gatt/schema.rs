//! Service, characteristic, and descriptor definitions
//! ([Vol 3] Part G, Section 3).
//!
//! These are the compile-time view of the attribute database. A [`Service`]
//! flattens into attributes in declaration order: service declaration,
//! include declarations, then for each characteristic its declaration, value
//! attribute, and descriptors.

use structbuf::{Pack, StructBuf};

use crate::att::{Handle, HandleRange, Perms};
use crate::gap::Uuid;

use super::*;

/// Service definition ([Vol 3] Part G, Section 3.1).
#[derive(Clone, Debug)]
pub struct Service {
    pub uuid: Uuid,
    pub primary: bool,
    pub includes: Vec<Include>,
    pub characteristics: Vec<Characteristic>,
}

impl Service {
    /// Creates a primary service definition.
    #[inline]
    #[must_use]
    pub fn primary(uuid: impl Into<Uuid>) -> Self {
        Self {
            uuid: uuid.into(),
            primary: true,
            includes: Vec::new(),
            characteristics: Vec::new(),
        }
    }

    /// Creates a secondary service definition.
    #[inline]
    #[must_use]
    pub fn secondary(uuid: impl Into<Uuid>) -> Self {
        Self {
            primary: false,
            ..Self::primary(uuid)
        }
    }

    /// Adds an include declaration.
    #[inline]
    #[must_use]
    pub fn with_include(mut self, inc: Include) -> Self {
        self.includes.push(inc);
        self
    }

    /// Adds a characteristic.
    #[inline]
    #[must_use]
    pub fn with_characteristic(mut self, ch: Characteristic) -> Self {
        self.characteristics.push(ch);
        self
    }

    /// Returns the declaration attribute type.
    #[inline]
    pub(crate) fn declaration_type(&self) -> Uuid {
        if self.primary {
            Declaration::PrimaryService.uuid()
        } else {
            Declaration::SecondaryService.uuid()
        }
    }
}

/// Include definition ([Vol 3] Part G, Section 3.2). References a service
/// that was already added to the database.
#[derive(Clone, Copy, Debug)]
pub struct Include {
    pub handles: HandleRange,
    pub uuid: Uuid,
}

impl Include {
    /// Returns the include declaration value. The service UUID is only
    /// present for 16-bit UUIDs.
    pub(crate) fn declaration_value(&self) -> Vec<u8> {
        let mut b = StructBuf::new(6);
        let mut p = b.append();
        p.u16(self.handles.start()).u16(self.handles.end());
        if let Uuid::U16(v) = self.uuid {
            p.u16(v);
        }
        b.as_ref().to_vec()
    }
}

/// Characteristic definition ([Vol 3] Part G, Section 3.3).
#[derive(Clone, Debug)]
pub struct Characteristic {
    pub uuid: Uuid,
    pub props: CharProps,
    pub perms: Perms,
    pub value: Vec<u8>,
    pub descriptors: Vec<Descriptor>,
}

impl Characteristic {
    /// Creates a characteristic definition.
    #[inline]
    #[must_use]
    pub fn new(
        uuid: impl Into<Uuid>,
        props: CharProps,
        perms: Perms,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            props,
            perms,
            value: value.into(),
            descriptors: Vec::new(),
        }
    }

    /// Adds a descriptor.
    #[inline]
    #[must_use]
    pub fn with_descriptor(mut self, desc: Descriptor) -> Self {
        self.descriptors.push(desc);
        self
    }

    /// Returns the characteristic declaration value for the specified value
    /// attribute handle ([Vol 3] Part G, Section 3.3.1).
    pub(crate) fn declaration_value(&self, vhdl: Handle) -> Vec<u8> {
        let mut b = StructBuf::new(19);
        let mut p = b.append();
        p.u8(self.props.bits()).u16(vhdl);
        self.uuid.pack(&mut p);
        b.as_ref().to_vec()
    }
}

/// Descriptor definition ([Vol 3] Part G, Section 3.3.3).
#[derive(Clone, Debug)]
pub struct Descriptor {
    pub uuid: Uuid,
    pub perms: Perms,
    pub value: Vec<u8>,
}

impl Descriptor {
    /// Creates a descriptor definition.
    #[inline]
    #[must_use]
    pub fn new(uuid: impl Into<Uuid>, perms: Perms, value: impl Into<Vec<u8>>) -> Self {
        Self {
            uuid: uuid.into(),
            perms,
            value: value.into(),
        }
    }

    /// Creates a Client Characteristic Configuration descriptor with the
    /// specified initial subscription ([Vol 3] Part G, Section 3.3.3.3).
    #[inline]
    #[must_use]
    pub fn cccd(init: Cccd) -> Self {
        Self::new(
            DescriptorType::ClientCharacteristicConfiguration.uuid(),
            Perms::READ_WRITE,
            init.bits().to_le_bytes(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn characteristic_declaration() {
        let ch = Characteristic::new(
            0xFFF1_u16,
            CharProps::READ | CharProps::WRITE,
            Perms::READ_WRITE,
            [0xAA],
        );
        assert_eq!(
            ch.declaration_value(Handle::new(3).unwrap()),
            [0x0A, 0x03, 0x00, 0xF1, 0xFF]
        );

        let ch = Characteristic::new(0xABCD_u128, CharProps::READ, Perms::READ, []);
        let v = ch.declaration_value(Handle::new(3).unwrap());
        assert_eq!(v.len(), 19);
        assert_eq!(v[..3], [0x02, 0x03, 0x00]);
        assert_eq!(v[3..5], [0xCD, 0xAB]);
    }

    #[test]
    fn include_declaration() {
        let inc = Include {
            handles: HandleRange::new(Handle::new(1).unwrap(), Handle::new(5).unwrap()),
            uuid: Uuid::U16(0x180F),
        };
        assert_eq!(
            inc.declaration_value(),
            [0x01, 0x00, 0x05, 0x00, 0x0F, 0x18]
        );

        let inc = Include {
            uuid: Uuid::U128(0xABCD),
            ..inc
        };
        assert_eq!(inc.declaration_value(), [0x01, 0x00, 0x05, 0x00]);
    }

    #[test]
    fn cccd() {
        let d = Descriptor::cccd(Cccd::empty());
        assert_eq!(d.uuid, Uuid::U16(0x2902));
        assert_eq!(d.value, [0x00, 0x00]);
    }
}
