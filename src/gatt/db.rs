//! In-memory attribute database ([Vol 3] Part F, Section 3.2).

use std::ops::RangeBounds;

use structbuf::Unpack;
use tracing::info;

use crate::att::{Handle, HandleRange, Perms};
use crate::gap::Uuid;

use super::*;

/// Ordered attribute store organized into service groups.
///
/// Handles are unique and strictly increasing in insertion order. Every
/// group starts with a service declaration attribute and groups never
/// overlap. Attributes do not reference their enclosing group; enclosure
/// queries scan the group list.
#[derive(Clone, Debug, Default)]
pub struct Database {
    groups: Vec<Group>,
}

impl Database {
    /// Creates an empty database.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the database contains no attributes.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Returns an iterator over all attributes in handle order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.groups.iter().flat_map(|g| g.attrs.iter())
    }

    /// Adds a service, assigning the next available handle range
    /// ([Vol 3] Part G, Section 2.5.1).
    ///
    /// # Panics
    ///
    /// Panics if the service does not fit in the remaining handle space.
    pub fn add(&mut self, svc: &Service) -> HandleRange {
        fn bump(next: &mut Handle) -> Handle {
            let h = *next;
            *next = h.next().expect("attribute handle space exhausted");
            h
        }
        let mut next = (self.last_handle()).map_or(Handle::MIN, |h| {
            h.next().expect("attribute handle space exhausted")
        });
        let mut attrs = Vec::with_capacity(
            1 + svc.includes.len()
                + (svc.characteristics.iter()).map(|c| 2 + c.descriptors.len()).sum::<usize>(),
        );
        attrs.push(Attribute {
            handle: bump(&mut next),
            typ: svc.declaration_type(),
            value: svc.uuid.to_bytes(),
            perms: Perms::READ,
        });
        for inc in &svc.includes {
            attrs.push(Attribute {
                handle: bump(&mut next),
                typ: Declaration::Include.uuid(),
                value: inc.declaration_value(),
                perms: Perms::READ,
            });
        }
        for ch in &svc.characteristics {
            let decl = bump(&mut next);
            let vhdl = next;
            attrs.push(Attribute {
                handle: decl,
                typ: Declaration::Characteristic.uuid(),
                value: ch.declaration_value(vhdl),
                perms: Perms::READ,
            });
            attrs.push(Attribute {
                handle: bump(&mut next),
                typ: ch.uuid,
                value: ch.value.clone(),
                perms: ch.perms,
            });
            for desc in &ch.descriptors {
                attrs.push(Attribute {
                    handle: bump(&mut next),
                    typ: desc.uuid,
                    value: desc.value.clone(),
                    perms: desc.perms,
                });
            }
        }
        let g = Group { attrs };
        let range = g.range();
        self.groups.push(g);
        range
    }

    /// Removes the service declared at `hdl`. Returns whether a service was
    /// removed.
    pub fn remove(&mut self, hdl: Handle) -> bool {
        let Some(i) = (self.groups.iter()).position(|g| g.decl().handle == hdl) else {
            return false;
        };
        self.groups.remove(i);
        true
    }

    /// Overwrites the value of the attribute at `hdl`. The value length is
    /// not checked. Returns whether the attribute exists.
    pub fn write(&mut self, hdl: Handle, value: &[u8]) -> bool {
        let Some(at) = self.get_mut(hdl) else {
            return false;
        };
        at.value.clear();
        at.value.extend_from_slice(value);
        true
    }

    /// Returns whether the database contains `hdl`.
    #[inline]
    #[must_use]
    pub fn contains(&self, hdl: Handle) -> bool {
        self.get(hdl).is_some()
    }

    /// Returns the attribute at `hdl`.
    #[must_use]
    pub fn get(&self, hdl: Handle) -> Option<&Attribute> {
        let g = self.group_of(hdl)?;
        g.attrs.iter().find(|at| at.handle == hdl)
    }

    /// Returns all service groups of the specified declaration type wholly
    /// contained within `hdls` ([Vol 3] Part G, Section 4.4.1).
    pub fn read_by_group_type(
        &self,
        hdls: HandleRange,
        typ: Uuid,
    ) -> Vec<(HandleRange, &[u8])> {
        (self.groups.iter())
            .filter(|g| g.decl().typ == typ && g.range().is_within(hdls))
            .map(|g| (g.range(), g.decl().value.as_slice()))
            .collect()
    }

    /// Returns all attributes of the specified type with handles in `hdls`
    /// ([Vol 3] Part G, Section 4.6.1).
    pub fn read_by_type(&self, hdls: HandleRange, typ: Uuid) -> Vec<&Attribute> {
        (self.iter())
            .filter(|at| hdls.contains(&at.handle) && at.typ == typ)
            .collect()
    }

    /// Returns the handle and type of all attributes in `hdls`
    /// ([Vol 3] Part G, Section 4.7.1).
    pub fn find_information(&self, hdls: HandleRange) -> Vec<(Handle, Uuid)> {
        (self.iter())
            .filter(|at| hdls.contains(&at.handle))
            .map(|at| (at.handle, at.typ))
            .collect()
    }

    /// Returns the attribute and group end handles of all attributes in
    /// `hdls` with the specified 16-bit type and exact value
    /// ([Vol 3] Part G, Section 4.4.2).
    pub fn find_by_type_value(
        &self,
        hdls: HandleRange,
        typ: u16,
        value: &[u8],
    ) -> Vec<(Handle, Handle)> {
        let typ = Uuid::U16(typ);
        let mut found = Vec::new();
        for g in &self.groups {
            for at in &g.attrs {
                if hdls.contains(&at.handle) && at.typ == typ && at.value == value {
                    found.push((at.handle, g.range().end()));
                }
            }
        }
        found
    }

    /// Returns the enclosing group range and the attribute at `hdl`.
    #[must_use]
    pub fn attribute_group(&self, hdl: Handle) -> Option<(HandleRange, &Attribute)> {
        let g = self.group_of(hdl)?;
        let at = g.attrs.iter().find(|at| at.handle == hdl)?;
        Some((g.range(), at))
    }

    /// Returns characteristic information for any handle within a
    /// characteristic definition.
    pub(crate) fn characteristic_for(&self, hdl: Handle) -> Option<CharInfo> {
        let g = self.group_of(hdl)?;
        let i = g.attrs.iter().position(|at| at.handle == hdl)?;
        let char_uuid = Declaration::Characteristic.uuid();
        let decl = (g.attrs.iter().take(i + 1)).rposition(|at| at.typ == char_uuid)?;
        let end = (g.attrs.iter().skip(decl + 1))
            .position(|at| at.typ == char_uuid)
            .map_or(g.attrs.len(), |j| decl + 1 + j);
        if i >= end {
            return None;
        }
        let dval = g.attrs[decl].value.as_slice();
        let props = CharProps::from_bits_truncate(dval.unpack().u8());
        let vhdl = Handle::new(dval.unpack().split_at(1).1.u16())?;
        let uuid = g.attrs.get(decl + 1).map(|at| at.typ)?;
        Some(CharInfo {
            vhdl,
            uuid,
            props,
            descriptors: &g.attrs[(decl + 2).min(end)..end],
        })
    }

    /// Logs database contents.
    pub fn dump(&self) {
        info!("GATT database:");
        for g in &self.groups {
            let decl = g.decl();
            let sec = if decl.typ == Declaration::PrimaryService.uuid() {
                ""
            } else {
                "(Secondary) "
            };
            let uuid = Uuid::try_from(decl.value.as_slice()).unwrap_or(decl.typ);
            info!("[{:#06X}] {sec}Service <{uuid}>", u16::from(decl.handle));
            for at in &g.attrs[1..] {
                info!(
                    "[{:#06X}] |__ <{}> {:02X?}",
                    u16::from(at.handle),
                    at.typ,
                    at.value
                );
            }
        }
    }

    /// Returns the group containing `hdl`.
    fn group_of(&self, hdl: Handle) -> Option<&Group> {
        self.groups.iter().find(|g| g.range().contains(&hdl))
    }

    /// Returns the last assigned handle.
    fn last_handle(&self) -> Option<Handle> {
        self.groups.last().map(|g| g.range().end())
    }

    fn get_mut(&mut self, hdl: Handle) -> Option<&mut Attribute> {
        let g = (self.groups.iter_mut()).find(|g| g.range().contains(&hdl))?;
        g.attrs.iter_mut().find(|at| at.handle == hdl)
    }
}

/// A service's attributes. The first attribute is always the service
/// declaration and the group's end handle is the handle of its last
/// attribute.
#[derive(Clone, Debug)]
struct Group {
    attrs: Vec<Attribute>,
}

impl Group {
    /// Returns the service declaration attribute.
    #[inline]
    fn decl(&self) -> &Attribute {
        &self.attrs[0]
    }

    /// Returns the group handle range.
    #[inline]
    fn range(&self) -> HandleRange {
        let last = self.attrs.last().expect("empty attribute group");
        HandleRange::new(self.attrs[0].handle, last.handle)
    }
}

/// A single database attribute ([Vol 3] Part F, Section 3.2.1).
#[derive(Clone, Debug)]
pub struct Attribute {
    handle: Handle,
    typ: Uuid,
    value: Vec<u8>,
    perms: Perms,
}

impl Attribute {
    /// Returns the attribute handle.
    #[inline(always)]
    #[must_use]
    pub const fn handle(&self) -> Handle {
        self.handle
    }

    /// Returns the attribute type.
    #[inline(always)]
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.typ
    }

    /// Returns the attribute value.
    #[inline(always)]
    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Returns the attribute permissions.
    #[inline(always)]
    #[must_use]
    pub const fn perms(&self) -> Perms {
        self.perms
    }
}

/// Information about a single characteristic definition.
#[derive(Clone, Copy, Debug)]
pub(crate) struct CharInfo<'a> {
    pub vhdl: Handle,
    pub uuid: Uuid,
    pub props: CharProps,
    pub descriptors: &'a [Attribute],
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hdl(h: u16) -> Handle {
        Handle::new(h).unwrap()
    }

    fn db() -> Database {
        let mut db = Database::new();
        db.add(
            &Service::primary(0x180F_u16).with_characteristic(
                Characteristic::new(
                    0x2A19_u16,
                    CharProps::READ | CharProps::NOTIFY,
                    Perms::READ,
                    [100],
                )
                .with_descriptor(Descriptor::cccd(Cccd::empty())),
            ),
        );
        db.add(
            &Service::primary(0xFFF0_u16)
                .with_characteristic(Characteristic::new(
                    0xFFF1_u16,
                    CharProps::READ | CharProps::WRITE,
                    Perms::READ_WRITE,
                    [0xAA],
                ))
                .with_characteristic(Characteristic::new(
                    0xFFF2_u16,
                    CharProps::READ,
                    Perms::READ,
                    [0xBB],
                )),
        );
        db
    }

    #[test]
    fn handle_monotonicity() {
        let db = db();
        let handles: Vec<u16> = db.iter().map(|at| at.handle().into()).collect();
        assert_eq!(handles, (1..=9).collect::<Vec<u16>>());
        let mut ranges = db.groups.iter().map(Group::range);
        let (a, b) = (ranges.next().unwrap(), ranges.next().unwrap());
        assert_eq!((u16::from(a.start()), u16::from(a.end())), (1, 4));
        assert_eq!((u16::from(b.start()), u16::from(b.end())), (5, 9));
    }

    #[test]
    fn handle_allocation_skips_removed() {
        let mut db = db();
        assert!(db.remove(hdl(1)));
        assert!(!db.remove(hdl(1)));
        let range = db.add(&Service::primary(0x1801_u16));
        assert_eq!(u16::from(range.start()), 10);
    }

    #[test]
    fn group_queries() {
        let db = db();
        let all = HandleRange::ALL;
        let groups = db.read_by_group_type(all, Declaration::PrimaryService.uuid());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].1, [0x0F, 0x18]);
        for (range, _) in &groups {
            assert!(range.is_within(all));
        }

        // Partial range excludes groups that are not wholly contained.
        let r = HandleRange::new(hdl(1), hdl(5));
        assert_eq!(
            db.read_by_group_type(r, Declaration::PrimaryService.uuid())
                .len(),
            1
        );
        assert!(db
            .read_by_group_type(all, Declaration::SecondaryService.uuid())
            .is_empty());
    }

    #[test]
    fn type_queries() {
        let db = db();
        let decls = db.read_by_type(HandleRange::ALL, Declaration::Characteristic.uuid());
        assert_eq!(decls.len(), 3);
        assert_eq!(
            decls.iter().map(|at| u16::from(at.handle())).collect::<Vec<_>>(),
            [2, 6, 8]
        );

        let info = db.find_information(HandleRange::new(hdl(3), hdl(4)));
        assert_eq!(info, [(hdl(3), Uuid::U16(0x2A19)), (hdl(4), Uuid::U16(0x2902))]);
    }

    #[test]
    fn find_by_type_value() {
        let db = db();
        let found = db.find_by_type_value(HandleRange::ALL, 0x2800, &[0xF0, 0xFF]);
        assert_eq!(found, [(hdl(5), hdl(9))]);
        assert!(db
            .find_by_type_value(HandleRange::ALL, 0x2800, &[0xAA, 0xBB])
            .is_empty());
    }

    #[test]
    fn characteristic_lookup() {
        let db = db();
        let info = db.characteristic_for(hdl(3)).unwrap();
        assert_eq!(info.vhdl, hdl(3));
        assert_eq!(info.uuid, Uuid::U16(0x2A19));
        assert!(info.props.contains(CharProps::NOTIFY));
        assert_eq!(info.descriptors.len(), 1);
        assert_eq!(info.descriptors[0].uuid(), Uuid::U16(0x2902));

        // Service declarations are not part of a characteristic.
        assert!(db.characteristic_for(hdl(1)).is_none());
        // The last characteristic has an empty descriptor range.
        let info = db.characteristic_for(hdl(9)).unwrap();
        assert!(info.descriptors.is_empty());
    }

    #[test]
    fn write_value() {
        let mut db = db();
        assert!(db.write(hdl(6), &[0xBB, 0xCC]));
        assert_eq!(db.get(hdl(6)).unwrap().value(), [0xBB, 0xCC]);
        assert!(!db.write(hdl(100), &[]));
    }
}
