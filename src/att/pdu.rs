//! ATT PDU catalogue ([Vol 3] Part F, Section 3.4).
//!
//! One struct per opcode. Decoding is strict: the buffer length must match
//! the declared constraint and every field must parse within its bounded
//! range, otherwise [`Pdu::decode`] returns [`None`] and the server answers
//! with `InvalidPdu`.

use structbuf::{Pack, Packer, StructBuf, Unpacker};

use crate::gap::Uuid;

use super::*;

/// Declared PDU parameter length (excluding the opcode byte).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PduLen {
    Fixed(usize),
    Variable { min: usize },
}

impl PduLen {
    /// Returns whether a parameter length satisfies the constraint.
    #[inline]
    #[must_use]
    pub(crate) const fn check(self, n: usize) -> bool {
        match self {
            Self::Fixed(len) => n == len,
            Self::Variable { min } => n >= min,
        }
    }
}

/// Wire codec implemented by every ATT PDU.
pub trait Pdu: Sized {
    /// Opcode identifying the PDU on the wire.
    const OPCODE: Opcode;

    /// Parameter length constraint.
    const LEN: PduLen;

    /// Decodes PDU parameters. The unpacker must be fully consumed.
    fn decode_params(p: &mut Unpacker) -> Option<Self>;

    /// Encodes PDU parameters after the opcode byte.
    fn encode_params(&self, p: &mut Packer);

    /// Decodes a complete PDU, including the opcode byte.
    #[must_use]
    fn decode(b: &[u8]) -> Option<Self> {
        let (&op, params) = b.split_first()?;
        if op != Self::OPCODE as u8 || !Self::LEN.check(params.len()) {
            return None;
        }
        Unpacker::new(params).map(Self::decode_params).flatten()
    }

    /// Encodes a complete PDU, including the opcode byte.
    #[must_use]
    fn encode(&self) -> StructBuf {
        let mut b = StructBuf::new(MAX_PDU_LEN);
        self.encode_params(b.append().u8(Self::OPCODE));
        b
    }
}

/// Validates a raw request handle ([Vol 3] Part F, Section 3.4.4.3).
#[inline]
pub(crate) fn check_handle(op: Opcode, hdl: u16) -> RspResult<Handle> {
    Handle::new(hdl).ok_or_else(|| ErrorRsp::new(op as u8, None, ErrorCode::InvalidHandle))
}

/// Validates a raw request handle range ([Vol 3] Part F, Section 3.4.3.1).
#[inline]
pub(crate) fn check_range(op: Opcode, start: u16, end: u16) -> RspResult<HandleRange> {
    match (Handle::new(start), Handle::new(end)) {
        (Some(s), Some(e)) if s <= e => Ok(HandleRange::new(s, e)),
        _ => Err(ErrorRsp::new(op as u8, Handle::new(start), ErrorCode::InvalidHandle)),
    }
}

/// Decodes an attribute type of 2 or 16 bytes. 32-bit UUIDs are not valid on
/// the wire for type queries.
#[inline]
fn unpack_type(p: &mut Unpacker) -> Option<Uuid> {
    match p.len() {
        2 => Some(Uuid::U16(p.u16())),
        16 => Some(Uuid::U128(p.u128())),
        _ => None,
    }
}

/// Consumes and returns all remaining parameter bytes.
#[inline]
fn take_rest(p: &mut Unpacker) -> Vec<u8> {
    let v = p.as_ref().to_vec();
    p.skip(v.len());
    v
}

#[inline]
fn pack_type(uuid: Uuid, p: &mut Packer) {
    match uuid {
        Uuid::U16(v) => {
            p.u16(v);
        }
        _ => {
            p.u128(uuid.as_u128());
        }
    }
}

impl Pdu for ErrorRsp {
    const OPCODE: Opcode = Opcode::ErrorRsp;
    const LEN: PduLen = PduLen::Fixed(4);

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        let (req, hdl) = (p.u8(), Handle::new(p.u16()));
        let err = ErrorCode::try_from(p.u8()).ok()?;
        Some(Self::new(req, hdl, err))
    }

    fn encode_params(&self, p: &mut Packer) {
        p.u8(self.request())
            .u16(self.handle().map_or(0, u16::from))
            .u8(self.code());
    }
}

/// `ATT_EXCHANGE_MTU_REQ` ([Vol 3] Part F, Section 3.4.2.1).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ExchangeMtuReq {
    pub mtu: u16,
}

impl Pdu for ExchangeMtuReq {
    const OPCODE: Opcode = Opcode::ExchangeMtuReq;
    const LEN: PduLen = PduLen::Fixed(2);

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        Some(Self { mtu: p.u16() })
    }

    fn encode_params(&self, p: &mut Packer) {
        p.u16(self.mtu);
    }
}

/// `ATT_EXCHANGE_MTU_RSP` ([Vol 3] Part F, Section 3.4.2.2).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ExchangeMtuRsp {
    pub mtu: u16,
}

impl Pdu for ExchangeMtuRsp {
    const OPCODE: Opcode = Opcode::ExchangeMtuRsp;
    const LEN: PduLen = PduLen::Fixed(2);

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        Some(Self { mtu: p.u16() })
    }

    fn encode_params(&self, p: &mut Packer) {
        p.u16(self.mtu);
    }
}

/// `ATT_FIND_INFORMATION_REQ` ([Vol 3] Part F, Section 3.4.3.1).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FindInformationReq {
    pub start: u16,
    pub end: u16,
}

impl FindInformationReq {
    /// Returns the validated handle range.
    #[inline]
    pub fn range(&self) -> RspResult<HandleRange> {
        check_range(Self::OPCODE, self.start, self.end)
    }
}

impl Pdu for FindInformationReq {
    const OPCODE: Opcode = Opcode::FindInformationReq;
    const LEN: PduLen = PduLen::Fixed(4);

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        Some(Self {
            start: p.u16(),
            end: p.u16(),
        })
    }

    fn encode_params(&self, p: &mut Packer) {
        p.u16(self.start).u16(self.end);
    }
}

/// Uniform-format handle/UUID pairs carried by a Find Information response.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InformationData {
    /// Format 0x01: handle and 16-bit UUID pairs.
    U16(Vec<(u16, u16)>),
    /// Format 0x02: handle and 128-bit UUID pairs.
    U128(Vec<(u16, u128)>),
}

/// `ATT_FIND_INFORMATION_RSP` ([Vol 3] Part F, Section 3.4.3.2).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FindInformationRsp {
    pub data: InformationData,
}

impl FindInformationRsp {
    /// Packs the maximum MTU-bounded prefix of `it` in the format selected
    /// by the first attribute's UUID width. Returns [`None`] if nothing fits.
    pub fn pack<I>(mtu: Mtu, it: I) -> Option<Self>
    where
        I: IntoIterator<Item = (u16, Uuid)>,
    {
        let mtu = usize::from(mtu);
        let mut it = it.into_iter().peekable();
        let data = match it.peek()? .1 {
            Uuid::U16(_) => {
                let mut v = Vec::new();
                while let Some(&(hdl, Uuid::U16(u))) = it.peek() {
                    if 2 + (v.len() + 1) * 4 > mtu {
                        break;
                    }
                    v.push((hdl, u));
                    it.next();
                }
                InformationData::U16(v)
            }
            _ => {
                let mut v = Vec::new();
                while let Some(&(hdl, u)) = it.peek() {
                    if matches!(u, Uuid::U16(_)) || 2 + (v.len() + 1) * 18 > mtu {
                        break;
                    }
                    v.push((hdl, u.as_u128()));
                    it.next();
                }
                InformationData::U128(v)
            }
        };
        Some(Self { data })
    }
}

impl Pdu for FindInformationRsp {
    const OPCODE: Opcode = Opcode::FindInformationRsp;
    const LEN: PduLen = PduLen::Variable { min: 5 };

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        let data = match p.u8() {
            0x01 => {
                let mut v = Vec::new();
                while !p.is_empty() {
                    v.push((p.u16(), p.u16()));
                }
                InformationData::U16(v)
            }
            0x02 => {
                let mut v = Vec::new();
                while !p.is_empty() {
                    v.push((p.u16(), p.u128()));
                }
                InformationData::U128(v)
            }
            _ => return None,
        };
        Some(Self { data })
    }

    fn encode_params(&self, p: &mut Packer) {
        match self.data {
            InformationData::U16(ref v) => {
                p.u8(0x01_u8);
                for &(hdl, uuid) in v {
                    p.u16(hdl).u16(uuid);
                }
            }
            InformationData::U128(ref v) => {
                p.u8(0x02_u8);
                for &(hdl, uuid) in v {
                    p.u16(hdl).u128(uuid);
                }
            }
        }
    }
}

/// `ATT_FIND_BY_TYPE_VALUE_REQ` ([Vol 3] Part F, Section 3.4.3.3).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FindByTypeValueReq {
    pub start: u16,
    pub end: u16,
    pub typ: u16,
    pub value: Vec<u8>,
}

impl FindByTypeValueReq {
    /// Returns the validated handle range.
    #[inline]
    pub fn range(&self) -> RspResult<HandleRange> {
        check_range(Self::OPCODE, self.start, self.end)
    }
}

impl Pdu for FindByTypeValueReq {
    const OPCODE: Opcode = Opcode::FindByTypeValueReq;
    const LEN: PduLen = PduLen::Variable { min: 6 };

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        Some(Self {
            start: p.u16(),
            end: p.u16(),
            typ: p.u16(),
            value: take_rest(p),
        })
    }

    fn encode_params(&self, p: &mut Packer) {
        p.u16(self.start)
            .u16(self.end)
            .u16(self.typ)
            .put(&self.value);
    }
}

/// One handle group found by a Find By Type Value request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FoundGroup {
    pub found: u16,
    pub end: u16,
}

/// `ATT_FIND_BY_TYPE_VALUE_RSP` ([Vol 3] Part F, Section 3.4.3.4).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FindByTypeValueRsp {
    pub groups: Vec<FoundGroup>,
}

impl FindByTypeValueRsp {
    /// Packs the maximum MTU-bounded prefix of `it`. Returns [`None`] if
    /// nothing fits.
    pub fn pack<I>(mtu: Mtu, it: I) -> Option<Self>
    where
        I: IntoIterator<Item = FoundGroup>,
    {
        let mtu = usize::from(mtu);
        let mut groups = Vec::new();
        for g in it {
            if 1 + (groups.len() + 1) * 4 > mtu {
                break;
            }
            groups.push(g);
        }
        (!groups.is_empty()).then_some(Self { groups })
    }
}

impl Pdu for FindByTypeValueRsp {
    const OPCODE: Opcode = Opcode::FindByTypeValueRsp;
    const LEN: PduLen = PduLen::Variable { min: 4 };

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        let mut groups = Vec::new();
        while !p.is_empty() {
            groups.push(FoundGroup {
                found: p.u16(),
                end: p.u16(),
            });
        }
        Some(Self { groups })
    }

    fn encode_params(&self, p: &mut Packer) {
        for g in &self.groups {
            p.u16(g.found).u16(g.end);
        }
    }
}

/// `ATT_READ_BY_TYPE_REQ` ([Vol 3] Part F, Section 3.4.4.1).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReadByTypeReq {
    pub start: u16,
    pub end: u16,
    pub typ: Uuid,
}

impl ReadByTypeReq {
    /// Returns the validated handle range.
    #[inline]
    pub fn range(&self) -> RspResult<HandleRange> {
        check_range(Self::OPCODE, self.start, self.end)
    }
}

impl Pdu for ReadByTypeReq {
    const OPCODE: Opcode = Opcode::ReadByTypeReq;
    const LEN: PduLen = PduLen::Variable { min: 6 };

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        let (start, end) = (p.u16(), p.u16());
        Some(Self {
            start,
            end,
            typ: unpack_type(p)?,
        })
    }

    fn encode_params(&self, p: &mut Packer) {
        p.u16(self.start).u16(self.end);
        pack_type(self.typ, p);
    }
}

/// One handle and value record of a Read By Type response.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AttData {
    pub handle: u16,
    pub value: Vec<u8>,
}

/// `ATT_READ_BY_TYPE_RSP` ([Vol 3] Part F, Section 3.4.4.2).
///
/// Records share a single uniform length declared in the first parameter
/// byte.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReadByTypeRsp {
    pub data: Vec<AttData>,
}

impl ReadByTypeRsp {
    /// Value length cap imposed by the 8-bit record length field.
    pub(crate) const VAL_CAP: usize = 253;

    /// Packs the maximum MTU-bounded prefix of `it` into uniform-length
    /// records. A first value longer than the budget is truncated and sent
    /// alone. Returns [`None`] if `it` is empty.
    pub fn pack<'a, I>(mtu: Mtu, it: I) -> Option<Self>
    where
        I: IntoIterator<Item = (u16, &'a [u8])>,
    {
        let mtu = usize::from(mtu);
        let mut it = it.into_iter();
        let (handle, value) = it.next()?;
        let n = value.len().min(mtu - 4).min(Self::VAL_CAP);
        let mut data = vec![AttData {
            handle,
            value: value[..n].to_vec(),
        }];
        if n == value.len() {
            for (handle, value) in it {
                if value.len() != n || 2 + (data.len() + 1) * (2 + n) > mtu {
                    break;
                }
                data.push(AttData {
                    handle,
                    value: value.to_vec(),
                });
            }
        }
        Some(Self { data })
    }
}

impl Pdu for ReadByTypeRsp {
    const OPCODE: Opcode = Opcode::ReadByTypeRsp;
    const LEN: PduLen = PduLen::Variable { min: 3 };

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        let n = usize::from(p.u8());
        if n < 2 {
            return None;
        }
        let mut data = Vec::new();
        while !p.is_empty() {
            let handle = p.u16();
            let value = p.skip(n - 2)?.as_ref().to_vec();
            data.push(AttData { handle, value });
        }
        (!data.is_empty()).then_some(Self { data })
    }

    fn encode_params(&self, p: &mut Packer) {
        let n = 2 + self.data.first().map_or(0, |d| d.value.len());
        p.u8(u8::try_from(n).expect("record too long"));
        for d in &self.data {
            debug_assert_eq!(2 + d.value.len(), n);
            p.u16(d.handle).put(&d.value);
        }
    }
}

/// `ATT_READ_REQ` ([Vol 3] Part F, Section 3.4.4.3).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReadReq {
    pub handle: u16,
}

impl ReadReq {
    /// Returns the validated handle.
    #[inline]
    pub fn handle(&self) -> RspResult<Handle> {
        check_handle(Self::OPCODE, self.handle)
    }
}

impl Pdu for ReadReq {
    const OPCODE: Opcode = Opcode::ReadReq;
    const LEN: PduLen = PduLen::Fixed(2);

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        Some(Self { handle: p.u16() })
    }

    fn encode_params(&self, p: &mut Packer) {
        p.u16(self.handle);
    }
}

/// `ATT_READ_RSP` ([Vol 3] Part F, Section 3.4.4.4).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReadRsp {
    pub value: Vec<u8>,
}

impl Pdu for ReadRsp {
    const OPCODE: Opcode = Opcode::ReadRsp;
    const LEN: PduLen = PduLen::Variable { min: 0 };

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        Some(Self {
            value: take_rest(p),
        })
    }

    fn encode_params(&self, p: &mut Packer) {
        p.put(&self.value);
    }
}

/// `ATT_READ_BLOB_REQ` ([Vol 3] Part F, Section 3.4.4.5).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReadBlobReq {
    pub handle: u16,
    pub offset: u16,
}

impl ReadBlobReq {
    /// Returns the validated handle.
    #[inline]
    pub fn handle(&self) -> RspResult<Handle> {
        check_handle(Self::OPCODE, self.handle)
    }
}

impl Pdu for ReadBlobReq {
    const OPCODE: Opcode = Opcode::ReadBlobReq;
    const LEN: PduLen = PduLen::Fixed(4);

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        Some(Self {
            handle: p.u16(),
            offset: p.u16(),
        })
    }

    fn encode_params(&self, p: &mut Packer) {
        p.u16(self.handle).u16(self.offset);
    }
}

/// `ATT_READ_BLOB_RSP` ([Vol 3] Part F, Section 3.4.4.6).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReadBlobRsp {
    pub value: Vec<u8>,
}

impl Pdu for ReadBlobRsp {
    const OPCODE: Opcode = Opcode::ReadBlobRsp;
    const LEN: PduLen = PduLen::Variable { min: 0 };

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        Some(Self {
            value: take_rest(p),
        })
    }

    fn encode_params(&self, p: &mut Packer) {
        p.put(&self.value);
    }
}

/// `ATT_READ_MULTIPLE_REQ` ([Vol 3] Part F, Section 3.4.4.7).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReadMultipleReq {
    pub handles: Vec<u16>,
}

impl Pdu for ReadMultipleReq {
    const OPCODE: Opcode = Opcode::ReadMultipleReq;
    const LEN: PduLen = PduLen::Variable { min: 4 };

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        let mut handles = Vec::new();
        while !p.is_empty() {
            handles.push(p.u16());
        }
        (handles.len() >= 2).then_some(Self { handles })
    }

    fn encode_params(&self, p: &mut Packer) {
        for &h in &self.handles {
            p.u16(h);
        }
    }
}

/// `ATT_READ_MULTIPLE_RSP` ([Vol 3] Part F, Section 3.4.4.8).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReadMultipleRsp {
    pub values: Vec<u8>,
}

impl Pdu for ReadMultipleRsp {
    const OPCODE: Opcode = Opcode::ReadMultipleRsp;
    const LEN: PduLen = PduLen::Variable { min: 0 };

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        Some(Self {
            values: take_rest(p),
        })
    }

    fn encode_params(&self, p: &mut Packer) {
        p.put(&self.values);
    }
}

/// `ATT_READ_BY_GROUP_TYPE_REQ` ([Vol 3] Part F, Section 3.4.4.9).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReadByGroupTypeReq {
    pub start: u16,
    pub end: u16,
    pub typ: Uuid,
}

impl ReadByGroupTypeReq {
    /// Returns the validated handle range.
    #[inline]
    pub fn range(&self) -> RspResult<HandleRange> {
        check_range(Self::OPCODE, self.start, self.end)
    }
}

impl Pdu for ReadByGroupTypeReq {
    const OPCODE: Opcode = Opcode::ReadByGroupTypeReq;
    const LEN: PduLen = PduLen::Variable { min: 6 };

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        let (start, end) = (p.u16(), p.u16());
        Some(Self {
            start,
            end,
            typ: unpack_type(p)?,
        })
    }

    fn encode_params(&self, p: &mut Packer) {
        p.u16(self.start).u16(self.end);
        pack_type(self.typ, p);
    }
}

/// One attribute group record of a Read By Group Type response.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GroupData {
    pub start: u16,
    pub end: u16,
    pub value: Vec<u8>,
}

/// `ATT_READ_BY_GROUP_TYPE_RSP` ([Vol 3] Part F, Section 3.4.4.10).
///
/// Records share a single uniform length declared in the first parameter
/// byte.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReadByGroupTypeRsp {
    pub data: Vec<GroupData>,
}

impl ReadByGroupTypeRsp {
    /// Value length cap imposed by the 8-bit record length field.
    pub(crate) const VAL_CAP: usize = 251;

    /// Packs the maximum MTU-bounded prefix of `it` into uniform-length
    /// records. A first value longer than the budget is truncated and sent
    /// alone. Returns [`None`] if `it` is empty.
    pub fn pack<'a, I>(mtu: Mtu, it: I) -> Option<Self>
    where
        I: IntoIterator<Item = (u16, u16, &'a [u8])>,
    {
        let mtu = usize::from(mtu);
        let mut it = it.into_iter();
        let (start, end, value) = it.next()?;
        let n = value.len().min(mtu - 6).min(Self::VAL_CAP);
        let mut data = vec![GroupData {
            start,
            end,
            value: value[..n].to_vec(),
        }];
        if n == value.len() {
            for (start, end, value) in it {
                if value.len() != n || 2 + (data.len() + 1) * (4 + n) > mtu {
                    break;
                }
                data.push(GroupData {
                    start,
                    end,
                    value: value.to_vec(),
                });
            }
        }
        Some(Self { data })
    }
}

impl Pdu for ReadByGroupTypeRsp {
    const OPCODE: Opcode = Opcode::ReadByGroupTypeRsp;
    const LEN: PduLen = PduLen::Variable { min: 5 };

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        let n = usize::from(p.u8());
        if n < 4 {
            return None;
        }
        let mut data = Vec::new();
        while !p.is_empty() {
            let (start, end) = (p.u16(), p.u16());
            let value = p.skip(n - 4)?.as_ref().to_vec();
            data.push(GroupData { start, end, value });
        }
        (!data.is_empty()).then_some(Self { data })
    }

    fn encode_params(&self, p: &mut Packer) {
        let n = 4 + self.data.first().map_or(0, |d| d.value.len());
        p.u8(u8::try_from(n).expect("record too long"));
        for d in &self.data {
            debug_assert_eq!(4 + d.value.len(), n);
            p.u16(d.start).u16(d.end).put(&d.value);
        }
    }
}

/// `ATT_WRITE_REQ` ([Vol 3] Part F, Section 3.4.5.1).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WriteReq {
    pub handle: u16,
    pub value: Vec<u8>,
}

impl WriteReq {
    /// Returns the validated handle.
    #[inline]
    pub fn handle(&self) -> RspResult<Handle> {
        check_handle(Self::OPCODE, self.handle)
    }
}

impl Pdu for WriteReq {
    const OPCODE: Opcode = Opcode::WriteReq;
    const LEN: PduLen = PduLen::Variable { min: 2 };

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        Some(Self {
            handle: p.u16(),
            value: take_rest(p),
        })
    }

    fn encode_params(&self, p: &mut Packer) {
        p.u16(self.handle).put(&self.value);
    }
}

/// `ATT_WRITE_RSP` ([Vol 3] Part F, Section 3.4.5.2).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WriteRsp;

impl Pdu for WriteRsp {
    const OPCODE: Opcode = Opcode::WriteRsp;
    const LEN: PduLen = PduLen::Fixed(0);

    fn decode_params(_: &mut Unpacker) -> Option<Self> {
        Some(Self)
    }

    fn encode_params(&self, _: &mut Packer) {}
}

/// `ATT_WRITE_CMD` ([Vol 3] Part F, Section 3.4.5.3).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WriteCmd {
    pub handle: u16,
    pub value: Vec<u8>,
}

impl WriteCmd {
    /// Returns the validated handle.
    #[inline]
    pub fn handle(&self) -> RspResult<Handle> {
        check_handle(Self::OPCODE, self.handle)
    }
}

impl Pdu for WriteCmd {
    const OPCODE: Opcode = Opcode::WriteCmd;
    const LEN: PduLen = PduLen::Variable { min: 2 };

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        Some(Self {
            handle: p.u16(),
            value: take_rest(p),
        })
    }

    fn encode_params(&self, p: &mut Packer) {
        p.u16(self.handle).put(&self.value);
    }
}

/// `ATT_PREPARE_WRITE_REQ` ([Vol 3] Part F, Section 3.4.6.1).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PrepareWriteReq {
    pub handle: u16,
    pub offset: u16,
    pub value: Vec<u8>,
}

impl PrepareWriteReq {
    /// Returns the validated handle.
    #[inline]
    pub fn handle(&self) -> RspResult<Handle> {
        check_handle(Self::OPCODE, self.handle)
    }
}

impl Pdu for PrepareWriteReq {
    const OPCODE: Opcode = Opcode::PrepareWriteReq;
    const LEN: PduLen = PduLen::Variable { min: 4 };

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        Some(Self {
            handle: p.u16(),
            offset: p.u16(),
            value: take_rest(p),
        })
    }

    fn encode_params(&self, p: &mut Packer) {
        p.u16(self.handle).u16(self.offset).put(&self.value);
    }
}

/// `ATT_PREPARE_WRITE_RSP` ([Vol 3] Part F, Section 3.4.6.2). Echoes the
/// request parameters.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PrepareWriteRsp {
    pub handle: u16,
    pub offset: u16,
    pub value: Vec<u8>,
}

impl Pdu for PrepareWriteRsp {
    const OPCODE: Opcode = Opcode::PrepareWriteRsp;
    const LEN: PduLen = PduLen::Variable { min: 4 };

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        Some(Self {
            handle: p.u16(),
            offset: p.u16(),
            value: take_rest(p),
        })
    }

    fn encode_params(&self, p: &mut Packer) {
        p.u16(self.handle).u16(self.offset).put(&self.value);
    }
}

/// Execute Write flags ([Vol 3] Part F, Section 3.4.6.3).
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, num_enum::IntoPrimitive, num_enum::TryFromPrimitive,
)]
#[repr(u8)]
pub enum ExecWriteFlag {
    /// Cancel all prepared writes.
    Cancel = 0x00,
    /// Immediately write all pending prepared values.
    Write = 0x01,
}

/// `ATT_EXECUTE_WRITE_REQ` ([Vol 3] Part F, Section 3.4.6.3).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ExecuteWriteReq {
    pub flags: ExecWriteFlag,
}

impl Pdu for ExecuteWriteReq {
    const OPCODE: Opcode = Opcode::ExecuteWriteReq;
    const LEN: PduLen = PduLen::Fixed(1);

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        Some(Self {
            flags: ExecWriteFlag::try_from(p.u8()).ok()?,
        })
    }

    fn encode_params(&self, p: &mut Packer) {
        p.u8(self.flags);
    }
}

/// `ATT_EXECUTE_WRITE_RSP` ([Vol 3] Part F, Section 3.4.6.4).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ExecuteWriteRsp;

impl Pdu for ExecuteWriteRsp {
    const OPCODE: Opcode = Opcode::ExecuteWriteRsp;
    const LEN: PduLen = PduLen::Fixed(0);

    fn decode_params(_: &mut Unpacker) -> Option<Self> {
        Some(Self)
    }

    fn encode_params(&self, _: &mut Packer) {}
}

/// `ATT_HANDLE_VALUE_NTF` ([Vol 3] Part F, Section 3.4.7.1).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HandleValueNtf {
    pub handle: u16,
    pub value: Vec<u8>,
}

impl Pdu for HandleValueNtf {
    const OPCODE: Opcode = Opcode::HandleValueNtf;
    const LEN: PduLen = PduLen::Variable { min: 2 };

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        Some(Self {
            handle: p.u16(),
            value: take_rest(p),
        })
    }

    fn encode_params(&self, p: &mut Packer) {
        p.u16(self.handle).put(&self.value);
    }
}

/// `ATT_HANDLE_VALUE_IND` ([Vol 3] Part F, Section 3.4.7.2).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HandleValueInd {
    pub handle: u16,
    pub value: Vec<u8>,
}

impl Pdu for HandleValueInd {
    const OPCODE: Opcode = Opcode::HandleValueInd;
    const LEN: PduLen = PduLen::Variable { min: 2 };

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        Some(Self {
            handle: p.u16(),
            value: take_rest(p),
        })
    }

    fn encode_params(&self, p: &mut Packer) {
        p.u16(self.handle).put(&self.value);
    }
}

/// `ATT_HANDLE_VALUE_CFM` ([Vol 3] Part F, Section 3.4.7.3).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HandleValueCfm;

impl Pdu for HandleValueCfm {
    const OPCODE: Opcode = Opcode::HandleValueCfm;
    const LEN: PduLen = PduLen::Fixed(0);

    fn decode_params(_: &mut Unpacker) -> Option<Self> {
        Some(Self)
    }

    fn encode_params(&self, _: &mut Packer) {}
}
