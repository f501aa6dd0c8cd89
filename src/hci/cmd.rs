//! LE Controller command and return parameters
//! ([Vol 4] Part E, Section 7.8).

use crate::gap::AdvData;
use crate::le::{AdvInterval, LeFeature, MaxTxOctets, MaxTxTime, RawAddr, TxPower};

use super::*;

/// `HCI_LE_Set_Event_Mask` parameters ([Vol 4] Part E, Section 7.8.1).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LeSetEventMask {
    pub mask: u64,
}

impl CommandParams for LeSetEventMask {
    const OPCODE: Opcode = Opcode::LeSetEventMask;
    const LEN: usize = 8;

    fn encode_params(&self, p: &mut Packer) {
        p.u64(self.mask);
    }
}

/// `HCI_LE_Set_Random_Address` parameters
/// ([Vol 4] Part E, Section 7.8.4).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LeSetRandomAddress {
    pub addr: RawAddr,
}

impl CommandParams for LeSetRandomAddress {
    const OPCODE: Opcode = Opcode::LeSetRandomAddress;
    const LEN: usize = 6;

    fn encode_params(&self, p: &mut Packer) {
        p.put(self.addr);
    }
}

/// Advertising type ([Vol 4] Part E, Section 7.8.5).
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    PartialEq,
    num_enum::IntoPrimitive,
    num_enum::TryFromPrimitive,
)]
#[non_exhaustive]
#[repr(u8)]
pub enum AdvType {
    /// Connectable and scannable undirected advertising (`ADV_IND`).
    #[default]
    ConnectableUndirected = 0x00,
    /// Connectable high duty cycle directed advertising.
    ConnectableHighDutyDirected = 0x01,
    /// Scannable undirected advertising (`ADV_SCAN_IND`).
    ScannableUndirected = 0x02,
    /// Non-connectable undirected advertising (`ADV_NONCONN_IND`).
    NonConnectableUndirected = 0x03,
    /// Connectable low duty cycle directed advertising.
    ConnectableLowDutyDirected = 0x04,
}

/// Device address type ([Vol 4] Part E, Section 7.8.5).
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    PartialEq,
    num_enum::IntoPrimitive,
    num_enum::TryFromPrimitive,
)]
#[non_exhaustive]
#[repr(u8)]
pub enum AddrType {
    #[default]
    Public = 0x00,
    Random = 0x01,
}

bitflags::bitflags! {
    /// Advertising channel map ([Vol 4] Part E, Section 7.8.5).
    #[repr(transparent)]
    pub struct AdvChannels: u8 {
        const CH37 = 1 << 0;
        const CH38 = 1 << 1;
        const CH39 = 1 << 2;
    }
}

impl Default for AdvChannels {
    /// All three advertising channels.
    #[inline]
    fn default() -> Self {
        Self::all()
    }
}

/// Advertising filter policy ([Vol 4] Part E, Section 7.8.5).
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    PartialEq,
    num_enum::IntoPrimitive,
    num_enum::TryFromPrimitive,
)]
#[non_exhaustive]
#[repr(u8)]
pub enum AdvFilterPolicy {
    /// Process scan and connection requests from all devices.
    #[default]
    None = 0x00,
    /// Filter scan requests with the filter accept list.
    FilterScan = 0x01,
    /// Filter connection requests with the filter accept list.
    FilterConnect = 0x02,
    /// Filter both scan and connection requests.
    FilterAll = 0x03,
}

/// `HCI_LE_Set_Advertising_Parameters` parameters
/// ([Vol 4] Part E, Section 7.8.5).
#[derive(Clone, Copy, Debug, Default)]
pub struct LeSetAdvertisingParameters {
    pub interval_min: AdvInterval,
    pub interval_max: AdvInterval,
    pub typ: AdvType,
    pub own_addr_type: AddrType,
    pub peer_addr_type: AddrType,
    pub peer_addr: RawAddr,
    pub channels: AdvChannels,
    pub filter: AdvFilterPolicy,
}

impl CommandParams for LeSetAdvertisingParameters {
    const OPCODE: Opcode = Opcode::LeSetAdvertisingParameters;
    const LEN: usize = 15;

    fn encode_params(&self, p: &mut Packer) {
        p.u16(self.interval_min)
            .u16(self.interval_max)
            .u8(self.typ)
            .u8(self.own_addr_type)
            .u8(self.peer_addr_type)
            .put(self.peer_addr)
            .u8(self.channels.bits())
            .u8(self.filter);
    }
}

/// `HCI_LE_Set_Advertising_Data` parameters
/// ([Vol 4] Part E, Section 7.8.7). The payload is zero-padded to 31 bytes
/// on the wire.
#[derive(Clone, Debug, Default)]
pub struct LeSetAdvertisingData {
    pub data: AdvData,
}

impl CommandParams for LeSetAdvertisingData {
    const OPCODE: Opcode = Opcode::LeSetAdvertisingData;
    const LEN: usize = 32;

    fn encode_params(&self, p: &mut Packer) {
        pack_adv_data(&self.data, p);
    }
}

/// `HCI_LE_Set_Scan_Response_Data` parameters
/// ([Vol 4] Part E, Section 7.8.8).
#[derive(Clone, Debug, Default)]
pub struct LeSetScanResponseData {
    pub data: AdvData,
}

impl CommandParams for LeSetScanResponseData {
    const OPCODE: Opcode = Opcode::LeSetScanResponseData;
    const LEN: usize = 32;

    fn encode_params(&self, p: &mut Packer) {
        pack_adv_data(&self.data, p);
    }
}

/// `HCI_LE_Set_Advertising_Enable` parameters
/// ([Vol 4] Part E, Section 7.8.9).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LeSetAdvertisingEnable {
    pub enable: bool,
}

impl CommandParams for LeSetAdvertisingEnable {
    const OPCODE: Opcode = Opcode::LeSetAdvertisingEnable;
    const LEN: usize = 1;

    fn encode_params(&self, p: &mut Packer) {
        p.u8(u8::from(self.enable));
    }
}

/// `HCI_LE_Set_Data_Length` parameters ([Vol 4] Part E, Section 7.8.33).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LeSetDataLength {
    pub handle: u16,
    pub tx_octets: MaxTxOctets,
    pub tx_time: MaxTxTime,
}

impl CommandParams for LeSetDataLength {
    const OPCODE: Opcode = Opcode::LeSetDataLength;
    const LEN: usize = 6;

    fn encode_params(&self, p: &mut Packer) {
        p.u16(self.handle).u16(self.tx_octets).u16(self.tx_time);
    }
}

/// `HCI_LE_Read_Buffer_Size` return parameters
/// ([Vol 4] Part E, Section 7.8.2).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LeBufferSize {
    pub status: Status,
    pub pkt_len: u16,
    pub num_pkts: u8,
}

impl ReturnParams for LeBufferSize {
    const OPCODE: Opcode = Opcode::LeReadBufferSize;
    const LEN: usize = 4;

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        Some(Self {
            status: Status::from(p.u8()),
            pkt_len: p.u16(),
            num_pkts: p.u8(),
        })
    }
}

/// `HCI_LE_Read_Local_Supported_Features` return parameters
/// ([Vol 4] Part E, Section 7.8.3).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LeLocalFeatures {
    pub status: Status,
    pub features: LeFeature,
}

impl ReturnParams for LeLocalFeatures {
    const OPCODE: Opcode = Opcode::LeReadLocalSupportedFeatures;
    const LEN: usize = 9;

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        Some(Self {
            status: Status::from(p.u8()),
            features: LeFeature::from_bits_truncate(p.u64()),
        })
    }
}

/// `HCI_LE_Read_Advertising_Physical_Channel_Tx_Power` return parameters
/// ([Vol 4] Part E, Section 7.8.6).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LeAdvChannelTxPower {
    pub status: Status,
    pub power: TxPower,
}

impl ReturnParams for LeAdvChannelTxPower {
    const OPCODE: Opcode = Opcode::LeReadAdvertisingChannelTxPower;
    const LEN: usize = 2;

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        Some(Self {
            status: Status::from(p.u8()),
            power: TxPower::new(p.i8())?,
        })
    }
}

/// `HCI_LE_Set_Data_Length` return parameters
/// ([Vol 4] Part E, Section 7.8.33).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LeSetDataLengthComplete {
    pub status: Status,
    pub handle: u16,
}

impl ReturnParams for LeSetDataLengthComplete {
    const OPCODE: Opcode = Opcode::LeSetDataLength;
    const LEN: usize = 3;

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        Some(Self {
            status: Status::from(p.u8()),
            handle: p.u16(),
        })
    }
}

/// `HCI_LE_Read_Maximum_Data_Length` return parameters
/// ([Vol 4] Part E, Section 7.8.46).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LeMaxDataLength {
    pub status: Status,
    pub tx_octets: MaxTxOctets,
    pub tx_time: MaxTxTime,
    pub rx_octets: MaxTxOctets,
    pub rx_time: MaxTxTime,
}

impl ReturnParams for LeMaxDataLength {
    const OPCODE: Opcode = Opcode::LeReadMaximumDataLength;
    const LEN: usize = 9;

    fn decode_params(p: &mut Unpacker) -> Option<Self> {
        Some(Self {
            status: Status::from(p.u8()),
            tx_octets: MaxTxOctets::new(p.u16())?,
            tx_time: MaxTxTime::new(p.u16())?,
            rx_octets: MaxTxOctets::new(p.u16())?,
            rx_time: MaxTxTime::new(p.u16())?,
        })
    }
}

/// Writes a significant-length byte followed by the zero-padded 31-byte
/// payload.
fn pack_adv_data(d: &AdvData, p: &mut Packer) {
    let d = d.as_ref();
    p.u8(u8::try_from(d.len()).expect("invalid advertising data"));
    p.put(d);
    p.put(&[0u8; AdvData::MAX_LEN][d.len()..]);
}
