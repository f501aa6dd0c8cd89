//! Host Controller Interface command encoding ([Vol 4] Part E).
//!
//! Only the codec layer: LE Controller command parameters and their return
//! parameters as fixed-length little-endian structs keyed by a 16-bit
//! opcode. Transport and event routing live below this crate.

use structbuf::{Pack, Packer, StructBuf, Unpacker};

pub use cmd::*;

mod cmd;

/// Command packet header length: opcode plus parameter length byte.
pub(crate) const CMD_HDR: usize = 3;

/// HCI command opcodes ([Vol 4] Part E, Section 7).
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    Ord,
    PartialEq,
    PartialOrd,
    num_enum::IntoPrimitive,
    num_enum::TryFromPrimitive,
    strum::Display,
)]
#[non_exhaustive]
#[repr(u16)]
pub enum Opcode {
    /// Opcode 0x0000 is used to update `Num_HCI_Command_Packets`
    /// ([Vol 4] Part E, Section 7.7.14).
    #[default]
    None = 0x0000,

    // LE Controller commands ([Vol 4] Part E, Section 7.8)
    LeSetEventMask = Le.ocf(0x0001),
    LeReadBufferSize = Le.ocf(0x0002),
    LeReadLocalSupportedFeatures = Le.ocf(0x0003),
    LeSetRandomAddress = Le.ocf(0x0005),
    LeSetAdvertisingParameters = Le.ocf(0x0006),
    LeReadAdvertisingChannelTxPower = Le.ocf(0x0007),
    LeSetAdvertisingData = Le.ocf(0x0008),
    LeSetScanResponseData = Le.ocf(0x0009),
    LeSetAdvertisingEnable = Le.ocf(0x000A),
    LeSetDataLength = Le.ocf(0x0022),
    LeReadMaximumDataLength = Le.ocf(0x002F),
}

use OpcodeGroup::*;

// Opcode group field definitions.
#[derive(Clone, Copy)]
#[repr(u16)]
enum OpcodeGroup {
    Le = 0x08,
}

impl OpcodeGroup {
    /// Combines OGF with OCF to create a full opcode.
    #[inline]
    const fn ocf(self, ocf: u16) -> u16 {
        (self as u16) << 10 | ocf
    }
}

/// HCI status codes ([Vol 1] Part F, Section 1.3).
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    PartialEq,
    num_enum::FromPrimitive,
    num_enum::IntoPrimitive,
    strum::Display,
)]
#[non_exhaustive]
#[repr(u8)]
pub enum Status {
    Success = 0x00,
    UnknownCommand = 0x01,
    UnknownConnectionIdentifier = 0x02,
    HardwareFailure = 0x03,
    MemoryCapacityExceeded = 0x07,
    CommandDisallowed = 0x0C,
    UnsupportedFeatureOrParameterValue = 0x11,
    InvalidCommandParameters = 0x12,
    #[default]
    UnspecifiedError = 0x1F,
}

/// HCI command parameter encoder. Produces the full command packet
/// `[opcode][parameter length][parameters]`.
pub trait CommandParams {
    /// Command opcode.
    const OPCODE: Opcode;

    /// Exact parameter length in bytes.
    const LEN: usize;

    /// Encodes the command parameters.
    fn encode_params(&self, p: &mut Packer);

    /// Encodes the full command packet.
    #[must_use]
    fn encode(&self) -> StructBuf {
        let mut b = StructBuf::new(CMD_HDR + Self::LEN);
        {
            let mut p = b.append();
            p.u16(Self::OPCODE).u8(0_u8);
            self.encode_params(&mut p);
        }
        let n = u8::try_from(b.len() - CMD_HDR).expect("command too long");
        debug_assert_eq!(usize::from(n), Self::LEN);
        b[CMD_HDR - 1] = n;
        b
    }
}

/// HCI return parameter decoder for `HCI_Command_Complete` events
/// ([Vol 4] Part E, Section 7.7.14). The buffer length must match `LEN`
/// exactly and every field must parse within its bounded range.
pub trait ReturnParams: Sized {
    /// Command opcode the return parameters belong to.
    const OPCODE: Opcode;

    /// Exact return parameter length in bytes, including the status byte.
    const LEN: usize;

    /// Decodes the return parameters.
    fn decode_params(p: &mut Unpacker) -> Option<Self>;

    /// Decodes a complete return parameter buffer.
    #[must_use]
    fn decode(b: &[u8]) -> Option<Self> {
        if b.len() != Self::LEN {
            return None;
        }
        Unpacker::new(b).map(Self::decode_params).flatten()
    }
}
