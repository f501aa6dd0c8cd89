//! Attribute Protocol ([Vol 3] Part F).

use std::fmt::{Display, Formatter};

pub use {conn::*, consts::*, handle::*, pdu::*, perm::*};

mod conn;
mod consts;
mod handle;
mod pdu;
mod perm;

/// Error type returned by the ATT layer.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Att(#[from] ErrorRsp),
    #[error("timeout while waiting for {0}")]
    Timeout(Opcode),
}

/// Common ATT result type.
pub type Result<T> = std::result::Result<T, Error>;

/// PDU response result.
pub type RspResult<T> = std::result::Result<T, ErrorRsp>;

/// `ATT_ERROR_RSP` contents ([Vol 3] Part F, Section 3.4.1.1). Doubles as the
/// error type carried by [`RspResult`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub struct ErrorRsp {
    req: u8,
    hdl: Option<Handle>,
    err: ErrorCode,
}

impl ErrorRsp {
    /// Creates a new error response.
    #[inline(always)]
    #[must_use]
    pub(crate) const fn new(req: u8, hdl: Option<Handle>, err: ErrorCode) -> Self {
        Self { req, hdl, err }
    }

    /// Returns the raw opcode of the failed request.
    #[inline(always)]
    #[must_use]
    pub const fn request(self) -> u8 {
        self.req
    }

    /// Returns the handle the failure refers to, if any.
    #[inline(always)]
    #[must_use]
    pub const fn handle(self) -> Option<Handle> {
        self.hdl
    }

    /// Returns the error code.
    #[inline(always)]
    #[must_use]
    pub const fn code(self) -> ErrorCode {
        self.err
    }
}

impl Display for ErrorRsp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use num_enum::TryFromPrimitive;
        f.write_str("ATT ")?;
        match Opcode::try_from_primitive(self.req) {
            Ok(op) => write!(f, "{op} "),
            Err(_) => write!(f, "request {:#04X} ", self.req),
        }?;
        if let Some(hdl) = self.hdl {
            write!(f, "for handle {:#06X} ", u16::from(hdl))?;
        }
        write!(f, "failed with {}", self.err)
    }
}

/// ATT maximum transmission unit ([Vol 3] Part F, Section 3.2.8).
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct Mtu(u16);

impl Mtu {
    /// Minimum and default MTU for the LE-U fixed channel.
    pub const MIN: Self = Self(23);
    /// Largest useful MTU (maximum attribute value plus the Prepare Write
    /// header).
    pub const MAX: Self = Self(517);

    /// Creates an MTU. Returns [`None`] if `v` is outside `[23, 517]`.
    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Option<Self> {
        if Self::MIN.0 <= v && v <= Self::MAX.0 {
            Some(Self(v))
        } else {
            None
        }
    }

    /// Returns the MTU negotiated from the client's and the server's
    /// preferred values ([Vol 3] Part F, Section 3.4.2.2).
    #[inline]
    #[must_use]
    pub fn effective(client: u16, preferred: Self) -> Self {
        Self(client.min(preferred.0).clamp(Self::MIN.0, Self::MAX.0))
    }

    /// Returns the MTU in bytes.
    #[inline(always)]
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl Default for Mtu {
    #[inline]
    fn default() -> Self {
        Self::MIN
    }
}

impl From<Mtu> for u16 {
    #[inline]
    fn from(v: Mtu) -> Self {
        v.0
    }
}

impl From<Mtu> for usize {
    #[inline]
    fn from(v: Mtu) -> Self {
        Self::from(v.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mtu() {
        assert_eq!(Mtu::new(22), None);
        assert_eq!(Mtu::new(23), Some(Mtu::MIN));
        assert_eq!(Mtu::new(518), None);

        assert_eq!(Mtu::effective(17, Mtu::MIN), Mtu::MIN);
        assert_eq!(Mtu::effective(517, Mtu::MIN), Mtu::MIN);
        assert_eq!(Mtu::effective(517, Mtu::new(247).unwrap()).raw(), 247);
        assert_eq!(Mtu::effective(100, Mtu::MAX).raw(), 100);
    }

    #[test]
    fn error_rsp() {
        let e = ErrorRsp::new(
            Opcode::ReadReq as u8,
            Handle::new(3),
            ErrorCode::AttributeNotLong,
        );
        assert_eq!(
            e.to_string(),
            "ATT ReadReq for handle 0x0003 failed with AttributeNotLong"
        );
    }
}
