use crate::l2cap::SecurityLevel;

use super::ErrorCode;

/// Access type being requested by a client operation
/// ([Vol 3] Part F, Section 3.4.9).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Access {
    Read,
    Write,
}

bitflags::bitflags! {
    /// Attribute permissions ([Vol 3] Part F, Section 3.2.5). Security flags
    /// only apply to the access type they name: `READ_ENCRYPT` requires an
    /// encrypted link for reads, `WRITE_AUTHN` an authenticated one for
    /// writes.
    #[derive(Default)]
    #[must_use]
    #[repr(transparent)]
    pub struct Perms: u8 {
        /// Open read access.
        const READ = 1 << 0;
        /// Open write access.
        const WRITE = 1 << 1;
        /// Read access over an encrypted link.
        const READ_ENCRYPT = 1 << 2;
        /// Write access over an encrypted link.
        const WRITE_ENCRYPT = 1 << 3;
        /// Read access over an authenticated link.
        const READ_AUTHN = 1 << 4;
        /// Write access over an authenticated link.
        const WRITE_AUTHN = 1 << 5;

        /// Open read/write access.
        const READ_WRITE = Self::READ.bits | Self::WRITE.bits;
        /// Any read access.
        const READ_ANY = Self::READ.bits | Self::READ_ENCRYPT.bits | Self::READ_AUTHN.bits;
        /// Any write access.
        const WRITE_ANY = Self::WRITE.bits | Self::WRITE_ENCRYPT.bits | Self::WRITE_AUTHN.bits;
    }
}

impl Perms {
    /// Tests whether an access request should be allowed at the given link
    /// security level. Read and write permissions are evaluated
    /// independently; an attribute readable at any level may still demand an
    /// authenticated link for writes.
    pub fn test(self, access: Access, sec: SecurityLevel) -> Result<(), ErrorCode> {
        use ErrorCode::*;
        let (any, authn, encrypt, denied) = match access {
            Access::Read => (
                Self::READ_ANY,
                Self::READ_AUTHN,
                Self::READ_ENCRYPT,
                ReadNotPermitted,
            ),
            Access::Write => (
                Self::WRITE_ANY,
                Self::WRITE_AUTHN,
                Self::WRITE_ENCRYPT,
                WriteNotPermitted,
            ),
        };
        if !self.intersects(any) {
            return Err(denied);
        }
        // [Vol 3] Part C, Section 10.3.1
        if self.contains(authn) && sec < SecurityLevel::High {
            return Err(InsufficientAuthentication);
        }
        if self.contains(encrypt) && sec < SecurityLevel::Medium {
            return Err(InsufficientEncryption);
        }
        Ok(())
    }
}
