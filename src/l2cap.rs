//! L2CAP interface consumed by the ATT layer ([Vol 3] Part A).
//!
//! The ATT bearer runs over a fixed L2CAP channel that delivers one complete
//! PDU per frame. The channel implementation (kernel socket, user-mode
//! controller driver, test loopback) is external; this module defines the
//! narrow seam the rest of the library consumes.

use std::io;

/// Framed datagram socket carrying one ATT PDU per frame.
pub trait Socket {
    /// Sends a single PDU.
    fn send(&mut self, pdu: &[u8]) -> io::Result<()>;

    /// Receives a single PDU.
    fn recv(&mut self) -> io::Result<Vec<u8>>;

    /// Returns the current link security level.
    fn security(&self) -> SecurityLevel;
}

/// Link security level reported by the socket, ordered from weakest to
/// strongest.
#[derive(
    Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd, strum::Display,
)]
#[non_exhaustive]
pub enum SecurityLevel {
    /// No authentication and no encryption (SDP traffic only).
    Sdp,
    /// No authentication and no encryption.
    #[default]
    Low,
    /// Encrypted, unauthenticated pairing.
    Medium,
    /// Encrypted, authenticated pairing.
    High,
    /// Encrypted, authenticated pairing with FIPS-approved algorithms.
    Fips,
}
