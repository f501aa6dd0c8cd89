//! User-mode Bluetooth LE ATT/GATT host library.
//!
//! Implements the Attribute Protocol server and its GATT database together
//! with the surrounding codec machinery: ATT PDUs, GAP advertising data
//! structures, and HCI LE command parameters. The library sits on top of an
//! L2CAP socket providing framed PDU I/O ([`l2cap::Socket`]) and below the
//! application, which talks to a [`gatt::Server`].

pub mod att;
pub mod gap;
pub mod gatt;
pub mod hci;
pub mod l2cap;
pub mod le;

/// Implements `Display` by delegating to `Debug`.
macro_rules! impl_display_via_debug {
    ($($t:ty),* $(,)?) => {$(
        impl ::std::fmt::Display for $t {
            #[inline]
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Debug::fmt(self, f)
            }
        }
    )*};
}
pub(crate) use impl_display_via_debug;
