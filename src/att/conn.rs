use std::collections::VecDeque;
use std::io;
use std::time::{Duration, Instant};

use structbuf::StructBuf;
use tracing::{debug, trace, warn};

use crate::l2cap::{SecurityLevel, Socket};

use super::*;

/// Transaction timeout ([Vol 3] Part F, Section 3.3.3).
const TRANSACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// ATT bearer over a framed L2CAP socket ([Vol 3] Part F, Section 3.2.11).
///
/// Maintains the outbound PDU queue and the pairing between a sent request
/// or indication and the response or confirmation it invokes. The bearer
/// touches the socket only inside [`Connection::read`] and
/// [`Connection::write`]; everything else just queues work.
pub struct Connection<S> {
    sock: S,
    mtu: Mtu,
    preferred_mtu: Mtu,
    out: VecDeque<StructBuf>,
    pending: Option<Pending>,
    write_pending: Option<Box<dyn FnMut()>>,
}

/// Sent request or indication awaiting its pairing PDU.
struct Pending {
    req: Opcode,
    rsp: Opcode,
    sent: Instant,
    cont: Continuation,
}

/// Continuation invoked when a pending exchange completes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Continuation {
    /// Indication awaiting `ATT_HANDLE_VALUE_CFM`.
    Confirm(Handle),
}

/// Classified inbound traffic.
#[derive(Debug)]
pub(crate) enum Inbound {
    /// Request, command, notification, or indication PDU.
    Pdu(Opcode, Vec<u8>),
    /// Response or confirmation that completed a pending exchange.
    Done(Continuation, Opcode, Vec<u8>),
    /// Frame consumed internally (error response queued or junk dropped).
    Handled,
}

impl<S: Socket> Connection<S> {
    /// Creates an ATT bearer over `sock`.
    #[must_use]
    pub fn new(sock: S, preferred_mtu: Mtu) -> Self {
        Self {
            sock,
            mtu: Mtu::default(),
            preferred_mtu,
            out: VecDeque::new(),
            pending: None,
            write_pending: None,
        }
    }

    /// Returns the current MTU.
    #[inline(always)]
    #[must_use]
    pub const fn mtu(&self) -> Mtu {
        self.mtu
    }

    /// Returns the preferred MTU used during MTU exchange.
    #[inline(always)]
    #[must_use]
    pub const fn preferred_mtu(&self) -> Mtu {
        self.preferred_mtu
    }

    /// Sets the MTU negotiated by MTU exchange.
    #[inline]
    pub(crate) fn set_mtu(&mut self, mtu: Mtu) {
        debug!("Effective MTU: {}", mtu.raw());
        self.mtu = mtu;
    }

    /// Returns the current link security level.
    #[inline]
    #[must_use]
    pub fn security(&self) -> SecurityLevel {
        self.sock.security()
    }

    /// Returns whether a sent request or indication is still awaiting its
    /// pairing PDU.
    #[inline(always)]
    #[must_use]
    pub(crate) fn busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Sets the callback invoked whenever the send queue transitions from
    /// empty to non-empty.
    #[inline]
    pub fn on_write_pending(&mut self, f: Option<Box<dyn FnMut()>>) {
        self.write_pending = f;
    }

    /// Enqueues a non-response PDU.
    #[inline]
    pub(crate) fn send(&mut self, pdu: &impl Pdu) {
        self.enqueue(pdu.encode());
    }

    /// Enqueues a request or indication and registers the continuation
    /// invoked when the matching response or confirmation arrives.
    ///
    /// # Panics
    ///
    /// Panics if another exchange is already pending or if the PDU does not
    /// invoke a response. Both indicate programming error.
    pub(crate) fn send_request<T: Pdu>(&mut self, pdu: &T, cont: Continuation) {
        assert!(self.pending.is_none(), "transaction already pending");
        self.pending = Some(Pending {
            req: T::OPCODE,
            rsp: T::OPCODE.rsp().expect("PDU invokes no response"),
            sent: Instant::now(),
            cont,
        });
        self.send(pdu);
    }

    /// Enqueues a response PDU or an `ATT_ERROR_RSP` if the request could
    /// not be completed ([Vol 3] Part F, Section 3.4.1.1). Command-related
    /// errors are dropped.
    pub(crate) fn send_rsp(&mut self, r: RspResult<StructBuf>) {
        match r {
            Ok(rsp) => self.enqueue(rsp),
            Err(e) => {
                warn!("{e}");
                if !Opcode::is_cmd(e.request()) {
                    self.enqueue(e.encode());
                }
            }
        }
    }

    /// Enqueues an error response unless `req` is a command opcode.
    #[inline]
    pub(crate) fn send_error(&mut self, req: u8, hdl: Option<Handle>, err: ErrorCode) {
        self.send_rsp(Err(ErrorRsp::new(req, hdl, err)));
    }

    /// Drops a pending exchange whose transaction timeout expired, returning
    /// its continuation.
    pub(crate) fn take_expired(&mut self) -> Option<Continuation> {
        let expired = (self.pending.as_ref())
            .map_or(false, |p| p.sent.elapsed() >= TRANSACTION_TIMEOUT);
        expired.then(|| {
            let p = self.pending.take().unwrap();
            warn!("{} timed out waiting for {}", p.req, p.rsp);
            p.cont
        })
    }

    /// Performs one socket read and classifies the received PDU. Returns
    /// [`None`] if the socket had no data available.
    pub(crate) fn read(&mut self) -> Result<Option<Inbound>> {
        let frame = match self.sock.recv() {
            Ok(frame) => frame,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        trace!("RX: {frame:02X?}");
        // [Vol 3] Part F, Section 3.3
        let Some(&raw) = frame.first() else {
            warn!("Empty PDU");
            self.send_error(0, None, ErrorCode::InvalidPdu);
            return Ok(Some(Inbound::Handled));
        };
        let Ok(op) = Opcode::try_from(raw) else {
            warn!("Unknown opcode: {raw:#04X}");
            self.send_error(raw, None, ErrorCode::RequestNotSupported);
            return Ok(Some(Inbound::Handled));
        };
        if !matches!(op.typ(), PduType::Rsp | PduType::Cfm) {
            return Ok(Some(Inbound::Pdu(op, frame)));
        }
        match self.pending.take() {
            Some(p) if op == p.rsp || Self::is_matching_err(op, p.req, &frame) => {
                Ok(Some(Inbound::Done(p.cont, op, frame)))
            }
            other => {
                self.pending = other;
                warn!("Unexpected {op}");
                Ok(Some(Inbound::Handled))
            }
        }
    }

    /// Drains one pending send. Returns whether more sends remain queued.
    pub(crate) fn write(&mut self) -> Result<bool> {
        let Some(pdu) = self.out.pop_front() else {
            return Ok(false);
        };
        trace!("TX: {:02X?}", pdu.as_ref());
        if let Err(e) = self.sock.send(pdu.as_ref()) {
            self.out.push_front(pdu);
            return Err(e.into());
        }
        Ok(!self.out.is_empty())
    }

    /// Returns whether `op` is an error response to the pending request.
    #[inline]
    fn is_matching_err(op: Opcode, req: Opcode, frame: &[u8]) -> bool {
        op == Opcode::ErrorRsp && frame.get(1) == Some(&(req as u8))
    }

    fn enqueue(&mut self, pdu: StructBuf) {
        let was_empty = self.out.is_empty();
        self.out.push_back(pdu);
        if was_empty {
            if let Some(f) = self.write_pending.as_mut() {
                f();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use matches::assert_matches;

    use super::*;

    #[derive(Default)]
    struct Loopback {
        rx: VecDeque<Vec<u8>>,
        tx: Vec<Vec<u8>>,
    }

    impl Socket for Loopback {
        fn send(&mut self, pdu: &[u8]) -> io::Result<()> {
            self.tx.push(pdu.to_vec());
            Ok(())
        }

        fn recv(&mut self) -> io::Result<Vec<u8>> {
            (self.rx.pop_front()).ok_or_else(|| io::ErrorKind::WouldBlock.into())
        }

        fn security(&self) -> SecurityLevel {
            SecurityLevel::Low
        }
    }

    fn conn() -> Connection<Loopback> {
        Connection::new(Loopback::default(), Mtu::default())
    }

    #[test]
    fn unknown_opcode() {
        let mut c = conn();
        c.sock.rx.push_back(vec![0xFF]);
        assert_matches!(c.read(), Ok(Some(Inbound::Handled)));
        assert!(c.write().is_ok());
        // 0xFF has the command flag set, so no error response is sent
        assert!(c.sock.tx.is_empty());

        c.sock.rx.push_back(vec![0x3F]);
        assert_matches!(c.read(), Ok(Some(Inbound::Handled)));
        while c.write().unwrap() {}
        assert_eq!(
            c.sock.tx.pop(),
            Some(vec![0x01, 0x3F, 0x00, 0x00, 0x06]) // RequestNotSupported
        );
    }

    #[test]
    fn write_pending_signal() {
        use std::cell::Cell;
        use std::rc::Rc;
        let n = Rc::new(Cell::new(0));
        let m = Rc::clone(&n);
        let mut c = conn();
        c.on_write_pending(Some(Box::new(move || m.set(m.get() + 1))));
        c.send(&WriteRsp);
        c.send(&HandleValueCfm);
        assert_eq!(n.get(), 1); // Only the empty -> non-empty transition
        assert!(c.write().unwrap());
        assert!(!c.write().unwrap());
        c.send(&WriteRsp);
        assert_eq!(n.get(), 2);
    }

    #[test]
    fn confirmation_pairing() {
        let mut c = conn();
        let hdl = Handle::new(3).unwrap();
        c.send_request(
            &HandleValueInd {
                handle: 3,
                value: vec![0xAA],
            },
            Continuation::Confirm(hdl),
        );
        assert!(c.busy());

        // A request does not complete the exchange
        c.sock.rx.push_back(vec![0x0A, 0x03, 0x00]);
        assert_matches!(c.read(), Ok(Some(Inbound::Pdu(Opcode::ReadReq, _))));
        assert!(c.busy());

        c.sock.rx.push_back(vec![0x1E]);
        assert_matches!(
            c.read(),
            Ok(Some(Inbound::Done(Continuation::Confirm(h), Opcode::HandleValueCfm, _)))
                if h == hdl
        );
        assert!(!c.busy());
    }

    #[test]
    fn unexpected_confirmation() {
        let mut c = conn();
        c.sock.rx.push_back(vec![0x1E]);
        assert_matches!(c.read(), Ok(Some(Inbound::Handled)));
        assert!(c.sock.tx.is_empty());
    }
}
