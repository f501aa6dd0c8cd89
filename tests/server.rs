//! End-to-end GATT server tests over an in-memory socket.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use blehost::att::{Handle, Mtu, Perms};
use blehost::gatt::{
    Cccd, CharProps, Characteristic, Database, Descriptor, Server, ServerOpts, Service,
};
use blehost::l2cap::{SecurityLevel, Socket};

/// Socket endpoint shared with the test, acting as the client.
#[derive(Clone, Default)]
struct TestSock {
    rx: Rc<RefCell<VecDeque<Vec<u8>>>>,
    tx: Rc<RefCell<Vec<Vec<u8>>>>,
    sec: Rc<Cell<SecurityLevel>>,
}

impl Socket for TestSock {
    fn send(&mut self, pdu: &[u8]) -> io::Result<()> {
        self.tx.borrow_mut().push(pdu.to_vec());
        Ok(())
    }

    fn recv(&mut self) -> io::Result<Vec<u8>> {
        (self.rx.borrow_mut().pop_front()).ok_or_else(|| io::ErrorKind::WouldBlock.into())
    }

    fn security(&self) -> SecurityLevel {
        self.sec.get()
    }
}

impl TestSock {
    /// Sends one client PDU and returns everything the server transmitted.
    fn request(&self, srv: &mut Server<TestSock>, pdu: &[u8]) -> Vec<Vec<u8>> {
        self.rx.borrow_mut().push_back(pdu.to_vec());
        assert!(srv.read().unwrap());
        self.drain(srv)
    }

    /// Flushes the server send queue and returns the transmitted PDUs.
    fn drain(&self, srv: &mut Server<TestSock>) -> Vec<Vec<u8>> {
        while srv.write().unwrap() {}
        self.tx.borrow_mut().drain(..).collect()
    }
}

/// Single primary service at handle 1 with one characteristic declaration at
/// 2 and value at 3, UUID 0xFFF1, value [0xAA], readable and writable.
fn fixture() -> (Server<TestSock>, TestSock) {
    let sock = TestSock::default();
    let mut db = Database::new();
    db.add(
        &Service::primary(0xFFF1_u16).with_characteristic(Characteristic::new(
            0xFFF1_u16,
            CharProps::READ | CharProps::WRITE,
            Perms::READ_WRITE,
            [0xAA],
        )),
    );
    (Server::new(sock.clone(), db), sock)
}

/// Same layout plus a Client Characteristic Configuration descriptor at
/// handle 4.
fn notify_fixture(init: Cccd) -> (Server<TestSock>, TestSock) {
    let sock = TestSock::default();
    let mut db = Database::new();
    db.add(
        &Service::primary(0xFFF1_u16).with_characteristic(
            Characteristic::new(
                0xFFF1_u16,
                CharProps::READ | CharProps::WRITE | CharProps::NOTIFY | CharProps::INDICATE,
                Perms::READ_WRITE,
                [0xAA],
            )
            .with_descriptor(Descriptor::cccd(init)),
        ),
    );
    (Server::new(sock.clone(), db), sock)
}

fn hdl(h: u16) -> Handle {
    Handle::new(h).unwrap()
}

#[test]
fn mtu_exchange() {
    let (mut srv, sock) = fixture();
    let rsp = sock.request(&mut srv, &[0x02, 0x17, 0x00]);
    assert_eq!(rsp, [vec![0x03, 0x17, 0x00]]);
    assert_eq!(srv.mtu().raw(), 23);

    // A larger client MTU is clamped to the server's preferred value.
    let rsp = sock.request(&mut srv, &[0x02, 0x00, 0x02]);
    assert_eq!(rsp, [vec![0x03, 0x17, 0x00]]);
    assert_eq!(srv.mtu().raw(), 23);
}

#[test]
fn mtu_exchange_prefers_larger_server_mtu() {
    let sock = TestSock::default();
    let mut db = Database::new();
    db.add(&Service::primary(0xFFF1_u16));
    let mut srv = Server::with_opts(
        sock.clone(),
        db,
        ServerOpts {
            preferred_mtu: Mtu::new(247).unwrap(),
            ..ServerOpts::default()
        },
    );
    let rsp = sock.request(&mut srv, &[0x02, 0x40, 0x00]); // client 64
    assert_eq!(rsp, [vec![0x03, 0xF7, 0x00]]); // response carries 247
    assert_eq!(srv.mtu().raw(), 64); // effective is min(64, 247)
}

#[test]
fn read_request() {
    let (mut srv, sock) = fixture();
    let rsp = sock.request(&mut srv, &[0x0A, 0x03, 0x00]);
    assert_eq!(rsp, [vec![0x0B, 0xAA]]);
}

#[test]
fn write_request() {
    let (mut srv, sock) = fixture();
    let rsp = sock.request(&mut srv, &[0x12, 0x03, 0x00, 0xBB, 0xCC]);
    assert_eq!(rsp, [vec![0x13]]);
    let rsp = sock.request(&mut srv, &[0x0A, 0x03, 0x00]);
    assert_eq!(rsp, [vec![0x0B, 0xBB, 0xCC]]);
}

#[test]
fn write_command() {
    let (mut srv, sock) = fixture();
    let rsp = sock.request(&mut srv, &[0x52, 0x03, 0x00, 0xEE]);
    assert!(rsp.is_empty());
    assert_eq!(srv.db().get(hdl(3)).unwrap().value(), [0xEE]);

    // Failures produce no response either.
    let rsp = sock.request(&mut srv, &[0x52, 0x63, 0x00, 0xEE]);
    assert!(rsp.is_empty());
}

#[test]
fn read_blob_short_value() {
    let (mut srv, sock) = fixture();
    let rsp = sock.request(&mut srv, &[0x0C, 0x03, 0x00, 0x00, 0x00]);
    assert_eq!(rsp, [vec![0x01, 0x0C, 0x03, 0x00, 0x0B]]); // AttributeNotLong
}

#[test]
fn read_blob_long_value() {
    let (mut srv, sock) = fixture();
    let long: Vec<u8> = (0..60).collect();
    assert!(srv.db_mut().write(hdl(3), &long));

    let rsp = sock.request(&mut srv, &[0x0C, 0x03, 0x00, 0x00, 0x00]);
    assert_eq!(rsp, [[[0x0D].as_slice(), &long[..22]].concat()]);
    let rsp = sock.request(&mut srv, &[0x0C, 0x03, 0x00, 0x16, 0x00]);
    assert_eq!(rsp, [[[0x0D].as_slice(), &long[22..44]].concat()]);
    let rsp = sock.request(&mut srv, &[0x0C, 0x03, 0x00, 0x3C, 0x00]);
    assert_eq!(rsp, [vec![0x0D]]); // Offset == length returns empty
    let rsp = sock.request(&mut srv, &[0x0C, 0x03, 0x00, 0x3D, 0x00]);
    assert_eq!(rsp, [vec![0x01, 0x0C, 0x03, 0x00, 0x07]]); // InvalidOffset
}

#[test]
fn read_by_group_type() {
    let (mut srv, sock) = fixture();
    let rsp = sock.request(&mut srv, &[0x10, 0x01, 0x00, 0xFF, 0xFF, 0x00, 0x28]);
    assert_eq!(
        rsp,
        [vec![0x11, 0x06, 0x01, 0x00, 0x03, 0x00, 0xF1, 0xFF]]
    );
}

#[test]
fn read_by_group_type_unsupported() {
    let (mut srv, sock) = fixture();
    let rsp = sock.request(&mut srv, &[0x10, 0x01, 0x00, 0xFF, 0xFF, 0xF1, 0xFF]);
    assert_eq!(rsp, [vec![0x01, 0x10, 0x01, 0x00, 0x10]]); // UnsupportedGroupType
}

#[test]
fn read_by_type() {
    let (mut srv, sock) = fixture();
    // Discover all characteristics: type 0x2803
    let rsp = sock.request(&mut srv, &[0x08, 0x01, 0x00, 0xFF, 0xFF, 0x03, 0x28]);
    assert_eq!(
        rsp,
        [vec![0x09, 0x07, 0x02, 0x00, 0x0A, 0x03, 0x00, 0xF1, 0xFF]]
    );
}

#[test]
fn find_information() {
    let (mut srv, sock) = fixture();
    let rsp = sock.request(&mut srv, &[0x04, 0x01, 0x00, 0xFF, 0xFF]);
    assert_eq!(
        rsp,
        [vec![
            0x05, 0x01, // Format: 16-bit
            0x01, 0x00, 0x00, 0x28, // Primary Service declaration
            0x02, 0x00, 0x03, 0x28, // Characteristic declaration
            0x03, 0x00, 0xF1, 0xFF, // Characteristic value
        ]]
    );
    let rsp = sock.request(&mut srv, &[0x04, 0x05, 0x00, 0xFF, 0xFF]);
    assert_eq!(rsp, [vec![0x01, 0x04, 0x05, 0x00, 0x0A]]); // AttributeNotFound
}

#[test]
fn find_by_type_value() {
    let (mut srv, sock) = fixture();
    let rsp = sock.request(
        &mut srv,
        &[0x06, 0x01, 0x00, 0xFF, 0xFF, 0x00, 0x28, 0xF1, 0xFF],
    );
    assert_eq!(rsp, [vec![0x07, 0x01, 0x00, 0x03, 0x00]]);
}

#[test]
fn invalid_handles() {
    let (mut srv, sock) = fixture();
    let rsp = sock.request(&mut srv, &[0x0A, 0x00, 0x00]);
    assert_eq!(rsp, [vec![0x01, 0x0A, 0x00, 0x00, 0x01]]); // InvalidHandle
    let rsp = sock.request(&mut srv, &[0x0A, 0x63, 0x00]);
    assert_eq!(rsp, [vec![0x01, 0x0A, 0x63, 0x00, 0x01]]);
    // start > end
    let rsp = sock.request(&mut srv, &[0x04, 0x05, 0x00, 0x01, 0x00]);
    assert_eq!(rsp, [vec![0x01, 0x04, 0x05, 0x00, 0x01]]);
}

#[test]
fn unknown_and_malformed_pdus() {
    let (mut srv, sock) = fixture();
    let rsp = sock.request(&mut srv, &[0x3F, 0x00]);
    assert_eq!(rsp, [vec![0x01, 0x3F, 0x00, 0x00, 0x06]]); // RequestNotSupported
    let rsp = sock.request(&mut srv, &[0x0A, 0x03]); // Truncated Read Request
    assert_eq!(rsp, [vec![0x01, 0x0A, 0x00, 0x00, 0x04]]); // InvalidPdu
}

#[test]
fn permission_checks() {
    let sock = TestSock::default();
    let mut db = Database::new();
    db.add(
        &Service::primary(0xFFF0_u16)
            .with_characteristic(Characteristic::new(
                0xFFF1_u16,
                CharProps::WRITE,
                Perms::WRITE,
                [],
            ))
            .with_characteristic(Characteristic::new(
                0xFFF2_u16,
                CharProps::READ,
                Perms::READ_ENCRYPT,
                [0x11],
            ))
            .with_characteristic(Characteristic::new(
                0xFFF3_u16,
                CharProps::READ | CharProps::WRITE,
                Perms::READ | Perms::WRITE_AUTHN,
                [0x22],
            )),
    );
    let mut srv = Server::new(sock.clone(), db);

    // Write-only value at 3
    let rsp = sock.request(&mut srv, &[0x0A, 0x03, 0x00]);
    assert_eq!(rsp, [vec![0x01, 0x0A, 0x03, 0x00, 0x02]]); // ReadNotPermitted

    // Encrypted read at 5
    let rsp = sock.request(&mut srv, &[0x0A, 0x05, 0x00]);
    assert_eq!(rsp, [vec![0x01, 0x0A, 0x05, 0x00, 0x0F]]); // InsufficientEncryption
    sock.sec.set(SecurityLevel::Medium);
    let rsp = sock.request(&mut srv, &[0x0A, 0x05, 0x00]);
    assert_eq!(rsp, [vec![0x0B, 0x11]]);

    // Authenticated write at 7
    let rsp = sock.request(&mut srv, &[0x12, 0x07, 0x00, 0x33]);
    assert_eq!(rsp, [vec![0x01, 0x12, 0x07, 0x00, 0x05]]); // InsufficientAuthentication
    sock.sec.set(SecurityLevel::High);
    let rsp = sock.request(&mut srv, &[0x12, 0x07, 0x00, 0x33]);
    assert_eq!(rsp, [vec![0x13]]);
}

#[test]
fn prepared_write_commit() {
    let (mut srv, sock) = notify_fixture(Cccd::NOTIFY);
    let rsp = sock.request(&mut srv, &[0x16, 0x03, 0x00, 0x00, 0x00, b'H', b'E']);
    assert_eq!(rsp, [vec![0x17, 0x03, 0x00, 0x00, 0x00, b'H', b'E']]);
    let rsp = sock.request(&mut srv, &[0x16, 0x03, 0x00, 0x02, 0x00, b'L', b'L', b'O']);
    assert_eq!(rsp, [vec![0x17, 0x03, 0x00, 0x02, 0x00, b'L', b'L', b'O']]);

    let rsp = sock.request(&mut srv, &[0x18, 0x01]);
    // Execute Write response plus one notification with the new value
    assert_eq!(
        rsp,
        [
            vec![0x19],
            vec![0x1B, 0x03, 0x00, b'H', b'E', b'L', b'L', b'O'],
        ]
    );
    assert_eq!(srv.db().get(hdl(3)).unwrap().value(), b"HELLO");
}

#[test]
fn prepared_write_cancel() {
    let (mut srv, sock) = fixture();
    sock.request(&mut srv, &[0x16, 0x03, 0x00, 0x00, 0x00, b'X']);
    let rsp = sock.request(&mut srv, &[0x18, 0x00]);
    assert_eq!(rsp, [vec![0x19]]);
    assert_eq!(srv.db().get(hdl(3)).unwrap().value(), [0xAA]);

    // A second execute has nothing left to apply.
    let rsp = sock.request(&mut srv, &[0x18, 0x01]);
    assert_eq!(rsp, [vec![0x19]]);
    assert_eq!(srv.db().get(hdl(3)).unwrap().value(), [0xAA]);
}

#[test]
fn prepared_write_queue_bound() {
    let sock = TestSock::default();
    let mut db = Database::new();
    db.add(
        &Service::primary(0xFFF1_u16).with_characteristic(Characteristic::new(
            0xFFF1_u16,
            CharProps::READ | CharProps::WRITE,
            Perms::READ_WRITE,
            [0xAA],
        )),
    );
    let mut srv = Server::with_opts(
        sock.clone(),
        db,
        ServerOpts {
            max_prepared_writes: 2,
            ..ServerOpts::default()
        },
    );
    sock.request(&mut srv, &[0x16, 0x03, 0x00, 0x00, 0x00, b'A']);
    sock.request(&mut srv, &[0x16, 0x03, 0x00, 0x01, 0x00, b'B']);
    let rsp = sock.request(&mut srv, &[0x16, 0x03, 0x00, 0x02, 0x00, b'C']);
    assert_eq!(rsp, [vec![0x01, 0x16, 0x03, 0x00, 0x09]]); // PrepareQueueFull

    // The overflowing part was not queued.
    let rsp = sock.request(&mut srv, &[0x18, 0x01]);
    assert_eq!(rsp, [vec![0x19]]);
    assert_eq!(srv.db().get(hdl(3)).unwrap().value(), b"AB");
}

#[test]
fn execute_write_commits_ascending() {
    let sock = TestSock::default();
    let mut db = Database::new();
    db.add(
        &Service::primary(0xFFF0_u16)
            .with_characteristic(Characteristic::new(
                0xFFF1_u16,
                CharProps::WRITE,
                Perms::READ_WRITE,
                [],
            ))
            .with_characteristic(Characteristic::new(
                0xFFF2_u16,
                CharProps::WRITE,
                Perms::READ_WRITE,
                [],
            )),
    );
    let mut srv = Server::new(sock.clone(), db);
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    srv.set_did_write(Some(Box::new(move |_, h, v| {
        sink.borrow_mut().push((u16::from(h), v.to_vec()));
    })));

    // Queue the higher handle first; commits run by ascending handle.
    sock.request(&mut srv, &[0x16, 0x05, 0x00, 0x00, 0x00, 0x55]);
    sock.request(&mut srv, &[0x16, 0x03, 0x00, 0x00, 0x00, 0x33]);
    let rsp = sock.request(&mut srv, &[0x18, 0x01]);
    assert_eq!(rsp, [vec![0x19]]);
    assert_eq!(
        log.borrow().as_slice(),
        [(3, vec![0x33]), (5, vec![0x55])]
    );
}

#[test]
fn notification_on_local_write() {
    let (mut srv, sock) = notify_fixture(Cccd::NOTIFY);
    assert!(srv.write_value(hdl(3), &[0x01, 0x02, 0x03]));
    let out = sock.drain(&mut srv);
    assert_eq!(out, [vec![0x1B, 0x03, 0x00, 0x01, 0x02, 0x03]]);

    // Values longer than MTU - 3 are truncated.
    let long: Vec<u8> = (0..50).collect();
    assert!(srv.write_value(hdl(3), &long));
    let out = sock.drain(&mut srv);
    assert_eq!(out, [[[0x1B, 0x03, 0x00].as_slice(), &long[..20]].concat()]);
}

#[test]
fn no_notification_without_subscription() {
    let (mut srv, sock) = notify_fixture(Cccd::empty());
    assert!(srv.write_value(hdl(3), &[0x01]));
    assert!(sock.drain(&mut srv).is_empty());
}

#[test]
fn client_subscribes_via_ccc_write() {
    let (mut srv, sock) = notify_fixture(Cccd::empty());
    let rsp = sock.request(&mut srv, &[0x12, 0x04, 0x00, 0x01, 0x00]);
    assert_eq!(rsp, [vec![0x13]]);
    assert!(srv.write_value(hdl(3), &[0x07]));
    assert_eq!(sock.drain(&mut srv), [vec![0x1B, 0x03, 0x00, 0x07]]);
}

#[test]
fn indications_serialized() {
    let (mut srv, sock) = notify_fixture(Cccd::INDICATE);
    assert!(srv.write_value(hdl(3), &[0x01]));
    assert_eq!(sock.drain(&mut srv), [vec![0x1D, 0x03, 0x00, 0x01]]);

    // No second indication until the first is confirmed.
    assert!(srv.write_value(hdl(3), &[0x02]));
    assert!(sock.drain(&mut srv).is_empty());

    sock.rx.borrow_mut().push_back(vec![0x1E]);
    assert!(srv.read().unwrap());
    assert_eq!(sock.drain(&mut srv), [vec![0x1D, 0x03, 0x00, 0x02]]);
    sock.rx.borrow_mut().push_back(vec![0x1E]);
    assert!(srv.read().unwrap());
    assert!(sock.drain(&mut srv).is_empty());
}

#[test]
fn notify_and_indicate_both() {
    let (mut srv, sock) = notify_fixture(Cccd::NOTIFY | Cccd::INDICATE);
    assert!(srv.write_value(hdl(3), &[0x09]));
    assert_eq!(
        sock.drain(&mut srv),
        [
            vec![0x1B, 0x03, 0x00, 0x09],
            vec![0x1D, 0x03, 0x00, 0x09],
        ]
    );
}

#[test]
fn read_hook_veto() {
    let (mut srv, sock) = fixture();
    srv.set_will_read(Some(Box::new(|_, _, _, _| {
        Err(blehost::att::ErrorCode::InsufficientAuthorization)
    })));
    let rsp = sock.request(&mut srv, &[0x0A, 0x03, 0x00]);
    assert_eq!(rsp, [vec![0x01, 0x0A, 0x03, 0x00, 0x08]]);
}

#[test]
fn write_hook_veto() {
    let (mut srv, sock) = fixture();
    srv.set_will_write(Some(Box::new(|_, _, _, new| {
        if new.len() > 2 {
            Err(blehost::att::ErrorCode::InvalidAttributeValueLength)
        } else {
            Ok(())
        }
    })));
    let rsp = sock.request(&mut srv, &[0x12, 0x03, 0x00, 0x01, 0x02, 0x03]);
    assert_eq!(rsp, [vec![0x01, 0x12, 0x03, 0x00, 0x0D]]);
    assert_eq!(srv.db().get(hdl(3)).unwrap().value(), [0xAA]);

    let rsp = sock.request(&mut srv, &[0x12, 0x03, 0x00, 0x01, 0x02]);
    assert_eq!(rsp, [vec![0x13]]);
}

#[test]
fn write_pending_signal() {
    let (mut srv, sock) = fixture();
    let n = Rc::new(Cell::new(0));
    let m = Rc::clone(&n);
    srv.set_write_pending(Some(Box::new(move || m.set(m.get() + 1))));
    sock.request(&mut srv, &[0x0A, 0x03, 0x00]);
    assert_eq!(n.get(), 1);
    sock.request(&mut srv, &[0x0A, 0x03, 0x00]);
    assert_eq!(n.get(), 2);
}

#[test]
fn write_value_by_uuid() {
    let (mut srv, _sock) = fixture();
    assert!(srv.write_value_uuid(0xFFF1_u16.into(), &[0x42]));
    assert_eq!(srv.db().get(hdl(3)).unwrap().value(), [0x42]);
    assert!(!srv.write_value_uuid(0xDEAD_u16.into(), &[0x42]));
}
