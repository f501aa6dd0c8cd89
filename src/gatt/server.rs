//! GATT server ([Vol 3] Part G, Section 4).

use std::collections::{BTreeMap, VecDeque};

use smallvec::SmallVec;
use structbuf::{StructBuf, Unpack};
use tracing::{debug, warn};

use crate::att::*;
use crate::gap::Uuid;
use crate::l2cap::Socket;

use super::*;

/// I/O callback result type.
pub type IoResult = std::result::Result<(), ErrorCode>;

/// Read hook invoked before an attribute value is returned to the client:
/// `(uuid, handle, value, offset)`.
pub type ReadHook = Box<dyn FnMut(Uuid, Handle, &[u8], u16) -> IoResult>;

/// Write hook invoked before an attribute value is replaced:
/// `(uuid, handle, old_value, new_value)`.
pub type WriteHook = Box<dyn FnMut(Uuid, Handle, &[u8], &[u8]) -> IoResult>;

/// Callback invoked after a client write was committed:
/// `(uuid, handle, value)`.
pub type WriteDoneHook = Box<dyn FnMut(Uuid, Handle, &[u8])>;

/// Server configuration.
#[derive(Clone, Copy, Debug)]
pub struct ServerOpts {
    /// MTU announced during MTU exchange.
    pub preferred_mtu: Mtu,
    /// Prepare write queue bound ([Vol 3] Part F, Section 3.4.6.1).
    pub max_prepared_writes: usize,
}

impl Default for ServerOpts {
    #[inline]
    fn default() -> Self {
        Self {
            preferred_mtu: Mtu::MIN,
            max_prepared_writes: 50,
        }
    }
}

/// Buffered partial write pending atomic commit via Execute Write.
#[derive(Clone, Debug)]
struct PreparedWrite {
    handle: Handle,
    offset: u16,
    value: Vec<u8>,
}

/// GATT server providing services to a single client.
///
/// The server is single-threaded cooperative: the socket is touched only
/// inside [`Server::read`] and [`Server::write`], and all callbacks run
/// synchronously on the caller's context. Callbacks must not re-enter the
/// server.
pub struct Server<S: Socket> {
    conn: Connection<S>,
    db: Database,
    max_prepared: usize,
    prep: SmallVec<[PreparedWrite; 4]>,
    post_write: Vec<(Handle, Vec<u8>)>,
    ind_queue: VecDeque<(Handle, Vec<u8>)>,
    will_read: Option<ReadHook>,
    will_write: Option<WriteHook>,
    did_write: Option<WriteDoneHook>,
}

impl<S: Socket> Server<S> {
    /// Creates a GATT server serving `db` over `sock` with default options.
    #[inline]
    #[must_use]
    pub fn new(sock: S, db: Database) -> Self {
        Self::with_opts(sock, db, ServerOpts::default())
    }

    /// Creates a GATT server with explicit options.
    #[must_use]
    pub fn with_opts(sock: S, db: Database, opts: ServerOpts) -> Self {
        Self {
            conn: Connection::new(sock, opts.preferred_mtu),
            db,
            max_prepared: opts.max_prepared_writes,
            prep: SmallVec::new(),
            post_write: Vec::new(),
            ind_queue: VecDeque::new(),
            will_read: None,
            will_write: None,
            did_write: None,
        }
    }

    /// Returns the current MTU.
    #[inline(always)]
    #[must_use]
    pub const fn mtu(&self) -> Mtu {
        self.conn.mtu()
    }

    /// Returns the MTU announced during MTU exchange.
    #[inline(always)]
    #[must_use]
    pub const fn preferred_mtu(&self) -> Mtu {
        self.conn.preferred_mtu()
    }

    /// Returns the prepare write queue bound.
    #[inline(always)]
    #[must_use]
    pub const fn max_prepared_writes(&self) -> usize {
        self.max_prepared
    }

    /// Returns the attribute database.
    #[inline(always)]
    #[must_use]
    pub const fn db(&self) -> &Database {
        &self.db
    }

    /// Returns the mutable attribute database. Local writes that should
    /// trigger notifications must go through [`Server::write_value`].
    #[inline(always)]
    #[must_use]
    pub fn db_mut(&mut self) -> &mut Database {
        &mut self.db
    }

    /// Sets the hook invoked before an attribute read is served.
    #[inline]
    pub fn set_will_read(&mut self, f: Option<ReadHook>) {
        self.will_read = f;
    }

    /// Sets the hook invoked before an attribute write is committed.
    #[inline]
    pub fn set_will_write(&mut self, f: Option<WriteHook>) {
        self.will_write = f;
    }

    /// Sets the callback invoked after a client write was committed.
    #[inline]
    pub fn set_did_write(&mut self, f: Option<WriteDoneHook>) {
        self.did_write = f;
    }

    /// Sets the callback invoked whenever the send queue transitions from
    /// empty to non-empty.
    #[inline]
    pub fn set_write_pending(&mut self, f: Option<Box<dyn FnMut()>>) {
        self.conn.on_write_pending(f);
    }

    /// Performs one socket read and dispatches the received PDU. Returns
    /// whether data was processed.
    pub fn read(&mut self) -> Result<bool> {
        self.expire_indication();
        let Some(inbound) = self.conn.read()? else {
            return Ok(false);
        };
        match inbound {
            Inbound::Pdu(op, frame) => self.handle_pdu(op, &frame),
            Inbound::Done(cont, op, _) => self.complete(cont, op),
            Inbound::Handled => {}
        }
        Ok(true)
    }

    /// Drains one pending send. Returns whether more sends remain queued.
    pub fn write(&mut self) -> Result<bool> {
        self.expire_indication();
        self.conn.write()
    }

    /// Commits a local write and routes notifications/indications to a
    /// subscribed client. Returns whether the attribute exists.
    pub fn write_value(&mut self, hdl: Handle, value: &[u8]) -> bool {
        if !self.db.write(hdl, value) {
            return false;
        }
        self.value_changed(hdl, value);
        true
    }

    /// Commits a local write to the first attribute of the specified type.
    /// Returns whether such an attribute exists.
    pub fn write_value_uuid(&mut self, uuid: Uuid, value: &[u8]) -> bool {
        let Some(hdl) = (self.db.iter())
            .find(|at| at.uuid() == uuid)
            .map(Attribute::handle)
        else {
            return false;
        };
        self.write_value(hdl, value)
    }

    /// Handles one client PDU.
    fn handle_pdu(&mut self, op: Opcode, frame: &[u8]) {
        use Opcode::*;
        let r = match op {
            ExchangeMtuReq => self.exchange_mtu(frame),
            FindInformationReq => self.find_information(frame),
            FindByTypeValueReq => self.find_by_type_value(frame),
            ReadByTypeReq => self.read_by_type(frame),
            ReadReq => self.read_req(frame),
            ReadBlobReq => self.read_blob(frame),
            ReadMultipleReq => self.read_multiple(frame),
            ReadByGroupTypeReq => self.read_by_group_type(frame),
            WriteReq => self.write_req(frame),
            WriteCmd => {
                if let Err(e) = self.write_cmd(frame) {
                    self.conn.send_rsp(Err(e));
                }
                self.flush_post_writes();
                return;
            }
            PrepareWriteReq => self.prepare_write(frame),
            ExecuteWriteReq => self.execute_write(frame),
            _ => op.err(ErrorCode::RequestNotSupported),
        };
        self.conn.send_rsp(r);
        // The response goes out ahead of any notifications the write
        // triggered.
        self.flush_post_writes();
    }

    /// Runs the post-write path for writes committed by the current
    /// request, in ascending handle order for Execute Write.
    fn flush_post_writes(&mut self) {
        for (hdl, value) in std::mem::take(&mut self.post_write) {
            self.value_changed(hdl, &value);
            self.notify_did_write(hdl, &value);
        }
    }

    /// Completes a pending exchange.
    fn complete(&mut self, cont: Continuation, op: Opcode) {
        match cont {
            Continuation::Confirm(hdl) => {
                if op == Opcode::HandleValueCfm {
                    debug!("Indication for {hdl} confirmed");
                } else {
                    warn!("Indication for {hdl} rejected: {op}");
                }
                self.next_indication();
            }
        }
    }

    /// Drops a timed-out indication and resumes the queue.
    fn expire_indication(&mut self) {
        if let Some(Continuation::Confirm(_)) = self.conn.take_expired() {
            self.next_indication();
        }
    }

    /// Sends the next queued indication if none is outstanding.
    fn next_indication(&mut self) {
        if self.conn.busy() {
            return;
        }
        if let Some((hdl, value)) = self.ind_queue.pop_front() {
            let ind = HandleValueInd {
                handle: hdl.into(),
                value,
            };
            self.conn.send_request(&ind, Continuation::Confirm(hdl));
        }
    }

    /// Handles `ATT_EXCHANGE_MTU_REQ` ([Vol 3] Part F, Section 3.4.2.1).
    fn exchange_mtu(&mut self, frame: &[u8]) -> RspResult<StructBuf> {
        let pdu: ExchangeMtuReq = parse(frame)?;
        debug!("Client preferred MTU: {}", pdu.mtu);
        let preferred = self.conn.preferred_mtu();
        self.conn.set_mtu(Mtu::effective(pdu.mtu, preferred));
        Ok(ExchangeMtuRsp {
            mtu: preferred.raw(),
        }
        .encode())
    }

    /// Handles `ATT_FIND_INFORMATION_REQ` ([Vol 3] Part G, Section 4.7.1).
    fn find_information(&mut self, frame: &[u8]) -> RspResult<StructBuf> {
        let pdu: FindInformationReq = parse(frame)?;
        let hdls = pdu.range()?;
        let found = self.db.find_information(hdls);
        if found.is_empty() {
            return FindInformationReq::OPCODE.hdl_err(ErrorCode::AttributeNotFound, hdls.start());
        }
        let it = found.into_iter().map(|(h, u)| (u16::from(h), u));
        let rsp = FindInformationRsp::pack(self.conn.mtu(), it).expect("empty response");
        Ok(rsp.encode())
    }

    /// Handles `ATT_FIND_BY_TYPE_VALUE_REQ` ([Vol 3] Part G, Section 4.4.2).
    fn find_by_type_value(&mut self, frame: &[u8]) -> RspResult<StructBuf> {
        let pdu: FindByTypeValueReq = parse(frame)?;
        let hdls = pdu.range()?;
        let found = self.db.find_by_type_value(hdls, pdu.typ, &pdu.value);
        if found.is_empty() {
            return FindByTypeValueReq::OPCODE.hdl_err(ErrorCode::AttributeNotFound, hdls.start());
        }
        let it = found.into_iter().map(|(f, e)| FoundGroup {
            found: f.into(),
            end: e.into(),
        });
        let rsp = FindByTypeValueRsp::pack(self.conn.mtu(), it).expect("empty response");
        Ok(rsp.encode())
    }

    /// Handles `ATT_READ_BY_TYPE_REQ` ([Vol 3] Part G, Sections 4.5.1, 4.6.1,
    /// and 4.8.2).
    fn read_by_type(&mut self, frame: &[u8]) -> RspResult<StructBuf> {
        let op = ReadByTypeReq::OPCODE;
        let pdu: ReadByTypeReq = parse(frame)?;
        let hdls = pdu.range()?;
        let sec = self.conn.security();
        let attrs = self.db.read_by_type(hdls, pdu.typ);
        // The first inaccessible attribute fails the request; later ones
        // truncate the result ([Vol 3] Part F, Section 3.4.4.1).
        let mut out: Vec<(u16, &[u8])> = Vec::new();
        for at in attrs {
            let r = at.perms().test(Access::Read, sec).and_then(|()| {
                self.will_read.as_mut().map_or(Ok(()), |f| {
                    f(at.uuid(), at.handle(), at.value(), 0)
                })
            });
            match r {
                Ok(()) => out.push((at.handle().into(), at.value())),
                Err(e) if out.is_empty() => return op.hdl_err(e, at.handle()),
                Err(_) => break,
            }
        }
        if out.is_empty() {
            return op.hdl_err(ErrorCode::AttributeNotFound, hdls.start());
        }
        let rsp = ReadByTypeRsp::pack(self.conn.mtu(), out).expect("empty response");
        Ok(rsp.encode())
    }

    /// Handles `ATT_READ_BY_GROUP_TYPE_REQ` ([Vol 3] Part G, Section 4.4.1).
    fn read_by_group_type(&mut self, frame: &[u8]) -> RspResult<StructBuf> {
        let op = ReadByGroupTypeReq::OPCODE;
        let pdu: ReadByGroupTypeReq = parse(frame)?;
        let hdls = pdu.range()?;
        if pdu.typ != Declaration::PrimaryService.uuid()
            && pdu.typ != Declaration::SecondaryService.uuid()
        {
            return op.hdl_err(ErrorCode::UnsupportedGroupType, hdls.start());
        }
        let groups = self.db.read_by_group_type(hdls, pdu.typ);
        if groups.is_empty() {
            return op.hdl_err(ErrorCode::AttributeNotFound, hdls.start());
        }
        let it = (groups.into_iter()).map(|(r, v)| (u16::from(r.start()), u16::from(r.end()), v));
        let rsp = ReadByGroupTypeRsp::pack(self.conn.mtu(), it).expect("empty response");
        Ok(rsp.encode())
    }

    /// Handles `ATT_READ_REQ` ([Vol 3] Part G, Section 4.8.1).
    fn read_req(&mut self, frame: &[u8]) -> RspResult<StructBuf> {
        let pdu: ReadReq = parse(frame)?;
        let hdl = pdu.handle()?;
        let value = self.read_value(ReadReq::OPCODE, hdl, 0)?;
        let n = value.len().min(usize::from(self.conn.mtu()) - 1);
        Ok(ReadRsp {
            value: value[..n].to_vec(),
        }
        .encode())
    }

    /// Handles `ATT_READ_BLOB_REQ` ([Vol 3] Part G, Section 4.8.3).
    fn read_blob(&mut self, frame: &[u8]) -> RspResult<StructBuf> {
        let op = ReadBlobReq::OPCODE;
        let pdu: ReadBlobReq = parse(frame)?;
        let hdl = pdu.handle()?;
        let value = self.read_value(op, hdl, pdu.offset)?;
        let mtu = usize::from(self.conn.mtu());
        if value.len() <= mtu - 1 {
            return op.hdl_err(ErrorCode::AttributeNotLong, hdl);
        }
        let off = usize::from(pdu.offset);
        if off > value.len() {
            return op.hdl_err(ErrorCode::InvalidOffset, hdl);
        }
        let part = &value[off..];
        let n = part.len().min(mtu - 1);
        Ok(ReadBlobRsp {
            value: part[..n].to_vec(),
        }
        .encode())
    }

    /// Handles `ATT_READ_MULTIPLE_REQ` ([Vol 3] Part G, Section 4.8.4).
    fn read_multiple(&mut self, frame: &[u8]) -> RspResult<StructBuf> {
        let op = ReadMultipleReq::OPCODE;
        let pdu: ReadMultipleReq = parse(frame)?;
        let mut values = Vec::new();
        for &h in &pdu.handles {
            let hdl = check_handle(op, h)?;
            values.extend_from_slice(&self.read_value(op, hdl, 0)?);
        }
        values.truncate(usize::from(self.conn.mtu()) - 1);
        Ok(ReadMultipleRsp { values }.encode())
    }

    /// Handles `ATT_WRITE_REQ` ([Vol 3] Part G, Section 4.9.3).
    fn write_req(&mut self, frame: &[u8]) -> RspResult<StructBuf> {
        let pdu: WriteReq = parse(frame)?;
        let hdl = pdu.handle()?;
        self.commit_write(WriteReq::OPCODE, hdl, &pdu.value)?;
        Ok(WriteRsp.encode())
    }

    /// Handles `ATT_WRITE_CMD` ([Vol 3] Part G, Section 4.9.1). Failures
    /// produce no response.
    fn write_cmd(&mut self, frame: &[u8]) -> RspResult<()> {
        let pdu: WriteCmd = parse(frame)?;
        let hdl = pdu.handle()?;
        self.commit_write(WriteCmd::OPCODE, hdl, &pdu.value)
    }

    /// Handles `ATT_PREPARE_WRITE_REQ` ([Vol 3] Part G, Section 4.9.4).
    fn prepare_write(&mut self, frame: &[u8]) -> RspResult<StructBuf> {
        let op = PrepareWriteReq::OPCODE;
        let pdu: PrepareWriteReq = parse(frame)?;
        let hdl = pdu.handle()?;
        let Some(at) = self.db.get(hdl) else {
            return op.hdl_err(ErrorCode::InvalidHandle, hdl);
        };
        if let Err(e) = at.perms().test(Access::Write, self.conn.security()) {
            return op.hdl_err(e, hdl);
        }
        if self.prep.len() >= self.max_prepared {
            return op.hdl_err(ErrorCode::PrepareQueueFull, hdl);
        }
        self.prep.push(PreparedWrite {
            handle: hdl,
            offset: pdu.offset,
            value: pdu.value.clone(),
        });
        Ok(PrepareWriteRsp {
            handle: pdu.handle,
            offset: pdu.offset,
            value: pdu.value,
        }
        .encode())
    }

    /// Handles `ATT_EXECUTE_WRITE_REQ` ([Vol 3] Part G, Section 4.9.4).
    fn execute_write(&mut self, frame: &[u8]) -> RspResult<StructBuf> {
        let op = ExecuteWriteReq::OPCODE;
        let pdu: ExecuteWriteReq = parse(frame)?;
        let queue = std::mem::take(&mut self.prep);
        if pdu.flags == ExecWriteFlag::Cancel {
            debug!("Cancelled {} prepared write(s)", queue.len());
            return Ok(ExecuteWriteRsp.encode());
        }
        // Reassemble one value per handle by concatenating the parts in
        // queue order; commit in ascending handle order.
        let mut merged: BTreeMap<Handle, Vec<u8>> = BTreeMap::new();
        for w in queue {
            merged.entry(w.handle).or_default().extend_from_slice(&w.value);
        }
        for (hdl, value) in merged {
            self.commit_prepared(op, hdl, &value)?;
            self.post_write.push((hdl, value));
        }
        Ok(ExecuteWriteRsp.encode())
    }

    /// Reads an attribute value after passing permission checks and the
    /// application read hook.
    fn read_value(&mut self, op: Opcode, hdl: Handle, off: u16) -> RspResult<Vec<u8>> {
        let Some(at) = self.db.get(hdl) else {
            return op.hdl_err(ErrorCode::InvalidHandle, hdl);
        };
        if let Err(e) = at.perms().test(Access::Read, self.conn.security()) {
            return op.hdl_err(e, hdl);
        }
        if let Some(f) = self.will_read.as_mut() {
            if let Err(e) = f(at.uuid(), hdl, at.value(), off) {
                return op.hdl_err(e, hdl);
            }
        }
        Ok(at.value().to_vec())
    }

    /// Commits a client write after passing permission checks and the
    /// application write hook, deferring the post-write path until the
    /// response is queued.
    fn commit_write(&mut self, op: Opcode, hdl: Handle, value: &[u8]) -> RspResult<()> {
        self.commit_prepared(op, hdl, value)?;
        self.post_write.push((hdl, value.to_vec()));
        Ok(())
    }

    /// Commits a single write without the post-write path.
    fn commit_prepared(&mut self, op: Opcode, hdl: Handle, value: &[u8]) -> RspResult<()> {
        let Some(at) = self.db.get(hdl) else {
            return op.hdl_err(ErrorCode::InvalidHandle, hdl);
        };
        if let Err(e) = at.perms().test(Access::Write, self.conn.security()) {
            return op.hdl_err(e, hdl);
        }
        if let Some(f) = self.will_write.as_mut() {
            if let Err(e) = f(at.uuid(), hdl, at.value(), value) {
                return op.hdl_err(e, hdl);
            }
        }
        self.db.write(hdl, value);
        Ok(())
    }

    /// Invokes the `did_write` callback.
    fn notify_did_write(&mut self, hdl: Handle, value: &[u8]) {
        let Some(f) = self.did_write.as_mut() else {
            return;
        };
        let Some(at) = self.db.get(hdl) else {
            return;
        };
        f(at.uuid(), hdl, value);
    }

    /// Routes a committed characteristic value change to a subscribed
    /// client ([Vol 3] Part G, Sections 4.10 and 4.11).
    fn value_changed(&mut self, hdl: Handle, value: &[u8]) {
        let Some(info) = self.db.characteristic_for(hdl) else {
            return;
        };
        if info.vhdl != hdl {
            return;
        }
        let ccc = DescriptorType::ClientCharacteristicConfiguration.uuid();
        let Some(desc) = info.descriptors.iter().find(|at| at.uuid() == ccc) else {
            return;
        };
        let cfg = Cccd::from_bits_truncate(desc.value().unpack().u16());
        if cfg.is_empty() {
            return;
        }
        debug!("Value change on {} <{}>", hdl, info.uuid);
        let n = value.len().min(usize::from(self.conn.mtu()) - 3);
        if cfg.contains(Cccd::NOTIFY) && info.props.contains(CharProps::NOTIFY) {
            self.conn.send(&HandleValueNtf {
                handle: hdl.into(),
                value: value[..n].to_vec(),
            });
        }
        if cfg.contains(Cccd::INDICATE) && info.props.contains(CharProps::INDICATE) {
            // Indications are serialized: one unconfirmed indication at a
            // time ([Vol 3] Part F, Section 3.3.3).
            if self.conn.busy() {
                self.ind_queue.push_back((hdl, value[..n].to_vec()));
            } else {
                let ind = HandleValueInd {
                    handle: hdl.into(),
                    value: value[..n].to_vec(),
                };
                self.conn.send_request(&ind, Continuation::Confirm(hdl));
            }
        }
    }
}

/// Decodes a request PDU, mapping failure to an `InvalidPdu` error response.
#[inline]
fn parse<T: Pdu>(frame: &[u8]) -> RspResult<T> {
    T::decode(frame)
        .ok_or_else(|| ErrorRsp::new(T::OPCODE as u8, None, ErrorCode::InvalidPdu))
}
