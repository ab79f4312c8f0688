use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{Mutex, OwnedMutexGuard, watch};
use tracing::{debug, trace, warn};

use crate::transport::{BoxIo, TlsUpgrade, Transaction};

const READ_BUF_SIZE: usize = 8 * 1024;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Turn {
    serving: u64,
    closed: bool,
}

struct ReadState {
    io: Option<ReadHalf<BoxIo>>,
    buffer: BytesMut,
    eof: bool,
}

struct Shared {
    id: u64,
    reader: Arc<Mutex<ReadState>>,
    writer: Arc<Mutex<Option<WriteHalf<BoxIo>>>>,
    next_ticket: AtomicU64,
    turn: watch::Sender<Turn>,
    open: AtomicBool,
    in_flight: AtomicUsize,
    tls: Option<Arc<dyn TlsUpgrade>>,
}

impl Shared {
    fn mark_closed(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            debug!(connection = self.id, "closing connection");
        }
        self.turn.send_modify(|turn| turn.closed = true);
    }
}

/// A physical connection shared by pipelined transactions.
///
/// Cloning is cheap and yields another handle to the same connection.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    /// Wraps an established stream. `tls` is used by [`Transaction::upgrade`].
    pub fn from_io(io: BoxIo, tls: Option<Arc<dyn TlsUpgrade>>) -> Self {
        let (read, write) = tokio::io::split(io);
        let (turn, _) = watch::channel(Turn { serving: 0, closed: false });
        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        trace!(connection = id, "new connection");
        Self {
            shared: Arc::new(Shared {
                id,
                reader: Arc::new(Mutex::new(ReadState { io: Some(read), buffer: BytesMut::new(), eof: false })),
                writer: Arc::new(Mutex::new(Some(write))),
                next_ticket: AtomicU64::new(0),
                turn,
                open: AtomicBool::new(true),
                in_flight: AtomicUsize::new(0),
                tls,
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::Acquire)
    }

    /// Transactions created and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::Acquire)
    }

    /// Starts a new transaction on this connection.
    pub fn transaction(&self) -> ConnectionTransaction {
        self.shared.in_flight.fetch_add(1, Ordering::AcqRel);
        ConnectionTransaction {
            shared: Arc::clone(&self.shared),
            ticket: None,
            write_guard: None,
            read_guard: None,
            finished: false,
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.shared.id)
            .field("open", &self.is_open())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// One exchange on a [`Connection`].
///
/// Dropping a transaction that acquired a read ticket but never released it closes
/// the connection, because the responses queued behind it could no longer be told apart.
pub struct ConnectionTransaction {
    shared: Arc<Shared>,
    ticket: Option<u64>,
    write_guard: Option<OwnedMutexGuard<Option<WriteHalf<BoxIo>>>>,
    read_guard: Option<OwnedMutexGuard<ReadState>>,
    finished: bool,
}

impl ConnectionTransaction {
    pub fn connection_id(&self) -> u64 {
        self.shared.id
    }

    fn take_ticket(&mut self) -> u64 {
        *self.ticket.get_or_insert_with(|| self.shared.next_ticket.fetch_add(1, Ordering::AcqRel))
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.shared.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::NotConnected, "connection closed"))
        }
    }

    fn writer(&mut self) -> io::Result<&mut WriteHalf<BoxIo>> {
        self.write_guard
            .as_deref_mut()
            .and_then(Option::as_mut)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "write side not held"))
    }

    fn read_state(&mut self) -> io::Result<&mut ReadState> {
        self.read_guard.as_deref_mut().ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "read side not held"))
    }

    /// Whether the connection is serving this transaction's read ticket.
    fn turn_is_ours(&self) -> bool {
        let turn = *self.shared.turn.borrow();
        !turn.closed && self.ticket == Some(turn.serving)
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.shared.in_flight.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

#[async_trait]
impl Transaction for ConnectionTransaction {
    fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::Acquire)
    }

    fn is_writable(&self) -> bool {
        self.write_guard.is_some() && self.is_open()
    }

    fn is_readable(&self) -> bool {
        self.read_guard.is_some()
    }

    async fn start_write(&mut self) -> io::Result<()> {
        if self.write_guard.is_some() {
            return Ok(());
        }
        self.ensure_open()?;
        let guard = Arc::clone(&self.shared.writer).lock_owned().await;
        self.ensure_open()?;
        self.write_guard = Some(guard);
        let ticket = self.take_ticket();
        trace!(connection = self.shared.id, ticket, "acquired write lock");
        Ok(())
    }

    async fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.ensure_open()?;
        self.writer()?.write_all(bytes).await
    }

    async fn write_some(&mut self, bytes: &[u8]) -> io::Result<Option<usize>> {
        self.ensure_open()?;
        if self.read_guard.is_none() && self.turn_is_ours() {
            self.start_read().await?;
        }

        let id = self.shared.id;
        let Self { write_guard, read_guard, .. } = self;
        let writer = write_guard
            .as_deref_mut()
            .and_then(Option::as_mut)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "write side not held"))?;
        let Some(state) = read_guard.as_deref_mut() else {
            return writer.write(bytes).await.map(Some);
        };
        if !state.buffer.is_empty() {
            return Ok(None);
        }
        if state.eof {
            return writer.write(bytes).await.map(Some);
        }
        let Some(io) = state.io.as_mut() else {
            return writer.write(bytes).await.map(Some);
        };

        state.buffer.reserve(READ_BUF_SIZE);
        let progress = tokio::select! {
            biased;
            read = io.read_buf(&mut state.buffer) => Err(read?),
            written = writer.write(bytes) => Ok(written?),
        };
        match progress {
            Ok(written) => Ok(Some(written)),
            Err(0) => {
                state.eof = true;
                writer.write(bytes).await.map(Some)
            }
            Err(read) => {
                trace!(connection = id, read, "peer answered while writing");
                Ok(None)
            }
        }
    }

    async fn close_write(&mut self) -> io::Result<()> {
        if self.write_guard.is_none() {
            return Ok(());
        }
        let flushed = match self.writer() {
            Ok(writer) => writer.flush().await,
            Err(e) => Err(e),
        };
        self.write_guard = None;
        trace!(connection = self.shared.id, "released write lock");
        flushed
    }

    async fn start_read(&mut self) -> io::Result<()> {
        if self.read_guard.is_some() {
            return Ok(());
        }
        let ticket = self.take_ticket();
        let mut turns = self.shared.turn.subscribe();
        loop {
            let turn = *turns.borrow_and_update();
            if turn.closed {
                return Err(io::Error::new(io::ErrorKind::NotConnected, "connection closed"));
            }
            if turn.serving == ticket {
                break;
            }
            if turn.serving > ticket {
                return Err(io::Error::other("read turn already passed"));
            }
            turns.changed().await.map_err(|e| io::Error::new(io::ErrorKind::NotConnected, e))?;
        }
        self.read_guard = Some(Arc::clone(&self.shared.reader).lock_owned().await);
        trace!(connection = self.shared.id, ticket, "acquired read turn");
        Ok(())
    }

    async fn read_available(&mut self, max: usize) -> io::Result<Bytes> {
        self.ensure_open()?;
        let state = self.read_state()?;
        if state.buffer.is_empty() && !state.eof {
            let Some(io) = state.io.as_mut() else {
                return Ok(Bytes::new());
            };
            state.buffer.reserve(READ_BUF_SIZE);
            if io.read_buf(&mut state.buffer).await? == 0 {
                state.eof = true;
            }
        }
        let len = state.buffer.len().min(max);
        Ok(state.buffer.split_to(len).freeze())
    }

    fn unread(&mut self, bytes: Bytes) {
        if bytes.is_empty() {
            return;
        }
        match self.read_state() {
            Ok(state) => {
                let mut buffer = BytesMut::with_capacity(bytes.len() + state.buffer.len());
                buffer.extend_from_slice(&bytes);
                buffer.extend_from_slice(&state.buffer);
                state.buffer = buffer;
            }
            Err(_) => warn!(len = bytes.len(), "unread without holding the read turn, bytes dropped"),
        }
    }

    async fn eof(&mut self) -> io::Result<bool> {
        if !self.is_open() {
            return Ok(true);
        }
        let state = self.read_state()?;
        if !state.buffer.is_empty() {
            return Ok(false);
        }
        if !state.eof {
            let Some(io) = state.io.as_mut() else {
                return Ok(true);
            };
            state.buffer.reserve(READ_BUF_SIZE);
            if io.read_buf(&mut state.buffer).await? == 0 {
                state.eof = true;
            }
        }
        Ok(state.buffer.is_empty() && state.eof)
    }

    fn close_read(&mut self) {
        if self.read_guard.take().is_none() {
            return;
        }
        self.ticket = None;
        self.shared.turn.send_modify(|turn| turn.serving += 1);
        trace!(connection = self.shared.id, "released read turn");
        self.finish();
    }

    async fn close(&mut self) {
        self.shared.mark_closed();

        let writer = match self.write_guard.take() {
            Some(mut guard) => guard.take(),
            None => self.shared.writer.try_lock().ok().and_then(|mut guard| guard.take()),
        };
        if let Some(mut writer) = writer {
            if let Err(e) = writer.shutdown().await {
                trace!(connection = self.shared.id, error = %e, "shutdown failed");
            }
        }

        match self.read_guard.take() {
            Some(mut guard) => guard.io = None,
            None => {
                if let Ok(mut guard) = self.shared.reader.try_lock() {
                    guard.io = None;
                }
            }
        }
        self.ticket = None;
        self.finish();
    }

    async fn upgrade(&mut self, host: &str) -> io::Result<()> {
        self.ensure_open()?;
        let tls = self
            .shared
            .tls
            .clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Unsupported, "no tls upgrade configured"))?;

        let held_write = self.write_guard.is_some();
        let held_read = self.read_guard.is_some();
        let mut writer = match self.write_guard.take() {
            Some(guard) => guard,
            None => Arc::clone(&self.shared.writer).lock_owned().await,
        };
        let mut reader = match self.read_guard.take() {
            Some(guard) => guard,
            None => Arc::clone(&self.shared.reader).lock_owned().await,
        };

        let (Some(read), Some(write)) = (reader.io.take(), writer.take()) else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "connection closed"));
        };
        if !reader.buffer.is_empty() {
            warn!(len = reader.buffer.len(), "discarding bytes buffered before tls upgrade");
            reader.buffer.clear();
        }

        let io = tls.upgrade(read.unsplit(write), host).await?;
        let (read, write) = tokio::io::split(io);
        reader.io = Some(read);
        reader.eof = false;
        *writer = Some(write);
        debug!(connection = self.shared.id, host, "upgraded connection to tls");

        if held_write {
            self.write_guard = Some(writer);
        }
        if held_read {
            self.read_guard = Some(reader);
        }
        Ok(())
    }
}

impl Drop for ConnectionTransaction {
    fn drop(&mut self) {
        if self.ticket.is_some() && !self.finished {
            debug!(connection = self.shared.id, "transaction dropped before its response was read");
            self.shared.mark_closed();
        }
        self.finish();
    }
}

impl fmt::Debug for ConnectionTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionTransaction")
            .field("connection", &self.shared.id)
            .field("ticket", &self.ticket)
            .field("writable", &self.write_guard.is_some())
            .field("readable", &self.read_guard.is_some())
            .finish()
    }
}
