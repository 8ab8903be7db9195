// Reconnecting many-to-many TCP fabric.
//
// Architecture: thread-per-reader with a shared connection table.
//
// - **Accept thread**: non-blocking `TcpListener::accept()` loop. Exits
//   silently once the mesh is closed; other accept errors are logged and the
//   loop continues.
// - **Reader threads** (one per connection): call `wire::read_line()` in a
//   loop, decode the envelope, and hand it to the registered sink. Malformed
//   lines are logged and skipped — never a reason to drop the link. EOF or a
//   read error ends the thread; if the peer has a known endpoint a
//   reconnector takes over.
// - **Reconnector threads** (at most one per missing peer): dial with
//   exponential backoff, doubling from `retry_delay` up to `max_backoff`. A
//   successful dial resets the delay, installs the connection, spawns a
//   reader, and exits.
//
// Writers are not threads: `send()` runs on the caller, serialized by a
// per-connection lock around the socket. Each message is one newline-
// terminated buffer handed to a single `write_all`, so records are never
// interleaved and per-link FIFO comes straight from TCP.
//
// Identity: the table is keyed by `PeerId`, never by remote TCP address. An
// accepted connection is anonymous until its first parsed envelope names a
// `source`; it is then registered, unless that peer already has a live
// connection (the socket keeps serving reads anonymously in that case).
// The table mutex is held only for map updates — never across socket I/O.

use std::collections::HashMap;
use std::io::{self, BufReader, Write};
use std::net::{Shutdown as SocketShutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, error, info, warn};

use gambit_protocol::{decode_line, encode_line, read_line, Envelope, PeerId};

/// Initial reconnect backoff.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Backoff ceiling for stalled reconnectors.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(120);

/// How often the accept loop re-checks the close flag.
const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// Handshake hook invoked for every inbound connection before it joins the
/// mesh. Returning an error closes the socket.
pub type AcceptHook = Box<dyn Fn(&TcpStream) -> io::Result<()> + Send + Sync>;

/// Hook invoked exactly once, on the first inbound connection of the mesh's
/// lifetime.
pub type FirstAcceptHook = Box<dyn Fn() + Send + Sync>;

/// Sink every decoded inbound envelope is delivered to. Dispatch is serial
/// per connection; the sink must not block.
pub type MessageSink = Arc<dyn Fn(Envelope) + Send + Sync>;

/// Time source for outbound envelope timestamps (unix seconds). Injected so
/// tests can pin the stamped value; defaults to the system clock.
pub type ClockFn = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Errors surfaced by mesh send paths.
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("not connected to peer {0}")]
    NotConnected(PeerId),
    #[error("mesh is closed")]
    Closed,
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to send to {peer}: {source}")]
    Write {
        peer: PeerId,
        #[source]
        source: io::Error,
    },
}

/// Aggregate failure from a broadcast: every peer was attempted, these are
/// the ones that failed.
#[derive(Debug, thiserror::Error)]
#[error("broadcast failed for {} peer(s)", failures.len())]
pub struct BroadcastError {
    pub failures: Vec<(PeerId, MeshError)>,
}

impl BroadcastError {
    /// The peer ids that did not receive the message.
    pub fn failed_peers(&self) -> Vec<&PeerId> {
        self.failures.iter().map(|(id, _)| id).collect()
    }
}

/// Options for constructing a [`PeerMesh`].
pub struct MeshConfig {
    pub local_id: PeerId,
    /// Bind address. Port 0 lets the OS pick; see [`PeerMesh::local_addr`].
    pub listen_addr: String,
    pub retry_delay: Duration,
    pub max_backoff: Duration,
    pub on_accept: Option<AcceptHook>,
    pub on_first_accept: Option<FirstAcceptHook>,
    /// Stamps outbound envelopes.
    pub clock: ClockFn,
}

impl MeshConfig {
    pub fn new(local_id: PeerId, listen_addr: impl Into<String>) -> Self {
        Self {
            local_id,
            listen_addr: listen_addr.into(),
            retry_delay: DEFAULT_RETRY_DELAY,
            max_backoff: DEFAULT_MAX_BACKOFF,
            on_accept: None,
            on_first_accept: None,
            clock: Arc::new(system_unix_now),
        }
    }
}

/// One live connection: write half behind its lock, plus a control clone
/// used only to shut the socket down (unblocking a reader or a stuck
/// writer without taking the write lock).
struct Conn {
    writer: Mutex<TcpStream>,
    ctrl: TcpStream,
}

impl Conn {
    fn shutdown(&self) {
        let _ = self.ctrl.shutdown(SocketShutdown::Both);
    }
}

#[derive(Default)]
struct PeerSlot {
    conn: Option<Arc<Conn>>,
    endpoint: String,
    /// True while a reconnector thread owns this peer. At most one exists.
    reconnecting: bool,
}

struct Table {
    peers: HashMap<PeerId, PeerSlot>,
    /// Accepted connections that have not yet named their source.
    anonymous: Vec<Arc<Conn>>,
    accepted: u64,
}

/// Close signal: a flag under a condvar so backoff sleeps wake promptly.
struct CloseSignal {
    closed: Mutex<bool>,
    cv: Condvar,
}

impl CloseSignal {
    fn new() -> Self {
        Self {
            closed: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    fn trigger(&self) {
        *self.closed.lock().unwrap() = true;
        self.cv.notify_all();
    }

    /// Sleep up to `timeout`. Returns true if the mesh closed meanwhile.
    fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut closed = self.closed.lock().unwrap();
        while !*closed {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self.cv.wait_timeout(closed, deadline - now).unwrap();
            closed = guard;
        }
        true
    }
}

struct MeshInner {
    local_id: PeerId,
    local_addr: SocketAddr,
    retry_delay: Duration,
    max_backoff: Duration,
    closed: AtomicBool,
    close_signal: CloseSignal,
    table: Mutex<Table>,
    on_accept: Option<AcceptHook>,
    on_first_accept: Option<FirstAcceptHook>,
    sink: Mutex<MessageSink>,
    clock: ClockFn,
}

/// A long-lived, full-duplex, line-delimited JSON message bus over TCP.
///
/// Cheap to clone; all clones share the same listener and connection table.
/// Created when the local node enters a session, torn down by [`close`].
///
/// [`close`]: PeerMesh::close
#[derive(Clone)]
pub struct PeerMesh {
    inner: Arc<MeshInner>,
}

impl PeerMesh {
    /// Bind the listener and start the accept thread.
    pub fn bind(config: MeshConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)?;
        let local_addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let inner = Arc::new(MeshInner {
            local_id: config.local_id,
            local_addr,
            retry_delay: config.retry_delay,
            max_backoff: config.max_backoff,
            closed: AtomicBool::new(false),
            close_signal: CloseSignal::new(),
            table: Mutex::new(Table {
                peers: HashMap::new(),
                anonymous: Vec::new(),
                accepted: 0,
            }),
            on_accept: config.on_accept,
            on_first_accept: config.on_first_accept,
            sink: Mutex::new(Arc::new(|_| {})),
            clock: config.clock,
        });

        let accept_inner = inner.clone();
        thread::spawn(move || accept_loop(accept_inner, listener));

        info!(addr = %local_addr, id = %inner.local_id, "mesh listening");
        Ok(Self { inner })
    }

    pub fn local_id(&self) -> &PeerId {
        &self.inner.local_id
    }

    /// The actually-bound listen address (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    /// Record `endpoint` for `peer_id` and ensure a reconnector is dialing
    /// if no connection is live. Idempotent: repeat calls replace the
    /// endpoint and leave an existing connection alone.
    pub fn add_peer(&self, peer_id: PeerId, endpoint: impl Into<String>) {
        if self.inner.is_closed() {
            return;
        }
        let endpoint = endpoint.into();
        let mut table = self.inner.table.lock().unwrap();
        let slot = table.peers.entry(peer_id.clone()).or_default();
        slot.endpoint = endpoint;
        if slot.conn.is_none() && !slot.reconnecting {
            slot.reconnecting = true;
            let inner = self.inner.clone();
            thread::spawn(move || reconnect_loop(inner, peer_id));
        }
    }

    /// Serialize `{kind, source, timestamp, payload}` as one JSON line and
    /// write it atomically to the peer's connection.
    ///
    /// With no live connection this fails with [`MeshError::NotConnected`]
    /// and schedules a reconnect from the last-known endpoint. A write error
    /// drops the connection, schedules a reconnect, and is surfaced once.
    pub fn send(&self, peer_id: &PeerId, kind: &str, payload: &[u8]) -> Result<(), MeshError> {
        if self.inner.is_closed() {
            return Err(MeshError::Closed);
        }

        let conn = {
            let mut table = self.inner.table.lock().unwrap();
            let Some(slot) = table.peers.get_mut(peer_id) else {
                return Err(MeshError::NotConnected(peer_id.clone()));
            };
            match slot.conn.clone() {
                Some(conn) => conn,
                None => {
                    self.inner.ensure_reconnect(peer_id, slot);
                    return Err(MeshError::NotConnected(peer_id.clone()));
                }
            }
        };

        let envelope = Envelope {
            timestamp: (self.inner.clock)(),
            source: self.inner.local_id.clone(),
            kind: kind.to_owned(),
            payload: payload.to_vec(),
        };
        let line = encode_line(&envelope)?;

        let result = {
            let mut writer = conn.writer.lock().unwrap();
            writer.write_all(&line)
        };

        if let Err(err) = result {
            error!(peer = %peer_id, %err, "send failed, reconnecting");
            self.inner.drop_connection(peer_id, &conn, true);
            return Err(MeshError::Write {
                peer: peer_id.clone(),
                source: err,
            });
        }

        debug!(peer = %peer_id, kind, "sent message");
        Ok(())
    }

    /// Send to every known peer. Failures are aggregated, never short-
    /// circuited: the composite error names exactly the peers whose
    /// individual send failed.
    pub fn broadcast(&self, kind: &str, payload: &[u8]) -> Result<(), BroadcastError> {
        let ids: Vec<PeerId> = {
            let table = self.inner.table.lock().unwrap();
            table.peers.keys().cloned().collect()
        };

        let mut failures = Vec::new();
        for id in ids {
            if let Err(err) = self.send(&id, kind, payload) {
                failures.push((id, err));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(BroadcastError { failures })
        }
    }

    /// Replace the message sink. Envelopes are dispatched serially per
    /// connection.
    pub fn register_sink(&self, sink: impl Fn(Envelope) + Send + Sync + 'static) {
        *self.inner.sink.lock().unwrap() = Arc::new(sink);
    }

    /// Tear the mesh down: stop accepting, close every live connection
    /// (unblocking their readers), and cancel all reconnectors. Idempotent;
    /// every thread exits within one poll interval of the close signal.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.close_signal.trigger();

        let conns: Vec<Arc<Conn>> = {
            let mut table = self.inner.table.lock().unwrap();
            let mut conns: Vec<Arc<Conn>> = table.anonymous.drain(..).collect();
            for slot in table.peers.values_mut() {
                if let Some(conn) = slot.conn.take() {
                    conns.push(conn);
                }
            }
            conns
        };
        for conn in conns {
            conn.shutdown();
        }

        info!(id = %self.inner.local_id, "mesh closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl MeshInner {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Start a reconnector for `peer_id` if its slot has an endpoint and no
    /// reconnector is already running. Caller holds the table lock.
    fn ensure_reconnect(self: &Arc<Self>, peer_id: &PeerId, slot: &mut PeerSlot) {
        if self.is_closed() || slot.reconnecting {
            return;
        }
        if slot.endpoint.is_empty() {
            warn!(peer = %peer_id, "no endpoint recorded, cannot reconnect");
            return;
        }
        slot.reconnecting = true;
        let inner = self.clone();
        let peer_id = peer_id.clone();
        thread::spawn(move || reconnect_loop(inner, peer_id));
    }

    /// Install a dialed connection for `peer_id`, displacing (and shutting
    /// down) any previous one.
    fn install_dialed(self: &Arc<Self>, peer_id: &PeerId, conn: &Arc<Conn>) {
        let displaced = {
            let mut table = self.table.lock().unwrap();
            let slot = table.peers.entry(peer_id.clone()).or_default();
            slot.conn.replace(conn.clone())
        };
        if let Some(old) = displaced {
            debug!(peer = %peer_id, "displacing stale connection");
            old.shutdown();
        }
    }

    /// Register an inbound connection under the peer id its first envelope
    /// named — but only if that peer has no live connection. With one
    /// already live (both sides dialed each other), the inbound socket keeps
    /// dispatching reads anonymously; killing a healthy link would lose
    /// whatever is in flight on it.
    fn install_inbound(self: &Arc<Self>, peer_id: &PeerId, conn: &Arc<Conn>) -> bool {
        let mut table = self.table.lock().unwrap();
        let slot = table.peers.entry(peer_id.clone()).or_default();
        if slot.conn.is_some() {
            return false;
        }
        slot.conn = Some(conn.clone());
        table.anonymous.retain(|c| !Arc::ptr_eq(c, conn));
        true
    }

    /// Remove `conn` from the table if it is still the live connection for
    /// `peer_id`, optionally scheduling a reconnect. An inbound-only peer
    /// (no recorded endpoint) cannot be redialed and is dropped outright.
    fn drop_connection(self: &Arc<Self>, peer_id: &PeerId, conn: &Arc<Conn>, reconnect: bool) {
        conn.shutdown();
        let mut table = self.table.lock().unwrap();
        let Some(slot) = table.peers.get_mut(peer_id) else {
            return;
        };
        let is_current = slot
            .conn
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, conn));
        if !is_current {
            return;
        }
        slot.conn = None;
        if !reconnect {
            return;
        }
        if slot.endpoint.is_empty() {
            let reconnecting = slot.reconnecting;
            if !reconnecting {
                debug!(peer = %peer_id, "dropping inbound-only peer");
                table.peers.remove(peer_id);
            }
        } else {
            self.ensure_reconnect(peer_id, slot);
        }
    }

    fn dispatch(&self, envelope: Envelope) {
        let sink = self.sink.lock().unwrap().clone();
        sink(envelope);
    }
}

/// Accept loop. Runs on its own thread until the mesh closes.
fn accept_loop(inner: Arc<MeshInner>, listener: TcpListener) {
    loop {
        if inner.is_closed() {
            break;
        }
        match listener.accept() {
            Ok((stream, addr)) => {
                if stream.set_nonblocking(false).is_err() {
                    continue;
                }
                handle_accept(&inner, stream, addr);
            }
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {
                if inner.close_signal.wait(ACCEPT_POLL) {
                    break;
                }
            }
            Err(err) => {
                if inner.is_closed() {
                    break;
                }
                error!(%err, "failed to accept connection");
            }
        }
    }
    debug!(id = %inner.local_id, "accept loop stopped");
}

/// Inbound connection: run the handshake hook, fire the first-accept hook
/// once, and hand the stream to an anonymous reader (it registers under the
/// peer id named by its first envelope).
fn handle_accept(inner: &Arc<MeshInner>, stream: TcpStream, addr: SocketAddr) {
    if let Some(hook) = &inner.on_accept {
        if let Err(err) = hook(&stream) {
            warn!(%addr, %err, "handshake failed, dropping connection");
            let _ = stream.shutdown(SocketShutdown::Both);
            return;
        }
    }

    let first = {
        let mut table = inner.table.lock().unwrap();
        table.accepted += 1;
        table.accepted == 1
    };
    if first {
        if let Some(hook) = &inner.on_first_accept {
            hook();
        }
    }

    let (read_stream, ctrl) = match (stream.try_clone(), stream.try_clone()) {
        (Ok(read_stream), Ok(ctrl)) => (read_stream, ctrl),
        _ => {
            warn!(%addr, "failed to clone accepted stream");
            return;
        }
    };
    let conn = Arc::new(Conn {
        writer: Mutex::new(stream),
        ctrl,
    });
    inner.table.lock().unwrap().anonymous.push(conn.clone());

    info!(%addr, "accepted peer connection");
    let inner = inner.clone();
    thread::spawn(move || read_loop(inner, conn, read_stream, None, addr));
}

/// Reader for one connection. `known` is set for dialed connections; an
/// accepted connection learns its peer id from the first envelope's source.
fn read_loop(
    inner: Arc<MeshInner>,
    conn: Arc<Conn>,
    stream: TcpStream,
    known: Option<PeerId>,
    addr: SocketAddr,
) {
    let mut reader = BufReader::new(stream);
    let mut peer_id = known;

    loop {
        let line = match read_line(&mut reader) {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!(%addr, "connection closed by peer");
                break;
            }
            Err(err) => {
                debug!(%addr, %err, "connection lost");
                break;
            }
        };

        let envelope = match decode_line(&line) {
            Ok(envelope) => envelope,
            Err(err) => {
                // A bad line is the sender's problem, not the link's.
                warn!(%addr, %err, "failed to decode message, skipping line");
                continue;
            }
        };

        if peer_id.is_none() {
            let id = envelope.source.clone();
            if inner.install_inbound(&id, &conn) {
                debug!(%addr, peer = %id, "inbound connection identified");
                peer_id = Some(id);
            }
        }

        inner.dispatch(envelope);
    }

    match &peer_id {
        Some(id) => inner.drop_connection(id, &conn, true),
        None => {
            conn.shutdown();
            inner
                .table
                .lock()
                .unwrap()
                .anonymous
                .retain(|c| !Arc::ptr_eq(c, &conn));
        }
    }
}

/// Reconnector for one peer. Loops while the mesh is open and the peer has
/// no live connection; exits after installing one. The close signal
/// unblocks the backoff sleep promptly.
fn reconnect_loop(inner: Arc<MeshInner>, peer_id: PeerId) {
    let mut delay = inner.retry_delay;

    loop {
        if inner.is_closed() {
            break;
        }

        let endpoint = {
            let mut table = inner.table.lock().unwrap();
            let Some(slot) = table.peers.get(&peer_id) else {
                break;
            };
            if slot.conn.is_some() {
                break;
            }
            let endpoint = slot.endpoint.clone();
            if endpoint.is_empty() {
                warn!(peer = %peer_id, "no endpoint to reconnect, removing peer");
                table.peers.remove(&peer_id);
                return;
            }
            endpoint
        };

        match TcpStream::connect(&endpoint) {
            Ok(stream) => {
                let addr = stream
                    .peer_addr()
                    .unwrap_or_else(|_| "0.0.0.0:0".parse().unwrap());
                let (read_stream, ctrl) = match (stream.try_clone(), stream.try_clone()) {
                    (Ok(read_stream), Ok(ctrl)) => (read_stream, ctrl),
                    _ => {
                        debug!(peer = %peer_id, "failed to clone dialed stream, retrying");
                        if inner.close_signal.wait(delay) {
                            break;
                        }
                        continue;
                    }
                };
                let conn = Arc::new(Conn {
                    writer: Mutex::new(stream),
                    ctrl,
                });
                inner.install_dialed(&peer_id, &conn);
                info!(peer = %peer_id, %endpoint, "connected to peer");

                let reader_inner = inner.clone();
                let reader_conn = conn.clone();
                let known = Some(peer_id.clone());
                thread::spawn(move || read_loop(reader_inner, reader_conn, read_stream, known, addr));
                break;
            }
            Err(err) => {
                debug!(peer = %peer_id, %endpoint, %err, retry_in = ?delay, "dial failed");
                if inner.close_signal.wait(delay) {
                    break;
                }
                delay = (delay * 2).min(inner.max_backoff);
            }
        }
    }

    if let Some(slot) = inner.table.lock().unwrap().peers.get_mut(&peer_id) {
        slot.reconnecting = false;
    }
}

/// Default [`ClockFn`]: wall-clock unix seconds.
fn system_unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
