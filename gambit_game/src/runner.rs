// Node startup and the coordinator event loop.
//
// `start_host` / `start_joiner` / `start_restore` wire one node end to end:
// reserve a listen port, register the endpoint with the directory, bind the
// mesh with the handshake hooks and the node's clock (which stamps outbound
// envelopes), funnel every input into one channel, and run the coordinator
// on its own thread. The loop receives with a timeout —
// when it fires with nothing queued, the coordinator gets a `Tick` and uses
// it to retry queued sends and restore traffic.
//
// The returned `CoordinatorHandle` is the UI-facing surface: submit a move,
// abandon, read a state snapshot, shut down.

use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use gambit_directory::{DirectoryClient, DirectoryError, Session, SessionKind, TurnMode};
use gambit_mesh::{GameBus, MeshConfig, PeerMesh};

use crate::adapters::{Clock, RandSource};
use crate::coordinator::{Coordinator, GameEvent, Status};
use crate::rules::RulesEngine;

/// Cadence of the retry tick when no events are queued.
pub const TICK: Duration = Duration::from_millis(250);

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error("network error: {0}")]
    Io(#[from] io::Error),
}

/// Handle to a running node. Dropping it signals shutdown; `shutdown` also
/// waits for the loop to finish.
pub struct CoordinatorHandle {
    session: Session,
    tx: mpsc::Sender<GameEvent>,
    status: Arc<Mutex<Status>>,
    thread: Option<JoinHandle<()>>,
}

impl CoordinatorHandle {
    /// The session as it looked when this node entered it.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Latest state snapshot, refreshed after every handled event.
    pub fn status(&self) -> Status {
        self.status.lock().unwrap().clone()
    }

    /// Submit the local player's move.
    pub fn play(&self, mv: &str) {
        let _ = self.tx.send(GameEvent::PlayMove(mv.to_owned()));
    }

    /// Give up the game.
    pub fn abandon(&self) {
        let _ = self.tx.send(GameEvent::Abandon);
    }

    /// Stop the node and wait for its loop to exit.
    pub fn shutdown(mut self) {
        let _ = self.tx.send(GameEvent::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for CoordinatorHandle {
    fn drop(&mut self) {
        let _ = self.tx.send(GameEvent::Shutdown);
    }
}

/// Create a session and run its originator (slot 1).
pub fn start_host(
    directory: Arc<dyn DirectoryClient>,
    rules: Box<dyn RulesEngine>,
    rand: Box<dyn RandSource>,
    clock: Arc<dyn Clock>,
    bind_host: &str,
    kind: SessionKind,
    turn_mode: TurnMode,
) -> Result<CoordinatorHandle, GameError> {
    let listen_addr = reserve_endpoint(bind_host)?;
    let session = directory.create_session(&listen_addr.to_string(), kind, turn_mode)?;
    spawn_node(directory, rules, rand, clock, session, 1, listen_addr, false)
}

/// Join a named session and run the node seated by the directory.
pub fn start_joiner(
    directory: Arc<dyn DirectoryClient>,
    rules: Box<dyn RulesEngine>,
    rand: Box<dyn RandSource>,
    clock: Arc<dyn Clock>,
    bind_host: &str,
    name: &str,
) -> Result<CoordinatorHandle, GameError> {
    let listen_addr = reserve_endpoint(bind_host)?;
    let session = directory.join_session(name, &listen_addr.to_string())?;
    let slot = session.last_joiner;
    spawn_node(directory, rules, rand, clock, session, slot, listen_addr, false)
}

/// Rejoin a session mid-game after losing local state. Re-registers the
/// (new) endpoint, reconnects to every peer, and replays history from the
/// first `restore-ack`.
pub fn start_restore(
    directory: Arc<dyn DirectoryClient>,
    rules: Box<dyn RulesEngine>,
    rand: Box<dyn RandSource>,
    clock: Arc<dyn Clock>,
    bind_host: &str,
    name: &str,
) -> Result<CoordinatorHandle, GameError> {
    let listen_addr = reserve_endpoint(bind_host)?;
    let session = directory.join_session(name, &listen_addr.to_string())?;
    let slot = session.last_joiner;
    spawn_node(directory, rules, rand, clock, session, slot, listen_addr, true)
}

#[allow(clippy::too_many_arguments)]
fn spawn_node(
    directory: Arc<dyn DirectoryClient>,
    rules: Box<dyn RulesEngine>,
    rand: Box<dyn RandSource>,
    clock: Arc<dyn Clock>,
    session: Session,
    slot: u8,
    listen_addr: SocketAddr,
    recovering: bool,
) -> Result<CoordinatorHandle, GameError> {
    let (tx, rx) = mpsc::channel();

    let mut config = MeshConfig::new(session.peer_id(slot), listen_addr.to_string());
    config.clock = Arc::new(move || clock.unix_now());
    let handshake_tx = Mutex::new(tx.clone());
    config.on_accept = Some(Box::new(move |_| {
        let _ = handshake_tx.lock().unwrap().send(GameEvent::Handshake);
        Ok(())
    }));
    let first_tx = Mutex::new(tx.clone());
    config.on_first_accept = Some(Box::new(move || {
        let _ = first_tx.lock().unwrap().send(GameEvent::FirstContact);
    }));

    let mesh = PeerMesh::bind(config)?;
    let bus = GameBus::new(mesh);
    let sink_tx = Mutex::new(tx.clone());
    bus.on_receive(move |envelope| {
        let _ = sink_tx.lock().unwrap().send(GameEvent::Network(envelope));
    });

    let status = Status::shared();
    let coordinator = Coordinator::new(
        bus,
        directory,
        rules,
        rand,
        session.clone(),
        slot,
        recovering,
        status.clone(),
    );
    let thread = thread::spawn(move || run_loop(coordinator, rx));

    Ok(CoordinatorHandle {
        session,
        tx,
        status,
        thread: Some(thread),
    })
}

/// Single-threaded dispatch: all inbound messages, hooks, and commands are
/// processed sequentially, so coordinator state needs no locking.
fn run_loop(mut coordinator: Coordinator, rx: mpsc::Receiver<GameEvent>) {
    coordinator.start();
    'outer: loop {
        match rx.recv_timeout(TICK) {
            Ok(GameEvent::Shutdown) => break,
            Ok(event) => {
                coordinator.handle(event);
                // Drain whatever arrived while handling.
                while let Ok(event) = rx.try_recv() {
                    if matches!(event, GameEvent::Shutdown) {
                        break 'outer;
                    }
                    coordinator.handle(event);
                }
            }
            Err(RecvTimeoutError::Timeout) => coordinator.handle(GameEvent::Tick),
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    coordinator.close();
}

/// Pick a concrete listen address on `bind_host` by briefly binding port 0.
/// The port is released and re-bound by the mesh moments later — the same
/// reserve-then-bind dance the directory registration needs, since the
/// endpoint must be known before the session row can be written.
fn reserve_endpoint(bind_host: &str) -> io::Result<SocketAddr> {
    let listener = TcpListener::bind((bind_host, 0))?;
    listener.local_addr()
}
