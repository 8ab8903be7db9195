// Typed game-message layer over the peer mesh.
//
// `GameBus` narrows the mesh's string-kinded envelopes to the protocol's
// `MessageKind` vocabulary and tracks the set of peer ids expected in the
// current session. `send_all` goes to the tracked set only — not to every
// connection the mesh happens to know — so a broadcast during a mid-game
// restore cannot leak to a peer that has not re-joined yet. The coordinator
// owns the tracked set.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::Mutex;

use gambit_protocol::{Envelope, MessageKind, PeerId};

use crate::mesh::{BroadcastError, MeshError, PeerMesh};

/// Session-scoped message bus: a [`PeerMesh`] plus the expected-peer set.
pub struct GameBus {
    mesh: PeerMesh,
    peers: Mutex<BTreeSet<PeerId>>,
}

impl GameBus {
    pub fn new(mesh: PeerMesh) -> Self {
        Self {
            mesh,
            peers: Mutex::new(BTreeSet::new()),
        }
    }

    /// The local node's peer id.
    pub fn self_id(&self) -> &PeerId {
        self.mesh.local_id()
    }

    /// The mesh's actually-bound listen address.
    pub fn local_addr(&self) -> SocketAddr {
        self.mesh.local_addr()
    }

    /// Track `peer_id` as part of the session and hand its endpoint to the
    /// mesh (which dials if nothing is live).
    pub fn add_peer(&self, peer_id: PeerId, endpoint: impl Into<String>) {
        self.peers.lock().unwrap().insert(peer_id.clone());
        self.mesh.add_peer(peer_id, endpoint);
    }

    /// The tracked peer set, in stable order.
    pub fn peers(&self) -> Vec<PeerId> {
        self.peers.lock().unwrap().iter().cloned().collect()
    }

    pub fn send(
        &self,
        peer_id: &PeerId,
        kind: MessageKind,
        payload: &[u8],
    ) -> Result<(), MeshError> {
        self.mesh.send(peer_id, kind.as_str(), payload)
    }

    /// Send to every tracked peer. Succeeds only if every individual send
    /// succeeded; otherwise the composite error carries exactly the failed
    /// peer ids.
    pub fn send_all(&self, kind: MessageKind, payload: &[u8]) -> Result<(), BroadcastError> {
        let ids = self.peers();
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

    /// Replace the inbound sink.
    pub fn on_receive(&self, sink: impl Fn(Envelope) + Send + Sync + 'static) {
        self.mesh.register_sink(sink);
    }

    pub fn close(&self) {
        self.mesh.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshConfig;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn bus(id: &str) -> GameBus {
        let mut config = MeshConfig::new(PeerId::from(id), "127.0.0.1:0");
        config.retry_delay = Duration::from_millis(50);
        GameBus::new(PeerMesh::bind(config).unwrap())
    }

    fn inbox(bus: &GameBus) -> mpsc::Receiver<Envelope> {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        bus.on_receive(move |envelope| {
            let _ = tx.lock().unwrap().send(envelope);
        });
        rx
    }

    fn send_until_connected(bus: &GameBus, to: &PeerId, kind: MessageKind, payload: &[u8]) {
        for _ in 0..40 {
            if bus.send(to, kind, payload).is_ok() {
                return;
            }
            thread::sleep(Duration::from_millis(50));
        }
        panic!("never connected to {to}");
    }

    #[test]
    fn send_all_reaches_every_tracked_peer() {
        let a = bus("trio-1");
        let b = bus("trio-2");
        let c = bus("trio-3");
        let b_inbox = inbox(&b);
        let c_inbox = inbox(&c);

        a.add_peer(PeerId::from("trio-2"), b.local_addr().to_string());
        a.add_peer(PeerId::from("trio-3"), c.local_addr().to_string());
        send_until_connected(&a, &PeerId::from("trio-2"), MessageKind::NewMove, b"warmup");
        send_until_connected(&a, &PeerId::from("trio-3"), MessageKind::NewMove, b"warmup");

        a.send_all(MessageKind::DefineTurn, b"trio-1").unwrap();

        let find_turn = |rx: &mpsc::Receiver<Envelope>| loop {
            let envelope = rx.recv_timeout(Duration::from_secs(2)).unwrap();
            if envelope.kind == "define-turn" {
                return envelope;
            }
        };
        assert_eq!(find_turn(&b_inbox).payload, b"trio-1");
        assert_eq!(find_turn(&c_inbox).payload, b"trio-1");

        a.close();
        b.close();
        c.close();
    }

    #[test]
    fn send_all_reports_exactly_the_failed_peers() {
        let a = bus("partial-1");
        let b = bus("partial-2");
        let _b_inbox = inbox(&b);

        a.add_peer(PeerId::from("partial-2"), b.local_addr().to_string());
        send_until_connected(&a, &PeerId::from("partial-2"), MessageKind::NewMove, b"warmup");
        // Tracked but unreachable: no endpoint was ever resolvable.
        a.add_peer(PeerId::from("partial-3"), "127.0.0.1:1");

        let err = a.send_all(MessageKind::NewMove, b"e2e4").unwrap_err();
        assert_eq!(err.failed_peers(), vec![&PeerId::from("partial-3")]);

        a.close();
        b.close();
    }

    #[test]
    fn broadcasts_do_not_leak_outside_the_tracked_set() {
        let a = bus("leak-1");
        let b = bus("leak-2");
        let c = bus("leak-3");
        let _b_inbox = inbox(&b);
        let c_inbox = inbox(&c);

        // c knows a (mesh-level connection exists) but a only tracks b.
        c.add_peer(PeerId::from("leak-1"), a.local_addr().to_string());
        send_until_connected(&c, &PeerId::from("leak-1"), MessageKind::Restore, b"leak-3");

        a.add_peer(PeerId::from("leak-2"), b.local_addr().to_string());
        send_until_connected(&a, &PeerId::from("leak-2"), MessageKind::NewMove, b"warmup");

        a.send_all(MessageKind::NewMove, b"d2d4").unwrap();
        assert!(
            c_inbox.recv_timeout(Duration::from_millis(300)).is_err(),
            "untracked peer received a session broadcast"
        );

        a.close();
        b.close();
        c.close();
    }
}
