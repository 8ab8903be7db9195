// Per-session coordination state machine.
//
// The coordinator owns all game state for one session and mutates it from a
// single thread: every input — inbound mesh envelopes, handshake signals,
// local player commands, the retry tick — arrives as a `GameEvent` on one
// channel (see `runner.rs`) and is handled to completion before the next.
// No locks guard any of the fields here.
//
// Lifecycle: `Dialing → AwaitingHandshakes → AwaitingTurn → MyTurn/PeerTurn
// → Ended`. Slot 1 gates on N−1 inbound handshakes, performs the turn
// election, and broadcasts `define-turn` once; joiners gate on the
// handshakes of later slots (slot s waits for N−s) and otherwise wait for
// the turn message. After that, turn ownership advances by local symmetric
// computation on every applied move (`turn.rs`) — never re-broadcast.
//
// Sends that fail because a link is still dialing land in a per-peer FIFO
// outbox and are retried on the tick, so the election or a move survives
// the window where the mesh is still converging.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use gambit_directory::{DirectoryClient, DirectoryError, Outcome, Session, TurnMode};
use gambit_mesh::GameBus;
use gambit_protocol::{Envelope, MessageKind, PeerId};

use crate::adapters::RandSource;
use crate::rules::RulesEngine;
use crate::turn;

/// Every input the coordinator reacts to.
pub enum GameEvent {
    /// An envelope delivered by the mesh.
    Network(Envelope),
    /// One inbound connection passed the handshake hook.
    Handshake,
    /// The very first inbound connection of the mesh's lifetime.
    FirstContact,
    /// The local player chose a move.
    PlayMove(String),
    /// The local player gave up.
    Abandon,
    /// Periodic retry timer (emitted by the runner on receive timeout).
    Tick,
    /// Stop the event loop and tear the mesh down.
    Shutdown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Dialing,
    AwaitingHandshakes,
    AwaitingTurn,
    MyTurn,
    PeerTurn,
    Ended,
}

/// Snapshot of coordinator state, published after every handled event.
#[derive(Clone, Debug)]
pub struct Status {
    pub phase: Phase,
    pub turn: Option<PeerId>,
    pub history: Vec<String>,
    pub outcome: Option<Outcome>,
    pub last_error: Option<String>,
}

impl Status {
    fn initial() -> Self {
        Self {
            phase: Phase::Dialing,
            turn: None,
            history: Vec::new(),
            outcome: None,
            last_error: None,
        }
    }

    pub fn shared() -> Arc<Mutex<Status>> {
        Arc::new(Mutex::new(Self::initial()))
    }
}

pub struct Coordinator {
    bus: GameBus,
    directory: Arc<dyn DirectoryClient>,
    rules: Box<dyn RulesEngine>,
    rand: Box<dyn RandSource>,
    session: Session,
    self_slot: u8,
    phase: Phase,
    turn: Option<PeerId>,
    outcome: Option<Outcome>,
    awaited_handshakes: u8,
    /// Count of applied moves; input to the symmetric turn computation.
    move_index: u32,
    /// True for a node rejoining mid-game; cleared once a restore-ack lands.
    recovering: bool,
    restored: bool,
    /// Peers owed a `restore-ack` (their link may still be dialing).
    pending_restores: Vec<PeerId>,
    /// Sends that failed on a not-yet-live link, retried in order per peer.
    outbox: VecDeque<(PeerId, MessageKind, Vec<u8>)>,
    ticks: u32,
    last_error: Option<String>,
    status: Arc<Mutex<Status>>,
}

impl Coordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bus: GameBus,
        directory: Arc<dyn DirectoryClient>,
        rules: Box<dyn RulesEngine>,
        rand: Box<dyn RandSource>,
        session: Session,
        self_slot: u8,
        recovering: bool,
        status: Arc<Mutex<Status>>,
    ) -> Self {
        let awaited_handshakes = if recovering {
            0
        } else {
            session.player_count().saturating_sub(self_slot)
        };
        Self {
            bus,
            directory,
            rules,
            rand,
            session,
            self_slot,
            phase: Phase::Dialing,
            turn: None,
            outcome: None,
            awaited_handshakes,
            move_index: 0,
            recovering,
            restored: false,
            pending_restores: Vec::new(),
            outbox: VecDeque::new(),
            ticks: 0,
            last_error: None,
            status,
        }
    }

    /// First transition out of `Dialing`, run once by the event loop before
    /// it starts receiving.
    pub fn start(&mut self) {
        self.add_session_peers();

        if self.recovering {
            self.phase = Phase::AwaitingTurn;
            self.broadcast_restore();
        } else if self.awaited_handshakes == 0 {
            // Last joiner: nobody dials us, we are playing as soon as our
            // own dials land.
            self.phase = Phase::AwaitingTurn;
        } else {
            self.phase = Phase::AwaitingHandshakes;
            info!(
                slot = self.self_slot,
                awaiting = self.awaited_handshakes,
                "waiting for peers"
            );
        }
        self.publish_status();
    }

    pub fn handle(&mut self, event: GameEvent) {
        match event {
            GameEvent::Network(envelope) => self.on_network(envelope),
            GameEvent::Handshake => self.on_handshake(),
            GameEvent::FirstContact => {
                info!(session = %self.session.name, "first peer connected");
            }
            GameEvent::PlayMove(mv) => self.on_play(&mv),
            GameEvent::Abandon => self.on_abandon_local(),
            GameEvent::Tick => self.on_tick(),
            GameEvent::Shutdown => {}
        }
        self.publish_status();
    }

    pub fn close(&self) {
        self.bus.close();
    }

    // ---- handshake phase ---------------------------------------------

    fn on_handshake(&mut self) {
        if self.phase != Phase::AwaitingHandshakes {
            return;
        }
        self.awaited_handshakes = self.awaited_handshakes.saturating_sub(1);
        debug!(remaining = self.awaited_handshakes, "peer handshake");
        if self.awaited_handshakes == 0 {
            self.all_peers_present();
        }
    }

    /// Every expected peer has dialed in: refresh the roster (joiners'
    /// endpoints were not known at creation time), then either elect the
    /// first turn (slot 1) or wait for it.
    fn all_peers_present(&mut self) {
        match self.directory.get_session(self.session.id) {
            Ok(session) => {
                self.session = session;
                self.add_session_peers();
            }
            Err(err) => warn!(%err, "failed to refresh session roster"),
        }

        if self.self_slot == 1 {
            self.elect_first_turn();
        } else {
            self.enter_play();
        }
    }

    fn elect_first_turn(&mut self) {
        let side = turn::white_side(self.session.kind);
        let slot = match self.session.turn_mode {
            TurnMode::Sequential => 1,
            TurnMode::Random => side[self.rand.pick(side.len())],
        };
        let owner = self.session.peer_id(slot);
        info!(%owner, "first turn elected");
        self.turn = Some(owner.clone());
        self.send_all_or_queue(MessageKind::DefineTurn, owner.as_str().as_bytes());
        self.enter_play();
    }

    /// Set the playing phase from the current turn owner.
    fn enter_play(&mut self) {
        self.phase = match &self.turn {
            Some(owner) if owner == self.bus.self_id() => Phase::MyTurn,
            Some(_) => Phase::PeerTurn,
            None => Phase::AwaitingTurn,
        };
    }

    // ---- inbound messages --------------------------------------------

    fn on_network(&mut self, envelope: Envelope) {
        let kind = match envelope.message_kind() {
            Ok(kind) => kind,
            Err(err) => {
                // Possibly a newer peer; never a reason to disconnect.
                warn!(source = %envelope.source, %err, "dropping message");
                return;
            }
        };
        match kind {
            MessageKind::DefineTurn => self.on_define_turn(&envelope),
            MessageKind::NewMove => self.on_new_move(&envelope),
            MessageKind::Abandon => self.on_abandon_remote(&envelope),
            MessageKind::Restore => self.on_restore(&envelope),
            MessageKind::RestoreAck => self.on_restore_ack(&envelope),
        }
    }

    fn on_define_turn(&mut self, envelope: &Envelope) {
        let owner = PeerId::from(envelope.payload_str().as_ref());
        debug!(%owner, "turn owner set");
        self.turn = Some(owner);
        if matches!(
            self.phase,
            Phase::AwaitingTurn | Phase::MyTurn | Phase::PeerTurn
        ) {
            self.enter_play();
        }
    }

    fn on_new_move(&mut self, envelope: &Envelope) {
        if self.phase == Phase::Ended {
            return;
        }
        let mv = envelope.payload_str().into_owned();
        match self.rules.apply(&mv) {
            Err(err) => {
                // Also the duplicate-delivery path: a replayed move is not
                // legal for the position it already produced, so the turn
                // advances exactly once.
                debug!(source = %envelope.source, %err, "move rejected");
                self.last_error = Some(err.to_string());
            }
            Ok(()) => {
                self.move_index += 1;
                self.last_error = None;
                match envelope.source.slot() {
                    Some(mover) => self.advance_turn(mover),
                    None => warn!(source = %envelope.source, "mover slot unknown"),
                }
                self.check_outcome();
            }
        }
    }

    fn on_abandon_remote(&mut self, envelope: &Envelope) {
        if self.phase == Phase::Ended {
            return;
        }
        info!(source = %envelope.source, "peer abandoned");
        // The abandoning side finalized before broadcasting; the directory
        // has the authoritative outcome.
        match self.directory.get_session(self.session.id) {
            Ok(session) => {
                if session.outcome.is_terminal() {
                    self.outcome = Some(session.outcome);
                }
                self.session = session;
            }
            Err(err) => warn!(%err, "failed to fetch outcome after abandon"),
        }
        self.phase = Phase::Ended;
    }

    fn on_restore(&mut self, envelope: &Envelope) {
        let source = envelope.source.clone();
        info!(%source, "peer is restoring");
        // The recovering node re-registered, so its endpoint in the
        // directory is fresh; re-adding every occupant updates our dialers.
        match self.directory.get_session(self.session.id) {
            Ok(session) => {
                self.session = session;
                self.add_session_peers();
            }
            Err(err) => warn!(%err, "failed to refresh roster for restore"),
        }
        if !self.pending_restores.contains(&source) {
            self.pending_restores.push(source);
        }
        self.flush_restores();
    }

    fn on_restore_ack(&mut self, envelope: &Envelope) {
        if !self.recovering || self.restored {
            // First ack wins; peers are consistent so the rest add nothing.
            debug!(source = %envelope.source, "ignoring redundant restore ack");
            return;
        }
        let payload = envelope.payload_str().into_owned();
        let mut applied = 0u32;
        for mv in payload.lines().filter(|line| !line.is_empty()) {
            match self.rules.apply(mv) {
                Ok(()) => applied += 1,
                Err(err) => warn!(%err, "restore history rejected a move"),
            }
        }
        self.move_index = applied;
        self.restored = true;
        info!(source = %envelope.source, moves = applied, "state restored");
        if matches!(self.phase, Phase::Dialing | Phase::AwaitingTurn) {
            self.enter_play();
        }
    }

    // ---- local commands ----------------------------------------------

    fn on_play(&mut self, mv: &str) {
        match self.phase {
            Phase::Ended => {
                self.last_error = Some("game is over".into());
                return;
            }
            Phase::MyTurn => {}
            _ => {
                self.last_error = Some("not your turn".into());
                return;
            }
        }
        if let Err(err) = self.rules.apply(mv) {
            warn!(%err, "local move rejected");
            self.last_error = Some(err.to_string());
            return;
        }
        // Applied locally before the broadcast is written: a peer never
        // sees a move the sender has not itself recorded.
        self.move_index += 1;
        self.last_error = None;
        self.send_all_or_queue(MessageKind::NewMove, mv.as_bytes());
        self.advance_turn(self.self_slot);
        self.check_outcome();
    }

    fn on_abandon_local(&mut self) {
        if self.phase == Phase::Ended {
            return;
        }
        let outcome = turn::losing_outcome(self.session.kind, self.self_slot);
        info!(outcome = outcome.as_str(), "abandoning game");
        self.record_outcome(outcome);
        let self_id = self.bus.self_id().as_str().as_bytes().to_vec();
        self.send_all_or_queue(MessageKind::Abandon, &self_id);
        self.outcome = Some(outcome);
        self.phase = Phase::Ended;
    }

    // ---- turn + outcome ----------------------------------------------

    fn advance_turn(&mut self, mover: u8) {
        let next = turn::next_slot(
            self.session.kind,
            self.session.turn_mode,
            mover,
            &self.session.name,
            self.move_index,
        );
        self.turn = Some(self.session.peer_id(next));
        if matches!(
            self.phase,
            Phase::AwaitingTurn | Phase::MyTurn | Phase::PeerTurn
        ) {
            self.enter_play();
        }
    }

    fn check_outcome(&mut self) {
        if let Some(outcome) = self.rules.outcome() {
            info!(outcome = outcome.as_str(), "game over");
            self.record_outcome(outcome);
            self.outcome = Some(outcome);
            self.phase = Phase::Ended;
        }
    }

    /// Write the outcome to the directory. Every node that detects the end
    /// does this; the directory accepts the repeated value silently.
    fn record_outcome(&mut self, outcome: Outcome) {
        match self.directory.finalize_outcome(self.session.id, outcome) {
            Ok(session) => self.session = session,
            Err(DirectoryError::Conflict) => {
                warn!(attempted = outcome.as_str(), "outcome already recorded differently");
            }
            Err(err) => warn!(%err, "failed to record outcome"),
        }
    }

    // ---- delivery ----------------------------------------------------

    fn add_session_peers(&mut self) {
        let peers: Vec<(PeerId, String)> = self
            .session
            .occupants()
            .filter(|(slot, _)| *slot != self.self_slot)
            .map(|(slot, occupant)| (self.session.peer_id(slot), occupant.endpoint.clone()))
            .collect();
        for (peer, endpoint) in peers {
            self.bus.add_peer(peer, endpoint);
        }
    }

    /// Send to every tracked peer, queueing for the tick-retry anything
    /// that cannot be delivered yet. Per-peer order is preserved: once a
    /// peer has queued messages, later sends to it queue behind them.
    fn send_all_or_queue(&mut self, kind: MessageKind, payload: &[u8]) {
        let mut pending = 0usize;
        for peer in self.bus.peers() {
            if self.outbox_holds(&peer) {
                self.outbox.push_back((peer, kind, payload.to_vec()));
                pending += 1;
                continue;
            }
            if let Err(err) = self.bus.send(&peer, kind, payload) {
                debug!(%peer, %err, "queueing undeliverable message");
                self.outbox.push_back((peer, kind, payload.to_vec()));
                pending += 1;
            }
        }
        if pending > 0 {
            self.last_error = Some(format!("delivery pending to {pending} peer(s)"));
        }
    }

    fn outbox_holds(&self, peer: &PeerId) -> bool {
        self.outbox.iter().any(|(queued, _, _)| queued == peer)
    }

    fn flush_outbox(&mut self) {
        if self.outbox.is_empty() {
            return;
        }
        let mut still_down: Vec<PeerId> = Vec::new();
        let mut remaining = VecDeque::new();
        for (peer, kind, payload) in std::mem::take(&mut self.outbox) {
            if still_down.contains(&peer) {
                remaining.push_back((peer, kind, payload));
                continue;
            }
            match self.bus.send(&peer, kind, &payload) {
                Ok(()) => debug!(%peer, kind = kind.as_str(), "flushed queued message"),
                Err(_) => {
                    still_down.push(peer.clone());
                    remaining.push_back((peer, kind, payload));
                }
            }
        }
        self.outbox = remaining;
    }

    /// Answer queued restore requests. The reply goes to the source only,
    /// followed by the current turn owner so the recovering node does not
    /// have to guess it (the initial election is not derivable from the
    /// move history).
    fn flush_restores(&mut self) {
        if self.pending_restores.is_empty() {
            return;
        }
        let owner = self.turn.clone();
        let mut remaining = Vec::new();
        for peer in std::mem::take(&mut self.pending_restores) {
            let history = self.rules.history();
            let mut payload = String::new();
            for mv in &history {
                payload.push_str(mv);
                payload.push('\n');
            }
            match self.bus.send(&peer, MessageKind::RestoreAck, payload.as_bytes()) {
                Ok(()) => {
                    info!(%peer, moves = history.len(), "sent restore history");
                    if let Some(owner) = &owner {
                        if self
                            .bus
                            .send(&peer, MessageKind::DefineTurn, owner.as_str().as_bytes())
                            .is_err()
                        {
                            self.outbox.push_back((
                                peer.clone(),
                                MessageKind::DefineTurn,
                                owner.as_str().as_bytes().to_vec(),
                            ));
                        }
                    }
                }
                Err(err) => {
                    debug!(%peer, %err, "restore ack not deliverable yet");
                    remaining.push(peer);
                }
            }
        }
        self.pending_restores = remaining;
    }

    fn broadcast_restore(&mut self) {
        let self_id = self.bus.self_id().as_str().as_bytes().to_vec();
        for peer in self.bus.peers() {
            let _ = self.bus.send(&peer, MessageKind::Restore, &self_id);
        }
    }

    fn on_tick(&mut self) {
        self.ticks = self.ticks.wrapping_add(1);
        self.flush_outbox();
        self.flush_restores();
        // A recovering node keeps asking until the first ack lands; extra
        // answers are ignored.
        if self.recovering && !self.restored && self.ticks % 4 == 0 {
            self.broadcast_restore();
        }
    }

    fn publish_status(&self) {
        *self.status.lock().unwrap() = Status {
            phase: self.phase,
            turn: self.turn.clone(),
            history: self.rules.history(),
            outcome: self.outcome,
            last_error: self.last_error.clone(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gambit_directory::{Directory, LocalClient, PlayerId, SessionKind};
    use gambit_mesh::{MeshConfig, PeerMesh};
    use std::time::Duration;

    use crate::adapters::SeededRand;
    use crate::rules::{RulesError, RulesEngine};

    /// Engine double: accepts any move not already in its history.
    struct EchoRules {
        moves: Vec<String>,
        terminal_after: Option<(usize, Outcome)>,
    }

    impl EchoRules {
        fn new() -> Self {
            Self {
                moves: Vec::new(),
                terminal_after: None,
            }
        }
    }

    impl RulesEngine for EchoRules {
        fn apply(&mut self, mv: &str) -> Result<(), RulesError> {
            if self.moves.iter().any(|m| m == mv) {
                return Err(RulesError::new(mv, "already played"));
            }
            self.moves.push(mv.to_owned());
            Ok(())
        }

        fn valid_moves(&self) -> Vec<String> {
            vec!["e2e4".into()]
        }

        fn outcome(&self) -> Option<Outcome> {
            self.terminal_after
                .and_then(|(n, outcome)| (self.moves.len() >= n).then_some(outcome))
        }

        fn history(&self) -> Vec<String> {
            self.moves.clone()
        }
    }

    fn host_coordinator(kind: SessionKind) -> (Coordinator, Arc<Directory>, i64) {
        let directory = Arc::new(Directory::new());
        let client = Arc::new(LocalClient::new(directory.clone(), PlayerId(1)));
        let session = client
            .create_session("127.0.0.1:0", kind, TurnMode::Sequential)
            .unwrap();
        let id = session.id;

        let mut config = MeshConfig::new(session.peer_id(1), "127.0.0.1:0");
        config.retry_delay = Duration::from_millis(50);
        let bus = GameBus::new(PeerMesh::bind(config).unwrap());

        let coordinator = Coordinator::new(
            bus,
            client,
            Box::new(EchoRules::new()),
            Box::new(SeededRand::new(1)),
            session,
            1,
            false,
            Status::shared(),
        );
        (coordinator, directory, id)
    }

    #[test]
    fn playing_out_of_turn_is_surfaced_not_sent() {
        let (mut coordinator, _, _) = host_coordinator(SessionKind::Single);
        coordinator.start();
        assert_eq!(coordinator.phase, Phase::AwaitingHandshakes);

        coordinator.handle(GameEvent::PlayMove("e2e4".into()));
        assert_eq!(coordinator.last_error.as_deref(), Some("not your turn"));
        assert!(coordinator.rules.history().is_empty());
        coordinator.close();
    }

    #[test]
    fn abandon_records_the_losing_outcome() {
        let (mut coordinator, directory, id) = host_coordinator(SessionKind::Single);
        coordinator.start();
        coordinator.handle(GameEvent::Abandon);

        assert_eq!(coordinator.phase, Phase::Ended);
        // Slot 1 is white; abandoning hands black the win.
        let session = directory.get_session(PlayerId(1), id).unwrap();
        assert_eq!(session.outcome, Outcome::BlackWon);
        coordinator.close();
    }

    #[test]
    fn handshake_count_gates_the_election() {
        let (mut coordinator, _, _) = host_coordinator(SessionKind::Single);
        coordinator.start();

        assert_eq!(coordinator.phase, Phase::AwaitingHandshakes);
        coordinator.handle(GameEvent::Handshake);
        // Sequential: slot 1 starts, and slot 1 is us.
        assert_eq!(coordinator.phase, Phase::MyTurn);
        assert_eq!(
            coordinator.turn.as_ref().map(|p| p.as_str().to_owned()),
            Some(format!("{}-1", coordinator.session.name))
        );
        coordinator.close();
    }

    #[test]
    fn duplicate_move_advances_turn_once() {
        let (mut coordinator, _, _) = host_coordinator(SessionKind::Single);
        coordinator.start();
        coordinator.handle(GameEvent::Handshake);
        assert_eq!(coordinator.phase, Phase::MyTurn);

        coordinator.handle(GameEvent::PlayMove("e2e4".into()));
        assert_eq!(coordinator.phase, Phase::PeerTurn);
        let peer = PeerId::new(&coordinator.session.name, 2);

        let envelope = Envelope::new(1, peer.clone(), MessageKind::NewMove, b"e7e5".to_vec());
        coordinator.handle(GameEvent::Network(envelope.clone()));
        assert_eq!(coordinator.phase, Phase::MyTurn);
        assert_eq!(coordinator.move_index, 2);

        // Same envelope again: rejected by the rules, turn untouched.
        coordinator.handle(GameEvent::Network(envelope));
        assert_eq!(coordinator.phase, Phase::MyTurn);
        assert_eq!(coordinator.move_index, 2);
        coordinator.close();
    }

    #[test]
    fn restore_ack_first_wins() {
        let directory = Arc::new(Directory::new());
        let client = Arc::new(LocalClient::new(directory.clone(), PlayerId(2)));
        let host_client = Arc::new(LocalClient::new(directory, PlayerId(1)));
        let session = host_client
            .create_session("127.0.0.1:0", SessionKind::Single, TurnMode::Sequential)
            .unwrap();
        let session = client.join_session(&session.name, "127.0.0.1:0").unwrap();

        let mut config = MeshConfig::new(session.peer_id(2), "127.0.0.1:0");
        config.retry_delay = Duration::from_millis(50);
        let bus = GameBus::new(PeerMesh::bind(config).unwrap());
        let mut coordinator = Coordinator::new(
            bus,
            client,
            Box::new(EchoRules::new()),
            Box::new(SeededRand::new(1)),
            session.clone(),
            2,
            true,
            Status::shared(),
        );
        coordinator.start();
        assert_eq!(coordinator.phase, Phase::AwaitingTurn);

        let peer = session.peer_id(1);
        let ack = Envelope::new(1, peer.clone(), MessageKind::RestoreAck, b"e2e4\ne7e5\n".to_vec());
        coordinator.handle(GameEvent::Network(ack));
        assert_eq!(coordinator.rules.history(), vec!["e2e4", "e7e5"]);
        assert_eq!(coordinator.move_index, 2);

        // Identical acks from other peers change nothing.
        let ack = Envelope::new(2, peer, MessageKind::RestoreAck, b"e2e4\ne7e5\n".to_vec());
        coordinator.handle(GameEvent::Network(ack));
        assert_eq!(coordinator.rules.history(), vec!["e2e4", "e7e5"]);
        assert_eq!(coordinator.move_index, 2);
        coordinator.close();
    }

    #[test]
    fn loopback_copy_of_own_move_is_ignored() {
        let (mut coordinator, _, _) = host_coordinator(SessionKind::Single);
        coordinator.start();
        coordinator.handle(GameEvent::Handshake);
        coordinator.handle(GameEvent::PlayMove("e2e4".into()));
        assert_eq!(coordinator.phase, Phase::PeerTurn);

        // Our own move echoed back: the rules reject the replay and the
        // turn does not advance a second time.
        let me = PeerId::new(&coordinator.session.name, 1);
        let echo = Envelope::new(2, me, MessageKind::NewMove, b"e2e4".to_vec());
        coordinator.handle(GameEvent::Network(echo));
        assert_eq!(coordinator.phase, Phase::PeerTurn);
        assert_eq!(coordinator.move_index, 1);
        coordinator.close();
    }
}
