// Authoritative in-process session registry.
//
// Locking: a registry-wide map lock covers id/name lookups and inserts only.
// Each session row sits behind its own mutex, held across the full
// read-modify-write of that row — membership checks included — so distinct
// sessions never contend. Lock order is always map → row; `finalize_outcome`
// releases the row before touching the map again.
//
// Names: `create_session` draws names until one does not collide with a
// *pending* session. A finalized session keeps its row (by id, read-only)
// but releases its name for reuse.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::error::DirectoryError;
use crate::names;
use crate::session::{Outcome, PlayerId, Session, SessionKind, Slot, TurnMode};

type Row = Arc<Mutex<Session>>;

struct State {
    next_id: i64,
    by_id: HashMap<i64, Row>,
    /// Maps each name to its pending session. Entries are removed when the
    /// session turns terminal, freeing the name.
    by_name: HashMap<String, i64>,
}

/// Authoritative registry of sessions, slots, endpoints, and outcomes.
pub struct Directory {
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
    state: Mutex<State>,
}

impl Directory {
    pub fn new() -> Self {
        Self::with_deps(Arc::new(SystemClock), StdRng::from_entropy())
    }

    pub fn with_deps(clock: Arc<dyn Clock>, rng: StdRng) -> Self {
        Self {
            clock,
            rng: Mutex::new(rng),
            state: Mutex::new(State {
                next_id: 1,
                by_id: HashMap::new(),
                by_name: HashMap::new(),
            }),
        }
    }

    /// Open a session: pick a fresh name, seat the caller in slot 1.
    pub fn create_session(
        &self,
        player: PlayerId,
        endpoint: &str,
        kind: SessionKind,
        turn_mode: TurnMode,
    ) -> Result<Session, DirectoryError> {
        let now = self.clock.unix_now();
        let mut state = self.state.lock().unwrap();

        let name = loop {
            let candidate = names::session_name(&mut *self.rng.lock().unwrap());
            if !state.by_name.contains_key(&candidate) {
                break candidate;
            }
            debug!(name = %candidate, "session name collision, retrying");
        };

        let id = state.next_id;
        state.next_id += 1;

        let mut slots: Vec<Option<Slot>> = vec![None; usize::from(kind.player_count())];
        slots[0] = Some(Slot {
            player,
            endpoint: endpoint.to_owned(),
        });

        let session = Session {
            id,
            name: name.clone(),
            kind,
            turn_mode,
            slots,
            outcome: Outcome::Pending,
            last_joiner: 1,
            created_at: now,
            updated_at: now,
        };

        state.by_id.insert(id, Arc::new(Mutex::new(session.clone())));
        state.by_name.insert(name.clone(), id);
        info!(%name, id, player = player.0, "session created");
        Ok(session)
    }

    /// Claim the next free slot of the named session, or refresh the
    /// caller's endpoint if they are already seated (rejoin).
    pub fn join_session(
        &self,
        player: PlayerId,
        name: &str,
        endpoint: &str,
    ) -> Result<Session, DirectoryError> {
        let row = self.row_by_name(name)?;
        let mut session = row.lock().unwrap();

        let slot = match session.slot_of(player) {
            // A member always re-joins, full or not: same slot, new endpoint.
            Some(slot) => {
                session.slots[usize::from(slot) - 1] = Some(Slot {
                    player,
                    endpoint: endpoint.to_owned(),
                });
                slot
            }
            None => match session.next_free_slot() {
                Some(slot) => {
                    session.slots[usize::from(slot) - 1] = Some(Slot {
                        player,
                        endpoint: endpoint.to_owned(),
                    });
                    slot
                }
                None => return Err(DirectoryError::SessionFull),
            },
        };

        session.last_joiner = slot;
        session.updated_at = self.clock.unix_now();
        info!(name = %session.name, slot, player = player.0, "player joined");
        Ok(session.clone())
    }

    /// Fetch a session by id. The caller must be a member.
    pub fn get_session(&self, player: PlayerId, id: i64) -> Result<Session, DirectoryError> {
        let row = self.row_by_id(id)?;
        let session = row.lock().unwrap();
        if !session.is_member(player) {
            return Err(DirectoryError::Forbidden);
        }
        Ok(session.clone())
    }

    /// Fetch a pending session by name. The caller must be a member.
    pub fn get_session_by_name(
        &self,
        player: PlayerId,
        name: &str,
    ) -> Result<Session, DirectoryError> {
        let row = self.row_by_name(name)?;
        let session = row.lock().unwrap();
        if !session.is_member(player) {
            return Err(DirectoryError::Forbidden);
        }
        Ok(session.clone())
    }

    /// The caller's sessions, most recently updated first.
    pub fn list_sessions(
        &self,
        player: PlayerId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Session>, DirectoryError> {
        let rows: Vec<Row> = {
            let state = self.state.lock().unwrap();
            state.by_id.values().cloned().collect()
        };

        let mut sessions: Vec<Session> = rows
            .iter()
            .map(|row| row.lock().unwrap().clone())
            .filter(|session| session.is_member(player))
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(sessions.into_iter().skip(offset).take(limit).collect())
    }

    /// Record the authoritative outcome. The only transition out of
    /// pending; re-finalizing with the same value is accepted silently,
    /// a divergent value is a conflict.
    pub fn finalize_outcome(
        &self,
        player: PlayerId,
        id: i64,
        outcome: Outcome,
    ) -> Result<Session, DirectoryError> {
        if !outcome.is_terminal() {
            return Err(DirectoryError::BadRequest("outcome must be terminal".into()));
        }

        let row = self.row_by_id(id)?;
        let (session, freed_name) = {
            let mut session = row.lock().unwrap();
            if !session.is_member(player) {
                return Err(DirectoryError::Forbidden);
            }
            match session.outcome {
                Outcome::Pending => {
                    session.outcome = outcome;
                    session.updated_at = self.clock.unix_now();
                    info!(name = %session.name, id, outcome = outcome.as_str(), "outcome recorded");
                    (session.clone(), Some(session.name.clone()))
                }
                existing if existing == outcome => (session.clone(), None),
                _ => return Err(DirectoryError::Conflict),
            }
        };

        if let Some(name) = freed_name {
            let mut state = self.state.lock().unwrap();
            if state.by_name.get(&name) == Some(&id) {
                state.by_name.remove(&name);
            }
        }
        Ok(session)
    }

    fn row_by_id(&self, id: i64) -> Result<Row, DirectoryError> {
        let state = self.state.lock().unwrap();
        state.by_id.get(&id).cloned().ok_or(DirectoryError::NotFound)
    }

    fn row_by_name(&self, name: &str) -> Result<Row, DirectoryError> {
        let state = self.state.lock().unwrap();
        let id = state.by_name.get(name).ok_or(DirectoryError::NotFound)?;
        state.by_id.get(id).cloned().ok_or(DirectoryError::NotFound)
    }
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}
