// Session data model.
//
// A session is a named coordination unit with a fixed set of slots. Slot
// indices are 1-based and immutable for the session's lifetime; a player
// occupies at most one slot. The outcome moves `pending → terminal` exactly
// once, after which the row is read-only.
//
// All types serialize with serde — the same shapes travel over the
// directory RPC as JSON.

use serde::{Deserialize, Serialize};

use gambit_protocol::PeerId;

/// Validated player identity. Credential validation happens outside the
/// directory; only the resulting id reaches it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub i64);

/// How many players a session seats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    /// Two players, one per side.
    Single,
    /// Four players, two per side.
    Pair,
}

impl SessionKind {
    pub fn player_count(self) -> u8 {
        match self {
            Self::Single => 2,
            Self::Pair => 4,
        }
    }
}

/// How the next turn owner is chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnMode {
    Sequential,
    Random,
}

/// Authoritative result of a session, in the rules engine's notation.
/// `*` means still pending.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "*")]
    Pending,
    #[serde(rename = "1-0")]
    WhiteWon,
    #[serde(rename = "0-1")]
    BlackWon,
    #[serde(rename = "1/2-1/2")]
    Draw,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "*",
            Self::WhiteWon => "1-0",
            Self::BlackWon => "0-1",
            Self::Draw => "1/2-1/2",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "*" => Some(Self::Pending),
            "1-0" => Some(Self::WhiteWon),
            "0-1" => Some(Self::BlackWon),
            "1/2-1/2" => Some(Self::Draw),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self != Self::Pending
    }
}

/// One occupied slot: who sits there and where their node listens.
/// Endpoints are stored verbatim — reachability is the mesh's problem.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub player: PlayerId,
    pub endpoint: String,
}

/// A session row. `slots[0]` is slot 1.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub name: String,
    pub kind: SessionKind,
    pub turn_mode: TurnMode,
    pub slots: Vec<Option<Slot>>,
    pub outcome: Outcome,
    /// Slot index (1-based) of the most recent join or rejoin.
    pub last_joiner: u8,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Session {
    pub fn player_count(&self) -> u8 {
        self.kind.player_count()
    }

    /// The occupant of 1-based `slot`, if any.
    pub fn slot(&self, slot: u8) -> Option<&Slot> {
        self.slots.get(usize::from(slot).checked_sub(1)?)?.as_ref()
    }

    /// The 1-based slot `player` occupies, if a member.
    pub fn slot_of(&self, player: PlayerId) -> Option<u8> {
        self.slots.iter().enumerate().find_map(|(i, slot)| {
            slot.as_ref()
                .filter(|s| s.player == player)
                .map(|_| (i + 1) as u8)
        })
    }

    pub fn is_member(&self, player: PlayerId) -> bool {
        self.slot_of(player).is_some()
    }

    /// The lowest free 1-based slot, if the session is not full.
    pub fn next_free_slot(&self) -> Option<u8> {
        self.slots
            .iter()
            .position(Option::is_none)
            .map(|i| (i + 1) as u8)
    }

    pub fn is_full(&self) -> bool {
        self.next_free_slot().is_none()
    }

    /// The stable mesh identity of 1-based `slot`.
    pub fn peer_id(&self, slot: u8) -> PeerId {
        PeerId::new(&self.name, slot)
    }

    /// All occupied slots as `(1-based index, slot)`.
    pub fn occupants(&self) -> impl Iterator<Item = (u8, &Slot)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|s| ((i + 1) as u8, s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session {
            id: 1,
            name: "brave-falcon".into(),
            kind: SessionKind::Pair,
            turn_mode: TurnMode::Sequential,
            slots: vec![
                Some(Slot {
                    player: PlayerId(10),
                    endpoint: "127.0.0.1:9001".into(),
                }),
                None,
                Some(Slot {
                    player: PlayerId(30),
                    endpoint: "127.0.0.1:9003".into(),
                }),
                None,
            ],
            outcome: Outcome::Pending,
            last_joiner: 3,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn slots_are_one_based() {
        let s = session();
        assert_eq!(s.slot(1).unwrap().player, PlayerId(10));
        assert!(s.slot(2).is_none());
        assert_eq!(s.slot_of(PlayerId(30)), Some(3));
        assert_eq!(s.next_free_slot(), Some(2));
        assert_eq!(s.peer_id(3).as_str(), "brave-falcon-3");
    }

    #[test]
    fn slot_zero_and_out_of_range_are_empty() {
        let s = session();
        assert!(s.slot(0).is_none());
        assert!(s.slot(5).is_none());
    }

    #[test]
    fn outcome_strings_round_trip() {
        for outcome in [
            Outcome::Pending,
            Outcome::WhiteWon,
            Outcome::BlackWon,
            Outcome::Draw,
        ] {
            assert_eq!(Outcome::parse(outcome.as_str()), Some(outcome));
            let json = serde_json::to_string(&outcome).unwrap();
            assert_eq!(json, format!("\"{}\"", outcome.as_str()));
        }
        assert_eq!(Outcome::parse("2-0"), None);
    }

    #[test]
    fn kind_and_mode_use_lowercase_wire_values() {
        assert_eq!(serde_json::to_string(&SessionKind::Pair).unwrap(), "\"pair\"");
        assert_eq!(
            serde_json::to_string(&TurnMode::Sequential).unwrap(),
            "\"sequential\""
        );
    }
}
