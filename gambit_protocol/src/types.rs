// Core identity types for the peer protocol.
//
// `PeerId` is the stable logical identity of a mesh participant, derived from
// authoritative directory state as `<session-name>-<slot>`. It survives
// reconnects — the remote TCP address is never used as an identity (it
// changes every time a peer redials from a fresh ephemeral port).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical identity of a mesh participant: `<session-name>-<slot>`.
///
/// Session names themselves contain hyphens (`brave-falcon`), so the slot is
/// always the final hyphen-separated component.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Derive the peer id for `slot` within the session called `session`.
    pub fn new(session: &str, slot: u8) -> Self {
        Self(format!("{session}-{slot}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The slot component, if this id ends in `-<digits>`.
    pub fn slot(&self) -> Option<u8> {
        let (_, tail) = self.0.rsplit_once('-')?;
        tail.parse().ok()
    }

    /// The session-name component, if this id ends in `-<digits>`.
    pub fn session(&self) -> Option<&str> {
        let (head, tail) = self.0.rsplit_once('-')?;
        tail.parse::<u8>().ok()?;
        Some(head)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}
