// Turn ownership arithmetic.
//
// Every node computes the next turn owner locally from the same inputs —
// the mover's slot and the running move count — so turn ownership is never
// re-broadcast after the initial election. That makes the computation's
// determinism load-bearing: in pair-random mode the "random" pick over the
// opposing pair comes from a fixed-algorithm mixer over (session name, move
// index), identical on every platform and peer. Do not substitute a stdlib
// hasher here; its output is not pinned across versions.
//
// Sides: slots {1, 3} play white, {2, 4} play black (in two-player sessions
// just {1} and {2}).

use gambit_directory::{Outcome, SessionKind, TurnMode};

/// The white-side slots for a session kind. The initial election draws
/// from this set.
pub fn white_side(kind: SessionKind) -> &'static [u8] {
    match kind {
        SessionKind::Single => &[1],
        SessionKind::Pair => &[1, 3],
    }
}

pub fn black_side(kind: SessionKind) -> &'static [u8] {
    match kind {
        SessionKind::Single => &[2],
        SessionKind::Pair => &[2, 4],
    }
}

pub fn is_white(kind: SessionKind, slot: u8) -> bool {
    white_side(kind).contains(&slot)
}

/// The side a mover's move hands the turn to.
fn opposing_side(kind: SessionKind, mover: u8) -> &'static [u8] {
    if is_white(kind, mover) {
        black_side(kind)
    } else {
        white_side(kind)
    }
}

/// The slot that owns the turn after `mover` completes move number
/// `move_index` (1-based count of applied moves).
pub fn next_slot(
    kind: SessionKind,
    mode: TurnMode,
    mover: u8,
    session_name: &str,
    move_index: u32,
) -> u8 {
    match (kind, mode) {
        (SessionKind::Single, _) => {
            if mover == 1 {
                2
            } else {
                1
            }
        }
        (SessionKind::Pair, TurnMode::Sequential) => mover % 4 + 1,
        (SessionKind::Pair, TurnMode::Random) => {
            let side = opposing_side(kind, mover);
            let index = (mix(session_name, move_index) % side.len() as u64) as usize;
            side[index]
        }
    }
}

/// The outcome recorded when the player in `slot` abandons: a loss for
/// their own side.
pub fn losing_outcome(kind: SessionKind, slot: u8) -> Outcome {
    if is_white(kind, slot) {
        Outcome::BlackWon
    } else {
        Outcome::WhiteWon
    }
}

/// Portable deterministic mixer: FNV-1a fold of the session name and move
/// index, scrambled once with SplitMix64.
fn mix(session_name: &str, move_index: u32) -> u64 {
    let mut acc: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in session_name.bytes() {
        acc = (acc ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3);
    }
    acc = (acc ^ u64::from(move_index)).wrapping_mul(0x0000_0100_0000_01b3);
    splitmix64(acc)
}

fn splitmix64(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
