// External adapter seams: time and randomness.
//
// `Clock` supplies the unix-second timestamps stamped onto outbound mesh
// envelopes. The trait is the platform-wide time seam defined next to the
// registry (which uses it for row timestamps); it is surfaced here because
// the runner is what wires it into each node's mesh, and tests pin it with
// `ManualClock`.
//
// `RandSource` feeds the turn election only. Slot 1 picks a starter from
// the white side and broadcasts the result; every later turn change is a
// deterministic computation — see `turn.rs` — so this is deliberately the
// one injectable randomness in the coordinator, and tests pin it too.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub use gambit_directory::clock::{Clock, ManualClock, SystemClock};

pub trait RandSource: Send {
    /// Uniform index in `[0, bound)`. `bound` is at least 1.
    fn pick(&mut self, bound: usize) -> usize;
}

/// Entropy-backed source for production nodes.
pub struct ThreadRand;

impl RandSource for ThreadRand {
    fn pick(&mut self, bound: usize) -> usize {
        rand::thread_rng().gen_range(0..bound)
    }
}

/// Seeded source for tests and reproducible elections.
pub struct SeededRand(StdRng);

impl SeededRand {
    pub fn new(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl RandSource for SeededRand {
    fn pick(&mut self, bound: usize) -> usize {
        self.0.gen_range(0..bound)
    }
}
