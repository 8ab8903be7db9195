// Session name generator: readable `adjective-noun` pairs.
//
// Uniform draws from two built-in word lists. No uniqueness guarantee —
// the registry retries on collision, which keeps naming entropy decoupled
// from the authoritative state. Words never contain hyphens, so the slot
// suffix of a derived peer id stays unambiguous.

use rand::Rng;

const ADJECTIVES: [&str; 26] = [
    "amber", "bold", "brave", "calm", "clever", "cosmic", "crimson", "daring", "eager", "fabled",
    "gentle", "gilded", "hidden", "ivory", "jolly", "keen", "lively", "lunar", "mellow", "noble",
    "quiet", "rustic", "silver", "swift", "vivid", "wry",
];

const NOUNS: [&str; 24] = [
    "badger", "beacon", "canyon", "comet", "falcon", "fern", "glacier", "harbor", "heron",
    "knight", "lantern", "maple", "meadow", "orchard", "osprey", "pine", "raven", "reef",
    "sparrow", "summit", "thicket", "tower", "walnut", "willow",
];

/// Draw a session name uniformly from the word lists.
pub fn session_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let adjective = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.gen_range(0..NOUNS.len())];
    format!("{adjective}-{noun}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn name_is_adjective_dash_noun() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let name = session_name(&mut rng);
            let (adjective, noun) = name.split_once('-').unwrap();
            assert!(ADJECTIVES.contains(&adjective));
            assert!(NOUNS.contains(&noun));
        }
    }

    #[test]
    fn words_contain_no_hyphens() {
        // The slot suffix of `<name>-<slot>` must stay parseable.
        for word in ADJECTIVES.iter().chain(NOUNS.iter()) {
            assert!(!word.contains('-'), "{word}");
        }
    }

    #[test]
    fn deterministic_for_a_seeded_rng() {
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        assert_eq!(session_name(&mut a), session_name(&mut b));
    }
}
