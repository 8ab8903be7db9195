// End-to-end scenarios for the coordination platform.
//
// Each test runs real nodes: a shared in-process directory, real TCP meshes
// on loopback, and the full coordinator event loop. Only the rules engine
// is scripted (`ScriptedRules` from the harness crate) — the platform never
// interprets moves anyway.

use std::sync::Arc;

use gambit_directory::{
    Directory, DirectoryClient, LocalClient, Outcome, PlayerId, SessionKind, TurnMode,
};
use gambit_game::coordinator::Phase;
use gambit_game::runner::{start_host, start_joiner, start_restore, CoordinatorHandle};
use gambit_game::{SeededRand, SystemClock};
use session_tests::{wait_for_history, wait_for_phase, wait_until, ScriptedRules};

const HOST: &str = "127.0.0.1";

fn client(directory: &Arc<Directory>, player: i64) -> Arc<LocalClient> {
    Arc::new(LocalClient::new(directory.clone(), PlayerId(player)))
}

fn rules() -> Box<ScriptedRules> {
    Box::new(ScriptedRules::open_ended())
}

fn rand(seed: u64) -> Box<SeededRand> {
    Box::new(SeededRand::new(seed))
}

fn clock() -> Arc<SystemClock> {
    Arc::new(SystemClock)
}

/// Scenario: two players, sequential turns, played to a recorded win.
#[test]
fn two_player_sequential_happy_path() {
    let directory = Arc::new(Directory::new());
    let alice = client(&directory, 1);
    let bob = client(&directory, 2);

    let host = start_host(
        alice.clone(),
        Box::new(ScriptedRules::ending_with("f7f8", Outcome::WhiteWon)),
        rand(1),
        clock(),
        HOST,
        SessionKind::Single,
        TurnMode::Sequential,
    )
    .unwrap();
    let name = host.session().name.clone();
    let session_id = host.session().id;

    let joiner = start_joiner(
        bob.clone(),
        Box::new(ScriptedRules::ending_with("f7f8", Outcome::WhiteWon)),
        rand(2),
        clock(),
        HOST,
        &name,
    )
    .unwrap();
    assert_eq!(joiner.session().last_joiner, 2);

    // Sequential election: slot 1 starts; the joiner learns it from
    // define-turn.
    wait_for_phase(&host, Phase::MyTurn);
    wait_for_phase(&joiner, Phase::PeerTurn);

    host.play("e2e4");
    wait_for_history(&joiner, &["e2e4"]);
    wait_for_phase(&joiner, Phase::MyTurn);
    wait_for_phase(&host, Phase::PeerTurn);

    joiner.play("e7e5");
    wait_for_history(&host, &["e2e4", "e7e5"]);
    wait_for_phase(&host, Phase::MyTurn);

    // The finishing move ends the game on both sides.
    host.play("f7f8");
    wait_for_phase(&host, Phase::Ended);
    wait_for_phase(&joiner, Phase::Ended);
    assert_eq!(host.status().outcome, Some(Outcome::WhiteWon));
    assert_eq!(joiner.status().outcome, Some(Outcome::WhiteWon));

    // The directory holds the authoritative result.
    let row = alice.get_session(session_id).unwrap();
    assert_eq!(row.outcome, Outcome::WhiteWon);

    host.shutdown();
    joiner.shutdown();
}

/// Scenario: four players, random turn mode. The first turn goes to a
/// white-side slot and every node agrees on the owner.
#[test]
fn pair_random_elects_from_the_white_side() {
    let directory = Arc::new(Directory::new());
    let host_client = client(&directory, 1);

    let host = start_host(
        host_client,
        rules(),
        rand(7),
        clock(),
        HOST,
        SessionKind::Pair,
        TurnMode::Random,
    )
    .unwrap();
    let name = host.session().name.clone();

    let joiners: Vec<CoordinatorHandle> = (2..=4)
        .map(|player| {
            start_joiner(
                client(&directory, player),
                rules(),
                rand(player as u64),
                clock(),
                HOST,
                &name,
            )
            .unwrap()
        })
        .collect();

    let playing = |phase: Phase| matches!(phase, Phase::MyTurn | Phase::PeerTurn);
    wait_until(&host, "host playing", |s| playing(s.phase));
    for joiner in &joiners {
        wait_until(joiner, "joiner playing", |s| playing(s.phase));
    }

    let owner = host.status().turn.expect("host knows the turn owner");
    let owner_slot = owner.slot().expect("owner id carries a slot");
    assert!(
        [1, 3].contains(&owner_slot),
        "first turn went to black-side slot {owner_slot}"
    );

    // Everyone agrees, and exactly the owner is in MyTurn.
    let mut my_turn_count = 0;
    for node in std::iter::once(&host).chain(joiners.iter()) {
        let status = node.status();
        assert_eq!(status.turn.as_ref(), Some(&owner));
        if status.phase == Phase::MyTurn {
            my_turn_count += 1;
        }
    }
    assert_eq!(my_turn_count, 1);

    host.shutdown();
    for joiner in joiners {
        joiner.shutdown();
    }
}

/// Scenario: abandoning finalizes the abandoner's losing outcome and ends
/// the game everywhere; the peer learns the result from the directory.
#[test]
fn abandon_finalizes_and_propagates() {
    let directory = Arc::new(Directory::new());
    let alice = client(&directory, 1);
    let bob = client(&directory, 2);

    let host = start_host(
        alice.clone(),
        rules(),
        rand(1),
        clock(),
        HOST,
        SessionKind::Single,
        TurnMode::Sequential,
    )
    .unwrap();
    let name = host.session().name.clone();
    let session_id = host.session().id;

    let joiner = start_joiner(bob, rules(), rand(2), clock(), HOST, &name).unwrap();
    wait_for_phase(&host, Phase::MyTurn);
    wait_for_phase(&joiner, Phase::PeerTurn);

    // Bob sits on the black side; resigning hands white the win.
    joiner.abandon();
    wait_for_phase(&joiner, Phase::Ended);
    wait_for_phase(&host, Phase::Ended);

    assert_eq!(joiner.status().outcome, Some(Outcome::WhiteWon));
    assert_eq!(host.status().outcome, Some(Outcome::WhiteWon));
    assert_eq!(
        alice.get_session(session_id).unwrap().outcome,
        Outcome::WhiteWon
    );

    host.shutdown();
    joiner.shutdown();
}

/// Scenario: a crashed node restores mid-game. It re-registers a fresh
/// endpoint, reconnects, receives the full history from a surviving peer,
/// and play continues.
#[test]
fn restore_replays_history_and_continues() {
    let directory = Arc::new(Directory::new());
    let alice = client(&directory, 1);
    let bob = client(&directory, 2);

    let host = start_host(
        alice,
        rules(),
        rand(1),
        clock(),
        HOST,
        SessionKind::Single,
        TurnMode::Sequential,
    )
    .unwrap();
    let name = host.session().name.clone();

    let joiner = start_joiner(bob.clone(), rules(), rand(2), clock(), HOST, &name).unwrap();
    wait_for_phase(&host, Phase::MyTurn);
    wait_for_phase(&joiner, Phase::PeerTurn);

    host.play("e2e4");
    wait_for_history(&joiner, &["e2e4"]);
    joiner.play("e7e5");
    wait_for_history(&host, &["e2e4", "e7e5"]);

    // Bob's process dies and comes back empty on a new port.
    joiner.shutdown();
    let restored = start_restore(bob, rules(), rand(3), clock(), HOST, &name).unwrap();
    assert_eq!(restored.session().last_joiner, 2);

    // First ack wins: the whole history is replayed exactly once, and the
    // resent turn owner puts Bob back in sync (it is Alice's move).
    wait_for_history(&restored, &["e2e4", "e7e5"]);
    wait_for_phase(&restored, Phase::PeerTurn);

    // Play continues across the restored link.
    host.play("g1f3");
    wait_for_history(&restored, &["e2e4", "e7e5", "g1f3"]);
    wait_for_phase(&restored, Phase::MyTurn);

    host.shutdown();
    restored.shutdown();
}

/// Scenario: a second join on a full session is rejected for strangers but
/// refreshes a member's endpoint.
#[test]
fn full_session_join_rules() {
    let directory = Arc::new(Directory::new());
    let alice = client(&directory, 1);
    let bob = client(&directory, 2);
    let carol = client(&directory, 3);

    let host = start_host(
        alice,
        rules(),
        rand(1),
        clock(),
        HOST,
        SessionKind::Single,
        TurnMode::Sequential,
    )
    .unwrap();
    let name = host.session().name.clone();

    let joiner = start_joiner(bob.clone(), rules(), rand(2), clock(), HOST, &name).unwrap();
    wait_for_phase(&joiner, Phase::PeerTurn);

    let err = carol.join_session(&name, "127.0.0.1:9999").unwrap_err();
    assert_eq!(err.to_string(), "session-full");

    let refreshed = bob.join_session(&name, "127.0.0.1:4242").unwrap();
    assert_eq!(refreshed.slot(2).unwrap().endpoint, "127.0.0.1:4242");

    host.shutdown();
    joiner.shutdown();
}
