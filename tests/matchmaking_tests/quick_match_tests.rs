//! Tests for quick match pairing
//!
//! These tests verify:
//! - Oldest waiting players are paired first
//! - Both players hear about their opponent after their LOOKING answer
//! - Busy, duplicate and cancel requests
//! - A full game pool leaves players waiting
//! - The waiting list always agrees with the session statuses

#[path = "../common/mod.rs"]
mod common;

use std::thread;

use common::{test_config, Harness};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use skirmish::error::DisconnectReason;
use skirmish::protocol::user::{
    CancelQuickMatchAnswer, LaunchMatchAnswer, QuickMatchAnswer, UserAnswer, UserRequest,
};
use skirmish::protocol::SystemNotice;
use skirmish::session::{QuickMatchStatus, SessionId, SessionStatus};
use skirmish::Role;

// =============================================================================
// Helper Functions
// =============================================================================

fn looking() -> UserAnswer {
    UserAnswer::QuickMatch(QuickMatchAnswer::LookingForOpponent)
}

fn found(opponent: &str) -> UserAnswer {
    UserAnswer::QuickMatch(QuickMatchAnswer::OpponentFound {
        opponent: opponent.to_string(),
    })
}

fn login_all(h: &Harness, ids: &[SessionId]) {
    for &id in ids {
        h.login_user(id, &format!("player{}", id));
    }
}

/// Every logged session is in the list exactly when it is looking
fn assert_waiting_list_consistent(h: &Harness, ids: &[SessionId]) {
    let waiting = h.data.quick_match().waiting_ids();
    for &id in ids {
        let looking = h.quick_match_status(id) == QuickMatchStatus::LookingForOpponent;
        let occurrences = waiting.iter().filter(|&&waiting_id| waiting_id == id).count();
        assert_eq!(
            occurrences,
            usize::from(looking),
            "session {} status {} but listed {} times",
            id,
            h.quick_match_status(id),
            occurrences
        );
        if h.quick_match_status(id).requires_match() {
            assert!(h.match_id(id).is_some(), "session {} lost its match", id);
        }
    }
}

// =============================================================================
// Pairing Tests
// =============================================================================

#[test]
fn test_pairs_in_arrival_order() {
    let h = Harness::new();
    login_all(&h, &[0, 1, 2, 3]);
    for id in [2, 0, 3, 1] {
        h.user(id, UserRequest::QuickMatch);
    }

    assert_eq!(h.data.quick_match().waiting_ids(), vec![2, 0, 3, 1]);
    assert_eq!(h.data.run_pairing_pass(), 2);
    assert_eq!(h.data.quick_match().waiting_len(), 0);

    assert_eq!(h.users.user_answers(2), vec![looking(), found("player0")]);
    assert_eq!(h.users.user_answers(0), vec![looking(), found("player2")]);
    assert_eq!(h.users.user_answers(3), vec![looking(), found("player1")]);
    assert_eq!(h.users.user_answers(1), vec![looking(), found("player3")]);

    assert_eq!(h.match_id(2), h.match_id(0));
    assert_eq!(h.match_id(3), h.match_id(1));
    assert_ne!(h.match_id(2), h.match_id(3));
    for id in 0..4 {
        assert_eq!(h.quick_match_status(id), QuickMatchStatus::OpponentFound);
    }
    assert_eq!(h.data.games().len(), 2);
}

#[test]
fn test_odd_player_keeps_waiting() {
    let h = Harness::new();
    login_all(&h, &[0, 1, 2]);
    for id in 0..3 {
        h.user(id, UserRequest::QuickMatch);
    }

    assert_eq!(h.data.run_pairing_pass(), 1);
    assert_eq!(h.data.quick_match().waiting_ids(), vec![2]);
    assert_eq!(h.quick_match_status(2), QuickMatchStatus::LookingForOpponent);
    assert_eq!(h.users.user_answers(2), vec![looking()]);

    // A later arrival is paired with the leftover player
    login_all(&h, &[3]);
    h.user(3, UserRequest::QuickMatch);
    assert_eq!(h.data.run_pairing_pass(), 1);
    assert_eq!(h.users.user_answers(2), vec![looking(), found("player3")]);
}

#[test]
fn test_single_player_is_not_paired() {
    let h = Harness::new();
    login_all(&h, &[0]);
    h.user(0, UserRequest::QuickMatch);

    assert_eq!(h.data.run_pairing_pass(), 0);
    assert!(h.data.quick_match().contains(0));
    assert!(h.data.games().is_empty());
}

#[test]
fn test_pool_full_keeps_players_waiting() {
    let h = Harness::new();
    login_all(&h, &[0, 1, 2, 3, 4, 5]);
    for id in 0..4 {
        h.user(id, UserRequest::QuickMatch);
    }
    assert_eq!(h.data.run_pairing_pass(), 2);
    assert!(h.data.games().is_full());

    h.user(4, UserRequest::QuickMatch);
    h.user(5, UserRequest::QuickMatch);
    assert_eq!(h.data.run_pairing_pass(), 0);
    assert_eq!(h.data.quick_match().waiting_ids(), vec![4, 5]);
    assert_eq!(h.quick_match_status(4), QuickMatchStatus::LookingForOpponent);

    // Both players of the first match decline, freeing a pool slot
    h.user(0, UserRequest::LaunchMatch { accept: false });
    h.user(1, UserRequest::LaunchMatch { accept: false });
    assert_eq!(h.data.games().len(), 1);

    assert_eq!(h.data.run_pairing_pass(), 1);
    assert_eq!(h.users.user_answers(4), vec![looking(), found("player5")]);
}

// =============================================================================
// Request Tests
// =============================================================================

#[test]
fn test_second_request_is_already_looking() {
    let h = Harness::new();
    login_all(&h, &[0]);
    h.user(0, UserRequest::QuickMatch);
    h.user(0, UserRequest::QuickMatch);

    assert_eq!(
        h.users.user_answers(0),
        vec![
            looking(),
            UserAnswer::QuickMatch(QuickMatchAnswer::AlreadyLookingForOpponent)
        ]
    );
    assert_eq!(h.data.quick_match().waiting_ids(), vec![0]);
}

#[test]
fn test_request_in_match_is_already_looking() {
    let h = Harness::new();
    h.paired((0, "alice"), (1, "bob"));
    h.user(0, UserRequest::QuickMatch);

    assert_eq!(
        h.users.user_answers(0),
        vec![UserAnswer::QuickMatch(QuickMatchAnswer::AlreadyLookingForOpponent)]
    );
    assert_eq!(h.quick_match_status(0), QuickMatchStatus::OpponentFound);
}

#[test]
fn test_full_waiting_list_is_busy() {
    let h = Harness::new();
    login_all(&h, &[0, 1, 2, 3, 4]);
    for id in 0..4 {
        h.user(id, UserRequest::QuickMatch);
    }
    h.user(4, UserRequest::QuickMatch);

    assert_eq!(
        h.users.user_answers(4),
        vec![UserAnswer::QuickMatch(QuickMatchAnswer::ServerBusy)]
    );
    assert_eq!(h.quick_match_status(4), QuickMatchStatus::NotWaiting);
    assert!(!h.data.quick_match().contains(4));
    assert!(!h.users.was_disconnected(4));
}

// =============================================================================
// Cancel Tests
// =============================================================================

#[test]
fn test_cancel_while_looking() {
    let h = Harness::new();
    login_all(&h, &[0, 1]);
    h.user(0, UserRequest::QuickMatch);
    h.user(1, UserRequest::QuickMatch);
    h.user(0, UserRequest::CancelQuickMatch);

    assert_eq!(
        h.users.last_user_answer(0),
        Some(UserAnswer::CancelQuickMatch(CancelQuickMatchAnswer::QuickMatchCancelled))
    );
    assert_eq!(h.quick_match_status(0), QuickMatchStatus::NotWaiting);
    assert_eq!(h.data.quick_match().waiting_ids(), vec![1]);
    assert_eq!(h.data.run_pairing_pass(), 0);

    // The player may queue again
    h.user(0, UserRequest::QuickMatch);
    assert_eq!(h.users.last_user_answer(0), Some(looking()));
    assert_eq!(h.data.quick_match().waiting_ids(), vec![1, 0]);
}

#[test]
fn test_cancel_when_not_looking_is_dropped() {
    let h = Harness::new();
    login_all(&h, &[0]);
    h.user(0, UserRequest::CancelQuickMatch);

    assert!(h.users.user_answers(0).is_empty());
    assert_eq!(
        h.users.notices(0),
        vec![SystemNotice::Disconnected {
            reason: DisconnectReason::WrongProtocol
        }]
    );
    assert_eq!(h.user_status(0), SessionStatus::Closed);
}

#[test]
fn test_cancel_in_match_is_refused_and_dropped() {
    let h = Harness::new();
    h.paired((0, "alice"), (1, "bob"));
    h.user(0, UserRequest::CancelQuickMatch);

    assert_eq!(
        h.users.user_answers(0),
        vec![UserAnswer::CancelQuickMatch(CancelQuickMatchAnswer::AlreadyInMatch)]
    );
    assert!(h.users.was_disconnected(0));
    assert_eq!(h.user_status(0), SessionStatus::Closed);

    // The opponent still has to answer the launch
    assert_eq!(h.quick_match_status(1), QuickMatchStatus::OpponentFound);
    assert_eq!(h.data.games().len(), 1);

    h.user(1, UserRequest::LaunchMatch { accept: true });
    assert_eq!(
        h.users.user_answers(1),
        vec![UserAnswer::LaunchMatch(LaunchMatchAnswer::OpponentCancelled)]
    );
    assert_eq!(h.quick_match_status(1), QuickMatchStatus::NotWaiting);
    assert!(h.data.games().is_empty());
}

#[test]
fn test_cancel_in_match_to_unreachable_client_still_drops() {
    let h = Harness::new();
    h.paired((0, "alice"), (1, "bob"));
    h.users.fail_sends_to(0);
    h.user(0, UserRequest::CancelQuickMatch);

    assert!(h.users.frames(0).is_empty());
    assert!(h.users.was_disconnected(0));
    assert_eq!(h.user_status(0), SessionStatus::Closed);
    assert_eq!(h.quick_match_status(1), QuickMatchStatus::OpponentFound);
}

#[test]
fn test_close_leaves_waiting_list() {
    let h = Harness::new();
    login_all(&h, &[0, 1, 2]);
    for id in 0..3 {
        h.user(id, UserRequest::QuickMatch);
    }
    h.close(Role::User, 0);

    assert_eq!(h.data.quick_match().waiting_ids(), vec![1, 2]);
    assert_eq!(h.data.run_pairing_pass(), 1);
    assert_eq!(h.users.user_answers(1), vec![looking(), found("player2")]);
}

// =============================================================================
// Invariant Tests
// =============================================================================

#[test]
fn test_random_requests_keep_list_consistent() {
    let mut config = test_config();
    config.max_waiting_players = 6;
    config.max_live_matches = 3;
    let h = Harness::with_config(config);
    let ids: Vec<SessionId> = (0..8).collect();
    login_all(&h, &ids);

    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..300 {
        let id = ids[rng.gen_range(0..ids.len())];
        match rng.gen_range(0..4) {
            0 | 1 => h.user(id, UserRequest::QuickMatch),
            2 => {
                if h.quick_match_status(id) == QuickMatchStatus::LookingForOpponent {
                    h.user(id, UserRequest::CancelQuickMatch);
                }
            }
            _ => {
                h.data.run_pairing_pass();
            }
        }
        assert_waiting_list_consistent(&h, &ids);
    }

    for &id in &ids {
        assert!(!h.users.was_disconnected(id), "session {} was dropped", id);
    }
}

#[test]
fn test_concurrent_requests_and_cancels() {
    const PLAYERS: usize = 12;

    let mut config = test_config();
    config.max_user_sessions = PLAYERS;
    config.max_waiting_players = PLAYERS;
    config.max_live_matches = PLAYERS / 2;
    let h = Harness::with_config(config);
    let ids: Vec<SessionId> = (0..PLAYERS).collect();
    login_all(&h, &ids);

    thread::scope(|scope| {
        for chunk in ids.chunks(3) {
            let h = &h;
            scope.spawn(move || {
                let mut rng = rand::thread_rng();
                for _ in 0..100 {
                    for &id in chunk {
                        let session = h.data.users().manager().get_session(id).unwrap();
                        if rng.gen_bool(0.6) {
                            h.data.quick_match().request(session).unwrap();
                        } else {
                            // Fails when the session is not looking, which is fine here
                            let _ = h.data.quick_match().cancel(session);
                        }
                    }
                    thread::yield_now();
                }
            });
        }
        scope.spawn(|| {
            for _ in 0..50 {
                h.data.run_pairing_pass();
                thread::yield_now();
            }
        });
    });

    assert_waiting_list_consistent(&h, &ids);

    // Paired players share their match with exactly one other player
    for &id in &ids {
        if let Some(match_id) = h.match_id(id) {
            let partners = ids
                .iter()
                .filter(|&&other| other != id && h.match_id(other) == Some(match_id))
                .count();
            assert_eq!(partners, 1, "match {} is not a pair", match_id);
            assert!(h.data.games().get(match_id).is_some());
        }
    }
}
