//! Tests for the match lifecycle
//!
//! These tests verify:
//! - Launch acknowledgement, both accepting and declining
//! - Loading progress relay and the start of the game
//! - Action relay, rejection and rules-driven finish
//! - Leaving or disconnecting in every match state
//! - Chat relay between the two players
//! - Unreachable or reused player slots are never written to

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use bytes::Bytes;
use common::{test_config, Harness};
use skirmish::game::{MatchState, RulesEngine, RulesFactory, Seat, Verdict};
use skirmish::protocol::user::{
    CancelQuickMatchAnswer, GameCommand, GameCommandAnswer, LaunchMatchAnswer, LoadingAnswer,
    LoadingProgress, UserAnswer, UserRequest,
};
use skirmish::session::{QuickMatchStatus, SessionStatus};
use skirmish::Role;

// =============================================================================
// Helper Functions
// =============================================================================

fn pair(h: &Harness) -> u64 {
    h.paired((0, "alice"), (1, "bob"));
    h.match_id(0).unwrap()
}

/// Paired and both accepted: the match is loading
fn launched(h: &Harness) -> u64 {
    let id = pair(h);
    h.user(0, UserRequest::LaunchMatch { accept: true });
    h.user(1, UserRequest::LaunchMatch { accept: true });
    h.users.clear(0);
    h.users.clear(1);
    id
}

/// Both players loaded: the match is started
fn started(h: &Harness) -> u64 {
    let id = launched(h);
    finish_loading(h, 0);
    finish_loading(h, 1);
    h.users.clear(0);
    h.users.clear(1);
    id
}

fn finish_loading(h: &Harness, id: usize) {
    h.user(
        id,
        UserRequest::Loading {
            progress: LoadingProgress::Finished,
        },
    );
}

fn action(h: &Harness, id: usize, bytes: &'static [u8]) {
    h.user(
        id,
        UserRequest::GameCommand(GameCommand::Action(Bytes::from_static(bytes))),
    );
}

fn leave(h: &Harness, id: usize) {
    h.user(id, UserRequest::GameCommand(GameCommand::LeaveGame));
}

fn chat(h: &Harness, id: usize, text: &str) {
    h.user(id, UserRequest::ChatMessage { text: text.to_string() });
}

fn game(answer: GameCommandAnswer) -> UserAnswer {
    UserAnswer::GameCommand(answer)
}

fn match_state(h: &Harness, match_id: u64) -> MatchState {
    h.data.games().get(match_id).unwrap().state()
}

fn assert_released(h: &Harness, match_id: u64, sessions: &[usize]) {
    assert!(h.data.games().get(match_id).is_none(), "match {} still live", match_id);
    for &id in sessions {
        assert_eq!(h.quick_match_status(id), QuickMatchStatus::NotWaiting);
        assert_eq!(h.match_id(id), None);
    }
}

/// Finishes the match on the first action, the sender wins
#[derive(Default)]
struct FirstActionWins;

impl RulesEngine for FirstActionWins {
    fn on_action(&mut self, seat: Seat, _action: &[u8]) -> Verdict {
        Verdict::Finish { winner: Some(seat) }
    }
}

/// Finishes the match on the first action with a draw
#[derive(Default)]
struct AlwaysDraw;

impl RulesEngine for AlwaysDraw {
    fn on_action(&mut self, _seat: Seat, _action: &[u8]) -> Verdict {
        Verdict::Finish { winner: None }
    }
}

fn rules<R: RulesEngine + Default + 'static>() -> RulesFactory {
    Arc::new(|| Box::new(R::default()) as Box<dyn RulesEngine>)
}

// =============================================================================
// Launch Tests
// =============================================================================

#[test]
fn test_both_accept_starts_loading() {
    let h = Harness::new();
    let match_id = pair(&h);

    h.user(0, UserRequest::LaunchMatch { accept: true });
    assert_eq!(h.quick_match_status(0), QuickMatchStatus::WaitingForOpponent);
    assert!(h.users.user_answers(0).is_empty());
    assert_eq!(match_state(&h, match_id), MatchState::WaitingAck);

    h.user(1, UserRequest::LaunchMatch { accept: true });
    assert_eq!(
        h.users.user_answers(0),
        vec![UserAnswer::LaunchMatch(LaunchMatchAnswer::Launch {
            seat: 1,
            opponent: "bob".to_string(),
        })]
    );
    assert_eq!(
        h.users.user_answers(1),
        vec![UserAnswer::LaunchMatch(LaunchMatchAnswer::Launch {
            seat: 2,
            opponent: "alice".to_string(),
        })]
    );
    assert_eq!(h.quick_match_status(0), QuickMatchStatus::Loading);
    assert_eq!(h.quick_match_status(1), QuickMatchStatus::Loading);
    assert_eq!(match_state(&h, match_id), MatchState::Loading);
}

#[test]
fn test_decline_cancels_for_both() {
    let h = Harness::new();
    let match_id = pair(&h);

    h.user(0, UserRequest::LaunchMatch { accept: true });
    h.user(1, UserRequest::LaunchMatch { accept: false });

    assert_eq!(
        h.users.user_answers(0),
        vec![UserAnswer::LaunchMatch(LaunchMatchAnswer::OpponentCancelled)]
    );
    assert_eq!(
        h.users.user_answers(1),
        vec![UserAnswer::CancelQuickMatch(CancelQuickMatchAnswer::QuickMatchCancelled)]
    );
    assert_released(&h, match_id, &[0, 1]);

    // Both can queue again
    h.user(0, UserRequest::QuickMatch);
    h.user(1, UserRequest::QuickMatch);
    assert_eq!(h.data.run_pairing_pass(), 1);
}

#[test]
fn test_second_launch_answer_is_dropped() {
    let h = Harness::new();
    let match_id = pair(&h);

    h.user(0, UserRequest::LaunchMatch { accept: true });
    h.user(0, UserRequest::LaunchMatch { accept: true });
    assert!(h.users.was_disconnected(0));
    assert_eq!(h.user_status(0), SessionStatus::Closed);
    assert_eq!(match_state(&h, match_id), MatchState::WaitingAck);

    // The dropped player counts as having declined
    h.user(1, UserRequest::LaunchMatch { accept: true });
    assert_eq!(
        h.users.user_answers(1),
        vec![UserAnswer::LaunchMatch(LaunchMatchAnswer::OpponentCancelled)]
    );
    assert_released(&h, match_id, &[1]);
}

// =============================================================================
// Loading Tests
// =============================================================================

#[test]
fn test_loading_progress_and_start() {
    let h = Harness::new();
    let match_id = launched(&h);

    h.user(
        0,
        UserRequest::Loading {
            progress: LoadingProgress::InProgress,
        },
    );
    finish_loading(&h, 0);
    assert_eq!(h.quick_match_status(0), QuickMatchStatus::LoadingFinished);
    assert_eq!(match_state(&h, match_id), MatchState::Loading);

    finish_loading(&h, 1);
    assert_eq!(
        h.users.user_answers(1),
        vec![
            UserAnswer::Loading(LoadingAnswer::OpponentLoading),
            UserAnswer::Loading(LoadingAnswer::OpponentLoadingFinished),
            game(GameCommandAnswer::GameStart),
        ]
    );
    assert_eq!(
        h.users.user_answers(0),
        vec![
            UserAnswer::Loading(LoadingAnswer::OpponentLoadingFinished),
            game(GameCommandAnswer::GameStart),
        ]
    );
    assert_eq!(h.quick_match_status(0), QuickMatchStatus::Fighting);
    assert_eq!(h.quick_match_status(1), QuickMatchStatus::Fighting);
    assert_eq!(match_state(&h, match_id), MatchState::Started);
}

#[test]
fn test_loading_before_launch_is_dropped() {
    let h = Harness::new();
    pair(&h);
    finish_loading(&h, 0);

    assert!(h.users.was_disconnected(0));
    assert_eq!(h.user_status(0), SessionStatus::Closed);
}

// =============================================================================
// Action Tests
// =============================================================================

#[test]
fn test_actions_are_relayed_to_opponent() {
    let h = Harness::new();
    started(&h);

    action(&h, 0, b"move e4");
    action(&h, 1, b"move e5");

    assert_eq!(
        h.users.user_answers(1),
        vec![game(GameCommandAnswer::Action {
            seat: 1,
            action: Bytes::from_static(b"move e4"),
        })]
    );
    assert_eq!(
        h.users.user_answers(0),
        vec![game(GameCommandAnswer::Action {
            seat: 2,
            action: Bytes::from_static(b"move e5"),
        })]
    );
}

#[test]
fn test_rejected_action_only_reaches_sender() {
    let h = Harness::new();
    started(&h);
    action(&h, 0, b"");

    assert_eq!(
        h.users.user_answers(0),
        vec![game(GameCommandAnswer::ActionRejected)]
    );
    assert!(h.users.frames(1).is_empty());
    assert!(!h.users.was_disconnected(0));
}

#[test]
fn test_action_before_start_is_ignored() {
    let h = Harness::new();
    let match_id = launched(&h);
    action(&h, 0, b"too early");

    assert!(h.users.frames(1).is_empty());
    assert!(!h.users.was_disconnected(0));
    assert_eq!(match_state(&h, match_id), MatchState::Loading);
}

#[test]
fn test_rules_finish_with_winner() {
    let h = Harness::with_rules(test_config(), rules::<FirstActionWins>());
    let match_id = started(&h);

    action(&h, 1, b"checkmate");
    assert_eq!(
        h.users.user_answers(0),
        vec![
            game(GameCommandAnswer::Action {
                seat: 2,
                action: Bytes::from_static(b"checkmate"),
            }),
            game(GameCommandAnswer::GameFinished { winner: 2 }),
        ]
    );
    assert_eq!(
        h.users.user_answers(1),
        vec![game(GameCommandAnswer::GameFinished { winner: 2 })]
    );
    assert_eq!(match_state(&h, match_id), MatchState::Finished);

    // Leaving a finished match releases it
    h.users.clear(0);
    leave(&h, 1);
    assert_eq!(
        h.users.user_answers(0),
        vec![game(GameCommandAnswer::PlayerLeft { seat: 2 })]
    );
    assert_released(&h, match_id, &[0, 1]);
    assert_eq!(h.user_status(1), SessionStatus::Logged);
}

#[test]
fn test_rules_finish_with_draw() {
    let h = Harness::with_rules(test_config(), rules::<AlwaysDraw>());
    started(&h);
    action(&h, 0, b"offer draw");

    assert_eq!(
        h.users.last_user_answer(0),
        Some(game(GameCommandAnswer::GameFinished { winner: 0 }))
    );
    assert_eq!(
        h.users.last_user_answer(1),
        Some(game(GameCommandAnswer::GameFinished { winner: 0 }))
    );
}

// =============================================================================
// Chat Tests
// =============================================================================

#[test]
fn test_chat_is_relayed_to_opponent() {
    let h = Harness::new();
    pair(&h);
    chat(&h, 0, "good luck");

    assert_eq!(
        h.users.user_answers(1),
        vec![UserAnswer::ChatMessage {
            seat: 1,
            text: "good luck".to_string(),
        }]
    );
    assert!(h.users.frames(0).is_empty());

    h.user(0, UserRequest::LaunchMatch { accept: true });
    h.user(1, UserRequest::LaunchMatch { accept: true });
    finish_loading(&h, 0);
    finish_loading(&h, 1);
    h.users.clear(0);

    let match_id = h.match_id(0).unwrap();
    chat(&h, 1, "gg");
    assert_eq!(
        h.users.user_answers(0),
        vec![UserAnswer::ChatMessage {
            seat: 2,
            text: "gg".to_string(),
        }]
    );
    assert_eq!(match_state(&h, match_id), MatchState::Started);
}

#[test]
fn test_chat_without_match_is_dropped() {
    let h = Harness::new();
    h.login_user(0, "alice");
    chat(&h, 0, "anyone?");

    assert!(h.users.frames(0).is_empty());
    assert!(!h.users.was_disconnected(0));
    assert_eq!(h.user_status(0), SessionStatus::Logged);
}

#[test]
fn test_chat_to_unreachable_opponent_keeps_sender() {
    let h = Harness::new();
    pair(&h);
    h.users.fail_sends_to(1);
    chat(&h, 0, "hello?");

    assert!(!h.users.was_disconnected(0));
    assert_eq!(h.user_status(0), SessionStatus::Logged);
}

// =============================================================================
// Leave Tests
// =============================================================================

#[test]
fn test_leave_before_launch_declines() {
    let h = Harness::new();
    let match_id = pair(&h);
    leave(&h, 0);
    assert_eq!(match_state(&h, match_id), MatchState::WaitingAck);

    h.user(1, UserRequest::LaunchMatch { accept: true });
    assert_eq!(
        h.users.user_answers(0),
        vec![UserAnswer::CancelQuickMatch(CancelQuickMatchAnswer::QuickMatchCancelled)]
    );
    assert_eq!(
        h.users.user_answers(1),
        vec![UserAnswer::LaunchMatch(LaunchMatchAnswer::OpponentCancelled)]
    );
    assert_released(&h, match_id, &[0, 1]);
}

#[test]
fn test_leave_while_loading_drops_opponent() {
    let h = Harness::new();
    let match_id = launched(&h);
    leave(&h, 1);

    assert_eq!(
        h.users.user_answers(0),
        vec![UserAnswer::Loading(LoadingAnswer::OpponentDropped)]
    );
    assert_released(&h, match_id, &[0, 1]);
}

#[test]
fn test_leave_while_started_forfeits() {
    let h = Harness::new();
    let match_id = started(&h);
    leave(&h, 0);

    assert_eq!(
        h.users.user_answers(1),
        vec![
            game(GameCommandAnswer::GameFinished { winner: 2 }),
            game(GameCommandAnswer::PlayerLeft { seat: 1 }),
        ]
    );
    assert!(h.users.user_answers(0).is_empty());
    assert_released(&h, match_id, &[0, 1]);
    assert_eq!(h.user_status(0), SessionStatus::Logged);
}

// =============================================================================
// Disconnect Tests
// =============================================================================

#[test]
fn test_disconnect_while_loading() {
    let h = Harness::new();
    let match_id = launched(&h);
    h.close(Role::User, 0);

    assert_eq!(
        h.users.user_answers(1),
        vec![UserAnswer::Loading(LoadingAnswer::OpponentDropped)]
    );
    assert_released(&h, match_id, &[1]);
    assert!(h.data.games().is_empty());
}

#[test]
fn test_disconnect_while_started() {
    let h = Harness::new();
    let match_id = started(&h);
    h.close(Role::User, 1);

    assert_eq!(
        h.users.user_answers(0),
        vec![
            game(GameCommandAnswer::GameFinished { winner: 1 }),
            game(GameCommandAnswer::PlayerLeft { seat: 2 }),
        ]
    );
    assert_released(&h, match_id, &[0]);
    assert!(!h.accounts.is_logged("bob"));
}

#[test]
fn test_disconnect_after_accepting() {
    let h = Harness::new();
    let match_id = pair(&h);
    h.user(1, UserRequest::LaunchMatch { accept: true });
    h.close(Role::User, 1);
    assert_eq!(match_state(&h, match_id), MatchState::WaitingAck);

    h.user(0, UserRequest::LaunchMatch { accept: true });
    assert_eq!(
        h.users.user_answers(0),
        vec![UserAnswer::LaunchMatch(LaunchMatchAnswer::OpponentCancelled)]
    );
    assert_released(&h, match_id, &[0]);
}

#[test]
fn test_reused_slot_is_not_written_to() {
    let h = Harness::new();
    let match_id = pair(&h);
    h.close(Role::User, 1);

    // A new player takes over slot 1 before the match settles
    h.login_user(1, "carol");
    h.user(0, UserRequest::LaunchMatch { accept: true });

    assert!(h.users.user_answers(1).is_empty());
    assert_eq!(h.quick_match_status(1), QuickMatchStatus::NotWaiting);
    assert_eq!(h.user_status(1), SessionStatus::Logged);
    assert_released(&h, match_id, &[0]);
}

#[test]
fn test_unreachable_player_is_skipped() {
    let h = Harness::new();
    let match_id = started(&h);
    h.users.fail_sends_to(1);

    action(&h, 0, b"first");
    action(&h, 0, b"second");
    assert!(h.users.frames(1).is_empty());
    assert!(!h.users.was_disconnected(0));
    assert_eq!(match_state(&h, match_id), MatchState::Started);

    leave(&h, 0);
    assert_released(&h, match_id, &[0, 1]);
}
