//! Transition closure: the state machine accepts exactly the enumerated
//! transitions and rejects everything else.

use wms_core::state_machine::TaskStatus;

use TaskStatus::*;

/// The complete set of legal transitions.
const ALLOWED: &[(TaskStatus, TaskStatus)] = &[
    (Created, Assigned),
    (Created, Cancelled),
    (Assigned, InProgress),
    (Assigned, Cancelled),
    (InProgress, Completed),
    (InProgress, Paused),
    (InProgress, Cancelled),
    (Paused, InProgress),
    (Paused, Cancelled),
];

#[test]
fn transition_closure_is_exact() {
    for from in TaskStatus::ALL {
        for to in TaskStatus::ALL {
            let expected = ALLOWED.contains(&(from, to));
            assert_eq!(
                from.can_transition_to(to),
                expected,
                "{from} -> {to} expected {expected}"
            );
        }
    }
}

#[test]
fn check_transition_reports_both_endpoints() {
    let err = Completed.check_transition(InProgress).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("completed"));
    assert!(message.contains("in_progress"));
}

#[test]
fn active_statuses_are_the_assignment_window() {
    assert!(Assigned.is_active());
    assert!(InProgress.is_active());
    assert!(Paused.is_active());
    assert!(!Created.is_active());
    assert!(!Completed.is_active());
    assert!(!Cancelled.is_active());
    assert!(!Failed.is_active());
}

#[test]
fn terminal_statuses() {
    assert!(Completed.is_terminal());
    assert!(Cancelled.is_terminal());
    assert!(Failed.is_terminal());
    assert!(!Created.is_terminal());
    assert!(!Assigned.is_terminal());
    assert!(!InProgress.is_terminal());
    assert!(!Paused.is_terminal());
}
