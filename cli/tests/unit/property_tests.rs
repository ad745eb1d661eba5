//! Property-based tests for the reconciliation planner.
//!
//! Uses `proptest` to feed arbitrary observation sequences to a planner and
//! check its request discipline.

#![allow(clippy::expect_used)]

use proptest::prelude::*;

use ecsup::domain::reconcile::{Action, Outcome, Planner, Step};
use ecsup::domain::{DesiredState, Instance, InstanceStatus, Locator};

use crate::fakes::{ADDRESS, instance};

fn status() -> impl Strategy<Value = InstanceStatus> {
    prop_oneof![
        Just(InstanceStatus::Starting),
        Just(InstanceStatus::Running),
        Just(InstanceStatus::Stopping),
        Just(InstanceStatus::Stopped),
        Just(InstanceStatus::Unknown),
    ]
}

/// One present observation: status plus whether an address is assigned.
fn present() -> impl Strategy<Value = Instance> {
    (status(), any::<bool>()).prop_map(|(status, has_address)| {
        instance("i-1", "build-01", status, has_address.then_some(ADDRESS))
    })
}

/// Absent (`None`) about a third of the time.
fn observation() -> impl Strategy<Value = Option<Instance>> {
    prop_oneof![1 => Just(None), 2 => present().prop_map(Some)]
}

fn planner(desired: DesiredState) -> Planner {
    Planner::new(desired, &Locator::Name("build-01".to_string()))
}

fn is_up(observed: Option<&Instance>) -> bool {
    observed.is_some_and(|i| i.status == InstanceStatus::Running && i.address().is_some())
}

proptest! {
    /// Up finishes exactly at the first Running-with-address observation, and
    /// an accepted create is never followed by another, however the listing
    /// flickers.
    #[test]
    fn prop_up_done_iff_running_with_address(seq in prop::collection::vec(observation(), 1..40)) {
        let mut p = planner(DesiredState::Up);
        let mut creates = 0;
        for observed in &seq {
            let observed = observed.as_ref();
            match p.observe(observed) {
                Step::Done(Outcome::Up { address, .. }) => {
                    prop_assert!(is_up(observed));
                    prop_assert_eq!(address, ADDRESS);
                    break;
                }
                Step::Done(other) => prop_assert!(false, "unexpected outcome {other:?}"),
                Step::Fail(e) => prop_assert!(false, "up never fails on its own: {e}"),
                Step::Wait(_) => prop_assert!(!is_up(observed)),
                Step::Issue(action) => {
                    prop_assert!(!is_up(observed));
                    if action == Action::Create {
                        prop_assert!(observed.is_none());
                        creates += 1;
                        prop_assert!(creates <= 1, "duplicate create");
                    }
                    p.record(&action, true);
                }
            }
        }
    }

    /// Down over a present instance finishes iff Stopped is observed and only
    /// ever stops a Running instance.
    #[test]
    fn prop_down_stops_only_running(seq in prop::collection::vec(present(), 1..40)) {
        let mut p = planner(DesiredState::Down);
        for observed in &seq {
            match p.observe(Some(observed)) {
                Step::Done(outcome) => {
                    prop_assert_eq!(observed.status, InstanceStatus::Stopped);
                    prop_assert_eq!(outcome, Outcome::Down { found: true });
                    break;
                }
                Step::Issue(action) => {
                    prop_assert_eq!(observed.status, InstanceStatus::Running);
                    prop_assert!(matches!(action, Action::Stop { .. }), "stop issued outside Running");
                    p.record(&action, true);
                }
                Step::Wait(_) => prop_assert_ne!(observed.status, InstanceStatus::Stopped),
                Step::Fail(e) => prop_assert!(false, "down never fails on its own: {e}"),
            }
        }
    }

    /// Delete is requested exactly once however long the instance lingers.
    #[test]
    fn prop_delete_issued_once(tail in prop::collection::vec(present(), 0..40)) {
        let mut p = planner(DesiredState::Deleted);
        let first = instance("i-1", "build-01", InstanceStatus::Stopped, None);
        let mut deletes = 0;
        for observed in std::iter::once(&first).chain(&tail) {
            match p.observe(Some(observed)) {
                Step::Issue(action) => {
                    prop_assert!(matches!(action, Action::Delete { .. }), "only delete may be issued");
                    deletes += 1;
                    p.record(&action, true);
                }
                Step::Wait(_) => {}
                other => prop_assert!(false, "unexpected step {other:?}"),
            }
        }
        prop_assert_eq!(deletes, 1);
        let finished = matches!(p.observe(None), Step::Done(Outcome::Deleted { found: true }));
        prop_assert!(finished);
    }
}

#[test]
fn rejected_create_may_be_retried() {
    let mut p = planner(DesiredState::Up);
    let Step::Issue(action) = p.observe(None) else {
        panic!("expected create");
    };
    p.record(&action, false);
    assert!(matches!(p.observe(None), Step::Issue(Action::Create)));
}
