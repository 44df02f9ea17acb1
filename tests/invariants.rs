//! Random register/cancel sequences checked against a reference model.
//!
//! After every step: confirmed never exceeds capacity, waitlist
//! positions are exactly `1..=N`, each user holds at most one active
//! registration, no slot stays free while someone waits, and a freed
//! slot always goes to waitlist position 1.

#![allow(clippy::panic, clippy::indexing_slicing)]

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

use rsvp_gateway::domain::{EventBus, EventId, RegistrationStatus, UserId};
use rsvp_gateway::error::RegistrationError;
use rsvp_gateway::persistence::MemoryStore;
use rsvp_gateway::service::{NewEvent, RegistrationService};

const USERS: usize = 8;

#[derive(Debug, Clone, Copy)]
enum Op {
    Register(usize),
    Cancel(usize),
    HostRegister,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        5 => (0..USERS).prop_map(Op::Register),
        4 => (0..USERS).prop_map(Op::Cancel),
        1 => Just(Op::HostRegister),
    ]
}

/// Expected state: confirmed users (unordered) and the waitlist in
/// position order.
#[derive(Debug, Default)]
struct Model {
    confirmed: Vec<usize>,
    waitlist: Vec<usize>,
    ever_registered: HashSet<usize>,
}

async fn run_sequence(capacity: u32, ops: Vec<Op>) -> Result<(), TestCaseError> {
    let service = RegistrationService::new(MemoryStore::new(), Arc::new(EventBus::new(1024)));
    let host = UserId::new();
    let users: Vec<UserId> = (0..USERS).map(|_| UserId::new()).collect();
    let input = NewEvent {
        title: "Property check".to_string(),
        capacity,
        starts_at: Utc::now(),
    };
    let Ok(event) = service.create_event(host, input).await else {
        return Err(TestCaseError::fail("event creation failed"));
    };
    let cap = usize::try_from(capacity).unwrap_or(usize::MAX);
    let mut model = Model::default();

    for op in ops {
        match op {
            Op::HostRegister => {
                let result = service.register(event.id, host).await;
                prop_assert!(matches!(result, Err(RegistrationError::HostCannotRegister)));
            }
            Op::Register(u) => {
                let result = service.register(event.id, users[u]).await;
                if model.confirmed.contains(&u) || model.waitlist.contains(&u) {
                    prop_assert!(matches!(result, Err(RegistrationError::AlreadyRegistered)));
                } else {
                    let registration = match result {
                        Ok(registration) => registration,
                        Err(e) => return Err(TestCaseError::fail(format!("register failed: {e}"))),
                    };
                    model.ever_registered.insert(u);
                    if model.confirmed.len() < cap {
                        model.confirmed.push(u);
                        prop_assert_eq!(registration.status, RegistrationStatus::Confirmed);
                    } else {
                        model.waitlist.push(u);
                        prop_assert_eq!(registration.status, RegistrationStatus::Waitlist);
                        prop_assert_eq!(
                            registration.waitlist_position,
                            u32::try_from(model.waitlist.len()).ok()
                        );
                    }
                }
            }
            Op::Cancel(u) => {
                let result = service.cancel_registration(event.id, users[u]).await;
                if let Some(idx) = model.confirmed.iter().position(|&c| c == u) {
                    let outcome = match result {
                        Ok(outcome) => outcome,
                        Err(e) => return Err(TestCaseError::fail(format!("cancel failed: {e}"))),
                    };
                    model.confirmed.remove(idx);
                    if model.waitlist.is_empty() {
                        prop_assert!(outcome.promoted.is_none());
                    } else {
                        let head = model.waitlist.remove(0);
                        model.confirmed.push(head);
                        let promoted = outcome.promoted.map(|p| p.user_id);
                        prop_assert_eq!(promoted, Some(users[head]));
                    }
                } else if let Some(idx) = model.waitlist.iter().position(|&w| w == u) {
                    let outcome = match result {
                        Ok(outcome) => outcome,
                        Err(e) => return Err(TestCaseError::fail(format!("cancel failed: {e}"))),
                    };
                    model.waitlist.remove(idx);
                    prop_assert!(outcome.promoted.is_none());
                } else if model.ever_registered.contains(&u) {
                    prop_assert!(matches!(result, Err(RegistrationError::AlreadyCancelled)));
                } else {
                    prop_assert!(matches!(result, Err(RegistrationError::RegistrationNotFound)));
                }
            }
        }

        check_invariants(&service, event.id, capacity, &users, &model).await?;
    }
    Ok(())
}

async fn check_invariants(
    service: &RegistrationService<MemoryStore>,
    event_id: EventId,
    capacity: u32,
    users: &[UserId],
    model: &Model,
) -> Result<(), TestCaseError> {
    let rows = service.store().all_registrations(event_id).await;

    let confirmed: HashSet<UserId> = rows
        .iter()
        .filter(|r| r.status == RegistrationStatus::Confirmed)
        .map(|r| r.user_id)
        .collect();
    let confirmed_rows = rows
        .iter()
        .filter(|r| r.status == RegistrationStatus::Confirmed)
        .count();
    prop_assert!(u32::try_from(confirmed_rows).unwrap_or(u32::MAX) <= capacity);
    prop_assert_eq!(confirmed_rows, confirmed.len());

    let mut waitlisted: Vec<_> = rows
        .iter()
        .filter(|r| r.status == RegistrationStatus::Waitlist)
        .map(|r| (r.waitlist_position, r.user_id))
        .collect();
    waitlisted.sort();
    for (expected, (position, _)) in (1u32..).zip(&waitlisted) {
        prop_assert_eq!(*position, Some(expected));
    }
    prop_assert!(
        rows.iter()
            .filter(|r| r.status != RegistrationStatus::Waitlist)
            .all(|r| r.waitlist_position.is_none())
    );

    let mut seen = HashSet::new();
    for row in rows.iter().filter(|r| r.is_active()) {
        prop_assert!(seen.insert(row.user_id), "user holds two active registrations");
    }

    if !waitlisted.is_empty() {
        prop_assert_eq!(u32::try_from(confirmed_rows).ok(), Some(capacity));
    }

    let expected_confirmed: HashSet<UserId> = model.confirmed.iter().map(|&u| users[u]).collect();
    prop_assert_eq!(confirmed, expected_confirmed);
    let expected_waitlist: Vec<UserId> = model.waitlist.iter().map(|&u| users[u]).collect();
    let actual_waitlist: Vec<UserId> = waitlisted.into_iter().map(|(_, user)| user).collect();
    prop_assert_eq!(actual_waitlist, expected_waitlist);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn registration_sequences_preserve_invariants(
        capacity in 1u32..4,
        ops in proptest::collection::vec(op_strategy(), 1..40),
    ) {
        let Ok(rt) = tokio::runtime::Builder::new_current_thread().enable_all().build() else {
            panic!("runtime build failed");
        };
        rt.block_on(run_sequence(capacity, ops))?;
    }
}
