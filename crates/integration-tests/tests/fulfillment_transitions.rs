//! Fulfillment status axis transition rules.
//!
//! The state machine must only ever move forward along
//! `not_fulfilled -> fulfilled/shipped -> delivered`, with explicit
//! cancel/return as the sole exits and claim release as the sole
//! sanctioned backward step.

use terroir_core::FulfillmentStatus;

// =============================================================================
// Forward-only progression
// =============================================================================

#[test]
fn test_forward_path_is_monotonic() {
    use FulfillmentStatus as F;

    let forward_path = [
        F::NotFulfilled,
        F::RequiresAction,
        F::PartiallyFulfilled,
        F::Fulfilled,
        F::PartiallyShipped,
        F::Shipped,
        F::Delivered,
    ];

    for (i, &from) in forward_path.iter().enumerate() {
        for (j, &to) in forward_path.iter().enumerate() {
            let expected = j > i || (from == F::RequiresAction && to == F::NotFulfilled);
            assert_eq!(
                from.can_advance_to(to),
                expected,
                "{from:?} -> {to:?} should be {expected}"
            );
        }
    }
}

#[test]
fn test_no_backward_moves_from_terminal_progress() {
    use FulfillmentStatus as F;

    for earlier in [F::NotFulfilled, F::Fulfilled, F::Shipped] {
        assert!(
            !F::Delivered.can_advance_to(earlier),
            "delivered must never regress to {earlier:?}"
        );
    }
}

#[test]
fn test_cancel_and_return_are_reachable_from_the_whole_path() {
    use FulfillmentStatus as F;

    for from in [
        F::NotFulfilled,
        F::RequiresAction,
        F::Fulfilled,
        F::Shipped,
        F::Delivered,
    ] {
        for exit in [F::Canceled, F::Returned, F::PartiallyReturned] {
            assert!(
                from.can_advance_to(exit),
                "{from:?} must allow explicit exit to {exit:?}"
            );
        }
    }
}

#[test]
fn test_exit_states_are_terminal() {
    use FulfillmentStatus as F;

    for exit in [F::Canceled, F::Returned, F::PartiallyReturned] {
        for target in FulfillmentStatus::ALL {
            assert!(
                !exit.can_advance_to(target),
                "{exit:?} must not advance to {target:?}"
            );
        }
    }
}

#[test]
fn test_status_text_round_trips_for_every_value() {
    for status in FulfillmentStatus::ALL {
        let parsed: FulfillmentStatus = status.as_str().parse().expect("round trip");
        assert_eq!(parsed, status);
    }
}
