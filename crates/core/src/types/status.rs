//! Status axes for orders.
//!
//! An order carries three independent status axes: the overall order
//! status, the physical fulfillment status, and the payment status. The
//! axes move independently - a webhook can mark an order delivered while
//! its payment status is mid-refund.
//!
//! Values are persisted as `snake_case` text; [`std::str::FromStr`] parses
//! them back at the repository boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a persisted status value is not recognized.
#[derive(Debug, Error)]
#[error("unknown status value: {0}")]
pub struct UnknownStatus(pub String);

/// Overall order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Completed,
    Archived,
    Canceled,
    RequiresAction,
}

/// Physical shipment lifecycle status, tracked independently of payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    #[default]
    NotFulfilled,
    PartiallyFulfilled,
    Fulfilled,
    PartiallyShipped,
    Shipped,
    Delivered,
    PartiallyReturned,
    Returned,
    Canceled,
    /// Doubles as the shipment-claim marker: an order sits here while a
    /// worker is creating its carrier shipment, and stays here if the
    /// attempt wedges so an operator can see it.
    RequiresAction,
}

/// Payment lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    NotPaid,
    Awaiting,
    Captured,
    PartiallyRefunded,
    Refunded,
    Canceled,
    RequiresAction,
}

impl OrderStatus {
    /// Text form persisted to the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Archived => "archived",
            Self::Canceled => "canceled",
            Self::RequiresAction => "requires_action",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "archived" => Ok(Self::Archived),
            "canceled" => Ok(Self::Canceled),
            "requires_action" => Ok(Self::RequiresAction),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl FulfillmentStatus {
    /// Every fulfillment status, used to enumerate legal transition
    /// sources for status-guarded updates.
    pub const ALL: [Self; 10] = [
        Self::NotFulfilled,
        Self::PartiallyFulfilled,
        Self::Fulfilled,
        Self::PartiallyShipped,
        Self::Shipped,
        Self::Delivered,
        Self::PartiallyReturned,
        Self::Returned,
        Self::Canceled,
        Self::RequiresAction,
    ];

    /// Text form persisted to the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFulfilled => "not_fulfilled",
            Self::PartiallyFulfilled => "partially_fulfilled",
            Self::Fulfilled => "fulfilled",
            Self::PartiallyShipped => "partially_shipped",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::PartiallyReturned => "partially_returned",
            Self::Returned => "returned",
            Self::Canceled => "canceled",
            Self::RequiresAction => "requires_action",
        }
    }

    /// Position on the forward fulfillment path, if this status is on it.
    ///
    /// Cancel/return states sit outside the path and have no rank.
    const fn rank(self) -> Option<u8> {
        match self {
            Self::NotFulfilled => Some(0),
            Self::RequiresAction => Some(1),
            Self::PartiallyFulfilled => Some(2),
            Self::Fulfilled => Some(3),
            Self::PartiallyShipped => Some(4),
            Self::Shipped => Some(5),
            Self::Delivered => Some(6),
            Self::PartiallyReturned | Self::Returned | Self::Canceled => None,
        }
    }

    /// Whether this is an explicit cancel/return exit from the forward path.
    #[must_use]
    pub const fn is_exit(self) -> bool {
        matches!(
            self,
            Self::PartiallyReturned | Self::Returned | Self::Canceled
        )
    }

    /// Whether the transition `self -> next` is legal.
    ///
    /// Fulfillment only advances along
    /// `not_fulfilled -> fulfilled/shipped -> delivered`; moving backward
    /// is forbidden except for the two sanctioned cases: an explicit
    /// cancel/return, and releasing a wedged shipment claim
    /// (`requires_action -> not_fulfilled`).
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        if self == next {
            return false;
        }
        if next.is_exit() {
            return !self.is_exit();
        }
        if self == Self::RequiresAction && next == Self::NotFulfilled {
            return true;
        }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }
}

impl std::str::FromStr for FulfillmentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_fulfilled" => Ok(Self::NotFulfilled),
            "partially_fulfilled" => Ok(Self::PartiallyFulfilled),
            "fulfilled" => Ok(Self::Fulfilled),
            "partially_shipped" => Ok(Self::PartiallyShipped),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "partially_returned" => Ok(Self::PartiallyReturned),
            "returned" => Ok(Self::Returned),
            "canceled" => Ok(Self::Canceled),
            "requires_action" => Ok(Self::RequiresAction),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl PaymentStatus {
    /// Text form persisted to the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotPaid => "not_paid",
            Self::Awaiting => "awaiting",
            Self::Captured => "captured",
            Self::PartiallyRefunded => "partially_refunded",
            Self::Refunded => "refunded",
            Self::Canceled => "canceled",
            Self::RequiresAction => "requires_action",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_paid" => Ok(Self::NotPaid),
            "awaiting" => Ok(Self::Awaiting),
            "captured" => Ok(Self::Captured),
            "partially_refunded" => Ok(Self::PartiallyRefunded),
            "refunded" => Ok(Self::Refunded),
            "canceled" => Ok(Self::Canceled),
            "requires_action" => Ok(Self::RequiresAction),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_fulfillment_advances_forward_only() {
        use FulfillmentStatus::{Delivered, NotFulfilled, Shipped};

        assert!(NotFulfilled.can_advance_to(Shipped));
        assert!(Shipped.can_advance_to(Delivered));
        assert!(NotFulfilled.can_advance_to(Delivered));

        // Never backward
        assert!(!Shipped.can_advance_to(NotFulfilled));
        assert!(!Delivered.can_advance_to(Shipped));
        assert!(!Delivered.can_advance_to(NotFulfilled));

        // No self-transition
        assert!(!Shipped.can_advance_to(Shipped));
    }

    #[test]
    fn test_fulfillment_exit_states_reachable_from_anywhere() {
        use FulfillmentStatus::{Canceled, Delivered, NotFulfilled, Returned, Shipped};

        assert!(NotFulfilled.can_advance_to(Canceled));
        assert!(Shipped.can_advance_to(Returned));
        assert!(Delivered.can_advance_to(Returned));

        // But exit states are terminal
        assert!(!Canceled.can_advance_to(Shipped));
        assert!(!Returned.can_advance_to(Canceled));
    }

    #[test]
    fn test_claim_release_is_the_only_backward_move() {
        use FulfillmentStatus::{NotFulfilled, RequiresAction, Shipped};

        assert!(RequiresAction.can_advance_to(NotFulfilled));
        assert!(RequiresAction.can_advance_to(Shipped));
        assert!(!Shipped.can_advance_to(RequiresAction));
        assert!(!NotFulfilled.can_advance_to(NotFulfilled));
    }

    #[test]
    fn test_status_text_round_trip() {
        for status in [
            FulfillmentStatus::NotFulfilled,
            FulfillmentStatus::PartiallyFulfilled,
            FulfillmentStatus::Fulfilled,
            FulfillmentStatus::PartiallyShipped,
            FulfillmentStatus::Shipped,
            FulfillmentStatus::Delivered,
            FulfillmentStatus::PartiallyReturned,
            FulfillmentStatus::Returned,
            FulfillmentStatus::Canceled,
            FulfillmentStatus::RequiresAction,
        ] {
            let parsed = FulfillmentStatus::from_str(status.as_str()).expect("round trip");
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let err = OrderStatus::from_str("shipped").unwrap_err();
        assert!(err.to_string().contains("shipped"));
        assert!(PaymentStatus::from_str("").is_err());
    }
}
