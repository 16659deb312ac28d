//! Entity status state machines
//!
//! One finite-state machine per entity, with the allowed transitions
//! enumerated in a single place. Service methods go through
//! [`transition`](OrderStatus::can_transition_to) checks instead of ad hoc
//! per-method guards; an illegal transition is a business-rule violation.
//!
//! Statuses serialize as the lowercase snake_case strings stored in the
//! database and used on the wire (`"in_transit"`, `"requested"`, ...).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppError;

macro_rules! status_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
        #[serde(rename_all = "snake_case")]
        #[sqlx(rename_all = "snake_case")]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }

            /// Checked transition; rejects moves not in the table
            pub fn transition(self, next: Self) -> Result<Self, AppError> {
                if self.can_transition_to(next) {
                    Ok(next)
                } else {
                    Err(AppError::BusinessRule(format!(
                        "Cannot move {} from {} to {}",
                        stringify!($name),
                        self.as_str(),
                        next.as_str()
                    )))
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(AppError::Validation(format!(
                        "Unknown {} value: {}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

status_enum!(OrderStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
    Refunded => "refunded",
});

impl OrderStatus {
    pub fn can_transition_to(self, next: Self) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                // refunds only after delivery, via the return flow
                | (Delivered, Refunded)
        )
    }

    /// Cancellation guard: forbidden once shipped or in a terminal state
    pub fn is_cancellable(self) -> bool {
        use OrderStatus::*;
        !matches!(self, Shipped | Delivered | Cancelled | Refunded)
    }
}

status_enum!(PaymentStatus {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Failed => "failed",
    Refunded => "refunded",
});

impl PaymentStatus {
    pub fn can_transition_to(self, next: Self) -> bool {
        use PaymentStatus::*;
        if self == next {
            // webhook replays re-apply the current status
            return true;
        }
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Completed)
                | (Pending, Failed)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Completed, Refunded)
        )
    }
}

status_enum!(ShipmentStatus {
    Pending => "pending",
    Processing => "processing",
    Shipped => "shipped",
    InTransit => "in_transit",
    Delivered => "delivered",
    Failed => "failed",
});

impl ShipmentStatus {
    pub fn can_transition_to(self, next: Self) -> bool {
        use ShipmentStatus::*;
        match (self, next) {
            (Pending, Processing)
            | (Processing, Shipped)
            | (Shipped, InTransit)
            | (InTransit, Delivered) => true,
            // any non-terminal shipment can fail
            (Pending | Processing | Shipped | InTransit, Failed) => true,
            _ => false,
        }
    }
}

status_enum!(ReturnStatus {
    Requested => "requested",
    Approved => "approved",
    Rejected => "rejected",
    Shipped => "shipped",
    Received => "received",
    Refunded => "refunded",
});

impl ReturnStatus {
    pub fn can_transition_to(self, next: Self) -> bool {
        use ReturnStatus::*;
        matches!(
            (self, next),
            (Requested, Approved)
                | (Requested, Rejected)
                | (Approved, Shipped)
                | (Shipped, Received)
                | (Received, Refunded)
        )
    }
}

status_enum!(RefundStatus {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
});

impl RefundStatus {
    pub fn can_transition_to(self, next: Self) -> bool {
        use RefundStatus::*;
        matches!((self, next), (Pending, Completed) | (Pending, Failed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_moves_forward_only() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Confirmed));
    }

    #[test]
    fn cancel_guard_matches_terminal_states() {
        assert!(OrderStatus::Pending.is_cancellable());
        assert!(OrderStatus::Confirmed.is_cancellable());
        for s in [
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
        ] {
            assert!(!s.is_cancellable(), "{s} must not be cancellable");
        }
    }

    #[test]
    fn payment_is_immutable_once_completed_except_refund() {
        assert!(PaymentStatus::Completed.can_transition_to(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Completed.can_transition_to(PaymentStatus::Failed));
        assert!(!PaymentStatus::Completed.can_transition_to(PaymentStatus::Pending));
        // replay of the same terminal status is accepted
        assert!(PaymentStatus::Completed.can_transition_to(PaymentStatus::Completed));
    }

    #[test]
    fn shipment_fails_from_any_non_terminal_state() {
        for s in [
            ShipmentStatus::Pending,
            ShipmentStatus::Processing,
            ShipmentStatus::Shipped,
            ShipmentStatus::InTransit,
        ] {
            assert!(s.can_transition_to(ShipmentStatus::Failed));
        }
        assert!(!ShipmentStatus::Delivered.can_transition_to(ShipmentStatus::Failed));
        assert!(!ShipmentStatus::Failed.can_transition_to(ShipmentStatus::Processing));
    }

    #[test]
    fn return_terminal_states_are_rejected_and_refunded() {
        assert!(ReturnStatus::Requested.can_transition_to(ReturnStatus::Approved));
        assert!(ReturnStatus::Requested.can_transition_to(ReturnStatus::Rejected));
        assert!(!ReturnStatus::Rejected.can_transition_to(ReturnStatus::Shipped));
        assert!(!ReturnStatus::Refunded.can_transition_to(ReturnStatus::Requested));
    }

    #[test]
    fn statuses_round_trip_through_strings() {
        assert_eq!(
            "in_transit".parse::<ShipmentStatus>().unwrap(),
            ShipmentStatus::InTransit
        );
        assert_eq!(ShipmentStatus::InTransit.to_string(), "in_transit");
        assert!("unknown".parse::<OrderStatus>().is_err());
    }
}
