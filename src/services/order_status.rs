use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString};
use utoipa::ToSchema;

use crate::errors::ServiceError;

/// Order lifecycle status. Stored as its SCREAMING_SNAKE_CASE string.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Delivering,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

/// The complete set of allowed transitions; everything else is rejected.
pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;

    matches!(
        (from, to),
        (Pending, Confirmed)
            | (Pending, Cancelled)
            | (Confirmed, Preparing)
            | (Confirmed, Cancelled)
            | (Preparing, Ready)
            | (Preparing, Cancelled)
            | (Ready, Delivering)
            | (Ready, Completed)
            | (Ready, Cancelled)
            | (Delivering, Completed)
            | (Delivering, Cancelled)
    )
}

/// Parses a stored status string, failing with the offending value.
pub fn parse_status(raw: &str) -> Result<OrderStatus, ServiceError> {
    OrderStatus::from_str(raw)
        .map_err(|_| ServiceError::InvalidStatus(format!("Unknown order status: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(OrderStatus::Pending, OrderStatus::Confirmed, true)]
    #[test_case(OrderStatus::Pending, OrderStatus::Cancelled, true)]
    #[test_case(OrderStatus::Confirmed, OrderStatus::Preparing, true)]
    #[test_case(OrderStatus::Confirmed, OrderStatus::Cancelled, true)]
    #[test_case(OrderStatus::Preparing, OrderStatus::Ready, true)]
    #[test_case(OrderStatus::Preparing, OrderStatus::Cancelled, true)]
    #[test_case(OrderStatus::Ready, OrderStatus::Delivering, true)]
    #[test_case(OrderStatus::Ready, OrderStatus::Completed, true)]
    #[test_case(OrderStatus::Ready, OrderStatus::Cancelled, true)]
    #[test_case(OrderStatus::Delivering, OrderStatus::Completed, true)]
    #[test_case(OrderStatus::Delivering, OrderStatus::Cancelled, true)]
    #[test_case(OrderStatus::Ready, OrderStatus::Pending, false)]
    #[test_case(OrderStatus::Pending, OrderStatus::Preparing, false)]
    #[test_case(OrderStatus::Pending, OrderStatus::Completed, false)]
    #[test_case(OrderStatus::Confirmed, OrderStatus::Ready, false)]
    #[test_case(OrderStatus::Delivering, OrderStatus::Ready, false)]
    #[test_case(OrderStatus::Completed, OrderStatus::Cancelled, false)]
    #[test_case(OrderStatus::Cancelled, OrderStatus::Pending, false)]
    #[test_case(OrderStatus::Cancelled, OrderStatus::Confirmed, false)]
    #[test_case(OrderStatus::Pending, OrderStatus::Pending, false)]
    fn transition_table(from: OrderStatus, to: OrderStatus, allowed: bool) {
        assert_eq!(can_transition(from, to), allowed);
    }

    #[test]
    fn terminal_states_allow_nothing() {
        for to in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::Delivering,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
        ] {
            assert!(!can_transition(OrderStatus::Completed, to));
            assert!(!can_transition(OrderStatus::Cancelled, to));
        }
    }

    #[test]
    fn status_round_trips_through_storage_string() {
        let status = OrderStatus::Preparing;
        assert_eq!(status.to_string(), "PREPARING");
        assert_eq!(parse_status("PREPARING").unwrap(), status);
        assert!(parse_status("SHIPPED").is_err());
    }
}
