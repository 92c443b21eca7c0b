use crate::orders::OrderStatus;

/// Service for managing order status transitions
pub struct StatusMachine;

impl StatusMachine {
    /// Check if a status transition is valid
    ///
    /// # Valid Transitions
    /// - Pending → Processing, Cancelled
    /// - Processing → Shipped, Delivered, Cancelled
    /// - Shipped → Delivered, Cancelled
    /// - Delivered → Cancelled, Returned
    /// - Cancelled, Returned → (terminal, no transitions)
    ///
    /// Repeating the current status is not valid: transitions carry stock and
    /// analytics side effects, so a repeated `cancelled` would restore stock
    /// twice.
    pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
        Self::allowed_sources(to).contains(&from)
    }

    /// The set of statuses an order may be in for a transition into `to`
    pub fn allowed_sources(to: OrderStatus) -> &'static [OrderStatus] {
        match to {
            // Orders are created in pending; nothing transitions back into it
            OrderStatus::Pending => &[],
            OrderStatus::Processing => &[OrderStatus::Pending],
            OrderStatus::Shipped => &[OrderStatus::Processing],
            OrderStatus::Delivered => &[OrderStatus::Shipped, OrderStatus::Processing],
            OrderStatus::Cancelled => &[
                OrderStatus::Pending,
                OrderStatus::Processing,
                OrderStatus::Shipped,
                OrderStatus::Delivered,
            ],
            OrderStatus::Returned => &[OrderStatus::Delivered],
        }
    }

    /// Attempt to transition from one status to another
    ///
    /// # Returns
    /// `Ok(to)` if the transition is valid, `Err(message)` otherwise
    pub fn transition(from: OrderStatus, to: OrderStatus) -> Result<OrderStatus, String> {
        if Self::is_valid_transition(from, to) {
            Ok(to)
        } else {
            Err(format!("Invalid status transition from {} to {}", from, to))
        }
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn order_status_strategy() -> impl Strategy<Value = OrderStatus> {
        prop_oneof![
            Just(OrderStatus::Pending),
            Just(OrderStatus::Processing),
            Just(OrderStatus::Shipped),
            Just(OrderStatus::Delivered),
            Just(OrderStatus::Cancelled),
            Just(OrderStatus::Returned),
        ]
    }

    /// Terminal statuses admit no outgoing transitions
    #[test]
    fn prop_terminal_statuses_have_no_exits() {
        proptest!(|(to in order_status_strategy())| {
            prop_assert!(!StatusMachine::is_valid_transition(OrderStatus::Cancelled, to));
            prop_assert!(!StatusMachine::is_valid_transition(OrderStatus::Returned, to));
        });
    }

    /// Any non-terminal status can be cancelled
    #[test]
    fn prop_non_terminal_can_always_cancel() {
        proptest!(|(from in order_status_strategy())| {
            if !matches!(from, OrderStatus::Cancelled | OrderStatus::Returned) {
                prop_assert!(
                    StatusMachine::is_valid_transition(from, OrderStatus::Cancelled),
                    "Transition from {} to Cancelled should be valid",
                    from
                );
            }
        });
    }

    /// transition() and is_valid_transition() agree
    #[test]
    fn prop_transition_consistency() {
        proptest!(|(
            from in order_status_strategy(),
            to in order_status_strategy()
        )| {
            let is_valid = StatusMachine::is_valid_transition(from, to);
            let transition_result = StatusMachine::transition(from, to);

            if is_valid {
                prop_assert_eq!(transition_result, Ok(to));
            } else {
                prop_assert!(transition_result.is_err());
            }
        });
    }

    /// allowed_sources and is_valid_transition describe the same relation
    #[test]
    fn prop_allowed_sources_consistency() {
        proptest!(|(
            from in order_status_strategy(),
            to in order_status_strategy()
        )| {
            prop_assert_eq!(
                StatusMachine::allowed_sources(to).contains(&from),
                StatusMachine::is_valid_transition(from, to)
            );
        });
    }
}
