// Outbound notification seam. Delivery (email, push) is an external
// collaborator: failures here are logged by callers and never allowed to
// block or reverse an order transition.

use crate::orders::OrderStatus;

/// Error raised by a notification backend
#[derive(Debug, thiserror::Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Seam for outbound order notifications
pub trait Notifier: Send + Sync {
    fn order_created(&self, order_number: &str) -> Result<(), NotifyError>;

    fn order_status_changed(
        &self,
        order_number: &str,
        status: OrderStatus,
    ) -> Result<(), NotifyError>;
}

/// Default notifier that only writes to the log
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn order_created(&self, order_number: &str) -> Result<(), NotifyError> {
        tracing::info!("Notification: order {} created", order_number);
        Ok(())
    }

    fn order_status_changed(
        &self,
        order_number: &str,
        status: OrderStatus,
    ) -> Result<(), NotifyError> {
        tracing::info!("Notification: order {} is now {}", order_number, status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_notifier_never_fails() {
        let notifier = LogNotifier;
        assert!(notifier.order_created("SO-TEST0001").is_ok());
        assert!(notifier
            .order_status_changed("SO-TEST0001", OrderStatus::Delivered)
            .is_ok());
    }
}
