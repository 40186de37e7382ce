use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus, QueueAction};

/// The appointment queue state machine.
///
/// ```text
/// scheduled    --add_to_queue-------> in-queue
/// in-queue     --complete-----------> completed
/// scheduled    --cancel-------------> cancelled
/// scheduled    --request_reschedule-> rescheduling
/// rescheduling --confirm_reschedule-> scheduled
/// completed    --schedule_follow_up-> completed (+ new scheduled appointment)
/// ```
pub struct QueueLifecycle;

impl QueueLifecycle {
    pub fn new() -> Self {
        Self
    }

    /// Status an appointment moves to when `action` fires in `current`.
    pub fn next_status(
        &self,
        current: AppointmentStatus,
        action: QueueAction,
    ) -> Result<AppointmentStatus, AppointmentError> {
        use AppointmentStatus::*;

        let next = match (current, action) {
            (Scheduled, QueueAction::AddToQueue) => InQueue,
            (InQueue, QueueAction::Complete) => Completed,
            (Scheduled, QueueAction::Cancel) => Cancelled,
            (Scheduled, QueueAction::RequestReschedule) => Rescheduling,
            (Rescheduling, QueueAction::ConfirmReschedule) => Scheduled,
            (Completed, QueueAction::ScheduleFollowUp) => Completed,
            (from, action) => {
                warn!("Rejected queue action {} on {} appointment", action, from);
                return Err(AppointmentError::InvalidTransition { from, action });
            }
        };

        debug!("Queue transition {} --{}--> {}", current, action, next);
        Ok(next)
    }

    /// Actions the dashboard should offer for an appointment in `status`.
    pub fn available_actions(&self, status: AppointmentStatus) -> Vec<QueueAction> {
        match status {
            AppointmentStatus::Scheduled => vec![
                QueueAction::AddToQueue,
                QueueAction::Cancel,
                QueueAction::RequestReschedule,
            ],
            AppointmentStatus::InQueue => vec![QueueAction::Complete],
            AppointmentStatus::Rescheduling => vec![QueueAction::ConfirmReschedule],
            AppointmentStatus::Completed => vec![QueueAction::ScheduleFollowUp],
            AppointmentStatus::Cancelled => vec![],
        }
    }

    /// New appointment times must lie in the future.
    pub fn validate_future_time(
        &self,
        time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        if time <= now {
            return Err(AppointmentError::InvalidTime(format!(
                "{} is not in the future",
                time.to_rfc3339()
            )));
        }
        Ok(())
    }

    /// A follow-up must come after the consultation it follows.
    pub fn validate_follow_up_time(
        &self,
        source_scheduled_at: DateTime<Utc>,
        follow_up_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        self.validate_future_time(follow_up_at, now)?;
        if follow_up_at <= source_scheduled_at {
            return Err(AppointmentError::InvalidTime(
                "Follow-up must be after the original appointment".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for QueueLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;

    const ALL_STATUSES: [AppointmentStatus; 5] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::InQueue,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Rescheduling,
    ];

    const ALL_ACTIONS: [QueueAction; 6] = [
        QueueAction::AddToQueue,
        QueueAction::Complete,
        QueueAction::Cancel,
        QueueAction::RequestReschedule,
        QueueAction::ConfirmReschedule,
        QueueAction::ScheduleFollowUp,
    ];

    #[test]
    fn happy_path_through_the_queue() {
        let lifecycle = QueueLifecycle::new();
        let queued = lifecycle
            .next_status(AppointmentStatus::Scheduled, QueueAction::AddToQueue)
            .unwrap();
        assert_eq!(queued, AppointmentStatus::InQueue);

        let done = lifecycle.next_status(queued, QueueAction::Complete).unwrap();
        assert_eq!(done, AppointmentStatus::Completed);
    }

    #[test]
    fn reschedule_round_trip_returns_to_scheduled() {
        let lifecycle = QueueLifecycle::new();
        let pending = lifecycle
            .next_status(AppointmentStatus::Scheduled, QueueAction::RequestReschedule)
            .unwrap();
        assert_eq!(
            lifecycle.next_status(pending, QueueAction::ConfirmReschedule).unwrap(),
            AppointmentStatus::Scheduled
        );
    }

    #[test]
    fn in_queue_cannot_be_cancelled() {
        assert_matches!(
            QueueLifecycle::new().next_status(AppointmentStatus::InQueue, QueueAction::Cancel),
            Err(AppointmentError::InvalidTransition {
                from: AppointmentStatus::InQueue,
                action: QueueAction::Cancel
            })
        );
    }

    #[test]
    fn cancelled_is_terminal() {
        let lifecycle = QueueLifecycle::new();
        for action in ALL_ACTIONS {
            assert!(lifecycle
                .next_status(AppointmentStatus::Cancelled, action)
                .is_err());
        }
    }

    #[test]
    fn available_actions_agree_with_next_status() {
        let lifecycle = QueueLifecycle::new();
        for status in ALL_STATUSES {
            let offered = lifecycle.available_actions(status);
            for action in ALL_ACTIONS {
                assert_eq!(
                    offered.contains(&action),
                    lifecycle.next_status(status, action).is_ok(),
                    "{} / {}",
                    status,
                    action
                );
            }
        }
    }

    #[test]
    fn follow_up_must_be_after_source_and_in_future() {
        let lifecycle = QueueLifecycle::new();
        let now = Utc::now();
        let source = now + Duration::days(2);

        assert!(lifecycle
            .validate_follow_up_time(source, source + Duration::days(7), now)
            .is_ok());
        assert_matches!(
            lifecycle.validate_follow_up_time(source, source - Duration::hours(1), now),
            Err(AppointmentError::InvalidTime(_))
        );
        assert_matches!(
            lifecycle.validate_follow_up_time(now - Duration::days(9), now - Duration::days(1), now),
            Err(AppointmentError::InvalidTime(_))
        );
    }
}
