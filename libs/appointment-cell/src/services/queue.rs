use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, CreateAppointmentRequest, DailyStats,
    FollowUpResponse, QueueAction, QueueView, RoomResponse,
};
use crate::services::lifecycle::QueueLifecycle;
use crate::services::stats;

const APPOINTMENTS_TABLE: &str = "appointments";

pub struct AppointmentQueueService {
    supabase: SupabaseClient,
    lifecycle: QueueLifecycle,
    config: AppConfig,
}

impl AppointmentQueueService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            lifecycle: QueueLifecycle::new(),
            config: config.clone(),
        }
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment {}", appointment_id);

        let query = format!("id=eq.{}", appointment_id);
        self.supabase
            .select_one(APPOINTMENTS_TABLE, &query, auth_token)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?
            .ok_or(AppointmentError::NotFound)
    }

    /// A doctor's appointments for one UTC day, ordered by time.
    pub async fn doctor_queue(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        status: Option<AppointmentStatus>,
        auth_token: &str,
    ) -> Result<QueueView, AppointmentError> {
        debug!("Loading queue for doctor {} on {}", doctor_id, date);

        let day = self
            .doctor_appointments_between(doctor_id, date, date, auth_token)
            .await?;

        let counts = stats::count_by_status(&day);
        let appointments = match status {
            Some(wanted) => day.into_iter().filter(|a| a.status == wanted).collect(),
            None => day,
        };

        Ok(QueueView {
            date,
            status_filter: status,
            appointments,
            counts,
        })
    }

    pub async fn patient_appointments(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let query = format!("patient_id=eq.{}&order=scheduled_at.desc", patient_id);
        self.supabase
            .select(APPOINTMENTS_TABLE, &query, auth_token)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }

    pub async fn daily_stats(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<DailyStats>, AppointmentError> {
        let appointments = self
            .doctor_appointments_between(doctor_id, from, to, auth_token)
            .await?;
        Ok(stats::daily_breakdown(&appointments, from, to))
    }

    async fn doctor_appointments_between(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let start = day_start(from);
        let end = day_start(to) + Duration::days(1);

        let query = format!(
            "doctor_id=eq.{}&scheduled_at=gte.{}&scheduled_at=lt.{}&order=scheduled_at.asc",
            doctor_id,
            timestamp(start),
            timestamp(end)
        );

        let mut appointments: Vec<Appointment> = self
            .supabase
            .select(APPOINTMENTS_TABLE, &query, auth_token)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        // The store orders already; keep the contract even if it does not.
        appointments.sort_by_key(|a| a.scheduled_at);
        Ok(appointments)
    }

    // ==========================================================================
    // CREATION
    // ==========================================================================

    pub async fn create_appointment(
        &self,
        doctor_id: Uuid,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        if request.patient_name.trim().is_empty() {
            return Err(AppointmentError::ValidationError(
                "Patient name is required".to_string(),
            ));
        }
        self.lifecycle
            .validate_future_time(request.scheduled_at, Utc::now())?;

        self.insert_scheduled(
            doctor_id,
            request.patient_id,
            request.patient_name.trim(),
            request.scheduled_at,
            request.reason.as_deref(),
            None,
            auth_token,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn insert_scheduled(
        &self,
        doctor_id: Uuid,
        patient_id: Uuid,
        patient_name: &str,
        scheduled_at: DateTime<Utc>,
        reason: Option<&str>,
        follow_up_of: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let now = timestamp(Utc::now());
        let document = json!({
            "id": Uuid::new_v4(),
            "doctor_id": doctor_id,
            "patient_id": patient_id,
            "patient_name": patient_name,
            "scheduled_at": timestamp(scheduled_at),
            "status": AppointmentStatus::Scheduled,
            "reason": reason,
            "follow_up_of": follow_up_of,
            "created_at": now,
            "updated_at": now,
        });

        let appointment: Appointment = self
            .supabase
            .insert(APPOINTMENTS_TABLE, document, auth_token)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        info!(
            "Scheduled appointment {} for patient {} with doctor {} at {}",
            appointment.id, patient_id, doctor_id, appointment.scheduled_at
        );
        Ok(appointment)
    }

    // ==========================================================================
    // QUEUE TRANSITIONS
    // ==========================================================================

    pub async fn add_to_queue(
        &self,
        appointment: &Appointment,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let mut changes = Map::new();
        changes.insert("queued_at".to_string(), json!(timestamp(Utc::now())));
        self.transition(appointment, QueueAction::AddToQueue, changes, auth_token)
            .await
    }

    pub async fn complete(
        &self,
        appointment: &Appointment,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let mut changes = Map::new();
        changes.insert("completed_at".to_string(), json!(timestamp(Utc::now())));
        self.transition(appointment, QueueAction::Complete, changes, auth_token)
            .await
    }

    pub async fn cancel(
        &self,
        appointment: &Appointment,
        reason: &str,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        if reason.trim().is_empty() {
            return Err(AppointmentError::ValidationError(
                "A cancellation reason is required".to_string(),
            ));
        }

        let mut changes = Map::new();
        changes.insert("cancellation_reason".to_string(), json!(reason.trim()));
        self.transition(appointment, QueueAction::Cancel, changes, auth_token)
            .await
    }

    pub async fn request_reschedule(
        &self,
        appointment: &Appointment,
        reason: Option<&str>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let mut changes = Map::new();
        changes.insert(
            "reschedule_reason".to_string(),
            json!(reason.map(str::trim).filter(|r| !r.is_empty())),
        );
        self.transition(appointment, QueueAction::RequestReschedule, changes, auth_token)
            .await
    }

    pub async fn confirm_reschedule(
        &self,
        appointment: &Appointment,
        new_time: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        self.lifecycle.validate_future_time(new_time, Utc::now())?;

        let mut changes = Map::new();
        changes.insert("scheduled_at".to_string(), json!(timestamp(new_time)));
        self.transition(appointment, QueueAction::ConfirmReschedule, changes, auth_token)
            .await
    }

    /// Records the follow-up date on a completed appointment and books the
    /// follow-up visit itself.
    pub async fn schedule_follow_up(
        &self,
        appointment: &Appointment,
        follow_up_at: DateTime<Utc>,
        reason: Option<&str>,
        auth_token: &str,
    ) -> Result<FollowUpResponse, AppointmentError> {
        if appointment.follow_up_at.is_some() {
            warn!("Appointment {} already has a follow-up", appointment.id);
            return Err(AppointmentError::FollowUpAlreadyScheduled);
        }
        self.lifecycle
            .validate_follow_up_time(appointment.scheduled_at, follow_up_at, Utc::now())?;

        let mut changes = Map::new();
        changes.insert("follow_up_at".to_string(), json!(timestamp(follow_up_at)));
        let source = self
            .transition(appointment, QueueAction::ScheduleFollowUp, changes, auth_token)
            .await?;

        let reason = reason
            .map(str::to_string)
            .or_else(|| source.reason.as_ref().map(|r| format!("Follow-up: {}", r)))
            .unwrap_or_else(|| "Follow-up".to_string());

        let follow_up = self
            .insert_scheduled(
                source.doctor_id,
                source.patient_id,
                &source.patient_name,
                follow_up_at,
                Some(&reason),
                Some(source.id),
                auth_token,
            )
            .await?;

        Ok(FollowUpResponse { source, follow_up })
    }

    /// Returns the consultation room for an in-queue appointment, assigning
    /// one on first use.
    pub async fn open_room(
        &self,
        appointment: &Appointment,
        auth_token: &str,
    ) -> Result<RoomResponse, AppointmentError> {
        if appointment.status != AppointmentStatus::InQueue {
            return Err(AppointmentError::ValidationError(format!(
                "Consultation room is only available for in-queue appointments (currently {})",
                appointment.status
            )));
        }

        if let Some(room_url) = &appointment.room_url {
            return Ok(RoomResponse {
                appointment_id: appointment.id,
                room_url: room_url.clone(),
            });
        }

        let room_url = self.config.room_url(&appointment.id.to_string());
        let changes = json!({
            "room_url": room_url,
            "updated_at": timestamp(Utc::now()),
        });

        let updated = self
            .conditional_update(appointment, None, changes, auth_token)
            .await?;

        info!("Opened consultation room for appointment {}", updated.id);
        Ok(RoomResponse {
            appointment_id: updated.id,
            room_url: updated.room_url.unwrap_or(room_url),
        })
    }

    /// Validates the action, then writes the new status in a single update
    /// conditioned on the status it was read with.
    async fn transition(
        &self,
        appointment: &Appointment,
        action: QueueAction,
        mut changes: Map<String, Value>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let next = self.lifecycle.next_status(appointment.status, action)?;

        changes.insert("status".to_string(), json!(next));
        changes.insert("updated_at".to_string(), json!(timestamp(Utc::now())));

        // Completed stays completed, so the status alone cannot tell two
        // follow-up requests apart.
        let guard = match action {
            QueueAction::ScheduleFollowUp => Some("follow_up_at=is.null"),
            _ => None,
        };

        let updated = self
            .conditional_update(appointment, guard, Value::Object(changes), auth_token)
            .await?;

        info!(
            "Appointment {} {} -> {} ({})",
            appointment.id, appointment.status, updated.status, action
        );
        Ok(updated)
    }

    async fn conditional_update(
        &self,
        appointment: &Appointment,
        extra_filter: Option<&str>,
        changes: Value,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let mut filter = format!(
            "id=eq.{}&status=eq.{}",
            appointment.id,
            appointment.status.as_str()
        );
        if let Some(extra) = extra_filter {
            filter.push('&');
            filter.push_str(extra);
        }

        let rows: Vec<Appointment> = self
            .supabase
            .update(APPOINTMENTS_TABLE, &filter, changes, auth_token)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        rows.into_iter().next().ok_or_else(|| {
            warn!(
                "Appointment {} no longer {}; update skipped",
                appointment.id, appointment.status
            );
            AppointmentError::ConcurrentModification
        })
    }
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// RFC 3339 with a `Z` suffix, safe to embed in a query string unescaped.
fn timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_are_query_safe() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let ts = timestamp(day_start(date));
        assert_eq!(ts, "2024-05-01T00:00:00Z");
        assert!(!ts.contains('+'));
    }
}
