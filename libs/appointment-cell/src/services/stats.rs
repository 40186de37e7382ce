use chrono::{Duration, NaiveDate};

use crate::models::{Appointment, AppointmentError, DailyStats, StatusCounts};

pub const DEFAULT_STATS_DAYS: i64 = 7;
pub const MAX_STATS_DAYS: i64 = 90;

pub fn count_by_status(appointments: &[Appointment]) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for appointment in appointments {
        counts.record(appointment.status);
    }
    counts
}

/// Resolves an optional `from..=to` range, defaulting to the week ending today.
pub fn resolve_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), AppointmentError> {
    let to = to.unwrap_or(today);
    let from = from.unwrap_or(to - Duration::days(DEFAULT_STATS_DAYS - 1));

    if from > to {
        return Err(AppointmentError::ValidationError(
            "Range start must not be after its end".to_string(),
        ));
    }
    if (to - from).num_days() + 1 > MAX_STATS_DAYS {
        return Err(AppointmentError::ValidationError(format!(
            "Range cannot exceed {} days",
            MAX_STATS_DAYS
        )));
    }

    Ok((from, to))
}

/// One entry per day in `from..=to`, days without appointments included.
pub fn daily_breakdown(
    appointments: &[Appointment],
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<DailyStats> {
    let mut days: Vec<DailyStats> = from
        .iter_days()
        .take_while(|day| *day <= to)
        .map(|date| DailyStats {
            date,
            counts: StatusCounts::default(),
        })
        .collect();

    for appointment in appointments {
        let day = appointment.scheduled_at.date_naive();
        if day < from || day > to {
            continue;
        }
        let index = (day - from).num_days() as usize;
        days[index].counts.record(appointment.status);
    }

    days
}
