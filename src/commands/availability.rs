use chrono::{Days, NaiveDate, NaiveDateTime};
use tracing::warn;

use crate::db::Database;
use crate::error::AppError;
use crate::models::{Availability, AvailabilityQuery, ScheduleQuery, WorkingHoursView};
use crate::scheduling::slots::available_times;
use crate::scheduling::{generate_slots, mark_elapsed, SchedulingError};

use super::services::{find_active_service, find_service};
use super::{active_bookings, working_hours_for};

const UNAVAILABLE_MESSAGE: &str = "Scheduling is temporarily unavailable, no slots can be offered";
const DAY_OFF_MESSAGE: &str = "Non-working day";

const DEFAULT_RANGE_DAYS: u32 = 7;
const MAX_RANGE_DAYS: u32 = 31;

/// Slot list for one service on one date.
///
/// `now` is set for visitors: past dates are refused and today's elapsed
/// slots are marked. Admin queries pass `None`.
pub fn get_availability(
    db: &Database,
    query: AvailabilityQuery,
    now: Option<NaiveDateTime>,
) -> Result<Availability, AppError> {
    day_availability(db, query, now).map(|(availability, _)| availability)
}

/// Availability of the working days in `[from, from + days)`. Days off are
/// left out; days whose hours cannot be resolved stay in with their message.
pub fn get_schedule(
    db: &Database,
    query: ScheduleQuery,
    today: NaiveDate,
    now: Option<NaiveDateTime>,
) -> Result<Vec<Availability>, AppError> {
    let days = query.days.unwrap_or(DEFAULT_RANGE_DAYS);
    if days == 0 || days > MAX_RANGE_DAYS {
        return Err(AppError::Validation(format!(
            "Range must cover 1 to {MAX_RANGE_DAYS} days, got {days}"
        )));
    }

    let from = query.from.unwrap_or(today);
    let mut schedule = Vec::new();

    for offset in 0..days {
        let Some(date) = from.checked_add_days(Days::new(u64::from(offset))) else {
            break;
        };
        let day = AvailabilityQuery {
            date,
            service_id: query.service_id,
        };
        let (availability, open) = day_availability(db, day, now)?;
        if open {
            schedule.push(availability);
        }
    }

    Ok(schedule)
}

/// Availability of one date plus whether the date is a working day.
fn day_availability(
    db: &Database,
    query: AvailabilityQuery,
    now: Option<NaiveDateTime>,
) -> Result<(Availability, bool), AppError> {
    if let Some(now) = now {
        if query.date < now.date() {
            return Err(SchedulingError::PastDate.into());
        }
    }

    let conn = db.conn.lock()?;

    let service = if now.is_some() {
        find_active_service(&conn, query.service_id)?
    } else {
        find_service(&conn, query.service_id)?
    };

    let mut availability = Availability {
        date: query.date,
        service_id: service.id,
        service_name: service.name.clone(),
        service_duration: service.duration_minutes,
        working_hours: None,
        available_slots: Vec::new(),
        slots: Vec::new(),
        message: None,
    };

    let hours = match working_hours_for(&conn, query.date) {
        Ok(hours) => hours,
        Err(AppError::Scheduling(SchedulingError::InvalidConfiguration(reason))) => {
            warn!(date = %query.date, "Cannot load working hours: {reason}");
            availability.message = Some(UNAVAILABLE_MESSAGE.to_string());
            return Ok((availability, true));
        }
        Err(e) => return Err(e),
    };
    let existing = active_bookings(&conn, query.date, None)?;
    drop(conn);

    let mut slots = match generate_slots(&hours, service.duration_minutes, &existing) {
        Ok(slots) => slots,
        Err(SchedulingError::InvalidConfiguration(reason)) => {
            warn!(date = %query.date, service_id = service.id, "Slot generation failed: {reason}");
            availability.message = Some(UNAVAILABLE_MESSAGE.to_string());
            return Ok((availability, true));
        }
        Err(e) => return Err(e.into()),
    };

    if !hours.open {
        availability.message = Some(DAY_OFF_MESSAGE.to_string());
        return Ok((availability, false));
    }

    if let Some(now) = now {
        if query.date == now.date() {
            mark_elapsed(&mut slots, now.time());
        }
    }

    availability.working_hours = Some(WorkingHoursView::from(&hours));
    availability.available_slots = available_times(&slots);
    availability.slots = slots;

    Ok((availability, true))
}
