pub mod availability;
pub mod bookings;
pub mod schedule_days;
pub mod services;
pub mod settings;
pub mod weekly_schedule;

use chrono::NaiveDate;
use rusqlite::Connection;
use tracing::warn;

use crate::error::AppError;
use crate::scheduling::interval::minutes_of;
use crate::scheduling::{OccupiedBooking, WorkingHours};

/// Working hours of `date`: global settings, then the weekday template,
/// then the date's override.
pub(crate) fn working_hours_for(conn: &Connection, date: NaiveDate) -> Result<WorkingHours, AppError> {
    let settings = settings::load_settings(conn)?;
    let weekday = weekly_schedule::load_weekday(conn, date)?;
    let day = schedule_days::load_schedule_day(conn, date)?;
    Ok(settings.working_hours(weekday.as_ref(), day.as_ref()))
}

/// Pending and confirmed bookings of `date`, optionally leaving one out
/// (the booking being edited).
pub(crate) fn active_bookings(
    conn: &Connection,
    date: NaiveDate,
    exclude: Option<i64>,
) -> Result<Vec<OccupiedBooking>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT b.id, b.start_time, b.end_time, s.duration_minutes
         FROM bookings b
         LEFT JOIN services s ON b.service_id = s.id
         WHERE b.booking_date = ?1 AND b.status IN ('pending', 'confirmed')
         ORDER BY b.start_time",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![date], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, chrono::NaiveTime>(1)?,
                row.get::<_, chrono::NaiveTime>(2)?,
                row.get::<_, Option<i64>>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let occupied = rows
        .into_iter()
        .filter(|(id, ..)| Some(*id) != exclude)
        .map(|(id, start, end, service_duration)| {
            let stored = minutes_of(end).saturating_sub(minutes_of(start));
            let duration = if stored > 0 {
                stored
            } else {
                // Stored end is unusable, fall back to the catalog duration.
                warn!(booking_id = id, "Booking has no positive stored duration");
                service_duration
                    .and_then(|d| u32::try_from(d).ok())
                    .unwrap_or(0)
            };
            OccupiedBooking::new(start, duration)
        })
        .collect();

    Ok(occupied)
}
