use rusqlite::Connection;
use tracing::info;

use crate::db::Database;
use crate::error::AppError;
use crate::models::ScheduleSettings;
use crate::scheduling::{SchedulingError, WorkingHours};

fn non_negative(value: i64, field: &str) -> Result<u32, AppError> {
    u32::try_from(value).map_err(|_| {
        SchedulingError::InvalidConfiguration(format!("{field} is {value}, expected a non-negative number")).into()
    })
}

pub(crate) fn load_settings(conn: &Connection) -> Result<ScheduleSettings, AppError> {
    let (interval, buffer, start, end): (i64, i64, String, String) = conn.query_row(
        "SELECT time_slot_interval_minutes, break_duration_minutes, working_hours_start, working_hours_end
         FROM schedule_settings WHERE id = 1",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    )?;

    let parse = |raw: &str, field: &str| {
        crate::scheduling::interval::parse_hhmm(raw).ok_or_else(|| {
            AppError::from(SchedulingError::InvalidConfiguration(format!(
                "{field} '{raw}' is not a valid time"
            )))
        })
    };

    Ok(ScheduleSettings {
        time_slot_interval_minutes: non_negative(interval, "slot interval")?,
        break_duration_minutes: non_negative(buffer, "break duration")?,
        working_hours_start: parse(&start, "working hours start")?,
        working_hours_end: parse(&end, "working hours end")?,
    })
}

pub fn get_settings(db: &Database) -> Result<ScheduleSettings, AppError> {
    let conn = db.conn.lock()?;
    load_settings(&conn)
}

pub fn update_settings(db: &Database, settings: ScheduleSettings) -> Result<ScheduleSettings, AppError> {
    WorkingHours::new(
        settings.working_hours_start,
        settings.working_hours_end,
        settings.time_slot_interval_minutes,
        settings.break_duration_minutes,
    )
    .validate()
    .map_err(|e| AppError::Validation(e.to_string()))?;

    let conn = db.conn.lock()?;

    conn.execute(
        "UPDATE schedule_settings
         SET time_slot_interval_minutes = ?1, break_duration_minutes = ?2,
             working_hours_start = ?3, working_hours_end = ?4, updated_at = CURRENT_TIMESTAMP
         WHERE id = 1",
        rusqlite::params![
            settings.time_slot_interval_minutes,
            settings.break_duration_minutes,
            settings.working_hours_start,
            settings.working_hours_end
        ],
    )?;

    info!(
        interval = settings.time_slot_interval_minutes,
        buffer = settings.break_duration_minutes,
        "Schedule settings updated"
    );

    load_settings(&conn)
}
