use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::info;

use crate::db::Database;
use crate::error::AppError;
use crate::models::ScheduleDay;

use super::settings::load_settings;
use super::weekly_schedule::load_weekday;

const DAY_COLUMNS: &str = "date, is_working, start_time, end_time, break_start, break_end, notes";

fn day_from_row(row: &Row<'_>) -> rusqlite::Result<ScheduleDay> {
    Ok(ScheduleDay {
        date: row.get(0)?,
        is_working: row.get(1)?,
        start_time: row.get(2)?,
        end_time: row.get(3)?,
        break_start: row.get(4)?,
        break_end: row.get(5)?,
        notes: row.get(6)?,
    })
}

pub(crate) fn load_schedule_day(conn: &Connection, date: NaiveDate) -> Result<Option<ScheduleDay>, AppError> {
    let day = conn
        .query_row(
            &format!("SELECT {DAY_COLUMNS} FROM schedule_days WHERE date = ?1"),
            [date],
            day_from_row,
        )
        .optional()?;
    Ok(day)
}

pub fn get_schedule_days(db: &Database, from: NaiveDate, to: NaiveDate) -> Result<Vec<ScheduleDay>, AppError> {
    if from > to {
        return Err(AppError::Validation("Range start is after range end".to_string()));
    }

    let conn = db.conn.lock()?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {DAY_COLUMNS} FROM schedule_days WHERE date BETWEEN ?1 AND ?2 ORDER BY date"
    ))?;

    let days = stmt
        .query_map([from, to], day_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(days)
}

pub fn upsert_schedule_day(db: &Database, day: ScheduleDay) -> Result<ScheduleDay, AppError> {
    if day.break_start.is_some() != day.break_end.is_some() {
        return Err(AppError::Validation(
            "Break needs both a start and an end".to_string(),
        ));
    }

    let conn = db.conn.lock()?;

    if day.is_working {
        let settings = load_settings(&conn)?;
        let weekday = load_weekday(&conn, day.date)?;
        settings
            .working_hours(weekday.as_ref(), Some(&day))
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
    }

    conn.execute(
        "INSERT INTO schedule_days (date, is_working, start_time, end_time, break_start, break_end, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(date) DO UPDATE SET
             is_working = excluded.is_working,
             start_time = excluded.start_time,
             end_time = excluded.end_time,
             break_start = excluded.break_start,
             break_end = excluded.break_end,
             notes = excluded.notes",
        rusqlite::params![
            day.date,
            day.is_working,
            day.start_time,
            day.end_time,
            day.break_start,
            day.break_end,
            day.notes
        ],
    )?;

    info!(date = %day.date, is_working = day.is_working, "Schedule day saved");

    Ok(day)
}

pub fn delete_schedule_day(db: &Database, date: NaiveDate) -> Result<(), AppError> {
    let conn = db.conn.lock()?;

    conn.execute("DELETE FROM schedule_days WHERE date = ?1", [date])?;

    if conn.changes() == 0 {
        return Err(AppError::NotFound(format!("Schedule override for {date}")));
    }

    Ok(())
}
