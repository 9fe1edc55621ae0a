use chrono::{Datelike, NaiveDate};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::info;

use crate::db::Database;
use crate::error::AppError;
use crate::models::WeekdaySchedule;

use super::settings::load_settings;

const WEEKDAY_COLUMNS: &str = "day_of_week, is_working, start_time, end_time, break_start, break_end";

fn weekday_from_row(row: &Row<'_>) -> rusqlite::Result<WeekdaySchedule> {
    Ok(WeekdaySchedule {
        day_of_week: row.get(0)?,
        is_working: row.get(1)?,
        start_time: row.get(2)?,
        end_time: row.get(3)?,
        break_start: row.get(4)?,
        break_end: row.get(5)?,
    })
}

fn check_day_of_week(day_of_week: u32) -> Result<(), AppError> {
    if !(1..=7).contains(&day_of_week) {
        return Err(AppError::Validation(format!(
            "Day of week must be 1 (Monday) to 7 (Sunday), got {day_of_week}"
        )));
    }
    Ok(())
}

/// Template row for the weekday of `date`, if one is stored.
pub(crate) fn load_weekday(conn: &Connection, date: NaiveDate) -> Result<Option<WeekdaySchedule>, AppError> {
    let day_of_week = date.weekday().number_from_monday();
    let weekday = conn
        .query_row(
            &format!("SELECT {WEEKDAY_COLUMNS} FROM weekly_schedule WHERE day_of_week = ?1"),
            [day_of_week],
            weekday_from_row,
        )
        .optional()?;
    Ok(weekday)
}

pub fn get_weekly_schedule(db: &Database) -> Result<Vec<WeekdaySchedule>, AppError> {
    let conn = db.conn.lock()?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {WEEKDAY_COLUMNS} FROM weekly_schedule ORDER BY day_of_week"
    ))?;

    let days = stmt
        .query_map([], weekday_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(days)
}

pub fn upsert_weekday(db: &Database, weekday: WeekdaySchedule) -> Result<WeekdaySchedule, AppError> {
    check_day_of_week(weekday.day_of_week)?;
    if weekday.break_start.is_some() != weekday.break_end.is_some() {
        return Err(AppError::Validation(
            "Break needs both a start and an end".to_string(),
        ));
    }

    let conn = db.conn.lock()?;

    if weekday.is_working {
        load_settings(&conn)?
            .working_hours(Some(&weekday), None)
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
    }

    conn.execute(
        "INSERT INTO weekly_schedule (day_of_week, is_working, start_time, end_time, break_start, break_end)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(day_of_week) DO UPDATE SET
             is_working = excluded.is_working,
             start_time = excluded.start_time,
             end_time = excluded.end_time,
             break_start = excluded.break_start,
             break_end = excluded.break_end",
        rusqlite::params![
            weekday.day_of_week,
            weekday.is_working,
            weekday.start_time,
            weekday.end_time,
            weekday.break_start,
            weekday.break_end
        ],
    )?;

    info!(
        day_of_week = weekday.day_of_week,
        is_working = weekday.is_working,
        "Weekly schedule saved"
    );

    Ok(weekday)
}

/// Drops the template for a weekday; it falls back to the global hours.
pub fn delete_weekday(db: &Database, day_of_week: u32) -> Result<(), AppError> {
    check_day_of_week(day_of_week)?;
    let conn = db.conn.lock()?;

    conn.execute("DELETE FROM weekly_schedule WHERE day_of_week = ?1", [day_of_week])?;

    if conn.changes() == 0 {
        return Err(AppError::NotFound(format!("Weekly schedule for day {day_of_week}")));
    }

    Ok(())
}
