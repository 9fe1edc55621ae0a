use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use tracing::{info, warn};

use crate::db::Database;
use crate::error::AppError;
use crate::models::{
    AdminAction, AdminCreateBooking, Booking, BookingCreated, BookingStatus, CreateBooking, UpdateBooking,
};
use crate::scheduling::interval::{minutes_of, time_of};
use crate::scheduling::{validate_booking, BookingCandidate, SchedulingError};

use super::services::{find_active_service, find_service};
use super::{active_bookings, working_hours_for};

const BOOKING_COLUMNS: &str = "id, service_id, service_name, booking_date, start_time, end_time, \
     client_name, client_phone, client_email, notes, status, created_at, updated_at";

fn booking_from_row(row: &Row<'_>) -> rusqlite::Result<Booking> {
    Ok(Booking {
        id: row.get(0)?,
        service_id: row.get(1)?,
        service_name: row.get(2)?,
        booking_date: row.get(3)?,
        start_time: row.get(4)?,
        end_time: row.get(5)?,
        client_name: row.get(6)?,
        client_phone: row.get(7)?,
        client_email: row.get(8)?,
        notes: row.get(9)?,
        status: row.get(10)?,
        created_at: row.get::<_, Option<String>>(11)?.unwrap_or_default(),
        updated_at: row.get::<_, Option<String>>(12)?.unwrap_or_default(),
    })
}

fn find_booking(conn: &Connection, id: i64) -> Result<Booking, AppError> {
    conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        [id],
        booking_from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound(format!("Booking {id}")))
}

fn end_time(start: NaiveTime, duration_minutes: u32) -> Result<NaiveTime, AppError> {
    minutes_of(start).checked_add(duration_minutes).and_then(time_of).ok_or_else(|| {
        SchedulingError::OutOfWindow("the session would run past midnight".to_string()).into()
    })
}

/// Maps a hit on the active-start unique index to a slot conflict.
fn conflict_on_unique(e: rusqlite::Error) -> AppError {
    match e {
        rusqlite::Error::SqliteFailure(ref err, _)
            if err.code == ErrorCode::ConstraintViolation
                && err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE => {
            warn!("Unique index rejected a booking the validator accepted");
            SchedulingError::SlotConflict.into()
        }
        other => other.into(),
    }
}

fn digits(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

fn validate_contact(request: &CreateBooking) -> Result<(), AppError> {
    if request.client_name.trim().is_empty() {
        return Err(AppError::Validation("Please enter your name".to_string()));
    }

    let phone = request.client_phone.trim();
    if phone.is_empty() {
        return Err(AppError::Validation("Please enter a phone number".to_string()));
    }
    let well_formed = phone
        .strip_prefix('+')
        .unwrap_or(phone)
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')'));
    if !well_formed || digits(phone).len() < 5 {
        return Err(AppError::Validation("Please enter a valid phone number".to_string()));
    }

    if let Some(email) = request.client_email.as_deref().map(str::trim) {
        if !email.is_empty() && !email.contains('@') {
            return Err(AppError::Validation("Please enter a valid e-mail address".to_string()));
        }
    }

    Ok(())
}

/// Validates and inserts a booking inside the caller's transaction.
fn insert_booking(
    conn: &Connection,
    request: &CreateBooking,
    status: BookingStatus,
    now: Option<(NaiveDate, NaiveTime)>,
    require_active_service: bool,
) -> Result<BookingCreated, AppError> {
    let service = if require_active_service {
        find_active_service(conn, request.service_id)?
    } else {
        find_service(conn, request.service_id)?
    };

    if status.is_active() {
        let hours = working_hours_for(conn, request.booking_date)?;
        let existing = active_bookings(conn, request.booking_date, None)?;
        let candidate = BookingCandidate::new(request.booking_date, request.start_time, service.duration_minutes);
        validate_booking(&candidate, &hours, &existing, now)?;
    }

    let end = end_time(request.start_time, service.duration_minutes)?;

    conn.execute(
        "INSERT INTO bookings
            (service_id, service_name, booking_date, start_time, end_time,
             client_name, client_phone, client_email, notes, status, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, CURRENT_TIMESTAMP)",
        rusqlite::params![
            service.id,
            service.name,
            request.booking_date,
            request.start_time,
            end,
            request.client_name.trim(),
            request.client_phone.trim(),
            request.client_email.as_deref().map(str::trim).filter(|e| !e.is_empty()),
            request.notes,
            status
        ],
    )
    .map_err(conflict_on_unique)?;

    let booking_id = conn.last_insert_rowid();
    info!(
        booking_id,
        service_id = service.id,
        date = %request.booking_date,
        start = %request.start_time,
        %status,
        "Booking created"
    );

    Ok(BookingCreated {
        success: true,
        booking_id,
        end_time: end,
        status,
    })
}

/// Client booking. Always re-validated against the store; whatever slot list
/// the client saw earlier is only a hint.
pub fn create_booking(db: &Database, request: CreateBooking, now: NaiveDateTime) -> Result<BookingCreated, AppError> {
    validate_contact(&request)?;

    let mut conn = db.conn.lock()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let created = insert_booking(
        &tx,
        &request,
        BookingStatus::Pending,
        Some((now.date(), now.time())),
        true,
    )?;

    tx.commit()?;
    Ok(created)
}

/// Admin booking: any status, any date.
pub fn admin_create_booking(db: &Database, request: AdminCreateBooking) -> Result<BookingCreated, AppError> {
    validate_contact(&request.booking)?;

    let mut conn = db.conn.lock()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let status = request.status.unwrap_or(BookingStatus::Pending);
    let created = insert_booking(&tx, &request.booking, status, None, false)?;

    tx.commit()?;
    Ok(created)
}

pub fn get_booking(db: &Database, id: i64) -> Result<Booking, AppError> {
    let conn = db.conn.lock()?;
    find_booking(&conn, id)
}

pub fn get_bookings_for_date(db: &Database, date: NaiveDate) -> Result<Vec<Booking>, AppError> {
    let conn = db.conn.lock()?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE booking_date = ?1 ORDER BY start_time, id"
    ))?;

    let bookings = stmt
        .query_map([date], booking_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(bookings)
}

fn check_transition(current: BookingStatus, next: BookingStatus) -> Result<(), AppError> {
    if current != next && !current.can_transition_to(next) {
        return Err(AppError::InvalidTransition {
            from: current,
            to: next,
        });
    }
    Ok(())
}

/// Admin reschedule. The new date, time and service go through the same
/// conflict check as a new booking, with this booking's own slot excluded.
pub fn update_booking(db: &Database, update: UpdateBooking) -> Result<Booking, AppError> {
    let mut conn = db.conn.lock()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let current = find_booking(&tx, update.booking_id)?;
    let next_status = update.status.unwrap_or(current.status);
    check_transition(current.status, next_status)?;

    let moved = current.booking_date != update.booking_date
        || current.start_time != update.start_time
        || current.service_id != update.service_id;
    if moved && current.status.is_terminal() {
        return Err(AppError::Validation(format!(
            "A {} booking cannot be rescheduled",
            current.status
        )));
    }

    let service = if current.service_id == update.service_id {
        find_service(&tx, update.service_id)?
    } else {
        find_active_service(&tx, update.service_id)?
    };

    if next_status.is_active() {
        let hours = working_hours_for(&tx, update.booking_date)?;
        let existing = active_bookings(&tx, update.booking_date, Some(current.id))?;
        let candidate = BookingCandidate::new(update.booking_date, update.start_time, service.duration_minutes);
        validate_booking(&candidate, &hours, &existing, None)?;
    }

    let end = end_time(update.start_time, service.duration_minutes)?;

    tx.execute(
        "UPDATE bookings
         SET service_id = ?1, service_name = ?2, booking_date = ?3, start_time = ?4, end_time = ?5,
             status = ?6, updated_at = CURRENT_TIMESTAMP
         WHERE id = ?7",
        rusqlite::params![
            service.id,
            service.name,
            update.booking_date,
            update.start_time,
            end,
            next_status,
            current.id
        ],
    )
    .map_err(conflict_on_unique)?;

    let updated = find_booking(&tx, current.id)?;
    tx.commit()?;

    info!(
        booking_id = updated.id,
        date = %updated.booking_date,
        start = %updated.start_time,
        status = %updated.status,
        "Booking updated"
    );

    Ok(updated)
}

pub fn update_booking_status(db: &Database, booking_id: i64, status: BookingStatus) -> Result<Booking, AppError> {
    let mut conn = db.conn.lock()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let current = find_booking(&tx, booking_id)?;
    if current.status == status {
        return Ok(current);
    }
    check_transition(current.status, status)?;

    tx.execute(
        "UPDATE bookings SET status = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
        rusqlite::params![status, booking_id],
    )?;

    let updated = find_booking(&tx, booking_id)?;
    tx.commit()?;

    info!(booking_id, from = %current.status, to = %status, "Booking status changed");

    Ok(updated)
}

/// Cancellation requested by the client. The phone number has to match the
/// one given at booking time; a mismatch looks like a missing booking.
pub fn cancel_booking(db: &Database, booking_id: i64, client_phone: &str) -> Result<Booking, AppError> {
    {
        let conn = db.conn.lock()?;
        let booking = find_booking(&conn, booking_id)?;
        let given = digits(client_phone);
        if given.is_empty() || digits(&booking.client_phone) != given {
            return Err(AppError::NotFound(format!("Booking {booking_id}")));
        }
    }

    update_booking_status(db, booking_id, BookingStatus::Cancelled)
}

pub fn apply_admin_action(db: &Database, action: AdminAction) -> Result<Booking, AppError> {
    match action {
        AdminAction::UpdateBooking(update) => update_booking(db, update),
        AdminAction::UpdateBookingStatus { booking_id, status } => update_booking_status(db, booking_id, status),
    }
}
