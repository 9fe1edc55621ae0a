use rusqlite::{Connection, OptionalExtension, Row};
use tracing::info;

use crate::db::Database;
use crate::duration;
use crate::error::AppError;
use crate::models::{Service, ServiceInput};

const SERVICE_COLUMNS: &str =
    "id, name, duration_minutes, duration_label, price, category, description, is_active";

fn service_from_row(row: &Row<'_>) -> rusqlite::Result<Service> {
    let duration: i64 = row.get(2)?;
    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        duration_minutes: u32::try_from(duration).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Integer, Box::new(e))
        })?,
        duration_label: row.get(3)?,
        price: row.get(4)?,
        category: row.get(5)?,
        description: row.get(6)?,
        is_active: row.get(7)?,
    })
}

pub(crate) fn find_service(conn: &Connection, id: i64) -> Result<Service, AppError> {
    conn.query_row(
        &format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?1"),
        [id],
        service_from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound(format!("Service {id}")))
}

/// Services a visitor may book; inactive ones count as missing.
pub(crate) fn find_active_service(conn: &Connection, id: i64) -> Result<Service, AppError> {
    let service = find_service(conn, id)?;
    if !service.is_active {
        return Err(AppError::NotFound(format!("Service {id}")));
    }
    Ok(service)
}

pub fn get_services(db: &Database, include_inactive: bool) -> Result<Vec<Service>, AppError> {
    let conn = db.conn.lock()?;

    let filter = if include_inactive { "" } else { "WHERE is_active = 1" };
    let mut stmt = conn.prepare(&format!(
        "SELECT {SERVICE_COLUMNS} FROM services {filter} ORDER BY category, name"
    ))?;

    let services = stmt
        .query_map([], service_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(services)
}

pub fn get_service(db: &Database, id: i64) -> Result<Service, AppError> {
    let conn = db.conn.lock()?;
    find_service(&conn, id)
}

fn normalize(input: &ServiceInput) -> Result<(u32, String), AppError> {
    if input.name.trim().is_empty() {
        return Err(AppError::Validation("Service name is required".to_string()));
    }

    let label = input.duration.trim();
    let minutes = duration::parse_minutes(label)?;
    // Bare numbers get a readable label.
    let label = if label.chars().all(|c| c.is_ascii_digit()) {
        duration::label_for(minutes)
    } else {
        label.to_string()
    };

    Ok((minutes, label))
}

pub fn create_service(db: &Database, input: ServiceInput) -> Result<Service, AppError> {
    let (minutes, label) = normalize(&input)?;
    let conn = db.conn.lock()?;

    conn.execute(
        "INSERT INTO services (name, duration_minutes, duration_label, price, category, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            input.name.trim(),
            minutes,
            label,
            input.price,
            input.category,
            input.description
        ],
    )?;

    let id = conn.last_insert_rowid();
    info!(service_id = id, minutes, "Service created");

    find_service(&conn, id)
}

pub fn update_service(db: &Database, id: i64, input: ServiceInput) -> Result<Service, AppError> {
    let (minutes, label) = normalize(&input)?;
    let conn = db.conn.lock()?;

    conn.execute(
        "UPDATE services
         SET name = ?1, duration_minutes = ?2, duration_label = ?3, price = ?4, category = ?5, description = ?6
         WHERE id = ?7",
        rusqlite::params![
            input.name.trim(),
            minutes,
            label,
            input.price,
            input.category,
            input.description,
            id
        ],
    )?;

    if conn.changes() == 0 {
        return Err(AppError::NotFound(format!("Service {id}")));
    }

    find_service(&conn, id)
}

/// Hides a service from the catalog. Existing bookings keep pointing at it.
pub fn deactivate_service(db: &Database, id: i64) -> Result<(), AppError> {
    let conn = db.conn.lock()?;

    conn.execute("UPDATE services SET is_active = 0 WHERE id = ?1", [id])?;

    if conn.changes() == 0 {
        return Err(AppError::NotFound(format!("Service {id}")));
    }

    info!(service_id = id, "Service deactivated");
    Ok(())
}
