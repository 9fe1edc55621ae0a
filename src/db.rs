use rusqlite::{Connection, Result};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::AppError;

/// How long a writer waits for another connection's transaction to finish.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Database {
    pub conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    pub fn initialize(&self) -> std::result::Result<(), AppError> {
        let conn = self.conn.lock()?;

        conn.execute_batch(
            "
            -- Service catalog
            CREATE TABLE IF NOT EXISTS services (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                duration_minutes INTEGER NOT NULL CHECK (duration_minutes > 0),
                duration_label TEXT NOT NULL,
                price TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL DEFAULT '',
                description TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Client appointments
            CREATE TABLE IF NOT EXISTS bookings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                service_id INTEGER NOT NULL,
                service_name TEXT NOT NULL,
                booking_date DATE NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                client_name TEXT NOT NULL,
                client_phone TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending', 'confirmed', 'completed', 'cancelled')),
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (service_id) REFERENCES services(id)
            );

            CREATE INDEX IF NOT EXISTS idx_bookings_date ON bookings(booking_date);

            -- Global schedule settings, single row
            CREATE TABLE IF NOT EXISTS schedule_settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                time_slot_interval_minutes INTEGER NOT NULL,
                break_duration_minutes INTEGER NOT NULL,
                working_hours_start TEXT NOT NULL,
                working_hours_end TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Recurring weekly template, 1 = Monday
            CREATE TABLE IF NOT EXISTS weekly_schedule (
                day_of_week INTEGER PRIMARY KEY CHECK (day_of_week BETWEEN 1 AND 7),
                is_working INTEGER NOT NULL DEFAULT 1,
                start_time TEXT,
                end_time TEXT,
                break_start TEXT,
                break_end TEXT
            );

            -- Per-date overrides: days off, shortened days, lunch breaks
            CREATE TABLE IF NOT EXISTS schedule_days (
                date DATE PRIMARY KEY,
                is_working INTEGER NOT NULL DEFAULT 1,
                start_time TEXT,
                end_time TEXT,
                break_start TEXT,
                break_end TEXT,
                notes TEXT
            );
            ",
        )?;

        // Run migrations for existing databases (pass connection to avoid deadlock)
        Self::migrate_conn(&conn)?;
        Self::seed_conn(&conn)?;

        Ok(())
    }

    fn migrate_conn(conn: &Connection) -> Result<()> {
        let columns: Vec<String> = conn
            .prepare("PRAGMA table_info(bookings)")?
            .query_map([], |row| row.get::<_, String>(1))?
            .filter_map(|r| r.ok())
            .collect();

        if !columns.contains(&"client_email".to_string()) {
            conn.execute("ALTER TABLE bookings ADD COLUMN client_email TEXT", [])?;
        }
        if !columns.contains(&"notes".to_string()) {
            conn.execute("ALTER TABLE bookings ADD COLUMN notes TEXT", [])?;
        }
        if !columns.contains(&"updated_at".to_string()) {
            // ALTER TABLE cannot add a column with a non-constant default.
            conn.execute("ALTER TABLE bookings ADD COLUMN updated_at DATETIME", [])?;
            conn.execute("UPDATE bookings SET updated_at = created_at", [])?;
        }

        // Last line of defence against two active bookings starting together.
        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_bookings_active_start
             ON bookings(booking_date, start_time)
             WHERE status IN ('pending', 'confirmed')",
            [],
        )?;

        Ok(())
    }

    fn seed_conn(conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO schedule_settings
                (id, time_slot_interval_minutes, break_duration_minutes, working_hours_start, working_hours_end)
             VALUES (1, 30, 30, '12:00:00', '21:00:00')",
            [],
        )?;

        let services: i64 = conn.query_row("SELECT COUNT(*) FROM services", [], |row| row.get(0))?;
        if services == 0 {
            conn.execute_batch(
                "
                INSERT INTO services (name, duration_minutes, duration_label, price, category, description) VALUES
                    ('Первая сессия Access Bars', 90, '90 мин', '7 000 ₽', 'Access Bars',
                     'Знакомство с методикой, диагностика и первый сеанс'),
                    ('Стандартная сессия Access Bars', 60, '60 мин', '7 000 ₽', 'Access Bars',
                     'Классический сеанс для регулярной практики'),
                    ('Классический массаж', 60, '60 мин', '6 000 ₽', 'Массаж',
                     'Проработка мышц и суставов'),
                    ('Телесное исцеление', 60, '60 мин', '8 000 ₽', 'Целительство',
                     'Работа с опорно-двигательным аппаратом');
                ",
            )?;
        }

        Ok(())
    }
}
