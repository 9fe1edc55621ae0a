use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::scheduling::interval::hhmm;
use crate::scheduling::slots::Slot;
use crate::scheduling::WorkingHours;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub duration_minutes: u32,
    pub duration_label: String,
    pub price: String,
    pub category: String,
    pub description: Option<String>,
    pub is_active: bool,
}

/// Admin input for creating or editing a service. `duration` is the
/// display label shown on the site, e.g. "90 мин".
#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceInput {
    pub name: String,
    pub duration: String,
    pub price: String,
    pub category: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Active bookings occupy time on the schedule.
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Cancelled) | (Confirmed, Completed)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status '{other}'")),
        }
    }
}

impl ToSql for BookingStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for BookingStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Booking {
    pub id: i64,
    pub service_id: i64,
    pub service_name: String,
    pub booking_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub client_name: String,
    pub client_phone: String,
    pub client_email: Option<String>,
    pub notes: Option<String>,
    pub status: BookingStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateBooking {
    pub service_id: i64,
    pub booking_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    pub client_name: String,
    pub client_phone: String,
    pub client_email: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AdminCreateBooking {
    #[serde(flatten)]
    pub booking: CreateBooking,
    pub status: Option<BookingStatus>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BookingCreated {
    pub success: bool,
    pub booking_id: i64,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub status: BookingStatus,
}

/// Admin reschedule: new date, time and service, optionally a new status.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UpdateBooking {
    pub booking_id: i64,
    pub booking_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    pub service_id: i64,
    pub status: Option<BookingStatus>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AdminAction {
    UpdateBooking(UpdateBooking),
    UpdateBookingStatus {
        booking_id: i64,
        status: BookingStatus,
    },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelBooking {
    pub client_phone: String,
}

/// Global schedule configuration edited from the admin panel.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ScheduleSettings {
    pub time_slot_interval_minutes: u32,
    /// Technical break after each session.
    pub break_duration_minutes: u32,
    #[serde(with = "hhmm")]
    pub working_hours_start: NaiveTime,
    #[serde(with = "hhmm")]
    pub working_hours_end: NaiveTime,
}

impl ScheduleSettings {
    /// Resolves the working window of a date. The weekday template applies
    /// first, then the date's own override.
    pub fn working_hours(&self, weekday: Option<&WeekdaySchedule>, day: Option<&ScheduleDay>) -> WorkingHours {
        let mut hours = WorkingHours::new(
            self.working_hours_start,
            self.working_hours_end,
            self.time_slot_interval_minutes,
            self.break_duration_minutes,
        );
        if let Some(week) = weekday {
            hours = apply_override(
                hours,
                week.is_working,
                week.start_time,
                week.end_time,
                week.break_start.zip(week.break_end),
            );
        }
        if let Some(day) = day {
            hours = apply_override(
                hours,
                day.is_working,
                day.start_time,
                day.end_time,
                day.break_start.zip(day.break_end),
            );
        }
        hours
    }
}

fn apply_override(
    mut hours: WorkingHours,
    is_working: bool,
    start: Option<NaiveTime>,
    end: Option<NaiveTime>,
    pause: Option<(NaiveTime, NaiveTime)>,
) -> WorkingHours {
    hours.open = is_working;
    hours.start = start.unwrap_or(hours.start);
    hours.end = end.unwrap_or(hours.end);
    hours.pause = pause;
    hours
}

/// Recurring hours for one day of the week, 1 = Monday to 7 = Sunday.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WeekdaySchedule {
    pub day_of_week: u32,
    pub is_working: bool,
    #[serde(default, with = "hhmm::option")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "hhmm::option")]
    pub end_time: Option<NaiveTime>,
    #[serde(default, with = "hhmm::option")]
    pub break_start: Option<NaiveTime>,
    #[serde(default, with = "hhmm::option")]
    pub break_end: Option<NaiveTime>,
}

/// Per-date override of the global working hours.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ScheduleDay {
    pub date: NaiveDate,
    pub is_working: bool,
    #[serde(default, with = "hhmm::option")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "hhmm::option")]
    pub end_time: Option<NaiveTime>,
    #[serde(default, with = "hhmm::option")]
    pub break_start: Option<NaiveTime>,
    #[serde(default, with = "hhmm::option")]
    pub break_end: Option<NaiveTime>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
    pub service_id: i64,
}

/// Availability over consecutive dates. `from` defaults to today and
/// `days` to a week.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScheduleQuery {
    pub service_id: i64,
    pub from: Option<NaiveDate>,
    pub days: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DateQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WorkingHoursView {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
    #[serde(with = "hhmm::option")]
    pub break_start: Option<NaiveTime>,
    #[serde(with = "hhmm::option")]
    pub break_end: Option<NaiveTime>,
}

impl From<&WorkingHours> for WorkingHoursView {
    fn from(hours: &WorkingHours) -> Self {
        WorkingHoursView {
            start: hours.start,
            end: hours.end,
            break_start: hours.pause.map(|(from, _)| from),
            break_end: hours.pause.map(|(_, to)| to),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Availability {
    pub date: NaiveDate,
    pub service_id: i64,
    pub service_name: String,
    pub service_duration: u32,
    pub working_hours: Option<WorkingHoursView>,
    pub available_slots: Vec<String>,
    pub slots: Vec<Slot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
