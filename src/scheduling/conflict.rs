use chrono::{NaiveDate, NaiveTime};

use super::interval::{format_hhmm, minutes_of, Interval};
use super::{check_duration, OccupiedBooking, SchedulingError, WorkingHours};

/// A booking request reduced to what the conflict check needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingCandidate {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub duration_minutes: u32,
}

impl BookingCandidate {
    pub fn new(date: NaiveDate, start: NaiveTime, duration_minutes: u32) -> Self {
        BookingCandidate {
            date,
            start,
            duration_minutes,
        }
    }

    fn session(&self) -> Interval {
        Interval::new(minutes_of(self.start), self.duration_minutes)
    }
}

/// Decides whether `candidate` may be written.
///
/// `existing` must be the active bookings of `candidate.date` read from the
/// store in the same transaction as the write, minus the booking being
/// edited. `now` carries the current date and time for client requests;
/// admin requests pass `None` and may book in the past.
///
/// The candidate's session must stay clear of each existing booking's
/// session and trailing buffer. The candidate's own buffer is not checked
/// against later bookings.
pub fn validate_booking(
    candidate: &BookingCandidate,
    hours: &WorkingHours,
    existing: &[OccupiedBooking],
    now: Option<(NaiveDate, NaiveTime)>,
) -> Result<(), SchedulingError> {
    hours.validate()?;
    check_duration(candidate.duration_minutes)?;

    if let Some((today, time)) = now {
        if candidate.date < today || (candidate.date == today && candidate.start < time) {
            return Err(SchedulingError::PastDate);
        }
    }

    if !hours.open {
        return Err(SchedulingError::OutOfWindow(format!(
            "{} is not a working day",
            candidate.date
        )));
    }

    let session = candidate.session();
    let window = hours.window();
    if session.start < window.start || session.end > window.end {
        return Err(SchedulingError::OutOfWindow(format!(
            "a {} minute session at {} does not fit between {} and {}",
            candidate.duration_minutes,
            format_hhmm(candidate.start),
            format_hhmm(hours.start),
            format_hhmm(hours.end)
        )));
    }

    if let Some(pause) = hours.pause_interval() {
        if session.intersects(&pause) {
            return Err(SchedulingError::OutOfWindow(format!(
                "a {} minute session at {} overlaps the break",
                candidate.duration_minutes,
                format_hhmm(candidate.start)
            )));
        }
    }

    if existing
        .iter()
        .any(|b| session.intersects(&b.occupied(hours.buffer_minutes)))
    {
        return Err(SchedulingError::SlotConflict);
    }

    Ok(())
}
