//! Appointment scheduling core: slot generation and the authoritative
//! conflict check.
//!
//! Everything in here is pure. Callers load the working hours and the active
//! bookings of a date and pass them in explicitly; nothing reads the store or
//! the clock on its own.

pub mod conflict;
pub mod interval;
pub mod slots;

use chrono::NaiveTime;
use thiserror::Error;

use interval::{minutes_of, Interval};

pub use conflict::{validate_booking, BookingCandidate};
pub use slots::{generate_slots, mark_elapsed};

/// Upper bound for every duration, interval and buffer.
pub const MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    #[error("Scheduling is temporarily unavailable: {0}")]
    InvalidConfiguration(String),

    #[error("This time slot is no longer available, please pick another one")]
    SlotConflict,

    #[error("Requested time is outside working hours: {0}")]
    OutOfWindow(String),

    #[error("Bookings can only be made for today or a later date")]
    PastDate,
}

/// Working window of one concrete date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingHours {
    pub open: bool,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub interval_minutes: u32,
    /// Mandatory gap after each session.
    pub buffer_minutes: u32,
    /// Lunch pause inside the window, if any.
    pub pause: Option<(NaiveTime, NaiveTime)>,
}

impl WorkingHours {
    pub fn new(start: NaiveTime, end: NaiveTime, interval_minutes: u32, buffer_minutes: u32) -> Self {
        WorkingHours {
            open: true,
            start,
            end,
            interval_minutes,
            buffer_minutes,
            pause: None,
        }
    }

    pub fn with_pause(mut self, from: NaiveTime, to: NaiveTime) -> Self {
        self.pause = Some((from, to));
        self
    }

    pub fn closed(mut self) -> Self {
        self.open = false;
        self
    }

    pub fn validate(&self) -> Result<(), SchedulingError> {
        if self.start >= self.end {
            return Err(SchedulingError::InvalidConfiguration(format!(
                "working hours start {} is not before end {}",
                interval::format_hhmm(self.start),
                interval::format_hhmm(self.end)
            )));
        }
        if self.interval_minutes == 0 || self.interval_minutes > MINUTES_PER_DAY {
            return Err(SchedulingError::InvalidConfiguration(format!(
                "slot interval must be between 1 and {MINUTES_PER_DAY} minutes, got {}",
                self.interval_minutes
            )));
        }
        if self.buffer_minutes > MINUTES_PER_DAY {
            return Err(SchedulingError::InvalidConfiguration(format!(
                "break after a session must not exceed {MINUTES_PER_DAY} minutes, got {}",
                self.buffer_minutes
            )));
        }
        if let Some((from, to)) = self.pause {
            if from >= to {
                return Err(SchedulingError::InvalidConfiguration(format!(
                    "break start {} is not before break end {}",
                    interval::format_hhmm(from),
                    interval::format_hhmm(to)
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn window(&self) -> Interval {
        Interval {
            start: minutes_of(self.start),
            end: minutes_of(self.end),
        }
    }

    pub(crate) fn pause_interval(&self) -> Option<Interval> {
        self.pause.map(|(from, to)| Interval {
            start: minutes_of(from),
            end: minutes_of(to),
        })
    }
}

/// An active booking as seen by the scheduling core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccupiedBooking {
    pub start: NaiveTime,
    pub duration_minutes: u32,
}

impl OccupiedBooking {
    pub fn new(start: NaiveTime, duration_minutes: u32) -> Self {
        OccupiedBooking {
            start,
            duration_minutes,
        }
    }

    /// The session itself.
    pub fn core(&self) -> Interval {
        Interval::new(minutes_of(self.start), self.duration_minutes)
    }

    /// The session plus its trailing buffer.
    pub fn occupied(&self, buffer_minutes: u32) -> Interval {
        Interval::new(
            minutes_of(self.start),
            self.duration_minutes.saturating_add(buffer_minutes),
        )
    }
}

pub(crate) fn check_duration(duration_minutes: u32) -> Result<(), SchedulingError> {
    if duration_minutes == 0 || duration_minutes > MINUTES_PER_DAY {
        return Err(SchedulingError::InvalidConfiguration(format!(
            "service duration must be between 1 and {MINUTES_PER_DAY} minutes, got {duration_minutes}"
        )));
    }
    Ok(())
}
