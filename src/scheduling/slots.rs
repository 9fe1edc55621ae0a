use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::interval::{self, minutes_of, Interval};
use super::{check_duration, OccupiedBooking, SchedulingError, WorkingHours};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    /// Overlaps the session of another booking.
    BookingConflict,
    /// Overlaps only the technical break after another booking.
    Buffer,
    /// Overlaps the lunch pause of the day.
    Break,
    /// Starts before the current time.
    Past,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    #[serde(with = "interval::hhmm")]
    pub time: NaiveTime,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<UnavailableReason>,
}

impl Slot {
    fn open(time: NaiveTime) -> Self {
        Slot {
            time,
            available: true,
            reason: None,
        }
    }

    fn blocked(time: NaiveTime, reason: UnavailableReason) -> Self {
        Slot {
            time,
            available: false,
            reason: Some(reason),
        }
    }
}

/// Lists every start time on the grid of `hours` that fits a session of
/// `duration_minutes`, tagging each as available or not.
///
/// A session may end exactly at closing time. `existing` must hold the
/// active bookings of the same date; they may overlap each other.
pub fn generate_slots(
    hours: &WorkingHours,
    duration_minutes: u32,
    existing: &[OccupiedBooking],
) -> Result<Vec<Slot>, SchedulingError> {
    hours.validate()?;
    check_duration(duration_minutes)?;

    if !hours.open {
        return Ok(Vec::new());
    }

    let window = hours.window();
    let pause = hours.pause_interval();
    let mut slots = Vec::new();

    let mut start = window.start;
    while start.saturating_add(duration_minutes) <= window.end {
        let Some(time) = interval::time_of(start) else {
            break;
        };
        let session = Interval::new(start, duration_minutes);

        let slot = match blocking_reason(&session, existing, hours.buffer_minutes, pause) {
            Some(reason) => Slot::blocked(time, reason),
            None => Slot::open(time),
        };
        slots.push(slot);

        start = start.saturating_add(hours.interval_minutes);
    }

    Ok(slots)
}

fn blocking_reason(
    session: &Interval,
    existing: &[OccupiedBooking],
    buffer_minutes: u32,
    pause: Option<Interval>,
) -> Option<UnavailableReason> {
    if existing.iter().any(|b| session.intersects(&b.core())) {
        return Some(UnavailableReason::BookingConflict);
    }
    if existing
        .iter()
        .any(|b| session.intersects(&b.occupied(buffer_minutes)))
    {
        return Some(UnavailableReason::Buffer);
    }
    if pause.is_some_and(|p| session.intersects(&p)) {
        return Some(UnavailableReason::Break);
    }
    None
}

/// Marks slots starting before `now` as unavailable. Used for today's
/// client-facing queries only.
pub fn mark_elapsed(slots: &mut [Slot], now: NaiveTime) {
    let now = minutes_of(now);
    for slot in slots.iter_mut().filter(|s| s.available) {
        if minutes_of(slot.time) < now {
            slot.available = false;
            slot.reason = Some(UnavailableReason::Past);
        }
    }
}

pub fn available_times(slots: &[Slot]) -> Vec<String> {
    slots
        .iter()
        .filter(|s| s.available)
        .map(|s| interval::format_hhmm(s.time))
        .collect()
}
