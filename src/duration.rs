//! Normalizes catalog duration labels ("90 мин", "1.5ч", "1 час 30 мин")
//! into whole minutes. Only the service boundary calls this; the scheduling
//! core works with integers.

use thiserror::Error;

use crate::scheduling::MINUTES_PER_DAY;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DurationError {
    #[error("duration is empty")]
    Empty,

    #[error("expected a number in duration '{0}'")]
    MissingNumber(String),

    #[error("unknown duration unit '{0}'")]
    UnknownUnit(String),

    #[error("duration '{0}' is not a whole number of minutes")]
    Fractional(String),

    #[error("duration must be positive")]
    NotPositive,

    #[error("duration '{0}' is longer than a day")]
    TooLong(String),
}

pub fn parse_minutes(label: &str) -> Result<u32, DurationError> {
    let lower = label.trim().to_lowercase();
    if lower.is_empty() {
        return Err(DurationError::Empty);
    }

    let mut chars = lower.chars().peekable();
    let mut total = 0.0_f64;

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut number = String::new();
        while let Some(c) = chars.next_if(|c| c.is_ascii_digit() || *c == '.' || *c == ',') {
            number.push(if c == ',' { '.' } else { c });
        }
        let value: f64 = number
            .parse()
            .map_err(|_| DurationError::MissingNumber(label.to_string()))?;

        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut unit = String::new();
        while let Some(c) = chars.next_if(|c| c.is_alphabetic()) {
            unit.push(c);
        }
        // "мин." and "ч." are common abbreviations.
        chars.next_if_eq(&'.');

        total += value * unit_factor(&unit)?;
    }

    let rounded = total.round();
    if (total - rounded).abs() > 1e-6 {
        return Err(DurationError::Fractional(label.to_string()));
    }
    if rounded < 1.0 {
        return Err(DurationError::NotPositive);
    }
    if rounded > f64::from(MINUTES_PER_DAY) {
        return Err(DurationError::TooLong(label.to_string()));
    }
    Ok(rounded as u32)
}

fn unit_factor(unit: &str) -> Result<f64, DurationError> {
    match unit {
        "" | "m" | "min" | "mins" | "minute" | "minutes" | "мин" | "минута" | "минуты" | "минут" => {
            Ok(1.0)
        }
        "h" | "hr" | "hrs" | "hour" | "hours" | "ч" | "час" | "часа" | "часов" => Ok(60.0),
        other => Err(DurationError::UnknownUnit(other.to_string())),
    }
}

/// Display label written back for durations entered as plain numbers.
pub fn label_for(minutes: u32) -> String {
    format!("{minutes} мин")
}
