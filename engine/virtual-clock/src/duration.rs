//! Tick amounts: plain millisecond counts or `"[[HH:]MM:]SS"` clock strings

use std::time::Duration;

use crate::error::ClockError;
use crate::job::Millis;

const MS_PER_SECOND: u64 = 1000;

/// How far a single `tick` call should move the clock
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickAmount {
    Millis(Millis),
    Text(String),
}

impl Default for TickAmount {
    fn default() -> Self {
        TickAmount::Millis(0)
    }
}

impl TickAmount {
    /// Resolve to milliseconds without touching any clock
    pub fn resolve(&self) -> Result<Millis, ClockError> {
        match self {
            TickAmount::Millis(ms) => Ok(*ms),
            TickAmount::Text(text) => parse_clock_string(text),
        }
    }
}

impl From<u64> for TickAmount {
    fn from(ms: u64) -> Self {
        TickAmount::Millis(ms)
    }
}

impl From<u32> for TickAmount {
    fn from(ms: u32) -> Self {
        TickAmount::Millis(ms as u64)
    }
}

impl From<usize> for TickAmount {
    fn from(ms: usize) -> Self {
        TickAmount::Millis(ms as u64)
    }
}

// Negative counts are routed through the text parser, which rejects the sign.
impl From<i64> for TickAmount {
    fn from(ms: i64) -> Self {
        match u64::try_from(ms) {
            Ok(ms) => TickAmount::Millis(ms),
            Err(_) => TickAmount::Text(ms.to_string()),
        }
    }
}

impl From<i32> for TickAmount {
    fn from(ms: i32) -> Self {
        TickAmount::from(ms as i64)
    }
}

impl From<Duration> for TickAmount {
    fn from(d: Duration) -> Self {
        TickAmount::Millis(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

impl From<&str> for TickAmount {
    fn from(text: &str) -> Self {
        TickAmount::Text(text.to_string())
    }
}

impl From<String> for TickAmount {
    fn from(text: String) -> Self {
        TickAmount::Text(text)
    }
}

impl<T: Into<TickAmount>> From<Option<T>> for TickAmount {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or_default()
    }
}

/// Parse `"SS"`, `"MM:SS"` or `"HH:MM:SS"` into milliseconds.
///
/// Minutes and seconds take one or two digits and must be below 60; hours
/// take any number of digits. The empty string means zero.
pub fn parse_clock_string(input: &str) -> Result<Millis, ClockError> {
    if input.is_empty() {
        return Ok(0);
    }

    let groups: Vec<&str> = input.split(':').collect();
    if groups.len() > 3 {
        return Err(ClockError::format(input, "expected at most three ':'-separated groups"));
    }

    let mut seconds: u64 = 0;
    for (position, group) in groups.iter().rev().enumerate() {
        let is_hours = position == 2;
        let value = parse_group(input, group, is_hours)?;
        if !is_hours && value >= 60 {
            return Err(ClockError::format(input, format!("component {group} is out of range")));
        }
        let scale = 60u64.pow(position as u32);
        seconds = value
            .checked_mul(scale)
            .and_then(|v| seconds.checked_add(v))
            .ok_or_else(|| ClockError::format(input, "amount overflows"))?;
    }

    seconds.checked_mul(MS_PER_SECOND).ok_or_else(|| ClockError::format(input, "amount overflows"))
}

fn parse_group(input: &str, group: &str, is_hours: bool) -> Result<u64, ClockError> {
    if group.is_empty() || !group.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ClockError::format(input, format!("component {group:?} is not a number")));
    }
    if !is_hours && group.len() > 2 {
        return Err(ClockError::format(input, format!("component {group} has too many digits")));
    }
    group.parse::<u64>().map_err(|_| ClockError::format(input, "amount overflows"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_shape() {
        assert_eq!(parse_clock_string("08").unwrap(), 8_000);
        assert_eq!(parse_clock_string("7").unwrap(), 7_000);
        assert_eq!(parse_clock_string("01:00").unwrap(), 60_000);
        assert_eq!(parse_clock_string("02:34:10").unwrap(), 9_250_000);
        assert_eq!(parse_clock_string("").unwrap(), 0);
    }

    #[test]
    fn single_digit_groups_are_accepted() {
        assert_eq!(parse_clock_string("1:30").unwrap(), 90_000);
        assert_eq!(parse_clock_string("1:00:00").unwrap(), 3_600_000);
        assert_eq!(parse_clock_string("0:5:7").unwrap(), 307_000);
        assert_eq!(parse_clock_string("100:00:00").unwrap(), 360_000_000);
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in ["12:02:34:10", "67:10", "-7:10", "1:60", "ab", "1::2", ":", "10:", "001:10", "1.5"] {
            let err = parse_clock_string(bad).unwrap_err();
            assert!(matches!(err, ClockError::Format { .. }), "{bad} should be rejected");
        }
    }

    #[test]
    fn negative_counts_are_rejected() {
        let amount = TickAmount::from(-10i64);
        assert!(matches!(amount.resolve(), Err(ClockError::Format { .. })));
        assert_eq!(TickAmount::from(None::<u64>).resolve().unwrap(), 0);
    }
}
