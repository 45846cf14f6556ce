//! Shift-window and utilization arithmetic.

use crate::error::{Result, WmsError};

/// Parse a wall-clock `HH:MM[:SS]` string into seconds since midnight,
/// rejecting out-of-range components.
pub fn parse_shift_time(raw: &str) -> Result<u32> {
    let parts: Vec<&str> = raw.trim().split(':').collect();
    if parts.len() != 2 && parts.len() != 3 {
        return Err(WmsError::InvalidInput(format!(
            "shift time must be HH:MM or HH:MM:SS, got {raw:?}"
        )));
    }

    let parse_component = |s: &str, max: u32, name: &str| -> Result<u32> {
        let value: u32 = s.parse().map_err(|_| {
            WmsError::InvalidInput(format!("shift time {name} is not a number: {s:?}"))
        })?;
        if value > max {
            return Err(WmsError::InvalidInput(format!(
                "shift time {name} out of range: {value}"
            )));
        }
        Ok(value)
    };

    let hours = parse_component(parts[0], 23, "hours")?;
    let minutes = parse_component(parts[1], 59, "minutes")?;
    let seconds = if parts.len() == 3 {
        parse_component(parts[2], 59, "seconds")?
    } else {
        0
    };

    Ok(hours * 3600 + minutes * 60 + seconds)
}

/// Shift length in seconds. Equal endpoints mean no shift; an end before
/// the start wraps around midnight.
pub fn shift_duration_seconds(start: u32, end: u32) -> u32 {
    use std::cmp::Ordering;
    match end.cmp(&start) {
        Ordering::Equal => 0,
        Ordering::Greater => end - start,
        Ordering::Less => 86_400 - start + end,
    }
}

/// Share of the shift spent on completed-task active time, two-decimal
/// rounded and clamped to [0, 100]. Zero-length shifts yield 0.
pub fn utilization_percent(total_active_seconds: i64, shift_duration_seconds: u32) -> f64 {
    if shift_duration_seconds == 0 {
        return 0.0;
    }
    let raw = 100.0 * total_active_seconds as f64 / shift_duration_seconds as f64;
    let rounded = (raw * 100.0).round() / 100.0;
    rounded.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_forms() {
        assert_eq!(parse_shift_time("08:00").unwrap(), 8 * 3600);
        assert_eq!(parse_shift_time("23:59:59").unwrap(), 23 * 3600 + 59 * 60 + 59);
        assert_eq!(parse_shift_time("00:00").unwrap(), 0);
    }

    #[test]
    fn rejects_out_of_range_components() {
        assert!(parse_shift_time("24:00").is_err());
        assert!(parse_shift_time("12:60").is_err());
        assert!(parse_shift_time("12:00:61").is_err());
        assert!(parse_shift_time("noon").is_err());
        assert!(parse_shift_time("12").is_err());
    }

    #[test]
    fn duration_cases() {
        // 08:00 -> 16:00
        assert_eq!(shift_duration_seconds(8 * 3600, 16 * 3600), 8 * 3600);
        // equal endpoints
        assert_eq!(shift_duration_seconds(8 * 3600, 8 * 3600), 0);
        // 22:00 -> 06:00 crosses midnight
        assert_eq!(shift_duration_seconds(22 * 3600, 6 * 3600), 8 * 3600);
    }

    #[test]
    fn utilization_bounds_and_rounding() {
        assert_eq!(utilization_percent(0, 0), 0.0);
        assert_eq!(utilization_percent(4 * 3600, 8 * 3600), 50.0);
        // Over-shift active time clamps at 100.
        assert_eq!(utilization_percent(10 * 3600, 8 * 3600), 100.0);
        // Two-decimal rounding.
        let value = utilization_percent(1000, 28_800);
        assert_eq!(value, 3.47);
    }
}
