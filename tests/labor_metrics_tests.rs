//! Shift-window and utilization arithmetic.

use wms_core::labor::{parse_shift_time, shift_duration_seconds, utilization_percent};

#[test]
fn shift_duration_table() {
    let t = |s: &str| parse_shift_time(s).unwrap();

    // Day shift.
    assert_eq!(shift_duration_seconds(t("08:00"), t("16:00")), 8 * 3600);
    // Zero-length window.
    assert_eq!(shift_duration_seconds(t("09:30"), t("09:30")), 0);
    // Night shift across midnight.
    assert_eq!(shift_duration_seconds(t("22:00"), t("06:00")), 8 * 3600);
    assert_eq!(shift_duration_seconds(t("23:59"), t("00:01")), 120);
}

#[test]
fn shift_time_rejects_out_of_range_components() {
    assert!(parse_shift_time("24:00").is_err());
    assert!(parse_shift_time("08:60").is_err());
    assert!(parse_shift_time("08:00:60").is_err());
    assert!(parse_shift_time("8").is_err());
    assert!(parse_shift_time("08:00:00:00").is_err());
    assert!(parse_shift_time("").is_err());
}

#[test]
fn shift_time_accepts_optional_seconds() {
    assert_eq!(parse_shift_time("06:30").unwrap(), 6 * 3600 + 30 * 60);
    assert_eq!(parse_shift_time("06:30:15").unwrap(), 6 * 3600 + 30 * 60 + 15);
}

#[test]
fn utilization_is_clamped_and_rounded() {
    // Half of an 8-hour shift.
    assert_eq!(utilization_percent(4 * 3600, 8 * 3600), 50.0);
    // More active time than shift clamps to 100.
    assert_eq!(utilization_percent(9 * 3600, 8 * 3600), 100.0);
    // Zero shift yields zero, not a division error.
    assert_eq!(utilization_percent(3600, 0), 0.0);
    // Two decimals.
    assert_eq!(utilization_percent(1234, 28_800), 4.28);
}
