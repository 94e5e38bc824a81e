//! Millisecond timestamp helpers

/// Milliseconds in a second
pub const MS_PER_SECOND: i64 = 1_000;
/// Milliseconds in a minute
pub const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
/// Milliseconds in an hour
pub const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
/// Milliseconds in a day
pub const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;
/// Milliseconds in a week
pub const MS_PER_WEEK: i64 = 7 * MS_PER_DAY;

/// Round `ms` down to a multiple of `unit_ms`
pub fn round_down(ms: i64, unit_ms: i64) -> i64 {
    ms - ms.rem_euclid(unit_ms)
}

/// Round `ms` up to a multiple of `unit_ms`
pub fn round_up(ms: i64, unit_ms: i64) -> i64 {
    let rem = ms.rem_euclid(unit_ms);
    if rem == 0 {
        ms
    } else {
        ms + unit_ms - rem
    }
}

/// Round `ms` down to the whole second
pub fn round_down_to_second(ms: i64) -> i64 {
    round_down(ms, MS_PER_SECOND)
}

/// Whole seconds in `ms`, rounding towards negative infinity
pub fn ms_to_seconds(ms: i64) -> i64 {
    ms.div_euclid(MS_PER_SECOND)
}

/// Fractional minutes in `ms`
#[allow(clippy::cast_precision_loss)]
pub fn ms_to_minutes(ms: i64) -> f64 {
    ms as f64 / MS_PER_MINUTE as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 60_000, 0, 0)]
    #[case(59_999, 60_000, 0, 60_000)]
    #[case(60_000, 60_000, 60_000, 60_000)]
    #[case(-1, 60_000, -60_000, 0)]
    #[case(1_500, 1_000, 1_000, 2_000)]
    fn test_rounding(#[case] ms: i64, #[case] unit: i64, #[case] down: i64, #[case] up: i64) {
        assert_eq!(round_down(ms, unit), down);
        assert_eq!(round_up(ms, unit), up);
    }

    #[test]
    fn test_minutes() {
        assert!((ms_to_minutes(90_000) - 1.5).abs() < 0.0001);
        assert_eq!(ms_to_seconds(-1), -1);
    }
}
