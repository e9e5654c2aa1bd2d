//! Duration strings for subscriber TTLs (`90d`, `12h`, `1y`, `500ms`).
//!
//! A bare number is milliseconds. A year is 365.25 days.

use chrono::Duration;

use crate::error::PkiError;

const MS_PER_SECOND: f64 = 1_000.0;
const MS_PER_MINUTE: f64 = MS_PER_SECOND * 60.0;
const MS_PER_HOUR: f64 = MS_PER_MINUTE * 60.0;
const MS_PER_DAY: f64 = MS_PER_HOUR * 24.0;
const MS_PER_WEEK: f64 = MS_PER_DAY * 7.0;
const MS_PER_YEAR: f64 = MS_PER_DAY * 365.25;

fn unit_multiplier(unit: &str) -> Option<f64> {
    let ms = match unit.to_ascii_lowercase().as_str() {
        "" | "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => 1.0,
        "s" | "sec" | "secs" | "second" | "seconds" => MS_PER_SECOND,
        "m" | "min" | "mins" | "minute" | "minutes" => MS_PER_MINUTE,
        "h" | "hr" | "hrs" | "hour" | "hours" => MS_PER_HOUR,
        "d" | "day" | "days" => MS_PER_DAY,
        "w" | "week" | "weeks" => MS_PER_WEEK,
        "y" | "yr" | "yrs" | "year" | "years" => MS_PER_YEAR,
        _ => return None,
    };
    Some(ms)
}

/// Parse a TTL string into a positive duration.
pub fn parse_ttl(input: &str) -> Result<Duration, PkiError> {
    let invalid = || PkiError::InvalidTtl(input.to_string());
    let trimmed = input.trim();

    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let value: f64 = number.parse().map_err(|_| invalid())?;
    let multiplier = unit_multiplier(unit.trim()).ok_or_else(invalid)?;

    let millis = (value * multiplier).round();
    if !millis.is_finite() || millis <= 0.0 || millis > i64::MAX as f64 {
        return Err(invalid());
    }

    Duration::try_milliseconds(millis as i64).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_units() {
        assert_eq!(parse_ttl("90d").unwrap(), Duration::days(90));
        assert_eq!(parse_ttl("12h").unwrap(), Duration::hours(12));
        assert_eq!(parse_ttl("30m").unwrap(), Duration::minutes(30));
        assert_eq!(parse_ttl("45s").unwrap(), Duration::seconds(45));
        assert_eq!(parse_ttl("2w").unwrap(), Duration::weeks(2));
        assert_eq!(parse_ttl("1 day").unwrap(), Duration::days(1));
    }

    #[test]
    fn bare_numbers_are_milliseconds() {
        assert_eq!(parse_ttl("1500").unwrap(), Duration::milliseconds(1500));
    }

    #[test]
    fn year_is_a_julian_year() {
        assert_eq!(parse_ttl("1y").unwrap(), Duration::hours(24 * 365 + 6));
    }

    #[test]
    fn fractional_values_are_accepted() {
        assert_eq!(parse_ttl("1.5h").unwrap(), Duration::minutes(90));
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "d", "ten days", "5 fortnights", "-5d", "0d"] {
            assert!(
                matches!(parse_ttl(bad), Err(PkiError::InvalidTtl(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}
