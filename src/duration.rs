use regex::Regex;
use std::sync::OnceLock;

use crate::error::{Error, Result};

const SECS_PER_DAY: u64 = 86_400;
const SECS_PER_HOUR: u64 = 3_600;
const SECS_PER_MINUTE: u64 = 60;

/// ISO-8601 interval notation as the platform emits it: an optional day
/// count followed by an optional time-of-day section, e.g. `P1DT2H3M4S`,
/// `PT1H2M3S`, `PT90M`.
fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$")
            .expect("duration pattern is valid")
    })
}

/// Parses an ISO-8601 duration token into whole seconds.
///
/// Absent components count as zero, but a token with no recognizable
/// component at all (or with units out of order, non-numeric digits, or a
/// value that overflows u64 seconds) fails with [`Error::DurationParse`].
pub fn parse_duration(token: &str) -> Result<u64> {
    let trimmed = token.trim();
    let caps = token_pattern()
        .captures(trimmed)
        .ok_or_else(|| Error::DurationParse(token.to_string()))?;

    // A trailing time designator with no fields ("P1DT") is malformed.
    let has_time_field =
        caps.get(2).is_some() || caps.get(3).is_some() || caps.get(4).is_some();
    if trimmed.contains('T') && !has_time_field {
        return Err(Error::DurationParse(token.to_string()));
    }

    let mut matched_any = false;
    let mut component = |idx: usize| -> Result<u64> {
        match caps.get(idx) {
            Some(m) => {
                matched_any = true;
                m.as_str()
                    .parse::<u64>()
                    .map_err(|_| Error::DurationParse(token.to_string()))
            }
            None => Ok(0),
        }
    };

    let days = component(1)?;
    let hours = component(2)?;
    let minutes = component(3)?;
    let seconds = component(4)?;

    if !matched_any {
        return Err(Error::DurationParse(token.to_string()));
    }

    days.checked_mul(SECS_PER_DAY)
        .and_then(|acc| hours.checked_mul(SECS_PER_HOUR).and_then(|h| acc.checked_add(h)))
        .and_then(|acc| minutes.checked_mul(SECS_PER_MINUTE).and_then(|m| acc.checked_add(m)))
        .and_then(|acc| acc.checked_add(seconds))
        .ok_or_else(|| Error::DurationParse(token.to_string()))
}

/// Formats whole seconds for display, eliding leading zero units:
/// `93784` becomes `"1d 2h 3m 4s"`, `59` becomes `"59s"`.
pub fn format_duration(total_seconds: u64) -> String {
    let days = total_seconds / SECS_PER_DAY;
    let hours = (total_seconds % SECS_PER_DAY) / SECS_PER_HOUR;
    let minutes = (total_seconds % SECS_PER_HOUR) / SECS_PER_MINUTE;
    let seconds = total_seconds % SECS_PER_MINUTE;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 || days > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 || hours > 0 || days > 0 {
        parts.push(format!("{}m", minutes));
    }
    parts.push(format!("{}s", seconds));
    parts.join(" ")
}

/// Projects a total onto a playback speed, truncating toward zero.
/// Non-positive speeds leave the total unchanged.
pub fn at_speed(total_seconds: u64, speed: f64) -> u64 {
    if speed <= 0.0 {
        return total_seconds;
    }
    (total_seconds as f64 / speed) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_token() {
        assert_eq!(parse_duration("P1DT2H3M4S").unwrap(), 93_784);
    }

    #[test]
    fn test_parse_time_only() {
        assert_eq!(parse_duration("PT1H2M3S").unwrap(), 3723);
        assert_eq!(parse_duration("PT90M").unwrap(), 5400);
        assert_eq!(parse_duration("PT45S").unwrap(), 45);
        assert_eq!(parse_duration("PT3H").unwrap(), 10_800);
    }

    #[test]
    fn test_parse_days_only() {
        assert_eq!(parse_duration("P2D").unwrap(), 172_800);
    }

    #[test]
    fn test_parse_rejects_empty_and_componentless() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("P").is_err());
        assert!(parse_duration("PT").is_err());
        assert!(parse_duration("P1DT").is_err());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse_duration("1h2m").is_err());
        assert!(parse_duration("PT-5S").is_err());
        assert!(parse_duration("PT3H2M1H").is_err());
        assert!(parse_duration("PTxS").is_err());
        assert!(parse_duration("P1D2H").is_err()); // hours require the T separator
    }

    #[test]
    fn test_parse_rejects_overflow() {
        assert!(parse_duration("P999999999999999999999D").is_err());
        assert!(parse_duration("PT18446744073709551615H").is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(93_784), "1d 2h 3m 4s");
        assert_eq!(format_duration(59), "59s");
        assert_eq!(format_duration(3600), "1h 0m 0s");
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(125), "2m 5s");
    }

    #[test]
    fn test_at_speed() {
        assert_eq!(at_speed(185, 2.0), 92);
        assert_eq!(at_speed(5400, 1.5), 3600);
        assert_eq!(at_speed(100, 0.0), 100);
    }
}
