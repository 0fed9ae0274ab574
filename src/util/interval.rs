use std::time::Duration;
use thiserror::Error;

/// Errors from [`parse_interval`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntervalError {
    #[error("Empty duration")]
    Empty,
    #[error("Invalid duration {0:?}: expected forms like 30s, 1m or 1h30m")]
    Invalid(String),
    #[error("Unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { input: String, unit: String },
    #[error("Duration {0:?} is too large")]
    Overflow(String),
    #[error("Duration {0:?} must be positive")]
    NotPositive(String),
}

/// Nanoseconds per unit suffix
const UNITS: &[(&str, u128)] = &[
    ("ns", 1),
    ("us", 1_000),
    ("µs", 1_000),
    ("μs", 1_000),
    ("ms", 1_000_000),
    ("s", 1_000_000_000),
    ("m", 60 * 1_000_000_000),
    ("h", 60 * 60 * 1_000_000_000),
];

/// Parses a human-readable poll interval such as `30s`, `1m`, `1h30m` or `1.5s`.
///
/// The input is a sequence of `<decimal><unit>` groups; units are `ns`, `us`
/// (or `µs`), `ms`, `s`, `m` and `h`. The total must be strictly positive:
/// negative and zero durations are rejected with [`IntervalError::NotPositive`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use gator::util::parse_interval;
///
/// assert_eq!(parse_interval("1m").unwrap(), Duration::from_secs(60));
/// assert_eq!(parse_interval("1h30m").unwrap(), Duration::from_secs(5400));
/// assert!(parse_interval("0s").is_err());
/// ```
pub fn parse_interval(input: &str) -> Result<Duration, IntervalError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(IntervalError::Empty);
    }

    let (negative, mut rest) = match s.as_bytes()[0] {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    if rest.is_empty() {
        return Err(IntervalError::Invalid(input.to_string()));
    }

    let mut total_nanos: u128 = 0;
    while !rest.is_empty() {
        // Number: digits with an optional fractional part
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = &rest[..num_end];
        if number.is_empty() || number == "." || number.matches('.').count() > 1 {
            return Err(IntervalError::Invalid(input.to_string()));
        }
        rest = &rest[num_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_end];
        if unit.is_empty() {
            return Err(IntervalError::Invalid(input.to_string()));
        }
        rest = &rest[unit_end..];

        let scale = UNITS
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, scale)| *scale)
            .ok_or_else(|| IntervalError::UnknownUnit {
                input: input.to_string(),
                unit: unit.to_string(),
            })?;

        total_nanos = total_nanos
            .checked_add(scaled(number, scale).ok_or_else(|| IntervalError::Overflow(input.to_string()))?)
            .ok_or_else(|| IntervalError::Overflow(input.to_string()))?;
    }

    if negative || total_nanos == 0 {
        return Err(IntervalError::NotPositive(input.to_string()));
    }

    let secs = u64::try_from(total_nanos / 1_000_000_000)
        .map_err(|_| IntervalError::Overflow(input.to_string()))?;
    let nanos = (total_nanos % 1_000_000_000) as u32;
    Ok(Duration::new(secs, nanos))
}

/// `number` (decimal, maybe fractional) times `scale` nanoseconds, truncated
fn scaled(number: &str, scale: u128) -> Option<u128> {
    let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut nanos = whole.checked_mul(scale)?;

    let mut place = scale;
    for digit in frac.bytes() {
        place /= 10;
        if place == 0 {
            break;
        }
        nanos = nanos.checked_add(u128::from(digit - b'0') * place)?;
    }
    Some(nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_simple_units() {
        assert_eq!(parse_interval("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_interval("1m"), Ok(Duration::from_secs(60)));
        assert_eq!(parse_interval("2h"), Ok(Duration::from_secs(7200)));
        assert_eq!(parse_interval("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_interval("10us"), Ok(Duration::from_micros(10)));
        assert_eq!(parse_interval("10µs"), Ok(Duration::from_micros(10)));
        assert_eq!(parse_interval("7ns"), Ok(Duration::from_nanos(7)));
    }

    #[test]
    fn test_compound_and_fractional() {
        assert_eq!(parse_interval("1h30m"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_interval("1m30s"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_interval("1.5s"), Ok(Duration::from_millis(1500)));
        assert_eq!(parse_interval(".5m"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_interval(" 45s "), Ok(Duration::from_secs(45)));
    }

    #[test]
    fn test_rejects_non_positive() {
        assert!(matches!(parse_interval("0s"), Err(IntervalError::NotPositive(_))));
        assert!(matches!(parse_interval("-1m"), Err(IntervalError::NotPositive(_))));
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(parse_interval(""), Err(IntervalError::Empty));
        assert!(matches!(parse_interval("10"), Err(IntervalError::Invalid(_))));
        assert!(matches!(parse_interval("m"), Err(IntervalError::Invalid(_))));
        assert!(matches!(parse_interval("1..5s"), Err(IntervalError::Invalid(_))));
        assert!(matches!(parse_interval("-"), Err(IntervalError::Invalid(_))));
        assert!(matches!(
            parse_interval("5d"),
            Err(IntervalError::UnknownUnit { ref unit, .. }) if unit == "d"
        ));
    }

    #[test]
    fn test_overflow() {
        assert!(matches!(
            parse_interval("99999999999999999999999999999999999999h"),
            Err(IntervalError::Overflow(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_whole_seconds_roundtrip(secs in 1u64..1_000_000) {
            prop_assert_eq!(parse_interval(&format!("{}s", secs)), Ok(Duration::from_secs(secs)));
        }

        #[test]
        fn prop_minutes_and_seconds_add_up(m in 0u64..10_000, s in 1u64..60) {
            let parsed = parse_interval(&format!("{}m{}s", m, s)).unwrap();
            prop_assert_eq!(parsed, Duration::from_secs(m * 60 + s));
        }

        #[test]
        fn prop_never_panics(input in "\\PC{0,12}") {
            let _ = parse_interval(&input);
        }
    }
}
