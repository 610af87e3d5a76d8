//! Parses the scan agent's `--interval` flag: an optional `Nd`, `Nh`, `Nm`,
//! `Ns` run, in that order. A smaller unit's value must be less than the
//! span of every larger unit that's also present (so `"1d25h"` is rejected
//! because 25 hours overflows the day, but `"90s"` alone is accepted since
//! no larger unit was specified to overflow against).

use std::time::Duration;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum IntervalError {
    #[error("invalid interval specification: not of the proper format '{0}'")]
    Malformed(String),
    #[error("invalid interval specification: {component} exceeds {limit} when {larger_unit} is also specified")]
    ComponentOverflow {
        component: &'static str,
        limit: u64,
        larger_unit: &'static str,
    },
}

pub fn parse_interval(spec: &str) -> Result<Duration, IntervalError> {
    let mut rest = spec;
    let mut days = None;
    let mut hours = None;
    let mut minutes = None;
    let mut seconds = None;

    if let Some((n, r)) = take_component(rest, 'd') {
        days = Some(n);
        rest = r;
    }
    if let Some((n, r)) = take_component(rest, 'h') {
        hours = Some(n);
        rest = r;
    }
    if let Some((n, r)) = take_component(rest, 'm') {
        minutes = Some(n);
        rest = r;
    }
    if let Some((n, r)) = take_component(rest, 's') {
        seconds = Some(n);
        rest = r;
    }

    let any_present = days.is_some() || hours.is_some() || minutes.is_some() || seconds.is_some();
    if !rest.is_empty() || !any_present {
        return Err(IntervalError::Malformed(spec.to_string()));
    }

    if let Some(h) = hours {
        if days.is_some() && h >= 24 {
            return Err(IntervalError::ComponentOverflow {
                component: "hours",
                limit: 23,
                larger_unit: "days",
            });
        }
    }
    if let Some(m) = minutes {
        if days.is_some() && m >= 24 * 60 {
            return Err(IntervalError::ComponentOverflow {
                component: "minutes",
                limit: 24 * 60 - 1,
                larger_unit: "days",
            });
        }
        if hours.is_some() && m >= 60 {
            return Err(IntervalError::ComponentOverflow {
                component: "minutes",
                limit: 59,
                larger_unit: "hours",
            });
        }
    }
    if let Some(s) = seconds {
        if days.is_some() && s >= 24 * 3600 {
            return Err(IntervalError::ComponentOverflow {
                component: "seconds",
                limit: 24 * 3600 - 1,
                larger_unit: "days",
            });
        }
        if hours.is_some() && s >= 3600 {
            return Err(IntervalError::ComponentOverflow {
                component: "seconds",
                limit: 3599,
                larger_unit: "hours",
            });
        }
        if minutes.is_some() && s >= 60 {
            return Err(IntervalError::ComponentOverflow {
                component: "seconds",
                limit: 59,
                larger_unit: "minutes",
            });
        }
    }

    let total = days.unwrap_or(0) * 86_400
        + hours.unwrap_or(0) * 3_600
        + minutes.unwrap_or(0) * 60
        + seconds.unwrap_or(0);
    Ok(Duration::from_secs(total))
}

fn take_component(s: &str, unit: char) -> Option<(u64, &str)> {
    let digit_end = s.find(|c: char| !c.is_ascii_digit())?;
    if digit_end == 0 {
        return None;
    }
    if s[digit_end..].chars().next() != Some(unit) {
        return None;
    }
    let n: u64 = s[..digit_end].parse().ok()?;
    Some((n, &s[digit_end + unit.len_utf8()..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_components() {
        assert_eq!(
            parse_interval("1d2h3m4s").unwrap(),
            Duration::from_secs(86_400 + 2 * 3_600 + 3 * 60 + 4)
        );
    }

    #[test]
    fn parses_seconds_only() {
        assert_eq!(parse_interval("90s").unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn rejects_hours_overflow_when_days_present() {
        let err = parse_interval("1d25h").unwrap_err();
        assert!(matches!(err, IntervalError::ComponentOverflow { component: "hours", .. }));
    }

    #[test]
    fn rejects_seconds_overflow_when_minutes_present() {
        let err = parse_interval("1m90s").unwrap_err();
        assert!(matches!(err, IntervalError::ComponentOverflow { component: "seconds", .. }));
    }

    #[test]
    fn rejects_malformed_spec() {
        let err = parse_interval("2w").unwrap_err();
        assert!(matches!(err, IntervalError::Malformed(_)));
    }

    #[test]
    fn rejects_empty_spec() {
        let err = parse_interval("").unwrap_err();
        assert!(matches!(err, IntervalError::Malformed(_)));
    }

    #[test]
    fn rejects_out_of_order_components() {
        let err = parse_interval("4s1d").unwrap_err();
        assert!(matches!(err, IntervalError::Malformed(_)));
    }
}
