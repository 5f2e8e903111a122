use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use nom::{
    character::complete::{char, digit1, one_of},
    combinator::{all_consuming, map_res, opt, recognize},
    multi::many1,
    sequence::tuple,
    IResult,
};

use crate::error::ConfigError;

// --- BASIC PARSERS ---

fn parse_u64(input: &str) -> IResult<&str, u64> {
    map_res(digit1, |s: &str| s.parse::<u64>())(input)
}

fn parse_i64(input: &str) -> IResult<&str, i64> {
    map_res(recognize(tuple((opt(char('-')), digit1))), |s: &str| s.parse::<i64>())(input)
}

fn parse_component(input: &str) -> IResult<&str, (u64, char)> {
    tuple((parse_u64, one_of("dhms")))(input)
}

fn unit_secs(unit: char) -> u64 {
    match unit {
        'd' => 86_400,
        'h' => 3_600,
        'm' => 60,
        _ => 1,
    }
}

fn syntax_error(input: &str, e: nom::Err<nom::error::Error<&str>>) -> ConfigError {
    match e {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let context = if e.input.chars().count() > 20 {
                format!("{}...", e.input.chars().take(20).collect::<String>())
            } else {
                e.input.to_string()
            };
            ConfigError::Parse(format!("invalid syntax in '{}' near '{}'", input, context))
        }
        nom::Err::Incomplete(_) => ConfigError::Parse(format!("incomplete input '{}'", input)),
    }
}

/// Parse a duration such as `3600`, `90s`, `15m`, `1h30m` or `1d`.
/// A bare number is seconds.
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let input = input.trim();

    if let Ok((_, secs)) = all_consuming(parse_u64)(input) {
        return Ok(Duration::from_secs(secs));
    }

    let (_, parts) = all_consuming(many1(parse_component))(input)
        .map_err(|e| syntax_error(input, e))?;

    let mut total: u64 = 0;
    for (n, unit) in parts {
        total = n
            .checked_mul(unit_secs(unit))
            .and_then(|s| total.checked_add(s))
            .ok_or_else(|| ConfigError::Parse(format!("duration '{}' overflows", input)))?;
    }
    Ok(Duration::from_secs(total))
}

/// Parse a timestamp given as RFC 3339 or as (possibly negative) unix seconds.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, ConfigError> {
    let input = input.trim();

    if let Ok((_, secs)) = all_consuming(parse_i64)(input) {
        return Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| ConfigError::Parse(format!("timestamp {} out of range", secs)));
    }

    DateTime::parse_from_rfc3339(input)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            ConfigError::Parse(format!("'{}' is not RFC 3339 or unix seconds: {}", input, e))
        })
}
