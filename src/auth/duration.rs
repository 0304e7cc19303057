use chrono::Duration;

const DEFAULT_TTL_MINUTES: i64 = 15;

/// Lifetime used whenever a TTL string cannot be parsed.
pub fn default_ttl() -> Duration {
    Duration::minutes(DEFAULT_TTL_MINUTES)
}

/// Parses `<integer><unit>` where unit is one of `s`, `m`, `h`, `d` (case-insensitive).
///
/// Malformed input never errors: it falls back to [`default_ttl`]. Callers that need
/// to reject bad configuration must check the string themselves.
pub fn parse_duration(value: &str) -> Duration {
    try_parse(&value.to_ascii_lowercase()).unwrap_or_else(default_ttl)
}

fn try_parse(value: &str) -> Option<Duration> {
    let unit = value.chars().last()?;
    let digits = &value[..value.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let amount: i64 = digits.parse().ok()?;
    match unit {
        's' => Duration::try_seconds(amount),
        'm' => Duration::try_minutes(amount),
        'h' => Duration::try_hours(amount),
        'd' => Duration::try_days(amount),
        _ => None,
    }
}
