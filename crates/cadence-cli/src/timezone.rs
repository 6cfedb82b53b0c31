use cadence_core::error::CoreError;
use cadence_core::timezone::validate_timezone;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Short names people type instead of IANA identifiers.
const ALIASES: &[(&[&str], &str)] = &[
    (&["est", "eastern"], "America/New_York"),
    (&["cst", "central"], "America/Chicago"),
    (&["mst", "mountain"], "America/Denver"),
    (&["pst", "pacific"], "America/Los_Angeles"),
    (&["gmt", "utc", "z"], "UTC"),
    (&["bst", "london"], "Europe/London"),
    (&["cet", "paris"], "Europe/Paris"),
    (&["jst", "tokyo"], "Asia/Tokyo"),
    (&["ist", "india"], "Asia/Kolkata"),
];

/// Zones offered as suggestions for unrecognised input.
const KNOWN_ZONES: &[&str] = &[
    "America/New_York",
    "America/Chicago",
    "America/Denver",
    "America/Los_Angeles",
    "America/Sao_Paulo",
    "Europe/London",
    "Europe/Paris",
    "Europe/Berlin",
    "Europe/Madrid",
    "Asia/Tokyo",
    "Asia/Shanghai",
    "Asia/Kolkata",
    "Asia/Dubai",
    "Australia/Sydney",
    "Pacific/Auckland",
];

/// Zone of the host: `$TZ` when it names a valid zone, then the OS setting, then UTC.
pub fn detect_system_timezone() -> String {
    std::env::var("TZ")
        .ok()
        .filter(|tz| validate_timezone(tz).is_ok())
        .or_else(|| {
            iana_time_zone::get_timezone()
                .ok()
                .filter(|tz| validate_timezone(tz).is_ok())
        })
        .unwrap_or_else(|| "UTC".to_string())
}

/// Known zones whose city part contains `input`, at most five.
pub fn suggest_timezone(input: &str) -> Vec<&'static str> {
    let needle = input.trim().to_lowercase().replace(' ', "_");
    if needle.is_empty() {
        return Vec::new();
    }
    KNOWN_ZONES
        .iter()
        .copied()
        .filter(|zone| {
            zone.rsplit('/')
                .next()
                .is_some_and(|city| city.to_lowercase().contains(&needle))
        })
        .take(5)
        .collect()
}

/// Accepts an IANA name or a common alias and returns the IANA name.
pub fn normalize_timezone_input(input: &str) -> Result<String, CoreError> {
    let input = input.trim();
    // Aliases win over chrono-tz's legacy abbreviations such as `EST`
    let lower = input.to_lowercase();
    if let Some((_, zone)) = ALIASES.iter().find(|(names, _)| names.contains(&lower.as_str())) {
        return Ok(zone.to_string());
    }
    if validate_timezone(input).is_ok() {
        return Ok(input.to_string());
    }

    let suggestions = suggest_timezone(input);
    Err(CoreError::InvalidTimezone(if suggestions.is_empty() {
        format!("'{}', expected an IANA name such as 'Europe/Berlin'", input)
    } else {
        format!("'{}', did you mean {}?", input, suggestions.join(" or "))
    }))
}

/// Local wall-clock rendering with the zone abbreviation, e.g. `2025-03-03 09:00 EST`.
pub fn format_local(datetime: DateTime<Utc>, tz: &Tz) -> String {
    datetime.with_timezone(tz).format("%Y-%m-%d %H:%M %Z").to_string()
}
