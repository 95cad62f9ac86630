use chrono::{DateTime, Duration, Utc};

/// Coarse human reading of an elapsed duration. Negative ages read as "just now".
pub fn describe_age(age: Duration) -> String {
    let secs = age.num_seconds().max(0);

    match secs {
        0..=59 => String::from("just now"),
        60..=3599 => format!("{} minutes ago", secs / 60),
        3600..=86399 => format!("{} hours ago", secs / 3600),
        _ => format!("{} days ago", secs / 86400),
    }
}

/// Age of a cache refresh relative to `now`, or "never" if it was never loaded
pub fn format_age_at(refreshed_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match refreshed_at {
        Some(at) => describe_age(now.signed_duration_since(at)),
        None => String::from("never"),
    }
}

pub fn format_age(refreshed_at: Option<DateTime<Utc>>) -> String {
    format_age_at(refreshed_at, Utc::now())
}
