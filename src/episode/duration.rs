/// Parse an itunes-style duration string into whole seconds.
///
/// Accepts "HH:MM:SS", "MM:SS" and bare seconds ("90"). Returns None for
/// anything else; feeds publish enough garbage that callers treat a missing
/// duration as "unknown" rather than an error.
pub fn parse_duration(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() > 3 {
        return None;
    }

    let mut total: u64 = 0;
    for part in parts {
        let n: u64 = part.trim().parse().ok()?;
        total = total.checked_mul(60)?.checked_add(n)?;
    }

    Some(total)
}

/// Format a position in seconds for display: "M:SS", or "H:MM:SS" from one
/// hour upwards
pub fn format_position(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let rem = secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, rem)
    } else {
        format!("{}:{:02}", mins, rem)
    }
}
