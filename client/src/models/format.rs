//! Display helpers shared by the view-models. Timestamps are rendered in
//! UTC so labels do not depend on the machine they are computed on.

use jiff::{SignedDuration, Timestamp};

pub fn date_label(timestamp: Timestamp) -> String {
    timestamp.strftime("%b %d, %Y").to_string()
}

pub fn time_label(timestamp: Timestamp) -> String {
    timestamp.strftime("%H:%M").to_string()
}

pub fn date_time_label(timestamp: Timestamp) -> String {
    timestamp.strftime("%b %d, %Y %H:%M").to_string()
}

/// Coarse human duration: `"2h 15m"`, `"45m"` or `"30s"`.
pub fn duration_label(duration: SignedDuration) -> String {
    let total_seconds = duration.as_secs().max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m")
    } else {
        format!("{seconds}s")
    }
}

pub fn score_label(score: f64) -> String {
    format!("{score:.2}")
}

pub fn file_size_label(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.1} {}", UNITS[unit])
}

/// Thousands separated count, e.g. `"12,345"`.
pub fn count_label(count: u64) -> String {
    let digits = count.to_string();
    let mut label = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            label.push(',');
        }
        label.push(c);
    }
    label
}
