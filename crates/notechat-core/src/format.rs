//! Human-readable sizes and backup file naming.

use chrono::{DateTime, Utc};

const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Format a byte count as a 1024-based size rounded to two decimals.
///
/// ```
/// use notechat_core::format::format_size;
///
/// assert_eq!(format_size(0), "0 Bytes");
/// assert_eq!(format_size(1536), "1.5 KB");
/// ```
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

/// File name for an archive produced at `at`: `notechat_backup_YYYY-MM-DD.zip`.
pub fn backup_file_name(at: DateTime<Utc>) -> String {
    format!("notechat_backup_{}.zip", at.format("%Y-%m-%d"))
}
