//! # Common Utilities

use std::time::Duration;

/// Header line of every CSV the benchmark writes
pub const CSV_HEADER: &str = "id,value\n";

/// Row `n` of the small-file CSV format: `<n>,value_<n>\n`
pub fn csv_row(n: u64) -> String {
    format!("{},value_{}\n", n, n)
}

/// Format bytes in human readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let exp = (63 - bytes.leading_zeros() as usize) / 10;
    let unit_index = exp.min(UNITS.len() - 1);
    let size = bytes as f64 / (1024_f64).powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} B", bytes)
    } else if size >= 100.0 {
        format!("{:.0} {}", size, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Seconds with millisecond precision, as printed in reports
pub fn format_secs(duration: Duration) -> String {
    format!("{:.3}s", duration.as_secs_f64())
}

/// Number of chunks needed to cover `total` bytes
pub fn chunk_count(total: u64, chunk_size: usize) -> u64 {
    if chunk_size == 0 {
        return 0;
    }
    total.div_ceil(chunk_size as u64)
}
