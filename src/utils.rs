//! Utility functions

/// Resolve an `ElementDataFile` against the location of its header: the
/// header's prefix up to and including the last `/` is prepended.
pub fn resolve_data_path(header_location: &str, element_data_file: &str) -> String {
    let dir_end = header_location.rfind('/').map_or(0, |i| i + 1);
    format!("{}{}", &header_location[..dir_end], element_data_file)
}

/// Format byte size in human-readable form
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}
