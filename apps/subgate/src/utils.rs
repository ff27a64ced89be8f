/// Human-readable byte count. Negative values keep their sign (remaining
/// quota can go below zero).
pub fn format_bytes_str(bytes: i64) -> String {
    let sign = if bytes < 0 { "-" } else { "" };
    let bytes = bytes.unsigned_abs();

    if bytes < 1024 {
        format!("{}{} B", sign, bytes)
    } else if bytes < 1024 * 1024 {
        format!("{}{:.1} KB", sign, bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{}{:.1} MB", sign, bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{}{:.2} GB", sign, bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_each_magnitude() {
        assert_eq!(format_bytes_str(512), "512 B");
        assert_eq!(format_bytes_str(2048), "2.0 KB");
        assert_eq!(format_bytes_str(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_bytes_str(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn negative_keeps_sign() {
        assert_eq!(format_bytes_str(-2048), "-2.0 KB");
    }
}
