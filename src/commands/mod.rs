//! CLI command implementations

mod flash;
mod partitions;

pub use flash::run_flash;
pub use partitions::run_partitions;

/// Format a byte count for display
fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 && bytes % (1024 * 1024) == 0 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 && bytes % 1024 == 0 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0x1000000), "16 MiB");
        assert_eq!(format_size(0xE0000), "896 KiB");
        assert_eq!(format_size(4097), "4097 B");
    }
}
