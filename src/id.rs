//! ID and naming utilities for qaloop
//!
//! Provides run identifiers and the on-disk naming convention for iteration
//! directories and final reports.

use chrono::{DateTime, Local};

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> i64 {
    Local::now().timestamp_millis()
}

/// Generate a run ID
///
/// Format: `run-{timestamp_ms}-{pid_hex}`
/// Example: `run-1738300800123-1f2a`
pub fn generate_run_id() -> String {
    let suffix = std::process::id() & 0xffff;
    format!("run-{}-{:04x}", now_ms(), suffix)
}

/// Directory name for one iteration's artifacts
///
/// Format: `loop-{seq:03}_{YYYYmmdd_HHMMSS}`
/// Example: `loop-002_20261018_143005`
pub fn iteration_dir_name(sequence: u32, at: &DateTime<Local>) -> String {
    format!("loop-{:03}_{}", sequence, at.format("%Y%m%d_%H%M%S"))
}

/// File name for a run's final report
///
/// Format: `final_report_{YYYYmmdd_HHMMSS}_{run_id}.json`
/// Example: `final_report_20261018_143005_run-1738300800123-1f2a.json`
pub fn report_file_name(at: &DateTime<Local>, run_id: &str) -> String {
    format!("final_report_{}_{}.json", at.format("%Y%m%d_%H%M%S"), run_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 18, 14, 30, 5).unwrap()
    }

    #[test]
    fn test_now_ms_returns_reasonable_timestamp() {
        let ts = now_ms();
        assert!(ts > 1577836800000); // 2020-01-01
        assert!(ts < 4102444800000); // 2100-01-01
    }

    #[test]
    fn test_generate_run_id_format() {
        let id = generate_run_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "run");
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 4);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_iteration_dir_name_padding() {
        assert_eq!(iteration_dir_name(2, &fixed_time()), "loop-002_20261018_143005");
        assert_eq!(iteration_dir_name(117, &fixed_time()), "loop-117_20261018_143005");
    }

    #[test]
    fn test_report_file_name_carries_time_and_run() {
        assert_eq!(
            report_file_name(&fixed_time(), "run-1-00aa"),
            "final_report_20261018_143005_run-1-00aa.json"
        );
        assert_ne!(
            report_file_name(&fixed_time(), "run-1-00aa"),
            report_file_name(&fixed_time(), "run-2-00aa")
        );
    }
}
