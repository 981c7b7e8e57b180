use std::io::Write;

use chrono::Local;
use colored::Colorize;
use env_logger::{Builder, Env};
use error_iter::ErrorIter as _;
use log::{error, Level};

/// Installs the process-wide logger. `RUST_LOG` overrides the `info` default.
///
/// Calling it more than once is harmless, which lets tests and the bootstrap
/// loop share it.
pub fn init() {
    let _ = Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let level = match record.level() {
                Level::Error => "ERROR".red().bold(),
                Level::Warn => "WARN ".yellow().bold(),
                Level::Info => "INFO ".green(),
                Level::Debug => "DEBUG".blue(),
                Level::Trace => "TRACE".dimmed(),
            };
            writeln!(
                buf,
                "{} {} {} {}",
                Local::now().format("%H:%M:%S%.3f").to_string().dimmed(),
                level,
                record.target().dimmed(),
                record.args()
            )
        })
        .try_init();
}

/// Logs `err` and every error in its `source()` chain.
pub fn log_error<E: std::error::Error + 'static>(context: &str, err: &E) {
    error!("{context}: {err}");
    for source in err.sources().skip(1) {
        error!("  Caused by: {source}");
    }
}

/// Formats a byte count as B, KB or MB with one decimal, switching units above 4 KiB.
pub fn format_byte_size(bytes: usize) -> String {
    if bytes <= 4096 {
        return format!("{bytes}B");
    }
    let kilobytes = bytes as f64 / 1024.0;
    if kilobytes > 1024.0 {
        format!("{:.1}MB", kilobytes / 1024.0)
    } else {
        format!("{kilobytes:.1}KB")
    }
}

#[cfg(test)]
mod tests {
    use super::format_byte_size;

    #[test]
    fn small_sizes_stay_in_bytes() {
        assert_eq!(format_byte_size(0), "0B");
        assert_eq!(format_byte_size(4096), "4096B");
    }

    #[test]
    fn larger_sizes_switch_units() {
        assert_eq!(format_byte_size(8192), "8.0KB");
        assert_eq!(format_byte_size(3 * 1024 * 1024 / 2), "1.5MB");
    }
}
