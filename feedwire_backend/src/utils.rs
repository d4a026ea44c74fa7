//! Small shared helpers.

use chrono::Local;

pub const APP_NAME: &str = "feedwire_backend";

/// Current local date as `YYYY-MM-DD`.
pub fn today_iso() -> String {
    Local::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Current local time of day as `HH:MM:SS`.
pub fn now_time_iso() -> String {
    Local::now().time().format("%H:%M:%S").to_string()
}

pub fn print_banner() {
    println!("{APP_NAME} v{}", env!("CARGO_PKG_VERSION"));
}
