use chrono::{DateTime, Datelike, Timelike, Utc};

const DIAS: [&str; 7] = [
    "Domingo",
    "Lunes",
    "Martes",
    "Miércoles",
    "Jueves",
    "Viernes",
    "Sábado",
];

/// Full timestamp as shown in announcements: "Sábado 17/05/2025 23:45:12".
pub fn format_date(dt: &DateTime<Utc>) -> String {
    format!(
        "{} {:02}/{:02}/{} {:02}:{:02}:{:02}",
        DIAS[dt.weekday().num_days_from_sunday() as usize],
        dt.day(),
        dt.month(),
        dt.year(),
        dt.hour(),
        dt.minute(),
        dt.second()
    )
}

/// Weekday plus calendar date, used for the "Fecha" spreadsheet column.
pub fn format_day(dt: &DateTime<Utc>) -> String {
    format!(
        "{} {:02}/{:02}/{}",
        DIAS[dt.weekday().num_days_from_sunday() as usize],
        dt.day(),
        dt.month(),
        dt.year()
    )
}

/// "HH:MM", used for the start/end spreadsheet columns.
pub fn format_hour_minute(dt: &DateTime<Utc>) -> String {
    format!("{:02}:{:02}", dt.hour(), dt.minute())
}

/// Duration in milliseconds as "Xh Ym Zs", unpadded.
pub fn format_duration_ms(ms: i64) -> String {
    let h = ms / 3_600_000;
    let m = (ms % 3_600_000) / 60_000;
    let s = (ms % 60_000) / 1_000;
    format!("{h}h {m}m {s}s")
}
