//! Pure mapping functions from transport payloads to the canonical [`model`](crate::model).
//!
//! The socket transport yields structured JSON ([`socket`]), the CLI transport yields
//! delimiter-separated text lines ([`cli`]). Both end up as the same snapshot types, using the
//! shared helpers in this module for status, uptime, size and port handling.
//!
//! Nothing in here performs I/O.
pub mod cli;
mod error;
pub mod socket;

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;

pub use error::{ParseError, Result};

use crate::model::ContainerStatus;

/// Maps a raw runtime state onto a [`ContainerStatus`].
///
/// Unknown states, including `created`, map to [`ContainerStatus::Stopped`].
pub fn map_status(state: &str) -> ContainerStatus {
    match state.trim().to_lowercase().as_str() {
        "running" => ContainerStatus::Running,
        "exited" => ContainerStatus::Exited,
        "paused" => ContainerStatus::Paused,
        "restarting" => ContainerStatus::Restarting,
        "dead" => ContainerStatus::Dead,
        _ => ContainerStatus::Stopped,
    }
}

/// Extracts the uptime from a raw status text such as `Up 2 hours (healthy)`.
///
/// Returns `"-"` when the text does not start with `up`.
pub fn parse_uptime(status_text: &str) -> String {
    let text = status_text.trim_start();
    match text.get(..2) {
        Some(prefix) if prefix.eq_ignore_ascii_case("up") => text[2..].trim().to_owned(),
        _ => "-".to_owned(),
    }
}

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Formats a byte count as a human readable string, e.g. `1.5KB` or `128MB`.
///
/// The unit is chosen so that the scaled value lies in `[1, 1024)`; values below 10 keep one
/// decimal place.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0B".to_owned();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    // 1023.6KB would print as 1024KB
    if value.round() >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if value < 10.0 {
        format!("{:.1}{}", value, SIZE_UNITS[unit])
    } else {
        format!("{:.0}{}", value, SIZE_UNITS[unit])
    }
}

static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([0-9]+(?:\.[0-9]+)?)\s*([A-Za-z]*)").expect("size regex is valid")
});

/// Parses a human readable size as printed by the runtime CLI, e.g. `128MiB` or `1.2GB`.
///
/// Decimal and binary unit spellings are both treated as binary multiples. A missing or
/// unknown unit counts as bytes.
///
/// # Errors
///
/// Returns [`ParseError::InvalidSize`] if the input does not start with a number.
pub fn parse_size(src: &str) -> Result<u64> {
    let captures = SIZE_RE
        .captures(src)
        .ok_or_else(|| ParseError::InvalidSize(src.to_owned()))?;
    let value: f64 = captures[1]
        .parse()
        .map_err(|_| ParseError::InvalidSize(src.to_owned()))?;
    let multiplier: u64 = match captures[2].to_lowercase().as_str() {
        "k" | "kb" | "kib" => 1 << 10,
        "m" | "mb" | "mib" => 1 << 20,
        "g" | "gb" | "gib" => 1 << 30,
        "t" | "tb" | "tib" => 1 << 40,
        _ => 1,
    };

    Ok((value * multiplier as f64).round() as u64)
}

/// Parses a percentage string such as `2.5%`. The CLI prints `--` for stopped containers,
/// which counts as zero.
pub fn parse_percent(src: &str) -> Result<f64> {
    let src = src.trim();
    if src.is_empty() || src == "--" {
        return Ok(0.0);
    }
    src.trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .map_err(|_| ParseError::InvalidPercent(src.to_owned()))
}

/// Parses a `used / limit` memory string as printed by the CLI.
pub fn parse_memory_usage(src: &str) -> Result<(u64, u64)> {
    let src = src.trim();
    if src.is_empty() || src == "--" || src == "-- / --" {
        return Ok((0, 0));
    }
    let (usage, limit) = src
        .split_once('/')
        .ok_or_else(|| ParseError::InvalidMemoryUsage(src.to_owned()))?;
    Ok((parse_size(usage)?, parse_size(limit)?))
}

/// Formats a port mapping as `ip:hostPort->containerPort/proto`, or `containerPort/proto` when
/// nothing is published on the host.
pub fn format_port(
    ip: Option<&str>,
    host_port: Option<u16>,
    container_port: u16,
    proto: &str,
) -> String {
    let proto = if proto.is_empty() { "tcp" } else { proto };
    match host_port {
        Some(host_port) => {
            let ip = ip.filter(|ip| !ip.is_empty()).unwrap_or("0.0.0.0");
            format!("{ip}:{host_port}->{container_port}/{proto}")
        }
        None => format!("{container_port}/{proto}"),
    }
}

/// Parses a CLI timestamp like `2024-01-13 10:00:00 +0000 UTC`.
pub fn parse_cli_timestamp(src: &str) -> Option<DateTime<Utc>> {
    let src = src.trim();
    let zoned = src.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    if let Ok(ts) = DateTime::parse_from_str(zoned.trim(), "%Y-%m-%d %H:%M:%S %z") {
        return Some(ts.with_timezone(&Utc));
    }
    let head = src.get(..19)?;
    NaiveDateTime::parse_from_str(head, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Converts a UNIX timestamp in seconds as reported by the HTTP API.
pub fn from_unix_seconds(secs: i64) -> Option<DateTime<Utc>> {
    if secs <= 0 {
        return None;
    }
    DateTime::from_timestamp(secs, 0)
}

/// Splits a delimiter-separated line into exactly `n` fields.
///
/// Missing trailing fields become empty strings; the last field keeps any surplus delimiters.
pub(crate) fn split_fields(line: &str, delimiter: char, n: usize) -> Vec<&str> {
    let mut fields: Vec<&str> = line.splitn(n, delimiter).map(str::trim).collect();
    fields.resize(n, "");
    fields
}

/// Removes the stream framing bytes (`0x00..=0x08`) the HTTP API interleaves with log output.
pub fn strip_log_framing(raw: &[u8]) -> String {
    let cleaned: Vec<u8> = raw.iter().copied().filter(|b| *b > 0x08).collect();
    String::from_utf8_lossy(&cleaned).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_status() {
        assert_eq!(map_status("running"), ContainerStatus::Running);
        assert_eq!(map_status("RUNNING"), ContainerStatus::Running);
        assert_eq!(map_status("exited"), ContainerStatus::Exited);
        assert_eq!(map_status("paused"), ContainerStatus::Paused);
        assert_eq!(map_status("restarting"), ContainerStatus::Restarting);
        assert_eq!(map_status("dead"), ContainerStatus::Dead);
        assert_eq!(map_status("created"), ContainerStatus::Stopped);
        assert_eq!(map_status("removing"), ContainerStatus::Stopped);
        assert_eq!(map_status(""), ContainerStatus::Stopped);
    }

    #[test]
    fn test_parse_uptime() {
        assert_eq!(parse_uptime("Up 2 hours"), "2 hours");
        assert_eq!(parse_uptime("up 5 minutes (healthy)"), "5 minutes (healthy)");
        assert_eq!(parse_uptime("  UP   3 days  "), "3 days");
        assert_eq!(parse_uptime("Exited (0) 2 hours ago"), "-");
        assert_eq!(parse_uptime("Created"), "-");
        assert_eq!(parse_uptime(""), "-");
        assert_eq!(parse_uptime("u"), "-");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0B");
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(1536), "1.5KB");
        assert_eq!(format_size(128 * 1024 * 1024), "128MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.0GB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024 * 1024), "3.0TB");
        assert_eq!(format_size(1023), "1023B");
        assert_eq!(format_size(1_048_575), "1.0MB");
        assert_eq!(format_size(1024 * 1024 * 1024 - 1), "1.0GB");
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("128MiB").unwrap(), 128 * 1024 * 1024);
        assert_eq!(parse_size("1GiB").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_size("1.5kB").unwrap(), 1536);
        assert_eq!(parse_size("187MB").unwrap(), 187 * 1024 * 1024);
        assert_eq!(parse_size("42").unwrap(), 42);
        assert_eq!(parse_size("42 parsecs").unwrap(), 42);
        assert!(matches!(parse_size("n/a"), Err(ParseError::InvalidSize(_))));
    }

    #[test]
    fn test_size_round_trip_keeps_magnitude() {
        for bytes in [1u64, 9, 1000, 1023, 1024, 4096, 10_000_000, 123_456_789_012, 5 << 40] {
            let parsed = parse_size(&format_size(bytes)).unwrap() as f64;
            let ratio = parsed / bytes as f64;
            assert!(
                (0.9..1.1).contains(&ratio),
                "{bytes} -> {} -> {parsed}",
                format_size(bytes)
            );
        }
    }

    #[test]
    fn test_parse_percent() {
        assert_eq!(parse_percent("2.5%").unwrap(), 2.5);
        assert_eq!(parse_percent(" 100.00% ").unwrap(), 100.0);
        assert_eq!(parse_percent("--").unwrap(), 0.0);
        assert!(parse_percent("abc").is_err());
    }

    #[test]
    fn test_parse_memory_usage() {
        let (usage, limit) = parse_memory_usage("128MiB / 1GiB").unwrap();
        assert_eq!(usage, 128 * 1024 * 1024);
        assert_eq!(limit, 1024 * 1024 * 1024);
        assert_eq!(parse_memory_usage("-- / --").unwrap(), (0, 0));
        assert!(parse_memory_usage("128MiB").is_err());
    }

    #[test]
    fn test_format_port() {
        assert_eq!(
            format_port(Some("0.0.0.0"), Some(8080), 80, "tcp"),
            "0.0.0.0:8080->80/tcp"
        );
        assert_eq!(format_port(Some(""), Some(53), 53, "udp"), "0.0.0.0:53->53/udp");
        assert_eq!(format_port(None, None, 80, "tcp"), "80/tcp");
    }

    #[test]
    fn test_parse_cli_timestamp() {
        let ts = parse_cli_timestamp("2024-01-13 10:00:00 +0000 UTC").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-01-13T10:00:00+00:00");
        let ts = parse_cli_timestamp("2024-01-13 12:00:00 +0200 CEST").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-01-13T10:00:00+00:00");
        let ts = parse_cli_timestamp("2024-01-13 10:00:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-01-13T10:00:00+00:00");
        assert!(parse_cli_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_split_fields_pads_missing() {
        assert_eq!(split_fields("a|b", '|', 4), vec!["a", "b", "", ""]);
        assert_eq!(split_fields("a|b|c|d", '|', 3), vec!["a", "b", "c|d"]);
    }

    #[test]
    fn test_strip_log_framing() {
        let raw = b"\x01\x00\x00\x00\x00\x00\x00\x06hello\n\x02\x00\x00\x00\x00\x00\x00\x04oops";
        assert_eq!(strip_log_framing(raw), "hello\noops");
    }
}
