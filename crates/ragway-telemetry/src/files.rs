//! File naming for spooled and archived chat logs.
//!
//! Concurrent writers coordinate by unique filename (timestamp + user +
//! random suffix), never by locking the directory.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use rand::Rng;

/// Characters never allowed in a path component.
const BANNED: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];
const MAX_FILENAME_BYTES: usize = 255;

/// Strip path-hostile characters and all control bytes, cap at 255 bytes
/// (on a char boundary), and substitute "unknown" for an empty result.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len().min(MAX_FILENAME_BYTES));
    for c in name.chars() {
        if BANNED.contains(&c) || (c as u32) < 0x20 {
            continue;
        }
        if out.len() + c.len_utf8() > MAX_FILENAME_BYTES {
            break;
        }
        out.push(c);
    }
    if out.is_empty() {
        "unknown".to_string()
    } else {
        out
    }
}

fn random_suffix() -> u32 {
    rand::rng().random_range(0..1_000_000)
}

/// `yyyymmdd-HHMMSS-<user>-<6-digit-random>.log`
pub fn temp_file_name(user: &str, now: DateTime<Local>) -> String {
    format!(
        "{}-{}-{:06}.log",
        now.format("%Y%m%d-%H%M%S"),
        sanitize_filename(user),
        random_suffix()
    )
}

/// `<root>/<yyyy-mm>/<dd>/<user>/<yyyymmdd-HHMMSS>_<requestID|null>_<6-digit-random>.log`
pub fn permanent_file_path(
    root: &Path,
    user: &str,
    request_id: &str,
    now: DateTime<Local>,
) -> PathBuf {
    let request_part = if request_id.is_empty() {
        "null".to_string()
    } else {
        sanitize_filename(request_id)
    };
    root.join(now.format("%Y-%m").to_string())
        .join(now.format("%d").to_string())
        .join(sanitize_filename(user))
        .join(format!(
            "{}_{}_{:06}.log",
            now.format("%Y%m%d-%H%M%S"),
            request_part,
            random_suffix()
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn sanitize_strips_separators_and_controls() {
        assert_eq!(sanitize_filename("a/b\\c:d*e?f\"g<h>i|j"), "abcdefghij");
        assert_eq!(sanitize_filename("tab\there\nnewline"), "tabherenewline");
        assert_eq!(sanitize_filename("nul\0byte"), "nulbyte");
    }

    #[test]
    fn sanitize_empty_becomes_unknown() {
        assert_eq!(sanitize_filename(""), "unknown");
        assert_eq!(sanitize_filename("///"), "unknown");
        assert_eq!(sanitize_filename("\n\r\t"), "unknown");
    }

    #[test]
    fn sanitize_caps_at_255_bytes() {
        let long = "x".repeat(300);
        assert_eq!(sanitize_filename(&long).len(), 255);
    }

    #[test]
    fn sanitize_truncates_on_char_boundary() {
        let long = "é".repeat(200); // 400 bytes
        let out = sanitize_filename(&long);
        assert!(out.len() <= 255);
        assert_eq!(out.len() % 2, 0); // whole 2-byte chars only
    }

    #[test]
    fn temp_name_shape() {
        let now = Local.with_ymd_and_hms(2026, 3, 7, 9, 5, 1).unwrap();
        let name = temp_file_name("alice", now);
        assert!(name.starts_with("20260307-090501-alice-"));
        assert!(name.ends_with(".log"));
        // fixed-width random suffix
        let suffix = name
            .trim_end_matches(".log")
            .rsplit('-')
            .next()
            .unwrap();
        assert_eq!(suffix.len(), 6);
    }

    #[test]
    fn permanent_path_shape_with_and_without_request_id() {
        let now = Local.with_ymd_and_hms(2026, 3, 7, 9, 5, 1).unwrap();
        let root = Path::new("/var/logs");

        let with_id = permanent_file_path(root, "alice", "req-9", now);
        let s = with_id.to_string_lossy();
        assert!(s.starts_with("/var/logs/2026-03/07/alice/20260307-090501_req-9_"));
        assert!(s.ends_with(".log"));

        let without_id = permanent_file_path(root, "alice", "", now);
        assert!(without_id
            .to_string_lossy()
            .contains("20260307-090501_null_"));
    }
}
