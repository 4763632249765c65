//! Free-space queries and byte-size parsing/formatting.
//! Free space is what statvfs reports available to unprivileged users
//! (`f_bavail * f_frsize`), matching what the pool itself uses for placement.

use anyhow::{Result, anyhow, bail};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

pub fn format_bytes(n: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    const TB: f64 = GB * 1024.0;
    let f = n as f64;
    if f >= TB {
        format!("{:.1} TiB", f / TB)
    } else if f >= GB {
        format!("{:.1} GiB", f / GB)
    } else if f >= MB {
        format!("{:.1} MiB", f / MB)
    } else if f >= KB {
        format!("{:.1} KiB", f / KB)
    } else {
        format!("{} B", n)
    }
}

/// Parse a human byte count: a number (fractions allowed) with an optional
/// B/KB/MB/GB/TB suffix, case-insensitive, whitespace tolerated ("400GB",
/// "1.5 TB", "1024").
pub fn parse_size(input: &str) -> Result<u64> {
    let upper = input.trim().to_ascii_uppercase();
    if upper.is_empty() {
        bail!("empty size");
    }
    let split = upper
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(upper.len());
    let (number, unit) = upper.split_at(split);
    let multiplier: u64 = match unit.trim() {
        "" | "B" => 1,
        "KB" => 1 << 10,
        "MB" => 1 << 20,
        "GB" => 1 << 30,
        "TB" => 1 << 40,
        other => bail!("unknown size suffix '{}' in '{}'", other, input),
    };
    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid size number '{}' in '{}'", number.trim(), input))?;
    if value < 0.0 {
        bail!("size must not be negative: '{}'", input);
    }
    Ok((value * multiplier as f64) as u64)
}

/// Bytes available to unprivileged users on the filesystem holding `path`.
pub fn free_space_bytes(path: &Path) -> io::Result<u64> {
    let mut s: libc::statvfs = unsafe { std::mem::zeroed() };
    let cpath = std::ffi::CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL"))?;
    let rc = unsafe { libc::statvfs(cpath.as_ptr(), &mut s) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok((s.f_bavail as u64).saturating_mul(s.f_frsize as u64))
}
