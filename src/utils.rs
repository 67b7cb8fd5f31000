use anyhow::{anyhow, bail, Context, Result};
use std::time::Duration;

/// Suffix to nanoseconds multiplier, matched in order so "ms" wins over "m"
const UNITS: &[(&str, f64)] = &[
    ("ns", 1.0),
    ("us", 1_000.0),
    ("\u{b5}s", 1_000.0),
    ("\u{3bc}s", 1_000.0),
    ("ms", 1_000_000.0),
    ("s", 1_000_000_000.0),
    ("m", 60_000_000_000.0),
    ("h", 3_600_000_000_000.0),
];

/// Parse duration strings like "30s", "500ms", "1.5m" or "1h15m30s".
/// A bare "0" is the only unitless value accepted.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.starts_with('-') {
        bail!("duration must be non-negative: {}", s);
    }
    let mut rest = s.strip_prefix('+').unwrap_or(s);
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        bail!("empty duration (expected a value such as 500ms or 1m30s)");
    }

    let mut nanos = 0.0;
    while !rest.is_empty() {
        let split = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(split);
        if number.is_empty() {
            bail!("invalid number in duration '{}'", s);
        }
        let value: f64 = number
            .parse()
            .with_context(|| format!("invalid number in duration '{}'", s))?;

        let (unit, multiplier) = UNITS
            .iter()
            .find(|(unit, _)| tail.starts_with(unit))
            .ok_or_else(|| anyhow!("missing or unknown unit in duration '{}'", s))?;
        nanos += value * multiplier;
        rest = &tail[unit.len()..];
    }

    if !nanos.is_finite() {
        bail!("duration out of range: {}", s);
    }
    // saturates at u64::MAX nanoseconds
    Ok(Duration::from_nanos(nanos as u64))
}

/// Switches the Windows console to UTF-8 with VT escape processing so the
/// report glyphs and log colours render. Returns whether ANSI output is usable.
#[cfg(windows)]
pub fn setup_console() -> bool {
    use windows_sys::Win32::System::Console::{
        GetConsoleMode, GetStdHandle, SetConsoleMode, SetConsoleOutputCP,
        ENABLE_VIRTUAL_TERMINAL_PROCESSING, STD_ERROR_HANDLE, STD_OUTPUT_HANDLE,
    };
    const CP_UTF8: u32 = 65001;

    let mut ansi = true;
    unsafe {
        SetConsoleOutputCP(CP_UTF8);
        for std_handle in [STD_OUTPUT_HANDLE, STD_ERROR_HANDLE] {
            let handle = GetStdHandle(std_handle);
            let mut mode = 0;
            if GetConsoleMode(handle, &mut mode) == 0
                || SetConsoleMode(handle, mode | ENABLE_VIRTUAL_TERMINAL_PROCESSING) == 0
            {
                ansi = false;
            }
        }
    }
    ansi
}

#[cfg(not(windows))]
pub fn setup_console() -> bool {
    true
}
