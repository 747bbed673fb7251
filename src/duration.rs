// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Duration parsing for Go-style duration strings.
//!
//! TTL annotations written for Go controllers use `time.ParseDuration` syntax
//! (e.g. "90s", "1m", "1h30m", "1.5h"). This module parses that syntax into a
//! signed number of whole seconds. Bounds are left to the caller.

use anyhow::{bail, Context, Result};

const NANOS_PER_NANOSECOND: u128 = 1;
const NANOS_PER_MICROSECOND: u128 = 1_000;
const NANOS_PER_MILLISECOND: u128 = 1_000_000;
const NANOS_PER_SECOND: u128 = 1_000_000_000;
const NANOS_PER_MINUTE: u128 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: u128 = 60 * NANOS_PER_MINUTE;

/// Longest fractional part honoured; further digits are ignored.
const MAX_FRACTION_DIGITS: usize = 18;

/// Parse a Go-style duration string into whole seconds.
///
/// Supported units: `ns`, `us` (`µs`, `μs`), `ms`, `s`, `m`, `h`. Segments may
/// be chained (`1h30m`) and carry a decimal fraction (`1.5h`). A leading `+`
/// or `-` applies to the whole value. The bare string `"0"` is accepted
/// without a unit. Sub-second remainders are truncated toward zero.
///
/// # Examples
///
/// ```
/// use svcdns::duration::parse_go_duration;
///
/// assert_eq!(parse_go_duration("1m").unwrap(), 60);
/// assert_eq!(parse_go_duration("1h30m").unwrap(), 5400);
/// assert_eq!(parse_go_duration("-10s").unwrap(), -10);
/// assert!(parse_go_duration("10").is_err()); // Missing unit
/// ```
///
/// # Errors
///
/// Returns an error if the string is empty, a segment lacks a number or a
/// unit, a unit is unknown, or the value overflows.
pub fn parse_go_duration(duration_str: &str) -> Result<i64> {
    if duration_str.is_empty() {
        bail!("Duration string cannot be empty");
    }

    let (negative, mut rest) = match duration_str.as_bytes()[0] {
        b'-' => (true, &duration_str[1..]),
        b'+' => (false, &duration_str[1..]),
        _ => (false, duration_str),
    };

    if rest == "0" {
        return Ok(0);
    }
    if rest.is_empty() {
        bail!("Duration '{duration_str}' has a sign but no value");
    }

    let mut total_nanos: u128 = 0;
    while !rest.is_empty() {
        let int_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let (int_part, after_int) = rest.split_at(int_end);

        let (frac_part, after_number) = match after_int.strip_prefix('.') {
            Some(after_dot) => {
                let frac_end = after_dot
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(after_dot.len());
                after_dot.split_at(frac_end)
            }
            None => ("", after_int),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            bail!("Duration '{duration_str}' is missing a number");
        }

        let unit_end = after_number
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after_number.len());
        let (unit, remaining) = after_number.split_at(unit_end);

        let unit_nanos = match unit {
            "ns" => NANOS_PER_NANOSECOND,
            "us" | "µs" | "μs" => NANOS_PER_MICROSECOND,
            "ms" => NANOS_PER_MILLISECOND,
            "s" => NANOS_PER_SECOND,
            "m" => NANOS_PER_MINUTE,
            "h" => NANOS_PER_HOUR,
            "" => bail!("Duration '{duration_str}' is missing a unit"),
            other => bail!(
                "Unsupported duration unit '{other}'. Use 'ns', 'us', 'ms', 's', 'm', or 'h'"
            ),
        };

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .context("Duration value too large (overflow)")?
        };
        let mut segment = whole
            .checked_mul(unit_nanos)
            .context("Duration value too large (overflow)")?;

        if !frac_part.is_empty() {
            let digits = &frac_part[..frac_part.len().min(MAX_FRACTION_DIGITS)];
            let fraction: u128 = digits
                .parse()
                .context("Duration fraction is not a number")?;
            let scale = 10u128.pow(u32::try_from(digits.len()).unwrap_or(0));
            segment = segment
                .checked_add(fraction * unit_nanos / scale)
                .context("Duration value too large (overflow)")?;
        }

        total_nanos = total_nanos
            .checked_add(segment)
            .context("Duration value too large (overflow)")?;
        rest = remaining;
    }

    let seconds = i64::try_from(total_nanos / NANOS_PER_SECOND)
        .context("Duration value too large (overflow)")?;

    Ok(if negative { -seconds } else { seconds })
}

#[cfg(test)]
#[path = "duration_tests.rs"]
mod duration_tests;
