//! convenience fns for parsing env vars & human durations
#![warn(
    missing_debug_implementations,
    missing_docs,
    missing_copy_implementations,
    rust_2018_idioms,
    unreachable_pub,
    non_snake_case,
    non_upper_case_globals
)]
#![allow(clippy::cognitive_complexity)]
#![deny(rustdoc::broken_intra_doc_links)]
#![doc(test(
    no_crate_inject,
    attr(deny(warnings, rust_2018_idioms), allow(dead_code, unused_variables))
))]
use anyhow::{Context, bail};

use std::{env, str, time::Duration};

/// Reads the environment variable `name`, or `default` when it's unset, and
/// parses it as `T`. The error names the variable.
/// # Examples
/// ```
/// let val: u64 = env_parser::parse_var_with_err("HEARTH_DOCTEST_UNSET", 10).unwrap();
/// assert_eq!(val, 10);
/// ```
pub fn parse_var_with_err<T, S>(name: &str, default: S) -> anyhow::Result<T>
where
    T: str::FromStr,
    <T as str::FromStr>::Err: std::error::Error + Send + Sync + 'static,
    S: ToString,
{
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse::<T>()
        .with_context(|| format!("error parsing env var {name}"))
}

/// Parse a duration string with an optional unit.
/// Accepts: "10", "10s", "1500ms", "5m", "1h". No unit means seconds.
/// # Examples
/// ```
/// use std::time::Duration;
/// assert_eq!(env_parser::parse_duration("10").unwrap(), Duration::from_secs(10));
/// assert_eq!(env_parser::parse_duration("250ms").unwrap(), Duration::from_millis(250));
/// assert!(env_parser::parse_duration("ten").is_err());
/// ```
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        bail!("empty duration string");
    }

    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (num, unit) = s.split_at(end);
    let num = num
        .parse::<u64>()
        .with_context(|| format!("invalid number in duration {s:?}"))?;

    Ok(match unit.trim() {
        "ms" => Duration::from_millis(num),
        "" | "s" => Duration::from_secs(num),
        "m" => Duration::from_secs(checked_secs(num, 60, s)?),
        "h" => Duration::from_secs(checked_secs(num, 3600, s)?),
        other => bail!("unknown duration unit {other:?}, expected one of ms, s, m, h"),
    })
}

fn checked_secs(num: u64, per_unit: u64, s: &str) -> anyhow::Result<u64> {
    match num.checked_mul(per_unit) {
        Some(secs) => Ok(secs),
        None => bail!("duration {s:?} is too large"),
    }
}
