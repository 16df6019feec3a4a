use std::time::Duration;

use rama::{
    error::{BoxError, ErrorContext as _},
    utils::str::smol_str::StrExt as _,
};

use crate::comparator::MIN_TICK_INTERVAL;

/// Parse a humantime duration such as "5s", "1m 30s" or "1m_30s".
pub fn parse_humantime_str(s: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(s.trim().replace_smolstr("_", " ").as_str())
}

/// Period between two comparator ticks.
///
/// Zero is rejected, anything shorter than [`MIN_TICK_INTERVAL`] is raised to it.
pub fn parse_tick_interval(s: &str) -> Result<Duration, BoxError> {
    let interval = parse_humantime_str(s).context("parse tick interval")?;
    if interval.is_zero() {
        return Err(BoxError::from("tick interval has to be greater than zero"));
    }
    Ok(interval.max(MIN_TICK_INTERVAL))
}
