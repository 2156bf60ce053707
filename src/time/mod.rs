#[doc(hidden)]
pub mod duration;

use std::{fmt, str::FromStr, time::Duration};

use anyhow::{bail, Context, Result};
use chrono::{
    format::{Item, StrftimeItems},
    DateTime, FixedOffset, Utc,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Extensions to `Duration`
pub trait DurationExt
where
    Self: Sized,
{
    /// Parse a duration written like "1h30m", "90s" or "250ms".
    fn from_human(s: &str) -> Result<Self>;

    /// Formats the duration in a humanized way, for example 22m30s.
    fn to_human(&self) -> String;
}

impl DurationExt for Duration {
    fn from_human(s: &str) -> Result<Self> {
        let re = Regex::new(r"^(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?(?:(\d+)ms)?$")?;
        let caps = re
            .captures(s.trim())
            .filter(|_| !s.trim().is_empty())
            .with_context(|| format!("\"{}\" is not a duration like 1h30m, 90s or 250ms", s))?;

        let part = |i: usize| -> Result<u64> {
            match caps.get(i) {
                Some(m) => m
                    .as_str()
                    .parse()
                    .with_context(|| format!("{} is too large", m.as_str())),
                None => Ok(0),
            }
        };

        let secs = part(1)? * 3600 + part(2)? * 60 + part(3)?;

        Ok(Duration::from_secs(secs) + Duration::from_millis(part(4)?))
    }

    fn to_human(&self) -> String {
        use std::fmt::Write;

        if self.is_zero() {
            return "0s".to_string();
        }

        let total = self.as_secs();
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        let seconds = total % 60;
        let millis = self.subsec_millis();

        let mut acc = String::new();

        if hours > 0 {
            write!(acc, "{}h", hours).unwrap();
        }

        if minutes > 0 {
            write!(acc, "{}m", minutes).unwrap();
        }

        if seconds > 0 {
            write!(acc, "{}s", seconds).unwrap();
        }

        if millis > 0 {
            write!(acc, "{}ms", millis).unwrap();
        }

        acc
    }
}

/// How an elapsed millisecond count is rendered as text
///
/// Serialized as `"full"`, `"seconds"`, or a chrono strftime pattern.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ElapsedFormat {
    /// `HH:mm:ss:SS`, the last field being hundredths of a second
    Full,
    /// `HH:mm:ss`
    Seconds,
    /// Any strftime pattern understood by chrono
    Custom(String),
}

impl FromStr for ElapsedFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "full" => Ok(Self::Full),
            "seconds" => Ok(Self::Seconds),
            pattern => {
                if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
                    bail!("\"{}\" is not a valid time format", pattern);
                }

                Ok(Self::Custom(pattern.to_string()))
            }
        }
    }
}

impl TryFrom<String> for ElapsedFormat {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ElapsedFormat> for String {
    fn from(format: ElapsedFormat) -> Self {
        format.to_string()
    }
}

impl fmt::Display for ElapsedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => f.write_str("full"),
            Self::Seconds => f.write_str("seconds"),
            Self::Custom(pattern) => f.write_str(pattern),
        }
    }
}

/// Render `millis` as a time of day counted from the Unix epoch in `offset`.
///
/// Hours wrap at 24, so a stopwatch running past a day starts over at
/// `00:00:00`. With a zero offset this matches the `Etc/GMT` zone.
pub fn format_elapsed(millis: u64, format: &ElapsedFormat, offset: FixedOffset) -> String {
    let millis = i64::try_from(millis).unwrap_or(i64::MAX);
    let dt = DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .with_timezone(&offset);

    match format {
        ElapsedFormat::Full => format!(
            "{}:{:02}",
            dt.format("%H:%M:%S"),
            dt.timestamp_subsec_millis() / 10
        ),
        ElapsedFormat::Seconds => dt.format("%H:%M:%S").to_string(),
        ElapsedFormat::Custom(pattern) => dt.format(pattern).to_string(),
    }
}
