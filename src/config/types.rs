use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex_lite::{Regex, RegexBuilder};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};

/// A duration written either as a number of seconds or as `1d 2h 3m 4s` (any subset, in order).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duration(std::time::Duration);

impl Duration {
    pub const fn from_secs(seconds: u64) -> Self {
        Self(std::time::Duration::from_secs(seconds))
    }

    pub const fn from_mins(minutes: u64) -> Self {
        Self::from_secs(minutes * 60)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDurationError(String);

impl fmt::Display for ParseDurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ParseDurationError {}

impl FromStr for Duration {
    type Err = ParseDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        static REGEXP: OnceLock<Regex> = OnceLock::new();

        let regexp = REGEXP.get_or_init(|| {
            RegexBuilder::new(
                r"
                ^ \s*
                (?:(?<d> \d+) \s* d)? \s*
                (?:(?<h> \d+) \s* h)? \s*
                (?:(?<m> \d+) \s* m)? \s*
                (?:(?<s> \d+) \s* s?)? \s*
                $",
            )
            .ignore_whitespace(true)
            .build()
            .unwrap()
        });

        let invalid = || ParseDurationError(format!("`{s}` is not a valid duration"));
        let captures = regexp.captures(s).ok_or_else(invalid)?;

        let mut total: u64 = 0;
        let mut matched = false;

        for (name, unit) in [("d", 86_400), ("h", 3_600), ("m", 60), ("s", 1)] {
            let Some(m) = captures.name(name) else {
                continue;
            };

            matched = true;
            let value = m
                .as_str()
                .parse::<u64>()
                .map_err(|e| ParseDurationError(format!("could not parse `{}`: {e}", m.as_str())))?;

            total = value
                .checked_mul(unit)
                .and_then(|v| total.checked_add(v))
                .ok_or_else(|| ParseDurationError(format!("duration `{s}` is too large")))?;
        }

        if !matched {
            return Err(invalid());
        }

        Ok(Self::from_secs(total))
    }
}

impl<'de> Deserialize<'de> for Duration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DurationVisitor;

        impl<'de> Visitor<'de> for DurationVisitor {
            type Value = Duration;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, "a duration")
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                self.visit_u64(v.try_into().map_err(E::custom)?)
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Duration::from_secs(v))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(DurationVisitor)
    }
}

impl From<std::time::Duration> for Duration {
    fn from(duration: std::time::Duration) -> Self {
        Self(duration)
    }
}

impl From<Duration> for std::time::Duration {
    fn from(duration: Duration) -> Self {
        duration.0
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NewsProviderKind {
    #[default]
    #[serde(rename = "gnews")]
    GNews,

    #[serde(rename = "newsapi")]
    NewsApi,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CacheBackendKind {
    #[default]
    Memory,

    Sqlite,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_durations() {
        assert_eq!("90".parse(), Ok(Duration::from_secs(90)));
        assert_eq!("30s".parse(), Ok(Duration::from_secs(30)));
        assert_eq!("10m".parse(), Ok(Duration::from_mins(10)));
        assert_eq!("1h 30m".parse(), Ok(Duration::from_mins(90)));
        assert_eq!("1d2h".parse(), Ok(Duration::from_secs(26 * 3600)));
        assert_eq!(" 15 m ".parse(), Ok(Duration::from_mins(15)));
    }

    #[test]
    fn rejects_garbage() {
        assert!("".parse::<Duration>().is_err());
        assert!("soon".parse::<Duration>().is_err());
        assert!("10m 1h".parse::<Duration>().is_err());
        assert!("99999999999999999999d".parse::<Duration>().is_err());
    }
}
