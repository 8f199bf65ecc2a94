//! Date and time format resolution
//!
//! A format token is either one of the standard ISO/RFC names (for example
//! `ISO_LOCAL_DATE` or `RFC_1123_DATE_TIME`) or a custom pattern written in
//! `yyyy-MM-dd HH:mm:ss.SSS` letter syntax. Custom patterns are translated
//! once into chrono format strings when the token is resolved.
//!
//! Parsed values keep their wall-clock fields as written. A zone offset or
//! region suffix is validated where the format requires one, then dropped;
//! the configured [`TemporalZone`] only applies to epoch instants.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while resolving a format token or parsing text with it
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FormatError {
    #[error("unsupported pattern letter '{0}'")]
    UnsupportedLetter(char),

    #[error("unsupported width {count} for pattern letter '{letter}'")]
    UnsupportedWidth { letter: char, count: usize },

    #[error("unterminated quoted literal in pattern")]
    UnterminatedLiteral,

    #[error("text does not match format {format}: {reason}")]
    Mismatch { format: String, reason: String },

    #[error("format {0} carries no {1}")]
    MissingComponent(String, &'static str),
}

/// Time zone used to read epoch instants as wall-clock values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalZone {
    /// The host's local time zone
    #[default]
    Local,
    /// Coordinated Universal Time
    Utc,
}

impl TemporalZone {
    /// Wall-clock reading of `instant` in this zone
    pub fn wall_clock<Tz: TimeZone>(&self, instant: &DateTime<Tz>) -> NaiveDateTime {
        match self {
            TemporalZone::Utc => instant.naive_utc(),
            TemporalZone::Local => instant.with_timezone(&chrono::Local).naive_local(),
        }
    }

    /// Wall-clock reading of a millisecond epoch instant in this zone
    pub fn from_epoch_millis(&self, millis: i64) -> Option<NaiveDateTime> {
        DateTime::<Utc>::from_timestamp_millis(millis).map(|instant| self.wall_clock(&instant))
    }
}

/// Standard named formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedFormat {
    BasicIsoDate,
    IsoLocalDate,
    IsoOffsetDate,
    IsoDate,
    IsoLocalTime,
    IsoOffsetTime,
    IsoTime,
    IsoLocalDateTime,
    IsoOffsetDateTime,
    IsoZonedDateTime,
    IsoDateTime,
    IsoOrdinalDate,
    IsoWeekDate,
    IsoInstant,
    Rfc1123DateTime,
}

const NAMED_FORMATS: &[(&str, NamedFormat)] = &[
    ("BASIC_ISO_DATE", NamedFormat::BasicIsoDate),
    ("ISO_LOCAL_DATE", NamedFormat::IsoLocalDate),
    ("ISO_OFFSET_DATE", NamedFormat::IsoOffsetDate),
    ("ISO_DATE", NamedFormat::IsoDate),
    ("ISO_LOCAL_TIME", NamedFormat::IsoLocalTime),
    ("ISO_OFFSET_TIME", NamedFormat::IsoOffsetTime),
    ("ISO_TIME", NamedFormat::IsoTime),
    ("ISO_LOCAL_DATE_TIME", NamedFormat::IsoLocalDateTime),
    ("ISO_OFFSET_DATE_TIME", NamedFormat::IsoOffsetDateTime),
    ("ISO_ZONED_DATE_TIME", NamedFormat::IsoZonedDateTime),
    ("ISO_DATE_TIME", NamedFormat::IsoDateTime),
    ("ISO_ORDINAL_DATE", NamedFormat::IsoOrdinalDate),
    ("ISO_WEEK_DATE", NamedFormat::IsoWeekDate),
    ("ISO_INSTANT", NamedFormat::IsoInstant),
    ("RFC_1123_DATE_TIME", NamedFormat::Rfc1123DateTime),
];

static ISO_OFFSET_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(Z|[+-][0-9]{2}:[0-9]{2}(?::[0-9]{2})?)$").expect("valid regex")
});

static BASIC_OFFSET_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(Z|[+-][0-9]{4})$").expect("valid regex"));

static ZONE_REGION_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]+\]$").expect("valid regex"));

impl NamedFormat {
    /// Look up a standard format by its name
    pub fn from_name(name: &str) -> Option<Self> {
        NAMED_FORMATS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, f)| *f)
    }

    /// The standard name of this format
    pub fn name(&self) -> &'static str {
        NAMED_FORMATS
            .iter()
            .find(|(_, f)| f == self)
            .map(|(n, _)| *n)
            .unwrap_or("UNKNOWN")
    }

    fn parse(&self, text: &str) -> Result<Fields, FormatError> {
        let mismatch = |reason: String| FormatError::Mismatch {
            format: self.name().to_string(),
            reason,
        };
        match self {
            NamedFormat::BasicIsoDate => {
                let body = strip_basic_offset(text);
                Ok(Fields::date(parse_naive_date(body, "%Y%m%d").map_err(mismatch)?))
            }
            NamedFormat::IsoLocalDate => Ok(Fields::date(
                parse_naive_date(text, "%Y-%m-%d").map_err(mismatch)?,
            )),
            NamedFormat::IsoOffsetDate | NamedFormat::IsoDate => {
                let required = *self == NamedFormat::IsoOffsetDate;
                let body = strip_iso_offset(text, required).map_err(mismatch)?;
                Ok(Fields::date(parse_naive_date(body, "%Y-%m-%d").map_err(mismatch)?))
            }
            NamedFormat::IsoLocalTime => Ok(Fields::time(iso_time(text).map_err(mismatch)?)),
            NamedFormat::IsoOffsetTime | NamedFormat::IsoTime => {
                let required = *self == NamedFormat::IsoOffsetTime;
                let body = strip_iso_offset(text, required).map_err(mismatch)?;
                Ok(Fields::time(iso_time(body).map_err(mismatch)?))
            }
            NamedFormat::IsoLocalDateTime => {
                Ok(Fields::date_time(iso_date_time(text).map_err(mismatch)?))
            }
            NamedFormat::IsoOffsetDateTime
            | NamedFormat::IsoZonedDateTime
            | NamedFormat::IsoDateTime => {
                let body = if *self == NamedFormat::IsoOffsetDateTime {
                    text
                } else {
                    ZONE_REGION_SUFFIX
                        .find(text)
                        .map_or(text, |region| &text[..region.start()])
                };
                let required = *self != NamedFormat::IsoDateTime;
                let body = strip_iso_offset(body, required).map_err(mismatch)?;
                Ok(Fields::date_time(iso_date_time(body).map_err(mismatch)?))
            }
            NamedFormat::IsoOrdinalDate | NamedFormat::IsoWeekDate => {
                let pattern = if *self == NamedFormat::IsoOrdinalDate {
                    "%Y-%j"
                } else {
                    "%G-W%V-%u"
                };
                let body = strip_iso_offset(text, false).map_err(mismatch)?;
                Ok(Fields::date(parse_naive_date(body, pattern).map_err(mismatch)?))
            }
            NamedFormat::IsoInstant => {
                let instant =
                    DateTime::parse_from_rfc3339(text).map_err(|e| mismatch(e.to_string()))?;
                Ok(Fields::instant(instant))
            }
            NamedFormat::Rfc1123DateTime => {
                let instant =
                    DateTime::parse_from_rfc2822(text).map_err(|e| mismatch(e.to_string()))?;
                Ok(Fields::instant(instant))
            }
        }
    }
}

/// A custom pattern translated to a chrono format string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomPattern {
    source: String,
    chrono_format: String,
    has_date: bool,
    has_time: bool,
    has_offset: bool,
}

impl CustomPattern {
    /// Translate a `yyyy-MM-dd HH:mm:ss.SSS` style pattern
    pub fn compile(pattern: &str) -> Result<Self, FormatError> {
        let mut compiled = CustomPattern {
            source: pattern.to_string(),
            chrono_format: String::with_capacity(pattern.len() * 2),
            has_date: false,
            has_time: false,
            has_offset: false,
        };

        let chars: Vec<char> = pattern.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c == '\'' {
                i = compiled.push_literal(&chars, i + 1)?;
                continue;
            }
            if !c.is_ascii_alphabetic() {
                compiled.push_text(c);
                i += 1;
                continue;
            }

            let mut count = 1;
            while i + count < chars.len() && chars[i + count] == c {
                count += 1;
            }
            compiled.push_field(c, count)?;
            i += count;
        }

        Ok(compiled)
    }

    /// The pattern as written
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The equivalent chrono format string
    pub fn chrono_format(&self) -> &str {
        &self.chrono_format
    }

    fn push_text(&mut self, c: char) {
        if c == '%' {
            self.chrono_format.push_str("%%");
        } else {
            self.chrono_format.push(c);
        }
    }

    /// Copy a quoted literal starting after its opening quote; `''` is a quote
    fn push_literal(&mut self, chars: &[char], mut i: usize) -> Result<usize, FormatError> {
        if chars.get(i) == Some(&'\'') {
            self.chrono_format.push('\'');
            return Ok(i + 1);
        }
        loop {
            match chars.get(i) {
                None => return Err(FormatError::UnterminatedLiteral),
                Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                    self.chrono_format.push('\'');
                    i += 2;
                }
                Some('\'') => return Ok(i + 1),
                Some(&c) => {
                    self.push_text(c);
                    i += 1;
                }
            }
        }
    }

    fn push_field(&mut self, letter: char, count: usize) -> Result<(), FormatError> {
        let width = || FormatError::UnsupportedWidth { letter, count };
        let directive = match letter {
            'y' | 'u' => match count {
                2 => "%y",
                _ => "%Y",
            },
            'M' | 'L' => match count {
                1 | 2 => "%m",
                3 => "%b",
                _ => "%B",
            },
            'd' if count <= 2 => "%d",
            'D' if count <= 3 => "%j",
            'E' => match count {
                1..=3 => "%a",
                _ => "%A",
            },
            'H' if count <= 2 => "%H",
            'h' if count <= 2 => "%I",
            'm' if count <= 2 => "%M",
            's' if count <= 2 => "%S",
            'S' => match count {
                3 => "%3f",
                6 => "%6f",
                9 => "%9f",
                _ => return Err(width()),
            },
            'a' if count == 1 => "%p",
            'X' if count <= 3 => "%#z",
            'x' | 'Z' if count <= 3 => "%z",
            'd' | 'D' | 'H' | 'h' | 'm' | 's' | 'a' | 'X' | 'x' | 'Z' => return Err(width()),
            other => return Err(FormatError::UnsupportedLetter(other)),
        };

        match letter {
            'y' | 'u' | 'M' | 'L' | 'd' | 'D' | 'E' => self.has_date = true,
            'X' | 'x' | 'Z' => self.has_offset = true,
            _ => self.has_time = true,
        }
        self.chrono_format.push_str(directive);
        Ok(())
    }

    fn parse(&self, text: &str) -> Result<Fields, FormatError> {
        let mismatch = |e: chrono::ParseError| FormatError::Mismatch {
            format: self.source.clone(),
            reason: e.to_string(),
        };
        let format = self.chrono_format.as_str();

        match (self.has_date, self.has_time, self.has_offset) {
            (true, true, true) => Ok(Fields::instant(
                DateTime::parse_from_str(text, format).map_err(mismatch)?,
            )),
            (true, true, false) => Ok(Fields::date_time(
                NaiveDateTime::parse_from_str(text, format).map_err(mismatch)?,
            )),
            (true, false, _) => Ok(Fields::date(
                NaiveDate::parse_from_str(text, format).map_err(mismatch)?,
            )),
            (false, true, _) => Ok(Fields::time(
                NaiveTime::parse_from_str(text, format).map_err(mismatch)?,
            )),
            (false, false, _) => Err(FormatError::MissingComponent(
                self.source.clone(),
                "date or time",
            )),
        }
    }
}

/// A resolved date/time format
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeFormat {
    Named(NamedFormat),
    Pattern(CustomPattern),
}

impl TimeFormat {
    /// Resolve a format token: a standard name, otherwise a custom pattern
    pub fn resolve(token: &str) -> Result<Self, FormatError> {
        match NamedFormat::from_name(token) {
            Some(named) => Ok(TimeFormat::Named(named)),
            None => CustomPattern::compile(token).map(TimeFormat::Pattern),
        }
    }

    /// `yyyy-MM-dd`
    pub fn default_date() -> Self {
        Self::builtin("yyyy-MM-dd", "%Y-%m-%d", true, false)
    }

    /// `HH:mm:ss.SSS`
    pub fn default_time() -> Self {
        Self::builtin("HH:mm:ss.SSS", "%H:%M:%S.%3f", false, true)
    }

    /// `yyyy-MM-dd HH:mm:ss.SSS`
    pub fn default_timestamp() -> Self {
        Self::builtin("yyyy-MM-dd HH:mm:ss.SSS", "%Y-%m-%d %H:%M:%S.%3f", true, true)
    }

    fn builtin(source: &str, chrono_format: &str, has_date: bool, has_time: bool) -> Self {
        TimeFormat::Pattern(CustomPattern {
            source: source.to_string(),
            chrono_format: chrono_format.to_string(),
            has_date,
            has_time,
            has_offset: false,
        })
    }

    /// Display name of this format
    pub fn name(&self) -> &str {
        match self {
            TimeFormat::Named(named) => named.name(),
            TimeFormat::Pattern(pattern) => pattern.source(),
        }
    }

    /// Parse a calendar date
    pub fn parse_date(&self, text: &str) -> Result<NaiveDate, FormatError> {
        self.fields(text)?
            .date
            .ok_or_else(|| FormatError::MissingComponent(self.name().to_string(), "date"))
    }

    /// Parse a time of day
    pub fn parse_time(&self, text: &str) -> Result<NaiveTime, FormatError> {
        self.fields(text)?
            .time
            .ok_or_else(|| FormatError::MissingComponent(self.name().to_string(), "time"))
    }

    /// Parse a date and time of day
    pub fn parse_timestamp(&self, text: &str) -> Result<NaiveDateTime, FormatError> {
        let fields = self.fields(text)?;
        match (fields.date, fields.time) {
            (Some(date), Some(time)) => Ok(date.and_time(time)),
            (None, _) => Err(FormatError::MissingComponent(self.name().to_string(), "date")),
            (_, None) => Err(FormatError::MissingComponent(self.name().to_string(), "time")),
        }
    }

    fn fields(&self, text: &str) -> Result<Fields, FormatError> {
        match self {
            TimeFormat::Named(named) => named.parse(text),
            TimeFormat::Pattern(pattern) => pattern.parse(text),
        }
    }
}

/// Wall-clock components read from one piece of text
#[derive(Debug, Clone, Copy, Default)]
struct Fields {
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
}

impl Fields {
    fn date(date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            ..Default::default()
        }
    }

    fn time(time: NaiveTime) -> Self {
        Self {
            time: Some(time),
            ..Default::default()
        }
    }

    fn date_time(value: NaiveDateTime) -> Self {
        Self {
            date: Some(value.date()),
            time: Some(value.time()),
        }
    }

    /// The fields as written; the offset does not move them
    fn instant(value: DateTime<FixedOffset>) -> Self {
        Self::date_time(value.naive_local())
    }
}

fn parse_naive_date(text: &str, format: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(text, format).map_err(|e| e.to_string())
}

fn iso_time(text: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .map_err(|e| e.to_string())
}

fn iso_date_time(text: &str) -> Result<NaiveDateTime, String> {
    let (date, time) = text
        .split_once('T')
        .ok_or_else(|| "missing 'T' separator".to_string())?;
    Ok(parse_naive_date(date, "%Y-%m-%d")?.and_time(iso_time(time)?))
}

fn strip_iso_offset(text: &str, required: bool) -> Result<&str, String> {
    match ISO_OFFSET_SUFFIX.find(text) {
        Some(m) => Ok(&text[..m.start()]),
        None if required => Err("missing zone offset".to_string()),
        None => Ok(text),
    }
}

/// `20240101+0100` carries its offset after the eight date digits
fn strip_basic_offset(text: &str) -> &str {
    match BASIC_OFFSET_SUFFIX.find(text) {
        Some(m) if m.start() >= 8 => &text[..m.start()],
        _ => text,
    }
}
