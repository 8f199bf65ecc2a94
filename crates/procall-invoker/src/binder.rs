//! Type coercion and binding
//!
//! Turns the textual value of each input descriptor into a typed
//! [`CallArgument`] according to its declared SQL type, and registers output
//! slots for OUT/INOUT descriptors.

mod conversion;


use std::num::IntErrorKind;
use std::str::FromStr;
use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use procall_core::{CallArgument, CallableStatement, Value};
use regex::Regex;
use rust_decimal::Decimal;

pub use conversion::{BinaryEncoding, Conversion, conversion_for};

use crate::lob::LargeObjectScope;
use crate::parameter::{ParameterDescriptor, ParameterSet};
use crate::time_format::{TemporalZone, TimeFormat};
use crate::{InvokeError, Result};

/// Optionally signed run of at most 19 digits, read as epoch milliseconds
static EPOCH_MILLIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]{1,19}$").expect("valid regex"));

static DECIMAL_SYNTAX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?([0-9]+\.?[0-9]*|\.[0-9]+)([eE][+-]?[0-9]+)?$").expect("valid regex")
});

/// Binds a parameter set to a prepared call
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeCoercionBinder {
    zone: TemporalZone,
}

impl TypeCoercionBinder {
    pub fn new(zone: TemporalZone) -> Self {
        Self { zone }
    }

    pub fn zone(&self) -> TemporalZone {
        self.zone
    }

    /// Bind every descriptor in ascending index order
    ///
    /// Inputs without a value bind a typed NULL; outputs are registered with
    /// their declared type. Large objects are allocated in `lobs`.
    pub async fn bind(
        &self,
        statement: &mut dyn CallableStatement,
        parameters: &ParameterSet,
        lobs: &mut LargeObjectScope<'_>,
    ) -> Result<()> {
        for descriptor in parameters.iter() {
            if descriptor.direction.is_input() {
                let argument = match descriptor.value.as_deref() {
                    None => CallArgument::Null(descriptor.sql_type),
                    Some(text) => match self.coerce(descriptor, text)? {
                        Some(argument) => argument,
                        None => {
                            let national = matches!(
                                conversion_for(descriptor.sql_type),
                                Conversion::CharacterLob { national: true }
                            );
                            match lobs
                                .allocate(Some(text), national)
                                .await
                                .map_err(InvokeError::Execution)?
                            {
                                Some(handle) => CallArgument::LargeObject(handle),
                                None => CallArgument::Null(descriptor.sql_type),
                            }
                        }
                    },
                };
                tracing::debug!(
                    index = descriptor.index,
                    sql_type = %descriptor.sql_type,
                    argument = ?argument,
                    "binding input parameter"
                );
                statement
                    .bind(descriptor.index, argument)
                    .map_err(InvokeError::Execution)?;
            }

            if descriptor.direction.is_output() {
                tracing::debug!(
                    index = descriptor.index,
                    sql_type = %descriptor.sql_type,
                    "registering output parameter"
                );
                statement
                    .register_output(descriptor.index, descriptor.sql_type)
                    .map_err(InvokeError::Execution)?;
            }
        }
        Ok(())
    }

    /// Convert `text` to an argument for `descriptor`'s declared type
    ///
    /// Returns `None` for character large object types, which must be
    /// copied into a large object by the caller.
    pub fn coerce(&self, descriptor: &ParameterDescriptor, text: &str) -> Result<Option<CallArgument>> {
        let value = match conversion_for(descriptor.sql_type) {
            Conversion::Boolean => Value::Bool(
                text == "1" || text.eq_ignore_ascii_case("t") || text.eq_ignore_ascii_case("true"),
            ),
            Conversion::TinyInt => Value::Int8(parse_integer(descriptor, text)?),
            Conversion::SmallInt => Value::Int16(parse_integer(descriptor, text)?),
            Conversion::Integer => Value::Int32(parse_integer(descriptor, text)?),
            Conversion::BigInt => Value::Int64(parse_integer(descriptor, text)?),
            Conversion::Real => Value::Float32(parse_float(descriptor, text)?),
            Conversion::Double => Value::Float64(parse_float(descriptor, text)?),
            Conversion::Decimal => Value::Decimal(parse_decimal(descriptor, text)?),
            Conversion::Date => {
                Value::Date(self.parse_temporal(descriptor, text, TemporalKind::Date)?.date())
            }
            Conversion::Time => {
                Value::Time(self.parse_temporal(descriptor, text, TemporalKind::Time)?.time())
            }
            Conversion::Timestamp => {
                Value::DateTime(self.parse_temporal(descriptor, text, TemporalKind::Timestamp)?)
            }
            Conversion::Binary => Value::Bytes(decode_binary(descriptor, text)?),
            Conversion::Text => Value::String(text.to_string()),
            Conversion::NationalText | Conversion::Generic => {
                return Ok(Some(CallArgument::Typed {
                    text: text.to_string(),
                    sql_type: descriptor.sql_type,
                }));
            }
            Conversion::CharacterLob { .. } => return Ok(None),
        };
        Ok(Some(CallArgument::Value(value)))
    }

    fn parse_temporal(
        &self,
        descriptor: &ParameterDescriptor,
        text: &str,
        kind: TemporalKind,
    ) -> Result<chrono::NaiveDateTime> {
        let Some(token) = descriptor.format_token() else {
            if EPOCH_MILLIS.is_match(text) {
                let range = || InvokeError::NumericRange {
                    index: descriptor.index,
                    sql_type: descriptor.sql_type,
                    value: text.to_string(),
                };
                let millis = text.parse::<i64>().map_err(|_| range())?;
                return self.zone.from_epoch_millis(millis).ok_or_else(range);
            }
            return kind.parse(&kind.default_format(), text, descriptor);
        };

        let format = TimeFormat::resolve(token)
            .map_err(|e| parse_error(descriptor, text, e.to_string()))?;
        kind.parse(&format, text, descriptor)
    }
}

#[derive(Debug, Clone, Copy)]
enum TemporalKind {
    Date,
    Time,
    Timestamp,
}

impl TemporalKind {
    fn default_format(&self) -> TimeFormat {
        match self {
            TemporalKind::Date => TimeFormat::default_date(),
            TemporalKind::Time => TimeFormat::default_time(),
            TemporalKind::Timestamp => TimeFormat::default_timestamp(),
        }
    }

    /// Parse into a date-time; date-only and time-only kinds fill the other half
    fn parse(
        &self,
        format: &TimeFormat,
        text: &str,
        descriptor: &ParameterDescriptor,
    ) -> Result<chrono::NaiveDateTime> {
        let parsed = match self {
            TemporalKind::Date => format
                .parse_date(text)
                .map(|d| d.and_time(chrono::NaiveTime::MIN)),
            TemporalKind::Time => format
                .parse_time(text)
                .map(|t| chrono::NaiveDate::default().and_time(t)),
            TemporalKind::Timestamp => format.parse_timestamp(text),
        };
        parsed.map_err(|e| parse_error(descriptor, text, e.to_string()))
    }
}

fn parse_error(descriptor: &ParameterDescriptor, text: &str, reason: impl Into<String>) -> InvokeError {
    InvokeError::Parse {
        index: descriptor.index,
        sql_type: descriptor.sql_type,
        value: text.to_string(),
        reason: reason.into(),
    }
}

fn parse_integer<T>(descriptor: &ParameterDescriptor, text: &str) -> Result<T>
where
    T: FromStr<Err = std::num::ParseIntError>,
{
    text.parse::<T>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => InvokeError::NumericRange {
            index: descriptor.index,
            sql_type: descriptor.sql_type,
            value: text.to_string(),
        },
        _ => parse_error(descriptor, text, e.to_string()),
    })
}

fn parse_float<T>(descriptor: &ParameterDescriptor, text: &str) -> Result<T>
where
    T: FromStr<Err = std::num::ParseFloatError>,
{
    text.trim()
        .parse::<T>()
        .map_err(|e| parse_error(descriptor, text, e.to_string()))
}

/// Canonical decimal text; digits beyond 96-bit precision are kept verbatim
fn parse_decimal(descriptor: &ParameterDescriptor, text: &str) -> Result<String> {
    if !DECIMAL_SYNTAX.is_match(text) {
        return Err(parse_error(descriptor, text, "invalid decimal syntax"));
    }
    let exact = Decimal::from_str_exact(text).or_else(|_| Decimal::from_scientific(text));
    Ok(match exact {
        Ok(decimal) => decimal.to_string(),
        Err(_) => text.to_string(),
    })
}

fn decode_binary(descriptor: &ParameterDescriptor, text: &str) -> Result<Vec<u8>> {
    let token = descriptor.format_token();
    let encoding = BinaryEncoding::from_token(token).ok_or_else(|| InvokeError::UnsupportedFormat {
        index: descriptor.index,
        sql_type: descriptor.sql_type,
        format: token.unwrap_or_default().to_string(),
    })?;

    match encoding {
        BinaryEncoding::Ascii => text
            .chars()
            .map(|c| u8::try_from(u32::from(c)))
            .collect::<std::result::Result<Vec<u8>, _>>()
            .map_err(|_| parse_error(descriptor, text, "character outside the single-byte range")),
        BinaryEncoding::Hex => {
            if text.chars().any(|c| c.is_ascii_lowercase()) {
                return Err(parse_error(
                    descriptor,
                    text,
                    "hex digits must be upper-case",
                ));
            }
            hex::decode(text).map_err(|e| parse_error(descriptor, text, e.to_string()))
        }
        BinaryEncoding::Base64 => BASE64
            .decode(text)
            .map_err(|e| parse_error(descriptor, text, e.to_string())),
    }
}
