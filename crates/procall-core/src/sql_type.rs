//! SQL type taxonomy
//!
//! Type codes follow the numbering used by JDBC-style drivers so that
//! attribute values such as `12` (VARCHAR) or `4` (INTEGER) can be passed
//! straight through from configuration.

use serde::{Deserialize, Serialize};

/// A relational parameter or column data type identified by its numeric code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum SqlType {
    Bit,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Real,
    Double,
    Numeric,
    Decimal,
    Char,
    VarChar,
    LongVarChar,
    NChar,
    NVarChar,
    LongNVarChar,
    Date,
    Time,
    Timestamp,
    TimeWithTimezone,
    TimestampWithTimezone,
    Binary,
    VarBinary,
    LongVarBinary,
    Boolean,
    Null,
    Blob,
    Clob,
    NClob,
    Array,
    RefCursor,
    RowId,
    SqlXml,
    JavaObject,
    /// Vendor-specific or otherwise unlisted type code
    Other(i32),
}

/// Every named type paired with its code, in declaration order
const TYPE_CODES: &[(SqlType, i32, &str)] = &[
    (SqlType::Bit, -7, "BIT"),
    (SqlType::TinyInt, -6, "TINYINT"),
    (SqlType::SmallInt, 5, "SMALLINT"),
    (SqlType::Integer, 4, "INTEGER"),
    (SqlType::BigInt, -5, "BIGINT"),
    (SqlType::Float, 6, "FLOAT"),
    (SqlType::Real, 7, "REAL"),
    (SqlType::Double, 8, "DOUBLE"),
    (SqlType::Numeric, 2, "NUMERIC"),
    (SqlType::Decimal, 3, "DECIMAL"),
    (SqlType::Char, 1, "CHAR"),
    (SqlType::VarChar, 12, "VARCHAR"),
    (SqlType::LongVarChar, -1, "LONGVARCHAR"),
    (SqlType::NChar, -15, "NCHAR"),
    (SqlType::NVarChar, -9, "NVARCHAR"),
    (SqlType::LongNVarChar, -16, "LONGNVARCHAR"),
    (SqlType::Date, 91, "DATE"),
    (SqlType::Time, 92, "TIME"),
    (SqlType::Timestamp, 93, "TIMESTAMP"),
    (SqlType::TimeWithTimezone, 2013, "TIME_WITH_TIMEZONE"),
    (SqlType::TimestampWithTimezone, 2014, "TIMESTAMP_WITH_TIMEZONE"),
    (SqlType::Binary, -2, "BINARY"),
    (SqlType::VarBinary, -3, "VARBINARY"),
    (SqlType::LongVarBinary, -4, "LONGVARBINARY"),
    (SqlType::Boolean, 16, "BOOLEAN"),
    (SqlType::Null, 0, "NULL"),
    (SqlType::Blob, 2004, "BLOB"),
    (SqlType::Clob, 2005, "CLOB"),
    (SqlType::NClob, 2011, "NCLOB"),
    (SqlType::Array, 2003, "ARRAY"),
    (SqlType::RefCursor, 2012, "REF_CURSOR"),
    (SqlType::RowId, -8, "ROWID"),
    (SqlType::SqlXml, 2009, "SQLXML"),
    (SqlType::JavaObject, 2000, "JAVA_OBJECT"),
];

impl SqlType {
    /// Map a numeric type code to its type, keeping unknown codes as `Other`
    pub fn from_code(code: i32) -> Self {
        TYPE_CODES
            .iter()
            .find(|(_, c, _)| *c == code)
            .map(|(t, _, _)| *t)
            .unwrap_or(SqlType::Other(code))
    }

    /// The numeric code of this type
    pub fn code(&self) -> i32 {
        match self {
            SqlType::Other(code) => *code,
            named => TYPE_CODES
                .iter()
                .find(|(t, _, _)| t == named)
                .map(|(_, c, _)| *c)
                .unwrap_or_default(),
        }
    }

    /// Upper-case type name, `OTHER` for unlisted codes
    pub fn name(&self) -> &'static str {
        match self {
            SqlType::Other(_) => "OTHER",
            named => TYPE_CODES
                .iter()
                .find(|(t, _, _)| t == named)
                .map(|(_, _, n)| *n)
                .unwrap_or("OTHER"),
        }
    }

    /// Whether values of this type travel as character streams (CLOB/NCLOB)
    pub fn is_character_lob(&self) -> bool {
        matches!(self, SqlType::Clob | SqlType::NClob)
    }
}

impl From<i32> for SqlType {
    fn from(code: i32) -> Self {
        SqlType::from_code(code)
    }
}

impl From<SqlType> for i32 {
    fn from(sql_type: SqlType) -> Self {
        sql_type.code()
    }
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlType::Other(code) => write!(f, "OTHER({})", code),
            named => write!(f, "{}", named.name()),
        }
    }
}
