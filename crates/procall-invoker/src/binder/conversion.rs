//! SQL type to conversion strategy table

use procall_core::SqlType;

/// How the text of an input parameter becomes a bound argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// `1`, `t` or `true` (any case) are true, everything else false
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    /// 32-bit float
    Real,
    /// 64-bit float
    Double,
    /// Exact decimal text, plain or scientific notation
    Decimal,
    Date,
    Time,
    Timestamp,
    /// Decoded by the `ascii`, `hex` or `base64` format token
    Binary,
    /// Text bound as is
    Text,
    /// Text bound as is, national character set
    NationalText,
    /// Copied into a freshly allocated large object
    CharacterLob { national: bool },
    /// Raw text handed to the driver with the declared type code
    Generic,
}

/// Look up the conversion strategy for a declared SQL type
pub fn conversion_for(sql_type: SqlType) -> Conversion {
    match sql_type {
        SqlType::Bit | SqlType::Boolean => Conversion::Boolean,
        SqlType::TinyInt => Conversion::TinyInt,
        SqlType::SmallInt => Conversion::SmallInt,
        SqlType::Integer => Conversion::Integer,
        SqlType::BigInt => Conversion::BigInt,
        SqlType::Real => Conversion::Real,
        SqlType::Float | SqlType::Double => Conversion::Double,
        SqlType::Decimal | SqlType::Numeric => Conversion::Decimal,
        SqlType::Date => Conversion::Date,
        SqlType::Time => Conversion::Time,
        SqlType::Timestamp => Conversion::Timestamp,
        SqlType::Binary | SqlType::VarBinary | SqlType::LongVarBinary => Conversion::Binary,
        SqlType::Char | SqlType::VarChar | SqlType::LongVarChar => Conversion::Text,
        SqlType::NChar | SqlType::NVarChar | SqlType::LongNVarChar => Conversion::NationalText,
        SqlType::Clob => Conversion::CharacterLob { national: false },
        SqlType::NClob => Conversion::CharacterLob { national: true },
        _ => Conversion::Generic,
    }
}

/// Binary encodings accepted in the `format` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryEncoding {
    /// One byte per character, code points up to 0xFF
    Ascii,
    /// Upper-case hexadecimal pairs
    Hex,
    /// Standard alphabet base64
    Base64,
}

impl BinaryEncoding {
    /// Resolve a format token; a missing token means `ascii`
    pub fn from_token(token: Option<&str>) -> Option<Self> {
        match token {
            None | Some("ascii") => Some(BinaryEncoding::Ascii),
            Some("hex") => Some(BinaryEncoding::Hex),
            Some("base64") => Some(BinaryEncoding::Base64),
            Some(_) => None,
        }
    }
}
