//! Streaming JSON document writer

use std::io::Write;
use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use procall_core::{ProcallError, Result, Value};
use regex::Regex;

use super::writer::DocumentWriter;

static JSON_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?(0|[1-9][0-9]*)(\.[0-9]+)?([eE][+-]?[0-9]+)?$").expect("valid regex")
});

#[derive(Debug, Clone, Copy)]
enum Frame {
    Object { first: bool, awaiting_value: bool },
    Array { first: bool },
}

/// Writes document events as compact UTF-8 JSON into any [`Write`] sink
pub struct JsonDocumentWriter<W: Write> {
    out: W,
    stack: Vec<Frame>,
    complete: bool,
}

impl JsonDocumentWriter<Vec<u8>> {
    /// Writer collecting the document in memory
    pub fn in_memory() -> Self {
        Self::new(Vec::new())
    }
}

impl<W: Write> JsonDocumentWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            stack: Vec::new(),
            complete: false,
        }
    }

    /// Flush and hand back the sink; fails if the document is not closed
    pub fn finish(mut self) -> Result<W> {
        if !self.stack.is_empty() {
            return Err(structure("document has unclosed objects or arrays"));
        }
        self.out.flush()?;
        Ok(self.out)
    }

    /// Separator and bookkeeping before any value, object or array
    fn before_value(&mut self) -> Result<()> {
        match self.stack.last_mut() {
            None if self.complete => Err(structure("document already complete")),
            None => Ok(()),
            Some(Frame::Array { first }) => {
                if !*first {
                    self.out.write_all(b",")?;
                }
                *first = false;
                Ok(())
            }
            Some(Frame::Object { awaiting_value, .. }) => {
                if !*awaiting_value {
                    return Err(structure("object member written without a field name"));
                }
                *awaiting_value = false;
                Ok(())
            }
        }
    }

    fn after_value(&mut self) {
        if self.stack.is_empty() {
            self.complete = true;
        }
    }
}

impl<W: Write + Send> DocumentWriter for JsonDocumentWriter<W> {
    fn begin_object(&mut self) -> Result<()> {
        self.before_value()?;
        self.out.write_all(b"{")?;
        self.stack.push(Frame::Object {
            first: true,
            awaiting_value: false,
        });
        Ok(())
    }

    fn end_object(&mut self) -> Result<()> {
        match self.stack.pop() {
            Some(Frame::Object {
                awaiting_value: false,
                ..
            }) => {}
            _ => return Err(structure("end_object does not close an object")),
        }
        self.out.write_all(b"}")?;
        self.after_value();
        Ok(())
    }

    fn begin_array(&mut self) -> Result<()> {
        self.before_value()?;
        self.out.write_all(b"[")?;
        self.stack.push(Frame::Array { first: true });
        Ok(())
    }

    fn end_array(&mut self) -> Result<()> {
        if !matches!(self.stack.pop(), Some(Frame::Array { .. })) {
            return Err(structure("end_array does not close an array"));
        }
        self.out.write_all(b"]")?;
        self.after_value();
        Ok(())
    }

    fn field_name(&mut self, name: &str) -> Result<()> {
        let Some(Frame::Object {
            first,
            awaiting_value,
        }) = self.stack.last_mut()
        else {
            return Err(structure("field name outside of an object"));
        };
        if *awaiting_value {
            return Err(structure("field name follows a field name"));
        }
        let separator = !*first;
        *first = false;
        *awaiting_value = true;

        if separator {
            self.out.write_all(b",")?;
        }
        serde_json::to_writer(&mut self.out, name)?;
        self.out.write_all(b":")?;
        Ok(())
    }

    fn value(&mut self, value: &Value) -> Result<()> {
        self.before_value()?;
        write_value(&mut self.out, value)?;
        self.after_value();
        Ok(())
    }
}

fn structure(message: &str) -> ProcallError {
    ProcallError::Other(format!("invalid document structure: {}", message))
}

/// Label for floats JSON cannot carry as numbers
fn float_special_label(value: f64) -> &'static str {
    if value.is_nan() {
        "NaN"
    } else if value.is_sign_positive() {
        "Infinity"
    } else {
        "-Infinity"
    }
}

fn write_value<W: Write>(out: &mut W, value: &Value) -> Result<()> {
    match value {
        Value::Null => out.write_all(b"null")?,
        Value::Bool(v) => serde_json::to_writer(&mut *out, v)?,
        Value::Int8(v) => serde_json::to_writer(&mut *out, v)?,
        Value::Int16(v) => serde_json::to_writer(&mut *out, v)?,
        Value::Int32(v) => serde_json::to_writer(&mut *out, v)?,
        Value::Int64(v) => serde_json::to_writer(&mut *out, v)?,
        Value::Float32(v) if v.is_finite() => serde_json::to_writer(&mut *out, v)?,
        Value::Float64(v) if v.is_finite() => serde_json::to_writer(&mut *out, v)?,
        Value::Float32(v) => serde_json::to_writer(&mut *out, float_special_label(f64::from(*v)))?,
        Value::Float64(v) => serde_json::to_writer(&mut *out, float_special_label(*v))?,
        // Exact digits; text that is not a JSON number literal stays a string
        Value::Decimal(digits) if JSON_NUMBER.is_match(digits) => out.write_all(digits.as_bytes())?,
        Value::Decimal(digits) => serde_json::to_writer(&mut *out, digits)?,
        Value::String(s) => serde_json::to_writer(&mut *out, s)?,
        Value::Bytes(b) => serde_json::to_writer(&mut *out, &BASE64.encode(b))?,
        Value::Uuid(u) => serde_json::to_writer(&mut *out, &u.to_string())?,
        Value::Date(d) => serde_json::to_writer(&mut *out, &d.format("%Y-%m-%d").to_string())?,
        Value::Time(t) => serde_json::to_writer(&mut *out, &t.format("%H:%M:%S%.f").to_string())?,
        Value::DateTime(dt) => serde_json::to_writer(
            &mut *out,
            &dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
        )?,
        Value::DateTimeUtc(dt) => serde_json::to_writer(&mut *out, &dt.to_rfc3339())?,
        Value::Json(j) => serde_json::to_writer(&mut *out, j)?,
        Value::Array(items) => {
            out.write_all(b"[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.write_all(b",")?;
                }
                write_value(out, item)?;
            }
            out.write_all(b"]")?;
        }
    }
    Ok(())
}
