//! Document writer capability

use procall_core::{Result, Value};

/// Narrow event sink the serializer writes the outcome document through
///
/// Events must be well nested: a `field_name` is only valid directly inside
/// an object and must be followed by exactly one value, array or object.
pub trait DocumentWriter: Send {
    fn begin_object(&mut self) -> Result<()>;

    fn end_object(&mut self) -> Result<()>;

    fn begin_array(&mut self) -> Result<()>;

    fn end_array(&mut self) -> Result<()>;

    fn field_name(&mut self, name: &str) -> Result<()>;

    /// Write one scalar (or array-valued) cell
    fn value(&mut self, value: &Value) -> Result<()>;

    /// Write `value` under `name` in the current object
    fn field(&mut self, name: &str, value: &Value) -> Result<()> {
        self.field_name(name)?;
        self.value(value)
    }
}
