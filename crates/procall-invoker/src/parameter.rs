//! Parameter discovery
//!
//! Stored procedure arguments arrive as flat string attributes such as
//! `procedure.args.in.1.type = 12` and `procedure.args.in.1.value = Tom`.
//! [`AttributeParser`] validates and merges them into an immutable,
//! index-ordered [`ParameterSet`] before anything is bound.

mod attributes;
mod descriptor;


pub use attributes::{AttributeParser, DEFAULT_PARAMETER_PREFIX};
pub use descriptor::{Direction, ParameterDescriptor, ParameterSet};
