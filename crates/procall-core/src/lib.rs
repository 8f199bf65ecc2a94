//! Procall Core - Driver abstractions for stored procedure invocation
//!
//! This crate provides the fundamental traits and types that the rest of
//! the workspace depends on. It defines:
//!
//! - `Connection` - Trait for a live database connection
//! - `CallableStatement` - Trait for a prepared stored routine call
//! - `ResultSetCursor` - Trait for draining one result set row by row
//! - `LargeObject` - Trait for character-large-object handles
//! - `SqlType` - The numbered SQL type taxonomy used for binding
//! - Common types like `Value`, `Row`, `ColumnMeta`, etc.

mod connection;
mod error;
mod sql_type;
mod types;

pub use connection::*;
pub use error::*;
pub use sql_type::*;
pub use types::*;
