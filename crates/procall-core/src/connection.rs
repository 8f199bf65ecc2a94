//! Connection, callable statement and cursor traits

use crate::{ColumnMeta, Result, SqlType, Value};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A character stream over a CLOB/NCLOB value
pub type CharacterStream = Box<dyn std::io::Read + Send>;

/// A database connection capable of running stored procedure calls
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "oracle", "postgresql", "mssql")
    fn driver_name(&self) -> &str;

    /// Prepare a callable statement such as `{call proc(?, ?)}`
    async fn prepare_call(&self, sql: &str) -> Result<Box<dyn CallableStatement>>;

    /// Allocate a temporary character large object on this connection
    ///
    /// `national` selects the national character set (NCLOB) variant.
    async fn create_clob(&self, national: bool) -> Result<Arc<dyn LargeObject>>;

    /// Check whether the connection is still usable
    ///
    /// When a validation query is given it is run; otherwise the driver
    /// uses its own liveness check.
    async fn is_valid(&self, validation_query: Option<&str>) -> bool {
        let _ = validation_query;
        !self.is_closed()
    }

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}

/// One argument bound to a callable statement placeholder
#[derive(Clone)]
pub enum CallArgument {
    /// Typed NULL
    Null(SqlType),
    /// A concrete value
    Value(Value),
    /// A previously allocated and filled large object
    LargeObject(Arc<dyn LargeObject>),
    /// Raw text handed to the driver for its own conversion to `sql_type`
    Typed { text: String, sql_type: SqlType },
}

impl std::fmt::Debug for CallArgument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallArgument::Null(t) => f.debug_tuple("Null").field(t).finish(),
            CallArgument::Value(v) => f.debug_tuple("Value").field(v).finish(),
            CallArgument::LargeObject(lob) => f
                .debug_struct("LargeObject")
                .field("national", &lob.is_national())
                .finish(),
            CallArgument::Typed { text, sql_type } => f
                .debug_struct("Typed")
                .field("text", text)
                .field("sql_type", sql_type)
                .finish(),
        }
    }
}

/// One step of the outcome sequence produced by an executed call
pub enum CallOutcome {
    /// A DML update count
    UpdateCount(u64),
    /// A result set, consumed through its cursor
    ResultSet(Box<dyn ResultSetCursor>),
}

impl std::fmt::Debug for CallOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallOutcome::UpdateCount(n) => f.debug_tuple("UpdateCount").field(n).finish(),
            CallOutcome::ResultSet(cursor) => f
                .debug_struct("ResultSet")
                .field("columns", &cursor.columns().len())
                .finish(),
        }
    }
}

/// A prepared stored procedure call
#[async_trait]
pub trait CallableStatement: Send {
    /// Limit how long `execute` may run on the server side
    fn set_query_timeout(&mut self, timeout: Duration);

    /// Bind an argument to the 1-based placeholder `index`
    fn bind(&mut self, index: u32, argument: CallArgument) -> Result<()>;

    /// Register the placeholder at `index` as an output of `sql_type`
    fn register_output(&mut self, index: u32, sql_type: SqlType) -> Result<()>;

    /// Run the call
    async fn execute(&mut self) -> Result<()>;

    /// Advance to the next outcome; `None` once all are consumed
    async fn next_outcome(&mut self) -> Result<Option<CallOutcome>>;

    /// Read a registered output value after the outcomes are drained
    fn output_value(&mut self, index: u32) -> Result<Value>;

    /// Read a registered CLOB output as a character stream; `None` for NULL
    fn output_stream(&mut self, index: u32) -> Result<Option<CharacterStream>>;

    /// Release the statement
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Forward-only cursor over a result set
#[async_trait]
pub trait ResultSetCursor: Send {
    /// Column metadata
    fn columns(&self) -> &[ColumnMeta];

    /// Move to the next row, returning `false` past the last row
    async fn advance(&mut self) -> Result<bool>;

    /// Value of the 0-based column in the current row
    fn value(&self, column: usize) -> Result<Value>;

    /// Character stream of a CLOB column in the current row; `None` for NULL
    fn character_stream(&mut self, column: usize) -> Result<Option<CharacterStream>>;
}

/// A temporary large object allocated on a connection
#[async_trait]
pub trait LargeObject: Send + Sync {
    /// Write `chunk` starting at the 1-based character `position`
    async fn write_at(&self, position: u64, chunk: &str) -> Result<()>;

    /// Release the server-side resources; further writes fail
    fn free(&self) -> Result<()>;

    /// Whether this is a national character set object
    fn is_national(&self) -> bool;
}
