//! procall invoker - stored procedure parameter marshalling and result serialization
//!
//! Turns loosely typed string attributes into a typed stored procedure call,
//! executes it over a pooled connection and writes every result set, update
//! count and output parameter into one JSON document.
//!
//! Hosts install logging once at startup with [`logging::init`]; the returned
//! guard must live as long as file logging is wanted:
//!
//! ```no_run
//! use procall_invoker::logging::{self, LoggingConfig};
//!
//! let _logging = logging::init(LoggingConfig::production())?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod binder;
pub mod config;
mod error;
mod invoker;
pub mod lob;
pub mod logging;
pub mod parameter;
pub mod serializer;
pub mod time_format;

pub use binder::{Conversion, TypeCoercionBinder, conversion_for};
pub use config::InvokerConfig;
pub use error::{InvokeError, Result};
pub use invoker::{
    EXECUTE_DURATION_ATTRIBUTE, InvocationOutcome, InvocationRequest, OUTPUT_COUNT_ATTRIBUTE,
    RESULT_SET_COUNT_ATTRIBUTE, ROW_COUNT_ATTRIBUTE, STATEMENT_ATTRIBUTE, StoredProcedureInvoker,
};
pub use lob::{LOB_CHUNK_CHARS, LargeObjectScope};
pub use parameter::{
    AttributeParser, DEFAULT_PARAMETER_PREFIX, Direction, ParameterDescriptor, ParameterSet,
};
pub use serializer::{DocumentWriter, JsonDocumentWriter, ResultSerializer, ResultTally};
pub use time_format::{FormatError, TemporalZone, TimeFormat};
