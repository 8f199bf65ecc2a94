//! Result serialization
//!
//! Drains an executed call into one document:
//!
//! ```json
//! {"Results":[3,[{"ID":1,"NAME":"Tom"}]],"Outputs":{"out-2":42}}
//! ```
//!
//! `Results` holds update counts as bare numbers and non-empty result sets as
//! arrays of row objects keyed by column label. A result set without rows is
//! skipped and not counted. `Outputs` maps every OUT/INOUT slot to its value.
//! Either field is omitted when there is nothing to put in it.

mod json;
mod tally;
mod writer;


use std::io::Read;

use procall_core::{CallOutcome, CallableStatement, CharacterStream, ResultSetCursor, Value};

pub use json::JsonDocumentWriter;
pub use tally::ResultTally;
pub use writer::DocumentWriter;

use crate::parameter::ParameterSet;
use crate::{InvokeError, Result};

/// Top-level field holding update counts and result sets
pub const RESULTS_FIELD: &str = "Results";

/// Top-level field holding output parameter values
pub const OUTPUTS_FIELD: &str = "Outputs";

/// Writes the outcome of one executed call
pub struct ResultSerializer<'p> {
    parameters: &'p ParameterSet,
}

impl<'p> ResultSerializer<'p> {
    /// `parameters` supplies the output slots' names and types
    pub fn new(parameters: &'p ParameterSet) -> Self {
        Self { parameters }
    }

    /// Drain `statement` into `writer`, counting what is emitted into `tally`
    pub async fn serialize(
        &self,
        statement: &mut dyn CallableStatement,
        writer: &mut dyn DocumentWriter,
        tally: &mut ResultTally,
    ) -> Result<()> {
        self.drain(statement, writer, tally)
            .await
            .map_err(InvokeError::Serialization)
    }

    async fn drain(
        &self,
        statement: &mut dyn CallableStatement,
        writer: &mut dyn DocumentWriter,
        tally: &mut ResultTally,
    ) -> procall_core::Result<()> {
        writer.begin_object()?;

        let mut results_open = false;
        while let Some(outcome) = statement.next_outcome().await? {
            if !results_open {
                writer.field_name(RESULTS_FIELD)?;
                writer.begin_array()?;
                results_open = true;
            }
            match outcome {
                CallOutcome::UpdateCount(count) => {
                    tracing::debug!(count, "writing update count");
                    writer.value(&count_value(count))?;
                }
                CallOutcome::ResultSet(mut cursor) => {
                    write_result_set(cursor.as_mut(), writer, tally).await?;
                }
            }
        }
        if results_open {
            writer.end_array()?;
        }

        let mut outputs = self.parameters.outputs().peekable();
        if outputs.peek().is_some() {
            writer.field_name(OUTPUTS_FIELD)?;
            writer.begin_object()?;
            for descriptor in outputs {
                let value = if descriptor.sql_type.is_character_lob() {
                    read_stream(statement.output_stream(descriptor.index)?)?
                } else {
                    statement.output_value(descriptor.index)?
                };
                writer.field(&descriptor.resolved_output_name(), &value)?;
                tally.record_output();
            }
            writer.end_object()?;
        }

        writer.end_object()
    }
}

async fn write_result_set(
    cursor: &mut dyn ResultSetCursor,
    writer: &mut dyn DocumentWriter,
    tally: &mut ResultTally,
) -> procall_core::Result<()> {
    if !cursor.advance().await? {
        tracing::warn!("Empty result set, skipping it");
        return Ok(());
    }

    let columns: Vec<(String, bool)> = cursor
        .columns()
        .iter()
        .map(|c| (c.display_label().to_string(), c.sql_type.is_character_lob()))
        .collect();

    writer.begin_array()?;
    let mut rows = 0u64;
    loop {
        writer.begin_object()?;
        for (i, (label, streamed)) in columns.iter().enumerate() {
            let value = if *streamed {
                read_stream(cursor.character_stream(i)?)?
            } else {
                cursor.value(i)?
            };
            writer.field(label, &value)?;
        }
        writer.end_object()?;
        tally.record_row();
        rows += 1;

        if !cursor.advance().await? {
            break;
        }
    }
    writer.end_array()?;
    tally.record_result_set();

    tracing::debug!(rows, columns = columns.len(), "wrote result set");
    Ok(())
}

/// Materialize a character stream; a missing stream is NULL
fn read_stream(stream: Option<CharacterStream>) -> procall_core::Result<Value> {
    let Some(mut stream) = stream else {
        return Ok(Value::Null);
    };
    let mut text = String::new();
    stream.read_to_string(&mut text)?;
    Ok(Value::String(text))
}

fn count_value(count: u64) -> Value {
    match i64::try_from(count) {
        Ok(n) => Value::Int64(n),
        Err(_) => Value::Decimal(count.to_string()),
    }
}
