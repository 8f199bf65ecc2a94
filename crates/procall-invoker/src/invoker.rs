//! The invocation pipeline
//!
//! One [`StoredProcedureInvoker::invoke`] call resolves the statement, parses
//! the parameters, leases a connection, binds, executes under the configured
//! timeout and serializes the outcome. The statement is closed, large objects
//! are freed and the connection goes back to the pool on every path.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use procall_connection::{ConnectionFactory, ConnectionPool};
use procall_core::{CallableStatement, Connection, ProcallError};

use crate::binder::TypeCoercionBinder;
use crate::config::InvokerConfig;
use crate::lob::LargeObjectScope;
use crate::parameter::{AttributeParser, ParameterSet};
use crate::serializer::{JsonDocumentWriter, ResultSerializer, ResultTally};
use crate::{InvokeError, Result};

/// Request attribute carrying the call statement when none is configured
pub const STATEMENT_ATTRIBUTE: &str = "stored.procedure.statement";

pub const EXECUTE_DURATION_ATTRIBUTE: &str = "procedure.execute.duration";
pub const RESULT_SET_COUNT_ATTRIBUTE: &str = "procedure.return.resultset.count";
pub const ROW_COUNT_ATTRIBUTE: &str = "procedure.return.row.count";
pub const OUTPUT_COUNT_ATTRIBUTE: &str = "procedure.return.output.count";

/// Per-record input of one invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvocationRequest {
    pub attributes: HashMap<String, String>,
}

impl InvocationRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_attributes(attributes: HashMap<String, String>) -> Self {
        Self { attributes }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Result of a successful invocation
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationOutcome {
    /// UTF-8 JSON document
    pub document: Vec<u8>,
    pub tally: ResultTally,
    /// Time spent executing the call, in milliseconds
    pub duration_ms: u64,
}

impl InvocationOutcome {
    /// The document as text
    pub fn document_text(&self) -> &str {
        // The JSON writer only ever emits UTF-8
        std::str::from_utf8(&self.document).unwrap_or_default()
    }

    /// Metadata attributes describing the outcome
    pub fn attributes(&self) -> HashMap<String, String> {
        HashMap::from([
            (
                EXECUTE_DURATION_ATTRIBUTE.to_string(),
                self.duration_ms.to_string(),
            ),
            (
                RESULT_SET_COUNT_ATTRIBUTE.to_string(),
                self.tally.result_sets.to_string(),
            ),
            (ROW_COUNT_ATTRIBUTE.to_string(), self.tally.rows.to_string()),
            (
                OUTPUT_COUNT_ATTRIBUTE.to_string(),
                self.tally.outputs.to_string(),
            ),
        ])
    }
}

/// Invokes stored routines over pooled connections
pub struct StoredProcedureInvoker {
    config: InvokerConfig,
    parser: AttributeParser,
    binder: TypeCoercionBinder,
    pool: Arc<ConnectionPool>,
}

impl StoredProcedureInvoker {
    /// Create an invoker sharing an existing pool
    pub fn new(config: InvokerConfig, pool: Arc<ConnectionPool>) -> Result<Self> {
        config.validate()?;
        let parser = AttributeParser::new(&config.parameter_prefix)?;
        let binder = TypeCoercionBinder::new(config.time_zone);
        Ok(Self {
            config,
            parser,
            binder,
            pool,
        })
    }

    /// Create an invoker with its own pool built from `config.pool`
    pub fn with_factory<F: ConnectionFactory>(config: InvokerConfig, factory: F) -> Result<Self> {
        config.validate()?;
        let pool = Arc::new(ConnectionPool::new(config.pool.clone(), factory));
        Self::new(config, pool)
    }

    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Reject a setup that can never produce a statement
    ///
    /// Without a configured statement every request must carry one, so an
    /// invoker with no incoming records cannot run.
    pub fn validate_setup(&self, has_incoming: bool) -> Result<()> {
        if self.config.statement().is_none() && !has_incoming {
            return Err(InvokeError::Configuration(format!(
                "no statement is configured and there are no incoming records to supply '{}'",
                STATEMENT_ATTRIBUTE
            )));
        }
        Ok(())
    }

    /// Run one stored routine call
    pub async fn invoke(&self, request: &InvocationRequest) -> Result<InvocationOutcome> {
        let sql = self.resolve_statement(request)?;
        let parameters = self
            .parser
            .parse(&[&self.config.parameters, &request.attributes])?;
        tracing::debug!(
            statement = %sql,
            parameters = parameters.len(),
            "invoking stored procedure"
        );

        let connection = self.pool.get().await.map_err(InvokeError::Connection)?;
        let mut statement = connection
            .prepare_call(&sql)
            .await
            .map_err(InvokeError::Execution)?;

        let result = self
            .run(&*connection, statement.as_mut(), &parameters)
            .await;
        let closed = statement.close().await;

        let outcome = match (result, closed) {
            (Ok(outcome), Ok(())) => outcome,
            (Ok(_), Err(e)) => return Err(InvokeError::Execution(e)),
            (Err(e), closed) => {
                if let Err(close_error) = closed {
                    tracing::warn!(error = %close_error, "failed to close statement after error");
                }
                tracing::debug!(statement = %sql, error = %e, "invocation failed");
                return Err(e);
            }
        };

        tracing::info!(
            statement = %sql,
            duration_ms = outcome.duration_ms,
            result_sets = outcome.tally.result_sets,
            rows = outcome.tally.rows,
            outputs = outcome.tally.outputs,
            "stored procedure invoked"
        );
        Ok(outcome)
    }

    fn resolve_statement(&self, request: &InvocationRequest) -> Result<String> {
        let statement = self.config.statement().or_else(|| {
            request
                .attributes
                .get(STATEMENT_ATTRIBUTE)
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
        });
        statement.map(str::to_string).ok_or_else(|| {
            InvokeError::Configuration(format!(
                "no statement is configured and the request has no '{}' attribute",
                STATEMENT_ATTRIBUTE
            ))
        })
    }

    /// Bind, execute and serialize on a prepared statement
    async fn run(
        &self,
        connection: &dyn Connection,
        statement: &mut dyn CallableStatement,
        parameters: &ParameterSet,
    ) -> Result<InvocationOutcome> {
        let timeout = self.config.timeout();
        if let Some(timeout) = timeout {
            statement.set_query_timeout(timeout);
        }

        let mut lobs = LargeObjectScope::new(connection);
        self.binder.bind(statement, parameters, &mut lobs).await?;

        let started = Instant::now();
        execute(statement, timeout).await?;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let mut writer = JsonDocumentWriter::in_memory();
        let mut tally = ResultTally::new();
        ResultSerializer::new(parameters)
            .serialize(statement, &mut writer, &mut tally)
            .await?;
        let document = writer.finish().map_err(InvokeError::Serialization)?;

        lobs.release().map_err(InvokeError::Execution)?;

        Ok(InvocationOutcome {
            document,
            tally,
            duration_ms,
        })
    }
}

async fn execute(statement: &mut dyn CallableStatement, timeout: Option<Duration>) -> Result<()> {
    let Some(timeout) = timeout else {
        return statement.execute().await.map_err(InvokeError::Execution);
    };
    match tokio::time::timeout(timeout, statement.execute()).await {
        Ok(result) => result.map_err(InvokeError::Execution),
        Err(_) => Err(InvokeError::Execution(ProcallError::Timeout(format!(
            "execution exceeded {}s",
            timeout.as_secs()
        )))),
    }
}
