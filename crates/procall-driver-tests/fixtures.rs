//! Scripted in-memory driver used by the procall test suites.
//!
//! A [`ScriptedConnection`] is configured up front with the outcome sequence a
//! routine call should produce. Every statement prepared on it (and on any
//! connection cloned from it) reports into one shared [`CallLog`], so tests
//! can assert on bindings, output registrations, large object lifecycles and
//! statement cleanup after the invocation finished.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use procall_connection::ConnectionFactory;
use procall_core::{
    CallArgument, CallOutcome, CallableStatement, CharacterStream, ColumnMeta, Connection,
    LargeObject, ProcallError, QueryResult, Result, ResultSetCursor, SqlType, Value,
};

/// One scripted step of a routine's outcome sequence
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    /// DML update count
    UpdateCount(u64),
    /// Materialized result set
    ResultSet(QueryResult),
}

/// Everything the scripted driver observed, shared by all statements of a connection
#[derive(Default)]
pub struct CallLog {
    /// SQL text of every prepared call
    pub prepared: Vec<String>,
    /// Query timeouts applied to statements
    pub query_timeouts: Vec<Duration>,
    /// Arguments bound by placeholder index (last bind wins)
    pub bindings: BTreeMap<u32, CallArgument>,
    /// Output registrations by placeholder index
    pub registered: BTreeMap<u32, SqlType>,
    /// Character large objects allocated on the connection
    pub clobs: Vec<Arc<ScriptedClob>>,
    /// Number of completed `execute` calls
    pub executions: usize,
    /// Number of statements closed
    pub statements_closed: usize,
}

impl CallLog {
    /// Text currently held by the large object bound at `index`, if any
    pub fn bound_clob_text(&self, index: u32) -> Option<String> {
        match self.bindings.get(&index)? {
            CallArgument::LargeObject(lob) => self.find_clob(lob).map(|c| c.content()),
            _ => None,
        }
    }

    /// Whether every allocated large object has been freed
    pub fn all_clobs_freed(&self) -> bool {
        self.clobs.iter().all(|c| c.is_freed())
    }

    fn find_clob(&self, lob: &Arc<dyn LargeObject>) -> Option<&Arc<ScriptedClob>> {
        self.clobs
            .iter()
            .find(|c| std::ptr::addr_eq(Arc::as_ptr(c), Arc::as_ptr(lob)))
    }
}

/// A connection whose routine outcomes are scripted by the test
#[derive(Clone)]
pub struct ScriptedConnection {
    driver: String,
    outcomes: Vec<ScriptedOutcome>,
    outputs: HashMap<u32, Value>,
    execute_delay: Option<Duration>,
    execute_failure: Option<String>,
    clob_allocation_failure: bool,
    clob_free_failure: bool,
    log: Arc<Mutex<CallLog>>,
    closed: Arc<AtomicBool>,
}

impl ScriptedConnection {
    /// Create a connection whose calls produce no outcomes
    pub fn new() -> Self {
        Self {
            driver: "scripted".to_string(),
            outcomes: Vec::new(),
            outputs: HashMap::new(),
            execute_delay: None,
            execute_failure: None,
            clob_allocation_failure: false,
            clob_free_failure: false,
            log: Arc::new(Mutex::new(CallLog::default())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Append an update count to the outcome sequence
    pub fn with_update_count(mut self, count: u64) -> Self {
        self.outcomes.push(ScriptedOutcome::UpdateCount(count));
        self
    }

    /// Append a result set to the outcome sequence
    pub fn with_result_set(mut self, result: QueryResult) -> Self {
        self.outcomes.push(ScriptedOutcome::ResultSet(result));
        self
    }

    /// Script the value an output slot reports
    ///
    /// Registered slots without a scripted value echo the argument bound at
    /// the same index (or NULL when nothing was bound).
    pub fn with_output(mut self, index: u32, value: Value) -> Self {
        self.outputs.insert(index, value);
        self
    }

    /// Make `execute` take at least `delay`
    pub fn with_execute_delay(mut self, delay: Duration) -> Self {
        self.execute_delay = Some(delay);
        self
    }

    /// Make `execute` fail with a driver error
    pub fn with_execute_failure(mut self, message: impl Into<String>) -> Self {
        self.execute_failure = Some(message.into());
        self
    }

    /// Make every large object allocation fail
    pub fn with_clob_allocation_failure(mut self) -> Self {
        self.clob_allocation_failure = true;
        self
    }

    /// Make freeing large objects report an error
    pub fn with_clob_free_failure(mut self) -> Self {
        self.clob_free_failure = true;
        self
    }

    /// Shared log of everything this connection observed
    pub fn log(&self) -> Arc<Mutex<CallLog>> {
        self.log.clone()
    }
}

impl Default for ScriptedConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connection for ScriptedConnection {
    fn driver_name(&self) -> &str {
        &self.driver
    }

    async fn prepare_call(&self, sql: &str) -> Result<Box<dyn CallableStatement>> {
        if self.is_closed() {
            return Err(ProcallError::Connection("connection is closed".into()));
        }
        self.log.lock().prepared.push(sql.to_string());
        Ok(Box::new(ScriptedStatement {
            outcomes: self.outcomes.iter().cloned().collect(),
            outputs: self.outputs.clone(),
            execute_delay: self.execute_delay,
            execute_failure: self.execute_failure.clone(),
            bound: HashMap::new(),
            registered: HashMap::new(),
            executed: false,
            log: self.log.clone(),
        }))
    }

    async fn create_clob(&self, national: bool) -> Result<Arc<dyn LargeObject>> {
        if self.clob_allocation_failure {
            return Err(ProcallError::LargeObject(
                "temporary lob allocation refused".into(),
            ));
        }
        let clob = Arc::new(ScriptedClob {
            national,
            fail_free: self.clob_free_failure,
            content: Mutex::new(String::new()),
            writes: Mutex::new(Vec::new()),
            freed: AtomicBool::new(false),
        });
        self.log.lock().clobs.push(clob.clone());
        Ok(clob)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Factory lending clones of one scripted connection to a pool
pub struct ScriptedConnectionFactory {
    template: ScriptedConnection,
}

impl ScriptedConnectionFactory {
    /// Create a factory that hands out clones of `template`
    pub fn new(template: ScriptedConnection) -> Self {
        Self { template }
    }
}

#[async_trait]
impl ConnectionFactory for ScriptedConnectionFactory {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        Ok(Arc::new(self.template.clone()))
    }
}

struct ScriptedStatement {
    outcomes: VecDeque<ScriptedOutcome>,
    outputs: HashMap<u32, Value>,
    execute_delay: Option<Duration>,
    execute_failure: Option<String>,
    bound: HashMap<u32, CallArgument>,
    registered: HashMap<u32, SqlType>,
    executed: bool,
    log: Arc<Mutex<CallLog>>,
}

impl ScriptedStatement {
    fn resolve_output(&self, index: u32) -> Result<Value> {
        if !self.executed {
            return Err(ProcallError::Statement("statement not executed".into()));
        }
        if !self.registered.contains_key(&index) {
            return Err(ProcallError::Statement(format!(
                "parameter {} is not registered as an output",
                index
            )));
        }
        if let Some(value) = self.outputs.get(&index) {
            return Ok(value.clone());
        }
        let echoed = match self.bound.get(&index) {
            None | Some(CallArgument::Null(_)) => Value::Null,
            Some(CallArgument::Value(value)) => value.clone(),
            Some(CallArgument::Typed { text, .. }) => Value::String(text.clone()),
            Some(CallArgument::LargeObject(lob)) => self
                .log
                .lock()
                .find_clob(lob)
                .map(|c| Value::String(c.content()))
                .unwrap_or(Value::Null),
        };
        Ok(echoed)
    }
}

#[async_trait]
impl CallableStatement for ScriptedStatement {
    fn set_query_timeout(&mut self, timeout: Duration) {
        self.log.lock().query_timeouts.push(timeout);
    }

    fn bind(&mut self, index: u32, argument: CallArgument) -> Result<()> {
        if index == 0 {
            return Err(ProcallError::Statement("parameter index starts at 1".into()));
        }
        self.log.lock().bindings.insert(index, argument.clone());
        self.bound.insert(index, argument);
        Ok(())
    }

    fn register_output(&mut self, index: u32, sql_type: SqlType) -> Result<()> {
        if index == 0 {
            return Err(ProcallError::Statement("parameter index starts at 1".into()));
        }
        self.log.lock().registered.insert(index, sql_type);
        self.registered.insert(index, sql_type);
        Ok(())
    }

    async fn execute(&mut self) -> Result<()> {
        if let Some(delay) = self.execute_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.execute_failure {
            return Err(ProcallError::Driver(message.clone()));
        }
        self.executed = true;
        self.log.lock().executions += 1;
        Ok(())
    }

    async fn next_outcome(&mut self) -> Result<Option<CallOutcome>> {
        if !self.executed {
            return Err(ProcallError::Statement("statement not executed".into()));
        }
        Ok(self.outcomes.pop_front().map(|outcome| match outcome {
            ScriptedOutcome::UpdateCount(n) => CallOutcome::UpdateCount(n),
            ScriptedOutcome::ResultSet(result) => CallOutcome::ResultSet(Box::new(
                ScriptedCursor {
                    result,
                    position: None,
                },
            )),
        }))
    }

    fn output_value(&mut self, index: u32) -> Result<Value> {
        self.resolve_output(index)
    }

    fn output_stream(&mut self, index: u32) -> Result<Option<CharacterStream>> {
        Ok(into_stream(self.resolve_output(index)?))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.log.lock().statements_closed += 1;
        Ok(())
    }
}

struct ScriptedCursor {
    result: QueryResult,
    position: Option<usize>,
}

impl ScriptedCursor {
    fn current(&self, column: usize) -> Result<Value> {
        let row = self
            .position
            .and_then(|p| self.result.rows.get(p))
            .ok_or_else(|| ProcallError::Statement("cursor is not on a row".into()))?;
        row.get(column)
            .cloned()
            .ok_or_else(|| ProcallError::NotFound(format!("column {}", column)))
    }
}

#[async_trait]
impl ResultSetCursor for ScriptedCursor {
    fn columns(&self) -> &[ColumnMeta] {
        &self.result.columns
    }

    async fn advance(&mut self) -> Result<bool> {
        let next = self.position.map_or(0, |p| p + 1);
        self.position = Some(next);
        Ok(next < self.result.rows.len())
    }

    fn value(&self, column: usize) -> Result<Value> {
        self.current(column)
    }

    fn character_stream(&mut self, column: usize) -> Result<Option<CharacterStream>> {
        Ok(into_stream(self.current(column)?))
    }
}

fn into_stream(value: Value) -> Option<CharacterStream> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(Box::new(Cursor::new(text.into_bytes()))),
        other => Some(Box::new(Cursor::new(other.to_string().into_bytes()))),
    }
}

/// In-memory character large object
pub struct ScriptedClob {
    national: bool,
    fail_free: bool,
    content: Mutex<String>,
    writes: Mutex<Vec<(u64, usize)>>,
    freed: AtomicBool,
}

impl ScriptedClob {
    /// Text written so far
    pub fn content(&self) -> String {
        self.content.lock().clone()
    }

    /// Each write as (1-based position, chunk length in characters)
    pub fn writes(&self) -> Vec<(u64, usize)> {
        self.writes.lock().clone()
    }

    /// Whether `free` has been called
    pub fn is_freed(&self) -> bool {
        self.freed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LargeObject for ScriptedClob {
    async fn write_at(&self, position: u64, chunk: &str) -> Result<()> {
        if self.is_freed() {
            return Err(ProcallError::LargeObject("write to freed lob".into()));
        }
        let mut content = self.content.lock();
        let expected = content.chars().count() as u64 + 1;
        if position != expected {
            return Err(ProcallError::LargeObject(format!(
                "write at position {} but next position is {}",
                position, expected
            )));
        }
        content.push_str(chunk);
        self.writes.lock().push((position, chunk.chars().count()));
        Ok(())
    }

    fn free(&self) -> Result<()> {
        self.freed.store(true, Ordering::SeqCst);
        if self.fail_free {
            return Err(ProcallError::LargeObject("lob free failed".into()));
        }
        Ok(())
    }

    fn is_national(&self) -> bool {
        self.national
    }
}

/// Initialize logging for tests if not already initialized
///
/// This sets up tracing with the test writer so output is captured per test.
pub fn initialize_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("procall=debug,procall_invoker=debug"));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
