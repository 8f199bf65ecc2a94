use serde::Serialize;

/// Counts of what one invocation emitted into its document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResultTally {
    /// Non-empty result sets written
    pub result_sets: u64,
    /// Rows written across all result sets
    pub rows: u64,
    /// Output fields written
    pub outputs: u64,
}

impl ResultTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn record_result_set(&mut self) {
        self.result_sets += 1;
    }

    pub fn record_row(&mut self) {
        self.rows += 1;
    }

    pub fn record_output(&mut self) {
        self.outputs += 1;
    }

    /// Whether nothing was emitted
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
