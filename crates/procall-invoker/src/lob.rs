//! Scoped character large object allocation

use std::sync::Arc;

use procall_core::{Connection, LargeObject, Result};

/// Characters copied per `write_at` call
pub const LOB_CHUNK_CHARS: usize = 256;

/// Owns every large object allocated during one invocation
///
/// Handles are freed by [`LargeObjectScope::release`], which reports the
/// first failure, or best-effort when the scope is dropped unreleased.
pub struct LargeObjectScope<'c> {
    connection: &'c dyn Connection,
    handles: Vec<Arc<dyn LargeObject>>,
}

impl<'c> LargeObjectScope<'c> {
    pub fn new(connection: &'c dyn Connection) -> Self {
        Self {
            connection,
            handles: Vec::new(),
        }
    }

    /// Allocate a handle and copy `text` into it; absent text allocates nothing
    pub async fn allocate(
        &mut self,
        text: Option<&str>,
        national: bool,
    ) -> Result<Option<Arc<dyn LargeObject>>> {
        let Some(text) = text else {
            return Ok(None);
        };

        let handle = self.connection.create_clob(national).await?;
        self.handles.push(handle.clone());

        let mut position: u64 = 1;
        let mut chunks = 0usize;
        for chunk in chunk_chars(text, LOB_CHUNK_CHARS) {
            handle.write_at(position, chunk).await?;
            position += chunk.chars().count() as u64;
            chunks += 1;
        }

        tracing::debug!(
            national,
            chars = position - 1,
            chunks,
            "filled character large object"
        );
        Ok(Some(handle))
    }

    /// Number of handles allocated in this scope
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Free every handle, returning the first failure after attempting all
    pub fn release(mut self) -> Result<()> {
        let mut first_error = None;
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.free() {
                tracing::warn!(error = %e, "failed to free large object");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for LargeObjectScope<'_> {
    fn drop(&mut self) {
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.free() {
                tracing::warn!(error = %e, "failed to free large object during cleanup");
            }
        }
    }
}

/// Split `text` into slices of at most `size` characters
fn chunk_chars(text: &str, size: usize) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let end = rest
            .char_indices()
            .nth(size)
            .map_or(rest.len(), |(i, _)| i);
        let (chunk, tail) = rest.split_at(end);
        rest = tail;
        Some(chunk)
    })
}

#[cfg(test)]
mod tests;
