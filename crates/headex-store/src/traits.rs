//! Store trait: the abstract interface for header persistence.
//!
//! The exchange server reads from a store concurrently; the node facade
//! appends to it. Implementations include SQLite (persistent) and in-memory.

use async_trait::async_trait;
use headex_core::{ExtendedHeader, HeaderHash};

use crate::error::Result;

/// Async interface for header persistence.
///
/// Heights start at 1. A store is contiguous from its first header up to
/// [`Store::height`]; reads of anything outside that span fail with
/// [`StoreError::NotFound`](crate::StoreError::NotFound).
///
/// Implementations must be safe for concurrent reads.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Seed an empty store with its first header.
    ///
    /// Fails with `AlreadyInitialized` if the store holds any header.
    async fn init(&self, initial: &ExtendedHeader) -> Result<()>;

    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// The header at [`Store::height`].
    async fn head(&self) -> Result<ExtendedHeader>;

    /// The highest stored height, or 0 for an empty store.
    fn height(&self) -> u64;

    async fn get(&self, hash: &HeaderHash) -> Result<ExtendedHeader>;

    async fn get_by_height(&self, height: u64) -> Result<ExtendedHeader>;

    /// Headers for the half-open interval `[from, to)`, in ascending order.
    ///
    /// All or nothing: a range whose tail is beyond the head, or which
    /// crosses a hole, fails with `NotFound`. `to <= from` is `InvalidRange`.
    async fn get_range_by_height(&self, from: u64, to: u64) -> Result<Vec<ExtendedHeader>>;

    async fn has(&self, hash: &HeaderHash) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Add headers, skipping any already stored.
    ///
    /// Returns how many were new. The head height advances to the highest
    /// height appended.
    async fn append(&self, headers: &[ExtendedHeader]) -> Result<usize>;
}
