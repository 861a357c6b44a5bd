//! # Headex Store
//!
//! Storage abstraction for extended headers. Provides the [`Store`] trait
//! consumed by the exchange server and the node facade, with SQLite and
//! in-memory implementations.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage
//!
//! ## Usage
//!
//! ```rust,no_run
//! use headex_store::{SqliteStore, Store};
//!
//! async fn example() -> headex_store::Result<()> {
//!     let store = SqliteStore::open("headers.db")?;
//!     println!("local head at height {}", store.height());
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Contiguous ranges**: range reads are all-or-nothing
//! - **Idempotent appends**: appending a known header is a no-op
//! - **One header per height**: a different header at an occupied height is a `Conflict`

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::Store;
