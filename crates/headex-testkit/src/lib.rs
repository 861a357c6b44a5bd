//! # Headex Testkit
//!
//! Testing utilities for headex.
//!
//! This crate provides:
//!
//! - **Fixtures**: a [`TestSuite`] that produces a chain of signed headers,
//!   and [`create_store`] for a pre-filled [`MemoryStore`](headex_store::MemoryStore)
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Test Fixtures
//!
//! ```rust
//! use headex_testkit::TestSuite;
//!
//! let mut suite = TestSuite::new();
//! let headers = suite.generate(5);
//! assert_eq!(headers[4].height(), 5);
//! assert_eq!(headers[4].last_header_hash(), Some(&headers[3].hash()));
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use headex_testkit::generators::{header_from_params, HeaderParams};
//!
//! proptest! {
//!     #[test]
//!     fn hash_is_deterministic(params: HeaderParams) {
//!         prop_assert_eq!(header_from_params(&params).hash(), header_from_params(&params).hash());
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{create_store, TestSuite};
pub use generators::{header_from_params, HeaderParams};
