//! # Headex
//!
//! Header exchange for block headers: fetch extended headers from trusted
//! peers and serve your own.
//!
//! ## Overview
//!
//! - **Headers**: signed, hashable, heightable records ([`core`])
//! - **Stores**: where headers live ([`store`])
//! - **Exchange**: the request/response protocol and head reconciliation ([`p2p`])
//! - **Node**: all of the above wired together ([`Node`])
//!
//! ## Usage
//!
//! ```rust,no_run
//! use headex::{Node, NodeConfig};
//! use headex::p2p::{MemoryNetwork, PeerId};
//! use headex::store::SqliteStore;
//!
//! async fn example() -> headex::Result<()> {
//!     let network = MemoryNetwork::new();
//!     let host = network.create_host(PeerId::random()).await;
//!
//!     let config = NodeConfig::load("node.json")?;
//!     let node = Node::new(SqliteStore::open("headers.db")?, host, config);
//!
//!     node.start().await?;
//!     let appended = node.sync_to_head().await?;
//!     println!("fetched {} headers", appended);
//!     node.stop().await
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `headex::core` - Extended headers, hashes, canonical encoding
//! - `headex::store` - Storage abstraction, SQLite and in-memory stores
//! - `headex::p2p` - Exchange client and server, transport, reconciliation

pub mod config;
pub mod error;
pub mod node;

// Re-export component crates
pub use headex_core as core;
pub use headex_p2p as p2p;
pub use headex_store as store;

pub use config::NodeConfig;
pub use error::{NodeError, Result};
pub use node::Node;

// Re-export commonly used types
pub use headex_core::{ExtendedHeader, HeaderBuilder, HeaderHash, Keypair};
pub use headex_p2p::{
    best_head, Exchange, ExchangeConfig, ExchangeError, ExchangeServer, PeerId, ProtocolId,
    MAX_HEADERS_PER_REQUEST,
};
pub use headex_store::{MemoryStore, SqliteStore, Store};
