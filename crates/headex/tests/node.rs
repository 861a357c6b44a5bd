//! Node wiring and head catch-up.

use std::time::Duration;

use anyhow::Result;
use headex::p2p::{Host, MemoryHost, MemoryNetwork, PeerId};
use headex::store::{MemoryStore, SqliteStore, Store};
use headex::{ExchangeConfig, Node, NodeConfig, MAX_HEADERS_PER_REQUEST};
use headex_testkit::create_store;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn config_for(peers: &[&MemoryHost]) -> NodeConfig {
    NodeConfig {
        network: "private".into(),
        trusted_peers: peers.iter().map(|h| h.local_peer_id()).collect(),
        exchange: ExchangeConfig {
            request_timeout: Duration::from_secs(5),
        },
    }
}

#[tokio::test]
async fn sync_empty_node_from_peer() -> Result<()> {
    init_tracing();
    let network = MemoryNetwork::new();
    let hosts = network.full_mesh(2).await;

    let source = Node::new(create_store(20), hosts[0].clone(), NodeConfig::default());
    source.start().await?;

    let dir = tempfile::tempdir()?;
    let store = SqliteStore::open(dir.path().join("headers.db"))?;
    let sink = Node::new(store, hosts[1].clone(), config_for(&[&hosts[0]]));
    sink.start().await?;

    assert_eq!(sink.sync_to_head().await?, 20);
    assert_eq!(sink.store().height(), 20);
    assert_eq!(sink.store().head().await?, source.store().head().await?);

    // Nothing left to fetch.
    assert_eq!(sink.sync_to_head().await?, 0);

    sink.stop().await?;
    source.stop().await?;
    Ok(())
}

#[tokio::test]
async fn sync_spans_multiple_requests() -> Result<()> {
    init_tracing();
    let network = MemoryNetwork::new();
    let hosts = network.full_mesh(2).await;
    let total = 2 * MAX_HEADERS_PER_REQUEST as usize + 37;

    let source = Node::new(create_store(total), hosts[0].clone(), NodeConfig::default());
    source.start().await?;

    let sink = Node::new(MemoryStore::new(), hosts[1].clone(), config_for(&[&hosts[0]]));
    assert_eq!(sink.sync_to_head().await?, total);

    let all = sink.store().get_range_by_height(1, total as u64 + 1).await?;
    assert!(all.windows(2).all(|w| w[1].last_header_hash() == Some(&w[0].hash())));
    Ok(())
}

#[tokio::test]
async fn sync_resumes_from_local_head() -> Result<()> {
    init_tracing();
    let network = MemoryNetwork::new();
    let hosts = network.full_mesh(2).await;

    let source = Node::new(create_store(12), hosts[0].clone(), NodeConfig::default());
    source.start().await?;

    let sink = Node::new(create_store(5), hosts[1].clone(), config_for(&[&hosts[0]]));
    assert_eq!(sink.sync_to_head().await?, 7);
    assert_eq!(sink.store().height(), 12);
    Ok(())
}

#[tokio::test]
async fn sync_without_reachable_peers_fails() -> Result<()> {
    init_tracing();
    let network = MemoryNetwork::new();
    let host = network.create_host(PeerId::random()).await;

    let mut config = config_for(&[]);
    config.trusted_peers.push(PeerId::random());
    let node = Node::new(MemoryStore::new(), host, config);

    assert!(node.sync_to_head().await.is_err());
    assert_eq!(node.store().height(), 0);
    Ok(())
}

#[tokio::test]
async fn node_lifecycle() -> Result<()> {
    let network = MemoryNetwork::new();
    let host = network.create_host(PeerId::random()).await;
    let node = Node::new(MemoryStore::new(), host, NodeConfig::default());

    node.start().await?;
    assert!(node.start().await.is_err());
    node.stop().await?;
    assert!(node.stop().await.is_err());
    Ok(())
}

#[test]
fn load_config_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("node.json");
    let peer = PeerId::random();
    std::fs::write(
        &path,
        format!(r#"{{"network": "private", "trusted_peers": ["{}"]}}"#, peer),
    )?;

    let config = NodeConfig::load(&path)?;
    assert_eq!(config.trusted_peers, vec![peer]);
    assert_eq!(config.exchange, ExchangeConfig::default());
    assert!(NodeConfig::load(dir.path().join("missing.json")).is_err());
    Ok(())
}
