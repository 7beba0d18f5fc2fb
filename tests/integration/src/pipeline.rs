//! End-to-end pipelining over real TCP connections.

use std::time::Duration;

use bytes::Bytes;
use cinder_pipeline::{
    commands, decode, Command, CommandArgs, DrainMode, Frame, Pipeline, PipelineConfig, PipelineError,
    PipelineState, ReplyError, TcpConfig, TcpConnector,
};

use crate::helpers::{init_tracing, router, TestNode};

fn bulk(s: &str) -> Option<Bytes> {
    Some(Bytes::copy_from_slice(s.as_bytes()))
}

#[tokio::test]
async fn batch_across_three_nodes() {
    init_tracing();
    let nodes = [TestNode::start().await, TestNode::start().await, TestNode::start().await];
    nodes[1].seed("1:name", "alice");
    let addrs = nodes.iter().map(|n| n.addr).collect();
    let mut p = Pipeline::new(router(addrs), TcpConnector::default());

    let set = p.submit(commands::set("0:a", "x")).await.unwrap();
    let name = p.submit(commands::get("1:name")).await.unwrap();
    let mut hits = Vec::new();
    for _ in 0..3 {
        hits.push(p.submit(commands::incr("2:hits")).await.unwrap());
    }
    let get = p.submit(commands::get("0:a")).await.unwrap();
    let missing = p.submit(commands::exists("1:nope")).await.unwrap();

    assert_eq!(p.node_count(), 3);
    assert_eq!(p.pending(), 7);
    p.close().await.unwrap();

    assert!(set.get().is_ok());
    assert_eq!(name.get().unwrap(), &bulk("alice"));
    let counts: Vec<i64> = hits.iter().map(|d| *d.get().unwrap()).collect();
    assert_eq!(counts, vec![1, 2, 3]);
    assert_eq!(get.get().unwrap(), &bulk("x"));
    assert!(!*missing.get().unwrap());

    // one connection per node, however many commands it received
    for node in &nodes {
        assert_eq!(node.connections(), 1);
    }
    assert_eq!(nodes[2].requests(), 3);
}

#[tokio::test]
async fn large_batch_on_one_node_stays_in_order() {
    init_tracing();
    let node = TestNode::start().await;
    let mut p = Pipeline::new(router(vec![node.addr]), TcpConnector::default());

    let mut deferred = Vec::new();
    for _ in 0..2_000 {
        deferred.push(p.submit(commands::incr("0:counter")).await.unwrap());
    }
    let report = p.sync().await;
    assert_eq!(report.replies_read, 2_000);
    assert!(report.is_clean());

    for (i, d) in deferred.iter().enumerate() {
        assert_eq!(*d.get().unwrap(), i as i64 + 1);
    }
    p.close().await.unwrap();
    assert_eq!(node.value("0:counter"), bulk("2000"));
}

#[tokio::test]
async fn large_values_survive_split_reads() {
    init_tracing();
    let node = TestNode::start().await;
    let config = TcpConfig {
        read_buffer_size: 512,
        ..TcpConfig::default()
    };
    let mut p = Pipeline::new(router(vec![node.addr]), TcpConnector::new(config));

    let big = "v".repeat(256 * 1024);
    p.submit(commands::set("0:big", Bytes::from(big.clone())))
        .await
        .unwrap();
    let got = p.submit(commands::get("0:big")).await.unwrap();
    let tail = p.submit(commands::get("0:other")).await.unwrap();
    p.close().await.unwrap();

    assert_eq!(got.get().unwrap().as_ref().map(|b| b.len()), Some(big.len()));
    assert_eq!(tail.get().unwrap(), &None);
}

#[tokio::test]
async fn concurrent_drain_gives_the_same_answers() {
    init_tracing();
    async fn run(mode: DrainMode) -> Vec<i64> {
        let nodes = [TestNode::start().await, TestNode::start().await];
        let addrs = nodes.iter().map(|n| n.addr).collect();
        let config = PipelineConfig {
            drain_mode: mode,
            ..PipelineConfig::default()
        };
        let mut p = Pipeline::with_config(router(addrs), TcpConnector::default(), config);

        let mut ds = Vec::new();
        for key in ["0:a", "1:a", "0:a", "1:b", "1:a", "0:a"] {
            ds.push(p.submit(commands::incr(key)).await.unwrap());
        }
        p.close().await.unwrap();
        ds.iter().map(|d| *d.get().unwrap()).collect()
    }

    let sequential = run(DrainMode::Sequential).await;
    assert_eq!(sequential, vec![1, 1, 2, 1, 2, 3]);
    assert_eq!(run(DrainMode::Concurrent).await, sequential);
}

#[tokio::test]
async fn config_loaded_from_toml() {
    init_tracing();
    let node = TestNode::start().await;
    let config = PipelineConfig::from_toml_str(
        r#"
        read_timeout = "2s"
        drain_mode = "concurrent"
        initial_queue_capacity = 4
        "#,
    )
    .unwrap();
    assert_eq!(config.read_timeout, Some(Duration::from_secs(2)));

    let mut p = Pipeline::with_config(router(vec![node.addr]), TcpConnector::default(), config);
    let d = p.submit(commands::set("0:k", "v")).await.unwrap();
    p.close().await.unwrap();
    assert!(d.get().is_ok());
    assert_eq!(p.config().drain_mode, DrainMode::Concurrent);
}

#[tokio::test]
async fn error_replies_and_decode_failures_stay_local() {
    init_tracing();
    let node = TestNode::start().await;
    node.seed("0:word", "hello");
    let mut p = Pipeline::new(router(vec![node.addr]), TcpConnector::default());

    let before = p.submit(commands::incr("0:n")).await.unwrap();
    let server_err = p.submit(commands::incr("0:word")).await.unwrap();
    let unknown = p
        .submit(Command::raw(CommandArgs::new("FLY").key("0:x")))
        .await
        .unwrap();
    let wrong_type = p
        .submit(Command::new(CommandArgs::new("GET").key("0:word"), decode::integer))
        .await
        .unwrap();
    let after = p.submit(commands::incr("0:n")).await.unwrap();

    let report = p.sync().await;
    assert!(report.is_clean());
    assert_eq!(*before.get().unwrap(), 1);
    assert!(matches!(server_err.get(), Err(ReplyError::Server(_))));
    // a raw command sees the server's error as a server error, not a frame
    assert!(matches!(unknown.get(), Err(ReplyError::Server(msg)) if msg.contains("unknown command")));
    assert!(matches!(wrong_type.get(), Err(ReplyError::Decode(_))));
    assert_eq!(*after.get().unwrap(), 2);
    p.close().await.unwrap();
}

#[tokio::test]
async fn raw_frames_pass_through() {
    init_tracing();
    let node = TestNode::start().await;
    let mut p = Pipeline::new(router(vec![node.addr]), TcpConnector::default());
    let d = p
        .submit(Command::raw(CommandArgs::new("SET").key("0:k").arg("v")))
        .await
        .unwrap();
    p.close().await.unwrap();
    assert_eq!(d.get().unwrap(), &Frame::Simple("OK".into()));
}

#[tokio::test]
async fn pipeline_is_single_use() {
    init_tracing();
    let node = TestNode::start().await;
    let mut p = Pipeline::new(router(vec![node.addr]), TcpConnector::default());
    p.submit(commands::set("0:k", "v")).await.unwrap();

    p.sync().await;
    assert_eq!(p.state(), PipelineState::Synced);
    assert!(matches!(
        p.submit(commands::get("0:k")).await,
        Err(PipelineError::AlreadySynced)
    ));

    p.close().await.unwrap();
    assert!(matches!(
        p.submit(commands::get("0:k")).await,
        Err(PipelineError::Closed)
    ));
    assert_eq!(node.requests(), 1);
}

#[tokio::test]
async fn close_hangs_up_every_connection() {
    init_tracing();
    let nodes = [TestNode::start().await, TestNode::start().await];
    let addrs = nodes.iter().map(|n| n.addr).collect();
    let mut p = Pipeline::new(router(addrs), TcpConnector::default());
    p.submit(commands::get("0:a")).await.unwrap();
    p.submit(commands::get("1:a")).await.unwrap();

    p.close().await.unwrap();
    p.close().await.unwrap();
    for node in &nodes {
        node.wait_for_closed(1).await;
    }
}
