//! End-to-end pipeline tests: wiring, backpressure, shutdown and restart.

mod common;

use common::builders::{Script, ScriptedNode};
use common::{collect_i64, init_tracing, wait_until};
use dataflow_rs::pipeline::nodes::{ChannelSink, SequenceSource, Transform};
use dataflow_rs::pipeline::{Capacity, NodeId, PipelineError, PushTimeout, Status};
use dataflow_rs::{Packet, Pipeline};
use serde_json::json;
use serial_test::serial;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

#[test]
#[serial]
fn test_source_transform_sink_in_order() {
    init_tracing();
    let (sink, rx) = ChannelSink::channel("sink");
    let mut pipeline = Pipeline::new("chain");
    pipeline
        .init(|p| {
            let src = p.add(SequenceSource::new("src"), &json!({"count": 200}))?;
            let relay = p.add(
                Transform::passthrough("relay"),
                &json!({"port": "seq", "poll_ms": 1}),
            )?;
            let dst = p.add(sink, &json!({"port": "seq", "poll_ms": 1}))?;
            // Tiny bounds force the source to block on backpressure.
            assert_eq!(p.connect_with_capacity(src, relay, Capacity::Bounded(2))?, 1);
            assert_eq!(p.connect_with_capacity(relay, dst, Capacity::Bounded(2))?, 1);
            Ok(())
        })
        .unwrap();

    pipeline.start().unwrap();
    let values = collect_i64(&rx, 200);
    pipeline.stop().unwrap();

    assert_eq!(values, (0..200).collect::<Vec<i64>>());
    assert!(pipeline
        .last_run_results()
        .iter()
        .all(|exit| exit.status == Status::Success));
}

#[test]
#[serial]
fn test_stop_releases_blocked_producer() {
    let mut pipeline = Pipeline::new("stuck");
    pipeline
        .init(|p| {
            let flood = ScriptedNode::builder("flood")
                .output("v_output")
                .script(Script::Flood)
                .build();
            let idle = ScriptedNode::builder("idle").input("v_input").build();
            let a = p.add(flood, &json!({}))?;
            let b = p.add(idle, &json!({}))?;
            p.connect_with_capacity(a, b, Capacity::Bounded(1))?;
            Ok(())
        })
        .unwrap();

    pipeline.start().unwrap();
    let queue = pipeline.input_ports(NodeId(1)).unwrap()[0].stream().unwrap().clone();
    assert!(wait_until(|| queue.is_full()));

    let started = Instant::now();
    pipeline.stop().unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(pipeline.active_node_count(), 0);
    assert_eq!(queue.len(), 1);
    assert_eq!(pipeline.last_run_results()[0].status, Status::Success);
}

#[test]
#[serial]
fn test_failed_node_reported_on_stop() {
    let mut pipeline = Pipeline::new("faulty");
    pipeline
        .init(|p| {
            p.add(
                ScriptedNode::builder("bad").script(Script::Fail("boom")).build(),
                &json!({}),
            )?;
            p.add(ScriptedNode::builder("good").build(), &json!({}))?;
            Ok(())
        })
        .unwrap();

    pipeline.start().unwrap();
    assert!(wait_until(|| pipeline.active_node_count() == 1));
    pipeline.stop().unwrap();

    let results = pipeline.last_run_results();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].name, "bad");
    assert_eq!(results[0].status, Status::Failed);
    assert_eq!(results[0].message.as_deref(), Some("boom"));
    assert_eq!(results[1].status, Status::Success);
}

#[test]
#[serial]
fn test_stop_single_node_leaves_others_running() {
    let (sink, rx) = ChannelSink::channel("sink");
    let mut pipeline = Pipeline::new("partial");
    let (mut src, mut idle) = (NodeId::INVALID, NodeId::INVALID);
    pipeline
        .init(|p| {
            src = p.add(SequenceSource::new("src"), &json!({"interval_ms": 1}))?;
            let dst = p.add(sink, &json!({"port": "seq", "poll_ms": 1}))?;
            idle = p.add(ScriptedNode::builder("idle").build(), &json!({}))?;
            p.connect(src, dst)?;
            Ok(())
        })
        .unwrap();

    pipeline.start().unwrap();
    assert!(pipeline.node(idle).is_none());
    assert_eq!(collect_i64(&rx, 3), vec![0, 1, 2]);

    pipeline.stop_node(idle).unwrap();
    assert!(wait_until(|| pipeline.active_node_count() == 2));
    assert!(!pipeline.run_flag(idle).unwrap().is_running());
    assert!(pipeline.run_flag(src).unwrap().is_running());
    // The chain keeps flowing after its neighbour stopped.
    assert_eq!(collect_i64(&rx, 3), vec![3, 4, 5]);

    assert!(matches!(
        pipeline.stop_node(NodeId(9)),
        Err(PipelineError::UnknownNode(_))
    ));
    pipeline.stop().unwrap();
    assert!(pipeline.node(idle).is_some());
    assert!(pipeline
        .last_run_results()
        .iter()
        .all(|exit| exit.status == Status::Success));
}

#[test]
#[serial]
fn test_panicking_node_is_not_restarted() {
    let panicky = ScriptedNode::builder("panicky").script(Script::Panic).build();
    let steady = ScriptedNode::builder("steady").build();
    let steady_runs = steady.runs();

    let mut pipeline = Pipeline::new("panics");
    pipeline
        .init(|p| {
            p.add(panicky, &json!({}))?;
            p.add(steady, &json!({}))?;
            Ok(())
        })
        .unwrap();

    pipeline.start().unwrap();
    pipeline.stop().unwrap();
    assert_eq!(pipeline.last_run_results()[0].status, Status::Failed);
    assert!(pipeline.node(NodeId(0)).is_none());
    assert!(pipeline.node(NodeId(1)).is_some());

    pipeline.start().unwrap();
    pipeline.stop().unwrap();
    assert_eq!(steady_runs.load(Ordering::SeqCst), 2);
    assert_eq!(pipeline.last_run_results().len(), 1);
}

#[test]
#[serial]
fn test_boundary_streams_feed_and_drain() {
    let mut pipeline = Pipeline::new("boundary");
    pipeline
        .init(|p| {
            p.add(Transform::map("square", |v: &i64| v * v), &json!({"poll_ms": 1}))?;
            Ok(())
        })
        .unwrap();

    let feed = pipeline.create_input_stream(Capacity::Bounded(4)).unwrap();
    let drain = pipeline.create_output_stream(Capacity::Unbounded).unwrap();
    assert!(pipeline.input_port().is_none());
    assert!(pipeline.output_port().is_none());

    pipeline.start().unwrap();
    for v in 1..=10i64 {
        feed.push(Packet::new(v), PushTimeout::Forever).unwrap();
    }
    let mut squares = Vec::new();
    while squares.len() < 10 {
        let packet = drain.pop_timeout(Duration::from_secs(2)).unwrap();
        squares.push(*packet.get::<i64>().unwrap());
    }
    pipeline.stop().unwrap();

    assert_eq!(squares, (1..=10i64).map(|v| v * v).collect::<Vec<_>>());
    assert_eq!(feed.stats().pushed, 10);
    assert_eq!(drain.stats().popped, 10);
}

#[test]
#[serial]
fn test_restart_runs_nodes_again() {
    let (sink, rx) = ChannelSink::channel("sink");
    let mut pipeline = Pipeline::new("restart");
    pipeline
        .init(|p| {
            let src = p.add(SequenceSource::new("src"), &json!({"count": 5}))?;
            let dst = p.add(sink, &json!({"port": "seq", "poll_ms": 1}))?;
            p.connect(src, dst)?;
            Ok(())
        })
        .unwrap();

    pipeline.start().unwrap();
    assert_eq!(collect_i64(&rx, 5), vec![0, 1, 2, 3, 4]);
    pipeline.stop().unwrap();

    pipeline.start().unwrap();
    assert_eq!(collect_i64(&rx, 5), vec![0, 1, 2, 3, 4]);
    pipeline.stop().unwrap();
}

#[test]
#[serial]
fn test_fan_out_reaches_every_sink() {
    let (left, left_rx) = ChannelSink::channel("left");
    let (right, right_rx) = ChannelSink::channel("right");
    let mut pipeline = Pipeline::new("fanout");
    pipeline
        .init(|p| {
            let emit = ScriptedNode::builder("emit")
                .output("v_output")
                .script(Script::Emit(vec![7, 8, 9]))
                .build();
            let src = p.add(emit, &json!({}))?;
            let l = p.add(left, &json!({"port": "v", "poll_ms": 1}))?;
            let r = p.add(right, &json!({"port": "v", "poll_ms": 1}))?;
            p.connect(src, l)?;
            p.connect_ports(src, "v_output", r, "v_input")?;
            Ok(())
        })
        .unwrap();

    let topology = pipeline.topology();
    assert_eq!(topology.edges.len(), 2);
    assert_eq!(topology.boundary_edges().count(), 0);

    pipeline.start().unwrap();
    assert_eq!(collect_i64(&left_rx, 3), vec![7, 8, 9]);
    assert_eq!(collect_i64(&right_rx, 3), vec![7, 8, 9]);
    pipeline.stop().unwrap();
}

#[test]
fn test_failed_node_init_rejected() {
    let mut pipeline = Pipeline::new("init");
    let result = pipeline.init(|p| {
        p.add(
            ScriptedNode::builder("broken").failing_init("no device").build(),
            &json!({}),
        )?;
        Ok(())
    });

    let err = result.unwrap_err();
    assert!(matches!(&err, PipelineError::NodeInit { name, .. } if name == "broken"));
    assert_eq!(err.status(), Status::InitFail);
    assert_eq!(pipeline.node_count(), 0);
    assert!(!pipeline.is_initialized());
}

#[test]
#[serial]
fn test_drop_stops_running_pipeline() {
    let flood = ScriptedNode::builder("flood")
        .output("v_output")
        .script(Script::Flood)
        .build();
    let runs = flood.runs();
    {
        let mut pipeline = Pipeline::new("dropped");
        pipeline
            .init(|p| {
                p.add(flood, &json!({}))?;
                Ok(())
            })
            .unwrap();
        let drain = pipeline.create_output_stream(Capacity::Bounded(8)).unwrap();
        pipeline.start().unwrap();
        assert!(wait_until(|| drain.is_full()));
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(std::sync::Arc::strong_count(&runs), 1);
}
