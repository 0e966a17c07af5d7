//! Wiring, scheduling and propagation across a small acquisition graph

mod common;

use common::builders::{analog_capture, scope};
use scopeflow::graph::nodes::triggers::{EdgeTrigger, PARAM_LEVEL};
use scopeflow::graph::nodes::{AcquisitionChannel, GateFilter, GateMode};
use scopeflow::graph::{
    AnyWaveform, ChannelKind, GpuCommand, NodeId, ParameterValue, QueueHandle, StreamDescriptor, StreamType, Unit,
};
use scopeflow::{Capabilities, FlowGraph, Instrument, ScopeFlowError};

struct Bench {
    graph: FlowGraph,
    ch1: NodeId,
    enable: NodeId,
    logic: NodeId,
    gate: NodeId,
}

fn bench_with(mut graph: FlowGraph, instrument: &Instrument) -> Bench {
    let ch1 = graph.add_node(AcquisitionChannel::new(
        "CH1",
        Some(instrument.clone()),
        ChannelKind::Oscilloscope,
        StreamType::Analog,
        Unit::Volts,
    ));
    let enable = graph.add_node(AcquisitionChannel::new(
        "EN",
        None,
        ChannelKind::Other,
        StreamType::AnalogScalar,
        Unit::Volts,
    ));
    let logic = graph.add_node(AcquisitionChannel::new(
        "D0",
        None,
        ChannelKind::DigitalInput,
        StreamType::Digital,
        Unit::Counts,
    ));
    let gate = graph.add_node(GateFilter::new());
    graph.connect(ch1, 0, gate, 0).unwrap();
    graph.connect(enable, 0, gate, 1).unwrap();
    Bench {
        graph,
        ch1,
        enable,
        logic,
        gate,
    }
}

fn bench() -> Bench {
    bench_with(FlowGraph::new(), &scope(1, Capabilities::default()))
}

fn analog(out: Option<std::sync::Arc<AnyWaveform>>) -> Option<Vec<f32>> {
    out.as_deref().and_then(AnyWaveform::as_analog).map(|w| w.samples().to_vec())
}

#[test]
fn test_rejected_wiring_leaves_input_unchanged() {
    let mut b = bench();
    let before = b.graph.node(b.gate).unwrap().input(0);
    let digital = b.graph.stream(b.logic, 0).unwrap();

    let err = b.graph.set_input(b.gate, 0, digital, false).unwrap_err();
    match err {
        ScopeFlowError::InvalidWiring { node, input, .. } => {
            assert_eq!(node, b.gate);
            assert_eq!(input, 0);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(b.graph.node(b.gate).unwrap().input(0), before);
}

#[test]
fn test_forced_wiring_is_kept() {
    let mut b = bench();
    let digital = b.graph.stream(b.logic, 0).unwrap();
    b.graph.set_input(b.gate, 0, digital, true).unwrap();
    assert_eq!(b.graph.node(b.gate).unwrap().input(0), digital);
}

#[test]
fn test_cycle_refused_even_when_forced() {
    let mut b = bench();
    let second = b.graph.add_node(GateFilter::new());
    b.graph.connect(b.gate, 0, second, 0).unwrap();

    let back = b.graph.stream(second, 0).unwrap();
    let err = b.graph.set_input(b.gate, 0, back, true).unwrap_err();
    assert!(matches!(err, ScopeFlowError::CycleDetected));
    assert_eq!(b.graph.node(b.gate).unwrap().input(0).node, Some(b.ch1));
}

#[test]
fn test_gate_passes_and_latches() {
    let mut b = bench();
    b.graph.ingest(b.ch1, 0, analog_capture(1_000, vec![0.5, 1.5])).unwrap();
    b.graph.ingest_scalar(b.enable, 0, 1.0).unwrap();
    b.graph.run_cycle(false);
    assert_eq!(analog(b.graph.output(b.gate, 0)), Some(vec![0.5, 1.5]));

    // Disabled in latch mode: the last waveform stays published.
    b.graph.ingest(b.ch1, 0, analog_capture(1_000, vec![9.0])).unwrap();
    b.graph.ingest_scalar(b.enable, 0, 0.0).unwrap();
    b.graph.run_cycle(false);
    assert_eq!(analog(b.graph.output(b.gate, 0)), Some(vec![0.5, 1.5]));

    // Gate mode clears the output instead.
    b.graph
        .set_parameter(b.gate, "Mode", &ParameterValue::Int(GateMode::Gate as i64))
        .unwrap();
    b.graph.run_cycle(false);
    assert!(b.graph.output(b.gate, 0).is_none());
}

#[test]
fn test_incremental_refresh() {
    let mut b = bench();
    let other = b.graph.add_node(AcquisitionChannel::new(
        "CH2",
        None,
        ChannelKind::Oscilloscope,
        StreamType::Analog,
        Unit::Volts,
    ));
    let other_gate = b.graph.add_node(GateFilter::new());
    b.graph.connect(other, 0, other_gate, 0).unwrap();
    b.graph.run_cycle(false);

    b.graph.ingest(other, 0, analog_capture(1, vec![1.0])).unwrap();
    let report = b.graph.run_cycle(false);
    assert_eq!(report.refreshed, vec![other, other_gate]);
    assert!(!report.refreshed.contains(&b.gate));

    // Nothing changed since: no cycle at all.
    let report = b.graph.run_cycle(false);
    assert_eq!(report.cycle, None);
    assert!(report.refreshed.is_empty());
}

#[test]
fn test_removed_producer_nulls_consumer() {
    let mut b = bench();
    b.graph.ingest(b.ch1, 0, analog_capture(1, vec![2.0])).unwrap();
    b.graph.ingest_scalar(b.enable, 0, 1.0).unwrap();
    b.graph.run_cycle(false);
    assert!(b.graph.output(b.gate, 0).is_some());

    b.graph.remove_node(b.ch1).unwrap();
    assert!(b.graph.node(b.gate).unwrap().input(0).is_null());
    let report = b.graph.run_cycle(false);
    assert!(report.refreshed.contains(&b.gate));
    assert!(b.graph.output(b.gate, 0).is_none());
    assert!(b.graph.input_waveform(b.gate, 0).is_none());
}

#[test]
fn test_trigger_requires_same_instrument() {
    let scope1 = scope(1, Capabilities::all());
    let scope2 = scope(2, Capabilities::all());
    let mut b = bench_with(FlowGraph::new(), &scope1);
    let foreign = b.graph.add_node(AcquisitionChannel::new(
        "CH1@2",
        Some(scope2),
        ChannelKind::Oscilloscope,
        StreamType::Analog,
        Unit::Volts,
    ));
    let trigger = b.graph.add_node(EdgeTrigger::new(scope1));

    assert!(b.graph.connect(foreign, 0, trigger, 0).is_err());
    assert!(b.graph.node(trigger).unwrap().input(0).is_null());

    b.graph.connect(b.ch1, 0, trigger, 0).unwrap();
    assert_eq!(b.graph.node(trigger).unwrap().input(0).node, Some(b.ch1));
    assert!(b.graph.is_downstream_of(trigger, &[b.ch1]));

    b.graph
        .set_parameter(trigger, PARAM_LEVEL, &ParameterValue::Float(0.25))
        .unwrap();
    let level = b.graph.node(trigger).unwrap().parameter(PARAM_LEVEL).unwrap().as_float();
    common::assert_float_eq(level, 0.25, 1e-9);
}

#[test]
fn test_null_binding_requires_force() {
    let mut b = bench();
    assert!(b.graph.set_input(b.gate, 0, StreamDescriptor::null(), false).is_err());
    b.graph.set_input(b.gate, 0, StreamDescriptor::null(), true).unwrap();
    assert!(b.graph.node(b.gate).unwrap().input(0).is_null());
}

#[test]
fn test_gpu_path_submits_gate_work() {
    let mut b = bench_with(FlowGraph::with_gpu(QueueHandle::new(0)), &scope(1, Capabilities::default()));
    b.graph.ingest(b.ch1, 0, analog_capture(1, vec![1.0; 100])).unwrap();
    b.graph.ingest_scalar(b.enable, 0, 1.0).unwrap();
    let report = b.graph.run_cycle(false);

    assert_eq!(report.gpu_nodes, vec![b.gate]);
    let submissions = b.graph.queue().submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].node, b.gate);
    assert!(submissions[0]
        .commands
        .contains(&GpuCommand::Dispatch { x: 2, y: 1, z: 1 }));
    assert_eq!(analog(b.graph.output(b.gate, 0)).map(|v| v.len()), Some(100));
}
