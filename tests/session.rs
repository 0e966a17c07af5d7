//! Session save / restore across graphs

mod common;

use common::builders::scope;
use scopeflow::config::session::SESSION_VERSION;
use scopeflow::graph::nodes::ethernet::PARAM_STRIPPED;
use scopeflow::graph::nodes::gate::PARAM_MODE;
use scopeflow::graph::nodes::triggers::{
    EdgeTrigger, WindowTrigger, PARAM_EDGE, PARAM_LEVEL, PARAM_TIME_LIMIT, PARAM_UPPER,
};
use scopeflow::graph::nodes::{AcquisitionChannel, EthernetDecoder, GateFilter};
use scopeflow::graph::{ChannelKind, NodeFactory, NodeId, NodeType, ParameterValue, StreamType, Unit};
use scopeflow::{Capabilities, FlowGraph, Instrument, SessionDocument};
use tempfile::TempDir;

fn channels(graph: &mut FlowGraph, instrument: &Instrument) -> (NodeId, NodeId) {
    let ch1 = graph.add_node(AcquisitionChannel::new(
        "CH1",
        Some(instrument.clone()),
        ChannelKind::Oscilloscope,
        StreamType::Analog,
        Unit::Volts,
    ));
    let rx = graph.add_node(AcquisitionChannel::new(
        "RX",
        None,
        ChannelKind::DigitalInput,
        StreamType::DigitalBus,
        Unit::HexNumber,
    ));
    (ch1, rx)
}

/// Channels, a gate, a decoder and two triggers with non-default settings.
fn source_graph(instrument: &Instrument) -> FlowGraph {
    let mut graph = FlowGraph::new();
    let (ch1, rx) = channels(&mut graph, instrument);

    let gate = graph.add_node(GateFilter::new());
    graph.connect(ch1, 0, gate, 0).unwrap();
    graph.set_parameter(gate, PARAM_MODE, &ParameterValue::Text("Gate".into())).unwrap();

    let eth = graph.add_node(EthernetDecoder::new());
    graph.connect(rx, 0, eth, 0).unwrap();
    graph.set_parameter(eth, PARAM_STRIPPED, &ParameterValue::Bool(true)).unwrap();

    let edge = graph.add_node(EdgeTrigger::new(instrument.clone()));
    graph.connect(ch1, 0, edge, 0).unwrap();
    graph.set_parameter(edge, PARAM_LEVEL, &ParameterValue::Float(1.25)).unwrap();
    graph.set_parameter(edge, PARAM_EDGE, &ParameterValue::Text("Falling".into())).unwrap();

    let window = graph.add_node(WindowTrigger::new(instrument.clone()));
    graph.connect(ch1, 0, window, 0).unwrap();
    graph.set_parameter(window, PARAM_UPPER, &ParameterValue::Float(3.3)).unwrap();
    graph.set_parameter(window, PARAM_TIME_LIMIT, &ParameterValue::Int(5_000_000)).unwrap();

    graph
}

fn param(graph: &FlowGraph, node: &str, name: &str) -> ParameterValue {
    let id = graph.find_node(node).unwrap();
    graph.node(id).unwrap().parameter(name).unwrap().value()
}

#[test]
fn test_round_trip_through_file() {
    let instrument = scope(1, Capabilities::all());
    let doc = SessionDocument::capture(&source_graph(&instrument));
    assert_eq!(doc.version, SESSION_VERSION);
    assert_eq!(doc.nodes.len(), 6);

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sessions").join("bench.json");
    doc.save(&path).unwrap();
    let loaded = SessionDocument::load(&path).unwrap();
    assert_eq!(loaded, doc);

    let mut target = FlowGraph::new();
    let (ch1, rx) = channels(&mut target, &instrument);
    let factory = NodeFactory::new(vec![instrument]);
    let report = loaded.restore(&mut target, &factory);

    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    assert_eq!(target.len(), 6);

    assert_eq!(param(&target, "Gate", PARAM_MODE), ParameterValue::Text("Gate".into()));
    assert_eq!(param(&target, "Ethernet", PARAM_STRIPPED), ParameterValue::Bool(true));
    assert_eq!(param(&target, "Edge", PARAM_LEVEL), ParameterValue::Float(1.25));
    assert_eq!(param(&target, "Edge", PARAM_EDGE), ParameterValue::Text("Falling".into()));
    assert_eq!(param(&target, "Window", PARAM_UPPER), ParameterValue::Float(3.3));
    assert_eq!(param(&target, "Window", PARAM_TIME_LIMIT), ParameterValue::Int(5_000_000));

    let eth = target.find_node("Ethernet").unwrap();
    assert_eq!(target.node(eth).unwrap().input(0).node, Some(rx));
    let edge = target.find_node("Edge").unwrap();
    assert_eq!(target.node(edge).unwrap().input(0).node, Some(ch1));
    assert_eq!(NodeType::of(target.node(edge).unwrap()), Some(NodeType::EdgeTrigger));
}

#[test]
fn test_restore_onto_less_capable_instrument() {
    let capable = scope(1, Capabilities::all());
    let doc = SessionDocument::capture(&source_graph(&capable));

    let basic = scope(1, Capabilities::default());
    let mut target = FlowGraph::new();
    channels(&mut target, &basic);
    let report = doc.restore(&mut target, &NodeFactory::new(vec![basic]));

    // Time limit is gated; the crossing edge, condition and alternating
    // edge do not exist on this instrument at all.
    assert!(report.warnings.iter().any(|w| w.contains(PARAM_TIME_LIMIT)));
    assert_eq!(param(&target, "Window", PARAM_TIME_LIMIT), ParameterValue::Int(0));
    assert_eq!(param(&target, "Window", PARAM_UPPER), ParameterValue::Float(3.3));
    assert_eq!(param(&target, "Edge", PARAM_EDGE), ParameterValue::Text("Falling".into()));
}

#[test]
fn test_missing_channel_drops_wiring() {
    let instrument = scope(1, Capabilities::all());
    let doc = SessionDocument::capture(&source_graph(&instrument));

    // No RX channel in the target graph.
    let mut target = FlowGraph::new();
    target.add_node(AcquisitionChannel::new(
        "CH1",
        Some(instrument.clone()),
        ChannelKind::Oscilloscope,
        StreamType::Analog,
        Unit::Volts,
    ));
    let report = doc.restore(&mut target, &NodeFactory::new(vec![instrument]));

    assert!(report.warnings.iter().any(|w| w.contains("RX")));
    let eth = target.find_node("Ethernet").unwrap();
    assert!(target.node(eth).unwrap().input(0).is_null());
}

#[test]
fn test_unknown_instrument_skips_triggers() {
    let instrument = scope(1, Capabilities::all());
    let doc = SessionDocument::capture(&source_graph(&instrument));

    let mut target = FlowGraph::new();
    channels(&mut target, &scope(7, Capabilities::all()));
    let report = doc.restore(&mut target, &NodeFactory::default());

    assert!(target.find_node("Edge").is_none());
    assert!(target.find_node("Window").is_none());
    assert!(target.find_node("Gate").is_some());
    assert!(report.warnings.len() >= 2);
}

#[test]
fn test_preflight_reports_level_increase() {
    let instrument = scope(1, Capabilities::all());
    let doc = SessionDocument::capture(&source_graph(&instrument));

    let mut live = FlowGraph::new();
    let (ch1, _) = channels(&mut live, &instrument);
    let edge = live.add_node(EdgeTrigger::new(instrument.clone()));
    live.connect(ch1, 0, edge, 0).unwrap();
    live.set_parameter(edge, PARAM_LEVEL, &ParameterValue::Float(0.5)).unwrap();

    let warnings = doc.preflight(&live);
    assert_eq!(
        warnings,
        vec!["Edge: this will increase Level from 0.500 V to 1.250 V".to_string()]
    );
    // Nothing was touched.
    assert_eq!(param(&live, "Edge", PARAM_LEVEL), ParameterValue::Float(0.5));
}

#[test]
fn test_load_rejects_garbage() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(SessionDocument::load(&path).is_err());
    assert!(SessionDocument::load(dir.path().join("missing.json")).is_err());
}
