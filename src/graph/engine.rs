//! Engine thread: owns the flow graph and runs evaluation cycles.
//!
//! Each loop iteration:
//! 1. Apply queued commands (wiring, parameters, new data).
//! 2. When free-running, run one cycle and report it.
//! 3. Rate-limit to the configured Hz, or wait for the next command.

use crate::config::EngineConfig;
use crate::error::{Result, ScopeFlowError};
use crate::graph::bridge::{GraphBridge, GraphCommand, GraphEvent};
use crate::graph::executor::FlowGraph;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const IDLE_WAIT: Duration = Duration::from_millis(10);

pub struct Engine {
    graph: FlowGraph,
    config: EngineConfig,
    running: Arc<AtomicBool>,
    cmd_rx: Receiver<GraphCommand>,
    event_tx: Sender<GraphEvent>,
    last_cycle_time: Option<Instant>,
    dropped_events: u64,
}

impl Engine {
    pub fn new(
        mut graph: FlowGraph,
        config: EngineConfig,
        cmd_rx: Receiver<GraphCommand>,
        event_tx: Sender<GraphEvent>,
        running: Arc<AtomicBool>,
    ) -> Self {
        graph.set_gpu_enabled(config.gpu_enabled);
        Self {
            graph,
            config,
            running,
            cmd_rx,
            event_tx,
            last_cycle_time: None,
            dropped_events: 0,
        }
    }

    /// Move `graph` onto a new engine thread. The handle returns the graph
    /// once the engine shuts down.
    pub fn spawn(graph: FlowGraph, config: EngineConfig) -> Result<(GraphBridge, JoinHandle<FlowGraph>)> {
        let (bridge, cmd_rx, event_tx) = GraphBridge::new();
        let running = Arc::new(AtomicBool::new(true));
        let handle = std::thread::Builder::new()
            .name("scopeflow-engine".to_string())
            .spawn(move || {
                let mut engine = Engine::new(graph, config, cmd_rx, event_tx, running);
                engine.run();
                engine.into_graph()
            })
            .map_err(|e| ScopeFlowError::Channel(format!("Failed to spawn engine thread: {}", e)))?;
        Ok((bridge, handle))
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    pub fn into_graph(self) -> FlowGraph {
        self.graph
    }

    // ── Main run loop ──

    /// Run until `running` is cleared, Shutdown is received or every
    /// bridge is dropped.
    pub fn run(&mut self) {
        tracing::info!(
            "Engine thread started ({} Hz, gpu {})",
            self.config.cycle_rate_hz,
            self.config.gpu_enabled
        );

        while self.running.load(Ordering::Relaxed) {
            self.process_commands();

            if self.config.cycle_rate_hz > 0 && self.running.load(Ordering::Relaxed) {
                self.cycle(self.config.force_full_refresh, false);
            }

            self.rate_limit();
        }

        self.emit(GraphEvent::Shutdown);
        tracing::info!("Engine thread exiting after {} cycle(s)", self.graph.cycle_count());
    }

    fn process_commands(&mut self) {
        loop {
            match self.cmd_rx.try_recv() {
                Ok(cmd) => self.handle_command(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.running.store(false, Ordering::Relaxed);
                    break;
                }
            }
        }
    }

    fn handle_command(&mut self, cmd: GraphCommand) {
        match cmd {
            GraphCommand::SetParameter { node, name, value } => {
                if let Err(e) = self.graph.set_parameter(node, &name, &value) {
                    tracing::warn!("Ignoring parameter '{}' for {:?}: {}", name, node, e);
                }
            }
            GraphCommand::SetInput {
                node,
                input,
                stream,
                force,
            } => {
                if let Err(e) = self.graph.set_input(node, input, stream, force) {
                    self.emit(GraphEvent::WiringRejected {
                        node,
                        input,
                        reason: e.to_string(),
                    });
                }
            }
            GraphCommand::Ingest {
                node,
                stream,
                waveform,
            } => {
                if let Err(e) = self.graph.ingest_shared(node, stream, Some(waveform)) {
                    tracing::warn!("Dropping acquisition for {:?}: {}", node, e);
                }
            }
            GraphCommand::RunCycle { force } => {
                self.cycle(force || self.config.force_full_refresh, true);
            }
            GraphCommand::Shutdown => {
                self.running.store(false, Ordering::Relaxed);
            }
        }
    }

    /// Run one cycle. Requested cycles are always reported, free-running
    /// ones only when something refreshed.
    fn cycle(&mut self, force: bool, requested: bool) {
        let report = self.graph.run_cycle(force);
        self.last_cycle_time = Some(Instant::now());
        if requested || report.cycle.is_some() {
            self.emit(GraphEvent::CycleComplete(report));
        }
    }

    /// Never blocks: when nobody drains the event channel the event is
    /// dropped so the loop keeps servicing commands.
    fn emit(&mut self, event: GraphEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {
                if self.dropped_events > 0 {
                    tracing::warn!("Event channel drained, {} event(s) were dropped", self.dropped_events);
                    self.dropped_events = 0;
                }
            }
            Err(TrySendError::Full(event)) => {
                if self.dropped_events == 0 {
                    tracing::warn!("Event channel full, dropping {:?}", event);
                }
                self.dropped_events += 1;
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    // ── Rate limiting ──

    fn rate_limit(&mut self) {
        if !self.running.load(Ordering::Relaxed) {
            return;
        }

        if self.config.cycle_rate_hz == 0 {
            // Cycles only run on request; sleep until one arrives.
            match self.cmd_rx.recv_timeout(IDLE_WAIT) {
                Ok(cmd) => self.handle_command(cmd),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => self.running.store(false, Ordering::Relaxed),
            }
            return;
        }

        let target_interval = Duration::from_nanos(1_000_000_000 / self.config.cycle_rate_hz as u64);
        if let Some(last) = self.last_cycle_time {
            let elapsed = last.elapsed();
            if elapsed < target_interval {
                std::thread::sleep(target_interval - elapsed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::{AnyNode, BuiltinNode};
    use crate::graph::nodes::{AcquisitionChannel, GateFilter};
    use crate::graph::stream::{ChannelKind, StreamType};
    use crate::graph::unit::Unit;
    use crate::graph::waveform::{AnyWaveform, Waveform};

    fn graph() -> FlowGraph {
        let mut graph = FlowGraph::new();
        graph.add_node(AnyNode::Builtin(BuiltinNode::Channel(AcquisitionChannel::new(
            "CH1",
            None,
            ChannelKind::Oscilloscope,
            StreamType::Analog,
            Unit::Volts,
        ))));
        graph.add_node(GateFilter::new());
        graph
    }

    #[test]
    fn test_requested_cycle_and_shutdown() {
        let mut g = graph();
        let ch = g.find_node("CH1").unwrap();
        let gate = g.find_node("Gate").unwrap();
        let stream = g.stream(ch, 0).unwrap();

        let (bridge, handle) = Engine::spawn(g, EngineConfig::default()).unwrap();
        bridge.set_input(gate, 0, stream, false);
        bridge.ingest(ch, 0, AnyWaveform::Analog(Waveform::from_samples(1, vec![1.0])));
        bridge.run_cycle(false);

        match bridge.recv() {
            Some(GraphEvent::CycleComplete(report)) => {
                assert_eq!(report.cycle, Some(0));
                assert!(report.refreshed.contains(&gate));
            }
            other => panic!("unexpected event: {other:?}"),
        }

        bridge.shutdown();
        assert!(matches!(bridge.recv(), Some(GraphEvent::Shutdown)));
        let g = handle.join().unwrap();
        assert_eq!(g.cycle_count(), 1);
        assert!(!g.node(gate).unwrap().input(0).is_null());
    }

    #[test]
    fn test_rejected_wiring_event() {
        let mut g = graph();
        let ch = g.find_node("CH1").unwrap();
        let gate = g.find_node("Gate").unwrap();
        let stream = g.stream(ch, 0).unwrap();

        let (bridge, handle) = Engine::spawn(g, EngineConfig::default()).unwrap();
        // Analog waveform on the scalar enable input.
        bridge.set_input(gate, 1, stream, false);
        match bridge.recv() {
            Some(GraphEvent::WiringRejected { node, input, .. }) => {
                assert_eq!(node, gate);
                assert_eq!(input, 1);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        bridge.shutdown();
        handle.join().unwrap();
    }

    #[test]
    fn test_dropped_bridge_stops_engine() {
        let (bridge, handle) = Engine::spawn(graph(), EngineConfig::default()).unwrap();
        drop(bridge);
        let g = handle.join().unwrap();
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn test_full_event_channel_does_not_block() {
        let (_cmd_tx, cmd_rx) = crossbeam_channel::bounded(1);
        let (event_tx, event_rx) = crossbeam_channel::bounded(1);
        let running = Arc::new(AtomicBool::new(true));
        let mut engine = Engine::new(graph(), EngineConfig::default(), cmd_rx, event_tx, running);

        engine.cycle(true, true);
        engine.cycle(true, true);
        engine.cycle(true, true);
        assert_eq!(engine.dropped_events, 2);
        assert_eq!(engine.graph().cycle_count(), 3);

        assert!(matches!(event_rx.try_recv(), Ok(GraphEvent::CycleComplete(_))));
        engine.cycle(true, true);
        assert_eq!(engine.dropped_events, 0);
    }
}
