//! Thread boundary between the engine thread and its callers.
//!
//! Wiring and parameter changes from other threads travel as
//! `GraphCommand`s and are applied by the engine strictly between cycles.
//! Results come back as `GraphEvent`s.

use crate::graph::executor::CycleReport;
use crate::graph::id::NodeId;
use crate::graph::parameter::ParameterValue;
use crate::graph::stream::StreamDescriptor;
use crate::graph::waveform::AnyWaveform;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::Arc;

/// Messages from the engine thread.
#[derive(Debug, Clone)]
pub enum GraphEvent {
    /// A cycle finished (or a requested cycle found nothing to do).
    CycleComplete(CycleReport),

    /// A `SetInput` was refused; the graph is unchanged.
    WiringRejected {
        node: NodeId,
        input: usize,
        reason: String,
    },

    Shutdown,
}

/// Requests to the engine thread.
#[derive(Debug, Clone)]
pub enum GraphCommand {
    SetParameter {
        node: NodeId,
        name: String,
        value: ParameterValue,
    },
    SetInput {
        node: NodeId,
        input: usize,
        stream: StreamDescriptor,
        force: bool,
    },
    /// New acquisition data for a channel stream.
    Ingest {
        node: NodeId,
        stream: usize,
        waveform: Arc<AnyWaveform>,
    },
    RunCycle {
        force: bool,
    },
    Shutdown,
}

const CMD_CHANNEL_CAPACITY: usize = 256;
const EVENT_CHANNEL_CAPACITY: usize = 10_000;

/// Caller side of the engine channels.
pub struct GraphBridge {
    pub cmd_tx: Sender<GraphCommand>,
    pub event_rx: Receiver<GraphEvent>,
}

impl GraphBridge {
    /// Create the bridge plus the engine's ends of both channels.
    pub fn new() -> (Self, Receiver<GraphCommand>, Sender<GraphEvent>) {
        let (cmd_tx, cmd_rx) = bounded(CMD_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = bounded(EVENT_CHANNEL_CAPACITY);
        (Self { cmd_tx, event_rx }, cmd_rx, event_tx)
    }

    pub fn drain(&self) -> Vec<GraphEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn try_recv(&self) -> Option<GraphEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Block until the next event. `None` once the engine is gone.
    pub fn recv(&self) -> Option<GraphEvent> {
        self.event_rx.recv().ok()
    }

    pub fn send_command(&self, cmd: GraphCommand) -> bool {
        self.cmd_tx.send(cmd).is_ok()
    }

    pub fn set_parameter(&self, node: NodeId, name: impl Into<String>, value: ParameterValue) {
        let _ = self.cmd_tx.send(GraphCommand::SetParameter {
            node,
            name: name.into(),
            value,
        });
    }

    pub fn set_input(&self, node: NodeId, input: usize, stream: StreamDescriptor, force: bool) {
        let _ = self.cmd_tx.send(GraphCommand::SetInput {
            node,
            input,
            stream,
            force,
        });
    }

    pub fn ingest(&self, node: NodeId, stream: usize, waveform: AnyWaveform) {
        let _ = self.cmd_tx.send(GraphCommand::Ingest {
            node,
            stream,
            waveform: Arc::new(waveform),
        });
    }

    pub fn run_cycle(&self, force: bool) {
        let _ = self.cmd_tx.send(GraphCommand::RunCycle { force });
    }

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(GraphCommand::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_reach_engine_end() {
        let (bridge, cmd_rx, event_tx) = GraphBridge::new();
        bridge.run_cycle(true);
        bridge.shutdown();
        assert!(matches!(cmd_rx.try_recv(), Ok(GraphCommand::RunCycle { force: true })));
        assert!(matches!(cmd_rx.try_recv(), Ok(GraphCommand::Shutdown)));

        event_tx.send(GraphEvent::Shutdown).unwrap();
        let events = bridge.drain();
        assert_eq!(events.len(), 1);
        assert!(bridge.try_recv().is_none());
    }
}
