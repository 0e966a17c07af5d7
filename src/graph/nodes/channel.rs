//! A hardware channel as a graph node.
//!
//! Channels have no inputs. Their streams are filled from outside the
//! graph by `FlowGraph::ingest` when the instrument delivers new data;
//! refresh leaves them untouched.

use crate::graph::node::{NodeCategory, NodeCore, NodePlugin, RefreshContext};
use crate::graph::stream::{ChannelKind, Stream, StreamDescriptor, StreamType};
use crate::graph::unit::Unit;
use crate::instrument::Instrument;

pub struct AcquisitionChannel {
    core: NodeCore,
    instrument: Option<Instrument>,
    kind: ChannelKind,
}

impl AcquisitionChannel {
    /// Channel with a single stream named after the channel.
    pub fn new(
        name: impl Into<String>,
        instrument: Option<Instrument>,
        kind: ChannelKind,
        stream_type: StreamType,
        unit: Unit,
    ) -> Self {
        let name = name.into();
        let mut core = NodeCore::new(name.clone());
        core.add_stream(Stream::new(name, unit, stream_type));
        Self {
            core,
            instrument,
            kind,
        }
    }

    /// Add another stream, e.g. the digital view of a mixed-signal channel.
    pub fn with_stream(mut self, name: impl Into<String>, unit: Unit, stream_type: StreamType) -> Self {
        self.core.add_stream(Stream::new(name, unit, stream_type));
        self
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }
}

impl NodePlugin for AcquisitionChannel {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn protocol_name(&self) -> &str {
        "Channel"
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Acquisition
    }

    fn validate_channel(&self, _index: usize, _stream: &StreamDescriptor) -> bool {
        false
    }

    fn refresh(&mut self, _ctx: &mut RefreshContext) {}

    fn instrument(&self) -> Option<&Instrument> {
        self.instrument.as_ref()
    }

    fn channel_kind(&self) -> ChannelKind {
        self.kind
    }
}
