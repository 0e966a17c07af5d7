//! Streams and stream descriptors.
//!
//! Each node exposes zero or more output streams. A `StreamDescriptor`
//! names one of them and is the only way to connect nodes. Descriptors
//! never own the node they refer to; they carry the node's id plus a
//! snapshot of the stream's capabilities taken when the graph resolved
//! them, so validation never has to inspect the producing node again.

use crate::graph::id::{InstrumentId, NodeId};
use crate::graph::unit::Unit;
use crate::graph::waveform::AnyWaveform;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// General data type carried by a stream. Valid even when no data is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamType {
    // Conventional time-series waveforms
    Analog,
    Digital,
    DigitalBus,

    // 2D density plots
    Eye,
    Spectrogram,
    Waterfall,
    Constellation,

    /// External trigger input, no data capture.
    Trigger,

    /// Symbol stream from a protocol decoder.
    Protocol,

    /// Single analog value.
    AnalogScalar,

    Undefined,
}

/// How many values a stream holds at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Scalar,
    Waveform,
    Trigger,
}

impl StreamType {
    pub fn cardinality(self) -> Cardinality {
        match self {
            StreamType::AnalogScalar => Cardinality::Scalar,
            StreamType::Trigger => Cardinality::Trigger,
            _ => Cardinality::Waveform,
        }
    }
}

/// What produced a stream. Replaces run-time type inspection of the
/// producing channel when deciding whether a binding makes sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKind {
    /// Analog front-end channel of an oscilloscope.
    Oscilloscope,
    /// Digital input (logic analyzer pod).
    DigitalInput,
    /// Bidirectional digital channel.
    DigitalIo,
    /// Output of a filter or decoder.
    Filter,
    Other,
}

/// Hints for how a stream should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamFlags {
    pub do_not_interpolate: bool,
    pub fill_under: bool,
    pub infrequently_used: bool,
}

/// One named output of a node.
#[derive(Debug, Clone)]
pub struct Stream {
    pub name: String,
    pub unit: Unit,
    pub stream_type: StreamType,
    pub flags: StreamFlags,
    /// Current waveform, `None` when nothing was produced this cycle.
    pub waveform: Option<Arc<AnyWaveform>>,
    /// Current value, only meaningful for `AnalogScalar`.
    pub value: f64,
}

impl Stream {
    pub fn new(name: impl Into<String>, unit: Unit, stream_type: StreamType) -> Self {
        Self {
            name: name.into(),
            unit,
            stream_type,
            flags: StreamFlags::default(),
            waveform: None,
            value: 0.0,
        }
    }

    pub fn with_flags(mut self, flags: StreamFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Capability snapshot of the stream a descriptor points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub stream_type: StreamType,
    pub unit: Unit,
    pub instrument: Option<InstrumentId>,
    pub channel_kind: ChannelKind,
}

impl Default for StreamInfo {
    fn default() -> Self {
        // A null descriptor reports analog, matching how unbound inputs are drawn.
        Self {
            stream_type: StreamType::Analog,
            unit: Unit::Volts,
            instrument: None,
            channel_kind: ChannelKind::Other,
        }
    }
}

/// Reference to one output stream of one node.
#[derive(Clone, Copy, Default)]
pub struct StreamDescriptor {
    pub node: Option<NodeId>,
    pub stream: usize,
    pub info: StreamInfo,
}

impl StreamDescriptor {
    pub fn new(node: NodeId, stream: usize, info: StreamInfo) -> Self {
        Self {
            node: Some(node),
            stream,
            info,
        }
    }

    /// The unbound descriptor.
    pub fn null() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.node.is_none()
    }

    pub fn stream_type(&self) -> StreamType {
        if self.is_null() {
            StreamType::Analog
        } else {
            self.info.stream_type
        }
    }

    pub fn unit(&self) -> Unit {
        self.info.unit
    }

    pub fn instrument(&self) -> Option<InstrumentId> {
        self.info.instrument
    }

    pub fn channel_kind(&self) -> ChannelKind {
        self.info.channel_kind
    }
}

impl PartialEq for StreamDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && self.stream == other.stream
    }
}

impl Eq for StreamDescriptor {}

impl Hash for StreamDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node.hash(state);
        self.stream.hash(state);
    }
}

impl fmt::Debug for StreamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node {
            None => write!(f, "StreamDescriptor(null)"),
            Some(node) => write!(f, "StreamDescriptor({}.{})", node.0, self.stream),
        }
    }
}

impl fmt::Display for StreamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
