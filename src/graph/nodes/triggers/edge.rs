use super::{trigger_plugin_common, TriggerCore};
use crate::graph::node::NodePlugin;
use crate::graph::parameter::FilterParameter;
use crate::graph::stream::{ChannelKind, StreamDescriptor};
use crate::instrument::{Capability, Instrument};

pub const PARAM_EDGE: &str = "Edge";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeType {
    Rising = 0,
    Falling = 1,
    Any = 2,
    Alternating = 3,
}

impl EdgeType {
    fn from_value(value: i64) -> Self {
        match value {
            1 => EdgeType::Falling,
            2 => EdgeType::Any,
            3 => EdgeType::Alternating,
            _ => EdgeType::Rising,
        }
    }
}

/// Fires when the input crosses `Level` in the selected direction.
pub struct EdgeTrigger {
    base: TriggerCore,
}

impl EdgeTrigger {
    pub fn new(instrument: Instrument) -> Self {
        let alternating = instrument.has(Capability::AlternatingEdge);
        let mut base = TriggerCore::new("Edge", instrument);

        let mut edge = FilterParameter::enumeration([
            ("Rising", EdgeType::Rising as i64),
            ("Falling", EdgeType::Falling as i64),
            ("Any", EdgeType::Any as i64),
        ]);
        if alternating {
            edge.add_enum_value("Alternating", EdgeType::Alternating as i64);
        }
        base.node.add_parameter(PARAM_EDGE, edge);

        Self { base }
    }

    pub fn edge_type(&self) -> EdgeType {
        self.base
            .node
            .parameter(PARAM_EDGE)
            .map(|p| EdgeType::from_value(p.as_int()))
            .unwrap_or(EdgeType::Rising)
    }

    pub fn level(&self) -> f64 {
        self.base.level()
    }
}

impl NodePlugin for EdgeTrigger {
    trigger_plugin_common!("Edge");

    fn validate_channel(&self, index: usize, stream: &StreamDescriptor) -> bool {
        self.base.accepts(index, stream)
            && matches!(
                stream.channel_kind(),
                ChannelKind::Oscilloscope | ChannelKind::DigitalInput | ChannelKind::DigitalIo
            )
    }
}
