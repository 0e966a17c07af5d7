//! Trigger nodes.
//!
//! A trigger is bound to one instrument and consumes a single stream from
//! that same instrument. Triggers produce no streams; their parameters are
//! pushed to the hardware by the instrument driver.

mod edge;
mod nth_edge_burst;
mod window;

pub use edge::{EdgeTrigger, EdgeType, PARAM_EDGE};
pub use nth_edge_burst::{NthEdgeBurstTrigger, PARAM_EDGE_NUMBER, PARAM_IDLE_TIME, PARAM_SLOPE};
pub use window::{CrossingType, WindowCondition, WindowTrigger, PARAM_CONDITION, PARAM_CROSSING, PARAM_LOWER, PARAM_TIME_LIMIT, PARAM_UPPER};

use crate::graph::node::NodeCore;
use crate::graph::parameter::FilterParameter;
use crate::graph::stream::StreamDescriptor;
use crate::graph::unit::Unit;
use crate::instrument::Instrument;

pub const PARAM_LEVEL: &str = "Level";

/// State shared by every trigger: the node core, with input `din` and the
/// `Level` parameter, plus the instrument the trigger belongs to.
pub struct TriggerCore {
    pub(crate) node: NodeCore,
    instrument: Instrument,
}

impl TriggerCore {
    pub fn new(name: &str, instrument: Instrument) -> Self {
        let mut node = NodeCore::new(name);
        node.create_input("din");
        node.add_parameter(PARAM_LEVEL, FilterParameter::float(0.0, Unit::Volts));
        Self { node, instrument }
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    /// Checks common to all triggers: slot 0, bound, same instrument.
    pub fn accepts(&self, index: usize, stream: &StreamDescriptor) -> bool {
        index == 0 && !stream.is_null() && stream.instrument() == Some(self.instrument.id())
    }

    pub fn level(&self) -> f64 {
        self.node
            .parameter(PARAM_LEVEL)
            .map(FilterParameter::as_float)
            .unwrap_or_default()
    }
}

/// Implements the boilerplate half of `NodePlugin` for a trigger whose
/// `TriggerCore` lives in a field named `base`.
macro_rules! trigger_plugin_common {
    ($name:expr) => {
        fn core(&self) -> &$crate::graph::node::NodeCore {
            &self.base.node
        }

        fn core_mut(&mut self) -> &mut $crate::graph::node::NodeCore {
            &mut self.base.node
        }

        fn protocol_name(&self) -> &str {
            $name
        }

        fn category(&self) -> $crate::graph::node::NodeCategory {
            $crate::graph::node::NodeCategory::Trigger
        }

        // Triggers configure hardware; nothing to compute.
        fn refresh(&mut self, _ctx: &mut $crate::graph::node::RefreshContext) {}

        fn instrument(&self) -> Option<&$crate::instrument::Instrument> {
            Some(self.base.instrument())
        }

        fn channel_kind(&self) -> $crate::graph::stream::ChannelKind {
            $crate::graph::stream::ChannelKind::Other
        }
    };
}

pub(crate) use trigger_plugin_common;
