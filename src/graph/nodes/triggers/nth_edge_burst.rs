use super::{trigger_plugin_common, TriggerCore};
use crate::graph::node::NodePlugin;
use crate::graph::parameter::FilterParameter;
use crate::graph::stream::{ChannelKind, StreamDescriptor};
use crate::graph::unit::Unit;
use crate::instrument::Instrument;

pub const PARAM_SLOPE: &str = "Slope";
pub const PARAM_IDLE_TIME: &str = "Idle time";
pub const PARAM_EDGE_NUMBER: &str = "Edge number";

/// Fires on the Nth edge of a burst that follows an idle period.
pub struct NthEdgeBurstTrigger {
    base: TriggerCore,
}

impl NthEdgeBurstTrigger {
    pub fn new(instrument: Instrument) -> Self {
        let mut base = TriggerCore::new("Nth Edge Burst", instrument);
        base.node.add_parameter(
            PARAM_SLOPE,
            FilterParameter::enumeration([("Rising", 0), ("Falling", 1)]),
        );
        base.node
            .add_parameter(PARAM_IDLE_TIME, FilterParameter::int(0, Unit::Femtoseconds));
        base.node
            .add_parameter(PARAM_EDGE_NUMBER, FilterParameter::int(0, Unit::Counts));
        Self { base }
    }

    pub fn idle_time(&self) -> i64 {
        self.int(PARAM_IDLE_TIME)
    }

    pub fn edge_number(&self) -> i64 {
        self.int(PARAM_EDGE_NUMBER)
    }

    pub fn falling(&self) -> bool {
        self.int(PARAM_SLOPE) == 1
    }

    fn int(&self, name: &str) -> i64 {
        self.base
            .node
            .parameter(name)
            .map(FilterParameter::as_int)
            .unwrap_or_default()
    }
}

impl NodePlugin for NthEdgeBurstTrigger {
    trigger_plugin_common!("Nth Edge Burst");

    fn validate_channel(&self, index: usize, stream: &StreamDescriptor) -> bool {
        self.base.accepts(index, stream) && stream.channel_kind() == ChannelKind::Oscilloscope
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{scope, stream};
    use super::*;
    use crate::graph::stream::StreamType;
    use crate::instrument::Capabilities;

    #[test]
    fn test_only_scope_channels() {
        let trig = NthEdgeBurstTrigger::new(scope(Capabilities::all()));
        assert!(trig.validate_channel(0, &stream(1, ChannelKind::Oscilloscope, StreamType::Digital)));
        assert!(!trig.validate_channel(0, &stream(1, ChannelKind::DigitalIo, StreamType::Digital)));
    }

    #[test]
    fn test_parameters() {
        let mut trig = NthEdgeBurstTrigger::new(scope(Capabilities::default()));
        let core = trig.core_mut();
        core.parameter_mut(PARAM_IDLE_TIME).unwrap().set_int(5_000_000);
        core.parameter_mut(PARAM_EDGE_NUMBER).unwrap().set_int(3);
        core.parameter_mut(PARAM_SLOPE).unwrap().set_enum_name("Falling").unwrap();

        assert_eq!(trig.idle_time(), 5_000_000);
        assert_eq!(trig.edge_number(), 3);
        assert!(trig.falling());
        assert_eq!(
            trig.core().parameter(PARAM_IDLE_TIME).unwrap().unit(),
            Unit::Femtoseconds
        );
    }
}
