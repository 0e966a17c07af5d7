//! Window trigger: fires when the input enters or leaves the band between
//! two levels. Instruments with `timed_window` also take a crossing edge,
//! a condition and a time limit.

use super::{trigger_plugin_common, TriggerCore};
use crate::graph::node::NodePlugin;
use crate::graph::parameter::FilterParameter;
use crate::graph::stream::{ChannelKind, StreamDescriptor, StreamType};
use crate::graph::unit::Unit;
use crate::instrument::{Capability, Instrument};

pub const PARAM_UPPER: &str = "Upper Level";
pub const PARAM_LOWER: &str = "Lower Level";
pub const PARAM_TIME_LIMIT: &str = "Time Limit";
pub const PARAM_CROSSING: &str = "Edge";
pub const PARAM_CONDITION: &str = "Condition";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossingType {
    Upper = 0,
    Lower = 1,
    Either = 2,
    None = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowCondition {
    Enter = 0,
    Exit = 1,
    ExitTimed = 2,
    EnterTimed = 3,
}

pub struct WindowTrigger {
    base: TriggerCore,
}

impl WindowTrigger {
    pub fn new(instrument: Instrument) -> Self {
        let timed = instrument.has(Capability::TimedWindow);
        let mut base = TriggerCore::new("Window", instrument);
        let node = &mut base.node;

        node.add_parameter(PARAM_UPPER, FilterParameter::float(0.0, Unit::Volts));
        node.add_parameter(PARAM_LOWER, FilterParameter::float(0.0, Unit::Volts));

        let time_limit = FilterParameter::int(0, Unit::Femtoseconds).requires(Capability::TimedWindow);
        if timed {
            node.add_parameter(PARAM_TIME_LIMIT, time_limit);
            node.add_parameter(
                PARAM_CROSSING,
                FilterParameter::enumeration([
                    ("Upper", CrossingType::Upper as i64),
                    ("Lower", CrossingType::Lower as i64),
                    ("Either", CrossingType::Either as i64),
                    ("None", CrossingType::None as i64),
                ])
                .requires(Capability::TimedWindow),
            );
            node.add_parameter(
                PARAM_CONDITION,
                FilterParameter::enumeration([
                    ("Enter", WindowCondition::Enter as i64),
                    ("Exit", WindowCondition::Exit as i64),
                    ("Exit (timed)", WindowCondition::ExitTimed as i64),
                    ("Enter (timed)", WindowCondition::EnterTimed as i64),
                ])
                .requires(Capability::TimedWindow),
            );
        } else {
            node.add_parameter(PARAM_TIME_LIMIT, time_limit.hidden());
        }

        Self { base }
    }

    pub fn upper_level(&self) -> f64 {
        self.float(PARAM_UPPER)
    }

    pub fn lower_level(&self) -> f64 {
        self.float(PARAM_LOWER)
    }

    /// Crossing edge, or `None` when the instrument lacks timed windows.
    pub fn crossing(&self) -> Option<CrossingType> {
        let value = self.base.node.parameter(PARAM_CROSSING)?.as_int();
        Some(match value {
            0 => CrossingType::Upper,
            1 => CrossingType::Lower,
            2 => CrossingType::Either,
            _ => CrossingType::None,
        })
    }

    pub fn condition(&self) -> Option<WindowCondition> {
        let value = self.base.node.parameter(PARAM_CONDITION)?.as_int();
        Some(match value {
            1 => WindowCondition::Exit,
            2 => WindowCondition::ExitTimed,
            3 => WindowCondition::EnterTimed,
            _ => WindowCondition::Enter,
        })
    }

    fn float(&self, name: &str) -> f64 {
        self.base
            .node
            .parameter(name)
            .map(FilterParameter::as_float)
            .unwrap_or_default()
    }
}

impl NodePlugin for WindowTrigger {
    trigger_plugin_common!("Window");

    fn validate_channel(&self, index: usize, stream: &StreamDescriptor) -> bool {
        // Digital inputs make no sense for a two-level window.
        self.base.accepts(index, stream)
            && stream.channel_kind() == ChannelKind::Oscilloscope
            && matches!(stream.stream_type(), StreamType::Analog | StreamType::Trigger)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{scope, stream};
    use super::*;
    use crate::instrument::Capabilities;

    #[test]
    fn test_validation() {
        let trig = WindowTrigger::new(scope(Capabilities::default()));
        assert!(trig.validate_channel(0, &stream(1, ChannelKind::Oscilloscope, StreamType::Analog)));
        assert!(trig.validate_channel(0, &stream(1, ChannelKind::Oscilloscope, StreamType::Trigger)));
        assert!(!trig.validate_channel(0, &stream(1, ChannelKind::Oscilloscope, StreamType::Digital)));
        assert!(!trig.validate_channel(0, &stream(1, ChannelKind::DigitalInput, StreamType::Analog)));
        assert!(!trig.validate_channel(0, &StreamDescriptor::null()));
    }

    #[test]
    fn test_time_limit_hidden_without_capability() {
        let trig = WindowTrigger::new(scope(Capabilities::default()));
        let core = trig.core();
        assert!(core.parameter(PARAM_TIME_LIMIT).unwrap().is_hidden());
        assert!(!core.has_parameter(PARAM_CROSSING));
        assert!(!core.has_parameter(PARAM_CONDITION));
        assert_eq!(trig.crossing(), None);
        assert!(core.has_parameter(PARAM_UPPER));
        assert!(core.has_parameter(PARAM_LOWER));
    }

    #[test]
    fn test_timed_window_parameters() {
        let caps = Capabilities {
            timed_window: true,
            ..Default::default()
        };
        let mut trig = WindowTrigger::new(scope(caps));
        assert!(!trig.core().parameter(PARAM_TIME_LIMIT).unwrap().is_hidden());
        assert_eq!(trig.crossing(), Some(CrossingType::Upper));
        assert_eq!(trig.condition(), Some(WindowCondition::Enter));

        let cond = trig.core_mut().parameter_mut(PARAM_CONDITION).unwrap();
        cond.set_enum_name("Enter (timed)").unwrap();
        assert_eq!(trig.condition(), Some(WindowCondition::EnterTimed));
    }

    #[test]
    fn test_levels() {
        let mut trig = WindowTrigger::new(scope(Capabilities::default()));
        trig.core_mut().parameter_mut(PARAM_UPPER).unwrap().set_float(1.2);
        trig.core_mut().parameter_mut(PARAM_LOWER).unwrap().set_float(-0.4);
        assert_eq!(trig.upper_level(), 1.2);
        assert_eq!(trig.lower_level(), -0.4);
    }
}
