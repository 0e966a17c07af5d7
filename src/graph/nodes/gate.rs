//! Gate filter: passes an analog waveform through while a scalar enable is
//! non-zero.
//!
//! In `Gate` mode a disabled gate outputs nothing. In `Latch` mode it keeps
//! publishing the last waveform it let through.

use crate::graph::gpu::{CommandBuffer, DataLocation, GpuCommand, QueueHandle};
use crate::graph::node::{NodeCore, NodePlugin, RefreshContext};
use crate::graph::parameter::FilterParameter;
use crate::graph::stream::{Stream, StreamDescriptor, StreamType};
use crate::graph::unit::Unit;
use crate::graph::waveform::{AnyWaveform, Waveform};

pub const PARAM_MODE: &str = "Mode";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    Gate = 0,
    Latch = 1,
}

/// Samples per GPU work group.
const WORKGROUP: usize = 64;

pub struct GateFilter {
    core: NodeCore,
}

impl GateFilter {
    pub fn new() -> Self {
        let mut core = NodeCore::new("Gate");
        core.create_input("data");
        core.create_input("enable");
        core.add_stream(Stream::new("out", Unit::Volts, StreamType::Analog));

        let mut mode = FilterParameter::enumeration([
            ("Gate", GateMode::Gate as i64),
            ("Latch", GateMode::Latch as i64),
        ]);
        mode.set_int(GateMode::Latch as i64);
        core.add_parameter(PARAM_MODE, mode);

        Self { core }
    }

    pub fn mode(&self) -> GateMode {
        match self.core.parameter(PARAM_MODE).map(FilterParameter::as_int) {
            Some(0) => GateMode::Gate,
            _ => GateMode::Latch,
        }
    }
}

impl Default for GateFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl NodePlugin for GateFilter {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn protocol_name(&self) -> &str {
        "Gate"
    }

    fn validate_channel(&self, index: usize, stream: &StreamDescriptor) -> bool {
        if stream.is_null() {
            return false;
        }
        match index {
            0 => stream.stream_type() == StreamType::Analog,
            1 => stream.stream_type() == StreamType::AnalogScalar,
            _ => false,
        }
    }

    fn input_location(&self) -> DataLocation {
        DataLocation::DontCare
    }

    fn refresh(&mut self, ctx: &mut RefreshContext) {
        let (Some(din), Some(enable)) = (ctx.input_waveform(0), ctx.input_scalar(1)) else {
            tracing::debug!("Gate: missing input");
            ctx.set_data(0, None);
            return;
        };

        let Some(udin) = din.as_analog().filter(|wf| !wf.is_sparse()) else {
            tracing::debug!("Gate: only uniform analog input is supported");
            ctx.set_data(0, None);
            return;
        };

        if enable == 0.0 {
            if self.mode() == GateMode::Gate {
                ctx.set_data(0, None);
            }
            return;
        }

        let mut out: Waveform<f32> = Waveform::from_samples(udin.timescale, udin.samples().to_vec());
        out.copy_timing_from(udin);
        out.flags = udin.flags;
        out.mark_modified_from_cpu();
        ctx.set_data(0, Some(AnyWaveform::Analog(out)));
    }

    fn refresh_gpu(&mut self, ctx: &mut RefreshContext, cmd: &mut CommandBuffer, _queue: &QueueHandle) {
        let len = ctx.input_waveform(0).map(AnyWaveform::len).unwrap_or(0);
        if len > 0 && ctx.input_scalar(1).is_some_and(|v| v != 0.0) {
            let bytes = len * std::mem::size_of::<f32>();
            cmd.record(GpuCommand::BindPipeline("gate_copy".to_string()));
            cmd.record(GpuCommand::Dispatch {
                x: len.div_ceil(WORKGROUP) as u32,
                y: 1,
                z: 1,
            });
            cmd.record(GpuCommand::Barrier);
            cmd.record(GpuCommand::Download {
                buffer: "out".to_string(),
                bytes,
            });
        }
        self.refresh(ctx);
    }
}
