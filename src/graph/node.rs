//! Node abstraction for the flow graph.
//!
//! Two-layer design:
//! - **`NodePlugin` trait**: the hooks a node implements. Out-of-tree
//!   nodes implement it directly.
//! - **`BuiltinNode` enum**: every built-in node. The refresh path matches
//!   on it instead of going through a vtable.
//!
//! `AnyNode` wraps either variant and implements the shared operations
//! (input binding, parameter changes) on top of the hooks.

use crate::error::{Result, ScopeFlowError};
use crate::graph::gpu::{CommandBuffer, DataLocation, QueueHandle};
use crate::graph::id::NodeId;
use crate::graph::nodes::triggers::{EdgeTrigger, NthEdgeBurstTrigger, WindowTrigger};
use crate::graph::nodes::{AcquisitionChannel, EthernetDecoder, GateFilter};
use crate::graph::parameter::{FilterParameter, ParameterValue};
use crate::graph::signal::Signal;
use crate::graph::stream::{ChannelKind, Stream, StreamDescriptor};
use crate::graph::waveform::AnyWaveform;
use crate::instrument::Instrument;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Broad grouping used by the node factory and in session files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    Acquisition,
    Math,
    Protocol,
    Trigger,
}

/// State every node carries: inputs, parameters, outputs, subscriptions.
pub struct NodeCore {
    display_name: String,
    input_names: Vec<String>,
    inputs: Vec<StreamDescriptor>,
    parameters: BTreeMap<String, FilterParameter>,
    streams: Vec<Stream>,
    /// Fired with the parameter name after each effective parameter change.
    pub parameters_changed: Signal<str>,
    /// Fired once per accepted binding change.
    pub inputs_changed: Signal<()>,
}

impl NodeCore {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            input_names: Vec::new(),
            inputs: Vec::new(),
            parameters: BTreeMap::new(),
            streams: Vec::new(),
            parameters_changed: Signal::new(),
            inputs_changed: Signal::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn set_display_name(&mut self, name: impl Into<String>) {
        self.display_name = name.into();
    }

    // ── Construction ──

    /// Declare the next input. Only called while building the node.
    pub fn create_input(&mut self, name: impl Into<String>) {
        self.input_names.push(name.into());
        self.inputs.push(StreamDescriptor::null());
    }

    pub fn add_stream(&mut self, stream: Stream) -> usize {
        self.streams.push(stream);
        self.streams.len() - 1
    }

    /// Register a parameter. A second registration under the same name
    /// replaces the first.
    pub fn add_parameter(&mut self, name: impl Into<String>, mut param: FilterParameter) {
        let name = name.into();
        param.set_name(name.clone());
        self.parameters.insert(name, param);
    }

    // ── Inputs ──

    pub fn input_count(&self) -> usize {
        self.input_names.len()
    }

    pub fn input_name(&self, index: usize) -> Option<&str> {
        self.input_names.get(index).map(String::as_str)
    }

    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.input_names.iter().position(|n| n == name)
    }

    /// Bound descriptor, or null for an unbound or out-of-range input.
    pub fn input(&self, index: usize) -> StreamDescriptor {
        self.inputs.get(index).copied().unwrap_or_default()
    }

    pub fn inputs(&self) -> &[StreamDescriptor] {
        &self.inputs
    }

    // ── Parameters ──

    pub fn parameter(&self, name: &str) -> Option<&FilterParameter> {
        self.parameters.get(name)
    }

    pub fn parameter_mut(&mut self, name: &str) -> Option<&mut FilterParameter> {
        self.parameters.get_mut(name)
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    pub fn parameters(&self) -> impl Iterator<Item = (&str, &FilterParameter)> {
        self.parameters.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    // ── Outputs ──

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn stream(&self, index: usize) -> Option<&Stream> {
        self.streams.get(index)
    }

    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    pub fn stream_index(&self, name: &str) -> Option<usize> {
        self.streams.iter().position(|s| s.name == name)
    }

    pub(crate) fn streams_mut(&mut self) -> &mut [Stream] {
        &mut self.streams
    }
}

/// Data a node sees on one input during refresh.
#[derive(Debug, Clone, Default)]
pub struct InputData {
    pub descriptor: StreamDescriptor,
    pub waveform: Option<Arc<AnyWaveform>>,
    /// `Some` only when the bound stream is a scalar.
    pub scalar: Option<f64>,
}

#[derive(Debug, Clone, Default)]
struct OutputData {
    waveform: Option<Arc<AnyWaveform>>,
    scalar: f64,
}

/// Per-refresh view of a node's inputs and staging area for its outputs.
///
/// Outputs start out holding the node's previous values; whatever the
/// node leaves here is published when refresh returns.
#[derive(Debug)]
pub struct RefreshContext {
    inputs: Vec<InputData>,
    outputs: Vec<OutputData>,
    cycle: u64,
}

impl RefreshContext {
    pub fn new(inputs: Vec<InputData>, previous: &[Stream], cycle: u64) -> Self {
        let outputs = previous
            .iter()
            .map(|s| OutputData {
                waveform: s.waveform.clone(),
                scalar: s.value,
            })
            .collect();
        Self {
            inputs,
            outputs,
            cycle,
        }
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn input_descriptor(&self, index: usize) -> StreamDescriptor {
        self.inputs
            .get(index)
            .map(|i| i.descriptor)
            .unwrap_or_default()
    }

    /// Waveform on an input. `None` when unbound or nothing was produced.
    pub fn input_waveform(&self, index: usize) -> Option<&AnyWaveform> {
        self.inputs.get(index)?.waveform.as_deref()
    }

    pub fn input_shared(&self, index: usize) -> Option<Arc<AnyWaveform>> {
        self.inputs.get(index)?.waveform.clone()
    }

    pub fn input_scalar(&self, index: usize) -> Option<f64> {
        self.inputs.get(index)?.scalar
    }

    /// Publish a new waveform on an output, or `None` for no data.
    pub fn set_data(&mut self, stream: usize, waveform: Option<AnyWaveform>) {
        self.set_shared(stream, waveform.map(Arc::new));
    }

    pub fn set_shared(&mut self, stream: usize, waveform: Option<Arc<AnyWaveform>>) {
        if let Some(out) = self.outputs.get_mut(stream) {
            out.waveform = waveform;
        }
    }

    pub fn set_scalar(&mut self, stream: usize, value: f64) {
        if let Some(out) = self.outputs.get_mut(stream) {
            out.scalar = value;
        }
    }

    /// Null every output.
    pub fn clear_outputs(&mut self) {
        for out in &mut self.outputs {
            out.waveform = None;
        }
    }

    /// Output as currently staged. Before the node writes, this is the
    /// value published by the previous refresh.
    pub fn output(&self, stream: usize) -> Option<&Arc<AnyWaveform>> {
        self.outputs.get(stream)?.waveform.as_ref()
    }

    pub(crate) fn publish(self, streams: &mut [Stream]) {
        for (stream, out) in streams.iter_mut().zip(self.outputs) {
            stream.waveform = out.waveform;
            stream.value = out.scalar;
        }
    }
}

/// Hooks implemented by every node.
pub trait NodePlugin: Send {
    fn core(&self) -> &NodeCore;

    fn core_mut(&mut self) -> &mut NodeCore;

    /// Type name, e.g. "Ethernet".
    fn protocol_name(&self) -> &str;

    fn category(&self) -> NodeCategory {
        NodeCategory::Math
    }

    /// Side-effect-free check of a proposed binding.
    fn validate_channel(&self, index: usize, stream: &StreamDescriptor) -> bool {
        index == 0 && !stream.is_null()
    }

    fn input_location(&self) -> DataLocation {
        DataLocation::Cpu
    }

    /// Compute outputs from inputs on the CPU.
    ///
    /// `ctx` starts out holding the previous cycle's outputs. A stream the
    /// node does not write is republished unchanged, so a node with no
    /// valid output must call `ctx.set_data(stream, None)` explicitly.
    fn refresh(&mut self, ctx: &mut RefreshContext);

    /// Record GPU work for this refresh. Must not submit or wait.
    fn refresh_gpu(
        &mut self,
        ctx: &mut RefreshContext,
        _cmd: &mut CommandBuffer,
        _queue: &QueueHandle,
    ) {
        self.refresh(ctx);
    }

    fn on_parameter_changed(&mut self, _name: &str) {}

    fn on_input_changed(&mut self, _index: usize) {}

    /// Instrument this node belongs to, if any.
    fn instrument(&self) -> Option<&Instrument> {
        None
    }

    /// Kind reported on this node's output streams.
    fn channel_kind(&self) -> ChannelKind {
        ChannelKind::Filter
    }
}

/// Enum dispatch for built-in nodes.
pub enum BuiltinNode {
    Channel(AcquisitionChannel),
    Gate(GateFilter),
    Ethernet(EthernetDecoder),
    EdgeTrigger(EdgeTrigger),
    WindowTrigger(WindowTrigger),
    NthEdgeBurstTrigger(NthEdgeBurstTrigger),
}

macro_rules! dispatch_builtin {
    ($self:expr, $n:ident => $body:expr) => {
        match $self {
            BuiltinNode::Channel($n) => $body,
            BuiltinNode::Gate($n) => $body,
            BuiltinNode::Ethernet($n) => $body,
            BuiltinNode::EdgeTrigger($n) => $body,
            BuiltinNode::WindowTrigger($n) => $body,
            BuiltinNode::NthEdgeBurstTrigger($n) => $body,
        }
    };
}

macro_rules! dispatch_any {
    ($self:expr, $n:ident => $body:expr) => {
        match $self {
            AnyNode::Builtin(b) => dispatch_builtin!(b, $n => $body),
            AnyNode::Plugin($n) => $body,
        }
    };
}

/// Wrapper that holds either a built-in node (enum dispatch) or a plugin (trait object).
pub enum AnyNode {
    Builtin(BuiltinNode),
    Plugin(Box<dyn NodePlugin>),
}

impl AnyNode {
    pub fn core(&self) -> &NodeCore {
        dispatch_any!(self, n => n.core())
    }

    pub fn core_mut(&mut self) -> &mut NodeCore {
        dispatch_any!(self, n => n.core_mut())
    }

    pub fn name(&self) -> &str {
        self.core().display_name()
    }

    pub fn protocol_name(&self) -> &str {
        dispatch_any!(self, n => n.protocol_name())
    }

    pub fn category(&self) -> NodeCategory {
        dispatch_any!(self, n => n.category())
    }

    pub fn validate_channel(&self, index: usize, stream: &StreamDescriptor) -> bool {
        dispatch_any!(self, n => n.validate_channel(index, stream))
    }

    pub fn input_location(&self) -> DataLocation {
        dispatch_any!(self, n => n.input_location())
    }

    pub fn refresh(&mut self, ctx: &mut RefreshContext) {
        dispatch_any!(self, n => n.refresh(ctx))
    }

    pub fn refresh_gpu(
        &mut self,
        ctx: &mut RefreshContext,
        cmd: &mut CommandBuffer,
        queue: &QueueHandle,
    ) {
        dispatch_any!(self, n => n.refresh_gpu(ctx, cmd, queue))
    }

    pub fn instrument(&self) -> Option<&Instrument> {
        dispatch_any!(self, n => n.instrument())
    }

    pub fn channel_kind(&self) -> ChannelKind {
        dispatch_any!(self, n => n.channel_kind())
    }

    fn on_parameter_changed(&mut self, name: &str) {
        dispatch_any!(self, n => n.on_parameter_changed(name))
    }

    fn on_input_changed(&mut self, index: usize) {
        dispatch_any!(self, n => n.on_input_changed(index))
    }

    // ── Input binding ──

    pub fn input_count(&self) -> usize {
        self.core().input_count()
    }

    pub fn input_name(&self, index: usize) -> Option<&str> {
        self.core().input_name(index)
    }

    pub fn input(&self, index: usize) -> StreamDescriptor {
        self.core().input(index)
    }

    /// Bind `stream` to input `index`.
    ///
    /// A binding the node rejects is refused unless `force` is set; a
    /// refused binding leaves the node untouched. On success
    /// `inputs_changed` fires once, then the node's own hook runs.
    pub fn set_input(&mut self, index: usize, stream: StreamDescriptor, force: bool) -> Result<()> {
        let count = self.input_count();
        if index >= count {
            return Err(ScopeFlowError::InputOutOfRange { index, count });
        }
        if !self.validate_channel(index, &stream) {
            if !force {
                // The graph fills in the owning node id.
                return Err(ScopeFlowError::InvalidWiring {
                    node: NodeId::INVALID,
                    input: index,
                    stream: stream.to_string(),
                });
            }
            tracing::warn!(
                "Forcing {} onto input {} of '{}' despite failed validation",
                stream,
                index,
                self.name()
            );
        }

        let core = self.core_mut();
        core.inputs[index] = stream;
        core.inputs_changed.emit(&());
        self.on_input_changed(index);
        Ok(())
    }

    pub fn set_input_by_name(&mut self, name: &str, stream: StreamDescriptor, force: bool) -> Result<()> {
        let index = self
            .core()
            .input_index(name)
            .ok_or_else(|| ScopeFlowError::UnknownInput(name.to_string()))?;
        self.set_input(index, stream, force)
    }

    /// Unbind every input. Fires `inputs_changed` once if anything was bound.
    pub fn detach_inputs(&mut self) {
        let core = self.core_mut();
        if core.inputs.iter().all(StreamDescriptor::is_null) {
            return;
        }
        for input in &mut core.inputs {
            *input = StreamDescriptor::null();
        }
        core.inputs_changed.emit(&());
        for i in 0..self.input_count() {
            self.on_input_changed(i);
        }
    }

    /// Replace one bound descriptor without validation. Used by the graph
    /// to drop references to a removed node.
    pub(crate) fn clear_input(&mut self, index: usize) {
        let core = self.core_mut();
        if let Some(input) = core.inputs.get_mut(index) {
            if !input.is_null() {
                *input = StreamDescriptor::null();
                core.inputs_changed.emit(&());
                self.on_input_changed(index);
            }
        }
    }

    // ── Parameters ──

    pub fn parameter(&self, name: &str) -> Option<&FilterParameter> {
        self.core().parameter(name)
    }

    /// Type-checked parameter assignment. Returns whether the value changed.
    pub fn set_parameter_value(&mut self, name: &str, value: &ParameterValue) -> Result<bool> {
        let changed = self
            .core_mut()
            .parameter_mut(name)
            .ok_or_else(|| ScopeFlowError::UnknownParameter(name.to_string()))?
            .set_value(value)
            .map_err(|e| e.with_context(format!("Setting '{}'", name)))?;
        if changed {
            self.core_mut().parameters_changed.emit(name);
            self.on_parameter_changed(name);
        }
        Ok(changed)
    }

    // ── Typed access ──

    pub fn as_channel(&self) -> Option<&AcquisitionChannel> {
        match self {
            AnyNode::Builtin(BuiltinNode::Channel(n)) => Some(n),
            _ => None,
        }
    }

    pub fn as_ethernet(&self) -> Option<&EthernetDecoder> {
        match self {
            AnyNode::Builtin(BuiltinNode::Ethernet(n)) => Some(n),
            _ => None,
        }
    }
}

impl From<BuiltinNode> for AnyNode {
    fn from(node: BuiltinNode) -> Self {
        AnyNode::Builtin(node)
    }
}

impl From<Box<dyn NodePlugin>> for AnyNode {
    fn from(node: Box<dyn NodePlugin>) -> Self {
        AnyNode::Plugin(node)
    }
}

macro_rules! builtin_from {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for AnyNode {
                fn from(node: $ty) -> Self {
                    AnyNode::Builtin(BuiltinNode::$variant(node))
                }
            }
        )*
    };
}

builtin_from!(
    Channel(AcquisitionChannel),
    Gate(GateFilter),
    Ethernet(EthernetDecoder),
    EdgeTrigger(EdgeTrigger),
    WindowTrigger(WindowTrigger),
    NthEdgeBurstTrigger(NthEdgeBurstTrigger),
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::stream::{StreamInfo, StreamType};
    use crate::graph::unit::Unit;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Minimal out-of-tree node: one input, one parameter, echoes its input.
    struct Echo {
        core: NodeCore,
    }

    impl Echo {
        fn new() -> Self {
            let mut core = NodeCore::new("echo");
            core.create_input("din");
            core.add_stream(Stream::new("out", Unit::Volts, StreamType::Analog));
            core.add_parameter("Gain", FilterParameter::float(1.0, Unit::Counts));
            Self { core }
        }
    }

    impl NodePlugin for Echo {
        fn core(&self) -> &NodeCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut NodeCore {
            &mut self.core
        }

        fn protocol_name(&self) -> &str {
            "Echo"
        }

        fn refresh(&mut self, ctx: &mut RefreshContext) {
            let data = ctx.input_shared(0);
            ctx.set_shared(0, data);
        }
    }

    fn analog(node: u32) -> StreamDescriptor {
        StreamDescriptor::new(
            NodeId(node),
            0,
            StreamInfo {
                stream_type: StreamType::Analog,
                ..Default::default()
            },
        )
    }

    fn echo_node() -> AnyNode {
        AnyNode::Plugin(Box::new(Echo::new()))
    }

    #[test]
    fn test_default_validation() {
        let node = echo_node();
        assert!(node.validate_channel(0, &analog(1)));
        assert!(!node.validate_channel(0, &StreamDescriptor::null()));
        assert!(!node.validate_channel(1, &analog(1)));
    }

    #[test]
    fn test_rejected_binding_leaves_input_unchanged() {
        let mut node = echo_node();
        node.set_input(0, analog(1), false).unwrap();

        let err = node.set_input(0, StreamDescriptor::null(), false).unwrap_err();
        assert!(err.is_invalid_wiring());
        assert_eq!(node.input(0), analog(1));
    }

    #[test]
    fn test_forced_binding() {
        let mut node = echo_node();
        node.set_input(0, StreamDescriptor::null(), true).unwrap();
        assert!(node.input(0).is_null());
    }

    #[test]
    fn test_out_of_range_input() {
        let mut node = echo_node();
        assert!(matches!(
            node.set_input(3, analog(1), false),
            Err(ScopeFlowError::InputOutOfRange { index: 3, count: 1 })
        ));
        assert!(matches!(
            node.set_input_by_name("missing", analog(1), false),
            Err(ScopeFlowError::UnknownInput(_))
        ));
    }

    #[test]
    fn test_inputs_changed_fires_once_per_binding() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut node = echo_node();
        let h = hits.clone();
        node.core_mut().inputs_changed.connect(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        node.set_input_by_name("din", analog(1), false).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let _ = node.set_input(0, StreamDescriptor::null(), false);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        node.detach_inputs();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        node.detach_inputs();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_parameter_change_notifies() {
        let names = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut node = echo_node();
        let n = names.clone();
        node.core_mut()
            .parameters_changed
            .connect(move |name| n.lock().push(name.to_string()));

        assert!(node
            .set_parameter_value("Gain", &ParameterValue::Float(2.0))
            .unwrap());
        assert!(!node
            .set_parameter_value("Gain", &ParameterValue::Float(2.0))
            .unwrap());
        assert!(node
            .set_parameter_value("Offset", &ParameterValue::Float(0.0))
            .is_err());
        assert_eq!(*names.lock(), vec!["Gain".to_string()]);
    }

    #[test]
    fn test_unbound_input_reads_as_none() {
        let ctx = RefreshContext::new(vec![InputData::default()], &[], 0);
        assert!(ctx.input_waveform(0).is_none());
        assert!(ctx.input_waveform(5).is_none());
        assert_eq!(ctx.input_scalar(0), None);
    }

    #[test]
    fn test_unwritten_output_keeps_previous_value() {
        use crate::graph::waveform::Waveform;

        let mut streams = vec![Stream::new("out", Unit::Volts, StreamType::Analog)];
        let previous = Arc::new(AnyWaveform::Analog(Waveform::from_samples(1, vec![1.0])));
        streams[0].waveform = Some(previous.clone());

        // Nothing written: the old waveform is republished.
        let ctx = RefreshContext::new(Vec::new(), &streams, 1);
        ctx.publish(&mut streams);
        assert!(Arc::ptr_eq(streams[0].waveform.as_ref().unwrap(), &previous));

        let mut ctx = RefreshContext::new(Vec::new(), &streams, 2);
        ctx.set_data(0, None);
        ctx.publish(&mut streams);
        assert!(streams[0].waveform.is_none());
    }
}
